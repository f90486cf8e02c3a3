pub mod phase;

pub use phase::{AsyncCenterPolicy, PhaseController, PhaseControllerConfig, PhaseResponse};
