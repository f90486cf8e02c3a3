pub mod peaks;
pub mod qrs;

pub use qrs::{DetectorLevels, QrsDetector, QrsDetectorConfig};
