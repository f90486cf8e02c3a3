pub mod bandpass;
pub mod butterworth;

pub use bandpass::{BandPassConfig, BandPassFilter};
