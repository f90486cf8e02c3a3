use thiserror::Error;

/// Construction-time failures. The pipeline refuses to start on any of these.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid sample rate: {0} (must be positive and finite)")]
    InvalidSampleRate(f64),

    #[error("Invalid passband: {low} - {high} Hz (need 0 < low < high < {nyquist} Hz)")]
    InvalidPassband { low: f64, high: f64, nyquist: f64 },

    #[error("Invalid filter order: {0} (must be at least 1)")]
    InvalidOrder(usize),

    #[error("Invalid {name}: {value} (must be within [0, 1])")]
    InvalidWeight { name: &'static str, value: f64 },

    #[error("Invalid {name}: {value}")]
    InvalidParameter { name: &'static str, value: f64 },

    #[error("Downsampling factor must be at least 1")]
    InvalidDownsampling,

    #[error("Channel capacity must be at least 1")]
    InvalidCapacity,

    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Failures of an acquisition source.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Source I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Source CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Malformed source row {row}: {reason}")]
    Malformed { row: u64, reason: String },

    #[error("Source unavailable: {0}")]
    Unavailable(String),
}

/// Failures of a presentation sink.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Sink disconnected")]
    Disconnected,

    #[error("Sink I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Sink CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Failures while persisting the session log.
#[derive(Error, Debug)]
pub enum RecordError {
    #[error("Recorder I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Recorder CSV error: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Acquisition source failed: {0}")]
    Source(#[from] SourceError),

    #[error("Presentation sink failed: {0}")]
    Sink(#[from] SinkError),

    #[error("Session recorder failed: {0}")]
    Record(#[from] RecordError),

    #[error("Failed to spawn stage thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Stage thread '{0}' failed")]
    StageFailed(&'static str),
}
