pub mod bindings;
pub mod config;
pub mod error;
pub mod local;
pub mod processing;
pub mod recording;
pub mod sinks;
pub mod sources;

pub use config::Config;
pub use processing::messages::{
    ExperimentEvent, FilteredSample, HeartbeatPhase, Sample, SampleResult, StimulusState, SyncSide,
};
pub use processing::pipeline::{Pipeline, PipelineHandle, PipelineReport};
pub use processing::signal_processor::SignalProcessor;
