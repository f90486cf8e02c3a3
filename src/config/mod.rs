// src/config/mod.rs
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::processing::controllers::PhaseControllerConfig;
use crate::processing::detectors::QrsDetectorConfig;
use crate::processing::filters::BandPassConfig;
use crate::processing::pipeline::OverflowPolicy;

/// Whole-session configuration, loaded from YAML.
///
/// The processing sample rate lives in `processor` and is applied to every
/// stage, so the stage sections never carry their own.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub processor: ProcessorConfig,
    pub filter: BandPassConfig,
    pub detector: QrsDetectorConfig,
    pub controller: PhaseControllerConfig,
    pub pipeline: PipelineConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ProcessorConfig {
    pub verbose: bool,
    /// Processing rate in Hz, after downsampling.
    pub sample_rate: f64,
    /// Keep every Nth acquired sample.
    pub downsampling: usize,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            sample_rate: 100.0,
            downsampling: 1,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub channel_capacity: usize,
    pub overflow: OverflowPolicy,
    pub poll_interval_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 256,
            overflow: OverflowPolicy::Block,
            poll_interval_ms: 20,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    pub level: String,
    /// Persist every inter-stage link to a session directory.
    pub record: bool,
    pub output_directory: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            record: false,
            output_directory: PathBuf::from("logs"),
        }
    }
}

impl Config {
    pub fn bandpass(&self) -> BandPassConfig {
        BandPassConfig {
            sample_rate: self.processor.sample_rate,
            ..self.filter.clone()
        }
    }

    pub fn qrs(&self) -> QrsDetectorConfig {
        QrsDetectorConfig {
            sample_rate: self.processor.sample_rate,
            ..self.detector.clone()
        }
    }

    pub fn phase(&self) -> PhaseControllerConfig {
        PhaseControllerConfig {
            sample_rate: self.processor.sample_rate,
            ..self.controller.clone()
        }
    }

    /// Checks every section without building any stage.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fs = self.processor.sample_rate;
        if !(fs.is_finite() && fs > 0.0) {
            return Err(ConfigError::InvalidSampleRate(fs));
        }
        if self.processor.downsampling == 0 {
            return Err(ConfigError::InvalidDownsampling);
        }
        if self.pipeline.channel_capacity == 0 {
            return Err(ConfigError::InvalidCapacity);
        }
        let filter = self.bandpass();
        crate::processing::filters::butterworth::bandpass(
            filter.order,
            filter.low_cutoff,
            filter.high_cutoff,
            filter.sample_rate,
        )?;
        self.qrs().validate()?;
        self.phase().validate()?;
        Ok(())
    }
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let config_str = fs::read_to_string(path)?;
    let config: Config = serde_yaml::from_str(&config_str)?;
    config.validate()?;
    Ok(config)
}

pub fn save_config<P: AsRef<Path>>(config: &Config, path: P) -> Result<(), ConfigError> {
    let yaml = serde_yaml::to_string(config)?;
    fs::write(path, yaml)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::controllers::AsyncCenterPolicy;
    use crate::processing::messages::SyncSide;

    #[test]
    fn defaults_are_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn yaml_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.yaml");
        let mut config = Config::default();
        config.processor.sample_rate = 250.0;
        config.filter.order = 2;
        config.controller.async_center = AsyncCenterPolicy::FixedOffset { delay: 0.6 };
        config.controller.sync_side = SyncSide::Right;
        save_config(&config, &path).unwrap();
        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.qrs().sample_rate, 250.0);
        assert_eq!(loaded.bandpass().sample_rate, 250.0);
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let yaml = "processor:\n  sample_rate: 200.0\nfilter:\n  high_cutoff: 20.0\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.filter.high_cutoff, 20.0);
        assert_eq!(config.filter.low_cutoff, 0.1);
        assert_eq!(config.detector, QrsDetectorConfig::default());
        assert_eq!(config.phase().sample_rate, 200.0);
    }

    #[test]
    fn async_policy_is_tagged() {
        let yaml = "controller:\n  async_center:\n    policy: delayed_sync\n    delay: 0.6\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            config.controller.async_center,
            AsyncCenterPolicy::DelayedSync { delay: 0.6 }
        );
    }

    #[test]
    fn rejects_inverted_passband() {
        let mut config = Config::default();
        config.filter.low_cutoff = 20.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidPassband { .. })
        ));
    }

    #[test]
    fn rejects_zero_downsampling_and_capacity() {
        let mut config = Config::default();
        config.processor.downsampling = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidDownsampling)
        ));
        let mut config = Config::default();
        config.pipeline.channel_capacity = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidCapacity)));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        assert!(matches!(
            load_config("/nonexistent/session.yaml"),
            Err(ConfigError::Io(_))
        ));
    }
}
