use tracing::{info, trace};

use super::controllers::PhaseController;
use super::detectors::QrsDetector;
use super::filters::BandPassFilter;
use super::messages::{Sample, SampleResult};
use super::Stage;
use crate::config::Config;
use crate::error::ConfigError;

// -----------------------------------------------------------------------------
// RUST CORE LOGIC
// -----------------------------------------------------------------------------

// SIGNAL PROCESSOR COMPONENT --------------------------------------------------

/// The three compute stages composed directly, one sample at a time.
///
/// Same semantics as the threaded pipeline without any channels in between,
/// which makes it the reference for replay, bindings and tests.
pub struct SignalProcessor {
    pub index: usize,
    filter: BandPassFilter,
    detector: QrsDetector,
    controller: PhaseController,
    verbose: bool,
}

impl SignalProcessor {
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        config.validate()?;
        let processor = Self::from_stages(
            BandPassFilter::new(config.bandpass())?,
            QrsDetector::new(config.qrs())?,
            PhaseController::new(config.phase())?,
        )
        .verbose(config.processor.verbose);
        info!(
            sample_rate = config.processor.sample_rate,
            sync_side = config.controller.sync_side.as_str(),
            "signal processor ready"
        );
        Ok(processor)
    }

    pub fn from_stages(
        filter: BandPassFilter,
        detector: QrsDetector,
        controller: PhaseController,
    ) -> Self {
        Self {
            index: 0,
            filter,
            detector,
            controller,
            verbose: false,
        }
    }

    /// Emit a trace event for every processed sample.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn filter(&self) -> &BandPassFilter {
        &self.filter
    }

    pub fn detector(&self) -> &QrsDetector {
        &self.detector
    }

    pub fn controller(&self) -> &PhaseController {
        &self.controller
    }

    pub fn process_sample(&mut self, sample: Sample) -> SampleResult {
        let filtered = self.filter.process(sample.clone());
        let phase = self.detector.process(filtered);
        let stimulus = self.controller.process(phase);

        if self.verbose {
            trace!(
                index = self.index,
                timestamp = sample.timestamp,
                filtered = filtered.value,
                elapsed = phase.elapsed,
                synchronous = stimulus.synchronous,
                asynchronous = stimulus.asynchronous,
                "processed sample"
            );
        }

        self.index += 1;
        SampleResult {
            raw: sample,
            filtered,
            phase,
            stimulus,
        }
    }

    pub fn run_chunk(&mut self, samples: Vec<Sample>) -> Vec<SampleResult> {
        samples
            .into_iter()
            .map(|sample| self.process_sample(sample))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spikes(n: usize) -> Vec<Sample> {
        (0..n)
            .map(|i| Sample::single(i as f64 / 100.0, if i % 100 == 50 { 5.0 } else { 0.0 }))
            .collect()
    }

    #[test]
    fn one_result_per_sample_with_shared_timestamps() {
        let mut processor = SignalProcessor::new(&Config::default()).unwrap();
        let results = processor.run_chunk(spikes(300));
        assert_eq!(results.len(), 300);
        assert_eq!(processor.index, 300);
        for result in &results {
            let t = result.raw.timestamp;
            assert_eq!(result.filtered.timestamp, t);
            assert_eq!(result.phase.timestamp, t);
            assert_eq!(result.stimulus.timestamp, t);
        }
        assert!(processor.detector().beats_detected() > 0);
    }

    #[test]
    fn chunked_and_single_processing_agree() {
        let mut chunked = SignalProcessor::new(&Config::default()).unwrap();
        let mut single = SignalProcessor::new(&Config::default()).unwrap();
        let samples = spikes(250);
        let mut expected = Vec::new();
        for chunk in samples.chunks(37) {
            expected.extend(chunked.run_chunk(chunk.to_vec()));
        }
        let actual: Vec<_> = samples
            .into_iter()
            .map(|s| single.process_sample(s))
            .collect();
        assert_eq!(expected, actual);
    }

    #[test]
    fn refuses_invalid_config() {
        let mut config = Config::default();
        config.processor.sample_rate = 0.0;
        assert!(matches!(
            SignalProcessor::new(&config),
            Err(ConfigError::InvalidSampleRate(_))
        ));
    }
}
