use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::peaks::{find_peaks, PeakScratch};
use crate::error::ConfigError;
use crate::processing::messages::{FilteredSample, HeartbeatPhase};
use crate::processing::{RingBuffer, Stage};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct QrsDetectorConfig {
    #[serde(skip)]
    pub sample_rate: f64,
    /// Minimum height of an integrated-energy peak to be considered at all.
    pub findpeaks_amplitude_threshold: f64,
    pub qrs_ema_weight: f64,
    pub noise_ema_weight: f64,
    /// Where the adaptive threshold sits between the noise and QRS levels.
    pub qrs_noise_blend_weight: f64,
}

impl Default for QrsDetectorConfig {
    fn default() -> Self {
        Self {
            sample_rate: 100.0,
            findpeaks_amplitude_threshold: 0.35,
            qrs_ema_weight: 0.125,
            noise_ema_weight: 0.125,
            qrs_noise_blend_weight: 0.25,
        }
    }
}

impl QrsDetectorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fs = self.sample_rate;
        if !(fs.is_finite() && fs > 0.0) || ((0.8 * fs) as usize) < 3 {
            return Err(ConfigError::InvalidSampleRate(fs));
        }
        for (name, value) in [
            ("qrs_ema_weight", self.qrs_ema_weight),
            ("noise_ema_weight", self.noise_ema_weight),
            ("qrs_noise_blend_weight", self.qrs_noise_blend_weight),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidWeight { name, value });
            }
        }
        let threshold = self.findpeaks_amplitude_threshold;
        if !(threshold.is_finite() && threshold >= 0.0) {
            return Err(ConfigError::InvalidParameter {
                name: "findpeaks_amplitude_threshold",
                value: threshold,
            });
        }
        Ok(())
    }
}

/// Adaptive peak levels, exposed for observation.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct DetectorLevels {
    pub qrs_peak: f64,
    pub noise_peak: f64,
    pub threshold: f64,
}

/// Pan-Tompkins QRS detector over the filtered ECG stream.
///
/// Every sample past the refractory period re-runs slope, squaring and
/// moving-window integration over the last 0.8 s, then classifies the most
/// recent energy peak against a threshold that adapts to both QRS and noise
/// peak heights.
pub struct QrsDetector {
    config: QrsDetectorConfig,
    buffer: RingBuffer,
    integration_window: usize,
    peak_spacing: usize,
    detection_window: usize,
    refractory_period: f64,
    samples_since_last_beat: u64,
    levels: DetectorLevels,
    beats_detected: u64,
    // Scratch space reused every sample.
    window: Vec<f64>,
    slope_energy: Vec<f64>,
    integrated: Vec<f64>,
    peaks: Vec<usize>,
    peak_scratch: PeakScratch,
}

impl QrsDetector {
    pub fn new(config: QrsDetectorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let fs = config.sample_rate;

        let buffer_size = (0.8 * fs) as usize;
        let integration_window = ((0.06 * fs) as usize).max(1);
        let peak_spacing = (0.2 * fs) as usize;
        let detection_window = ((40.0 / 250.0) * fs) as usize;
        let refractory_period = (120.0 / 250.0) * fs;
        let integrated_len = buffer_size - 1 + integration_window - 1;

        debug!(
            buffer_size,
            integration_window,
            peak_spacing,
            detection_window,
            refractory_period,
            "QRS detector ready"
        );

        Ok(Self {
            config,
            buffer: RingBuffer::new(buffer_size, 0.0),
            integration_window,
            peak_spacing,
            detection_window,
            refractory_period,
            samples_since_last_beat: 0,
            levels: DetectorLevels::default(),
            beats_detected: 0,
            window: Vec::with_capacity(buffer_size),
            slope_energy: Vec::with_capacity(buffer_size - 1),
            integrated: Vec::with_capacity(integrated_len),
            peaks: Vec::with_capacity(integrated_len),
            peak_scratch: PeakScratch::with_capacity(integrated_len),
        })
    }

    pub fn config(&self) -> &QrsDetectorConfig {
        &self.config
    }

    pub fn levels(&self) -> DetectorLevels {
        self.levels
    }

    pub fn beats_detected(&self) -> u64 {
        self.beats_detected
    }

    pub fn samples_since_last_beat(&self) -> u64 {
        self.samples_since_last_beat
    }

    pub fn refractory_period(&self) -> f64 {
        self.refractory_period
    }

    pub fn elapsed(&self) -> f64 {
        self.samples_since_last_beat as f64 / self.config.sample_rate
    }

    /// Pushes one filtered sample and returns seconds since the last confirmed beat.
    pub fn detect(&mut self, sample: f64) -> f64 {
        self.buffer.push(sample);
        self.samples_since_last_beat += 1;

        if self.samples_since_last_beat as f64 > self.refractory_period {
            if let Some(amplitude) = self.latest_peak() {
                self.classify(amplitude);
            }
        }
        self.elapsed()
    }

    // Slope -> squaring -> moving-window integration -> peak search.
    fn latest_peak(&mut self) -> Option<f64> {
        self.window.clear();
        self.window.extend(self.buffer.iter());

        self.slope_energy.clear();
        self.slope_energy
            .extend(self.window.windows(2).map(|pair| (pair[1] - pair[0]).powi(2)));

        // Full convolution with a rectangular window.
        let width = self.integration_window;
        let len = self.slope_energy.len();
        self.integrated.clear();
        for i in 0..len + width - 1 {
            let start = (i + 1).saturating_sub(width);
            let end = i.min(len - 1);
            self.integrated.push(self.slope_energy[start..=end].iter().sum());
        }

        find_peaks(
            &self.integrated,
            self.config.findpeaks_amplitude_threshold,
            self.peak_spacing,
            &mut self.peaks,
            &mut self.peak_scratch,
        );

        let recent_after = self.buffer.capacity().saturating_sub(self.detection_window);
        self.peaks
            .iter()
            .rev()
            .find(|&&index| index > recent_after)
            .map(|&index| self.integrated[index])
    }

    fn classify(&mut self, amplitude: f64) {
        let levels = &mut self.levels;
        if amplitude > levels.threshold {
            self.samples_since_last_beat = 0;
            self.beats_detected += 1;
            let w = self.config.qrs_ema_weight;
            levels.qrs_peak = w * amplitude + (1.0 - w) * levels.qrs_peak;
            debug!(amplitude, threshold = levels.threshold, "QRS detected");
        } else {
            let w = self.config.noise_ema_weight;
            levels.noise_peak = w * amplitude + (1.0 - w) * levels.noise_peak;
            trace!(amplitude, threshold = levels.threshold, "noise peak");
        }

        levels.threshold = levels.noise_peak
            + self.config.qrs_noise_blend_weight * (levels.qrs_peak - levels.noise_peak);
    }
}

impl Stage for QrsDetector {
    type Input = FilteredSample;
    type Output = HeartbeatPhase;

    fn name(&self) -> &'static str {
        "detector"
    }

    fn process(&mut self, sample: FilteredSample) -> HeartbeatPhase {
        HeartbeatPhase {
            timestamp: sample.timestamp,
            elapsed: self.detect(sample.value),
        }
    }
}
