use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::time::{Duration, Instant};
use tracing::debug;

use super::SampleSource;
use crate::error::{ConfigError, SourceError};
use crate::processing::messages::Sample;

// -----------------------------------------------------------------------------
// SETUP FOR THE SIMULATED SIGNAL
// -----------------------------------------------------------------------------

/// One Gaussian deflection of a beat: `(offset from R-peak s, amplitude mV, width s)`.
type Wave = (f64, f64, f64);

const P_WAVE: Wave = (-0.2, 0.15, 0.025);
const Q_WAVE: Wave = (-0.03, -0.15, 0.01);
const R_WAVE: Wave = (0.0, 1.0, 0.012);
const S_WAVE: Wave = (0.03, -0.25, 0.01);
const T_WAVE: Wave = (0.3, 0.35, 0.05);

const BEAT_WAVES: [Wave; 5] = [P_WAVE, Q_WAVE, R_WAVE, S_WAVE, T_WAVE];

const BASELINE_WANDER_FREQ: f64 = 0.15;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct EcgSimulatorConfig {
    pub sample_rate: f64,
    /// Beats per minute.
    pub heart_rate: f64,
    /// Stop after this many seconds; run forever when unset.
    pub duration: Option<f64>,
    /// Scale applied to the whole waveform, in mV per unit.
    pub amplitude: f64,
    /// Half-width of uniform additive noise.
    pub noise: f64,
    /// Amplitude of a slow sinusoidal baseline drift.
    pub baseline_wander: f64,
    /// Number of identical channels per sample.
    pub channels: usize,
    pub seed: Option<u64>,
    /// Pace output to the wall clock instead of producing as fast as possible.
    pub realtime: bool,
}

impl Default for EcgSimulatorConfig {
    fn default() -> Self {
        Self {
            sample_rate: 100.0,
            heart_rate: 60.0,
            duration: None,
            amplitude: 1.0,
            noise: 0.0,
            baseline_wander: 0.0,
            channels: 1,
            seed: None,
            realtime: false,
        }
    }
}

// -----------------------------------------------------------------------------
// SIMULATING DATA
// -----------------------------------------------------------------------------

/// Synthetic ECG: a sum of P, Q, R, S and T Gaussians per beat.
///
/// R-peaks fall at `period / 2 + k * period`, which makes the true beat times
/// known exactly for testing detection.
pub struct EcgSimulator {
    config: EcgSimulatorConfig,
    period: f64,
    index: u64,
    total: Option<u64>,
    rng: StdRng,
    started: Option<Instant>,
}

impl EcgSimulator {
    pub fn new(config: EcgSimulatorConfig) -> Result<Self, ConfigError> {
        if !(config.sample_rate.is_finite() && config.sample_rate > 0.0) {
            return Err(ConfigError::InvalidSampleRate(config.sample_rate));
        }
        if !(config.heart_rate.is_finite() && config.heart_rate > 0.0) {
            return Err(ConfigError::InvalidParameter {
                name: "heart_rate",
                value: config.heart_rate,
            });
        }
        if !(config.noise.is_finite() && config.noise >= 0.0) {
            return Err(ConfigError::InvalidParameter {
                name: "noise",
                value: config.noise,
            });
        }
        if config.channels == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "channels",
                value: 0.0,
            });
        }

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let total = config
            .duration
            .map(|duration| (duration * config.sample_rate).max(0.0) as u64);
        debug!(heart_rate = config.heart_rate, ?total, "ECG simulator ready");

        Ok(Self {
            period: 60.0 / config.heart_rate,
            config,
            index: 0,
            total,
            rng,
            started: None,
        })
    }

    /// True R-peak times within `[0, duration)`.
    pub fn beat_times(&self, duration: f64) -> Vec<f64> {
        let first = self.period / 2.0;
        (0..)
            .map(|k| first + k as f64 * self.period)
            .take_while(|&t| t < duration)
            .collect()
    }

    /// Noise-free waveform value at time `t`.
    pub fn waveform(&self, t: f64) -> f64 {
        let first = self.period / 2.0;
        let nearest = ((t - first) / self.period).round() as i64;
        let mut value = 0.0;
        // Neighbouring beats overlap through the P and T waves.
        for k in (nearest - 1)..=(nearest + 1) {
            if k < 0 {
                continue;
            }
            let r_peak = first + k as f64 * self.period;
            for &(offset, amplitude, width) in BEAT_WAVES.iter() {
                let d = t - r_peak - offset;
                value += amplitude * (-(d * d) / (2.0 * width * width)).exp();
            }
        }
        self.config.amplitude * value
    }

    fn pace(&mut self) {
        let started = *self.started.get_or_insert_with(Instant::now);
        let due = started + Duration::from_secs_f64(self.index as f64 / self.config.sample_rate);
        let now = Instant::now();
        if due > now {
            std::thread::sleep(due - now);
        }
    }
}

impl SampleSource for EcgSimulator {
    fn next_sample(&mut self) -> Result<Option<Sample>, SourceError> {
        if self.total.is_some_and(|total| self.index >= total) {
            return Ok(None);
        }
        if self.config.realtime {
            self.pace();
        }

        let t = self.index as f64 / self.config.sample_rate;
        let mut value = self.waveform(t);
        if self.config.baseline_wander != 0.0 {
            value += self.config.baseline_wander * (2.0 * PI * BASELINE_WANDER_FREQ * t).sin();
        }
        if self.config.noise > 0.0 {
            value += self.rng.gen_range(-self.config.noise..=self.config.noise);
        }

        self.index += 1;
        Ok(Some(Sample::new(t, vec![value; self.config.channels])))
    }
}
