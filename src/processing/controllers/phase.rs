use serde::{Deserialize, Serialize};
use statrs::distribution::{Continuous, Normal};

use crate::error::ConfigError;
use crate::processing::messages::{HeartbeatPhase, StimulusState, SyncSide};
use crate::processing::{RingBuffer, Stage};

/// How the asynchronous stimulus is placed within the cardiac cycle.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum AsyncCenterPolicy {
    /// Half of the last inter-beat interval after the synchronous center.
    #[default]
    HalfInterval,
    /// A fixed delay after each beat.
    FixedOffset { delay: f64 },
    /// The synchronous response replayed `delay - systole_phase_offset` seconds later.
    DelayedSync { delay: f64 },
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct PhaseControllerConfig {
    /// Seconds after the R-peak at which the synchronous stimulus peaks.
    pub systole_phase_offset: f64,
    /// Standard deviation of the bell-shaped response, in seconds.
    pub response_width: f64,
    pub async_center: AsyncCenterPolicy,
    pub sync_side: SyncSide,
    pub initial_inter_beat_interval: f64,
    /// Only used to size the `DelayedSync` delay line.
    #[serde(skip)]
    pub sample_rate: f64,
}

impl Default for PhaseControllerConfig {
    fn default() -> Self {
        Self {
            systole_phase_offset: 0.210,
            response_width: 0.25 / 4.0,
            async_center: AsyncCenterPolicy::HalfInterval,
            sync_side: SyncSide::Left,
            initial_inter_beat_interval: 0.0,
            sample_rate: 100.0,
        }
    }
}

impl PhaseControllerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            ("response_width", self.response_width, self.response_width > 0.0),
            (
                "systole_phase_offset",
                self.systole_phase_offset,
                self.systole_phase_offset >= 0.0,
            ),
            (
                "initial_inter_beat_interval",
                self.initial_inter_beat_interval,
                self.initial_inter_beat_interval >= 0.0,
            ),
        ];
        for (name, value, ok) in checks {
            if !(ok && value.is_finite()) {
                return Err(ConfigError::InvalidParameter { name, value });
            }
        }
        match self.async_center {
            AsyncCenterPolicy::HalfInterval => {}
            AsyncCenterPolicy::FixedOffset { delay } => {
                if !(delay.is_finite() && delay >= 0.0) {
                    return Err(ConfigError::InvalidParameter {
                        name: "delay",
                        value: delay,
                    });
                }
            }
            AsyncCenterPolicy::DelayedSync { delay } => {
                if !(delay.is_finite() && delay >= self.systole_phase_offset) {
                    return Err(ConfigError::InvalidParameter {
                        name: "delay",
                        value: delay,
                    });
                }
                if !(self.sample_rate.is_finite() && self.sample_rate > 0.0) {
                    return Err(ConfigError::InvalidSampleRate(self.sample_rate));
                }
            }
        }
        Ok(())
    }
}

/// Bell-shaped response normalised to exactly 1 at its center.
#[derive(Debug, Clone)]
pub struct PhaseResponse {
    normal: Normal,
    peak_density: f64,
}

impl PhaseResponse {
    pub fn new(width: f64) -> Result<Self, ConfigError> {
        let normal = Normal::new(0.0, width).map_err(|_| ConfigError::InvalidParameter {
            name: "response_width",
            value: width,
        })?;
        let peak_density = normal.pdf(0.0);
        Ok(Self {
            normal,
            peak_density,
        })
    }

    pub fn at(&self, t: f64, center: f64) -> f64 {
        self.normal.pdf(t - center) / self.peak_density
    }
}

/// Maps time since the last heartbeat onto synchronous and asynchronous stimulus sizes.
pub struct PhaseController {
    config: PhaseControllerConfig,
    response: PhaseResponse,
    last_inter_beat_interval: f64,
    previous_elapsed: Option<f64>,
    // Only allocated for `DelayedSync`.
    delay_line: RingBuffer,
}

impl PhaseController {
    pub fn new(config: PhaseControllerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let response = PhaseResponse::new(config.response_width)?;
        let lag = match config.async_center {
            AsyncCenterPolicy::DelayedSync { delay } => {
                ((delay - config.systole_phase_offset) * config.sample_rate).round() as usize
            }
            _ => 0,
        };
        Ok(Self {
            last_inter_beat_interval: config.initial_inter_beat_interval,
            config,
            response,
            previous_elapsed: None,
            delay_line: RingBuffer::new(lag, 0.0),
        })
    }

    pub fn config(&self) -> &PhaseControllerConfig {
        &self.config
    }

    pub fn last_inter_beat_interval(&self) -> f64 {
        self.last_inter_beat_interval
    }

    /// Center of the asynchronous response for the current cycle, if it has one.
    pub fn asynchronous_center(&self) -> Option<f64> {
        match self.config.async_center {
            AsyncCenterPolicy::HalfInterval => {
                Some(self.config.systole_phase_offset + self.last_inter_beat_interval / 2.0)
            }
            AsyncCenterPolicy::FixedOffset { delay } => Some(delay),
            AsyncCenterPolicy::DelayedSync { .. } => None,
        }
    }

    /// Returns `(synchronous, asynchronous)` magnitudes for one elapsed-time value.
    pub fn map_elapsed(&mut self, elapsed: f64) -> (f64, f64) {
        if elapsed == 0.0 {
            if let Some(previous) = self.previous_elapsed.filter(|&p| p != 0.0) {
                self.last_inter_beat_interval = previous;
            }
        }
        self.previous_elapsed = Some(elapsed);

        let synchronous = self.response.at(elapsed, self.config.systole_phase_offset);
        let asynchronous = match self.asynchronous_center() {
            Some(center) => self.response.at(elapsed, center),
            None => self.delay_line.push(synchronous),
        };
        (synchronous, asynchronous)
    }
}

impl Stage for PhaseController {
    type Input = HeartbeatPhase;
    type Output = StimulusState;

    fn name(&self) -> &'static str {
        "controller"
    }

    fn process(&mut self, phase: HeartbeatPhase) -> StimulusState {
        let (synchronous, asynchronous) = self.map_elapsed(phase.elapsed);
        StimulusState {
            timestamp: phase.timestamp,
            synchronous,
            asynchronous,
            sync_side: self.config.sync_side,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller(policy: AsyncCenterPolicy) -> PhaseController {
        PhaseController::new(PhaseControllerConfig {
            async_center: policy,
            ..Default::default()
        })
        .unwrap()
    }

    // Elapsed-time ramp with resets every `period` samples at 100 Hz.
    fn ramp(samples: usize, period: usize) -> Vec<f64> {
        (0..samples).map(|i| (i % period) as f64 / 100.0).collect()
    }

    #[test]
    fn synchronous_peaks_exactly_at_offset() {
        let mut controller = controller(AsyncCenterPolicy::HalfInterval);
        let (peak, _) = controller.map_elapsed(0.210);
        assert_eq!(peak, 1.0);
        for t in [0.0, 0.1, 0.2, 0.205, 0.215, 0.3, 0.8, 2.0] {
            let (sync, _) = controller.map_elapsed(t);
            assert!(sync < 1.0 && sync >= 0.0, "t = {}: {}", t, sync);
        }
    }

    #[test]
    fn response_is_symmetric() {
        let response = PhaseResponse::new(0.0625).unwrap();
        let before = response.at(0.21 - 0.05, 0.21);
        let after = response.at(0.21 + 0.05, 0.21);
        assert!((before - after).abs() < 1e-12);
        assert!((before - (-0.05f64.powi(2) / (2.0 * 0.0625f64.powi(2))).exp()).abs() < 1e-12);
    }

    #[test]
    fn captures_inter_beat_interval_at_reset() {
        let mut controller = controller(AsyncCenterPolicy::HalfInterval);
        assert_eq!(controller.last_inter_beat_interval(), 0.0);
        for elapsed in ramp(85, 80) {
            controller.map_elapsed(elapsed);
        }
        assert!((controller.last_inter_beat_interval() - 0.79).abs() < 1e-12);
        // The next reset captures again; repeated zeros keep it.
        controller.map_elapsed(0.0);
        controller.map_elapsed(0.0);
        controller.map_elapsed(0.0);
        assert!((controller.last_inter_beat_interval() - 0.04).abs() < 1e-12);
        controller.map_elapsed(0.0);
        assert!((controller.last_inter_beat_interval() - 0.04).abs() < 1e-12);
    }

    #[test]
    fn half_interval_centers_async_in_diastole() {
        let mut controller = controller(AsyncCenterPolicy::HalfInterval);
        for elapsed in ramp(101, 100) {
            controller.map_elapsed(elapsed);
        }
        let center = controller.asynchronous_center().unwrap();
        assert!((center - (0.21 + 0.99 / 2.0)).abs() < 1e-12);
        for step in 1..=70 {
            controller.map_elapsed(step as f64 / 100.0);
        }
        let (_, at_center) = controller.map_elapsed(center);
        assert_eq!(at_center, 1.0);
    }

    #[test]
    fn fixed_offset_ignores_interval() {
        let mut controller = controller(AsyncCenterPolicy::FixedOffset { delay: 0.6 });
        let (_, asynchronous) = controller.map_elapsed(0.6);
        assert_eq!(asynchronous, 1.0);
        assert_eq!(controller.asynchronous_center(), Some(0.6));
    }

    #[test]
    fn delayed_sync_replays_synchronous_response() {
        let mut controller = controller(AsyncCenterPolicy::DelayedSync { delay: 0.6 });
        let outputs: Vec<(f64, f64)> = ramp(300, 100)
            .into_iter()
            .map(|e| controller.map_elapsed(e))
            .collect();
        let lag = 39;
        assert!(outputs[..lag].iter().all(|&(_, a)| a == 0.0));
        for i in lag..outputs.len() {
            assert_eq!(outputs[i].1, outputs[i - lag].0);
        }
    }

    #[test]
    fn outputs_stay_in_unit_interval() {
        let mut controller = controller(AsyncCenterPolicy::HalfInterval);
        for elapsed in ramp(1000, 93) {
            let (s, a) = controller.map_elapsed(elapsed);
            assert!((0.0..=1.0).contains(&s));
            assert!((0.0..=1.0).contains(&a));
        }
    }

    #[test]
    fn process_carries_timestamp_and_side() {
        let mut controller = PhaseController::new(PhaseControllerConfig {
            sync_side: SyncSide::Right,
            ..Default::default()
        })
        .unwrap();
        let state = controller.process(HeartbeatPhase {
            timestamp: 3.5,
            elapsed: 0.21,
        });
        assert_eq!(state.timestamp, 3.5);
        assert_eq!(state.right(), 1.0);
        assert_eq!(state.left(), state.asynchronous);
    }

    #[test]
    fn rejects_non_positive_width() {
        let config = PhaseControllerConfig {
            response_width: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            PhaseController::new(config),
            Err(ConfigError::InvalidParameter {
                name: "response_width",
                ..
            })
        ));
    }
}
