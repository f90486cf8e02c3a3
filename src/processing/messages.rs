use rand::Rng;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

// -----------------------------------------------------------------------------
// PIPELINE MESSAGES
// -----------------------------------------------------------------------------

/// Raw multi-channel reading from the acquisition source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: f64,
    pub values: Vec<f64>,
}

impl Sample {
    pub fn new(timestamp: f64, values: Vec<f64>) -> Self {
        Self { timestamp, values }
    }

    pub fn single(timestamp: f64, value: f64) -> Self {
        Self {
            timestamp,
            values: vec![value],
        }
    }
}

/// Band-pass output for the extracted ECG channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilteredSample {
    pub timestamp: f64,
    pub value: f64,
}

/// Seconds elapsed since the last confirmed R-peak.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatPhase {
    pub timestamp: f64,
    pub elapsed: f64,
}

impl HeartbeatPhase {
    /// True on the sample where a new beat was confirmed.
    pub fn is_beat(&self) -> bool {
        self.elapsed == 0.0
    }
}

/// Which on-screen stimulus carries the synchronous phase for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SyncSide {
    #[default]
    Left,
    Right,
}

impl SyncSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncSide::Left => "left",
            SyncSide::Right => "right",
        }
    }

    /// Coin flip for sessions that do not fix the side up front.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        if rng.gen_bool(0.5) {
            SyncSide::Left
        } else {
            SyncSide::Right
        }
    }
}

impl FromStr for SyncSide {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "left" => Ok(SyncSide::Left),
            "right" => Ok(SyncSide::Right),
            other => Err(format!("sync side must be 'left' or 'right', got '{}'", other)),
        }
    }
}

/// Stimulus magnitudes in [0, 1] for the presentation sink.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StimulusState {
    pub timestamp: f64,
    pub synchronous: f64,
    pub asynchronous: f64,
    pub sync_side: SyncSide,
}

impl StimulusState {
    pub fn left(&self) -> f64 {
        match self.sync_side {
            SyncSide::Left => self.synchronous,
            SyncSide::Right => self.asynchronous,
        }
    }

    pub fn right(&self) -> f64 {
        match self.sync_side {
            SyncSide::Left => self.asynchronous,
            SyncSide::Right => self.synchronous,
        }
    }
}

/// Discrete experiment marker (keypress, block start/end) logged next to the stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentEvent {
    pub timestamp: f64,
    pub key: String,
    pub key_timestamp: f64,
    pub sync_side: SyncSide,
}

/// Every per-link message produced for one input sample.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleResult {
    pub raw: Sample,
    pub filtered: FilteredSample,
    pub phase: HeartbeatPhase,
    pub stimulus: StimulusState,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn sides_swap_stimulus_channels() {
        let state = StimulusState {
            timestamp: 0.0,
            synchronous: 0.9,
            asynchronous: 0.1,
            sync_side: SyncSide::Left,
        };
        assert_eq!((state.left(), state.right()), (0.9, 0.1));
        let swapped = StimulusState {
            sync_side: SyncSide::Right,
            ..state
        };
        assert_eq!((swapped.left(), swapped.right()), (0.1, 0.9));
    }

    #[test]
    fn parses_sync_side() {
        assert_eq!("Left".parse::<SyncSide>(), Ok(SyncSide::Left));
        assert_eq!("right".parse::<SyncSide>(), Ok(SyncSide::Right));
        assert!("up".parse::<SyncSide>().is_err());
    }

    #[test]
    fn seeded_side_is_reproducible() {
        let a = SyncSide::random(&mut StdRng::seed_from_u64(3));
        let b = SyncSide::random(&mut StdRng::seed_from_u64(3));
        assert_eq!(a, b);
    }
}
