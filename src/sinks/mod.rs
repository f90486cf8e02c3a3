use crossbeam_channel::Sender;
use std::sync::{Arc, Mutex};

use crate::error::SinkError;
use crate::processing::messages::StimulusState;

// SINK COMPONENT --------------------------------------------------------------

/// Presentation boundary consuming the controller's output.
pub trait StimulusSink {
    fn present(&mut self, state: &StimulusState) -> Result<(), SinkError>;

    /// Called once after the last state.
    fn finish(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

impl<K: StimulusSink + ?Sized> StimulusSink for Box<K> {
    fn present(&mut self, state: &StimulusState) -> Result<(), SinkError> {
        (**self).present(state)
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        (**self).finish()
    }
}

/// Maps a magnitude in [0, 1] onto one of `n_steps` discrete stimulus steps.
///
/// A magnitude of exactly 1 lands on the top step rather than past it.
pub fn quantize(value: f64, n_steps: usize) -> usize {
    if n_steps == 0 {
        return 0;
    }
    let step = (value.clamp(0.0, 1.0) * n_steps as f64).floor() as usize;
    step.min(n_steps - 1)
}

/// Forwards every state to a renderer on another thread.
pub struct ChannelSink {
    tx: Sender<StimulusState>,
}

impl ChannelSink {
    pub fn new(tx: Sender<StimulusState>) -> Self {
        Self { tx }
    }
}

impl StimulusSink for ChannelSink {
    fn present(&mut self, state: &StimulusState) -> Result<(), SinkError> {
        self.tx.send(*state).map_err(|_| SinkError::Disconnected)
    }
}

/// Accepts and forgets every state, for headless runs that only record.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscardSink;

impl StimulusSink for DiscardSink {
    fn present(&mut self, _state: &StimulusState) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Keeps every presented state in memory; clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct CollectingSink {
    states: Arc<Mutex<Vec<StimulusState>>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn states(&self) -> Vec<StimulusState> {
        self.states
            .lock()
            .map(|states| states.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.states.lock().map(|states| states.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StimulusSink for CollectingSink {
    fn present(&mut self, state: &StimulusState) -> Result<(), SinkError> {
        self.states
            .lock()
            .map_err(|_| SinkError::Disconnected)?
            .push(*state);
        Ok(())
    }
}
