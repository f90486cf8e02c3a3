pub mod controllers;
pub mod detectors;
pub mod filters;
pub mod messages;
pub mod pipeline;
pub mod signal_processor;

// STAGE COMPONENT -------------------------------------------------------------

/// One pipeline stage: a deterministic per-message update over owned state.
///
/// Exactly one output is produced per input, and `process` never blocks or fails.
pub trait Stage: Send {
    type Input;
    type Output;

    fn name(&self) -> &'static str;

    fn process(&mut self, input: Self::Input) -> Self::Output;
}

// BUFFER COMPONENT ------------------------------------------------------------

/// Fixed-capacity ring buffer that is always full.
///
/// Starts filled with a default value; every push evicts the oldest element.
/// Index 0 of `get` is the oldest element, index 0 of `latest` the newest.
#[derive(Debug, Clone)]
pub struct RingBuffer {
    buffer: Vec<f64>,
    head: usize,
}

impl RingBuffer {
    pub fn new(capacity: usize, fill: f64) -> Self {
        Self {
            buffer: vec![fill; capacity],
            head: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Pushes a new element and returns the one it evicted.
    ///
    /// A zero-capacity buffer hands the pushed element straight back.
    pub fn push(&mut self, element: f64) -> f64 {
        let capacity = self.buffer.len();
        if capacity == 0 {
            return element;
        }
        let evicted = std::mem::replace(&mut self.buffer[self.head], element);
        self.head = (self.head + 1) % capacity;
        evicted
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        let capacity = self.buffer.len();
        if index >= capacity {
            return None;
        }
        Some(self.buffer[(self.head + index) % capacity])
    }

    pub fn latest(&self, index: usize) -> Option<f64> {
        let capacity = self.buffer.len();
        if index >= capacity {
            return None;
        }
        Some(self.buffer[(self.head + capacity - 1 - index) % capacity])
    }

    /// Oldest-to-newest iteration.
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        let (newer, older) = self.buffer.split_at(self.head);
        older.iter().chain(newer.iter()).copied()
    }

    /// Newest-to-oldest iteration.
    pub fn iter_latest(&self) -> impl Iterator<Item = f64> + '_ {
        let (newer, older) = self.buffer.split_at(self.head);
        newer.iter().rev().chain(older.iter().rev()).copied()
    }
}
