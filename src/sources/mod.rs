pub mod replay;
pub mod simulator;

pub use replay::CsvSource;
pub use simulator::{EcgSimulator, EcgSimulatorConfig};

use crate::error::{ConfigError, SourceError};
use crate::processing::messages::Sample;

// SOURCE COMPONENT ------------------------------------------------------------

/// Acquisition boundary feeding raw samples into the pipeline.
///
/// `Ok(None)` ends the stream. Errors are I/O failures of the source itself and
/// are reported to the caller rather than recovered inside the pipeline.
pub trait SampleSource {
    fn next_sample(&mut self) -> Result<Option<Sample>, SourceError>;
}

impl<S: SampleSource + ?Sized> SampleSource for Box<S> {
    fn next_sample(&mut self) -> Result<Option<Sample>, SourceError> {
        (**self).next_sample()
    }
}

/// Wraps any iterator of samples, mostly for replaying in-memory data.
pub struct IterSource<I> {
    samples: I,
}

impl<I: Iterator<Item = Sample>> IterSource<I> {
    pub fn new<T: IntoIterator<IntoIter = I>>(samples: T) -> Self {
        Self {
            samples: samples.into_iter(),
        }
    }
}

impl<I: Iterator<Item = Sample>> SampleSource for IterSource<I> {
    fn next_sample(&mut self) -> Result<Option<Sample>, SourceError> {
        Ok(self.samples.next())
    }
}

// DOWNSAMPLER COMPONENT -------------------------------------------------------

/// Keeps every `factor`-th sample of the wrapped source, starting with the first.
pub struct Downsampler<S> {
    source: S,
    factor: usize,
    polled: u64,
}

impl<S: SampleSource> Downsampler<S> {
    pub fn new(source: S, factor: usize) -> Result<Self, ConfigError> {
        if factor == 0 {
            return Err(ConfigError::InvalidDownsampling);
        }
        Ok(Self {
            source,
            factor,
            polled: 0,
        })
    }

    pub fn factor(&self) -> usize {
        self.factor
    }

    pub fn into_inner(self) -> S {
        self.source
    }
}

impl<S: SampleSource> SampleSource for Downsampler<S> {
    fn next_sample(&mut self) -> Result<Option<Sample>, SourceError> {
        while let Some(sample) = self.source.next_sample()? {
            let keep = self.polled % self.factor as u64 == 0;
            self.polled += 1;
            if keep {
                return Ok(Some(sample));
            }
        }
        Ok(None)
    }
}
