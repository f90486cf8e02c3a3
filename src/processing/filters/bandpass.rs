use serde::{Deserialize, Serialize};
use tracing::debug;

use super::butterworth;
use crate::error::ConfigError;
use crate::processing::messages::{FilteredSample, Sample};
use crate::processing::{RingBuffer, Stage};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct BandPassConfig {
    pub low_cutoff: f64,
    pub high_cutoff: f64,
    /// Taken from the processor section when loaded from a config file.
    #[serde(skip)]
    pub sample_rate: f64,
    pub order: usize,
    /// Index into `Sample::values` holding the ECG lead.
    pub channel: usize,
    /// Multiply raw values by 1000 before filtering (µV/mV conversion).
    pub convert_microvolts: bool,
}

impl Default for BandPassConfig {
    fn default() -> Self {
        Self {
            low_cutoff: 0.1,
            high_cutoff: 15.0,
            sample_rate: 100.0,
            order: 1,
            channel: 0,
            convert_microvolts: false,
        }
    }
}

/// Online Butterworth band-pass over one channel of the raw stream.
pub struct BandPassFilter {
    config: BandPassConfig,
    b: Vec<f64>,
    a: Vec<f64>,
    // Newest-first histories of raw inputs and filtered outputs.
    xs: RingBuffer,
    ys: RingBuffer,
    invalid_samples: u64,
}

impl BandPassFilter {
    pub fn new(config: BandPassConfig) -> Result<Self, ConfigError> {
        let (b, a) = butterworth::bandpass(
            config.order,
            config.low_cutoff,
            config.high_cutoff,
            config.sample_rate,
        )?;
        debug!(
            low = config.low_cutoff,
            high = config.high_cutoff,
            order = config.order,
            ?b,
            ?a,
            "designed band-pass filter"
        );

        let xs = RingBuffer::new(b.len(), 0.0);
        let ys = RingBuffer::new(a.len() - 1, 0.0);
        Ok(Self {
            config,
            b,
            a,
            xs,
            ys,
            invalid_samples: 0,
        })
    }

    pub fn config(&self) -> &BandPassConfig {
        &self.config
    }

    /// Feed-forward and feedback coefficients.
    pub fn coefficients(&self) -> (&[f64], &[f64]) {
        (&self.b, &self.a)
    }

    /// Number of samples replaced by the last valid raw value so far.
    pub fn invalid_samples(&self) -> u64 {
        self.invalid_samples
    }

    /// Filters one raw value and updates the internal histories.
    pub fn filter_sample(&mut self, raw: Option<f64>) -> f64 {
        let x = match raw {
            Some(value) if value.is_finite() => {
                if self.config.convert_microvolts {
                    value * 1e3
                } else {
                    value
                }
            }
            // Hold the last good (already scaled) input.
            _ => {
                self.invalid_samples += 1;
                self.xs.latest(0).unwrap_or(0.0)
            }
        };

        self.xs.push(x);
        let feed_forward: f64 = self
            .b
            .iter()
            .zip(self.xs.iter_latest())
            .map(|(b, x)| b * x)
            .sum();
        let feedback: f64 = self.a[1..]
            .iter()
            .zip(self.ys.iter_latest())
            .map(|(a, y)| a * y)
            .sum();
        let y = (feed_forward - feedback) / self.a[0];
        self.ys.push(y);
        y
    }
}

impl Stage for BandPassFilter {
    type Input = Sample;
    type Output = FilteredSample;

    fn name(&self) -> &'static str {
        "filter"
    }

    fn process(&mut self, sample: Sample) -> FilteredSample {
        let raw = sample.values.get(self.config.channel).copied();
        FilteredSample {
            timestamp: sample.timestamp,
            value: self.filter_sample(raw),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> BandPassFilter {
        BandPassFilter::new(BandPassConfig::default()).unwrap()
    }

    fn run(filter: &mut BandPassFilter, input: &[f64]) -> Vec<f64> {
        input
            .iter()
            .enumerate()
            .map(|(i, &x)| filter.process(Sample::single(i as f64 / 100.0, x)).value)
            .collect()
    }

    #[test]
    fn impulse_response_matches_reference() {
        let mut impulse = vec![0.0; 10];
        impulse[0] = 1.0;
        let output = run(&mut filter(), &impulse);
        let expected = [
            0.3358017419484296,
            0.4446520489734561,
            0.14270837478960113,
            0.04294518397115166,
            0.010000954300208836,
            -0.0008602800292621844,
            -0.0044234187922384234,
            -0.005574759299871816,
            -0.0059291850679027485,
            -0.006020401919018136,
        ];
        for (y, e) in output.iter().zip(expected.iter()) {
            assert!((y - e).abs() < 1e-12, "{} != {}", y, e);
        }
    }

    #[test]
    fn zero_input_stays_zero() {
        let output = run(&mut filter(), &[0.0; 200]);
        assert!(output.iter().all(|&y| y == 0.0));
    }

    #[test]
    fn output_decays_back_to_zero_after_transient() {
        let mut input = vec![0.0; 3000];
        input[..50].iter_mut().for_each(|x| *x = 1.0);
        let output = run(&mut filter(), &input);
        assert!(output[2999].abs() < 1e-6);
    }

    #[test]
    fn output_is_causal() {
        let mut a: Vec<f64> = (0..100).map(|i| (i as f64 * 0.37).sin()).collect();
        let mut b = a.clone();
        // Diverge only from sample 60 onward.
        a[60..].iter_mut().for_each(|x| *x += 5.0);
        b[60..].iter_mut().for_each(|x| *x -= 5.0);
        let ya = run(&mut filter(), &a);
        let yb = run(&mut filter(), &b);
        assert_eq!(ya[..60], yb[..60]);
        assert_ne!(ya[60], yb[60]);
    }

    #[test]
    fn non_finite_values_hold_last_good_sample() {
        let mut held = filter();
        let mut reference = filter();
        let with_gaps = [0.5, 1.0, f64::NAN, f64::INFINITY, 2.0];
        let repeated = [0.5, 1.0, 1.0, 1.0, 2.0];
        let y_held = run(&mut held, &with_gaps);
        let y_ref = run(&mut reference, &repeated);
        assert_eq!(y_held, y_ref);
        assert!(y_held.iter().all(|y| y.is_finite()));
        assert_eq!(held.invalid_samples(), 2);
    }

    #[test]
    fn missing_channel_is_an_invalid_sample() {
        let mut filter = BandPassFilter::new(BandPassConfig {
            channel: 2,
            ..Default::default()
        })
        .unwrap();
        let first = filter.process(Sample::new(0.0, vec![0.0, 0.0, 1.0])).value;
        let second = filter.process(Sample::new(0.01, vec![0.0])).value;
        assert!(first > 0.0);
        assert!(second.is_finite());
        assert_eq!(filter.invalid_samples(), 1);
    }

    #[test]
    fn converts_microvolts_before_filtering() {
        let mut scaled = BandPassFilter::new(BandPassConfig {
            convert_microvolts: true,
            ..Default::default()
        })
        .unwrap();
        let y = scaled.process(Sample::single(0.0, 1.0)).value;
        assert!((y - 335.8017419484296).abs() < 1e-9);
        // A held value is not scaled a second time.
        let held = scaled.process(Sample::single(0.01, f64::NAN)).value;
        let mut reference = filter();
        run(&mut reference, &[1000.0]);
        let expected = reference.process(Sample::single(0.01, 1000.0)).value;
        assert!((held - expected).abs() < 1e-9);
    }

    #[test]
    fn timestamps_pass_through() {
        let mut filter = filter();
        let out = filter.process(Sample::single(12.345, 0.2));
        assert_eq!(out.timestamp, 12.345);
    }
}
