use crate::config::{load_config, Config};
use crate::processing::controllers::AsyncCenterPolicy;
use crate::processing::messages::{Sample, SampleResult, SyncSide};
use crate::processing::signal_processor::SignalProcessor;

use std::collections::HashMap;

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

fn to_map(result: &SampleResult) -> HashMap<String, f64> {
    HashMap::from([
        ("timestamp".to_string(), result.raw.timestamp),
        ("filtered".to_string(), result.filtered.value),
        ("elapsed".to_string(), result.phase.elapsed),
        ("synchronous".to_string(), result.stimulus.synchronous),
        ("asynchronous".to_string(), result.stimulus.asynchronous),
        ("left".to_string(), result.stimulus.left()),
        ("right".to_string(), result.stimulus.right()),
    ])
}

#[pyclass]
pub struct PySignalProcessor {
    processor: SignalProcessor,
}

#[pymethods]
impl PySignalProcessor {
    #[new]
    #[pyo3(signature = (
        sample_rate = 100.0,
        low_cutoff = 0.1,
        high_cutoff = 15.0,
        channel = 0,
        systole_phase_offset = 0.210,
        async_delay = None,
        sync_side = "left".to_string(),
        verbose = false
    ))]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sample_rate: f64,
        low_cutoff: f64,
        high_cutoff: f64,
        channel: usize,
        systole_phase_offset: f64,
        async_delay: Option<f64>,
        sync_side: String,
        verbose: bool,
    ) -> PyResult<Self> {
        let mut config = Config::default();
        config.processor.sample_rate = sample_rate;
        config.processor.verbose = verbose;
        config.filter.low_cutoff = low_cutoff;
        config.filter.high_cutoff = high_cutoff;
        config.filter.channel = channel;
        config.controller.systole_phase_offset = systole_phase_offset;
        if let Some(delay) = async_delay {
            config.controller.async_center = AsyncCenterPolicy::FixedOffset { delay };
        }
        config.controller.sync_side = sync_side
            .parse::<SyncSide>()
            .map_err(PyValueError::new_err)?;
        Self::with_config(&config)
    }

    /// Builds a processor from a YAML session config.
    #[staticmethod]
    pub fn from_config_file(path: String) -> PyResult<Self> {
        let config = load_config(path).map_err(|e| PyValueError::new_err(e.to_string()))?;
        Self::with_config(&config)
    }

    pub fn reset_index(&mut self) {
        self.processor.index = 0;
    }

    pub fn process_sample(&mut self, timestamp: f64, values: Vec<f64>) -> HashMap<String, f64> {
        to_map(&self.processor.process_sample(Sample::new(timestamp, values)))
    }

    pub fn run_chunk(
        &mut self,
        timestamps: Vec<f64>,
        values: Vec<Vec<f64>>,
    ) -> PyResult<Vec<HashMap<String, f64>>> {
        if timestamps.len() != values.len() {
            return Err(PyValueError::new_err(
                "timestamps and values must have the same length",
            ));
        }
        let samples = timestamps
            .into_iter()
            .zip(values)
            .map(|(timestamp, values)| Sample::new(timestamp, values))
            .collect();
        Ok(self.processor.run_chunk(samples).iter().map(to_map).collect())
    }
}

impl PySignalProcessor {
    fn with_config(config: &Config) -> PyResult<Self> {
        let processor =
            SignalProcessor::new(config).map_err(|e| PyValueError::new_err(e.to_string()))?;
        Ok(Self { processor })
    }
}

/// A Python module implemented in Rust.
#[pymodule]
pub fn cardiac_phase_lock(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PySignalProcessor>()?;
    Ok(())
}
