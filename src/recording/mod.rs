use chrono::Local;
use csv::Writer;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::RecordError;
use crate::processing::messages::{
    ExperimentEvent, FilteredSample, HeartbeatPhase, Sample, SampleResult, StimulusState,
};

// -----------------------------------------------------------------------------
// RECORD MESSAGES
// -----------------------------------------------------------------------------

/// Copy of one inter-stage message, as seen by the recorder tap.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Raw(Sample),
    Filtered(FilteredSample),
    Phase(HeartbeatPhase),
    Stimulus(StimulusState),
    Event(ExperimentEvent),
}

impl From<Sample> for Record {
    fn from(sample: Sample) -> Self {
        Record::Raw(sample)
    }
}

impl From<FilteredSample> for Record {
    fn from(sample: FilteredSample) -> Self {
        Record::Filtered(sample)
    }
}

impl From<HeartbeatPhase> for Record {
    fn from(phase: HeartbeatPhase) -> Self {
        Record::Phase(phase)
    }
}

impl From<StimulusState> for Record {
    fn from(state: StimulusState) -> Self {
        Record::Stimulus(state)
    }
}

impl From<ExperimentEvent> for Record {
    fn from(event: ExperimentEvent) -> Self {
        Record::Event(event)
    }
}

// SESSION RECORDER COMPONENT --------------------------------------------------

pub const RAW_FILE: &str = "ecg_raw.csv";
pub const FILTERED_FILE: &str = "ecg_filt.csv";
pub const PHASE_FILE: &str = "t_since_qrs.csv";
pub const STIMULUS_FILE: &str = "stim_size.csv";
pub const EVENTS_FILE: &str = "experiment_events.csv";

/// Appends every observed message to one CSV file per link.
///
/// The recorder only observes: nothing it does feeds back into processing.
pub struct SessionRecorder {
    directory: PathBuf,
    raw: Writer<File>,
    filtered: Writer<File>,
    phase: Writer<File>,
    stimulus: Writer<File>,
    events: Writer<File>,
    raw_channels: Option<usize>,
    rows: u64,
}

impl SessionRecorder {
    /// Creates `ecg%Y%m%d-%H%M%S` under `root` and opens the session files.
    pub fn create<P: AsRef<Path>>(root: P) -> Result<Self, RecordError> {
        let name = Local::now().format("ecg%Y%m%d-%H%M%S").to_string();
        Self::in_directory(root.as_ref().join(name))
    }

    /// Opens the session files in an explicit directory, creating it if needed.
    pub fn in_directory<P: AsRef<Path>>(directory: P) -> Result<Self, RecordError> {
        let directory = directory.as_ref().to_path_buf();
        fs::create_dir_all(&directory)?;

        let mut filtered = Writer::from_path(directory.join(FILTERED_FILE))?;
        filtered.write_record(["timestamp", "value"])?;
        let mut phase = Writer::from_path(directory.join(PHASE_FILE))?;
        phase.write_record(["timestamp", "elapsed"])?;
        let mut stimulus = Writer::from_path(directory.join(STIMULUS_FILE))?;
        stimulus.write_record(["timestamp", "synchronous", "asynchronous", "sync_side"])?;
        let mut events = Writer::from_path(directory.join(EVENTS_FILE))?;
        events.write_record(["timestamp", "key", "key_timestamp", "sync_side"])?;
        // Raw header depends on the channel count, written with the first row.
        let raw = Writer::from_path(directory.join(RAW_FILE))?;

        info!(directory = %directory.display(), "recording session");
        Ok(Self {
            directory,
            raw,
            filtered,
            phase,
            stimulus,
            events,
            raw_channels: None,
            rows: 0,
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Total number of rows written across all files.
    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn record(&mut self, record: &Record) -> Result<(), RecordError> {
        match record {
            Record::Raw(sample) => self.record_raw(sample)?,
            Record::Filtered(sample) => self
                .filtered
                .write_record(&[sample.timestamp.to_string(), sample.value.to_string()])?,
            Record::Phase(phase) => self
                .phase
                .write_record(&[phase.timestamp.to_string(), phase.elapsed.to_string()])?,
            Record::Stimulus(state) => self.stimulus.write_record(&[
                state.timestamp.to_string(),
                state.synchronous.to_string(),
                state.asynchronous.to_string(),
                state.sync_side.as_str().to_string(),
            ])?,
            Record::Event(event) => self.record_event(event)?,
        }
        self.rows += 1;
        Ok(())
    }

    /// Writes every link of one directly-composed sample.
    pub fn record_result(&mut self, result: &SampleResult) -> Result<(), RecordError> {
        self.record(&Record::Raw(result.raw.clone()))?;
        self.record(&Record::Filtered(result.filtered))?;
        self.record(&Record::Phase(result.phase))?;
        self.record(&Record::Stimulus(result.stimulus))
    }

    fn record_raw(&mut self, sample: &Sample) -> Result<(), RecordError> {
        if self.raw_channels.is_none() {
            let mut header = vec!["timestamp".to_string()];
            header.extend((0..sample.values.len()).map(|i| format!("ch{}", i)));
            self.raw.write_record(&header)?;
            self.raw_channels = Some(sample.values.len());
        }
        let mut row = Vec::with_capacity(sample.values.len() + 1);
        row.push(sample.timestamp.to_string());
        row.extend(sample.values.iter().map(|v| v.to_string()));
        // Keep the column count fixed even if a reading is short.
        if let Some(channels) = self.raw_channels {
            row.resize(channels + 1, f64::NAN.to_string());
        }
        self.raw.write_record(&row)?;
        Ok(())
    }

    fn record_event(&mut self, event: &ExperimentEvent) -> Result<(), RecordError> {
        self.events.write_record(&[
            event.timestamp.to_string(),
            event.key.clone(),
            event.key_timestamp.to_string(),
            event.sync_side.as_str().to_string(),
        ])?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), RecordError> {
        self.raw.flush()?;
        self.filtered.flush()?;
        self.phase.flush()?;
        self.stimulus.flush()?;
        self.events.flush()?;
        Ok(())
    }
}
