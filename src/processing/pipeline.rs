use crossbeam_channel::{
    bounded, unbounded, Receiver, RecvTimeoutError, Sender, TrySendError,
};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::controllers::PhaseController;
use super::detectors::QrsDetector;
use super::filters::BandPassFilter;
use super::messages::{ExperimentEvent, Sample, StimulusState};
use super::Stage;
use crate::config::Config;
use crate::error::{PipelineError, RecordError, SinkError, SourceError};
use crate::recording::{Record, SessionRecorder};
use crate::sinks::StimulusSink;
use crate::sources::{Downsampler, SampleSource};

/// What the source does when the first link is full.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Wait for the filter stage to catch up.
    #[default]
    Block,
    /// Discard the newly acquired sample; queued samples keep their order.
    DropNewest,
}

/// Per-stage message counts after the pipeline has stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PipelineReport {
    pub acquired: u64,
    pub dropped: u64,
    pub filtered: u64,
    pub detected: u64,
    pub controlled: u64,
    pub presented: u64,
    pub recorded: Option<u64>,
}

#[derive(Debug, Clone, Copy)]
struct SourceReport {
    acquired: u64,
    dropped: u64,
}

// PIPELINE COMPONENT ----------------------------------------------------------

/// Source, filter, detector, controller and sink, each on its own thread.
///
/// Stages are connected by bounded FIFO channels. Every stage stops pulling
/// input once the shutdown flag is set or its upstream disconnects, after
/// finishing the message in hand.
pub struct Pipeline;

impl Pipeline {
    pub fn spawn<S, K>(
        config: &Config,
        source: S,
        sink: K,
        recorder: Option<SessionRecorder>,
    ) -> Result<PipelineHandle, PipelineError>
    where
        S: SampleSource + Send + 'static,
        K: StimulusSink + Send + 'static,
    {
        config.validate()?;
        let filter = BandPassFilter::new(config.bandpass())?;
        let detector = QrsDetector::new(config.qrs())?;
        let controller = PhaseController::new(config.phase())?;
        let source = Downsampler::new(source, config.processor.downsampling)?;

        let capacity = config.pipeline.channel_capacity;
        let poll = Duration::from_millis(config.pipeline.poll_interval_ms);
        let overflow = config.pipeline.overflow;
        let shutdown = Arc::new(AtomicBool::new(false));

        let (raw_tx, raw_rx) = bounded::<Sample>(capacity);
        let (filtered_tx, filtered_rx) = bounded(capacity);
        let (phase_tx, phase_rx) = bounded(capacity);
        let (stimulus_tx, stimulus_rx) = bounded::<StimulusState>(capacity);

        // Unbounded so that recording never holds up a stage.
        let (tap, recorder_thread) = match recorder {
            Some(recorder) => {
                let (tap_tx, tap_rx) = unbounded();
                let handle = thread::Builder::new()
                    .name("recorder".to_string())
                    .spawn(move || run_recorder(recorder, tap_rx))
                    .map_err(PipelineError::Spawn)?;
                (Some(tap_tx), Some(handle))
            }
            None => (None, None),
        };

        let source_thread = {
            let tap = tap.clone();
            let shutdown = Arc::clone(&shutdown);
            thread::Builder::new()
                .name("source".to_string())
                .spawn(move || run_source(source, raw_tx, tap, shutdown, overflow))
                .map_err(PipelineError::Spawn)?
        };
        let filter_thread = spawn_stage(filter, raw_rx, filtered_tx, tap.clone(), &shutdown, poll)?;
        let detector_thread =
            spawn_stage(detector, filtered_rx, phase_tx, tap.clone(), &shutdown, poll)?;
        let controller_thread =
            spawn_stage(controller, phase_rx, stimulus_tx, tap.clone(), &shutdown, poll)?;
        let sink_thread = {
            let shutdown = Arc::clone(&shutdown);
            thread::Builder::new()
                .name("sink".to_string())
                .spawn(move || run_sink(sink, stimulus_rx, shutdown, poll))
                .map_err(PipelineError::Spawn)?
        };

        info!(capacity, ?overflow, recording = tap.is_some(), "pipeline started");
        Ok(PipelineHandle {
            shutdown,
            events: tap,
            source: source_thread,
            filter: filter_thread,
            detector: detector_thread,
            controller: controller_thread,
            sink: sink_thread,
            recorder: recorder_thread,
        })
    }
}

/// Running pipeline threads.
pub struct PipelineHandle {
    shutdown: Arc<AtomicBool>,
    events: Option<Sender<Record>>,
    source: JoinHandle<Result<SourceReport, SourceError>>,
    filter: JoinHandle<u64>,
    detector: JoinHandle<u64>,
    controller: JoinHandle<u64>,
    sink: JoinHandle<Result<u64, SinkError>>,
    recorder: Option<JoinHandle<Result<u64, RecordError>>>,
}

impl PipelineHandle {
    /// Asks every stage to stop pulling new input.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Logs an experiment marker next to the sample streams.
    ///
    /// Returns false when the session is not being recorded.
    pub fn record_event(&self, event: ExperimentEvent) -> bool {
        match &self.events {
            Some(tap) => tap.send(Record::Event(event)).is_ok(),
            None => false,
        }
    }

    /// Waits for every thread and reports the first failure, if any.
    pub fn join(self) -> Result<PipelineReport, PipelineError> {
        let PipelineHandle {
            events,
            source,
            filter,
            detector,
            controller,
            sink,
            recorder,
            ..
        } = self;
        // The recorder ends once every tap, including this one, is gone.
        drop(events);

        let source = join_thread(source, "source");
        let filtered = join_thread(filter, "filter");
        let detected = join_thread(detector, "detector");
        let controlled = join_thread(controller, "controller");
        let presented = join_thread(sink, "sink");
        let recorded = recorder.map(|handle| join_thread(handle, "recorder"));

        let source = source??;
        let report = PipelineReport {
            acquired: source.acquired,
            dropped: source.dropped,
            filtered: filtered?,
            detected: detected?,
            controlled: controlled?,
            presented: presented??,
            recorded: recorded.transpose()?.transpose()?,
        };
        info!(?report, "pipeline stopped");
        Ok(report)
    }
}

fn join_thread<T>(handle: JoinHandle<T>, name: &'static str) -> Result<T, PipelineError> {
    handle.join().map_err(|_| PipelineError::StageFailed(name))
}

// STAGE THREADS ---------------------------------------------------------------

fn run_source<S: SampleSource>(
    mut source: S,
    output: Sender<Sample>,
    tap: Option<Sender<Record>>,
    shutdown: Arc<AtomicBool>,
    overflow: OverflowPolicy,
) -> Result<SourceReport, SourceError> {
    let mut report = SourceReport {
        acquired: 0,
        dropped: 0,
    };
    while !shutdown.load(Ordering::SeqCst) {
        let Some(sample) = source.next_sample()? else {
            debug!("source exhausted");
            break;
        };
        report.acquired += 1;

        let admitted = match overflow {
            OverflowPolicy::Block => match output.send(sample.clone()) {
                Ok(()) => true,
                Err(_) => break,
            },
            OverflowPolicy::DropNewest => match output.try_send(sample.clone()) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    report.dropped += 1;
                    warn!(
                        timestamp = sample.timestamp,
                        dropped = report.dropped,
                        "filter stage is behind, dropping sample"
                    );
                    false
                }
                Err(TrySendError::Disconnected(_)) => break,
            },
        };
        if admitted {
            if let Some(tap) = &tap {
                let _ = tap.send(Record::Raw(sample));
            }
        }
    }
    Ok(report)
}

fn spawn_stage<T>(
    stage: T,
    input: Receiver<T::Input>,
    output: Sender<T::Output>,
    tap: Option<Sender<Record>>,
    shutdown: &Arc<AtomicBool>,
    poll: Duration,
) -> Result<JoinHandle<u64>, PipelineError>
where
    T: Stage + 'static,
    T::Input: Send + 'static,
    T::Output: Clone + Into<Record> + Send + 'static,
{
    let shutdown = Arc::clone(shutdown);
    thread::Builder::new()
        .name(stage.name().to_string())
        .spawn(move || run_stage(stage, input, output, tap, shutdown, poll))
        .map_err(PipelineError::Spawn)
}

fn run_stage<T>(
    mut stage: T,
    input: Receiver<T::Input>,
    output: Sender<T::Output>,
    tap: Option<Sender<Record>>,
    shutdown: Arc<AtomicBool>,
    poll: Duration,
) -> u64
where
    T: Stage,
    T::Output: Clone + Into<Record>,
{
    let mut processed = 0;
    while !shutdown.load(Ordering::SeqCst) {
        let message = match input.recv_timeout(poll) {
            Ok(message) => message,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };
        let result = stage.process(message);
        processed += 1;
        if let Some(tap) = &tap {
            let _ = tap.send(result.clone().into());
        }
        if output.send(result).is_err() {
            break;
        }
    }
    debug!(stage = stage.name(), processed, "stage stopped");
    processed
}

fn run_sink<K: StimulusSink>(
    mut sink: K,
    input: Receiver<StimulusState>,
    shutdown: Arc<AtomicBool>,
    poll: Duration,
) -> Result<u64, SinkError> {
    let mut presented = 0;
    while !shutdown.load(Ordering::SeqCst) {
        let state = match input.recv_timeout(poll) {
            Ok(state) => state,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };
        sink.present(&state)?;
        presented += 1;
    }
    sink.finish()?;
    Ok(presented)
}

fn run_recorder(
    mut recorder: SessionRecorder,
    records: Receiver<Record>,
) -> Result<u64, RecordError> {
    for record in records.iter() {
        recorder.record(&record)?;
    }
    recorder.flush()?;
    info!(
        directory = %recorder.directory().display(),
        rows = recorder.rows(),
        "session log written"
    );
    Ok(recorder.rows())
}
