use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::EnvFilter;

use cardiac_phase_lock::config::{load_config, Config};
use cardiac_phase_lock::error::PipelineError;
use cardiac_phase_lock::local::console::ConsoleSink;
use cardiac_phase_lock::local::process_file;
use cardiac_phase_lock::recording::SessionRecorder;
use cardiac_phase_lock::sinks::{DiscardSink, StimulusSink};
use cardiac_phase_lock::sources::{EcgSimulator, EcgSimulatorConfig};
use cardiac_phase_lock::{ExperimentEvent, Pipeline, SyncSide};

#[derive(Parser, Debug)]
#[command(name = "cardiac-phase-lock")]
#[command(about = "Heartbeat detection driving cardiac phase-locked stimuli")]
#[command(version)]
struct Cli {
    /// YAML session config; defaults are used when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a synthetic ECG through the threaded pipeline
    Simulate {
        /// Seconds of signal to generate
        #[arg(long, default_value_t = 10.0)]
        duration: f64,

        /// Beats per minute
        #[arg(long, default_value_t = 60.0)]
        heart_rate: f64,

        /// Half-width of uniform additive noise, in mV
        #[arg(long, default_value_t = 0.0)]
        noise: f64,

        /// Seed for noise and the sync side draw
        #[arg(long)]
        seed: Option<u64>,

        /// Which stimulus carries the synchronous phase (left or right)
        #[arg(long)]
        sync_side: Option<SyncSide>,

        /// Pace the simulator to the wall clock
        #[arg(long)]
        realtime: bool,

        /// Draw stimulus bars in the terminal
        #[arg(long)]
        display: bool,

        /// Persist every link to a session directory
        #[arg(long)]
        record: bool,
    },
    /// Replay a raw CSV recording and write per-sample results
    ProcessFile {
        input: PathBuf,

        #[arg(short, long, default_value = "processed.csv")]
        output: PathBuf,
    },
    /// Print the default config as YAML
    DefaultConfig,
}

fn main() -> Result<(), PipelineError> {
    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => Config::default(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Command::Simulate {
            duration,
            heart_rate,
            noise,
            seed,
            sync_side,
            realtime,
            display,
            record,
        } => {
            let mut rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            config.controller.sync_side = sync_side.unwrap_or_else(|| SyncSide::random(&mut rng));

            let source = EcgSimulator::new(EcgSimulatorConfig {
                sample_rate: config.processor.sample_rate * config.processor.downsampling as f64,
                heart_rate,
                duration: Some(duration),
                noise,
                seed,
                realtime,
                ..Default::default()
            })?;
            let sink: Box<dyn StimulusSink + Send> = if display {
                Box::new(ConsoleSink::stdout(10))
            } else {
                Box::new(DiscardSink)
            };
            let recorder = if record || config.logging.record {
                Some(SessionRecorder::create(&config.logging.output_directory)?)
            } else {
                None
            };

            let started = Instant::now();
            let handle = Pipeline::spawn(&config, source, sink, recorder)?;
            let marker = |key: &str| ExperimentEvent {
                timestamp: started.elapsed().as_secs_f64(),
                key: key.to_string(),
                key_timestamp: started.elapsed().as_secs_f64(),
                sync_side: config.controller.sync_side,
            };
            handle.record_event(marker("start"));
            if realtime {
                std::thread::sleep(Duration::from_secs_f64(duration.max(0.0)));
            }
            handle.record_event(marker("end"));
            let report = handle.join()?;
            info!(
                sync_side = config.controller.sync_side.as_str(),
                ?report,
                "simulation finished"
            );
        }
        Command::ProcessFile { input, output } => {
            let summary = process_file::run(&config, &input, &output)?;
            println!(
                "{} samples, {} beats, {} invalid samples -> {}",
                summary.samples,
                summary.beats,
                summary.invalid_samples,
                output.display()
            );
        }
        Command::DefaultConfig => {
            let yaml = serde_yaml::to_string(&Config::default())
                .map_err(cardiac_phase_lock::error::ConfigError::from)?;
            print!("{}", yaml);
        }
    }
    Ok(())
}
