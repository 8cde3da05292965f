//! astra - command line entry point
//!
//! Modes are chosen at runtime by subcommand:
//! - `train`: enroll everyone under the faces directory and save the model
//! - `recognize`: read one frame and report who is in it
//! - `capture`: read one frame, annotate a match and show it
//! - `watch`: annotate and show frames until Ctrl-C
//! - `index`: list the label index built from the faces directory

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};

use crate::config::AstraConfig;
use crate::detect::build_detector;
use crate::display::{DisplaySink, FileSink, NullSink};
use crate::index::LabelIndex;
use crate::recognize::Decision;
use crate::session::{RecognitionSession, StopReason, Tick};
use crate::training::enroll;

const BUILD_NOTES: &str = "\
Capture backends are chosen at build time:
  /dev/videoN cameras need the ingest-v4l2 feature
  video footage (mp4, webm, ...) needs the ingest-file-ffmpeg feature
Without them only stub:// cameras and still-image footage are available.
Build with: cargo install astra-face --features ingest-v4l2,ingest-file-ffmpeg";

#[derive(Parser, Debug)]
#[command(
    name = "astra",
    version,
    about = "Webcam face recognition",
    after_long_help = BUILD_NOTES
)]
struct Args {
    #[command(flatten)]
    overrides: Overrides,
    #[command(subcommand)]
    command: Command,
}

/// Command line overrides; these win over ASTRA_CONFIG and ASTRA_* variables.
#[derive(clap::Args, Debug, Default)]
struct Overrides {
    /// Directory with one subdirectory of footage per person
    #[arg(long, global = true)]
    faces_dir: Option<PathBuf>,
    /// Detector backend ("rustface" or "stub")
    #[arg(long, global = true)]
    detector: Option<String>,
    #[arg(long, global = true)]
    detector_model: Option<PathBuf>,
    /// Recognizer model file
    #[arg(long, global = true)]
    model: Option<PathBuf>,
    /// Camera device path or stub://name
    #[arg(long, global = true)]
    camera: Option<String>,
    #[arg(long, global = true)]
    threshold: Option<f64>,
    /// Image file that receives displayed frames
    #[arg(long, global = true)]
    display: Option<PathBuf>,
}

impl Overrides {
    fn apply(self, config: &mut AstraConfig) {
        if let Some(dir) = self.faces_dir {
            config.faces_dir = dir;
        }
        if let Some(backend) = self.detector {
            config.detector.backend = backend;
        }
        if let Some(model) = self.detector_model {
            config.detector.model_path = model;
        }
        if let Some(model) = self.model {
            config.recognizer_model = model;
        }
        if let Some(device) = self.camera {
            config.camera.device = device;
        }
        if let Some(threshold) = self.threshold {
            config.confidence_threshold = threshold;
        }
        if let Some(path) = self.display {
            config.display.path = Some(path);
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Train the recognizer from the faces directory and save it
    Train,

    /// Recognize the person in front of the camera (one frame)
    Recognize,

    /// Capture one frame, annotate a match, and display it
    Capture,

    /// Annotate and display frames until Ctrl-C
    Watch {
        #[arg(long)]
        max_frames: Option<u64>,
    },

    /// Print the label index for the faces directory
    Index,
}

pub fn run() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = AstraConfig::load()?;
    args.overrides.apply(&mut config);
    config.validate()?;

    execute(args.command, &config)
}

fn execute(command: Command, config: &AstraConfig) -> Result<()> {
    match command {
        Command::Train => cmd_train(config),
        Command::Recognize => cmd_recognize(config),
        Command::Capture => cmd_capture(config),
        Command::Watch { max_frames } => cmd_watch(config, max_frames.or(config.max_frames)),
        Command::Index => cmd_index(config),
    }
}

fn cmd_train(config: &AstraConfig) -> Result<()> {
    let mut detector = build_detector(&config.detector).context("failed to build detector")?;
    let (index, model) = enroll(&config.faces_dir, &mut *detector, config.lbph)
        .with_context(|| format!("training from {} failed", config.faces_dir.display()))?;

    println!("Trained {} faces across {} people", model.len(), index.len());
    for (label, name) in index.iter() {
        println!("  {:>3}  {}", label, name);
    }

    model.save(&config.recognizer_model).with_context(|| {
        format!(
            "trained model could not be saved to {}",
            config.recognizer_model.display()
        )
    })?;
    println!("Model written to {}", config.recognizer_model.display());
    Ok(())
}

fn cmd_recognize(config: &AstraConfig) -> Result<()> {
    let mut session = RecognitionSession::load(config)?;
    let mut sink = open_sink(config)?;
    match session.recognize(&mut *sink)? {
        Some(identity) => println!("{} ({:.4})", identity.name, identity.confidence),
        None => println!("no confident match"),
    }
    session.close();
    Ok(())
}

fn cmd_capture(config: &AstraConfig) -> Result<()> {
    let mut session = RecognitionSession::load(config)?;
    let mut sink = open_sink(config)?;
    match session.capture_frame(&mut *sink)? {
        Tick::NoFrame => println!("camera returned an empty frame"),
        Tick::Decided { decision, .. } => match decision {
            Decision::NoDetection => println!("no face detected"),
            Decision::NoConfidentMatch { confidence, .. } => {
                println!("no confident match ({:.4})", confidence)
            }
            Decision::Identified(identity) => {
                println!("{} ({:.4})", identity.name, identity.confidence)
            }
        },
    }
    session.close();
    Ok(())
}

fn cmd_watch(config: &AstraConfig, max_frames: Option<u64>) -> Result<()> {
    let mut session = RecognitionSession::load(config)?;
    let mut sink = open_sink(config)?;

    let stop = Arc::new(AtomicBool::new(false));
    let handler_stop = Arc::clone(&stop);
    ctrlc::set_handler(move || {
        handler_stop.store(true, Ordering::SeqCst);
    })
    .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;

    log::info!("watching {} (Ctrl-C to stop)", config.camera.device);
    let summary = session.run_capture_loop(&mut *sink, &stop, max_frames)?;
    session.close();

    println!(
        "{} frames, {} identified, {} empty reads, {} failed",
        summary.frames, summary.identified, summary.empty_reads, summary.failed
    );
    if summary.stop_reason == StopReason::CameraUnavailable {
        return Err(anyhow!("camera {} unavailable", config.camera.device));
    }
    Ok(())
}

fn cmd_index(config: &AstraConfig) -> Result<()> {
    let index = LabelIndex::build(&config.faces_dir)
        .with_context(|| format!("failed to index {}", config.faces_dir.display()))?;
    for (label, name) in index.iter() {
        println!("{:>3}  {}", label, name);
    }
    println!("fingerprint: {}", index.fingerprint());
    Ok(())
}

fn open_sink(config: &AstraConfig) -> Result<Box<dyn DisplaySink>> {
    let surface = (config.display.width, config.display.height);
    match &config.display.path {
        Some(path) => {
            let sink = FileSink::new(path, surface)
                .with_context(|| format!("failed to open display file {}", path.display()))?;
            log::info!("display frames written to {}", sink.path().display());
            Ok(Box::new(sink))
        }
        None => Ok(Box::new(NullSink::new(surface))),
    }
}
