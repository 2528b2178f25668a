use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use maskwatch_core::capture::infrastructure::image_sequence_source::ImageSequenceSource;
use maskwatch_core::classification::domain::region_classifier::RegionClassifier;
use maskwatch_core::classification::infrastructure::onnx_mask_classifier::OnnxMaskClassifier;
use maskwatch_core::classification::infrastructure::unavailable_classifier::UnavailableClassifier;
use maskwatch_core::detection::domain::region_identity::IdentityPolicy;
use maskwatch_core::detection::infrastructure::replay_face_detector::ReplayFaceDetector;
use maskwatch_core::pipeline::infrastructure::threaded_pipeline_executor::ThreadedPipelineExecutor;
use maskwatch_core::pipeline::pipeline_executor::{PipelineConfig, PipelineExecutor};
use maskwatch_core::pipeline::pipeline_logger::{PipelineLogger, StdoutPipelineLogger};
use maskwatch_core::pipeline::snapshot::{FeedStatus, PipelineSnapshot, SnapshotSink};
use maskwatch_core::shared::constants::{CROP_PADDING_PX, DEFAULT_CLASS_LABELS, MASK_MODEL_NAME};
use maskwatch_core::shared::model_resolver;

/// Live mask detection over a stream of frames.
#[derive(Parser)]
#[command(name = "maskwatch")]
struct Cli {
    /// Directory of frames, played back in file name order.
    frames: PathBuf,

    /// JSON file with face detections per frame index.
    #[arg(long)]
    detections: PathBuf,

    /// Mask classification model (ONNX). Defaults to the user model directory.
    #[arg(long)]
    model: Option<PathBuf>,

    /// Fallback directory searched for the model.
    #[arg(long)]
    models_dir: Option<PathBuf>,

    /// Class names in model output order (comma-separated).
    #[arg(long, value_delimiter = ',')]
    labels: Option<Vec<String>>,

    /// Concurrent classification workers.
    #[arg(long, default_value = "2")]
    workers: usize,

    /// Pixels added around each face before classification.
    #[arg(long, default_value_t = CROP_PADDING_PX)]
    padding: f64,

    /// Face identity: positional or tracked.
    #[arg(long, default_value = "positional")]
    identity: IdentityPolicy,

    /// Frames a tracked face may be missing before its key is retired.
    #[arg(long)]
    max_lost: Option<usize>,

    /// Pace playback to this many frames per second.
    #[arg(long)]
    fps: Option<f64>,

    /// Process every frame even when classification falls behind.
    #[arg(long)]
    keep_stale_frames: bool,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    let detector = ReplayFaceDetector::from_json_file(&cli.detections)?;
    let mut source = ImageSequenceSource::open(&cli.frames, Box::new(detector))?;
    if let Some(fps) = cli.fps {
        source = source.with_frame_interval(Duration::from_secs_f64(1.0 / fps));
    }

    let classifier = build_classifier(&cli);
    let config = build_config(&cli);

    let mut sink = LogSnapshotSink::default();
    let mut logger = StdoutPipelineLogger::default();
    let report = ThreadedPipelineExecutor::new().execute(
        Box::new(source),
        classifier,
        &mut sink,
        &mut logger,
        config,
    )?;
    logger.summary();

    log::info!(
        "Done: {} frames, {} classified, {} skipped while busy, {} failed, {} late results discarded",
        report.frames_processed,
        report.classifications_stored,
        report.requests_skipped,
        report.classifications_failed,
        report.results_discarded
    );
    Ok(())
}

/// Loads the mask model, or keeps running without classification when it
/// cannot be found or loaded.
fn build_classifier(cli: &Cli) -> Arc<dyn RegionClassifier> {
    let labels = cli.labels.clone().unwrap_or_else(|| {
        DEFAULT_CLASS_LABELS
            .iter()
            .map(|s| s.to_string())
            .collect()
    });

    log::info!("Resolving model: {MASK_MODEL_NAME}");
    let model_path = match model_resolver::resolve(
        MASK_MODEL_NAME,
        cli.model.as_deref(),
        cli.models_dir.as_deref(),
    ) {
        Ok(path) => path,
        Err(e) => {
            log::error!("{e}; faces will be shown without mask status");
            return Arc::new(UnavailableClassifier);
        }
    };

    match OnnxMaskClassifier::new(&model_path, labels) {
        Ok(classifier) => Arc::new(classifier),
        Err(e) => {
            log::error!(
                "Failed to load {}: {e}; faces will be shown without mask status",
                model_path.display()
            );
            Arc::new(UnavailableClassifier)
        }
    }
}

fn build_config(cli: &Cli) -> PipelineConfig {
    let identity = match (cli.identity, cli.max_lost) {
        (IdentityPolicy::Tracked { .. }, Some(max_lost)) => IdentityPolicy::Tracked { max_lost },
        (policy, _) => policy,
    };
    PipelineConfig {
        crop_padding: cli.padding,
        identity,
        classifier_workers: cli.workers,
        drop_stale_frames: !cli.keep_stale_frames,
        ..PipelineConfig::default()
    }
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if !cli.frames.is_dir() {
        return Err(format!("Frames directory not found: {}", cli.frames.display()).into());
    }
    if !cli.detections.is_file() {
        return Err(format!("Detections file not found: {}", cli.detections.display()).into());
    }
    if let Some(model) = &cli.model {
        if !model.is_file() {
            return Err(format!("Model file not found: {}", model.display()).into());
        }
    }
    if cli.workers == 0 {
        return Err("Workers must be at least 1".into());
    }
    if !cli.padding.is_finite() || cli.padding < 0.0 {
        return Err(format!("Padding must be a non-negative number, got {}", cli.padding).into());
    }
    if let Some(fps) = cli.fps {
        if !fps.is_finite() || fps <= 0.0 {
            return Err(format!("FPS must be positive, got {fps}").into());
        }
    }
    if let Some(labels) = &cli.labels {
        if labels.is_empty() || labels.iter().any(|l| l.trim().is_empty()) {
            return Err("Labels must be non-empty class names".into());
        }
    }
    if cli.max_lost.is_some() && cli.identity == IdentityPolicy::Positional {
        return Err("--max-lost only applies to --identity tracked".into());
    }
    Ok(())
}

/// Stands in for a video overlay: logs each face's label whenever the
/// drawn state would change.
#[derive(Default)]
struct LogSnapshotSink {
    status: FeedStatus,
    lines: Vec<String>,
}

impl SnapshotSink for LogSnapshotSink {
    fn publish(&mut self, snapshot: &PipelineSnapshot) {
        if snapshot.status != self.status {
            match snapshot.status {
                FeedStatus::FrameUnavailable => log::warn!("No frame available"),
                FeedStatus::Live => log::info!("Feed live"),
                FeedStatus::Waiting => {}
            }
            self.status = snapshot.status;
        }

        let lines: Vec<String> = snapshot
            .overlays()
            .iter()
            .map(|overlay| match &overlay.classification {
                Some(c) => format!("{}: {} [{}]", overlay.key, c.display_text(), c.color()),
                None => format!("{}: unclassified", overlay.key),
            })
            .collect();

        if lines != self.lines {
            let frame = snapshot
                .frame_index()
                .map_or_else(|| "-".to_string(), |i| i.to_string());
            log::info!("Frame {frame}: {}", lines.join(", "));
            self.lines = lines;
        }
    }
}
