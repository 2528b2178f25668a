use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};

use crate::capture::domain::frame_source::{DetectedFrame, FrameSource, FrameSourceError};
use crate::classification::domain::region_classifier::{ClassifierError, RegionClassifier};
use crate::pipeline::detection_reconciler::{
    ClassificationCompletion, ClassificationRequest, CompletionOutcome, DetectionReconciler,
};
use crate::pipeline::face_cropper::FaceCropper;
use crate::pipeline::pipeline_executor::{
    PipelineConfig, PipelineError, PipelineExecutor, PipelineReport,
};
use crate::pipeline::pipeline_logger::{PipelineLogger, STALE_RESULT_METRIC};
use crate::pipeline::snapshot::{FeedStatus, SnapshotSink};
use crate::shared::region::RegionKey;

/// How often the coordinator wakes up to check for cancellation when idle.
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(50);

type FrameMessage = Result<DetectedFrame, FrameSourceError>;

/// Runs the pipeline with a capture thread, a pool of classifier workers and
/// the calling thread as coordinator.
///
/// Layout: `capture → coordinator [reconciler] ⇄ classifier workers`
///
/// The coordinator is the only owner of the reconciler, so store updates,
/// prunes and snapshots are serialized without locks. It never waits on
/// classification before taking the next frame. Each key has at most one
/// request outstanding; crops for a key that is still being classified are
/// skipped, so a slow classifier bounds the queue at one request per face.
pub struct ThreadedPipelineExecutor;

impl ThreadedPipelineExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ThreadedPipelineExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineExecutor for ThreadedPipelineExecutor {
    fn execute(
        &self,
        source: Box<dyn FrameSource>,
        classifier: Arc<dyn RegionClassifier>,
        sink: &mut dyn SnapshotSink,
        logger: &mut dyn PipelineLogger,
        config: PipelineConfig,
    ) -> Result<PipelineReport, PipelineError> {
        config.validate()?;

        let (frame_tx, frame_rx) =
            crossbeam_channel::bounded::<FrameMessage>(config.frame_channel_capacity);
        let (request_tx, request_rx) = crossbeam_channel::unbounded::<ClassificationRequest>();
        let (completion_tx, completion_rx) =
            crossbeam_channel::unbounded::<ClassificationCompletion>();

        let capture_handle = spawn_capture(
            source,
            frame_tx,
            config.cancelled.clone(),
            config.unavailable_backoff,
        );
        let worker_handles: Vec<JoinHandle<()>> = (0..config.classifier_workers)
            .map(|_| {
                spawn_classifier_worker(
                    classifier.clone(),
                    request_rx.clone(),
                    completion_tx.clone(),
                    config.cancelled.clone(),
                )
            })
            .collect();
        drop(request_rx);
        drop(completion_tx);

        logger.info(&format!(
            "Pipeline started with {} classifier workers",
            config.classifier_workers
        ));

        let reconciler = DetectionReconciler::new(
            FaceCropper::new(config.crop_padding),
            config.identity.build(),
        );
        let report = run_coordinator(
            reconciler,
            frame_rx,
            completion_rx,
            request_tx,
            sink,
            logger,
            &config,
        );

        logger.info(&format!(
            "Pipeline stopped after {} frames ({} dropped, {} unavailable)",
            report.frames_processed, report.frames_dropped, report.frames_unavailable
        ));

        join_threads(capture_handle, worker_handles)?;
        Ok(report)
    }
}

fn spawn_capture(
    mut source: Box<dyn FrameSource>,
    frame_tx: Sender<FrameMessage>,
    cancelled: Arc<AtomicBool>,
    backoff: Duration,
) -> JoinHandle<()> {
    thread::spawn(move || {
        while let Some(result) = source.next_frame() {
            if cancelled.load(Ordering::Relaxed) {
                break;
            }
            let interrupted = result.is_err();
            if frame_tx.send(result).is_err() {
                break;
            }
            if interrupted && !backoff.is_zero() {
                thread::sleep(backoff);
            }
        }
    })
}

fn spawn_classifier_worker(
    classifier: Arc<dyn RegionClassifier>,
    request_rx: Receiver<ClassificationRequest>,
    completion_tx: Sender<ClassificationCompletion>,
    cancelled: Arc<AtomicBool>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        for request in request_rx {
            if cancelled.load(Ordering::Relaxed) {
                break;
            }
            // A panicking model must still answer, or the coordinator would
            // wait on the request forever.
            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                classifier.classify(&request.face)
            }))
            .unwrap_or_else(|_| Err(ClassifierError::Inference("classifier panicked".into())));

            let completion = ClassificationCompletion::for_request(&request, result);
            if completion_tx.send(completion).is_err() {
                break;
            }
        }
    })
}

/// Coordinator loop: reconcile frames and completions until the source is
/// exhausted and every issued request has been answered, or until cancelled.
fn run_coordinator(
    mut reconciler: DetectionReconciler,
    frame_rx: Receiver<FrameMessage>,
    completion_rx: Receiver<ClassificationCompletion>,
    request_tx: Sender<ClassificationRequest>,
    sink: &mut dyn SnapshotSink,
    logger: &mut dyn PipelineLogger,
    config: &PipelineConfig,
) -> PipelineReport {
    let mut report = PipelineReport::default();
    let mut pending: HashSet<RegionKey> = HashSet::new();
    let mut frames_open = true;
    let closed = crossbeam_channel::never::<FrameMessage>();

    loop {
        if config.cancelled.load(Ordering::Relaxed) {
            logger.info("Pipeline cancelled");
            break;
        }
        if !frames_open && pending.is_empty() {
            break;
        }

        let frames = if frames_open { &frame_rx } else { &closed };

        crossbeam_channel::select! {
            recv(frames) -> msg => match msg {
                Ok(first) => {
                    let drained = take_latest(first, &frame_rx, config.drop_stale_frames);
                    if drained.dropped_frames > 0 {
                        report.frames_dropped += drained.dropped_frames;
                        logger.metric("dropped_frames", drained.dropped_frames as f64);
                    }
                    report.frames_unavailable += drained.dropped_outages;
                    let latest = drained.latest;
                    match latest {
                        Ok(detected) => {
                            handle_frame(&mut reconciler, detected, &request_tx, &mut pending, &mut report, logger);
                        }
                        Err(e) => handle_unavailable(&mut reconciler, e, &mut report, logger),
                    }
                    sink.publish(&reconciler.snapshot());
                }
                Err(_) => {
                    log::debug!("Frame source exhausted, draining {} requests", pending.len());
                    frames_open = false;
                }
            },
            recv(completion_rx) -> msg => match msg {
                Ok(completion) => {
                    pending.remove(&completion.key);
                    if handle_completion(&mut reconciler, completion, &mut report, logger) {
                        sink.publish(&reconciler.snapshot());
                    }
                }
                Err(_) => {
                    log::warn!("All classifier workers stopped with {} requests pending", pending.len());
                    break;
                }
            },
            default(CANCEL_POLL_INTERVAL) => {}
        }
    }

    report
}

struct DrainedFrames {
    latest: FrameMessage,
    dropped_frames: usize,
    /// Interruptions overtaken by a newer message. Still counted as outages.
    dropped_outages: usize,
}

/// When stale frames are dropped, drains the channel and keeps only the newest message.
fn take_latest(
    first: FrameMessage,
    frame_rx: &Receiver<FrameMessage>,
    drop_stale: bool,
) -> DrainedFrames {
    let mut drained = DrainedFrames {
        latest: first,
        dropped_frames: 0,
        dropped_outages: 0,
    };
    if !drop_stale {
        return drained;
    }
    while let Ok(next) = frame_rx.try_recv() {
        let overtaken = std::mem::replace(&mut drained.latest, next);
        match overtaken {
            Ok(_) => drained.dropped_frames += 1,
            Err(_) => drained.dropped_outages += 1,
        }
    }
    drained
}

fn handle_frame(
    reconciler: &mut DetectionReconciler,
    detected: DetectedFrame,
    request_tx: &Sender<ClassificationRequest>,
    pending: &mut HashSet<RegionKey>,
    report: &mut PipelineReport,
    logger: &mut dyn PipelineLogger,
) {
    if reconciler.status() == FeedStatus::FrameUnavailable {
        logger.info("Frames resumed");
    }

    let region_count = detected.regions.len();
    let started = Instant::now();
    let cycle = reconciler.begin_frame(detected);
    logger.timing("crop", started.elapsed().as_secs_f64() * 1000.0);
    logger.metric("regions", region_count as f64);

    report.frames_processed += 1;
    report.crops_skipped += cycle.skipped;

    for request in cycle.requests {
        if pending.contains(&request.key) {
            report.requests_skipped += 1;
            continue;
        }
        let key = request.key;
        if request_tx.send(request).is_err() {
            log::warn!("Classifier request channel closed");
            break;
        }
        pending.insert(key);
        report.requests_issued += 1;
    }

    logger.metric("in_flight", pending.len() as f64);
    logger.progress(report.frames_processed);
}

fn handle_unavailable(
    reconciler: &mut DetectionReconciler,
    error: FrameSourceError,
    report: &mut PipelineReport,
    logger: &mut dyn PipelineLogger,
) {
    if reconciler.status() == FeedStatus::FrameUnavailable {
        log::debug!("{error}");
    } else {
        log::warn!("{error}");
        logger.info("No frame available");
    }
    report.frames_unavailable += 1;
    reconciler.mark_frame_unavailable();
}

/// Returns `true` when the store changed.
fn handle_completion(
    reconciler: &mut DetectionReconciler,
    completion: ClassificationCompletion,
    report: &mut PipelineReport,
    logger: &mut dyn PipelineLogger,
) -> bool {
    logger.timing(
        "classify",
        completion.issued_at.elapsed().as_secs_f64() * 1000.0,
    );
    let outcome = reconciler.apply_completion(completion);
    let stale = outcome == CompletionOutcome::Discarded;
    logger.metric(STALE_RESULT_METRIC, if stale { 1.0 } else { 0.0 });

    match outcome {
        CompletionOutcome::Stored => {
            report.classifications_stored += 1;
            true
        }
        CompletionOutcome::Removed => {
            report.classifications_failed += 1;
            true
        }
        CompletionOutcome::Discarded => {
            report.results_discarded += 1;
            false
        }
    }
}

/// Joins the capture thread and all workers, reporting the first panic.
fn join_threads(
    capture_handle: JoinHandle<()>,
    worker_handles: Vec<JoinHandle<()>>,
) -> Result<(), PipelineError> {
    let mut first_error = None;

    if capture_handle.join().is_err() {
        first_error = Some(PipelineError::ThreadPanicked("Capture"));
    }
    for handle in worker_handles {
        if handle.join().is_err() && first_error.is_none() {
            first_error = Some(PipelineError::ThreadPanicked("Classifier worker"));
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
