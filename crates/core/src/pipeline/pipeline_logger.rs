use std::collections::BTreeMap;
use std::time::Instant;

/// Metric recorded once per completion: 1 when the result was discarded
/// because its face had left the frame, 0 otherwise.
pub const STALE_RESULT_METRIC: &str = "stale_result";

/// Cross-cutting logger for pipeline orchestration events.
///
/// Decouples the executor from specific output mechanisms (log crate,
/// GUI status line, tests) so callers can observe the pipeline without
/// changing the orchestration code.
pub trait PipelineLogger: Send {
    /// Report that another frame cycle finished. The stream has no known length.
    fn progress(&mut self, frames_processed: usize);

    /// Record how long a named pipeline stage took.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Record a point-in-time metric (e.g. region count, requests in flight).
    fn metric(&mut self, name: &str, value: f64);

    /// Log a human-readable status message.
    fn info(&mut self, message: &str);

    /// Emit an end-of-pipeline summary. Default: no-op.
    fn summary(&self) {}
}

/// Silent logger that discards all events.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn progress(&mut self, _frames_processed: usize) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn info(&mut self, _message: &str) {}
}

/// Count, mean and extremes of a sample stream, kept in constant space.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RunningStats {
    count: usize,
    total: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn record(&mut self, value: f64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.count += 1;
        self.total += value;
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total / self.count as f64
        }
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

/// Logger for the CLI: progress every `throttle_frames` frames through the
/// `log` crate, plus running statistics per stage and metric for the
/// end-of-stream summary.
///
/// Statistics are folded as they arrive, so memory stays flat however long
/// the camera runs.
pub struct StdoutPipelineLogger {
    throttle_frames: usize,
    stages: BTreeMap<String, RunningStats>,
    metrics: BTreeMap<String, RunningStats>,
    started: Instant,
    frames: usize,
    last_message: Option<String>,
}

impl StdoutPipelineLogger {
    pub fn new(throttle_frames: usize) -> Self {
        Self {
            throttle_frames: throttle_frames.max(1),
            stages: BTreeMap::new(),
            metrics: BTreeMap::new(),
            started: Instant::now(),
            frames: 0,
            last_message: None,
        }
    }

    /// Returns the formatted summary, or `None` if nothing was recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.stages.is_empty() && self.metrics.is_empty() {
            return None;
        }

        let secs = self.started.elapsed().as_secs_f64();
        let mut header = format!("Pipeline summary: {} frames in {secs:.1}s", self.frames);
        if self.frames > 0 && secs > 0.0 {
            header.push_str(&format!(" ({:.1} fps)", self.frames as f64 / secs));
        }
        let mut lines = vec![header];

        for (stage, stats) in &self.stages {
            lines.push(format!(
                "  {stage:<12} {:>6} runs  mean {:7.1}ms  max {:7.1}ms",
                stats.count(),
                stats.mean(),
                stats.max()
            ));
        }
        for (name, stats) in &self.metrics {
            lines.push(format!(
                "  {name:<12} mean {:.2}  range {:.0}..{:.0}",
                stats.mean(),
                stats.min(),
                stats.max()
            ));
        }
        if let Some(stale) = self.metrics.get(STALE_RESULT_METRIC) {
            lines.push(format!(
                "  {:.0}% of classifications arrived after their face left",
                stale.mean() * 100.0
            ));
        }

        Some(lines.join("\n"))
    }

    pub fn stage_stats(&self, stage: &str) -> Option<&RunningStats> {
        self.stages.get(stage)
    }

    pub fn metric_stats(&self, name: &str) -> Option<&RunningStats> {
        self.metrics.get(name)
    }
}

impl Default for StdoutPipelineLogger {
    fn default() -> Self {
        Self::new(30)
    }
}

impl PipelineLogger for StdoutPipelineLogger {
    fn progress(&mut self, frames_processed: usize) {
        self.frames = frames_processed;
        if frames_processed % self.throttle_frames == 0 {
            log::info!("Processed {frames_processed} frames");
        }
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.stages.entry(stage.to_string()).or_default().record(duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics.entry(name.to_string()).or_default().record(value);
    }

    fn info(&mut self, message: &str) {
        log::info!("{message}");
        self.last_message = Some(message.to_string());
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}
