use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::capture::domain::frame_source::FrameSource;
use crate::classification::domain::region_classifier::RegionClassifier;
use crate::detection::domain::region_identity::IdentityPolicy;
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::pipeline::snapshot::SnapshotSink;
use crate::shared::constants::CROP_PADDING_PX;

const DEFAULT_CLASSIFIER_WORKERS: usize = 2;
const DEFAULT_FRAME_CHANNEL_CAPACITY: usize = 4;
const DEFAULT_UNAVAILABLE_BACKOFF: Duration = Duration::from_millis(100);

/// Configuration for a pipeline run.
pub struct PipelineConfig {
    /// Pixels added around each face before classification.
    pub crop_padding: f64,
    pub identity: IdentityPolicy,
    /// Threads running classification requests concurrently.
    pub classifier_workers: usize,
    pub frame_channel_capacity: usize,
    /// Skip straight to the newest queued frame when the coordinator falls behind.
    pub drop_stale_frames: bool,
    /// Pause before polling the source again after it reported an interruption.
    pub unavailable_backoff: Duration,
    pub cancelled: Arc<AtomicBool>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            crop_padding: CROP_PADDING_PX,
            identity: IdentityPolicy::default(),
            classifier_workers: DEFAULT_CLASSIFIER_WORKERS,
            frame_channel_capacity: DEFAULT_FRAME_CHANNEL_CAPACITY,
            drop_stale_frames: true,
            unavailable_backoff: DEFAULT_UNAVAILABLE_BACKOFF,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.classifier_workers == 0 {
            return Err(PipelineError::InvalidConfig(
                "classifier_workers must be >= 1".into(),
            ));
        }
        if self.frame_channel_capacity == 0 {
            return Err(PipelineError::InvalidConfig(
                "frame_channel_capacity must be >= 1".into(),
            ));
        }
        if !self.crop_padding.is_finite() || self.crop_padding < 0.0 {
            return Err(PipelineError::InvalidConfig(format!(
                "crop_padding must be a non-negative number, got {}",
                self.crop_padding
            )));
        }
        Ok(())
    }
}

/// Counters collected over one run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PipelineReport {
    pub frames_processed: usize,
    /// Frames skipped because a newer one was already queued.
    pub frames_dropped: usize,
    pub frames_unavailable: usize,
    pub requests_issued: usize,
    /// Crops not sent because their key still had a request outstanding.
    pub requests_skipped: usize,
    pub crops_skipped: usize,
    pub classifications_stored: usize,
    pub classifications_failed: usize,
    /// Results that arrived after their key left the frame.
    pub results_discarded: usize,
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),
    #[error("{0} thread panicked")]
    ThreadPanicked(&'static str),
}

/// Abstracts how the capture → crop → classify → reconcile loop runs.
///
/// This is a port. Infrastructure provides concrete implementations.
pub trait PipelineExecutor: Send {
    fn execute(
        &self,
        source: Box<dyn FrameSource>,
        classifier: Arc<dyn RegionClassifier>,
        sink: &mut dyn SnapshotSink,
        logger: &mut dyn PipelineLogger,
        config: PipelineConfig,
    ) -> Result<PipelineReport, PipelineError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_default_config_is_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.crop_padding, 20.0);
        assert_eq!(config.identity, IdentityPolicy::Positional);
        assert!(config.drop_stale_frames);
    }

    #[rstest]
    #[case::no_workers(PipelineConfig { classifier_workers: 0, ..PipelineConfig::default() })]
    #[case::no_capacity(PipelineConfig { frame_channel_capacity: 0, ..PipelineConfig::default() })]
    #[case::negative_padding(PipelineConfig { crop_padding: -1.0, ..PipelineConfig::default() })]
    #[case::nan_padding(PipelineConfig { crop_padding: f64::NAN, ..PipelineConfig::default() })]
    fn test_invalid_configs_are_rejected(#[case] config: PipelineConfig) {
        assert!(matches!(
            config.validate(),
            Err(PipelineError::InvalidConfig(_))
        ));
    }
}
