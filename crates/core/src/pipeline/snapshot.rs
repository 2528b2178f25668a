use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::classification::domain::classification::Classification;
use crate::shared::frame::Frame;
use crate::shared::region::{FaceRegion, KeyedRegion, RegionKey};

/// State of the capture feed as seen by the presentation layer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FeedStatus {
    /// No frame has arrived yet.
    #[default]
    Waiting,
    Live,
    /// The source reported an interruption; frames resume on their own.
    FrameUnavailable,
}

/// What a presentation layer needs to draw one overlay.
///
/// `classification` is `None` while the face is unclassified or its last
/// classification failed.
#[derive(Clone, Debug, PartialEq)]
pub struct RegionOverlay {
    pub key: RegionKey,
    pub region: FaceRegion,
    pub classification: Option<Classification>,
}

/// Point-in-time copy of the reconciler state.
///
/// Frame, regions and classifications are not guaranteed to come from the
/// same instant: classifications lag the frame by up to one round-trip.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PipelineSnapshot {
    pub status: FeedStatus,
    pub frame: Option<Arc<Frame>>,
    pub regions: Vec<KeyedRegion>,
    pub classifications: HashMap<RegionKey, Classification>,
}

impl PipelineSnapshot {
    pub fn frame_index(&self) -> Option<usize> {
        self.frame.as_ref().map(|f| f.index())
    }

    /// Regions in detection order, each joined with its classification.
    pub fn overlays(&self) -> Vec<RegionOverlay> {
        self.regions
            .iter()
            .map(|kr| RegionOverlay {
                key: kr.key,
                region: kr.region,
                classification: self.classifications.get(&kr.key).cloned(),
            })
            .collect()
    }
}

/// Port through which the pipeline publishes every state change.
pub trait SnapshotSink: Send {
    fn publish(&mut self, snapshot: &PipelineSnapshot);
}

/// Discards all snapshots.
pub struct NullSnapshotSink;

impl SnapshotSink for NullSnapshotSink {
    fn publish(&mut self, _snapshot: &PipelineSnapshot) {}
}

/// Cloneable handle holding the most recent snapshot for on-demand reads.
#[derive(Clone, Default)]
pub struct SharedSnapshot {
    inner: Arc<Mutex<PipelineSnapshot>>,
}

impl SharedSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self) -> PipelineSnapshot {
        match self.inner.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl SnapshotSink for SharedSnapshot {
    fn publish(&mut self, snapshot: &PipelineSnapshot) {
        let mut guard = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = snapshot.clone();
    }
}
