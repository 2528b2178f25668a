use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use crate::capture::domain::frame_source::DetectedFrame;
use crate::classification::domain::classification::Classification;
use crate::classification::domain::region_classifier::ClassifierError;
use crate::detection::domain::region_identity::RegionIdentity;
use crate::pipeline::classification_store::ClassificationStore;
use crate::pipeline::face_cropper::FaceCropper;
use crate::pipeline::snapshot::{FeedStatus, PipelineSnapshot};
use crate::shared::frame::Frame;
use crate::shared::region::{KeyedRegion, RegionKey};

/// One face crop waiting for classification.
#[derive(Clone, Debug)]
pub struct ClassificationRequest {
    pub key: RegionKey,
    pub frame_index: usize,
    pub face: Frame,
    pub issued_at: Instant,
}

/// Classifier verdict for a request, routed back to the reconciler.
#[derive(Clone, Debug)]
pub struct ClassificationCompletion {
    pub key: RegionKey,
    pub frame_index: usize,
    pub result: Result<Classification, ClassifierError>,
    pub issued_at: Instant,
}

impl ClassificationCompletion {
    pub fn for_request(
        request: &ClassificationRequest,
        result: Result<Classification, ClassifierError>,
    ) -> Self {
        Self {
            key: request.key,
            frame_index: request.frame_index,
            result,
            issued_at: request.issued_at,
        }
    }
}

/// Work produced by one frame cycle.
#[derive(Debug, Default)]
pub struct FrameCycle {
    pub requests: Vec<ClassificationRequest>,
    /// Store entries removed because their key left the frame.
    pub pruned: usize,
    /// Regions whose crop failed this cycle.
    pub skipped: usize,
}

/// What applying a completion did to the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompletionOutcome {
    Stored,
    Removed,
    /// The key is no longer part of the current frame.
    Discarded,
}

/// Owns the classification store and keeps it consistent with the
/// latest detection set.
///
/// Every mutation goes through `&mut self`, so whoever owns the reconciler
/// is the single writer. Completions may arrive in any order and for any
/// earlier frame; they only land if their key is still present.
pub struct DetectionReconciler {
    cropper: FaceCropper,
    identity: Box<dyn RegionIdentity>,
    store: ClassificationStore,
    current_keys: HashSet<RegionKey>,
    frame: Option<Arc<Frame>>,
    regions: Vec<KeyedRegion>,
    status: FeedStatus,
}

impl DetectionReconciler {
    pub fn new(cropper: FaceCropper, identity: Box<dyn RegionIdentity>) -> Self {
        Self {
            cropper,
            identity,
            store: ClassificationStore::new(),
            current_keys: HashSet::new(),
            frame: None,
            regions: Vec::new(),
            status: FeedStatus::Waiting,
        }
    }

    /// Runs one frame cycle: assign keys, prune stale entries, crop every
    /// region and build one classification request per successful crop.
    pub fn begin_frame(&mut self, detected: DetectedFrame) -> FrameCycle {
        let DetectedFrame { frame, regions } = detected;
        let keys = self.identity.assign(&regions);

        self.current_keys = keys.iter().copied().collect();
        let pruned = self.store.retain_keys(&self.current_keys);

        let frame = Arc::new(frame);
        let mut cycle = FrameCycle {
            pruned,
            ..FrameCycle::default()
        };

        for (key, region) in keys.iter().zip(&regions) {
            match self.cropper.crop(&frame, region) {
                Ok(face) => cycle.requests.push(ClassificationRequest {
                    key: *key,
                    frame_index: frame.index(),
                    face,
                    issued_at: Instant::now(),
                }),
                Err(e) => {
                    log::debug!("Skipping {key} on frame {}: {e}", frame.index());
                    cycle.skipped += 1;
                }
            }
        }

        self.regions = keys
            .into_iter()
            .zip(regions)
            .map(|(key, region)| KeyedRegion { key, region })
            .collect();
        self.frame = Some(frame);
        self.status = FeedStatus::Live;

        cycle
    }

    /// Merges a classifier verdict into the store.
    pub fn apply_completion(&mut self, completion: ClassificationCompletion) -> CompletionOutcome {
        let key = completion.key;
        if !self.current_keys.contains(&key) {
            log::debug!(
                "Discarding late result for {key} from frame {}",
                completion.frame_index
            );
            return CompletionOutcome::Discarded;
        }

        match completion.result {
            Ok(classification) => {
                self.store.upsert(key, classification);
                CompletionOutcome::Stored
            }
            Err(e) => {
                log::warn!("Mask detection error for {key}: {e}");
                self.store.remove(&key);
                CompletionOutcome::Removed
            }
        }
    }

    /// Records a capture interruption: drops the frame and all regions so
    /// the snapshot shows "no frame", and empties the store.
    pub fn mark_frame_unavailable(&mut self) -> usize {
        self.identity.reset();
        self.current_keys.clear();
        self.regions.clear();
        self.frame = None;
        self.status = FeedStatus::FrameUnavailable;
        let pruned = self.store.len();
        self.store.clear();
        pruned
    }

    pub fn store(&self) -> &ClassificationStore {
        &self.store
    }

    pub fn status(&self) -> FeedStatus {
        self.status
    }

    /// Keys of the most recent frame, in ascending order.
    pub fn current_keys(&self) -> Vec<RegionKey> {
        let mut keys: Vec<RegionKey> = self.current_keys.iter().copied().collect();
        keys.sort();
        keys
    }

    pub fn snapshot(&self) -> PipelineSnapshot {
        PipelineSnapshot {
            status: self.status,
            frame: self.frame.clone(),
            regions: self.regions.clone(),
            classifications: self.store.to_map(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classification::domain::classification::MaskLabel;
    use crate::detection::domain::region_identity::{IdentityPolicy, PositionalIdentity};
    use crate::shared::region::FaceRegion;

    fn reconciler() -> DetectionReconciler {
        DetectionReconciler::new(FaceCropper::new(20.0), Box::new(PositionalIdentity))
    }

    fn detected(index: usize, regions: Vec<FaceRegion>) -> DetectedFrame {
        DetectedFrame::new(Frame::new(vec![0u8; 200 * 200 * 3], 200, 200, 3, index), regions)
    }

    fn region_a() -> FaceRegion {
        FaceRegion::new(0.0, 0.0, 0.5, 0.5)
    }

    fn region_b() -> FaceRegion {
        FaceRegion::new(0.5, 0.5, 0.5, 0.5)
    }

    fn success(
        request: &ClassificationRequest,
        label: MaskLabel,
        confidence: f32,
    ) -> ClassificationCompletion {
        let name = match label {
            MaskLabel::HasMask => "with_mask",
            MaskLabel::NoMask => "without_mask",
        };
        ClassificationCompletion::for_request(
            request,
            Ok(Classification::new(label, confidence, name)),
        )
    }

    fn completion_for(
        key: u32,
        result: Result<Classification, ClassifierError>,
    ) -> ClassificationCompletion {
        ClassificationCompletion {
            key: RegionKey(key),
            frame_index: 0,
            result,
            issued_at: Instant::now(),
        }
    }

    #[test]
    fn test_one_request_per_region_keyed_by_position() {
        let mut r = reconciler();
        let cycle = r.begin_frame(detected(0, vec![region_a(), region_b()]));

        let keys: Vec<RegionKey> = cycle.requests.iter().map(|q| q.key).collect();
        assert_eq!(keys, vec![RegionKey(0), RegionKey(1)]);
        assert!(cycle.requests.iter().all(|q| q.frame_index == 0));
        assert_eq!(r.status(), FeedStatus::Live);
    }

    #[test]
    fn test_end_to_end_store_and_prune() {
        let mut r = reconciler();
        let cycle = r.begin_frame(detected(0, vec![region_a(), region_b()]));
        r.apply_completion(success(&cycle.requests[0], MaskLabel::HasMask, 0.9));
        r.apply_completion(success(&cycle.requests[1], MaskLabel::NoMask, 0.7));

        let store = r.store();
        assert_eq!(store.len(), 2);
        assert_eq!(store.get(&RegionKey(0)).unwrap().label(), MaskLabel::HasMask);
        assert_eq!(store.get(&RegionKey(0)).unwrap().confidence(), 0.9);
        assert_eq!(store.get(&RegionKey(1)).unwrap().label(), MaskLabel::NoMask);
        assert_eq!(store.get(&RegionKey(1)).unwrap().confidence(), 0.7);

        let next = r.begin_frame(detected(1, vec![region_a()]));

        assert_eq!(next.pruned, 1);
        assert_eq!(r.store().keys(), vec![RegionKey(0)]);
        // face_0 keeps its previous value until the new result lands.
        assert_eq!(r.store().get(&RegionKey(0)).unwrap().label(), MaskLabel::HasMask);
    }

    #[test]
    fn test_store_never_exceeds_region_count_after_prune() {
        let mut r = reconciler();
        let counts = [3usize, 1, 4, 0, 2];
        for (i, &n) in counts.iter().enumerate() {
            let regions = (0..n).map(|j| FaceRegion::new(0.2 * j as f64, 0.1, 0.1, 0.1)).collect();
            let cycle = r.begin_frame(detected(i, regions));
            assert!(r.store().len() <= n);
            for req in &cycle.requests {
                r.apply_completion(success(req, MaskLabel::NoMask, 0.6));
            }
            assert!(r.store().len() <= n);
            let valid: HashSet<RegionKey> = (0..n as u32).map(RegionKey).collect();
            assert!(r.store().keys().iter().all(|k| valid.contains(k)));
        }
    }

    #[test]
    fn test_late_result_for_pruned_key_is_discarded() {
        let mut r = reconciler();
        let frame_a = r.begin_frame(detected(0, vec![region_a()]));
        r.begin_frame(detected(1, vec![]));

        let outcome = r.apply_completion(success(&frame_a.requests[0], MaskLabel::HasMask, 0.9));

        assert_eq!(outcome, CompletionOutcome::Discarded);
        assert!(r.store().is_empty());
    }

    #[test]
    fn test_late_result_lands_when_key_is_still_present() {
        let mut r = reconciler();
        let frame_a = r.begin_frame(detected(0, vec![region_a()]));
        r.begin_frame(detected(1, vec![region_b()]));

        let outcome = r.apply_completion(success(&frame_a.requests[0], MaskLabel::HasMask, 0.9));

        assert_eq!(outcome, CompletionOutcome::Stored);
        assert!(r.store().contains(&RegionKey(0)));
    }

    #[test]
    fn test_failure_removes_existing_entry() {
        let mut r = reconciler();
        let cycle = r.begin_frame(detected(0, vec![region_a()]));
        r.apply_completion(success(&cycle.requests[0], MaskLabel::HasMask, 0.9));

        let outcome = r.apply_completion(completion_for(0, Err(ClassifierError::Unavailable)));

        assert_eq!(outcome, CompletionOutcome::Removed);
        assert!(r.store().is_empty());
    }

    #[test]
    fn test_last_applied_completion_wins() {
        let mut r = reconciler();
        r.begin_frame(detected(0, vec![region_a()]));
        let first = Classification::new(MaskLabel::HasMask, 0.6, "with_mask");
        let second = Classification::new(MaskLabel::NoMask, 0.8, "without_mask");

        r.apply_completion(completion_for(0, Ok(first)));
        r.apply_completion(completion_for(0, Ok(second.clone())));

        assert_eq!(r.store().len(), 1);
        assert_eq!(r.store().get(&RegionKey(0)), Some(&second));
    }

    #[test]
    fn test_crop_failure_skips_region_but_keeps_prior_value() {
        let mut r = reconciler();
        let cycle = r.begin_frame(detected(0, vec![region_a()]));
        r.apply_completion(success(&cycle.requests[0], MaskLabel::HasMask, 0.9));

        let outside = FaceRegion::new(2.0, 2.0, 0.1, 0.1);
        let next = r.begin_frame(detected(1, vec![outside]));

        assert!(next.requests.is_empty());
        assert_eq!(next.skipped, 1);
        assert_eq!(r.store().keys(), vec![RegionKey(0)]);
    }

    #[test]
    fn test_frame_unavailable_clears_state() {
        let mut r = reconciler();
        let cycle = r.begin_frame(detected(0, vec![region_a(), region_b()]));
        r.apply_completion(success(&cycle.requests[0], MaskLabel::HasMask, 0.9));

        let pruned = r.mark_frame_unavailable();
        let snapshot = r.snapshot();

        assert_eq!(pruned, 1);
        assert_eq!(snapshot.status, FeedStatus::FrameUnavailable);
        assert!(snapshot.frame.is_none());
        assert!(snapshot.regions.is_empty());
        assert!(snapshot.classifications.is_empty());

        // In-flight results from before the interruption are dropped.
        let outcome = r.apply_completion(success(&cycle.requests[1], MaskLabel::NoMask, 0.7));
        assert_eq!(outcome, CompletionOutcome::Discarded);

        r.begin_frame(detected(1, vec![region_a()]));
        assert_eq!(r.status(), FeedStatus::Live);
    }

    #[test]
    fn test_snapshot_reflects_latest_frame() {
        let mut r = reconciler();
        let cycle = r.begin_frame(detected(7, vec![region_a(), region_b()]));
        r.apply_completion(success(&cycle.requests[1], MaskLabel::NoMask, 0.7));

        let snapshot = r.snapshot();
        let overlays = snapshot.overlays();

        assert_eq!(snapshot.frame_index(), Some(7));
        assert_eq!(overlays.len(), 2);
        assert!(overlays[0].classification.is_none());
        assert_eq!(overlays[1].classification.as_ref().unwrap().display_text(), "No Mask (70%)");
    }

    #[test]
    fn test_tracked_identity_keeps_result_with_its_face() {
        let mut r = DetectionReconciler::new(FaceCropper::new(20.0), IdentityPolicy::tracked().build());
        let first = r.begin_frame(detected(0, vec![region_a(), region_b()]));
        r.apply_completion(success(&first.requests[0], MaskLabel::HasMask, 0.9));
        r.apply_completion(success(&first.requests[1], MaskLabel::NoMask, 0.7));

        // Detector reports the same faces in the opposite order.
        r.begin_frame(detected(1, vec![region_b(), region_a()]));
        let snapshot = r.snapshot();
        let overlays = snapshot.overlays();

        assert_eq!(overlays[0].region, region_b());
        assert_eq!(overlays[0].classification.as_ref().unwrap().label(), MaskLabel::NoMask);
        assert_eq!(overlays[1].classification.as_ref().unwrap().label(), MaskLabel::HasMask);
    }
}
