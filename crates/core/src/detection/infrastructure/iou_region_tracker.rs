//! Greedy IoU tracker that gives faces persistent keys across frames.
//!
//! Each new box is matched to the previous boxes by descending IoU; a
//! matched box inherits the track's key, an unmatched one opens a new
//! track. Tracks missing for more than `max_lost` frames are retired so
//! their keys are pruned from the classification store.
use std::collections::HashSet;

use crate::detection::domain::region_identity::RegionIdentity;
use crate::shared::constants::TRACKER_IOU_THRESHOLD;
use crate::shared::region::{FaceRegion, RegionKey};

#[derive(Clone, Debug)]
struct TrackState {
    id: u32,
    region: FaceRegion,
    frames_lost: usize,
    matched: bool,
}

pub struct IouRegionTracker {
    tracks: Vec<TrackState>,
    next_id: u32,
    max_lost: usize,
    match_thresh: f64,
}

impl IouRegionTracker {
    pub fn new(max_lost: usize) -> Self {
        Self {
            tracks: Vec::new(),
            next_id: 0,
            max_lost,
            match_thresh: TRACKER_IOU_THRESHOLD,
        }
    }

    pub fn with_match_threshold(mut self, thresh: f64) -> Self {
        self.match_thresh = thresh;
        self
    }

    /// Number of tracks kept, including ones currently lost.
    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    fn reset_match_flags(&mut self) {
        for track in &mut self.tracks {
            track.matched = false;
        }
    }

    fn age_unmatched_tracks(&mut self, num_existing: usize) {
        for track in self.tracks.iter_mut().take(num_existing) {
            if !track.matched {
                track.frames_lost += 1;
            }
        }
        let max_lost = self.max_lost;
        self.tracks.retain(|t| t.frames_lost <= max_lost);
    }
}

impl RegionIdentity for IouRegionTracker {
    fn assign(&mut self, regions: &[FaceRegion]) -> Vec<RegionKey> {
        self.reset_match_flags();
        let num_existing = self.tracks.len();

        let previous: Vec<FaceRegion> = self.tracks.iter().map(|t| t.region).collect();

        let mut keys: Vec<Option<RegionKey>> = vec![None; regions.len()];
        for (ti, di) in greedy_match(&previous, regions, self.match_thresh) {
            let track = &mut self.tracks[ti];
            track.region = regions[di];
            track.frames_lost = 0;
            track.matched = true;
            keys[di] = Some(RegionKey(track.id));
        }

        for (di, key) in keys.iter_mut().enumerate() {
            if key.is_none() {
                let id = self.next_id;
                self.next_id += 1;
                self.tracks.push(TrackState {
                    id,
                    region: regions[di],
                    frames_lost: 0,
                    matched: true,
                });
                *key = Some(RegionKey(id));
            }
        }

        self.age_unmatched_tracks(num_existing);

        keys.into_iter().flatten().collect()
    }

    fn reset(&mut self) {
        self.tracks.clear();
    }
}

/// Greedy IoU matching: pairs sorted by descending IoU, each track/detection
/// used at most once.
fn greedy_match(tracks: &[FaceRegion], dets: &[FaceRegion], thresh: f64) -> Vec<(usize, usize)> {
    let mut pairs: Vec<(usize, usize, f64)> = Vec::new();
    for (ti, track) in tracks.iter().enumerate() {
        for (di, det) in dets.iter().enumerate() {
            let score = track.iou(det);
            if score >= thresh {
                pairs.push((ti, di, score));
            }
        }
    }
    pairs.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));

    let mut used_tracks = HashSet::new();
    let mut used_dets = HashSet::new();
    let mut matches = Vec::new();

    for (ti, di, _) in &pairs {
        if !used_tracks.contains(ti) && !used_dets.contains(di) {
            used_tracks.insert(*ti);
            used_dets.insert(*di);
            matches.push((*ti, *di));
        }
    }
    matches
}
