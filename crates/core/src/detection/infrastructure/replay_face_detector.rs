use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::detection::domain::face_detector::FaceDetector;
use crate::shared::frame::Frame;
use crate::shared::region::FaceRegion;

/// Replays pre-computed detection results by frame index.
///
/// Lets the pipeline run against recorded detector output, e.g. a frame
/// sequence exported together with the face rectangles found on device.
pub struct ReplayFaceDetector {
    detections: Arc<HashMap<usize, Vec<FaceRegion>>>,
}

impl ReplayFaceDetector {
    pub fn new(detections: Arc<HashMap<usize, Vec<FaceRegion>>>) -> Self {
        Self { detections }
    }

    /// Loads detections from JSON shaped as
    /// `{ "<frame index>": [{"x": .., "y": .., "width": .., "height": ..}] }`.
    pub fn from_json_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let detections: HashMap<usize, Vec<FaceRegion>> = serde_json::from_str(text)?;
        log::debug!("Loaded detections for {} frames", detections.len());
        Ok(Self::new(Arc::new(detections)))
    }
}

impl FaceDetector for ReplayFaceDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<FaceRegion>, Box<dyn std::error::Error>> {
        Ok(self
            .detections
            .get(&frame.index())
            .cloned()
            .unwrap_or_default())
    }
}
