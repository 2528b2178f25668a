use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use crate::capture::domain::frame_source::{DetectedFrame, FrameSource, FrameSourceError};
use crate::detection::domain::face_detector::FaceDetector;
use crate::shared::constants::IMAGE_EXTENSIONS;
use crate::shared::frame::Frame;

/// Plays back the images of a directory as a capture stream.
///
/// Files are ordered by name and decoded with the `image` crate. Each frame
/// is run through the detector before it is handed out, so detection happens
/// on the capture thread, one frame at a time.
pub struct ImageSequenceSource {
    paths: Vec<PathBuf>,
    detector: Box<dyn FaceDetector>,
    next_index: usize,
    frame_interval: Option<Duration>,
    last_emit: Option<Instant>,
}

impl ImageSequenceSource {
    pub fn open(
        dir: &Path,
        detector: Box<dyn FaceDetector>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && is_image(p))
            .collect();
        paths.sort();

        if paths.is_empty() {
            return Err(format!("No images found in {}", dir.display()).into());
        }
        log::info!("Found {} frames in {}", paths.len(), dir.display());

        Ok(Self {
            paths,
            detector,
            next_index: 0,
            frame_interval: None,
            last_emit: None,
        })
    }

    /// Paces delivery to at most one frame per `interval`, like a camera would.
    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = Some(interval);
        self
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    fn wait_for_next_slot(&mut self) {
        if let (Some(interval), Some(last)) = (self.frame_interval, self.last_emit) {
            let elapsed = last.elapsed();
            if elapsed < interval {
                thread::sleep(interval - elapsed);
            }
        }
        self.last_emit = Some(Instant::now());
    }
}

impl FrameSource for ImageSequenceSource {
    fn next_frame(&mut self) -> Option<Result<DetectedFrame, FrameSourceError>> {
        let path = self.paths.get(self.next_index)?.clone();
        let index = self.next_index;
        self.next_index += 1;
        self.wait_for_next_slot();

        let frame = match decode(&path, index) {
            Ok(frame) => frame,
            Err(e) => {
                return Some(Err(FrameSourceError::Unavailable(format!(
                    "{}: {e}",
                    path.display()
                ))))
            }
        };

        let regions = match self.detector.detect(&frame) {
            Ok(regions) => regions,
            Err(e) => {
                log::warn!("Face detection failed on frame {index}: {e}");
                Vec::new()
            }
        };

        Some(Ok(DetectedFrame::new(frame, regions)))
    }
}

fn decode(path: &Path, index: usize) -> Result<Frame, image::ImageError> {
    let img = image::open(path)?.to_rgb8();
    let (width, height) = img.dimensions();
    Ok(Frame::new(img.into_raw(), width, height, 3, index))
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}
