use thiserror::Error;

use crate::shared::frame::Frame;
use crate::shared::region::FaceRegion;

/// A frame together with the faces found in one detection pass over it.
#[derive(Clone, Debug)]
pub struct DetectedFrame {
    pub frame: Frame,
    pub regions: Vec<FaceRegion>,
}

impl DetectedFrame {
    pub fn new(frame: Frame, regions: Vec<FaceRegion>) -> Self {
        Self { frame, regions }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FrameSourceError {
    #[error("frame unavailable: {0}")]
    Unavailable(String),
}

/// Continuous, time-ordered stream of detected frames.
///
/// `None` ends the stream for good. An `Err` reports a temporary
/// interruption (camera busy, unreadable frame); callers keep polling and
/// the stream resumes when frames come back.
pub trait FrameSource: Send {
    fn next_frame(&mut self) -> Option<Result<DetectedFrame, FrameSourceError>>;
}
