use thiserror::Error;

use crate::classification::domain::classification::Classification;
use crate::shared::frame::Frame;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClassifierError {
    #[error("classifier model not loaded")]
    Unavailable,
    #[error("classification failed: {0}")]
    Inference(String),
    #[error("no classification results")]
    NoResults,
}

/// Domain interface for mask classification of a cropped face.
///
/// Called concurrently from several worker threads, hence `&self` and `Sync`.
pub trait RegionClassifier: Send + Sync {
    fn classify(&self, face: &Frame) -> Result<Classification, ClassifierError>;
}
