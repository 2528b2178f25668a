use crate::classification::domain::classification::Classification;
use crate::classification::domain::region_classifier::{ClassifierError, RegionClassifier};
use crate::shared::frame::Frame;

/// Stand-in used when no model could be loaded.
///
/// Every request fails with [`ClassifierError::Unavailable`], so the pipeline
/// keeps showing faces without labels instead of refusing to start.
#[derive(Debug, Default)]
pub struct UnavailableClassifier;

impl RegionClassifier for UnavailableClassifier {
    fn classify(&self, _face: &Frame) -> Result<Classification, ClassifierError> {
        Err(ClassifierError::Unavailable)
    }
}
