pub mod classification_store;
pub mod detection_reconciler;
pub mod face_cropper;
pub mod infrastructure;
pub mod pipeline_executor;
pub mod pipeline_logger;
pub mod snapshot;
