/// Pixels added around each face box before cropping.
pub const CROP_PADDING_PX: f64 = 20.0;

pub const MASK_MODEL_NAME: &str = "mask_detection.onnx";

/// Class names in the order the default mask model emits scores.
pub const DEFAULT_CLASS_LABELS: &[&str] = &["with_mask", "without_mask"];

/// Max frames a tracked face can be missing before its key is retired.
pub const TRACKER_MAX_LOST: usize = 15;

/// Minimum IoU for a detection to continue an existing track.
pub const TRACKER_IOU_THRESHOLD: f64 = 0.3;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];
