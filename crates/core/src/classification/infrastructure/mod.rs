pub mod onnx_mask_classifier;
pub mod unavailable_classifier;
