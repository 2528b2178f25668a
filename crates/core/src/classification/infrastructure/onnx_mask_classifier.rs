//! Mask classifier backed by an ONNX Runtime session.
//!
//! The cropped face is stretched to the model's square input (no
//! letterboxing), scores are turned into probabilities and the top class is
//! mapped onto a [`MaskLabel`](crate::classification::domain::classification::MaskLabel).
use std::path::Path;
use std::sync::Mutex;

use crate::classification::domain::classification::Classification;
use crate::classification::domain::region_classifier::{ClassifierError, RegionClassifier};
use crate::shared::constants::DEFAULT_CLASS_LABELS;
use crate::shared::frame::Frame;

/// Fallback input resolution when the model doesn't specify dimensions.
const DEFAULT_INPUT_SIZE: u32 = 224;

/// Tolerance when deciding whether scores already sum to one.
const PROBABILITY_SUM_TOLERANCE: f32 = 1e-3;

pub struct OnnxMaskClassifier {
    session: Mutex<ort::session::Session>,
    labels: Vec<String>,
    input_size: u32,
}

impl OnnxMaskClassifier {
    /// Load a classification model. `labels` name the output scores in order;
    /// an empty list falls back to `with_mask`, `without_mask`.
    pub fn new(model_path: &Path, labels: Vec<String>) -> Result<Self, Box<dyn std::error::Error>> {
        let session = ort::session::Session::builder()?.commit_from_file(model_path)?;

        // NCHW: [1, 3, H, W]
        let input_size = session
            .inputs()
            .first()
            .and_then(|input| {
                if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() {
                    if shape.len() >= 4 && shape[2] > 0 {
                        Some(shape[2] as u32)
                    } else {
                        None
                    }
                } else {
                    None
                }
            })
            .unwrap_or(DEFAULT_INPUT_SIZE);

        let labels = if labels.is_empty() {
            DEFAULT_CLASS_LABELS.iter().map(|s| s.to_string()).collect()
        } else {
            labels
        };

        log::info!(
            "Loaded mask model {} (input {input_size}x{input_size}, {} classes)",
            model_path.display(),
            labels.len()
        );

        Ok(Self {
            session: Mutex::new(session),
            labels,
            input_size,
        })
    }

    fn run(&self, tensor: ndarray::Array4<f32>) -> Result<Vec<f32>, ClassifierError> {
        let input_value = ort::value::Tensor::from_array(tensor).map_err(inference_error)?;
        let mut session = self
            .session
            .lock()
            .map_err(|_| ClassifierError::Inference("session lock poisoned".into()))?;
        let outputs = session
            .run(ort::inputs![input_value])
            .map_err(inference_error)?;
        let scores = outputs[0]
            .try_extract_array::<f32>()
            .map_err(inference_error)?;
        Ok(scores.iter().copied().collect())
    }
}

impl RegionClassifier for OnnxMaskClassifier {
    fn classify(&self, face: &Frame) -> Result<Classification, ClassifierError> {
        let tensor = stretch_to_tensor(face, self.input_size)?;
        let scores = self.run(tensor)?;
        let probabilities = to_probabilities(&scores);
        let (index, confidence) = top_class(&probabilities).ok_or(ClassifierError::NoResults)?;

        let class_name = self
            .labels
            .get(index)
            .cloned()
            .unwrap_or_else(|| format!("class_{index}"));
        Ok(Classification::from_class_name(class_name, confidence))
    }
}

fn inference_error(e: ort::Error) -> ClassifierError {
    ClassifierError::Inference(e.to_string())
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

/// Resize a face crop to `size` × `size` ignoring aspect ratio.
///
/// Returns an NCHW float32 tensor with values in `[0, 1]`.
fn stretch_to_tensor(face: &Frame, size: u32) -> Result<ndarray::Array4<f32>, ClassifierError> {
    if face.channels() != 3 {
        return Err(ClassifierError::Inference(format!(
            "expected RGB crop, got {} channels",
            face.channels()
        )));
    }
    let img = image::RgbImage::from_raw(face.width(), face.height(), face.data().to_vec())
        .ok_or_else(|| ClassifierError::Inference("crop buffer does not match its size".into()))?;
    let resized = image::imageops::resize(&img, size, size, image::imageops::FilterType::Triangle);

    let side = size as usize;
    let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, side, side));
    for (x, y, pixel) in resized.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] = pixel[c] as f32 / 255.0;
        }
    }
    Ok(tensor)
}

// ---------------------------------------------------------------------------
// Postprocessing
// ---------------------------------------------------------------------------

/// Passes probability vectors through unchanged, applies softmax to logits.
fn to_probabilities(scores: &[f32]) -> Vec<f32> {
    let looks_normalized = scores.iter().all(|s| (0.0..=1.0).contains(s))
        && (scores.iter().sum::<f32>() - 1.0).abs() <= PROBABILITY_SUM_TOLERANCE;
    if looks_normalized || scores.is_empty() {
        return scores.to_vec();
    }

    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = scores.iter().map(|s| (s - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Index and score of the most confident class.
fn top_class(probabilities: &[f32]) -> Option<(usize, f32)> {
    probabilities
        .iter()
        .copied()
        .enumerate()
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
