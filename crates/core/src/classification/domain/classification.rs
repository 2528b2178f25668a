use std::fmt;

/// Whether the classifier saw a mask on the face.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MaskLabel {
    HasMask,
    NoMask,
}

impl MaskLabel {
    /// Maps a model class name onto a label.
    ///
    /// Matching is case-insensitive: `with_mask` and `without_mask` are
    /// recognised explicitly, any other name containing `mask` counts as
    /// masked, everything else as unmasked.
    pub fn from_class_name(name: &str) -> Self {
        let name = name.to_lowercase();
        if name.contains("without_mask") {
            MaskLabel::NoMask
        } else if name.contains("with_mask") || name.contains("mask") {
            MaskLabel::HasMask
        } else {
            MaskLabel::NoMask
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            MaskLabel::HasMask => "Mask",
            MaskLabel::NoMask => "No Mask",
        }
    }

    /// Overlay color name used by presentation layers.
    pub fn color(&self) -> &'static str {
        match self {
            MaskLabel::HasMask => "green",
            MaskLabel::NoMask => "red",
        }
    }
}

/// One classifier verdict for one cropped face. Immutable once produced.
#[derive(Clone, Debug, PartialEq)]
pub struct Classification {
    label: MaskLabel,
    confidence: f32,
    class_name: String,
}

impl Classification {
    pub fn new(label: MaskLabel, confidence: f32, class_name: impl Into<String>) -> Self {
        Self {
            label,
            confidence: clamp_confidence(confidence),
            class_name: class_name.into(),
        }
    }

    /// Builds a classification from a raw model class name and score.
    pub fn from_class_name(class_name: impl Into<String>, confidence: f32) -> Self {
        let class_name = class_name.into();
        Self::new(MaskLabel::from_class_name(&class_name), confidence, class_name)
    }

    pub fn label(&self) -> MaskLabel {
        self.label
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    /// Class name exactly as reported by the model.
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn has_mask(&self) -> bool {
        self.label == MaskLabel::HasMask
    }

    /// Overlay text, e.g. `Mask (90%)`. The percentage is truncated.
    pub fn display_text(&self) -> String {
        let percentage = (self.confidence * 100.0) as i32;
        format!("{} ({percentage}%)", self.label.display_name())
    }

    pub fn color(&self) -> &'static str {
        self.label.color()
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_text())
    }
}

fn clamp_confidence(confidence: f32) -> f32 {
    if confidence.is_nan() {
        0.0
    } else {
        confidence.clamp(0.0, 1.0)
    }
}
