use std::fmt;

use serde::{Deserialize, Serialize};

/// A detected face as a normalized bounding box.
///
/// Coordinates are fractions of the frame size with the origin at the
/// top-left corner. The detector gives no identity across frames; keys are
/// assigned by the reconciler.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FaceRegion {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl FaceRegion {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Intersection over union, in `[0, 1]`. Zero when either box is empty.
    pub fn iou(&self, other: &FaceRegion) -> f64 {
        let overlap_w = (self.right().min(other.right()) - self.x.max(other.x)).max(0.0);
        let overlap_h = (self.bottom().min(other.bottom()) - self.y.max(other.y)).max(0.0);
        let inter = overlap_w * overlap_h;
        if inter <= 0.0 {
            return 0.0;
        }
        // Areas from the same edge differences as the overlap, so identical
        // boxes give exactly 1.
        let area_self = (self.right() - self.x) * (self.bottom() - self.y);
        let area_other = (other.right() - other.x) * (other.bottom() - other.y);
        (inter / (area_self + area_other - inter)).min(1.0)
    }
}

/// Identifier correlating a region across detect → crop → classify → merge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegionKey(pub u32);

impl fmt::Display for RegionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "face_{}", self.0)
    }
}

/// A region together with the key assigned to it for the current frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KeyedRegion {
    pub key: RegionKey,
    pub region: FaceRegion,
}

/// Integer pixel rectangle inside a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[test]
    fn test_region_key_display_matches_face_prefix() {
        assert_eq!(RegionKey(0).to_string(), "face_0");
        assert_eq!(RegionKey(12).to_string(), "face_12");
    }

    #[test]
    fn test_far_edges() {
        let r = FaceRegion::new(0.25, 0.5, 0.25, 0.125);
        assert_eq!(r.right(), 0.5);
        assert_eq!(r.bottom(), 0.625);
    }

    #[rstest]
    #[case(FaceRegion::new(0.1, 0.1, 0.2, 0.2))]
    #[case(FaceRegion::new(0.1, 0.2, 0.3, 0.7))]
    #[case(FaceRegion::new(0.33, 0.17, 0.41, 0.29))]
    fn test_iou_identical_regions_is_exactly_one(#[case] a: FaceRegion) {
        assert_eq!(a.iou(&a), 1.0);
    }

    #[test]
    fn test_iou_never_exceeds_one() {
        let a = FaceRegion::new(0.1, 0.1, 0.2, 0.2);
        let b = FaceRegion::new(0.1, 0.1, 0.2 + 1e-12, 0.2);
        assert!(a.iou(&b) <= 1.0);
        assert!(b.iou(&a) <= 1.0);
    }

    #[rstest]
    #[case::disjoint(FaceRegion::new(0.0, 0.0, 0.25, 0.25), FaceRegion::new(0.5, 0.5, 0.25, 0.25), 0.0)]
    #[case::touching(FaceRegion::new(0.0, 0.0, 0.5, 0.5), FaceRegion::new(0.5, 0.0, 0.5, 0.5), 0.0)]
    #[case::zero_width(FaceRegion::new(0.0, 0.0, 0.0, 0.5), FaceRegion::new(0.0, 0.0, 0.5, 0.5), 0.0)]
    #[case::half_shift(FaceRegion::new(0.0, 0.0, 0.5, 0.5), FaceRegion::new(0.25, 0.0, 0.5, 0.5), 1.0 / 3.0)]
    fn test_iou_cases(#[case] a: FaceRegion, #[case] b: FaceRegion, #[case] expected: f64) {
        assert_relative_eq!(a.iou(&b), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_deserializes_from_json_object() {
        let r: FaceRegion =
            serde_json::from_str(r#"{"x":0.1,"y":0.2,"width":0.3,"height":0.4}"#).unwrap();
        assert_eq!(r, FaceRegion::new(0.1, 0.2, 0.3, 0.4));
    }
}
