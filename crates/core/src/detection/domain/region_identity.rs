use crate::detection::infrastructure::iou_region_tracker::IouRegionTracker;
use crate::shared::constants::TRACKER_MAX_LOST;
use crate::shared::region::{FaceRegion, RegionKey};

/// Assigns a [`RegionKey`] to every region of a frame.
///
/// Called once per frame, in arrival order. The returned vector is parallel
/// to `regions` and must not contain duplicate keys.
pub trait RegionIdentity: Send {
    fn assign(&mut self, regions: &[FaceRegion]) -> Vec<RegionKey>;

    /// Forget all state, e.g. after the feed was interrupted.
    fn reset(&mut self) {}
}

/// Keys regions by their position in the detection list (`face_0`, `face_1`, ...).
///
/// Keys are reassigned every frame, so a detector that reorders faces
/// between frames will shift classifications onto the wrong face.
#[derive(Debug, Default)]
pub struct PositionalIdentity;

impl RegionIdentity for PositionalIdentity {
    fn assign(&mut self, regions: &[FaceRegion]) -> Vec<RegionKey> {
        (0..regions.len() as u32).map(RegionKey).collect()
    }
}

/// Which identity scheme the pipeline uses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum IdentityPolicy {
    #[default]
    Positional,
    Tracked { max_lost: usize },
}

impl IdentityPolicy {
    pub fn tracked() -> Self {
        IdentityPolicy::Tracked {
            max_lost: TRACKER_MAX_LOST,
        }
    }

    pub fn build(self) -> Box<dyn RegionIdentity> {
        match self {
            IdentityPolicy::Positional => Box::new(PositionalIdentity),
            IdentityPolicy::Tracked { max_lost } => Box::new(IouRegionTracker::new(max_lost)),
        }
    }
}

impl std::str::FromStr for IdentityPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "positional" | "index" => Ok(IdentityPolicy::Positional),
            "tracked" | "iou" => Ok(IdentityPolicy::tracked()),
            other => Err(format!(
                "unknown identity policy '{other}' (expected 'positional' or 'tracked')"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn region(x: f64) -> FaceRegion {
        FaceRegion::new(x, 0.1, 0.1, 0.1)
    }

    #[test]
    fn test_positional_keys_follow_list_order() {
        let mut identity = PositionalIdentity;
        let keys = identity.assign(&[region(0.0), region(0.3), region(0.6)]);
        assert_eq!(keys, vec![RegionKey(0), RegionKey(1), RegionKey(2)]);
    }

    #[test]
    fn test_positional_keys_restart_every_frame() {
        let mut identity = PositionalIdentity;
        identity.assign(&[region(0.0), region(0.3)]);
        let keys = identity.assign(&[region(0.3)]);
        assert_eq!(keys, vec![RegionKey(0)]);
    }

    #[test]
    fn test_positional_empty_frame() {
        assert!(PositionalIdentity.assign(&[]).is_empty());
    }

    #[rstest]
    #[case("positional", IdentityPolicy::Positional)]
    #[case("Index", IdentityPolicy::Positional)]
    #[case("tracked", IdentityPolicy::Tracked { max_lost: TRACKER_MAX_LOST })]
    #[case("IOU", IdentityPolicy::Tracked { max_lost: TRACKER_MAX_LOST })]
    fn test_policy_parses(#[case] input: &str, #[case] expected: IdentityPolicy) {
        assert_eq!(input.parse::<IdentityPolicy>().unwrap(), expected);
    }

    #[test]
    fn test_unknown_policy_is_rejected() {
        assert!("random".parse::<IdentityPolicy>().is_err());
    }

    #[test]
    fn test_default_policy_is_positional() {
        assert_eq!(IdentityPolicy::default(), IdentityPolicy::Positional);
        let mut identity = IdentityPolicy::default().build();
        assert_eq!(identity.assign(&[region(0.5)]), vec![RegionKey(0)]);
    }
}
