//! Candidate scoring for nearest-point queries

use glam::DVec3;
use kurbo::Point;

use super::sampler::{ElementRef, ObjectPath};

/// Weight of the normalized depth in the score
pub const DEPTH_WEIGHT: f64 = 3.0;
/// Weight of the normalized screen distance in the score
pub const DISTANCE_WEIGHT: f64 = 1.0;

/// Candidate found near the mouse
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub index: usize,
    /// Screen distance to the mouse in pixels
    pub distance: f64,
    pub depth: f64,
}

/// Query result
#[derive(Debug, Clone, PartialEq)]
pub struct SnapHit {
    /// Index in the point store
    pub index: usize,
    /// Screen distance to the mouse in pixels
    pub distance: f64,
    pub world: DVec3,
    pub screen: Point,
    /// Owning object, None for the 3D cursor
    pub object: Option<ObjectPath>,
    pub is_origin: bool,
    pub element: ElementRef,
}

impl SnapHit {
    /// Root object of the owner, used for highlighting and ray exclusion
    pub fn root_id(&self) -> Option<&str> {
        self.object.as_ref().map(ObjectPath::root_id)
    }
}

/// Score of one candidate, lower is better. Distance is normalized by the
/// search radius and depth by the deepest candidate of the set, favoring
/// points close to the camera over points close to the mouse.
pub fn score(distance: f64, radius: f64, depth: f64, max_depth: f64) -> f64 {
    let dist = distance / radius;
    let depth = depth / max_depth;
    (depth * DEPTH_WEIGHT + dist * DISTANCE_WEIGHT + dist * depth) / (DEPTH_WEIGHT + DISTANCE_WEIGHT)
}

/// Best-scoring candidate; ties keep the first one in `candidates`
pub fn best_candidate(candidates: &[Candidate], radius: f64) -> Option<Candidate> {
    let max_depth = candidates.iter().map(|c| c.depth).fold(f64::MIN, f64::max);
    let max_depth = if max_depth > 0.0 { max_depth } else { 1.0 };

    let mut best: Option<(Candidate, f64)> = None;
    for candidate in candidates {
        let s = score(candidate.distance, radius, candidate.depth, max_depth);
        if best.is_none_or(|(_, best_score)| s < best_score) {
            best = Some((*candidate, s));
        }
    }
    best.map(|(candidate, _)| candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(index: usize, distance: f64, depth: f64) -> Candidate {
        Candidate { index, distance, depth }
    }

    #[test]
    fn test_score_formula() {
        // dist 10/20 = 0.5, depth 5/10 = 0.5 -> (1.5 + 0.5 + 0.25) / 4
        assert!((score(10.0, 20.0, 5.0, 10.0) - 0.5625).abs() < 1e-12);
        assert_eq!(score(0.0, 20.0, 0.0, 10.0), 0.0);
    }

    #[test]
    fn test_nearer_to_camera_wins_over_nearer_to_mouse() {
        // A: on the mouse but far away, B: 8 px off but half the depth
        let best = best_candidate(&[c(0, 0.0, 10.0), c(1, 8.0, 5.0)], 20.0).unwrap();
        assert_eq!(best.index, 1);
    }

    #[test]
    fn test_same_depth_prefers_closer_pixel() {
        let best = best_candidate(&[c(0, 12.0, 4.0), c(1, 3.0, 4.0)], 20.0).unwrap();
        assert_eq!(best.index, 1);
    }

    #[test]
    fn test_empty_and_ties() {
        assert!(best_candidate(&[], 20.0).is_none());
        let candidates = [c(3, 5.0, 2.0), c(7, 5.0, 2.0)];
        assert_eq!(best_candidate(&candidates, 20.0).unwrap().index, 3);
        assert_eq!(best_candidate(&candidates, 20.0), best_candidate(&candidates, 20.0));
    }
}
