//! Common helpers shared by the sampler, the session and the harness
//!
//! Conversions between the serde scene types and glam math, plus
//! object hierarchy utilities.

use std::collections::HashSet;

use glam::{DMat4, DQuat, DVec3, EulerRot};
use shared::{ObjectId, Transform};

use crate::host::SceneQuery;

/// Local matrix of a scene transform (rotation in degrees, XYZ order)
pub fn transform_matrix(transform: &Transform) -> DMat4 {
    let [rx, ry, rz] = transform.rotation;
    DMat4::from_scale_rotation_translation(
        DVec3::from_array(transform.scale),
        DQuat::from_euler(EulerRot::XYZ, rx.to_radians(), ry.to_radians(), rz.to_radians()),
        DVec3::from_array(transform.position),
    )
}

/// Rotation part of a world matrix, used for local-axis constraints
pub fn matrix_rotation(matrix: &DMat4) -> DQuat {
    let (_, rotation, _) = matrix.to_scale_rotation_translation();
    rotation
}

/// Returns true if `id` has an ancestor among `candidates`
pub fn has_ancestor_in<S: SceneQuery + ?Sized>(
    scene: &S,
    id: &str,
    candidates: &HashSet<&str>,
) -> bool {
    let mut current = scene.object(id).and_then(|o| o.parent.clone());
    let mut guard = 0;
    while let Some(parent) = current {
        if candidates.contains(parent.as_str()) {
            return true;
        }
        guard += 1;
        if guard > 64 {
            return false;
        }
        current = scene.object(&parent).and_then(|o| o.parent.clone());
    }
    false
}

/// Inputs a list of objects, outputs that list minus all descendants of
/// other objects in that list (order preserved)
pub fn keep_only_parents<S: SceneQuery + ?Sized>(scene: &S, objects: &[ObjectId]) -> Vec<ObjectId> {
    let set: HashSet<&str> = objects.iter().map(String::as_str).collect();
    objects
        .iter()
        .filter(|id| !has_ancestor_in(scene, id, &set))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_transform() {
        let m = transform_matrix(&Transform::new());
        assert!(m.abs_diff_eq(DMat4::IDENTITY, 1e-12));
    }

    #[test]
    fn test_transform_matrix_applies_scale_rotation_translation() {
        let t = Transform {
            position: [1.0, 2.0, 3.0],
            rotation: [0.0, 0.0, 90.0],
            scale: [2.0, 2.0, 2.0],
        };
        let p = transform_matrix(&t).transform_point3(DVec3::X);
        // scale to (2,0,0), rotate about Z to (0,2,0), translate
        assert!((p - DVec3::new(1.0, 4.0, 3.0)).length() < 1e-9);
    }

    #[test]
    fn test_matrix_rotation() {
        let q = DQuat::from_rotation_z(0.5);
        let m = DMat4::from_scale_rotation_translation(DVec3::splat(3.0), q, DVec3::ONE);
        assert!(matrix_rotation(&m).abs_diff_eq(q, 1e-9));
    }
}
