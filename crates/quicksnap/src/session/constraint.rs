//! Axis and plane constraints applied to the snap target

use glam::{DQuat, DVec3};
use serde::{Deserialize, Serialize};

use crate::picking::Ray;

const PARALLEL_EPSILON: f64 = 1e-12;

/// Half length of the constraint lines drawn in the viewport
pub const CONSTRAINT_LINE_LENGTH: f64 = 1e5;

/// Movement restriction along one axis or within one plane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Constraint {
    X,
    Y,
    Z,
    Xy,
    Yz,
    Xz,
}

impl Constraint {
    /// Axis key, or the plane perpendicular to that axis when shift is held
    pub fn from_key(axis: char, shift: bool) -> Option<Self> {
        match (axis.to_ascii_uppercase(), shift) {
            ('X', false) => Some(Constraint::X),
            ('Y', false) => Some(Constraint::Y),
            ('Z', false) => Some(Constraint::Z),
            ('X', true) => Some(Constraint::Yz),
            ('Y', true) => Some(Constraint::Xz),
            ('Z', true) => Some(Constraint::Xy),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Constraint::X => "X",
            Constraint::Y => "Y",
            Constraint::Z => "Z",
            Constraint::Xy => "XY",
            Constraint::Yz => "YZ",
            Constraint::Xz => "XZ",
        }
    }

    pub fn is_plane(&self) -> bool {
        matches!(self, Constraint::Xy | Constraint::Yz | Constraint::Xz)
    }

    /// Unit axes spanned by the constraint, before rotation
    pub fn axes(&self) -> &'static [DVec3] {
        match self {
            Constraint::X => &[DVec3::X],
            Constraint::Y => &[DVec3::Y],
            Constraint::Z => &[DVec3::Z],
            Constraint::Xy => &[DVec3::X, DVec3::Y],
            Constraint::Yz => &[DVec3::Y, DVec3::Z],
            Constraint::Xz => &[DVec3::X, DVec3::Z],
        }
    }

    /// Direction of an axis constraint in the frame `rotation`
    fn direction(&self, rotation: DQuat) -> Option<DVec3> {
        match self {
            Constraint::X => Some(rotation * DVec3::X),
            Constraint::Y => Some(rotation * DVec3::Y),
            Constraint::Z => Some(rotation * DVec3::Z),
            _ => None,
        }
    }

    /// Normal of a plane constraint in the frame `rotation`
    fn normal(&self, rotation: DQuat) -> Option<DVec3> {
        match self {
            Constraint::Xy => Some(rotation * DVec3::Z),
            Constraint::Yz => Some(rotation * DVec3::X),
            Constraint::Xz => Some(rotation * DVec3::Y),
            _ => None,
        }
    }
}

/// Constraint as toggled by the user: which one, and whether it follows the
/// local axes of the reference object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConstraintState {
    pub constraint: Option<Constraint>,
    pub local: bool,
}

impl ConstraintState {
    /// Same key again switches to local axes (single selection only), then
    /// clears the constraint
    pub fn toggle(&mut self, pressed: Constraint, single_selection: bool) {
        if self.constraint == Some(pressed) {
            if !self.local && single_selection {
                self.local = true;
            } else {
                self.local = false;
                self.constraint = None;
            }
        } else {
            self.constraint = Some(pressed);
        }
    }

    /// Frame the constraint is expressed in
    pub fn rotation(&self, local_rotation: Option<DQuat>) -> DQuat {
        match (self.local, local_rotation) {
            (true, Some(rotation)) => rotation,
            _ => DQuat::IDENTITY,
        }
    }

    /// World-space segments through `origin` along each constrained axis
    pub fn lines(&self, origin: DVec3, rotation: DQuat) -> Vec<[DVec3; 2]> {
        let Some(constraint) = self.constraint else {
            return Vec::new();
        };
        constraint
            .axes()
            .iter()
            .map(|axis| {
                let dir = (rotation * *axis).normalize_or_zero() * CONSTRAINT_LINE_LENGTH;
                [origin + dir, origin - dir]
            })
            .collect()
    }
}

/// Project `target` onto the constraint through `origin`
pub fn get_axis_target(origin: DVec3, target: DVec3, constraint: Option<Constraint>, rotation: DQuat) -> DVec3 {
    let Some(constraint) = constraint else {
        return target;
    };
    if let Some(axis) = constraint.direction(rotation) {
        return origin + axis * (target - origin).dot(axis);
    }
    match constraint.normal(rotation) {
        Some(normal) => target - normal * (target - origin).dot(normal),
        None => target,
    }
}

/// Target under the mouse when no snap point is hovered: the mouse ray meets
/// the camera-facing plane through `origin`, the constraint axis (closest
/// point) or the constraint plane. None when the ray is parallel.
pub fn get_target_free(origin: DVec3, ray: &Ray, constraint: Option<Constraint>, rotation: DQuat) -> Option<DVec3> {
    let Some(constraint) = constraint else {
        return intersect_line_plane(ray, origin, -ray.direction);
    };
    if let Some(axis) = constraint.direction(rotation) {
        return closest_point_on_axis(ray, origin, axis);
    }
    let normal = constraint.normal(rotation)?;
    intersect_line_plane(ray, origin, normal)
}

/// Intersection of the infinite line through `ray` with a plane
pub fn intersect_line_plane(ray: &Ray, plane_point: DVec3, normal: DVec3) -> Option<DVec3> {
    let denom = normal.dot(ray.direction);
    if denom.abs() < PARALLEL_EPSILON {
        return None;
    }
    let t = normal.dot(plane_point - ray.origin) / denom;
    Some(ray.at(t))
}

/// Point of the line `origin + s * axis` closest to the line through `ray`
pub fn closest_point_on_axis(ray: &Ray, origin: DVec3, axis: DVec3) -> Option<DVec3> {
    let u = ray.direction;
    let w0 = ray.origin - origin;
    let a = u.dot(u);
    let b = u.dot(axis);
    let c = axis.dot(axis);
    let d = u.dot(w0);
    let e = axis.dot(w0);
    let denom = a * c - b * b;
    if denom.abs() < PARALLEL_EPSILON {
        return None;
    }
    let s = (a * e - b * d) / denom;
    Some(origin + axis * s)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: DVec3, b: DVec3) -> bool {
        (a - b).length() < 1e-9
    }

    #[test]
    fn test_axis_constraint() {
        let target = get_axis_target(DVec3::ZERO, DVec3::new(3.0, 4.0, 5.0), Some(Constraint::X), DQuat::IDENTITY);
        assert!(approx(target, DVec3::new(3.0, 0.0, 0.0)));
    }

    #[test]
    fn test_plane_constraint() {
        let target = get_axis_target(DVec3::ZERO, DVec3::new(2.0, 2.0, 2.0), Some(Constraint::Xy), DQuat::IDENTITY);
        assert!(approx(target, DVec3::new(2.0, 2.0, 0.0)));
    }

    #[test]
    fn test_no_constraint_passes_target_through() {
        let t = DVec3::new(1.0, 2.0, 3.0);
        assert_eq!(get_axis_target(DVec3::ONE, t, None, DQuat::IDENTITY), t);
    }

    #[test]
    fn test_local_axis_constraint() {
        let rotation = DQuat::from_rotation_z(std::f64::consts::FRAC_PI_2);
        // local X is world Y
        let target = get_axis_target(DVec3::ZERO, DVec3::new(3.0, 4.0, 5.0), Some(Constraint::X), rotation);
        assert!(approx(target, DVec3::new(0.0, 4.0, 0.0)));
    }

    #[test]
    fn test_free_target_on_camera_plane() {
        let ray = Ray {
            origin: DVec3::new(1.0, 2.0, 10.0),
            direction: DVec3::NEG_Z,
        };
        let target = get_target_free(DVec3::new(0.0, 0.0, 3.0), &ray, None, DQuat::IDENTITY).unwrap();
        assert!(approx(target, DVec3::new(1.0, 2.0, 3.0)));
    }

    #[test]
    fn test_free_target_axis_and_plane() {
        let ray = Ray {
            origin: DVec3::new(2.0, 5.0, 10.0),
            direction: DVec3::NEG_Z,
        };
        let on_x = get_target_free(DVec3::ZERO, &ray, Some(Constraint::X), DQuat::IDENTITY).unwrap();
        assert!(approx(on_x, DVec3::new(2.0, 0.0, 0.0)));

        let on_xy = get_target_free(DVec3::ZERO, &ray, Some(Constraint::Xy), DQuat::IDENTITY).unwrap();
        assert!(approx(on_xy, DVec3::new(2.0, 5.0, 0.0)));

        // ray parallel to the XZ plane it never reaches
        assert!(get_target_free(DVec3::ZERO, &ray, Some(Constraint::Xz), DQuat::IDENTITY).is_none());
        // ray parallel to the Z axis
        assert!(get_target_free(DVec3::ZERO, &ray, Some(Constraint::Z), DQuat::IDENTITY).is_none());
    }

    #[test]
    fn test_toggle_cycle() {
        let mut state = ConstraintState::default();
        state.toggle(Constraint::X, true);
        assert_eq!(state, ConstraintState { constraint: Some(Constraint::X), local: false });
        state.toggle(Constraint::X, true);
        assert!(state.local);
        state.toggle(Constraint::X, true);
        assert_eq!(state, ConstraintState::default());

        state.toggle(Constraint::Y, false);
        state.toggle(Constraint::Y, false);
        assert_eq!(state, ConstraintState::default());

        state.toggle(Constraint::Y, true);
        state.toggle(Constraint::Xz, true);
        assert_eq!(state.constraint, Some(Constraint::Xz));
    }

    #[test]
    fn test_from_key() {
        assert_eq!(Constraint::from_key('x', false), Some(Constraint::X));
        assert_eq!(Constraint::from_key('X', true), Some(Constraint::Yz));
        assert_eq!(Constraint::from_key('Z', true), Some(Constraint::Xy));
        assert_eq!(Constraint::from_key('Q', false), None);
    }

    #[test]
    fn test_lines() {
        let state = ConstraintState { constraint: Some(Constraint::Xy), local: false };
        let lines = state.lines(DVec3::ONE, DQuat::IDENTITY);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0][0], DVec3::new(1.0 + CONSTRAINT_LINE_LENGTH, 1.0, 1.0));
    }
}
