use glam::{DMat3, DMat4, DVec3, DVec4};
use kurbo::{Point, Rect};

use crate::picking::Ray;

/// Arc-ball camera used by the headless harness to drive the viewport
#[derive(Debug, Clone)]
pub struct ArcBallCamera {
    /// Horizontal rotation angle (radians)
    pub yaw: f64,
    /// Vertical rotation angle (radians)
    pub pitch: f64,
    /// Distance from target
    pub distance: f64,
    /// Camera target point
    pub target: DVec3,
    /// Vertical field of view (radians)
    pub fov: f64,
}

impl ArcBallCamera {
    pub fn new() -> Self {
        Self {
            yaw: 0.6,
            pitch: 0.4,
            distance: 6.0,
            target: DVec3::ZERO,
            fov: 45.0_f64.to_radians(),
        }
    }

    /// Camera orbiting `target` at `distance`
    pub fn looking_at(target: DVec3, distance: f64) -> Self {
        Self {
            target,
            distance,
            ..Self::new()
        }
    }

    pub fn rotate(&mut self, dx: f64, dy: f64) {
        self.yaw += dx.to_radians();
        self.pitch = (self.pitch + dy.to_radians()).clamp(-1.5, 1.5);
    }

    pub fn zoom(&mut self, delta: f64) {
        self.distance = (self.distance * (1.0 - delta)).clamp(0.5, 100.0);
    }

    pub fn pan(&mut self, dx: f64, dy: f64) {
        let right = self.right_vector();
        let up = self.up_vector();
        let offset = right * dx + up * dy;
        self.target += offset;
    }

    /// Camera position in world space
    pub fn eye_position(&self) -> DVec3 {
        let cy = self.yaw.cos();
        let sy = self.yaw.sin();
        let cp = self.pitch.cos();
        let sp = self.pitch.sin();

        self.target
            + DVec3::new(
                self.distance * cp * sy,
                self.distance * sp,
                self.distance * cp * cy,
            )
    }

    /// View matrix (world -> camera)
    pub fn view_matrix(&self) -> DMat4 {
        DMat4::look_at_rh(self.eye_position(), self.target, DVec3::Y)
    }

    /// Projection matrix (camera -> clip)
    pub fn projection_matrix(&self, aspect: f64) -> DMat4 {
        DMat4::perspective_rh_gl(self.fov, aspect, 0.1, 200.0)
    }

    /// Combined view-projection matrix
    pub fn view_projection(&self, aspect: f64) -> DMat4 {
        self.projection_matrix(aspect) * self.view_matrix()
    }

    /// Snapshot for a region of `width` x `height` pixels
    pub fn view_state(&self, width: f64, height: f64) -> ViewState {
        ViewState::new(self.view_projection(width / height), width, height)
    }

    fn right_vector(&self) -> DVec3 {
        let fwd = (self.target - self.eye_position()).normalize_or_zero();
        fwd.cross(DVec3::Y).normalize_or_zero()
    }

    fn up_vector(&self) -> DVec3 {
        let fwd = (self.target - self.eye_position()).normalize_or_zero();
        let right = self.right_vector();
        right.cross(fwd).normalize_or_zero()
    }
}

impl Default for ArcBallCamera {
    fn default() -> Self {
        Self::new()
    }
}

/// Camera snapshot of the viewport region.
///
/// Region pixel coordinates have their origin in the bottom-left corner with
/// y pointing up. The perspective matrix maps world space to clip space with
/// OpenGL depth conventions (near plane at NDC z = -1).
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    /// Projection * view
    pub perspective: DMat4,
    pub width: f64,
    pub height: f64,
}

impl ViewState {
    pub fn new(perspective: DMat4, width: f64, height: f64) -> Self {
        Self {
            perspective,
            width,
            height,
        }
    }

    pub fn half_width(&self) -> f64 {
        self.width / 2.0
    }

    pub fn half_height(&self) -> f64 {
        self.height / 2.0
    }

    /// Region rectangle in pixels
    pub fn region(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width, self.height)
    }

    /// True when `point` lies in `[0, width) x [0, height)`
    pub fn contains(&self, point: Point) -> bool {
        point.x >= 0.0 && point.y >= 0.0 && point.x < self.width && point.y < self.height
    }

    /// World position -> (region pixel, clip w). None when behind the camera.
    pub fn project(&self, world: DVec3) -> Option<(Point, f64)> {
        let clip = self.perspective * world.extend(1.0);
        if clip.w <= 0.0 {
            return None;
        }
        Some((self.clip_to_region(clip), clip.w))
    }

    /// Perspective divide of a clip-space position into region pixels
    pub fn clip_to_region(&self, clip: DVec4) -> Point {
        let hw = self.half_width();
        let hh = self.half_height();
        Point::new(hw + hw * (clip.x / clip.w), hh + hh * (clip.y / clip.w))
    }

    /// Inverse of [`ViewState::project`]: the world position that projects
    /// onto `screen` with clip w equal to `depth`.
    pub fn unproject(&self, screen: Point, depth: f64) -> Option<DVec3> {
        let ndc_x = (screen.x - self.half_width()) / self.half_width();
        let ndc_y = (screen.y - self.half_height()) / self.half_height();
        let r0 = self.perspective.row(0);
        let r1 = self.perspective.row(1);
        let r3 = self.perspective.row(3);

        // clip.x = ndc_x * w, clip.y = ndc_y * w, clip.w = depth
        let a = r0 - r3 * ndc_x;
        let b = r1 - r3 * ndc_y;
        let system = DMat3::from_cols(a.truncate(), b.truncate(), r3.truncate()).transpose();
        if system.determinant().abs() < 1e-12 {
            return None;
        }
        let rhs = DVec3::new(-a.w, -b.w, depth - r3.w);
        Some(system.inverse() * rhs)
    }

    /// Ray from the near plane through a region pixel
    pub fn ray(&self, screen: Point) -> Ray {
        let ndc_x = (screen.x - self.half_width()) / self.half_width();
        let ndc_y = (screen.y - self.half_height()) / self.half_height();

        let inverse = self.perspective.inverse();
        let near_world = inverse * DVec4::new(ndc_x, ndc_y, -1.0, 1.0);
        let far_world = inverse * DVec4::new(ndc_x, ndc_y, 1.0, 1.0);

        let near = near_world.truncate() / near_world.w;
        let far = far_world.truncate() / far_world.w;

        Ray {
            origin: near,
            direction: (far - near).normalize_or_zero(),
        }
    }

    /// Whether the camera differs from `other` enough to invalidate screen coordinates
    pub fn moved_from(&self, other: &ViewState) -> bool {
        self.width != other.width
            || self.height != other.height
            || !self.perspective.abs_diff_eq(other.perspective, 1e-12)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view() -> ViewState {
        ArcBallCamera::looking_at(DVec3::ZERO, 10.0).view_state(800.0, 600.0)
    }

    #[test]
    fn test_target_projects_to_center() {
        let v = view();
        let (p, w) = v.project(DVec3::ZERO).unwrap();
        assert!((p.x - 400.0).abs() < 1e-9);
        assert!((p.y - 300.0).abs() < 1e-9);
        assert!(w > 0.0);
    }

    #[test]
    fn test_behind_camera_rejected() {
        let cam = ArcBallCamera::looking_at(DVec3::ZERO, 10.0);
        let v = cam.view_state(800.0, 600.0);
        let behind = cam.eye_position() + (cam.eye_position() - cam.target);
        assert!(v.project(behind).is_none());
    }

    #[test]
    fn test_project_unproject_roundtrip() {
        let v = view();
        for world in [
            DVec3::new(1.0, 2.0, -0.5),
            DVec3::new(-2.5, 0.25, 1.75),
            DVec3::new(0.0, -1.0, 3.0),
        ] {
            let (screen, depth) = v.project(world).unwrap();
            assert!(v.contains(screen));
            let back = v.unproject(screen, depth).unwrap();
            assert!(
                (back - world).length() <= 1e-5 * world.length().max(1.0),
                "{world:?} -> {back:?}"
            );
        }
    }

    #[test]
    fn test_ray_passes_through_projected_point() {
        let v = view();
        let world = DVec3::new(1.0, 0.5, -1.0);
        let (screen, _) = v.project(world).unwrap();
        let ray = v.ray(screen);
        let to_point = world - ray.origin;
        let along = to_point.dot(ray.direction);
        let closest = ray.origin + ray.direction * along;
        assert!((closest - world).length() < 1e-6);
        assert!(along > 0.0);
    }

    #[test]
    fn test_moved_from() {
        let mut cam = ArcBallCamera::new();
        let a = cam.view_state(800.0, 600.0);
        assert!(!a.moved_from(&cam.view_state(800.0, 600.0)));
        cam.rotate(5.0, 0.0);
        assert!(a.moved_from(&cam.view_state(800.0, 600.0)));
        assert!(a.moved_from(&ArcBallCamera::new().view_state(640.0, 600.0)));
    }

    #[test]
    fn test_contains_is_half_open() {
        let v = view();
        assert!(v.contains(Point::new(0.0, 0.0)));
        assert!(!v.contains(Point::new(800.0, 10.0)));
        assert!(!v.contains(Point::new(10.0, -0.1)));
    }
}
