//! Batched local -> world -> screen projection of sampled points

use glam::{DMat4, DVec3};
use kurbo::Point;

use crate::camera::ViewState;

/// Projected points that survived clipping, with the index of each one in
/// the input array
#[derive(Debug, Default, Clone)]
pub struct Projection {
    pub world: Vec<DVec3>,
    pub screen: Vec<Point>,
    /// Clip-space w, monotonic with the distance to the camera
    pub depth: Vec<f64>,
    pub kept: Vec<usize>,
}

impl Projection {
    pub fn len(&self) -> usize {
        self.kept.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kept.is_empty()
    }
}

/// Project `local` points through `matrix` (object -> world) and the view.
/// Points behind the camera or outside the region are dropped.
pub fn project_points(local: &[DVec3], matrix: &DMat4, view: &ViewState) -> Projection {
    let world: Vec<DVec3> = local.iter().map(|p| matrix.transform_point3(*p)).collect();
    let clip: Vec<_> = world.iter().map(|p| view.perspective * p.extend(1.0)).collect();

    let mut out = Projection::default();
    for (i, (w, c)) in world.into_iter().zip(clip).enumerate() {
        if c.w <= 0.0 {
            continue;
        }
        let screen = view.clip_to_region(c);
        if !view.contains(screen) {
            continue;
        }
        out.world.push(w);
        out.screen.push(screen);
        out.depth.push(c.w);
        out.kept.push(i);
    }
    out
}
