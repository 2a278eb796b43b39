//! Interfaces the snapping engine needs from its host application.
//!
//! The engine never owns the scene: it reads objects and geometry through
//! [`SceneQuery`], asks the [`Viewport`] for the camera and ray casts, writes
//! translations back through [`TransformApply`] and marks the hovered object
//! through [`Highlight`]. [`crate::harness::SceneHarness`] implements all of
//! them in memory.

use std::collections::HashSet;

use glam::{DMat4, DVec3};
use shared::{Collection, EditMode, ObjectId, SceneObject};

use crate::camera::ViewState;
use crate::picking::Ray;

/// Result of a host ray cast
#[derive(Debug, Clone, PartialEq)]
pub struct RayHit {
    pub object: ObjectId,
    /// Polygon index when the hit object is a mesh
    pub face_index: Option<usize>,
    /// Distance along the ray
    pub distance: f64,
}

/// Which objects a ray cast may hit
#[derive(Debug, Clone, Copy)]
pub enum RayFilter<'a> {
    /// Any visible object
    Any,
    /// Only the listed objects
    Only(&'a HashSet<ObjectId>),
    /// Everything except the listed objects
    Except(&'a HashSet<ObjectId>),
}

impl RayFilter<'_> {
    pub fn accepts(&self, id: &str) -> bool {
        match self {
            RayFilter::Any => true,
            RayFilter::Only(set) => set.contains(id),
            RayFilter::Except(set) => !set.contains(id),
        }
    }
}

/// Display flags of an object in the viewport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DisplayFlags {
    pub wireframe: bool,
    pub bounds: bool,
    pub name: bool,
}

/// Edited position of one curve point, in object-local space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurvePointEdit {
    pub spline: usize,
    pub index: usize,
    pub bezier: bool,
    pub co: DVec3,
    pub handle_left: DVec3,
    pub handle_right: DVec3,
}

/// Read access to the scene graph
pub trait SceneQuery {
    fn edit_mode(&self) -> EditMode;

    /// Visible selected objects (the edited objects in edit mode)
    fn selected_objects(&self) -> Vec<ObjectId>;

    /// Visible scene objects, optionally without the current selection
    fn scene_objects(&self, exclude_selection: bool) -> Vec<ObjectId>;

    fn object(&self, id: &str) -> Option<&SceneObject>;

    fn collection(&self, name: &str) -> Option<&Collection>;

    /// Object-local to world matrix
    fn world_matrix(&self, id: &str) -> Option<DMat4>;

    fn cursor_location(&self) -> DVec3;
}

/// Camera snapshot and ray casting
pub trait Viewport {
    /// None when there is no 3D region to work in
    fn view_state(&self) -> Option<ViewState>;

    /// Nearest hit of `ray` among objects accepted by `filter`
    fn ray_cast(&self, ray: &Ray, filter: RayFilter<'_>) -> Option<RayHit>;
}

/// Writes translations back to the scene
pub trait TransformApply {
    /// Transform relative to the parent, as a matrix
    fn local_matrix(&self, id: &str) -> Option<DMat4>;

    fn set_local_matrix(&mut self, id: &str, matrix: DMat4);

    /// Overwrite mesh vertex positions (object-local)
    fn set_vertex_positions(&mut self, id: &str, positions: &[(u32, DVec3)]);

    fn set_curve_points(&mut self, id: &str, points: &[CurvePointEdit]);

    /// Record everything applied since the previous commit as one undo step
    fn commit(&mut self, label: &str);
}

/// Viewport display flags used to highlight the hovered target
pub trait Highlight {
    fn display_flags(&self, id: &str) -> DisplayFlags;

    fn set_display_flags(&mut self, id: &str, flags: DisplayFlags);
}

/// Everything a snapping session needs from its host
pub trait SnapHost: SceneQuery + Viewport + TransformApply + Highlight {}

impl<T: SceneQuery + Viewport + TransformApply + Highlight> SnapHost for T {}
