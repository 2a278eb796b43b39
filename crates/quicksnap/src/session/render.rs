//! What the viewport draws while a session runs

use glam::DVec3;
use kurbo::Point;
use shared::{ObjectData, SnapMode};

use crate::host::SceneQuery;
use crate::snapdata::sampler::resolve_path;
use crate::snapdata::{ElementRef, ObjectPath};

use super::constraint::ConstraintState;
use super::{SessionState, SessionStatus};

const SNAPPING_HELP: &str = "Use (Shift+)X/Y/Z to constraint to the world/local axis or plane. \
Use O to snap to object origins. Right Mouse Button/ESC to cancel the operation. ";

/// Mouse cursor shape requested from the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CursorStyle {
    #[default]
    Default,
    /// Nothing under the mouse can be picked
    Crosshair,
    /// A source point can be picked, or a move is in progress
    Move,
}

/// World-space geometry of the hovered element
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ElementHighlight {
    pub edges: Vec<[DVec3; 2]>,
    pub faces: Vec<[DVec3; 3]>,
}

impl ElementHighlight {
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty() && self.faces.is_empty()
    }
}

/// Snapshot returned by every tick
#[derive(Debug, Clone, PartialEq)]
pub struct RenderState {
    pub state: SessionState,
    pub status: SessionStatus,
    pub mouse: Point,
    /// Hovered source point (Idle) or the picked source (SourcePicked)
    pub source: Option<Point>,
    pub source_actionable: bool,
    /// Hovered target point
    pub snapped_target: Option<Point>,
    /// Where the source is being moved to
    pub target: Option<Point>,
    pub target_world: Option<DVec3>,
    pub rubberband: Option<[Point; 2]>,
    pub constraint_lines: Vec<[DVec3; 2]>,
    pub highlight: ElementHighlight,
    pub cursor: CursorStyle,
    pub status_line: String,
}

/// Header text describing the current step and active modifiers
pub fn status_line(state: SessionState, constraint: &ConstraintState, origins_only: bool) -> String {
    let mut help = String::from(SNAPPING_HELP);
    let mut axis = "";
    if origins_only {
        help.push_str("Snapping to origins only. ");
    }
    if let Some(c) = constraint.constraint {
        if !origins_only {
            help.clear();
        }
        let kind = if c.is_plane() { "plane" } else { "axis" };
        help.push_str(&format!("Constrained on {} {kind}", c.label()));
        axis = if constraint.local { "(Local)" } else { "(World)" };
    }
    let step = match state {
        SessionState::Idle => "Pick the source vertex/point.",
        SessionState::SourcePicked => "Move the mouse over the target vertex/point.",
    };
    format!("QuickSnap: {step} {help}{axis}")
}

/// Edges touching a vertex, the halves of an edge, or the outline and
/// triangle fan of a face. Origins, the cursor and curve points have none.
pub fn element_highlight<S: SceneQuery + ?Sized>(
    scene: &S,
    path: &ObjectPath,
    element: ElementRef,
    mode: SnapMode,
) -> ElementHighlight {
    let mut out = ElementHighlight::default();
    let Some((object, matrix)) = resolve_path(scene, path) else {
        return out;
    };
    let ObjectData::Mesh(mesh) = &object.data else {
        return out;
    };
    let co = |i: u32| {
        mesh.vertices
            .get(i as usize)
            .map(|c| matrix.transform_point3(DVec3::from_array(*c)))
    };

    match (mode, element) {
        (SnapMode::Points, ElementRef::Vertex(v)) => {
            for [a, b] in mesh.edges.iter().filter(|[a, b]| *a == v || *b == v) {
                if let (Some(a), Some(b)) = (co(*a), co(*b)) {
                    out.edges.push([a, b]);
                }
            }
        }
        (SnapMode::Midpoints, ElementRef::Edge(e)) => {
            if let Some([a, b]) = mesh.edges.get(e as usize) {
                if let (Some(a), Some(b)) = (co(*a), co(*b)) {
                    let mid = (a + b) * 0.5;
                    out.edges.push([mid, a]);
                    out.edges.push([mid, b]);
                }
            }
        }
        (SnapMode::Faces, ElementRef::Face(f)) => {
            let Some(polygon) = mesh.polygons.get(f as usize) else {
                return out;
            };
            let corners: Vec<DVec3> = polygon.iter().filter_map(|i| co(*i)).collect();
            if corners.len() != polygon.len() || corners.len() < 2 {
                return out;
            }
            for (k, a) in corners.iter().enumerate() {
                out.edges.push([*a, corners[(k + 1) % corners.len()]]);
            }
            for k in 1..corners.len().saturating_sub(1) {
                out.faces.push([corners[0], corners[k], corners[k + 1]]);
            }
        }
        _ => {}
    }
    out
}
