//! Headless host for driving snapping sessions from tests and scripts.
//!
//! Holds a [`SceneDescription`], an orbit camera and the viewport size, and
//! implements every host trait in memory. Matrices written through
//! [`TransformApply::set_local_matrix`] are kept as-is next to the scene so
//! that restoring a backed-up matrix gives back the exact same bits.

use std::collections::HashMap;

use glam::{DMat4, DVec3, EulerRot};
use shared::{Collection, EditMode, ObjectData, ObjectId, SceneDescription, SceneObject, Transform};

use crate::camera::{ArcBallCamera, ViewState};
use crate::helpers::transform_matrix;
use crate::host::{CurvePointEdit, DisplayFlags, Highlight, RayFilter, RayHit, SceneQuery, TransformApply, Viewport};
use crate::picking::{pick_polygon, Ray};

/// Parent chains longer than this are treated as cycles
const MAX_PARENT_DEPTH: usize = 64;

/// One committed edit
#[derive(Debug, Clone)]
pub struct UndoStep {
    pub label: String,
    scene: SceneDescription,
    overrides: HashMap<ObjectId, DMat4>,
}

/// Headless viewport, scene and undo stack
#[derive(Debug, Clone)]
pub struct SceneHarness {
    pub scene: SceneDescription,
    pub camera: ArcBallCamera,
    width: f64,
    height: f64,
    overrides: HashMap<ObjectId, DMat4>,
    display: HashMap<ObjectId, DisplayFlags>,
    undo_stack: Vec<UndoStep>,
    /// State at the last commit
    committed: (SceneDescription, HashMap<ObjectId, DMat4>),
}

impl SceneHarness {
    pub fn new(scene: SceneDescription) -> Self {
        Self {
            committed: (scene.clone(), HashMap::new()),
            scene,
            camera: ArcBallCamera::looking_at(DVec3::new(1.5, 0.0, 0.0), 12.0),
            width: 1280.0,
            height: 720.0,
            overrides: HashMap::new(),
            display: HashMap::new(),
            undo_stack: Vec::new(),
        }
    }

    /// Replace the scene, dropping transform overrides and history
    pub fn load_scene(&mut self, scene: SceneDescription) {
        self.committed = (scene.clone(), HashMap::new());
        self.scene = scene;
        self.overrides.clear();
        self.display.clear();
        self.undo_stack.clear();
    }

    pub fn load_scene_json(&mut self, json: &str) -> Result<(), String> {
        let scene: SceneDescription = serde_json::from_str(json).map_err(|e| format!("JSON parse error: {e}"))?;
        self.load_scene(scene);
        Ok(())
    }

    /// Scene with every matrix override written back as a transform
    pub fn baked_scene(&self) -> SceneDescription {
        let mut scene = self.scene.clone();
        for object in &mut scene.objects {
            if let Some(matrix) = self.overrides.get(&object.id) {
                object.transform = matrix_to_transform(matrix);
            }
        }
        scene
    }

    pub fn export_scene_json(&self) -> String {
        serde_json::to_string_pretty(&self.baked_scene()).unwrap_or_default()
    }

    /// Camera snapshot of the full region
    pub fn view(&self) -> ViewState {
        self.camera.view_state(self.width, self.height)
    }

    /// A zero-sized region means there is no 3D viewport
    pub fn set_viewport_size(&mut self, width: f64, height: f64) {
        self.width = width;
        self.height = height;
    }

    /// Rotate the camera by degrees
    pub fn orbit(&mut self, dx: f64, dy: f64) {
        self.camera.rotate(dx, dy);
    }

    /// Dolly the camera; positive `delta` moves closer
    pub fn zoom(&mut self, delta: f64) {
        self.camera.zoom(delta);
    }

    /// Move the camera target along the view plane
    pub fn pan(&mut self, dx: f64, dy: f64) {
        self.camera.pan(dx, dy);
    }

    /// Select exactly `ids`
    pub fn select_only(&mut self, ids: &[&str]) {
        for object in &mut self.scene.objects {
            object.selected = ids.contains(&object.id.as_str());
        }
    }

    pub fn set_edit_mode(&mut self, mode: EditMode) {
        self.scene.mode = mode;
    }

    /// World position of a mesh vertex
    pub fn vertex_world(&self, id: &str, index: usize) -> Option<DVec3> {
        let ObjectData::Mesh(mesh) = &self.scene.object(id)?.data else {
            return None;
        };
        let co = mesh.vertices.get(index)?;
        Some(self.world_matrix(id)?.transform_point3(DVec3::from_array(*co)))
    }

    /// World position of an object's origin
    pub fn origin_world(&self, id: &str) -> Option<DVec3> {
        Some(self.world_matrix(id)?.transform_point3(DVec3::ZERO))
    }

    pub fn undo_stack(&self) -> &[UndoStep] {
        &self.undo_stack
    }

    /// Revert the last commit
    pub fn undo(&mut self) -> bool {
        let Some(step) = self.undo_stack.pop() else {
            return false;
        };
        self.scene = step.scene;
        self.overrides = step.overrides;
        self.committed = (self.scene.clone(), self.overrides.clone());
        true
    }

    fn local_of(&self, object: &SceneObject) -> DMat4 {
        self.overrides
            .get(&object.id)
            .copied()
            .unwrap_or_else(|| transform_matrix(&object.transform))
    }

    fn mesh_hit(&self, ray: &Ray, object: &SceneObject, matrix: &DMat4, depth: usize) -> Option<(Option<usize>, f64)> {
        match &object.data {
            ObjectData::Mesh(mesh) => {
                pick_polygon(ray, &mesh.vertices, &mesh.polygons, matrix).map(|(face, t)| (Some(face), t))
            }
            ObjectData::Instance { collection } if depth < MAX_PARENT_DEPTH => {
                let collection = self.scene.collection(collection)?;
                let offset = DMat4::from_translation(-DVec3::from_array(collection.instance_offset));
                collection
                    .objects
                    .iter()
                    .filter_map(|child| {
                        let child_matrix = *matrix * offset * transform_matrix(&child.transform);
                        // faces of instanced geometry are not reported
                        self.mesh_hit(ray, child, &child_matrix, depth + 1).map(|(_, t)| (None, t))
                    })
                    .min_by(|a, b| a.1.total_cmp(&b.1))
            }
            _ => None,
        }
    }
}

fn matrix_to_transform(matrix: &DMat4) -> Transform {
    let (scale, rotation, translation) = matrix.to_scale_rotation_translation();
    let (rx, ry, rz) = rotation.to_euler(EulerRot::XYZ);
    Transform {
        position: translation.to_array(),
        rotation: [rx.to_degrees(), ry.to_degrees(), rz.to_degrees()],
        scale: scale.to_array(),
    }
}

impl SceneQuery for SceneHarness {
    fn edit_mode(&self) -> EditMode {
        self.scene.mode
    }

    fn selected_objects(&self) -> Vec<ObjectId> {
        self.scene
            .objects
            .iter()
            .filter(|o| o.visible && o.selected)
            .map(|o| o.id.clone())
            .collect()
    }

    fn scene_objects(&self, exclude_selection: bool) -> Vec<ObjectId> {
        self.scene
            .objects
            .iter()
            .filter(|o| o.visible && !(exclude_selection && o.selected))
            .map(|o| o.id.clone())
            .collect()
    }

    fn object(&self, id: &str) -> Option<&SceneObject> {
        self.scene.object(id)
    }

    fn collection(&self, name: &str) -> Option<&Collection> {
        self.scene.collection(name)
    }

    fn world_matrix(&self, id: &str) -> Option<DMat4> {
        let mut object = self.scene.object(id)?;
        let mut matrix = self.local_of(object);
        for _ in 0..MAX_PARENT_DEPTH {
            let Some(parent) = object.parent.as_deref().and_then(|p| self.scene.object(p)) else {
                return Some(matrix);
            };
            matrix = self.local_of(parent) * matrix;
            object = parent;
        }
        tracing::warn!("Parent chain of {id} does not end");
        Some(matrix)
    }

    fn cursor_location(&self) -> DVec3 {
        DVec3::from_array(self.scene.cursor)
    }
}

impl Viewport for SceneHarness {
    fn view_state(&self) -> Option<ViewState> {
        if self.width <= 0.0 || self.height <= 0.0 {
            return None;
        }
        Some(self.view())
    }

    fn ray_cast(&self, ray: &Ray, filter: RayFilter<'_>) -> Option<RayHit> {
        self.scene
            .objects
            .iter()
            .filter(|o| o.visible && filter.accepts(&o.id))
            .filter_map(|o| {
                let matrix = self.world_matrix(&o.id)?;
                let (face_index, distance) = self.mesh_hit(ray, o, &matrix, 0)?;
                Some(RayHit {
                    object: o.id.clone(),
                    face_index,
                    distance,
                })
            })
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }
}

impl TransformApply for SceneHarness {
    fn local_matrix(&self, id: &str) -> Option<DMat4> {
        self.scene.object(id).map(|o| self.local_of(o))
    }

    fn set_local_matrix(&mut self, id: &str, matrix: DMat4) {
        if self.scene.object(id).is_some() {
            self.overrides.insert(id.to_string(), matrix);
        }
    }

    fn set_vertex_positions(&mut self, id: &str, positions: &[(u32, DVec3)]) {
        let Some(ObjectData::Mesh(mesh)) = self.scene.object_mut(id).map(|o| &mut o.data) else {
            return;
        };
        for (index, co) in positions {
            if let Some(vertex) = mesh.vertices.get_mut(*index as usize) {
                *vertex = co.to_array();
            }
        }
    }

    fn set_curve_points(&mut self, id: &str, points: &[CurvePointEdit]) {
        let Some(ObjectData::Curve(curve)) = self.scene.object_mut(id).map(|o| &mut o.data) else {
            return;
        };
        for edit in points {
            let Some(spline) = curve.splines.get_mut(edit.spline) else {
                continue;
            };
            if edit.bezier {
                if let Some(p) = spline.bezier_points.get_mut(edit.index) {
                    p.co = edit.co.to_array();
                    p.handle_left = edit.handle_left.to_array();
                    p.handle_right = edit.handle_right.to_array();
                }
            } else if let Some(p) = spline.points.get_mut(edit.index) {
                p.co = edit.co.to_array();
            }
        }
    }

    fn commit(&mut self, label: &str) {
        let (scene, overrides) = std::mem::replace(&mut self.committed, (self.scene.clone(), self.overrides.clone()));
        self.undo_stack.push(UndoStep {
            label: label.to_string(),
            scene,
            overrides,
        });
        tracing::debug!("Committed undo step {label:?}");
    }
}

impl Highlight for SceneHarness {
    fn display_flags(&self, id: &str) -> DisplayFlags {
        self.display.get(id).copied().unwrap_or_default()
    }

    fn set_display_flags(&mut self, id: &str, flags: DisplayFlags) {
        self.display.insert(id.to_string(), flags);
    }
}
