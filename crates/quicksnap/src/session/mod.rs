//! Interactive snapping session.
//!
//! A session starts in [`SessionState::Idle`], where the user hovers the
//! selection to pick a source point. Pressing over an actionable source moves
//! it to [`SessionState::SourcePicked`], where every tick moves the selection
//! so the source lands on the hovered target. A second press confirms, cancel
//! restores the scene exactly as it was.

pub mod backup;
pub mod constraint;
pub mod input;
pub mod render;

use std::collections::HashSet;

use glam::{DQuat, DVec3};
use kurbo::{Point, Vec2};
use serde::Serialize;
use shared::{EditMode, ObjectId, SnapMode};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::camera::ViewState;
use crate::error::SessionError;
use crate::helpers::matrix_rotation;
use crate::host::{DisplayFlags, RayFilter, SceneQuery, SnapHost, Viewport};
use crate::settings::SnapSettings;
use crate::snapdata::{SnapData, SnapHit, SnapRole, TimeBudget};

pub use backup::Backup;
pub use constraint::{Constraint, ConstraintState};
pub use input::{HotKey, InputEvent};
pub use render::{CursorStyle, ElementHighlight, RenderState};

/// Undo step recorded on confirm
pub const UNDO_LABEL: &str = "Quick Snap";

/// Relative tolerance of the obstruction test
const OBSTRUCTION_TOLERANCE: f64 = 1e-3;

/// Step of the interaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    SourcePicked,
}

/// Whether the session still runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Running,
    Confirmed,
    Cancelled,
}

/// Object currently shown with highlight display flags
#[derive(Debug, Clone)]
struct HighlightedObject {
    id: ObjectId,
    is_root: bool,
    saved: DisplayFlags,
}

/// One snapping interaction, from begin to confirm or cancel
#[derive(Debug)]
pub struct SnapSession {
    id: Uuid,
    settings: SnapSettings,
    state: SessionState,
    status: SessionStatus,
    view: ViewState,
    source: SnapData,
    target: SnapData,
    edit_mode: EditMode,
    selection: HashSet<ObjectId>,
    single_selection: bool,
    /// Rotation of the first selected object, for local constraints
    local_rotation: Option<DQuat>,
    backup: Backup,
    mouse: Point,
    constraint: ConstraintState,
    origins_only: bool,
    wireframe: bool,
    closest_source: Option<SnapHit>,
    source_actionable: bool,
    /// World position of the picked source point
    picked_source: Option<DVec3>,
    closest_target: Option<SnapHit>,
    target_world: Option<DVec3>,
    translation: Option<DVec3>,
    highlighted: Option<HighlightedObject>,
}

impl SnapSession {
    /// Start a session on the host's current selection with the mouse at `mouse`
    pub fn begin<H: SnapHost + ?Sized>(host: &mut H, mouse: Point, settings: SnapSettings) -> Result<Self, SessionError> {
        let Some(view) = host.view_state() else {
            return Err(refuse(SessionError::NoViewport));
        };
        let selected = host.selected_objects();
        if selected.is_empty() {
            return Err(refuse(SessionError::NothingSelected));
        }
        let edit_mode = host.edit_mode();
        let backup = Backup::capture(&*host);
        if backup.is_empty() {
            return Err(refuse(SessionError::NothingPickable));
        }
        let local_rotation = host.world_matrix(&selected[0]).map(|m| matrix_rotation(&m));

        let source = SnapData::new(SnapRole::Source, &*host, view.clone(), &settings);
        let target = SnapData::new(SnapRole::Target, &*host, view.clone(), &settings);

        let id = Uuid::new_v4();
        info!(
            "QuickSnap session {id} started: {} object(s), {edit_mode:?} mode, {} -> {}",
            selected.len(),
            settings.snap_source_type.label(),
            settings.snap_target_type.label(),
        );

        let mut session = Self {
            id,
            wireframe: settings.display_target_wireframe,
            settings,
            state: SessionState::Idle,
            status: SessionStatus::Running,
            view,
            source,
            target,
            edit_mode,
            single_selection: selected.len() == 1,
            selection: selected.into_iter().collect(),
            local_rotation,
            backup,
            mouse,
            constraint: ConstraintState::default(),
            origins_only: false,
            closest_source: None,
            source_actionable: false,
            picked_source: None,
            closest_target: None,
            target_world: None,
            translation: None,
            highlighted: None,
        };
        let budget = TimeBudget::new(session.settings.time_budget());
        session.advance(&*host, &budget);
        session.refresh(host);
        Ok(session)
    }

    /// Process one event with the mouse at `mouse`
    pub fn tick<H: SnapHost + ?Sized>(&mut self, host: &mut H, mouse: Point, event: InputEvent) -> RenderState {
        if self.status != SessionStatus::Running {
            return self.render_state(&*host);
        }
        let budget = TimeBudget::new(self.settings.time_budget());
        let mut dirty = mouse != self.mouse;
        self.mouse = mouse;

        if let Some(view) = host.view_state() {
            if view.moved_from(&self.view) {
                self.rebuild(host, view);
                dirty = true;
            }
        }
        dirty |= self.advance(&*host, &budget);

        match event {
            InputEvent::Cancel => self.cancel(host),
            InputEvent::Press => self.press(host),
            InputEvent::Key { key, shift } => self.hotkey(host, key, shift),
            InputEvent::MouseMove | InputEvent::Timer => {
                if dirty {
                    self.refresh(host);
                }
            }
        }
        self.render_state(&*host)
    }

    /// Keep the current preview and record it as one undo step
    pub fn confirm<H: SnapHost + ?Sized>(&mut self, host: &mut H) {
        if self.status != SessionStatus::Running {
            return;
        }
        if self.translation.is_some() {
            host.commit(UNDO_LABEL);
        }
        self.finish(host, SessionStatus::Confirmed);
    }

    /// Put everything back the way it was before [`SnapSession::begin`]
    pub fn cancel<H: SnapHost + ?Sized>(&mut self, host: &mut H) {
        if self.status != SessionStatus::Running {
            return;
        }
        self.backup.restore(host);
        self.translation = None;
        self.finish(host, SessionStatus::Cancelled);
    }

    fn finish<H: SnapHost + ?Sized>(&mut self, host: &mut H, status: SessionStatus) {
        self.set_highlight(host, None);
        self.status = status;
        info!("QuickSnap session {} {status:?}", self.id);
    }

    fn press<H: SnapHost + ?Sized>(&mut self, host: &mut H) {
        match self.state {
            SessionState::Idle => {
                let picked = self
                    .closest_source
                    .as_ref()
                    .filter(|_| self.source_actionable)
                    .map(|hit| hit.world);
                match picked {
                    Some(world) => {
                        debug!("Source picked at {world:?}");
                        self.picked_source = Some(world);
                        self.state = SessionState::SourcePicked;
                        self.set_highlight(host, None);
                        self.refresh(host);
                    }
                    None => self.confirm(host),
                }
            }
            SessionState::SourcePicked => self.confirm(host),
        }
    }

    fn hotkey<H: SnapHost + ?Sized>(&mut self, host: &mut H, key: HotKey, shift: bool) {
        match key {
            HotKey::X | HotKey::Y | HotKey::Z => {
                if let Some(c) = key.axis().and_then(|axis| Constraint::from_key(axis, shift)) {
                    self.constraint.toggle(c, self.single_selection);
                }
            }
            HotKey::O => self.origins_only = !self.origins_only,
            HotKey::W => {
                self.wireframe = !self.wireframe;
                if let Some(h) = &self.highlighted {
                    host.set_display_flags(&h.id, highlight_flags(h.saved, h.is_root, self.wireframe));
                }
            }
        }
        self.refresh(host);
    }

    /// Drop both indexes and start over under the new camera
    fn rebuild<H: SnapHost + ?Sized>(&mut self, host: &mut H, view: ViewState) {
        debug!("Camera moved, rebuilding snap data");
        if self.translation.take().is_some() {
            self.backup.restore(host);
        }
        self.view = view.clone();
        self.source = SnapData::new(SnapRole::Source, &*host, view.clone(), &self.settings);
        self.target = SnapData::new(SnapRole::Target, &*host, view, &self.settings);
        self.closest_source = None;
        self.closest_target = None;
    }

    /// Index more points of the active role. While the source is being
    /// picked, a finished source lets the target start early.
    fn advance<H: SnapHost + ?Sized>(&mut self, host: &H, budget: &TimeBudget) -> bool {
        match self.state {
            SessionState::Idle => {
                let updated = self.source.process_iteration(host, budget);
                if self.source.is_done() && !budget.exhausted() {
                    self.target.process_iteration(host, budget);
                }
                updated
            }
            SessionState::SourcePicked => self.target.process_iteration(host, budget),
        }
    }

    fn refresh<H: SnapHost + ?Sized>(&mut self, host: &mut H) {
        self.update(host);
        self.apply(host);
    }

    /// Find the hovered source or target and highlight its object
    fn update<H: SnapHost + ?Sized>(&mut self, host: &mut H) {
        let ray = self.view.ray(self.mouse);
        match self.state {
            SessionState::Idle => {
                if let Some(hit) = host.ray_cast(&ray, RayFilter::Only(&self.selection)) {
                    self.source.prioritize(&*host, &hit.object);
                }
                let closest = self.find_closest(&*host, SnapRole::Source);
                self.source_actionable = closest
                    .as_ref()
                    .is_some_and(|hit| hit.distance <= self.settings.actionable_distance);
                let highlight = closest.as_ref().and_then(highlight_target);
                self.set_highlight(host, highlight);
                self.closest_source = closest;
            }
            SessionState::SourcePicked => {
                if !self.origins_only {
                    self.prioritize_targets(&*host);
                }
                let closest = self.find_closest(&*host, SnapRole::Target);
                let highlight = closest.as_ref().and_then(highlight_target);
                self.set_highlight(host, highlight);
                self.closest_target = closest;
            }
        }
    }

    /// Cast rays at and around the mouse and move hit objects to the front
    /// of the target queue
    fn prioritize_targets<H: SnapHost + ?Sized>(&mut self, host: &H) {
        let moving = self.moving_objects();
        let mut exclude = moving.clone();
        exclude.extend(self.target.processed().iter().cloned());

        let mut hits: Vec<ObjectId> = Vec::new();
        for point in ring(self.mouse, self.settings.ring_offset) {
            if let Some(hit) = host.ray_cast(&self.view.ray(point), RayFilter::Except(&exclude)) {
                if !hits.contains(&hit.object) {
                    hits.push(hit.object);
                }
            }
        }
        // the object right under the mouse goes first
        if let Some(hit) = host.ray_cast(&self.view.ray(self.mouse), RayFilter::Except(&moving)) {
            hits.retain(|id| id != &hit.object);
            hits.push(hit.object);
        }
        for id in hits {
            self.target.prioritize(host, &id);
        }
    }

    /// Objects following the mouse, which never act as targets or occluders
    fn moving_objects(&self) -> HashSet<ObjectId> {
        match self.edit_mode {
            EditMode::Object => self.selection.clone(),
            EditMode::Edit => HashSet::new(),
        }
    }

    fn find_closest<H: SnapHost + ?Sized>(&self, host: &H, role: SnapRole) -> Option<SnapHit> {
        let data = match role {
            SnapRole::Source => &self.source,
            SnapRole::Target => &self.target,
        };
        if self.origins_only || data.mode() == SnapMode::Origins {
            return data.query_nearest_origin(self.mouse, self.settings.origin_search_radius);
        }
        let radius = self.settings.search_radius;
        if !self.settings.filter_search_obstructed {
            return data.query_nearest(self.mouse, radius);
        }
        let ignore = match role {
            SnapRole::Source => HashSet::new(),
            SnapRole::Target => self.moving_objects(),
        };
        data.query_nearest_filtered(self.mouse, radius, |point| {
            !is_obstructed(host, &self.view, point.screen, point.world, &ignore)
        })
    }

    /// Move the selection so the picked source lands on the target
    fn apply<H: SnapHost + ?Sized>(&mut self, host: &mut H) {
        if self.state != SessionState::SourcePicked {
            return;
        }
        let Some(origin) = self.picked_source else {
            return;
        };
        let rotation = self.constraint.rotation(self.local_rotation);
        let target = match &self.closest_target {
            Some(hit) => Some(constraint::get_axis_target(origin, hit.world, self.constraint.constraint, rotation)),
            None => constraint::get_target_free(origin, &self.view.ray(self.mouse), self.constraint.constraint, rotation),
        };
        let translation = target.map_or(DVec3::ZERO, |t| t - origin);
        self.backup.apply(host, translation);
        self.target_world = target;
        self.translation = Some(translation);
    }

    /// Restore the flags of the previously highlighted object and highlight
    /// `target` (object id, whether the hovered point is its origin)
    fn set_highlight<H: SnapHost + ?Sized>(&mut self, host: &mut H, target: Option<(ObjectId, bool)>) {
        let wireframe = self.wireframe;
        if let (Some(current), Some((id, is_root))) = (self.highlighted.as_mut(), target.as_ref()) {
            if &current.id == id {
                if current.is_root != *is_root {
                    current.is_root = *is_root;
                    host.set_display_flags(id, highlight_flags(current.saved, *is_root, wireframe));
                }
                return;
            }
        }
        if let Some(previous) = self.highlighted.take() {
            host.set_display_flags(&previous.id, previous.saved);
        }
        if let Some((id, is_root)) = target {
            let saved = host.display_flags(&id);
            host.set_display_flags(&id, highlight_flags(saved, is_root, wireframe));
            self.highlighted = Some(HighlightedObject { id, is_root, saved });
        }
    }

    /// Snapshot for drawing
    pub fn render_state<H: SceneQuery + ?Sized>(&self, host: &H) -> RenderState {
        let project = |world: DVec3| self.view.project(world).map(|(p, _)| p);
        let running = self.status == SessionStatus::Running;

        let (source_world, hovered, hovered_mode) = match self.state {
            SessionState::Idle => (
                self.closest_source.as_ref().map(|h| h.world),
                self.closest_source.as_ref(),
                self.source.mode(),
            ),
            SessionState::SourcePicked => (self.picked_source, self.closest_target.as_ref(), self.target.mode()),
        };
        let source = match self.state {
            SessionState::Idle => self.closest_source.as_ref().map(|h| h.screen),
            SessionState::SourcePicked => self.picked_source.and_then(project),
        };
        let target = self.target_world.and_then(project);

        let highlight = match hovered {
            Some(hit) if running => match &hit.object {
                Some(path) => render::element_highlight(host, path, hit.element, hovered_mode),
                None => ElementHighlight::default(),
            },
            _ => ElementHighlight::default(),
        };
        let constraint_lines = match source_world {
            Some(origin) if running => self.constraint.lines(origin, self.constraint.rotation(self.local_rotation)),
            _ => Vec::new(),
        };
        let rubberband = match (source, target) {
            (Some(s), Some(t)) if running && self.settings.draw_rubberband => Some([s, t]),
            _ => None,
        };
        let cursor = match (self.status, self.state) {
            (SessionStatus::Running, SessionState::Idle) if self.source_actionable => CursorStyle::Move,
            (SessionStatus::Running, SessionState::Idle) => CursorStyle::Crosshair,
            (SessionStatus::Running, SessionState::SourcePicked) => CursorStyle::Move,
            _ => CursorStyle::Default,
        };

        RenderState {
            state: self.state,
            status: self.status,
            mouse: self.mouse,
            source,
            source_actionable: self.source_actionable,
            snapped_target: self.closest_target.as_ref().map(|h| h.screen),
            target,
            target_world: self.target_world,
            rubberband,
            constraint_lines,
            highlight,
            cursor,
            status_line: render::status_line(self.state, &self.constraint, self.origins_only),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn is_running(&self) -> bool {
        self.status == SessionStatus::Running
    }

    pub fn settings(&self) -> &SnapSettings {
        &self.settings
    }

    pub fn constraint(&self) -> ConstraintState {
        self.constraint
    }

    pub fn origins_only(&self) -> bool {
        self.origins_only
    }

    pub fn wireframe(&self) -> bool {
        self.wireframe
    }

    pub fn closest_source(&self) -> Option<&SnapHit> {
        self.closest_source.as_ref()
    }

    pub fn closest_target(&self) -> Option<&SnapHit> {
        self.closest_target.as_ref()
    }

    pub fn picked_source(&self) -> Option<DVec3> {
        self.picked_source
    }

    /// Translation of the current preview
    pub fn translation(&self) -> Option<DVec3> {
        self.translation
    }

    pub fn source_data(&self) -> &SnapData {
        &self.source
    }

    pub fn target_data(&self) -> &SnapData {
        &self.target
    }
}

fn refuse(error: SessionError) -> SessionError {
    warn!("QuickSnap cannot start: {error}");
    error
}

fn highlight_flags(saved: DisplayFlags, is_root: bool, wireframe: bool) -> DisplayFlags {
    DisplayFlags {
        wireframe: saved.wireframe || wireframe,
        bounds: saved.bounds || is_root,
        name: saved.name || is_root,
    }
}

fn highlight_target(hit: &SnapHit) -> Option<(ObjectId, bool)> {
    hit.root_id().map(|id| (id.to_string(), hit.is_origin))
}

/// The mouse and eight points around it at `offset` pixels
fn ring(mouse: Point, offset: f64) -> [Point; 9] {
    let o = offset;
    [
        mouse,
        mouse + Vec2::new(-o, -o),
        mouse + Vec2::new(0.0, -o),
        mouse + Vec2::new(o, -o),
        mouse + Vec2::new(-o, 0.0),
        mouse + Vec2::new(o, 0.0),
        mouse + Vec2::new(-o, o),
        mouse + Vec2::new(0.0, o),
        mouse + Vec2::new(o, o),
    ]
}

/// True when a surface lies noticeably closer to the camera than `world`
/// along the ray through `screen`
fn is_obstructed<V: Viewport + ?Sized>(
    host: &V,
    view: &ViewState,
    screen: Point,
    world: DVec3,
    ignore: &HashSet<ObjectId>,
) -> bool {
    let ray = view.ray(screen);
    let distance = (world - ray.origin).length();
    match host.ray_cast(&ray, RayFilter::Except(ignore)) {
        Some(hit) => hit.distance < distance * (1.0 - OBSTRUCTION_TOLERANCE),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::harness::SceneHarness;
    use crate::host::Highlight;

    fn screen_of(harness: &SceneHarness, world: DVec3) -> Point {
        harness.view().project(world).unwrap().0
    }

    #[test]
    fn test_begin_refuses_without_selection() {
        let mut harness = SceneHarness::new(fixtures::cube_and_plane());
        harness.select_only(&[]);
        let err = SnapSession::begin(&mut harness, Point::ZERO, SnapSettings::default()).unwrap_err();
        assert_eq!(err, SessionError::NothingSelected);
        assert_eq!(err.to_string(), "Nothing is selected");
    }

    #[test]
    fn test_begin_refuses_without_viewport() {
        let mut harness = SceneHarness::new(fixtures::cube_and_plane());
        harness.set_viewport_size(0.0, 0.0);
        let err = SnapSession::begin(&mut harness, Point::ZERO, SnapSettings::default()).unwrap_err();
        assert_eq!(err, SessionError::NoViewport);
    }

    #[test]
    fn test_begin_refuses_edit_mode_without_selected_points() {
        let mut scene = fixtures::edit_mode_strip();
        if let Some(object) = scene.object_mut("strip") {
            if let shared::ObjectData::Mesh(mesh) = &mut object.data {
                mesh.selected = vec![false; mesh.vertices.len()];
            }
        }
        let mut harness = SceneHarness::new(scene);
        let err = SnapSession::begin(&mut harness, Point::ZERO, SnapSettings::default()).unwrap_err();
        assert_eq!(err, SessionError::NothingPickable);
    }

    #[test]
    fn test_press_far_from_source_ends_without_change() {
        let mut harness = SceneHarness::new(fixtures::cube_and_plane());
        let before = harness.world_matrix("cube").unwrap();
        let far = Point::new(5.0, 5.0);
        let mut session = SnapSession::begin(&mut harness, far, SnapSettings::default()).unwrap();
        let state = session.tick(&mut harness, far, InputEvent::Press);
        assert_eq!(state.status, SessionStatus::Confirmed);
        assert_eq!(harness.world_matrix("cube").unwrap(), before);
        assert_eq!(harness.undo_stack().len(), 0);
    }

    #[test]
    fn test_hover_source_is_actionable() {
        let mut harness = SceneHarness::new(fixtures::cube_and_plane());
        let corner = screen_of(&harness, DVec3::new(1.0, 1.0, 1.0));
        let mut session = SnapSession::begin(&mut harness, corner, SnapSettings::default()).unwrap();
        let state = session.tick(&mut harness, corner, InputEvent::Timer);
        assert!(state.source_actionable);
        assert_eq!(state.cursor, CursorStyle::Move);
        let hit = session.closest_source().unwrap();
        assert!((hit.world - DVec3::new(1.0, 1.0, 1.0)).length() < 1e-9);
        assert_eq!(hit.root_id(), Some("cube"));
    }

    #[test]
    fn test_origins_only_key_switches_to_origins() {
        let mut harness = SceneHarness::new(fixtures::cube_and_plane());
        let origin = screen_of(&harness, DVec3::ZERO);
        let near_origin = origin + Vec2::new(30.0, 0.0);
        let mut session = SnapSession::begin(&mut harness, near_origin, SnapSettings::default()).unwrap();
        session.tick(&mut harness, near_origin, InputEvent::Key { key: HotKey::O, shift: false });
        assert!(session.origins_only());
        let hit = session.closest_source().unwrap();
        assert!(hit.is_origin);
        assert!(session.render_state(&harness).status_line.contains("Snapping to origins only."));
    }

    #[test]
    fn test_highlight_flags_are_restored() {
        let mut harness = SceneHarness::new(fixtures::cube_and_plane());
        let corner = screen_of(&harness, DVec3::new(1.0, 1.0, 1.0));
        let mut session = SnapSession::begin(&mut harness, corner, SnapSettings::default()).unwrap();
        session.tick(&mut harness, corner, InputEvent::Timer);
        assert!(harness.display_flags("cube").wireframe);
        session.tick(&mut harness, corner, InputEvent::Cancel);
        assert_eq!(harness.display_flags("cube"), DisplayFlags::default());
    }

    #[test]
    fn test_ring_is_centered_on_mouse() {
        let points = ring(Point::new(100.0, 100.0), 40.0);
        assert_eq!(points[0], Point::new(100.0, 100.0));
        let sum = points.iter().fold(Vec2::ZERO, |acc, p| acc + p.to_vec2());
        assert_eq!(sum / 9.0, Vec2::new(100.0, 100.0));
    }
}
