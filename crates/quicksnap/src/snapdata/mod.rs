//! Incremental screen-space indexing of snap candidates.
//!
//! A [`SnapData`] holds every candidate point for one role (source or target)
//! under a fixed camera. Objects are queued, sampled, projected and copied
//! into a pre-sized [`PointStore`] a batch at a time so that each tick stays
//! within its time budget. When the camera moves the whole `SnapData` is
//! thrown away and rebuilt.

pub mod batch;
pub mod index;
pub mod projector;
pub mod query;
pub mod queue;
pub mod sampler;
pub mod store;

use std::collections::{HashMap, HashSet};

use glam::DVec3;
use kurbo::Point;
use shared::{EditMode, ObjectData, ObjectId, OriginSnapping, SnapMode};

use crate::camera::ViewState;
use crate::host::SceneQuery;
use crate::settings::SnapSettings;

pub use batch::{BatchProducer, DriveOutcome, TimeBudget};
pub use index::ScreenIndex;
pub use query::{Candidate, SnapHit};
pub use queue::{Enqueued, ObjectQueue, QueueKind};
pub use sampler::{ElementRef, ObjectPath, SelectionFilter};
pub use store::{ObjectSampleState, PointOwner, PointStore, ScenePoint};

/// What a [`SnapData`] indexes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapRole {
    /// Points of the selection the user picks from
    Source,
    /// Points the picked source can be moved onto
    Target,
}

/// Indexed candidate points of one role
#[derive(Debug)]
pub struct SnapData {
    role: SnapRole,
    mode: SnapMode,
    edit_mode: EditMode,
    origin_snapping: OriginSnapping,
    batch_size: usize,
    view: ViewState,
    store: PointStore,
    origins: ScreenIndex,
    origin_points: HashSet<usize>,
    objects: Vec<ObjectPath>,
    slots: HashMap<ObjectPath, u32>,
    states: HashMap<ObjectId, ObjectSampleState>,
    queue: ObjectQueue,
    keep_processing: bool,
}

impl SnapData {
    /// Index the origins (and cursor) visible in `view` and queue the
    /// objects of `role` for sampling
    pub fn new<S: SceneQuery + ?Sized>(
        role: SnapRole,
        scene: &S,
        view: ViewState,
        settings: &SnapSettings,
    ) -> Self {
        let edit_mode = scene.edit_mode();
        let mode = match role {
            SnapRole::Source => settings.snap_source_type,
            SnapRole::Target => settings.snap_target_type,
        };
        let selection = scene.selected_objects();
        let others = scene.scene_objects(true);
        let capacity = Self::max_point_count(role, scene, mode, edit_mode, &selection, &others);

        let mut data = Self {
            role,
            mode,
            edit_mode,
            origin_snapping: settings.snap_objects_origin,
            batch_size: settings.batch_size.max(1),
            view,
            store: PointStore::new(capacity),
            origins: ScreenIndex::new(),
            origin_points: HashSet::new(),
            objects: Vec::new(),
            slots: HashMap::new(),
            states: HashMap::new(),
            queue: ObjectQueue::new(),
            keep_processing: true,
        };
        data.add_roots(scene, &selection, &others);
        data.enqueue_initial(scene, &selection, &others);

        tracing::debug!(
            "{role:?} snap data: capacity {capacity}, {} origin(s), {} selected / {} scene object(s) queued",
            data.origin_points.len(),
            data.queue.pending(QueueKind::Selected),
            data.queue.pending(QueueKind::Scene),
        );
        data
    }

    /// Upper bound of the points this role can ever index
    fn max_point_count<S: SceneQuery + ?Sized>(
        role: SnapRole,
        scene: &S,
        mode: SnapMode,
        edit_mode: EditMode,
        selection: &[ObjectId],
        others: &[ObjectId],
    ) -> usize {
        let elements = |ids: &[ObjectId]| -> usize {
            if mode == SnapMode::Origins {
                return 0;
            }
            ids.iter()
                .filter_map(|id| scene.object(id))
                .map(|object| sampler::element_count(scene, object, mode))
                .sum()
        };
        match (role, edit_mode) {
            (SnapRole::Source, EditMode::Object) => selection.len() + elements(selection),
            (SnapRole::Source, EditMode::Edit) => elements(selection),
            (SnapRole::Target, EditMode::Object) => others.len() + 1 + elements(others),
            (SnapRole::Target, EditMode::Edit) => {
                others.len() + selection.len() + 1 + elements(others) + elements(selection)
            }
        }
    }

    fn add_roots<S: SceneQuery + ?Sized>(&mut self, scene: &S, selection: &[ObjectId], others: &[ObjectId]) {
        let start = self.store.len();
        match (self.role, self.edit_mode) {
            (SnapRole::Source, EditMode::Object) => {
                for id in selection {
                    self.add_origin(scene, id);
                }
            }
            (SnapRole::Source, EditMode::Edit) => {}
            (SnapRole::Target, edit_mode) => {
                for id in others {
                    self.add_origin(scene, id);
                }
                if edit_mode == EditMode::Edit {
                    for id in selection {
                        self.add_origin(scene, id);
                    }
                }
                let cursor = scene.cursor_location();
                if let Some(index) = self.add_point(cursor, PointOwner::Cursor) {
                    self.store.insert_range(index, index + 1);
                }
            }
        }
        if self.store.len() > start {
            self.store.rebalance();
        }
        self.origins.rebalance();
    }

    fn add_origin<S: SceneQuery + ?Sized>(&mut self, scene: &S, id: &str) {
        let Some(matrix) = scene.world_matrix(id) else {
            return;
        };
        let slot = self.slot_for(&ObjectPath::root(id));
        if let Some(index) = self.add_point(matrix.transform_point3(DVec3::ZERO), PointOwner::Object(slot)) {
            let screen = self.store.points()[index].screen;
            self.origins.insert(screen, index);
            self.origin_points.insert(index);
            if self.origin_snapping == OriginSnapping::Always {
                self.store.insert_range(index, index + 1);
            }
        }
    }

    /// Project and store a single synthetic point; None when not visible
    fn add_point(&mut self, world: DVec3, owner: PointOwner) -> Option<usize> {
        let (screen, depth) = self.view.project(world)?;
        if !self.view.contains(screen) {
            return None;
        }
        Some(self.store.push(ScenePoint {
            world,
            screen,
            depth,
            owner,
            element: ElementRef::Synthetic,
        }))
    }

    fn enqueue_initial<S: SceneQuery + ?Sized>(&mut self, scene: &S, selection: &[ObjectId], others: &[ObjectId]) {
        if self.mode == SnapMode::Origins {
            return;
        }
        match self.role {
            SnapRole::Source => {
                for id in selection {
                    self.enqueue(scene, id, QueueKind::Selected, false);
                }
            }
            SnapRole::Target => {
                if self.edit_mode == EditMode::Edit {
                    for id in selection {
                        self.enqueue(scene, id, QueueKind::Selected, false);
                    }
                }
                // Objects a ray cast cannot find are staged now, the rest
                // wait at the back of the queue until they are drained or
                // hovered.
                for id in others {
                    if scene.object(id).is_some_and(|o| !is_ray_castable(&o.data)) {
                        self.enqueue(scene, id, QueueKind::Scene, false);
                    } else if self.queue.enqueue(id, QueueKind::Scene, false) == Enqueued::Inserted {
                        let filter = self.filter_for(QueueKind::Scene);
                        self.states.insert(id.clone(), ObjectSampleState::pending(id, filter));
                    }
                }
            }
        }
    }

    /// Queue `id`, sampling it right away when it is new. `prioritize` moves
    /// an already queued object to the front of its list.
    pub fn enqueue<S: SceneQuery + ?Sized>(
        &mut self,
        scene: &S,
        id: &str,
        kind: QueueKind,
        prioritize: bool,
    ) -> Enqueued {
        // origins were indexed at construction
        if self.mode == SnapMode::Origins {
            return Enqueued::Unchanged;
        }
        let outcome = self.queue.enqueue(id, kind, prioritize);
        if outcome == Enqueued::Inserted {
            let filter = self.filter_for(kind);
            let mut state = ObjectSampleState::pending(id, filter);
            state.stage(self.sample_and_project(scene, id, filter));
            self.states.insert(id.to_string(), state);
        }
        outcome
    }

    /// Move a hovered object to the front of the queue it belongs to
    pub fn prioritize<S: SceneQuery + ?Sized>(&mut self, scene: &S, id: &str) -> Enqueued {
        let kind = match self.role {
            SnapRole::Source => QueueKind::Selected,
            SnapRole::Target if self.queue.queued(QueueKind::Selected).any(|q| q == id) => QueueKind::Selected,
            SnapRole::Target => QueueKind::Scene,
        };
        self.enqueue(scene, id, kind, true)
    }

    fn filter_for(&self, kind: QueueKind) -> SelectionFilter {
        match (kind, self.edit_mode, self.role) {
            (QueueKind::Selected, EditMode::Edit, SnapRole::Source) => SelectionFilter::Selected,
            (QueueKind::Selected, EditMode::Edit, SnapRole::Target) => SelectionFilter::Unselected,
            _ => SelectionFilter::All,
        }
    }

    fn slot_for(&mut self, path: &ObjectPath) -> u32 {
        if let Some(slot) = self.slots.get(path) {
            return *slot;
        }
        let slot = self.objects.len() as u32;
        self.objects.push(path.clone());
        self.slots.insert(path.clone(), slot);
        slot
    }

    fn sample_and_project<S: SceneQuery + ?Sized>(
        &mut self,
        scene: &S,
        id: &str,
        filter: SelectionFilter,
    ) -> Vec<ScenePoint> {
        let (Some(object), Some(matrix)) = (scene.object(id), scene.world_matrix(id)) else {
            return Vec::new();
        };
        let sampled = sampler::sample_object(scene, object, self.mode, filter);
        let projection = projector::project_points(&sampled.points, &matrix, &self.view);
        let slots: Vec<u32> = sampled.paths.iter().map(|path| self.slot_for(path)).collect();

        projection
            .kept
            .iter()
            .enumerate()
            .map(|(k, &i)| ScenePoint {
                world: projection.world[k],
                screen: projection.screen[k],
                depth: projection.depth[k],
                owner: PointOwner::Object(slots[sampled.owners[i] as usize]),
                element: sampled.elements[i],
            })
            .collect()
    }

    /// Index queued objects until done or out of budget. Returns true when
    /// new points became queryable.
    pub fn process_iteration<S: SceneQuery + ?Sized>(&mut self, scene: &S, budget: &TimeBudget) -> bool {
        if !self.keep_processing {
            return false;
        }
        let before = self.store.len();

        let drain_selected = self.role == SnapRole::Source || self.edit_mode == EditMode::Edit;
        let mut outcome = DriveOutcome::Finished;
        if drain_selected {
            outcome = self.drain_queue(scene, QueueKind::Selected, budget);
        }
        if outcome == DriveOutcome::Finished && self.role == SnapRole::Target {
            self.drain_queue(scene, QueueKind::Scene, budget);
        }
        if self.queue.is_empty(QueueKind::Selected) && self.queue.is_empty(QueueKind::Scene) {
            self.keep_processing = false;
            tracing::debug!("{:?} snap data complete: {} point(s)", self.role, self.store.len());
        }

        self.store.len() > before
    }

    fn drain_queue<S: SceneQuery + ?Sized>(
        &mut self,
        scene: &S,
        kind: QueueKind,
        budget: &TimeBudget,
    ) -> DriveOutcome {
        while let Some(id) = self.queue.front(kind).cloned() {
            if !self.states.get(&id).is_some_and(ObjectSampleState::is_staged) {
                let filter = self.filter_for(kind);
                let points = self.sample_and_project(scene, &id, filter);
                self.states
                    .entry(id.clone())
                    .or_insert_with(|| ObjectSampleState::pending(&id, filter))
                    .stage(points);
            }

            let start = self.store.len();
            let outcome = match self.states.get_mut(&id) {
                Some(state) => batch::drive(state, &mut self.store, self.batch_size, budget),
                None => DriveOutcome::Finished,
            };
            let end = self.store.len();
            if end > start {
                self.store.insert_range(start, end);
                self.store.rebalance();
            }

            if outcome == DriveOutcome::Yielded {
                return DriveOutcome::Yielded;
            }
            self.queue.mark_processed(&id, kind);
            self.states.remove(&id);
        }
        DriveOutcome::Finished
    }

    /// Best-scoring point within `radius` pixels of `mouse`
    pub fn query_nearest(&self, mouse: Point, radius: f64) -> Option<SnapHit> {
        self.query_nearest_filtered(mouse, radius, |_| true)
    }

    /// Like [`SnapData::query_nearest`], ignoring points rejected by `keep`
    pub fn query_nearest_filtered(
        &self,
        mouse: Point,
        radius: f64,
        keep: impl Fn(&ScenePoint) -> bool,
    ) -> Option<SnapHit> {
        let points = self.store.points();
        let candidates: Vec<Candidate> = self
            .store
            .index()
            .within(mouse, radius)
            .into_iter()
            .filter(|(index, _)| keep(&points[*index]))
            .map(|(index, distance)| Candidate {
                index,
                distance,
                depth: points[index].depth,
            })
            .collect();
        let best = query::best_candidate(&candidates, radius)?;
        Some(self.hit(best.index, best.distance))
    }

    /// Nearest origin within `threshold` pixels
    pub fn query_nearest_origin(&self, mouse: Point, threshold: f64) -> Option<SnapHit> {
        let (index, distance) = self.origins.nearest(mouse)?;
        if distance > threshold {
            return None;
        }
        Some(self.hit(index, distance))
    }

    fn hit(&self, index: usize, distance: f64) -> SnapHit {
        let point = &self.store.points()[index];
        SnapHit {
            index,
            distance,
            world: point.world,
            screen: point.screen,
            object: self.owner_path(point.owner).cloned(),
            is_origin: self.origin_points.contains(&index),
            element: point.element,
        }
    }

    pub fn owner_path(&self, owner: PointOwner) -> Option<&ObjectPath> {
        match owner {
            PointOwner::Object(slot) => self.objects.get(slot as usize),
            PointOwner::Cursor => None,
        }
    }

    pub fn point(&self, index: usize) -> Option<&ScenePoint> {
        self.store.get(index)
    }

    pub fn role(&self) -> SnapRole {
        self.role
    }

    pub fn mode(&self) -> SnapMode {
        self.mode
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.store.capacity()
    }

    /// True once every queued object has been indexed
    pub fn is_done(&self) -> bool {
        !self.keep_processing
    }

    pub fn is_processed(&self, id: &str) -> bool {
        self.queue.is_processed(id)
    }

    pub fn processed(&self) -> &HashSet<ObjectId> {
        self.queue.processed()
    }

    pub fn queue(&self) -> &ObjectQueue {
        &self.queue
    }
}

/// Meshes with polygons can be found by ray casting; everything else has to
/// be indexed without waiting for the mouse
fn is_ray_castable(data: &ObjectData) -> bool {
    match data {
        ObjectData::Mesh(mesh) => mesh.vertices.is_empty() || !mesh.polygons.is_empty(),
        ObjectData::Curve(_) => false,
        ObjectData::Instance { .. } | ObjectData::Empty => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::harness::SceneHarness;
    use std::time::Duration;

    fn settings() -> SnapSettings {
        SnapSettings::default()
    }

    fn fill(data: &mut SnapData, harness: &SceneHarness) {
        let mut guard = 0;
        while !data.is_done() {
            data.process_iteration(harness, &TimeBudget::unlimited());
            guard += 1;
            assert!(guard < 100);
        }
    }

    #[test]
    fn test_source_indexes_selection_and_origin() {
        let harness = SceneHarness::new(fixtures::cube_and_plane());
        let view = harness.view();
        let mut source = SnapData::new(SnapRole::Source, &harness, view, &settings());
        // origin of the cube is indexed immediately
        assert_eq!(source.len(), 1);
        fill(&mut source, &harness);
        assert_eq!(source.len(), 9);
        assert!(source.len() <= source.capacity());
        assert!(source.is_processed("cube"));
        assert!(!source.is_processed("plane"));
    }

    #[test]
    fn test_target_excludes_selection_in_object_mode() {
        let harness = SceneHarness::new(fixtures::cube_and_plane());
        let mut target = SnapData::new(SnapRole::Target, &harness, harness.view(), &settings());
        fill(&mut target, &harness);
        // plane origin, cursor, 4 plane vertices
        assert_eq!(target.len(), 6);
        assert!(target.len() <= target.capacity());
        let owners: HashSet<&str> = target
            .store
            .points()
            .iter()
            .filter_map(|p| target.owner_path(p.owner))
            .map(ObjectPath::root_id)
            .collect();
        assert_eq!(owners, ["plane"].into_iter().collect());
    }

    #[test]
    fn test_origin_snapping_key_keeps_origins_out_of_general_index() {
        let harness = SceneHarness::new(fixtures::cube_and_plane());
        let view = harness.view();
        let (origin_screen, _) = view.project(DVec3::ZERO).unwrap();

        let always = SnapData::new(SnapRole::Source, &harness, view.clone(), &settings());
        let hit = always.query_nearest(origin_screen, 20.0).unwrap();
        assert!(hit.is_origin);
        assert_eq!(hit.root_id(), Some("cube"));

        let key = SnapData::new(
            SnapRole::Source,
            &harness,
            view,
            &SnapSettings {
                snap_objects_origin: OriginSnapping::Key,
                ..settings()
            },
        );
        assert!(key.query_nearest(origin_screen, 20.0).is_none());
        let origin = key.query_nearest_origin(origin_screen, 40.0).unwrap();
        assert!(origin.is_origin);
        assert_eq!(origin.element.index(), -1);
        assert!(key.query_nearest_origin(origin_screen + kurbo::Vec2::new(45.0, 0.0), 40.0).is_none());
    }

    #[test]
    fn test_zero_budget_resumes_across_calls() {
        let harness = SceneHarness::new(fixtures::dense_grid(50));
        let mut source = SnapData::new(SnapRole::Source, &harness, harness.view(), &settings());
        let zero = TimeBudget::new(Duration::ZERO);
        let origin_count = source.len();

        assert!(source.process_iteration(&harness, &zero));
        assert_eq!(source.len(), origin_count + 1000);
        assert!(source.process_iteration(&harness, &zero));
        assert_eq!(source.len(), origin_count + 2000);
        assert!(!source.is_done());
        assert!(source.process_iteration(&harness, &zero));
        assert_eq!(source.len(), origin_count + 2500);
        assert!(source.is_done());
        assert!(!source.process_iteration(&harness, &zero));
    }

    #[test]
    fn test_query_is_deterministic() {
        let harness = SceneHarness::new(fixtures::dense_grid(20));
        let mut source = SnapData::new(SnapRole::Source, &harness, harness.view(), &settings());
        fill(&mut source, &harness);
        let mouse = Point::new(640.0, 360.0);
        let first = source.query_nearest(mouse, 20.0).unwrap();
        for _ in 0..5 {
            assert_eq!(source.query_nearest(mouse, 20.0).unwrap().index, first.index);
        }
    }

    #[test]
    fn test_lazy_scene_objects_are_indexed_when_drained() {
        let harness = SceneHarness::new(fixtures::cube_and_plane());
        let target = SnapData::new(SnapRole::Target, &harness, harness.view(), &settings());
        assert_eq!(target.queue().pending(QueueKind::Scene), 1);
        assert!(!target.states["plane"].is_staged());
    }

    #[test]
    fn test_curves_are_staged_eagerly() {
        let harness = SceneHarness::new(fixtures::curve_scene());
        let target = SnapData::new(SnapRole::Target, &harness, harness.view(), &settings());
        assert!(target.states["curve"].is_staged());
        assert_eq!(target.states["curve"].staged_count(), 3);
    }

    #[test]
    fn test_edit_mode_target_uses_unselected_points() {
        let harness = SceneHarness::new(fixtures::edit_mode_strip());
        let mut target = SnapData::new(SnapRole::Target, &harness, harness.view(), &settings());
        fill(&mut target, &harness);
        let elements: Vec<ElementRef> = target
            .store
            .points()
            .iter()
            .filter(|p| p.element != ElementRef::Synthetic)
            .map(|p| p.element)
            .collect();
        assert_eq!(elements, vec![ElementRef::Vertex(2), ElementRef::Vertex(3)]);

        let mut source = SnapData::new(SnapRole::Source, &harness, harness.view(), &settings());
        fill(&mut source, &harness);
        // no origins in edit mode
        assert!(source.store.points().iter().all(|p| p.element != ElementRef::Synthetic));
        assert_eq!(source.len(), 2);
    }

    #[test]
    fn test_capacity_bound_holds_for_all_modes() {
        for scene in [fixtures::cube_and_plane(), fixtures::instance_scene(), fixtures::curve_scene()] {
            let harness = SceneHarness::new(scene);
            for mode in [SnapMode::Points, SnapMode::Midpoints, SnapMode::Faces, SnapMode::Origins] {
                let s = SnapSettings {
                    snap_source_type: mode,
                    snap_target_type: mode,
                    ..settings()
                };
                for role in [SnapRole::Source, SnapRole::Target] {
                    let mut data = SnapData::new(role, &harness, harness.view(), &s);
                    fill(&mut data, &harness);
                    assert!(data.len() <= data.capacity(), "{role:?} {mode:?}");
                }
            }
        }
    }
}
