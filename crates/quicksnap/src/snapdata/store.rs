//! Pre-sized, append-only storage of indexed snap points

use glam::DVec3;
use kurbo::Point;
use shared::ObjectId;

use super::batch::BatchProducer;
use super::index::ScreenIndex;
use super::sampler::{ElementRef, SelectionFilter};

/// Who a point belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointOwner {
    /// Slot in the owning [`super::SnapData`] object table
    Object(u32),
    /// The 3D cursor
    Cursor,
}

/// One snap candidate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScenePoint {
    pub world: DVec3,
    /// Region pixel position
    pub screen: Point,
    /// Clip-space w
    pub depth: f64,
    pub owner: PointOwner,
    pub element: ElementRef,
}

/// Per-object staging buffer, drained into a [`PointStore`] batch by batch
#[derive(Debug)]
pub struct ObjectSampleState {
    pub object: ObjectId,
    pub filter: SelectionFilter,
    staged: Option<Vec<ScenePoint>>,
    processed_point_count: usize,
}

impl ObjectSampleState {
    /// Queued but not sampled yet
    pub fn pending(object: &str, filter: SelectionFilter) -> Self {
        Self {
            object: object.to_string(),
            filter,
            staged: None,
            processed_point_count: 0,
        }
    }

    pub fn stage(&mut self, points: Vec<ScenePoint>) {
        self.staged = Some(points);
        self.processed_point_count = 0;
    }

    pub fn is_staged(&self) -> bool {
        self.staged.is_some()
    }

    /// Points already copied to the store
    pub fn processed_point_count(&self) -> usize {
        self.processed_point_count
    }

    pub fn staged_count(&self) -> usize {
        self.staged.as_ref().map_or(0, Vec::len)
    }
}

impl BatchProducer for ObjectSampleState {
    fn is_done(&self) -> bool {
        self.staged
            .as_ref()
            .is_some_and(|points| self.processed_point_count >= points.len())
    }

    fn produce_next(&mut self, store: &mut PointStore, batch_size: usize) -> usize {
        let Some(points) = self.staged.as_ref() else {
            panic!("{} drained before being staged", self.object);
        };
        let start = self.processed_point_count;
        let end = (start + batch_size).min(points.len());
        store.extend(&points[start..end]);
        self.processed_point_count = end;
        end - start
    }
}

/// Points of one [`super::SnapData`] with the general screen index.
///
/// The capacity is fixed at construction from an upper-bound scan of the
/// scene; exceeding it is a bug in that scan.
#[derive(Debug)]
pub struct PointStore {
    points: Vec<ScenePoint>,
    capacity: usize,
    index: ScreenIndex,
}

impl PointStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            points: Vec::with_capacity(capacity),
            capacity,
            index: ScreenIndex::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn get(&self, index: usize) -> Option<&ScenePoint> {
        self.points.get(index)
    }

    pub fn points(&self) -> &[ScenePoint] {
        &self.points
    }

    pub fn index(&self) -> &ScreenIndex {
        &self.index
    }

    /// Append one point, returning its index
    pub fn push(&mut self, point: ScenePoint) -> usize {
        self.extend(std::slice::from_ref(&point));
        self.points.len() - 1
    }

    fn extend(&mut self, points: &[ScenePoint]) {
        assert!(
            self.points.len() + points.len() <= self.capacity,
            "point store overflow: {} + {} > capacity {}",
            self.points.len(),
            points.len(),
            self.capacity
        );
        self.points.extend_from_slice(points);
    }

    /// Copy up to `batch_size` staged points of `state`
    pub fn drain(&mut self, state: &mut ObjectSampleState, batch_size: usize) -> usize {
        state.produce_next(self, batch_size)
    }

    /// Stage points `start..end` into the screen index without rebalancing
    pub fn insert_range(&mut self, start: usize, end: usize) {
        for (i, point) in self.points[start..end].iter().enumerate() {
            self.index.insert(point.screen, start + i);
        }
    }

    pub fn rebalance(&mut self) {
        self.index.rebalance();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(x: f64) -> ScenePoint {
        ScenePoint {
            world: DVec3::new(x, 0.0, 0.0),
            screen: Point::new(x, 10.0),
            depth: 5.0,
            owner: PointOwner::Object(0),
            element: ElementRef::Vertex(x as u32),
        }
    }

    #[test]
    fn test_drain_resumes_in_order() {
        let mut store = PointStore::new(5);
        let mut state = ObjectSampleState::pending("obj", SelectionFilter::All);
        assert!(!state.is_done());
        state.stage((0..5).map(|i| point(i as f64)).collect());

        assert_eq!(store.drain(&mut state, 2), 2);
        assert_eq!(state.processed_point_count(), 2);
        assert_eq!(store.drain(&mut state, 2), 2);
        assert!(!state.is_done());
        assert_eq!(store.drain(&mut state, 2), 1);
        assert!(state.is_done());

        let xs: Vec<f64> = store.points().iter().map(|p| p.world.x).collect();
        assert_eq!(xs, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_empty_stage_is_done() {
        let mut state = ObjectSampleState::pending("obj", SelectionFilter::All);
        state.stage(Vec::new());
        assert!(state.is_done());
        assert_eq!(state.staged_count(), 0);
    }

    #[test]
    fn test_insert_range_then_rebalance() {
        let mut store = PointStore::new(3);
        store.push(point(0.0));
        store.push(point(50.0));
        store.insert_range(0, 2);
        assert!(store.index().is_empty());
        store.rebalance();
        assert_eq!(store.index().len(), 2);
        assert_eq!(store.index().nearest(Point::new(45.0, 10.0)).map(|(i, _)| i), Some(1));
    }

    #[test]
    #[should_panic(expected = "point store overflow")]
    fn test_capacity_overflow_panics() {
        let mut store = PointStore::new(1);
        store.push(point(0.0));
        store.push(point(1.0));
    }
}
