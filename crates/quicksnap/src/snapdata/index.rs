//! Screen-space R-tree over point-store indices

use std::fmt;

use kurbo::Point;
use rstar::primitives::GeomWithData;
use rstar::RTree;

/// R-tree entry: region pixel position carrying the point-store index
pub type IndexedPoint = GeomWithData<[f64; 2], usize>;

/// 2D index of screen positions.
///
/// Insertions are staged and only become visible to queries after
/// [`ScreenIndex::rebalance`], which bulk-loads the whole tree once per batch.
pub struct ScreenIndex {
    tree: RTree<IndexedPoint>,
    entries: Vec<IndexedPoint>,
    pending: usize,
}

impl Default for ScreenIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ScreenIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScreenIndex")
            .field("len", &self.tree.size())
            .field("pending", &self.pending)
            .finish()
    }
}

impl ScreenIndex {
    pub fn new() -> Self {
        Self {
            tree: RTree::new(),
            entries: Vec::new(),
            pending: 0,
        }
    }

    /// Stage a point; queries do not see it until the next rebalance
    pub fn insert(&mut self, screen: Point, index: usize) {
        self.entries.push(GeomWithData::new([screen.x, screen.y], index));
        self.pending += 1;
    }

    /// Rebuild the tree from every staged and committed point
    pub fn rebalance(&mut self) {
        if self.pending == 0 {
            return;
        }
        self.tree = RTree::bulk_load(self.entries.clone());
        self.pending = 0;
    }

    /// Points staged since the last rebalance
    pub fn pending(&self) -> usize {
        self.pending
    }

    /// Number of queryable points
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Every point within `radius` pixels as (index, distance), ordered by index
    pub fn within(&self, center: Point, radius: f64) -> Vec<(usize, f64)> {
        let query = [center.x, center.y];
        let mut found: Vec<(usize, f64)> = self
            .tree
            .locate_within_distance(query, radius * radius)
            .map(|entry| (entry.data, distance(entry.geom(), &query)))
            .collect();
        found.sort_unstable_by_key(|(index, _)| *index);
        found
    }

    /// Nearest point as (index, distance)
    pub fn nearest(&self, center: Point) -> Option<(usize, f64)> {
        let query = [center.x, center.y];
        self.tree
            .nearest_neighbor(&query)
            .map(|entry| (entry.data, distance(entry.geom(), &query)))
    }
}

fn distance(a: &[f64; 2], b: &[f64; 2]) -> f64 {
    (a[0] - b[0]).hypot(a[1] - b[1])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_is_invisible_until_rebalance() {
        let mut index = ScreenIndex::new();
        index.insert(Point::new(10.0, 10.0), 0);
        assert_eq!(index.pending(), 1);
        assert!(index.nearest(Point::new(10.0, 10.0)).is_none());
        index.rebalance();
        assert_eq!(index.len(), 1);
        assert_eq!(index.nearest(Point::new(12.0, 10.0)), Some((0, 2.0)));
    }

    #[test]
    fn test_within_radius_is_inclusive_and_sorted() {
        let mut index = ScreenIndex::new();
        index.insert(Point::new(30.0, 0.0), 2);
        index.insert(Point::new(20.0, 0.0), 1);
        index.insert(Point::new(0.0, 0.0), 0);
        index.rebalance();
        let found = index.within(Point::new(0.0, 0.0), 20.0);
        assert_eq!(found, vec![(0, 0.0), (1, 20.0)]);
        assert!(index.within(Point::new(100.0, 100.0), 5.0).is_empty());
    }

    #[test]
    fn test_incremental_batches_accumulate() {
        let mut index = ScreenIndex::new();
        index.insert(Point::new(0.0, 0.0), 0);
        index.rebalance();
        index.insert(Point::new(5.0, 0.0), 1);
        index.rebalance();
        assert_eq!(index.len(), 2);
        assert_eq!(index.nearest(Point::new(4.0, 0.0)).map(|(i, _)| i), Some(1));
    }
}
