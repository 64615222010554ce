//! R-tree based hit testing over layout positions, using the rstar crate.
//!
//! The Barnes-Hut tree is rebuilt every tick for force accumulation. This
//! index serves the other side: consumers that want to know which node sits
//! under a pointer after some number of ticks.
//!
//! Provides O(log n) queries for:
//! - Nearest node
//! - Nearest node within a distance
//! - Nodes within a radius

use rstar::{AABB, PointDistance, RTree, RTreeObject};

use crate::vector::Vector;

/// A node position in the index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodePoint<const D: usize> {
    /// Index of the node in the kinetics arrays.
    pub index: usize,
    /// Position at the time the index was built.
    pub position: [f64; D],
}

impl<const D: usize> NodePoint<D> {
    pub fn new(index: usize, position: Vector<D>) -> Self {
        Self {
            index,
            position: position.into_array(),
        }
    }
}

impl<const D: usize> RTreeObject for NodePoint<D>
where
    [f64; D]: rstar::Point<Scalar = f64>,
{
    type Envelope = AABB<[f64; D]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.position)
    }
}

impl<const D: usize> PointDistance for NodePoint<D>
where
    [f64; D]: rstar::Point<Scalar = f64>,
{
    fn distance_2(&self, point: &[f64; D]) -> f64 {
        Vector(self.position).distance_squared(Vector(*point))
    }
}

/// Spatial index over a snapshot of node positions.
///
/// Available for every dimension rstar supports as a point type (2 and 3
/// among them).
pub struct NodeLocator<const D: usize>
where
    [f64; D]: rstar::Point<Scalar = f64>,
{
    tree: RTree<NodePoint<D>>,
}

impl<const D: usize> NodeLocator<D>
where
    [f64; D]: rstar::Point<Scalar = f64>,
{
    /// Bulk load the index from `positions`; entry `i` is node `i`.
    pub fn new(positions: &[Vector<D>]) -> Self {
        let points = positions
            .iter()
            .enumerate()
            .map(|(index, p)| NodePoint::new(index, *p))
            .collect();
        Self {
            tree: RTree::bulk_load(points),
        }
    }

    /// Find the nearest node to a point.
    pub fn nearest(&self, point: Vector<D>) -> Option<usize> {
        self.tree
            .nearest_neighbor(point.as_array())
            .map(|p| p.index)
    }

    /// Find the nearest node within `max_distance` of a point.
    pub fn nearest_within(&self, point: Vector<D>, max_distance: f64) -> Option<usize> {
        let max_distance_sq = max_distance * max_distance;
        self.tree
            .nearest_neighbor(point.as_array())
            .filter(|p| p.distance_2(point.as_array()) <= max_distance_sq)
            .map(|p| p.index)
    }

    /// All nodes within `radius` of a point, in no particular order.
    pub fn within_radius(&self, point: Vector<D>, radius: f64) -> Vec<usize> {
        self.tree
            .locate_within_distance(point.into_array(), radius * radius)
            .map(|p| p.index)
            .collect()
    }

    /// Number of indexed nodes.
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn locator() -> NodeLocator<2> {
        NodeLocator::new(&[
            Vector([0.0, 0.0]),
            Vector([10.0, 10.0]),
            Vector([5.0, 5.0]),
        ])
    }

    #[test]
    fn test_nearest() {
        let index = locator();

        assert_eq!(index.nearest(Vector([0.0, 0.0])), Some(0));
        assert_eq!(index.nearest(Vector([6.0, 6.0])), Some(2));
        assert_eq!(index.nearest(Vector([11.0, 11.0])), Some(1));
    }

    #[test]
    fn test_nearest_within() {
        let index = locator();

        assert_eq!(index.nearest_within(Vector([0.0, 0.0]), 5.0), Some(0));
        assert_eq!(index.nearest_within(Vector([2.5, 2.5]), 1.0), None);
        assert_eq!(index.nearest_within(Vector([2.5, 2.5]), 4.0), Some(0));
    }

    #[test]
    fn test_within_radius() {
        let index = NodeLocator::new(&[
            Vector([0.0, 0.0]),
            Vector([3.0, 0.0]),
            Vector([10.0, 0.0]),
        ]);

        let mut found = index.within_radius(Vector([0.0, 0.0]), 5.0);
        found.sort_unstable();
        assert_eq!(found, vec![0, 1]);
    }

    #[test]
    fn test_three_dimensional() {
        let index = NodeLocator::new(&[Vector([0.0, 0.0, 0.0]), Vector([0.0, 0.0, 9.0])]);
        assert_eq!(index.len(), 2);
        assert_eq!(index.nearest(Vector([0.0, 0.0, 8.0])), Some(1));
    }

    #[test]
    fn test_empty() {
        let index = NodeLocator::<2>::new(&[]);
        assert!(index.is_empty());
        assert_eq!(index.nearest(Vector([0.0, 0.0])), None);
    }
}
