//! Barnes-Hut point-region tree in `D` dimensions.
//!
//! A generalisation of the quadtree (D = 2) and octree (D = 3). Every node
//! covers an axis-aligned hypercube; internal nodes have `2^D` children that
//! split their cube in half along every axis.
//!
//! # Layout
//!
//! Nodes live in a flat arena (`Vec<TreeNode>`) and refer to their children
//! by index. The `2^D` children of a node are allocated together, so a node
//! only stores the index of its first child (`None` for leaves).
//!
//! # Aggregates
//!
//! Each node keeps the number of points below it (`weight`) and their mean
//! position (`centroid`). Both are updated as a running mean on the way down
//! during [`SpatialTree::insert`], so the tree is consistent after every
//! insertion and never needs a separate summarising pass.
//!
//! # Clustering
//!
//! A leaf holds at most one aggregated body. When a second point lands in an
//! occupied leaf and is within `cluster_distance` of the body, it is merged
//! into that body instead of splitting the leaf. The same happens once a
//! leaf is no larger than `cluster_distance`, or is so small that halving it
//! would round back onto its own bounds. Together these bound the depth of
//! the tree for duplicate and near-duplicate coordinates at any magnitude.

use serde::{Deserialize, Serialize};

use crate::vector::Vector;

/// Tuning constants for tree construction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    /// Points closer than this to an occupied leaf's body are merged into
    /// it rather than causing a split (default: 1e-5).
    pub cluster_distance: f64,
    /// Padding added around the point set so the root never has zero
    /// volume (default: 1e-5).
    pub bounds_padding: f64,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            cluster_distance: 1e-5,
            bounds_padding: 1e-5,
        }
    }
}

/// Axis-aligned hypercube covered by a tree node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox<const D: usize> {
    pub min: Vector<D>,
    pub max: Vector<D>,
}

impl<const D: usize> BoundingBox<D> {
    pub fn new(min: Vector<D>, max: Vector<D>) -> Self {
        Self { min, max }
    }

    /// Smallest hypercube covering `points`, grown by `padding` on every side.
    ///
    /// Returns `None` for an empty point set.
    pub fn covering(points: &[Vector<D>], padding: f64) -> Option<Self> {
        let (first, rest) = points.split_first()?;
        let (lo, hi) = rest
            .iter()
            .fold((*first, *first), |(lo, hi), p| (lo.min(*p), hi.max(*p)));

        let center = (lo + hi) * 0.5;
        let half = (hi - lo).max_element() * 0.5 + padding.abs().max(f64::MIN_POSITIVE);
        Some(Self {
            min: center - Vector::splat(half),
            max: center + Vector::splat(half),
        })
    }

    /// Length of the longest side.
    #[inline]
    pub fn size(&self) -> f64 {
        (self.max - self.min).max_element()
    }

    #[inline]
    pub fn center(&self) -> Vector<D> {
        (self.min + self.max) * 0.5
    }

    /// Whether halving the box yields strictly smaller children on every
    /// axis. False once the box spans only a couple of representable floats.
    pub fn is_divisible(&self) -> bool {
        let center = self.center();
        (0..D).all(|k| self.min[k] < center[k] && center[k] < self.max[k])
    }

    pub fn contains(&self, point: Vector<D>) -> bool {
        (0..D).all(|k| point[k] >= self.min[k] && point[k] <= self.max[k])
    }

    /// Index of the child orthant containing `point`.
    ///
    /// Bit `k` is set when the point lies in the upper half along axis `k`.
    /// Points outside the box are clamped to the nearest orthant.
    #[inline]
    pub fn orthant_of(&self, point: Vector<D>) -> usize {
        let center = self.center();
        let mut index = 0;
        for k in 0..D {
            if point[k] >= center[k] {
                index |= 1 << k;
            }
        }
        index
    }

    /// Bounds of child orthant `index`.
    pub fn orthant(&self, index: usize) -> Self {
        let center = self.center();
        let mut min = self.min;
        let mut max = self.max;
        for k in 0..D {
            if index & (1 << k) != 0 {
                min[k] = center[k];
            } else {
                max[k] = center[k];
            }
        }
        Self { min, max }
    }
}

/// One region of the tree.
#[derive(Debug, Clone)]
pub struct TreeNode<const D: usize> {
    bounds: BoundingBox<D>,
    first_child: Option<usize>,
    weight: f64,
    centroid: Vector<D>,
    points: Vec<usize>,
}

impl<const D: usize> TreeNode<D> {
    fn empty(bounds: BoundingBox<D>) -> Self {
        Self {
            bounds,
            first_child: None,
            weight: 0.0,
            centroid: Vector::ZERO,
            points: Vec::new(),
        }
    }

    /// Fold one more point into the running mean.
    #[inline]
    fn absorb(&mut self, point: Vector<D>) {
        self.weight += 1.0;
        self.centroid += (point - self.centroid) / self.weight;
    }

    pub fn bounds(&self) -> &BoundingBox<D> {
        &self.bounds
    }

    /// Number of points below this node.
    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Mean position of the points below this node.
    pub fn centroid(&self) -> Vector<D> {
        self.centroid
    }

    /// Indices of the points merged into this leaf. Empty for internal nodes.
    pub fn points(&self) -> &[usize] {
        &self.points
    }

    pub fn is_leaf(&self) -> bool {
        self.first_child.is_none()
    }

    /// Arena indices of the children, if any.
    pub fn children(&self) -> Option<std::ops::Range<usize>> {
        self.first_child
            .map(|first| first..first + SpatialTree::<D>::BRANCHING)
    }
}

/// What a Barnes-Hut query hands to its accumulator.
#[derive(Debug, Clone, Copy)]
pub enum Body<'a, const D: usize> {
    /// A far-away internal node summarised by its aggregate.
    Aggregate { weight: f64, centroid: Vector<D> },
    /// A leaf; `points` are the indices merged into it.
    Leaf {
        weight: f64,
        centroid: Vector<D>,
        points: &'a [usize],
    },
}

impl<const D: usize> Body<'_, D> {
    pub fn weight(&self) -> f64 {
        match *self {
            Body::Aggregate { weight, .. } | Body::Leaf { weight, .. } => weight,
        }
    }

    pub fn centroid(&self) -> Vector<D> {
        match *self {
            Body::Aggregate { centroid, .. } | Body::Leaf { centroid, .. } => centroid,
        }
    }
}

/// Arena-backed point-region tree with count/centroid aggregates.
#[derive(Debug, Clone)]
pub struct SpatialTree<const D: usize> {
    nodes: Vec<TreeNode<D>>,
    config: TreeConfig,
}

impl<const D: usize> SpatialTree<D> {
    /// Children per internal node.
    pub const BRANCHING: usize = 1 << D;

    const ROOT: usize = 0;

    /// Create an empty tree covering `bounds`.
    pub fn with_bounds(bounds: BoundingBox<D>, config: TreeConfig) -> Self {
        Self {
            nodes: vec![TreeNode::empty(bounds)],
            config,
        }
    }

    /// Build a tree over `points`; point `i` is inserted with index `i`.
    ///
    /// The root covers the padded bounding hypercube of the whole set. An
    /// empty set produces an empty tree around the origin.
    pub fn build(points: &[Vector<D>], config: TreeConfig) -> Self {
        let bounds = BoundingBox::covering(points, config.bounds_padding).unwrap_or_else(|| {
            let pad = Vector::splat(config.bounds_padding.abs().max(f64::MIN_POSITIVE));
            BoundingBox::new(-pad, pad)
        });
        let mut tree = Self::with_bounds(bounds, config);
        tree.nodes.reserve(points.len() * 2);
        for (index, point) in points.iter().enumerate() {
            tree.insert(index, *point);
        }
        log::trace!(
            "built {}-d tree: {} points, {} nodes",
            D,
            points.len(),
            tree.nodes.len()
        );
        tree
    }

    /// Insert the point with external index `index` at `point`.
    pub fn insert(&mut self, index: usize, point: Vector<D>) {
        let cluster_sq = self.config.cluster_distance * self.config.cluster_distance;
        let mut current = Self::ROOT;

        loop {
            let node = &self.nodes[current];
            match node.first_child {
                Some(first) => {
                    let child = first + node.bounds.orthant_of(point);
                    self.nodes[current].absorb(point);
                    current = child;
                }
                None => {
                    let merge = node.points.is_empty()
                        || node.centroid.distance_squared(point) <= cluster_sq
                        || node.bounds.size() <= self.config.cluster_distance
                        || !node.bounds.is_divisible();
                    if merge {
                        let leaf = &mut self.nodes[current];
                        leaf.absorb(point);
                        leaf.points.push(index);
                        return;
                    }
                    // Split, then go around again as an internal node.
                    self.subdivide(current);
                }
            }
        }
    }

    /// Turn an occupied leaf into an internal node, pushing its body down.
    fn subdivide(&mut self, index: usize) {
        let first = self.nodes.len();
        let bounds = self.nodes[index].bounds;
        self.nodes
            .extend((0..Self::BRANCHING).map(|i| TreeNode::empty(bounds.orthant(i))));

        let parent = &mut self.nodes[index];
        parent.first_child = Some(first);
        let points = std::mem::take(&mut parent.points);
        let (weight, centroid) = (parent.weight, parent.centroid);

        let child = &mut self.nodes[first + bounds.orthant_of(centroid)];
        child.points = points;
        child.weight = weight;
        child.centroid = centroid;
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Barnes-Hut traversal from the point of view of `point`.
    ///
    /// Internal nodes whose `size / distance(point, centroid)` falls below
    /// `theta` are reported once as a [`Body::Aggregate`] and not descended
    /// into. Leaves are always reported. Empty regions are skipped.
    pub fn query(&self, point: Vector<D>, theta: f64, mut accumulate: impl FnMut(Body<'_, D>)) {
        let theta_sq = theta * theta;
        self.visit(|_, node| {
            if node.weight == 0.0 {
                return false;
            }
            if node.is_leaf() {
                accumulate(Body::Leaf {
                    weight: node.weight,
                    centroid: node.centroid,
                    points: &node.points,
                });
                return false;
            }
            let size = node.bounds.size();
            let distance_sq = node.centroid.distance_squared(point);
            if size * size < theta_sq * distance_sq {
                accumulate(Body::Aggregate {
                    weight: node.weight,
                    centroid: node.centroid,
                });
                return false;
            }
            true
        });
    }

    /// Pre-order traversal. `f` returns whether to descend into the
    /// children of the node it was given.
    pub fn visit<'a>(&'a self, mut f: impl FnMut(usize, &'a TreeNode<D>) -> bool) {
        let mut stack = vec![Self::ROOT];
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index];
            if f(index, node) {
                if let Some(children) = node.children() {
                    stack.extend(children.rev());
                }
            }
        }
    }

    /// Post-order traversal: children before their parent.
    pub fn visit_post_order<'a>(&'a self, mut f: impl FnMut(usize, &'a TreeNode<D>)) {
        self.post_order_from(Self::ROOT, &mut f);
    }

    fn post_order_from<'a>(&'a self, index: usize, f: &mut impl FnMut(usize, &'a TreeNode<D>)) {
        let node = &self.nodes[index];
        if let Some(children) = node.children() {
            for child in children {
                self.post_order_from(child, f);
            }
        }
        f(index, node);
    }

    /// Recompute every aggregate bottom-up from `positions`.
    ///
    /// Insertion already keeps aggregates current; this is for callers that
    /// moved points in place and want the summaries to follow.
    pub fn recompute_aggregates(&mut self, positions: &[Vector<D>]) {
        let mut order = Vec::with_capacity(self.nodes.len());
        self.visit_post_order(|index, _| order.push(index));

        for index in order {
            let (weight, sum) = match self.nodes[index].children() {
                Some(children) => children.fold((0.0, Vector::ZERO), |(w, s), c| {
                    let child = &self.nodes[c];
                    (w + child.weight, s + child.centroid * child.weight)
                }),
                None => self.nodes[index]
                    .points
                    .iter()
                    .fold((0.0, Vector::ZERO), |(w, s), &p| (w + 1.0, s + positions[p])),
            };
            let node = &mut self.nodes[index];
            node.weight = weight;
            node.centroid = if weight > 0.0 { sum / weight } else { Vector::ZERO };
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn root(&self) -> &TreeNode<D> {
        &self.nodes[Self::ROOT]
    }

    pub fn node(&self, index: usize) -> Option<&TreeNode<D>> {
        self.nodes.get(index)
    }

    /// Number of arena nodes (leaves and internal).
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of inserted points.
    pub fn len(&self) -> usize {
        self.root().weight as usize
    }

    pub fn is_empty(&self) -> bool {
        self.root().weight == 0.0
    }

    pub fn bounds(&self) -> &BoundingBox<D> {
        &self.root().bounds
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    fn random_points<const D: usize>(count: usize, seed: u64) -> Vec<Vector<D>> {
        let mut rng = SmallRng::seed_from_u64(seed);
        (0..count)
            .map(|_| {
                let mut p = [0.0; D];
                for c in &mut p {
                    *c = rng.random_range(-100.0..100.0);
                }
                Vector(p)
            })
            .collect()
    }

    /// Inverse-square style sum over every other point, the reference for
    /// Barnes-Hut accuracy.
    fn direct_sum<const D: usize>(points: &[Vector<D>], sample: usize) -> Vector<D> {
        let mut total = Vector::ZERO;
        for (j, p) in points.iter().enumerate() {
            if j != sample {
                let delta = *p - points[sample];
                total += delta / delta.length_squared();
            }
        }
        total
    }

    fn tree_sum<const D: usize>(
        tree: &SpatialTree<D>,
        points: &[Vector<D>],
        sample: usize,
        theta: f64,
    ) -> (Vector<D>, usize) {
        let origin = points[sample];
        let mut total = Vector::ZERO;
        let mut bodies = 0;
        tree.query(origin, theta, |body| {
            bodies += 1;
            match body {
                Body::Aggregate { weight, centroid } => {
                    let delta = centroid - origin;
                    total += delta * (weight / delta.length_squared());
                }
                Body::Leaf { points: members, .. } => {
                    for &j in members {
                        if j != sample {
                            let delta = points[j] - origin;
                            total += delta / delta.length_squared();
                        }
                    }
                }
            }
        });
        (total, bodies)
    }

    #[test]
    fn test_empty_tree() {
        let tree = SpatialTree::<2>::build(&[], TreeConfig::default());
        assert!(tree.is_empty());
        assert_eq!(tree.len(), 0);
        assert_eq!(tree.node_count(), 1);

        let mut calls = 0;
        tree.query(Vector([0.0, 0.0]), 0.9, |_| calls += 1);
        assert_eq!(calls, 0);
    }

    #[test]
    fn test_covering_bounds_are_padded_cube() {
        let points = [Vector([0.0, 0.0]), Vector([4.0, 2.0])];
        let bounds = BoundingBox::covering(&points, 0.5).unwrap();

        assert_eq!(bounds.size(), 5.0);
        assert_eq!(bounds.max - bounds.min, Vector([5.0, 5.0]));
        assert!(points.iter().all(|p| bounds.contains(*p)));
        assert!(BoundingBox::<2>::covering(&[], 0.5).is_none());
    }

    #[test]
    fn test_orthants() {
        let bounds = BoundingBox::new(Vector([0.0, 0.0]), Vector([2.0, 2.0]));
        assert_eq!(bounds.orthant_of(Vector([0.5, 0.5])), 0);
        assert_eq!(bounds.orthant_of(Vector([1.5, 0.5])), 1);
        assert_eq!(bounds.orthant_of(Vector([0.5, 1.5])), 2);
        assert_eq!(bounds.orthant_of(Vector([1.5, 1.5])), 3);

        let upper_right = bounds.orthant(3);
        assert_eq!(upper_right.min, Vector([1.0, 1.0]));
        assert_eq!(upper_right.max, Vector([2.0, 2.0]));
    }

    #[test]
    fn test_single_point() {
        let tree = SpatialTree::build(&[Vector([3.0, 4.0])], TreeConfig::default());
        assert_eq!(tree.len(), 1);
        assert!(tree.root().is_leaf());
        assert_eq!(tree.root().points(), &[0]);
        assert_eq!(tree.root().centroid(), Vector([3.0, 4.0]));
    }

    #[test]
    fn test_two_points_subdivide() {
        let points = [Vector([0.0, 0.0]), Vector([10.0, 10.0])];
        let tree = SpatialTree::build(&points, TreeConfig::default());

        assert!(!tree.root().is_leaf());
        assert_eq!(tree.node_count(), 1 + 4);
        assert_eq!(tree.root().weight(), 2.0);
        assert_eq!(tree.root().centroid(), Vector([5.0, 5.0]));

        let leaves: Vec<_> = tree
            .root()
            .children()
            .unwrap()
            .filter_map(|c| tree.node(c))
            .filter(|n| n.weight() > 0.0)
            .collect();
        assert_eq!(leaves.len(), 2);
    }

    #[test]
    fn test_octree_branching() {
        assert_eq!(SpatialTree::<3>::BRANCHING, 8);
        let points = [Vector([0.0, 0.0, 0.0]), Vector([1.0, 1.0, 1.0])];
        let tree = SpatialTree::build(&points, TreeConfig::default());
        assert_eq!(tree.node_count(), 1 + 8);
    }

    #[test]
    fn test_identical_points_collapse() {
        let points = vec![Vector([2.0, 2.0]); 50];
        let tree = SpatialTree::build(&points, TreeConfig::default());

        assert_eq!(tree.node_count(), 1);
        assert_eq!(tree.len(), 50);
        assert_eq!(tree.root().points().len(), 50);
        assert_eq!(tree.root().centroid(), Vector([2.0, 2.0]));
    }

    #[test]
    fn test_near_duplicates_merge() {
        let points = [
            Vector([0.0, 0.0]),
            Vector([1e-7, 0.0]),
            Vector([5.0, 5.0]),
        ];
        let tree = SpatialTree::build(&points, TreeConfig::default());

        let mut merged = None;
        tree.visit(|_, node| {
            if node.points().len() == 2 {
                merged = Some(node.points().to_vec());
            }
            true
        });
        assert_eq!(merged, Some(vec![0, 1]));
    }

    #[test]
    fn test_out_of_bounds_insert_terminates() {
        let bounds = BoundingBox::new(Vector([0.0, 0.0]), Vector([1.0, 1.0]));
        let mut tree = SpatialTree::with_bounds(bounds, TreeConfig::default());
        tree.insert(0, Vector([0.99, 0.99]));
        tree.insert(1, Vector([5.0, 5.0]));
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn test_adjacent_floats_at_large_magnitude_merge() {
        let x = 1e12_f64;
        let next = f64::from_bits(x.to_bits() + 1);
        assert!(next - x > TreeConfig::default().cluster_distance);

        let points = [Vector([x, 0.0]), Vector([next, 0.0]), Vector([x, 1e-300])];
        let tree = SpatialTree::build(&points, TreeConfig::default());
        assert_eq!(tree.len(), 3);
        assert!(tree.node_count() < 10_000);

        let mut leaf_points = 0;
        tree.visit(|_, node| {
            leaf_points += node.points().len();
            true
        });
        assert_eq!(leaf_points, 3);
    }

    #[test]
    fn test_zero_cluster_distance_terminates() {
        let config = TreeConfig {
            cluster_distance: 0.0,
            ..Default::default()
        };
        let points = [
            Vector([1.0, 0.0]),
            Vector([f64::from_bits(1.0_f64.to_bits() + 1), 0.0]),
            Vector([1.0, 1e-150]),
            Vector([1.0, 0.0]),
        ];
        let tree = SpatialTree::build(&points, config);
        assert_eq!(tree.len(), 4);
    }

    #[test]
    fn test_divisibility() {
        let unit = BoundingBox::new(Vector([0.0, 0.0]), Vector([1.0, 1.0]));
        assert!(unit.is_divisible());

        let x = 1e12_f64;
        let next = f64::from_bits(x.to_bits() + 1);
        let sliver = BoundingBox::new(Vector([x, 0.0]), Vector([next, 1.0]));
        assert!(!sliver.is_divisible());
    }

    #[test]
    fn test_running_aggregates_match_recompute() {
        let points = random_points::<2>(200, 7);
        let tree = SpatialTree::build(&points, TreeConfig::default());

        let mut recomputed = tree.clone();
        recomputed.recompute_aggregates(&points);

        for index in 0..tree.node_count() {
            let (a, b) = (tree.node(index).unwrap(), recomputed.node(index).unwrap());
            assert_eq!(a.weight(), b.weight());
            assert!(a.centroid().distance(b.centroid()) < 1e-9);
        }

        let mean = points.iter().fold(Vector::ZERO, |s, p| s + *p) / points.len() as f64;
        assert!(tree.root().centroid().distance(mean) < 1e-9);
    }

    #[test]
    fn test_visit_pre_order_and_pruning() {
        let points = random_points::<2>(30, 3);
        let tree = SpatialTree::build(&points, TreeConfig::default());

        let mut first = None;
        let mut seen = 0;
        tree.visit(|index, _| {
            first.get_or_insert(index);
            seen += 1;
            true
        });
        assert_eq!(first, Some(0));
        assert_eq!(seen, tree.node_count());

        let mut only_root = 0;
        tree.visit(|_, _| {
            only_root += 1;
            false
        });
        assert_eq!(only_root, 1);
    }

    #[test]
    fn test_visit_post_order_children_first() {
        let points = random_points::<3>(40, 11);
        let tree = SpatialTree::build(&points, TreeConfig::default());

        let mut position = vec![0usize; tree.node_count()];
        let mut step = 0;
        tree.visit_post_order(|index, _| {
            position[index] = step;
            step += 1;
        });

        assert_eq!(position[0], tree.node_count() - 1);
        for index in 0..tree.node_count() {
            if let Some(children) = tree.node(index).unwrap().children() {
                for child in children {
                    assert!(position[child] < position[index]);
                }
            }
        }
    }

    #[test]
    fn test_small_theta_matches_direct_sum() {
        let points = random_points::<2>(300, 42);
        let tree = SpatialTree::build(&points, TreeConfig::default());

        for sample in [0, 17, 150, 299] {
            let (approx, _) = tree_sum(&tree, &points, sample, 1e-9);
            let exact = direct_sum(&points, sample);
            let error = (approx - exact).length() / exact.length();
            assert!(error < 1e-6, "relative error {error} at sample {sample}");
        }
    }

    #[test]
    fn test_small_theta_matches_direct_sum_3d() {
        let points = random_points::<3>(200, 5);
        let tree = SpatialTree::build(&points, TreeConfig::default());

        let (approx, _) = tree_sum(&tree, &points, 10, 1e-9);
        let exact = direct_sum(&points, 10);
        assert!((approx - exact).length() / exact.length() < 1e-6);
    }

    #[test]
    fn test_large_theta_uses_fewer_bodies() {
        let points = random_points::<2>(500, 9);
        let tree = SpatialTree::build(&points, TreeConfig::default());

        let (exact, exact_bodies) = tree_sum(&tree, &points, 0, 1e-9);
        let (approx, approx_bodies) = tree_sum(&tree, &points, 0, 0.9);

        assert_eq!(exact_bodies, points.len());
        assert!(approx_bodies < exact_bodies);
        assert!((approx - exact).length() / exact.length() < 0.25);
    }
}
