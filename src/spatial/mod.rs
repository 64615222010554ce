//! Spatial structures.
//!
//! - [`ndtree`]: Barnes-Hut tree for O(n log n) n-body force accumulation.
//! - [`rtree`]: R-tree index for O(log n) hit testing on layout output.

pub mod ndtree;
pub mod rtree;

pub use ndtree::{Body, BoundingBox, SpatialTree, TreeConfig, TreeNode};
pub use rtree::NodeLocator;
