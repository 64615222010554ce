//! Edge type and related structures.
//!
//! Edges are the springs of the layout. Each edge is an ordered pair of node
//! indices into the kinetics arrays; both endpoints must lie in `0..N`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// An ordered (source, target) pair of node indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EdgeId {
    pub source: usize,
    pub target: usize,
}

impl EdgeId {
    /// Create a new edge between two node indices.
    #[inline]
    pub fn new(source: usize, target: usize) -> Self {
        Self { source, target }
    }

    /// True when both endpoints are the same node.
    #[inline]
    pub fn is_loop(self) -> bool {
        self.source == self.target
    }

    /// Build edges from a flat `[src0, tgt0, src1, tgt1, ...]` array.
    ///
    /// A trailing unpaired value is ignored.
    pub fn from_pairs(pairs: &[u32]) -> Vec<Self> {
        pairs
            .chunks_exact(2)
            .map(|pair| Self::new(pair[0] as usize, pair[1] as usize))
            .collect()
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Edge({} -> {})", self.source, self.target)
    }
}

impl From<(usize, usize)> for EdgeId {
    #[inline]
    fn from((source, target): (usize, usize)) -> Self {
        Self::new(source, target)
    }
}

impl From<EdgeId> for (usize, usize) {
    #[inline]
    fn from(edge: EdgeId) -> Self {
        (edge.source, edge.target)
    }
}

/// Check that every edge endpoint lies in `0..node_count`.
pub fn validate_edges(edges: &[EdgeId], node_count: usize) -> Result<(), ConfigError> {
    for (index, edge) in edges.iter().enumerate() {
        if edge.source >= node_count || edge.target >= node_count {
            return Err(ConfigError::EdgeOutOfRange {
                edge: index,
                from: edge.source,
                to: edge.target,
                node_count,
            });
        }
    }
    Ok(())
}
