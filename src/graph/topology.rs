//! Link topology derived from the edge list.
//!
//! The link force weights each spring by the degree of its endpoints. The
//! degrees (and neighbour lists, for consumers) come from an undirected
//! petgraph view of the edge list, built once when a force binds.

use petgraph::graph::{NodeIndex, UnGraph};

use super::edge::EdgeId;

/// Undirected adjacency over `0..node_count`.
pub struct Topology {
    graph: UnGraph<(), ()>,
}

impl Topology {
    /// Build the topology for `node_count` nodes.
    ///
    /// Edges are expected to be validated already; any edge touching an index
    /// outside `0..node_count` is skipped.
    pub fn new(node_count: usize, edges: &[EdgeId]) -> Self {
        let mut graph = UnGraph::with_capacity(node_count, edges.len());
        for _ in 0..node_count {
            graph.add_node(());
        }
        for edge in edges {
            if edge.source < node_count && edge.target < node_count {
                graph.add_edge(NodeIndex::new(edge.source), NodeIndex::new(edge.target), ());
            }
        }
        Self { graph }
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of edges (including self-loops).
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Degree of every node, counting a self-loop twice.
    pub fn degrees(&self) -> Vec<usize> {
        let mut degrees = vec![0usize; self.graph.node_count()];
        for edge in self.graph.raw_edges() {
            degrees[edge.source().index()] += 1;
            degrees[edge.target().index()] += 1;
        }
        degrees
    }

    /// Neighbour indices of a node, sorted and deduplicated.
    pub fn neighbors(&self, node: usize) -> Vec<usize> {
        if node >= self.graph.node_count() {
            return Vec::new();
        }
        let mut out: Vec<usize> = self
            .graph
            .neighbors(NodeIndex::new(node))
            .map(|n| n.index())
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }
}
