//! Graph topology: edge identifiers and degree bookkeeping.

pub mod edge;
pub mod topology;

pub use edge::{validate_edges, EdgeId};
pub use topology::Topology;
