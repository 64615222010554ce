//! Serializable copy of a simulation's dynamic state.
//!
//! A snapshot carries what changes from tick to tick (alpha, the tick
//! counter, positions, velocities and pins) and nothing that is fixed at
//! construction, such as the edge list or the forces. Restoring therefore
//! needs a simulation built the same way as the one the snapshot came from.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::vector::Vector;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationSnapshot<const D: usize> {
    pub alpha: f64,
    pub ticks: u64,
    pub positions: Vec<Vector<D>>,
    pub velocities: Vec<Vector<D>>,
    pub fixations: Vec<Option<Vector<D>>>,
}

impl<const D: usize> SimulationSnapshot<D> {
    pub fn node_count(&self) -> usize {
        self.positions.len()
    }

    /// Check that the snapshot fits a simulation of `node_count` nodes.
    pub fn validate(&self, node_count: usize) -> Result<(), ConfigError> {
        ConfigError::require_non_negative("snapshot.alpha", self.alpha)?;
        for (what, actual) in [
            ("snapshot.positions", self.positions.len()),
            ("snapshot.velocities", self.velocities.len()),
            ("snapshot.fixations", self.fixations.len()),
        ] {
            if actual != node_count {
                return Err(ConfigError::LengthMismatch {
                    what,
                    expected: node_count,
                    actual,
                });
            }
        }
        Ok(())
    }
}
