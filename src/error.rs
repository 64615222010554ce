//! Construction-time errors.
//!
//! Everything that can be wrong with a simulation is detected when it is
//! built. Once a [`crate::simulation::Simulation`] exists, ticking it cannot
//! fail.

use thiserror::Error;

/// Errors raised while validating simulation or force configuration.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("dimension must be positive")]
    ZeroDimension,

    #[error("edge {edge} ({from} -> {to}) references a node outside 0..{node_count}")]
    EdgeOutOfRange {
        edge: usize,
        from: usize,
        to: usize,
        node_count: usize,
    },

    #[error("theta must be positive and finite, got {0}")]
    InvalidTheta(f64),

    #[error("{what} has {actual} entries, expected {expected}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("invalid value {value} for {name}")]
    InvalidParameter { name: &'static str, value: f64 },
}

impl ConfigError {
    /// Check that `value` is finite, reporting it under `name` otherwise.
    pub(crate) fn require_finite(name: &'static str, value: f64) -> Result<(), Self> {
        if value.is_finite() {
            Ok(())
        } else {
            Err(Self::InvalidParameter { name, value })
        }
    }

    /// Check that `value` lies in the closed unit interval.
    pub(crate) fn require_unit(name: &'static str, value: f64) -> Result<(), Self> {
        if (0.0..=1.0).contains(&value) {
            Ok(())
        } else {
            Err(Self::InvalidParameter { name, value })
        }
    }

    /// Check that `value` is finite and not negative.
    pub(crate) fn require_non_negative(name: &'static str, value: f64) -> Result<(), Self> {
        if value.is_finite() && value >= 0.0 {
            Ok(())
        } else {
            Err(Self::InvalidParameter { name, value })
        }
    }
}
