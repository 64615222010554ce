//! Position force: pull every node toward a coordinate along one axis.
//!
//! `v[axis] += (target - p[axis]) * strength * alpha`. Two of these on
//! different axes behave like a soft center that acts per node rather than
//! on the mean.

use super::{Binding, ForceKernel};
use crate::error::ConfigError;
use crate::simulation::kinetics::NodeKinetics;

/// Per-node pull toward `target` along a single axis.
pub struct PositionForce {
    pub axis: usize,
    pub target: f64,
    pub strength: f64,
    binding: Option<Binding>,
}

impl PositionForce {
    pub fn new(axis: usize, target: f64, strength: f64) -> Self {
        Self {
            axis,
            target,
            strength,
            binding: None,
        }
    }

    /// Pull along the first axis.
    pub fn x(target: f64, strength: f64) -> Self {
        Self::new(0, target, strength)
    }

    /// Pull along the second axis.
    pub fn y(target: f64, strength: f64) -> Self {
        Self::new(1, target, strength)
    }
}

impl<const D: usize> ForceKernel<D> for PositionForce {
    fn name(&self) -> &'static str {
        "PositionForce"
    }

    fn validate(&self, _kinetics: &NodeKinetics<D>) -> Result<(), ConfigError> {
        if self.axis >= D {
            return Err(ConfigError::InvalidParameter {
                name: "position.axis",
                value: self.axis as f64,
            });
        }
        ConfigError::require_finite("position.target", self.target)?;
        ConfigError::require_finite("position.strength", self.strength)
    }

    fn bind(&mut self, kinetics: &NodeKinetics<D>) {
        self.binding = Some(Binding::to(kinetics));
    }

    fn apply(&mut self, kinetics: &mut NodeKinetics<D>) {
        Binding::check(self.binding.as_ref(), kinetics, "PositionForce");

        let scale = self.strength * kinetics.alpha();
        let valid = kinetics.valid_count();
        let (positions, velocities) = kinetics.split_mut();
        for (p, v) in positions[..valid].iter().zip(&mut velocities[..valid]) {
            v[self.axis] += (self.target - p[self.axis]) * scale;
        }
    }
}
