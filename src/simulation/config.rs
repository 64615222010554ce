//! Simulation-wide configuration: the cooling schedule, integration damping
//! and the seeds used for placement and jiggling.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Cooling schedule and integration constants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Initial temperature (default: 1.0).
    pub alpha: f64,
    /// The simulation counts as converged once alpha drops below this
    /// (default: 0.001).
    pub alpha_min: f64,
    /// Fraction of the remaining gap to `alpha_target` closed per tick
    /// (default: `1 - 0.001^(1/300)`, about 300 ticks to converge).
    pub alpha_decay: f64,
    /// Temperature alpha decays toward (default: 0.0).
    pub alpha_target: f64,
    /// Velocity multiplier applied every tick before integration
    /// (default: 0.6).
    pub velocity_decay: f64,
    /// Seed for initial placement and jiggling (default: 0x5EED).
    pub seed: u64,
    /// Half-width of the cube absent or degenerate initial positions are
    /// drawn from (default: 10.0).
    pub initial_spread: f64,
    /// Length of the jiggle vector substituted for zero-length
    /// displacements, and the initial offset given to duplicate starting
    /// positions. Must be a positive normal float (default: 1e-6).
    pub jiggle_scale: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            alpha_min: 0.001,
            alpha_decay: 1.0 - 0.001_f64.powf(1.0 / 300.0),
            alpha_target: 0.0,
            velocity_decay: 0.6,
            seed: 0x5EED,
            initial_spread: 10.0,
            jiggle_scale: 1e-6,
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ConfigError::require_non_negative("alpha", self.alpha)?;
        ConfigError::require_non_negative("alpha_min", self.alpha_min)?;
        ConfigError::require_unit("alpha_decay", self.alpha_decay)?;
        ConfigError::require_non_negative("alpha_target", self.alpha_target)?;
        ConfigError::require_unit("velocity_decay", self.velocity_decay)?;
        ConfigError::require_non_negative("initial_spread", self.initial_spread)?;
        if !(self.jiggle_scale.is_normal() && self.jiggle_scale > 0.0) {
            return Err(ConfigError::InvalidParameter {
                name: "jiggle_scale",
                value: self.jiggle_scale,
            });
        }
        Ok(())
    }

    /// Number of ticks until alpha first drops below `alpha_min`, from the
    /// closed form `alpha_n = target + (alpha_0 - target) * (1 - decay)^n`.
    ///
    /// `None` when the schedule never gets there (target at or above
    /// `alpha_min`, or no decay).
    pub fn ticks_to_converge(&self) -> Option<u64> {
        if self.alpha < self.alpha_min {
            return Some(0);
        }
        if self.alpha_target >= self.alpha_min || self.alpha_decay <= 0.0 {
            return None;
        }
        if self.alpha_decay >= 1.0 {
            return Some(1);
        }
        let ratio = (self.alpha_min - self.alpha_target) / (self.alpha - self.alpha_target);
        let ticks = (ratio.ln() / (1.0 - self.alpha_decay).ln()).floor() + 1.0;
        Some(ticks.max(1.0) as u64)
    }
}
