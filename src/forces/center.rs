//! Center force: translate the layout so its mean moves toward a point.
//!
//! O(n). Every valid node is shifted by the same offset, so relative
//! structure is untouched.

use super::{Binding, ForceKernel};
use crate::error::ConfigError;
use crate::simulation::kinetics::NodeKinetics;
use crate::vector::Vector;

/// Shifts all valid nodes together so their mean approaches `center`.
pub struct CenterForce<const D: usize> {
    pub center: Vector<D>,
    /// Fraction of the mean's offset from `center` removed per tick.
    pub strength: f64,
    binding: Option<Binding>,
}

impl<const D: usize> CenterForce<D> {
    pub fn new(center: Vector<D>, strength: f64) -> Self {
        Self {
            center,
            strength,
            binding: None,
        }
    }
}

impl<const D: usize> ForceKernel<D> for CenterForce<D> {
    fn name(&self) -> &'static str {
        "CenterForce"
    }

    fn validate(&self, _kinetics: &NodeKinetics<D>) -> Result<(), ConfigError> {
        ConfigError::require_finite("center.strength", self.strength)?;
        if !self.center.is_finite() {
            return Err(ConfigError::InvalidParameter {
                name: "center.center",
                value: self.center.max_element(),
            });
        }
        Ok(())
    }

    fn bind(&mut self, kinetics: &NodeKinetics<D>) {
        self.binding = Some(Binding::to(kinetics));
    }

    fn apply(&mut self, kinetics: &mut NodeKinetics<D>) {
        Binding::check(self.binding.as_ref(), kinetics, self.name());

        let range = kinetics.range();
        if range.is_empty() {
            return;
        }
        let count = range.len() as f64;
        let positions = kinetics.positions_mut();

        let mean = positions[range.clone()]
            .iter()
            .fold(Vector::ZERO, |sum, p| sum + *p)
            / count;
        let shift = (mean - self.center) * self.strength;

        for p in &mut positions[range] {
            *p -= shift;
        }
    }
}
