//! Radial force: pull every node toward a sphere around a center.
//!
//! With `d = p - center`,
//! `v += d * ((radius - |d|) * strength * alpha / |d|)`. A node sitting
//! exactly on the center is pushed out along its jiggle direction.

use super::{Binding, ForceKernel};
use crate::error::ConfigError;
use crate::simulation::kinetics::NodeKinetics;
use crate::vector::Vector;

/// Per-node pull toward the sphere of `radius` around `center`.
pub struct RadialForce<const D: usize> {
    pub center: Vector<D>,
    pub radius: f64,
    pub strength: f64,
    binding: Option<Binding>,
}

impl<const D: usize> RadialForce<D> {
    pub fn new(center: Vector<D>, radius: f64, strength: f64) -> Self {
        Self {
            center,
            radius,
            strength,
            binding: None,
        }
    }
}

impl<const D: usize> ForceKernel<D> for RadialForce<D> {
    fn name(&self) -> &'static str {
        "RadialForce"
    }

    fn validate(&self, _kinetics: &NodeKinetics<D>) -> Result<(), ConfigError> {
        if !self.center.is_finite() {
            return Err(ConfigError::InvalidParameter {
                name: "radial.center",
                value: self.center.max_element(),
            });
        }
        ConfigError::require_non_negative("radial.radius", self.radius)?;
        ConfigError::require_finite("radial.strength", self.strength)
    }

    fn bind(&mut self, kinetics: &NodeKinetics<D>) {
        self.binding = Some(Binding::to(kinetics));
    }

    fn apply(&mut self, kinetics: &mut NodeKinetics<D>) {
        Binding::check(self.binding.as_ref(), kinetics, self.name());

        let scale = self.strength * kinetics.alpha();
        let valid = kinetics.valid_count();
        let jiggler = kinetics.jiggler();
        let (positions, velocities) = kinetics.split_mut();

        for (i, (p, v)) in positions[..valid].iter().zip(&mut velocities[..valid]).enumerate() {
            let mut delta = *p - self.center;
            let mut distance = delta.length();
            if distance <= f64::MIN_POSITIVE {
                // Any direction will do; jiggle against a sentinel index.
                delta = jiggler.jiggle(i, usize::MAX);
                distance = delta.length();
            }
            *v += delta * ((self.radius - distance) * scale / distance);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forces::test_support::kinetics_at;

    #[test]
    fn test_settles_on_circle() {
        let mut kinetics = kinetics_at(
            vec![Vector([1.0, 0.0]), Vector([0.0, 40.0]), Vector([-3.0, -4.0])],
            Vec::new(),
        );
        let mut force = RadialForce::new(Vector([0.0, 0.0]), 20.0, 0.1);
        force.bind(&kinetics);
        for _ in 0..300 {
            force.apply(&mut kinetics);
            kinetics.integrate();
        }
        for p in kinetics.positions() {
            assert!((p.length() - 20.0).abs() < 0.1, "{p} is off the circle");
        }
    }

    #[test]
    fn test_node_on_center_is_pushed_out() {
        let mut kinetics = kinetics_at(vec![Vector([5.0, 5.0])], Vec::new());
        let mut force = RadialForce::new(Vector([5.0, 5.0]), 10.0, 1.0);
        force.bind(&kinetics);
        force.apply(&mut kinetics);

        let v = kinetics.velocities()[0];
        assert!(v.is_finite());
        assert!(v.length() > 0.0);
    }

    #[test]
    fn test_validate() {
        let kinetics = kinetics_at(vec![Vector([0.0, 0.0])], Vec::new());
        assert!(RadialForce::new(Vector([0.0, 0.0]), 5.0, 0.1).validate(&kinetics).is_ok());
        assert!(RadialForce::new(Vector([0.0, 0.0]), -5.0, 0.1).validate(&kinetics).is_err());
        assert!(RadialForce::new(Vector([f64::NAN, 0.0]), 5.0, 0.1).validate(&kinetics).is_err());
    }
}
