//! Force kernels.
//!
//! A force kernel mutates the velocities (or positions) of a
//! [`NodeKinetics`] once per tick. Kernels follow a bind-then-apply
//! contract:
//!
//! 1. [`ForceKernel::validate`] checks the kernel's configuration against
//!    the kinetics it is about to be bound to. The driver calls this at
//!    construction, so configuration errors never surface mid-tick.
//! 2. [`ForceKernel::bind`] records a [`Binding`] (the kinetics identity,
//!    plus whatever per-node data the kernel precomputes). The binding is a
//!    plain token; the kernel never owns or borrows the kinetics beyond the
//!    call.
//! 3. [`ForceKernel::apply`] runs one step. Calling it unbound, or with a
//!    different kinetics instance than the bound one, panics.
//!
//! Kernels are composed in order with [`CompositeForce`]. Order matters:
//! every kernel sees the state left behind by the ones before it.

pub mod center;
pub mod composite;
pub mod link;
pub mod many_body;
pub mod position;
pub mod radial;

pub use center::CenterForce;
pub use composite::CompositeForce;
pub use link::{LinkConfig, LinkForce, LinkLength, LinkStiffness};
pub use many_body::{ManyBodyConfig, ManyBodyForce};
pub use position::PositionForce;
pub use radial::RadialForce;

use crate::error::ConfigError;
use crate::simulation::kinetics::{KineticsId, NodeKinetics};

/// The capability every force provides.
pub trait ForceKernel<const D: usize> {
    /// Short name used in logs and panic messages.
    fn name(&self) -> &'static str;

    /// Check configuration against the kinetics the force will be bound to.
    fn validate(&self, _kinetics: &NodeKinetics<D>) -> Result<(), ConfigError> {
        Ok(())
    }

    /// Attach to `kinetics`. Binding again replaces the previous binding.
    fn bind(&mut self, kinetics: &NodeKinetics<D>);

    /// Run one step against the bound kinetics.
    fn apply(&mut self, kinetics: &mut NodeKinetics<D>);
}

/// Non-owning record of which kinetics a force is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding {
    kinetics: KineticsId,
    node_count: usize,
}

impl Binding {
    pub fn to<const D: usize>(kinetics: &NodeKinetics<D>) -> Self {
        Self {
            kinetics: kinetics.id(),
            node_count: kinetics.node_count(),
        }
    }

    pub fn kinetics(&self) -> KineticsId {
        self.kinetics
    }

    /// Node count at bind time.
    pub fn node_count(&self) -> usize {
        self.node_count
    }

    /// Fail fast unless `binding` is present and refers to `kinetics`.
    #[track_caller]
    pub fn check<const D: usize>(binding: Option<&Binding>, kinetics: &NodeKinetics<D>, force: &str) {
        match binding {
            None => panic!("{force} applied before being bound to kinetics"),
            Some(b) => assert!(
                b.kinetics == kinetics.id(),
                "{force} applied to kinetics it was not bound to"
            ),
        }
    }
}
