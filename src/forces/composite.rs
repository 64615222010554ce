//! Ordered container of force kernels.

use super::ForceKernel;
use crate::error::ConfigError;
use crate::simulation::kinetics::NodeKinetics;

/// Runs its children one after another, in insertion order.
///
/// A composite is itself a [`ForceKernel`], so composites nest.
pub struct CompositeForce<const D: usize> {
    forces: Vec<Box<dyn ForceKernel<D>>>,
}

impl<const D: usize> CompositeForce<D> {
    pub fn new() -> Self {
        Self { forces: Vec::new() }
    }

    /// Append a force, builder style.
    pub fn with(mut self, force: impl ForceKernel<D> + 'static) -> Self {
        self.push(force);
        self
    }

    pub fn push(&mut self, force: impl ForceKernel<D> + 'static) {
        self.forces.push(Box::new(force));
    }

    pub fn push_boxed(&mut self, force: Box<dyn ForceKernel<D>>) {
        self.forces.push(force);
    }

    pub fn len(&self) -> usize {
        self.forces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forces.is_empty()
    }

    /// Names of the children, in application order.
    pub fn names(&self) -> Vec<&'static str> {
        self.forces.iter().map(|f| f.name()).collect()
    }
}

impl<const D: usize> Default for CompositeForce<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const D: usize> ForceKernel<D> for CompositeForce<D> {
    fn name(&self) -> &'static str {
        "CompositeForce"
    }

    fn validate(&self, kinetics: &NodeKinetics<D>) -> Result<(), ConfigError> {
        self.forces.iter().try_for_each(|f| f.validate(kinetics))
    }

    fn bind(&mut self, kinetics: &NodeKinetics<D>) {
        for force in &mut self.forces {
            force.bind(kinetics);
        }
    }

    fn apply(&mut self, kinetics: &mut NodeKinetics<D>) {
        for force in &mut self.forces {
            force.apply(kinetics);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::forces::test_support::kinetics_at;
    use crate::forces::{Binding, CenterForce};
    use crate::vector::Vector;

    /// Records its label into a shared log when applied.
    struct Recorder {
        label: &'static str,
        log: Rc<RefCell<Vec<&'static str>>>,
        binding: Option<Binding>,
    }

    impl ForceKernel<2> for Recorder {
        fn name(&self) -> &'static str {
            self.label
        }

        fn bind(&mut self, kinetics: &NodeKinetics<2>) {
            self.binding = Some(Binding::to(kinetics));
        }

        fn apply(&mut self, kinetics: &mut NodeKinetics<2>) {
            Binding::check(self.binding.as_ref(), kinetics, self.label);
            self.log.borrow_mut().push(self.label);
        }
    }

    fn recorder(label: &'static str, log: &Rc<RefCell<Vec<&'static str>>>) -> Recorder {
        Recorder {
            label,
            log: Rc::clone(log),
            binding: None,
        }
    }

    #[test]
    fn test_applies_in_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut composite = CompositeForce::new()
            .with(recorder("a", &log))
            .with(recorder("b", &log))
            .with(recorder("c", &log));
        assert_eq!(composite.len(), 3);
        assert_eq!(composite.names(), vec!["a", "b", "c"]);

        let mut kinetics = kinetics_at(vec![Vector([0.0, 0.0])], Vec::new());
        composite.bind(&kinetics);
        composite.apply(&mut kinetics);
        composite.apply(&mut kinetics);

        assert_eq!(*log.borrow(), vec!["a", "b", "c", "a", "b", "c"]);
    }

    #[test]
    fn test_nested_composites_bind_children() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let inner = CompositeForce::new().with(recorder("inner", &log));
        let mut outer = CompositeForce::new().with(inner).with(recorder("outer", &log));

        let mut kinetics = kinetics_at(vec![Vector([0.0, 0.0])], Vec::new());
        outer.bind(&kinetics);
        outer.apply(&mut kinetics);

        assert_eq!(*log.borrow(), vec!["inner", "outer"]);
    }

    #[test]
    fn test_validate_reports_first_failure() {
        let composite = CompositeForce::new()
            .with(CenterForce::new(Vector([0.0, 0.0]), 0.1))
            .with(CenterForce::new(Vector([0.0, 0.0]), f64::NAN));
        let kinetics = kinetics_at(vec![Vector([0.0, 0.0])], Vec::new());
        assert!(composite.validate(&kinetics).is_err());
    }

    #[test]
    #[should_panic(expected = "applied before being bound")]
    fn test_unbound_child_panics() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut composite = CompositeForce::new().with(recorder("a", &log));
        let mut kinetics = kinetics_at(vec![Vector([0.0, 0.0])], Vec::new());
        composite.apply(&mut kinetics);
    }
}
