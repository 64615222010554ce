//! The simulation driver: owns the kinetics and the force pipeline and runs
//! ticks on demand.
//!
//! One tick is, in order:
//!
//! 1. every force, in the order it was added
//! 2. integration (velocity decay, position update, pins)
//! 3. alpha decay
//!
//! There is no internal loop. Callers decide how many ticks to run and when
//! to read positions back.

use log::{debug, trace};

use super::config::SimulationConfig;
use super::kinetics::{InitialState, NodeKinetics};
use super::options::LayoutOptions;
use super::snapshot::SimulationSnapshot;
use crate::error::ConfigError;
use crate::forces::{CenterForce, CompositeForce, ForceKernel, LinkForce, ManyBodyForce};
use crate::graph::EdgeId;
use crate::spatial::NodeLocator;
use crate::vector::Vector;

/// Where a simulation is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulationState {
    /// Built, not ticked yet.
    Uninitialized,
    /// Ticked at least once and alpha is still at or above `alpha_min`.
    Running,
    /// Alpha has dropped below `alpha_min`. Ticking remains legal.
    Converged,
}

/// Collects everything a [`Simulation`] is built from.
pub struct SimulationBuilder<const D: usize> {
    node_count: usize,
    edges: Vec<EdgeId>,
    initial: InitialState<D>,
    config: SimulationConfig,
    forces: CompositeForce<D>,
}

impl<const D: usize> SimulationBuilder<D> {
    pub fn new(node_count: usize) -> Self {
        Self {
            node_count,
            edges: Vec::new(),
            initial: InitialState::default(),
            config: SimulationConfig::default(),
            forces: CompositeForce::new(),
        }
    }

    pub fn edges(mut self, edges: impl IntoIterator<Item = EdgeId>) -> Self {
        self.edges = edges.into_iter().collect();
        self
    }

    /// Starting positions, one per node.
    pub fn positions(mut self, positions: Vec<Vector<D>>) -> Self {
        self.initial.positions = Some(positions);
        self
    }

    /// Starting velocities, one per node.
    pub fn velocities(mut self, velocities: Vec<Vector<D>>) -> Self {
        self.initial.velocities = Some(velocities);
        self
    }

    /// Pinned positions, one entry (pinned or not) per node.
    pub fn fixations(mut self, fixations: Vec<Option<Vector<D>>>) -> Self {
        self.initial.fixations = Some(fixations);
        self
    }

    pub fn config(mut self, config: SimulationConfig) -> Self {
        self.config = config;
        self
    }

    /// Append a force to the pipeline. Forces run in the order added.
    pub fn force(mut self, force: impl ForceKernel<D> + 'static) -> Self {
        self.forces.push(force);
        self
    }

    pub fn boxed_force(mut self, force: Box<dyn ForceKernel<D>>) -> Self {
        self.forces.push_boxed(force);
        self
    }

    /// Take the cooling schedule from `options` and append the forces it
    /// enables: many-body, then link, then center.
    pub fn options(mut self, options: &LayoutOptions) -> Self {
        self.config = options.simulation;
        if let Some(config) = options.many_body {
            self.forces.push(ManyBodyForce::with_config(config));
        }
        if let Some(config) = &options.link {
            self.forces.push(LinkForce::with_config(config.clone()));
        }
        if let Some(strength) = options.center {
            self.forces.push(CenterForce::new(Vector::ZERO, strength));
        }
        self
    }

    /// Validate everything, bind the forces and hand back a ready
    /// simulation.
    pub fn build(self) -> Result<Simulation<D>, ConfigError> {
        let kinetics = NodeKinetics::new(self.node_count, self.edges, self.initial, &self.config)?;
        Simulation::new(kinetics, self.forces)
    }
}

/// A force-directed layout in `D` dimensions.
pub struct Simulation<const D: usize> {
    kinetics: NodeKinetics<D>,
    forces: CompositeForce<D>,
    ticks: u64,
    converged: bool,
}

impl<const D: usize> Simulation<D> {
    pub fn builder(node_count: usize) -> SimulationBuilder<D> {
        SimulationBuilder::new(node_count)
    }

    /// Validate `forces` against `kinetics` and bind them.
    pub fn new(kinetics: NodeKinetics<D>, mut forces: CompositeForce<D>) -> Result<Self, ConfigError> {
        forces.validate(&kinetics)?;
        forces.bind(&kinetics);

        debug!(
            "simulation: {} nodes, {} edges, {}D, forces {:?}",
            kinetics.node_count(),
            kinetics.links().len(),
            D,
            forces.names()
        );

        let converged = kinetics.is_converged();
        Ok(Self {
            kinetics,
            forces,
            ticks: 0,
            converged,
        })
    }

    // =========================================================================
    // Ticking
    // =========================================================================

    /// Advance the simulation by one step.
    pub fn tick(&mut self) {
        self.forces.apply(&mut self.kinetics);
        self.kinetics.integrate();
        self.kinetics.decay_alpha();
        self.ticks += 1;

        trace!("tick {}: alpha {:.6}", self.ticks, self.kinetics.alpha());
        self.note_convergence();
    }

    /// Run `iterations` ticks.
    pub fn tick_n(&mut self, iterations: usize) {
        for _ in 0..iterations {
            self.tick();
        }
    }

    /// Tick until converged, giving up after `max_ticks`. Returns the number
    /// of ticks run.
    pub fn run_to_convergence(&mut self, max_ticks: usize) -> usize {
        let mut ran = 0;
        while ran < max_ticks && !self.is_converged() {
            self.tick();
            ran += 1;
        }
        ran
    }

    fn note_convergence(&mut self) {
        let converged = self.kinetics.is_converged();
        if converged && !self.converged {
            debug!(
                "converged after {} ticks (alpha {:.6})",
                self.ticks,
                self.kinetics.alpha()
            );
        }
        self.converged = converged;
    }

    // =========================================================================
    // Schedule
    // =========================================================================

    pub fn state(&self) -> SimulationState {
        if self.ticks == 0 {
            SimulationState::Uninitialized
        } else if self.kinetics.is_converged() {
            SimulationState::Converged
        } else {
            SimulationState::Running
        }
    }

    pub fn alpha(&self) -> f64 {
        self.kinetics.alpha()
    }

    pub fn is_converged(&self) -> bool {
        self.kinetics.is_converged()
    }

    /// Number of ticks run so far.
    pub fn tick_count(&self) -> u64 {
        self.ticks
    }

    /// Raise the temperature again, e.g. after the user drags a node.
    pub fn reheat(&mut self, alpha: f64) {
        debug!("reheat: alpha {:.6} -> {:.6}", self.kinetics.alpha(), alpha);
        self.kinetics.set_alpha(alpha);
        self.note_convergence();
    }

    /// Change the temperature alpha decays toward. A target at or above
    /// `alpha_min` keeps the layout warm indefinitely.
    pub fn set_alpha_target(&mut self, target: f64) {
        self.kinetics.set_alpha_target(target);
    }

    // =========================================================================
    // Nodes
    // =========================================================================

    pub fn node_count(&self) -> usize {
        self.kinetics.node_count()
    }

    /// Current positions, index-aligned with the node ids.
    pub fn positions(&self) -> &[Vector<D>] {
        self.kinetics.positions()
    }

    pub fn position(&self, node: usize) -> Option<Vector<D>> {
        self.kinetics.position(node)
    }

    /// Move a node. Returns false if the index is out of range.
    pub fn set_position(&mut self, node: usize, position: Vector<D>) -> bool {
        self.kinetics.set_position(node, position)
    }

    /// Pin a node at `position`. Returns false if the index is out of range.
    pub fn pin(&mut self, node: usize, position: Vector<D>) -> bool {
        self.kinetics.pin(node, position)
    }

    pub fn unpin(&mut self, node: usize) -> bool {
        self.kinetics.unpin(node)
    }

    pub fn is_pinned(&self, node: usize) -> bool {
        self.kinetics.is_pinned(node)
    }

    /// Restrict the simulation to the first `count` nodes (clamped).
    pub fn set_valid_count(&mut self, count: usize) {
        self.kinetics.set_valid_count(count);
    }

    /// (min, max) corners of the valid nodes.
    pub fn bounds(&self) -> Option<(Vector<D>, Vector<D>)> {
        self.kinetics.bounds()
    }

    pub fn kinetics(&self) -> &NodeKinetics<D> {
        &self.kinetics
    }

    pub fn kinetics_mut(&mut self) -> &mut NodeKinetics<D> {
        &mut self.kinetics
    }

    /// Names of the forces in application order.
    pub fn force_names(&self) -> Vec<&'static str> {
        self.forces.names()
    }

    /// Build a hit-testing index over the current valid positions.
    pub fn locator(&self) -> NodeLocator<D>
    where
        [f64; D]: rstar::Point<Scalar = f64>,
    {
        NodeLocator::new(&self.kinetics.positions()[self.kinetics.range()])
    }

    // =========================================================================
    // Snapshots
    // =========================================================================

    /// Copy out the dynamic state.
    pub fn snapshot(&self) -> SimulationSnapshot<D> {
        SimulationSnapshot {
            alpha: self.kinetics.alpha(),
            ticks: self.ticks,
            positions: self.kinetics.positions().to_vec(),
            velocities: self.kinetics.velocities().to_vec(),
            fixations: self.kinetics.fixations().to_vec(),
        }
    }

    /// Replace the dynamic state with a snapshot taken from a simulation
    /// with the same node count. On error the simulation is unchanged.
    pub fn restore(&mut self, snapshot: &SimulationSnapshot<D>) -> Result<(), ConfigError> {
        snapshot.validate(self.kinetics.node_count())?;

        self.kinetics.replace_state(
            snapshot.alpha,
            snapshot.positions.clone(),
            snapshot.velocities.clone(),
            snapshot.fixations.clone(),
        );
        self.ticks = snapshot.ticks;
        self.converged = self.kinetics.is_converged();

        debug!("restored snapshot at tick {} (alpha {:.6})", self.ticks, snapshot.alpha);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forces::{LinkConfig, ManyBodyConfig, PositionForce};
    use crate::vector::Vector2;

    fn line(count: usize) -> Vec<Vector2> {
        (0..count).map(|i| Vector([i as f64 * 5.0, 0.0])).collect()
    }

    #[test]
    fn test_lifecycle_states() {
        let mut sim = Simulation::<2>::builder(3)
            .positions(line(3))
            .config(SimulationConfig {
                alpha_decay: 0.5,
                ..Default::default()
            })
            .build()
            .unwrap();
        assert_eq!(sim.state(), SimulationState::Uninitialized);

        sim.tick();
        assert_eq!(sim.state(), SimulationState::Running);

        // 0.5^10 < 0.001
        sim.tick_n(9);
        assert_eq!(sim.state(), SimulationState::Converged);
        assert_eq!(sim.tick_count(), 10);

        // Still legal.
        sim.tick();
        assert_eq!(sim.state(), SimulationState::Converged);

        sim.reheat(1.0);
        assert_eq!(sim.state(), SimulationState::Running);
    }

    #[test]
    fn test_construction_errors() {
        let out_of_range = Simulation::<2>::builder(2).edges([EdgeId::new(0, 2)]).build();
        assert!(matches!(out_of_range, Err(ConfigError::EdgeOutOfRange { .. })));

        let theta = Simulation::<2>::builder(2)
            .force(ManyBodyForce::new(-30.0).with_theta(-1.0))
            .build();
        assert!(matches!(theta, Err(ConfigError::InvalidTheta(_))));

        let zero = Simulation::<0>::builder(2).build();
        assert!(matches!(zero, Err(ConfigError::ZeroDimension)));

        let positions = Simulation::<2>::builder(3).positions(line(2)).build();
        assert!(matches!(positions, Err(ConfigError::LengthMismatch { .. })));

        let axis = Simulation::<2>::builder(1).force(PositionForce::new(5, 0.0, 0.1)).build();
        assert!(axis.is_err());
    }

    #[test]
    fn test_forces_run_in_order_then_integrate() {
        // The force writes velocity first; integration then damps and moves.
        let mut sim = Simulation::<2>::builder(1)
            .positions(vec![Vector([0.0, 0.0])])
            .force(PositionForce::x(10.0, 0.5))
            .build()
            .unwrap();
        sim.tick();
        // v = 10 * 0.5 * alpha(1) = 5, then damped by 0.6
        assert!((sim.positions()[0][0] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_options_compose_default_forces() {
        let options = LayoutOptions::default();
        let sim = Simulation::<2>::builder(4)
            .edges([EdgeId::new(0, 1), EdgeId::new(1, 2)])
            .options(&options)
            .build()
            .unwrap();
        assert_eq!(
            sim.force_names(),
            vec!["ManyBodyForce", "LinkForce", "CenterForce"]
        );

        let bare = LayoutOptions {
            many_body: None,
            link: None,
            center: None,
            ..Default::default()
        };
        let sim = Simulation::<2>::builder(4).options(&bare).build().unwrap();
        assert!(sim.force_names().is_empty());
    }

    #[test]
    fn test_pin_and_unpin() {
        let mut sim = Simulation::<2>::builder(3)
            .positions(line(3))
            .force(ManyBodyForce::new(-30.0))
            .build()
            .unwrap();
        assert!(sim.pin(1, Vector([100.0, 100.0])));
        assert!(!sim.pin(3, Vector([0.0, 0.0])));
        for _ in 0..10 {
            sim.tick();
            assert_eq!(sim.position(1), Some(Vector([100.0, 100.0])));
        }
        assert!(sim.unpin(1));
        sim.tick();
        assert_ne!(sim.position(1), Some(Vector([100.0, 100.0])));
    }

    #[test]
    fn test_snapshot_restore() {
        let build = || {
            Simulation::<2>::builder(5)
                .edges([EdgeId::new(0, 1), EdgeId::new(2, 3)])
                .force(ManyBodyForce::with_config(ManyBodyConfig::default()))
                .force(LinkForce::with_config(LinkConfig::default()))
                .build()
                .unwrap()
        };
        let mut a = build();
        a.tick_n(20);
        let snapshot = a.snapshot();
        a.tick_n(20);

        let mut b = build();
        b.restore(&snapshot).unwrap();
        assert_eq!(b.tick_count(), 20);
        b.tick_n(20);
        assert_eq!(a.positions(), b.positions());
        assert_eq!(a.alpha(), b.alpha());

        let mut small = Simulation::<2>::builder(2).build().unwrap();
        let before = small.positions().to_vec();
        assert!(small.restore(&snapshot).is_err());
        assert_eq!(small.positions(), &before[..]);
    }

    #[test]
    fn test_locator_finds_nodes() {
        let sim = Simulation::<2>::builder(3).positions(line(3)).build().unwrap();
        let locator = sim.locator();
        assert_eq!(locator.len(), 3);
        assert_eq!(locator.nearest(Vector([9.0, 1.0])), Some(2));
        assert_eq!(locator.nearest_within(Vector([50.0, 0.0]), 1.0), None);
    }

    #[test]
    fn test_run_to_convergence() {
        let mut sim = Simulation::<2>::builder(2)
            .config(SimulationConfig {
                alpha_decay: 0.02,
                ..Default::default()
            })
            .build()
            .unwrap();
        let ran = sim.run_to_convergence(10_000);
        assert_eq!(ran, 342);
        assert!(sim.is_converged());
        assert_eq!(sim.run_to_convergence(10), 0);
    }
}
