//! Per-node kinetic state.
//!
//! [`NodeKinetics`] stores positions, velocities and optional pinned
//! positions in index-aligned arrays (one entry per node), together with the
//! alpha cooling schedule. Force kernels read and mutate these arrays; the
//! driver then calls [`NodeKinetics::integrate`] and
//! [`NodeKinetics::decay_alpha`] once per tick.
//!
//! Only the first `valid_count` nodes take part in force accumulation and
//! integration. The arrays themselves always have the full node count.

use std::collections::HashSet;
use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use super::config::SimulationConfig;
use crate::error::ConfigError;
use crate::graph::{validate_edges, EdgeId};
use crate::vector::Vector;

static NEXT_KINETICS_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one [`NodeKinetics`] instance.
///
/// Forces remember the id they were bound to and refuse to run against any
/// other instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KineticsId(u64);

impl KineticsId {
    fn next() -> Self {
        Self(NEXT_KINETICS_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Optional starting state. Every array that is present must have one entry
/// per node.
#[derive(Debug, Clone)]
pub struct InitialState<const D: usize> {
    pub positions: Option<Vec<Vector<D>>>,
    pub velocities: Option<Vec<Vector<D>>>,
    pub fixations: Option<Vec<Option<Vector<D>>>>,
}

impl<const D: usize> Default for InitialState<D> {
    fn default() -> Self {
        Self {
            positions: None,
            velocities: None,
            fixations: None,
        }
    }
}

/// Deterministic source of tiny direction vectors for breaking ties
/// between coincident nodes.
///
/// `jiggle(a, b)` depends only on the engine seed and the two node indices,
/// and `jiggle(b, a) == -jiggle(a, b)`, so two coincident nodes are always
/// pushed in opposite directions.
#[derive(Debug, Clone, Copy)]
pub struct Jiggler {
    seed: u64,
    scale: f64,
}

impl Jiggler {
    pub fn new(seed: u64, scale: f64) -> Self {
        Self { seed, scale }
    }

    pub fn jiggle<const D: usize>(&self, a: usize, b: usize) -> Vector<D> {
        let (lo, hi, sign) = if a <= b { (a, b, 1.0) } else { (b, a, -1.0) };
        let mut rng = SmallRng::seed_from_u64(mix(mix(self.seed, lo as u64), hi as u64));
        random_direction(&mut rng) * (self.scale * sign)
    }
}

/// splitmix64 finaliser over `state ^ value`.
fn mix(state: u64, value: u64) -> u64 {
    let mut z = (state ^ value).wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Uniformly distributed unit vector, by rejection from the unit ball.
fn random_direction<const D: usize>(rng: &mut SmallRng) -> Vector<D> {
    loop {
        let mut v = Vector::<D>::ZERO;
        for k in 0..D {
            v[k] = rng.random_range(-1.0..1.0);
        }
        let length_sq = v.length_squared();
        if length_sq > 1e-12 && length_sq <= 1.0 {
            return v / length_sq.sqrt();
        }
    }
}

/// Positions, velocities, pins and the cooling schedule of a simulation.
#[derive(Debug)]
pub struct NodeKinetics<const D: usize> {
    id: KineticsId,
    position: Vec<Vector<D>>,
    velocity: Vec<Vector<D>>,
    fixation: Vec<Option<Vector<D>>>,
    valid_count: usize,

    alpha: f64,
    alpha_min: f64,
    alpha_decay: f64,
    alpha_target: f64,
    velocity_decay: f64,

    jiggler: Jiggler,
    links: Vec<EdgeId>,
}

impl<const D: usize> NodeKinetics<D> {
    /// Create the state for `node_count` nodes.
    ///
    /// Absent or non-finite initial positions are replaced by seeded random
    /// points in `[-initial_spread, initial_spread]^D`. A duplicate position
    /// is moved by a small seeded offset around where it was requested, so
    /// no two nodes start out coincident. Pinned nodes start at their pin.
    pub fn new(
        node_count: usize,
        links: Vec<EdgeId>,
        initial: InitialState<D>,
        config: &SimulationConfig,
    ) -> Result<Self, ConfigError> {
        if D == 0 {
            return Err(ConfigError::ZeroDimension);
        }
        config.validate()?;
        validate_edges(&links, node_count)?;

        let fixation = match initial.fixations {
            Some(f) => {
                check_len("fixations", node_count, f.len())?;
                f.into_iter()
                    .map(|pin| pin.filter(|p| p.is_finite()))
                    .collect()
            }
            None => vec![None; node_count],
        };

        let velocity = match initial.velocities {
            Some(v) => {
                check_len("velocities", node_count, v.len())?;
                v.into_iter()
                    .map(|v| if v.is_finite() { v } else { Vector::ZERO })
                    .collect()
            }
            None => vec![Vector::ZERO; node_count],
        };

        let requested = match initial.positions {
            Some(p) => {
                check_len("positions", node_count, p.len())?;
                p
            }
            None => Vec::new(),
        };
        let position = place_nodes(node_count, &requested, &fixation, config);

        Ok(Self {
            id: KineticsId::next(),
            position,
            velocity,
            fixation,
            valid_count: node_count,
            alpha: config.alpha,
            alpha_min: config.alpha_min,
            alpha_decay: config.alpha_decay,
            alpha_target: config.alpha_target,
            velocity_decay: config.velocity_decay,
            jiggler: Jiggler::new(config.seed, config.jiggle_scale),
            links,
        })
    }

    // =========================================================================
    // Per-tick steps
    // =========================================================================

    /// Move every valid node by its damped velocity, or snap it to its pin.
    pub fn integrate(&mut self) {
        for i in self.range() {
            match self.fixation[i] {
                Some(pin) => self.position[i] = pin,
                None => {
                    self.velocity[i] *= self.velocity_decay;
                    self.position[i] += self.velocity[i];
                }
            }
        }
    }

    /// Move alpha one step toward `alpha_target`.
    pub fn decay_alpha(&mut self) {
        self.alpha += (self.alpha_target - self.alpha) * self.alpha_decay;
    }

    // =========================================================================
    // Schedule
    // =========================================================================

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Reset the temperature, e.g. to restart a cooled layout.
    pub fn set_alpha(&mut self, alpha: f64) {
        self.alpha = alpha;
    }

    pub fn alpha_min(&self) -> f64 {
        self.alpha_min
    }

    pub fn alpha_decay(&self) -> f64 {
        self.alpha_decay
    }

    pub fn alpha_target(&self) -> f64 {
        self.alpha_target
    }

    pub fn set_alpha_target(&mut self, target: f64) {
        self.alpha_target = target;
    }

    pub fn velocity_decay(&self) -> f64 {
        self.velocity_decay
    }

    /// True once alpha has dropped below `alpha_min`. Ticking may continue.
    pub fn is_converged(&self) -> bool {
        self.alpha < self.alpha_min
    }

    // =========================================================================
    // State access
    // =========================================================================

    pub fn id(&self) -> KineticsId {
        self.id
    }

    /// Total number of nodes (length of every array).
    pub fn node_count(&self) -> usize {
        self.position.len()
    }

    pub fn valid_count(&self) -> usize {
        self.valid_count
    }

    /// Limit force accumulation and integration to the first `count` nodes.
    /// Clamped to the node count.
    pub fn set_valid_count(&mut self, count: usize) {
        self.valid_count = count.min(self.position.len());
    }

    /// Indices of the nodes taking part in the simulation.
    pub fn range(&self) -> Range<usize> {
        0..self.valid_count
    }

    pub fn links(&self) -> &[EdgeId] {
        &self.links
    }

    pub fn jiggler(&self) -> Jiggler {
        self.jiggler
    }

    /// Shorthand for `self.jiggler().jiggle(a, b)`.
    pub fn jiggle(&self, a: usize, b: usize) -> Vector<D> {
        self.jiggler.jiggle(a, b)
    }

    pub fn positions(&self) -> &[Vector<D>] {
        &self.position
    }

    pub fn velocities(&self) -> &[Vector<D>] {
        &self.velocity
    }

    pub fn fixations(&self) -> &[Option<Vector<D>>] {
        &self.fixation
    }

    pub fn positions_mut(&mut self) -> &mut [Vector<D>] {
        &mut self.position
    }

    pub fn velocities_mut(&mut self) -> &mut [Vector<D>] {
        &mut self.velocity
    }

    /// Read positions while writing velocities.
    pub fn split_mut(&mut self) -> (&[Vector<D>], &mut [Vector<D>]) {
        (&self.position, &mut self.velocity)
    }

    pub fn position(&self, node: usize) -> Option<Vector<D>> {
        self.position.get(node).copied()
    }

    /// Move a node. Returns false if the index is out of range.
    pub fn set_position(&mut self, node: usize, position: Vector<D>) -> bool {
        match self.position.get_mut(node) {
            Some(slot) => {
                *slot = position;
                true
            }
            None => false,
        }
    }

    /// Set a node's velocity. Returns false if the index is out of range.
    pub fn set_velocity(&mut self, node: usize, velocity: Vector<D>) -> bool {
        match self.velocity.get_mut(node) {
            Some(slot) => {
                *slot = velocity;
                true
            }
            None => false,
        }
    }

    /// Pin a node at `position`. It is moved there immediately and stays
    /// there on every tick until unpinned.
    pub fn pin(&mut self, node: usize, position: Vector<D>) -> bool {
        if node >= self.fixation.len() {
            return false;
        }
        self.fixation[node] = Some(position);
        self.position[node] = position;
        true
    }

    /// Release a pinned node. Its velocity is reset.
    pub fn unpin(&mut self, node: usize) -> bool {
        if node >= self.fixation.len() {
            return false;
        }
        self.fixation[node] = None;
        self.velocity[node] = Vector::ZERO;
        true
    }

    pub fn is_pinned(&self, node: usize) -> bool {
        self.fixation.get(node).is_some_and(Option::is_some)
    }

    /// Axis-aligned (min, max) corners of the valid nodes, or `None` if
    /// there are none.
    pub fn bounds(&self) -> Option<(Vector<D>, Vector<D>)> {
        let (first, rest) = self.position[..self.valid_count].split_first()?;
        Some(
            rest.iter()
                .fold((*first, *first), |(lo, hi), p| (lo.min(*p), hi.max(*p))),
        )
    }

    /// Overwrite the dynamic state wholesale. Lengths are checked by the
    /// caller.
    pub(crate) fn replace_state(
        &mut self,
        alpha: f64,
        position: Vec<Vector<D>>,
        velocity: Vec<Vector<D>>,
        fixation: Vec<Option<Vector<D>>>,
    ) {
        self.alpha = alpha;
        self.position = position;
        self.velocity = velocity;
        self.fixation = fixation;
    }
}

fn check_len(what: &'static str, expected: usize, actual: usize) -> Result<(), ConfigError> {
    if expected == actual {
        Ok(())
    } else {
        Err(ConfigError::LengthMismatch {
            what,
            expected,
            actual,
        })
    }
}

/// Candidates tried per node before a coincident start is accepted.
const PLACEMENT_ATTEMPTS: usize = 64;

fn position_key<const D: usize>(p: Vector<D>) -> [u64; D] {
    p.0.map(f64::to_bits)
}

fn uniform_in_cube<const D: usize>(rng: &mut SmallRng, half_width: f64) -> Vector<D> {
    let mut p = Vector::<D>::ZERO;
    for k in 0..D {
        p[k] = rng.random_range(-half_width..=half_width);
    }
    p
}

/// Pick starting positions: pins first, then usable requested positions,
/// then seeded random fill for whatever is left.
///
/// A requested position that is already taken is nudged off its spot by a
/// seeded offset of `jiggle_scale`, doubled on every retry until the node
/// lands somewhere free.
fn place_nodes<const D: usize>(
    node_count: usize,
    requested: &[Vector<D>],
    fixation: &[Option<Vector<D>>],
    config: &SimulationConfig,
) -> Vec<Vector<D>> {
    let mut rng = SmallRng::seed_from_u64(config.seed);
    let mut taken: HashSet<[u64; D]> = HashSet::with_capacity(node_count);
    let spread = config.initial_spread.max(config.jiggle_scale);

    (0..node_count)
        .map(|i| {
            if let Some(pin) = fixation[i] {
                taken.insert(position_key(pin));
                return pin;
            }

            let mut candidate = Vector::<D>::ZERO;
            match requested.get(i).copied().filter(|p| p.is_finite()) {
                Some(p) => {
                    if taken.insert(position_key(p)) {
                        return p;
                    }
                    let mut offset = config.jiggle_scale;
                    candidate = p;
                    for _ in 0..PLACEMENT_ATTEMPTS {
                        let nudged = p + random_direction(&mut rng) * offset;
                        if nudged.is_finite() && taken.insert(position_key(nudged)) {
                            return nudged;
                        }
                        offset *= 2.0;
                    }
                }
                None => {
                    for _ in 0..PLACEMENT_ATTEMPTS {
                        candidate = uniform_in_cube(&mut rng, spread);
                        if taken.insert(position_key(candidate)) {
                            return candidate;
                        }
                    }
                }
            }
            // Out of attempts; the many-body jiggle separates coincident
            // nodes once the simulation runs.
            log::debug!("node {i} starts coincident with another node");
            candidate
        })
        .collect()
}
