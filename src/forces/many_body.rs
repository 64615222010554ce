//! Many-body force: every node attracts or repels every other node.
//!
//! O(n log n) via Barnes-Hut. Each application rebuilds a [`SpatialTree`]
//! from the current positions, then for every node walks the tree, treating
//! distant clusters as single bodies at their centroid.
//!
//! A body of weight `w` at displacement `d` (from the node to the body)
//! changes the node's velocity by
//!
//! ```text
//! d * strength * w * alpha / |d|²
//! ```
//!
//! so negative strengths repel and positive strengths attract. Two
//! refinements keep this well behaved:
//!
//! - `|d|²` below `distance_min²` is softened to `sqrt(distance_min² · |d|²)`.
//! - A zero displacement between coincident nodes is replaced by the
//!   kinetics' deterministic jiggle before anything divides by it.

use serde::{Deserialize, Serialize};

use super::{Binding, ForceKernel};
use crate::error::ConfigError;
use crate::simulation::kinetics::{Jiggler, NodeKinetics};
use crate::spatial::{Body, SpatialTree, TreeConfig};
use crate::vector::Vector;

/// Configuration for [`ManyBodyForce`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManyBodyConfig {
    /// Negative repels, positive attracts (default: -30.0).
    pub strength: f64,
    /// Barnes-Hut opening angle (default: 0.9). Smaller is more accurate
    /// and more expensive.
    pub theta: f64,
    /// Softening distance for close encounters (default: 1.0).
    pub distance_min: f64,
    /// Bodies at or beyond this distance are ignored (default: none).
    pub distance_max: Option<f64>,
    /// Tree construction constants.
    pub tree: TreeConfig,
}

impl Default for ManyBodyConfig {
    fn default() -> Self {
        Self {
            strength: -30.0,
            theta: 0.9,
            distance_min: 1.0,
            distance_max: None,
            tree: TreeConfig::default(),
        }
    }
}

/// Pairwise inverse-distance force between all nodes, approximated with a
/// Barnes-Hut tree. Negative strength repels.
pub struct ManyBodyForce<const D: usize> {
    pub config: ManyBodyConfig,
    binding: Option<Binding>,
}

impl<const D: usize> ManyBodyForce<D> {
    /// A force with the given strength and default settings otherwise.
    pub fn new(strength: f64) -> Self {
        Self::with_config(ManyBodyConfig {
            strength,
            ..Default::default()
        })
    }

    pub fn with_config(config: ManyBodyConfig) -> Self {
        Self {
            config,
            binding: None,
        }
    }

    pub fn with_theta(mut self, theta: f64) -> Self {
        self.config.theta = theta;
        self
    }

    /// Velocity change per unit alpha for `node`, summed over the tree.
    fn accumulate(
        &self,
        tree: &SpatialTree<D>,
        positions: &[Vector<D>],
        node: usize,
        jiggler: Jiggler,
    ) -> Vector<D> {
        let origin = positions[node];
        let mut total = Vector::ZERO;

        tree.query(origin, self.config.theta, |body| match body {
            Body::Aggregate { weight, centroid } => {
                total += self.pull(centroid - origin, weight, || Vector::ZERO);
            }
            Body::Leaf { points, .. } => {
                for &other in points {
                    if other != node {
                        total += self.pull(positions[other] - origin, 1.0, || {
                            jiggler.jiggle(node, other)
                        });
                    }
                }
            }
        });
        total
    }

    /// Contribution of one body. `jiggle` supplies the displacement when the
    /// real one has no usable length.
    #[inline]
    fn pull(&self, delta: Vector<D>, weight: f64, jiggle: impl FnOnce() -> Vector<D>) -> Vector<D> {
        let mut delta = delta;
        let mut distance_sq = delta.length_squared();

        if let Some(max) = self.config.distance_max {
            if distance_sq >= max * max {
                return Vector::ZERO;
            }
        }
        if distance_sq <= f64::MIN_POSITIVE {
            delta = jiggle();
            distance_sq = delta.length_squared();
            if distance_sq <= f64::MIN_POSITIVE {
                return Vector::ZERO;
            }
        }
        let min_sq = self.config.distance_min * self.config.distance_min;
        if distance_sq < min_sq {
            distance_sq = (min_sq * distance_sq).sqrt();
        }
        delta * (self.config.strength * weight / distance_sq)
    }
}

impl<const D: usize> ForceKernel<D> for ManyBodyForce<D> {
    fn name(&self) -> &'static str {
        "ManyBodyForce"
    }

    fn validate(&self, _kinetics: &NodeKinetics<D>) -> Result<(), ConfigError> {
        let c = &self.config;
        if !(c.theta.is_finite() && c.theta > 0.0) {
            return Err(ConfigError::InvalidTheta(c.theta));
        }
        ConfigError::require_finite("many_body.strength", c.strength)?;
        ConfigError::require_non_negative("many_body.distance_min", c.distance_min)?;
        if let Some(max) = c.distance_max {
            if !(max > 0.0) {
                return Err(ConfigError::InvalidParameter {
                    name: "many_body.distance_max",
                    value: max,
                });
            }
        }
        ConfigError::require_non_negative("many_body.tree.cluster_distance", c.tree.cluster_distance)?;
        ConfigError::require_non_negative("many_body.tree.bounds_padding", c.tree.bounds_padding)?;
        Ok(())
    }

    fn bind(&mut self, kinetics: &NodeKinetics<D>) {
        self.binding = Some(Binding::to(kinetics));
    }

    fn apply(&mut self, kinetics: &mut NodeKinetics<D>) {
        Binding::check(self.binding.as_ref(), kinetics, self.name());

        let count = kinetics.valid_count();
        if count == 0 {
            return;
        }
        let alpha = kinetics.alpha();
        let jiggler = kinetics.jiggler();
        let (positions, velocities) = kinetics.split_mut();
        let snapshot = &positions[..count];

        let tree = SpatialTree::build(snapshot, self.config.tree);
        for (node, velocity) in velocities[..count].iter_mut().enumerate() {
            *velocity += self.accumulate(&tree, snapshot, node, jiggler) * alpha;
        }
    }
}
