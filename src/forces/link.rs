//! Link force: springs along the edges of the graph.
//!
//! O(e) per iteration. For an edge from `s` to `t`, the displacement is
//! taken between the positions each endpoint will have after this tick's
//! velocity is applied:
//!
//! ```text
//! d  = (p[t] + v[t]) - (p[s] + v[s])
//! k  = (|d| - rest) / |d| * alpha * stiffness
//! v[t] -= d * k * bias
//! v[s] += d * k * (1 - bias)
//! bias = deg(s) / (deg(s) + deg(t))
//! ```
//!
//! so the lower-degree endpoint takes the larger share of the correction.
//! Degrees, per-edge stiffness and rest lengths are computed once at bind.

use serde::{Deserialize, Serialize};

use super::{Binding, ForceKernel};
use crate::error::ConfigError;
use crate::graph::Topology;
use crate::simulation::kinetics::NodeKinetics;

/// Spring constant of each edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkStiffness {
    /// The same constant for every edge.
    Constant(f64),
    /// `k / min(deg(s), deg(t))`: edges into hubs are softer.
    WeightedByDegree { k: f64 },
}

impl Default for LinkStiffness {
    fn default() -> Self {
        Self::WeightedByDegree { k: 1.0 }
    }
}

impl LinkStiffness {
    fn k(&self) -> f64 {
        match *self {
            Self::Constant(k) | Self::WeightedByDegree { k } => k,
        }
    }

    fn for_edge(&self, source_degree: usize, target_degree: usize) -> f64 {
        match *self {
            Self::Constant(k) => k,
            Self::WeightedByDegree { k } => k / source_degree.min(target_degree).max(1) as f64,
        }
    }
}

/// Rest length of each edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkLength {
    Constant(f64),
    /// One length per edge, in edge order.
    PerEdge(Vec<f64>),
}

const DEFAULT_REST_LENGTH: f64 = 30.0;

impl Default for LinkLength {
    fn default() -> Self {
        Self::Constant(DEFAULT_REST_LENGTH)
    }
}

impl LinkLength {
    /// Rest length of `edge`. Edges past the end of a short per-edge list
    /// get the default length.
    fn for_edge(&self, edge: usize) -> f64 {
        match self {
            Self::Constant(length) => *length,
            Self::PerEdge(lengths) => lengths.get(edge).copied().unwrap_or(DEFAULT_REST_LENGTH),
        }
    }
}

/// Configuration for [`LinkForce`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    pub stiffness: LinkStiffness,
    pub rest_length: LinkLength,
    /// Passes over the edge list per tick (default: 1). More passes make
    /// stiff graphs converge faster at proportional cost.
    pub iterations: usize,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            stiffness: LinkStiffness::default(),
            rest_length: LinkLength::default(),
            iterations: 1,
        }
    }
}

/// Per-edge constants computed at bind.
#[derive(Debug, Clone, Copy)]
struct Spring {
    source: usize,
    target: usize,
    stiffness: f64,
    length: f64,
    bias: f64,
}

/// Spring force along every edge, pulling its endpoints toward the edge's
/// rest length.
pub struct LinkForce {
    pub config: LinkConfig,
    springs: Vec<Spring>,
    binding: Option<Binding>,
}

impl LinkForce {
    /// Springs with the given stiffness and rest length on every edge.
    pub fn new(stiffness: f64, rest_length: f64) -> Self {
        Self::with_config(LinkConfig {
            stiffness: LinkStiffness::Constant(stiffness),
            rest_length: LinkLength::Constant(rest_length),
            ..Default::default()
        })
    }

    pub fn with_config(config: LinkConfig) -> Self {
        Self {
            config,
            springs: Vec::new(),
            binding: None,
        }
    }

    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.config.iterations = iterations;
        self
    }

    /// Stiffness of every edge as computed at bind, in edge order.
    pub fn stiffnesses(&self) -> Vec<f64> {
        self.springs.iter().map(|s| s.stiffness).collect()
    }

    /// Share of each edge's correction applied to its target, in edge order.
    pub fn biases(&self) -> Vec<f64> {
        self.springs.iter().map(|s| s.bias).collect()
    }

    pub fn rest_lengths(&self) -> Vec<f64> {
        self.springs.iter().map(|s| s.length).collect()
    }
}

impl<const D: usize> ForceKernel<D> for LinkForce {
    fn name(&self) -> &'static str {
        "LinkForce"
    }

    fn validate(&self, kinetics: &NodeKinetics<D>) -> Result<(), ConfigError> {
        ConfigError::require_finite("link.stiffness", self.config.stiffness.k())?;
        match &self.config.rest_length {
            LinkLength::Constant(length) => {
                ConfigError::require_non_negative("link.rest_length", *length)?;
            }
            LinkLength::PerEdge(lengths) => {
                if lengths.len() != kinetics.links().len() {
                    return Err(ConfigError::LengthMismatch {
                        what: "link.rest_length",
                        expected: kinetics.links().len(),
                        actual: lengths.len(),
                    });
                }
                for length in lengths {
                    ConfigError::require_non_negative("link.rest_length", *length)?;
                }
            }
        }
        if self.config.iterations == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "link.iterations",
                value: 0.0,
            });
        }
        Ok(())
    }

    fn bind(&mut self, kinetics: &NodeKinetics<D>) {
        let links = kinetics.links();
        let degrees = Topology::new(kinetics.node_count(), links).degrees();

        self.springs = links
            .iter()
            .enumerate()
            .map(|(edge, link)| {
                let (ds, dt) = (degrees[link.source], degrees[link.target]);
                Spring {
                    source: link.source,
                    target: link.target,
                    stiffness: self.config.stiffness.for_edge(ds, dt),
                    length: self.config.rest_length.for_edge(edge),
                    bias: ds as f64 / (ds + dt) as f64,
                }
            })
            .collect();
        self.binding = Some(Binding::to(kinetics));
    }

    fn apply(&mut self, kinetics: &mut NodeKinetics<D>) {
        Binding::check(self.binding.as_ref(), kinetics, "LinkForce");

        let valid = kinetics.valid_count();
        let alpha = kinetics.alpha();
        let jiggler = kinetics.jiggler();
        let (positions, velocities) = kinetics.split_mut();

        for _ in 0..self.config.iterations {
            for spring in &self.springs {
                let (s, t) = (spring.source, spring.target);
                if s == t || s >= valid || t >= valid {
                    continue;
                }
                let mut delta = positions[t] + velocities[t] - positions[s] - velocities[s];
                let mut length = delta.length();
                if length <= f64::MIN_POSITIVE {
                    delta = jiggler.jiggle(s, t);
                    length = delta.length();
                }
                let k = (length - spring.length) / length * alpha * spring.stiffness;
                let correction = delta * k;
                velocities[t] -= correction * spring.bias;
                velocities[s] += correction * (1.0 - spring.bias);
            }
        }
    }
}
