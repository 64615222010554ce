//! One serializable bag of settings for the common force pipeline.
//!
//! This is what the JS facade accepts. Native callers can use it too, or
//! assemble forces by hand through [`super::SimulationBuilder::force`].

use serde::{Deserialize, Serialize};

use super::config::SimulationConfig;
use crate::forces::{LinkConfig, ManyBodyConfig};

/// Cooling schedule plus the standard forces. A force set to `None` is left
/// out of the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutOptions {
    pub simulation: SimulationConfig,
    pub many_body: Option<ManyBodyConfig>,
    pub link: Option<LinkConfig>,
    /// Strength of a center force holding the mean at the origin.
    pub center: Option<f64>,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            simulation: SimulationConfig::default(),
            many_body: Some(ManyBodyConfig::default()),
            link: Some(LinkConfig::default()),
            center: Some(1.0),
        }
    }
}
