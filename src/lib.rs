//! Force Layout - WASM Module
//!
//! A force-directed graph layout engine. Nodes repel each other, edges act
//! as springs and a center force keeps the layout in view; the simulation
//! cools until the layout settles. It is compiled to WebAssembly and exposes
//! a JavaScript-friendly API via wasm-bindgen, and is equally usable as a
//! plain Rust library.
//!
//! # Architecture
//!
//! - `vector`: const-generic `D`-dimensional vector math
//! - `spatial`: Barnes-Hut n-d tree for force accumulation, R-tree for hit
//!   testing
//! - `graph`: edge ids and degree topology
//! - `forces`: the force kernel trait and its variants
//! - `simulation`: per-node kinetics, configuration and the tick driver
//!
//! # Example
//!
//! ```
//! use force_layout::{EdgeId, LayoutOptions, Simulation2D};
//!
//! let mut sim = Simulation2D::builder(3)
//!     .edges([EdgeId::new(0, 1), EdgeId::new(1, 2)])
//!     .options(&LayoutOptions::default())
//!     .build()
//!     .unwrap();
//! sim.tick_n(300);
//! assert!(sim.positions().iter().all(|p| p.is_finite()));
//! ```

use js_sys::Float64Array;
use wasm_bindgen::prelude::*;

pub mod error;
pub mod forces;
pub mod graph;
pub mod logging;
pub mod simulation;
pub mod spatial;
pub mod vector;

pub use error::ConfigError;
pub use forces::{
    CenterForce, CompositeForce, ForceKernel, LinkConfig, LinkForce, LinkLength, LinkStiffness,
    ManyBodyConfig, ManyBodyForce, PositionForce, RadialForce,
};
pub use graph::{EdgeId, Topology};
pub use simulation::{
    LayoutOptions, NodeKinetics, Simulation, Simulation2D, Simulation3D, SimulationBuilder,
    SimulationConfig, SimulationSnapshot, SimulationState,
};
pub use spatial::{NodeLocator, SpatialTree, TreeConfig};
pub use vector::{Vector, Vector2, Vector3};

/// Initialize the WASM module.
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
    logging::init_console_logger(log::LevelFilter::Info);
}

/// Two-dimensional layout exposed to JavaScript.
///
/// Positions are returned interleaved: `[x0, y0, x1, y1, ...]`.
#[wasm_bindgen]
pub struct ForceLayout2D {
    simulation: Simulation2D,
}

impl ForceLayout2D {
    /// Shared constructor that does not touch JS values.
    fn from_parts(
        node_count: usize,
        edges: &[u32],
        positions: Option<&[f64]>,
        options: &LayoutOptions,
    ) -> Result<Self, ConfigError> {
        let mut builder = Simulation2D::builder(node_count)
            .edges(EdgeId::from_pairs(edges))
            .options(options);
        if let Some(flat) = positions {
            builder = builder.positions(
                flat.chunks_exact(2)
                    .map(|xy| Vector([xy[0], xy[1]]))
                    .collect(),
            );
        }
        Ok(Self {
            simulation: builder.build()?,
        })
    }
}

fn parse_options(options: JsValue) -> Result<LayoutOptions, JsError> {
    if options.is_undefined() || options.is_null() {
        Ok(LayoutOptions::default())
    } else {
        Ok(serde_wasm_bindgen::from_value(options)?)
    }
}

#[wasm_bindgen]
impl ForceLayout2D {
    /// Create a layout for `node_count` nodes.
    ///
    /// # Arguments
    ///
    /// * `node_count` - Number of nodes
    /// * `edges` - Flat edge pairs `[src0, tgt0, src1, tgt1, ...]`
    /// * `options` - Optional `LayoutOptions` object; missing fields take
    ///   their defaults
    #[wasm_bindgen(constructor)]
    pub fn new(node_count: usize, edges: &[u32], options: JsValue) -> Result<ForceLayout2D, JsError> {
        let options = parse_options(options)?;
        Ok(Self::from_parts(node_count, edges, None, &options)?)
    }

    /// Create a layout starting from interleaved positions.
    #[wasm_bindgen(js_name = withPositions)]
    pub fn with_positions(
        node_count: usize,
        edges: &[u32],
        positions: &[f64],
        options: JsValue,
    ) -> Result<ForceLayout2D, JsError> {
        let options = parse_options(options)?;
        Ok(Self::from_parts(node_count, edges, Some(positions), &options)?)
    }

    // =========================================================================
    // Simulation
    // =========================================================================

    pub fn tick(&mut self) {
        self.simulation.tick();
    }

    /// Run several ticks in one call.
    #[wasm_bindgen(js_name = tickN)]
    pub fn tick_n(&mut self, iterations: usize) {
        self.simulation.tick_n(iterations);
    }

    pub fn alpha(&self) -> f64 {
        self.simulation.alpha()
    }

    #[wasm_bindgen(js_name = isConverged)]
    pub fn is_converged(&self) -> bool {
        self.simulation.is_converged()
    }

    #[wasm_bindgen(js_name = tickCount)]
    pub fn tick_count(&self) -> f64 {
        self.simulation.tick_count() as f64
    }

    /// Restart a cooled layout at the given alpha.
    pub fn reheat(&mut self, alpha: f64) {
        self.simulation.reheat(alpha);
    }

    #[wasm_bindgen(js_name = setAlphaTarget)]
    pub fn set_alpha_target(&mut self, target: f64) {
        self.simulation.set_alpha_target(target);
    }

    // =========================================================================
    // Nodes
    // =========================================================================

    #[wasm_bindgen(js_name = nodeCount)]
    pub fn node_count(&self) -> usize {
        self.simulation.node_count()
    }

    /// Pin a node at (x, y). Returns false if the node does not exist.
    pub fn pin(&mut self, node: usize, x: f64, y: f64) -> bool {
        self.simulation.pin(node, Vector([x, y]))
    }

    pub fn unpin(&mut self, node: usize) -> bool {
        self.simulation.unpin(node)
    }

    #[wasm_bindgen(js_name = isPinned)]
    pub fn is_pinned(&self, node: usize) -> bool {
        self.simulation.is_pinned(node)
    }

    #[wasm_bindgen(js_name = setPosition)]
    pub fn set_position(&mut self, node: usize, x: f64, y: f64) -> bool {
        self.simulation.set_position(node, Vector([x, y]))
    }

    // =========================================================================
    // Position Buffer Access
    // =========================================================================

    /// Copy of the interleaved positions.
    pub fn positions(&self) -> Vec<f64> {
        Vector::flatten(self.simulation.positions()).to_vec()
    }

    /// Get a zero-copy view of the interleaved positions.
    ///
    /// # Safety
    ///
    /// The returned view is invalidated if any Rust allocation occurs.
    /// Use immediately, do not store.
    #[wasm_bindgen(js_name = positionsView)]
    pub fn positions_view(&self) -> Float64Array {
        unsafe { Float64Array::view(Vector::flatten(self.simulation.positions())) }
    }

    /// Bounding box of the layout as `[min_x, min_y, max_x, max_y]`.
    #[wasm_bindgen(js_name = getBounds)]
    pub fn get_bounds(&self) -> Option<Vec<f64>> {
        self.simulation
            .bounds()
            .map(|(min, max)| vec![min[0], min[1], max[0], max[1]])
    }

    // =========================================================================
    // Hit Testing
    // =========================================================================

    /// Find the node nearest to (x, y).
    #[wasm_bindgen(js_name = findNearestNode)]
    pub fn find_nearest_node(&self, x: f64, y: f64) -> Option<u32> {
        self.simulation
            .locator()
            .nearest(Vector([x, y]))
            .map(|i| i as u32)
    }

    /// Find the node nearest to (x, y), if one lies within `max_distance`.
    #[wasm_bindgen(js_name = findNearestNodeWithin)]
    pub fn find_nearest_node_within(&self, x: f64, y: f64, max_distance: f64) -> Option<u32> {
        self.simulation
            .locator()
            .nearest_within(Vector([x, y]), max_distance)
            .map(|i| i as u32)
    }

    /// All nodes within `radius` of (x, y).
    #[wasm_bindgen(js_name = findNodesWithin)]
    pub fn find_nodes_within(&self, x: f64, y: f64, radius: f64) -> Vec<u32> {
        let mut found: Vec<u32> = self
            .simulation
            .locator()
            .within_radius(Vector([x, y]), radius)
            .into_iter()
            .map(|i| i as u32)
            .collect();
        found.sort_unstable();
        found
    }

    // =========================================================================
    // Snapshots
    // =========================================================================

    /// Serialize the dynamic state to a plain JS object.
    pub fn snapshot(&self) -> Result<JsValue, JsError> {
        Ok(serde_wasm_bindgen::to_value(&self.simulation.snapshot())?)
    }

    /// Restore a state produced by `snapshot()` on a layout built the same
    /// way.
    pub fn restore(&mut self, snapshot: JsValue) -> Result<(), JsError> {
        let snapshot: SimulationSnapshot<2> = serde_wasm_bindgen::from_value(snapshot)?;
        Ok(self.simulation.restore(&snapshot)?)
    }
}
