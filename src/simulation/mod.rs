//! Simulation state and the tick driver.
//!
//! - `config`: cooling schedule and integration constants
//! - `kinetics`: per-node arrays, integration and alpha decay
//! - `driver`: [`Simulation`], its builder and lifecycle
//! - `options`: serializable settings for the standard force pipeline
//! - `snapshot`: serializable dynamic state

pub mod config;
pub mod driver;
pub mod kinetics;
pub mod options;
pub mod snapshot;

pub use config::SimulationConfig;
pub use driver::{Simulation, SimulationBuilder, SimulationState};
pub use kinetics::{InitialState, Jiggler, KineticsId, NodeKinetics};
pub use options::LayoutOptions;
pub use snapshot::SimulationSnapshot;

/// A simulation in the plane.
pub type Simulation2D = Simulation<2>;
/// A simulation in space.
pub type Simulation3D = Simulation<3>;
