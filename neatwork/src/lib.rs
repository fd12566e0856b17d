//! A NeuroEvolution of Augmenting Topologies (NEAT) engine, following the
//! 2002 paper: <http://nn.cs.utexas.edu/keyword?stanley:ec02>
//!
//! Both connection weights and graph structure are evolved: genomes hold
//! historically-marked forward and recurrent edges, grow through add-node
//! and add-edge mutations under a shared innovation registry, and are
//! grouped into species by compatibility distance with explicit fitness
//! sharing. The engine proposes compiled networks, the host scores them,
//! and the engine breeds the next generation from those scores.
//!
//! # Example usage: evolving a XOR approximator
//! ```
//! use neatwork::{Engine, EngineConfig};
//!
//! let mut engine = Engine::new(EngineConfig {
//!     input_size: 2,
//!     output_size: 1,
//!     pop_size: 50,
//!     ..EngineConfig::default()
//! })
//! .unwrap();
//!
//! let cases = [
//!     ([0.0, 0.0], 0.0),
//!     ([0.0, 1.0], 1.0),
//!     ([1.0, 0.0], 1.0),
//!     ([1.0, 1.0], 0.0),
//! ];
//!
//! for _ in 0..5 {
//!     for (mut network, handle, _species_id) in engine.generate_networks().unwrap() {
//!         let mut error = 0.0;
//!         let mut out = [0.0];
//!         for (input, target) in &cases {
//!             network.run(input, &mut out).unwrap();
//!             error += (target - out[0]).abs();
//!         }
//!         handle.set_fitness((6.0 - error) / 6.0).unwrap();
//!     }
//!     engine.update_generation().unwrap();
//! }
//! ```

pub mod genomics;
pub mod math;
pub mod networks;
pub mod populations;
mod serial;

pub use genomics::{CompatibilityInfo, EdgeMap, Genome, Innovations, MutationError};
pub use networks::{Edges, Network, NetworkError, NodeVisual};
pub use populations::{
    Engine, EngineConfig, EngineError, FitnessError, FitnessHandle, Organism, Species,
};

/// Genome-level node identifier. The first `input_size + 1` ids are the
/// sensors (the last of them the always-on bias), the next `output_size`
/// ids are the outputs, and every id beyond those is a hidden node handed
/// out by the engine's innovation registry.
pub type NodeId = i32;

/// `(from, to)` pair keying a single connection.
pub type EdgeKey = (NodeId, NodeId);
