//! Executable phenotypes compiled from genomes: a flat, index-addressed
//! evaluator plus the layer/position records the external visualiser reads.
mod errors;
mod phenotype;

pub use errors::NetworkError;
pub use phenotype::{Edges, Network, NodeVisual};
