//! Genome representation and the structural record keeping that lets
//! identical mutations be recognised across the population.
mod errors;
mod genome;
mod innovations;

pub use errors::MutationError;
pub use genome::{CompatibilityInfo, EdgeMap, Genome};
pub use innovations::Innovations;
