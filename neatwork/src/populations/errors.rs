use std::error::Error;
use std::fmt;

/// An error type indicating the engine could not be
/// constructed or advanced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineError {
    /// An input, output, or population size of zero was requested.
    InvalidConstruction(&'static str),
    /// At least one organism's fitness was never reported this generation.
    FitnessNotSet,
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConstruction(what) => {
                write!(f, "engine construction failed due to invalid {what}")
            }
            Self::FitnessNotSet => {
                write!(f, "generation update failed since not all fitnesses have been set")
            }
        }
    }
}

impl Error for EngineError {}

/// An error type indicating a fitness report was refused.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FitnessError {
    /// The generation this handle was issued for has been replaced.
    StaleGeneration,
    /// Fitness values must be non-negative numbers.
    InvalidValue(f32),
}

impl fmt::Display for FitnessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StaleGeneration => write!(
                f,
                "fitness report arrived after its organism's generation was replaced"
            ),
            Self::InvalidValue(value) => {
                write!(f, "fitness must be a non-negative number, got {value}")
            }
        }
    }
}

impl Error for FitnessError {}
