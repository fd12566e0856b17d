use crate::NodeId;

use std::error::Error;
use std::fmt;

/// An error type indicating a phenotype could not be
/// compiled or evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkError {
    /// A forward edge runs from an output into a non-output node.
    OutputAsForwardSource { from: NodeId, to: NodeId },
    /// The forward subgraph contains a cycle.
    ForwardCycle,
    /// A recurrent edge references a node absent from the forward structure.
    UnknownNode(NodeId),
    /// The network has no usable structure.
    Uninitialized,
    /// The input slice handed to `run` has the wrong length.
    InputSize { expected: usize, got: usize },
    /// The output slice handed to `run` has the wrong length.
    OutputSize { expected: usize, got: usize },
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutputAsForwardSource { from, to } => write!(
                f,
                "forward edge {from} -> {to} leaves an output node without being labelled recurrent"
            ),
            Self::ForwardCycle => write!(f, "forward subgraph contains a cycle"),
            Self::UnknownNode(id) => write!(f, "node {id} is missing from the forward structure"),
            Self::Uninitialized => {
                write!(f, "network is corrupted or hasn't been initialized")
            }
            Self::InputSize { expected, got } => {
                write!(f, "run received {got} inputs, network expects {expected}")
            }
            Self::OutputSize { expected, got } => {
                write!(f, "run received room for {got} outputs, network produces {expected}")
            }
        }
    }
}

impl Error for NetworkError {}
