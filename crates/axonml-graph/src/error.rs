//! Graph Error Types
//!
//! Error types for graph construction and traversal.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use crate::ir::{OpId, TensorId};
use thiserror::Error;

/// Result type for graph operations.
pub type GraphResult<T> = Result<T, GraphError>;

/// Errors raised while building or walking a graph.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// Tensor id does not belong to this graph.
    #[error("Unknown tensor: {0}")]
    UnknownTensor(TensorId),

    /// Operation id does not belong to this graph.
    #[error("Unknown operation: {0}")]
    UnknownOperation(OpId),

    /// A tensor was bound as output of a second operation.
    #[error("Tensor {tensor} is already produced by {producer}")]
    MultipleProducers {
        /// Offending tensor.
        tensor: TensorId,
        /// Operation that already produces it.
        producer: OpId,
    },

    /// The operations do not form a DAG.
    #[error("Graph contains a cycle through {0}")]
    Cycle(OpId),

    /// Any other structural problem.
    #[error("Invalid graph: {0}")]
    InvalidGraph(String),
}
