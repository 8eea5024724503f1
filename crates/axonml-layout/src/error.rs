//! Layout Inference Error Types
//!
//! Every error aborts the current inference run; no partial graph is returned.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use axonml_graph::{GraphError, OpId, OpType, TensorId};
use thiserror::Error;

/// Result type for layout inference.
pub type LayoutResult<T> = Result<T, LayoutInferError>;

/// Errors that can occur during layout inference.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LayoutInferError {
    /// A tensor was read before any permute vector was bound to it.
    #[error("Tensor {tensor} has no permute vector yet")]
    UnresolvedTensor {
        /// Source-graph tensor.
        tensor: TensorId,
    },

    /// A second permute vector was bound to the same tensor.
    #[error("Tensor {tensor} already has a permute vector")]
    AlreadyBound {
        /// Source-graph tensor.
        tensor: TensorId,
    },

    /// Two permutations or axis lists of different rank were combined.
    #[error("Dimension mismatch: expected rank {expected}, found {found}")]
    DimensionMismatch {
        /// Rank of the permutation.
        expected: usize,
        /// Rank of the other operand.
        found: usize,
    },

    /// The operation's layout contract cannot be met.
    #[error("Layout conflict at {op}: {reason}")]
    LayoutConflict {
        /// Source-graph operation.
        op: OpId,
        /// What could not be satisfied.
        reason: String,
    },

    /// No handler is registered for the operator kind and fallback is disabled.
    #[error("No layout handler for {kind} ({op})")]
    UnsupportedOperatorKind {
        /// Source-graph operation.
        op: OpId,
        /// Its kind.
        kind: OpType,
    },

    /// The sequence is not a permutation of `0..len`.
    #[error("Invalid permutation: {0:?}")]
    InvalidPermutation(Vec<usize>),

    /// An axis index is outside the tensor rank.
    #[error("Axis {axis} out of range for rank {rank}")]
    AxisOutOfRange {
        /// Requested axis.
        axis: i64,
        /// Tensor rank.
        rank: usize,
    },

    /// Graph construction or lookup failed.
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),
}

impl LayoutInferError {
    /// Builds a [`LayoutInferError::LayoutConflict`].
    pub fn conflict(op: OpId, reason: impl Into<String>) -> Self {
        Self::LayoutConflict {
            op,
            reason: reason.into(),
        }
    }
}
