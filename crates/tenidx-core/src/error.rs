//! Unified error types for tenidx
//!
//! Every fallible operation in the workspace returns [`Result`], whose error
//! side is [`TenidxError`]. Errors are raised eagerly while a graph is being
//! built; nothing is deferred to evaluation.
//!
//! # Examples
//!
//! ```
//! use tenidx_core::error::{Result, TenidxError};
//!
//! fn check_rank(rank: usize, given: usize) -> Result<()> {
//!     if given > rank {
//!         return Err(TenidxError::TooManyIndices { given, rank });
//!     }
//!     Ok(())
//! }
//!
//! assert!(check_rank(2, 3).is_err());
//! ```

use crate::types::{Axis, Rank};
use thiserror::Error;

/// Convenience alias used across the workspace
pub type Result<T> = std::result::Result<T, TenidxError>;

/// Top-level error type for indexing, graph construction and operators
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TenidxError {
    /// Operand shapes cannot be broadcast against each other
    #[error("Shape not match: {context} (shapes {shapes:?})")]
    ShapeMismatch {
        context: String,
        shapes: Vec<Vec<usize>>,
    },

    /// Index operand kind that the compiler does not accept
    #[error("Not support slice {operand}: {reason}")]
    UnsupportedIndex { operand: String, reason: String },

    /// A unique variable scope was requested twice
    #[error("Variable scope '{scope}' already exists")]
    ScopeCollision { scope: String },

    /// Integer index outside `[-size, size)`
    #[error("Index {index} out of bounds for axis {axis} with size {size}")]
    IndexOutOfBounds { index: i64, axis: Axis, size: usize },

    /// More index operands than tensor axes
    #[error("Too many indices: {given} given for tensor of rank {rank}")]
    TooManyIndices { given: usize, rank: Rank },

    /// Bad argument to an operator
    #[error("{operation}: {reason}")]
    InvalidArgument { operation: String, reason: String },

    /// Handle that does not belong to the graph
    #[error("Unknown variable {id}")]
    UnknownVar { id: usize },

    /// Gradient requested for a loss with more than one element
    #[error("Gradient requires a single-element loss, got shape {shape:?}")]
    NonScalarLoss { shape: Vec<usize> },
}

impl TenidxError {
    /// Shape mismatch helper
    pub fn shape_mismatch(context: impl Into<String>, shapes: Vec<Vec<usize>>) -> Self {
        TenidxError::ShapeMismatch {
            context: context.into(),
            shapes,
        }
    }

    /// Unsupported index helper
    pub fn unsupported(operand: impl Into<String>, reason: impl Into<String>) -> Self {
        TenidxError::UnsupportedIndex {
            operand: operand.into(),
            reason: reason.into(),
        }
    }

    /// Invalid argument helper
    pub fn invalid(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        TenidxError::InvalidArgument {
            operation: operation.into(),
            reason: reason.into(),
        }
    }
}
