//! # tenidx-exec
//!
//! NumPy-style indexing and the operators built on it, for tenidx graphs.
//!
//! This crate provides:
//! - [`IndexOperand`] - integers, slices, masks, index arrays and index tensors
//! - [`compile_index`] - lowering of an operand list to a per-axis gather
//! - [`get`] / [`set`] - differentiable indexed reads and writes, also
//!   available as methods through the [`Indexing`] trait
//! - [`concat`] - concatenation through shifted gathers
//! - [`argmax_pool`] - 2-D max pooling with argmax gradient routing
//!
//! # Example
//!
//! ```
//! use tenidx_ad::GraphBuilder;
//! use tenidx_core::DenseND;
//! use tenidx_exec::{AssignValue, IndexOperand, Indexing};
//!
//! let graph = GraphBuilder::<f64>::new();
//! let x = graph.constant(DenseND::zeros(&[3, 4]));
//!
//! // x[[0, 2], 1:3] = 1
//! let ops: Vec<IndexOperand> = vec![vec![0i64, 2].into(), (1..3).into()];
//! graph.set(x, &ops, AssignValue::Scalar(1.0)).unwrap();
//!
//! let total = graph.sum(x).unwrap();
//! assert_eq!(graph.value(total).unwrap().to_vec(), vec![4.0]);
//! ```

#![deny(warnings)]

pub mod broadcast;
pub mod compile;
pub mod concat;
pub mod indexing;
pub mod operand;
pub mod pool;

#[cfg(test)]
mod property_tests;

// Re-exports
pub use broadcast::resolve_broadcast_shape;
pub use compile::{compile_index, resolve_slice, CompiledIndex};
pub use concat::concat;
pub use indexing::{get, set, AssignValue, Indexing};
pub use operand::{IndexArray, IndexOperand, SliceSpec};
pub use pool::{argmax_pool, ArgmaxPool2d};
