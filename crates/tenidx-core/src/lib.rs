//! # tenidx-core
//!
//! Dense storage, per-axis index expressions and the gather/scatter kernels
//! that every tenidx indexing operation is lowered onto.
//!
//! - **Dense tensor representation** ([`DenseND`]), row-major
//! - **Index expressions** ([`AxisExpr`]) describing one source axis each
//! - **Gather** ([`DenseND::reindex`]) with an overflow value for out-of-range reads
//! - **Scatter** ([`DenseND::reindex_reduce`]) with a [`ReduceOp`]
//! - **Broadcasting** ([`DenseND::broadcast_to`], [`DenseND::sum_to_shape`])
//! - **Errors** ([`TenidxError`]) shared by the whole workspace
//!
//! ## Core Principles
//!
//! ### SciRS2 Integration
//!
//! Storage and numeric traits come from `scirs2-core` (`ndarray_ext`,
//! `numeric`). Direct use of `ndarray` or `num-traits` is not allowed.
//!
//! ### Safety
//!
//! Kernels never read or write outside a buffer: locations produced by index
//! expressions are range-checked, and out-of-range locations read the overflow
//! value (gather) or are dropped (scatter).
//!
//! ## Quick Start
//!
//! ```
//! use tenidx_core::{AxisExpr, DenseND, ReduceOp};
//!
//! let x = DenseND::<f64>::from_vec((0..12).map(|v| v as f64).collect(), &[3, 4]).unwrap();
//!
//! // x[:, 2] as a gather
//! let col = x.reindex(&[3], &[AxisExpr::Coord(0), AxisExpr::Literal(2)], 0.0, &[]).unwrap();
//! assert_eq!(col.to_vec(), vec![2.0, 6.0, 10.0]);
//!
//! // and back: scatter the column into a zero 3x4 buffer
//! let back = col
//!     .reindex_reduce(ReduceOp::Add, &[3, 4], &[AxisExpr::Coord(0), AxisExpr::Literal(2)], &[])
//!     .unwrap();
//! assert_eq!(back[&[1, 2]], 6.0);
//! assert_eq!(back[&[1, 1]], 0.0);
//! ```
//!
//! ## Data-Dependent Indices
//!
//! An [`AxisExpr::Extra`] reads the coordinate from an auxiliary tensor,
//! which is how integer-array and mask indexing are expressed:
//!
//! ```
//! use tenidx_core::{AxisExpr, DenseND};
//!
//! let x = DenseND::<f64>::from_vec(vec![10.0, 20.0, 30.0], &[3]).unwrap();
//! let idx = DenseND::<f64>::from_vec(vec![2.0, 0.0, 5.0], &[3]).unwrap();
//! let exprs = [AxisExpr::Extra { slot: 0, coords: vec![0] }];
//! let picked = x.reindex(&[3], &exprs, -1.0, &[&idx]).unwrap();
//! assert_eq!(picked.to_vec(), vec![30.0, 10.0, -1.0]);
//! ```
//!
//! ## Error Handling
//!
//! Operations return [`Result`], an alias over [`TenidxError`]:
//!
//! ```
//! use tenidx_core::{DenseND, TenidxError};
//!
//! let err = DenseND::<f64>::zeros(&[3]).broadcast_to(&[4]).unwrap_err();
//! assert!(matches!(err, TenidxError::ShapeMismatch { .. }));
//! ```
//!
//! ## Features
//!
//! - `serde`: Serialization of [`AxisExpr`], [`DType`] and [`ReduceOp`]

#![deny(warnings)]

pub mod dense;
pub mod error;
pub mod expr;
pub mod types;


pub use dense::{DenseND, ReduceOp};
pub use error::{Result, TenidxError};
pub use expr::AxisExpr;
pub use types::{Axis, DType, Rank, Shape};
