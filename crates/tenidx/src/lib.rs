//! # tenidx - NumPy-style indexing on a differentiable tensor graph
//!
//! This is the **meta crate** that re-exports all tenidx components for convenient access.
//!
//! ## Quick Start
//!
//! ```
//! use tenidx::prelude::*;
//!
//! let graph = GraphBuilder::<f64>::new();
//! let x = graph.constant(DenseND::from_vec((0..6).map(f64::from).collect(), &[2, 3])?);
//!
//! // y = x[:, [2, 0]]
//! let y = graph.get(x, &[(..).into(), vec![2i64, 0].into()])?;
//! assert_eq!(graph.value(y)?.to_vec(), vec![2.0, 0.0, 5.0, 3.0]);
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Components
//!
//! ### Core Types ([`core`])
//!
//! Dense tensors, per-axis index expressions ([`AxisExpr`](core::AxisExpr)),
//! the gather/scatter kernels and the shared error type.
//!
//! ```
//! use tenidx::core::{AxisExpr, DenseND};
//!
//! let x = DenseND::<f64>::from_vec(vec![1.0, 2.0, 3.0], &[3]).unwrap();
//! let reversed = x
//!     .reindex(&[3], &[AxisExpr::Affine { start: 2, coord: 0, step: -1 }], 0.0, &[])
//!     .unwrap();
//! assert_eq!(reversed.to_vec(), vec![3.0, 2.0, 1.0]);
//! ```
//!
//! ### Graph and Gradients ([`ad`])
//!
//! `GraphBuilder`, reverse-mode `grad`, named scopes, custom kernels and Adam.
//!
//! ### Indexing Operators ([`exec`])
//!
//! Index compilation, `get` / `set`, `concat` and `argmax_pool`.
//!
//! ```
//! use tenidx::prelude::*;
//!
//! let graph = GraphBuilder::<f64>::new();
//! let w = graph.parameter("net", "w", DenseND::from_vec(vec![1.0, 2.0], &[2])?)?;
//! let mut adam = Adam::new(&graph, "net", AdamConfig::new().learning_rate(0.1))?;
//!
//! let both = concat(&graph, &[w, w], 0)?;
//! let loss = graph.sum(graph.square(both)?)?;
//! adam.step(&graph, loss)?;
//! assert_eq!(adam.num_steps(), 1);
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Features
//!
//! - `tracing`: Enable [`tracing_support::init_tracing`] (tracing-subscriber)
//! - `serde`: Serialize configs, index operands and expressions
//! - `full`: Enable all features

#![deny(warnings)]

// Re-export all components
pub use tenidx_ad as ad;
pub use tenidx_core as core;
pub use tenidx_exec as exec;

pub mod tracing_support;

pub mod prelude {
    //! Prelude module for convenient imports
    //!
    //! # Example
    //!
    //! ```
    //! use tenidx::prelude::*;
    //!
    //! let graph = GraphBuilder::<f32>::new();
    //! let x = graph.constant(DenseND::zeros(&[4, 4]));
    //! ```

    // Core types
    pub use crate::core::{AxisExpr, DType, DenseND, ReduceOp, TenidxError};

    // Graph
    pub use crate::ad::{
        adam, Adam, AdamConfig, CustomOp, GraphBuilder, GraphConfig, Optimizer, OptimizerState,
        Var,
    };

    // Indexing operators
    pub use crate::exec::{
        argmax_pool, concat, AssignValue, IndexArray, IndexOperand, Indexing, SliceSpec,
    };
}
