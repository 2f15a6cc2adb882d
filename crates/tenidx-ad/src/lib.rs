//! # tenidx-ad
//!
//! Tensor-expression graph builder for tenidx.
//!
//! This crate provides:
//! - [`GraphBuilder`]: records gather/scatter, broadcast, select and elementwise
//!   nodes and materializes their values
//! - [`Var`] handles with identity-preserving `assign`
//! - Reverse-mode gradients (`GraphBuilder::grad`) through every recorded operation
//! - [`CustomOp`] kernels with user-provided gradients
//! - Named scopes and persistent variables for optimizer state
//! - The Adam optimizer ([`optimizers`])

#![deny(warnings)]

pub mod config;
pub mod custom;
pub mod graph;
pub mod optimizers;
pub mod scope;

// Re-exports
pub use config::GraphConfig;
pub use custom::CustomOp;
pub use graph::{Element, GraphBuilder, GraphStats, NodeId, Operation, Var, VarId};
pub use optimizers::{adam, Adam, AdamConfig, Optimizer, OptimizerState};
pub use scope::Scope;
