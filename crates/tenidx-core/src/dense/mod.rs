//! Dense tensor implementation and operations
//!
//! The storage type lives in `types`; the remaining sub-modules add kernels
//! to it by functionality.

// Core type definition
pub mod types;

// Operation modules (organized by functionality)
mod broadcast;
mod comparison;
mod elementwise;
pub mod reindex;

// Supporting modules
pub mod densend_traits;

// Re-export the main type
pub use types::DenseND;

pub use broadcast::broadcastable_to;
pub use reindex::ReduceOp;
