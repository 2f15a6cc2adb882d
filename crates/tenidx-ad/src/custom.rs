//! User-defined kernels recorded as single graph nodes
//!
//! A [`CustomOp`] supplies both the forward computation and its
//! vector-Jacobian product. The graph calls `forward` when the node is
//! recorded and `backward` when a gradient flows through it.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use tenidx_ad::{CustomOp, GraphBuilder};
//! use tenidx_core::{DenseND, Result};
//!
//! #[derive(Debug)]
//! struct Triple;
//!
//! impl CustomOp<f64> for Triple {
//!     fn name(&self) -> &str {
//!         "triple"
//!     }
//!     fn forward(&self, inputs: &[&DenseND<f64>]) -> Result<DenseND<f64>> {
//!         Ok(inputs[0].scale(3.0))
//!     }
//!     fn backward(
//!         &self,
//!         _inputs: &[&DenseND<f64>],
//!         _output: &DenseND<f64>,
//!         grad_output: &DenseND<f64>,
//!     ) -> Result<Vec<Option<DenseND<f64>>>> {
//!         Ok(vec![Some(grad_output.scale(3.0))])
//!     }
//! }
//!
//! let graph = GraphBuilder::<f64>::new();
//! let x = graph.constant(DenseND::from_vec(vec![1.0, 2.0], &[2]).unwrap());
//! let y = graph.custom(Arc::new(Triple), &[x]).unwrap();
//! assert_eq!(graph.value(y).unwrap().to_vec(), vec![3.0, 6.0]);
//! ```

use scirs2_core::numeric::Float;
use std::fmt::Debug;
use tenidx_core::{DenseND, Result};

/// Forward kernel plus its gradient rule
pub trait CustomOp<T>: Debug + Send + Sync
where
    T: Float + 'static,
{
    /// Name used in graph statistics and logs
    fn name(&self) -> &str;

    /// Compute the output from the input values.
    ///
    /// Validation errors (bad ranks, bad sizes) are reported here, before the
    /// node exists.
    fn forward(&self, inputs: &[&DenseND<T>]) -> Result<DenseND<T>>;

    /// Gradients with respect to each input, given the gradient of the output.
    ///
    /// Returns one entry per input; `None` marks an input that receives no
    /// gradient.
    fn backward(
        &self,
        inputs: &[&DenseND<T>],
        output: &DenseND<T>,
        grad_output: &DenseND<T>,
    ) -> Result<Vec<Option<DenseND<T>>>>;
}
