//! Indexed reads and writes on graph variables
//!
//! [`get`] is a single gather. [`set`] is expressed with scatter-adds and a
//! select so that it stays differentiable:
//!
//! ```text
//! xslice = reindex(x, out_shape, out_index)
//! value  = broadcast(value, shape(xslice))
//! mask   = reindex_reduce(add, ones(out_shape), shape(x), out_index)
//! data   = reindex_reduce(add, value,           shape(x), out_index)
//! x      = ternary(mask, data, x)
//! ```
//!
//! Positions written more than once receive the sum of their values.

use crate::compile::{compile_index, CompiledIndex};
use crate::operand::IndexOperand;
use scirs2_core::numeric::NumCast;
use tenidx_ad::{Element, GraphBuilder, Var};
use tenidx_core::{DenseND, ReduceOp, Result, TenidxError};
use tracing::{debug, instrument};

/// Right-hand side of an indexed write
#[derive(Debug, Clone)]
pub enum AssignValue<T: Element> {
    /// Single value broadcast over the selection
    Scalar(T),
    /// Dense value, broadcast to the selection shape
    Array(DenseND<T>),
    /// Graph variable, broadcast to the selection shape
    Tensor(Var),
}

impl<T: Element> From<DenseND<T>> for AssignValue<T> {
    fn from(value: DenseND<T>) -> Self {
        AssignValue::Array(value)
    }
}

impl<T: Element> From<Var> for AssignValue<T> {
    fn from(value: Var) -> Self {
        AssignValue::Tensor(value)
    }
}

fn overflow_value<T: Element>(graph: &GraphBuilder<T>) -> Result<T> {
    let value = graph.config().overflow_value;
    <T as NumCast>::from(value).ok_or_else(|| {
        TenidxError::invalid(
            "indexing",
            format!("overflow value {} is not representable", value),
        )
    })
}

fn gather<T: Element>(graph: &GraphBuilder<T>, x: Var, compiled: &CompiledIndex) -> Result<Var> {
    let out = graph.reindex(
        x,
        &compiled.out_shape,
        &compiled.out_index,
        overflow_value(graph)?,
        &compiled.extras,
    )?;
    if graph.config().index_fusion_barriers {
        graph.stop_fuse(out)?;
    }
    Ok(out)
}

/// Read `x[operands]`.
///
/// Fancy index values outside their axis read the configured overflow value
/// (0 by default) instead of failing.
///
/// # Examples
///
/// ```
/// use tenidx_ad::GraphBuilder;
/// use tenidx_core::DenseND;
/// use tenidx_exec::{get, IndexOperand};
///
/// let graph = GraphBuilder::<f64>::new();
/// let x = graph.constant(DenseND::from_vec((0..12).map(f64::from).collect(), &[3, 4]).unwrap());
///
/// // x[1:, [0, 3]]
/// let y = get(&graph, x, &[(1..).into(), vec![0i64, 3].into()]).unwrap();
/// assert_eq!(graph.shape(y).unwrap(), vec![2, 2]);
/// assert_eq!(graph.value(y).unwrap().to_vec(), vec![4.0, 7.0, 8.0, 11.0]);
/// ```
#[instrument(skip(graph, operands), level = "debug")]
pub fn get<T: Element>(graph: &GraphBuilder<T>, x: Var, operands: &[IndexOperand]) -> Result<Var> {
    let compiled = compile_index(graph, x, operands)?;
    let out = gather(graph, x, &compiled)?;
    debug!(result = %out, shape = ?compiled.out_shape, "indexed read");
    Ok(out)
}

/// Write `x[operands] = value` and rebind `x` to the result.
///
/// Returns `x`, which keeps its identity.
///
/// # Errors
///
/// Everything [`compile_index`] reports, plus `ShapeMismatch` when `value`
/// does not broadcast to the selection.
///
/// # Examples
///
/// ```
/// use tenidx_ad::GraphBuilder;
/// use tenidx_core::DenseND;
/// use tenidx_exec::{set, AssignValue, IndexOperand};
///
/// let graph = GraphBuilder::<f64>::new();
/// let x = graph.constant(DenseND::zeros(&[2, 3]));
///
/// // x[:, 1] = 5
/// set(&graph, x, &[(..).into(), 1i64.into()], AssignValue::Scalar(5.0)).unwrap();
/// assert_eq!(graph.value(x).unwrap().to_vec(), vec![0.0, 5.0, 0.0, 0.0, 5.0, 0.0]);
/// ```
#[instrument(skip(graph, operands, value), level = "debug")]
pub fn set<T: Element>(
    graph: &GraphBuilder<T>,
    x: Var,
    operands: &[IndexOperand],
    value: impl Into<AssignValue<T>>,
) -> Result<Var> {
    let compiled = compile_index(graph, x, operands)?;
    let x_shape = graph.shape(x)?;
    let xslice = gather(graph, x, &compiled)?;
    let slice_shape = graph.shape(xslice)?;

    let value = match value.into() {
        AssignValue::Scalar(v) => graph.broadcast_scalar(v, &slice_shape),
        AssignValue::Array(dense) => graph.constant(dense),
        AssignValue::Tensor(var) => var,
    };
    let value_shape = graph.shape(value)?;
    let value = if value_shape == slice_shape {
        value
    } else {
        graph.broadcast(value, &slice_shape).map_err(|_| {
            TenidxError::shape_mismatch("indexed write value", vec![value_shape, slice_shape.clone()])
        })?
    };

    let ones = graph.broadcast_scalar(T::one(), &slice_shape);
    let mask = graph.reindex_reduce(
        ReduceOp::Add,
        ones,
        &x_shape,
        &compiled.out_index,
        &compiled.extras,
    )?;
    let data = graph.reindex_reduce(
        ReduceOp::Add,
        value,
        &x_shape,
        &compiled.out_index,
        &compiled.extras,
    )?;
    let out = graph.ternary(mask, data, x)?;
    if graph.config().index_fusion_barriers {
        graph.stop_fuse(out)?;
    }
    graph.assign(x, out)?;
    debug!(target_var = %x, node = %graph.node_of(x)?, shape = ?slice_shape, "indexed write");
    Ok(x)
}

/// Indexing as methods on the graph
///
/// # Examples
///
/// ```
/// use tenidx_ad::GraphBuilder;
/// use tenidx_core::DenseND;
/// use tenidx_exec::{IndexOperand, Indexing};
///
/// let graph = GraphBuilder::<f64>::new();
/// let x = graph.constant(DenseND::from_vec(vec![1.0, 2.0, 3.0], &[3]).unwrap());
/// let ops: [IndexOperand; 1] = [vec![2i64, 0].into()];
/// graph.set(x, &ops, DenseND::from_vec(vec![30.0, 10.0], &[2]).unwrap()).unwrap();
/// let y = graph.get(x, &ops).unwrap();
/// assert_eq!(graph.value(y).unwrap().to_vec(), vec![30.0, 10.0]);
/// ```
pub trait Indexing<T: Element> {
    /// `x[operands]`
    fn get(&self, x: Var, operands: &[IndexOperand]) -> Result<Var>;

    /// `x[operands] = value`
    fn set(&self, x: Var, operands: &[IndexOperand], value: impl Into<AssignValue<T>>)
        -> Result<Var>;
}

impl<T: Element> Indexing<T> for GraphBuilder<T> {
    fn get(&self, x: Var, operands: &[IndexOperand]) -> Result<Var> {
        get(self, x, operands)
    }

    fn set(
        &self,
        x: Var,
        operands: &[IndexOperand],
        value: impl Into<AssignValue<T>>,
    ) -> Result<Var> {
        set(self, x, operands, value)
    }
}
