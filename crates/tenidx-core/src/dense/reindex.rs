//! Gather (`reindex`) and scatter (`reindex_reduce`) kernels
//!
//! Both kernels are driven by one [`AxisExpr`] per axis of the tensor being
//! read from (gather) or written into (scatter). The expressions are evaluated
//! against the coordinates of the *iteration space*:
//!
//! - gather: the iteration space is the output; for every output coordinate
//!   the expressions locate a source element, out-of-range locations read the
//!   overflow value.
//! - scatter: the iteration space is the input buffer; for every input
//!   coordinate the expressions locate a target element which is combined with
//!   the reduction operator, out-of-range locations are dropped.

use super::types::DenseND;
use crate::error::{Result, TenidxError};
use crate::expr::{render, AxisExpr};
use crate::types::{next_coord, numel, ravel_index, Shape};
use scirs2_core::numeric::Float;
use std::fmt;

/// Reduction operator for [`DenseND::reindex_reduce`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ReduceOp {
    /// Sum contributions (identity 0)
    Add,
    /// Keep the largest contribution (identity -inf)
    Max,
    /// Keep the smallest contribution (identity +inf)
    Min,
}

impl ReduceOp {
    /// Identity element the target buffer starts from
    pub fn identity<T: Float>(self) -> T {
        match self {
            ReduceOp::Add => T::zero(),
            ReduceOp::Max => T::neg_infinity(),
            ReduceOp::Min => T::infinity(),
        }
    }

    /// Combine an accumulator with a contribution
    pub fn combine<T: Float>(self, acc: T, value: T) -> T {
        match self {
            ReduceOp::Add => acc + value,
            ReduceOp::Max => acc.max(value),
            ReduceOp::Min => acc.min(value),
        }
    }
}

impl fmt::Display for ReduceOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReduceOp::Add => "add",
            ReduceOp::Max => "maximum",
            ReduceOp::Min => "minimum",
        };
        f.write_str(name)
    }
}

/// Validate that `exprs` address `target_rank` axes, read coordinates of an
/// iteration space of `space_rank` axes and use only existing extras slots.
pub fn validate_exprs(
    operation: &str,
    exprs: &[AxisExpr],
    target_rank: usize,
    space_rank: usize,
    num_extras: usize,
) -> Result<()> {
    if exprs.len() != target_rank {
        return Err(TenidxError::invalid(
            operation,
            format!(
                "{} index expressions for a tensor of rank {}",
                exprs.len(),
                target_rank
            ),
        ));
    }
    for expr in exprs {
        if let Some(c) = expr.max_coord() {
            if c >= space_rank {
                return Err(TenidxError::invalid(
                    operation,
                    format!(
                        "expression {} reads i{} but the iteration space has rank {}",
                        expr, c, space_rank
                    ),
                ));
            }
        }
        if let Some(slot) = expr.extra_slot() {
            if slot >= num_extras {
                return Err(TenidxError::invalid(
                    operation,
                    format!("expression {} uses a missing extras tensor", expr),
                ));
            }
        }
    }
    Ok(())
}

impl<T> DenseND<T>
where
    T: Float,
{
    /// Generalized gather.
    ///
    /// Produces a tensor of `shape` where element `i` is
    /// `self[exprs[0](i), exprs[1](i), ...]`, or `overflow` if that location
    /// is outside `self`.
    ///
    /// # Examples
    ///
    /// ```
    /// use tenidx_core::{AxisExpr, DenseND};
    ///
    /// // x[1:4:2] on a vector
    /// let x = DenseND::<f64>::from_vec(vec![0.0, 1.0, 2.0, 3.0, 4.0], &[5]).unwrap();
    /// let exprs = [AxisExpr::Affine { start: 1, coord: 0, step: 2 }];
    /// let y = x.reindex(&[2], &exprs, 0.0, &[]).unwrap();
    /// assert_eq!(y.to_vec(), vec![1.0, 3.0]);
    /// ```
    pub fn reindex(
        &self,
        shape: &[usize],
        exprs: &[AxisExpr],
        overflow: T,
        extras: &[&DenseND<T>],
    ) -> Result<Self> {
        validate_exprs("reindex", exprs, self.rank(), shape.len(), extras.len())?;

        let src_shape = self.shape().to_vec();
        let src = self.to_vec();
        let mut out = Vec::with_capacity(numel(shape));
        let mut src_idx = vec![0i64; exprs.len()];
        let mut coords: Shape = Shape::from_elem(0, shape.len());
        for _ in 0..numel(shape) {
            let mut in_range = true;
            for (slot, expr) in src_idx.iter_mut().zip(exprs) {
                match expr.eval(&coords, extras) {
                    Some(v) => *slot = v,
                    None => {
                        in_range = false;
                        break;
                    }
                }
            }
            let value = if in_range {
                ravel_index(&src_idx, &src_shape).map(|at| src[at])
            } else {
                None
            };
            out.push(value.unwrap_or(overflow));
            next_coord(&mut coords, shape);
        }
        Self::from_vec(out, shape)
    }

    /// Generalized scatter with reduction.
    ///
    /// Every element `i` of `self` is combined into
    /// `target[exprs[0](i), exprs[1](i), ...]` with `op`; the target starts
    /// from the identity of `op` and has shape `target_shape`. Locations
    /// outside the target are skipped.
    ///
    /// # Examples
    ///
    /// ```
    /// use tenidx_core::{AxisExpr, DenseND, ReduceOp};
    ///
    /// // scatter-add [1, 1, 1] into positions [0, 2, 0]
    /// let ones = DenseND::<f64>::ones(&[3]);
    /// let idx = DenseND::<f64>::from_vec(vec![0.0, 2.0, 0.0], &[3]).unwrap();
    /// let exprs = [AxisExpr::Extra { slot: 0, coords: vec![0] }];
    /// let counts = ones.reindex_reduce(ReduceOp::Add, &[4], &exprs, &[&idx]).unwrap();
    /// assert_eq!(counts.to_vec(), vec![2.0, 0.0, 1.0, 0.0]);
    /// ```
    pub fn reindex_reduce(
        &self,
        op: ReduceOp,
        target_shape: &[usize],
        exprs: &[AxisExpr],
        extras: &[&DenseND<T>],
    ) -> Result<Self> {
        validate_exprs(
            "reindex_reduce",
            exprs,
            target_shape.len(),
            self.rank(),
            extras.len(),
        )?;

        let space = self.shape().to_vec();
        let mut out = vec![op.identity::<T>(); numel(target_shape)];
        let mut dst_idx = vec![0i64; exprs.len()];
        let mut coords: Shape = Shape::from_elem(0, space.len());
        for &value in self.data.iter() {
            let in_range = dst_idx
                .iter_mut()
                .zip(exprs)
                .all(|(slot, expr)| match expr.eval(&coords, extras) {
                    Some(v) => {
                        *slot = v;
                        true
                    }
                    None => false,
                });
            if in_range {
                if let Some(at) = ravel_index(&dst_idx, target_shape) {
                    out[at] = op.combine(out[at], value);
                }
            }
            next_coord(&mut coords, &space);
        }
        Self::from_vec(out, target_shape)
    }
}

/// Debug rendering of a reindex call, used in trace logs
pub fn describe(shape: &[usize], exprs: &[AxisExpr], num_extras: usize) -> String {
    format!(
        "shape={:?} index={} extras={}",
        shape,
        render(exprs),
        num_extras
    )
}
