//! NumPy-style broadcasting on dense tensors
//!
//! - [`broadcastable_to`]: right-aligned compatibility check
//! - [`DenseND::broadcast_to`]: materialize a tensor at a larger shape
//! - [`DenseND::sum_to_shape`]: the adjoint of `broadcast_to`, used by gradients

use super::types::DenseND;
use crate::error::{Result, TenidxError};
use scirs2_core::ndarray_ext::{Axis as NdAxis, IxDyn};
use scirs2_core::numeric::Num;

/// Check whether `from` can be broadcast to `to` (right-aligned, 1 stretches)
pub fn broadcastable_to(from: &[usize], to: &[usize]) -> bool {
    if from.len() > to.len() {
        return false;
    }
    let offset = to.len() - from.len();
    from.iter()
        .enumerate()
        .all(|(i, &dim)| dim == 1 || dim == to[offset + i])
}

impl<T> DenseND<T>
where
    T: Clone + Num,
{
    /// Broadcast this tensor to a target shape
    ///
    /// # Examples
    ///
    /// ```
    /// use tenidx_core::DenseND;
    ///
    /// let row = DenseND::<f64>::from_vec(vec![1.0, 2.0, 3.0], &[1, 3]).unwrap();
    /// let grid = row.broadcast_to(&[2, 3]).unwrap();
    /// assert_eq!(grid.to_vec(), vec![1.0, 2.0, 3.0, 1.0, 2.0, 3.0]);
    /// ```
    pub fn broadcast_to(&self, target_shape: &[usize]) -> Result<Self> {
        let src_shape = self.shape();
        let mismatch = || {
            TenidxError::shape_mismatch(
                "broadcast",
                vec![src_shape.to_vec(), target_shape.to_vec()],
            )
        };
        if !broadcastable_to(src_shape, target_shape) {
            return Err(mismatch());
        }
        let view = self.data.broadcast(IxDyn(target_shape)).ok_or_else(mismatch)?;
        Ok(Self::from_array(view.to_owned()))
    }

    /// Sum over the axes that `broadcast_to` stretched, returning `shape`.
    ///
    /// # Examples
    ///
    /// ```
    /// use tenidx_core::DenseND;
    ///
    /// let grid = DenseND::<f64>::ones(&[2, 3]);
    /// let col = grid.sum_to_shape(&[2, 1]).unwrap();
    /// assert_eq!(col.to_vec(), vec![3.0, 3.0]);
    /// ```
    pub fn sum_to_shape(&self, shape: &[usize]) -> Result<Self> {
        let src_shape = self.shape();
        if !broadcastable_to(shape, src_shape) {
            return Err(TenidxError::shape_mismatch(
                "sum_to_shape",
                vec![src_shape.to_vec(), shape.to_vec()],
            ));
        }

        let mut summed = self.data.clone();
        for _ in 0..src_shape.len() - shape.len() {
            summed = summed.sum_axis(NdAxis(0));
        }
        for (axis, &dim) in shape.iter().enumerate() {
            if dim == 1 && summed.shape()[axis] != 1 {
                summed = summed.sum_axis(NdAxis(axis)).insert_axis(NdAxis(axis));
            }
        }
        Ok(Self::from_array(summed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcast_rank_extension() {
        let v = DenseND::<f64>::from_vec(vec![1.0, 2.0], &[2]).unwrap();
        let b = v.broadcast_to(&[3, 2]).unwrap();
        assert_eq!(b.shape(), &[3, 2]);
        assert_eq!(b[&[2, 1]], 2.0);
    }

    #[test]
    fn test_broadcast_incompatible() {
        let v = DenseND::<f64>::zeros(&[3]);
        assert!(matches!(
            v.broadcast_to(&[4]),
            Err(TenidxError::ShapeMismatch { .. })
        ));
        assert!(v.broadcast_to(&[]).is_err());
    }

    #[test]
    fn test_broadcast_stretches_to_zero() {
        let v = DenseND::<f64>::ones(&[1, 3]);
        let b = v.broadcast_to(&[0, 3]).unwrap();
        assert_eq!(b.shape(), &[0, 3]);
        assert_eq!(b.sum_to_shape(&[1, 3]).unwrap().to_vec(), vec![0.0; 3]);
    }

    #[test]
    fn test_sum_to_shape_is_adjoint_of_broadcast() {
        let col = DenseND::<f64>::from_vec(vec![1.0, 2.0], &[2, 1]).unwrap();
        let grid = col.broadcast_to(&[3, 2, 4]).unwrap();
        assert_eq!(grid[&[2, 1, 3]], 2.0);
        let back = grid.sum_to_shape(&[2, 1]).unwrap();
        assert_eq!(back.shape(), &[2, 1]);
        assert_eq!(back.to_vec(), vec![12.0, 24.0]);
    }

    #[test]
    fn test_sum_to_shape_drops_leading_axes() {
        let grid = DenseND::<f64>::from_vec(vec![1.0, 2.0, 3.0, 4.0], &[2, 2]).unwrap();
        let row = grid.sum_to_shape(&[2]).unwrap();
        assert_eq!(row.to_vec(), vec![4.0, 6.0]);
        let all = grid.sum_to_shape(&[1]).unwrap();
        assert_eq!(all.to_vec(), vec![10.0]);
    }
}
