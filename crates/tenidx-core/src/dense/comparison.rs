//! Masking and selection on tensors
//!
//! Non-zero elements are "true". Boolean masks are stored as 0/1 values of
//! the tensor's element type.

use super::types::DenseND;
use crate::error::{Result, TenidxError};
use scirs2_core::ndarray_ext::Zip;
use scirs2_core::numeric::Num;

impl<T> DenseND<T>
where
    T: Clone + Num,
{
    /// Coordinates of the non-zero elements, one vector per axis.
    ///
    /// Coordinates are listed in row-major order, so `nonzero()[k][n]` is the
    /// `k`-th coordinate of the `n`-th true element.
    ///
    /// # Examples
    ///
    /// ```
    /// use tenidx_core::DenseND;
    ///
    /// let mask = DenseND::<f64>::from_vec(vec![0.0, 1.0, 1.0, 0.0], &[2, 2]).unwrap();
    /// let coords = mask.nonzero();
    /// assert_eq!(coords, vec![vec![0, 1], vec![1, 0]]);
    /// ```
    pub fn nonzero(&self) -> Vec<Vec<i64>> {
        let mut coords = vec![Vec::new(); self.rank()];
        for (idx, value) in self.data.indexed_iter() {
            if value.is_zero() {
                continue;
            }
            for (axis, list) in coords.iter_mut().enumerate() {
                list.push(idx[axis] as i64);
            }
        }
        coords
    }

    /// Number of non-zero elements
    pub fn count_nonzero(&self) -> usize {
        self.data.iter().filter(|v| !v.is_zero()).count()
    }

    /// Element-wise `cond ? on_true : on_false`.
    ///
    /// All three tensors must share a shape.
    ///
    /// # Examples
    ///
    /// ```
    /// use tenidx_core::DenseND;
    ///
    /// let cond = DenseND::<f64>::from_vec(vec![1.0, 0.0, 1.0], &[3]).unwrap();
    /// let a = DenseND::<f64>::from_vec(vec![1.0, 2.0, 3.0], &[3]).unwrap();
    /// let b = DenseND::<f64>::zeros(&[3]);
    /// let picked = DenseND::select(&cond, &a, &b).unwrap();
    /// assert_eq!(picked.to_vec(), vec![1.0, 0.0, 3.0]);
    /// ```
    pub fn select(cond: &Self, on_true: &Self, on_false: &Self) -> Result<Self> {
        if cond.shape() != on_true.shape() || cond.shape() != on_false.shape() {
            return Err(TenidxError::shape_mismatch(
                "ternary",
                vec![cond.shape_vec(), on_true.shape_vec(), on_false.shape_vec()],
            ));
        }
        let data = Zip::from(&cond.data)
            .and(&on_true.data)
            .and(&on_false.data)
            .map_collect(|c, t, f| if c.is_zero() { f.clone() } else { t.clone() });
        Ok(Self::from_array(data))
    }
}
