//! Core type definitions for tenidx tensors.
//!
//! - Type aliases for tensor dimensions ([`Axis`], [`Rank`], [`Shape`])
//! - Element kind tag ([`DType`]) carried by graph handles
//! - Row-major coordinate helpers shared by the gather/scatter kernels
//!
//! # Examples
//!
//! ```
//! use tenidx_core::types::{numel, unravel_index};
//!
//! assert_eq!(numel(&[2, 3, 4]), 24);
//! assert_eq!(unravel_index(4, &[2, 3]), vec![1, 1]);
//! ```

use smallvec::SmallVec;
use std::fmt;

pub use crate::dense::DenseND;

/// Type alias for tensor axis index (zero-based).
pub type Axis = usize;

/// Type alias for tensor rank (number of dimensions).
pub type Rank = usize;

/// Shape type using SmallVec to avoid heap allocation for common cases.
///
/// Optimized for tensors with up to 6 dimensions.
pub type Shape = SmallVec<[usize; 6]>;

/// Logical element kind of a tensor.
///
/// Storage is always the graph's float type; the tag decides how a tensor may
/// be used as an index operand.
///
/// # Examples
///
/// ```
/// use tenidx_core::DType;
///
/// assert!(DType::Int.is_integral());
/// assert!(DType::Bool.is_integral());
/// assert!(!DType::Float.is_integral());
/// assert_eq!(DType::Bool.to_string(), "bool");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DType {
    /// Floating point values
    #[default]
    Float,
    /// Integral values (indices)
    Int,
    /// 0/1 values (masks)
    Bool,
}

impl DType {
    /// Whether values of this kind are whole numbers
    pub fn is_integral(self) -> bool {
        matches!(self, DType::Int | DType::Bool)
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DType::Float => "float",
            DType::Int => "int",
            DType::Bool => "bool",
        };
        f.write_str(name)
    }
}

/// Number of elements of a shape (1 for rank 0)
pub fn numel(shape: &[usize]) -> usize {
    shape.iter().product()
}

/// Convert a row-major flat offset into coordinates.
///
/// `flat` must be below `numel(shape)`.
pub fn unravel_index(mut flat: usize, shape: &[usize]) -> Vec<usize> {
    debug_assert!(
        flat < numel(shape),
        "flat offset {} out of range for shape {:?}",
        flat,
        shape
    );
    let mut coords = vec![0; shape.len()];
    for axis in (0..shape.len()).rev() {
        let dim = shape[axis];
        if dim == 0 {
            continue;
        }
        coords[axis] = flat % dim;
        flat /= dim;
    }
    coords
}

/// Convert coordinates into a row-major flat offset.
///
/// Returns `None` when any coordinate is outside the shape.
pub fn ravel_index(coords: &[i64], shape: &[usize]) -> Option<usize> {
    if coords.len() != shape.len() {
        return None;
    }
    let mut flat = 0usize;
    for (&c, &dim) in coords.iter().zip(shape) {
        if c < 0 || c as usize >= dim {
            return None;
        }
        flat = flat * dim + c as usize;
    }
    Some(flat)
}

/// Step row-major coordinates to the next element; wraps to all zeros
/// after the last one.
pub fn next_coord(coords: &mut [usize], shape: &[usize]) {
    for (c, &dim) in coords.iter_mut().zip(shape).rev() {
        *c += 1;
        if *c < dim {
            return;
        }
        *c = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ravel_unravel_agree() {
        let shape = [3, 4, 5];
        for flat in 0..numel(&shape) {
            let coords: Vec<i64> = unravel_index(flat, &shape)
                .into_iter()
                .map(|c| c as i64)
                .collect();
            assert_eq!(ravel_index(&coords, &shape), Some(flat));
        }
    }

    #[test]
    fn test_unravel_last_element() {
        assert_eq!(unravel_index(4, &[2, 3]), vec![1, 1]);
        assert_eq!(unravel_index(5, &[2, 3]), vec![1, 2]);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    #[cfg(debug_assertions)]
    fn test_unravel_rejects_overflowing_offset() {
        unravel_index(7, &[2, 3]);
    }

    #[test]
    fn test_next_coord_walks_row_major() {
        let shape = [2, 3];
        let mut coords: Shape = Shape::from_elem(0, 2);
        for flat in 0..numel(&shape) {
            assert_eq!(coords.to_vec(), unravel_index(flat, &shape));
            next_coord(&mut coords, &shape);
        }
        assert_eq!(coords.to_vec(), vec![0, 0]);
    }

    #[test]
    fn test_ravel_out_of_range() {
        assert_eq!(ravel_index(&[0, 4], &[2, 4]), None);
        assert_eq!(ravel_index(&[-1, 0], &[2, 4]), None);
        assert_eq!(ravel_index(&[0], &[2, 4]), None);
    }

    #[test]
    fn test_numel_scalar() {
        assert_eq!(numel(&[]), 1);
        assert_eq!(numel(&[3, 0]), 0);
    }
}
