//! Broadcast shape of fancy index operands
//!
//! Shapes are aligned on the right by padding with leading 1s:
//!
//! - `(3,)` + `(2, 1)` → `(2, 3)`
//! - `(4, 1)` + `(1, 5)` → `(4, 5)`
//! - `(2,)` + `(3,)` → error

use tenidx_core::{Result, TenidxError};

/// Common shape of `shapes` under NumPy broadcasting.
///
/// An empty set of shapes resolves to `[]`.
///
/// # Errors
///
/// `ShapeMismatch` if some axis has a size that is neither 1 nor the
/// maximum size on that axis.
///
/// # Examples
///
/// ```
/// use tenidx_exec::resolve_broadcast_shape;
///
/// let shape = resolve_broadcast_shape(&[vec![3], vec![2, 1]]).unwrap();
/// assert_eq!(shape, vec![2, 3]);
/// ```
pub fn resolve_broadcast_shape(shapes: &[Vec<usize>]) -> Result<Vec<usize>> {
    let rank = shapes.iter().map(Vec::len).max().unwrap_or(0);
    let padded: Vec<Vec<usize>> = shapes
        .iter()
        .map(|s| {
            let mut p = vec![1; rank - s.len()];
            p.extend_from_slice(s);
            p
        })
        .collect();

    let mut out = vec![1; rank];
    for (axis, size) in out.iter_mut().enumerate() {
        // max over the axis, except that a 0 wins over 1
        *size = padded
            .iter()
            .map(|p| p[axis])
            .find(|&d| d != 1)
            .unwrap_or(1);
    }

    let fits = padded
        .iter()
        .all(|p| p.iter().zip(&out).all(|(&d, &m)| d == 1 || d == m));
    if !fits {
        return Err(TenidxError::shape_mismatch(
            "fancy index operands",
            shapes.to_vec(),
        ));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_left_padding() {
        assert_eq!(
            resolve_broadcast_shape(&[vec![4, 1], vec![5]]).unwrap(),
            vec![4, 5]
        );
        assert_eq!(
            resolve_broadcast_shape(&[vec![2, 3], vec![2, 3]]).unwrap(),
            vec![2, 3]
        );
    }

    #[test]
    fn test_row_against_column() {
        assert_eq!(
            resolve_broadcast_shape(&[vec![3, 1], vec![1, 4]]).unwrap(),
            vec![3, 4]
        );
        assert!(matches!(
            resolve_broadcast_shape(&[vec![3], vec![4]]),
            Err(TenidxError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_empty_set() {
        assert_eq!(resolve_broadcast_shape(&[]).unwrap(), Vec::<usize>::new());
    }

    #[test]
    fn test_zero_sized_axis() {
        // a zero-sized axis only broadcasts against 1 or 0
        assert_eq!(resolve_broadcast_shape(&[vec![0], vec![1]]).unwrap(), vec![0]);
        assert!(resolve_broadcast_shape(&[vec![0], vec![2]]).is_err());
    }

    #[test]
    fn test_mismatch() {
        let err = resolve_broadcast_shape(&[vec![2], vec![3]]).unwrap_err();
        assert!(matches!(err, TenidxError::ShapeMismatch { .. }));
        assert!(err.to_string().starts_with("Shape not match"));
    }
}
