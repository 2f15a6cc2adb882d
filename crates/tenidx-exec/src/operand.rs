//! Index operands
//!
//! One [`IndexOperand`] per indexed axis, in the order of the source axes.
//! Axes beyond the operand list are taken whole.
//!
//! # Examples
//!
//! ```
//! use tenidx_exec::{IndexOperand, SliceSpec};
//!
//! // x[1, 2.., ::2, [0, 3]]
//! let ops: Vec<IndexOperand> = vec![
//!     1i64.into(),
//!     (2..).into(),
//!     SliceSpec::new(None, None, Some(2)).into(),
//!     vec![0i64, 3].into(),
//! ];
//! assert_eq!(ops[1], IndexOperand::Slice(SliceSpec::new(Some(2), None, None)));
//! ```

use std::fmt;
use std::ops::{Range, RangeFrom, RangeFull, RangeInclusive, RangeTo};
use tenidx_ad::Var;
use tenidx_core::types::numel;
use tenidx_core::{Result, TenidxError};

/// `start:stop:step` with NumPy defaults for missing parts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SliceSpec {
    pub start: Option<i64>,
    pub stop: Option<i64>,
    pub step: Option<i64>,
}

impl SliceSpec {
    pub fn new(start: Option<i64>, stop: Option<i64>, step: Option<i64>) -> Self {
        Self { start, stop, step }
    }

    /// `:`
    pub fn full() -> Self {
        Self::default()
    }

    /// Whether this is `:` (no bound, no step)
    pub fn is_full(&self) -> bool {
        self.start.is_none() && self.stop.is_none() && self.step.is_none()
    }

    /// Same slice with a step
    pub fn step_by(mut self, step: i64) -> Self {
        self.step = Some(step);
        self
    }
}

impl fmt::Display for SliceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let part = |v: Option<i64>| v.map(|v| v.to_string()).unwrap_or_default();
        write!(f, "{}:{}", part(self.start), part(self.stop))?;
        if let Some(step) = self.step {
            write!(f, ":{}", step)?;
        }
        Ok(())
    }
}

/// Integer index array given by value (list or nested list)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IndexArray {
    /// Indices in row-major order
    pub values: Vec<i64>,
    /// Shape of the array
    pub shape: Vec<usize>,
}

impl IndexArray {
    /// Array of `shape`; `values.len()` must match
    pub fn new(values: Vec<i64>, shape: &[usize]) -> Result<Self> {
        if values.len() != numel(shape) {
            return Err(TenidxError::shape_mismatch(
                format!(
                    "index array of shape {:?} needs {} values, got {}",
                    shape,
                    numel(shape),
                    values.len()
                ),
                vec![shape.to_vec(), vec![values.len()]],
            ));
        }
        Ok(Self {
            values,
            shape: shape.to_vec(),
        })
    }

    /// 2-D array from rows of equal length
    pub fn from_rows(rows: &[Vec<i64>]) -> Result<Self> {
        let width = rows.first().map_or(0, |r| r.len());
        if rows.iter().any(|r| r.len() != width) {
            return Err(TenidxError::invalid("index array", "ragged rows"));
        }
        let values = rows.iter().flatten().copied().collect();
        Self::new(values, &[rows.len(), width])
    }
}

impl From<Vec<i64>> for IndexArray {
    fn from(values: Vec<i64>) -> Self {
        let len = values.len();
        Self {
            values,
            shape: vec![len],
        }
    }
}

/// One entry of an index expression
#[derive(Debug, Clone, PartialEq)]
pub enum IndexOperand {
    /// Single position; negative counts from the end; removes the axis
    Int(i64),
    /// Range of positions
    Slice(SliceSpec),
    /// Boolean mask; only valid as the sole operand
    Mask(Var),
    /// Integer index array given by value
    Array(IndexArray),
    /// Integer (or boolean) index tensor of the graph
    Tensor(Var),
    /// `...` (not supported)
    Ellipsis,
    /// `None` / `newaxis` (not supported)
    NewAxis,
}

impl IndexOperand {
    /// Whether the operand takes part in fancy-index broadcasting
    pub fn is_fancy(&self) -> bool {
        matches!(self, IndexOperand::Array(_) | IndexOperand::Tensor(_))
    }
}

impl fmt::Display for IndexOperand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexOperand::Int(i) => write!(f, "{}", i),
            IndexOperand::Slice(s) => write!(f, "{}", s),
            IndexOperand::Mask(v) => write!(f, "mask {}", v),
            IndexOperand::Array(a) => write!(f, "array{:?}", a.shape),
            IndexOperand::Tensor(v) => write!(f, "tensor {}", v),
            IndexOperand::Ellipsis => f.write_str("..."),
            IndexOperand::NewAxis => f.write_str("newaxis"),
        }
    }
}

impl From<i64> for IndexOperand {
    fn from(i: i64) -> Self {
        IndexOperand::Int(i)
    }
}

impl From<i32> for IndexOperand {
    fn from(i: i32) -> Self {
        IndexOperand::Int(i as i64)
    }
}

impl From<usize> for IndexOperand {
    fn from(i: usize) -> Self {
        IndexOperand::Int(i as i64)
    }
}

impl From<SliceSpec> for IndexOperand {
    fn from(s: SliceSpec) -> Self {
        IndexOperand::Slice(s)
    }
}

impl From<Range<i64>> for IndexOperand {
    fn from(r: Range<i64>) -> Self {
        IndexOperand::Slice(SliceSpec::new(Some(r.start), Some(r.end), None))
    }
}

impl From<RangeFrom<i64>> for IndexOperand {
    fn from(r: RangeFrom<i64>) -> Self {
        IndexOperand::Slice(SliceSpec::new(Some(r.start), None, None))
    }
}

impl From<RangeTo<i64>> for IndexOperand {
    fn from(r: RangeTo<i64>) -> Self {
        IndexOperand::Slice(SliceSpec::new(None, Some(r.end), None))
    }
}

impl From<RangeInclusive<i64>> for IndexOperand {
    fn from(r: RangeInclusive<i64>) -> Self {
        // `a..=-1` would become an empty `a:0`; leave the stop open instead.
        // `i64::MAX` is past every axis, so it is open too.
        let stop = match *r.end() {
            -1 => None,
            end => end.checked_add(1),
        };
        IndexOperand::Slice(SliceSpec::new(Some(*r.start()), stop, None))
    }
}

impl From<RangeFull> for IndexOperand {
    fn from(_: RangeFull) -> Self {
        IndexOperand::Slice(SliceSpec::full())
    }
}

impl From<Vec<i64>> for IndexOperand {
    fn from(values: Vec<i64>) -> Self {
        IndexOperand::Array(values.into())
    }
}

impl From<IndexArray> for IndexOperand {
    fn from(a: IndexArray) -> Self {
        IndexOperand::Array(a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_conversions() {
        assert_eq!(
            IndexOperand::from(1..4),
            IndexOperand::Slice(SliceSpec::new(Some(1), Some(4), None))
        );
        assert_eq!(
            IndexOperand::from(..3),
            IndexOperand::Slice(SliceSpec::new(None, Some(3), None))
        );
        assert_eq!(
            IndexOperand::from(1..=2),
            IndexOperand::Slice(SliceSpec::new(Some(1), Some(3), None))
        );
        assert_eq!(
            IndexOperand::from(-3..=-1),
            IndexOperand::Slice(SliceSpec::new(Some(-3), None, None))
        );
        assert_eq!(IndexOperand::from(..), IndexOperand::Slice(SliceSpec::full()));
    }

    #[test]
    fn test_inclusive_range_to_i64_max() {
        assert_eq!(
            IndexOperand::from(2..=i64::MAX),
            IndexOperand::Slice(SliceSpec::new(Some(2), None, None))
        );
    }

    #[test]
    fn test_index_array_validation() {
        assert!(IndexArray::new(vec![1, 2, 3], &[2, 2]).is_err());
        let a = IndexArray::from_rows(&[vec![0, 1], vec![2, 3]]).unwrap();
        assert_eq!(a.shape, vec![2, 2]);
        assert!(IndexArray::from_rows(&[vec![0], vec![1, 2]]).is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(SliceSpec::new(Some(1), None, Some(-1)).to_string(), "1::-1");
        assert_eq!(SliceSpec::full().to_string(), ":");
        assert_eq!(IndexOperand::Ellipsis.to_string(), "...");
        assert!(!IndexOperand::Int(0).is_fancy());
        assert!(IndexOperand::from(vec![0i64]).is_fancy());
    }
}
