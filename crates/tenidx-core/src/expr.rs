//! Per-axis index expressions
//!
//! A gather (`reindex`) or scatter (`reindex_reduce`) is described by one
//! [`AxisExpr`] per axis of the *source* tensor. Each expression maps the
//! coordinates of the output iteration space (`i0, i1, ...`) to a coordinate
//! along its source axis:
//!
//! | variant   | rendered        | meaning                                     |
//! |-----------|-----------------|---------------------------------------------|
//! | `Literal` | `3`             | fixed coordinate (integer index)            |
//! | `Coord`   | `i1`            | identity on an output axis (full slice)     |
//! | `Affine`  | `2+i1*3`        | `start + i*step` (bounded slice)            |
//! | `Shift`   | `i0-4`          | `i - offset` (embedding, used by concat)    |
//! | `Extra`   | `@e0(i1,i2)`    | value of extras tensor `e0` at `(i1, i2)`   |
//!
//! # Examples
//!
//! ```
//! use tenidx_core::AxisExpr;
//!
//! let exprs = vec![
//!     AxisExpr::Literal(3),
//!     AxisExpr::Affine { start: 2, coord: 0, step: 3 },
//!     AxisExpr::Extra { slot: 0, coords: vec![1, 2] },
//! ];
//! let rendered: Vec<String> = exprs.iter().map(|e| e.to_string()).collect();
//! assert_eq!(rendered, vec!["3", "2+i0*3", "@e0(i1,i2)"]);
//! ```

use crate::dense::DenseND;
use scirs2_core::numeric::Float;
use std::fmt;

/// Index expression for one source axis
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AxisExpr {
    /// Constant coordinate
    Literal(i64),
    /// Output coordinate `i{0}`
    Coord(usize),
    /// `start + i{coord} * step`
    Affine { start: i64, coord: usize, step: i64 },
    /// `i{coord} - offset`
    Shift { coord: usize, offset: i64 },
    /// `@e{slot}(i{coords[0]}, ...)`
    Extra { slot: usize, coords: Vec<usize> },
}

impl AxisExpr {
    /// Evaluate against an output coordinate.
    ///
    /// Returns `None` if an extras lookup falls outside its tensor or the
    /// stored index value cannot be converted to an integer (NaN, infinite).
    pub fn eval<T: Float>(&self, out: &[usize], extras: &[&DenseND<T>]) -> Option<i64> {
        match self {
            AxisExpr::Literal(v) => Some(*v),
            AxisExpr::Coord(c) => out.get(*c).map(|&i| i as i64),
            AxisExpr::Affine { start, coord, step } => {
                out.get(*coord).map(|&i| start + (i as i64) * step)
            }
            AxisExpr::Shift { coord, offset } => out.get(*coord).map(|&i| i as i64 - offset),
            AxisExpr::Extra { slot, coords } => {
                let table = extras.get(*slot)?;
                let at: Option<Vec<usize>> = coords.iter().map(|c| out.get(*c).copied()).collect();
                let value = table.get(&at?)?;
                value.to_i64()
            }
        }
    }

    /// Largest output axis referenced by this expression, if any
    pub fn max_coord(&self) -> Option<usize> {
        match self {
            AxisExpr::Literal(_) => None,
            AxisExpr::Coord(c) | AxisExpr::Affine { coord: c, .. } | AxisExpr::Shift { coord: c, .. } => {
                Some(*c)
            }
            AxisExpr::Extra { coords, .. } => coords.iter().copied().max(),
        }
    }

    /// Extras slot used by this expression
    pub fn extra_slot(&self) -> Option<usize> {
        match self {
            AxisExpr::Extra { slot, .. } => Some(*slot),
            _ => None,
        }
    }
}

impl fmt::Display for AxisExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AxisExpr::Literal(v) => write!(f, "{}", v),
            AxisExpr::Coord(c) => write!(f, "i{}", c),
            AxisExpr::Affine { start, coord, step } => write!(f, "{}+i{}*{}", start, coord, step),
            AxisExpr::Shift { coord, offset } => write!(f, "i{}-{}", coord, offset),
            AxisExpr::Extra { slot, coords } => {
                write!(f, "@e{}(", slot)?;
                for (n, c) in coords.iter().enumerate() {
                    if n > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "i{}", c)?;
                }
                f.write_str(")")
            }
        }
    }
}

/// Render a full expression list the way kernels log it: `[i0, 2+i1*3]`
pub fn render(exprs: &[AxisExpr]) -> String {
    let parts: Vec<String> = exprs.iter().map(|e| e.to_string()).collect();
    format!("[{}]", parts.join(", "))
}
