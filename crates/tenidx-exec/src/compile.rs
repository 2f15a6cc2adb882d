//! Index-expression compiler
//!
//! Turns a list of [`IndexOperand`]s into the output shape and per-source-axis
//! [`AxisExpr`]s of a single gather. The same compiled form drives both the
//! read path (`reindex`) and the write path (`reindex_reduce`).
//!
//! Layout of the output axes follows NumPy advanced indexing with one
//! simplification: the broadcast block of all fancy operands is placed where
//! the *first* fancy operand appears, even when fancy operands are separated
//! by slices.
//!
//! ```text
//! x: (5, 6, 7, 8)
//! x[1, ::2, [0, 2, 4]]
//!   out_shape = [3, 3, 8]
//!   out_index = [1, 0+i0*2, @e0(i1), i2]
//! ```

use crate::broadcast::resolve_broadcast_shape;
use crate::operand::{IndexOperand, SliceSpec};
use tenidx_ad::{Element, GraphBuilder, Var};
use tenidx_core::expr::render;
use tenidx_core::{AxisExpr, DType, Result, TenidxError};
use tracing::{debug, instrument, trace};

/// Compiled form of an index expression
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledIndex {
    /// Shape of the indexed result
    pub out_shape: Vec<usize>,
    /// One expression per axis of the indexed tensor
    pub out_index: Vec<AxisExpr>,
    /// Broadcast fancy index tensors, in operand order
    pub extras: Vec<Var>,
}

/// Resolve a slice against an axis of size `n`.
///
/// Returns `(start, step, len)` with `start` the first visited coordinate.
/// Negative bounds count from the end and are clamped to the axis the way
/// NumPy does; a negative step walks backwards.
///
/// # Errors
///
/// `UnsupportedIndex` for a zero step.
///
/// # Examples
///
/// ```
/// use tenidx_exec::{resolve_slice, SliceSpec};
///
/// assert_eq!(resolve_slice(&SliceSpec::new(Some(-3), None, None), 10).unwrap(), (7, 1, 3));
/// assert_eq!(resolve_slice(&SliceSpec::new(None, None, Some(-2)), 5).unwrap(), (4, -2, 3));
/// assert_eq!(resolve_slice(&SliceSpec::new(Some(8), Some(2), None), 10).unwrap(), (8, 1, 0));
/// ```
pub fn resolve_slice(spec: &SliceSpec, n: usize) -> Result<(i64, i64, usize)> {
    let step = spec.step.unwrap_or(1);
    if step == 0 {
        return Err(TenidxError::unsupported(
            spec.to_string(),
            "slice step cannot be zero",
        ));
    }
    let n = n as i64;
    let (lower, upper) = if step < 0 { (-1, n - 1) } else { (0, n) };
    let clamp = |bound: i64| {
        let bound = if bound < 0 { bound + n } else { bound };
        bound.clamp(lower, upper)
    };
    let start = spec
        .start
        .map(clamp)
        .unwrap_or(if step < 0 { upper } else { lower });
    let stop = spec
        .stop
        .map(clamp)
        .unwrap_or(if step < 0 { lower } else { upper });

    let len = if step > 0 && start < stop {
        (stop - start - 1) / step + 1
    } else if step < 0 && stop < start {
        (start - stop - 1) / (-step) + 1
    } else {
        0
    };
    Ok((start, step, len as usize))
}

/// Operand after dtype checks and materialization of index arrays
enum Prepared {
    Int(i64),
    Slice(SliceSpec),
    Fancy(Var),
}

/// Compile `operands` against the shape of `x`.
///
/// Index arrays given by value are materialized as `Int` constants, fancy
/// operands whose shape differs from the broadcast shape get a `broadcast`
/// node, and `x` is marked as a fusion barrier when
/// [`GraphConfig::index_fusion_barriers`](tenidx_ad::GraphConfig) is set.
///
/// # Errors
///
/// - `TooManyIndices` for more operands than axes
/// - `UnsupportedIndex` for `Ellipsis`, `NewAxis`, a mask that is not the
///   sole operand, float index tensors and zero slice steps
/// - `IndexOutOfBounds` for integer operands outside their axis
/// - `ShapeMismatch` for fancy operands that do not broadcast, or a mask
///   whose shape is not a prefix of `x`'s shape
#[instrument(skip(graph, operands), fields(num_operands = operands.len()), level = "debug")]
pub fn compile_index<T: Element>(
    graph: &GraphBuilder<T>,
    x: Var,
    operands: &[IndexOperand],
) -> Result<CompiledIndex> {
    let shape = graph.shape(x)?;
    if operands.len() > shape.len() {
        return Err(TenidxError::TooManyIndices {
            given: operands.len(),
            rank: shape.len(),
        });
    }

    let prepared = prepare(graph, &shape, operands)?;

    let fancy: Vec<Var> = prepared
        .iter()
        .filter_map(|p| match p {
            Prepared::Fancy(v) => Some(*v),
            _ => None,
        })
        .collect();
    let fancy_shapes = fancy
        .iter()
        .map(|&v| graph.shape(v))
        .collect::<Result<Vec<_>>>()?;
    let block_shape = resolve_broadcast_shape(&fancy_shapes)?;
    let extras = fancy
        .into_iter()
        .zip(&fancy_shapes)
        .map(|(v, s)| {
            if *s == block_shape {
                Ok(v)
            } else {
                graph.broadcast(v, &block_shape)
            }
        })
        .collect::<Result<Vec<Var>>>()?;

    let mut out_shape = Vec::with_capacity(shape.len() + block_shape.len());
    let mut out_index = Vec::with_capacity(shape.len());
    let mut block: Option<Vec<usize>> = None;
    let mut slot = 0;
    let full = Prepared::Slice(SliceSpec::full());

    for (axis, &n) in shape.iter().enumerate() {
        match prepared.get(axis).unwrap_or(&full) {
            Prepared::Int(i) => {
                let index = if *i < 0 { i + n as i64 } else { *i };
                if index < 0 || index >= n as i64 {
                    return Err(TenidxError::IndexOutOfBounds {
                        index: *i,
                        axis,
                        size: n,
                    });
                }
                out_index.push(AxisExpr::Literal(index));
            }
            Prepared::Slice(spec) => {
                let (start, step, len) = resolve_slice(spec, n)?;
                let coord = out_shape.len();
                out_shape.push(len);
                if start == 0 && step == 1 && len == n {
                    out_index.push(AxisExpr::Coord(coord));
                } else {
                    out_index.push(AxisExpr::Affine { start, coord, step });
                }
            }
            Prepared::Fancy(_) => {
                let coords = block
                    .get_or_insert_with(|| {
                        let first = out_shape.len();
                        out_shape.extend_from_slice(&block_shape);
                        (first..first + block_shape.len()).collect()
                    })
                    .clone();
                out_index.push(AxisExpr::Extra { slot, coords });
                slot += 1;
            }
        }
    }

    if out_shape.is_empty() {
        out_shape.push(1);
    }
    if graph.config().index_fusion_barriers {
        graph.stop_fuse(x)?;
    }

    debug!(
        out_shape = ?out_shape,
        out_index = %render(&out_index),
        extras = extras.len(),
        "compiled index"
    );
    Ok(CompiledIndex {
        out_shape,
        out_index,
        extras,
    })
}

fn prepare<T: Element>(
    graph: &GraphBuilder<T>,
    shape: &[usize],
    operands: &[IndexOperand],
) -> Result<Vec<Prepared>> {
    // a lone boolean operand selects through the coordinates of its true entries
    if let [sole] = operands {
        let mask = match sole {
            IndexOperand::Mask(m) => Some(*m),
            IndexOperand::Tensor(t) if graph.dtype(*t)? == DType::Bool => Some(*t),
            _ => None,
        };
        if let Some(mask) = mask {
            let mask_shape = graph.shape(mask)?;
            if mask_shape.len() > shape.len() || mask_shape[..] != shape[..mask_shape.len()] {
                return Err(TenidxError::shape_mismatch(
                    "boolean mask against indexed tensor",
                    vec![mask_shape, shape.to_vec()],
                ));
            }
            let coords = graph.where_nonzero(mask)?;
            trace!(axes = coords.len(), "mask index");
            return Ok(coords.into_iter().map(Prepared::Fancy).collect());
        }
    }

    operands
        .iter()
        .map(|operand| match operand {
            IndexOperand::Int(i) => Ok(Prepared::Int(*i)),
            IndexOperand::Slice(s) => Ok(Prepared::Slice(*s)),
            IndexOperand::Array(a) => Ok(Prepared::Fancy(
                graph.index_constant(&a.values, &a.shape)?,
            )),
            IndexOperand::Tensor(t) => match graph.dtype(*t)? {
                DType::Int => Ok(Prepared::Fancy(*t)),
                DType::Bool => Err(TenidxError::unsupported(
                    operand.to_string(),
                    "a boolean index must be the only operand",
                )),
                DType::Float => Err(TenidxError::unsupported(
                    operand.to_string(),
                    "index tensors must hold integers",
                )),
            },
            IndexOperand::Mask(_) => Err(TenidxError::unsupported(
                operand.to_string(),
                "a boolean mask must be the only operand",
            )),
            IndexOperand::Ellipsis | IndexOperand::NewAxis => Err(TenidxError::unsupported(
                operand.to_string(),
                "not supported by the index compiler",
            )),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operand::IndexArray;
    use tenidx_core::DenseND;

    fn graph_with(shape: &[usize]) -> (GraphBuilder<f64>, Var) {
        let graph = GraphBuilder::new();
        let n = shape.iter().product::<usize>();
        let data = (0..n).map(|v| v as f64).collect();
        let x = graph.constant(DenseND::from_vec(data, shape).unwrap());
        (graph, x)
    }

    #[test]
    fn test_resolve_slice_numpy_rules() {
        let s = |start, stop, step| SliceSpec::new(start, stop, step);
        assert_eq!(resolve_slice(&s(None, None, None), 4).unwrap(), (0, 1, 4));
        assert_eq!(resolve_slice(&s(Some(1), Some(-1), None), 4).unwrap(), (1, 1, 2));
        assert_eq!(resolve_slice(&s(Some(-10), Some(10), None), 4).unwrap(), (0, 1, 4));
        assert_eq!(resolve_slice(&s(None, None, Some(-1)), 4).unwrap(), (3, -1, 4));
        assert_eq!(resolve_slice(&s(Some(2), Some(0), Some(-1)), 4).unwrap(), (2, -1, 2));
        assert_eq!(resolve_slice(&s(Some(1), Some(7), Some(3)), 8).unwrap(), (1, 3, 2));
        assert_eq!(resolve_slice(&s(None, None, None), 0).unwrap(), (0, 1, 0));
        assert!(matches!(
            resolve_slice(&s(None, None, Some(0)), 4),
            Err(TenidxError::UnsupportedIndex { .. })
        ));
    }

    #[test]
    fn test_compile_mixed() {
        let (graph, x) = graph_with(&[5, 6, 7, 8]);
        let ops = vec![
            IndexOperand::Int(1),
            SliceSpec::new(None, None, Some(2)).into(),
            vec![0i64, 2, 4].into(),
        ];
        let c = compile_index(&graph, x, &ops).unwrap();
        assert_eq!(c.out_shape, vec![3, 3, 8]);
        assert_eq!(render(&c.out_index), "[1, 0+i0*2, @e0(i1), i2]");
        assert_eq!(c.extras.len(), 1);
        assert!(graph.is_barrier(x).unwrap());
    }

    #[test]
    fn test_fancy_block_at_first_operand() {
        let (graph, x) = graph_with(&[4, 5, 6]);
        let rows = IndexArray::new(vec![0, 1, 2, 3, 0, 1], &[2, 3]).unwrap();
        let ops = vec![rows.into(), IndexOperand::from(..), vec![5i64, 4, 3].into()];
        let c = compile_index(&graph, x, &ops).unwrap();
        assert_eq!(c.out_shape, vec![2, 3, 5]);
        assert_eq!(render(&c.out_index), "[@e0(i0,i1), i2, @e1(i0,i1)]");
        // the second operand was broadcast from [3] to [2, 3]
        assert_eq!(graph.shape(c.extras[1]).unwrap(), vec![2, 3]);
        assert_eq!(graph.op_label(c.extras[1]).unwrap(), "Broadcast");
    }

    #[test]
    fn test_all_integers_give_single_element() {
        let (graph, x) = graph_with(&[3, 4]);
        let c = compile_index(&graph, x, &[IndexOperand::Int(-1), IndexOperand::Int(0)]).unwrap();
        assert_eq!(c.out_shape, vec![1]);
        assert_eq!(c.out_index, vec![AxisExpr::Literal(2), AxisExpr::Literal(0)]);
    }

    #[test]
    fn test_integer_out_of_bounds() {
        let (graph, x) = graph_with(&[3, 4]);
        let err = compile_index(&graph, x, &[IndexOperand::Int(0), IndexOperand::Int(-5)]).unwrap_err();
        assert_eq!(
            err,
            TenidxError::IndexOutOfBounds {
                index: -5,
                axis: 1,
                size: 4
            }
        );
    }

    #[test]
    fn test_rejected_operands() {
        let (graph, x) = graph_with(&[3, 4]);
        let too_many = vec![IndexOperand::Int(0); 3];
        assert!(matches!(
            compile_index(&graph, x, &too_many),
            Err(TenidxError::TooManyIndices { given: 3, rank: 2 })
        ));
        for op in [IndexOperand::Ellipsis, IndexOperand::NewAxis] {
            assert!(matches!(
                compile_index(&graph, x, &[op]),
                Err(TenidxError::UnsupportedIndex { .. })
            ));
        }
        let float_index = graph.constant(DenseND::from_vec(vec![0.0, 1.0], &[2]).unwrap());
        assert!(matches!(
            compile_index(&graph, x, &[IndexOperand::Tensor(float_index)]),
            Err(TenidxError::UnsupportedIndex { .. })
        ));
        let mask = graph.constant_of(DenseND::ones(&[3]), DType::Bool);
        assert!(matches!(
            compile_index(&graph, x, &[IndexOperand::Mask(mask), IndexOperand::Int(0)]),
            Err(TenidxError::UnsupportedIndex { .. })
        ));
    }

    #[test]
    fn test_mask_compiles_to_coordinates() {
        let (graph, x) = graph_with(&[2, 3]);
        let mask = graph.constant_of(
            DenseND::from_vec(vec![1.0, 0.0, 1.0, 0.0, 0.0, 1.0], &[2, 3]).unwrap(),
            DType::Bool,
        );
        let c = compile_index(&graph, x, &[IndexOperand::Mask(mask)]).unwrap();
        assert_eq!(c.out_shape, vec![3]);
        assert_eq!(render(&c.out_index), "[@e0(i0), @e1(i0)]");
        assert_eq!(graph.value(c.extras[0]).unwrap().to_vec(), vec![0.0, 0.0, 1.0]);
        assert_eq!(graph.value(c.extras[1]).unwrap().to_vec(), vec![0.0, 2.0, 2.0]);

        let bad = graph.constant_of(DenseND::ones(&[3]), DType::Bool);
        assert!(matches!(
            compile_index(&graph, x, &[IndexOperand::Mask(bad)]),
            Err(TenidxError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_barriers_can_be_disabled() {
        let graph = GraphBuilder::<f64>::with_config(
            tenidx_ad::GraphConfig::new().index_fusion_barriers(false),
        );
        let x = graph.constant(DenseND::zeros(&[4]));
        compile_index(&graph, x, &[(1..3).into()]).unwrap();
        assert!(!graph.is_barrier(x).unwrap());
    }
}
