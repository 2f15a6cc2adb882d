//! Concatenation along one axis
//!
//! Each input is embedded into the full output shape with a shifted gather
//! (zero outside its range) and the embeddings are summed. Gradients flow
//! back through the gathers without a dedicated backward rule.

use tenidx_ad::{Element, GraphBuilder, Var};
use tenidx_core::{Axis, AxisExpr, Result, TenidxError};
use tracing::{debug, instrument};

/// Concatenate `inputs` along `dim`.
///
/// With at least [`GraphConfig::concat_fuse_threshold`](tenidx_ad::GraphConfig)
/// inputs every embedding is a fusion barrier.
///
/// # Errors
///
/// - `InvalidArgument` for an empty input list or `dim` outside the rank
/// - `ShapeMismatch` for inputs of different ranks or different sizes on
///   an axis other than `dim`
///
/// # Examples
///
/// ```
/// use tenidx_ad::GraphBuilder;
/// use tenidx_core::DenseND;
/// use tenidx_exec::concat;
///
/// let graph = GraphBuilder::<f64>::new();
/// let a = graph.constant(DenseND::from_vec(vec![1.0, 2.0], &[2, 1]).unwrap());
/// let b = graph.constant(DenseND::from_vec(vec![3.0, 4.0, 5.0, 6.0], &[2, 2]).unwrap());
/// let c = concat(&graph, &[a, b], 1).unwrap();
/// assert_eq!(graph.shape(c).unwrap(), vec![2, 3]);
/// assert_eq!(graph.value(c).unwrap().to_vec(), vec![1.0, 3.0, 4.0, 2.0, 5.0, 6.0]);
/// ```
#[instrument(skip(graph, inputs), fields(num_inputs = inputs.len()), level = "debug")]
pub fn concat<T: Element>(graph: &GraphBuilder<T>, inputs: &[Var], dim: Axis) -> Result<Var> {
    let shapes = inputs
        .iter()
        .map(|&v| graph.shape(v))
        .collect::<Result<Vec<_>>>()?;
    let first = shapes
        .first()
        .ok_or_else(|| TenidxError::invalid("concat", "no inputs"))?;
    let rank = first.len();
    if dim >= rank {
        return Err(TenidxError::invalid(
            "concat",
            format!("dim {} out of range for rank {}", dim, rank),
        ));
    }
    let compatible = shapes.iter().all(|s| {
        s.len() == rank
            && s.iter()
                .zip(first)
                .enumerate()
                .all(|(axis, (a, b))| axis == dim || a == b)
    });
    if !compatible {
        return Err(TenidxError::shape_mismatch("concat", shapes));
    }

    let mut out_shape = first.clone();
    out_shape[dim] = shapes.iter().map(|s| s[dim]).sum();
    let fuse = inputs.len() >= graph.config().concat_fuse_threshold;

    let mut offset = 0;
    let mut total: Option<Var> = None;
    for (&input, shape) in inputs.iter().zip(&shapes) {
        let exprs: Vec<AxisExpr> = (0..rank)
            .map(|axis| {
                if axis == dim {
                    AxisExpr::Shift {
                        coord: axis,
                        offset: offset as i64,
                    }
                } else {
                    AxisExpr::Coord(axis)
                }
            })
            .collect();
        let embedded = graph.reindex(input, &out_shape, &exprs, T::zero(), &[])?;
        if fuse {
            graph.stop_fuse(embedded)?;
        }
        total = Some(match total {
            Some(acc) => graph.add(acc, embedded)?,
            None => embedded,
        });
        offset += shape[dim];
    }

    debug!(out_shape = ?out_shape, barriers = fuse, "concat");
    total.ok_or_else(|| TenidxError::invalid("concat", "no inputs"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tenidx_ad::GraphConfig;
    use tenidx_core::DenseND;

    #[test]
    fn test_concat_axis0() {
        let graph = GraphBuilder::<f64>::new();
        let a = graph.constant(DenseND::from_vec(vec![1.0, 2.0], &[1, 2]).unwrap());
        let b = graph.constant(DenseND::from_vec(vec![3.0, 4.0, 5.0, 6.0], &[2, 2]).unwrap());
        let c = concat(&graph, &[a, b], 0).unwrap();
        assert_eq!(graph.shape(c).unwrap(), vec![3, 2]);
        assert_eq!(
            graph.value(c).unwrap().to_vec(),
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]
        );
    }

    #[test]
    fn test_single_input_is_copy() {
        let graph = GraphBuilder::<f64>::new();
        let a = graph.constant(DenseND::from_vec(vec![1.0, 2.0, 3.0], &[3]).unwrap());
        let c = concat(&graph, &[a], 0).unwrap();
        assert_eq!(graph.value(c).unwrap().to_vec(), vec![1.0, 2.0, 3.0]);
        assert_eq!(graph.op_label(c).unwrap(), "Reindex");
    }

    #[test]
    fn test_barriers_from_threshold() {
        let graph = GraphBuilder::<f64>::with_config(GraphConfig::new().concat_fuse_threshold(3));
        let parts: Vec<Var> = (0..3)
            .map(|i| graph.constant(DenseND::from_elem(&[1], i as f64)))
            .collect();
        let before = graph.stats().num_barriers;
        concat(&graph, &parts, 0).unwrap();
        assert_eq!(graph.stats().num_barriers - before, 3);

        let few = concat(&graph, &parts[..2], 0).unwrap();
        assert!(!graph.is_barrier(few).unwrap());
    }

    #[test]
    fn test_concat_errors() {
        let graph = GraphBuilder::<f64>::new();
        assert!(matches!(
            concat(&graph, &[], 0),
            Err(TenidxError::InvalidArgument { .. })
        ));
        let a = graph.constant(DenseND::zeros(&[2, 2]));
        let b = graph.constant(DenseND::zeros(&[3, 3]));
        let v = graph.constant(DenseND::zeros(&[2]));
        assert!(matches!(
            concat(&graph, &[a], 2),
            Err(TenidxError::InvalidArgument { .. })
        ));
        assert!(matches!(
            concat(&graph, &[a, b], 0),
            Err(TenidxError::ShapeMismatch { .. })
        ));
        assert!(matches!(
            concat(&graph, &[a, v], 0),
            Err(TenidxError::ShapeMismatch { .. })
        ));
    }
}
