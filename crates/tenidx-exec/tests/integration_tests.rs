//! Integration tests for tenidx-exec
//!
//! Indexing, concat and pooling used together with gradients and Adam.

use anyhow::Result;
use tenidx_ad::{Adam, AdamConfig, GraphBuilder};
use tenidx_core::{DType, DenseND, TenidxError};
use tenidx_exec::{
    argmax_pool, concat, AssignValue, IndexArray, IndexOperand, Indexing, SliceSpec,
};

fn arange(graph: &GraphBuilder<f64>, shape: &[usize]) -> Result<tenidx_ad::Var> {
    let n: usize = shape.iter().product();
    Ok(graph.constant(DenseND::from_vec((0..n).map(|v| v as f64).collect(), shape)?))
}

#[test]
fn test_numpy_style_reads() -> Result<()> {
    let graph = GraphBuilder::<f64>::new();
    let x = arange(&graph, &[3, 4, 5])?;

    // x[-1]
    let last = graph.get(x, &[(-1i64).into()])?;
    assert_eq!(graph.shape(last)?, vec![4, 5]);
    assert_eq!(graph.value(last)?.to_vec()[0], 40.0);

    // x[:, ::-2, 1]
    let strided = graph.get(
        x,
        &[(..).into(), SliceSpec::new(None, None, Some(-2)).into(), 1i64.into()],
    )?;
    assert_eq!(graph.shape(strided)?, vec![3, 2]);
    assert_eq!(
        graph.value(strided)?.to_vec(),
        vec![16.0, 6.0, 36.0, 26.0, 56.0, 46.0]
    );

    // x[[0, 2], :, [4, 0]] places the fancy block first
    let fancy = graph.get(
        x,
        &[vec![0i64, 2].into(), (..).into(), vec![4i64, 0].into()],
    )?;
    assert_eq!(graph.shape(fancy)?, vec![2, 4]);
    assert_eq!(
        graph.value(fancy)?.to_vec(),
        vec![4.0, 9.0, 14.0, 19.0, 40.0, 45.0, 50.0, 55.0]
    );

    // x[1, 2, 3] is a single element of shape [1]
    let one = graph.get(x, &[1i64.into(), 2i64.into(), 3i64.into()])?;
    assert_eq!(graph.shape(one)?, vec![1]);
    assert_eq!(graph.value(one)?.to_vec(), vec![33.0]);
    Ok(())
}

#[test]
fn test_two_dimensional_index_array() -> Result<()> {
    let graph = GraphBuilder::<f64>::new();
    let x = arange(&graph, &[5])?;
    let idx = IndexArray::from_rows(&[vec![4, 3], vec![0, 0]])?;
    let y = graph.get(x, &[idx.into()])?;
    assert_eq!(graph.shape(y)?, vec![2, 2]);
    assert_eq!(graph.value(y)?.to_vec(), vec![4.0, 3.0, 0.0, 0.0]);
    Ok(())
}

#[test]
fn test_bool_tensor_as_sole_index() -> Result<()> {
    let graph = GraphBuilder::<f64>::new();
    let x = arange(&graph, &[4, 2])?;
    let keep = graph.constant_of(DenseND::from_vec(vec![1.0, 0.0, 0.0, 1.0], &[4])?, DType::Bool);
    let rows = graph.get(x, &[IndexOperand::Tensor(keep)])?;
    assert_eq!(graph.shape(rows)?, vec![2, 2]);
    assert_eq!(graph.value(rows)?.to_vec(), vec![0.0, 1.0, 6.0, 7.0]);

    // x[mask] = 0
    graph.set(x, &[IndexOperand::Mask(keep)], AssignValue::Scalar(0.0))?;
    assert_eq!(
        graph.value(x)?.to_vec(),
        vec![0.0, 0.0, 2.0, 3.0, 4.0, 5.0, 0.0, 0.0]
    );
    Ok(())
}

#[test]
fn test_write_keeps_identity_and_graph_grows() -> Result<()> {
    let graph = GraphBuilder::<f64>::new();
    let x = arange(&graph, &[4])?;
    let node_before = graph.node_of(x)?;
    let returned = graph.set(x, &[(1..3).into()], DenseND::from_vec(vec![9.0, 8.0], &[2])?)?;
    assert_eq!(returned, x);
    assert_ne!(graph.node_of(x)?, node_before);
    assert!(graph.is_barrier(x)?);
    assert_eq!(graph.value(x)?.to_vec(), vec![0.0, 9.0, 8.0, 3.0]);
    Ok(())
}

#[test]
fn test_errors_surface_eagerly() -> Result<()> {
    let graph = GraphBuilder::<f64>::new();
    let x = arange(&graph, &[2, 2])?;
    assert!(matches!(
        graph.get(x, &[0i64.into(), 0i64.into(), 0i64.into()]),
        Err(TenidxError::TooManyIndices { .. })
    ));
    assert!(matches!(
        graph.get(x, &[vec![0i64, 1].into(), vec![0i64, 1, 0].into()]),
        Err(TenidxError::ShapeMismatch { .. })
    ));
    assert!(matches!(
        graph.get(x, &[2i64.into()]),
        Err(TenidxError::IndexOutOfBounds { index: 2, axis: 0, size: 2 })
    ));
    Ok(())
}

#[test]
fn test_gradient_of_gather_accumulates_repeats() -> Result<()> {
    let graph = GraphBuilder::<f64>::new();
    let w = graph.parameter("emb", "table", DenseND::from_vec(vec![1.0; 4], &[4])?)?;
    let picked = graph.get(w, &[vec![3i64, 1, 3, 3].into()])?;
    let loss = graph.sum(picked)?;
    let grads = graph.grad(loss, &[w])?;
    assert_eq!(graph.value(grads[0])?.to_vec(), vec![0.0, 1.0, 0.0, 3.0]);
    Ok(())
}

#[test]
fn test_gradient_through_write() -> Result<()> {
    let graph = GraphBuilder::<f64>::new();
    let x = graph.parameter("m", "x", DenseND::from_vec(vec![1.0, 2.0, 3.0], &[3])?)?;
    let v = graph.parameter("m", "v", DenseND::from_vec(vec![5.0], &[1])?)?;
    let y = graph.mul_scalar(x, 1.0)?;
    graph.set(y, &[1i64.into()], v)?;
    let loss = graph.sum(y)?;

    let grads = graph.grad(loss, &[x, v])?;
    // the overwritten element passes no gradient back to x
    assert_eq!(graph.value(grads[0])?.to_vec(), vec![1.0, 0.0, 1.0]);
    assert_eq!(graph.value(grads[1])?.to_vec(), vec![1.0]);
    Ok(())
}

#[test]
fn test_concat_many_inputs_records_barriers() -> Result<()> {
    let graph = GraphBuilder::<f64>::new();
    let parts: Vec<_> = (0..12)
        .map(|i| graph.constant(DenseND::from_elem(&[1, 2], i as f64)))
        .collect();
    let before = graph.stats().num_barriers;
    let joined = concat(&graph, &parts, 0)?;
    assert_eq!(graph.stats().num_barriers - before, 12);
    assert_eq!(graph.shape(joined)?, vec![12, 2]);
    assert_eq!(graph.value(joined)?.to_vec()[22], 11.0);
    Ok(())
}

#[test]
fn test_concat_gradient_splits() -> Result<()> {
    let graph = GraphBuilder::<f64>::new();
    let a = graph.parameter("c", "a", DenseND::from_vec(vec![1.0, 2.0], &[2])?)?;
    let b = graph.parameter("c", "b", DenseND::from_vec(vec![3.0], &[1])?)?;
    let joined = concat(&graph, &[a, b], 0)?;
    let weights = graph.constant(DenseND::from_vec(vec![1.0, 2.0, 3.0], &[3])?);
    let loss = graph.sum(graph.mul(joined, weights)?)?;
    let grads = graph.grad(loss, &[a, b])?;
    assert_eq!(graph.value(grads[0])?.to_vec(), vec![1.0, 2.0]);
    assert_eq!(graph.value(grads[1])?.to_vec(), vec![3.0]);
    Ok(())
}

#[test]
fn test_concat_stacks_row_blocks() -> Result<()> {
    let graph = GraphBuilder::<f64>::new();
    let a_data: Vec<f64> = (0..10).map(|v| v as f64).collect();
    let b_data: Vec<f64> = (0..15).map(|v| 100.0 + v as f64).collect();
    let a = graph.constant(DenseND::from_vec(a_data.clone(), &[2, 5])?);
    let b = graph.constant(DenseND::from_vec(b_data.clone(), &[3, 5])?);

    let joined = concat(&graph, &[a, b], 0)?;
    assert_eq!(graph.shape(joined)?, vec![5, 5]);

    let head = graph.get(joined, &[(..2).into()])?;
    let tail = graph.get(joined, &[(2..).into()])?;
    assert_eq!(graph.value(head)?.to_vec(), a_data);
    assert_eq!(graph.value(tail)?.to_vec(), b_data);
    Ok(())
}

#[test]
fn test_pool_routes_gradient_to_window_max() -> Result<()> {
    let graph = GraphBuilder::<f64>::new();
    let x = graph.parameter(
        "pool2",
        "x",
        DenseND::from_vec(vec![1.0, 5.0, 3.0, 2.0], &[1, 1, 2, 2])?,
    )?;
    let pooled = argmax_pool(&graph, x, 2, 1, 0)?;
    assert_eq!(graph.shape(pooled)?, vec![1, 1, 1, 1]);
    assert_eq!(graph.value(pooled)?.to_vec(), vec![5.0]);

    let loss = graph.sum(pooled)?;
    let grads = graph.grad(loss, &[x])?;
    assert_eq!(graph.value(grads[0])?.to_vec(), vec![0.0, 1.0, 0.0, 0.0]);
    Ok(())
}

#[test]
fn test_adam_trains_through_pooling() -> Result<()> {
    let graph = GraphBuilder::<f64>::new();
    let data: Vec<f64> = (0..16).map(|v| v as f64 / 4.0).collect();
    let x = graph.parameter("pool", "x", DenseND::from_vec(data, &[1, 1, 4, 4])?)?;
    let mut adam = Adam::new(&graph, "pool", AdamConfig::new().learning_rate(0.05))?;

    let loss_of = |graph: &GraphBuilder<f64>| -> Result<tenidx_ad::Var> {
        let pooled = argmax_pool(graph, x, 2, 2, 0)?;
        Ok(graph.sum(graph.square(pooled)?)?)
    };

    let first = graph.value(loss_of(&graph)?)?.to_vec()[0];
    for _ in 0..50 {
        let loss = loss_of(&graph)?;
        adam.step(&graph, loss)?;
    }
    let last = graph.value(loss_of(&graph)?)?.to_vec()[0];
    assert!(last < first, "loss did not decrease: {} -> {}", first, last);
    assert_eq!(adam.num_steps(), 50);
    Ok(())
}
