//! End-to-end use of the prelude: a tiny embedding model trained with Adam.

use anyhow::Result;
use tenidx::prelude::*;
use tenidx::tracing_support::record_graph_stats;

#[test]
fn test_embedding_lookup_trains() -> Result<()> {
    let graph = GraphBuilder::<f64>::new();
    let table = graph.parameter(
        "emb",
        "table",
        DenseND::from_vec(vec![0.5, -0.5, 1.0, 2.0, -1.0, 0.0], &[3, 2])?,
    )?;
    let mut adam = Adam::new(&graph, "emb", AdamConfig::new().learning_rate(0.05))?;

    // rows 2 and 0 should move toward 1.0
    let target = graph.constant(DenseND::ones(&[2, 2]));
    let loss_of = |graph: &GraphBuilder<f64>| -> Result<Var> {
        let rows = graph.get(table, &[vec![2i64, 0].into()])?;
        let diff = graph.sub(rows, target)?;
        Ok(graph.sum(graph.square(diff)?)?)
    };

    let first = graph.value(loss_of(&graph)?)?.to_vec()[0];
    for _ in 0..100 {
        let loss = loss_of(&graph)?;
        adam.step(&graph, loss)?;
    }
    let last = graph.value(loss_of(&graph)?)?.to_vec()[0];
    assert!(last < first * 0.5, "{} -> {}", first, last);

    // row 1 is never looked up and stays put
    let untouched = graph.get(table, &[1i64.into()])?;
    assert_eq!(graph.value(untouched)?.to_vec(), vec![1.0, 2.0]);

    record_graph_stats("embedding", &graph);
    Ok(())
}

#[test]
fn test_write_then_pool() -> Result<()> {
    let graph = GraphBuilder::<f64>::new();
    let x = graph.constant(DenseND::zeros(&[1, 1, 3, 3]));
    graph.set(
        x,
        &[0i64.into(), 0i64.into(), 1i64.into(), 1i64.into()],
        AssignValue::Scalar(7.0),
    )?;
    let pooled = argmax_pool(&graph, x, 3, 1, 1)?;
    assert_eq!(graph.value(pooled)?.to_vec(), vec![7.0; 9]);
    Ok(())
}
