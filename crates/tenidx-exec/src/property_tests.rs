//! Property-based tests for index compilation
//!
//! Slicing is checked against a step-by-step model of NumPy slicing, and
//! writes through unique fancy indices are checked to read back unchanged.

#[cfg(test)]
mod tests {
    use crate::{get, resolve_slice, set, IndexArray, IndexOperand, SliceSpec};
    use proptest::prelude::*;
    use tenidx_ad::GraphBuilder;
    use tenidx_core::DenseND;

    /// Positions visited by `start:stop:step` on `0..n`, one step at a time
    fn numpy_positions(n: usize, spec: &SliceSpec) -> Vec<usize> {
        let n = n as i64;
        let step = spec.step.unwrap_or(1);
        let wrap = |v: i64| if v < 0 { v + n } else { v };
        let mut out = Vec::new();
        if step > 0 {
            let mut i = spec.start.map(wrap).unwrap_or(0).max(0);
            let stop = spec.stop.map(wrap).unwrap_or(n).min(n);
            while i < stop {
                out.push(i as usize);
                i += step;
            }
        } else {
            let mut i = spec.start.map(wrap).unwrap_or(n - 1).min(n - 1);
            let stop = spec.stop.map(wrap).unwrap_or(-1).max(-1);
            while i > stop {
                out.push(i as usize);
                i += step;
            }
        }
        out
    }

    fn slice_strategy() -> impl Strategy<Value = SliceSpec> {
        let start = prop::option::of(-12i64..12);
        let stop = prop::option::of(-12i64..12);
        let step = prop::option::of(prop_oneof![-4i64..=-1, 1i64..=4]);
        (start, stop, step).prop_map(|(start, stop, step)| SliceSpec::new(start, stop, step))
    }

    fn iota(graph: &GraphBuilder<f64>, shape: &[usize]) -> tenidx_ad::Var {
        let n: usize = shape.iter().product();
        graph.constant(DenseND::from_vec((0..n).map(|v| v as f64).collect(), shape).unwrap())
    }

    proptest! {
        #[test]
        fn prop_resolve_slice_matches_numpy(n in 0usize..10, spec in slice_strategy()) {
            let expected = numpy_positions(n, &spec);
            let (start, step, len) = resolve_slice(&spec, n).unwrap();
            let visited: Vec<usize> = (0..len as i64).map(|k| (start + k * step) as usize).collect();
            prop_assert_eq!(visited, expected);
        }

        #[test]
        fn prop_sliced_read_matches_model(
            rows in 1usize..6,
            cols in 1usize..6,
            spec_r in slice_strategy(),
            spec_c in slice_strategy(),
        ) {
            let graph = GraphBuilder::<f64>::new();
            let x = iota(&graph, &[rows, cols]);
            let y = get(&graph, x, &[spec_r.into(), spec_c.into()]).unwrap();

            let pr = numpy_positions(rows, &spec_r);
            let pc = numpy_positions(cols, &spec_c);
            let expected: Vec<f64> = pr
                .iter()
                .flat_map(|&r| pc.iter().map(move |&c| (r * cols + c) as f64))
                .collect();
            let shape = graph.shape(y).unwrap();
            if pr.is_empty() || pc.is_empty() {
                prop_assert_eq!(shape.iter().product::<usize>(), 0);
            } else {
                prop_assert_eq!(shape, vec![pr.len(), pc.len()]);
                prop_assert_eq!(graph.value(y).unwrap().to_vec(), expected);
            }
        }

        #[test]
        fn prop_unique_fancy_write_reads_back(
            (n, picked) in (2usize..12).prop_flat_map(|n| {
                (Just(n), prop::sample::subsequence((0..n as i64).collect::<Vec<_>>(), 1..=n))
            }),
            offset in -5.0f64..5.0,
        ) {
            let graph = GraphBuilder::<f64>::new();
            let x = iota(&graph, &[n]);
            let values: Vec<f64> = (0..picked.len()).map(|k| offset + k as f64).collect();
            let index = IndexOperand::Array(IndexArray::from(picked.clone()));
            set(
                &graph,
                x,
                std::slice::from_ref(&index),
                DenseND::from_vec(values.clone(), &[picked.len()]).unwrap(),
            )
            .unwrap();

            let read = get(&graph, x, &[index]).unwrap();
            prop_assert_eq!(graph.value(read).unwrap().to_vec(), values);

            // positions outside the selection keep their values
            let after = graph.value(x).unwrap().to_vec();
            for (i, v) in after.iter().enumerate() {
                if !picked.contains(&(i as i64)) {
                    prop_assert_eq!(*v, i as f64);
                }
            }
        }
    }
}
