//! 2-D max pooling with argmax routing of gradients
//!
//! Input layout is `(N, C, H, W)`. For output cell `(oy, ox)` the window is
//! centered at
//!
//! ```text
//! cy = oy * stride + size / 2 - padding
//! cx = ox * stride + size / 2 - padding
//! ```
//!
//! and spans `cy - size/2 ..= cy + size/2` (likewise for `x`), clipped to the
//! input. With an even `size` the window therefore covers `size + 1` rows.
//! The backward pass sends each upstream gradient to the first position (in
//! row-major scan order) holding the forward maximum.

use std::ops::Range;
use std::sync::Arc;
use tenidx_ad::{CustomOp, Element, GraphBuilder, Var};
use tenidx_core::types::numel;
use tenidx_core::{DenseND, Result, TenidxError};
use tracing::{instrument, trace};

/// Max-pool kernel with argmax gradient routing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ArgmaxPool2d {
    pub size: usize,
    pub stride: usize,
    pub padding: usize,
}

/// Sizes of one pooling call
#[derive(Debug, Clone, Copy)]
struct Geometry {
    planes: usize,
    h: usize,
    w: usize,
    out_h: usize,
    out_w: usize,
}

impl ArgmaxPool2d {
    pub fn new(size: usize, stride: usize, padding: usize) -> Self {
        Self {
            size,
            stride,
            padding,
        }
    }

    /// Output shape for an input of `shape`.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for a zero size or stride, an input that is not
    /// rank 4, or a window larger than the padded input.
    pub fn output_shape(&self, shape: &[usize]) -> Result<Vec<usize>> {
        let g = self.geometry(shape)?;
        Ok(vec![shape[0], shape[1], g.out_h, g.out_w])
    }

    fn geometry(&self, shape: &[usize]) -> Result<Geometry> {
        if self.size == 0 || self.stride == 0 {
            return Err(TenidxError::invalid(
                "argmax_pool",
                "kernel size and stride must be positive",
            ));
        }
        if shape.len() != 4 {
            return Err(TenidxError::invalid(
                "argmax_pool",
                format!("expected a rank 4 (N, C, H, W) input, got shape {:?}", shape),
            ));
        }
        let (h, w) = (shape[2], shape[3]);
        let (padded_h, padded_w) = (h + 2 * self.padding, w + 2 * self.padding);
        if self.size > padded_h || self.size > padded_w {
            return Err(TenidxError::invalid(
                "argmax_pool",
                format!(
                    "kernel size {} larger than padded input ({}, {})",
                    self.size, padded_h, padded_w
                ),
            ));
        }
        Ok(Geometry {
            planes: shape[0] * shape[1],
            h,
            w,
            out_h: (padded_h - self.size) / self.stride + 1,
            out_w: (padded_w - self.size) / self.stride + 1,
        })
    }

    fn center(&self, out: usize) -> i64 {
        (out * self.stride + self.size / 2) as i64 - self.padding as i64
    }

    /// Window coordinates around `center`, clipped to `0..extent`
    fn span(&self, center: i64, extent: usize) -> Range<usize> {
        let half = (self.size / 2) as i64;
        let lo = (center - half).max(0);
        let hi = (center + half + 1).min(extent as i64);
        if lo >= hi {
            0..0
        } else {
            lo as usize..hi as usize
        }
    }

    /// Visit every output cell as `(cell, plane offset, rows, cols, center)`
    fn for_each_cell<F>(&self, g: &Geometry, mut visit: F)
    where
        F: FnMut(usize, usize, Range<usize>, Range<usize>, Option<usize>),
    {
        let mut cell = 0;
        for plane in 0..g.planes {
            let base = plane * g.h * g.w;
            for oy in 0..g.out_h {
                let cy = self.center(oy);
                for ox in 0..g.out_w {
                    let cx = self.center(ox);
                    let inside = cy >= 0 && cx >= 0 && (cy as usize) < g.h && (cx as usize) < g.w;
                    let center = inside.then(|| base + cy as usize * g.w + cx as usize);
                    visit(cell, base, self.span(cy, g.h), self.span(cx, g.w), center);
                    cell += 1;
                }
            }
        }
    }

    fn single_input<'a, T>(&self, inputs: &[&'a DenseND<T>]) -> Result<&'a DenseND<T>> {
        match inputs {
            [x] => Ok(*x),
            _ => Err(TenidxError::invalid(
                "argmax_pool",
                format!("expected 1 input, got {}", inputs.len()),
            )),
        }
    }
}

impl<T: Element> CustomOp<T> for ArgmaxPool2d {
    fn name(&self) -> &str {
        "argmax_pool"
    }

    fn forward(&self, inputs: &[&DenseND<T>]) -> Result<DenseND<T>> {
        let x = self.single_input(inputs)?;
        let g = self.geometry(x.shape())?;
        let data = x.to_vec();
        let mut out = Vec::with_capacity(g.planes * g.out_h * g.out_w);

        self.for_each_cell(&g, |_, base, rows, cols, center| {
            let mut best = center.map_or(T::neg_infinity(), |c| data[c]);
            for r in rows {
                for c in cols.clone() {
                    let v = data[base + r * g.w + c];
                    if v > best {
                        best = v;
                    }
                }
            }
            out.push(best);
        });

        DenseND::from_vec(out, &self.output_shape(x.shape())?)
    }

    fn backward(
        &self,
        inputs: &[&DenseND<T>],
        output: &DenseND<T>,
        grad_output: &DenseND<T>,
    ) -> Result<Vec<Option<DenseND<T>>>> {
        let x = self.single_input(inputs)?;
        let g = self.geometry(x.shape())?;
        let data = x.to_vec();
        let maxima = output.to_vec();
        let upstream = grad_output.to_vec();
        let mut grad = vec![T::zero(); numel(x.shape())];

        self.for_each_cell(&g, |cell, base, rows, cols, _| {
            'scan: for r in rows {
                for c in cols.clone() {
                    let pos = base + r * g.w + c;
                    if data[pos] == maxima[cell] {
                        grad[pos] = grad[pos] + upstream[cell];
                        break 'scan;
                    }
                }
            }
        });

        Ok(vec![Some(DenseND::from_vec(grad, x.shape())?)])
    }
}

/// Record argmax max-pooling of `x` (`N, C, H, W`).
///
/// # Examples
///
/// ```
/// use tenidx_ad::GraphBuilder;
/// use tenidx_core::DenseND;
/// use tenidx_exec::argmax_pool;
///
/// let graph = GraphBuilder::<f64>::new();
/// let x = graph.constant(DenseND::from_vec((0..16).map(f64::from).collect(), &[1, 1, 4, 4]).unwrap());
/// let y = argmax_pool(&graph, x, 2, 2, 0).unwrap();
/// assert_eq!(graph.value(y).unwrap().to_vec(), vec![10.0, 11.0, 14.0, 15.0]);
/// ```
#[instrument(skip(graph), level = "debug")]
pub fn argmax_pool<T: Element>(
    graph: &GraphBuilder<T>,
    x: Var,
    size: usize,
    stride: usize,
    padding: usize,
) -> Result<Var> {
    let kernel = ArgmaxPool2d::new(size, stride, padding);
    let out = graph.custom(Arc::new(kernel), &[x])?;
    trace!(result = %out, "argmax pool");
    Ok(out)
}
