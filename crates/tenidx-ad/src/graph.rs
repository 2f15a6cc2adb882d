//! Tensor-expression graph with reverse-mode gradients.
//!
//! [`GraphBuilder`] records every operation as a node and materializes its
//! value immediately on dense CPU tensors. Callers hold [`Var`] handles: a
//! handle names an identity slot that is bound to one node at a time, and
//! [`GraphBuilder::assign`] rebinds it. This is how in-place updates
//! (indexing writes, optimizer steps) keep the identity of a variable while
//! the graph itself stays append-only.
//!
//! # Memory
//!
//! Nodes are never released: each node owns its dense value, and a rebound
//! handle leaves the previous node in place because recorded gradients may
//! still read it. A training loop therefore grows the graph by one copy of
//! every updated tensor per step. Long runs should build a fresh
//! `GraphBuilder` periodically, carrying parameters over with
//! [`GraphBuilder::value`] and [`GraphBuilder::parameter`];
//! [`GraphBuilder::stats`] reports the current node count.
//!
//! # Features
//!
//! - **Gather / scatter primitives**: `reindex` and `reindex_reduce` over
//!   per-axis [`AxisExpr`] lists, with extras tensors for data-dependent indices
//! - **Broadcast, ternary select, elementwise arithmetic and sum**
//! - **Custom kernels** with user-provided gradients ([`CustomOp`])
//! - **Fusion barriers** recorded as node metadata (`stop_fuse`)
//! - **Named scopes** and persistent variables (`var_scope`, `make_var`,
//!   `parameter`, `find_vars`)
//! - **Reverse-mode gradients** (`grad`) through every recorded operation
//!
//! # Example
//!
//! ```
//! use tenidx_ad::GraphBuilder;
//! use tenidx_core::{AxisExpr, DenseND};
//!
//! let graph = GraphBuilder::<f64>::new();
//! let w = graph
//!     .parameter("net", "w", DenseND::from_vec(vec![1.0, 2.0, 3.0], &[3]).unwrap())
//!     .unwrap();
//!
//! // loss = sum(w[[0, 0, 2]])
//! let idx = graph.index_constant(&[0, 0, 2], &[3]).unwrap();
//! let exprs = [AxisExpr::Extra { slot: 0, coords: vec![0] }];
//! let picked = graph.reindex(w, &[3], &exprs, 0.0, &[idx]).unwrap();
//! let loss = graph.sum(picked).unwrap();
//!
//! let grads = graph.grad(loss, &[w]).unwrap();
//! assert_eq!(graph.value(grads[0]).unwrap().to_vec(), vec![2.0, 0.0, 1.0]);
//! ```

use crate::config::GraphConfig;
use crate::custom::CustomOp;
use crate::scope::{qualify, Scope, ScopeTable};
use parking_lot::Mutex;
use scirs2_core::numeric::{Float, NumCast};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tenidx_core::dense::reindex::describe;
use tenidx_core::types::numel;
use tenidx_core::{AxisExpr, DType, DenseND, ReduceOp, Result, TenidxError};
use tracing::{debug, trace};

/// Element type of a graph
pub trait Element: Float + fmt::Debug + Send + Sync + 'static {}

impl<T> Element for T where T: Float + fmt::Debug + Send + Sync + 'static {}

/// Unique identifier for a node in the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node({})", self.0)
    }
}

/// Unique identifier for a variable slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(pub usize);

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Var({})", self.0)
    }
}

/// Handle to a variable of a [`GraphBuilder`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Var {
    id: VarId,
}

impl Var {
    fn new(id: VarId) -> Self {
        Self { id }
    }

    /// Get the slot ID
    pub fn id(&self) -> VarId {
        self.id
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.id, f)
    }
}

/// Operation that produced a node
#[derive(Debug, Clone)]
pub enum Operation<T: Element> {
    /// Leaf: constants, parameters, persistent variables, gradients
    Input,
    /// Gather: `z[i] = x[exprs(i)]` or `overflow`
    Reindex {
        input: NodeId,
        exprs: Vec<AxisExpr>,
        overflow: T,
        extras: Vec<NodeId>,
    },
    /// Scatter: `z[exprs(i)] op= x[i]`
    ReindexReduce {
        input: NodeId,
        op: ReduceOp,
        exprs: Vec<AxisExpr>,
        extras: Vec<NodeId>,
    },
    /// Broadcast to a larger shape
    Broadcast {
        input: NodeId,
        original_shape: Vec<usize>,
    },
    /// Coordinates of non-zero mask entries along one axis
    Nonzero { input: NodeId, axis: usize },
    /// `cond ? on_true : on_false`
    Ternary {
        cond: NodeId,
        on_true: NodeId,
        on_false: NodeId,
    },
    Add { lhs: NodeId, rhs: NodeId },
    Sub { lhs: NodeId, rhs: NodeId },
    Mul { lhs: NodeId, rhs: NodeId },
    Div { lhs: NodeId, rhs: NodeId },
    Neg { input: NodeId },
    Sqrt { input: NodeId },
    Square { input: NodeId },
    AddScalar { input: NodeId, value: T },
    MulScalar { input: NodeId, value: T },
    /// Sum of all elements, shape `[1]`
    Sum { input: NodeId },
    /// User-defined kernel
    Custom {
        kernel: Arc<dyn CustomOp<T>>,
        inputs: Vec<NodeId>,
    },
}

impl<T: Element> Operation<T> {
    /// Nodes this operation reads
    pub fn parents(&self) -> Vec<NodeId> {
        match self {
            Operation::Input => vec![],
            Operation::Reindex { input, extras, .. }
            | Operation::ReindexReduce { input, extras, .. } => {
                let mut parents = vec![*input];
                parents.extend_from_slice(extras);
                parents
            }
            Operation::Broadcast { input, .. }
            | Operation::Nonzero { input, .. }
            | Operation::Neg { input }
            | Operation::Sqrt { input }
            | Operation::Square { input }
            | Operation::AddScalar { input, .. }
            | Operation::MulScalar { input, .. }
            | Operation::Sum { input } => vec![*input],
            Operation::Ternary {
                cond,
                on_true,
                on_false,
            } => vec![*cond, *on_true, *on_false],
            Operation::Add { lhs, rhs }
            | Operation::Sub { lhs, rhs }
            | Operation::Mul { lhs, rhs }
            | Operation::Div { lhs, rhs } => vec![*lhs, *rhs],
            Operation::Custom { inputs, .. } => inputs.clone(),
        }
    }

    /// Short label used in statistics
    pub fn label(&self) -> String {
        let name = match self {
            Operation::Input => "Input",
            Operation::Reindex { .. } => "Reindex",
            Operation::ReindexReduce { op, .. } => return format!("ReindexReduce({})", op),
            Operation::Broadcast { .. } => "Broadcast",
            Operation::Nonzero { .. } => "Nonzero",
            Operation::Ternary { .. } => "Ternary",
            Operation::Add { .. } => "Add",
            Operation::Sub { .. } => "Sub",
            Operation::Mul { .. } => "Mul",
            Operation::Div { .. } => "Div",
            Operation::Neg { .. } => "Neg",
            Operation::Sqrt { .. } => "Sqrt",
            Operation::Square { .. } => "Square",
            Operation::AddScalar { .. } => "AddScalar",
            Operation::MulScalar { .. } => "MulScalar",
            Operation::Sum { .. } => "Sum",
            Operation::Custom { kernel, .. } => return format!("Custom({})", kernel.name()),
        };
        name.to_string()
    }
}

/// Node in the graph
#[derive(Debug, Clone)]
struct GraphNode<T: Element> {
    operation: Operation<T>,
    value: DenseND<T>,
    dtype: DType,
    /// Fusion barrier
    barrier: bool,
}

#[derive(Debug)]
struct GraphState<T: Element> {
    nodes: Vec<GraphNode<T>>,
    /// VarId -> currently bound node
    bindings: Vec<NodeId>,
    scopes: ScopeTable,
}

impl<T: Element> GraphState<T> {
    fn resolve(&self, var: Var) -> Result<NodeId> {
        self.bindings
            .get(var.id.0)
            .copied()
            .ok_or(TenidxError::UnknownVar { id: var.id.0 })
    }

    fn node(&self, id: NodeId) -> &GraphNode<T> {
        &self.nodes[id.0]
    }

    fn value(&self, id: NodeId) -> &DenseND<T> {
        &self.nodes[id.0].value
    }

    fn push(&mut self, operation: Operation<T>, value: DenseND<T>, dtype: DType) -> Var {
        let node = NodeId(self.nodes.len());
        trace!(
            node = %node,
            op = %operation.label(),
            shape = ?value.shape(),
            dtype = %dtype,
            "recorded node"
        );
        self.nodes.push(GraphNode {
            operation,
            value,
            dtype,
            barrier: false,
        });
        let var = Var::new(VarId(self.bindings.len()));
        self.bindings.push(node);
        var
    }
}

/// Promote two element kinds for an arithmetic result
fn join_dtype(a: DType, b: DType) -> DType {
    match (a, b) {
        (DType::Float, _) | (_, DType::Float) => DType::Float,
        (DType::Int, _) | (_, DType::Int) => DType::Int,
        _ => DType::Bool,
    }
}

/// Convert an integer index into the graph element type
pub fn cast_index<T: Float>(value: i64) -> Result<T> {
    <T as NumCast>::from(value).ok_or_else(|| {
        TenidxError::invalid(
            "cast",
            format!("index {} is not representable in the element type", value),
        )
    })
}

/// Tensor-expression graph builder.
///
/// All methods take `&self`; the node tables live behind a mutex.
pub struct GraphBuilder<T: Element> {
    state: Mutex<GraphState<T>>,
    config: GraphConfig,
}

impl<T: Element> Default for GraphBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Element> fmt::Debug for GraphBuilder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("GraphBuilder")
            .field("nodes", &state.nodes.len())
            .field("vars", &state.bindings.len())
            .field("config", &self.config)
            .finish()
    }
}

impl<T: Element> GraphBuilder<T> {
    /// Create an empty graph with the default configuration
    pub fn new() -> Self {
        Self::with_config(GraphConfig::default())
    }

    /// Create an empty graph
    pub fn with_config(config: GraphConfig) -> Self {
        Self {
            state: Mutex::new(GraphState {
                nodes: Vec::new(),
                bindings: Vec::new(),
                scopes: ScopeTable::default(),
            }),
            config,
        }
    }

    /// Graph configuration
    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Number of recorded nodes
    pub fn num_nodes(&self) -> usize {
        self.state.lock().nodes.len()
    }

    // ===== Leaves =====

    /// Float constant
    pub fn constant(&self, value: DenseND<T>) -> Var {
        self.state.lock().push(Operation::Input, value, DType::Float)
    }

    /// Constant with an explicit element kind.
    ///
    /// `Int` values are truncated toward zero, `Bool` values become 0/1.
    pub fn constant_of(&self, value: DenseND<T>, dtype: DType) -> Var {
        let value = match dtype {
            DType::Float => value,
            DType::Int => value.map(|v| v.trunc()),
            DType::Bool => value.map(|v| if v.is_zero() { T::zero() } else { T::one() }),
        };
        self.state.lock().push(Operation::Input, value, dtype)
    }

    /// `Int` constant from integer values
    pub fn index_constant(&self, values: &[i64], shape: &[usize]) -> Result<Var> {
        let data = values
            .iter()
            .map(|&v| cast_index::<T>(v))
            .collect::<Result<Vec<T>>>()?;
        let value = DenseND::from_vec(data, shape)?;
        Ok(self.state.lock().push(Operation::Input, value, DType::Int))
    }

    /// Constant of `shape` filled with `value`
    pub fn broadcast_scalar(&self, value: T, shape: &[usize]) -> Var {
        self.constant(DenseND::from_elem(shape, value))
    }

    // ===== Inspection =====

    /// Materialized value of a variable
    pub fn value(&self, var: Var) -> Result<DenseND<T>> {
        let state = self.state.lock();
        let node = state.resolve(var)?;
        Ok(state.value(node).clone())
    }

    /// Shape of a variable
    pub fn shape(&self, var: Var) -> Result<Vec<usize>> {
        let state = self.state.lock();
        let node = state.resolve(var)?;
        Ok(state.value(node).shape_vec())
    }

    /// Element kind of a variable
    pub fn dtype(&self, var: Var) -> Result<DType> {
        let state = self.state.lock();
        let node = state.resolve(var)?;
        Ok(state.node(node).dtype)
    }

    /// Node a variable is currently bound to
    pub fn node_of(&self, var: Var) -> Result<NodeId> {
        self.state.lock().resolve(var)
    }

    /// Whether the node bound to `var` is a fusion barrier
    pub fn is_barrier(&self, var: Var) -> Result<bool> {
        let state = self.state.lock();
        let node = state.resolve(var)?;
        Ok(state.node(node).barrier)
    }

    /// Operation label of the node bound to `var`
    pub fn op_label(&self, var: Var) -> Result<String> {
        let state = self.state.lock();
        let node = state.resolve(var)?;
        Ok(state.node(node).operation.label())
    }

    // ===== Indexing primitives =====

    /// Gather: `z[i] = x[exprs(i)]`, or `overflow` outside `x`.
    ///
    /// `extras` supplies the tensors referenced by [`AxisExpr::Extra`] slots.
    pub fn reindex(
        &self,
        x: Var,
        shape: &[usize],
        exprs: &[AxisExpr],
        overflow: T,
        extras: &[Var],
    ) -> Result<Var> {
        let mut state = self.state.lock();
        let input = state.resolve(x)?;
        let extra_nodes = extras
            .iter()
            .map(|&e| state.resolve(e))
            .collect::<Result<Vec<NodeId>>>()?;
        trace!(input = %input, call = %describe(shape, exprs, extras.len()), "reindex");
        let tables: Vec<&DenseND<T>> = extra_nodes.iter().map(|&e| state.value(e)).collect();
        let value = state.value(input).reindex(shape, exprs, overflow, &tables)?;
        let dtype = state.node(input).dtype;
        Ok(state.push(
            Operation::Reindex {
                input,
                exprs: exprs.to_vec(),
                overflow,
                extras: extra_nodes,
            },
            value,
            dtype,
        ))
    }

    /// Scatter with reduction into a fresh tensor of `shape`
    pub fn reindex_reduce(
        &self,
        op: ReduceOp,
        x: Var,
        shape: &[usize],
        exprs: &[AxisExpr],
        extras: &[Var],
    ) -> Result<Var> {
        let mut state = self.state.lock();
        let input = state.resolve(x)?;
        let extra_nodes = extras
            .iter()
            .map(|&e| state.resolve(e))
            .collect::<Result<Vec<NodeId>>>()?;
        trace!(input = %input, op = %op, call = %describe(shape, exprs, extras.len()), "reindex_reduce");
        let tables: Vec<&DenseND<T>> = extra_nodes.iter().map(|&e| state.value(e)).collect();
        let value = state.value(input).reindex_reduce(op, shape, exprs, &tables)?;
        let dtype = state.node(input).dtype;
        Ok(state.push(
            Operation::ReindexReduce {
                input,
                op,
                exprs: exprs.to_vec(),
                extras: extra_nodes,
            },
            value,
            dtype,
        ))
    }

    /// Broadcast `x` to `shape` (NumPy rules)
    pub fn broadcast(&self, x: Var, shape: &[usize]) -> Result<Var> {
        let mut state = self.state.lock();
        let input = state.resolve(x)?;
        let value = state.value(input).broadcast_to(shape)?;
        let original_shape = state.value(input).shape_vec();
        let dtype = state.node(input).dtype;
        Ok(state.push(
            Operation::Broadcast {
                input,
                original_shape,
            },
            value,
            dtype,
        ))
    }

    /// Coordinates of the non-zero entries of `mask`, one `Int` vector per axis
    pub fn where_nonzero(&self, mask: Var) -> Result<Vec<Var>> {
        let mut state = self.state.lock();
        let input = state.resolve(mask)?;
        let coords = state.value(input).nonzero();
        let mut vars = Vec::with_capacity(coords.len());
        for (axis, column) in coords.into_iter().enumerate() {
            let len = column.len();
            let data = column
                .into_iter()
                .map(cast_index::<T>)
                .collect::<Result<Vec<T>>>()?;
            let value = DenseND::from_vec(data, &[len])?;
            vars.push(state.push(Operation::Nonzero { input, axis }, value, DType::Int));
        }
        Ok(vars)
    }

    /// Element-wise select; a non-zero `cond` picks `on_true`
    pub fn ternary(&self, cond: Var, on_true: Var, on_false: Var) -> Result<Var> {
        let mut state = self.state.lock();
        let c = state.resolve(cond)?;
        let t = state.resolve(on_true)?;
        let f = state.resolve(on_false)?;
        let value = DenseND::select(state.value(c), state.value(t), state.value(f))?;
        let dtype = join_dtype(state.node(t).dtype, state.node(f).dtype);
        Ok(state.push(
            Operation::Ternary {
                cond: c,
                on_true: t,
                on_false: f,
            },
            value,
            dtype,
        ))
    }

    // ===== Elementwise =====

    fn binary<F>(
        &self,
        lhs: Var,
        rhs: Var,
        make: impl FnOnce(NodeId, NodeId) -> Operation<T>,
        float_result: bool,
        f: F,
    ) -> Result<Var>
    where
        F: Fn(T, T) -> T,
    {
        let mut state = self.state.lock();
        let l = state.resolve(lhs)?;
        let r = state.resolve(rhs)?;
        let value = state.value(l).zip_with(state.value(r), f)?;
        let dtype = if float_result {
            DType::Float
        } else {
            join_dtype(state.node(l).dtype, state.node(r).dtype)
        };
        Ok(state.push(make(l, r), value, dtype))
    }

    fn unary<F>(
        &self,
        x: Var,
        make: impl FnOnce(NodeId) -> Operation<T>,
        float_result: bool,
        f: F,
    ) -> Result<Var>
    where
        F: Fn(T) -> T,
    {
        let mut state = self.state.lock();
        let input = state.resolve(x)?;
        let value = state.value(input).map(f);
        let dtype = if float_result {
            DType::Float
        } else {
            state.node(input).dtype
        };
        Ok(state.push(make(input), value, dtype))
    }

    /// Addition: z = x + y (same shapes)
    pub fn add(&self, lhs: Var, rhs: Var) -> Result<Var> {
        self.binary(
            lhs,
            rhs,
            |lhs, rhs| Operation::Add { lhs, rhs },
            false,
            |a, b| a + b,
        )
    }

    /// Subtraction: z = x - y (same shapes)
    pub fn sub(&self, lhs: Var, rhs: Var) -> Result<Var> {
        self.binary(
            lhs,
            rhs,
            |lhs, rhs| Operation::Sub { lhs, rhs },
            false,
            |a, b| a - b,
        )
    }

    /// Element-wise multiplication: z = x * y (same shapes)
    pub fn mul(&self, lhs: Var, rhs: Var) -> Result<Var> {
        self.binary(
            lhs,
            rhs,
            |lhs, rhs| Operation::Mul { lhs, rhs },
            false,
            |a, b| a * b,
        )
    }

    /// Element-wise division: z = x / y (same shapes)
    pub fn div(&self, lhs: Var, rhs: Var) -> Result<Var> {
        self.binary(
            lhs,
            rhs,
            |lhs, rhs| Operation::Div { lhs, rhs },
            true,
            |a, b| a / b,
        )
    }

    /// Negation: z = -x
    pub fn neg(&self, x: Var) -> Result<Var> {
        self.unary(x, |input| Operation::Neg { input }, false, |v| -v)
    }

    /// Square root: z = sqrt(x)
    pub fn sqrt(&self, x: Var) -> Result<Var> {
        self.unary(x, |input| Operation::Sqrt { input }, true, |v| v.sqrt())
    }

    /// Square: z = x * x
    pub fn square(&self, x: Var) -> Result<Var> {
        self.unary(x, |input| Operation::Square { input }, false, |v| v * v)
    }

    /// z = x + value
    pub fn add_scalar(&self, x: Var, value: T) -> Result<Var> {
        self.unary(
            x,
            |input| Operation::AddScalar { input, value },
            true,
            move |v| v + value,
        )
    }

    /// z = x * value
    pub fn mul_scalar(&self, x: Var, value: T) -> Result<Var> {
        self.unary(
            x,
            |input| Operation::MulScalar { input, value },
            true,
            move |v| v * value,
        )
    }

    /// Sum of all elements, shape `[1]`
    pub fn sum(&self, x: Var) -> Result<Var> {
        let mut state = self.state.lock();
        let input = state.resolve(x)?;
        let value = DenseND::scalar(state.value(input).sum());
        let dtype = state.node(input).dtype;
        Ok(state.push(Operation::Sum { input }, value, dtype))
    }

    // ===== Custom kernels =====

    /// Record a user-defined kernel applied to `inputs`
    pub fn custom(&self, kernel: Arc<dyn CustomOp<T>>, inputs: &[Var]) -> Result<Var> {
        let mut state = self.state.lock();
        let nodes = inputs
            .iter()
            .map(|&v| state.resolve(v))
            .collect::<Result<Vec<NodeId>>>()?;
        let values: Vec<&DenseND<T>> = nodes.iter().map(|&n| state.value(n)).collect();
        let value = kernel.forward(&values)?;
        debug!(kernel = kernel.name(), inputs = nodes.len(), shape = ?value.shape(), "custom op");
        Ok(state.push(
            Operation::Custom {
                kernel,
                inputs: nodes,
            },
            value,
            DType::Float,
        ))
    }

    // ===== Identity and fusion =====

    /// Rebind `x` to the node of `value`; `x` keeps its identity.
    ///
    /// # Errors
    ///
    /// `ShapeMismatch` if the shapes differ.
    pub fn assign(&self, x: Var, value: Var) -> Result<()> {
        let mut state = self.state.lock();
        let target = state.resolve(x)?;
        let source = state.resolve(value)?;
        let target_shape = state.value(target).shape_vec();
        let source_shape = state.value(source).shape_vec();
        if target_shape != source_shape {
            return Err(TenidxError::shape_mismatch(
                "assign",
                vec![target_shape, source_shape],
            ));
        }
        trace!(var = %x, from = %target, to = %source, "assign");
        state.bindings[x.id.0] = source;
        Ok(())
    }

    /// Mark the node bound to `x` as a fusion barrier
    pub fn stop_fuse(&self, x: Var) -> Result<()> {
        let mut state = self.state.lock();
        let node = state.resolve(x)?;
        state.nodes[node.0].barrier = true;
        Ok(())
    }

    // ===== Scopes and persistent variables =====

    /// Claim a named scope.
    ///
    /// # Errors
    ///
    /// `ScopeCollision` if `unique` and the name was claimed before.
    pub fn var_scope(&self, name: &str, unique: bool) -> Result<Scope> {
        let scope = self.state.lock().scopes.claim(name, unique)?;
        debug!(scope = name, unique, "claimed scope");
        Ok(scope)
    }

    /// Zero-initialized persistent variable `"{scope}.{name}"`.
    ///
    /// A second call with the same name returns the existing variable.
    pub fn make_var(&self, scope: &Scope, name: &str, shape: &[usize]) -> Result<Var> {
        let full_name = scope.qualify(name);
        let mut state = self.state.lock();
        if let Some(id) = state.scopes.lookup(&full_name) {
            let var = Var::new(id);
            let existing = state.value(state.resolve(var)?).shape_vec();
            if existing != shape {
                return Err(TenidxError::shape_mismatch(
                    format!("make_var {}", full_name),
                    vec![existing, shape.to_vec()],
                ));
            }
            return Ok(var);
        }
        let var = state.push(Operation::Input, DenseND::zeros(shape), DType::Float);
        state.scopes.register(full_name, var.id);
        Ok(var)
    }

    /// Register a trainable parameter `"{model}.{name}"`
    pub fn parameter(&self, model: &str, name: &str, value: DenseND<T>) -> Result<Var> {
        let full_name = qualify(model, name);
        let mut state = self.state.lock();
        if state.scopes.lookup(&full_name).is_some() {
            return Err(TenidxError::invalid(
                "parameter",
                format!("{} is already registered", full_name),
            ));
        }
        let var = state.push(Operation::Input, value, DType::Float);
        state.scopes.register(full_name, var.id);
        Ok(var)
    }

    /// Parameters of `model` with their full names, in registration order
    pub fn find_named_vars(&self, model: &str) -> Vec<(String, Var)> {
        self.state
            .lock()
            .scopes
            .find(model)
            .into_iter()
            .map(|(name, id)| (name, Var::new(id)))
            .collect()
    }

    /// Parameters of `model`, in registration order
    pub fn find_vars(&self, model: &str) -> Vec<Var> {
        self.find_named_vars(model)
            .into_iter()
            .map(|(_, var)| var)
            .collect()
    }

    // ===== Backward Pass =====

    /// Gradients of a single-element `loss` with respect to `params`.
    ///
    /// Returns one constant variable per parameter; parameters the loss does
    /// not depend on get zeros.
    pub fn grad(&self, loss: Var, params: &[Var]) -> Result<Vec<Var>> {
        let mut state = self.state.lock();
        let loss_node = state.resolve(loss)?;
        let loss_shape = state.value(loss_node).shape_vec();
        if numel(&loss_shape) != 1 {
            return Err(TenidxError::NonScalarLoss { shape: loss_shape });
        }
        let param_nodes = params
            .iter()
            .map(|&p| state.resolve(p))
            .collect::<Result<Vec<NodeId>>>()?;
        debug!(loss = %loss_node, params = param_nodes.len(), "computing gradients");

        // node ids are a topological order: parents are always older
        let live = loss_node.0 + 1;
        let mut depends = vec![false; live];
        for p in &param_nodes {
            if p.0 < live {
                depends[p.0] = true;
            }
        }
        for id in 0..live {
            if depends[id] {
                continue;
            }
            let reaches = state.nodes[id]
                .operation
                .parents()
                .iter()
                .any(|p| depends[p.0]);
            depends[id] = reaches;
        }

        let mut grads: HashMap<NodeId, DenseND<T>> = HashMap::new();
        grads.insert(loss_node, DenseND::from_elem(&loss_shape, T::one()));
        for id in (0..live).rev() {
            if !depends[id] {
                continue;
            }
            let Some(grad_output) = grads.get(&NodeId(id)).cloned() else {
                continue;
            };
            for (parent, parent_grad) in backward_locked(&state.nodes, NodeId(id), &grad_output)? {
                if !depends[parent.0] {
                    continue;
                }
                match grads.entry(parent) {
                    Entry::Occupied(mut slot) => {
                        let sum = slot.get().add(&parent_grad)?;
                        *slot.get_mut() = sum;
                    }
                    Entry::Vacant(slot) => {
                        slot.insert(parent_grad);
                    }
                }
            }
        }

        let values: Vec<DenseND<T>> = param_nodes
            .iter()
            .map(|p| {
                grads
                    .get(p)
                    .cloned()
                    .unwrap_or_else(|| DenseND::zeros(state.value(*p).shape()))
            })
            .collect();
        Ok(values
            .into_iter()
            .map(|g| state.push(Operation::Input, g, DType::Float))
            .collect())
    }

    /// Get statistics about the graph
    pub fn stats(&self) -> GraphStats {
        let state = self.state.lock();
        let mut ops_count: HashMap<String, usize> = HashMap::new();
        for node in &state.nodes {
            *ops_count.entry(node.operation.label()).or_insert(0) += 1;
        }
        GraphStats {
            num_nodes: state.nodes.len(),
            num_vars: state.bindings.len(),
            num_barriers: state.nodes.iter().filter(|n| n.barrier).count(),
            num_named: state.scopes.num_named(),
            ops_count,
        }
    }
}

fn value_of<T: Element>(nodes: &[GraphNode<T>], id: NodeId) -> &DenseND<T> {
    &nodes[id.0].value
}

fn tables_of<'a, T: Element>(nodes: &'a [GraphNode<T>], ids: &[NodeId]) -> Vec<&'a DenseND<T>> {
    ids.iter().map(|&id| value_of(nodes, id)).collect()
}

/// Gradients for the parents of `id` (nodes are already locked)
fn backward_locked<T: Element>(
    nodes: &[GraphNode<T>],
    id: NodeId,
    grad_output: &DenseND<T>,
) -> Result<Vec<(NodeId, DenseND<T>)>> {
    match &nodes[id.0].operation {
        Operation::Input | Operation::Nonzero { .. } => Ok(vec![]),

        Operation::Reindex {
            input,
            exprs,
            extras,
            ..
        } => {
            // adjoint of a gather is a scatter-add
            let grad = grad_output.reindex_reduce(
                ReduceOp::Add,
                value_of(nodes, *input).shape(),
                exprs,
                &tables_of(nodes, extras),
            )?;
            Ok(vec![(*input, grad)])
        }

        Operation::ReindexReduce {
            input,
            op,
            exprs,
            extras,
        } => {
            let shape = value_of(nodes, *input).shape();
            let extras = tables_of(nodes, extras);
            let routed = grad_output.reindex(shape, exprs, T::zero(), &extras)?;
            let grad = match op {
                ReduceOp::Add => routed,
                ReduceOp::Max | ReduceOp::Min => {
                    // every contribution equal to the reduced value receives the gradient
                    let reduced = nodes[id.0]
                        .value
                        .reindex(shape, exprs, T::nan(), &extras)?;
                    let hit = value_of(nodes, *input).zip_with(&reduced, |a, b| {
                        if a == b {
                            T::one()
                        } else {
                            T::zero()
                        }
                    })?;
                    hit.mul(&routed)?
                }
            };
            Ok(vec![(*input, grad)])
        }

        Operation::Broadcast {
            input,
            original_shape,
        } => Ok(vec![(*input, grad_output.sum_to_shape(original_shape)?)]),

        Operation::Ternary {
            cond,
            on_true,
            on_false,
        } => {
            let zeros = DenseND::zeros(grad_output.shape());
            let c = value_of(nodes, *cond);
            Ok(vec![
                (*on_true, DenseND::select(c, grad_output, &zeros)?),
                (*on_false, DenseND::select(c, &zeros, grad_output)?),
            ])
        }

        Operation::Add { lhs, rhs } => Ok(vec![
            (*lhs, grad_output.clone()),
            (*rhs, grad_output.clone()),
        ]),

        Operation::Sub { lhs, rhs } => Ok(vec![
            (*lhs, grad_output.clone()),
            (*rhs, grad_output.map(|g| -g)),
        ]),

        Operation::Mul { lhs, rhs } => Ok(vec![
            (*lhs, grad_output.mul(value_of(nodes, *rhs))?),
            (*rhs, grad_output.mul(value_of(nodes, *lhs))?),
        ]),

        Operation::Div { lhs, rhs } => {
            // d/dx (x / y) = 1/y, d/dy (x / y) = -x/y^2
            let (x, y) = (value_of(nodes, *lhs), value_of(nodes, *rhs));
            let grad_rhs = grad_output
                .mul(x)?
                .zip_with(y, |gx, yv| -gx / (yv * yv))?;
            Ok(vec![(*lhs, grad_output.div(y)?), (*rhs, grad_rhs)])
        }

        Operation::Neg { input } => Ok(vec![(*input, grad_output.map(|g| -g))]),

        Operation::Sqrt { input } => {
            let out = &nodes[id.0].value;
            Ok(vec![(*input, grad_output.zip_with(out, |g, y| g / (y + y))?)])
        }

        Operation::Square { input } => {
            let x = value_of(nodes, *input);
            Ok(vec![(*input, grad_output.zip_with(x, |g, v| g * (v + v))?)])
        }

        Operation::AddScalar { input, .. } => Ok(vec![(*input, grad_output.clone())]),

        Operation::MulScalar { input, value: factor } => {
            Ok(vec![(*input, grad_output.scale(*factor))])
        }

        Operation::Sum { input } => {
            let g = grad_output.sum();
            Ok(vec![(*input, DenseND::from_elem(value_of(nodes, *input).shape(), g))])
        }

        Operation::Custom { kernel, inputs } => {
            let input_values = tables_of(nodes, inputs);
            let grads = kernel.backward(&input_values, &nodes[id.0].value, grad_output)?;
            if grads.len() != inputs.len() {
                return Err(TenidxError::invalid(
                    kernel.name(),
                    format!(
                        "backward returned {} gradients for {} inputs",
                        grads.len(),
                        inputs.len()
                    ),
                ));
            }
            Ok(inputs
                .iter()
                .copied()
                .zip(grads)
                .filter_map(|(n, g)| g.map(|g| (n, g)))
                .collect())
        }
    }
}

/// Statistics about the graph
#[derive(Debug, Clone)]
pub struct GraphStats {
    /// Total number of nodes
    pub num_nodes: usize,
    /// Total number of variable slots
    pub num_vars: usize,
    /// Nodes marked as fusion barriers
    pub num_barriers: usize,
    /// Variables registered under a scope or model name
    pub num_named: usize,
    /// Count of each operation type
    pub ops_count: HashMap<String, usize>,
}

impl fmt::Display for GraphStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Graph Statistics:")?;
        writeln!(f, "  Nodes: {}", self.num_nodes)?;
        writeln!(f, "  Vars: {}", self.num_vars)?;
        writeln!(f, "  Barriers: {}", self.num_barriers)?;
        writeln!(f, "  Named: {}", self.num_named)?;
        writeln!(f, "  Operations:")?;
        let mut ops: Vec<_> = self.ops_count.iter().collect();
        ops.sort();
        for (op, count) in ops {
            writeln!(f, "    {}: {}", op, count)?;
        }
        Ok(())
    }
}
