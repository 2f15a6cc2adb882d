//! Adam optimizer recorded as graph operations.
//!
//! A step reads the gradients of every parameter registered under a model
//! name, updates two persistent moment variables per parameter and assigns the
//! new parameter values in place. Moments live in the scope `"{model}_adam"`,
//! which is claimed once per model.
//!
//! # Example
//!
//! ```
//! use tenidx_ad::optimizers::{Adam, AdamConfig};
//! use tenidx_ad::GraphBuilder;
//! use tenidx_core::DenseND;
//!
//! let graph = GraphBuilder::<f64>::new();
//! let w = graph.parameter("net", "w", DenseND::from_vec(vec![1.0, -1.0], &[2]).unwrap()).unwrap();
//!
//! let config = AdamConfig::new().learning_rate(0.1);
//! let mut adam = Adam::new(&graph, "net", config).unwrap();
//!
//! // loss = sum(w * w)
//! let loss = graph.sum(graph.square(w).unwrap()).unwrap();
//! adam.step(&graph, loss).unwrap();
//!
//! let updated = graph.value(w).unwrap();
//! assert!(updated[&[0]] < 1.0);
//! assert!(updated[&[1]] > -1.0);
//! assert_eq!(adam.num_steps(), 1);
//! ```

use crate::graph::{Element, GraphBuilder, Var, VarId};
use crate::scope::Scope;
use scirs2_core::numeric::NumCast;
use std::collections::HashMap;
use tenidx_core::{Result, TenidxError};
use tracing::debug;

/// Configuration for Adam
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AdamConfig {
    /// Learning rate
    pub learning_rate: f64,
    /// Decay of the first moment
    pub beta1: f64,
    /// Decay of the second moment
    pub beta2: f64,
    /// Epsilon for numerical stability
    pub epsilon: f64,
}

impl Default for AdamConfig {
    fn default() -> Self {
        Self {
            learning_rate: 3e-4,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
        }
    }
}

impl AdamConfig {
    /// Default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set learning rate
    pub fn learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    /// Set beta1
    pub fn beta1(mut self, beta1: f64) -> Self {
        self.beta1 = beta1;
        self
    }

    /// Set beta2
    pub fn beta2(mut self, beta2: f64) -> Self {
        self.beta2 = beta2;
        self
    }

    /// Set epsilon
    pub fn epsilon(mut self, eps: f64) -> Self {
        self.epsilon = eps;
        self
    }

    /// Check the hyper-parameters
    pub fn validate(&self) -> Result<()> {
        if !(self.learning_rate.is_finite() && self.learning_rate >= 0.0) {
            return Err(TenidxError::invalid(
                "adam",
                format!("learning rate must be finite and >= 0, got {}", self.learning_rate),
            ));
        }
        for (name, beta) in [("beta1", self.beta1), ("beta2", self.beta2)] {
            if !(0.0..1.0).contains(&beta) {
                return Err(TenidxError::invalid(
                    "adam",
                    format!("{} must be in [0, 1), got {}", name, beta),
                ));
            }
        }
        if self.epsilon.is_nan() || self.epsilon < 0.0 {
            return Err(TenidxError::invalid(
                "adam",
                format!("epsilon must be >= 0, got {}", self.epsilon),
            ));
        }
        Ok(())
    }
}

/// Persistent Adam state of one model
#[derive(Debug, Clone)]
pub struct OptimizerState {
    model: String,
    scope: Scope,
    /// parameter slot -> (first moment, second moment)
    moments: HashMap<VarId, (Var, Var)>,
    step: usize,
}

impl OptimizerState {
    /// Claim the scope `"{model}_adam"`.
    ///
    /// # Errors
    ///
    /// `ScopeCollision` if the model already has optimizer state in `graph`.
    pub fn new<T: Element>(graph: &GraphBuilder<T>, model: &str) -> Result<Self> {
        let scope = graph.var_scope(&format!("{}_adam", model), true)?;
        Ok(Self {
            model: model.to_string(),
            scope,
            moments: HashMap::new(),
            step: 0,
        })
    }

    /// Model whose parameters this state updates
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Scope holding the moment variables
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Number of completed steps
    pub fn num_steps(&self) -> usize {
        self.step
    }

    /// Moment variables of a parameter, once it has been stepped
    pub fn moments(&self, param: Var) -> Option<(Var, Var)> {
        self.moments.get(&param.id()).copied()
    }
}

fn cast<T: Element>(value: f64, what: &str) -> Result<T> {
    <T as NumCast>::from(value).ok_or_else(|| {
        TenidxError::invalid("adam", format!("{} = {} is not representable", what, value))
    })
}

/// One Adam step over the parameters of `model`.
///
/// Per parameter `p` with gradient `g` at step `t`:
///
/// ```text
/// m = b1*m + (1-b1)*g
/// v = b2*v + (1-b2)*g*g
/// step_size = lr * sqrt(1 - b2^t) / (1 - b1^t)
/// p = p - m * step_size / (sqrt(v) + eps)
/// ```
pub fn adam<T: Element>(
    graph: &GraphBuilder<T>,
    state: &mut OptimizerState,
    model: &str,
    loss: Var,
    config: &AdamConfig,
) -> Result<()> {
    if state.model != model {
        return Err(TenidxError::invalid(
            "adam",
            format!(
                "optimizer state belongs to model {}, not {}",
                state.model, model
            ),
        ));
    }
    config.validate()?;

    let named = graph.find_named_vars(model);
    let params: Vec<Var> = named.iter().map(|(_, var)| *var).collect();
    let grads = graph.grad(loss, &params)?;

    state.step += 1;
    let t = state.step as i32;
    let step_size = config.learning_rate * (1.0 - config.beta2.powi(t)).sqrt()
        / (1.0 - config.beta1.powi(t));
    debug!(
        model,
        step = state.step,
        params = params.len(),
        step_size,
        "adam step"
    );

    let beta1: T = cast(config.beta1, "beta1")?;
    let beta2: T = cast(config.beta2, "beta2")?;
    let one_minus_beta1: T = cast(1.0 - config.beta1, "1 - beta1")?;
    let one_minus_beta2: T = cast(1.0 - config.beta2, "1 - beta2")?;
    let eps: T = cast(config.epsilon, "epsilon")?;
    let step_size: T = cast(step_size, "step size")?;

    let prefix_len = model.len() + 1;
    for ((name, p), g) in named.iter().zip(grads) {
        let (m, v) = match state.moments.get(&p.id()) {
            Some(&pair) => pair,
            None => {
                let shape = graph.shape(*p)?;
                let local = &name[prefix_len..];
                let m = graph.make_var(&state.scope, &format!("{}.m", local), &shape)?;
                let v = graph.make_var(&state.scope, &format!("{}.v", local), &shape)?;
                state.moments.insert(p.id(), (m, v));
                (m, v)
            }
        };

        let m_new = graph.add(
            graph.mul_scalar(m, beta1)?,
            graph.mul_scalar(g, one_minus_beta1)?,
        )?;
        graph.assign(m, m_new)?;
        let v_new = graph.add(
            graph.mul_scalar(v, beta2)?,
            graph.mul_scalar(graph.square(g)?, one_minus_beta2)?,
        )?;
        graph.assign(v, v_new)?;

        let denom = graph.add_scalar(graph.sqrt(v)?, eps)?;
        let update = graph.mul_scalar(graph.div(m, denom)?, step_size)?;
        let p_new = graph.sub(*p, update)?;
        graph.assign(*p, p_new)?;
    }
    Ok(())
}

/// Common interface of graph optimizers
pub trait Optimizer<T: Element> {
    /// Update the parameters to reduce `loss`
    fn step(&mut self, graph: &GraphBuilder<T>, loss: Var) -> Result<()>;

    /// Number of completed steps
    fn num_steps(&self) -> usize;
}

/// Adam bound to one model
#[derive(Debug, Clone)]
pub struct Adam {
    state: OptimizerState,
    config: AdamConfig,
}

impl Adam {
    /// Create an optimizer for the parameters of `model`
    pub fn new<T: Element>(graph: &GraphBuilder<T>, model: &str, config: AdamConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            state: OptimizerState::new(graph, model)?,
            config,
        })
    }

    /// Perform one step
    pub fn step<T: Element>(&mut self, graph: &GraphBuilder<T>, loss: Var) -> Result<()> {
        let model = self.state.model.clone();
        adam(graph, &mut self.state, &model, loss, &self.config)
    }

    /// Number of completed steps
    pub fn num_steps(&self) -> usize {
        self.state.num_steps()
    }

    /// Hyper-parameters
    pub fn config(&self) -> &AdamConfig {
        &self.config
    }

    /// Persistent state
    pub fn state(&self) -> &OptimizerState {
        &self.state
    }
}

impl<T: Element> Optimizer<T> for Adam {
    fn step(&mut self, graph: &GraphBuilder<T>, loss: Var) -> Result<()> {
        Adam::step(self, graph, loss)
    }

    fn num_steps(&self) -> usize {
        Adam::num_steps(self)
    }
}
