//! Named scopes and persistent variables
//!
//! Variables created through [`GraphBuilder::make_var`](crate::GraphBuilder::make_var)
//! or [`GraphBuilder::parameter`](crate::GraphBuilder::parameter) are registered
//! under a dotted name (`"scope.name"`). Registration order is kept so that
//! parameter discovery is deterministic.

use crate::graph::VarId;
use std::collections::{HashMap, HashSet};
use std::fmt;
use tenidx_core::{Result, TenidxError};

/// A claimed name prefix for persistent variables
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Scope {
    name: String,
}

impl Scope {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Scope name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fully qualified name of a variable inside this scope
    pub fn qualify(&self, var_name: &str) -> String {
        qualify(&self.name, var_name)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

pub(crate) fn qualify(prefix: &str, name: &str) -> String {
    format!("{}.{}", prefix, name)
}

/// Claimed scopes and named variables of one graph
#[derive(Debug, Default)]
pub(crate) struct ScopeTable {
    claimed: HashSet<String>,
    named: Vec<(String, VarId)>,
    by_name: HashMap<String, VarId>,
}

impl ScopeTable {
    /// Claim a scope. A unique claim fails if the name was claimed before.
    pub(crate) fn claim(&mut self, name: &str, unique: bool) -> Result<Scope> {
        let fresh = self.claimed.insert(name.to_string());
        if unique && !fresh {
            return Err(TenidxError::ScopeCollision {
                scope: name.to_string(),
            });
        }
        Ok(Scope::new(name))
    }

    pub(crate) fn lookup(&self, full_name: &str) -> Option<VarId> {
        self.by_name.get(full_name).copied()
    }

    pub(crate) fn register(&mut self, full_name: String, id: VarId) {
        self.by_name.insert(full_name.clone(), id);
        self.named.push((full_name, id));
    }

    /// Variables whose name starts with `"{prefix}."`, in registration order
    pub(crate) fn find(&self, prefix: &str) -> Vec<(String, VarId)> {
        let dotted = format!("{}.", prefix);
        self.named
            .iter()
            .filter(|(name, _)| name.starts_with(&dotted))
            .cloned()
            .collect()
    }

    pub(crate) fn num_named(&self) -> usize {
        self.named.len()
    }
}
