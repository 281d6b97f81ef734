//! Variables visible to expression evaluation.

use std::collections::HashMap;

use serde_json::Value;

use crate::expression::EvaluationScope;
use crate::protocol::Key;

/// Lookup of a variable by name in an evaluation scope.
pub trait VariableSource: Send + Sync {
    fn variable(&self, scope: EvaluationScope, name: &str) -> Option<Value>;
}

/// Variables per element instance. There is never anything in
/// [`EvaluationScope::NoProcessInstance`].
#[derive(Debug, Default, Clone)]
pub struct VariableState {
    scopes: HashMap<Key, HashMap<String, Value>>,
}

impl VariableState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_variable(&mut self, scope: Key, name: impl Into<String>, value: Value) {
        self.scopes.entry(scope).or_default().insert(name.into(), value);
    }
}

impl VariableSource for VariableState {
    fn variable(&self, scope: EvaluationScope, name: &str) -> Option<Value> {
        match scope {
            EvaluationScope::NoProcessInstance => None,
            EvaluationScope::ElementInstance(key) => {
                self.scopes.get(&key).and_then(|vars| vars.get(name)).cloned()
            }
        }
    }
}
