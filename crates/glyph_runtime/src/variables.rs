// Variable Context - Per-run and session-global key/value state
//
// Get/Set-Variable node kinds read and write through this context. The
// run-scoped map lives and dies with one execution; the global map lives
// on the engine for the whole session and is shared by concurrent runs.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Scope of a variable access
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableScope {
    /// Session lifetime, shared across runs, reset only by the host
    Global,
    /// One execution run, discarded at run end
    Run,
}

/// Cloneable handle to the session-global variable store.
///
/// Writes from concurrent runs serialize through the lock, so a
/// Set-Variable in one run is never lost to a racing Set in another.
#[derive(Debug, Clone, Default)]
pub struct GlobalVariables {
    inner: Arc<RwLock<HashMap<String, Value>>>,
}

impl GlobalVariables {
    /// Create an empty global store
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a global variable (None if unset)
    pub fn get(&self, name: &str) -> Option<Value> {
        self.inner.read().get(name).cloned()
    }

    /// Set a global variable
    pub fn set(&self, name: &str, value: Value) {
        self.inner.write().insert(name.to_string(), value);
    }

    /// Clear all globals (host-driven session reset)
    pub fn reset(&self) {
        self.inner.write().clear();
    }
}

/// Per-run variable context: a fresh run-scoped map plus a handle to the
/// session globals.
#[derive(Debug)]
pub struct VariableContext {
    globals: GlobalVariables,
    scoped: HashMap<String, Value>,
}

impl VariableContext {
    /// Create a context for a new run, sharing the given globals
    pub fn new(globals: GlobalVariables) -> Self {
        Self {
            globals,
            scoped: HashMap::new(),
        }
    }

    /// Get a variable; unset variables read as Null
    pub fn get(&self, scope: VariableScope, name: &str) -> Value {
        match scope {
            VariableScope::Global => self.globals.get(name).unwrap_or(Value::Null),
            VariableScope::Run => self.scoped.get(name).cloned().unwrap_or(Value::Null),
        }
    }

    /// Set a variable, visible to every subsequent get in the same scope
    pub fn set(&mut self, scope: VariableScope, name: &str, value: Value) {
        match scope {
            VariableScope::Global => self.globals.set(name, value),
            VariableScope::Run => {
                self.scoped.insert(name.to_string(), value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_scoped_round_trip() {
        let mut ctx = VariableContext::new(GlobalVariables::new());
        assert_eq!(ctx.get(VariableScope::Run, "x"), Value::Null);

        ctx.set(VariableScope::Run, "x", Value::from(42));
        assert_eq!(ctx.get(VariableScope::Run, "x"), Value::from(42));

        // Run-scoped writes do not leak into the global scope
        assert_eq!(ctx.get(VariableScope::Global, "x"), Value::Null);
    }

    #[test]
    fn test_scoped_state_isolated_between_runs() {
        let globals = GlobalVariables::new();

        let mut first = VariableContext::new(globals.clone());
        first.set(VariableScope::Run, "x", Value::from(1));
        first.set(VariableScope::Global, "g", Value::from("kept"));
        drop(first);

        let second = VariableContext::new(globals);
        assert_eq!(second.get(VariableScope::Run, "x"), Value::Null);
        assert_eq!(second.get(VariableScope::Global, "g"), Value::from("kept"));
    }

    #[test]
    fn test_global_reset() {
        let globals = GlobalVariables::new();
        globals.set("a", Value::from(1));
        assert_eq!(globals.get("a"), Some(Value::from(1)));

        globals.reset();
        assert_eq!(globals.get("a"), None);
    }
}
