// Compute Contract - Node compute callables and their invocation context
//
// Every node type carries an opaque compute callable behind the NodeCompute
// trait. The engine never inspects the implementation - database, LLM, and
// plugin-hosted nodes all conform to the same contract.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;

use crate::variables::VariableContext;

// ─────────────────────────────────────────────────────────────────────────────
// Compute Context
// ─────────────────────────────────────────────────────────────────────────────

/// Context passed to a node's compute callable: resolved data inputs, the
/// node's static config, and access to the run's variable context.
pub struct ComputeContext<'run> {
    /// Node instance id
    pub node_id: String,
    /// Node configuration from the blueprint, passed through untouched
    pub config: Value,
    /// Resolved input values (port id -> value)
    pub inputs: HashMap<String, Value>,
    /// The run's variable context (run-scoped and global maps)
    pub variables: &'run mut VariableContext,
}

impl<'run> ComputeContext<'run> {
    /// Create a compute context for one invocation
    pub fn new(
        node_id: String,
        config: Value,
        inputs: HashMap<String, Value>,
        variables: &'run mut VariableContext,
    ) -> Self {
        Self {
            node_id,
            config,
            inputs,
            variables,
        }
    }

    /// Get an input value by port id
    pub fn input(&self, id: &str) -> Option<&Value> {
        self.inputs.get(id)
    }

    /// Get input as f64
    pub fn input_number(&self, id: &str) -> Option<f64> {
        self.inputs.get(id).and_then(|v| v.as_f64())
    }

    /// Get input as i64
    pub fn input_integer(&self, id: &str) -> Option<i64> {
        self.inputs.get(id).and_then(|v| v.as_i64())
    }

    /// Get input as bool
    pub fn input_bool(&self, id: &str) -> Option<bool> {
        self.inputs.get(id).and_then(|v| v.as_bool())
    }

    /// Get input as string
    pub fn input_str(&self, id: &str) -> Option<&str> {
        self.inputs.get(id).and_then(|v| v.as_str())
    }

    /// Get input as array
    pub fn input_array(&self, id: &str) -> Option<&Vec<Value>> {
        self.inputs.get(id).and_then(|v| v.as_array())
    }

    /// Get input as object
    pub fn input_object(&self, id: &str) -> Option<&serde_json::Map<String, Value>> {
        self.inputs.get(id).and_then(|v| v.as_object())
    }

    /// Get a config value
    pub fn config_value(&self, key: &str) -> Option<&Value> {
        self.config.get(key)
    }

    /// Get config as string
    pub fn config_str(&self, key: &str) -> Option<&str> {
        self.config.get(key).and_then(|v| v.as_str())
    }

    /// Get config as bool
    pub fn config_bool(&self, key: &str) -> Option<bool> {
        self.config.get(key).and_then(|v| v.as_bool())
    }

    /// Get config as i64
    pub fn config_integer(&self, key: &str) -> Option<i64> {
        self.config.get(key).and_then(|v| v.as_i64())
    }

    /// Current wall-clock time
    pub fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Compute Output
// ─────────────────────────────────────────────────────────────────────────────

/// Result of a successful compute invocation.
///
/// Plain nodes return `Values` covering a subset of their declared outputs
/// (unset outputs read as Null downstream). Iterator node types return an
/// `Iterations` plan instead; the engine drives the `loop` flow output once
/// per planned iteration, then `complete`.
#[derive(Debug, Clone, PartialEq)]
pub enum ComputeOutput {
    /// Output bindings (port id -> value)
    Values(HashMap<String, Value>),
    /// Iteration plan: per-iteration output bindings, in order
    Iterations(Vec<HashMap<String, Value>>),
}

impl ComputeOutput {
    /// No outputs at all
    pub fn empty() -> Self {
        ComputeOutput::Values(HashMap::new())
    }

    /// Output bindings from a map
    pub fn values(values: HashMap<String, Value>) -> Self {
        ComputeOutput::Values(values)
    }

    /// A single output binding
    pub fn value(port_id: &str, value: Value) -> Self {
        let mut values = HashMap::new();
        values.insert(port_id.to_string(), value);
        ComputeOutput::Values(values)
    }

    /// An iteration plan
    pub fn iterations(plan: Vec<HashMap<String, Value>>) -> Self {
        ComputeOutput::Iterations(plan)
    }
}

/// An unexpected failure escaping a compute callable.
///
/// Expected domain failures (divide-by-zero, a 404 from a database node)
/// do not use this path - they go through a declared `error` data output
/// while the node's flow output still fires.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct ComputeError(pub String);

impl ComputeError {
    /// Create a compute error from any message
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<String> for ComputeError {
    fn from(message: String) -> Self {
        Self(message)
    }
}

impl From<&str> for ComputeError {
    fn from(message: &str) -> Self {
        Self(message.to_string())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Node Compute Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Trait implemented by every node compute callable.
///
/// The call may be asynchronous; the engine suspends the current activation
/// (not the whole engine) until it settles.
#[async_trait]
pub trait NodeCompute: Send + Sync {
    /// Compute this node's outputs from its resolved inputs
    async fn compute(&self, ctx: &mut ComputeContext<'_>)
    -> Result<ComputeOutput, ComputeError>;
}

/// Function-based compute for simple synchronous nodes
pub struct FnCompute<F>
where
    F: Fn(&mut ComputeContext<'_>) -> Result<ComputeOutput, ComputeError> + Send + Sync,
{
    func: F,
}

impl<F> FnCompute<F>
where
    F: Fn(&mut ComputeContext<'_>) -> Result<ComputeOutput, ComputeError> + Send + Sync,
{
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

#[async_trait]
impl<F> NodeCompute for FnCompute<F>
where
    F: Fn(&mut ComputeContext<'_>) -> Result<ComputeOutput, ComputeError> + Send + Sync,
{
    async fn compute(
        &self,
        ctx: &mut ComputeContext<'_>,
    ) -> Result<ComputeOutput, ComputeError> {
        (self.func)(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variables::{GlobalVariables, VariableScope};

    fn context<'a>(
        inputs: HashMap<String, Value>,
        config: Value,
        variables: &'a mut VariableContext,
    ) -> ComputeContext<'a> {
        ComputeContext::new("test_node".to_string(), config, inputs, variables)
    }

    #[test]
    fn test_typed_input_getters() {
        let mut inputs = HashMap::new();
        inputs.insert("a".to_string(), Value::from(42.0));
        inputs.insert("b".to_string(), Value::from("hello"));
        inputs.insert("c".to_string(), Value::from(true));
        inputs.insert("d".to_string(), serde_json::json!([1, 2]));

        let mut vars = VariableContext::new(GlobalVariables::new());
        let ctx = context(inputs, Value::Null, &mut vars);

        assert_eq!(ctx.input_number("a"), Some(42.0));
        assert_eq!(ctx.input_str("b"), Some("hello"));
        assert_eq!(ctx.input_bool("c"), Some(true));
        assert_eq!(ctx.input_array("d").map(|a| a.len()), Some(2));
        assert_eq!(ctx.input_number("missing"), None);
    }

    #[test]
    fn test_config_getters() {
        let config = serde_json::json!({
            "operator": "==",
            "enabled": true,
            "count": 5
        });

        let mut vars = VariableContext::new(GlobalVariables::new());
        let ctx = context(HashMap::new(), config, &mut vars);

        assert_eq!(ctx.config_str("operator"), Some("=="));
        assert_eq!(ctx.config_bool("enabled"), Some(true));
        assert_eq!(ctx.config_integer("count"), Some(5));
    }

    #[test]
    fn test_variables_through_context() {
        let mut vars = VariableContext::new(GlobalVariables::new());
        let ctx = context(HashMap::new(), Value::Null, &mut vars);

        ctx.variables
            .set(VariableScope::Run, "counter", Value::from(1));
        assert_eq!(
            ctx.variables.get(VariableScope::Run, "counter"),
            Value::from(1)
        );
    }

    #[tokio::test]
    async fn test_fn_compute_adapter() {
        let compute = FnCompute::new(|ctx| {
            let a = ctx.input_number("a").unwrap_or(0.0);
            Ok(ComputeOutput::value("result", Value::from(a * 2.0)))
        });

        let mut inputs = HashMap::new();
        inputs.insert("a".to_string(), Value::from(21.0));
        let mut vars = VariableContext::new(GlobalVariables::new());
        let mut ctx = context(inputs, Value::Null, &mut vars);

        let output = compute.compute(&mut ctx).await.unwrap();
        assert_eq!(output, ComputeOutput::value("result", Value::from(42.0)));
    }
}
