// Builtin Node Library - Standard node types shipped with the runtime
//
// Every builtin lives in the "glyph/" namespace. Hosts extend or replace
// these by registering their own types; a re-registration under the same
// id wins.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use glyph_types::{COMPLETE_PORT, LOOP_PORT, NodeTypeSpec, PortSchema, ValueType};
use rand::Rng;
use serde_json::{Value, json};
use tracing::{debug, error, info, warn};

use crate::compute::{ComputeContext, ComputeError, ComputeOutput, NodeCompute};
use crate::engine::is_truthy;
use crate::registry::NodeRegistry;
use crate::variables::VariableScope;

/// Register every builtin node type into a registry
pub fn register_builtins(registry: &NodeRegistry) {
    register_event_nodes(registry);
    register_flow_nodes(registry);
    register_math_nodes(registry);
    register_logic_nodes(registry);
    register_variable_nodes(registry);
    register_utility_nodes(registry);
}

fn flow_output() -> HashMap<String, Value> {
    let mut values = HashMap::new();
    values.insert("flow".to_string(), Value::Bool(true));
    values
}

/// The variable scope named in a node's config ("global" or "run")
fn scope_from_config(ctx: &ComputeContext<'_>) -> VariableScope {
    match ctx.config_str("scope") {
        Some("global") => VariableScope::Global,
        _ => VariableScope::Run,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────────────────────────────────────

fn register_event_nodes(registry: &NodeRegistry) {
    registry.register_fn(
        NodeTypeSpec::new("glyph/OnEvent", "On Event", "Events")
            .describe("Entry point fired by the host with an optional payload")
            .output(PortSchema::flow("flow"))
            .output(PortSchema::data("payload", ValueType::Any)),
        |ctx| {
            let mut values = flow_output();
            if let Some(payload) = ctx.input("payload") {
                values.insert("payload".to_string(), payload.clone());
            }
            Ok(ComputeOutput::values(values))
        },
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Flow Control
// ─────────────────────────────────────────────────────────────────────────────

/// Waits for `duration_ms` before firing its flow output
struct DelayCompute;

#[async_trait]
impl NodeCompute for DelayCompute {
    async fn compute(&self, ctx: &mut ComputeContext<'_>) -> Result<ComputeOutput, ComputeError> {
        let duration_ms = ctx.input_number("duration_ms").unwrap_or(1000.0).max(0.0);
        debug!(node_id = %ctx.node_id, duration_ms, "Delay started");
        tokio::time::sleep(std::time::Duration::from_millis(duration_ms as u64)).await;
        Ok(ComputeOutput::values(flow_output()))
    }
}

fn register_flow_nodes(registry: &NodeRegistry) {
    registry.register_fn(
        NodeTypeSpec::new("glyph/Branch", "Branch", "Flow Control")
            .describe("Routes flow through exactly one of two outputs")
            .input(PortSchema::flow_in())
            .input(PortSchema::data_with_default(
                "condition",
                ValueType::Boolean,
                json!(false),
            ))
            .output(PortSchema::flow("true"))
            .output(PortSchema::flow("false")),
        |ctx| {
            let taken = if is_truthy(ctx.input("condition")) {
                "true"
            } else {
                "false"
            };
            Ok(ComputeOutput::value(taken, Value::Bool(true)))
        },
    );

    registry.register_fn(
        NodeTypeSpec::new("glyph/Sequence", "Sequence", "Flow Control")
            .describe("Fires its flow outputs strictly in order")
            .input(PortSchema::flow_in())
            .output(PortSchema::flow("flow1"))
            .output(PortSchema::flow("flow2"))
            .output(PortSchema::flow("flow3"))
            .output(PortSchema::flow("flow4")),
        |_ctx| {
            let mut values = HashMap::new();
            for port in ["flow1", "flow2", "flow3", "flow4"] {
                values.insert(port.to_string(), Value::Bool(true));
            }
            Ok(ComputeOutput::values(values))
        },
    );

    registry.register(
        NodeTypeSpec::new("glyph/Delay", "Delay", "Flow Control")
            .describe("Waits before continuing flow")
            .input(PortSchema::flow_in())
            .input(PortSchema::data_with_default(
                "duration_ms",
                ValueType::Number,
                json!(1000),
            ))
            .output(PortSchema::flow("flow")),
        Arc::new(DelayCompute),
    );

    registry.register_fn(
        NodeTypeSpec::new("glyph/Loop", "Loop", "Flow Control")
            .describe("Fires its loop body a fixed number of times")
            .iterator()
            .input(PortSchema::flow_in())
            .input(PortSchema::data_with_default(
                "count",
                ValueType::Number,
                json!(0),
            ))
            .output(PortSchema::flow(LOOP_PORT))
            .output(PortSchema::flow(COMPLETE_PORT))
            .output(PortSchema::data("index", ValueType::Number)),
        |ctx| {
            let count = ctx.input_number("count").unwrap_or(0.0).max(0.0) as usize;
            let plan = (0..count)
                .map(|i| {
                    let mut bindings = HashMap::new();
                    bindings.insert("index".to_string(), Value::from(i));
                    bindings
                })
                .collect();
            Ok(ComputeOutput::iterations(plan))
        },
    );

    registry.register_fn(
        NodeTypeSpec::new("glyph/ForEach", "For Each", "Flow Control")
            .describe("Fires its loop body once per array element, in order")
            .iterator()
            .input(PortSchema::flow_in())
            .input(PortSchema::data("array", ValueType::Array).required())
            .output(PortSchema::flow(LOOP_PORT))
            .output(PortSchema::flow(COMPLETE_PORT))
            .output(PortSchema::data("item", ValueType::Any))
            .output(PortSchema::data("index", ValueType::Number)),
        |ctx| {
            let items = ctx
                .input_array("array")
                .ok_or_else(|| ComputeError::new("input 'array' is not an array"))?;
            let plan = items
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    let mut bindings = HashMap::new();
                    bindings.insert("item".to_string(), item.clone());
                    bindings.insert("index".to_string(), Value::from(i));
                    bindings
                })
                .collect();
            Ok(ComputeOutput::iterations(plan))
        },
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Math
// ─────────────────────────────────────────────────────────────────────────────

fn arithmetic_spec(id: &str, display_name: &str) -> NodeTypeSpec {
    NodeTypeSpec::new(id, display_name, "Math")
        .input(PortSchema::flow_in())
        .input(PortSchema::data_with_default("a", ValueType::Number, json!(0)))
        .input(PortSchema::data_with_default("b", ValueType::Number, json!(0)))
        .output(PortSchema::flow("flow"))
        .output(PortSchema::data("result", ValueType::Number))
}

fn register_arithmetic<F>(registry: &NodeRegistry, id: &str, display_name: &str, op: F)
where
    F: Fn(f64, f64) -> f64 + Send + Sync + 'static,
{
    registry.register_fn(arithmetic_spec(id, display_name), move |ctx| {
        let a = ctx.input_number("a").unwrap_or(0.0);
        let b = ctx.input_number("b").unwrap_or(0.0);
        let mut values = flow_output();
        values.insert("result".to_string(), Value::from(op(a, b)));
        Ok(ComputeOutput::values(values))
    });
}

fn register_math_nodes(registry: &NodeRegistry) {
    register_arithmetic(registry, "glyph/Add", "Add", |a, b| a + b);
    register_arithmetic(registry, "glyph/Subtract", "Subtract", |a, b| a - b);
    register_arithmetic(registry, "glyph/Multiply", "Multiply", |a, b| a * b);

    // Divide reports division by zero through its error data output rather
    // than failing the run
    registry.register_fn(
        arithmetic_spec("glyph/Divide", "Divide").output(PortSchema::data(
            "error",
            ValueType::String,
        )),
        |ctx| {
            let a = ctx.input_number("a").unwrap_or(0.0);
            let b = ctx.input_number("b").unwrap_or(0.0);
            let mut values = flow_output();
            if b == 0.0 {
                warn!(node_id = %ctx.node_id, "Division by zero");
                values.insert("result".to_string(), Value::from(0.0));
                values.insert("error".to_string(), Value::from("Division by zero"));
            } else {
                values.insert("result".to_string(), Value::from(a / b));
            }
            Ok(ComputeOutput::values(values))
        },
    );

    registry.register_fn(
        NodeTypeSpec::new("glyph/Clamp", "Clamp", "Math")
            .describe("Clamps a number into [min, max]")
            .input(PortSchema::data_with_default(
                "value",
                ValueType::Number,
                json!(0),
            ))
            .input(PortSchema::data_with_default("min", ValueType::Number, json!(0)))
            .input(PortSchema::data_with_default("max", ValueType::Number, json!(1)))
            .output(PortSchema::data("result", ValueType::Number)),
        |ctx| {
            let value = ctx.input_number("value").unwrap_or(0.0);
            let min = ctx.input_number("min").unwrap_or(0.0);
            let max = ctx.input_number("max").unwrap_or(1.0);
            Ok(ComputeOutput::value(
                "result",
                Value::from(value.clamp(min, max.max(min))),
            ))
        },
    );

    registry.register_fn(
        NodeTypeSpec::new("glyph/Random", "Random", "Math")
            .describe("Emits a random number in [min, max)")
            .input(PortSchema::flow_in())
            .input(PortSchema::data_with_default("min", ValueType::Number, json!(0)))
            .input(PortSchema::data_with_default("max", ValueType::Number, json!(1)))
            .output(PortSchema::flow("flow"))
            .output(PortSchema::data("result", ValueType::Number)),
        |ctx| {
            let min = ctx.input_number("min").unwrap_or(0.0);
            let max = ctx.input_number("max").unwrap_or(1.0);
            let result = if max > min {
                rand::thread_rng().gen_range(min..max)
            } else {
                min
            };
            let mut values = flow_output();
            values.insert("result".to_string(), Value::from(result));
            Ok(ComputeOutput::values(values))
        },
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Logic
// ─────────────────────────────────────────────────────────────────────────────

fn register_logic_nodes(registry: &NodeRegistry) {
    registry.register_fn(
        NodeTypeSpec::new("glyph/And", "And", "Logic")
            .input(PortSchema::data("a", ValueType::Any))
            .input(PortSchema::data("b", ValueType::Any))
            .output(PortSchema::data("result", ValueType::Boolean)),
        |ctx| {
            let result = is_truthy(ctx.input("a")) && is_truthy(ctx.input("b"));
            Ok(ComputeOutput::value("result", Value::Bool(result)))
        },
    );

    registry.register_fn(
        NodeTypeSpec::new("glyph/Or", "Or", "Logic")
            .input(PortSchema::data("a", ValueType::Any))
            .input(PortSchema::data("b", ValueType::Any))
            .output(PortSchema::data("result", ValueType::Boolean)),
        |ctx| {
            let result = is_truthy(ctx.input("a")) || is_truthy(ctx.input("b"));
            Ok(ComputeOutput::value("result", Value::Bool(result)))
        },
    );

    registry.register_fn(
        NodeTypeSpec::new("glyph/Not", "Not", "Logic")
            .input(PortSchema::data("value", ValueType::Any))
            .output(PortSchema::data("result", ValueType::Boolean)),
        |ctx| {
            Ok(ComputeOutput::value(
                "result",
                Value::Bool(!is_truthy(ctx.input("value"))),
            ))
        },
    );

    registry.register_fn(
        NodeTypeSpec::new("glyph/Compare", "Compare", "Logic")
            .describe("Compares two values with the operator from config")
            .input(PortSchema::data("a", ValueType::Any))
            .input(PortSchema::data("b", ValueType::Any))
            .output(PortSchema::data("result", ValueType::Boolean)),
        |ctx| {
            let a = ctx.input("a").cloned().unwrap_or(Value::Null);
            let b = ctx.input("b").cloned().unwrap_or(Value::Null);
            let operator = ctx.config_str("operator").unwrap_or("eq");
            let result = compare_values(&a, &b, operator)?;
            Ok(ComputeOutput::value("result", Value::Bool(result)))
        },
    );
}

fn compare_values(a: &Value, b: &Value, operator: &str) -> Result<bool, ComputeError> {
    match operator {
        "eq" => Ok(a == b),
        "ne" => Ok(a != b),
        "gt" | "lt" | "gte" | "lte" => {
            let (x, y) = match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => (x, y),
                _ => {
                    return Err(ComputeError::new(format!(
                        "operator '{}' requires numeric operands",
                        operator
                    )));
                }
            };
            Ok(match operator {
                "gt" => x > y,
                "lt" => x < y,
                "gte" => x >= y,
                _ => x <= y,
            })
        }
        other => Err(ComputeError::new(format!(
            "unknown compare operator '{}'",
            other
        ))),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Variables
// ─────────────────────────────────────────────────────────────────────────────

fn register_variable_nodes(registry: &NodeRegistry) {
    registry.register_fn(
        NodeTypeSpec::new("glyph/GetVariable", "Get Variable", "Variables")
            .describe("Reads a named variable; unset variables read as null")
            .output(PortSchema::data("value", ValueType::Any)),
        |ctx| {
            let name = ctx
                .config_str("name")
                .ok_or_else(|| ComputeError::new("config 'name' is required"))?
                .to_string();
            let scope = scope_from_config(ctx);
            let value = ctx.variables.get(scope, &name);
            Ok(ComputeOutput::value("value", value))
        },
    );

    registry.register_fn(
        NodeTypeSpec::new("glyph/SetVariable", "Set Variable", "Variables")
            .describe("Writes a named variable, then continues flow")
            .input(PortSchema::flow_in())
            .input(PortSchema::data("value", ValueType::Any))
            .output(PortSchema::flow("flow"))
            .output(PortSchema::data("value", ValueType::Any)),
        |ctx| {
            let name = ctx
                .config_str("name")
                .ok_or_else(|| ComputeError::new("config 'name' is required"))?
                .to_string();
            let scope = scope_from_config(ctx);
            let value = ctx.input("value").cloned().unwrap_or(Value::Null);
            debug!(node_id = %ctx.node_id, name = %name, scope = ?scope, "Setting variable");
            ctx.variables.set(scope, &name, value.clone());
            let mut values = flow_output();
            values.insert("value".to_string(), value);
            Ok(ComputeOutput::values(values))
        },
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Utility
// ─────────────────────────────────────────────────────────────────────────────

fn register_utility_nodes(registry: &NodeRegistry) {
    registry.register_fn(
        NodeTypeSpec::new("glyph/Log", "Log", "Utility")
            .describe("Logs a message at the level from config")
            .input(PortSchema::flow_in())
            .input(PortSchema::data_with_default(
                "message",
                ValueType::String,
                json!(""),
            ))
            .output(PortSchema::flow("flow")),
        |ctx| {
            let message = ctx.input_str("message").unwrap_or("");
            match ctx.config_str("level") {
                Some("error") => error!(target: "blueprint", node_id = %ctx.node_id, "{}", message),
                Some("warn") => warn!(target: "blueprint", node_id = %ctx.node_id, "{}", message),
                Some("debug") => debug!(target: "blueprint", node_id = %ctx.node_id, "{}", message),
                _ => info!(target: "blueprint", node_id = %ctx.node_id, "{}", message),
            }
            Ok(ComputeOutput::values(flow_output()))
        },
    );

    registry.register_fn(
        NodeTypeSpec::new("glyph/FormatString", "Format String", "Utility")
            .describe("Substitutes {key} placeholders from an object")
            .input(PortSchema::data_with_default(
                "template",
                ValueType::String,
                json!(""),
            ))
            .input(PortSchema::data_with_default(
                "values",
                ValueType::Object,
                json!({}),
            ))
            .output(PortSchema::data("result", ValueType::String)),
        |ctx| {
            let template = ctx.input_str("template").unwrap_or("").to_string();
            let mut result = template;
            if let Some(object) = ctx.input_object("values") {
                for (key, value) in object {
                    let rendered = match value {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    result = result.replace(&format!("{{{}}}", key), &rendered);
                }
            }
            Ok(ComputeOutput::value("result", Value::from(result)))
        },
    );
}
