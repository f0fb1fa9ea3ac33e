// Execution Engine - Interprets blueprint graphs
//
// The engine walks the graph from a trigger node, resolving data ports on
// demand (pull) and following truthy flow outputs (push) depth-first to
// completion. One run is one logical sequential task; the engine itself is
// re-entrant and a host may drive many runs concurrently.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use glyph_types::{Blueprint, COMPLETE_PORT, LOOP_PORT, NodeInstance, NodeTypeSpec, PortSchema};
use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::compute::{ComputeContext, ComputeOutput};
use crate::error::ExecutionError;
use crate::registry::NodeRegistry;
use crate::report::{ExecutionReport, RunStatus, TraceEntry};
use crate::variables::{GlobalVariables, VariableContext};

/// Default ceiling on node activations per run (flow cycle protection)
pub const DEFAULT_MAX_ACTIVATIONS: usize = 10_000;

// ─────────────────────────────────────────────────────────────────────────────
// Run Options
// ─────────────────────────────────────────────────────────────────────────────

/// Per-run host options: cancellation and live trace streaming
pub struct RunOptions {
    /// Cancelling this token aborts the run between node activations
    pub cancellation: CancellationToken,
    /// Optional live stream of trace entries for node-by-node visualization
    pub trace: Option<UnboundedSender<TraceEntry>>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            cancellation: CancellationToken::new(),
            trace: None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Run State
// ─────────────────────────────────────────────────────────────────────────────

/// Transient state owned by one run and discarded at run end
struct RunState {
    blueprint: Arc<Blueprint>,
    variables: VariableContext,
    /// Memoized node outputs (node id -> port id -> value)
    outputs: HashMap<String, HashMap<String, Value>>,
    /// Nodes currently being resolved in a data pull chain
    resolving: HashSet<String>,
    /// Total flow activations so far
    activations: usize,
    trace: Vec<TraceEntry>,
    cancellation: CancellationToken,
    trace_tx: Option<UnboundedSender<TraceEntry>>,
}

impl RunState {
    fn cache_outputs(&mut self, node_id: &str, values: HashMap<String, Value>) {
        self.outputs
            .entry(node_id.to_string())
            .or_default()
            .extend(values);
    }

    fn push_trace(&mut self, entry: TraceEntry) {
        if let Some(tx) = &self.trace_tx {
            // A closed receiver just means the host stopped watching
            let _ = tx.send(entry.clone());
        }
        self.trace.push(entry);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Engine
// ─────────────────────────────────────────────────────────────────────────────

/// The blueprint execution engine.
///
/// Holds the node type registry and the session-global variable store.
/// `run` borrows `&self`, so one engine can drive any number of concurrent
/// runs; they share only the registry and the globals.
pub struct Engine {
    registry: Arc<NodeRegistry>,
    globals: GlobalVariables,
    max_activations: usize,
}

impl Engine {
    /// Create an engine over a registry
    pub fn new(registry: Arc<NodeRegistry>) -> Self {
        Self {
            registry,
            globals: GlobalVariables::new(),
            max_activations: DEFAULT_MAX_ACTIVATIONS,
        }
    }

    /// Override the activation ceiling (builder style)
    pub fn with_max_activations(mut self, limit: usize) -> Self {
        self.max_activations = limit;
        self
    }

    /// The registry this engine resolves node types from
    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    /// The session-global variable store (host may read/reset it)
    pub fn globals(&self) -> &GlobalVariables {
        &self.globals
    }

    /// Execute a blueprint starting from a trigger node
    pub async fn run(
        &self,
        blueprint: Arc<Blueprint>,
        trigger_node_id: &str,
        external_inputs: HashMap<String, Value>,
    ) -> ExecutionReport {
        self.run_with_options(blueprint, trigger_node_id, external_inputs, RunOptions::default())
            .await
    }

    /// Execute a blueprint with host-supplied cancellation and trace stream
    pub async fn run_with_options(
        &self,
        blueprint: Arc<Blueprint>,
        trigger_node_id: &str,
        external_inputs: HashMap<String, Value>,
        options: RunOptions,
    ) -> ExecutionReport {
        let blueprint_id = blueprint.id.clone();
        let mut run = RunState {
            blueprint,
            variables: VariableContext::new(self.globals.clone()),
            outputs: HashMap::new(),
            resolving: HashSet::new(),
            activations: 0,
            trace: Vec::new(),
            cancellation: options.cancellation,
            trace_tx: options.trace,
        };

        info!(
            blueprint_id = %blueprint_id,
            trigger = %trigger_node_id,
            "Starting blueprint run"
        );

        self.seed_trigger_outputs(&mut run, trigger_node_id, &external_inputs);

        let result = self
            .activate(&mut run, trigger_node_id, Some(&external_inputs))
            .await;

        let (status, terminating) = match result {
            Ok(()) => (RunStatus::Completed, None),
            Err(err) => {
                error!(blueprint_id = %blueprint_id, error = %err, "Blueprint run aborted");
                (RunStatus::Aborted, Some(err))
            }
        };

        info!(
            blueprint_id = %blueprint_id,
            activations = run.activations,
            status = ?status,
            "Blueprint run finished"
        );

        ExecutionReport {
            blueprint_id,
            status,
            trace: run.trace,
            error: terminating,
        }
    }

    /// Seed the trigger node's declared data outputs from external inputs
    /// so downstream data pulls can read the triggering event's payload.
    fn seed_trigger_outputs(
        &self,
        run: &mut RunState,
        trigger_node_id: &str,
        external_inputs: &HashMap<String, Value>,
    ) {
        if external_inputs.is_empty() {
            return;
        }
        let blueprint = Arc::clone(&run.blueprint);
        let Some(node) = blueprint.node(trigger_node_id) else {
            return;
        };
        let Some(spec) = self.registry.spec(&node.type_id) else {
            return;
        };

        let mut seeded = HashMap::new();
        for port in spec.data_outputs() {
            if let Some(value) = external_inputs.get(&port.id) {
                seeded.insert(port.id.clone(), value.clone());
            }
        }
        if !seeded.is_empty() {
            run.cache_outputs(&node.id, seeded);
        }
    }

    /// Activate a node: resolve its data inputs, invoke its compute, and
    /// follow its truthy flow outputs in declared order, each path driven
    /// to completion before the next output is considered.
    fn activate<'a>(
        &'a self,
        run: &'a mut RunState,
        node_id: &'a str,
        external: Option<&'a HashMap<String, Value>>,
    ) -> Pin<Box<dyn Future<Output = Result<(), ExecutionError>> + Send + 'a>> {
        Box::pin(async move {
            if run.cancellation.is_cancelled() {
                return Err(ExecutionError::Cancelled);
            }

            run.activations += 1;
            if run.activations > self.max_activations {
                return Err(ExecutionError::MaxDepthExceeded {
                    limit: self.max_activations,
                });
            }

            let node = run
                .blueprint
                .node(node_id)
                .ok_or_else(|| ExecutionError::NodeNotFound {
                    node_id: node_id.to_string(),
                })?
                .clone();
            let spec = self.registry.spec(&node.type_id).ok_or_else(|| {
                ExecutionError::UnknownNodeType {
                    node_id: node.id.clone(),
                    type_id: node.type_id.clone(),
                }
            })?;

            debug!(node_id = %node.id, node_type = %node.type_id, "Activating node");

            let mut inputs = self.resolve_inputs(run, &node, &spec).await?;
            if let Some(external) = external {
                for (key, value) in external {
                    inputs.insert(key.clone(), value.clone());
                }
            }

            match self.invoke(run, &node, &spec, inputs).await? {
                ComputeOutput::Values(outputs) => {
                    if spec.iterator {
                        return Err(ExecutionError::PortSchemaViolation {
                            node_id: node.id.clone(),
                            message: "iterator node returned plain values instead of an iteration plan"
                                .to_string(),
                        });
                    }
                    for port in spec.flow_outputs() {
                        if is_truthy(outputs.get(&port.id)) {
                            self.propagate(run, &node.id, &port.id).await?;
                        }
                    }
                }
                ComputeOutput::Iterations(plan) => {
                    self.drive_iterations(run, &node, &spec, plan).await?;
                }
            }

            Ok(())
        })
    }

    /// Follow all connections out of a flow output, activating each target
    async fn propagate(
        &self,
        run: &mut RunState,
        node_id: &str,
        port_id: &str,
    ) -> Result<(), ExecutionError> {
        let targets: Vec<String> = run
            .blueprint
            .connections_from(node_id, port_id)
            .iter()
            .map(|c| c.target_node.clone())
            .collect();

        for target in targets {
            self.activate(run, &target, None).await?;
        }
        Ok(())
    }

    /// Drive an iterator node's plan: write each iteration's outputs into
    /// the cache, fire `loop` to completion, and only after every iteration
    /// finished fire `complete` once.
    async fn drive_iterations(
        &self,
        run: &mut RunState,
        node: &NodeInstance,
        spec: &NodeTypeSpec,
        plan: Vec<HashMap<String, Value>>,
    ) -> Result<(), ExecutionError> {
        for port in [LOOP_PORT, COMPLETE_PORT] {
            let declared = spec.output_port(port).is_some_and(|p| p.is_flow());
            if !declared {
                return Err(ExecutionError::PortSchemaViolation {
                    node_id: node.id.clone(),
                    message: format!(
                        "iterator type '{}' must declare a '{}' flow output",
                        spec.id, port
                    ),
                });
            }
        }

        for bindings in plan {
            for key in bindings.keys() {
                if !spec.declares_output(key) {
                    return Err(ExecutionError::PortSchemaViolation {
                        node_id: node.id.clone(),
                        message: format!("iteration bound undeclared output '{}'", key),
                    });
                }
            }
            run.cache_outputs(&node.id, bindings);
            self.propagate(run, &node.id, LOOP_PORT).await?;
        }

        self.propagate(run, &node.id, COMPLETE_PORT).await
    }

    /// Resolve every data input of a node, in declared order
    async fn resolve_inputs(
        &self,
        run: &mut RunState,
        node: &NodeInstance,
        spec: &NodeTypeSpec,
    ) -> Result<HashMap<String, Value>, ExecutionError> {
        let ports: Vec<PortSchema> = spec.data_inputs().cloned().collect();
        let mut inputs = HashMap::new();
        for port in ports {
            let value = self.resolve_input(run, node, &port).await?;
            inputs.insert(port.id.clone(), value);
        }
        Ok(inputs)
    }

    /// Resolve a single data input: connected values are pulled from their
    /// producer; unconnected ports fall back to the instance's config
    /// defaults, then the port schema default, then Null.
    async fn resolve_input(
        &self,
        run: &mut RunState,
        node: &NodeInstance,
        port: &PortSchema,
    ) -> Result<Value, ExecutionError> {
        let source: Option<(String, String)> = run
            .blueprint
            .connections_to(&node.id, &port.id)
            .first()
            .map(|c| (c.source_node.clone(), c.source_port.clone()));

        if let Some((source_node, source_port)) = source {
            return self.pull(run, &source_node, &source_port).await;
        }

        if let Some(value) = node.input_default(&port.id) {
            return Ok(value.clone());
        }
        if let Some(value) = &port.default {
            return Ok(value.clone());
        }
        if port.required {
            return Err(ExecutionError::PortSchemaViolation {
                node_id: node.id.clone(),
                message: format!(
                    "required input '{}' is not connected and has no default",
                    port.id
                ),
            });
        }
        Ok(Value::Null)
    }

    /// Pull a value from a producer node's output port.
    ///
    /// Memoized per run: a producer already invoked this run returns its
    /// cached value without recomputation. Re-entering a node that is still
    /// being resolved in the same pull chain is a cyclic data dependency.
    fn pull<'a>(
        &'a self,
        run: &'a mut RunState,
        node_id: &'a str,
        port_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Value, ExecutionError>> + Send + 'a>> {
        Box::pin(async move {
            if let Some(outputs) = run.outputs.get(node_id) {
                return Ok(outputs.get(port_id).cloned().unwrap_or(Value::Null));
            }
            if run.resolving.contains(node_id) {
                return Err(ExecutionError::CyclicDataDependency {
                    node_id: node_id.to_string(),
                });
            }

            let node = run
                .blueprint
                .node(node_id)
                .ok_or_else(|| ExecutionError::NodeNotFound {
                    node_id: node_id.to_string(),
                })?
                .clone();
            let spec = self.registry.spec(&node.type_id).ok_or_else(|| {
                ExecutionError::UnknownNodeType {
                    node_id: node.id.clone(),
                    type_id: node.type_id.clone(),
                }
            })?;
            if spec.iterator {
                return Err(ExecutionError::PortSchemaViolation {
                    node_id: node.id.clone(),
                    message: "iterator node cannot be pulled as a data source before it runs"
                        .to_string(),
                });
            }

            debug!(node_id = %node.id, node_type = %node.type_id, "Pulling data source");

            run.resolving.insert(node_id.to_string());
            let inputs = self.resolve_inputs(run, &node, &spec).await?;
            self.invoke(run, &node, &spec, inputs).await?;
            run.resolving.remove(node_id);

            Ok(run
                .outputs
                .get(node_id)
                .and_then(|o| o.get(port_id))
                .cloned()
                .unwrap_or(Value::Null))
        })
    }

    /// Invoke a node's compute callable, validate its output bindings
    /// against the declared ports, cache them, and record the trace entry.
    async fn invoke(
        &self,
        run: &mut RunState,
        node: &NodeInstance,
        spec: &NodeTypeSpec,
        inputs: HashMap<String, Value>,
    ) -> Result<ComputeOutput, ExecutionError> {
        let compute = self.registry.compute(&node.type_id).ok_or_else(|| {
            ExecutionError::UnknownNodeType {
                node_id: node.id.clone(),
                type_id: node.type_id.clone(),
            }
        })?;

        let mut ctx = ComputeContext::new(
            node.id.clone(),
            node.config.clone(),
            inputs,
            &mut run.variables,
        );
        let result = compute.compute(&mut ctx).await;
        drop(ctx);

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(node_id = %node.id, error = %err, "Node compute failed");
                run.push_trace(TraceEntry {
                    node_id: node.id.clone(),
                    outputs: HashMap::new(),
                    error: Some(err.to_string()),
                });
                return Err(ExecutionError::ComputeFailure {
                    node_id: node.id.clone(),
                    message: err.to_string(),
                });
            }
        };

        match &outcome {
            ComputeOutput::Values(values) => {
                for key in values.keys() {
                    if !spec.declares_output(key) {
                        return Err(ExecutionError::PortSchemaViolation {
                            node_id: node.id.clone(),
                            message: format!("compute returned undeclared output '{}'", key),
                        });
                    }
                }
                run.cache_outputs(&node.id, values.clone());
                run.push_trace(TraceEntry {
                    node_id: node.id.clone(),
                    outputs: values.clone(),
                    error: None,
                });
            }
            ComputeOutput::Iterations(_) => {
                if !spec.iterator {
                    return Err(ExecutionError::PortSchemaViolation {
                        node_id: node.id.clone(),
                        message: "node type is not an iterator but returned an iteration plan"
                            .to_string(),
                    });
                }
                // Mark the node as invoked; per-iteration bindings land
                // in the cache while the plan is driven
                run.outputs.entry(node.id.clone()).or_default();
                run.push_trace(TraceEntry {
                    node_id: node.id.clone(),
                    outputs: HashMap::new(),
                    error: None,
                });
            }
        }

        Ok(outcome)
    }
}

/// Flow activation truthiness: false, Null, 0 and "" are falsy;
/// everything else (including empty arrays/objects) is truthy.
pub(crate) fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}
