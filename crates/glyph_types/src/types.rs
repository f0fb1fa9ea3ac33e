// Blueprint Types - Core data structures for the visual programming system
//
// These types define the structure of blueprints, node types, ports, and
// connections. Blueprints are authored by the visual editor, exchanged as
// JSON, and handed to the execution engine per run.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─────────────────────────────────────────────────────────────────────────────
// Iterator Protocol Ports
// ─────────────────────────────────────────────────────────────────────────────

/// Flow output fired once per iteration of an iterator node (Loop, ForEach)
pub const LOOP_PORT: &str = "loop";
/// Flow output fired once after all iterations of an iterator node finish
pub const COMPLETE_PORT: &str = "complete";

// ─────────────────────────────────────────────────────────────────────────────
// Port Types
// ─────────────────────────────────────────────────────────────────────────────

/// Kind of a port: control flow or data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortKind {
    /// Control flow (no payload - a truthy activation is the only signal)
    Flow,
    /// Data value (resolved on demand, pull semantics)
    Data,
}

/// Semantic value types that can travel through Data ports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    String,
    Number,
    Boolean,
    Array,
    Object,
    /// Dynamic type - accepts anything
    Any,
}

impl ValueType {
    /// Check if this type is compatible with another (for connection validation).
    /// Types must be identical, or either side must be `Any`.
    pub fn is_compatible_with(&self, other: &ValueType) -> bool {
        self == other || matches!(self, ValueType::Any) || matches!(other, ValueType::Any)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Port Schemas
// ─────────────────────────────────────────────────────────────────────────────

/// Definition of a single input or output slot on a node type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortSchema {
    /// Port id (unique within the node type, used in connections)
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// Flow or Data
    pub kind: PortKind,
    /// Value type tag, present for Data ports only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<ValueType>,
    /// Whether this input must be connected or defaulted
    #[serde(default)]
    pub required: bool,
    /// Default value used when an input is not connected
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl PortSchema {
    /// Create a flow input port named "flow"
    pub fn flow_in() -> Self {
        Self::flow("flow")
    }

    /// Create a flow port with a custom id
    pub fn flow(id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: id.to_string(),
            kind: PortKind::Flow,
            value_type: None,
            required: false,
            default: None,
            description: None,
        }
    }

    /// Create a data port
    pub fn data(id: &str, value_type: ValueType) -> Self {
        Self {
            id: id.to_string(),
            name: id.to_string(),
            kind: PortKind::Data,
            value_type: Some(value_type),
            required: false,
            default: None,
            description: None,
        }
    }

    /// Create a data port with a default value
    pub fn data_with_default(id: &str, value_type: ValueType, default: serde_json::Value) -> Self {
        Self {
            default: Some(default),
            ..Self::data(id, value_type)
        }
    }

    /// Mark this port as required (builder style)
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Set a human-readable name (builder style)
    pub fn named(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Check if this is a flow port
    pub fn is_flow(&self) -> bool {
        self.kind == PortKind::Flow
    }

    /// Check if this is a data port
    pub fn is_data(&self) -> bool {
        self.kind == PortKind::Data
    }

    /// The value type of this port, treating Flow ports and untagged
    /// Data ports as `Any` for compatibility checks
    pub fn value_type_or_any(&self) -> ValueType {
        self.value_type.unwrap_or(ValueType::Any)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Node Type Specs
// ─────────────────────────────────────────────────────────────────────────────

/// Definition of a node type (registered in the NodeRegistry).
///
/// The compute callable is registered alongside this spec in the runtime's
/// registry; the spec itself stays a pure, serializable description so the
/// editor can render palettes without linking the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeTypeSpec {
    /// Globally unique identifier (e.g. "glyph/Branch" or "my-plugin/CustomNode")
    pub id: String,
    /// Human-readable display name
    pub display_name: String,
    /// Category for palette organization (e.g. "Flow Control", "Math")
    pub category: String,
    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether this node drives the iterator protocol (Loop, ForEach):
    /// its compute returns an iteration plan and the engine fires the
    /// `loop` flow output once per iteration, then `complete` once
    #[serde(default)]
    pub iterator: bool,
    /// Ordered input port schemas
    pub inputs: Vec<PortSchema>,
    /// Ordered output port schemas (flow outputs fire in this order)
    pub outputs: Vec<PortSchema>,
}

impl NodeTypeSpec {
    /// Create a spec with no ports
    pub fn new(id: &str, display_name: &str, category: &str) -> Self {
        Self {
            id: id.to_string(),
            display_name: display_name.to_string(),
            category: category.to_string(),
            description: None,
            iterator: false,
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// Set the description (builder style)
    pub fn describe(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    /// Mark this node type as an iterator (builder style)
    pub fn iterator(mut self) -> Self {
        self.iterator = true;
        self
    }

    /// Add an input port (builder style)
    pub fn input(mut self, port: PortSchema) -> Self {
        self.inputs.push(port);
        self
    }

    /// Add an output port (builder style)
    pub fn output(mut self, port: PortSchema) -> Self {
        self.outputs.push(port);
        self
    }

    /// Get all data input ports, in declared order
    pub fn data_inputs(&self) -> impl Iterator<Item = &PortSchema> {
        self.inputs.iter().filter(|p| p.is_data())
    }

    /// Get all flow input ports
    pub fn flow_inputs(&self) -> impl Iterator<Item = &PortSchema> {
        self.inputs.iter().filter(|p| p.is_flow())
    }

    /// Get all data output ports
    pub fn data_outputs(&self) -> impl Iterator<Item = &PortSchema> {
        self.outputs.iter().filter(|p| p.is_data())
    }

    /// Get all flow output ports, in declared order
    pub fn flow_outputs(&self) -> impl Iterator<Item = &PortSchema> {
        self.outputs.iter().filter(|p| p.is_flow())
    }

    /// Get an input port by id
    pub fn input_port(&self, id: &str) -> Option<&PortSchema> {
        self.inputs.iter().find(|p| p.id == id)
    }

    /// Get an output port by id
    pub fn output_port(&self, id: &str) -> Option<&PortSchema> {
        self.outputs.iter().find(|p| p.id == id)
    }

    /// Check if a key names a declared output port
    pub fn declares_output(&self, id: &str) -> bool {
        self.output_port(id).is_some()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Blueprint Structure
// ─────────────────────────────────────────────────────────────────────────────

/// A node instance placed within a blueprint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeInstance {
    /// Unique instance id within this blueprint
    pub id: String,
    /// Node type (references NodeTypeSpec.id)
    #[serde(rename = "type")]
    pub type_id: String,
    /// Node-specific configuration, passed to compute untouched.
    /// The "defaults" key, if present, supplies per-instance input defaults.
    #[serde(default)]
    pub config: serde_json::Value,
}

impl NodeInstance {
    /// Create a node instance with no configuration
    pub fn new(id: &str, type_id: &str) -> Self {
        Self {
            id: id.to_string(),
            type_id: type_id.to_string(),
            config: serde_json::Value::Null,
        }
    }

    /// Create a node instance with configuration
    pub fn with_config(id: &str, type_id: &str, config: serde_json::Value) -> Self {
        Self {
            id: id.to_string(),
            type_id: type_id.to_string(),
            config,
        }
    }

    /// Look up a per-instance input default from config.defaults
    pub fn input_default(&self, port_id: &str) -> Option<&serde_json::Value> {
        self.config.get("defaults").and_then(|d| d.get(port_id))
    }
}

/// A typed edge linking one node's output port to another node's input port
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
    /// Unique connection id
    pub id: String,
    /// Source node instance id
    pub source_node: String,
    /// Source output port id
    pub source_port: String,
    /// Target node instance id
    pub target_node: String,
    /// Target input port id
    pub target_port: String,
}

impl Connection {
    /// Create a connection with a generated id
    pub fn new(source_node: &str, source_port: &str, target_node: &str, target_port: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            source_node: source_node.to_string(),
            source_port: source_port.to_string(),
            target_node: target_node.to_string(),
            target_port: target_port.to_string(),
        }
    }
}

/// Complete blueprint graph: node instances plus connections.
///
/// A blueprint is a pure data value. The engine never mutates it; all
/// per-run state (output caches, variables) lives with the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Blueprint {
    /// Unique identifier
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// Description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Nodes in this blueprint
    #[serde(default)]
    pub nodes: Vec<NodeInstance>,
    /// Connections between node ports
    #[serde(default)]
    pub connections: Vec<Connection>,
}

impl Blueprint {
    /// Create a new empty blueprint
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: None,
            nodes: Vec::new(),
            connections: Vec::new(),
        }
    }

    /// Add a node (builder style)
    pub fn add_node(mut self, node: NodeInstance) -> Self {
        self.nodes.push(node);
        self
    }

    /// Add a connection (builder style)
    pub fn add_connection(mut self, connection: Connection) -> Self {
        self.connections.push(connection);
        self
    }

    /// Connect two ports (builder style, generated connection id)
    pub fn connect(
        self,
        source_node: &str,
        source_port: &str,
        target_node: &str,
        target_port: &str,
    ) -> Self {
        self.add_connection(Connection::new(
            source_node,
            source_port,
            target_node,
            target_port,
        ))
    }

    /// Get a node by id
    pub fn node(&self, id: &str) -> Option<&NodeInstance> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Get all connections leaving a specific node output port
    pub fn connections_from(&self, node_id: &str, port_id: &str) -> Vec<&Connection> {
        self.connections
            .iter()
            .filter(|c| c.source_node == node_id && c.source_port == port_id)
            .collect()
    }

    /// Get all connections arriving at a specific node input port
    pub fn connections_to(&self, node_id: &str, port_id: &str) -> Vec<&Connection> {
        self.connections
            .iter()
            .filter(|c| c.target_node == node_id && c.target_port == port_id)
            .collect()
    }

    /// Build an external-inputs map for tests and hosts
    pub fn external_inputs(
        pairs: impl IntoIterator<Item = (&'static str, serde_json::Value)>,
    ) -> HashMap<String, serde_json::Value> {
        pairs
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_type_compatibility() {
        assert!(ValueType::Number.is_compatible_with(&ValueType::Number));
        assert!(ValueType::Any.is_compatible_with(&ValueType::String));
        assert!(ValueType::Array.is_compatible_with(&ValueType::Any));
        assert!(!ValueType::Boolean.is_compatible_with(&ValueType::String));
        assert!(!ValueType::Number.is_compatible_with(&ValueType::String));
    }

    #[test]
    fn test_port_schema_constructors() {
        let flow = PortSchema::flow_in();
        assert_eq!(flow.id, "flow");
        assert!(flow.is_flow());
        assert!(flow.value_type.is_none());

        let data = PortSchema::data("a", ValueType::Number).required();
        assert!(data.is_data());
        assert!(data.required);
        assert_eq!(data.value_type, Some(ValueType::Number));

        let defaulted =
            PortSchema::data_with_default("b", ValueType::Number, serde_json::json!(1.0));
        assert_eq!(defaulted.default, Some(serde_json::json!(1.0)));
    }

    #[test]
    fn test_node_type_spec_accessors() {
        let spec = NodeTypeSpec::new("glyph/Branch", "Branch", "Flow Control")
            .input(PortSchema::flow_in())
            .input(PortSchema::data("condition", ValueType::Boolean))
            .output(PortSchema::flow("true"))
            .output(PortSchema::flow("false"));

        assert_eq!(spec.data_inputs().count(), 1);
        assert_eq!(spec.flow_inputs().count(), 1);
        assert_eq!(
            spec.flow_outputs().map(|p| p.id.as_str()).collect::<Vec<_>>(),
            vec!["true", "false"]
        );
        assert!(spec.declares_output("true"));
        assert!(!spec.declares_output("maybe"));
    }

    #[test]
    fn test_blueprint_connection_lookup() {
        let bp = Blueprint::new("bp", "Test")
            .add_node(NodeInstance::new("a", "glyph/OnEvent"))
            .add_node(NodeInstance::new("b", "glyph/Log"))
            .connect("a", "flow", "b", "flow")
            .connect("a", "payload", "b", "message");

        assert_eq!(bp.connections_from("a", "flow").len(), 1);
        assert_eq!(bp.connections_to("b", "message").len(), 1);
        assert!(bp.connections_to("b", "missing").is_empty());
        assert!(bp.node("a").is_some());
        assert!(bp.node("z").is_none());
    }

    #[test]
    fn test_node_instance_input_default() {
        let node = NodeInstance::with_config(
            "add",
            "glyph/Add",
            serde_json::json!({"defaults": {"a": 5.0, "b": 3.0}}),
        );
        assert_eq!(node.input_default("a"), Some(&serde_json::json!(5.0)));
        assert_eq!(node.input_default("c"), None);
    }

    #[test]
    fn test_blueprint_json_roundtrip() {
        let json = r#"{
            "id": "test-bp",
            "name": "Test Blueprint",
            "nodes": [
                {"id": "n1", "type": "glyph/Branch", "config": {}}
            ],
            "connections": [
                {
                    "id": "c1",
                    "source_node": "n1",
                    "source_port": "true",
                    "target_node": "n2",
                    "target_port": "flow"
                }
            ]
        }"#;

        let bp: Blueprint = serde_json::from_str(json).unwrap();
        assert_eq!(bp.id, "test-bp");
        assert_eq!(bp.nodes.len(), 1);
        assert_eq!(bp.connections[0].source_port, "true");

        let json2 = serde_json::to_string(&bp).unwrap();
        let bp2: Blueprint = serde_json::from_str(&json2).unwrap();
        assert_eq!(bp.id, bp2.id);
        assert_eq!(bp2.connections.len(), 1);
    }

    #[test]
    fn test_port_schema_json_shape() {
        let port = PortSchema::data_with_default("count", ValueType::Number, serde_json::json!(0));
        let json = serde_json::to_value(&port).unwrap();
        assert_eq!(json["kind"], "data");
        assert_eq!(json["value_type"], "number");

        let flow = serde_json::to_value(PortSchema::flow("complete")).unwrap();
        assert_eq!(flow["kind"], "flow");
        assert!(flow.get("value_type").is_none());
    }
}
