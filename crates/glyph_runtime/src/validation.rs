// Blueprint Validation - Load-time checks against a node registry
//
// Catches validation-class errors (unknown types, port schema violations)
// before any run starts so the editor can flag the graph. Returns every
// finding, not just the first.

use std::collections::HashSet;

use glyph_types::{Blueprint, Connection, PortKind};

use crate::error::ValidationError;
use crate::registry::NodeRegistry;

/// Validate a blueprint against a registry, collecting all findings.
/// An empty result means the blueprint is safe to run.
pub fn validate(blueprint: &Blueprint, registry: &NodeRegistry) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    check_node_ids(blueprint, registry, &mut errors);
    for connection in &blueprint.connections {
        check_connection(blueprint, registry, connection, &mut errors);
    }
    check_data_input_producers(blueprint, registry, &mut errors);
    check_required_inputs(blueprint, registry, &mut errors);

    errors
}

/// Convenience wrapper for hosts that only need a pass/fail answer
pub fn is_valid(blueprint: &Blueprint, registry: &NodeRegistry) -> bool {
    validate(blueprint, registry).is_empty()
}

fn check_node_ids(blueprint: &Blueprint, registry: &NodeRegistry, errors: &mut Vec<ValidationError>) {
    let mut seen = HashSet::new();
    for node in &blueprint.nodes {
        if !seen.insert(node.id.as_str()) {
            errors.push(ValidationError::DuplicateNodeId {
                node_id: node.id.clone(),
            });
        }
        if !registry.contains(&node.type_id) {
            errors.push(ValidationError::UnknownNodeType {
                node_id: node.id.clone(),
                type_id: node.type_id.clone(),
            });
        }
    }
}

fn check_connection(
    blueprint: &Blueprint,
    registry: &NodeRegistry,
    connection: &Connection,
    errors: &mut Vec<ValidationError>,
) {
    let source_node = blueprint.node(&connection.source_node);
    let target_node = blueprint.node(&connection.target_node);

    if source_node.is_none() {
        errors.push(ValidationError::UnknownNode {
            connection_id: connection.id.clone(),
            node_id: connection.source_node.clone(),
        });
    }
    if target_node.is_none() {
        errors.push(ValidationError::UnknownNode {
            connection_id: connection.id.clone(),
            node_id: connection.target_node.clone(),
        });
    }
    let (Some(source_node), Some(target_node)) = (source_node, target_node) else {
        return;
    };

    // Port-level checks need both specs; unknown types are reported separately
    let (Some(source_spec), Some(target_spec)) = (
        registry.spec(&source_node.type_id),
        registry.spec(&target_node.type_id),
    ) else {
        return;
    };

    let source_port = source_spec.output_port(&connection.source_port);
    if source_port.is_none() {
        errors.push(ValidationError::UnknownPort {
            connection_id: connection.id.clone(),
            node_id: connection.source_node.clone(),
            port_id: connection.source_port.clone(),
        });
    }
    let target_port = target_spec.input_port(&connection.target_port);
    if target_port.is_none() {
        errors.push(ValidationError::UnknownPort {
            connection_id: connection.id.clone(),
            node_id: connection.target_node.clone(),
            port_id: connection.target_port.clone(),
        });
    }
    let (Some(source_port), Some(target_port)) = (source_port, target_port) else {
        return;
    };

    if source_port.kind != target_port.kind {
        errors.push(ValidationError::PortKindMismatch {
            connection_id: connection.id.clone(),
            source_kind: source_port.kind,
            target_kind: target_port.kind,
        });
        return;
    }

    if source_port.kind == PortKind::Data {
        let source_type = source_port.value_type_or_any();
        let target_type = target_port.value_type_or_any();
        if !source_type.is_compatible_with(&target_type) {
            errors.push(ValidationError::IncompatibleValueTypes {
                connection_id: connection.id.clone(),
                source_type,
                target_type,
            });
        }
    }
}

/// A data input may have at most one producer; flow inputs may have many
fn check_data_input_producers(
    blueprint: &Blueprint,
    registry: &NodeRegistry,
    errors: &mut Vec<ValidationError>,
) {
    for node in &blueprint.nodes {
        let Some(spec) = registry.spec(&node.type_id) else {
            continue;
        };
        for port in spec.data_inputs() {
            if blueprint.connections_to(&node.id, &port.id).len() > 1 {
                errors.push(ValidationError::MultipleProducers {
                    node_id: node.id.clone(),
                    port_id: port.id.clone(),
                });
            }
        }
    }
}

fn check_required_inputs(
    blueprint: &Blueprint,
    registry: &NodeRegistry,
    errors: &mut Vec<ValidationError>,
) {
    for node in &blueprint.nodes {
        let Some(spec) = registry.spec(&node.type_id) else {
            continue;
        };
        for port in spec.data_inputs() {
            if !port.required || port.default.is_some() {
                continue;
            }
            let connected = !blueprint.connections_to(&node.id, &port.id).is_empty();
            let defaulted = node.input_default(&port.id).is_some();
            if !connected && !defaulted {
                errors.push(ValidationError::UnconnectedRequiredInput {
                    node_id: node.id.clone(),
                    port_id: port.id.clone(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::ComputeOutput;
    use glyph_types::{NodeInstance, NodeTypeSpec, PortSchema, ValueType};

    fn test_registry() -> NodeRegistry {
        let registry = NodeRegistry::new();
        registry.register_fn(
            NodeTypeSpec::new("test/Source", "Source", "Test")
                .output(PortSchema::flow("flow"))
                .output(PortSchema::data("value", ValueType::Number)),
            |_ctx| Ok(ComputeOutput::empty()),
        );
        registry.register_fn(
            NodeTypeSpec::new("test/Sink", "Sink", "Test")
                .input(PortSchema::flow_in())
                .input(PortSchema::data("value", ValueType::Number))
                .input(PortSchema::data("label", ValueType::String).required()),
            |_ctx| Ok(ComputeOutput::empty()),
        );
        registry
    }

    fn connected_blueprint() -> Blueprint {
        Blueprint::new("bp", "Test")
            .add_node(NodeInstance::new("src", "test/Source"))
            .add_node(NodeInstance::with_config(
                "sink",
                "test/Sink",
                serde_json::json!({"defaults": {"label": "ok"}}),
            ))
            .connect("src", "flow", "sink", "flow")
            .connect("src", "value", "sink", "value")
    }

    #[test]
    fn test_valid_blueprint_has_no_findings() {
        let registry = test_registry();
        let bp = connected_blueprint();
        assert!(is_valid(&bp, &registry), "{:?}", validate(&bp, &registry));
    }

    #[test]
    fn test_unknown_node_type() {
        let registry = test_registry();
        let bp = Blueprint::new("bp", "Test").add_node(NodeInstance::new("x", "test/Missing"));
        let errors = validate(&bp, &registry);
        assert!(matches!(
            errors.as_slice(),
            [ValidationError::UnknownNodeType { node_id, .. }] if node_id == "x"
        ));
    }

    #[test]
    fn test_duplicate_node_id() {
        let registry = test_registry();
        let bp = Blueprint::new("bp", "Test")
            .add_node(NodeInstance::new("x", "test/Source"))
            .add_node(NodeInstance::new("x", "test/Source"));
        let errors = validate(&bp, &registry);
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::DuplicateNodeId { node_id } if node_id == "x")));
    }

    #[test]
    fn test_flow_to_data_kind_mismatch() {
        let registry = test_registry();
        let bp = Blueprint::new("bp", "Test")
            .add_node(NodeInstance::new("src", "test/Source"))
            .add_node(NodeInstance::with_config(
                "sink",
                "test/Sink",
                serde_json::json!({"defaults": {"label": "ok"}}),
            ))
            .connect("src", "flow", "sink", "value");
        let errors = validate(&bp, &registry);
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::PortKindMismatch { .. })));
    }

    #[test]
    fn test_incompatible_value_types() {
        let registry = test_registry();
        let bp = Blueprint::new("bp", "Test")
            .add_node(NodeInstance::new("src", "test/Source"))
            .add_node(NodeInstance::with_config(
                "sink",
                "test/Sink",
                serde_json::json!({"defaults": {"label": "ok"}}),
            ))
            // Number output into the String-typed "label" input
            .connect("src", "value", "sink", "label");
        let errors = validate(&bp, &registry);
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::IncompatibleValueTypes { .. })));
    }

    #[test]
    fn test_multiple_data_producers() {
        let registry = test_registry();
        let bp = Blueprint::new("bp", "Test")
            .add_node(NodeInstance::new("a", "test/Source"))
            .add_node(NodeInstance::new("b", "test/Source"))
            .add_node(NodeInstance::with_config(
                "sink",
                "test/Sink",
                serde_json::json!({"defaults": {"label": "ok"}}),
            ))
            .connect("a", "value", "sink", "value")
            .connect("b", "value", "sink", "value");
        let errors = validate(&bp, &registry);
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::MultipleProducers { port_id, .. } if port_id == "value")));
    }

    #[test]
    fn test_multiple_flow_producers_allowed() {
        let registry = test_registry();
        let bp = Blueprint::new("bp", "Test")
            .add_node(NodeInstance::new("a", "test/Source"))
            .add_node(NodeInstance::new("b", "test/Source"))
            .add_node(NodeInstance::with_config(
                "sink",
                "test/Sink",
                serde_json::json!({"defaults": {"label": "ok"}}),
            ))
            .connect("a", "flow", "sink", "flow")
            .connect("b", "flow", "sink", "flow");
        assert!(is_valid(&bp, &registry));
    }

    #[test]
    fn test_unconnected_required_input() {
        let registry = test_registry();
        let bp = Blueprint::new("bp", "Test").add_node(NodeInstance::new("sink", "test/Sink"));
        let errors = validate(&bp, &registry);
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::UnconnectedRequiredInput { port_id, .. } if port_id == "label")));
    }

    #[test]
    fn test_unknown_port() {
        let registry = test_registry();
        let bp = connected_blueprint().connect("src", "nope", "sink", "flow");
        let errors = validate(&bp, &registry);
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::UnknownPort { port_id, .. } if port_id == "nope")));
    }
}
