// Error Types - Execution and validation error taxonomy
//
// Runtime-class errors abort a run and are surfaced through the
// ExecutionReport; they never crash the host. Validation-class findings
// are detectable before any run via `validate`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that abort a running blueprint execution
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecutionError {
    /// A node instance references a type id absent from the registry
    #[error("Unknown node type '{type_id}' for node '{node_id}'")]
    UnknownNodeType { node_id: String, type_id: String },

    /// A node id (trigger or connection endpoint) is missing from the blueprint
    #[error("Node '{node_id}' not found in blueprint")]
    NodeNotFound { node_id: String },

    /// A connection or compute result violates the declared port schema
    #[error("Port schema violation at node '{node_id}': {message}")]
    PortSchemaViolation { node_id: String, message: String },

    /// A data-port pull chain revisited a node already being resolved
    #[error("Cyclic data dependency detected at node '{node_id}'")]
    CyclicDataDependency { node_id: String },

    /// The activation-count ceiling was reached (flow cycle protection)
    #[error("Maximum activation count exceeded (limit {limit})")]
    MaxDepthExceeded { limit: usize },

    /// An unexpected error escaped a node's compute callable
    #[error("Compute failed at node '{node_id}': {message}")]
    ComputeFailure { node_id: String, message: String },

    /// The host cancelled the run between node activations
    #[error("Run cancelled by host")]
    Cancelled,
}

/// Load-time validation findings for a blueprint against a registry.
///
/// `validate` collects every finding rather than stopping at the first,
/// so the editor can flag the whole graph at once.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationError {
    /// A node instance references a type id absent from the registry
    #[error("Node '{node_id}' has unknown type '{type_id}'")]
    UnknownNodeType { node_id: String, type_id: String },

    /// Two node instances share the same id
    #[error("Duplicate node id '{node_id}'")]
    DuplicateNodeId { node_id: String },

    /// A connection references a node id missing from the blueprint
    #[error("Connection '{connection_id}' references unknown node '{node_id}'")]
    UnknownNode {
        connection_id: String,
        node_id: String,
    },

    /// A connection references a port id missing from the node's type
    #[error("Connection '{connection_id}' references unknown port '{node_id}.{port_id}'")]
    UnknownPort {
        connection_id: String,
        node_id: String,
        port_id: String,
    },

    /// A connection links a Flow port to a Data port or vice versa
    #[error("Connection '{connection_id}' links mismatched port kinds ({source_kind:?} -> {target_kind:?})")]
    PortKindMismatch {
        connection_id: String,
        source_kind: glyph_types::PortKind,
        target_kind: glyph_types::PortKind,
    },

    /// A connection links data ports with incompatible value types
    #[error("Connection '{connection_id}' links incompatible value types ({source_type:?} -> {target_type:?})")]
    IncompatibleValueTypes {
        connection_id: String,
        source_type: glyph_types::ValueType,
        target_type: glyph_types::ValueType,
    },

    /// A data input has more than one incoming connection
    #[error("Data input '{node_id}.{port_id}' has multiple producers")]
    MultipleProducers { node_id: String, port_id: String },

    /// A required data input is neither connected nor defaulted
    #[error("Required input '{node_id}.{port_id}' is not connected and has no default")]
    UnconnectedRequiredInput { node_id: String, port_id: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_error_display() {
        let err = ExecutionError::UnknownNodeType {
            node_id: "n1".to_string(),
            type_id: "glyph/Missing".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Unknown node type 'glyph/Missing' for node 'n1'"
        );

        let err = ExecutionError::MaxDepthExceeded { limit: 10_000 };
        assert!(err.to_string().contains("10000"));
    }

    #[test]
    fn test_execution_error_serialization() {
        let err = ExecutionError::CyclicDataDependency {
            node_id: "loop_a".to_string(),
        };
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "cyclic_data_dependency");
        let back: ExecutionError = serde_json::from_value(json).unwrap();
        assert_eq!(back, err);
    }
}
