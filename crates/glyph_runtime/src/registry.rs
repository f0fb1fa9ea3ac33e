// Node Type Registry - Maps node type ids to specs and compute callables
//
// The registry holds all available node types (built-in and plugin-hosted).
// Registration is last-writer-wins by design so a plugin can patch a
// built-in node type; no error is raised on overwrite.

use std::sync::Arc;

use dashmap::DashMap;
use glyph_types::NodeTypeSpec;

use crate::builtins;
use crate::compute::{ComputeContext, ComputeError, ComputeOutput, FnCompute, NodeCompute};

/// Entry in the node registry
struct NodeEntry {
    spec: Arc<NodeTypeSpec>,
    compute: Arc<dyn NodeCompute>,
}

/// Registry of all available node types.
///
/// Backed by a concurrent map so a plugin host may register new node kinds
/// while executions are in flight.
pub struct NodeRegistry {
    nodes: DashMap<String, NodeEntry>,
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            nodes: DashMap::new(),
        }
    }

    /// Create a registry with the built-in node kinds registered
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        builtins::register_builtins(&registry);
        registry
    }

    /// Register a node type with its compute callable.
    /// Overwrites any existing entry with the same id.
    pub fn register(&self, spec: NodeTypeSpec, compute: Arc<dyn NodeCompute>) {
        let id = spec.id.clone();
        self.nodes.insert(
            id,
            NodeEntry {
                spec: Arc::new(spec),
                compute,
            },
        );
    }

    /// Register a node type with a sync function compute
    pub fn register_fn<F>(&self, spec: NodeTypeSpec, func: F)
    where
        F: Fn(&mut ComputeContext<'_>) -> Result<ComputeOutput, ComputeError>
            + Send
            + Sync
            + 'static,
    {
        self.register(spec, Arc::new(FnCompute::new(func)));
    }

    /// Get a node type spec by id
    pub fn spec(&self, id: &str) -> Option<Arc<NodeTypeSpec>> {
        self.nodes.get(id).map(|e| Arc::clone(&e.spec))
    }

    /// Get a node compute callable by id
    pub fn compute(&self, id: &str) -> Option<Arc<dyn NodeCompute>> {
        self.nodes.get(id).map(|e| Arc::clone(&e.compute))
    }

    /// Check if a node type is registered
    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Number of registered node types
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All registered type ids
    pub fn type_ids(&self) -> Vec<String> {
        self.nodes.iter().map(|e| e.key().clone()).collect()
    }

    /// All registered specs
    pub fn specs(&self) -> Vec<Arc<NodeTypeSpec>> {
        self.nodes.iter().map(|e| Arc::clone(&e.spec)).collect()
    }

    /// Specs in a category. Derived on each call, never cached.
    pub fn specs_in_category(&self, category: &str) -> Vec<Arc<NodeTypeSpec>> {
        self.nodes
            .iter()
            .filter(|e| e.spec.category == category)
            .map(|e| Arc::clone(&e.spec))
            .collect()
    }

    /// All categories, sorted and deduplicated. Derived on each call.
    pub fn categories(&self) -> Vec<String> {
        let mut cats: Vec<_> = self.nodes.iter().map(|e| e.spec.category.clone()).collect();
        cats.sort();
        cats.dedup();
        cats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glyph_types::{PortSchema, ValueType};
    use serde_json::Value;

    fn number_spec(id: &str, category: &str) -> NodeTypeSpec {
        NodeTypeSpec::new(id, id, category)
            .input(PortSchema::data("a", ValueType::Number))
            .output(PortSchema::data("result", ValueType::Number))
    }

    #[test]
    fn test_empty_registry() {
        let registry = NodeRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
        assert!(registry.spec("glyph/Add").is_none());
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = NodeRegistry::new();
        registry.register_fn(number_spec("test/Double", "Test"), |ctx| {
            let a = ctx.input_number("a").unwrap_or(0.0);
            Ok(ComputeOutput::value("result", Value::from(a * 2.0)))
        });

        assert!(registry.contains("test/Double"));
        assert_eq!(registry.len(), 1);
        let spec = registry.spec("test/Double").unwrap();
        assert_eq!(spec.category, "Test");
        assert!(registry.compute("test/Double").is_some());
    }

    #[test]
    fn test_overwrite_is_last_writer_wins() {
        let registry = NodeRegistry::new();

        registry.register_fn(
            NodeTypeSpec::new("test/Node", "First", "Test"),
            |_ctx| Ok(ComputeOutput::empty()),
        );
        registry.register_fn(
            NodeTypeSpec::new("test/Node", "Second", "Test"),
            |_ctx| Ok(ComputeOutput::empty()),
        );

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.spec("test/Node").unwrap().display_name, "Second");
    }

    #[test]
    fn test_categories_are_derived() {
        let registry = NodeRegistry::new();
        registry.register_fn(number_spec("math/Add", "Math"), |_ctx| {
            Ok(ComputeOutput::empty())
        });
        registry.register_fn(number_spec("math/Subtract", "Math"), |_ctx| {
            Ok(ComputeOutput::empty())
        });
        registry.register_fn(number_spec("logic/And", "Logic"), |_ctx| {
            Ok(ComputeOutput::empty())
        });

        let categories = registry.categories();
        assert_eq!(categories, vec!["Logic".to_string(), "Math".to_string()]);
        assert_eq!(registry.specs_in_category("Math").len(), 2);
        assert_eq!(registry.specs_in_category("Missing").len(), 0);
    }

    #[test]
    fn test_with_builtins() {
        let registry = NodeRegistry::with_builtins();
        assert!(registry.contains("glyph/Branch"));
        assert!(registry.contains("glyph/Add"));
        assert!(registry.contains("glyph/ForEach"));
        assert!(registry.categories().contains(&"Flow Control".to_string()));
    }
}
