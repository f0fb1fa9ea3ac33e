//! Glyph Runtime - Execution engine for Blueprint visual programs
//!
//! This crate contains the node type registry, the per-run variable
//! context, blueprint validation, and the graph interpreter that drives a
//! blueprint from an event trigger to completion.

pub use glyph_types;

mod builtins;
mod compute;
mod engine;
mod error;
mod registry;
mod report;
mod validation;
mod variables;

pub use builtins::register_builtins;
pub use compute::*;
pub use engine::*;
pub use error::*;
pub use registry::*;
pub use report::*;
pub use validation::*;
pub use variables::*;
