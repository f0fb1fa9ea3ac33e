//! Glyph Types - Core type definitions for the Blueprint visual programming system
//!
//! This crate contains the pure data structures shared between the editor
//! and the execution engine: port schemas, node type specs, node instances,
//! connections, and the blueprint graph itself. It carries no runtime
//! behaviour; the engine lives in `glyph_runtime`.

mod types;

pub use types::*;
