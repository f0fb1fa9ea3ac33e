// Execution Report - Recorded trace and outcome of one run
//
// Returned to the host/UI after every run for display and debugging.
// A live per-invocation stream is available through RunOptions for hosts
// that want node-by-node visualization.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ExecutionError;

/// Overall outcome of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// The activation chain ran to completion
    Completed,
    /// The run stopped early (error or host cancellation)
    Aborted,
}

/// One recorded compute invocation (flow activation or data pull)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEntry {
    /// Node instance id
    pub node_id: String,
    /// Outputs the invocation produced (port id -> value)
    pub outputs: HashMap<String, Value>,
    /// Error message if the invocation failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The full record of one execution run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionReport {
    /// Blueprint the run executed
    pub blueprint_id: String,
    /// Completed or Aborted
    pub status: RunStatus,
    /// Compute invocations in order
    pub trace: Vec<TraceEntry>,
    /// The terminating error if the run aborted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ExecutionError>,
}

impl ExecutionReport {
    /// Check if the run completed without error
    pub fn succeeded(&self) -> bool {
        self.status == RunStatus::Completed
    }

    /// Ordered node ids of every recorded invocation
    pub fn activation_order(&self) -> Vec<&str> {
        self.trace.iter().map(|e| e.node_id.as_str()).collect()
    }

    /// The last recorded outputs of a node, if it was invoked
    pub fn outputs_of(&self, node_id: &str) -> Option<&HashMap<String, Value>> {
        self.trace
            .iter()
            .rev()
            .find(|e| e.node_id == node_id)
            .map(|e| &e.outputs)
    }
}
