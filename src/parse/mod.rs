//! Parse phase: request JSON → Rust types.

pub mod types;

pub use types::*;

use crate::error::AnalyzeError;

/// Deserialize an analysis request JSON string.
pub fn parse(json: &str) -> Result<WorkflowRequest, AnalyzeError> {
    serde_json::from_str::<WorkflowRequest>(json).map_err(|e| AnalyzeError::InvalidJson(e.to_string()))
}

/// Deserialize a bare step list, as sent by the editor after a structural edit.
pub fn parse_steps(json: &str) -> Result<Vec<Step>, AnalyzeError> {
    serde_json::from_str::<Vec<Step>>(json).map_err(|e| AnalyzeError::InvalidJson(e.to_string()))
}

/// Deserialize a single step, as sent by the editor after a content edit.
pub fn parse_step(json: &str) -> Result<Step, AnalyzeError> {
    serde_json::from_str::<Step>(json).map_err(|e| AnalyzeError::InvalidJson(e.to_string()))
}
