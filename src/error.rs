//! Error and diagnostic types shared by every analysis phase.
//!
//! Problems in the workflow itself are values (`StructuralError`), never
//! `Err`s. `AnalyzeError` is reserved for input that does not have the shape
//! of an analysis request at all.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Save-blocking problems with the shape of the step list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StructuralErrorKind {
    UnmatchedCloser,
    MismatchedCloser,
    UnterminatedBlock,
    IllegalElse,
    IllegalBreakContinue,
    DuplicateStepName,
    InvalidStepName,
    ReservedStepName,
    NonDenseOrder,
}

impl StructuralErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StructuralErrorKind::UnmatchedCloser => "UnmatchedCloser",
            StructuralErrorKind::MismatchedCloser => "MismatchedCloser",
            StructuralErrorKind::UnterminatedBlock => "UnterminatedBlock",
            StructuralErrorKind::IllegalElse => "IllegalElse",
            StructuralErrorKind::IllegalBreakContinue => "IllegalBreakContinue",
            StructuralErrorKind::DuplicateStepName => "DuplicateStepName",
            StructuralErrorKind::InvalidStepName => "InvalidStepName",
            StructuralErrorKind::ReservedStepName => "ReservedStepName",
            StructuralErrorKind::NonDenseOrder => "NonDenseOrder",
        }
    }
}

impl std::fmt::Display for StructuralErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuralError {
    pub code: StructuralErrorKind,
    /// The step header the editor shows this error on.
    pub step_order: u32,
    /// Every step involved, when more than one is (duplicate names).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub related_orders: Vec<u32>,
    pub message: String,
}

impl StructuralError {
    pub fn new(code: StructuralErrorKind, step_order: u32, message: impl Into<String>) -> Self {
        StructuralError {
            code,
            step_order,
            related_orders: vec![],
            message: message.into(),
        }
    }

    pub fn with_related(mut self, orders: Vec<u32>) -> Self {
        self.related_orders = orders;
        self
    }
}

impl std::fmt::Display for StructuralError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {} (at step {})", self.code, self.message, self.step_order)
    }
}

impl std::error::Error for StructuralError {}

/// Malformed call shape: the input is not an analysis request.
#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error("Failed to parse workflow JSON: {0}")]
    InvalidJson(String),

    #[error("Step {order} ({step_type}) has a malformed config: {reason}")]
    InvalidStep {
        order: u32,
        step_type: &'static str,
        reason: String,
    },

    #[error("Failed to parse analyzer config: {0}")]
    InvalidConfig(String),

    #[error("Step {0} is not part of the workflow")]
    UnknownStep(u32),
}

impl AnalyzeError {
    pub fn code(&self) -> &'static str {
        match self {
            AnalyzeError::InvalidJson(_) => "P001",
            AnalyzeError::InvalidStep { .. } => "P002",
            AnalyzeError::InvalidConfig(_) => "P003",
            AnalyzeError::UnknownStep(_) => "P004",
        }
    }
}
