//! Structural validation phase.
//!
//! Validates step names and control-flow nesting before scope resolution.

pub mod naming;
pub mod nesting;

use crate::config::AnalyzerConfig;
use crate::error::StructuralError;
use crate::parse::types::Step;

pub use nesting::{BlockSpan, NestingReport};

/// Validate the whole step list (names + nesting). The returned report's
/// errors include the naming errors, ordered by step.
pub fn validate_structure(steps: &[Step], config: &AnalyzerConfig) -> NestingReport {
    let mut report = nesting::validate_nesting(steps);
    let mut errors: Vec<StructuralError> = naming::validate_names(steps, config);
    errors.append(&mut report.errors);
    errors.sort_by_key(|e| e.step_order);
    report.errors = errors;
    report
}

/// True when the report carries a `NonDenseOrder` error; nothing keyed by
/// order can be trusted after one.
pub fn has_order_violation(report: &NestingReport) -> bool {
    report
        .errors
        .iter()
        .any(|e| e.code == crate::error::StructuralErrorKind::NonDenseOrder)
}
