#![allow(dead_code)]

use std::collections::BTreeMap;

use analyzer::analysis::{analyze, WorkflowReport};
use analyzer::config::AnalyzerConfig;
use analyzer::parse::*;
use analyzer::scope::catalog::NoCatalog;

// =============================================================================
// Step builders
// =============================================================================

/// Number `kinds` 1..N and name them `step1`, `step2`, ...
pub fn workflow(kinds: Vec<StepKind>) -> Vec<Step> {
    kinds
        .into_iter()
        .zip(1u32..)
        .map(|(kind, order)| Step::new(order, format!("step{}", order), kind))
        .collect()
}

pub fn prompt(mapping: &[(&str, &str)]) -> StepKind {
    StepKind::Prompt(PromptConfig {
        prompt_ref: None,
        project_ref: None,
        input_mapping: mapping
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<BTreeMap<_, _>>(),
    })
}

pub fn prompt_ref(id: i64) -> StepKind {
    StepKind::Prompt(PromptConfig {
        prompt_ref: Some(EntityRef::Number(id)),
        ..Default::default()
    })
}

pub fn set(assignments: &[(&str, &str)]) -> StepKind {
    StepKind::Set(SetConfig {
        assignments: assignments
            .iter()
            .map(|(name, expression)| Assignment {
                name: name.to_string(),
                expression: expression.to_string(),
            })
            .collect(),
    })
}

pub fn cond(left: &str, right: &str) -> Condition {
    Condition {
        left: left.into(),
        operator: "==".into(),
        right: right.into(),
    }
}

pub fn if_(left: &str) -> StepKind {
    StepKind::If(cond(left, "yes"))
}

pub fn loop_(left: &str) -> StepKind {
    StepKind::Loop(LoopConfig {
        condition: cond(left, "0"),
        max_iterations: 10,
    })
}

pub fn foreach(source: &str, item: &str) -> StepKind {
    StepKind::Foreach(ForeachConfig {
        source: source.into(),
        item_var: item.into(),
        index_var: None,
    })
}

pub fn output(content: &str) -> StepKind {
    StepKind::Output(OutputConfig {
        content: Some(content.into()),
        ..Default::default()
    })
}

// =============================================================================
// Analysis shortcuts
// =============================================================================

/// Analyze with default options and no prompt metadata.
pub fn analyze_steps(steps: &[Step], inputs: &[&str]) -> WorkflowReport {
    let inputs: Vec<String> = inputs.iter().map(|s| s.to_string()).collect();
    analyze(steps, &inputs, &NoCatalog, &AnalyzerConfig::default())
}

pub fn error_codes(report: &WorkflowReport) -> Vec<&'static str> {
    report.errors.iter().map(|e| e.code.as_str()).collect()
}

pub fn finding_codes(report: &WorkflowReport) -> Vec<&'static str> {
    report.findings.iter().map(|f| f.code.as_str()).collect()
}

pub fn depths(report: &WorkflowReport) -> Vec<usize> {
    report.depths.values().copied().collect()
}
