//! Incremental analysis for a live editor.
//!
//! The session owns the step arena and a generation counter. Structural
//! mutations (add/remove/move/retype, anything that changes what a step
//! defines) recompute nesting and scopes; content mutations re-check only
//! the edited step's references. Every mutation bumps the generation, and
//! results carry the generation they were computed at so callers can drop
//! stale ones.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use crate::analysis::{self, StructuralAnalysis, WorkflowReport};
use crate::config::AnalyzerConfig;
use crate::error::AnalyzeError;
use crate::parse::{self, Step, StepKind, WorkflowRequest};
use crate::reference::functions::FunctionRegistry;
use crate::reference::{analyze_text, Finding, TextReport};
use crate::scope::catalog::StaticPromptCatalog;

/// Result of a single-step edit.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepUpdate {
    pub generation: u64,
    pub order: u32,
    /// The edit changed structure; fetch the full report again.
    pub structural: bool,
    pub findings: Vec<Finding>,
}

pub struct AnalysisSession {
    steps: Vec<Step>,
    input_parameters: Vec<String>,
    catalog: StaticPromptCatalog,
    config: AnalyzerConfig,
    functions: FunctionRegistry,
    generation: u64,
    structure: StructuralAnalysis,
    findings: BTreeMap<u32, Vec<Finding>>,
}

impl AnalysisSession {
    pub fn new(request: WorkflowRequest) -> Self {
        let functions = request.options.function_registry();
        let mut session = AnalysisSession {
            steps: request.steps,
            input_parameters: request.input_parameters,
            catalog: StaticPromptCatalog::new(request.prompts),
            config: request.options,
            functions,
            generation: 0,
            structure: StructuralAnalysis::default(),
            findings: BTreeMap::new(),
        };
        session.recompute();
        session
    }

    pub fn from_json(json: &str) -> Result<Self, AnalyzeError> {
        Ok(Self::new(parse::parse(json)?))
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_current(&self, generation: u64) -> bool {
        generation == self.generation
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn report(&self) -> WorkflowReport {
        let findings = self.findings.values().flatten().cloned().collect();
        analysis::assemble(&self.structure, findings)
    }

    /// Check draft text as if it sat in the step at `order`, with the
    /// session's scopes and function registry. Nothing is stored.
    pub fn check_text(&self, text: &str, order: u32) -> TextReport {
        let scope = self.structure.scopes.step_scope(order);
        analyze_text(text, &scope, &self.functions)
    }

    /// Structural mutation: the editor sends the whole new step list.
    pub fn replace_steps(&mut self, steps: Vec<Step>) -> u64 {
        self.steps = steps;
        self.recompute();
        self.generation
    }

    pub fn set_input_parameters(&mut self, input_parameters: Vec<String>) -> u64 {
        self.input_parameters = input_parameters;
        self.recompute();
        self.generation
    }

    /// Replace the step with the same order. Falls back to a structural
    /// recompute when the edit changes what the step defines.
    pub fn edit_step(&mut self, step: Step) -> Result<StepUpdate, AnalyzeError> {
        let order = step.order;
        let index = self
            .steps
            .iter()
            .position(|s| s.order == order)
            .ok_or(AnalyzeError::UnknownStep(order))?;

        let structural = !same_shape(&self.steps[index], &step);
        self.steps[index] = step;

        if structural {
            self.recompute();
        } else {
            self.generation += 1;
            self.recheck(index);
        }
        debug!(order, structural, generation = self.generation, "step edited");

        Ok(StepUpdate {
            generation: self.generation,
            order,
            structural,
            findings: self.findings.get(&order).cloned().unwrap_or_default(),
        })
    }

    fn recompute(&mut self) {
        self.generation += 1;
        self.structure = analysis::analyze_structure(
            &self.steps,
            &self.input_parameters,
            &self.catalog,
            &self.config,
        );
        self.findings.clear();
        for index in 0..self.steps.len() {
            self.recheck(index);
        }
        debug!(
            generation = self.generation,
            steps = self.steps.len(),
            "session recomputed"
        );
    }

    fn recheck(&mut self, index: usize) {
        let step = &self.steps[index];
        if !self.config.check_references || !self.structure.ordered {
            self.findings.remove(&step.order);
            return;
        }
        let findings = analysis::check_step(step, &self.structure.scopes, &self.functions);
        if findings.is_empty() {
            self.findings.remove(&step.order);
        } else {
            self.findings.insert(step.order, findings);
        }
    }
}

/// Whether `new` can replace `old` without touching nesting or scopes.
fn same_shape(old: &Step, new: &Step) -> bool {
    if old.step_type() != new.step_type() || old.name != new.name {
        return false;
    }
    if old.defined_variables() != new.defined_variables() {
        return false;
    }
    match (&old.kind, &new.kind) {
        (StepKind::Prompt(a), StepKind::Prompt(b)) => {
            a.prompt_ref == b.prompt_ref && a.project_ref == b.project_ref
        }
        _ => true,
    }
}
