//! Workflow analysis: nesting validation → scope resolution → reference
//! checking, consolidated into one report for the editor.
//!
//! A pure function of its inputs. Structural errors never stop the later
//! phases; they run on whatever they can interpret so the editor gets the
//! fullest feedback in one pass.

use std::collections::BTreeMap;
use std::fmt::{self, Write as _};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::AnalyzerConfig;
use crate::error::{AnalyzeError, StructuralError};
use crate::parse::{self, Step, WorkflowRequest};
use crate::reference::functions::FunctionRegistry;
use crate::reference::{check_text, Finding};
use crate::scope::catalog::{PromptCatalog, StaticPromptCatalog};
use crate::scope::{resolve_scopes, Binding, ScopeTable};
use crate::validate::{self, NestingReport};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowReport {
    /// Save-blocking problems, ordered by step.
    pub errors: Vec<StructuralError>,
    pub depths: BTreeMap<u32, usize>,
    pub bindings: BTreeMap<u32, Vec<Binding>>,
    /// Advisory reference hints, ordered by step then field.
    pub findings: Vec<Finding>,
}

impl WorkflowReport {
    pub fn is_saveable(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors_at(&self, order: u32) -> impl Iterator<Item = &StructuralError> {
        self.errors.iter().filter(move |e| e.step_order == order)
    }

    pub fn findings_at(&self, order: u32) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(move |f| f.step_order == order)
    }

    /// `vars.total`-style references visible at `order`.
    pub fn visible_references(&self, order: u32) -> Vec<String> {
        self.bindings
            .get(&order)
            .map(|b| b.iter().map(Binding::reference).collect())
            .unwrap_or_default()
    }
}

impl fmt::Display for WorkflowReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errors.is_empty() && self.findings.is_empty() {
            return writeln!(f, "no problems found");
        }
        for error in &self.errors {
            writeln!(f, "error: {}", error)?;
        }
        for finding in &self.findings {
            writeln!(f, "hint: {}", finding)?;
        }
        Ok(())
    }
}

/// The structural half of an analysis: everything that only changes when
/// steps are added, removed, moved or retyped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StructuralAnalysis {
    pub nesting: NestingReport,
    pub scopes: ScopeTable,
    /// False when step orders are not dense; scopes are then empty.
    pub ordered: bool,
}

pub fn analyze_structure(
    steps: &[Step],
    input_parameters: &[String],
    catalog: &dyn PromptCatalog,
    config: &AnalyzerConfig,
) -> StructuralAnalysis {
    let nesting = validate::validate_structure(steps, config);
    let ordered = !validate::has_order_violation(&nesting);
    let scopes = if ordered {
        resolve_scopes(steps, input_parameters, catalog, config)
    } else {
        ScopeTable::default()
    };
    StructuralAnalysis {
        nesting,
        scopes,
        ordered,
    }
}

/// Reference findings for every text field of one step.
pub fn check_step(step: &Step, scopes: &ScopeTable, functions: &FunctionRegistry) -> Vec<Finding> {
    let scope = scopes.step_scope(step.order);
    let mut findings = Vec::new();
    for (field, text) in step.text_fields() {
        findings.extend(
            check_text(text, &scope, functions)
                .into_iter()
                .map(|f| f.with_field(field.as_str())),
        );
    }
    findings
}

/// Combine a structural analysis with reference findings.
pub fn assemble(structure: &StructuralAnalysis, findings: Vec<Finding>) -> WorkflowReport {
    WorkflowReport {
        errors: structure.nesting.errors.clone(),
        depths: structure.nesting.depths.clone(),
        bindings: structure.scopes.bindings_by_order(),
        findings,
    }
}

/// Analyze a step list end to end.
#[tracing::instrument(skip_all, fields(steps = steps.len()))]
pub fn analyze(
    steps: &[Step],
    input_parameters: &[String],
    catalog: &dyn PromptCatalog,
    config: &AnalyzerConfig,
) -> WorkflowReport {
    let structure = analyze_structure(steps, input_parameters, catalog, config);

    let mut findings = Vec::new();
    if config.check_references && structure.ordered {
        let functions = config.function_registry();
        for step in steps {
            findings.extend(check_step(step, &structure.scopes, &functions));
        }
    }

    let report = assemble(&structure, findings);
    debug!(
        errors = report.errors.len(),
        findings = report.findings.len(),
        "workflow analyzed"
    );
    report
}

pub fn analyze_request(request: &WorkflowRequest) -> WorkflowReport {
    let catalog = StaticPromptCatalog::new(request.prompts.clone());
    analyze(
        &request.steps,
        &request.input_parameters,
        &catalog,
        &request.options,
    )
}

/// Parse a request JSON string and analyze it.
pub fn analyze_json(json: &str) -> Result<WorkflowReport, AnalyzeError> {
    let request = parse::parse(json)?;
    Ok(analyze_request(&request))
}

/// One line per step, indented by display depth, with that step's problems
/// listed beneath it.
pub fn render_outline(steps: &[Step], report: &WorkflowReport) -> String {
    let mut out = String::new();
    for step in steps {
        let depth = report.depths.get(&step.order).copied().unwrap_or(0);
        let _ = writeln!(
            out,
            "{:>3} {}{} {}",
            step.order,
            "  ".repeat(depth),
            step.step_type(),
            step.name
        );
        for error in report.errors_at(step.order) {
            let _ = writeln!(out, "      ! {}: {}", error.code, error.message);
        }
        for finding in report.findings_at(step.order) {
            let _ = writeln!(
                out,
                "      ? {}: {}",
                finding.code, finding.message
            );
        }
    }
    out
}
