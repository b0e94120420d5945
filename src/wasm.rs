//! WASM entry points for browser use.

use serde::Serialize;
use wasm_bindgen::prelude::*;

use crate::analysis::{self, WorkflowReport};
use crate::error::AnalyzeError;
use crate::parse::{self, Step};
use crate::config::AnalyzerConfig;
use crate::reference::{analyze_text, TextReport};
use crate::scope::{Binding, StepScope};
use crate::session::{AnalysisSession, StepUpdate};

/// Analyze a workflow request JSON: nesting, scopes and references.
/// Returns `{status: "analyzed", report}` or `{status: "invalid", error}`.
#[wasm_bindgen]
pub fn analyze_workflow(json: &str) -> JsValue {
    to_js(&analyze_workflow_inner(json))
}

fn analyze_workflow_inner(json: &str) -> AnalyzeResult<WorkflowReport> {
    match analysis::analyze_json(json) {
        Ok(report) => AnalyzeResult::Analyzed { report },
        Err(e) => AnalyzeResult::Invalid { error: e.into() },
    }
}

/// Check one text field against an explicit binding list, as the editor
/// does while the user types. `bindings_json` is an array of bindings;
/// those visible at `order` are in scope. `options_json` carries the same
/// options object as a workflow request, so `extraFunctions` apply.
#[wasm_bindgen]
pub fn check_text(
    text: &str,
    bindings_json: &str,
    order: u32,
    options_json: Option<String>,
) -> JsValue {
    to_js(&check_text_inner(text, bindings_json, order, options_json.as_deref()))
}

fn check_text_inner(
    text: &str,
    bindings_json: &str,
    order: u32,
    options_json: Option<&str>,
) -> AnalyzeResult<TextReport> {
    let config = match options_json.map(AnalyzerConfig::from_json).transpose() {
        Ok(config) => config.unwrap_or_default(),
        Err(e) => return AnalyzeResult::Invalid { error: e.into() },
    };
    let declared = match serde_json::from_str::<Vec<Binding>>(bindings_json) {
        Ok(b) => b,
        Err(e) => {
            return AnalyzeResult::Invalid {
                error: AnalyzeError::InvalidJson(e.to_string()).into(),
            };
        }
    };
    let visible = declared.iter().filter(|b| b.is_visible_at(order)).collect();
    let scope = StepScope::new(order, visible, &declared);
    let report = analyze_text(text, &scope, &config.function_registry());
    AnalyzeResult::Analyzed { report }
}

/// A long-lived analysis the editor mutates as the user works.
#[wasm_bindgen]
pub struct WorkflowSession {
    inner: AnalysisSession,
}

#[wasm_bindgen]
impl WorkflowSession {
    #[wasm_bindgen(constructor)]
    pub fn new(json: &str) -> Result<WorkflowSession, JsValue> {
        AnalysisSession::from_json(json)
            .map(|inner| WorkflowSession { inner })
            .map_err(|e| to_js(&ErrorDto::from(e)))
    }

    pub fn generation(&self) -> u64 {
        self.inner.generation()
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.inner.is_current(generation)
    }

    pub fn report(&self) -> JsValue {
        to_js(&self.inner.report())
    }

    /// Returns the new generation, or an error object.
    pub fn replace_steps(&mut self, steps_json: &str) -> Result<u64, JsValue> {
        let steps = parse::parse_steps(steps_json).map_err(|e| to_js(&ErrorDto::from(e)))?;
        Ok(self.inner.replace_steps(steps))
    }

    pub fn edit_step(&mut self, step_json: &str) -> JsValue {
        to_js(&edit_step_inner(&mut self.inner, step_json))
    }

    /// Check draft text for the step at `order` against this session.
    pub fn check_text(&self, text: &str, order: u32) -> JsValue {
        to_js(&self.inner.check_text(text, order))
    }
}

fn edit_step_inner(session: &mut AnalysisSession, step_json: &str) -> AnalyzeResult<StepUpdate> {
    let result = parse::parse_step(step_json).and_then(|step: Step| session.edit_step(step));
    match result {
        Ok(update) => AnalyzeResult::Analyzed { report: update },
        Err(e) => AnalyzeResult::Invalid { error: e.into() },
    }
}

fn to_js<T: Serialize>(value: &T) -> JsValue {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .unwrap_or(JsValue::NULL)
}

// ---------------------------------------------------------------------------
// DTOs for serialization to JS
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
struct ErrorDto {
    code: String,
    message: String,
}

impl From<AnalyzeError> for ErrorDto {
    fn from(e: AnalyzeError) -> Self {
        ErrorDto {
            code: e.code().to_string(),
            message: e.to_string(),
        }
    }
}

#[derive(Debug, serde::Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
enum AnalyzeResult<T> {
    Analyzed { report: T },
    Invalid { error: ErrorDto },
}
