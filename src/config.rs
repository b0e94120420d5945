//! Analyzer options.
//!
//! Every field has a default, so an empty `options` object (or none at all)
//! yields the stock behaviour.

use serde::{Deserialize, Serialize};

use crate::error::AnalyzeError;
use crate::reference::functions::{FunctionRegistry, FunctionSpec};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct AnalyzerConfig {
    /// Identifiers no step may be named; compared case-insensitively.
    pub reserved_names: Vec<String>,
    /// Generic bindings every Prompt step emits, whether or not its
    /// metadata resolves.
    pub prompt_output_fields: Vec<String>,
    /// Functions added to (or overriding) the built-in registry.
    pub extra_functions: Vec<FunctionSpec>,
    pub check_references: bool,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        AnalyzerConfig {
            reserved_names: vec!["input".into(), "vars".into()],
            prompt_output_fields: ["result", "raw", "SYSTEM", "USER", "ASSISTANT", "CONTEXT"]
                .into_iter()
                .map(String::from)
                .collect(),
            extra_functions: vec![],
            check_references: true,
        }
    }
}

impl AnalyzerConfig {
    pub fn from_json(json: &str) -> Result<Self, AnalyzeError> {
        serde_json::from_str(json).map_err(|e| AnalyzeError::InvalidConfig(e.to_string()))
    }

    pub fn is_reserved(&self, name: &str) -> bool {
        self.reserved_names
            .iter()
            .any(|r| r.eq_ignore_ascii_case(name))
    }

    pub fn function_registry(&self) -> FunctionRegistry {
        FunctionRegistry::builtin().with_extra(&self.extra_functions)
    }
}
