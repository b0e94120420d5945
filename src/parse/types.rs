//! Rust types mirroring the workflow editor's step model.
//!
//! These types are the serde target for the frontend workflow JSON.
//! A step travels on the wire as `{order, name, type, config}`; the `type`
//! tag and the untyped `config` object are folded into `StepKind` so every
//! consumer gets exhaustive matching over the closed set of step kinds.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::AnalyzerConfig;
use crate::error::AnalyzeError;
use crate::scope::catalog::PromptMetadata;

// =============================================================================
// REQUEST
// =============================================================================

/// One analysis request: the editor's step list plus everything the
/// analyzer needs besides it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowRequest {
    pub steps: Vec<Step>,
    #[serde(default, alias = "input_parameters")]
    pub input_parameters: Vec<String>,
    /// Prompt metadata the editor already has cached, keyed by prompt/project ref.
    #[serde(default)]
    pub prompts: Vec<PromptMetadata>,
    #[serde(default)]
    pub options: AnalyzerConfig,
}

// =============================================================================
// STEP TYPE
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepType {
    #[serde(alias = "PROMPT")]
    Prompt,
    #[serde(alias = "SET")]
    Set,
    #[serde(alias = "IF")]
    If,
    #[serde(alias = "ELIF")]
    Elif,
    #[serde(alias = "ELSE")]
    Else,
    #[serde(alias = "ENDIF")]
    EndIf,
    #[serde(alias = "LOOP")]
    Loop,
    #[serde(alias = "ENDLOOP")]
    EndLoop,
    #[serde(alias = "FOREACH")]
    Foreach,
    #[serde(alias = "ENDFOREACH")]
    EndForeach,
    #[serde(alias = "BREAK")]
    Break,
    #[serde(alias = "CONTINUE")]
    Continue,
    #[serde(alias = "OUTPUT")]
    Output,
}

/// The three kinds of block a step list can nest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    If,
    Loop,
    Foreach,
}

impl BlockKind {
    pub fn is_loop(self) -> bool {
        matches!(self, BlockKind::Loop | BlockKind::Foreach)
    }

    pub fn opener(self) -> StepType {
        match self {
            BlockKind::If => StepType::If,
            BlockKind::Loop => StepType::Loop,
            BlockKind::Foreach => StepType::Foreach,
        }
    }

    pub fn closer(self) -> StepType {
        match self {
            BlockKind::If => StepType::EndIf,
            BlockKind::Loop => StepType::EndLoop,
            BlockKind::Foreach => StepType::EndForeach,
        }
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.opener().as_str())
    }
}

impl StepType {
    pub fn as_str(self) -> &'static str {
        match self {
            StepType::Prompt => "Prompt",
            StepType::Set => "Set",
            StepType::If => "If",
            StepType::Elif => "Elif",
            StepType::Else => "Else",
            StepType::EndIf => "EndIf",
            StepType::Loop => "Loop",
            StepType::EndLoop => "EndLoop",
            StepType::Foreach => "Foreach",
            StepType::EndForeach => "EndForeach",
            StepType::Break => "Break",
            StepType::Continue => "Continue",
            StepType::Output => "Output",
        }
    }

    /// The block this step opens, if it is an opener.
    pub fn opens(self) -> Option<BlockKind> {
        match self {
            StepType::If => Some(BlockKind::If),
            StepType::Loop => Some(BlockKind::Loop),
            StepType::Foreach => Some(BlockKind::Foreach),
            _ => None,
        }
    }

    /// The block this step closes, if it is a closer.
    pub fn closes(self) -> Option<BlockKind> {
        match self {
            StepType::EndIf => Some(BlockKind::If),
            StepType::EndLoop => Some(BlockKind::Loop),
            StepType::EndForeach => Some(BlockKind::Foreach),
            _ => None,
        }
    }
}

impl fmt::Display for StepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// STEP
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawStep", into = "RawStep")]
pub struct Step {
    pub order: u32,
    pub name: String,
    pub kind: StepKind,
}

/// Tagged union over the 13 step types.
#[derive(Debug, Clone, PartialEq)]
pub enum StepKind {
    Prompt(PromptConfig),
    Set(SetConfig),
    If(Condition),
    Elif(Condition),
    Else,
    EndIf,
    Loop(LoopConfig),
    EndLoop,
    Foreach(ForeachConfig),
    EndForeach,
    Break,
    Continue,
    Output(OutputConfig),
}

impl Step {
    pub fn new(order: u32, name: impl Into<String>, kind: StepKind) -> Self {
        Step {
            order,
            name: name.into(),
            kind,
        }
    }

    pub fn step_type(&self) -> StepType {
        match &self.kind {
            StepKind::Prompt(_) => StepType::Prompt,
            StepKind::Set(_) => StepType::Set,
            StepKind::If(_) => StepType::If,
            StepKind::Elif(_) => StepType::Elif,
            StepKind::Else => StepType::Else,
            StepKind::EndIf => StepType::EndIf,
            StepKind::Loop(_) => StepType::Loop,
            StepKind::EndLoop => StepType::EndLoop,
            StepKind::Foreach(_) => StepType::Foreach,
            StepKind::EndForeach => StepType::EndForeach,
            StepKind::Break => StepType::Break,
            StepKind::Continue => StepType::Continue,
            StepKind::Output(_) => StepType::Output,
        }
    }

    /// Every free-text field of this step, labelled with its path in the config.
    pub fn text_fields(&self) -> Vec<(String, &str)> {
        let mut fields = Vec::new();
        match &self.kind {
            StepKind::Prompt(c) => {
                for (param, expr) in &c.input_mapping {
                    fields.push((format!("inputMapping.{}", param), expr.as_str()));
                }
            }
            StepKind::Set(c) => {
                for (i, assignment) in c.assignments.iter().enumerate() {
                    fields.push((format!("assignments[{}]", i), assignment.expression.as_str()));
                }
            }
            StepKind::If(c) | StepKind::Elif(c) => c.push_fields(&mut fields),
            StepKind::Loop(c) => c.condition.push_fields(&mut fields),
            StepKind::Foreach(c) => fields.push(("source".into(), c.source.as_str())),
            StepKind::Output(c) => {
                if let Some(content) = &c.content {
                    fields.push(("content".into(), content.as_str()));
                }
                for (i, column) in c.columns.iter().enumerate() {
                    fields.push((format!("columns[{}]", i), column.value.as_str()));
                }
                for (i, field) in c.fields.iter().enumerate() {
                    fields.push((format!("fields[{}]", i), field.value.as_str()));
                }
                if let Some(filename) = &c.filename {
                    fields.push(("filename".into(), filename.as_str()));
                }
            }
            StepKind::Else
            | StepKind::EndIf
            | StepKind::EndLoop
            | StepKind::EndForeach
            | StepKind::Break
            | StepKind::Continue => {}
        }
        fields
    }

    /// Names this step introduces into the `vars` namespace.
    pub fn defined_variables(&self) -> Vec<&str> {
        match &self.kind {
            StepKind::Set(c) => c
                .assignments
                .iter()
                .map(|a| a.name.trim())
                .filter(|n| !n.is_empty())
                .collect(),
            StepKind::Foreach(c) => c.iterator_names(),
            _ => vec![],
        }
    }
}

// =============================================================================
// STEP CONFIGS
// =============================================================================

/// A prompt or project identifier; the editor sends either numeric ids or strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityRef {
    Number(i64),
    Text(String),
}

impl EntityRef {
    /// Numeric and string spellings of the same id compare equal.
    pub fn matches(&self, other: &EntityRef) -> bool {
        self.to_string() == other.to_string()
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityRef::Number(n) => write!(f, "{}", n),
            EntityRef::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PromptConfig {
    pub prompt_ref: Option<EntityRef>,
    pub project_ref: Option<EntityRef>,
    /// Prompt parameter name → template expression.
    pub input_mapping: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SetConfig {
    pub assignments: Vec<Assignment>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Assignment {
    #[serde(alias = "variable")]
    pub name: String,
    #[serde(alias = "value")]
    pub expression: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Condition {
    pub left: String,
    pub operator: String,
    pub right: String,
}

impl Condition {
    fn push_fields<'a>(&'a self, fields: &mut Vec<(String, &'a str)>) {
        fields.push(("left".into(), self.left.as_str()));
        fields.push(("right".into(), self.right.as_str()));
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoopConfig {
    #[serde(flatten)]
    pub condition: Condition,
    pub max_iterations: u32,
}

impl Default for LoopConfig {
    fn default() -> Self {
        LoopConfig {
            condition: Condition::default(),
            max_iterations: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ForeachConfig {
    /// A template expression or an opaque `dataset:<id>` source.
    pub source: String,
    pub item_var: String,
    pub index_var: Option<String>,
}

impl Default for ForeachConfig {
    fn default() -> Self {
        ForeachConfig {
            source: String::new(),
            item_var: "item".into(),
            index_var: None,
        }
    }
}

impl ForeachConfig {
    pub fn iterator_names(&self) -> Vec<&str> {
        [Some(self.item_var.as_str()), self.index_var.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputTarget {
    #[default]
    Screen,
    File,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Csv,
    Json,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OutputConfig {
    pub target: OutputTarget,
    pub format: OutputFormat,
    /// Text format body.
    pub content: Option<String>,
    /// CSV format columns.
    pub columns: Vec<OutputColumn>,
    /// JSON format object fields.
    pub fields: Vec<OutputField>,
    pub filename: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputColumn {
    pub header: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputField {
    pub key: String,
    pub value: String,
}

// =============================================================================
// WIRE SHAPE
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawStep {
    order: u32,
    name: String,
    #[serde(rename = "type")]
    step_type: StepType,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    config: Value,
}

impl TryFrom<RawStep> for Step {
    type Error = AnalyzeError;

    fn try_from(raw: RawStep) -> Result<Self, Self::Error> {
        let RawStep {
            order,
            name,
            step_type,
            config,
        } = raw;
        let kind = match step_type {
            StepType::Prompt => StepKind::Prompt(payload(config, order, step_type)?),
            StepType::Set => StepKind::Set(payload(config, order, step_type)?),
            StepType::If => StepKind::If(payload(config, order, step_type)?),
            StepType::Elif => StepKind::Elif(payload(config, order, step_type)?),
            StepType::Else => StepKind::Else,
            StepType::EndIf => StepKind::EndIf,
            StepType::Loop => StepKind::Loop(payload(config, order, step_type)?),
            StepType::EndLoop => StepKind::EndLoop,
            StepType::Foreach => StepKind::Foreach(payload(config, order, step_type)?),
            StepType::EndForeach => StepKind::EndForeach,
            StepType::Break => StepKind::Break,
            StepType::Continue => StepKind::Continue,
            StepType::Output => StepKind::Output(payload(config, order, step_type)?),
        };
        Ok(Step { order, name, kind })
    }
}

fn payload<T: DeserializeOwned>(
    config: Value,
    order: u32,
    step_type: StepType,
) -> Result<T, AnalyzeError> {
    let config = if config.is_null() {
        Value::Object(serde_json::Map::new())
    } else {
        config
    };
    serde_json::from_value(config).map_err(|e| AnalyzeError::InvalidStep {
        order,
        step_type: step_type.as_str(),
        reason: e.to_string(),
    })
}

impl From<Step> for RawStep {
    fn from(step: Step) -> Self {
        let step_type = step.step_type();
        let config = match step.kind {
            StepKind::Prompt(c) => serde_json::to_value(c),
            StepKind::Set(c) => serde_json::to_value(c),
            StepKind::If(c) | StepKind::Elif(c) => serde_json::to_value(c),
            StepKind::Loop(c) => serde_json::to_value(c),
            StepKind::Foreach(c) => serde_json::to_value(c),
            StepKind::Output(c) => serde_json::to_value(c),
            StepKind::Else
            | StepKind::EndIf
            | StepKind::EndLoop
            | StepKind::EndForeach
            | StepKind::Break
            | StepKind::Continue => Ok(Value::Null),
        };
        RawStep {
            order: step.order,
            name: step.name,
            step_type,
            config: config.unwrap_or_default(),
        }
    }
}
