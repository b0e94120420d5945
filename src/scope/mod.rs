//! Scope resolution: which names each step may reference.
//!
//! Re-walks the step list with the same stack discipline as nesting
//! validation while maintaining four pools of bindings:
//!
//! | Pool   | Added by            | Visible                          |
//! |--------|---------------------|----------------------------------|
//! | input  | workflow parameters | every step                       |
//! | vars   | Set at k            | k+1 .. end                       |
//! | iter   | Foreach at k        | strictly inside its block        |
//! | output | Prompt `S` at k     | k+1 .. end, as `S.<field>`       |
//!
//! Iterators live in the `vars` namespace and shadow a same-named Set
//! variable (or outer iterator) inside their block only.

pub mod catalog;

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::config::AnalyzerConfig;
use crate::parse::types::{BlockKind, PromptConfig, Step, StepKind};

use catalog::PromptCatalog;

// =============================================================================
// BINDINGS
// =============================================================================

/// The prefix a reference is written with: `input.`, `vars.` or `<stepName>.`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Namespace {
    Input,
    Vars,
    Step(String),
}

impl Namespace {
    pub fn as_str(&self) -> &str {
        match self {
            Namespace::Input => "input",
            Namespace::Vars => "vars",
            Namespace::Step(name) => name,
        }
    }
}

impl From<&str> for Namespace {
    fn from(prefix: &str) -> Self {
        match prefix {
            "input" => Namespace::Input,
            "vars" => Namespace::Vars,
            other => Namespace::Step(other.to_string()),
        }
    }
}

impl From<String> for Namespace {
    fn from(prefix: String) -> Self {
        Namespace::from(prefix.as_str())
    }
}

impl From<Namespace> for String {
    fn from(ns: Namespace) -> Self {
        ns.as_str().to_string()
    }
}

impl std::fmt::Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BindingKind {
    Input,
    Variable,
    Iterator,
    PromptOutput,
}

/// One referenceable value and the step range it is visible in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Binding {
    pub name: String,
    pub namespace: Namespace,
    pub kind: BindingKind,
    pub visible_from: u32,
    /// Last step (inclusive) the binding is visible at; `None` runs to the end.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible_to: Option<u32>,
    /// Emitted without resolvable prompt metadata; fields under this
    /// namespace cannot be verified.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub best_effort: bool,
}

impl Binding {
    fn new(namespace: Namespace, name: &str, kind: BindingKind, visible_from: u32) -> Self {
        Binding {
            name: name.to_string(),
            namespace,
            kind,
            visible_from,
            visible_to: None,
            best_effort: false,
        }
    }

    /// The text written between `{{` and `}}` to reference this binding.
    pub fn reference(&self) -> String {
        format!("{}.{}", self.namespace, self.name)
    }

    pub fn is_visible_at(&self, order: u32) -> bool {
        order >= self.visible_from && self.visible_to.is_none_or(|to| order <= to)
    }

    /// Human-readable visibility range, for diagnostics.
    pub fn range_label(&self) -> String {
        match self.visible_to {
            Some(to) if to < self.visible_from => "nowhere".to_string(),
            Some(to) => format!("steps {}..{}", self.visible_from, to),
            None => format!("step {} onward", self.visible_from),
        }
    }
}

// =============================================================================
// SCOPE TABLE
// =============================================================================

/// Every binding the workflow declares plus the visible subset per step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeTable {
    declared: Vec<Binding>,
    visible: BTreeMap<u32, Vec<usize>>,
}

impl ScopeTable {
    pub fn declared(&self) -> &[Binding] {
        &self.declared
    }

    pub fn visible_at(&self, order: u32) -> Vec<&Binding> {
        self.visible
            .get(&order)
            .map(|ids| ids.iter().map(|&i| &self.declared[i]).collect())
            .unwrap_or_default()
    }

    pub fn step_scope(&self, order: u32) -> StepScope<'_> {
        StepScope::new(order, self.visible_at(order), &self.declared)
    }

    pub fn bindings_by_order(&self) -> BTreeMap<u32, Vec<Binding>> {
        self.visible
            .iter()
            .map(|(&order, ids)| (order, ids.iter().map(|&i| self.declared[i].clone()).collect()))
            .collect()
    }
}

/// The view of the scope table one step's text is checked against.
#[derive(Debug, Clone)]
pub struct StepScope<'a> {
    pub order: u32,
    pub visible: Vec<&'a Binding>,
    pub declared: &'a [Binding],
}

impl<'a> StepScope<'a> {
    pub fn new(order: u32, visible: Vec<&'a Binding>, declared: &'a [Binding]) -> Self {
        StepScope {
            order,
            visible,
            declared,
        }
    }

    pub fn find_visible(&self, namespace: &Namespace, name: &str) -> Option<&'a Binding> {
        self.visible
            .iter()
            .copied()
            .find(|b| &b.namespace == namespace && b.name == name)
    }

    /// A visible best-effort binding under `namespace`, if any.
    pub fn best_effort_namespace(&self, namespace: &Namespace) -> Option<&'a Binding> {
        self.visible
            .iter()
            .copied()
            .find(|b| &b.namespace == namespace && b.best_effort)
    }

    /// Any declaration of the name, visible here or not. A best-effort
    /// namespace matches every field name.
    pub fn find_declared(&self, namespace: &Namespace, name: &str) -> Option<&'a Binding> {
        self.declared
            .iter()
            .find(|b| &b.namespace == namespace && b.name == name)
            .or_else(|| {
                self.declared
                    .iter()
                    .find(|b| &b.namespace == namespace && b.best_effort)
            })
    }
}

// =============================================================================
// RESOLVER
// =============================================================================

struct Frame {
    kind: BlockKind,
    iterators: Vec<usize>,
}

#[derive(Default)]
struct Resolver {
    declared: Vec<Binding>,
    inputs: Vec<usize>,
    vars: Vec<usize>,
    var_index: HashMap<String, usize>,
    outputs: Vec<usize>,
    frames: Vec<Frame>,
}

/// Compute the visible bindings of every step.
///
/// Expects dense orders; nesting errors are tolerated by mirroring the
/// validator's pop rule, so a malformed region still gets a best-effort scope.
pub fn resolve_scopes(
    steps: &[Step],
    input_parameters: &[String],
    catalog: &dyn PromptCatalog,
    config: &AnalyzerConfig,
) -> ScopeTable {
    let mut resolver = Resolver::default();

    for param in input_parameters.iter().map(|p| p.trim()) {
        let duplicate = resolver
            .inputs
            .iter()
            .any(|&i| resolver.declared[i].name == param);
        if !param.is_empty() && !duplicate {
            let idx = resolver.declare(Binding::new(Namespace::Input, param, BindingKind::Input, 1));
            resolver.inputs.push(idx);
        }
    }

    let mut visible = BTreeMap::new();
    for step in steps {
        if let Some(kind) = step.step_type().closes() {
            resolver.close(kind, step.order);
        }

        let snapshot = resolver.snapshot();
        trace!(order = step.order, visible = snapshot.len(), "scope snapshot");
        visible.insert(step.order, snapshot);

        match &step.kind {
            StepKind::Set(_) => resolver.define_vars(step),
            StepKind::Foreach(c) => {
                let iterators: Vec<usize> = c
                    .iterator_names()
                    .into_iter()
                    .map(|name| {
                        resolver.declare(Binding::new(
                            Namespace::Vars,
                            name,
                            BindingKind::Iterator,
                            step.order + 1,
                        ))
                    })
                    .collect();
                resolver.frames.push(Frame {
                    kind: BlockKind::Foreach,
                    iterators,
                });
            }
            StepKind::If(_) => resolver.open(BlockKind::If),
            StepKind::Loop(_) => resolver.open(BlockKind::Loop),
            StepKind::Prompt(c) => resolver.define_outputs(step, c, catalog, config),
            StepKind::Elif(_)
            | StepKind::Else
            | StepKind::EndIf
            | StepKind::EndLoop
            | StepKind::EndForeach
            | StepKind::Break
            | StepKind::Continue
            | StepKind::Output(_) => {}
        }
    }

    debug!(
        steps = steps.len(),
        declared = resolver.declared.len(),
        "resolved workflow scopes"
    );

    ScopeTable {
        declared: resolver.declared,
        visible,
    }
}

impl Resolver {
    fn declare(&mut self, binding: Binding) -> usize {
        self.declared.push(binding);
        self.declared.len() - 1
    }

    fn open(&mut self, kind: BlockKind) {
        self.frames.push(Frame {
            kind,
            iterators: vec![],
        });
    }

    /// Same rule as the validator: only a matching innermost block is closed.
    fn close(&mut self, kind: BlockKind, order: u32) {
        if self.frames.last().is_some_and(|f| f.kind == kind) {
            if let Some(frame) = self.frames.pop() {
                for idx in frame.iterators {
                    self.declared[idx].visible_to = Some(order - 1);
                }
            }
        }
    }

    /// Set variables keep the visibility of their first definition;
    /// later assignments to the same name overwrite the value only.
    fn define_vars(&mut self, step: &Step) {
        for name in step.defined_variables() {
            if self.var_index.contains_key(name) {
                continue;
            }
            let idx = self.declare(Binding::new(
                Namespace::Vars,
                name,
                BindingKind::Variable,
                step.order + 1,
            ));
            self.var_index.insert(name.to_string(), idx);
            self.vars.push(idx);
        }
    }

    fn define_outputs(
        &mut self,
        step: &Step,
        prompt: &PromptConfig,
        catalog: &dyn PromptCatalog,
        config: &AnalyzerConfig,
    ) {
        let metadata = prompt
            .prompt_ref
            .as_ref()
            .and_then(|r| catalog.resolve(r, prompt.project_ref.as_ref()));

        match (&prompt.prompt_ref, metadata) {
            (Some(r), None) => warn!(
                step = step.order,
                prompt_ref = %r,
                "prompt metadata unresolved, emitting best-effort bindings"
            ),
            (None, _) => debug!(step = step.order, "prompt step has no prompt selected"),
            _ => {}
        }

        let best_effort = metadata.is_none();
        let extra = metadata.map(|m| m.output_fields.as_slice()).unwrap_or(&[]);
        let namespace = Namespace::Step(step.name.clone());

        let mut emitted: Vec<&str> = Vec::new();
        for field in config.prompt_output_fields.iter().chain(extra) {
            if field.is_empty() || emitted.contains(&field.as_str()) {
                continue;
            }
            emitted.push(field);
            // A later step with the same name replaces the earlier output.
            self.outputs.retain(|&i| {
                let earlier = &self.declared[i];
                earlier.namespace != namespace || earlier.name != *field
            });
            let mut binding = Binding::new(
                namespace.clone(),
                field,
                BindingKind::PromptOutput,
                step.order + 1,
            );
            binding.best_effort = best_effort;
            let idx = self.declare(binding);
            self.outputs.push(idx);
        }
    }

    /// Indices of everything visible right now: inputs, unshadowed vars,
    /// innermost iterator per name, prompt outputs.
    fn snapshot(&self) -> Vec<usize> {
        let mut winner: HashMap<&str, usize> = HashMap::new();
        for frame in &self.frames {
            for &idx in &frame.iterators {
                winner.insert(self.declared[idx].name.as_str(), idx);
            }
        }

        let mut visible = self.inputs.clone();
        visible.extend(
            self.vars
                .iter()
                .copied()
                .filter(|&i| !winner.contains_key(self.declared[i].name.as_str())),
        );
        for frame in &self.frames {
            visible.extend(
                frame
                    .iterators
                    .iter()
                    .copied()
                    .filter(|&i| winner.get(self.declared[i].name.as_str()) == Some(&i)),
            );
        }
        visible.extend(self.outputs.iter().copied());
        visible
    }
}
