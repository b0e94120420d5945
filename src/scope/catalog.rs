//! Prompt metadata lookup consumed read-only by the scope resolver.

use serde::{Deserialize, Serialize};

use crate::parse::types::EntityRef;

/// What the registry knows about one prompt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PromptMetadata {
    pub prompt_ref: Option<EntityRef>,
    /// `None` matches the prompt under any project.
    pub project_ref: Option<EntityRef>,
    pub name: String,
    pub parameters: Vec<String>,
    /// Named fields the prompt's parser extracts from the model reply.
    pub output_fields: Vec<String>,
}

pub trait PromptCatalog {
    fn resolve(&self, prompt_ref: &EntityRef, project_ref: Option<&EntityRef>)
    -> Option<&PromptMetadata>;
}

/// Resolves nothing; every Prompt step falls back to best-effort bindings.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCatalog;

impl PromptCatalog for NoCatalog {
    fn resolve(&self, _: &EntityRef, _: Option<&EntityRef>) -> Option<&PromptMetadata> {
        None
    }
}

/// A catalog over metadata the caller already holds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StaticPromptCatalog {
    entries: Vec<PromptMetadata>,
}

impl StaticPromptCatalog {
    pub fn new(entries: Vec<PromptMetadata>) -> Self {
        StaticPromptCatalog { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl PromptCatalog for StaticPromptCatalog {
    fn resolve(
        &self,
        prompt_ref: &EntityRef,
        project_ref: Option<&EntityRef>,
    ) -> Option<&PromptMetadata> {
        let candidates = self
            .entries
            .iter()
            .filter(|e| e.prompt_ref.as_ref().is_some_and(|r| r.matches(prompt_ref)));

        let mut fallback = None;
        for entry in candidates {
            match (project_ref, &entry.project_ref) {
                (Some(wanted), Some(have)) if have.matches(wanted) => return Some(entry),
                (Some(_), Some(_)) => {}
                _ => {
                    fallback.get_or_insert(entry);
                }
            }
        }
        fallback
    }
}
