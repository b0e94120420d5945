//! Step name rules: grammar, reserved identifiers, uniqueness.

use std::collections::HashMap;

use crate::config::AnalyzerConfig;
use crate::error::{StructuralError, StructuralErrorKind};
use crate::parse::types::Step;

/// Run all naming rules. Returns all errors found.
pub fn validate_names(steps: &[Step], config: &AnalyzerConfig) -> Vec<StructuralError> {
    let mut errors = Vec::new();

    name_grammar_and_reserved(steps, config, &mut errors);
    unique_names(steps, &mut errors);

    errors
}

/// `^[A-Za-z][A-Za-z0-9_]*$`
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn name_grammar_and_reserved(
    steps: &[Step],
    config: &AnalyzerConfig,
    errors: &mut Vec<StructuralError>,
) {
    for step in steps {
        if !is_valid_identifier(&step.name) {
            errors.push(StructuralError::new(
                StructuralErrorKind::InvalidStepName,
                step.order,
                format!(
                    "Step name '{}' must start with a letter and contain only letters, digits and '_'",
                    step.name
                ),
            ));
        } else if config.is_reserved(&step.name) {
            errors.push(StructuralError::new(
                StructuralErrorKind::ReservedStepName,
                step.order,
                format!("Step name '{}' is reserved", step.name),
            ));
        }
    }
}

/// One error per duplicated name, listing every step that carries it.
fn unique_names(steps: &[Step], errors: &mut Vec<StructuralError>) {
    let mut groups: Vec<(&str, Vec<u32>)> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for step in steps.iter().filter(|s| is_valid_identifier(&s.name)) {
        match index.get(step.name.as_str()) {
            Some(&i) => groups[i].1.push(step.order),
            None => {
                index.insert(step.name.as_str(), groups.len());
                groups.push((step.name.as_str(), vec![step.order]));
            }
        }
    }

    for (name, orders) in groups.into_iter().filter(|(_, o)| o.len() > 1) {
        let listed: Vec<String> = orders.iter().map(|o| o.to_string()).collect();
        errors.push(
            StructuralError::new(
                StructuralErrorKind::DuplicateStepName,
                orders[0],
                format!("Step name '{}' is used by steps {}", name, listed.join(", ")),
            )
            .with_related(orders),
        );
    }
}
