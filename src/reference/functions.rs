//! Template function registry with fixed arities.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionSpec {
    pub name: String,
    pub min_args: usize,
    /// `None` means variadic.
    #[serde(default)]
    pub max_args: Option<usize>,
}

impl FunctionSpec {
    pub fn new(name: &str, min_args: usize, max_args: Option<usize>) -> Self {
        FunctionSpec {
            name: name.to_string(),
            min_args,
            max_args,
        }
    }

    pub fn accepts(&self, count: usize) -> bool {
        count >= self.min_args && self.max_args.is_none_or(|max| count <= max)
    }

    pub fn arity_label(&self) -> String {
        match self.max_args {
            Some(max) if max == self.min_args => format!("exactly {}", max),
            Some(max) => format!("{} to {}", self.min_args, max),
            None => format!("at least {}", self.min_args),
        }
    }
}

const BUILTINS: &[(&str, usize, Option<usize>)] = &[
    // text
    ("upper", 1, Some(1)),
    ("lower", 1, Some(1)),
    ("trim", 1, Some(2)),
    ("lstrip", 1, Some(2)),
    ("rstrip", 1, Some(2)),
    ("capitalize", 1, Some(1)),
    ("title", 1, Some(1)),
    ("reverse", 1, Some(1)),
    // extraction
    ("length", 1, Some(1)),
    ("slice", 2, Some(3)),
    ("left", 2, Some(2)),
    ("right", 2, Some(2)),
    // string ops
    ("replace", 3, Some(3)),
    ("repeat", 2, Some(2)),
    ("concat", 2, None),
    ("split", 1, Some(2)),
    ("join", 1, Some(2)),
    // search
    ("contains", 2, Some(2)),
    ("startswith", 2, Some(2)),
    ("endswith", 2, Some(2)),
    ("count", 2, Some(2)),
    // utility
    ("default", 2, Some(2)),
    ("shuffle", 1, Some(1)),
    ("debug", 1, Some(1)),
    // math
    ("sum", 1, None),
    ("calc", 1, Some(1)),
    // data access
    ("getprompt", 1, Some(2)),
    ("getparser", 1, Some(2)),
    // datetime
    ("now", 0, Some(1)),
    ("today", 0, Some(1)),
    ("time", 0, Some(1)),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionRegistry {
    functions: BTreeMap<String, FunctionSpec>,
}

impl FunctionRegistry {
    pub fn builtin() -> Self {
        let functions = BUILTINS
            .iter()
            .map(|&(name, min, max)| (name.to_string(), FunctionSpec::new(name, min, max)))
            .collect();
        FunctionRegistry { functions }
    }

    pub fn with_extra(mut self, extra: &[FunctionSpec]) -> Self {
        for spec in extra {
            self.functions.insert(spec.name.clone(), spec.clone());
        }
        self
    }

    /// Names are case-sensitive.
    pub fn get(&self, name: &str) -> Option<&FunctionSpec> {
        self.functions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_covers_every_category() {
        let registry = FunctionRegistry::builtin();
        assert_eq!(registry.names().count(), 31);
        for name in ["title", "right", "join", "count", "debug", "calc", "getparser", "time"] {
            assert!(registry.contains(name), "missing {}", name);
        }
        assert!(!registry.contains("Upper"));
    }

    #[test]
    fn arity_bounds() {
        let registry = FunctionRegistry::builtin();
        let replace = registry.get("replace").unwrap();
        assert!(!replace.accepts(2));
        assert!(replace.accepts(3));
        assert_eq!(replace.arity_label(), "exactly 3");

        let concat = registry.get("concat").unwrap();
        assert!(concat.accepts(9));
        assert!(!concat.accepts(1));
        assert_eq!(concat.arity_label(), "at least 2");

        assert!(registry.get("now").unwrap().accepts(0));
        assert_eq!(registry.get("slice").unwrap().arity_label(), "2 to 3");
    }
}
