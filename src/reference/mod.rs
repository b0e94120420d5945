//! Variable reference checking for one text field.
//!
//! Every top-level `{{...}}` span is parsed as a small expression: a dotted
//! reference (`vars.total`, `summary.result`), a function call whose
//! arguments may hold nested spans, or an arbitrary mix of both. Outside
//! spans only calls to registered functions are recognised, and only when
//! the `(` follows the name directly, since the rest is prose. A bare word
//! passed as a call argument is read as a reference missing its namespace;
//! `true`, `false` and `null` are literals. Nothing here fails: malformed
//! input becomes a finding.

pub mod extract;
pub mod functions;

use serde::{Deserialize, Serialize};

use crate::scope::{Namespace, StepScope};

use extract::{
    extract_templates, ident_end, is_ident_continue, is_ident_start, matching_paren, path_end,
    quote_end, skip_ws, split_args, template_end, trim_range, Span,
};
use functions::FunctionRegistry;

// =============================================================================
// FINDINGS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FindingKind {
    UnknownName,
    OutOfScope,
    UnknownFunction,
    ArityMismatch,
    UnbalancedBraces,
}

impl FindingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FindingKind::UnknownName => "UnknownName",
            FindingKind::OutOfScope => "OutOfScope",
            FindingKind::UnknownFunction => "UnknownFunction",
            FindingKind::ArityMismatch => "ArityMismatch",
            FindingKind::UnbalancedBraces => "UnbalancedBraces",
        }
    }
}

impl std::fmt::Display for FindingKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An advisory diagnostic on one reference or call. Never blocks save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    pub code: FindingKind,
    pub step_order: u32,
    /// Config path of the text field, filled in by the caller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// Byte range within the field text.
    pub start: usize,
    pub end: usize,
    pub message: String,
}

impl Finding {
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }
}

impl std::fmt::Display for Finding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.field {
            Some(field) => write!(
                f,
                "[{}] {} (at step {}, {})",
                self.code, self.message, self.step_order, field
            ),
            None => write!(f, "[{}] {} (at step {})", self.code, self.message, self.step_order),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferenceStatus {
    Resolved,
    UnknownName,
    OutOfScope,
}

/// One variable reference found in the text and how it classified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceUse {
    pub reference: String,
    pub start: usize,
    pub end: usize,
    pub status: ReferenceStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextReport {
    pub references: Vec<ReferenceUse>,
    pub findings: Vec<Finding>,
}

// =============================================================================
// ENTRY POINTS
// =============================================================================

/// Findings for one text field checked against one step's scope.
pub fn check_text(text: &str, scope: &StepScope<'_>, functions: &FunctionRegistry) -> Vec<Finding> {
    analyze_text(text, scope, functions).findings
}

/// Every reference in the text with its classification, plus findings.
pub fn analyze_text(text: &str, scope: &StepScope<'_>, functions: &FunctionRegistry) -> TextReport {
    let mut checker = Checker {
        text,
        scope,
        functions,
        report: TextReport::default(),
    };
    checker.region(0, text.len(), true);
    checker.report
}

// =============================================================================
// CHECKER
// =============================================================================

struct Checker<'t, 's> {
    text: &'t str,
    scope: &'s StepScope<'s>,
    functions: &'s FunctionRegistry,
    report: TextReport,
}

impl Checker<'_, '_> {
    /// Text outside any span. Templates are always checked. With `prose`,
    /// calls to registered functions written without braces and stray braces
    /// are checked too; without it the region is the content of a quoted
    /// literal, where a lone `}}` is just text.
    fn region(&mut self, start: usize, end: usize, prose: bool) {
        let extraction = extract_templates(self.text, start, end);
        if prose {
            for span in &extraction.unbalanced {
                self.unbalanced(*span);
            }
            self.prose(start, end, &extraction.templates);
        } else {
            for span in extraction.templates {
                self.template(span);
            }
        }
    }

    fn template(&mut self, span: Span) {
        let text = self.text;
        let (inner_start, inner_end) = span.inner();
        let (s, e) = trim_range(text, inner_start, inner_end);
        if s == e {
            self.push(
                FindingKind::UnknownName,
                span,
                None,
                "Empty template reference".into(),
            );
            return;
        }

        let whole = &text[s..e];
        if path_end(text, s, e) == e && is_ident_start(text.as_bytes()[s]) {
            let zero_arg_call = !whole.contains('.')
                && self.functions.get(whole).is_some_and(|f| f.accepts(0));
            if !zero_arg_call {
                self.reference(s, e);
            }
            return;
        }
        self.expression(s, e);
    }

    /// Walk prose, checking templates and calls to registered functions.
    /// A call may swallow templates in its arguments; those are checked as
    /// arguments and skipped here.
    fn prose(&mut self, start: usize, end: usize, templates: &[Span]) {
        let text = self.text;
        let bytes = text.as_bytes();
        let mut pending = templates.iter().peekable();
        let mut i = start;
        while i < end {
            while pending.next_if(|t| t.start < i).is_some() {}
            if let Some(span) = pending.next_if(|t| t.start == i) {
                self.template(*span);
                i = span.end;
                continue;
            }

            let boundary = i == 0 || !(is_ident_continue(bytes[i - 1]) || bytes[i - 1] == b'.');
            if boundary && is_ident_start(bytes[i]) {
                let name_end = ident_end(text, i, end);
                if name_end < end
                    && bytes[name_end] == b'('
                    && self.functions.contains(&text[i..name_end])
                {
                    i = self.call(i, name_end, name_end, end);
                } else {
                    i = name_end;
                }
            } else {
                i += 1;
            }
        }
    }

    /// Expression text inside a span or a call argument.
    fn expression(&mut self, start: usize, end: usize) {
        let text = self.text;
        let bytes = text.as_bytes();
        let mut i = start;
        while i < end {
            let b = bytes[i];
            if b == b'{' && i + 1 < end && bytes[i + 1] == b'{' {
                match template_end(text, i, end) {
                    Some(close) => {
                        self.template(Span::new(i, close));
                        i = close;
                    }
                    None => {
                        self.unbalanced(Span::new(i, end));
                        return;
                    }
                }
            } else if b == b'}' && i + 1 < end && bytes[i + 1] == b'}' {
                self.unbalanced(Span::new(i, i + 2));
                i += 2;
            } else if b == b'"' || b == b'\'' {
                let close = quote_end(text, i, end).unwrap_or(end);
                let content_end = if close == end { end } else { close - 1 };
                self.region(i + 1, content_end, false);
                i = close;
            } else if b.is_ascii_digit() {
                while i < end && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'.') {
                    i += 1;
                }
            } else if is_ident_start(b) {
                let p_end = path_end(text, i, end);
                let path = &text[i..p_end];
                let paren = skip_ws(text, p_end, end);
                if !path.contains('.') && paren < end && bytes[paren] == b'(' {
                    i = self.call(i, p_end, paren, end);
                } else {
                    if path.contains('.') {
                        self.reference(i, p_end);
                    }
                    i = p_end;
                }
            } else {
                i += 1;
            }
        }
    }

    /// Check one call; returns the index just past its closing paren.
    fn call(&mut self, name_start: usize, name_end: usize, open: usize, end: usize) -> usize {
        let text = self.text;
        let name = &text[name_start..name_end];
        let Some(close) = matching_paren(text, open, end) else {
            self.push(
                FindingKind::UnbalancedBraces,
                Span::new(name_start, end),
                None,
                format!("Unclosed '(' in call to {}", name),
            );
            return end;
        };

        let args = split_args(text, open + 1, close);
        let span = Span::new(name_start, close + 1);
        match self.functions.get(name) {
            None => self.push(
                FindingKind::UnknownFunction,
                span,
                Some(name.to_string()),
                format!("Unknown function '{}'", name),
            ),
            Some(spec) if !spec.accepts(args.len()) => self.push(
                FindingKind::ArityMismatch,
                span,
                Some(name.to_string()),
                format!(
                    "{} takes {} argument(s), got {}",
                    name,
                    spec.arity_label(),
                    args.len()
                ),
            ),
            Some(_) => {}
        }

        for (a, b) in args {
            if self.is_bare_name(a, b) {
                self.reference(a, b);
            } else {
                self.expression(a, b);
            }
        }
        close + 1
    }

    /// A lone identifier that is neither a literal keyword nor a zero-arg
    /// function name.
    fn is_bare_name(&self, start: usize, end: usize) -> bool {
        let text = self.text;
        if start == end
            || !is_ident_start(text.as_bytes()[start])
            || ident_end(text, start, end) != end
        {
            return false;
        }
        let word = &text[start..end];
        !matches!(word, "true" | "false" | "null")
            && !self.functions.get(word).is_some_and(|f| f.accepts(0))
    }

    fn reference(&mut self, start: usize, end: usize) {
        let text = self.text;
        let path = &text[start..end];
        let span = Span::new(start, end);

        let Some((head, rest)) = path.split_once('.') else {
            let hint = self
                .scope
                .visible
                .iter()
                .find(|b| b.name == path)
                .map(|b| format!("; did you mean '{}'?", b.reference()))
                .unwrap_or_default();
            self.classified(path, span, ReferenceStatus::UnknownName);
            self.push(
                FindingKind::UnknownName,
                span,
                Some(path.to_string()),
                format!("'{}' needs a namespace (input., vars. or a step name){}", path, hint),
            );
            return;
        };

        let name = rest.split('.').next().unwrap_or(rest);
        let namespace = Namespace::from(head);

        if self.scope.find_visible(&namespace, name).is_some()
            || self.scope.best_effort_namespace(&namespace).is_some()
        {
            self.classified(path, span, ReferenceStatus::Resolved);
            return;
        }

        match self.scope.find_declared(&namespace, name) {
            Some(binding) => {
                self.classified(path, span, ReferenceStatus::OutOfScope);
                self.push(
                    FindingKind::OutOfScope,
                    span,
                    Some(path.to_string()),
                    format!(
                        "'{}' is not visible at step {}; it is visible {}",
                        path,
                        self.scope.order,
                        binding.range_label()
                    ),
                );
            }
            None => {
                self.classified(path, span, ReferenceStatus::UnknownName);
                self.push(
                    FindingKind::UnknownName,
                    span,
                    Some(path.to_string()),
                    format!("'{}' does not name an input, variable or prompt output", path),
                );
            }
        }
    }

    fn unbalanced(&mut self, span: Span) {
        let message = if self.text[span.start..span.end].starts_with("}}") {
            "'}}' without a matching '{{'"
        } else {
            "'{{' is never closed"
        };
        self.push(FindingKind::UnbalancedBraces, span, None, message.into());
    }

    fn classified(&mut self, path: &str, span: Span, status: ReferenceStatus) {
        self.report.references.push(ReferenceUse {
            reference: path.to_string(),
            start: span.start,
            end: span.end,
            status,
        });
    }

    fn push(&mut self, code: FindingKind, span: Span, reference: Option<String>, message: String) {
        self.report.findings.push(Finding {
            code,
            step_order: self.scope.order,
            field: None,
            reference,
            start: span.start,
            end: span.end,
            message,
        });
    }
}
