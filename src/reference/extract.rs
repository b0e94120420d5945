//! Lexical helpers: `{{...}}` span extraction, paren matching, argument
//! splitting. All offsets are byte offsets into the original text and
//! always fall on ASCII delimiters, so slicing at them is safe.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Span { start, end }
    }

    /// The range between the `{{` and `}}` of a template span.
    pub fn inner(&self) -> (usize, usize) {
        (self.start + 2, self.end - 2)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    /// Top-level `{{...}}` spans, nested ones folded into their parent.
    pub templates: Vec<Span>,
    /// Stray `}}` and unclosed `{{` runs.
    pub unbalanced: Vec<Span>,
}

/// Extract top-level template spans from `text[start..end]` by brace-depth
/// balancing, so `{{f({{a.b}})}}` is one span rather than two. Inside a span
/// closed quoted literals are skipped whole, so `{{concat("}}", x)}}` stays
/// one span.
pub fn extract_templates(text: &str, start: usize, end: usize) -> Extraction {
    let bytes = text.as_bytes();
    let mut out = Extraction::default();
    let mut depth = 0usize;
    let mut open_at = start;
    let mut i = start;

    while i < end {
        let quoted = if depth > 0 { quoted_literal(text, i, end) } else { None };
        if let Some(close) = quoted {
            i = close;
        } else if at(bytes, i, end, b"{{") {
            if depth == 0 {
                open_at = i;
            }
            depth += 1;
            i += 2;
        } else if at(bytes, i, end, b"}}") {
            if depth == 0 {
                out.unbalanced.push(Span::new(i, i + 2));
            } else {
                depth -= 1;
                if depth == 0 {
                    out.templates.push(Span::new(open_at, i + 2));
                }
            }
            i += 2;
        } else {
            i += 1;
        }
    }

    if depth > 0 {
        out.unbalanced.push(Span::new(open_at, end));
    }
    out
}

/// End (exclusive) of the template opening at `open`, if it closes before `end`.
pub fn template_end(text: &str, open: usize, end: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut i = open;
    while i < end {
        let quoted = if depth > 0 { quoted_literal(text, i, end) } else { None };
        if let Some(close) = quoted {
            i = close;
        } else if at(bytes, i, end, b"{{") {
            depth += 1;
            i += 2;
        } else if at(bytes, i, end, b"}}") {
            depth -= 1;
            i += 2;
            if depth == 0 {
                return Some(i);
            }
        } else {
            i += 1;
        }
    }
    None
}

/// End (exclusive) of the quoted literal opening at `open`; backslash escapes
/// the next byte.
pub fn quote_end(text: &str, open: usize, end: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let quote = bytes[open];
    let mut i = open + 1;
    while i < end {
        match bytes[i] {
            b'\\' => i += 2,
            b if b == quote => return Some(i + 1),
            _ => i += 1,
        }
    }
    None
}

/// End of the closed quoted literal at `i`, if one starts there. A lone
/// apostrophe in a template is an ordinary byte.
fn quoted_literal(text: &str, i: usize, end: usize) -> Option<usize> {
    match text.as_bytes()[i] {
        b'"' | b'\'' => quote_end(text, i, end),
        _ => None,
    }
}

/// Index of the `)` matching the `(` at `open`, skipping quoted literals and
/// nested templates.
pub fn matching_paren(text: &str, open: usize, end: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut i = open;
    while i < end {
        match bytes[i] {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            b'"' | b'\'' => {
                i = quote_end(text, i, end)?;
                continue;
            }
            b'{' if at(bytes, i, end, b"{{") => {
                i = template_end(text, i, end)?;
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Split `text[start..end]` on top-level commas into trimmed argument ranges.
/// An all-blank range has zero arguments.
pub fn split_args(text: &str, start: usize, end: usize) -> Vec<(usize, usize)> {
    if text[start..end].trim().is_empty() {
        return vec![];
    }

    let bytes = text.as_bytes();
    let mut args = Vec::new();
    let mut depth = 0usize;
    let mut arg_start = start;
    let mut i = start;
    while i < end {
        match bytes[i] {
            b'(' => depth += 1,
            b')' => depth = depth.saturating_sub(1),
            b',' if depth == 0 => {
                args.push(trim_range(text, arg_start, i));
                arg_start = i + 1;
            }
            b'"' | b'\'' => {
                i = quote_end(text, i, end).unwrap_or(end);
                continue;
            }
            b'{' if at(bytes, i, end, b"{{") => {
                i = template_end(text, i, end).unwrap_or(end);
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    args.push(trim_range(text, arg_start, end));
    args
}

/// Narrow `start..end` to exclude surrounding whitespace.
pub fn trim_range(text: &str, start: usize, end: usize) -> (usize, usize) {
    let slice = &text[start..end];
    let lead = slice.len() - slice.trim_start().len();
    let trail = slice.len() - slice.trim_end().len();
    if lead == slice.len() {
        return (start, start);
    }
    (start + lead, end - trail)
}

pub fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

pub fn is_ident_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// End of the identifier starting at `i`.
pub fn ident_end(text: &str, i: usize, end: usize) -> usize {
    let bytes = text.as_bytes();
    let mut j = i;
    while j < end && is_ident_continue(bytes[j]) {
        j += 1;
    }
    j
}

/// End of the dotted path `ident(.segment)*` starting at `i`.
pub fn path_end(text: &str, i: usize, end: usize) -> usize {
    let bytes = text.as_bytes();
    let mut j = ident_end(text, i, end);
    while j + 1 < end && bytes[j] == b'.' && is_ident_continue(bytes[j + 1]) {
        j = ident_end(text, j + 1, end);
    }
    j
}

/// First non-whitespace byte index at or after `i`.
pub fn skip_ws(text: &str, i: usize, end: usize) -> usize {
    let bytes = text.as_bytes();
    let mut j = i;
    while j < end && bytes[j].is_ascii_whitespace() {
        j += 1;
    }
    j
}

fn at(bytes: &[u8], i: usize, end: usize, pat: &[u8]) -> bool {
    i + pat.len() <= end && &bytes[i..i + pat.len()] == pat
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spans(text: &str) -> Vec<&str> {
        extract_templates(text, 0, text.len())
            .templates
            .iter()
            .map(|s| &text[s.start..s.end])
            .collect()
    }

    #[test]
    fn nested_templates_are_one_span() {
        let text = "a {{upper({{vars.x}})}} b {{input.y}}";
        assert_eq!(spans(text), vec!["{{upper({{vars.x}})}}", "{{input.y}}"]);
    }

    #[test]
    fn quoted_braces_stay_inside_the_span() {
        let text = r#"{{concat("}}", input.topic)}} and {{it's}}"#;
        assert_eq!(spans(text), vec![r#"{{concat("}}", input.topic)}}"#, "{{it's}}"]);
        assert!(extract_templates(text, 0, text.len()).unbalanced.is_empty());
        assert_eq!(template_end(text, 0, text.len()), Some(29));
        // Outside a span quotes are prose.
        let prose = r#"say "}}" then {{a.b}}"#;
        assert_eq!(spans(prose), vec!["{{a.b}}"]);
        assert_eq!(extract_templates(prose, 0, prose.len()).unbalanced, vec![Span::new(5, 7)]);
    }

    #[test]
    fn unclosed_and_stray_braces() {
        let text = "}} then {{vars.x";
        let out = extract_templates(text, 0, text.len());
        assert!(out.templates.is_empty());
        assert_eq!(out.unbalanced, vec![Span::new(0, 2), Span::new(8, text.len())]);
    }

    #[test]
    fn multibyte_text_is_safe() {
        let text = "héllo {{vars.naïve}} ✓";
        assert_eq!(spans(text), vec!["{{vars.naïve}}"]);
    }

    #[test]
    fn paren_matching_skips_quotes_and_templates() {
        let text = r#"concat(")", "{{f(}}", x)"#;
        assert_eq!(matching_paren(text, 6, text.len()), Some(text.len() - 1));
        assert_eq!(matching_paren("f(a", 1, 3), None);
    }

    #[test]
    fn args_split_on_top_level_commas() {
        let text = r#"a, f(b, c), "d,e", {{g(h, i)}}"#;
        let args: Vec<&str> = split_args(text, 0, text.len())
            .into_iter()
            .map(|(s, e)| &text[s..e])
            .collect();
        assert_eq!(args, vec!["a", "f(b, c)", r#""d,e""#, "{{g(h, i)}}"]);
        assert!(split_args("  ", 0, 2).is_empty());
    }

    #[test]
    fn dotted_path_extent() {
        let text = "vars.row.0 + 1";
        assert_eq!(path_end(text, 0, text.len()), 10);
        assert_eq!(path_end("vars. x", 0, 7), 4);
    }
}
