//! Near-JSON repair pipeline.
//!
//! Models routinely emit "almost JSON": prose around the object, enum values
//! without quotes, doubled escapes, missing separators between objects,
//! trailing commas, unescaped quotes inside values. Each [`RepairRule`] is a
//! pure, idempotent text transform.
//! [`repair`] applies them in a fixed order and stops as soon as the text
//! parses; text that already parses comes back untouched.
//!
//! Rules that rewrite structure (quoting, separators, trailing commas) only
//! look at the text *outside* string literals.

use regex_lite::{Captures, Regex};
use std::sync::LazyLock;
use tracing::debug;

static BARE_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(:\s*)([A-Za-z_][A-Za-z0-9_\-]*)(\s*[,}\]])").expect("valid bare value pattern")
});

static ADJACENT_OBJECTS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\}(\s*)\{").expect("valid adjacent object pattern"));

static TRAILING_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",(\s*)([}\]])").expect("valid trailing separator pattern"));

/// One text transform of the pipeline, in application order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairRule {
    /// Keep only the substring from the first `{` to the last `}`.
    ExtractObject,
    /// `field: HIGH` → `field: "HIGH"`, except `true` / `false` / `null`.
    QuoteBareValues,
    /// `\\u00e4` → `ä`; a doubled backslash before a simple escape is kept.
    CollapseDoubleEscapes,
    /// `}{` → `},{`.
    SeparateAdjacentObjects,
    /// `,}` → `}` and `,]` → `]`.
    DropTrailingSeparators,
    /// `"a": "say "hi" now"` → `"a": "say \"hi\" now"`.
    EscapeInnerQuotes,
    /// Raw newlines, tabs and other control characters inside strings.
    EscapeControlChars,
}

impl RepairRule {
    pub const PIPELINE: [RepairRule; 7] = [
        RepairRule::ExtractObject,
        RepairRule::QuoteBareValues,
        RepairRule::CollapseDoubleEscapes,
        RepairRule::SeparateAdjacentObjects,
        RepairRule::DropTrailingSeparators,
        RepairRule::EscapeInnerQuotes,
        RepairRule::EscapeControlChars,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            RepairRule::ExtractObject => "extract_object",
            RepairRule::QuoteBareValues => "quote_bare_values",
            RepairRule::CollapseDoubleEscapes => "collapse_double_escapes",
            RepairRule::SeparateAdjacentObjects => "separate_adjacent_objects",
            RepairRule::DropTrailingSeparators => "drop_trailing_separators",
            RepairRule::EscapeInnerQuotes => "escape_inner_quotes",
            RepairRule::EscapeControlChars => "escape_control_chars",
        }
    }

    /// Apply this rule alone.
    pub fn apply(&self, text: &str) -> String {
        match self {
            RepairRule::ExtractObject => extract_object(text).to_string(),
            RepairRule::QuoteBareValues => map_code(text, |code| {
                BARE_VALUE.replace_all(code, quote_bare_value).into_owned()
            }),
            RepairRule::CollapseDoubleEscapes => collapse_double_escapes(text),
            RepairRule::SeparateAdjacentObjects => map_code(text, |code| {
                ADJACENT_OBJECTS.replace_all(code, "},${1}{").into_owned()
            }),
            RepairRule::DropTrailingSeparators => map_code(text, |code| {
                TRAILING_SEPARATOR.replace_all(code, "${1}${2}").into_owned()
            }),
            RepairRule::EscapeInnerQuotes => escape_inner_quotes(text),
            RepairRule::EscapeControlChars => map_strings(text, escape_control_chars),
        }
    }
}

/// The outcome of running the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repaired {
    pub text: String,
    /// Rules that changed the text, in order.
    pub applied: Vec<RepairRule>,
}

impl Repaired {
    pub fn is_unchanged(&self) -> bool {
        self.applied.is_empty()
    }
}

/// Repair near-JSON text. Text that already parses is returned as is.
pub fn repair(text: &str) -> String {
    repair_with_report(text).text
}

/// Like [`repair`], reporting which rules fired.
pub fn repair_with_report(text: &str) -> Repaired {
    let mut current = text.to_string();
    let mut applied = Vec::new();

    if parses(&current) {
        return Repaired { text: current, applied };
    }

    for rule in RepairRule::PIPELINE {
        let next = rule.apply(&current);
        if next == current {
            continue;
        }
        debug!(rule = rule.name(), "Applied repair rule");
        applied.push(rule);
        current = next;
        if parses(&current) {
            break;
        }
    }

    Repaired { text: current, applied }
}

fn parses(text: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(text).is_ok()
}

fn extract_object(text: &str) -> &str {
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => text,
    }
}

fn quote_bare_value(caps: &Captures<'_>) -> String {
    let token = &caps[2];
    if matches!(token, "true" | "false" | "null") {
        caps[0].to_string()
    } else {
        format!("{}\"{}\"{}", &caps[1], token, &caps[3])
    }
}

fn is_simple_escape(c: char) -> bool {
    matches!(c, '"' | '\\' | '/' | 'b' | 'f' | 'n' | 'r' | 't')
}

fn collapse_double_escapes(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;

    while i < chars.len() {
        if chars[i] == '\\' && chars.get(i + 1) == Some(&'\\') {
            match chars.get(i + 2) {
                Some(&next) if !is_simple_escape(next) => out.push('\\'),
                _ => out.push_str("\\\\"),
            }
            i += 2;
        } else {
            out.push(chars[i]);
            i += 1;
        }
    }

    out
}

/// Inside a string that follows a `:`, a quote only closes the string when
/// the next non-space char is `,` `}` `]` or the text ends. Any other quote
/// there gets escaped. Keys and array items are left alone.
fn escape_inner_quotes(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut in_value = false;
    let mut escaped = false;
    let mut last_code = None;

    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                if in_value && !closes_value(&chars[i + 1..]) {
                    out.push('\\');
                } else {
                    in_string = false;
                    last_code = Some('"');
                }
            }
            out.push(c);
            continue;
        }

        if c == '"' {
            in_string = true;
            in_value = last_code == Some(':');
        } else if !c.is_whitespace() {
            last_code = Some(c);
        }
        out.push(c);
    }

    out
}

fn closes_value(rest: &[char]) -> bool {
    matches!(
        rest.iter().copied().find(|c| !c.is_whitespace()),
        None | Some(',' | '}' | ']')
    )
}

fn escape_control_chars(literal: &str) -> String {
    let mut out = String::with_capacity(literal.len());
    let mut escaped = false;

    for c in literal.chars() {
        if escaped {
            out.push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' => {
                out.push(c);
                escaped = true;
            }
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }

    out
}

/// A slice of the input: either structural text or a string literal
/// (quotes included).
#[derive(Debug, PartialEq, Eq)]
enum Segment<'a> {
    Code(&'a str),
    Literal(&'a str),
}

/// Split text into code and string-literal segments. An unterminated
/// literal runs to the end of the text.
fn segments(text: &str) -> Vec<Segment<'_>> {
    let bytes = text.as_bytes();
    let mut out = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'"' {
            i += 1;
            continue;
        }
        if start < i {
            out.push(Segment::Code(&text[start..i]));
        }
        let open = i;
        i += 1;
        while i < bytes.len() {
            match bytes[i] {
                b'\\' => i += 2,
                b'"' => {
                    i += 1;
                    break;
                }
                _ => i += 1,
            }
        }
        let end = i.min(bytes.len());
        out.push(Segment::Literal(&text[open..end]));
        start = end;
        i = end;
    }

    if start < bytes.len() {
        out.push(Segment::Code(&text[start..]));
    }
    out
}

fn map_code(text: &str, f: impl Fn(&str) -> String) -> String {
    segments(text)
        .into_iter()
        .map(|segment| match segment {
            Segment::Code(code) => f(code),
            Segment::Literal(literal) => literal.to_string(),
        })
        .collect()
}

fn map_strings(text: &str, f: impl Fn(&str) -> String) -> String {
    segments(text)
        .into_iter()
        .map(|segment| match segment {
            Segment::Code(code) => code.to_string(),
            Segment::Literal(literal) => f(literal),
        })
        .collect()
}
