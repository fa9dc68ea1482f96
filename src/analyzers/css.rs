// SPDX-License-Identifier: PMPL-1.0-or-later
//! Color declaration extraction from HTML documents.
//!
//! Collects `color`, `background-color` and `background` declarations from
//! embedded `<style>` blocks and inline `style="..."` attributes. The CSS side
//! is a small permissive tokenizer (rule block / declaration / color literal),
//! not a CSS engine: there is no selector matching, specificity or inheritance.
//!
//! Each rule block or inline attribute that yields at least one color becomes
//! a group. Block rules are emitted before inline attributes, so within the
//! evaluator's document order an inline declaration always comes later and
//! overrides a block declaration.

use crate::analyzers::color::{looks_like_color, parse_color, Rgba};
use regex::Regex;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tracing::{debug, trace};

/// Which side of a pairing a declaration sets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorRole {
    Foreground,
    Background,
}

/// Where a declaration group came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclarationSource {
    /// A `selector { ... }` rule inside a `<style>` block
    Rule { selector: String },
    /// A `style="..."` attribute on an element
    Inline { element: String },
}

/// Elements whose own fill is a UI component rather than text
const CONTROL_ELEMENTS: &[&str] = &["button", "input", "select", "textarea"];

fn control_selector_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"(?i)(?:^|[\s>+~,(])(?:button|input|select|textarea)\b|\[role\s*=\s*["']?button["']?\s*\]"#,
        )
        .expect("valid regex")
    })
}

impl DeclarationSource {
    /// Whether this group styles a form control or button
    pub fn targets_ui_control(&self) -> bool {
        match self {
            DeclarationSource::Rule { selector } => control_selector_re().is_match(selector),
            DeclarationSource::Inline { element } => {
                CONTROL_ELEMENTS.contains(&element.as_str()) || element.ends_with("[role=button]")
            }
        }
    }

    /// Short label for logs
    pub fn label(&self) -> String {
        match self {
            DeclarationSource::Rule { selector } => selector.clone(),
            DeclarationSource::Inline { element } => format!("<{} style>", element),
        }
    }
}

/// A single resolved color declaration
#[derive(Debug, Clone, PartialEq)]
pub struct ColorDeclaration {
    pub role: ColorRole,
    /// The literal as written, after `!important` removal
    pub raw_literal: String,
    pub resolved: Rgba,
    pub group_id: usize,
    /// Font size of the group in points, when declared
    pub font_size_hint: Option<f64>,
    /// Numeric font weight of the group, when declared
    pub font_weight_hint: Option<u16>,
    pub source: DeclarationSource,
}

/// One `selector { body }` rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleBlock {
    pub selector: String,
    pub body: String,
}

/// A `name: value` pair with the name lowercased
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub name: String,
    pub value: String,
}

/// At-rules whose blocks contain ordinary style rules
const GROUPING_AT_RULES: &[&str] = &["media", "supports", "layer", "container", "document", "scope"];

/// Extract all color declarations from an HTML document, in override order
pub fn extract_declarations(html: &str) -> Vec<ColorDeclaration> {
    let document = Html::parse_document(html);
    let style_sel = Selector::parse("style").expect("valid selector");
    let inline_sel = Selector::parse("[style]").expect("valid selector");

    let mut out = Vec::new();
    let mut next_group = 0;

    for style in document.select(&style_sel) {
        let css: String = style.text().collect();
        for rule in parse_rules(&css) {
            let declarations = parse_declarations(&rule.body);
            let source = DeclarationSource::Rule { selector: rule.selector };
            if collect_group(&declarations, source, next_group, &mut out) {
                next_group += 1;
            }
        }
    }

    for element in document.select(&inline_sel) {
        let Some(style) = element.value().attr("style") else {
            continue;
        };
        let mut name = element.value().name().to_ascii_lowercase();
        if element
            .value()
            .attr("role")
            .is_some_and(|role| role.trim().eq_ignore_ascii_case("button"))
        {
            name.push_str("[role=button]");
        }
        let declarations = parse_declarations(style);
        let source = DeclarationSource::Inline { element: name };
        if collect_group(&declarations, source, next_group, &mut out) {
            next_group += 1;
        }
    }

    debug!(groups = next_group, declarations = out.len(), "extracted color declarations");
    out
}

/// Turn one group's declarations into color declarations; returns whether any were produced
fn collect_group(
    declarations: &[Declaration],
    source: DeclarationSource,
    group_id: usize,
    out: &mut Vec<ColorDeclaration>,
) -> bool {
    let mut size = None;
    let mut weight = None;
    for decl in declarations {
        match decl.name.as_str() {
            "font-size" => size = font_size_points(&decl.value).or(size),
            "font-weight" => weight = font_weight(&decl.value).or(weight),
            "font" => {
                let (s, w) = parse_font_shorthand(&decl.value);
                size = s.or(size);
                weight = w.or(weight);
            }
            _ => {}
        }
    }

    let before = out.len();
    for decl in declarations {
        let (role, literal) = match decl.name.as_str() {
            "color" => (ColorRole::Foreground, Some(decl.value.as_str())),
            "background-color" => (ColorRole::Background, Some(decl.value.as_str())),
            "background" => (ColorRole::Background, background_color_component(&decl.value)),
            _ => continue,
        };
        let Some(literal) = literal else {
            continue;
        };
        match parse_color(literal) {
            Ok(resolved) => out.push(ColorDeclaration {
                role,
                raw_literal: literal.to_string(),
                resolved,
                group_id,
                font_size_hint: size,
                font_weight_hint: weight,
                source: source.clone(),
            }),
            Err(err) => trace!(group = %source.label(), literal, %err, "dropping color literal"),
        }
    }
    out.len() > before
}

/// Replace `/* ... */` comments with a space; an unterminated comment runs to the end
pub fn strip_comments(css: &str) -> String {
    let mut out = String::with_capacity(css.len());
    let mut rest = css;
    while let Some(start) = rest.find("/*") {
        out.push_str(&rest[..start]);
        out.push(' ');
        match rest[start + 2..].find("*/") {
            Some(end) => rest = &rest[start + 2 + end + 2..],
            None => return out,
        }
    }
    out.push_str(rest);
    out
}

/// Index just past a quoted string starting at `start`
fn skip_string(bytes: &[u8], start: usize) -> usize {
    let quote = bytes[start];
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b if b == quote => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

/// Index of the `}` matching the `{` at `open`, or the end of input
fn block_end(bytes: &[u8], open: usize) -> usize {
    let mut depth = 0usize;
    let mut i = open;
    while i < bytes.len() {
        match bytes[i] {
            b'"' | b'\'' => {
                i = skip_string(bytes, i);
                continue;
            }
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return i;
                }
            }
            _ => {}
        }
        i += 1;
    }
    bytes.len()
}

/// Split a stylesheet into style rules, descending into grouping at-rules
pub fn parse_rules(css: &str) -> Vec<RuleBlock> {
    let css = strip_comments(css);
    let bytes = css.as_bytes();
    let mut rules = Vec::new();
    let mut prelude_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'"' | b'\'' => {
                i = skip_string(bytes, i);
                continue;
            }
            b';' | b'}' => prelude_start = i + 1,
            b'{' => {
                let prelude = css[prelude_start..i].trim();
                if let Some(at_rule) = prelude.strip_prefix('@') {
                    let name: String = at_rule
                        .chars()
                        .take_while(|c| c.is_ascii_alphanumeric() || *c == '-')
                        .collect::<String>()
                        .to_ascii_lowercase();
                    if GROUPING_AT_RULES.contains(&name.as_str()) {
                        i += 1;
                    } else {
                        i = (block_end(bytes, i) + 1).min(bytes.len());
                    }
                    prelude_start = i;
                    continue;
                }

                let end = block_end(bytes, i);
                if !prelude.is_empty() {
                    rules.push(RuleBlock {
                        selector: prelude.to_string(),
                        body: css[i + 1..end].to_string(),
                    });
                }
                i = (end + 1).min(bytes.len());
                prelude_start = i;
                continue;
            }
            _ => {}
        }
        i += 1;
    }

    rules
}

/// Split `value` on characters matching `is_sep` outside parentheses, braces and quotes.
/// Empty pieces are dropped.
fn split_top_level(value: &str, is_sep: impl Fn(u8) -> bool) -> Vec<&str> {
    let bytes = value.as_bytes();
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'"' | b'\'' => {
                i = skip_string(bytes, i);
                continue;
            }
            b'(' | b'{' | b'[' => depth += 1,
            b')' | b'}' | b']' => depth = (depth - 1).max(0),
            b if depth == 0 && is_sep(b) => {
                parts.push(&value[start..i]);
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    parts.push(&value[start.min(value.len())..]);

    parts
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect()
}

/// Remove a trailing `!important`
fn strip_important(value: &str) -> &str {
    let lower = value.to_ascii_lowercase();
    match lower.rfind("!important") {
        Some(pos) if lower[pos + "!important".len()..].trim().is_empty() => value[..pos].trim(),
        _ => value.trim(),
    }
}

/// Parse a declaration list (`a: b; c: d`); nested blocks are ignored
pub fn parse_declarations(body: &str) -> Vec<Declaration> {
    split_top_level(body, |b| b == b';')
        .into_iter()
        .filter(|piece| !piece.contains('{'))
        .filter_map(|piece| {
            let (name, value) = piece.split_once(':')?;
            let name = name.trim().to_ascii_lowercase();
            let value = strip_important(value);
            if name.is_empty() || value.is_empty() {
                return None;
            }
            Some(Declaration {
                name,
                value: value.to_string(),
            })
        })
        .collect()
}

/// Pick the color out of a `background` shorthand. Only the final layer may carry one.
pub fn background_color_component(value: &str) -> Option<&str> {
    let layers = split_top_level(value, |b| b == b',');
    let last = layers.last()?;
    split_top_level(last, |b| b.is_ascii_whitespace())
        .into_iter()
        .find(|token| looks_like_color(token))
}

fn leading_number(value: &str, suffix: &str) -> Option<f64> {
    let number: f64 = value.strip_suffix(suffix)?.trim().parse().ok()?;
    (number.is_finite() && number >= 0.0).then_some(number)
}

/// Convert a `font-size` value to points. Relative keywords and math functions give `None`.
pub fn font_size_points(value: &str) -> Option<f64> {
    let v = value.trim().to_ascii_lowercase();
    let px = match v.as_str() {
        "xx-small" => Some(9.0),
        "x-small" => Some(10.0),
        "small" => Some(13.0),
        "medium" => Some(16.0),
        "large" => Some(18.0),
        "x-large" => Some(24.0),
        "xx-large" => Some(32.0),
        "xxx-large" => Some(48.0),
        _ => None,
    };
    if let Some(px) = px {
        return Some(px * 0.75);
    }

    // longer suffixes first: "rem" before "em"
    let units: &[(&str, f64)] = &[
        ("rem", 12.0),
        ("em", 12.0),
        ("px", 0.75),
        ("pt", 1.0),
        ("pc", 12.0),
        ("in", 72.0),
        ("cm", 72.0 / 2.54),
        ("mm", 72.0 / 25.4),
        ("%", 0.12),
    ];
    units
        .iter()
        .find_map(|(unit, factor)| leading_number(&v, unit).map(|n| n * factor))
}

/// Numeric `font-weight`; `lighter`/`bolder` resolve against a normal parent
pub fn font_weight(value: &str) -> Option<u16> {
    match value.trim().to_ascii_lowercase().as_str() {
        "normal" => Some(400),
        "bold" | "bolder" => Some(700),
        "lighter" => Some(300),
        other => other.parse::<u16>().ok().filter(|w| (1..=1000).contains(w)),
    }
}

/// Size and weight from the `font` shorthand
pub fn parse_font_shorthand(value: &str) -> (Option<f64>, Option<u16>) {
    let mut weight = None;
    for token in split_top_level(value, |b| b.is_ascii_whitespace()) {
        let size_part = token.split('/').next().unwrap_or(token);
        if let Some(size) = font_size_points(size_part) {
            return (Some(size), weight);
        }
        if !token.eq_ignore_ascii_case("normal") {
            if let Some(w) = font_weight(token) {
                weight = Some(w);
            }
        }
    }
    (None, weight)
}
