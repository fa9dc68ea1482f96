// SPDX-License-Identifier: PMPL-1.0-or-later
//! Color contrast evaluation - WCAG 1.4.3 Contrast (Minimum), Level AA
//!
//! Pairs the declarations of each group, composites translucent colors,
//! and checks the WCAG contrast ratio against the AA thresholds:
//! - 4.5:1 for normal text
//! - 3:1 for large text (>= 18pt, or >= 14pt bold) and UI components

use crate::analyzers::color::Rgba;
use crate::analyzers::css::{ColorDeclaration, ColorRole};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// AA threshold for normal text
pub const NORMAL_TEXT_THRESHOLD: f64 = 4.5;

/// AA threshold for large text and UI components
pub const LARGE_TEXT_THRESHOLD: f64 = 3.0;

/// What kind of content a pairing is judged as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContrastCategory {
    NormalText,
    LargeText,
    UiComponent,
}

impl ContrastCategory {
    /// Minimum ratio required at Level AA
    pub fn required_threshold(self) -> f64 {
        match self {
            ContrastCategory::NormalText => NORMAL_TEXT_THRESHOLD,
            ContrastCategory::LargeText | ContrastCategory::UiComponent => LARGE_TEXT_THRESHOLD,
        }
    }
}

impl std::fmt::Display for ContrastCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContrastCategory::NormalText => write!(f, "normal text"),
            ContrastCategory::LargeText => write!(f, "large text"),
            ContrastCategory::UiComponent => write!(f, "UI component"),
        }
    }
}

/// Foreground/background pair of one declaration group, before compositing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorPairing {
    pub foreground: Rgba,
    pub background: Rgba,
    pub is_large_text: bool,
    pub group_id: usize,
    /// Whether the foreground was substituted by the default rule
    #[serde(default)]
    pub foreground_assumed: bool,
    /// Whether the background was substituted by the default rule
    #[serde(default)]
    pub background_assumed: bool,
}

/// The verdict for one pairing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContrastResult {
    #[serde(flatten)]
    pub pairing: ColorPairing,
    pub ratio: f64,
    pub threshold: f64,
    pub category: ContrastCategory,
    pub passes: bool,
}

/// Background used when a group only sets a foreground
pub fn default_background() -> Rgba {
    Rgba::WHITE
}

/// Foreground used when a group only sets a background
pub fn default_foreground() -> Rgba {
    Rgba::BLACK
}

/// Fill in the missing side of a pairing.
///
/// | foreground | background | pairing                 |
/// |------------|------------|-------------------------|
/// | set        | set        | as declared             |
/// | set        | absent     | foreground on white     |
/// | absent     | set        | black on background     |
/// | absent     | absent     | none                    |
pub fn resolve_pair(foreground: Option<Rgba>, background: Option<Rgba>) -> Option<(Rgba, Rgba)> {
    match (foreground, background) {
        (Some(fg), Some(bg)) => Some((fg, bg)),
        (Some(fg), None) => Some((fg, default_background())),
        (None, Some(bg)) => Some((default_foreground(), bg)),
        (None, None) => None,
    }
}

/// Large text is at least 18pt, or at least 14pt and bold (weight >= 700).
/// Without a known size the text is treated as normal, the stricter case.
pub fn is_large_text(font_size_pt: Option<f64>, font_weight: Option<u16>) -> bool {
    match font_size_pt {
        Some(size) if size >= 18.0 => true,
        Some(size) if size >= 14.0 => font_weight.is_some_and(|w| w >= 700),
        _ => false,
    }
}

/// Category of a group.
///
/// A group that only fills the background of a button or form control is a
/// UI component; everything else is text, large or normal.
pub fn categorize(is_large_text: bool, ui_control_fill: bool) -> ContrastCategory {
    if ui_control_fill {
        ContrastCategory::UiComponent
    } else if is_large_text {
        ContrastCategory::LargeText
    } else {
        ContrastCategory::NormalText
    }
}

/// Relative luminance per WCAG 2.x, from channels in `[0, 1]`
/// <https://www.w3.org/TR/WCAG21/#dfn-relative-luminance>
pub fn relative_luminance(color: Rgba) -> f64 {
    let linear = |c: f64| {
        if c <= 0.03928 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        }
    };
    0.2126 * linear(color.r) + 0.7152 * linear(color.g) + 0.0722 * linear(color.b)
}

/// Contrast ratio between two opaque colors, in `[1, 21]`
pub fn contrast_ratio(a: Rgba, b: Rgba) -> f64 {
    let l1 = relative_luminance(a);
    let l2 = relative_luminance(b);
    let (lighter, darker) = if l1 > l2 { (l1, l2) } else { (l2, l1) };
    ((lighter + 0.05) / (darker + 0.05)).clamp(1.0, 21.0)
}

/// Flatten translucent colors: the background over white, then the
/// foreground over that background.
pub fn composite_pair(foreground: Rgba, background: Rgba) -> (Rgba, Rgba) {
    let background = background.composite_over(Rgba::WHITE);
    let foreground = foreground.composite_over(background);
    (foreground, background)
}

/// Per-group state while folding declarations
#[derive(Default)]
struct GroupState {
    foreground: Option<Rgba>,
    background: Option<Rgba>,
    font_size: Option<f64>,
    font_weight: Option<u16>,
    ui_control: bool,
}

/// Evaluate an ordered declaration sequence, one result per group
pub fn evaluate(declarations: &[ColorDeclaration]) -> Vec<ContrastResult> {
    let mut groups: BTreeMap<usize, GroupState> = BTreeMap::new();

    for decl in declarations {
        let state = groups.entry(decl.group_id).or_default();
        match decl.role {
            ColorRole::Foreground => state.foreground = Some(decl.resolved),
            ColorRole::Background => state.background = Some(decl.resolved),
        }
        state.font_size = decl.font_size_hint.or(state.font_size);
        state.font_weight = decl.font_weight_hint.or(state.font_weight);
        state.ui_control |= decl.source.targets_ui_control();
    }

    groups
        .into_iter()
        .filter_map(|(group_id, state)| {
            let (fg, bg) = resolve_pair(state.foreground, state.background)?;
            let large = is_large_text(state.font_size, state.font_weight);
            let category = categorize(large, state.ui_control && state.foreground.is_none());
            let pairing = ColorPairing {
                foreground: fg,
                background: bg,
                is_large_text: large,
                group_id,
                foreground_assumed: state.foreground.is_none(),
                background_assumed: state.background.is_none(),
            };
            Some(evaluate_pairing(pairing, category))
        })
        .collect()
}

/// Score a single pairing
pub fn evaluate_pairing(pairing: ColorPairing, category: ContrastCategory) -> ContrastResult {
    let (fg, bg) = composite_pair(pairing.foreground, pairing.background);
    let ratio = contrast_ratio(fg, bg);
    let threshold = category.required_threshold();
    ContrastResult {
        pairing,
        ratio,
        threshold,
        category,
        passes: ratio >= threshold,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::color::parse_color;
    use crate::analyzers::css::extract_declarations;

    fn color(value: &str) -> Rgba {
        parse_color(value).unwrap()
    }

    #[test]
    fn test_contrast_ratio_black_white() {
        assert_eq!(contrast_ratio(Rgba::BLACK, Rgba::WHITE), 21.0);
        assert_eq!(contrast_ratio(Rgba::WHITE, Rgba::BLACK), 21.0);
    }

    #[test]
    fn test_contrast_ratio_same_color() {
        for value in ["#000", "#fff", "#808080", "navy", "hsl(33, 40%, 60%)"] {
            assert_eq!(contrast_ratio(color(value), color(value)), 1.0);
        }
    }

    #[test]
    fn test_contrast_ratio_symmetry() {
        let a = Rgba::from_rgb8(100, 50, 200);
        let b = Rgba::from_rgb8(200, 200, 50);
        assert_eq!(contrast_ratio(a, b), contrast_ratio(b, a));
    }

    #[test]
    fn test_known_ratios() {
        let gray = contrast_ratio(color("#767676"), Rgba::WHITE);
        assert!((gray - 4.54).abs() < 0.01, "#767676 on white: {:.3}", gray);
        let red = contrast_ratio(color("red"), Rgba::WHITE);
        assert!((red - 4.0).abs() < 0.01, "red on white: {:.3}", red);
    }

    #[test]
    fn test_relative_luminance() {
        assert_eq!(relative_luminance(Rgba::WHITE), 1.0);
        assert_eq!(relative_luminance(Rgba::BLACK), 0.0);
        let mid = relative_luminance(Rgba::from_rgb8(128, 128, 128));
        assert!((mid - 0.2159).abs() < 0.001);
    }

    #[test]
    fn test_default_substitution_table() {
        let red = color("red");
        assert_eq!(resolve_pair(Some(red), Some(red)), Some((red, red)));
        assert_eq!(resolve_pair(Some(red), None), Some((red, Rgba::WHITE)));
        assert_eq!(resolve_pair(None, Some(red)), Some((Rgba::BLACK, red)));
        assert_eq!(resolve_pair(None, None), None);
    }

    #[test]
    fn test_large_text_rules() {
        assert!(is_large_text(Some(18.0), None));
        assert!(is_large_text(Some(14.0), Some(700)));
        assert!(!is_large_text(Some(14.0), Some(400)));
        assert!(!is_large_text(Some(14.0), None));
        assert!(!is_large_text(Some(12.0), Some(900)));
        assert!(!is_large_text(None, Some(700)));
    }

    #[test]
    fn test_gray_777_fails_on_default_white() {
        let results = evaluate(&extract_declarations("<style>p { color: #777777 }</style>"));
        assert_eq!(results.len(), 1);
        let r = &results[0];
        assert!(r.pairing.background_assumed);
        assert_eq!(r.pairing.background, Rgba::WHITE);
        assert!((r.ratio - 4.48).abs() < 0.01, "ratio {:.4}", r.ratio);
        assert_eq!(r.threshold, 4.5);
        assert_eq!(r.category, ContrastCategory::NormalText);
        assert!(!r.passes);
    }

    #[test]
    fn test_gray_777_passes_as_large_text() {
        let results = evaluate(&extract_declarations(
            "<style>h1 { color: #777777; font-size: 24px }</style>",
        ));
        assert_eq!(results[0].category, ContrastCategory::LargeText);
        assert_eq!(results[0].threshold, 3.0);
        assert!(results[0].passes);
    }

    #[test]
    fn test_translucent_foreground_composites_to_mid_gray() {
        let (fg, bg) = composite_pair(color("rgba(0,0,0,0.5)"), default_background());
        assert_eq!(bg, Rgba::WHITE);
        let (r, g, b) = fg.to_rgb8();
        assert!((127..=128).contains(&r) && r == g && g == b);

        let results = evaluate(&extract_declarations(r#"<p style="color: rgba(0,0,0,0.5)">x</p>"#));
        let expected = contrast_ratio(Rgba::new(0.5, 0.5, 0.5, 1.0), Rgba::WHITE);
        assert!((results[0].ratio - expected).abs() < 1e-12);
    }

    #[test]
    fn test_translucent_background_composites_over_white() {
        let (_, bg) = composite_pair(Rgba::BLACK, Rgba::new(0.0, 0.0, 0.0, 0.5));
        assert!((bg.r - 0.5).abs() < 1e-12 && bg.is_opaque());
    }

    #[test]
    fn test_later_declaration_overrides_within_group() {
        let results = evaluate(&extract_declarations(
            "<style>p { color: #fff; color: #000; background: #fff }</style>",
        ));
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].ratio, 21.0);
    }

    #[test]
    fn test_background_only_group_uses_black() {
        let results = evaluate(&extract_declarations("<style>.x { background-color: navy }</style>"));
        assert!(results[0].pairing.foreground_assumed);
        assert_eq!(results[0].pairing.foreground, Rgba::BLACK);
        assert_eq!(results[0].category, ContrastCategory::NormalText);
        assert!(!results[0].passes);
    }

    #[test]
    fn test_button_fill_is_ui_component() {
        let results = evaluate(&extract_declarations(
            "<style>button { background: #595959 } button.primary { color: #fff; background: #595959 }</style>",
        ));
        assert_eq!(results[0].category, ContrastCategory::UiComponent);
        assert_eq!(results[0].threshold, 3.0);
        assert_eq!(results[1].category, ContrastCategory::NormalText);
    }

    #[test]
    fn test_thresholds_are_exact() {
        for category in [
            ContrastCategory::NormalText,
            ContrastCategory::LargeText,
            ContrastCategory::UiComponent,
        ] {
            let t = category.required_threshold();
            assert!(t == 3.0 || t == 4.5);
        }
    }

    #[test]
    fn test_result_serialization_shape() {
        let results = evaluate(&extract_declarations("<style>p { color: red; background: white }</style>"));
        let json = serde_json::to_value(&results[0]).unwrap();
        assert_eq!(json["foreground"], "#ff0000");
        assert_eq!(json["background"], "#ffffff");
        assert_eq!(json["threshold"], 4.5);
        assert_eq!(json["category"], "normal_text");
        assert_eq!(json["passes"], false);
    }
}
