// SPDX-License-Identifier: PMPL-1.0-or-later
//! CSS color literal parsing.
//!
//! Accepts the literal forms that show up in real-world stylesheets:
//! hex (`#rgb`, `#rgba`, `#rrggbb`, `#rrggbbaa`), the CSS named colors,
//! `rgb()`/`rgba()` and `hsl()`/`hsla()` in both the comma and the
//! space/slash syntax. Components are normalized to `[0, 1]`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// A color with straight (non-premultiplied) alpha, every channel in `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

impl Rgba {
    pub const WHITE: Rgba = Rgba { r: 1.0, g: 1.0, b: 1.0, a: 1.0 };
    pub const BLACK: Rgba = Rgba { r: 0.0, g: 0.0, b: 0.0, a: 1.0 };

    /// Build a color, clamping every channel into `[0, 1]`
    pub fn new(r: f64, g: f64, b: f64, a: f64) -> Self {
        Self {
            r: unit(r),
            g: unit(g),
            b: unit(b),
            a: unit(a),
        }
    }

    /// Opaque color from 8-bit channels
    pub fn from_rgb8(r: u8, g: u8, b: u8) -> Self {
        Self::new(r as f64 / 255.0, g as f64 / 255.0, b as f64 / 255.0, 1.0)
    }

    pub fn is_opaque(&self) -> bool {
        self.a >= 1.0
    }

    /// Porter-Duff "source over" of `self` onto `backdrop`.
    pub fn composite_over(self, backdrop: Rgba) -> Rgba {
        if self.is_opaque() {
            return self;
        }
        let out_a = self.a + backdrop.a * (1.0 - self.a);
        if out_a <= 0.0 {
            return Rgba::new(0.0, 0.0, 0.0, 0.0);
        }
        let blend = |src: f64, dst: f64| {
            (src * self.a + dst * backdrop.a * (1.0 - self.a)) / out_a
        };
        Rgba::new(
            blend(self.r, backdrop.r),
            blend(self.g, backdrop.g),
            blend(self.b, backdrop.b),
            out_a,
        )
    }

    /// Channels rounded to 8 bits
    pub fn to_rgb8(&self) -> (u8, u8, u8) {
        (byte(self.r), byte(self.g), byte(self.b))
    }

    /// `#rrggbb`, or `#rrggbbaa` when not fully opaque
    pub fn to_hex(&self) -> String {
        let (r, g, b) = self.to_rgb8();
        if self.is_opaque() {
            format!("#{:02x}{:02x}{:02x}", r, g, b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", r, g, b, byte(self.a))
        }
    }
}

impl std::fmt::Display for Rgba {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for Rgba {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Rgba {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        parse_hex_color(&hex).map_err(serde::de::Error::custom)
    }
}

fn unit(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}

fn byte(v: f64) -> u8 {
    (unit(v) * 255.0).round() as u8
}

/// Why a literal was not accepted as a color
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ColorParseError {
    #[error("empty color value")]
    Empty,

    #[error("'{0}' is a keyword, not a concrete color")]
    Keyword(String),

    #[error("invalid hex color '{0}'")]
    InvalidHex(String),

    #[error("{function}() takes 3 or 4 components, got {found}")]
    Arity { function: String, found: usize },

    #[error("invalid color component '{0}'")]
    InvalidComponent(String),

    #[error("unrecognized color '{0}'")]
    Unknown(String),
}

/// Values that are legal in `color`/`background-color` but carry no color of their own
const NON_COLOR_KEYWORDS: &[&str] = &[
    "transparent", "inherit", "initial", "unset", "currentcolor",
    "none", "auto", "revert", "revert-layer",
];

/// Parse any supported CSS color literal
pub fn parse_color(value: &str) -> Result<Rgba, ColorParseError> {
    let value = value.trim().to_ascii_lowercase();
    if value.is_empty() {
        return Err(ColorParseError::Empty);
    }
    if NON_COLOR_KEYWORDS.contains(&value.as_str()) {
        return Err(ColorParseError::Keyword(value));
    }

    if value.starts_with('#') {
        parse_hex_color(&value)
    } else if value.starts_with("rgb") {
        parse_rgb_function(&value)
    } else if value.starts_with("hsl") {
        parse_hsl_function(&value)
    } else {
        parse_named_color(&value).ok_or(ColorParseError::Unknown(value))
    }
}

/// Whether a single token could be a color literal (used to pick colors out of shorthands)
pub fn looks_like_color(token: &str) -> bool {
    parse_color(token).is_ok()
}

/// Parse `#rgb`, `#rgba`, `#rrggbb` or `#rrggbbaa`
pub fn parse_hex_color(hex: &str) -> Result<Rgba, ColorParseError> {
    let digits = hex.trim().trim_start_matches('#');
    let invalid = || ColorParseError::InvalidHex(hex.to_string());
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid());
    }

    let nibble = |i: usize| -> Result<u8, ColorParseError> {
        let d = u8::from_str_radix(&digits[i..i + 1], 16).map_err(|_| invalid())?;
        Ok(d * 17)
    };
    let pair = |i: usize| -> Result<u8, ColorParseError> {
        u8::from_str_radix(&digits[i..i + 2], 16).map_err(|_| invalid())
    };

    let (r, g, b, a) = match digits.len() {
        3 => (nibble(0)?, nibble(1)?, nibble(2)?, 255),
        4 => (nibble(0)?, nibble(1)?, nibble(2)?, nibble(3)?),
        6 => (pair(0)?, pair(2)?, pair(4)?, 255),
        8 => (pair(0)?, pair(2)?, pair(4)?, pair(6)?),
        _ => return Err(invalid()),
    };

    Ok(Rgba::new(
        r as f64 / 255.0,
        g as f64 / 255.0,
        b as f64 / 255.0,
        a as f64 / 255.0,
    ))
}

/// Split `name(args)` into its argument list, accepting both
/// `a, b, c, d` and `a b c / d`.
fn function_args<'a>(value: &'a str, names: &[&str]) -> Result<Vec<&'a str>, ColorParseError> {
    let open = value
        .find('(')
        .ok_or_else(|| ColorParseError::Unknown(value.to_string()))?;
    let name = value[..open].trim();
    if !names.contains(&name) {
        return Err(ColorParseError::Unknown(value.to_string()));
    }
    let inner = value[open + 1..]
        .trim_end()
        .strip_suffix(')')
        .ok_or_else(|| ColorParseError::Unknown(value.to_string()))?;

    let args: Vec<&str> = inner
        .split(|c: char| c == ',' || c == '/' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .collect();

    if !(3..=4).contains(&args.len()) {
        return Err(ColorParseError::Arity {
            function: name.to_string(),
            found: args.len(),
        });
    }
    Ok(args)
}

fn number(token: &str) -> Result<f64, ColorParseError> {
    let parsed: f64 = token
        .parse()
        .map_err(|_| ColorParseError::InvalidComponent(token.to_string()))?;
    if parsed.is_finite() {
        Ok(parsed)
    } else {
        Err(ColorParseError::InvalidComponent(token.to_string()))
    }
}

/// Number or percentage, as a fraction of `scale`
fn scaled(token: &str, scale: f64) -> Result<f64, ColorParseError> {
    match token.strip_suffix('%') {
        Some(pct) => Ok(number(pct)? / 100.0),
        None => Ok(number(token)? / scale),
    }
}

fn alpha(args: &[&str]) -> Result<f64, ColorParseError> {
    match args.get(3) {
        Some(token) => scaled(token, 1.0),
        None => Ok(1.0),
    }
}

/// Parse `rgb()`/`rgba()` with 0-255 numbers or percentages
pub fn parse_rgb_function(value: &str) -> Result<Rgba, ColorParseError> {
    let args = function_args(value, &["rgb", "rgba"])?;
    Ok(Rgba::new(
        scaled(args[0], 255.0)?,
        scaled(args[1], 255.0)?,
        scaled(args[2], 255.0)?,
        alpha(&args)?,
    ))
}

/// Hue in degrees; accepts `deg`, `rad`, `grad` and `turn` units
fn hue_degrees(token: &str) -> Result<f64, ColorParseError> {
    if let Some(v) = token.strip_suffix("deg") {
        number(v)
    } else if let Some(v) = token.strip_suffix("grad") {
        Ok(number(v)? * 0.9)
    } else if let Some(v) = token.strip_suffix("rad") {
        Ok(number(v)?.to_degrees())
    } else if let Some(v) = token.strip_suffix("turn") {
        Ok(number(v)? * 360.0)
    } else {
        number(token)
    }
}

/// Parse `hsl()`/`hsla()`; saturation and lightness are percentages
pub fn parse_hsl_function(value: &str) -> Result<Rgba, ColorParseError> {
    let args = function_args(value, &["hsl", "hsla"])?;
    let h = hue_degrees(args[0])?;
    let s = number(args[1].trim_end_matches('%'))? / 100.0;
    let l = number(args[2].trim_end_matches('%'))? / 100.0;
    let (r, g, b) = hsl_to_rgb(h, s.clamp(0.0, 1.0), l.clamp(0.0, 1.0));
    Ok(Rgba::new(r, g, b, alpha(&args)?))
}

/// Standard HSL to RGB conversion; hue in degrees, `s`/`l` in `[0, 1]`
pub fn hsl_to_rgb(h: f64, s: f64, l: f64) -> (f64, f64, f64) {
    let h = h.rem_euclid(360.0);
    let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
    let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
    let m = l - c / 2.0;

    let (r1, g1, b1) = match h {
        h if h < 60.0 => (c, x, 0.0),
        h if h < 120.0 => (x, c, 0.0),
        h if h < 180.0 => (0.0, c, x),
        h if h < 240.0 => (0.0, x, c),
        h if h < 300.0 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };

    (r1 + m, g1 + m, b1 + m)
}

/// Look up one of the CSS named colors
pub fn parse_named_color(name: &str) -> Option<Rgba> {
    NAMED_COLORS
        .binary_search_by(|(n, _)| (*n).cmp(name))
        .ok()
        .map(|idx| {
            let (r, g, b) = NAMED_COLORS[idx].1;
            Rgba::from_rgb8(r, g, b)
        })
}

/// CSS named colors, sorted by name for binary search
static NAMED_COLORS: &[(&str, (u8, u8, u8))] = &[
    ("aliceblue", (240, 248, 255)),
    ("antiquewhite", (250, 235, 215)),
    ("aqua", (0, 255, 255)),
    ("aquamarine", (127, 255, 212)),
    ("azure", (240, 255, 255)),
    ("beige", (245, 245, 220)),
    ("bisque", (255, 228, 196)),
    ("black", (0, 0, 0)),
    ("blanchedalmond", (255, 235, 205)),
    ("blue", (0, 0, 255)),
    ("blueviolet", (138, 43, 226)),
    ("brown", (165, 42, 42)),
    ("burlywood", (222, 184, 135)),
    ("cadetblue", (95, 158, 160)),
    ("chartreuse", (127, 255, 0)),
    ("chocolate", (210, 105, 30)),
    ("coral", (255, 127, 80)),
    ("cornflowerblue", (100, 149, 237)),
    ("cornsilk", (255, 248, 220)),
    ("crimson", (220, 20, 60)),
    ("cyan", (0, 255, 255)),
    ("darkblue", (0, 0, 139)),
    ("darkcyan", (0, 139, 139)),
    ("darkgoldenrod", (184, 134, 11)),
    ("darkgray", (169, 169, 169)),
    ("darkgreen", (0, 100, 0)),
    ("darkgrey", (169, 169, 169)),
    ("darkkhaki", (189, 183, 107)),
    ("darkmagenta", (139, 0, 139)),
    ("darkolivegreen", (85, 107, 47)),
    ("darkorange", (255, 140, 0)),
    ("darkorchid", (153, 50, 204)),
    ("darkred", (139, 0, 0)),
    ("darksalmon", (233, 150, 122)),
    ("darkseagreen", (143, 188, 143)),
    ("darkslateblue", (72, 61, 139)),
    ("darkslategray", (47, 79, 79)),
    ("darkslategrey", (47, 79, 79)),
    ("darkturquoise", (0, 206, 209)),
    ("darkviolet", (148, 0, 211)),
    ("deeppink", (255, 20, 147)),
    ("deepskyblue", (0, 191, 255)),
    ("dimgray", (105, 105, 105)),
    ("dimgrey", (105, 105, 105)),
    ("dodgerblue", (30, 144, 255)),
    ("firebrick", (178, 34, 34)),
    ("floralwhite", (255, 250, 240)),
    ("forestgreen", (34, 139, 34)),
    ("fuchsia", (255, 0, 255)),
    ("gainsboro", (220, 220, 220)),
    ("ghostwhite", (248, 248, 255)),
    ("gold", (255, 215, 0)),
    ("goldenrod", (218, 165, 32)),
    ("gray", (128, 128, 128)),
    ("green", (0, 128, 0)),
    ("greenyellow", (173, 255, 47)),
    ("grey", (128, 128, 128)),
    ("honeydew", (240, 255, 240)),
    ("hotpink", (255, 105, 180)),
    ("indianred", (205, 92, 92)),
    ("indigo", (75, 0, 130)),
    ("ivory", (255, 255, 240)),
    ("khaki", (240, 230, 140)),
    ("lavender", (230, 230, 250)),
    ("lavenderblush", (255, 240, 245)),
    ("lawngreen", (124, 252, 0)),
    ("lemonchiffon", (255, 250, 205)),
    ("lightblue", (173, 216, 230)),
    ("lightcoral", (240, 128, 128)),
    ("lightcyan", (224, 255, 255)),
    ("lightgoldenrodyellow", (250, 250, 210)),
    ("lightgray", (211, 211, 211)),
    ("lightgreen", (144, 238, 144)),
    ("lightgrey", (211, 211, 211)),
    ("lightpink", (255, 182, 193)),
    ("lightsalmon", (255, 160, 122)),
    ("lightseagreen", (32, 178, 170)),
    ("lightskyblue", (135, 206, 250)),
    ("lightslategray", (119, 136, 153)),
    ("lightslategrey", (119, 136, 153)),
    ("lightsteelblue", (176, 196, 222)),
    ("lightyellow", (255, 255, 224)),
    ("lime", (0, 255, 0)),
    ("limegreen", (50, 205, 50)),
    ("linen", (250, 240, 230)),
    ("magenta", (255, 0, 255)),
    ("maroon", (128, 0, 0)),
    ("mediumaquamarine", (102, 205, 170)),
    ("mediumblue", (0, 0, 205)),
    ("mediumorchid", (186, 85, 211)),
    ("mediumpurple", (147, 111, 219)),
    ("mediumseagreen", (60, 179, 113)),
    ("mediumslateblue", (123, 104, 238)),
    ("mediumspringgreen", (0, 250, 154)),
    ("mediumturquoise", (72, 209, 204)),
    ("mediumvioletred", (199, 21, 133)),
    ("midnightblue", (25, 25, 112)),
    ("mintcream", (245, 255, 250)),
    ("mistyrose", (255, 228, 225)),
    ("moccasin", (255, 228, 181)),
    ("navajowhite", (255, 222, 173)),
    ("navy", (0, 0, 128)),
    ("oldlace", (253, 245, 230)),
    ("olive", (128, 128, 0)),
    ("olivedrab", (107, 142, 35)),
    ("orange", (255, 165, 0)),
    ("orangered", (255, 69, 0)),
    ("orchid", (218, 112, 214)),
    ("palegoldenrod", (238, 232, 170)),
    ("palegreen", (152, 251, 152)),
    ("paleturquoise", (175, 238, 238)),
    ("palevioletred", (219, 112, 147)),
    ("papayawhip", (255, 239, 213)),
    ("peachpuff", (255, 218, 185)),
    ("peru", (205, 133, 63)),
    ("pink", (255, 192, 203)),
    ("plum", (221, 160, 221)),
    ("powderblue", (176, 224, 230)),
    ("purple", (128, 0, 128)),
    ("rebeccapurple", (102, 51, 153)),
    ("red", (255, 0, 0)),
    ("rosybrown", (188, 143, 143)),
    ("royalblue", (65, 105, 225)),
    ("saddlebrown", (139, 69, 19)),
    ("salmon", (250, 128, 114)),
    ("sandybrown", (244, 164, 96)),
    ("seagreen", (46, 139, 87)),
    ("seashell", (255, 245, 238)),
    ("sienna", (160, 82, 45)),
    ("silver", (192, 192, 192)),
    ("skyblue", (135, 206, 235)),
    ("slateblue", (106, 90, 205)),
    ("slategray", (112, 128, 144)),
    ("slategrey", (112, 128, 144)),
    ("snow", (255, 250, 250)),
    ("springgreen", (0, 255, 127)),
    ("steelblue", (70, 130, 180)),
    ("tan", (210, 180, 140)),
    ("teal", (0, 128, 128)),
    ("thistle", (216, 191, 216)),
    ("tomato", (255, 99, 71)),
    ("turquoise", (64, 224, 208)),
    ("violet", (238, 130, 238)),
    ("wheat", (245, 222, 179)),
    ("white", (255, 255, 255)),
    ("whitesmoke", (245, 245, 245)),
    ("yellow", (255, 255, 0)),
    ("yellowgreen", (154, 205, 50)),
];

#[cfg(test)]
mod tests {
    use super::*;

    fn rgb8(value: &str) -> (u8, u8, u8) {
        parse_color(value).unwrap().to_rgb8()
    }

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(rgb8("#fff"), (255, 255, 255));
        assert_eq!(rgb8("#000"), (0, 0, 0));
        assert_eq!(rgb8("#ff6600"), (255, 102, 0));
        assert_eq!(rgb8("#336699"), (51, 102, 153));
    }

    #[test]
    fn test_shorthand_hex_expands_nibbles() {
        assert_eq!(parse_color("#abc"), parse_color("#aabbcc"));
        assert_eq!(rgb8("#ABC"), (0xaa, 0xbb, 0xcc));
    }

    #[test]
    fn test_hex_with_alpha() {
        let c = parse_color("#ff660080").unwrap();
        assert_eq!(c.to_rgb8(), (255, 102, 0));
        assert!((c.a - 128.0 / 255.0).abs() < 1e-12);
        assert!((parse_color("#f008").unwrap().a - 0x88 as f64 / 255.0).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_hex() {
        assert!(matches!(parse_color("#ggg"), Err(ColorParseError::InvalidHex(_))));
        assert!(matches!(parse_color("#12345"), Err(ColorParseError::InvalidHex(_))));
    }

    #[test]
    fn test_named_colors() {
        assert_eq!(rgb8("red"), (255, 0, 0));
        assert_eq!(rgb8("navy"), (0, 0, 128));
        assert_eq!(rgb8("CornflowerBlue"), (100, 149, 237));
        assert_eq!(rgb8("rebeccapurple"), (102, 51, 153));
        assert!(NAMED_COLORS.len() >= 147);
        assert!(NAMED_COLORS.windows(2).all(|w| w[0].0 < w[1].0));
    }

    #[test]
    fn test_parse_rgb_function() {
        assert_eq!(rgb8("rgb(255, 0, 0)"), (255, 0, 0));
        assert_eq!(rgb8("rgb(0, 128, 255)"), (0, 128, 255));
        assert_eq!(rgb8("rgb(100%, 0%, 0%)"), (255, 0, 0));
        assert_eq!(rgb8("rgb(255 0 0)"), (255, 0, 0));
        assert_eq!(rgb8("rgb(300, -5, 0)"), (255, 0, 0));
    }

    #[test]
    fn test_parse_rgba_alpha() {
        let c = parse_color("rgba(0, 0, 0, 0.5)").unwrap();
        assert_eq!(c.a, 0.5);
        let modern = parse_color("rgba(255 0 0 / 50%)").unwrap();
        assert_eq!(modern.a, 0.5);
        assert_eq!(modern.to_rgb8(), (255, 0, 0));
    }

    #[test]
    fn test_rgb_wrong_arity_is_rejected() {
        assert_eq!(
            parse_color("rgb(1,2)"),
            Err(ColorParseError::Arity { function: "rgb".to_string(), found: 2 })
        );
        assert!(parse_color("rgb(1,2,3,4,5)").is_err());
        assert!(parse_color("rgb(a, b, c)").is_err());
        assert!(parse_color("rgb(1, 2, 3").is_err());
    }

    #[test]
    fn test_parse_hsl_function() {
        assert_eq!(rgb8("hsl(0, 100%, 50%)"), (255, 0, 0));
        assert_eq!(rgb8("hsl(120, 100%, 50%)"), (0, 255, 0));
        assert_eq!(rgb8("hsl(240, 100%, 50%)"), (0, 0, 255));
        assert_eq!(rgb8("hsl(0, 0%, 100%)"), (255, 255, 255));
        assert_eq!(rgb8("hsl(0, 0%, 0%)"), (0, 0, 0));
        assert_eq!(rgb8("hsla(0, 100%, 50%, 0.5)"), (255, 0, 0));
    }

    #[test]
    fn test_hsl_hue_units() {
        assert_eq!(rgb8("hsl(0.5turn 100% 50%)"), rgb8("hsl(180, 100%, 50%)"));
        assert_eq!(rgb8("hsl(200grad, 100%, 50%)"), rgb8("hsl(180deg, 100%, 50%)"));
        assert_eq!(rgb8("hsl(-120, 100%, 50%)"), rgb8("hsl(240, 100%, 50%)"));
    }

    #[test]
    fn test_keywords_are_not_colors() {
        for keyword in ["transparent", "inherit", "currentColor", "initial", "none"] {
            assert!(matches!(parse_color(keyword), Err(ColorParseError::Keyword(_))));
        }
        assert_eq!(parse_color("  "), Err(ColorParseError::Empty));
        assert!(matches!(parse_color("not-a-color"), Err(ColorParseError::Unknown(_))));
    }

    #[test]
    fn test_composite_half_black_over_white() {
        let c = parse_color("rgba(0,0,0,0.5)").unwrap().composite_over(Rgba::WHITE);
        assert!(c.is_opaque());
        assert!((c.r - 0.5).abs() < 1e-12);
        let (r, g, b) = c.to_rgb8();
        assert!((127..=128).contains(&r) && r == g && g == b);
    }

    #[test]
    fn test_hex_serialization() {
        assert_eq!(Rgba::from_rgb8(0x12, 0xab, 0xff).to_hex(), "#12abff");
        assert_eq!(Rgba::new(1.0, 0.0, 0.0, 0.5).to_hex(), "#ff000080");
        let json = serde_json::to_string(&Rgba::BLACK).unwrap();
        assert_eq!(json, "\"#000000\"");
        let back: Rgba = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Rgba::BLACK);
    }
}
