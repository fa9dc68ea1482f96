// SPDX-License-Identifier: PMPL-1.0-or-later
//! Payload charset resolution and decoding.
//!
//! Resolution order:
//! - a `charset` parameter on the archived `Content-Type` header,
//! - otherwise a `<meta charset>` or `<meta http-equiv>` declaration in the
//!   first 1024 bytes,
//! - otherwise UTF-8.
//!
//! Unknown labels fall through to the next source. A byte order mark still
//! wins at decode time. Decoding never fails: malformed sequences become U+FFFD.

use encoding_rs::{Encoding, UTF_8};
use regex::bytes::Regex;
use std::sync::OnceLock;

/// How many leading bytes are searched for a meta charset declaration
const META_SNIFF_LIMIT: usize = 1024;

/// Decoded document text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedHtml {
    pub text: String,
    /// Canonical name of the encoding actually used
    pub charset: &'static str,
    /// Whether replacement characters were substituted
    pub had_errors: bool,
}

/// Extract the `charset` parameter from a Content-Type value
pub fn charset_from_content_type(content_type: &str) -> Option<String> {
    for param in content_type.split(';').skip(1) {
        let Some((name, value)) = param.split_once('=') else {
            continue;
        };
        if !name.trim().eq_ignore_ascii_case("charset") {
            continue;
        }
        let value = value.trim().trim_matches('"').trim_matches('\'');
        if !value.is_empty() {
            return Some(value.to_string());
        }
    }
    None
}

fn meta_charset_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i-u)<meta[^>]*?charset\s*=\s*["']?\s*([a-z0-9_:.\-]+)"#).expect("valid regex")
    })
}

/// Find a charset declared by a `<meta>` tag near the start of the document
pub fn sniff_meta_charset(bytes: &[u8]) -> Option<String> {
    let head = &bytes[..bytes.len().min(META_SNIFF_LIMIT)];
    let caps = meta_charset_re().captures(head)?;
    Some(String::from_utf8_lossy(&caps[1]).into_owned())
}

/// Pick the encoding for a payload
pub fn resolve_encoding(bytes: &[u8], content_type: Option<&str>) -> &'static Encoding {
    content_type
        .and_then(charset_from_content_type)
        .and_then(|label| Encoding::for_label(label.as_bytes()))
        .or_else(|| sniff_meta_charset(bytes).and_then(|label| Encoding::for_label(label.as_bytes())))
        .unwrap_or(UTF_8)
}

/// Decode with a previously resolved charset name; unknown names decode as UTF-8
pub fn decode_with_label(bytes: &[u8], label: &str) -> DecodedHtml {
    let encoding = Encoding::for_label(label.as_bytes()).unwrap_or(UTF_8);
    decode(bytes, encoding)
}

pub fn decode(bytes: &[u8], encoding: &'static Encoding) -> DecodedHtml {
    let (text, used, had_errors) = encoding.decode(bytes);
    DecodedHtml {
        text: text.into_owned(),
        charset: used.name(),
        had_errors,
    }
}
