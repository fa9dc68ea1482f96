// SPDX-License-Identifier: PMPL-1.0-or-later
//! Color contrast analysis of a single HTML document.
//!
//! - `color`: CSS color literal parsing
//! - `css`: color declaration extraction from `<style>` blocks and inline styles
//! - `contrast`: pairing, luminance and AA classification

pub mod color;
pub mod contrast;
pub mod css;

use crate::error::{Error, Result};
use contrast::ContrastResult;
use tracing::debug;

/// Extract and evaluate every color declaration group of a document.
///
/// Returns [`Error::NoContent`] for a blank document or one without any
/// usable color declaration.
pub fn analyze_html(html: &str) -> Result<Vec<ContrastResult>> {
    if html.trim().is_empty() {
        return Err(Error::NoContent("empty HTML document".to_string()));
    }

    let declarations = css::extract_declarations(html);
    if declarations.is_empty() {
        return Err(Error::NoContent("no color declarations found".to_string()));
    }

    let results = contrast::evaluate(&declarations);
    debug!(
        declarations = declarations.len(),
        pairings = results.len(),
        "evaluated document"
    );
    Ok(results)
}
