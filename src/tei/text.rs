//! Canonical text extraction.
//!
//! Flattens an element to the reading a table should show: editorial
//! markers contribute nothing and each critical-apparatus entry contributes
//! exactly one reading.

use super::arena::ElementRef;
use super::query::find_element;

/// Elements with no canonical textual value: punctuation/phonetic markers,
/// witness details and editorial notes.
const EXCLUDED: [&str; 3] = ["pc", "witDetail", "note"];

/// Critical-apparatus entry.
const APPARATUS: &str = "app";

/// Extract the canonical text of `node`.
///
/// - an absent node, or one whose local name is excluded, gives `""` (its
///   tail is dropped as well);
/// - an `app` gives the text of its first `lem`, else its first `rdg`,
///   without that reading's tail;
/// - anything else gives its text, then `" "` plus the extraction of each
///   child (tails included), then `" "` plus its own tail when
///   `include_tail` is set.
///
/// The result is trimmed at both ends; interior whitespace is kept as
/// produced.
pub fn extract_text(node: Option<ElementRef<'_>>, include_tail: bool) -> String {
    let Some(node) = node else {
        return String::new();
    };

    let tag = node.local_name();
    if EXCLUDED.contains(&tag) {
        return String::new();
    }

    if tag == APPARATUS {
        let reading = find_element(node, ".//lem").or_else(|| find_element(node, ".//rdg"));
        return extract_text(reading, false);
    }

    let mut text = node.text().unwrap_or_default().to_string();
    for child in node.children() {
        text.push(' ');
        text.push_str(&extract_text(Some(child), true));
    }

    if include_tail && let Some(tail) = node.tail() {
        text.push(' ');
        text.push_str(tail);
    }

    text.trim().to_string()
}
