//! Rubric divisions: field extraction, grouping and ranking.

mod aggregate;
mod rank;

pub use aggregate::{AggregateOptions, Grouping, GroupingMap, aggregate, rubrics, verse_positions};
pub use rank::{DateTable, OrderKind, OrderSequence, Ranked, rank};

use crate::normalize::normalize_reference;
use crate::tei::{ElementRef, extract_text, find_element};

/// Fields of one rubric division, extracted on demand.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RubricRecord {
    /// Text of `head//orig`.
    pub original_text: String,
    /// Text of `head//reg[@type='translation']`.
    pub translation: String,
    /// The `corresp` reference, normalized for display.
    pub verse: String,
    /// Facsimile locator from the anchor's `facs`.
    pub facs: String,
    /// Anchor `source` without its leading `#`.
    pub source: String,
    /// Folio label from the anchor's `n`.
    pub folio: String,
}

impl RubricRecord {
    /// Extract the record for `rubric`. Returns `None` when the division has
    /// no `head`; every other missing part degrades to an empty field.
    pub fn from_element(rubric: ElementRef<'_>) -> Option<Self> {
        let head = find_element(rubric, ".//head")?;

        let original_text = extract_text(find_element(head, ".//orig"), true);
        let translation = extract_text(find_element(head, ".//reg[@type='translation']"), true)
            .replace(" .", ".");

        let anchor = find_element(rubric, ".//anchor");
        let anchor_attr = |name: &str| anchor.and_then(|a| a.attr(name)).unwrap_or_default();
        let source = anchor_attr("source");

        Some(Self {
            original_text,
            translation,
            verse: normalize_reference(rubric.attr("corresp").unwrap_or_default()),
            facs: anchor_attr("facs").to_string(),
            source: source.strip_prefix('#').unwrap_or(source).to_string(),
            folio: anchor_attr("n").to_string(),
        })
    }
}
