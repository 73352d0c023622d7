//! Canonical orderings and ranking of grouped rubrics.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::Path;

use super::aggregate::GroupingMap;
use crate::error::{Error, Result};
use crate::tei::{Document, ElementRef, XML_NS, extract_text, find_element, find_elements};

/// What a canonical order ranks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderKind {
    Verse,
    Date,
}

impl OrderKind {
    /// Column label for the grouping key.
    pub fn label(self) -> &'static str {
        match self {
            OrderKind::Verse => "Verse",
            OrderKind::Date => "Date",
        }
    }
}

impl fmt::Display for OrderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// An externally supplied sequence that ranks grouping keys.
#[derive(Debug, Clone)]
pub struct OrderSequence {
    kind: OrderKind,
    positions: HashMap<String, usize>,
}

impl OrderSequence {
    /// Verse order from references in sequence. A repeated reference keeps
    /// its first position.
    pub fn verses<I, S>(references: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut positions = HashMap::new();
        for (index, reference) in references.into_iter().enumerate() {
            positions.entry(reference.into()).or_insert(index);
        }
        Self {
            kind: OrderKind::Verse,
            positions,
        }
    }

    /// Read a verse list: one reference per line, in order.
    pub fn read_verse_list(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let sequence = Self::verses(content.trim().lines().map(str::to_string));
        tracing::debug!(path = %path.display(), verses = sequence.len(), "read verse list");
        Ok(sequence)
    }

    /// Position of `key` in the sequence. Verse keys are looked up without
    /// a trailing `b` continuation marker.
    pub fn position(&self, key: &str) -> Option<usize> {
        let key = match self.kind {
            OrderKind::Verse => key.strip_suffix('b').unwrap_or(key),
            OrderKind::Date => key,
        };
        self.positions.get(key).copied()
    }

    pub fn kind(&self) -> OrderKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Date definitions from a document's `standOff/listEvent`: identifier to
/// display name, in definition order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DateTable {
    entries: Vec<(String, String)>,
}

impl DateTable {
    /// Build from `(id, name)` pairs. A redefined id keeps its first
    /// position and takes the later name.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut table = Self::default();
        for (id, name) in pairs {
            table.define(id.into(), name.into());
        }
        table
    }

    fn define(&mut self, id: String, name: String) {
        match self.entries.iter_mut().find(|(existing, _)| *existing == id) {
            Some(entry) => entry.1 = name,
            None => self.entries.push((id, name)),
        }
    }

    /// Read the `event` definitions of `doc`.
    ///
    /// Each event needs an `xml:id`; its name is the text of its `label`,
    /// or the id when the label is missing or empty. Fails when the
    /// document has no `standOff` or no `listEvent` in it.
    pub fn from_document(doc: &Document) -> Result<Self> {
        let standoff = doc
            .root()
            .and_then(|root| find_element(root, ".//standOff"))
            .ok_or_else(|| Error::MissingElement(format!("standOff in {}", doc.path().display())))?;
        let list_event = find_element(standoff, ".//listEvent")
            .ok_or_else(|| Error::MissingElement(format!("listEvent in {}", doc.path().display())))?;

        let mut table = Self::default();
        for event in find_elements(list_event, ".//event") {
            let Some(id) = event.attr_ns(XML_NS, "id") else {
                tracing::warn!(path = %doc.path().display(), "event without xml:id skipped");
                continue;
            };
            table.define(id.to_string(), label_or_id(event, id));
        }
        tracing::debug!(dates = table.len(), "read date definitions");
        Ok(table)
    }

    /// Display name for a date id.
    pub fn name(&self, id: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == id)
            .map(|(_, name)| name.as_str())
    }

    /// Resolve a `when-custom` reference (`#easter` or `easter`) to its
    /// display name, falling back to the bare id.
    pub fn resolve(&self, reference: &str) -> String {
        let id = reference.strip_prefix('#').unwrap_or(reference);
        self.name(id).unwrap_or(id).to_string()
    }

    /// Order of display names. A name defined more than once ranks at its
    /// last definition.
    pub fn order(&self) -> OrderSequence {
        let positions = self
            .entries
            .iter()
            .enumerate()
            .map(|(index, (_, name))| (name.clone(), index))
            .collect();
        OrderSequence {
            kind: OrderKind::Date,
            positions,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(id, name)| (id.as_str(), name.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn label_or_id(event: ElementRef<'_>, id: &str) -> String {
    let label = extract_text(find_element(event, ".//label"), true);
    if label.is_empty() { id.to_string() } else { label }
}

/// Grouping-map entries in canonical order.
#[derive(Debug)]
pub struct Ranked<'a> {
    pub entries: Vec<(String, BTreeMap<String, Vec<ElementRef<'a>>>)>,
    /// Keys that were not in the order sequence, in map order.
    pub unmatched: Vec<String>,
}

impl Ranked<'_> {
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }
}

/// Sort `map` by each key's position in `order`.
///
/// Keys missing from the order rank before every ranked key, keep their
/// relative map order and are reported with a warning.
pub fn rank<'a>(map: GroupingMap<'a>, order: &OrderSequence) -> Ranked<'a> {
    let mut unmatched = Vec::new();
    let mut keyed: Vec<(i64, (String, BTreeMap<String, Vec<ElementRef<'a>>>))> = map
        .into_entries()
        .into_iter()
        .map(|entry| {
            let position = match order.position(&entry.0) {
                Some(p) => p as i64,
                None => {
                    tracing::warn!("{} '{}' not found", order.kind(), entry.0);
                    unmatched.push(entry.0.clone());
                    -1
                }
            };
            (position, entry)
        })
        .collect();

    keyed.sort_by_key(|(position, _)| *position);

    Ranked {
        entries: keyed.into_iter().map(|(_, entry)| entry).collect(),
        unmatched,
    }
}
