//! Grouping rubrics by key and witness.

use std::collections::{BTreeMap, HashMap, HashSet};

use super::rank::{DateTable, OrderSequence};
use crate::tei::{Document, ElementRef, NodeId, find_elements, get_siglum};

/// Key of a rubric row.
#[derive(Debug, Clone, Copy)]
pub enum Grouping<'t> {
    /// The rubric's `corresp` attribute.
    ByVerse,
    /// Each `date/@when-custom`, resolved through the table.
    ByDate(&'t DateTable),
}

/// Filters applied while grouping.
#[derive(Debug, Clone, Default)]
pub struct AggregateOptions {
    place: Option<String>,
}

impl AggregateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep only rubrics with a `placeName` whose `ref` equals `place`.
    /// An empty value disables the filter.
    pub fn with_place(mut self, place: impl Into<String>) -> Self {
        let place = place.into();
        self.place = (!place.is_empty()).then_some(place);
        self
    }

    pub fn place(&self) -> Option<&str> {
        self.place.as_deref()
    }
}

/// key → siglum → rubrics, keys in first-seen order.
#[derive(Debug, Default)]
pub struct GroupingMap<'a> {
    entries: Vec<(String, BTreeMap<String, Vec<ElementRef<'a>>>)>,
    index: HashMap<String, usize>,
}

impl<'a> GroupingMap<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Witness map for `key`, inserted empty if new.
    pub fn entry(&mut self, key: &str) -> &mut BTreeMap<String, Vec<ElementRef<'a>>> {
        let slot = match self.index.get(key) {
            Some(&slot) => slot,
            None => {
                self.entries.push((key.to_string(), BTreeMap::new()));
                self.index.insert(key.to_string(), self.entries.len() - 1);
                self.entries.len() - 1
            }
        };
        &mut self.entries[slot].1
    }

    pub fn get(&self, key: &str) -> Option<&BTreeMap<String, Vec<ElementRef<'a>>>> {
        self.index.get(key).map(|&slot| &self.entries[slot].1)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> Vec<(String, BTreeMap<String, Vec<ElementRef<'a>>>)> {
        self.entries
    }
}

/// Rubric divisions of `doc` in document order.
///
/// The locator's two namespace passes both match in a document without a
/// default namespace, so repeats are dropped here.
pub fn rubrics(doc: &Document) -> Vec<ElementRef<'_>> {
    doc.root()
        .map(|root| unique(find_elements(root, ".//div[@type='rubric']")))
        .unwrap_or_default()
}

fn unique(elements: Vec<ElementRef<'_>>) -> Vec<ElementRef<'_>> {
    let mut seen: HashSet<NodeId> = HashSet::new();
    elements.into_iter().filter(|e| seen.insert(e.id())).collect()
}

fn at_place(rubric: ElementRef<'_>, place: &str) -> bool {
    find_elements(rubric, ".//placeName")
        .iter()
        .any(|name| name.attr("ref") == Some(place))
}

/// Group the rubrics of `documents` by `grouping` and witness siglum.
///
/// Documents are visited in order. Two documents with the same siglum
/// share a column.
pub fn aggregate<'a>(
    documents: &'a [Document],
    grouping: Grouping<'_>,
    options: &AggregateOptions,
) -> GroupingMap<'a> {
    let mut map = GroupingMap::new();
    let mut sigla = HashSet::new();

    for doc in documents {
        let siglum = get_siglum(doc);
        if !sigla.insert(siglum.clone()) {
            tracing::warn!(siglum = %siglum, path = %doc.path().display(), "duplicate siglum");
        }

        for rubric in rubrics(doc) {
            if let Some(place) = options.place()
                && !at_place(rubric, place)
            {
                continue;
            }

            match grouping {
                Grouping::ByVerse => {
                    let verse = rubric.attr("corresp").unwrap_or_default();
                    map.entry(verse).insert(siglum.clone(), vec![rubric]);
                }
                Grouping::ByDate(table) => {
                    for date in unique(find_elements(rubric, ".//date")) {
                        let Some(when) = date.attr("when-custom") else {
                            tracing::debug!(siglum = %siglum, "date without when-custom skipped");
                            continue;
                        };
                        map.entry(&table.resolve(when))
                            .entry(siglum.clone())
                            .or_default()
                            .push(rubric);
                    }
                }
            }
        }
    }

    tracing::debug!(keys = map.len(), documents = documents.len(), "grouped rubrics");
    map
}

/// `(document index, verse index)` for each rubric whose `corresp` is in
/// `verses`. Unknown verses are reported and skipped.
pub fn verse_positions(documents: &[Document], verses: &OrderSequence) -> Vec<(usize, usize)> {
    let mut positions = Vec::new();
    for (doc_index, doc) in documents.iter().enumerate() {
        for rubric in rubrics(doc) {
            let Some(verse) = rubric.attr("corresp").filter(|v| !v.is_empty()) else {
                continue;
            };
            match verses.position(verse) {
                Some(verse_index) => positions.push((doc_index, verse_index)),
                None => tracing::warn!("{} '{}' not found", verses.kind(), verse),
            }
        }
    }
    positions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tei::parse_tei;

    fn witness(siglum: &str, body: &str) -> Document {
        let xml = format!(
            r#"<TEI xmlns="http://www.tei-c.org/ns/1.0">
              <teiHeader><fileDesc><titleStmt><title n="{siglum}"/></titleStmt></fileDesc></teiHeader>
              <text><body>{body}</body></text>
            </TEI>"#
        );
        parse_tei(&xml, format!("{siglum}.xml")).unwrap()
    }

    fn heads<'a>(map: &GroupingMap<'a>, key: &str, siglum: &str) -> Vec<&'a str> {
        map.get(key).unwrap()[siglum]
            .iter()
            .map(|r| r.attr("n").unwrap_or_default())
            .collect()
    }

    #[test]
    fn test_by_verse_groups_witnesses() {
        let docs = vec![
            witness("A", r#"<div type="rubric" corresp="1:1" n="a1"/>"#),
            witness("B", r#"<div type="rubric" corresp="1:1" n="b1"/>"#),
        ];
        let map = aggregate(&docs, Grouping::ByVerse, &AggregateOptions::new());

        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["1:1"]);
        let witnesses = map.get("1:1").unwrap();
        assert_eq!(witnesses.keys().collect::<Vec<_>>(), vec!["A", "B"]);
        assert_eq!(heads(&map, "1:1", "A"), vec!["a1"]);
        assert_eq!(heads(&map, "1:1", "B"), vec!["b1"]);
    }

    #[test]
    fn test_by_verse_keeps_last_rubric_per_document() {
        let docs = vec![witness(
            "A",
            r#"<div type="rubric" corresp="Matt1:1" n="first"/>
               <div type="rubric" corresp="Matt1:2" n="other"/>
               <div type="rubric" corresp="Matt1:1" n="second"/>
               <div type="rubric" n="bare"/>"#,
        )];
        let map = aggregate(&docs, Grouping::ByVerse, &AggregateOptions::new());

        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["Matt1:1", "Matt1:2", ""]);
        assert_eq!(heads(&map, "Matt1:1", "A"), vec!["second"]);
        assert_eq!(heads(&map, "", "A"), vec!["bare"]);
    }

    #[test]
    fn test_by_date_appends_per_date() {
        let table = DateTable::from_pairs([("easter", "Pascha")]);
        let docs = vec![witness(
            "A",
            r##"<div type="rubric" n="r1"><date when-custom="#easter"/><date when-custom="#pent"/></div>
               <div type="rubric" n="r2"><date when-custom="easter"/><date/></div>"##,
        )];
        let map = aggregate(&docs, Grouping::ByDate(&table), &AggregateOptions::new());

        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["Pascha", "pent"]);
        assert_eq!(heads(&map, "Pascha", "A"), vec!["r1", "r2"]);
        assert_eq!(heads(&map, "pent", "A"), vec!["r1"]);
    }

    #[test]
    fn test_bare_documents_do_not_double_count() {
        let doc = parse_tei(
            r##"<TEI><div type="rubric" n="r"><date when-custom="#d"/></div></TEI>"##,
            "bare.xml",
        )
        .unwrap();
        assert_eq!(rubrics(&doc).len(), 1);

        let table = DateTable::default();
        let docs = vec![doc];
        let map = aggregate(&docs, Grouping::ByDate(&table), &AggregateOptions::new());
        assert_eq!(heads(&map, "d", ""), vec!["r"]);
    }

    #[test]
    fn test_place_filter_requires_exact_ref() {
        let docs = vec![witness(
            "A",
            r##"<div type="rubric" corresp="1:1" n="rome"><placeName ref="#rome"/></div>
               <div type="rubric" corresp="1:2" n="romea"><placeName ref="#romea"/></div>
               <div type="rubric" corresp="1:3" n="none"/>"##,
        )];

        let options = AggregateOptions::new().with_place("#rome");
        let map = aggregate(&docs, Grouping::ByVerse, &options);
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["1:1"]);

        let unfiltered = aggregate(&docs, Grouping::ByVerse, &AggregateOptions::new().with_place(""));
        assert_eq!(unfiltered.len(), 3);
    }

    #[test]
    fn test_verse_positions() {
        let docs = vec![
            witness(
                "A",
                r#"<div type="rubric" corresp="Matt1:2b"/><div type="rubric" corresp="Luke9:9"/>"#,
            ),
            witness("B", r#"<div type="rubric" corresp="Matt1:1"/><div type="rubric"/>"#),
        ];
        let verses = OrderSequence::verses(["Matt1:1", "Matt1:2"]);
        assert_eq!(verse_positions(&docs, &verses), vec![(0, 1), (1, 0)]);
    }

    #[test]
    fn test_grouping_map_first_seen_order() {
        let mut map = GroupingMap::new();
        map.entry("b");
        map.entry("a");
        map.entry("b");
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(map.len(), 2);
        assert!(map.get("c").is_none());
    }
}
