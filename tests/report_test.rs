//! End-to-end tests: fixtures in, grouped and ranked tables out.

use rubrica::export::{RenderContext, RenderOptions, build_grid, write_html};
use rubrica::rubric::{
    AggregateOptions, DateTable, Grouping, OrderSequence, aggregate, rank, verse_positions,
};
use rubrica::tei::{Document, parse_tei, read_tei};
use rubrica::{Error, Report};

const FIXTURES_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures");

fn fixture_path(name: &str) -> String {
    format!("{}/{}", FIXTURES_DIR, name)
}

fn witnesses() -> Vec<Document> {
    ["witness_a.xml", "witness_b.xml"]
        .iter()
        .map(|name| read_tei(fixture_path(name)).expect("Failed to read witness"))
        .collect()
}

fn verses() -> OrderSequence {
    OrderSequence::read_verse_list(fixture_path("verses.txt")).expect("Failed to read verse list")
}

// ============================================================================
// Grouping
// ============================================================================

#[test]
fn test_shared_verse_has_both_witnesses() {
    let docs = witnesses();
    let map = aggregate(&docs, Grouping::ByVerse, &AggregateOptions::new());

    let witnesses = map.get("1:1").expect("verse 1:1 missing");
    assert_eq!(witnesses.keys().collect::<Vec<_>>(), vec!["A", "B"]);
    assert_eq!(witnesses["A"].len(), 1);
    assert_eq!(witnesses["B"].len(), 1);
    assert_ne!(witnesses["A"][0], witnesses["B"][0]);
}

#[test]
fn test_by_verse_order() {
    let docs = witnesses();
    let map = aggregate(&docs, Grouping::ByVerse, &AggregateOptions::new());
    let ranked = rank(map, &verses());

    assert_eq!(
        ranked.keys().collect::<Vec<_>>(),
        vec!["1:1", "1:2", "1:3b", "IIIJohn1:2"]
    );
    assert!(ranked.unmatched.is_empty());
}

#[test]
fn test_by_date_order() {
    let docs = witnesses();
    let table = DateTable::from_document(&docs[0]).unwrap();
    let map = aggregate(&docs, Grouping::ByDate(&table), &AggregateOptions::new());
    let ranked = rank(map, &table.order());

    assert_eq!(
        ranked.keys().collect::<Vec<_>>(),
        vec![
            "lost",
            "Dominica I Adventus",
            "In Nativitate Domini",
            "Dominica Resurrectionis",
            "pent",
        ]
    );
    assert_eq!(ranked.unmatched, vec!["lost".to_string()]);
}

#[test]
fn test_place_filter() {
    let docs = witnesses();
    let options = AggregateOptions::new().with_place("#rome");
    let map = aggregate(&docs, Grouping::ByVerse, &options);

    assert_eq!(map.keys().collect::<Vec<_>>(), vec!["1:1"]);
    let witnesses = map.get("1:1").unwrap();
    assert_eq!(witnesses.keys().collect::<Vec<_>>(), vec!["A"]);
}

#[test]
fn test_positions() {
    let docs = witnesses();
    assert_eq!(
        verse_positions(&docs, &verses()),
        vec![(0, 0), (0, 3), (0, 1), (1, 0), (1, 2)]
    );
}

fn same_siglum_witnesses() -> Vec<Document> {
    [("first", "one.xml"), ("second", "two.xml")]
        .iter()
        .map(|(n, path)| {
            let xml = format!(
                r##"<TEI xmlns="http://www.tei-c.org/ns/1.0"><teiHeader><fileDesc><titleStmt><title n="A"/></titleStmt></fileDesc></teiHeader>
                   <text><body><div type="rubric" corresp="1:1" n="{n}"><date when-custom="#pascha"/></div></body></text></TEI>"##
            );
            parse_tei(&xml, path).unwrap()
        })
        .collect()
}

#[test]
fn test_duplicate_siglum_by_verse_keeps_later_document() {
    let docs = same_siglum_witnesses();
    let map = aggregate(&docs, Grouping::ByVerse, &AggregateOptions::new());

    let witnesses = map.get("1:1").unwrap();
    assert_eq!(witnesses.keys().collect::<Vec<_>>(), vec!["A"]);
    let names: Vec<_> = witnesses["A"].iter().map(|r| r.attr("n")).collect();
    assert_eq!(names, vec![Some("second")]);
}

#[test]
fn test_duplicate_siglum_by_date_appends_both_documents() {
    let docs = same_siglum_witnesses();
    let table = DateTable::from_pairs([("pascha", "Pascha")]);
    let map = aggregate(&docs, Grouping::ByDate(&table), &AggregateOptions::new());

    let witnesses = map.get("Pascha").unwrap();
    assert_eq!(witnesses.keys().collect::<Vec<_>>(), vec!["A"]);
    let names: Vec<_> = witnesses["A"].iter().map(|r| r.attr("n")).collect();
    assert_eq!(names, vec![Some("first"), Some("second")]);
}

// ============================================================================
// Rendering
// ============================================================================

#[test]
fn test_grid_cells() {
    let docs = witnesses();
    let map = aggregate(&docs, Grouping::ByVerse, &AggregateOptions::new());
    let ranked = rank(map, &verses());

    let ctx = RenderContext::new(RenderOptions::new().with_verse(false));
    let sigla = vec!["A".to_string(), "B".to_string()];
    let grid = build_grid(&ctx, &ranked, "Verse", &sigla);

    assert_eq!(grid.headers, vec!["Verse", "A", "B"]);
    assert_eq!(grid.rows.len(), 4);

    let first = &grid.rows[0];
    assert_eq!(first.key, "1:1");
    assert!(first.cells[0].contains("In illo tempore  dixit"));
    assert!(first.cells[0].contains("At that time Jesus said."));
    assert!(first.cells[0].contains("codexA 1r"));
    assert!(first.cells[1].contains("In illo tempore  ait"));

    // headless rubric renders nothing
    let second = &grid.rows[1];
    assert_eq!(second.key, "1:2");
    assert_eq!(second.cells, vec![String::new(), String::new()]);

    // the note and its tail drop out
    assert!(grid.rows[2].cells[1].contains("<div class=\"orig\">Sequentia</div>"));
}

#[test]
fn test_by_date_page_written() {
    let docs = witnesses();
    let page = Report::new(&docs)
        .with_title("Rubrics by date")
        .with_render_options(RenderOptions::new().with_facs(false))
        .by_date()
        .unwrap();

    assert!(page.contains("<th>Date</th><th>A</th><th>B</th>"));
    assert!(page.contains("<td class=\"key\">Dominica Resurrectionis</td>"));
    assert!(page.contains("3 John 1:2"));
    assert!(!page.contains("iiif.example"));

    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out/report-by-date.html");
    write_html(&output, &page).unwrap();
    assert_eq!(std::fs::read_to_string(&output).unwrap(), page);
}

#[test]
fn test_by_verse_page() {
    let docs = witnesses();
    let page = Report::new(&docs).by_verse(&verses()).unwrap();

    assert!(page.contains("<th>Verse</th><th>A</th><th>B</th>"));
    // keys are shown raw, cells carry no verse
    assert!(page.contains("<td class=\"key\">IIIJohn1:2</td>"));
    assert!(!page.contains("3 John 1:2"));
    assert!(page.contains("https://iiif.example/b/f3r"));
}

#[test]
fn test_by_date_requires_definitions_in_first_document() {
    let docs: Vec<Document> = witnesses().into_iter().rev().collect();
    let err = Report::new(&docs).by_date().unwrap_err();
    assert!(matches!(err, Error::MissingElement(_)));
}
