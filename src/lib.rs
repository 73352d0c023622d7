//! # rubrica
//!
//! Collate rubrics from TEI manuscript editions into comparative tables.
//!
//! ## Features
//!
//! - Load TEI documents with XInclude transclusion resolved
//! - Namespace-tolerant ElementPath queries over the markup tree
//! - Canonical text extraction that resolves critical apparatus to one reading
//! - Verse reference normalization and ranking by verse list or date table
//! - HTML table export with one column per witness
//!
//! ## Quick Start
//!
//! ```no_run
//! use rubrica::{OrderSequence, Report, read_tei, write_html};
//!
//! let docs = vec![read_tei("witness-a.xml")?, read_tei("witness-b.xml")?];
//! let verses = OrderSequence::read_verse_list("verses.txt")?;
//!
//! let page = Report::new(&docs).with_title("Gospel rubrics").by_verse(&verses)?;
//! write_html("report-by-verse.html", &page)?;
//! # Ok::<(), rubrica::Error>(())
//! ```
//!
//! ## Working with Documents
//!
//! Lower-level pieces can be used on their own:
//!
//! ```
//! use rubrica::tei::{extract_text, find_element, parse_tei};
//! use rubrica::rubric::RubricRecord;
//!
//! let doc = parse_tei(
//!     r#"<div xmlns="http://www.tei-c.org/ns/1.0" type="rubric" corresp="IIIJohn1:1">
//!          <head><orig>Lectio <app><lem>epistolae</lem><rdg>epistole</rdg></app></orig></head>
//!        </div>"#,
//!     "rubric.xml",
//! )?;
//! let rubric = doc.root().unwrap();
//!
//! let record = RubricRecord::from_element(rubric).unwrap();
//! assert_eq!(record.verse, "3 John 1:1");
//! assert_eq!(extract_text(find_element(rubric, ".//rdg"), true), "epistole");
//! # Ok::<(), rubrica::Error>(())
//! ```

pub mod error;
pub mod export;
pub mod normalize;
pub mod report;
pub mod rubric;
pub mod tei;

pub use error::{Error, Result};
pub use export::{RenderContext, RenderOptions, write_html};
pub use report::Report;
pub use rubric::{DateTable, OrderSequence, RubricRecord};
pub use tei::{Document, ElementRef, parse_tei, read_tei};
