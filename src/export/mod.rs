//! Comparative table export.
//!
//! Ranked rubrics become a [`Grid`] (one row per key, one column per
//! witness), which a [`RenderContext`] turns into an HTML page.
//!
//! # Example
//!
//! ```
//! use rubrica::export::{RenderContext, RenderOptions, build_grid};
//! use rubrica::rubric::{AggregateOptions, Grouping, OrderSequence, aggregate, rank};
//! use rubrica::tei::parse_tei;
//!
//! let doc = parse_tei(
//!     r#"<TEI><titleStmt><title n="A"/></titleStmt>
//!          <div type="rubric" corresp="Matt1:1"><head><orig>Initium</orig></head></div></TEI>"#,
//!     "a.xml",
//! )?;
//! let docs = vec![doc];
//! let map = aggregate(&docs, Grouping::ByVerse, &AggregateOptions::new());
//! let ranked = rank(map, &OrderSequence::verses(["Matt1:1"]));
//!
//! let ctx = RenderContext::new(RenderOptions::new().with_verse(false));
//! let grid = build_grid(&ctx, &ranked, "Verse", &["A".to_string()]);
//! let page = ctx.render_page("Rubrics", &ctx.render_table(&grid));
//! assert!(page.contains("Initium"));
//! # Ok::<(), rubrica::Error>(())
//! ```

use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::rubric::Ranked;

mod html;

pub use html::{DEFAULT_STYLESHEET, RenderContext, escape_html};

/// Which rubric fields are shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    /// Show the normalized verse reference.
    pub display_verse: bool,
    /// Show source and folio.
    pub display_folio: bool,
    /// Link the facsimile. Only takes effect with `display_folio`.
    pub display_facs: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            display_verse: true,
            display_folio: true,
            display_facs: true,
        }
    }
}

impl RenderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_verse(mut self, display: bool) -> Self {
        self.display_verse = display;
        self
    }

    pub fn with_folio(mut self, display: bool) -> Self {
        self.display_folio = display;
        self
    }

    pub fn with_facs(mut self, display: bool) -> Self {
        self.display_facs = display;
        self
    }
}

/// One table row: the raw grouping key and one rendered cell per witness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub key: String,
    pub cells: Vec<String>,
}

/// Header labels and rows, in display order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Grid {
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
}

/// Lay out `ranked` with one column per entry of `sigla`.
///
/// Row keys are used as they are; a witness with no rubrics for a key gets
/// an empty cell.
pub fn build_grid(ctx: &RenderContext, ranked: &Ranked<'_>, key_label: &str, sigla: &[String]) -> Grid {
    let headers = std::iter::once(key_label.to_string())
        .chain(sigla.iter().cloned())
        .collect();

    let rows = ranked
        .entries
        .iter()
        .map(|(key, witnesses)| Row {
            key: key.clone(),
            cells: sigla
                .iter()
                .map(|siglum| {
                    witnesses
                        .get(siglum)
                        .map(|rubrics| ctx.render_cell(rubrics))
                        .unwrap_or_default()
                })
                .collect(),
        })
        .collect();

    Grid { headers, rows }
}

/// Write a rendered page to `path`, creating parent directories and
/// replacing any existing file.
pub fn write_html(path: impl AsRef<Path>, page: &str) -> Result<()> {
    let path = path.as_ref();
    tracing::info!("Exporting to {}", path.display());
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    fs::write(path, page).map_err(|e| Error::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rubric::{AggregateOptions, Grouping, OrderSequence, aggregate, rank};
    use crate::tei::{Document, parse_tei};

    fn witness(siglum: &str, body: &str) -> Document {
        let xml = format!(
            r#"<TEI xmlns="http://www.tei-c.org/ns/1.0"><teiHeader><titleStmt><title n="{siglum}"/></titleStmt></teiHeader>{body}</TEI>"#
        );
        parse_tei(&xml, format!("{siglum}.xml")).unwrap()
    }

    #[test]
    fn test_render_options_builders() {
        let opts = RenderOptions::new().with_verse(false).with_facs(false);
        assert!(!opts.display_verse);
        assert!(opts.display_folio);
        assert!(!opts.display_facs);
    }

    #[test]
    fn test_grid_has_column_per_siglum() {
        let docs = vec![
            witness("A", r#"<div type="rubric" corresp="IIJohn1:1"><head><orig>a</orig></head></div>"#),
            witness("B", r#"<div type="rubric" corresp="Matt1:1"><head><orig>b</orig></head></div>"#),
        ];
        let map = aggregate(&docs, Grouping::ByVerse, &AggregateOptions::new());
        let ranked = rank(map, &OrderSequence::verses(["Matt1:1", "IIJohn1:1"]));
        let sigla = vec!["A".to_string(), "B".to_string()];

        let ctx = RenderContext::new(RenderOptions::new().with_verse(false));
        let grid = build_grid(&ctx, &ranked, "Verse", &sigla);

        assert_eq!(grid.headers, vec!["Verse", "A", "B"]);
        // row keys stay unnormalized
        let keys: Vec<_> = grid.rows.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["Matt1:1", "IIJohn1:1"]);

        assert_eq!(grid.rows[0].cells[0], "");
        assert!(grid.rows[0].cells[1].contains(">b<"));
        assert!(grid.rows[1].cells[0].contains(">a<"));
        assert_eq!(grid.rows[1].cells[1], "");
    }

    #[test]
    fn test_write_html_creates_parents_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports/nested/out.html");

        write_html(&path, "<p>first</p>").unwrap();
        write_html(&path, "<p>second</p>").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "<p>second</p>");
    }

    #[test]
    fn test_write_html_into_file_parent_fails() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "").unwrap();

        let err = write_html(blocker.join("out.html"), "x").unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}
