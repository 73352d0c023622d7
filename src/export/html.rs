//! HTML fragments for rubric tables.

use std::fmt::Write;

use super::{Grid, RenderOptions};
use crate::rubric::RubricRecord;
use crate::tei::ElementRef;

/// Stylesheet embedded in every page unless replaced.
pub const DEFAULT_STYLESHEET: &str = "\
body { font-family: Georgia, serif; margin: 2em; }
table { border-collapse: collapse; width: 100%; }
th, td { border: 1px solid #bbb; padding: 0.4em; vertical-align: top; text-align: left; }
th { background: #eee; position: sticky; top: 0; }
td.key { white-space: nowrap; font-weight: bold; }
.rubric .orig { font-style: italic; }
.rubric .translation { color: #444; }
.rubric .verse, .rubric .folio { font-size: 0.85em; color: #666; }
hr { border: 0; border-top: 1px dashed #ccc; }
";

/// Renders rubric items, tables and pages.
///
/// Every piece of document text is escaped on the way in; cell contents
/// passed to [`render_table`](Self::render_table) are trusted fragments.
#[derive(Debug, Clone)]
pub struct RenderContext {
    stylesheet: String,
    options: RenderOptions,
}

impl Default for RenderContext {
    fn default() -> Self {
        Self::new(RenderOptions::default())
    }
}

impl RenderContext {
    pub fn new(options: RenderOptions) -> Self {
        Self {
            stylesheet: DEFAULT_STYLESHEET.to_string(),
            options,
        }
    }

    /// Replace the embedded stylesheet.
    pub fn with_stylesheet(mut self, css: impl Into<String>) -> Self {
        self.stylesheet = css.into();
        self
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// One rubric item. Hidden fields render as if empty.
    pub fn render_rubric(&self, record: &RubricRecord) -> String {
        let opts = &self.options;
        let verse = if opts.display_verse { record.verse.as_str() } else { "" };
        let (source, folio) = if opts.display_folio {
            (record.source.as_str(), record.folio.as_str())
        } else {
            ("", "")
        };
        let facs = if opts.display_folio && opts.display_facs {
            record.facs.as_str()
        } else {
            ""
        };

        let mut out = String::from("<div class=\"rubric\">\n");
        let _ = writeln!(
            out,
            "  <div class=\"orig\">{}</div>",
            escape_html(&record.original_text)
        );
        if !record.translation.is_empty() {
            let _ = writeln!(
                out,
                "  <div class=\"translation\">{}</div>",
                escape_html(&record.translation)
            );
        }
        if !verse.is_empty() {
            let _ = writeln!(out, "  <div class=\"verse\">{}</div>", escape_html(verse));
        }
        if !source.is_empty() || !folio.is_empty() || !facs.is_empty() {
            out.push_str("  <div class=\"folio\">");
            let label = [source, folio]
                .iter()
                .filter(|s| !s.is_empty())
                .map(|s| escape_html(s))
                .collect::<Vec<_>>()
                .join(" ");
            out.push_str(&label);
            if !facs.is_empty() {
                if !label.is_empty() {
                    out.push(' ');
                }
                let _ = write!(out, "<a href=\"{}\">facsimile</a>", escape_html(facs));
            }
            out.push_str("</div>\n");
        }
        out.push_str("</div>");
        out
    }

    /// Items of one cell joined by rules. Rubrics without a head are left
    /// out.
    pub fn render_cell(&self, rubrics: &[ElementRef<'_>]) -> String {
        rubrics
            .iter()
            .filter_map(|&rubric| RubricRecord::from_element(rubric))
            .map(|record| self.render_rubric(&record))
            .collect::<Vec<_>>()
            .join("<hr>\n")
    }

    /// Table with a header row; the first column holds escaped row keys.
    pub fn render_table(&self, grid: &Grid) -> String {
        let mut out = String::from("<table>\n<thead>\n<tr>");
        for header in &grid.headers {
            let _ = write!(out, "<th>{}</th>", escape_html(header));
        }
        out.push_str("</tr>\n</thead>\n<tbody>\n");
        for row in &grid.rows {
            let _ = write!(out, "<tr><td class=\"key\">{}</td>", escape_html(&row.key));
            for cell in &row.cells {
                let _ = write!(out, "<td>{cell}</td>");
            }
            out.push_str("</tr>\n");
        }
        out.push_str("</tbody>\n</table>\n");
        out
    }

    /// Complete HTML document around `content`.
    pub fn render_page(&self, title: &str, content: &str) -> String {
        let mut doc = String::from("<!DOCTYPE html>\n<html>\n<head>\n  <meta charset=\"utf-8\">\n");
        let _ = writeln!(doc, "  <title>{}</title>", escape_html(title));
        let _ = writeln!(doc, "  <style>\n{}  </style>", self.stylesheet);
        doc.push_str("</head>\n<body>\n");
        if !title.is_empty() {
            let _ = writeln!(doc, "<h1>{}</h1>", escape_html(title));
        }
        doc.push_str(content);
        doc.push_str("</body>\n</html>\n");
        doc
    }
}

/// Escape text for element content and quoted attribute values.
pub fn escape_html(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&#39;"),
            _ => result.push(c),
        }
    }
    result
}
