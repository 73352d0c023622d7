//! End-to-end report building: documents in, HTML page out.

use crate::error::{Error, Result};
use crate::export::{RenderContext, RenderOptions, build_grid};
use crate::rubric::{AggregateOptions, DateTable, Grouping, OrderKind, OrderSequence, aggregate, rank};
use crate::tei::{Document, get_siglum};

/// Comparative rubric report over a set of witnesses.
///
/// ```
/// use rubrica::report::Report;
/// use rubrica::rubric::OrderSequence;
/// use rubrica::tei::parse_tei;
///
/// let docs = vec![parse_tei(
///     r#"<TEI><titleStmt><title n="A"/></titleStmt>
///          <div type="rubric" corresp="1:1"><head><orig>Initium</orig></head></div></TEI>"#,
///     "a.xml",
/// )?];
/// let page = Report::new(&docs)
///     .with_title("Gospel rubrics")
///     .by_verse(&OrderSequence::verses(["1:1"]))?;
/// assert!(page.contains("<h1>Gospel rubrics</h1>"));
/// # Ok::<(), rubrica::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct Report<'a> {
    documents: &'a [Document],
    filter: AggregateOptions,
    render: RenderOptions,
    title: String,
}

impl<'a> Report<'a> {
    pub fn new(documents: &'a [Document]) -> Self {
        Self {
            documents,
            filter: AggregateOptions::new(),
            render: RenderOptions::new(),
            title: String::new(),
        }
    }

    /// Only include rubrics tied to this `placeName/@ref`.
    pub fn with_place(mut self, place: impl Into<String>) -> Self {
        self.filter = self.filter.with_place(place);
        self
    }

    pub fn with_render_options(mut self, render: RenderOptions) -> Self {
        self.render = render;
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    fn sigla(&self) -> Vec<String> {
        self.documents.iter().map(get_siglum).collect()
    }

    /// Rows keyed by liturgical date, ordered by the date definitions of
    /// the first document.
    pub fn by_date(&self) -> Result<String> {
        let first = self.documents.first().ok_or(Error::NoDocuments)?;
        let table = DateTable::from_document(first)?;

        let map = aggregate(self.documents, Grouping::ByDate(&table), &self.filter);
        let ranked = rank(map, &table.order());

        let ctx = RenderContext::new(self.render);
        let grid = build_grid(&ctx, &ranked, OrderKind::Date.label(), &self.sigla());
        Ok(ctx.render_page(&self.title, &ctx.render_table(&grid)))
    }

    /// Rows keyed by verse, ordered by `verses`. The verse is the row key,
    /// so it is not repeated inside cells.
    pub fn by_verse(&self, verses: &OrderSequence) -> Result<String> {
        if self.documents.is_empty() {
            return Err(Error::NoDocuments);
        }

        let map = aggregate(self.documents, Grouping::ByVerse, &self.filter);
        let ranked = rank(map, verses);

        let ctx = RenderContext::new(self.render.with_verse(false));
        let grid = build_grid(&ctx, &ranked, verses.kind().label(), &self.sigla());
        Ok(ctx.render_page(&self.title, &ctx.render_table(&grid)))
    }
}
