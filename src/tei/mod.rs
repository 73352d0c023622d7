//! TEI document access: loading, structural queries and text extraction.
//!
//! # Example
//!
//! ```
//! use rubrica::tei::{extract_text, find_element, parse_tei};
//!
//! let xml = r#"<TEI xmlns="http://www.tei-c.org/ns/1.0">
//!   <div type="rubric"><head><orig>In illo tempore</orig></head></div>
//! </TEI>"#;
//! let doc = parse_tei(xml, "edition.xml").unwrap();
//! let root = doc.root().unwrap();
//!
//! let orig = find_element(root, ".//div[@type='rubric']//orig");
//! assert_eq!(extract_text(orig, true), "In illo tempore");
//! ```

mod arena;
mod namespace;
mod parser;
mod query;
mod text;

pub use arena::{Attribute, Document, ElementRef, Node, NodeId, QName};
pub use namespace::{Declaration, NamespaceRegistry, TEI_NS, XINCLUDE_NS, XML_NS};
pub use parser::{parse_tei, read_tei};
pub use query::{
    Query, QueryError, find_element, find_element_with, find_elements, find_elements_with,
};
pub use text::extract_text;

/// Witness siglum of a document: the `n` attribute of the title in its
/// `titleStmt`, or `""` when either is missing.
pub fn get_siglum(doc: &Document) -> String {
    doc.root()
        .and_then(|root| find_element(root, ".//titleStmt"))
        .and_then(|stmt| find_element(stmt, ".//title"))
        .and_then(|title| title.attr("n"))
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_siglum_from_title_statement() {
        let doc = parse_tei(
            r#"<TEI xmlns="http://www.tei-c.org/ns/1.0"><teiHeader><fileDesc><titleStmt><title n="W" type="document">Missal</title></titleStmt></fileDesc></teiHeader></TEI>"#,
            "w.xml",
        )
        .unwrap();
        assert_eq!(get_siglum(&doc), "W");
    }

    #[test]
    fn test_siglum_defaults_to_empty() {
        let no_stmt = parse_tei("<TEI><title n='X'/></TEI>", "a.xml").unwrap();
        assert_eq!(get_siglum(&no_stmt), "");

        let no_n = parse_tei("<TEI><titleStmt><title>t</title></titleStmt></TEI>", "b.xml").unwrap();
        assert_eq!(get_siglum(&no_n), "");
    }
}
