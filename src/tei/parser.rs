//! TEI loading: XML parsing into the arena plus XInclude resolution.
//!
//! The returned document contains no `xi:include` elements: each one is
//! replaced by the included tree (or text), or by its `xi:fallback` content.

use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};

use encoding_rs::{Encoding, WINDOWS_1252};

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use super::arena::{Attribute, Document, ElementRef, NodeId, QName};
use super::namespace::{Declaration, XINCLUDE_NS, XML_NS};
use crate::error::{Error, Result};

/// Load a TEI document from disk, resolving XInclude directives.
pub fn read_tei(path: impl AsRef<Path>) -> Result<Document> {
    let mut stack = Vec::new();
    load(path.as_ref(), &mut stack)
}

/// Parse a TEI document from a string.
///
/// Relative XInclude targets resolve against the parent directory of
/// `base`.
pub fn parse_tei(content: &str, base: impl AsRef<Path>) -> Result<Document> {
    let mut stack = Vec::new();
    parse(content, base.as_ref(), &mut stack)
}

/// Load `path`, with `stack` holding the canonical paths of the documents
/// currently being included.
fn load(path: &Path, stack: &mut Vec<PathBuf>) -> Result<Document> {
    let canonical = fs::canonicalize(path).map_err(|e| Error::io(path, e))?;
    if stack.contains(&canonical) {
        return Err(Error::IncludeCycle(canonical));
    }

    let bytes = fs::read(path).map_err(|e| Error::io(path, e))?;
    let content = decode(&bytes);

    stack.push(canonical);
    let doc = parse(&content, path, stack);
    stack.pop();

    let doc = doc?;
    tracing::debug!(path = %path.display(), elements = doc.len(), "loaded document");
    Ok(doc)
}

/// What an open start tag turned into.
enum Frame {
    /// A regular element in the arena.
    Element(NodeId),
    /// An `xi:include`. `failure` holds the load error until a fallback
    /// replaces the content.
    Include {
        parent: NodeId,
        failure: Option<Error>,
        has_fallback: bool,
    },
    /// An `xi:fallback`; its content is kept only when the include failed.
    Fallback { parent: NodeId, active: bool },
    /// Content that is dropped.
    Skipped,
}

struct Open {
    frame: Frame,
    /// Number of namespace bindings this element pushed.
    bindings: usize,
}

struct Parser<'s> {
    doc: Document,
    path: &'s Path,
    /// In-scope namespace bindings, innermost last.
    bindings: Vec<Declaration>,
    open: Vec<Open>,
    stack: &'s mut Vec<PathBuf>,
}

fn parse(content: &str, path: &Path, stack: &mut Vec<PathBuf>) -> Result<Document> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(false);

    let mut parser = Parser {
        doc: Document::new(path),
        path,
        bindings: Vec::new(),
        open: Vec::new(),
        stack,
    };

    loop {
        let event = reader.read_event().map_err(|source| Error::Xml {
            path: path.to_path_buf(),
            position: reader.buffer_position() as u64,
            source,
        })?;

        match event {
            Event::Start(e) => parser.start(&e)?,
            Event::Empty(e) => {
                parser.start(&e)?;
                parser.end()?;
            }
            Event::End(_) => parser.end()?,
            Event::Text(e) => parser.text(&String::from_utf8_lossy(e.as_ref())),
            Event::CData(e) => parser.text(&String::from_utf8_lossy(e.as_ref())),
            Event::GeneralRef(e) => {
                let entity = String::from_utf8_lossy(e.as_ref());
                match resolve_entity(&entity) {
                    Some(resolved) => parser.text(&resolved),
                    None => parser.text(&format!("&{entity};")),
                }
            }
            Event::Eof => break,
            // Comments, processing instructions, declarations
            _ => {}
        }
    }

    if !parser.open.is_empty() {
        return Err(parser.malformed("unexpected end of file inside an element"));
    }
    if parser.doc.root_id().is_none() {
        return Err(parser.malformed("no root element"));
    }

    let mut doc = parser.doc;
    doc.finish();
    Ok(doc)
}

impl Parser<'_> {
    fn malformed(&self, message: &str) -> Error {
        Error::Malformed {
            path: self.path.to_path_buf(),
            message: message.to_string(),
        }
    }

    /// Where new content goes: `Some(NONE)` at document level, `None` when
    /// content is being dropped.
    fn target(&self) -> Option<NodeId> {
        match self.open.last().map(|o| &o.frame) {
            None => Some(NodeId::NONE),
            Some(Frame::Element(id)) => Some(*id),
            Some(Frame::Fallback { parent, active }) => active.then_some(*parent),
            Some(Frame::Include { .. } | Frame::Skipped) => None,
        }
    }

    fn resolve_prefix(&self, prefix: Option<&str>) -> Option<String> {
        if prefix == Some("xml") {
            return Some(XML_NS.to_string());
        }
        self.bindings
            .iter()
            .rev()
            .find(|d| d.prefix.as_deref() == prefix)
            .map(|d| d.uri.clone())
            .filter(|uri| !uri.is_empty())
    }

    fn text(&mut self, text: &str) {
        if let Some(target) = self.target()
            && target.is_some()
        {
            self.doc.append_text(target, text);
        }
    }

    fn start(&mut self, e: &BytesStart<'_>) -> Result<()> {
        let raw_name = String::from_utf8_lossy(e.name().as_ref()).into_owned();

        let mut declarations = Vec::new();
        let mut raw_attrs = Vec::new();
        for attr in e.attributes() {
            let attr = attr.map_err(|err| self.malformed(&err.to_string()))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = unescape(&String::from_utf8_lossy(&attr.value));
            if key == "xmlns" {
                declarations.push(Declaration {
                    prefix: None,
                    uri: value,
                });
            } else if let Some(prefix) = key.strip_prefix("xmlns:") {
                declarations.push(Declaration {
                    prefix: Some(prefix.to_string()),
                    uri: value,
                });
            } else {
                raw_attrs.push((key, value));
            }
        }

        let bindings = declarations.len();
        self.bindings.extend(declarations.iter().cloned());

        let (prefix, local) = split_name(&raw_name);
        let ns = self.resolve_prefix(prefix);
        if prefix.is_some() && ns.is_none() {
            return Err(self.malformed(&format!("unbound prefix in <{raw_name}>")));
        }

        let mut attrs = Vec::with_capacity(raw_attrs.len());
        for (key, value) in raw_attrs {
            let (attr_prefix, attr_local) = split_name(&key);
            let attr_ns = match attr_prefix {
                Some(p) => Some(
                    self.resolve_prefix(Some(p))
                        .ok_or_else(|| self.malformed(&format!("unbound prefix in @{key}")))?,
                ),
                None => None,
            };
            attrs.push(Attribute {
                name: QName::new(attr_prefix.map(str::to_string), attr_ns, attr_local),
                value,
            });
        }

        let name = QName::new(prefix.map(str::to_string), ns, local);
        let xinclude = name.ns.as_deref() == Some(XINCLUDE_NS);

        let frame = match self.target() {
            None => self.start_dropped(xinclude && name.local == "fallback"),
            Some(parent) if xinclude && name.local == "include" => {
                let failure = self.include(parent, &attrs).err();
                Frame::Include {
                    parent,
                    failure,
                    has_fallback: false,
                }
            }
            Some(_) if xinclude && name.local == "fallback" => Frame::Skipped,
            Some(parent) => {
                if parent.is_none() && self.doc.root_id().is_some() {
                    return Err(self.malformed("more than one root element"));
                }
                let id = self.doc.create_element(name, attrs, declarations);
                self.doc.append(parent, id);
                Frame::Element(id)
            }
        };

        self.open.push(Open { frame, bindings });
        Ok(())
    }

    /// Start tag met while content is being dropped. Only an `xi:fallback`
    /// directly inside an `xi:include` can switch output back on.
    fn start_dropped(&mut self, fallback: bool) -> Frame {
        if fallback
            && let Some(Open {
                frame:
                    Frame::Include {
                        parent,
                        failure,
                        has_fallback,
                    },
                ..
            }) = self.open.last_mut()
        {
            *has_fallback = true;
            return Frame::Fallback {
                parent: *parent,
                active: failure.is_some(),
            };
        }
        Frame::Skipped
    }

    fn end(&mut self) -> Result<()> {
        let Some(open) = self.open.pop() else {
            return Err(self.malformed("unexpected end tag"));
        };
        let keep = self.bindings.len().saturating_sub(open.bindings);
        self.bindings.truncate(keep);

        if let Frame::Include {
            failure: Some(err),
            has_fallback: false,
            ..
        } = open.frame
        {
            return Err(err);
        }
        Ok(())
    }

    /// Resolve one `xi:include` into `parent`.
    fn include(&mut self, parent: NodeId, attrs: &[Attribute]) -> Result<()> {
        let href = find_attr(attrs, "href").unwrap_or_default();
        if href.is_empty() {
            return Err(Error::Include {
                href,
                message: "missing href".to_string(),
            });
        }

        let base = self.path.parent().unwrap_or_else(|| Path::new(""));
        let target = base.join(&href);

        if find_attr(attrs, "parse").as_deref() == Some("text") {
            let bytes = fs::read(&target).map_err(|e| Error::Include {
                href: href.clone(),
                message: e.to_string(),
            })?;
            if parent.is_none() {
                return Err(self.malformed("text include outside the root element"));
            }
            let text = decode(&bytes);
            self.doc.append_text(parent, &text);
            tracing::debug!(%href, "included text");
            return Ok(());
        }

        let included = load(&target, &mut *self.stack).map_err(|err| match err {
            Error::Io { source, .. } => Error::Include {
                href: href.clone(),
                message: source.to_string(),
            },
            other => other,
        })?;
        let node = match find_attr(attrs, "xpointer") {
            Some(pointer) => {
                let id = xpointer_id(&pointer).ok_or_else(|| Error::Include {
                    href: href.clone(),
                    message: format!("unsupported xpointer {pointer:?}"),
                })?;
                find_by_xml_id(&included, id).ok_or_else(|| Error::Include {
                    href: href.clone(),
                    message: format!("no element with xml:id {id:?}"),
                })?
            }
            None => included.root_id(),
        };

        if parent.is_none() && self.doc.root_id().is_some() {
            return Err(self.malformed("more than one root element"));
        }
        self.doc.graft(parent, &included, node);
        tracing::debug!(%href, "included document");
        Ok(())
    }
}

fn find_attr(attrs: &[Attribute], name: &str) -> Option<String> {
    attrs
        .iter()
        .find(|a| a.name.ns.is_none() && a.name.local == name)
        .map(|a| a.value.clone())
}

/// Extract the id from the xpointer forms TEI projects use: a bare
/// shorthand pointer, `element(id)` or `xpointer(id('id'))`.
fn xpointer_id(pointer: &str) -> Option<&str> {
    let pointer = pointer.trim();
    if let Some(inner) = pointer
        .strip_prefix("element(")
        .and_then(|s| s.strip_suffix(')'))
    {
        return (!inner.contains('/')).then_some(inner);
    }
    if let Some(inner) = pointer
        .strip_prefix("xpointer(id(")
        .and_then(|s| s.strip_suffix("))"))
    {
        return Some(inner.trim_matches(|c| c == '\'' || c == '"'));
    }
    let shorthand = !pointer.is_empty() && !pointer.contains(['(', ')', '/']);
    shorthand.then_some(pointer)
}

fn find_by_xml_id(doc: &Document, id: &str) -> Option<NodeId> {
    let root = doc.root()?;
    std::iter::once(root)
        .chain(root.descendants())
        .find(|e: &ElementRef<'_>| e.attr_ns(XML_NS, "id") == Some(id))
        .map(|e| e.id())
}

/// Split a raw name into prefix and local part (`tei:div` -> `tei`, `div`).
fn split_name(name: &str) -> (Option<&str>, &str) {
    match name.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, name),
    }
}

/// Resolve XML entity references.
fn resolve_entity(entity: &str) -> Option<String> {
    match entity {
        "apos" => return Some("'".to_string()),
        "quot" => return Some("\"".to_string()),
        "lt" => return Some("<".to_string()),
        "gt" => return Some(">".to_string()),
        "amp" => return Some("&".to_string()),
        _ => {}
    }

    if let Some(hex) = entity.strip_prefix("#x") {
        if let Ok(code) = u32::from_str_radix(hex, 16)
            && let Some(c) = char::from_u32(code)
        {
            return Some(c.to_string());
        }
    } else if let Some(dec) = entity.strip_prefix('#')
        && let Ok(code) = dec.parse::<u32>()
        && let Some(c) = char::from_u32(code)
    {
        return Some(c.to_string());
    }

    None
}

/// Replace entity references in an attribute value. Unknown references are
/// kept as written.
fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        match after.find(';') {
            Some(end) => match resolve_entity(&after[..end]) {
                Some(resolved) => {
                    out.push_str(&resolved);
                    rest = &after[end + 1..];
                }
                None => {
                    out.push('&');
                    rest = after;
                }
            },
            None => {
                out.push('&');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Document bytes as text.
///
/// A UTF-8 byte order mark is dropped. Bytes that are not valid UTF-8 are
/// read in the encoding named by the XML declaration, or as Windows-1252
/// when there is none or the label is unknown.
fn decode(bytes: &[u8]) -> Cow<'_, str> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    if let Ok(text) = std::str::from_utf8(bytes) {
        return Cow::Borrowed(text);
    }

    let encoding = declared_encoding(bytes)
        .and_then(Encoding::for_label)
        .unwrap_or(WINDOWS_1252);
    let (text, _) = encoding.decode_without_bom_handling(bytes);
    text
}

/// Label from `<?xml ... encoding="label"?>` at the start of `bytes`.
fn declared_encoding(bytes: &[u8]) -> Option<&[u8]> {
    let decl = bytes.strip_prefix(b"<?xml")?;
    let decl = &decl[..decl.windows(2).position(|w| w == b"?>")?];

    let at = decl.windows(8).position(|w| w == b"encoding")?;
    let value = decl[at + 8..]
        .trim_ascii_start()
        .strip_prefix(b"=")?
        .trim_ascii_start();

    let (&quote, value) = value.split_first()?;
    if quote != b'"' && quote != b'\'' {
        return None;
    }
    let end = value.iter().position(|&b| b == quote)?;
    Some(&value[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tei::namespace::TEI_NS;

    fn parse_str(xml: &str) -> Document {
        parse_tei(xml, "test.xml").unwrap()
    }

    #[test]
    fn test_decode_utf8_with_bom() {
        assert_eq!(decode(b"\xEF\xBB\xBF<TEI/>"), "<TEI/>");
        assert!(matches!(decode("Cantate Domino".as_bytes()), Cow::Borrowed(_)));
    }

    #[test]
    fn test_decode_declared_encoding() {
        let mut bytes = b"<?xml version='1.0' encoding = 'ISO-8859-1'?><p>Dies ".to_vec();
        bytes.push(0xE9);
        bytes.extend_from_slice(b"</p>");
        assert!(decode(&bytes).ends_with("<p>Dies \u{e9}</p>"));
    }

    #[test]
    fn test_decode_falls_back_to_windows_1252() {
        assert_eq!(decode(&[0x93, b'x', 0x94]), "\u{201C}x\u{201D}");
        // unknown labels fall back too
        assert_eq!(
            decode(b"<?xml version=\"1.0\" encoding=\"klingon\"?>\x93"),
            "<?xml version=\"1.0\" encoding=\"klingon\"?>\u{201C}"
        );
    }

    #[test]
    fn test_declared_encoding() {
        assert_eq!(
            declared_encoding(b"<?xml version=\"1.0\" encoding=\"UTF-16\"?><TEI/>"),
            Some(&b"UTF-16"[..])
        );
        assert_eq!(declared_encoding(b"<?xml version=\"1.0\"?><TEI encoding='x'/>"), None);
        assert_eq!(declared_encoding(b"<TEI/>"), None);
        assert_eq!(declared_encoding(b"<?xml encoding=latin1?>"), None);
    }

    #[test]
    fn test_split_name() {
        assert_eq!(split_name("tei:div"), (Some("tei"), "div"));
        assert_eq!(split_name("div"), (None, "div"));
    }

    #[test]
    fn test_resolve_entity() {
        assert_eq!(resolve_entity("amp"), Some("&".to_string()));
        assert_eq!(resolve_entity("#x41"), Some("A".to_string()));
        assert_eq!(resolve_entity("#65"), Some("A".to_string()));
        assert_eq!(resolve_entity("nbsp"), None);
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape("a &amp; b"), "a & b");
        assert_eq!(unescape("&#x2020;x"), "\u{2020}x");
        assert_eq!(unescape("&unknown; &"), "&unknown; &");
    }

    #[test]
    fn test_xpointer_forms() {
        assert_eq!(xpointer_id("part1"), Some("part1"));
        assert_eq!(xpointer_id("element(part1)"), Some("part1"));
        assert_eq!(xpointer_id("xpointer(id('part1'))"), Some("part1"));
        assert_eq!(xpointer_id("element(/1/2)"), None);
    }

    #[test]
    fn test_namespaces_resolved() {
        let doc = parse_str(
            r#"<TEI xmlns="http://www.tei-c.org/ns/1.0"><text xml:id="t1"><p>x</p></text></TEI>"#,
        );
        let root = doc.root().unwrap();
        assert_eq!(root.namespace(), Some(TEI_NS));
        let text = root.children().next().unwrap();
        assert_eq!(text.attr_ns(XML_NS, "id"), Some("t1"));
        assert_eq!(doc.namespaces().default_namespace(), Some(TEI_NS));
    }

    #[test]
    fn test_text_tail_and_entities() {
        let doc = parse_str("<p>fish &amp; <hi>chips</hi> &#x26; peas<!-- c --> too</p>");
        let p = doc.root().unwrap();
        assert_eq!(p.text(), Some("fish & "));
        let hi = p.children().next().unwrap();
        assert_eq!(hi.text(), Some("chips"));
        assert_eq!(hi.tail(), Some(" & peas too"));
    }

    #[test]
    fn test_cdata_is_text() {
        let doc = parse_str("<p><![CDATA[a < b]]></p>");
        assert_eq!(doc.root().unwrap().text(), Some("a < b"));
    }

    #[test]
    fn test_unbound_prefix_is_malformed() {
        let err = parse_tei("<x:p/>", "test.xml").unwrap_err();
        assert!(matches!(err, Error::Malformed { .. }));
    }

    #[test]
    fn test_mismatched_tags_fail() {
        assert!(parse_tei("<a><b></a></b>", "test.xml").is_err());
    }

    #[test]
    fn test_unclosed_fails() {
        assert!(parse_tei("<a><b></b>", "test.xml").is_err());
    }

    #[test]
    fn test_no_root_fails() {
        let err = parse_tei("<?xml version=\"1.0\"?>", "test.xml").unwrap_err();
        assert!(matches!(err, Error::Malformed { .. }));
    }

    #[test]
    fn test_missing_include_uses_fallback() {
        let doc = parse_str(
            r#"<TEI xmlns:xi="http://www.w3.org/2001/XInclude"><body><xi:include href="does-not-exist.xml"><xi:fallback><p>missing</p></xi:fallback></xi:include> after</body></TEI>"#,
        );
        let body = doc.root().unwrap().children().next().unwrap();
        let p = body.children().next().unwrap();
        assert_eq!(p.local_name(), "p");
        assert_eq!(p.text(), Some("missing"));
        assert_eq!(p.tail(), Some(" after"));
    }

    #[test]
    fn test_missing_include_without_fallback_fails() {
        let result = parse_tei(
            r#"<TEI xmlns:xi="http://www.w3.org/2001/XInclude"><xi:include href="does-not-exist.xml"/></TEI>"#,
            "test.xml",
        );
        assert!(matches!(result, Err(Error::Include { .. })));
    }
}
