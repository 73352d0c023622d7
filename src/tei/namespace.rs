//! Typed namespace registry.
//!
//! A registry is built once per document and handed to every query
//! compilation, so prefix lookups never depend on which subtree a query
//! starts from.

use std::collections::BTreeMap;

/// The namespace bound to the reserved `xml` prefix.
pub const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

/// XInclude namespace.
pub const XINCLUDE_NS: &str = "http://www.w3.org/2001/XInclude";

/// TEI P5 namespace.
pub const TEI_NS: &str = "http://www.tei-c.org/ns/1.0";

/// A namespace declaration as written on an element: `xmlns="uri"` has no
/// prefix, `xmlns:p="uri"` has prefix `p`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub prefix: Option<String>,
    pub uri: String,
}

/// Prefix to namespace-URI table with an optional default namespace.
///
/// The `xml` prefix is always bound to [`XML_NS`] and cannot be rebound.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespaceRegistry {
    default: Option<String>,
    prefixes: BTreeMap<String, String>,
}

impl NamespaceRegistry {
    /// Create a registry holding only the `xml` binding.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from declarations, outermost first. Later
    /// declarations of the same prefix shadow earlier ones.
    pub fn from_declarations<'a, I>(declarations: I) -> Self
    where
        I: IntoIterator<Item = &'a Declaration>,
    {
        let mut registry = Self::new();
        for decl in declarations {
            registry.declare(decl.prefix.as_deref(), &decl.uri);
        }
        registry
    }

    /// Bind `prefix` (or the default namespace when `None`) to `uri`.
    ///
    /// An empty `uri` on the default namespace undeclares it, as
    /// `xmlns=""` does.
    pub fn declare(&mut self, prefix: Option<&str>, uri: &str) {
        match prefix {
            None if uri.is_empty() => self.default = None,
            None => self.default = Some(uri.to_string()),
            Some("xml") => {}
            Some(p) => {
                self.prefixes.insert(p.to_string(), uri.to_string());
            }
        }
    }

    /// Bind `prefix` only if it is not bound yet.
    pub(crate) fn declare_if_absent(&mut self, prefix: Option<&str>, uri: &str) {
        let bound = match prefix {
            None => self.default.is_some(),
            Some(p) => self.resolve(p).is_some(),
        };
        if !bound && !uri.is_empty() {
            self.declare(prefix, uri);
        }
    }

    /// Resolve a prefix to its namespace URI.
    pub fn resolve(&self, prefix: &str) -> Option<&str> {
        if prefix == "xml" {
            return Some(XML_NS);
        }
        self.prefixes.get(prefix).map(String::as_str)
    }

    /// The default namespace applied to unprefixed element names.
    pub fn default_namespace(&self) -> Option<&str> {
        self.default.as_deref()
    }

    /// Iterate over explicit prefix bindings (excluding `xml`).
    pub fn prefixes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.prefixes.iter().map(|(p, u)| (p.as_str(), u.as_str()))
    }
}
