//! Path queries over the element arena.
//!
//! Supports the ElementPath subset used against TEI documents:
//!
//! - steps separated by `/`, `//` for any depth, `.` and `..`, `*`
//! - names as `tag`, `prefix:tag`, `{uri}tag`, `{*}tag` or `{}tag`
//! - predicates `[@attr]`, `[@attr='v']`, `[tag]`, `[tag='text']`,
//!   `[.='text']`, `[n]` and `[last()]`
//!
//! A trailing `/` selects all children, as `a/` means `a/*`.
//!
//! [`find_element`] and [`find_elements`] first run a query with the
//! namespaces in scope at the starting element, where unprefixed names take
//! the default namespace, then run it again with no registry, where
//! unprefixed names only match un-namespaced elements.

use thiserror::Error;

use super::arena::{ElementRef, NodeId, QName};
use super::namespace::NamespaceRegistry;

/// Syntax errors in a query expression.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("empty query")]
    Empty,

    #[error("absolute paths are not supported on elements")]
    Absolute,

    #[error("prefix '{0}' not found in prefix map")]
    UnknownPrefix(String),

    #[error("unexpected {found:?} at offset {offset}")]
    Unexpected { offset: usize, found: String },

    #[error("unterminated {0}")]
    Unterminated(&'static str),
}

/// Namespace constraint of a name test.
#[derive(Debug, Clone, PartialEq, Eq)]
enum NsTest {
    Any,
    None,
    Uri(String),
}

impl NsTest {
    fn matches(&self, ns: Option<&str>) -> bool {
        match self {
            NsTest::Any => true,
            NsTest::None => ns.is_none(),
            NsTest::Uri(uri) => ns == Some(uri.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct NameTest {
    ns: NsTest,
    /// `None` for `*`.
    local: Option<String>,
}

impl NameTest {
    fn matches(&self, name: &QName) -> bool {
        self.ns.matches(name.ns.as_deref())
            && self.local.as_deref().is_none_or(|l| l == name.local)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Axis {
    Child,
    Descendant,
    SelfNode,
    Parent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Predicate {
    HasAttr(NameTest),
    AttrEquals(NameTest, String),
    HasChild(NameTest),
    ChildTextEquals(NameTest, String),
    TextEquals(String),
    /// 1-based position among same-named siblings.
    Position(usize),
    Last,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Step {
    axis: Axis,
    test: NameTest,
    predicates: Vec<Predicate>,
}

/// A compiled query. Names are resolved at compile time, so a query is tied
/// to the registry (or absence of one) it was compiled with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    steps: Vec<Step>,
}

impl Query {
    /// Compile `expr`. With a registry, prefixes resolve through it and
    /// unprefixed element names take its default namespace. Without one,
    /// any prefix other than `{uri}` notation is an error.
    pub fn compile(expr: &str, namespaces: Option<&NamespaceRegistry>) -> Result<Self, QueryError> {
        Compiler {
            src: expr,
            pos: 0,
            namespaces,
        }
        .compile()
    }

    /// All matches under `scope`, in document order, without duplicates.
    pub fn select<'a>(&self, scope: ElementRef<'a>) -> Vec<ElementRef<'a>> {
        let doc = scope.document();
        let mut current = vec![scope.id()];

        for step in &self.steps {
            let mut next: Vec<NodeId> = Vec::new();
            for &ctx in &current {
                let ctx = ElementRef::new(doc, ctx);
                let candidates: Vec<ElementRef<'a>> = match step.axis {
                    Axis::Child => ctx.children().filter(|e| step.matches(e)).collect(),
                    Axis::Descendant => ctx.descendants().filter(|e| step.matches(e)).collect(),
                    Axis::SelfNode => vec![ctx],
                    Axis::Parent => ctx.parent().into_iter().collect(),
                };
                next.extend(
                    candidates
                        .into_iter()
                        .filter(|e| step.predicates.iter().all(|p| p.holds(*e)))
                        .map(|e| e.id()),
                );
            }
            next.sort_unstable();
            next.dedup();
            current = next;
        }

        current
            .into_iter()
            .map(|id| ElementRef::new(doc, id))
            .collect()
    }

    /// First match under `scope`.
    pub fn select_first<'a>(&self, scope: ElementRef<'a>) -> Option<ElementRef<'a>> {
        self.select(scope).into_iter().next()
    }
}

impl Step {
    fn matches(&self, element: &ElementRef<'_>) -> bool {
        element.name().is_some_and(|name| self.test.matches(name))
    }
}

impl Predicate {
    fn holds(&self, element: ElementRef<'_>) -> bool {
        match self {
            Predicate::HasAttr(test) => element.attrs().iter().any(|a| test.matches(&a.name)),
            Predicate::AttrEquals(test, value) => element
                .attrs()
                .iter()
                .any(|a| test.matches(&a.name) && &a.value == value),
            Predicate::HasChild(test) => element
                .children()
                .any(|c| c.name().is_some_and(|n| test.matches(n))),
            Predicate::ChildTextEquals(test, value) => element.children().any(|c| {
                c.name().is_some_and(|n| test.matches(n)) && &c.string_value() == value
            }),
            Predicate::TextEquals(value) => &element.string_value() == value,
            Predicate::Position(n) => same_named_siblings(element)
                .get(n - 1)
                .is_some_and(|e| *e == element),
            Predicate::Last => same_named_siblings(element).last() == Some(&element),
        }
    }
}

fn same_named_siblings(element: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    let Some(parent) = element.parent() else {
        return vec![element];
    };
    let key = |e: &ElementRef<'_>| e.name().map(|n| (n.ns.clone(), n.local.clone()));
    let name = key(&element);
    parent.children().filter(|c| key(c) == name).collect()
}

struct Compiler<'q, 'r> {
    src: &'q str,
    pos: usize,
    namespaces: Option<&'r NamespaceRegistry>,
}

impl Compiler<'_, '_> {
    fn rest(&self) -> &str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn eat(&mut self, s: &str) -> bool {
        if self.rest().starts_with(s) {
            self.pos += s.len();
            true
        } else {
            false
        }
    }

    fn skip_ws(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.src.len() - trimmed.len();
    }

    fn unexpected(&self) -> QueryError {
        QueryError::Unexpected {
            offset: self.pos,
            found: self
                .peek()
                .map(String::from)
                .unwrap_or_else(|| "end of query".to_string()),
        }
    }

    fn compile(mut self) -> Result<Query, QueryError> {
        self.skip_ws();
        if self.rest().is_empty() {
            return Err(QueryError::Empty);
        }
        if self.rest().starts_with('/') {
            return Err(QueryError::Absolute);
        }

        let mut steps = Vec::new();
        let mut axis = Axis::Child;
        loop {
            steps.push(self.step(axis)?);
            if self.rest().trim_end().is_empty() {
                break;
            }
            axis = if self.eat("//") {
                Axis::Descendant
            } else if self.eat("/") {
                if self.rest().trim_end().is_empty() {
                    steps.push(Step {
                        axis: Axis::Child,
                        test: NameTest {
                            ns: NsTest::Any,
                            local: None,
                        },
                        predicates: Vec::new(),
                    });
                    break;
                }
                Axis::Child
            } else {
                return Err(self.unexpected());
            };
        }
        Ok(Query { steps })
    }

    fn step(&mut self, axis: Axis) -> Result<Step, QueryError> {
        let any = NameTest {
            ns: NsTest::Any,
            local: None,
        };
        let (axis, test) = if self.eat("..") {
            if axis == Axis::Descendant {
                return Err(self.unexpected());
            }
            (Axis::Parent, any)
        } else if self.peek() == Some('.') {
            self.pos += 1;
            if axis == Axis::Descendant {
                return Err(self.unexpected());
            }
            (Axis::SelfNode, any)
        } else {
            (axis, self.name_test(true)?)
        };

        let mut predicates = Vec::new();
        while self.eat("[") {
            predicates.push(self.predicate()?);
        }

        Ok(Step {
            axis,
            test,
            predicates,
        })
    }

    fn name(&mut self) -> Option<String> {
        let start = self.pos;
        let len = self
            .rest()
            .find(|c: char| !(c.is_alphanumeric() || matches!(c, '_' | '-' | '.')))
            .unwrap_or(self.rest().len());
        self.pos += len;
        (len > 0).then(|| self.src[start..start + len].to_string())
    }

    /// Parse a name test. Element names take the default namespace when
    /// `element` is set; attribute names never do.
    fn name_test(&mut self, element: bool) -> Result<NameTest, QueryError> {
        if self.eat("*") {
            return Ok(NameTest {
                ns: NsTest::Any,
                local: None,
            });
        }

        if self.eat("{") {
            let end = self
                .rest()
                .find('}')
                .ok_or(QueryError::Unterminated("namespace URI"))?;
            let uri = self.rest()[..end].to_string();
            self.pos += end + 1;
            let ns = match uri.as_str() {
                "*" => NsTest::Any,
                "" => NsTest::None,
                _ => NsTest::Uri(uri),
            };
            let local = if self.eat("*") {
                None
            } else {
                Some(self.name().ok_or_else(|| self.unexpected())?)
            };
            return Ok(NameTest { ns, local });
        }

        let first = self.name().ok_or_else(|| self.unexpected())?;
        if self.eat(":") {
            let local = self.name().ok_or_else(|| self.unexpected())?;
            let uri = self
                .namespaces
                .and_then(|ns| ns.resolve(&first))
                .ok_or(QueryError::UnknownPrefix(first))?;
            return Ok(NameTest {
                ns: NsTest::Uri(uri.to_string()),
                local: Some(local),
            });
        }

        let ns = match self.namespaces.and_then(|ns| ns.default_namespace()) {
            Some(uri) if element => NsTest::Uri(uri.to_string()),
            _ => NsTest::None,
        };
        Ok(NameTest {
            ns,
            local: Some(first),
        })
    }

    fn literal(&mut self) -> Result<String, QueryError> {
        let quote = match self.peek() {
            Some(q @ ('\'' | '"')) => q,
            _ => return Err(self.unexpected()),
        };
        self.pos += 1;
        let end = self
            .rest()
            .find(quote)
            .ok_or(QueryError::Unterminated("string literal"))?;
        let value = self.rest()[..end].to_string();
        self.pos += end + 1;
        Ok(value)
    }

    /// Parse a predicate body after `[`, including the closing `]`.
    fn predicate(&mut self) -> Result<Predicate, QueryError> {
        self.skip_ws();
        let predicate = if self.eat("@") {
            let test = self.name_test(false)?;
            self.skip_ws();
            if self.eat("=") {
                self.skip_ws();
                Predicate::AttrEquals(test, self.literal()?)
            } else {
                Predicate::HasAttr(test)
            }
        } else if self.eat("last()") {
            Predicate::Last
        } else if self.peek().is_some_and(|c| c.is_ascii_digit()) {
            let start = self.pos;
            let len = self
                .rest()
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(self.rest().len());
            self.pos += len;
            let n: usize = self.src[start..start + len]
                .parse()
                .map_err(|_| self.unexpected())?;
            if n == 0 {
                return Err(QueryError::Unexpected {
                    offset: start,
                    found: "0".to_string(),
                });
            }
            Predicate::Position(n)
        } else if self.eat(".") {
            self.skip_ws();
            if !self.eat("=") {
                return Err(self.unexpected());
            }
            self.skip_ws();
            Predicate::TextEquals(self.literal()?)
        } else {
            let test = self.name_test(true)?;
            self.skip_ws();
            if self.eat("=") {
                self.skip_ws();
                Predicate::ChildTextEquals(test, self.literal()?)
            } else {
                Predicate::HasChild(test)
            }
        };

        self.skip_ws();
        if self.eat("]") {
            Ok(predicate)
        } else if self.rest().is_empty() {
            Err(QueryError::Unterminated("predicate"))
        } else {
            Err(self.unexpected())
        }
    }
}

/// First element matching `expr` under `scope`.
///
/// Tries the query against the namespaces in scope at `scope` (see
/// [`ElementRef::namespaces`]), then with no namespaces. A syntax error in
/// either pass counts as no match.
pub fn find_element<'a>(scope: ElementRef<'a>, expr: &str) -> Option<ElementRef<'a>> {
    find_element_with(scope, expr, &scope.namespaces())
}

/// [`find_element`] with an explicit registry for the first pass.
pub fn find_element_with<'a>(
    scope: ElementRef<'a>,
    expr: &str,
    namespaces: &NamespaceRegistry,
) -> Option<ElementRef<'a>> {
    Query::compile(expr, Some(namespaces))
        .ok()
        .and_then(|q| q.select_first(scope))
        .or_else(|| {
            Query::compile(expr, None)
                .ok()
                .and_then(|q| q.select_first(scope))
        })
}

/// All elements matching `expr` under `scope`: the namespaced pass's
/// results followed by the bare pass's results.
///
/// An element matched by both passes appears twice. A pass whose query does
/// not compile contributes nothing.
pub fn find_elements<'a>(scope: ElementRef<'a>, expr: &str) -> Vec<ElementRef<'a>> {
    find_elements_with(scope, expr, &scope.namespaces())
}

/// [`find_elements`] with an explicit registry for the first pass.
pub fn find_elements_with<'a>(
    scope: ElementRef<'a>,
    expr: &str,
    namespaces: &NamespaceRegistry,
) -> Vec<ElementRef<'a>> {
    let mut results = Vec::new();
    for registry in [Some(namespaces), None] {
        match Query::compile(expr, registry) {
            Ok(query) => results.extend(query.select(scope)),
            Err(err) => {
                tracing::trace!(%expr, error = %err, "query pass skipped");
            }
        }
    }
    results
}
