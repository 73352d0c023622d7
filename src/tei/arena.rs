//! Arena-based element tree for TEI documents.
//!
//! Every element lives in one contiguous vector and links to its relatives by
//! index. Character data follows the lxml model: an element's `text` is the
//! content before its first child, its `tail` is the content after its end tag
//! up to the next sibling. Nodes are allocated in document order, so comparing
//! [`NodeId`]s compares document positions.

use std::path::{Path, PathBuf};

use super::namespace::{Declaration, NamespaceRegistry};

/// Unique identifier for a node in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Sentinel value for no node.
    pub const NONE: NodeId = NodeId(u32::MAX);

    /// Check if this is a valid node ID.
    pub fn is_some(&self) -> bool {
        self.0 != u32::MAX
    }

    /// Check if this is the sentinel value.
    pub fn is_none(&self) -> bool {
        self.0 == u32::MAX
    }
}

/// Element or attribute name with its resolved namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QName {
    pub prefix: Option<String>,
    pub ns: Option<String>,
    pub local: String,
}

impl QName {
    pub fn new(prefix: Option<String>, ns: Option<String>, local: impl Into<String>) -> Self {
        Self {
            prefix,
            ns,
            local: local.into(),
        }
    }

    /// Name in no namespace.
    pub fn local(local: impl Into<String>) -> Self {
        Self::new(None, None, local)
    }

    /// Clark notation (`{uri}local`), as lxml spells tags.
    pub fn clark(&self) -> String {
        match &self.ns {
            Some(ns) => format!("{{{ns}}}{}", self.local),
            None => self.local.clone(),
        }
    }
}

/// Element attribute.
#[derive(Debug, Clone)]
pub struct Attribute {
    pub name: QName,
    pub value: String,
}

/// An element in the arena.
#[derive(Debug, Clone)]
pub struct Node {
    pub name: QName,
    pub attrs: Vec<Attribute>,
    /// Namespace declarations made on this element.
    pub declarations: Vec<Declaration>,
    pub text: Option<String>,
    pub tail: Option<String>,
    pub parent: NodeId,
    pub first_child: NodeId,
    pub last_child: NodeId,
    pub next_sibling: NodeId,
}

impl Node {
    fn new(name: QName, attrs: Vec<Attribute>, declarations: Vec<Declaration>) -> Self {
        Self {
            name,
            attrs,
            declarations,
            text: None,
            tail: None,
            parent: NodeId::NONE,
            first_child: NodeId::NONE,
            last_child: NodeId::NONE,
            next_sibling: NodeId::NONE,
        }
    }
}

/// A loaded document: the element arena plus its source path and namespace
/// registry.
///
/// Documents are built by the loader and read-only afterwards.
#[derive(Debug)]
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
    path: PathBuf,
    namespaces: NamespaceRegistry,
}

impl Document {
    /// Create an empty document for `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            nodes: Vec::new(),
            root: NodeId::NONE,
            path: path.into(),
            namespaces: NamespaceRegistry::new(),
        }
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// Get a node by ID.
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        if id.is_none() {
            return None;
        }
        self.nodes.get(id.0 as usize)
    }

    fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        if id.is_none() {
            return None;
        }
        self.nodes.get_mut(id.0 as usize)
    }

    /// Root element ID, or [`NodeId::NONE`] for an empty document.
    pub fn root_id(&self) -> NodeId {
        self.root
    }

    /// The path this document was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Registry used for every query against this document.
    pub fn namespaces(&self) -> &NamespaceRegistry {
        &self.namespaces
    }

    /// Get the number of elements.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the document has no elements.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Create a detached element.
    pub fn create_element(
        &mut self,
        name: QName,
        attrs: Vec<Attribute>,
        declarations: Vec<Declaration>,
    ) -> NodeId {
        self.alloc(Node::new(name, attrs, declarations))
    }

    /// Append `child` as the last child of `parent`, or make it the root
    /// when `parent` is [`NodeId::NONE`].
    pub fn append(&mut self, parent: NodeId, child: NodeId) {
        if parent.is_none() {
            if self.root.is_none() {
                self.root = child;
            }
            return;
        }

        let last_child = self
            .get(parent)
            .map(|n| n.last_child)
            .unwrap_or(NodeId::NONE);

        if let Some(child_node) = self.get_mut(child) {
            child_node.parent = parent;
        }

        if let Some(last_node) = self.get_mut(last_child) {
            last_node.next_sibling = child;
        }

        if let Some(parent_node) = self.get_mut(parent) {
            if parent_node.first_child.is_none() {
                parent_node.first_child = child;
            }
            parent_node.last_child = child;
        }
    }

    /// Append character data at the current end of `parent`: to its `text`
    /// when it has no children yet, otherwise to the last child's `tail`.
    pub fn append_text(&mut self, parent: NodeId, text: &str) {
        let last_child = self
            .get(parent)
            .map(|n| n.last_child)
            .unwrap_or(NodeId::NONE);

        let slot = if last_child.is_some() {
            self.get_mut(last_child).map(|n| &mut n.tail)
        } else {
            self.get_mut(parent).map(|n| &mut n.text)
        };

        if let Some(slot) = slot {
            slot.get_or_insert_with(String::new).push_str(text);
        }
    }

    /// Deep-copy the subtree rooted at `src_id` in `src` and append it to
    /// `parent`. The copied top element receives every namespace declaration
    /// in scope at its source position. Its source tail is not copied.
    pub fn graft(&mut self, parent: NodeId, src: &Document, src_id: NodeId) -> NodeId {
        let Some(node) = src.get(src_id) else {
            return NodeId::NONE;
        };
        let scope = ElementRef::new(src, src_id).in_scope_declarations();
        let top = self.copy_node(node, scope);
        self.append(parent, top);

        // (source, destination parent) pairs still to copy
        let mut stack: Vec<(NodeId, NodeId)> = src
            .child_ids(src_id)
            .rev()
            .map(|child| (child, top))
            .collect();
        while let Some((src_child, dest_parent)) = stack.pop() {
            let Some(node) = src.get(src_child) else {
                continue;
            };
            let copy = self.copy_node(node, node.declarations.clone());
            if let Some(n) = self.get_mut(copy) {
                n.tail = node.tail.clone();
            }
            self.append(dest_parent, copy);
            stack.extend(src.child_ids(src_child).rev().map(|c| (c, copy)));
        }
        top
    }

    fn copy_node(&mut self, node: &Node, declarations: Vec<Declaration>) -> NodeId {
        let id = self.create_element(node.name.clone(), node.attrs.clone(), declarations);
        if let Some(n) = self.get_mut(id) {
            n.text = node.text.clone();
        }
        id
    }

    /// Finish loading: drop whitespace-only text segments and build the
    /// document-wide namespace registry.
    ///
    /// The registry starts from the root's declarations; prefixes first
    /// declared deeper in the tree (typically on included fragments) are
    /// added when not already bound.
    pub fn finish(&mut self) {
        for node in &mut self.nodes {
            if node.text.as_deref().is_some_and(is_blank) {
                node.text = None;
            }
            if node.tail.as_deref().is_some_and(is_blank) {
                node.tail = None;
            }
        }

        let mut registry = NamespaceRegistry::new();
        if let Some(root) = self.get(self.root) {
            for decl in &root.declarations {
                registry.declare(decl.prefix.as_deref(), &decl.uri);
            }
        }
        for node in &self.nodes {
            for decl in &node.declarations {
                registry.declare_if_absent(decl.prefix.as_deref(), &decl.uri);
            }
        }
        self.namespaces = registry;
    }

    /// Iterate over the child IDs of a node.
    pub fn child_ids(&self, parent: NodeId) -> ChildIds<'_> {
        let first = self
            .get(parent)
            .map(|n| n.first_child)
            .unwrap_or(NodeId::NONE);
        ChildIds {
            doc: self,
            current: first,
            ids: Vec::new(),
        }
    }

    /// Root element, if the document has one.
    pub fn root(&self) -> Option<ElementRef<'_>> {
        self.root.is_some().then(|| ElementRef::new(self, self.root))
    }
}

fn is_blank(s: &str) -> bool {
    s.chars().all(char::is_whitespace)
}

/// Iterator over the children of a node.
pub struct ChildIds<'a> {
    doc: &'a Document,
    current: NodeId,
    /// Filled lazily when iterated from the back.
    ids: Vec<NodeId>,
}

impl Iterator for ChildIds<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.ids.is_empty() {
            return Some(self.ids.remove(0));
        }
        if self.current.is_none() {
            return None;
        }
        let id = self.current;
        self.current = self
            .doc
            .get(id)
            .map(|n| n.next_sibling)
            .unwrap_or(NodeId::NONE);
        Some(id)
    }
}

impl DoubleEndedIterator for ChildIds<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        while self.current.is_some() {
            let id = self.current;
            self.ids.push(id);
            self.current = self
                .doc
                .get(id)
                .map(|n| n.next_sibling)
                .unwrap_or(NodeId::NONE);
        }
        self.ids.pop()
    }
}

/// Borrowed handle to an element: the document plus the node's position.
///
/// Identity is positional. Two refs are equal only when they point at the
/// same node of the same document.
#[derive(Clone, Copy)]
pub struct ElementRef<'a> {
    doc: &'a Document,
    id: NodeId,
}

impl<'a> ElementRef<'a> {
    pub fn new(doc: &'a Document, id: NodeId) -> Self {
        Self { doc, id }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn document(&self) -> &'a Document {
        self.doc
    }

    fn node(&self) -> Option<&'a Node> {
        self.doc.get(self.id)
    }

    /// Qualified name, `None` only for a dangling ID.
    pub fn name(&self) -> Option<&'a QName> {
        self.node().map(|n| &n.name)
    }

    /// Tag with any namespace stripped.
    pub fn local_name(&self) -> &'a str {
        self.node().map(|n| n.name.local.as_str()).unwrap_or("")
    }

    /// Namespace URI of the element.
    pub fn namespace(&self) -> Option<&'a str> {
        self.node().and_then(|n| n.name.ns.as_deref())
    }

    /// Value of the un-namespaced attribute `name`.
    pub fn attr(&self, name: &str) -> Option<&'a str> {
        self.node().and_then(|n| {
            n.attrs
                .iter()
                .find(|a| a.name.ns.is_none() && a.name.local == name)
                .map(|a| a.value.as_str())
        })
    }

    /// Value of the attribute `name` in namespace `ns`.
    pub fn attr_ns(&self, ns: &str, name: &str) -> Option<&'a str> {
        self.node().and_then(|n| {
            n.attrs
                .iter()
                .find(|a| a.name.ns.as_deref() == Some(ns) && a.name.local == name)
                .map(|a| a.value.as_str())
        })
    }

    /// All attributes of the element.
    pub fn attrs(&self) -> &'a [Attribute] {
        self.node().map(|n| n.attrs.as_slice()).unwrap_or(&[])
    }

    /// Character data before the first child.
    pub fn text(&self) -> Option<&'a str> {
        self.node().and_then(|n| n.text.as_deref())
    }

    /// Character data after the end tag, up to the next sibling.
    pub fn tail(&self) -> Option<&'a str> {
        self.node().and_then(|n| n.tail.as_deref())
    }

    pub fn parent(&self) -> Option<ElementRef<'a>> {
        let parent = self.node()?.parent;
        parent.is_some().then(|| ElementRef::new(self.doc, parent))
    }

    /// Child elements in document order.
    pub fn children(&self) -> impl Iterator<Item = ElementRef<'a>> + use<'a> {
        let doc = self.doc;
        doc.child_ids(self.id).map(move |id| ElementRef::new(doc, id))
    }

    /// Descendants in document order, excluding this element.
    pub fn descendants(&self) -> Descendants<'a> {
        let mut stack: Vec<NodeId> = self.doc.child_ids(self.id).collect();
        stack.reverse();
        Descendants {
            doc: self.doc,
            stack,
        }
    }

    /// Nearest ancestor-or-self whose local name is `tag`.
    pub fn find_parent(&self, tag: &str) -> Option<ElementRef<'a>> {
        let mut current = Some(*self);
        while let Some(element) = current {
            if element.local_name() == tag {
                return Some(element);
            }
            current = element.parent();
        }
        None
    }

    /// Concatenated text of this element and its descendants, without this
    /// element's own tail.
    pub fn string_value(&self) -> String {
        let mut out = String::new();
        out.push_str(self.text().unwrap_or(""));
        for child in self.children() {
            out.push_str(&child.string_value());
            out.push_str(child.tail().unwrap_or(""));
        }
        out
    }

    /// Namespace declarations in scope here, outermost first.
    pub fn in_scope_declarations(&self) -> Vec<Declaration> {
        let mut chain = Vec::new();
        let mut current = Some(*self);
        while let Some(element) = current {
            if let Some(node) = element.node() {
                chain.push(&node.declarations);
            }
            current = element.parent();
        }
        chain.into_iter().rev().flatten().cloned().collect()
    }

    /// Registry for queries starting here: the document's registry with
    /// the declarations in scope at this element layered over it, so an
    /// inner redeclaration of a prefix wins.
    pub fn namespaces(&self) -> NamespaceRegistry {
        let mut registry = self.doc.namespaces().clone();
        for decl in self.in_scope_declarations() {
            registry.declare(decl.prefix.as_deref(), &decl.uri);
        }
        registry
    }
}

impl PartialEq for ElementRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.doc, other.doc) && self.id == other.id
    }
}

impl Eq for ElementRef<'_> {}

impl std::fmt::Debug for ElementRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElementRef")
            .field("id", &self.id)
            .field("name", &self.name().map(QName::clark))
            .finish()
    }
}

/// Pre-order iterator over descendants.
pub struct Descendants<'a> {
    doc: &'a Document,
    stack: Vec<NodeId>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = ElementRef<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        let mark = self.stack.len();
        self.stack.extend(self.doc.child_ids(id));
        self.stack[mark..].reverse();
        Some(ElementRef::new(self.doc, id))
    }
}
