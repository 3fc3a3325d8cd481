//! In-memory page document with selector queries and mutation observers.
//!
//! The document is an arena of element and text nodes. Removing a node only
//! detaches it, so ids held by queued mutation records stay valid.
//!
//! Observers follow the MutationObserver model: a record is queued for an
//! observer at mutation time if its target lies in the observed scope, and
//! queued records are delivered as one batch when the `Page::mutate` call
//! that produced them returns.

use std::fmt::Write as _;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tracing::trace;

/// Index of a node in its document arena
pub type NodeId = usize;

/// Errors raised by document queries and mutations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomError {
    #[error("'{0}' is not a valid selector")]
    InvalidSelector(String),

    #[error("No node with id {0}")]
    UnknownNode(NodeId),

    #[error("Node {0} is not an element")]
    NotAnElement(NodeId),
}

#[derive(Debug, Clone)]
enum NodeKind {
    Element {
        tag: String,
        attributes: Vec<(String, String)>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Declarative element description used to insert subtrees
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    tag: String,
    attributes: Vec<(String, String)>,
    children: Vec<Child>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Child {
    Element(Element),
    Text(String),
}

impl Element {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.push((name.to_string(), value.to_string()));
        self
    }

    /// Add a class, merging with any existing class attribute
    pub fn class(mut self, class: &str) -> Self {
        match self.attributes.iter_mut().find(|(name, _)| name == "class") {
            Some((_, value)) => {
                value.push(' ');
                value.push_str(class);
            }
            None => self.attributes.push(("class".to_string(), class.to_string())),
        }
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.children.push(Child::Text(text.to_string()));
        self
    }

    pub fn child(mut self, child: Element) -> Self {
        self.children.push(Child::Element(child));
        self
    }
}

/// Arena-backed element tree
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create a document holding only its `html` root element
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                kind: NodeKind::Element {
                    tag: "html".to_string(),
                    attributes: Vec::new(),
                },
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    pub fn root(&self) -> NodeId {
        0
    }

    fn node(&self, id: NodeId) -> Result<&Node, DomError> {
        self.nodes.get(id).ok_or(DomError::UnknownNode(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, DomError> {
        self.nodes.get_mut(id).ok_or(DomError::UnknownNode(id))
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id).and_then(|node| node.parent)
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(
            self.nodes.get(id).map(|node| &node.kind),
            Some(NodeKind::Element { .. })
        )
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        match &self.nodes.get(id)?.kind {
            NodeKind::Element { tag, .. } => Some(tag),
            NodeKind::Text(_) => None,
        }
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        match &self.nodes.get(id)?.kind {
            NodeKind::Element { attributes, .. } => attributes
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.as_str()),
            NodeKind::Text(_) => None,
        }
    }

    /// Element children only, in order
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.nodes
            .get(id)
            .map(|node| {
                node.children
                    .iter()
                    .copied()
                    .filter(|child| self.is_element(*child))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether `node` is `ancestor` or one of its descendants
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    /// Whether the node is still attached to the document root
    pub fn is_connected(&self, node: NodeId) -> bool {
        self.contains(self.root(), node)
    }

    /// First descendant of `scope` in document order matching `selector`
    pub fn query_selector(&self, scope: NodeId, selector: &str) -> Result<Option<NodeId>, DomError> {
        let selector = Selector::parse(selector)?;
        self.node(scope)?;
        Ok(self.find_descendant(scope, &selector))
    }

    fn find_descendant(&self, scope: NodeId, selector: &Selector) -> Option<NodeId> {
        let mut stack: Vec<NodeId> = self.nodes[scope].children.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            if selector.matches(self, id) {
                return Some(id);
            }
            stack.extend(self.nodes[id].children.iter().rev().copied());
        }
        None
    }

    /// The node itself or its nearest ancestor matching `selector`.
    ///
    /// Text nodes start the search at their parent element.
    pub fn closest(&self, node: NodeId, selector: &str) -> Result<Option<NodeId>, DomError> {
        let selector = Selector::parse(selector)?;
        self.node(node)?;
        let mut current = Some(node);
        while let Some(id) = current {
            if selector.matches(self, id) {
                return Ok(Some(id));
            }
            current = self.parent(id);
        }
        Ok(None)
    }

    /// Serialized markup of the node's children
    pub fn inner_html(&self, id: NodeId) -> Result<String, DomError> {
        let node = self.node(id)?;
        let mut out = String::new();
        match &node.kind {
            NodeKind::Text(text) => out.push_str(&escape_text(text)),
            NodeKind::Element { .. } => {
                for child in &node.children {
                    self.write_markup(*child, &mut out);
                }
            }
        }
        Ok(out)
    }

    fn write_markup(&self, id: NodeId, out: &mut String) {
        let node = &self.nodes[id];
        match &node.kind {
            NodeKind::Text(text) => out.push_str(&escape_text(text)),
            NodeKind::Element { tag, attributes } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attributes {
                    let _ = write!(out, " {}=\"{}\"", name, escape_attribute(value));
                }
                out.push('>');
                for child in &node.children {
                    self.write_markup(*child, out);
                }
                let _ = write!(out, "</{}>", tag);
            }
        }
    }

    pub fn text_content(&self, id: NodeId) -> Result<String, DomError> {
        self.node(id)?;
        let mut out = String::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let node = &self.nodes[current];
            if let NodeKind::Text(text) = &node.kind {
                out.push_str(text);
            }
            stack.extend(node.children.iter().rev().copied());
        }
        Ok(out)
    }

    fn alloc(&mut self, kind: NodeKind, parent: Option<NodeId>) -> NodeId {
        self.nodes.push(Node {
            kind,
            parent,
            children: Vec::new(),
        });
        self.nodes.len() - 1
    }

    fn build(&mut self, parent: NodeId, element: Element) -> NodeId {
        let id = self.alloc(
            NodeKind::Element {
                tag: element.tag,
                attributes: element.attributes,
            },
            Some(parent),
        );
        for child in element.children {
            let child_id = match child {
                Child::Element(el) => self.build(id, el),
                Child::Text(text) => self.alloc(NodeKind::Text(text), Some(id)),
            };
            self.nodes[id].children.push(child_id);
        }
        id
    }

    fn expect_element(&self, id: NodeId) -> Result<(), DomError> {
        self.node(id)?;
        if self.is_element(id) {
            Ok(())
        } else {
            Err(DomError::NotAnElement(id))
        }
    }

    /// Append a subtree under `parent`, returning the new element's id
    pub fn append(&mut self, parent: NodeId, element: Element) -> Result<NodeId, DomError> {
        self.expect_element(parent)?;
        let id = self.build(parent, element);
        self.nodes[parent].children.push(id);
        Ok(id)
    }

    /// Detach a node from its parent. Returns the former parent.
    pub fn remove(&mut self, id: NodeId) -> Result<Option<NodeId>, DomError> {
        let parent = self.node(id)?.parent;
        if let Some(parent) = parent {
            self.nodes[parent].children.retain(|child| *child != id);
        }
        self.nodes[id].parent = None;
        Ok(parent)
    }

    fn clear_children(&mut self, id: NodeId) -> Result<(), DomError> {
        let children = std::mem::take(&mut self.node_mut(id)?.children);
        for child in children {
            self.nodes[child].parent = None;
        }
        Ok(())
    }

    /// Replace all children of `parent` with the given subtrees
    pub fn replace_children(&mut self, parent: NodeId, elements: Vec<Element>) -> Result<(), DomError> {
        self.expect_element(parent)?;
        self.clear_children(parent)?;
        for element in elements {
            let id = self.build(parent, element);
            self.nodes[parent].children.push(id);
        }
        Ok(())
    }

    /// Set text content. Elements get their children replaced by a single
    /// text node; text nodes get their data replaced.
    pub fn set_text(&mut self, id: NodeId, text: &str) -> Result<MutationKind, DomError> {
        match &mut self.node_mut(id)?.kind {
            NodeKind::Text(data) => {
                *data = text.to_string();
                Ok(MutationKind::CharacterData)
            }
            NodeKind::Element { .. } => {
                self.clear_children(id)?;
                let text_id = self.alloc(NodeKind::Text(text.to_string()), Some(id));
                self.nodes[id].children.push(text_id);
                Ok(MutationKind::ChildList)
            }
        }
    }

    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) -> Result<(), DomError> {
        match &mut self.node_mut(id)?.kind {
            NodeKind::Element { attributes, .. } => {
                match attributes.iter_mut().find(|(key, _)| key == name) {
                    Some((_, existing)) => *existing = value.to_string(),
                    None => attributes.push((name.to_string(), value.to_string())),
                }
                Ok(())
            }
            NodeKind::Text(_) => Err(DomError::NotAnElement(id)),
        }
    }

    pub fn remove_attribute(&mut self, id: NodeId, name: &str) -> Result<(), DomError> {
        match &mut self.node_mut(id)?.kind {
            NodeKind::Element { attributes, .. } => {
                attributes.retain(|(key, _)| key != name);
                Ok(())
            }
            NodeKind::Text(_) => Err(DomError::NotAnElement(id)),
        }
    }
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attribute(value: &str) -> String {
    escape_text(value).replace('"', "&quot;")
}

/// Parsed selector: compound selectors joined by descendant combinators
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    parts: Vec<Compound>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attributes: Vec<(String, Option<String>)>,
    universal: bool,
}

impl Compound {
    fn is_empty(&self) -> bool {
        self.tag.is_none()
            && self.id.is_none()
            && self.classes.is_empty()
            && self.attributes.is_empty()
            && !self.universal
    }

    fn matches(&self, doc: &Document, id: NodeId) -> bool {
        let Some(tag) = doc.tag(id) else {
            return false;
        };
        if let Some(expected) = &self.tag {
            if !tag.eq_ignore_ascii_case(expected) {
                return false;
            }
        }
        if let Some(expected) = &self.id {
            if doc.attribute(id, "id") != Some(expected.as_str()) {
                return false;
            }
        }
        if !self.classes.is_empty() {
            let present: Vec<&str> = doc
                .attribute(id, "class")
                .unwrap_or("")
                .split_whitespace()
                .collect();
            if !self.classes.iter().all(|class| present.contains(&class.as_str())) {
                return false;
            }
        }
        self.attributes.iter().all(|(name, value)| match (doc.attribute(id, name), value) {
            (Some(_), None) => true,
            (Some(actual), Some(expected)) => actual == expected,
            (None, _) => false,
        })
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

fn read_ident(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut ident = String::new();
    while let Some(&c) = chars.peek() {
        if !is_ident_char(c) {
            break;
        }
        ident.push(c);
        chars.next();
    }
    ident
}

impl Selector {
    pub fn parse(input: &str) -> Result<Self, DomError> {
        let invalid = || DomError::InvalidSelector(input.to_string());
        let mut parts = Vec::new();
        let mut current = Compound::default();
        let mut chars = input.trim().chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                c if c.is_whitespace() => {
                    if !current.is_empty() {
                        parts.push(std::mem::take(&mut current));
                    }
                }
                '.' => {
                    let class = read_ident(&mut chars);
                    if class.is_empty() {
                        return Err(invalid());
                    }
                    current.classes.push(class);
                }
                '#' => {
                    let id = read_ident(&mut chars);
                    if id.is_empty() || current.id.is_some() {
                        return Err(invalid());
                    }
                    current.id = Some(id);
                }
                '[' => {
                    let name = read_ident(&mut chars);
                    if name.is_empty() {
                        return Err(invalid());
                    }
                    match chars.next() {
                        Some(']') => current.attributes.push((name, None)),
                        Some('=') => {
                            let value = match chars.peek() {
                                Some(&quote) if quote == '"' || quote == '\'' => {
                                    chars.next();
                                    let mut value = String::new();
                                    loop {
                                        match chars.next() {
                                            Some(c) if c == quote => break,
                                            Some(c) => value.push(c),
                                            None => return Err(invalid()),
                                        }
                                    }
                                    value
                                }
                                _ => read_ident(&mut chars),
                            };
                            if chars.next() != Some(']') {
                                return Err(invalid());
                            }
                            current.attributes.push((name, Some(value)));
                        }
                        _ => return Err(invalid()),
                    }
                }
                '*' if current.is_empty() => current.universal = true,
                c if is_ident_char(c) && current.is_empty() => {
                    let mut tag = c.to_string();
                    tag.push_str(&read_ident(&mut chars));
                    current.tag = Some(tag.to_ascii_lowercase());
                }
                _ => return Err(invalid()),
            }
        }

        if !current.is_empty() {
            parts.push(current);
        }
        if parts.is_empty() {
            return Err(invalid());
        }
        Ok(Self { parts })
    }

    /// Right-to-left match: the last compound must match the node, each
    /// earlier compound some ancestor further up.
    pub fn matches(&self, doc: &Document, id: NodeId) -> bool {
        let Some((subject, ancestors)) = self.parts.split_last() else {
            return false;
        };
        if !subject.matches(doc, id) {
            return false;
        }
        let mut current = doc.parent(id);
        for compound in ancestors.iter().rev() {
            loop {
                match current {
                    Some(ancestor) => {
                        current = doc.parent(ancestor);
                        if compound.matches(doc, ancestor) {
                            break;
                        }
                    }
                    None => return false,
                }
            }
        }
        true
    }
}

/// What a mutation record describes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationKind {
    /// Children were added or removed under the target
    ChildList,
    /// A text node's data changed
    CharacterData,
    /// An attribute of the target changed
    Attributes { name: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    pub target: NodeId,
    pub kind: MutationKind,
}

/// Records delivered to one observer for one `Page::mutate` call
pub type MutationBatch = Vec<MutationRecord>;

/// Which records an observer receives
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObserveOptions {
    pub child_list: bool,
    pub subtree: bool,
    pub character_data: bool,
    pub attributes: bool,
    /// Attribute names to report. `None` reports every attribute.
    pub attribute_filter: Option<Vec<String>>,
}

struct Observer {
    root: NodeId,
    options: ObserveOptions,
    tx: mpsc::UnboundedSender<MutationBatch>,
}

impl Observer {
    fn accepts(&self, doc: &Document, record: &MutationRecord) -> bool {
        let in_scope = record.target == self.root
            || (self.options.subtree && doc.contains(self.root, record.target));
        if !in_scope {
            return false;
        }
        match &record.kind {
            MutationKind::ChildList => self.options.child_list,
            MutationKind::CharacterData => self.options.character_data,
            MutationKind::Attributes { name } => {
                self.options.attributes
                    && self
                        .options
                        .attribute_filter
                        .as_ref()
                        .map_or(true, |filter| filter.iter().any(|allowed| allowed == name))
            }
        }
    }
}

struct PageInner {
    document: Document,
    observers: Vec<Observer>,
}

/// Shared handle to a live page: its document plus registered observers
#[derive(Clone)]
pub struct Page {
    inner: Arc<Mutex<PageInner>>,
}

impl Default for Page {
    fn default() -> Self {
        Self::new(Document::new())
    }
}

impl Page {
    pub fn new(document: Document) -> Self {
        Self {
            inner: Arc::new(Mutex::new(PageInner {
                document,
                observers: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PageInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run a read-only closure against the current document
    pub fn read<R>(&self, f: impl FnOnce(&Document) -> R) -> R {
        f(&self.lock().document)
    }

    /// Apply a group of mutations and deliver the resulting records.
    ///
    /// Records produced before an error are still delivered.
    pub fn mutate<R>(
        &self,
        f: impl FnOnce(&mut Mutator<'_>) -> Result<R, DomError>,
    ) -> Result<R, DomError> {
        let mut guard = self.lock();
        let inner = &mut *guard;
        let mut mutator = Mutator {
            queues: vec![Vec::new(); inner.observers.len()],
            document: &mut inner.document,
            observers: &inner.observers,
        };
        let result = f(&mut mutator);
        let queues = mutator.queues;

        let mut alive = Vec::with_capacity(queues.len());
        for (observer, batch) in inner.observers.iter().zip(queues) {
            let delivered = batch.is_empty() || observer.tx.send(batch).is_ok();
            alive.push(delivered && !observer.tx.is_closed());
        }
        let mut alive = alive.into_iter();
        inner.observers.retain(|observer| {
            let keep = alive.next().unwrap_or(true);
            if !keep {
                trace!("Dropping observer on node {}", observer.root);
            }
            keep
        });

        result
    }

    /// Register an observer on `root`. Dropping the receiver deregisters it.
    pub fn observe(
        &self,
        root: NodeId,
        options: ObserveOptions,
    ) -> Result<mpsc::UnboundedReceiver<MutationBatch>, DomError> {
        let mut inner = self.lock();
        inner.document.node(root)?;
        let (tx, rx) = mpsc::unbounded_channel();
        inner.observers.push(Observer { root, options, tx });
        Ok(rx)
    }

    /// Disconnect every observer, as when the page is navigated away
    pub fn teardown(&self) {
        self.lock().observers.clear();
    }

    pub fn observer_count(&self) -> usize {
        self.lock().observers.len()
    }
}

/// Mutation access to a document inside `Page::mutate`
pub struct Mutator<'a> {
    document: &'a mut Document,
    observers: &'a [Observer],
    queues: Vec<MutationBatch>,
}

impl Mutator<'_> {
    pub fn document(&self) -> &Document {
        self.document
    }

    fn record(&mut self, target: NodeId, kind: MutationKind) {
        let record = MutationRecord { target, kind };
        for (observer, queue) in self.observers.iter().zip(self.queues.iter_mut()) {
            if observer.accepts(self.document, &record) {
                queue.push(record.clone());
            }
        }
    }

    pub fn set_text(&mut self, id: NodeId, text: &str) -> Result<(), DomError> {
        let kind = self.document.set_text(id, text)?;
        self.record(id, kind);
        Ok(())
    }

    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) -> Result<(), DomError> {
        self.document.set_attribute(id, name, value)?;
        self.record(
            id,
            MutationKind::Attributes {
                name: name.to_string(),
            },
        );
        Ok(())
    }

    pub fn remove_attribute(&mut self, id: NodeId, name: &str) -> Result<(), DomError> {
        self.document.remove_attribute(id, name)?;
        self.record(
            id,
            MutationKind::Attributes {
                name: name.to_string(),
            },
        );
        Ok(())
    }

    pub fn append(&mut self, parent: NodeId, element: Element) -> Result<NodeId, DomError> {
        let id = self.document.append(parent, element)?;
        self.record(parent, MutationKind::ChildList);
        Ok(id)
    }

    pub fn remove(&mut self, id: NodeId) -> Result<(), DomError> {
        // Queue against the parent while the node is still attached
        let parent = self.document.parent(id);
        if let Some(parent) = parent {
            self.record(parent, MutationKind::ChildList);
        }
        self.document.remove(id)?;
        Ok(())
    }

    pub fn replace_children(&mut self, parent: NodeId, elements: Vec<Element>) -> Result<(), DomError> {
        self.document.replace_children(parent, elements)?;
        self.record(parent, MutationKind::ChildList);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (Document, NodeId) {
        let mut doc = Document::new();
        let root = doc.root();
        let bar = doc
            .append(
                root,
                Element::new("player-bar").attr("slot", "").child(
                    Element::new("div")
                        .class("info")
                        .child(Element::new("span").class("title").text("Song"))
                        .child(
                            Element::new("span")
                                .class("byline")
                                .child(Element::new("a").text("Artist"))
                                .text(" • ")
                                .child(Element::new("a").text("Album")),
                        ),
                ),
            )
            .unwrap();
        (doc, bar)
    }

    #[test]
    fn test_selector_parse_compound() {
        assert!(Selector::parse("ytmusic-player-bar[slot]").is_ok());
        assert!(Selector::parse(".content-info-wrapper .title").is_ok());
        assert!(Selector::parse("a[href=\"x y\"]#main.link").is_ok());
    }

    #[test]
    fn test_selector_parse_invalid() {
        assert!(Selector::parse("").is_err());
        assert!(Selector::parse("[").is_err());
        assert!(Selector::parse(".").is_err());
        assert!(Selector::parse("div > span").is_err());
        assert!(Selector::parse(".a div").is_ok());
        assert!(Selector::parse(".a.b div[").is_err());
    }

    #[test]
    fn test_query_selector_attribute_and_class() {
        let (doc, bar) = sample();
        assert_eq!(doc.query_selector(doc.root(), "player-bar[slot]").unwrap(), Some(bar));
        assert_eq!(doc.query_selector(doc.root(), "player-bar[id]").unwrap(), None);

        let title = doc.query_selector(bar, ".title").unwrap().unwrap();
        assert_eq!(doc.text_content(title).unwrap(), "Song");
    }

    #[test]
    fn test_query_selector_descendant() {
        let (doc, _) = sample();
        let found = doc.query_selector(doc.root(), "player-bar .byline a").unwrap();
        assert!(found.is_some());
        assert_eq!(doc.text_content(found.unwrap()).unwrap(), "Artist");
        assert_eq!(doc.query_selector(doc.root(), ".byline player-bar").unwrap(), None);
    }

    #[test]
    fn test_children_skips_text_nodes() {
        let (doc, bar) = sample();
        let byline = doc.query_selector(bar, ".byline").unwrap().unwrap();
        let children = doc.children(byline);
        assert_eq!(children.len(), 2);
        assert_eq!(doc.inner_html(children[1]).unwrap(), "Album");
    }

    #[test]
    fn test_inner_html_escapes() {
        let mut doc = Document::new();
        let root = doc.root();
        let el = doc
            .append(
                root,
                Element::new("p").text("Rock & Roll <live>").child(
                    Element::new("a").attr("title", "say \"hi\"").text("x"),
                ),
            )
            .unwrap();
        assert_eq!(
            doc.inner_html(el).unwrap(),
            "Rock &amp; Roll &lt;live&gt;<a title=\"say &quot;hi&quot;\">x</a>"
        );
    }

    #[test]
    fn test_closest_from_text_node() {
        let (doc, bar) = sample();
        let title = doc.query_selector(bar, ".title").unwrap().unwrap();
        let text = doc.nodes[title].children[0];
        assert_eq!(doc.closest(text, "player-bar[slot]").unwrap(), Some(bar));
        assert_eq!(doc.closest(doc.root(), "player-bar[slot]").unwrap(), None);
    }

    #[test]
    fn test_removed_node_is_detached() {
        let (mut doc, bar) = sample();
        let title = doc.query_selector(bar, ".title").unwrap().unwrap();
        doc.remove(title).unwrap();
        assert!(!doc.is_connected(title));
        assert_eq!(doc.query_selector(bar, ".title").unwrap(), None);
    }

    #[test]
    fn test_unknown_node() {
        let doc = Document::new();
        assert_eq!(doc.inner_html(42), Err(DomError::UnknownNode(42)));
    }

    fn subtree_options() -> ObserveOptions {
        ObserveOptions {
            child_list: true,
            subtree: true,
            character_data: true,
            attributes: true,
            attribute_filter: Some(vec!["title".to_string()]),
        }
    }

    #[test]
    fn test_observer_receives_one_batch_per_mutate() {
        let (doc, bar) = sample();
        let page = Page::new(doc);
        let mut rx = page.observe(bar, subtree_options()).unwrap();

        page.mutate(|m| {
            let title = m.document().query_selector(bar, ".title")?.unwrap();
            m.set_text(title, "Other")?;
            m.set_attribute(title, "title", "Other")
        })
        .unwrap();

        let batch = rx.try_recv().unwrap();
        assert_eq!(batch.len(), 2);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_observer_attribute_filter() {
        let (doc, bar) = sample();
        let page = Page::new(doc);
        let mut rx = page.observe(bar, subtree_options()).unwrap();

        page.mutate(|m| m.set_attribute(bar, "style", "color: red")).unwrap();
        assert!(rx.try_recv().is_err());

        page.mutate(|m| m.set_attribute(bar, "title", "tooltip")).unwrap();
        let batch = rx.try_recv().unwrap();
        assert_eq!(
            batch[0].kind,
            MutationKind::Attributes {
                name: "title".to_string()
            }
        );
    }

    #[test]
    fn test_observer_ignores_outside_subtree() {
        let (doc, bar) = sample();
        let page = Page::new(doc);
        let mut rx = page.observe(bar, subtree_options()).unwrap();

        page.mutate(|m| {
            let root = m.document().root();
            m.append(root, Element::new("div").text("elsewhere"))
        })
        .unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_dropped_observer_is_removed() {
        let (doc, bar) = sample();
        let page = Page::new(doc);
        let rx = page.observe(bar, subtree_options()).unwrap();
        assert_eq!(page.observer_count(), 1);
        drop(rx);

        page.mutate(|m| m.set_attribute(bar, "title", "x")).unwrap();
        assert_eq!(page.observer_count(), 0);
    }
}
