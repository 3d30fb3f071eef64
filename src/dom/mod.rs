//! DOM primitives - the host tree the engine patches.
//!
//! A minimal single-threaded in-memory DOM, covering exactly what the
//! component engine needs:
//! - element / text / marker nodes with ordered attributes
//! - child insertion and removal relative to sibling positions
//! - event listeners behind explicit [`ListenerHandle`] tokens
//! - a form-control value *property* (distinct from the `value` attribute)
//!   with selection state, so value writes that would reset the cursor are
//!   observable
//! - simple selector queries (`tag`, `#id`, `[data-is=name]`, comma lists)
//!
//! Nodes are cheap handles (`Rc`); cloning a [`Node`] clones the handle, not
//! the subtree. Children hold strong references, parents are weak, so
//! detached subtrees are dropped once the last handle goes away.
//!
//! There is one process-wide document per thread, mirroring the host
//! environment this models. [`document`] returns it; [`reset_document`]
//! clears it between tests.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use serde_json::Value;

// =============================================================================
// Node kinds
// =============================================================================

struct ElementData {
    tag: String,
    attrs: RefCell<IndexMap<String, String>>,
    listeners: RefCell<Vec<ListenerEntry>>,
    next_listener_id: Cell<u64>,
    /// Form-control value property. Independent from the `value` attribute.
    value: RefCell<String>,
    /// Cursor/selection range over `value`, in characters.
    selection: Cell<(usize, usize)>,
}

struct ListenerEntry {
    id: u64,
    event: String,
    handler: Rc<dyn Fn(&Event)>,
}

enum NodeKind {
    Document,
    Element(ElementData),
    Text(RefCell<String>),
    /// Invisible anchor used by virtual instances and loop regions.
    Marker,
}

struct NodeData {
    kind: NodeKind,
    parent: RefCell<Weak<NodeData>>,
    children: RefCell<Vec<Node>>,
}

/// A handle to one DOM node.
#[derive(Clone)]
pub struct Node(Rc<NodeData>);

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.0.kind {
            NodeKind::Document => write!(f, "#document"),
            NodeKind::Element(el) => write!(f, "<{}>", el.tag),
            NodeKind::Text(t) => write!(f, "#text({:?})", t.borrow()),
            NodeKind::Marker => write!(f, "#marker"),
        }
    }
}

// =============================================================================
// Events
// =============================================================================

/// A dispatched DOM event.
#[derive(Debug, Clone)]
pub struct Event {
    pub name: String,
    /// Optional payload (e.g. the input text for an `input` event).
    pub value: Option<Value>,
}

impl Event {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
        }
    }

    pub fn with_value(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value: Some(value),
        }
    }
}

/// Token for one registered listener. Removing a listener requires the
/// token; listeners are never garbage-collected implicitly.
pub struct ListenerHandle {
    node: Weak<NodeData>,
    id: u64,
}

impl ListenerHandle {
    /// Remove the listener this handle refers to. Safe to call after the
    /// node is gone.
    pub fn release(&self) {
        if let Some(node) = self.node.upgrade() {
            if let NodeKind::Element(el) = &node.kind {
                el.listeners.borrow_mut().retain(|l| l.id != self.id);
            }
        }
    }
}

// =============================================================================
// Node construction
// =============================================================================

impl Node {
    fn new(kind: NodeKind) -> Self {
        Self(Rc::new(NodeData {
            kind,
            parent: RefCell::new(Weak::new()),
            children: RefCell::new(Vec::new()),
        }))
    }

    /// Create an element. Tag names are normalized to lowercase.
    pub fn element(tag: &str) -> Self {
        Self::new(NodeKind::Element(ElementData {
            tag: tag.to_lowercase(),
            attrs: RefCell::new(IndexMap::new()),
            listeners: RefCell::new(Vec::new()),
            next_listener_id: Cell::new(0),
            value: RefCell::new(String::new()),
            selection: Cell::new((0, 0)),
        }))
    }

    pub fn text(content: &str) -> Self {
        Self::new(NodeKind::Text(RefCell::new(content.to_string())))
    }

    pub fn marker() -> Self {
        Self::new(NodeKind::Marker)
    }

    fn new_document() -> Self {
        Self::new(NodeKind::Document)
    }

    pub fn is_element(&self) -> bool {
        matches!(self.0.kind, NodeKind::Element(_))
    }

    pub fn is_text(&self) -> bool {
        matches!(self.0.kind, NodeKind::Text(_))
    }

    pub fn is_marker(&self) -> bool {
        matches!(self.0.kind, NodeKind::Marker)
    }

    /// Lowercase tag name, for element nodes.
    pub fn tag_name(&self) -> Option<String> {
        match &self.0.kind {
            NodeKind::Element(el) => Some(el.tag.clone()),
            _ => None,
        }
    }

    fn element_data(&self) -> Option<&ElementData> {
        match &self.0.kind {
            NodeKind::Element(el) => Some(el),
            _ => None,
        }
    }
}

// =============================================================================
// Tree structure
// =============================================================================

impl Node {
    pub fn parent(&self) -> Option<Node> {
        self.0.parent.borrow().upgrade().map(Node)
    }

    pub fn children(&self) -> Vec<Node> {
        self.0.children.borrow().clone()
    }

    /// Detach from the current parent, then append as the last child.
    pub fn append_child(&self, child: &Node) {
        self.insert_before(child, None);
    }

    /// Detach `child` from wherever it is and insert it before `reference`
    /// (or at the end when `reference` is `None`). Moving a node that is
    /// already in place is a no-op in effect, not an error.
    pub fn insert_before(&self, child: &Node, reference: Option<&Node>) {
        child.remove();
        let mut children = self.0.children.borrow_mut();
        let idx = match reference {
            Some(r) => children
                .iter()
                .position(|c| c == r)
                .unwrap_or(children.len()),
            None => children.len(),
        };
        children.insert(idx, child.clone());
        *child.0.parent.borrow_mut() = Rc::downgrade(&self.0);
    }

    /// Detach this node from its parent, if any.
    pub fn remove(&self) {
        if let Some(parent) = self.parent() {
            parent.0.children.borrow_mut().retain(|c| c != self);
            *self.0.parent.borrow_mut() = Weak::new();
        }
    }

    /// Remove every child.
    pub fn clear_children(&self) {
        for child in self.children() {
            child.remove();
        }
    }

    pub fn next_sibling(&self) -> Option<Node> {
        let parent = self.parent()?;
        let children = parent.0.children.borrow();
        let idx = children.iter().position(|c| c == self)?;
        children.get(idx + 1).cloned()
    }

    /// True when `other` is this node or a descendant of it.
    pub fn contains(&self, other: &Node) -> bool {
        let mut cur = Some(other.clone());
        while let Some(node) = cur {
            if node == *self {
                return true;
            }
            cur = node.parent();
        }
        false
    }

    /// True when this node is attached to the thread's document.
    pub fn is_connected(&self) -> bool {
        document().contains(self)
    }
}

// =============================================================================
// Attributes and content
// =============================================================================

impl Node {
    pub fn attribute(&self, name: &str) -> Option<String> {
        self.element_data()
            .and_then(|el| el.attrs.borrow().get(name).cloned())
    }

    pub fn set_attribute(&self, name: &str, value: &str) {
        if let Some(el) = self.element_data() {
            el.attrs
                .borrow_mut()
                .insert(name.to_string(), value.to_string());
        }
    }

    pub fn remove_attribute(&self, name: &str) {
        if let Some(el) = self.element_data() {
            el.attrs.borrow_mut().shift_remove(name);
        }
    }

    /// Attributes in document order.
    pub fn attributes(&self) -> Vec<(String, String)> {
        self.element_data()
            .map(|el| {
                el.attrs
                    .borrow()
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Text node content, for text nodes.
    pub fn data(&self) -> Option<String> {
        match &self.0.kind {
            NodeKind::Text(t) => Some(t.borrow().clone()),
            _ => None,
        }
    }

    pub fn set_data(&self, content: &str) {
        if let NodeKind::Text(t) = &self.0.kind {
            *t.borrow_mut() = content.to_string();
        }
    }

    /// Concatenated text of this node and all descendants.
    pub fn text_content(&self) -> String {
        match &self.0.kind {
            NodeKind::Text(t) => t.borrow().clone(),
            _ => self
                .children()
                .iter()
                .map(|c| c.text_content())
                .collect::<Vec<_>>()
                .join(""),
        }
    }

    /// Serialize the subtree. Markers render as nothing.
    pub fn to_html(&self) -> String {
        match &self.0.kind {
            NodeKind::Text(t) => t.borrow().clone(),
            NodeKind::Marker => String::new(),
            NodeKind::Document => self.inner_html(),
            NodeKind::Element(el) => {
                let mut out = format!("<{}", el.tag);
                for (k, v) in el.attrs.borrow().iter() {
                    out.push_str(&format!(" {}=\"{}\"", k, v));
                }
                out.push('>');
                out.push_str(&self.inner_html());
                out.push_str(&format!("</{}>", el.tag));
                out
            }
        }
    }

    /// Serialized children only.
    pub fn inner_html(&self) -> String {
        self.children()
            .iter()
            .map(|c| c.to_html())
            .collect::<Vec<_>>()
            .join("")
    }
}

// =============================================================================
// Form-control value property
// =============================================================================

impl Node {
    /// Current value property of a form control.
    pub fn value(&self) -> String {
        self.element_data()
            .map(|el| el.value.borrow().clone())
            .unwrap_or_default()
    }

    /// Write the value property. This resets the selection to the end of the
    /// new value, the way a real control drops the cursor on assignment.
    pub fn set_value(&self, value: &str) {
        if let Some(el) = self.element_data() {
            *el.value.borrow_mut() = value.to_string();
            let end = value.chars().count();
            el.selection.set((end, end));
        }
    }

    /// Selection range over the value property, in characters.
    pub fn selection(&self) -> (usize, usize) {
        self.element_data()
            .map(|el| el.selection.get())
            .unwrap_or((0, 0))
    }

    pub fn set_selection(&self, start: usize, end: usize) {
        if let Some(el) = self.element_data() {
            el.selection.set((start, end));
        }
    }
}

// =============================================================================
// Event listeners
// =============================================================================

impl Node {
    /// Register a listener for `event`. The returned handle is the only way
    /// to remove it again.
    pub fn add_listener(
        &self,
        event: &str,
        handler: Rc<dyn Fn(&Event)>,
    ) -> Option<ListenerHandle> {
        let el = self.element_data()?;
        let id = el.next_listener_id.get();
        el.next_listener_id.set(id + 1);
        el.listeners.borrow_mut().push(ListenerEntry {
            id,
            event: event.to_string(),
            handler,
        });
        Some(ListenerHandle {
            node: Rc::downgrade(&self.0),
            id,
        })
    }

    /// Invoke every listener registered for the event's name. The listener
    /// list is snapshotted first, so handlers may rebind freely.
    pub fn dispatch(&self, event: &Event) {
        let handlers: Vec<Rc<dyn Fn(&Event)>> = match self.element_data() {
            Some(el) => el
                .listeners
                .borrow()
                .iter()
                .filter(|l| l.event == event.name)
                .map(|l| l.handler.clone())
                .collect(),
            None => return,
        };
        for handler in handlers {
            handler(event);
        }
    }

    #[cfg(test)]
    fn listener_count(&self) -> usize {
        self.element_data()
            .map(|el| el.listeners.borrow().len())
            .unwrap_or(0)
    }
}

// =============================================================================
// Queries
// =============================================================================

impl Node {
    /// All descendant elements in document order, optionally including self.
    pub fn descendant_elements(&self, include_self: bool) -> Vec<Node> {
        let mut out = Vec::new();
        if include_self && self.is_element() {
            out.push(self.clone());
        }
        for child in self.children() {
            out.extend(child.descendant_elements(true));
        }
        out
    }

    /// Find descendants matching a comma-separated list of simple selectors:
    /// `tag`, `#id`, `[attr=value]`.
    pub fn select(&self, selector: &str) -> Vec<Node> {
        let parts: Vec<&str> = selector
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        self.descendant_elements(false)
            .into_iter()
            .filter(|el| parts.iter().any(|p| matches_selector(el, p)))
            .collect()
    }

    pub fn by_id(&self, id: &str) -> Option<Node> {
        self.select(&format!("#{id}")).into_iter().next()
    }

    pub fn by_tag(&self, tag: &str) -> Vec<Node> {
        self.select(tag)
    }
}

fn matches_selector(el: &Node, selector: &str) -> bool {
    if let Some(id) = selector.strip_prefix('#') {
        return el.attribute("id").as_deref() == Some(id);
    }
    if let Some(inner) = selector.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        return match inner.split_once('=') {
            Some((name, value)) => el.attribute(name.trim()).as_deref() == Some(value.trim()),
            None => el.attribute(inner.trim()).is_some(),
        };
    }
    el.tag_name()
        .is_some_and(|t| t == selector.to_lowercase())
}

// =============================================================================
// Document
// =============================================================================

thread_local! {
    static DOCUMENT: Node = Node::new_document();
}

/// The thread's document root.
pub fn document() -> Node {
    DOCUMENT.with(|d| d.clone())
}

/// Drop every node in the document. Intended for tests.
pub fn reset_document() {
    document().clear_children();
}

// =============================================================================
// Attribute-name conversion
// =============================================================================

/// Convert a dashed attribute name to the camel-cased option key
/// (`max-value` -> `maxValue`).
pub fn camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = false;
    for ch in name.chars() {
        if ch == '-' {
            upper_next = true;
        } else if upper_next {
            out.extend(ch.to_uppercase());
            upper_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}
