//! Shared tree nodes.
//!
//! A [`Node`] is a cheap-to-clone handle; clones refer to the same node and
//! compare equal by identity. Parents own their children, children point back
//! at their parent weakly.
//!
//! # Invariants
//!
//! 1. A node has at most one parent; attaching it elsewhere detaches it first.
//! 2. `parent()` of a detached node is `None`.
//! 3. `deep_clone()` copies kind, attributes, properties and children, never
//!    listeners, and produces a detached node with a fresh [`NodeId`].
//! 4. Setting the `innerHTML` or `textContent` property replaces all children
//!    with a single text node (or none for an empty string).

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;

use crate::event::{Event, ListenerId};

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Properties that read and write the node's text content.
const TEXT_PROPERTIES: [&str; 2] = ["innerHTML", "textContent"];

type ListenerFn = dyn Fn(&Event);

/// Process-unique node identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

/// What a node is.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeKind {
    /// An element with a tag name, e.g. `li`.
    Element(String),
    /// A text leaf.
    Text(String),
}

struct Listener {
    id: ListenerId,
    event: String,
    capture: bool,
    callback: Rc<ListenerFn>,
}

struct NodeData {
    id: NodeId,
    kind: NodeKind,
    attributes: BTreeMap<String, String>,
    properties: BTreeMap<String, Value>,
    children: Vec<Node>,
    parent: Weak<RefCell<NodeData>>,
    listeners: Vec<Listener>,
    next_listener: u64,
}

/// Shared handle to a tree node.
#[derive(Clone)]
pub struct Node {
    inner: Rc<RefCell<NodeData>>,
}

/// Non-owning handle to a [`Node`].
#[derive(Clone)]
pub struct WeakNode {
    inner: Weak<RefCell<NodeData>>,
}

impl WeakNode {
    /// Recover the node if it is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<Node> {
        self.inner.upgrade().map(|inner| Node { inner })
    }
}

impl fmt::Debug for WeakNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakNode")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

impl Node {
    fn from_kind(kind: NodeKind) -> Self {
        Self {
            inner: Rc::new(RefCell::new(NodeData {
                id: NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed)),
                kind,
                attributes: BTreeMap::new(),
                properties: BTreeMap::new(),
                children: Vec::new(),
                parent: Weak::new(),
                listeners: Vec::new(),
                next_listener: 0,
            })),
        }
    }

    /// Create a detached element.
    #[must_use]
    pub fn element(tag: impl Into<String>) -> Self {
        Self::from_kind(NodeKind::Element(tag.into()))
    }

    /// Create a detached text node.
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self::from_kind(NodeKind::Text(content.into()))
    }

    // ------------------------------------------------------------------
    // Builders
    // ------------------------------------------------------------------

    #[must_use]
    pub fn with_attr(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(name, value);
        self
    }

    #[must_use]
    pub fn with_property(self, name: &str, value: impl Into<Value>) -> Self {
        self.set_property(name, value);
        self
    }

    #[must_use]
    pub fn with_child(self, child: Node) -> Self {
        self.append_child(&child);
        self
    }

    #[must_use]
    pub fn with_text(self, content: impl Into<String>) -> Self {
        self.append_child(&Node::text(content));
        self
    }

    // ------------------------------------------------------------------
    // Identity and kind
    // ------------------------------------------------------------------

    #[must_use]
    pub fn id(&self) -> NodeId {
        self.inner.borrow().id
    }

    /// Whether both handles refer to the same node.
    #[must_use]
    pub fn ptr_eq(&self, other: &Node) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    #[must_use]
    pub fn downgrade(&self) -> WeakNode {
        WeakNode {
            inner: Rc::downgrade(&self.inner),
        }
    }

    #[must_use]
    pub fn kind(&self) -> NodeKind {
        self.inner.borrow().kind.clone()
    }

    /// Tag name for elements, `None` for text nodes.
    #[must_use]
    pub fn tag(&self) -> Option<String> {
        match &self.inner.borrow().kind {
            NodeKind::Element(tag) => Some(tag.clone()),
            NodeKind::Text(_) => None,
        }
    }

    /// Case-insensitive tag comparison.
    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        matches!(&self.inner.borrow().kind, NodeKind::Element(t) if t.eq_ignore_ascii_case(tag))
    }

    #[must_use]
    pub fn is_element(&self) -> bool {
        matches!(self.inner.borrow().kind, NodeKind::Element(_))
    }

    #[must_use]
    pub fn is_text(&self) -> bool {
        matches!(self.inner.borrow().kind, NodeKind::Text(_))
    }

    // ------------------------------------------------------------------
    // Attributes
    // ------------------------------------------------------------------

    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<String> {
        self.inner.borrow().attributes.get(name).cloned()
    }

    #[must_use]
    pub fn has_attribute(&self, name: &str) -> bool {
        self.inner.borrow().attributes.contains_key(name)
    }

    pub fn set_attribute(&self, name: impl Into<String>, value: impl Into<String>) {
        self.inner
            .borrow_mut()
            .attributes
            .insert(name.into(), value.into());
    }

    pub fn remove_attribute(&self, name: &str) -> Option<String> {
        self.inner.borrow_mut().attributes.remove(name)
    }

    /// All attributes in name order.
    #[must_use]
    pub fn attributes(&self) -> Vec<(String, String)> {
        self.inner
            .borrow()
            .attributes
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    // ------------------------------------------------------------------
    // Properties
    // ------------------------------------------------------------------

    /// Read a property. `innerHTML` and `textContent` read the text content.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<Value> {
        if TEXT_PROPERTIES.contains(&name) {
            return Some(Value::String(self.text_content()));
        }
        self.inner.borrow().properties.get(name).cloned()
    }

    /// Write a property. `innerHTML` and `textContent` replace the children
    /// with the value's display text.
    pub fn set_property(&self, name: &str, value: impl Into<Value>) {
        let value = value.into();
        if TEXT_PROPERTIES.contains(&name) {
            self.set_text_content(&display_value(&value));
            return;
        }
        self.inner
            .borrow_mut()
            .properties
            .insert(name.to_owned(), value);
    }

    /// Concatenated text of this node and its descendants.
    #[must_use]
    pub fn text_content(&self) -> String {
        let data = self.inner.borrow();
        match &data.kind {
            NodeKind::Text(content) => content.clone(),
            NodeKind::Element(_) => data.children.iter().map(Node::text_content).collect(),
        }
    }

    pub fn set_text_content(&self, content: &str) {
        if let NodeKind::Text(existing) = &mut self.inner.borrow_mut().kind {
            content.clone_into(existing);
            return;
        }
        let old = std::mem::take(&mut self.inner.borrow_mut().children);
        for child in &old {
            child.inner.borrow_mut().parent = Weak::new();
        }
        if !content.is_empty() {
            self.append_child(&Node::text(content));
        }
    }

    /// Whether this is a text node holding only whitespace.
    #[must_use]
    pub fn is_blank_text(&self) -> bool {
        matches!(&self.inner.borrow().kind, NodeKind::Text(t) if t.trim().is_empty())
    }

    // ------------------------------------------------------------------
    // Structure
    // ------------------------------------------------------------------

    #[must_use]
    pub fn parent(&self) -> Option<Node> {
        self.inner
            .borrow()
            .parent
            .upgrade()
            .map(|inner| Node { inner })
    }

    /// Parent, grandparent, ... up to the root.
    pub fn ancestors(&self) -> impl Iterator<Item = Node> {
        std::iter::successors(self.parent(), Node::parent)
    }

    /// This node followed by its ancestors.
    pub fn ancestors_or_self(&self) -> impl Iterator<Item = Node> {
        std::iter::successors(Some(self.clone()), Node::parent)
    }

    #[must_use]
    pub fn children(&self) -> Vec<Node> {
        self.inner.borrow().children.clone()
    }

    #[must_use]
    pub fn child_count(&self) -> usize {
        self.inner.borrow().children.len()
    }

    #[must_use]
    pub fn first_child(&self) -> Option<Node> {
        self.inner.borrow().children.first().cloned()
    }

    #[must_use]
    pub fn first_element_child(&self) -> Option<Node> {
        self.inner
            .borrow()
            .children
            .iter()
            .find(|c| c.is_element())
            .cloned()
    }

    #[must_use]
    pub fn element_children(&self) -> Vec<Node> {
        self.inner
            .borrow()
            .children
            .iter()
            .filter(|c| c.is_element())
            .cloned()
            .collect()
    }

    /// Append `child`, detaching it from any previous parent.
    pub fn append_child(&self, child: &Node) {
        if child.ptr_eq(self) {
            return;
        }
        child.detach();
        child.inner.borrow_mut().parent = Rc::downgrade(&self.inner);
        self.inner.borrow_mut().children.push(child.clone());
    }

    /// Insert `child` immediately before `reference`, or append when
    /// `reference` is `None`.
    ///
    /// Returns `false` (no mutation) when `reference` is not a child of this
    /// node.
    pub fn insert_before(&self, child: &Node, reference: Option<&Node>) -> bool {
        let Some(reference) = reference else {
            self.append_child(child);
            return true;
        };
        if child.ptr_eq(self) {
            return false;
        }
        if reference.ptr_eq(child) {
            return true;
        }
        if !reference.parent().is_some_and(|p| p.ptr_eq(self)) {
            return false;
        }
        child.detach();
        let mut data = self.inner.borrow_mut();
        let Some(position) = data.children.iter().position(|c| c.ptr_eq(reference)) else {
            return false;
        };
        data.children.insert(position, child.clone());
        child.inner.borrow_mut().parent = Rc::downgrade(&self.inner);
        true
    }

    /// Remove `child` from this node. Returns `false` if it is not a child.
    pub fn remove_child(&self, child: &Node) -> bool {
        let removed = {
            let mut data = self.inner.borrow_mut();
            match data.children.iter().position(|c| c.ptr_eq(child)) {
                Some(position) => {
                    data.children.remove(position);
                    true
                }
                None => false,
            }
        };
        if removed {
            child.inner.borrow_mut().parent = Weak::new();
        }
        removed
    }

    /// Remove this node from its parent. Returns `false` when detached already.
    pub fn detach(&self) -> bool {
        match self.parent() {
            Some(parent) => parent.remove_child(self),
            None => false,
        }
    }

    /// All descendants in document (pre-)order, excluding `self`.
    #[must_use]
    pub fn descendants(&self) -> Vec<Node> {
        let mut out = Vec::new();
        let mut stack: Vec<Node> = self.children().into_iter().rev().collect();
        while let Some(node) = stack.pop() {
            stack.extend(node.children().into_iter().rev());
            out.push(node);
        }
        out
    }

    /// Descendants matching `predicate`, in document order.
    #[must_use]
    pub fn query_all(&self, predicate: impl Fn(&Node) -> bool) -> Vec<Node> {
        self.descendants()
            .into_iter()
            .filter(|n| predicate(n))
            .collect()
    }

    /// Descendant elements with the given tag, in document order.
    #[must_use]
    pub fn elements_by_tag(&self, tag: &str) -> Vec<Node> {
        self.query_all(|n| n.has_tag(tag))
    }

    /// Detached copy of this subtree. Listeners are not copied.
    #[must_use]
    pub fn deep_clone(&self) -> Node {
        let data = self.inner.borrow();
        let copy = Node::from_kind(data.kind.clone());
        {
            let mut target = copy.inner.borrow_mut();
            target.attributes = data.attributes.clone();
            target.properties = data.properties.clone();
        }
        for child in &data.children {
            copy.append_child(&child.deep_clone());
        }
        copy
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    /// Register a listener for `event`. Capture listeners also observe events
    /// dispatched on descendants before the target sees them.
    pub fn add_event_listener(
        &self,
        event: impl Into<String>,
        capture: bool,
        callback: impl Fn(&Event) + 'static,
    ) -> ListenerId {
        let mut data = self.inner.borrow_mut();
        data.next_listener += 1;
        let id = ListenerId(data.next_listener);
        data.listeners.push(Listener {
            id,
            event: event.into(),
            capture,
            callback: Rc::new(callback),
        });
        id
    }

    pub fn remove_event_listener(&self, id: ListenerId) -> bool {
        let mut data = self.inner.borrow_mut();
        let before = data.listeners.len();
        data.listeners.retain(|l| l.id != id);
        data.listeners.len() != before
    }

    /// Number of listeners registered for `event` (both phases).
    #[must_use]
    pub fn listener_count(&self, event: &str) -> usize {
        self.inner
            .borrow()
            .listeners
            .iter()
            .filter(|l| l.event == event)
            .count()
    }

    /// Whether a listener for `event` is registered in the given phase.
    #[must_use]
    pub fn has_listener(&self, event: &str, capture: bool) -> bool {
        self.inner
            .borrow()
            .listeners
            .iter()
            .any(|l| l.event == event && l.capture == capture)
    }

    fn callbacks(&self, event: &str, capture: Option<bool>) -> Vec<Rc<ListenerFn>> {
        self.inner
            .borrow()
            .listeners
            .iter()
            .filter(|l| l.event == event && capture.is_none_or(|c| l.capture == c))
            .map(|l| Rc::clone(&l.callback))
            .collect()
    }

    /// Dispatch `event` with this node as target.
    ///
    /// Returns `false` if a listener called [`Event::prevent_default`].
    pub fn dispatch(&self, event: &Event) -> bool {
        #[cfg(feature = "tracing")]
        let _span = tracing::trace_span!("tether::dispatch", event = event.kind()).entered();

        event.set_target(self);
        let kind = event.kind().to_owned();
        let path: Vec<Node> = self.ancestors().collect();

        for node in path.iter().rev() {
            for callback in node.callbacks(&kind, Some(true)) {
                callback(event);
            }
            if event.propagation_stopped() {
                return !event.default_prevented();
            }
        }

        for callback in self.callbacks(&kind, None) {
            callback(event);
        }

        if event.bubbles() && !event.propagation_stopped() {
            for node in &path {
                for callback in node.callbacks(&kind, Some(false)) {
                    callback(event);
                }
                if event.propagation_stopped() {
                    break;
                }
            }
        }

        !event.default_prevented()
    }

    // ------------------------------------------------------------------
    // Serialization
    // ------------------------------------------------------------------

    /// Markup rendering of the subtree, for assertions and debugging.
    #[must_use]
    pub fn to_markup(&self) -> String {
        let mut out = String::new();
        self.write_markup(&mut out);
        out
    }

    fn write_markup(&self, out: &mut String) {
        let data = self.inner.borrow();
        match &data.kind {
            NodeKind::Text(content) => out.push_str(&escape(content)),
            NodeKind::Element(tag) => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in &data.attributes {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    out.push_str(&escape(value));
                    out.push('"');
                }
                out.push('>');
                for child in &data.children {
                    child.write_markup(out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Node {}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.inner.borrow();
        f.debug_struct("Node")
            .field("id", &data.id.0)
            .field("kind", &data.kind)
            .field("attributes", &data.attributes)
            .field("children", &data.children.len())
            .finish()
    }
}

/// Display text for a property value: strings verbatim, `null` as empty.
#[must_use]
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            other => out.push(other),
        }
    }
    out
}
