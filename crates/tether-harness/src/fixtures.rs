//! Reference trees and recording collaborators.
//!
//! Each tree is built fresh on every call, so tests can mutate them freely.

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::Value;
use tether_core::Node;
use tether_runtime::{BindingScope, ItemApplier};

/// `<ul data-model="foreach"><li data-model="bind:innerHTML"></li></ul>`
#[must_use]
pub fn text_list() -> Node {
    marked_list("foreach")
}

/// A text list carrying `marker` as its collection descriptor, e.g.
/// `foreach:page,0,5`.
#[must_use]
pub fn marked_list(marker: &str) -> Node {
    Node::element("ul")
        .with_attr("data-model", marker)
        .with_child(Node::element("li").with_attr("data-model", "bind:innerHTML"))
}

/// A bare container whose only child is an unbound `<li>` template.
///
/// Use with [`ItemRenderer::with_root`](tether_runtime::ItemRenderer::with_root)
/// or [`DataBinding::foreach`](tether_runtime::DataBinding::foreach).
#[must_use]
pub fn plain_list() -> Node {
    Node::element("ul").with_child(Node::element("li").with_attr("data-model", "bind:innerHTML"))
}

/// Two paragraphs bound to `contact.mail` and `contact.office`.
#[must_use]
pub fn contact_card() -> Node {
    Node::element("section")
        .with_child(Node::element("p").with_attr("data-model", "bind:innerHTML,contact.mail"))
        .with_child(Node::element("p").with_attr("data-model", "bind:innerHTML,contact.office"))
}

/// A collection of `{ "title", "done" }` items rendered as a label and a
/// two-way bound checkbox.
#[must_use]
pub fn checklist() -> Node {
    Node::element("ul").with_attr("data-model", "foreach").with_child(
        Node::element("li")
            .with_child(Node::element("span").with_attr("data-model", "bind:innerHTML,title"))
            .with_child(
                Node::element("input")
                    .with_attr("type", "checkbox")
                    .with_attr("data-model", "bind:checked,done"),
            ),
    )
}

/// A bound form with four named controls: `firstname`, `lastname`, `mail`
/// and `message`. The last one has no value.
#[must_use]
pub fn signup_form() -> Node {
    let input = |name: &str, value: &str| {
        Node::element("input")
            .with_attr("type", "text")
            .with_attr("name", name)
            .with_attr("value", value)
    };
    Node::element("form")
        .with_attr("data-model", "form")
        .with_child(input("firstname", "Ada"))
        .with_child(input("lastname", "Lovelace"))
        .with_child(
            Node::element("fieldset").with_child(input("mail", "ada@example.org")),
        )
        .with_child(Node::element("textarea").with_attr("name", "message"))
        .with_child(Node::element("button").with_attr("type", "submit"))
}

/// First element of `root` (in document order) with the given tag.
#[must_use]
pub fn first(root: &Node, tag: &str) -> Option<Node> {
    root.elements_by_tag(tag).into_iter().next()
}

// ---------------------------------------------------------------------------
// Recording collaborators
// ---------------------------------------------------------------------------

/// An [`ItemApplier`] that records every index it is applied to and writes
/// the index into the item's text.
#[derive(Clone)]
pub struct RecordingApplier {
    applied: Rc<RefCell<Vec<usize>>>,
    attribute: String,
}

impl RecordingApplier {
    /// Record against the default index attribute.
    #[must_use]
    pub fn new() -> Self {
        Self::with_attribute(tether_runtime::item_renderer::DEFAULT_INDEX_ATTRIBUTE)
    }

    #[must_use]
    pub fn with_attribute(attribute: impl Into<String>) -> Self {
        Self {
            applied: Rc::default(),
            attribute: attribute.into(),
        }
    }

    /// Indices applied so far, in call order.
    #[must_use]
    pub fn applied(&self) -> Vec<usize> {
        self.applied.borrow().clone()
    }

    pub fn reset(&self) {
        self.applied.borrow_mut().clear();
    }
}

impl Default for RecordingApplier {
    fn default() -> Self {
        Self::new()
    }
}

impl ItemApplier for RecordingApplier {
    fn apply(&self, item: &Node, _scope: &mut BindingScope) {
        if let Some(index) = tether_runtime::find_item_index(item, &self.attribute) {
            self.applied.borrow_mut().push(index);
            item.set_text_content(&index.to_string());
        }
    }
}

impl std::fmt::Debug for RecordingApplier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingApplier")
            .field("applied", &self.applied.borrow().len())
            .finish()
    }
}

/// Calls seen by a [`ReactionLog`] reaction: the value and extra arguments.
pub type ReactionCall = (Value, Vec<String>);

/// Shared log of reaction calls, for registering as a named reaction.
#[derive(Clone, Default, Debug)]
pub struct ReactionLog {
    calls: Rc<RefCell<Vec<ReactionCall>>>,
}

impl ReactionLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A reaction closure that appends to this log.
    pub fn reaction(&self) -> impl Fn(&Node, &Value, &[String]) + 'static {
        let calls = Rc::clone(&self.calls);
        move |_node, value, extra| calls.borrow_mut().push((value.clone(), extra.to_vec()))
    }

    #[must_use]
    pub fn calls(&self) -> Vec<ReactionCall> {
        self.calls.borrow().clone()
    }

    /// Values seen so far.
    #[must_use]
    pub fn values(&self) -> Vec<Value> {
        self.calls.borrow().iter().map(|(v, _)| v.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixtures_are_fresh_each_call() {
        let a = text_list();
        let b = text_list();
        assert!(!a.ptr_eq(&b));
        assert_eq!(a.to_markup(), b.to_markup());
    }

    #[test]
    fn signup_form_has_four_named_controls() {
        let form = signup_form();
        let named = form.query_all(|n| n.is_element() && n.has_attribute("name"));
        assert_eq!(named.len(), 4);
    }

    #[test]
    fn first_finds_nested_elements() {
        let form = signup_form();
        let textarea = first(&form, "textarea").expect("textarea");
        assert_eq!(textarea.attribute("name").as_deref(), Some("message"));
        assert!(first(&form, "table").is_none());
    }
}
