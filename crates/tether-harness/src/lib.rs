#![forbid(unsafe_code)]

//! Test harness for Tether.
//!
//! - [`fixtures`]: reference trees (lists, contact cards, checklists, forms)
//!   and recording collaborators.
//! - [`logging`]: one-call `tracing` setup for tests.
//! - [`assert_markup!`]: compare a node's markup against an expected string
//!   with a readable failure message.
//! - [`strategies`]: `proptest` strategies for collections and windows.
//!
//! # Example
//!
//! ```
//! use serde_json::json;
//! use tether_harness::fixtures;
//! use tether_runtime::DataBinding;
//! use tether_store::Store;
//!
//! let store = Store::new(json!(["Olives", "is", "fun"]));
//! let mut binding = DataBinding::new(store);
//! let list = fixtures::text_list();
//! binding.apply(&list);
//! assert_eq!(tether_harness::texts(&list), ["Olives", "is", "fun"]);
//! ```

pub mod fixtures;
pub mod logging;
pub mod strategies;

use tether_core::Node;
use tether_runtime::item_renderer::DEFAULT_INDEX_ATTRIBUTE;

/// Text content of each child of `root`.
#[must_use]
pub fn texts(root: &Node) -> Vec<String> {
    root.children().iter().map(Node::text_content).collect()
}

/// Index stamps of the element children of `root`.
#[must_use]
pub fn stamps(root: &Node) -> Vec<String> {
    root.element_children()
        .iter()
        .filter_map(|n| n.attribute(DEFAULT_INDEX_ATTRIBUTE))
        .collect()
}

/// Assert that a node renders to the expected markup.
///
/// ```
/// use tether_core::Node;
/// use tether_harness::assert_markup;
///
/// let p = Node::element("p").with_text("hi");
/// assert_markup!(p, "<p>hi</p>");
/// ```
#[macro_export]
macro_rules! assert_markup {
    ($node:expr, $expected:expr $(,)?) => {{
        let actual = $node.to_markup();
        let expected: &str = $expected;
        assert!(
            actual == expected,
            "markup mismatch\n  expected: {}\n    actual: {}",
            expected,
            actual
        );
    }};
}
