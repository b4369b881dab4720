#![forbid(unsafe_code)]

//! Node tree primitives for Tether.
//!
//! The binding runtime renders store data into a tree of [`Node`]s. This
//! crate provides the minimal tree it needs:
//!
//! - [`Node`]: shared handle to an element or text node, with ordered
//!   attributes, a JSON property map, children and a weak parent link.
//! - [`Event`]: a dispatched signal (`"change"`, `"submit"`, ...) that
//!   listeners may cancel with [`Event::prevent_default`].
//!
//! # Architecture
//!
//! Nodes use `Rc<RefCell<..>>` for single-threaded shared ownership. A parent
//! owns its children; children hold a `Weak` back-reference to the parent, so
//! detaching a subtree never leaks a cycle.

pub mod event;
pub mod node;

pub use event::{Event, ListenerId};
pub use node::{Node, NodeId, NodeKind, WeakNode, display_value};

/// Property values carried by nodes and stores.
pub use serde_json::Value;
