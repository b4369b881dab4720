//! Events dispatched through the node tree.

use std::cell::{Cell, RefCell};
use std::fmt;

use crate::node::Node;

/// Identifier of a registered event listener, unique per node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub(crate) u64);

/// A named event travelling through the tree.
///
/// Dispatch runs capture listeners from the root down to the target's parent,
/// then every listener on the target, then non-capture listeners on the way
/// back up (when the event bubbles).
pub struct Event {
    kind: String,
    bubbles: bool,
    default_prevented: Cell<bool>,
    propagation_stopped: Cell<bool>,
    target: RefCell<Option<Node>>,
}

impl Event {
    /// Create a bubbling event of the given kind.
    #[must_use]
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            bubbles: true,
            default_prevented: Cell::new(false),
            propagation_stopped: Cell::new(false),
            target: RefCell::new(None),
        }
    }

    /// Create an event that only reaches capture listeners and the target.
    #[must_use]
    pub fn non_bubbling(kind: impl Into<String>) -> Self {
        Self {
            bubbles: false,
            ..Self::new(kind)
        }
    }

    /// Event kind, e.g. `"change"`.
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    #[must_use]
    pub fn bubbles(&self) -> bool {
        self.bubbles
    }

    /// Cancel the default action associated with this event.
    pub fn prevent_default(&self) {
        self.default_prevented.set(true);
    }

    #[must_use]
    pub fn default_prevented(&self) -> bool {
        self.default_prevented.get()
    }

    /// Stop the event from reaching further nodes. Listeners on the current
    /// node still run.
    pub fn stop_propagation(&self) {
        self.propagation_stopped.set(true);
    }

    #[must_use]
    pub fn propagation_stopped(&self) -> bool {
        self.propagation_stopped.get()
    }

    /// The node the event was dispatched on, once dispatch has begun.
    #[must_use]
    pub fn target(&self) -> Option<Node> {
        self.target.borrow().clone()
    }

    pub(crate) fn set_target(&self, node: &Node) {
        *self.target.borrow_mut() = Some(node.clone());
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("kind", &self.kind)
            .field("bubbles", &self.bubbles)
            .field("default_prevented", &self.default_prevented.get())
            .finish()
    }
}
