//! Whole-form binding.
//!
//! A bound form copies every named control into the store when it is
//! submitted, keyed by the control's `name`, and cancels the submission.

use serde_json::Value;
use tether_core::Node;
use tracing::debug;

use crate::binder::Binder;

impl Binder {
    /// Store the value of a named control under its name.
    ///
    /// The value is the node's `value` property, falling back to its `value`
    /// attribute, then to an empty string. Returns `false` for nodes without
    /// a non-empty `name`.
    pub fn set(&self, node: &Node) -> bool {
        let Some(name) = node.attribute("name").filter(|name| !name.is_empty()) else {
            return false;
        };
        let value = node
            .property("value")
            .or_else(|| node.attribute("value").map(Value::String))
            .unwrap_or_else(|| Value::String(String::new()));
        self.store().set(&name, value)
    }

    /// Bind a `form` element. Returns `false` for any other node.
    pub fn form(&self, node: &Node) -> bool {
        if !node.has_tag("form") {
            return false;
        }
        let binder = self.clone();
        let weak = node.downgrade();
        node.add_event_listener(self.config().submit_event.clone(), true, move |event| {
            if let Some(form) = weak.upgrade() {
                let controls = form.query_all(|n| n.is_element() && n.has_attribute("name"));
                let stored = controls.iter().filter(|c| binder.set(c)).count();
                debug!(controls = controls.len(), stored, "form submitted");
            }
            event.prevent_default();
        });
        true
    }
}
