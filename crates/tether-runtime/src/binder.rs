//! Store ↔ node bindings.
//!
//! [`Binder::bind`] connects one node to one store value:
//!
//! - **Forward** (store → node): the reaction runs once immediately when the
//!   value exists, then on every change of the observed key. A value that
//!   disappears is rendered as `null`.
//! - **Reverse** (node → store): for reverse-capable reactions a capture
//!   listener on the configured change event writes the node's state back.
//!   Inside a rendered item the write only happens while the item still exists
//!   in the store.
//!
//! The observed key comes from the node's position: inside a rendered item it
//! is the item's index (stamped on the node or an ancestor) and the whole path
//! is looked up inside the item; outside, the first path segment is the key.
//!
//! # Invariants
//!
//! 1. Every subscription and listener a binding creates is held by the scope
//!    passed in; dropping the scope disconnects the binding.
//! 2. Registered forward-only reactions never write back.
//! 3. Callbacks hold nodes weakly; a dropped node is never resurrected.

use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use serde_json::{Map, Value};
use tether_core::Node;
use tether_store::Store;
use tracing::{debug, trace, warn};

use crate::config::BindingConfig;
use crate::descriptor::{BindingPath, Descriptor};
use crate::item_renderer::{ItemApplier, find_item_index};
use crate::ledger::BindingScope;
use crate::registry::{BindingRegistry, ReverseReader};

/// Direction of a binding.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum BindMode {
    /// Store → node, plus node → store for reverse-capable reactions.
    #[default]
    TwoWay,
    /// Store → node only.
    OneWay,
}

struct BinderInner {
    store: Store,
    registry: RefCell<BindingRegistry>,
    config: BindingConfig,
}

/// Shared binding engine: store, reactions and configuration.
///
/// Cheap to clone; clones share the registry.
#[derive(Clone)]
pub struct Binder {
    inner: Rc<BinderInner>,
}

impl Binder {
    #[must_use]
    pub fn new(store: Store, config: BindingConfig) -> Self {
        Self {
            inner: Rc::new(BinderInner {
                store,
                registry: RefCell::new(BindingRegistry::new()),
                config,
            }),
        }
    }

    /// A binder over `store` with a copy of this binder's reactions and
    /// configuration.
    #[must_use]
    pub fn with_store(&self, store: Store) -> Self {
        let registry = self.inner.registry.borrow().clone();
        Self {
            inner: Rc::new(BinderInner {
                store,
                registry: RefCell::new(registry),
                config: self.inner.config.clone(),
            }),
        }
    }

    #[must_use]
    pub fn store(&self) -> &Store {
        &self.inner.store
    }

    #[must_use]
    pub fn config(&self) -> &BindingConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn registry(&self) -> Ref<'_, BindingRegistry> {
        self.inner.registry.borrow()
    }

    /// Mutable registry access. Must not be held across a store mutation.
    pub fn registry_mut(&self) -> RefMut<'_, BindingRegistry> {
        self.inner.registry.borrow_mut()
    }

    /// Run `reaction` on `node`: a registered reaction, or else a write to
    /// the node property of that name.
    fn react(&self, node: &Node, reaction: &str, value: &Value, extra: &[String]) {
        let registered = self.inner.registry.borrow().get_binding(reaction);
        match registered {
            Some(f) => f(node, value, extra),
            None => node.set_property(reaction, value.clone()),
        }
    }

    /// How to read `reaction`'s node state back, if it is reverse-capable.
    fn reverse_reader(&self, reaction: &str) -> Option<ReverseReader> {
        let registry = self.inner.registry.borrow();
        if registry.has_binding(reaction) {
            return registry.reverse_reader(reaction);
        }
        if !self.inner.config.is_reverse_property(reaction) {
            return None;
        }
        let property = reaction.to_owned();
        Some(Rc::new(move |node: &Node| {
            node.property(&property).unwrap_or(Value::Null)
        }))
    }

    /// Two-way [`bind_with_mode`](Self::bind_with_mode).
    pub fn bind(
        &self,
        node: &Node,
        reaction: &str,
        path: &BindingPath,
        extra: &[String],
        scope: &mut BindingScope,
    ) -> bool {
        self.bind_with_mode(node, reaction, path, extra, BindMode::TwoWay, scope)
    }

    /// Bind `node` to the value at `path`.
    ///
    /// Returns `false` when the node is outside any item and `path` is empty,
    /// since there is then no key to observe.
    pub fn bind_with_mode(
        &self,
        node: &Node,
        reaction: &str,
        path: &BindingPath,
        extra: &[String],
        mode: BindMode,
        scope: &mut BindingScope,
    ) -> bool {
        let owner = find_item_index(node, &self.inner.config.index_attribute);
        let (key, lookup) = match owner {
            Some(index) => (index.to_string(), path.clone()),
            None => match path.split_first() {
                Some((head, rest)) => (head.to_owned(), rest),
                None => {
                    debug!(reaction, "binding outside an item needs a path");
                    return false;
                }
            },
        };

        if let Some(value) = self
            .inner
            .store
            .get(&key)
            .and_then(|entry| lookup.resolve(&entry).cloned())
        {
            self.react(node, reaction, &value, extra);
        }

        let forward = {
            let binder = self.clone();
            let weak = node.downgrade();
            let reaction = reaction.to_owned();
            let extra = extra.to_vec();
            let lookup = lookup.clone();
            move |change: &tether_store::ValueChange| {
                let Some(node) = weak.upgrade() else {
                    return;
                };
                let value = change
                    .value
                    .as_ref()
                    .and_then(|v| lookup.resolve(v))
                    .cloned()
                    .unwrap_or(Value::Null);
                binder.react(&node, &reaction, &value, &extra);
            }
        };
        scope.hold(self.inner.store.watch_value(key.clone(), forward));

        if mode == BindMode::TwoWay {
            if let Some(reader) = self.reverse_reader(reaction) {
                let id = self.listen_for_changes(node, reader, owner, key, lookup);
                scope.hold_listener(node, id);
            }
        }
        trace!(reaction, ?owner, path = %path, ?mode, "bound");
        true
    }

    fn listen_for_changes(
        &self,
        node: &Node,
        reader: ReverseReader,
        owner: Option<usize>,
        key: String,
        lookup: BindingPath,
    ) -> tether_core::ListenerId {
        let store = self.inner.store.clone();
        let weak = node.downgrade();
        node.add_event_listener(self.inner.config.change_event.clone(), true, move |_| {
            let Some(node) = weak.upgrade() else {
                return;
            };
            let value = reader(&node);
            if owner.is_some() && !store.has(&key) {
                trace!(%key, "item no longer exists; write-back skipped");
                return;
            }
            if lookup.is_empty() {
                store.set(&key, value);
            } else if store.has(&key) {
                store.update(&key, lookup.segments(), value);
            } else {
                let mut entry = Value::Object(Map::new());
                lookup.assign(&mut entry, value);
                store.set(&key, entry);
            }
        })
    }

    /// Descriptors on `root` and below, in document order. Subtrees under a
    /// collection marker are not entered.
    pub(crate) fn collect_descriptors(&self, root: &Node) -> Vec<(Node, Descriptor)> {
        let attribute = &self.inner.config.attribute;
        let mut found = Vec::new();
        let mut stack = vec![root.clone()];
        while let Some(node) = stack.pop() {
            let descriptor = node.attribute(attribute).and_then(|raw| {
                let parsed = Descriptor::parse(&raw);
                if parsed.is_none() {
                    debug!(raw = %raw, "skipping malformed descriptor");
                }
                parsed
            });
            let collection = matches!(descriptor, Some(Descriptor::Foreach(_)));
            if let Some(descriptor) = descriptor {
                found.push((node.clone(), descriptor));
            }
            if !collection {
                stack.extend(node.children().into_iter().rev());
            }
        }
        found
    }
}

impl ItemApplier for Binder {
    /// Activate the bindings inside a freshly rendered item.
    fn apply(&self, node: &Node, scope: &mut BindingScope) {
        for (target, descriptor) in self.collect_descriptors(node) {
            match descriptor {
                Descriptor::Bind(binding) => {
                    self.bind(&target, &binding.reaction, &binding.path, &binding.extra, scope);
                }
                Descriptor::Form => {
                    self.form(&target);
                }
                Descriptor::Foreach(_) => {
                    warn!("collections nested inside a rendered item are not supported; skipping");
                }
            }
        }
    }
}

impl fmt::Debug for Binder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binder")
            .field("store", &self.inner.store)
            .field("registry", &*self.inner.registry.borrow())
            .field("config", &self.inner.config)
            .finish()
    }
}
