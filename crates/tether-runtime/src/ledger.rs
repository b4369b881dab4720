//! Observer bookkeeping.
//!
//! Every store subscription (and node listener) created while wiring a node
//! is held by a [`BindingScope`]. The [`ObserverLedger`] groups scopes by
//! what they were created for: a rendered collection item, or a directly bound
//! path. Releasing a ledger entry drops its scope, which unsubscribes every
//! handle in it.
//!
//! # Invariants
//!
//! 1. Subscriptions are released in reverse registration order.
//! 2. After a scope is cleared or dropped, none of its callbacks fire.
//! 3. `release(key)` leaves no entry for `key` behind.

use std::fmt;

use ahash::AHashMap;
use tether_core::{ListenerId, Node, WeakNode};
use tether_store::{Subscription, SubscriptionId};

/// Removes a node listener on drop.
struct ListenerGuard {
    node: WeakNode,
    id: ListenerId,
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        if let Some(node) = self.node.upgrade() {
            node.remove_event_listener(self.id);
        }
    }
}

// ---------------------------------------------------------------------------
// BindingScope
// ---------------------------------------------------------------------------

/// Collects the subscriptions created for one logical owner.
///
/// When the scope is dropped, all held subscriptions are released and all
/// held listeners are removed from their nodes.
#[derive(Default)]
pub struct BindingScope {
    subscriptions: Vec<Subscription>,
    listeners: Vec<ListenerGuard>,
}

impl BindingScope {
    /// Create an empty binding scope.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep `sub` alive until the scope is dropped or cleared.
    pub fn hold(&mut self, sub: Subscription) {
        self.subscriptions.push(sub);
    }

    /// Remove the listener `id` from `node` when the scope is released.
    pub fn hold_listener(&mut self, node: &Node, id: ListenerId) {
        self.listeners.push(ListenerGuard {
            node: node.downgrade(),
            id,
        });
    }

    /// Move everything held by `other` into this scope.
    pub fn absorb(&mut self, mut other: BindingScope) {
        self.subscriptions.append(&mut other.subscriptions);
        self.listeners.append(&mut other.listeners);
    }

    /// Ids of the held subscriptions, in registration order.
    #[must_use]
    pub fn ids(&self) -> Vec<SubscriptionId> {
        self.subscriptions.iter().map(Subscription::id).collect()
    }

    /// Number of active subscriptions in this scope.
    #[must_use]
    pub fn binding_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Number of node listeners held.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty() && self.listeners.is_empty()
    }

    /// Release everything now. The scope stays usable.
    pub fn clear(&mut self) {
        while let Some(guard) = self.listeners.pop() {
            drop(guard);
        }
        while let Some(sub) = self.subscriptions.pop() {
            drop(sub);
        }
    }
}

impl Drop for BindingScope {
    fn drop(&mut self) {
        self.clear();
    }
}

impl fmt::Debug for BindingScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingScope")
            .field("binding_count", &self.subscriptions.len())
            .field("listener_count", &self.listeners.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// ObserverLedger
// ---------------------------------------------------------------------------

/// What a ledger entry was created for.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum LedgerKey {
    /// A rendered collection item.
    Item(usize),
    /// A binding outside any collection, keyed by its store path.
    Path(String),
}

impl fmt::Display for LedgerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Item(index) => write!(f, "item {index}"),
            Self::Path(path) => write!(f, "path {path:?}"),
        }
    }
}

/// Subscriptions grouped by owner.
#[derive(Default)]
pub struct ObserverLedger {
    entries: AHashMap<LedgerKey, BindingScope>,
}

impl ObserverLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `sub` to the entry for `key`.
    pub fn record(&mut self, key: LedgerKey, sub: Subscription) {
        self.entries.entry(key).or_default().hold(sub);
    }

    /// Append every subscription of `scope` to the entry for `key`.
    pub fn adopt(&mut self, key: LedgerKey, scope: BindingScope) {
        if scope.is_empty() {
            return;
        }
        self.entries.entry(key).or_default().absorb(scope);
    }

    /// Unsubscribe and forget everything recorded for `key`. Returns how many
    /// subscriptions were released.
    pub fn release(&mut self, key: &LedgerKey) -> usize {
        match self.entries.remove(key) {
            Some(mut scope) => {
                let released = scope.binding_count();
                scope.clear();
                released
            }
            None => 0,
        }
    }

    #[must_use]
    pub fn contains(&self, key: &LedgerKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Subscription ids recorded for `key`, empty when there are none.
    #[must_use]
    pub fn handles(&self, key: &LedgerKey) -> Vec<SubscriptionId> {
        self.entries.get(key).map(BindingScope::ids).unwrap_or_default()
    }

    /// Number of keys with recorded subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of held subscriptions.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.entries.values().map(BindingScope::binding_count).sum()
    }

    /// Release every entry.
    pub fn clear(&mut self) {
        for (_, mut scope) in self.entries.drain() {
            scope.clear();
        }
    }
}

impl fmt::Debug for ObserverLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverLedger")
            .field("keys", &self.entries.len())
            .field("subscriptions", &self.subscription_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;
    use tether_store::Store;

    fn counter(store: &Store, key: &str) -> (Rc<Cell<u32>>, Subscription) {
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        let sub = store.watch_value(key, move |_| h.set(h.get() + 1));
        (hits, sub)
    }

    // ── BindingScope ────────────────────────────────────────────────

    #[test]
    fn scope_holds_subscriptions() {
        let store = Store::default();
        let (hits, sub) = counter(&store, "a");
        let mut scope = BindingScope::new();
        scope.hold(sub);
        store.set("a", 1);
        assert_eq!(hits.get(), 1);
        assert_eq!(scope.binding_count(), 1);
    }

    #[test]
    fn scope_drop_releases() {
        let store = Store::default();
        let (hits, sub) = counter(&store, "a");
        let id = sub.id();
        {
            let mut scope = BindingScope::new();
            scope.hold(sub);
        }
        assert!(!store.has_observer(id));
        store.set("a", 1);
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn scope_clear_is_reusable() {
        let store = Store::default();
        let mut scope = BindingScope::new();
        let (_, sub) = counter(&store, "a");
        scope.hold(sub);
        scope.clear();
        assert!(scope.is_empty());
        let (hits, sub) = counter(&store, "a");
        scope.hold(sub);
        store.set("a", 2);
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn scope_ids_in_order() {
        let store = Store::default();
        let mut scope = BindingScope::new();
        let a = store.watch_structure(|_| {});
        let b = store.watch_structure(|_| {});
        let expected = vec![a.id(), b.id()];
        scope.hold(a);
        scope.hold(b);
        assert_eq!(scope.ids(), expected);
    }

    #[test]
    fn scope_debug_format() {
        let scope = BindingScope::new();
        assert_eq!(
            format!("{scope:?}"),
            "BindingScope { binding_count: 0, listener_count: 0 }"
        );
    }

    #[test]
    fn scope_removes_listeners_on_clear() {
        let input = Node::element("input");
        let id = input.add_event_listener("change", true, |_| {});
        let mut scope = BindingScope::new();
        scope.hold_listener(&input, id);
        assert!(!scope.is_empty());
        scope.clear();
        assert_eq!(input.listener_count("change"), 0);
    }

    // ── ObserverLedger ──────────────────────────────────────────────

    #[test]
    fn release_unsubscribes_only_that_key() {
        let store = Store::new(json!(["a", "b"]));
        let mut ledger = ObserverLedger::new();
        let (hits0, sub0) = counter(&store, "0");
        let (hits1, sub1) = counter(&store, "1");
        ledger.record(LedgerKey::Item(0), sub0);
        ledger.record(LedgerKey::Item(1), sub1);

        assert_eq!(ledger.release(&LedgerKey::Item(0)), 1);
        assert!(!ledger.contains(&LedgerKey::Item(0)));
        store.set("0", "x");
        store.set("1", "y");
        assert_eq!(hits0.get(), 0);
        assert_eq!(hits1.get(), 1);
    }

    #[test]
    fn release_absent_is_zero() {
        let mut ledger = ObserverLedger::new();
        assert_eq!(ledger.release(&LedgerKey::Path("nope".into())), 0);
    }

    #[test]
    fn adopt_merges_scopes() {
        let store = Store::default();
        let mut ledger = ObserverLedger::new();
        let mut scope = BindingScope::new();
        scope.hold(store.watch_structure(|_| {}));
        scope.hold(store.watch_structure(|_| {}));
        ledger.adopt(LedgerKey::Item(3), scope);
        ledger.record(LedgerKey::Item(3), store.watch_structure(|_| {}));
        assert_eq!(ledger.handles(&LedgerKey::Item(3)).len(), 3);
        ledger.adopt(LedgerKey::Item(4), BindingScope::new());
        assert!(!ledger.contains(&LedgerKey::Item(4)));
    }

    #[test]
    fn clear_releases_everything() {
        let store = Store::default();
        let mut ledger = ObserverLedger::new();
        ledger.record(LedgerKey::Item(0), store.watch_structure(|_| {}));
        ledger.record(LedgerKey::Path("a".into()), store.watch_value("a", |_| {}));
        assert_eq!(store.observer_count(), 2);
        ledger.clear();
        assert!(ledger.is_empty());
        assert_eq!(store.observer_count(), 0);
    }

    #[test]
    fn release_order_is_reverse() {
        let order = Rc::new(RefCell::new(Vec::new()));
        struct Marker(u32, Rc<RefCell<Vec<u32>>>);
        impl Drop for Marker {
            fn drop(&mut self) {
                self.1.borrow_mut().push(self.0);
            }
        }
        let store = Store::default();
        let mut scope = BindingScope::new();
        for n in 0..3 {
            let marker = Marker(n, Rc::clone(&order));
            scope.hold(store.watch_structure(move |_| {
                let _ = &marker;
            }));
        }
        scope.clear();
        assert_eq!(*order.borrow(), [2, 1, 0]);
    }
}
