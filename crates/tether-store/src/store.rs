//! The observable document store.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};

use serde_json::{Map, Value};
use tracing::trace;

use crate::batch::BatchGuard;
use crate::change::{self, StructureChange, ValueChange};
use crate::pointer;
use crate::subscription::{Callback, StructureFn, Subscription, SubscriptionId, ValueFn};

/// Array mutations available through [`Store::alter`].
#[derive(Clone, Debug, PartialEq)]
pub enum Alteration {
    /// Append one item.
    Push(Value),
    /// Remove the last item.
    Pop,
    /// Remove the first item.
    Shift,
    /// Prepend items, keeping their order.
    Unshift(Vec<Value>),
    /// Remove `delete` items at `start` and insert `insert` in their place.
    /// `start` and `delete` are clamped to the array bounds.
    Splice {
        start: usize,
        delete: usize,
        insert: Vec<Value>,
    },
    Reverse,
}

enum Observer {
    Value { key: String, callback: Weak<ValueFn> },
    Structure { callback: Weak<StructureFn> },
}

impl Observer {
    fn is_alive(&self) -> bool {
        match self {
            Self::Value { callback, .. } => callback.strong_count() > 0,
            Self::Structure { callback } => callback.strong_count() > 0,
        }
    }
}

struct Entry {
    id: SubscriptionId,
    observer: Observer,
}

pub(crate) enum Notification {
    Value(ValueChange),
    Structure(StructureChange),
}

pub(crate) struct StoreInner {
    data: RefCell<Value>,
    observers: RefCell<Vec<Entry>>,
    pub(crate) queue: RefCell<VecDeque<Notification>>,
    dispatching: Cell<bool>,
    pub(crate) batch_depth: Cell<u32>,
    next_id: Cell<u64>,
}

/// Resets the dispatching flag even if an observer panics.
struct DispatchGuard<'a>(&'a Cell<bool>);

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl StoreInner {
    fn next_id(&self) -> SubscriptionId {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        SubscriptionId(id)
    }

    /// Drop an observer entry. Skipped while the list is borrowed by a
    /// dispatch; the dead `Weak` is pruned on the next pass instead.
    pub(crate) fn forget(&self, id: SubscriptionId) {
        if let Ok(mut observers) = self.observers.try_borrow_mut() {
            observers.retain(|e| e.id != id);
        }
    }

    fn prune(&self) {
        if let Ok(mut observers) = self.observers.try_borrow_mut() {
            observers.retain(|e| e.observer.is_alive());
        }
    }

    /// Deliver queued notifications unless a dispatch or batch is active.
    pub(crate) fn flush(inner: &Rc<StoreInner>) {
        if inner.dispatching.get() || inner.batch_depth.get() > 0 {
            return;
        }
        inner.dispatching.set(true);
        let _guard = DispatchGuard(&inner.dispatching);

        loop {
            let next = inner.queue.borrow_mut().pop_front();
            let Some(notification) = next else {
                break;
            };
            inner.deliver(&notification);
        }
        inner.prune();
    }

    fn deliver(&self, notification: &Notification) {
        match notification {
            Notification::Value(change) => {
                let targets: Vec<Weak<ValueFn>> = self
                    .observers
                    .borrow()
                    .iter()
                    .filter_map(|e| match &e.observer {
                        Observer::Value { key, callback } if *key == change.key => {
                            Some(Weak::clone(callback))
                        }
                        _ => None,
                    })
                    .collect();
                trace!(key = %change.key, kind = ?change.kind, observers = targets.len(), "value change");
                for weak in targets {
                    if let Some(callback) = weak.upgrade() {
                        callback(change);
                    }
                }
            }
            Notification::Structure(change) => {
                let targets: Vec<Weak<StructureFn>> = self
                    .observers
                    .borrow()
                    .iter()
                    .filter_map(|e| match &e.observer {
                        Observer::Structure { callback } => Some(Weak::clone(callback)),
                        Observer::Value { .. } => None,
                    })
                    .collect();
                trace!(
                    added = change.added.len(),
                    deleted = change.deleted.len(),
                    observers = targets.len(),
                    "structure change"
                );
                for weak in targets {
                    if let Some(callback) = weak.upgrade() {
                        callback(change);
                    }
                }
            }
        }
    }
}

/// Shared, observable JSON document.
///
/// Keys address top-level entries: object keys, or decimal indices when the
/// root is an array. Clones share the same document and observers.
///
/// # Failure Modes
///
/// Mutations that cannot apply (unknown key, index out of range, scalar
/// root) return `false`/`None` and leave the document untouched.
#[derive(Clone)]
pub struct Store {
    inner: Rc<StoreInner>,
}

impl Store {
    /// Create a store over `data`. Object and array roots are mutable by key;
    /// any other root is read-only.
    #[must_use]
    pub fn new(data: Value) -> Self {
        Self {
            inner: Rc::new(StoreInner {
                data: RefCell::new(data),
                observers: RefCell::new(Vec::new()),
                queue: RefCell::new(VecDeque::new()),
                dispatching: Cell::new(false),
                batch_depth: Cell::new(0),
                next_id: Cell::new(0),
            }),
        }
    }

    /// Whether both handles share one document.
    #[must_use]
    pub fn ptr_eq(&self, other: &Store) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    // ── Reads ───────────────────────────────────────────────────────

    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        pointer::resolve(&self.inner.data.borrow(), &[key]).cloned()
    }

    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        pointer::resolve(&self.inner.data.borrow(), &[key]).is_some()
    }

    /// Number of top-level entries.
    #[must_use]
    pub fn len(&self) -> usize {
        match &*self.inner.data.borrow() {
            Value::Object(map) => map.len(),
            Value::Array(items) => items.len(),
            _ => 0,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Top-level keys in ascending order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        change::entries(&self.inner.data.borrow())
            .into_keys()
            .map(|k| k.0)
            .collect()
    }

    /// Copy of the whole document.
    #[must_use]
    pub fn snapshot(&self) -> Value {
        self.inner.data.borrow().clone()
    }

    // ── Mutations ───────────────────────────────────────────────────

    /// Apply `edit` to the document, then queue and flush the resulting
    /// notifications. `edit` returning `None` means nothing changed.
    fn mutate<R>(&self, op: &'static str, edit: impl FnOnce(&mut Value) -> Option<R>) -> Option<R> {
        let (result, changes, structure) = {
            let mut data = self.inner.data.borrow_mut();
            let before = data.clone();
            let result = edit(&mut *data)?;
            let (changes, structure) = change::diff(&before, &data);
            (result, changes, structure)
        };
        trace!(op, changes = changes.len(), structural = structure.is_some(), "store mutation");
        {
            let mut queue = self.inner.queue.borrow_mut();
            queue.extend(changes.into_iter().map(Notification::Value));
            queue.extend(structure.map(Notification::Structure));
        }
        StoreInner::flush(&self.inner);
        Some(result)
    }

    /// Set the entry at `key`. For array roots `key` must be an index no
    /// greater than the length (equal appends).
    ///
    /// Setting an equal value is accepted and emits nothing.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> bool {
        let value = value.into();
        self.mutate("set", |data| match data {
            Value::Object(map) => {
                map.insert(key.to_owned(), value);
                Some(())
            }
            Value::Array(items) => {
                let index = key.parse::<usize>().ok()?;
                match index.cmp(&items.len()) {
                    std::cmp::Ordering::Less => items[index] = value,
                    std::cmp::Ordering::Equal => items.push(value),
                    std::cmp::Ordering::Greater => return None,
                }
                Some(())
            }
            _ => None,
        })
        .is_some()
    }

    /// Remove the entry at `key`. Array entries are spliced out, shifting
    /// later items down.
    pub fn del(&self, key: &str) -> bool {
        self.mutate("del", |data| match data {
            Value::Object(map) => map.remove(key).map(drop),
            Value::Array(items) => {
                let index = key.parse::<usize>().ok().filter(|&i| i < items.len())?;
                items.remove(index);
                Some(())
            }
            _ => None,
        })
        .is_some()
    }

    /// Assign `value` at `path` inside the existing entry `key`.
    ///
    /// Returns `false` when `key` is absent. An empty path behaves like
    /// [`Store::set`].
    pub fn update<S: AsRef<str>>(&self, key: &str, path: &[S], value: impl Into<Value>) -> bool {
        if !self.has(key) {
            return false;
        }
        let value = value.into();
        if path.is_empty() {
            return self.set(key, value);
        }
        self.mutate("update", |data| {
            let entry = match data {
                Value::Object(map) => map.get_mut(key)?,
                Value::Array(items) => items.get_mut(key.parse::<usize>().ok()?)?,
                _ => return None,
            };
            pointer::assign(entry, path, value).then_some(())
        })
        .is_some()
    }

    /// Apply an array mutation. Returns the removed items, or `None` when the
    /// root is not an array.
    pub fn alter(&self, alteration: Alteration) -> Option<Vec<Value>> {
        self.mutate("alter", |data| {
            let Value::Array(items) = data else {
                return None;
            };
            let removed = match alteration {
                Alteration::Push(value) => {
                    items.push(value);
                    Vec::new()
                }
                Alteration::Pop => items.pop().into_iter().collect(),
                Alteration::Shift => {
                    if items.is_empty() {
                        Vec::new()
                    } else {
                        vec![items.remove(0)]
                    }
                }
                Alteration::Unshift(values) => {
                    items.splice(0..0, values);
                    Vec::new()
                }
                Alteration::Splice {
                    start,
                    delete,
                    insert,
                } => {
                    let start = start.min(items.len());
                    let end = start.saturating_add(delete).min(items.len());
                    items.splice(start..end, insert).collect()
                }
                Alteration::Reverse => {
                    items.reverse();
                    Vec::new()
                }
            };
            Some(removed)
        })
    }

    /// Append to an array root.
    pub fn push(&self, value: impl Into<Value>) -> bool {
        self.alter(Alteration::Push(value.into())).is_some()
    }

    /// Remove and return the last item of an array root.
    pub fn pop(&self) -> Option<Value> {
        self.alter(Alteration::Pop)?.into_iter().next()
    }

    /// Splice an array root. Returns the removed items.
    pub fn splice(
        &self,
        start: usize,
        delete: usize,
        insert: impl IntoIterator<Item = Value>,
    ) -> Option<Vec<Value>> {
        self.alter(Alteration::Splice {
            start,
            delete,
            insert: insert.into_iter().collect(),
        })
    }

    /// Replace the whole document, notifying every changed entry.
    pub fn reset(&self, data: Value) {
        self.mutate("reset", |current| {
            *current = data;
            Some(())
        });
    }

    // ── Observers ───────────────────────────────────────────────────

    /// Observe changes of the entry at `key`.
    pub fn watch_value(
        &self,
        key: impl Into<String>,
        callback: impl Fn(&ValueChange) + 'static,
    ) -> Subscription {
        let callback: Rc<ValueFn> = Rc::new(callback);
        let id = self.inner.next_id();
        self.inner.observers.borrow_mut().push(Entry {
            id,
            observer: Observer::Value {
                key: key.into(),
                callback: Rc::downgrade(&callback),
            },
        });
        Subscription::new(id, Rc::downgrade(&self.inner), Callback::Value(callback))
    }

    /// Observe entries being added or removed.
    pub fn watch_structure(&self, callback: impl Fn(&StructureChange) + 'static) -> Subscription {
        let callback: Rc<StructureFn> = Rc::new(callback);
        let id = self.inner.next_id();
        self.inner.observers.borrow_mut().push(Entry {
            id,
            observer: Observer::Structure {
                callback: Rc::downgrade(&callback),
            },
        });
        Subscription::new(
            id,
            Rc::downgrade(&self.inner),
            Callback::Structure(callback),
        )
    }

    /// Whether the observer `id` is still subscribed.
    #[must_use]
    pub fn has_observer(&self, id: SubscriptionId) -> bool {
        self.inner
            .observers
            .borrow()
            .iter()
            .any(|e| e.id == id && e.observer.is_alive())
    }

    /// Number of live observers (value and structural).
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.inner
            .observers
            .borrow()
            .iter()
            .filter(|e| e.observer.is_alive())
            .count()
    }

    /// Defer notifications until the returned guard (and any outer guard)
    /// drops.
    pub fn batch(&self) -> BatchGuard {
        BatchGuard::enter(&self.inner)
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new(Value::Object(Map::new()))
    }
}

impl From<Value> for Store {
    fn from(data: Value) -> Self {
        Self::new(data)
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("len", &self.len())
            .field("observers", &self.observer_count())
            .field("pending", &self.inner.queue.borrow().len())
            .finish()
    }
}
