//! Observer handles.

use std::fmt;
use std::rc::{Rc, Weak};

use crate::change::{StructureChange, ValueChange};
use crate::store::StoreInner;

pub(crate) type ValueFn = dyn Fn(&ValueChange);
pub(crate) type StructureFn = dyn Fn(&StructureChange);

/// Identifier of an observer registration, unique per store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub(crate) u64);

impl SubscriptionId {
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub#{}", self.0)
    }
}

/// Strong owner of an observer callback.
pub(crate) enum Callback {
    Value(Rc<ValueFn>),
    Structure(Rc<StructureFn>),
}

/// RAII guard for an observer. Dropping it unsubscribes.
///
/// The callback is owned here; the store only holds a `Weak` to it, so once
/// the guard is gone the callback can never run again even if the store has
/// not yet pruned its entry.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: SubscriptionId,
    store: Weak<StoreInner>,
    _callback: Callback,
}

impl Subscription {
    pub(crate) fn new(id: SubscriptionId, store: Weak<StoreInner>, callback: Callback) -> Self {
        Self {
            id,
            store,
            _callback: callback,
        }
    }

    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.store.upgrade() {
            inner.forget(self.id);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("store_alive", &(self.store.strong_count() > 0))
            .finish()
    }
}
