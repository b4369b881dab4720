//! Deferred notification scopes.

use std::fmt;
use std::rc::Rc;

use crate::store::StoreInner;

/// RAII guard that defers change notifications.
///
/// Mutations inside the scope are applied immediately; their notifications
/// are queued and delivered, in order, when the outermost guard for the store
/// drops. Guards nest.
#[must_use = "notifications resume as soon as the guard is dropped"]
pub struct BatchGuard {
    inner: Rc<StoreInner>,
}

impl BatchGuard {
    pub(crate) fn enter(inner: &Rc<StoreInner>) -> Self {
        inner.batch_depth.set(inner.batch_depth.get() + 1);
        Self {
            inner: Rc::clone(inner),
        }
    }

    /// Number of notifications waiting for delivery.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inner.queue.borrow().len()
    }
}

impl Drop for BatchGuard {
    fn drop(&mut self) {
        let depth = self.inner.batch_depth.get().saturating_sub(1);
        self.inner.batch_depth.set(depth);
        if depth == 0 {
            StoreInner::flush(&self.inner);
        }
    }
}

impl fmt::Debug for BatchGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchGuard")
            .field("depth", &self.inner.batch_depth.get())
            .field("pending", &self.pending())
            .finish()
    }
}
