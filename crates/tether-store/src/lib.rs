#![forbid(unsafe_code)]

//! Observable document store for Tether.
//!
//! - [`Store`]: a shared JSON document (object or array root) with keyed
//!   mutation (`set`, `del`, `update`, `alter`, `reset`).
//! - [`Subscription`]: RAII guard returned by [`Store::watch_value`] and
//!   [`Store::watch_structure`]; dropping it removes the observer.
//! - [`BatchGuard`]: defers every notification until the outermost guard
//!   exits.
//!
//! # Architecture
//!
//! The store wraps `Rc<..>` shared state; clones share one document. Observer
//! callbacks are owned by their [`Subscription`] and the store keeps only
//! `Weak` references, cleaned up lazily during notification.
//!
//! After every mutation the store diffs the top-level entries of the document
//! and queues one [`ValueChange`] per changed key (ascending key order,
//! numeric keys compared numerically) followed by one [`StructureChange`] when
//! keys were added or removed.
//!
//! # Invariants
//!
//! 1. Observers fire in subscription order.
//! 2. Setting a value equal to the current value emits nothing.
//! 3. A subscription dropped during a dispatch never fires after the drop.
//! 4. Mutations issued from inside an observer are applied immediately; their
//!    notifications are queued and delivered FIFO once the current
//!    notification has reached every observer.
//! 5. Within a [`BatchGuard`], mutations apply immediately and notifications
//!    wait for the outermost guard to drop.

pub mod batch;
pub mod change;
pub mod pointer;
pub mod store;
pub mod subscription;

pub use batch::BatchGuard;
pub use change::{ChangeKind, StructureChange, ValueChange};
pub use store::{Alteration, Store};
pub use subscription::{Subscription, SubscriptionId};
