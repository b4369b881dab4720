#![forbid(unsafe_code)]

//! Binding engine for Tether.
//!
//! Connects a [`Store`](tether_store::Store) to a tree of
//! [`Node`](tether_core::Node)s declared with descriptor attributes:
//!
//! ```text
//! <h1 data-model="bind:innerHTML,title"></h1>
//! <ul data-model="foreach">
//!     <li data-model="bind:innerHTML"></li>
//! </ul>
//! <form data-model="form">...</form>
//! ```
//!
//! - [`descriptor`]: descriptor grammar and value paths.
//! - [`registry`]: named reactions, optionally two-way.
//! - [`ledger`]: [`BindingScope`] and [`ObserverLedger`], which own every
//!   subscription a binding creates.
//! - [`binder`]: the store ↔ node binding itself.
//! - [`item_renderer`]: incremental, windowed collection rendering.
//! - [`data_binding`]: [`DataBinding`], which scans trees and owns renderers.
//! - [`form`]: whole-form write-back on submit.
//! - [`config`]: attribute and event names.
//!
//! # Architecture
//!
//! Everything is single-threaded and synchronous. Store observers call back
//! into the binder and the renderers while a mutation is being delivered, so
//! shared state lives behind `Rc<RefCell<..>>` and callbacks hold nodes and
//! renderers weakly.

pub mod binder;
pub mod config;
pub mod data_binding;
pub mod descriptor;
pub mod form;
pub mod item_renderer;
pub mod ledger;
pub mod registry;

pub use binder::{BindMode, Binder};
pub use config::{BindingConfig, ConfigError};
pub use data_binding::{DataBinding, SharedRenderer};
pub use descriptor::{BindingDescriptor, BindingPath, CollectionMarker, Descriptor};
pub use item_renderer::{
    Count, ItemApplier, ItemRenderer, ParseCountError, RenderReport, Window, find_item_index,
    stamp_index,
};
pub use ledger::{BindingScope, LedgerKey, ObserverLedger};
pub use registry::{BindingRegistry, Reaction, ReverseReader, reaction};
