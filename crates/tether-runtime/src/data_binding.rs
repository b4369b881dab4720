//! Tree-wide binding orchestration.
//!
//! [`DataBinding`] scans a subtree for binding descriptors and wires each one:
//! scalar bindings through the [`Binder`], collection markers through one
//! [`ItemRenderer`] per renderer id, and forms through the form binder. Each
//! renderer is re-rendered whenever the store's membership changes.
//!
//! # Invariants
//!
//! 1. At most one renderer and one structural hook exist per renderer id.
//! 2. Renderers live as long as the `DataBinding`; they are reconfigured,
//!    never individually destroyed.
//! 3. The structural hook holds its renderer weakly and skips (with a
//!    warning) when the renderer is already borrowed.
//! 4. [`apply`](DataBinding::apply) never moves a renderer off a container
//!    it already renders. A marker whose id is taken by another container
//!    gets the first free id of the form `<id>#1`, `<id>#2`, ...

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use ahash::AHashMap;
use serde_json::Value;
use tether_core::Node;
use tether_store::{Store, Subscription, SubscriptionId};
use tracing::{debug, warn};

use crate::binder::Binder;
use crate::config::BindingConfig;
use crate::descriptor::{BindingPath, Descriptor};
use crate::item_renderer::{Count, ItemApplier, ItemRenderer, find_item_index};
use crate::ledger::{BindingScope, LedgerKey, ObserverLedger};
use crate::registry::Reaction;

/// Shared handle to a renderer owned by a [`DataBinding`].
pub type SharedRenderer = Rc<RefCell<ItemRenderer>>;

/// Binds a store to node trees.
pub struct DataBinding {
    binder: Binder,
    ledger: ObserverLedger,
    applier: Rc<dyn ItemApplier>,
    renderers: AHashMap<String, SharedRenderer>,
    hooks: AHashMap<String, Subscription>,
}

impl DataBinding {
    #[must_use]
    pub fn new(store: Store) -> Self {
        Self::with_config(store, BindingConfig::default())
    }

    #[must_use]
    pub fn with_config(store: Store, config: BindingConfig) -> Self {
        let binder = Binder::new(store, config);
        Self {
            applier: Rc::new(binder.clone()),
            binder,
            ledger: ObserverLedger::new(),
            renderers: AHashMap::new(),
            hooks: AHashMap::new(),
        }
    }

    /// Create and register `bindings` up front.
    #[must_use]
    pub fn with_bindings<K, I>(store: Store, bindings: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Reaction)>,
    {
        let binding = Self::new(store);
        binding.add_bindings(bindings);
        binding
    }

    #[must_use]
    pub fn store(&self) -> &Store {
        self.binder.store()
    }

    /// Switch every renderer to `store` and re-render it.
    ///
    /// Direct binds made by [`apply`](Self::apply) or [`bind`](Self::bind)
    /// are released; apply the tree again to bind them to the new store.
    /// Registered reactions carry over. A renderer installed with its own
    /// applier keeps it.
    pub fn set_store(&mut self, store: Store) {
        self.hooks.clear();
        let released = self.ledger.subscription_count();
        self.ledger.clear();

        let previous = Rc::clone(&self.applier);
        self.binder = self.binder.with_store(store.clone());
        self.applier = Rc::new(self.binder.clone());

        for id in self.renderer_ids() {
            let Some(renderer) = self.renderers.get(&id).cloned() else {
                continue;
            };
            {
                let Ok(mut r) = renderer.try_borrow_mut() else {
                    warn!(renderer = %id, "renderer busy; store switch skipped");
                    continue;
                };
                r.set_store(store.clone());
                if r.applier().is_some_and(|a| Rc::ptr_eq(&a, &previous)) {
                    r.set_applier(Rc::clone(&self.applier));
                }
                r.render();
            }
            self.install_hook(&id, &renderer);
        }
        debug!(released, renderers = self.renderers.len(), "store switched");
    }

    #[must_use]
    pub fn config(&self) -> &BindingConfig {
        self.binder.config()
    }

    #[must_use]
    pub fn binder(&self) -> &Binder {
        &self.binder
    }

    // ── Registry ────────────────────────────────────────────────────

    pub fn add_binding(
        &self,
        name: impl Into<String>,
        reaction: impl Fn(&Node, &Value, &[String]) + 'static,
    ) -> bool {
        self.binder.registry_mut().add_binding(name, reaction)
    }

    pub fn add_two_way_binding(
        &self,
        name: impl Into<String>,
        forward: impl Fn(&Node, &Value, &[String]) + 'static,
        reverse: impl Fn(&Node) -> Value + 'static,
    ) -> bool {
        self.binder
            .registry_mut()
            .add_two_way_binding(name, forward, reverse)
    }

    pub fn add_bindings<K, I>(&self, bindings: I) -> bool
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Reaction)>,
    {
        self.binder.registry_mut().add_bindings(bindings)
    }

    #[must_use]
    pub fn has_binding(&self, name: &str) -> bool {
        self.binder.registry().has_binding(name)
    }

    #[must_use]
    pub fn get_binding(&self, name: &str) -> Option<Reaction> {
        self.binder.registry().get_binding(name)
    }

    /// Invoke a registered reaction directly.
    pub fn exec_binding(&self, node: &Node, name: &str, value: &Value, extra: &[String]) -> bool {
        // Released before the call so the reaction may register others.
        let reaction = self.get_binding(name);
        match reaction {
            Some(reaction) => {
                reaction(node, value, extra);
                true
            }
            None => false,
        }
    }

    // ── Tree scanning ───────────────────────────────────────────────

    /// Activate every descriptor on `root` and below. Returns how many were
    /// activated.
    pub fn apply(&mut self, root: &Node) -> usize {
        let mut activated = 0;
        for (node, descriptor) in self.binder.collect_descriptors(root) {
            let ok = match descriptor {
                Descriptor::Bind(binding) => {
                    self.bind(&node, &binding.reaction, &binding.path, &binding.extra)
                }
                Descriptor::Foreach(marker) => {
                    let base = marker
                        .id
                        .unwrap_or_else(|| self.config().default_renderer.clone());
                    let id = self.renderer_id_for(&base, &node);
                    let start = marker.start.unwrap_or(0);
                    let count = marker.count.unwrap_or(Count::Unbounded);
                    self.foreach(&node, &id, start, count)
                }
                Descriptor::Form => self.form(&node),
            };
            activated += usize::from(ok);
        }
        debug!(activated, "descriptors applied");
        activated
    }

    /// Bind a single node outside any renderer. The subscription is recorded
    /// under the owning item index, or else under the path.
    pub fn bind(&mut self, node: &Node, reaction: &str, path: &BindingPath, extra: &[String]) -> bool {
        let mut scope = BindingScope::new();
        if !self.binder.bind(node, reaction, path, extra, &mut scope) {
            return false;
        }
        let key = match self.get_item_index(node) {
            Some(index) => LedgerKey::Item(index),
            None => LedgerKey::Path(path.to_string()),
        };
        self.ledger.adopt(key, scope);
        true
    }

    // ── Collections ─────────────────────────────────────────────────

    /// Render the collection under `node` with renderer `id`, showing
    /// `count` items from `start`.
    ///
    /// The renderer is created on first use. Later calls reconfigure it; a
    /// different container is captured afresh.
    pub fn foreach(&mut self, node: &Node, id: &str, start: usize, count: Count) -> bool {
        let renderer = match self.renderers.get(id) {
            Some(existing) => Rc::clone(existing),
            None => {
                let created = Rc::new(RefCell::new(
                    ItemRenderer::new(self.store().clone())
                        .with_id(id)
                        .with_index_attribute(self.config().index_attribute.clone()),
                ));
                self.renderers.insert(id.to_owned(), Rc::clone(&created));
                created
            }
        };

        {
            let Ok(mut r) = renderer.try_borrow_mut() else {
                warn!(renderer = id, "renderer busy; foreach ignored");
                return false;
            };
            r.set_applier(Rc::clone(&self.applier));
            if !r.root_node().is_some_and(|root| root.ptr_eq(node)) {
                r.set_root_node(node);
            }
            r.set_start(start);
            r.set_nb(count);
            r.render();
        }
        self.install_hook(id, &renderer);
        true
    }

    /// [`foreach`](Self::foreach) with the default renderer id over the whole
    /// collection.
    pub fn foreach_default(&mut self, node: &Node) -> bool {
        let id = self.config().default_renderer.clone();
        self.foreach(node, &id, 0, Count::Unbounded)
    }

    /// `base` unless a renderer under that id already renders another
    /// container; then the first free `base#n`.
    fn renderer_id_for(&self, base: &str, node: &Node) -> String {
        let free = |id: &str| match self.renderers.get(id) {
            None => true,
            Some(renderer) => renderer
                .try_borrow()
                .is_ok_and(|r| r.root_node().is_none_or(|root| root.ptr_eq(node))),
        };
        if free(base) {
            return base.to_owned();
        }
        let mut n = 1usize;
        loop {
            let id = format!("{base}#{n}");
            if free(&id) {
                debug!(renderer = %id, taken = base, "renderer id in use; suffixed");
                return id;
            }
            n += 1;
        }
    }

    fn install_hook(&mut self, id: &str, renderer: &SharedRenderer) {
        if self.hooks.contains_key(id) {
            return;
        }
        let weak = Rc::downgrade(renderer);
        let name = id.to_owned();
        let hook = self.store().watch_structure(move |_| {
            let Some(renderer) = weak.upgrade() else {
                return;
            };
            match renderer.try_borrow_mut() {
                Ok(mut r) => {
                    r.render();
                }
                Err(_) => warn!(renderer = %name, "renderer busy; structural change skipped"),
            }
        });
        self.hooks.insert(id.to_owned(), hook);
    }

    #[must_use]
    pub fn item_renderer(&self, id: &str) -> Option<SharedRenderer> {
        self.renderers.get(id).cloned()
    }

    /// Install `renderer` under `id`, replacing any previous one, and keep it
    /// in sync with the store.
    pub fn set_item_renderer(&mut self, id: &str, renderer: ItemRenderer) -> SharedRenderer {
        let shared = Rc::new(RefCell::new(renderer));
        self.renderers.insert(id.to_owned(), Rc::clone(&shared));
        self.hooks.remove(id);
        self.install_hook(id, &shared);
        shared
    }

    /// Renderer ids, sorted.
    #[must_use]
    pub fn renderer_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.renderers.keys().cloned().collect();
        ids.sort_unstable();
        ids
    }

    /// Change the start of renderer `id` without rendering.
    pub fn update_start(&self, id: &str, start: usize) -> bool {
        self.with_renderer(id, |r| {
            r.set_start(start);
        })
    }

    /// Change the count of renderer `id` without rendering.
    pub fn update_nb(&self, id: &str, count: Count) -> bool {
        self.with_renderer(id, |r| {
            r.set_nb(count);
        })
    }

    /// Render renderer `id` now.
    pub fn refresh(&self, id: &str) -> bool {
        self.with_renderer(id, |r| {
            r.render();
        })
    }

    fn with_renderer(&self, id: &str, f: impl FnOnce(&mut ItemRenderer)) -> bool {
        let Some(renderer) = self.renderers.get(id) else {
            return false;
        };
        match renderer.try_borrow_mut() {
            Ok(mut r) => {
                f(&mut r);
                true
            }
            Err(_) => {
                warn!(renderer = id, "renderer busy");
                false
            }
        }
    }

    // ── Items and observers ─────────────────────────────────────────

    /// Collection index that `node` (or its nearest stamped ancestor) renders.
    #[must_use]
    pub fn get_item_index(&self, node: &Node) -> Option<usize> {
        find_item_index(node, &self.config().index_attribute)
    }

    /// Subscriptions recorded for `key` by direct binds.
    #[must_use]
    pub fn observers(&self, key: &LedgerKey) -> Vec<SubscriptionId> {
        self.ledger.handles(key)
    }

    /// Disconnect every direct bind recorded under `key`.
    pub fn unbind(&mut self, key: &LedgerKey) -> usize {
        self.ledger.release(key)
    }

    // ── Forms ───────────────────────────────────────────────────────

    /// Bind a `form` element; see [`Binder::form`].
    pub fn form(&self, node: &Node) -> bool {
        self.binder.form(node)
    }

    /// Store a named control's value; see [`Binder::set`].
    pub fn set(&self, node: &Node) -> bool {
        self.binder.set(node)
    }
}

impl fmt::Debug for DataBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataBinding")
            .field("binder", &self.binder)
            .field("ledger", &self.ledger)
            .field("renderers", &self.renderer_ids())
            .finish()
    }
}
