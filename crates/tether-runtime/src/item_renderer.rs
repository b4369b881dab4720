//! Windowed collection rendering.
//!
//! An [`ItemRenderer`] keeps a container node in sync with the visible window
//! of an array held in a [`Store`]. It captures the container's first element
//! child as the item template, then materializes one deep clone per visible
//! index, in index order, wiring each clone through an [`ItemApplier`].
//!
//! Rendering is incremental: [`ItemRenderer::render`] only adds the visible
//! indices that are missing and removes the materialized indices that left the
//! window. Content changes of an existing index are the job of the observers
//! the applier installed on that item, never of the renderer.
//!
//! # Invariants
//!
//! 1. Materialized nodes appear in the container in ascending index order.
//! 2. Every index in the item map corresponds to a live node attached to the
//!    container.
//! 3. An item's observers are released before its node is detached and its
//!    map entry deleted.
//! 4. Within one render, additions run in ascending order and removals in
//!    descending order.
//! 5. A render with no intervening change does no work.
//!
//! # Failure Modes
//!
//! | Condition                         | Behavior                          |
//! |-----------------------------------|-----------------------------------|
//! | Container has no element child    | Template unchanged, debug log     |
//! | Count never set                   | `render()` returns `false`        |
//! | Index already materialized        | `add_item()` returns `false`      |
//! | Index absent from the store       | `create()` returns `None`         |
//! | Index not materialized            | `remove_item()` returns `false`   |

use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Bound, Range};
use std::rc::Rc;
use std::str::FromStr;

use tether_core::Node;
use tether_store::{Store, SubscriptionId};
use tracing::{debug, debug_span, trace};

use crate::ledger::{BindingScope, LedgerKey, ObserverLedger};

/// Default attribute carrying an item's collection index.
pub const DEFAULT_INDEX_ATTRIBUTE: &str = "data-model_id";

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// Wires a freshly materialized item node.
///
/// Subscriptions created for the item must be placed in `scope`; they are
/// released when the item is removed.
pub trait ItemApplier {
    fn apply(&self, node: &Node, scope: &mut BindingScope);
}

impl<F> ItemApplier for F
where
    F: Fn(&Node, &mut BindingScope),
{
    fn apply(&self, node: &Node, scope: &mut BindingScope) {
        self(node, scope);
    }
}

// ---------------------------------------------------------------------------
// Window
// ---------------------------------------------------------------------------

/// Number of visible items.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Count {
    Bounded(usize),
    /// Everything from `start` to the end of the collection.
    Unbounded,
}

impl Count {
    /// Signed counts clamp to zero.
    #[must_use]
    pub fn from_signed(n: i64) -> Self {
        Self::Bounded(usize::try_from(n).unwrap_or(0))
    }
}

/// Textual count that is neither an integer nor `*`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid item count {0:?}: expected an integer or \"*\"")]
pub struct ParseCountError(String);

impl FromStr for Count {
    type Err = ParseCountError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        if trimmed == "*" {
            return Ok(Self::Unbounded);
        }
        trimmed
            .parse::<i64>()
            .map(Self::from_signed)
            .map_err(|_| ParseCountError(raw.to_owned()))
    }
}

impl fmt::Display for Count {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bounded(n) => write!(f, "{n}"),
            Self::Unbounded => f.write_str("*"),
        }
    }
}

/// Parse a textual start position. Negative values clamp to zero.
#[must_use]
pub fn parse_start(raw: &str) -> Option<usize> {
    raw.trim()
        .parse::<i64>()
        .ok()
        .map(|n| usize::try_from(n).unwrap_or(0))
}

/// Parse a textual collection index. Negative or non-numeric input is
/// rejected.
#[must_use]
pub fn parse_index(raw: &str) -> Option<usize> {
    raw.trim().parse::<usize>().ok()
}

/// The visible slice of a collection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Window {
    pub start: usize,
    /// `None` until a count has been set.
    pub count: Option<Count>,
}

impl Window {
    /// Indices visible in a collection of `len` items, `None` while the count
    /// is unset.
    #[must_use]
    pub fn visible_range(&self, len: usize) -> Option<Range<usize>> {
        let count = self.count?;
        let start = self.start.min(len);
        let end = match count {
            Count::Bounded(n) => self.start.saturating_add(n).min(len),
            Count::Unbounded => len,
        };
        Some(start..end.max(start))
    }
}

/// Work done by one render pass, in the order it was performed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RenderReport {
    pub added: Vec<usize>,
    pub removed: Vec<usize>,
}

impl RenderReport {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Index stamps
// ---------------------------------------------------------------------------

/// Stamp `node` and every descendant element with `index`.
pub fn stamp_index(node: &Node, attribute: &str, index: usize) {
    let value = index.to_string();
    node.set_attribute(attribute, value.as_str());
    for descendant in node.descendants() {
        if descendant.is_element() {
            descendant.set_attribute(attribute, value.as_str());
        }
    }
}

/// Index stamped on `node` or its nearest stamped ancestor.
#[must_use]
pub fn find_item_index(node: &Node, attribute: &str) -> Option<usize> {
    node.ancestors_or_self()
        .find_map(|n| n.attribute(attribute))
        .and_then(|raw| parse_index(&raw))
}

// ---------------------------------------------------------------------------
// ItemRenderer
// ---------------------------------------------------------------------------

/// Incremental index → node mapping for one collection container.
pub struct ItemRenderer {
    id: String,
    store: Store,
    applier: Option<Rc<dyn ItemApplier>>,
    root: Option<Node>,
    template: Option<Node>,
    window: Window,
    items: BTreeMap<usize, Node>,
    ledger: ObserverLedger,
    index_attribute: String,
    last_report: RenderReport,
}

impl ItemRenderer {
    #[must_use]
    pub fn new(store: Store) -> Self {
        Self {
            id: "default".to_owned(),
            store,
            applier: None,
            root: None,
            template: None,
            window: Window::default(),
            items: BTreeMap::new(),
            ledger: ObserverLedger::new(),
            index_attribute: DEFAULT_INDEX_ATTRIBUTE.to_owned(),
            last_report: RenderReport::default(),
        }
    }

    /// Renderer over `root`, wiring items with `applier`.
    #[must_use]
    pub fn with_root(store: Store, applier: Rc<dyn ItemApplier>, root: &Node) -> Self {
        let mut renderer = Self::new(store);
        renderer.set_applier(applier);
        renderer.set_root_node(root);
        renderer
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Use `attribute` for index stamps. Affects items created afterwards.
    #[must_use]
    pub fn with_index_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.index_attribute = attribute.into();
        self
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Switch to another store. Held items are destroyed; the container,
    /// template and window are kept for the next render.
    pub fn set_store(&mut self, store: Store) {
        self.clear();
        self.store = store;
    }

    #[must_use]
    pub fn index_attribute(&self) -> &str {
        &self.index_attribute
    }

    // ── Configuration ───────────────────────────────────────────────

    /// Take `root` as the container and capture its first element child as
    /// the template.
    ///
    /// Items held from a previous configuration are destroyed first. Leading
    /// non-element children are discarded. When `root` has no element child
    /// the current template is kept.
    pub fn set_root_node(&mut self, root: &Node) {
        self.clear();

        while let Some(first) = root.first_child() {
            if first.is_element() {
                break;
            }
            root.remove_child(&first);
            debug!(renderer = %self.id, "discarded non-element child before template");
        }

        match root.first_child() {
            Some(template) => {
                root.remove_child(&template);
                self.template = Some(template);
            }
            None => debug!(renderer = %self.id, "container has no element child; template unchanged"),
        }
        self.root = Some(root.clone());
    }

    #[must_use]
    pub fn root_node(&self) -> Option<&Node> {
        self.root.as_ref()
    }

    /// Replace the template. The node is used as-is; it is never attached.
    pub fn set_renderer(&mut self, template: Node) {
        self.template = Some(template);
    }

    #[must_use]
    pub fn renderer(&self) -> Option<&Node> {
        self.template.as_ref()
    }

    pub fn set_applier(&mut self, applier: Rc<dyn ItemApplier>) {
        self.applier = Some(applier);
    }

    #[must_use]
    pub fn applier(&self) -> Option<Rc<dyn ItemApplier>> {
        self.applier.clone()
    }

    // ── Window ──────────────────────────────────────────────────────

    pub fn set_start(&mut self, start: usize) -> usize {
        self.window.start = start;
        start
    }

    /// Set the start from text. Returns `None`, leaving the window unchanged,
    /// for non-numeric input.
    pub fn set_start_from(&mut self, raw: &str) -> Option<usize> {
        parse_start(raw).map(|start| self.set_start(start))
    }

    pub fn set_nb(&mut self, count: Count) -> Count {
        self.window.count = Some(count);
        count
    }

    /// Set the count from text (`"3"`, `"*"`). Returns `None`, leaving the
    /// window unchanged, for other input.
    pub fn set_nb_from(&mut self, raw: &str) -> Option<Count> {
        raw.parse::<Count>().ok().map(|count| self.set_nb(count))
    }

    #[must_use]
    pub fn start(&self) -> usize {
        self.window.start
    }

    #[must_use]
    pub fn nb(&self) -> Option<Count> {
        self.window.count
    }

    #[must_use]
    pub fn window(&self) -> Window {
        self.window
    }

    // ── Items ───────────────────────────────────────────────────────

    /// Materialize the node for `index` without attaching it.
    ///
    /// Returns `None` when the store has no item at `index` or no template
    /// has been captured. An item already held at `index` is destroyed first.
    pub fn create(&mut self, index: usize) -> Option<Node> {
        let template = self.template.clone()?;
        if !self.store.has(&index.to_string()) {
            return None;
        }
        if self.items.contains_key(&index) {
            self.remove_item(index);
        }

        let node = template.deep_clone();
        stamp_index(&node, &self.index_attribute, index);

        let mut scope = BindingScope::new();
        if let Some(applier) = &self.applier {
            applier.apply(&node, &mut scope);
        }
        self.ledger.adopt(LedgerKey::Item(index), scope);
        self.items.insert(index, node.clone());
        Some(node)
    }

    /// Materialize `index` and insert it before the next higher materialized
    /// item (or at the end).
    ///
    /// Returns `false` without materializing anything while no container is
    /// set, even though [`create`](Self::create) alone would succeed.
    pub fn add_item(&mut self, index: usize) -> bool {
        if self.items.contains_key(&index) {
            return false;
        }
        let Some(root) = self.root.clone() else {
            return false;
        };
        let Some(node) = self.create(index) else {
            return false;
        };
        let next = self.get_next_item(index);
        if !root.insert_before(&node, next.as_ref()) {
            root.append_child(&node);
        }
        trace!(renderer = %self.id, index, "item added");
        true
    }

    /// [`add_item`](Self::add_item) for textual indices. Non-numeric and
    /// negative input is rejected.
    pub fn add_item_from(&mut self, raw: &str) -> bool {
        parse_index(raw).is_some_and(|index| self.add_item(index))
    }

    /// Release the item's observers, detach its node and forget it.
    pub fn remove_item(&mut self, index: usize) -> bool {
        if !self.items.contains_key(&index) {
            return false;
        }
        let released = self.ledger.release(&LedgerKey::Item(index));
        if let Some(node) = self.items.remove(&index) {
            node.detach();
        }
        trace!(renderer = %self.id, index, released, "item removed");
        true
    }

    /// Node of the smallest materialized index greater than `index`.
    #[must_use]
    pub fn get_next_item(&self, index: usize) -> Option<Node> {
        self.items
            .range((Bound::Excluded(index), Bound::Unbounded))
            .next()
            .map(|(_, node)| node.clone())
    }

    // ── Rendering ───────────────────────────────────────────────────

    /// Bring the container in line with the window. Returns `false` while the
    /// count is unset.
    pub fn render(&mut self) -> bool {
        self.render_report().is_some()
    }

    /// [`render`](Self::render), reporting the work performed.
    pub fn render_report(&mut self) -> Option<RenderReport> {
        let len = self.store.len();
        let range = self.window.visible_range(len)?;
        let _span = debug_span!(
            target: "tether::render",
            "render",
            renderer = %self.id,
            start = self.window.start,
            len
        )
        .entered();

        let mut report = RenderReport::default();
        for index in range.clone() {
            if !self.items.contains_key(&index) && self.add_item(index) {
                report.added.push(index);
            }
        }

        let stale: Vec<usize> = self
            .items
            .keys()
            .rev()
            .filter(|&&index| !range.contains(&index))
            .copied()
            .collect();
        for index in stale {
            if self.remove_item(index) {
                report.removed.push(index);
            }
        }

        if !report.is_empty() {
            debug!(
                renderer = %self.id,
                added = report.added.len(),
                removed = report.removed.len(),
                "render complete"
            );
        }
        self.last_report = report.clone();
        Some(report)
    }

    /// Work done by the most recent render.
    #[must_use]
    pub fn last_report(&self) -> &RenderReport {
        &self.last_report
    }

    // ── Introspection ───────────────────────────────────────────────

    /// Materialized items by index.
    #[must_use]
    pub fn items(&self) -> &BTreeMap<usize, Node> {
        &self.items
    }

    #[must_use]
    pub fn indices(&self) -> Vec<usize> {
        self.items.keys().copied().collect()
    }

    #[must_use]
    pub fn item(&self, index: usize) -> Option<&Node> {
        self.items.get(&index)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Subscriptions held for the item at `index`.
    #[must_use]
    pub fn item_observers(&self, index: usize) -> Vec<SubscriptionId> {
        self.ledger.handles(&LedgerKey::Item(index))
    }

    /// Destroy every materialized item, highest index first.
    pub fn clear(&mut self) {
        let indices: Vec<usize> = self.items.keys().rev().copied().collect();
        for index in indices {
            self.remove_item(index);
        }
    }
}

impl fmt::Debug for ItemRenderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemRenderer")
            .field("id", &self.id)
            .field("window", &self.window)
            .field("items", &self.indices())
            .field("has_template", &self.template.is_some())
            .field("has_root", &self.root.is_some())
            .field("ledger", &self.ledger)
            .finish()
    }
}
