//! Named reactions.
//!
//! A reaction renders a value into a node: `(node, value, extra)`. Reactions
//! registered with [`BindingRegistry::add_two_way_binding`] also carry a
//! reader that extracts the node's state for write-back into the store.

use std::fmt;
use std::rc::Rc;

use ahash::AHashMap;
use serde_json::Value;
use tether_core::Node;

/// Store → node rendering function.
pub type Reaction = Rc<dyn Fn(&Node, &Value, &[String])>;

/// Node → store reader for two-way reactions.
pub type ReverseReader = Rc<dyn Fn(&Node) -> Value>;

/// Wrap a closure as a [`Reaction`].
pub fn reaction(f: impl Fn(&Node, &Value, &[String]) + 'static) -> Reaction {
    Rc::new(f)
}

#[derive(Clone)]
struct Entry {
    forward: Reaction,
    reverse: Option<ReverseReader>,
}

/// Name → reaction table.
///
/// Lookups are plain map lookups: a name is present only if it was
/// registered.
#[derive(Clone, Default)]
pub struct BindingRegistry {
    entries: AHashMap<String, Entry>,
}

impl BindingRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a forward-only reaction. Returns `false` for an
    /// empty name.
    pub fn add_binding(
        &mut self,
        name: impl Into<String>,
        reaction: impl Fn(&Node, &Value, &[String]) + 'static,
    ) -> bool {
        self.insert(name.into(), Rc::new(reaction), None)
    }

    /// Register a reaction whose node state can be written back with
    /// `reverse`.
    pub fn add_two_way_binding(
        &mut self,
        name: impl Into<String>,
        forward: impl Fn(&Node, &Value, &[String]) + 'static,
        reverse: impl Fn(&Node) -> Value + 'static,
    ) -> bool {
        self.insert(name.into(), Rc::new(forward), Some(Rc::new(reverse)))
    }

    /// Register every entry. Returns `false` if any name was rejected; the
    /// valid entries are registered regardless.
    pub fn add_bindings<K, I>(&mut self, bindings: I) -> bool
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Reaction)>,
    {
        bindings
            .into_iter()
            .fold(true, |ok, (name, reaction)| {
                self.insert(name.into(), reaction, None) && ok
            })
    }

    fn insert(&mut self, name: String, forward: Reaction, reverse: Option<ReverseReader>) -> bool {
        if name.is_empty() {
            return false;
        }
        self.entries.insert(name, Entry { forward, reverse });
        true
    }

    #[must_use]
    pub fn has_binding(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    #[must_use]
    pub fn get_binding(&self, name: &str) -> Option<Reaction> {
        self.entries.get(name).map(|e| Rc::clone(&e.forward))
    }

    /// Reader for two-way reactions, `None` for forward-only or unknown names.
    #[must_use]
    pub fn reverse_reader(&self, name: &str) -> Option<ReverseReader> {
        self.entries.get(name)?.reverse.clone()
    }

    /// Invoke the reaction `name`. Returns `false` if it is not registered.
    pub fn exec_binding(&self, node: &Node, name: &str, value: &Value, extra: &[String]) -> bool {
        match self.get_binding(name) {
            Some(reaction) => {
                reaction(node, value, extra);
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for BindingRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingRegistry")
            .field("names", &self.names())
            .finish()
    }
}
