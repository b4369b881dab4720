//! Binding descriptors and value paths.
//!
//! A descriptor is the value of the binding attribute on a node:
//!
//! | Markup                              | Meaning                                  |
//! |-------------------------------------|------------------------------------------|
//! | `bind:innerHTML`                    | reaction on the whole owning item        |
//! | `bind:innerHTML,content`            | reaction on `content`                    |
//! | `bind:toggleClass,done,finished`    | reaction on `done` with extra `finished` |
//! | `bind:value,contact.mail`           | reaction on a nested path                |
//! | `foreach`                           | collection, default renderer             |
//! | `foreach:todos`                     | collection rendered by renderer `todos`  |
//! | `foreach:page,20,10`                | renderer `page`, items 20 to 29          |
//! | `form`                              | whole-form binding                       |
//!
//! Segments are trimmed. Parsing never panics; malformed input yields `None`.

use std::fmt;

use serde_json::Value;
use smallvec::SmallVec;
use tether_store::pointer;

use crate::item_renderer::{Count, parse_start};

/// Dotted path into a value, e.g. `contact.mail`.
///
/// An empty path designates the value itself.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct BindingPath {
    segments: SmallVec<[String; 4]>,
}

impl BindingPath {
    /// The empty path.
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// Split `raw` on `.`, dropping empty segments.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        raw.split('.')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .collect()
    }

    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// First segment and the remaining path.
    #[must_use]
    pub fn split_first(&self) -> Option<(&str, BindingPath)> {
        let (head, tail) = self.segments.split_first()?;
        Some((head.as_str(), tail.iter().cloned().collect()))
    }

    /// Look the path up below `value`.
    #[must_use]
    pub fn resolve<'a>(&self, value: &'a Value) -> Option<&'a Value> {
        pointer::resolve(value, self.segments.as_slice())
    }

    /// Write `new` at the path below `target`, creating intermediate objects.
    pub fn assign(&self, target: &mut Value, new: Value) -> bool {
        pointer::assign(target, self.segments.as_slice(), new)
    }
}

impl FromIterator<String> for BindingPath {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self {
            segments: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for BindingPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

/// Parsed `bind:` descriptor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BindingDescriptor {
    /// Registered reaction name, or a node property to write.
    pub reaction: String,
    pub path: BindingPath,
    /// Arguments passed through to the reaction.
    pub extra: Vec<String>,
}

impl BindingDescriptor {
    /// Parse `<reaction>[,<path>[,<extra>...]]`.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw.split(',').map(str::trim);
        let reaction = parts.next().filter(|r| !r.is_empty())?;
        let path = parts.next().map(BindingPath::parse).unwrap_or_default();
        let extra = parts.map(str::to_owned).collect();
        Some(Self {
            reaction: reaction.to_owned(),
            path,
            extra,
        })
    }
}

impl fmt::Display for BindingDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reaction)?;
        if !self.path.is_empty() || !self.extra.is_empty() {
            write!(f, ",{}", self.path)?;
        }
        for extra in &self.extra {
            write!(f, ",{extra}")?;
        }
        Ok(())
    }
}

/// Parsed collection marker: `foreach[:<id>[,<start>[,<count>]]]`.
///
/// Absent parts fall back to the configured default renderer, index 0 and
/// an unbounded count.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CollectionMarker {
    /// Renderer id.
    pub id: Option<String>,
    pub start: Option<usize>,
    pub count: Option<Count>,
}

impl CollectionMarker {
    /// Parse the part after `foreach:`. Returns `None` when the start or count
    /// is not numeric, or when there are more than three parts.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw.split(',').map(str::trim);
        let id = parts
            .next()
            .filter(|id| !id.is_empty())
            .map(str::to_owned);
        let start = match parts.next() {
            Some("") | None => None,
            Some(raw) => Some(parse_start(raw)?),
        };
        let count = match parts.next() {
            Some("") | None => None,
            Some(raw) => Some(raw.parse::<Count>().ok()?),
        };
        if parts.next().is_some() {
            return None;
        }
        Some(Self { id, start, count })
    }

    #[must_use]
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

impl fmt::Display for CollectionMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(id) = &self.id {
            f.write_str(id)?;
        }
        if self.start.is_some() || self.count.is_some() {
            f.write_str(",")?;
            if let Some(start) = self.start {
                write!(f, "{start}")?;
            }
        }
        if let Some(count) = self.count {
            write!(f, ",{count}")?;
        }
        Ok(())
    }
}

/// Any value of the binding attribute.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Descriptor {
    Bind(BindingDescriptor),
    Foreach(CollectionMarker),
    Form,
}

impl Descriptor {
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let (method, rest) = match raw.split_once(':') {
            Some((method, rest)) => (method.trim(), Some(rest.trim())),
            None => (raw, None),
        };
        match method {
            "bind" => BindingDescriptor::parse(rest?).map(Self::Bind),
            "foreach" => match rest {
                Some(rest) => CollectionMarker::parse(rest).map(Self::Foreach),
                None => Some(Self::Foreach(CollectionMarker::default())),
            },
            "form" => rest.is_none_or(str::is_empty).then_some(Self::Form),
            _ => None,
        }
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bind(binding) => write!(f, "bind:{binding}"),
            Self::Foreach(marker) if marker.is_default() => f.write_str("foreach"),
            Self::Foreach(marker) => write!(f, "foreach:{marker}"),
            Self::Form => f.write_str("form"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn bind(raw: &str) -> BindingDescriptor {
        match Descriptor::parse(raw) {
            Some(Descriptor::Bind(b)) => b,
            other => panic!("expected bind descriptor, got {other:?}"),
        }
    }

    // ── Descriptors ─────────────────────────────────────────────────

    #[test]
    fn reaction_and_path() {
        let b = bind("bind:innerHTML,content");
        assert_eq!(b.reaction, "innerHTML");
        assert_eq!(b.path.segments(), ["content"]);
        assert!(b.extra.is_empty());
    }

    #[test]
    fn extra_arguments() {
        let b = bind("bind:toggleClass,property,otherParam");
        assert_eq!(b.reaction, "toggleClass");
        assert_eq!(b.path.to_string(), "property");
        assert_eq!(b.extra, ["otherParam"]);
    }

    #[test]
    fn bare_reaction_binds_whole_item() {
        let b = bind("bind:innerHTML");
        assert!(b.path.is_empty());
    }

    #[test]
    fn whitespace_is_trimmed() {
        let b = bind(" bind: checked , contact.mail ");
        assert_eq!(b.reaction, "checked");
        assert_eq!(b.path.segments(), ["contact", "mail"]);
    }

    #[test]
    fn markers() {
        assert_eq!(
            Descriptor::parse("foreach"),
            Some(Descriptor::Foreach(CollectionMarker::default()))
        );
        assert_eq!(
            Descriptor::parse("foreach:plugins"),
            Some(Descriptor::Foreach(CollectionMarker {
                id: Some("plugins".into()),
                ..CollectionMarker::default()
            }))
        );
        assert_eq!(Descriptor::parse("form"), Some(Descriptor::Form));
    }

    #[test]
    fn collection_window() {
        let marker = CollectionMarker::parse(" page , 20 , 10 ").unwrap();
        assert_eq!(marker.id.as_deref(), Some("page"));
        assert_eq!(marker.start, Some(20));
        assert_eq!(marker.count, Some(Count::Bounded(10)));

        let marker = CollectionMarker::parse(",-2,*").unwrap();
        assert_eq!(marker.id, None);
        assert_eq!(marker.start, Some(0));
        assert_eq!(marker.count, Some(Count::Unbounded));

        assert!(CollectionMarker::parse("").unwrap().is_default());
        assert_eq!(CollectionMarker::parse("page,x"), None);
        assert_eq!(CollectionMarker::parse("page,1,many"), None);
        assert_eq!(CollectionMarker::parse("page,1,2,3"), None);
    }

    #[test]
    fn malformed_descriptors() {
        for raw in ["", "bind", "bind:", "bind:,path", "listen:click", "form:x", "foreachx", "foreach:a,b"] {
            assert_eq!(Descriptor::parse(raw), None, "{raw:?}");
        }
    }

    #[test]
    fn display_round_trips() {
        for raw in [
            "bind:innerHTML",
            "bind:value,contact.mail",
            "bind:toggleClass,a,b,c",
            "foreach:items",
            "foreach:page,20,10",
            "foreach:,,*",
            "form",
        ] {
            let parsed = Descriptor::parse(raw).unwrap();
            assert_eq!(parsed.to_string(), raw);
        }
    }

    // ── Paths ───────────────────────────────────────────────────────

    #[test]
    fn path_resolve() {
        let value = json!({"contact": {"mail": "a@b.c"}});
        let path = BindingPath::parse("contact.mail");
        assert_eq!(path.resolve(&value), Some(&json!("a@b.c")));
        assert_eq!(BindingPath::root().resolve(&value), Some(&value));
        assert_eq!(BindingPath::parse("contact.office").resolve(&value), None);
    }

    #[test]
    fn path_assign() {
        let mut value = json!({});
        assert!(BindingPath::parse("contact.office").assign(&mut value, json!("B12")));
        assert_eq!(value, json!({"contact": {"office": "B12"}}));
    }

    #[test]
    fn split_first() {
        let path = BindingPath::parse("contact.mail");
        let (head, tail) = path.split_first().unwrap();
        assert_eq!(head, "contact");
        assert_eq!(tail.segments(), ["mail"]);
        assert!(BindingPath::root().split_first().is_none());
    }

    #[test]
    fn empty_segments_dropped() {
        assert_eq!(BindingPath::parse("a..b.").segments(), ["a", "b"]);
        assert!(BindingPath::parse("").is_empty());
    }

    proptest! {
        #[test]
        fn parse_never_panics(raw in ".{0,40}") {
            let _ = Descriptor::parse(&raw);
        }

        #[test]
        fn parsed_bind_has_nonempty_reaction(raw in "[a-z ,.:]{0,24}") {
            if let Some(Descriptor::Bind(b)) = Descriptor::parse(&raw) {
                prop_assert!(!b.reaction.is_empty());
                prop_assert!(b.path.segments().iter().all(|s| !s.is_empty()));
            }
        }
    }
}
