//! Change records and top-level document diffing.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

/// How a top-level entry changed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Added,
    Updated,
    Deleted,
}

/// A single top-level entry changed.
#[derive(Clone, Debug, PartialEq)]
pub struct ValueChange {
    /// Entry key; decimal index for array documents.
    pub key: String,
    pub kind: ChangeKind,
    /// New value, `None` when the entry was deleted.
    pub value: Option<Value>,
}

impl ValueChange {
    /// The key as an array index, if it is one.
    #[must_use]
    pub fn index(&self) -> Option<usize> {
        self.key.parse().ok()
    }
}

/// Membership of the document changed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StructureChange {
    pub added: Vec<String>,
    pub deleted: Vec<String>,
}

impl StructureChange {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.deleted.is_empty()
    }
}

/// Key ordered numerically when both sides are indices, lexically otherwise.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct EntryKey(pub(crate) String);

impl Ord for EntryKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.0.parse::<usize>(), other.0.parse::<usize>()) {
            (Ok(a), Ok(b)) => a.cmp(&b).then_with(|| self.0.cmp(&other.0)),
            (Ok(_), Err(_)) => Ordering::Less,
            (Err(_), Ok(_)) => Ordering::Greater,
            (Err(_), Err(_)) => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for EntryKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Top-level entries of a document, in key order.
pub(crate) fn entries(doc: &Value) -> BTreeMap<EntryKey, &Value> {
    match doc {
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| (EntryKey(k.clone()), v))
            .collect(),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, v)| (EntryKey(i.to_string()), v))
            .collect(),
        _ => BTreeMap::new(),
    }
}

/// Diff two documents at the top level.
pub(crate) fn diff(before: &Value, after: &Value) -> (Vec<ValueChange>, Option<StructureChange>) {
    let old = entries(before);
    let new = entries(after);
    let keys: BTreeSet<&EntryKey> = old.keys().chain(new.keys()).collect();

    let mut changes = Vec::new();
    let mut structure = StructureChange::default();
    for key in keys {
        match (old.get(key), new.get(key)) {
            (None, Some(value)) => {
                structure.added.push(key.0.clone());
                changes.push(ValueChange {
                    key: key.0.clone(),
                    kind: ChangeKind::Added,
                    value: Some((*value).clone()),
                });
            }
            (Some(_), None) => {
                structure.deleted.push(key.0.clone());
                changes.push(ValueChange {
                    key: key.0.clone(),
                    kind: ChangeKind::Deleted,
                    value: None,
                });
            }
            (Some(a), Some(b)) if a != b => changes.push(ValueChange {
                key: key.0.clone(),
                kind: ChangeKind::Updated,
                value: Some((*b).clone()),
            }),
            _ => {}
        }
    }

    let structure = (!structure.is_empty()).then_some(structure);
    (changes, structure)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numeric_keys_sort_numerically() {
        let mut keys = vec![
            EntryKey("10".into()),
            EntryKey("2".into()),
            EntryKey("name".into()),
            EntryKey("0".into()),
        ];
        keys.sort();
        let keys: Vec<_> = keys.into_iter().map(|k| k.0).collect();
        assert_eq!(keys, ["0", "2", "10", "name"]);
    }

    #[test]
    fn array_delete_shifts_and_removes_tail() {
        let (changes, structure) = diff(&json!([0, 1, 2]), &json!([1, 2]));
        let kinds: Vec<_> = changes.iter().map(|c| (c.key.as_str(), c.kind)).collect();
        assert_eq!(
            kinds,
            [
                ("0", ChangeKind::Updated),
                ("1", ChangeKind::Updated),
                ("2", ChangeKind::Deleted)
            ]
        );
        assert_eq!(
            structure,
            Some(StructureChange {
                added: vec![],
                deleted: vec!["2".into()],
            })
        );
    }

    #[test]
    fn object_update_has_no_structure_change() {
        let (changes, structure) = diff(&json!({"a": 1, "b": 2}), &json!({"a": 1, "b": 3}));
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].key, "b");
        assert_eq!(changes[0].value, Some(json!(3)));
        assert!(structure.is_none());
    }

    #[test]
    fn identical_documents_produce_nothing() {
        let doc = json!({"a": [1, 2], "b": {"c": null}});
        let (changes, structure) = diff(&doc, &doc.clone());
        assert!(changes.is_empty());
        assert!(structure.is_none());
    }

    #[test]
    fn scalar_roots_have_no_entries() {
        assert!(entries(&json!(3)).is_empty());
        assert!(entries(&Value::Null).is_empty());
    }

    #[test]
    fn change_index() {
        let change = ValueChange {
            key: "4".into(),
            kind: ChangeKind::Added,
            value: None,
        };
        assert_eq!(change.index(), Some(4));
    }
}
