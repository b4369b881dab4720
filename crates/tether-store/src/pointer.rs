//! Nested lookup and assignment by path segments.
//!
//! Segments address object keys, or array indices when the segment is a
//! decimal number and the current value is an array.

use serde_json::{Map, Value};

/// Walk `path` from `root`. An empty path yields `root`.
#[must_use]
pub fn resolve<'a, S: AsRef<str>>(root: &'a Value, path: &[S]) -> Option<&'a Value> {
    path.iter().try_fold(root, |current, segment| step(current, segment.as_ref()))
}

fn step<'a>(current: &'a Value, segment: &str) -> Option<&'a Value> {
    match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

/// Write `value` at `path` below `root`, creating intermediate objects.
///
/// Scalars met along the way are replaced with empty objects. An empty path
/// replaces `root`. Returns `false` only for an array index past the end.
pub fn assign<S: AsRef<str>>(root: &mut Value, path: &[S], value: Value) -> bool {
    let Some((last, parents)) = path.split_last() else {
        *root = value;
        return true;
    };

    let mut current = root;
    for segment in parents {
        let segment = segment.as_ref();
        current = match current {
            Value::Array(items) => match segment.parse::<usize>() {
                Ok(i) if i < items.len() => &mut items[i],
                _ => return false,
            },
            other => {
                if !other.is_object() {
                    *other = Value::Object(Map::new());
                }
                match other {
                    Value::Object(map) => map
                        .entry(segment.to_owned())
                        .or_insert_with(|| Value::Object(Map::new())),
                    _ => return false,
                }
            }
        };
    }

    let last = last.as_ref();
    match current {
        Value::Array(items) => match last.parse::<usize>() {
            Ok(i) if i < items.len() => {
                items[i] = value;
                true
            }
            Ok(i) if i == items.len() => {
                items.push(value);
                true
            }
            _ => false,
        },
        Value::Object(map) => {
            map.insert(last.to_owned(), value);
            true
        }
        other => {
            let mut map = Map::new();
            map.insert(last.to_owned(), value);
            *other = Value::Object(map);
            true
        }
    }
}
