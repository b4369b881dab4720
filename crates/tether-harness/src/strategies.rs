//! `proptest` strategies.

use proptest::prelude::*;
use serde_json::Value;
use tether_runtime::Count;

/// A string array of up to `max_len` items.
pub fn string_items(max_len: usize) -> impl Strategy<Value = Vec<Value>> {
    proptest::collection::vec("[a-z]{1,6}".prop_map(Value::String), 0..=max_len)
}

/// A bounded or unbounded item count.
pub fn count(max: usize) -> impl Strategy<Value = Count> {
    prop_oneof![
        (0..=max).prop_map(Count::Bounded),
        Just(Count::Unbounded),
    ]
}

/// A structural edit against an array of unknown length.
#[derive(Debug, Clone)]
pub enum Edit {
    Push(String),
    Pop,
    DeleteAt(usize),
    InsertAt(usize, String),
    Move { start: usize },
    Resize(Count),
}

pub fn edit() -> impl Strategy<Value = Edit> {
    prop_oneof![
        "[a-z]{1,4}".prop_map(Edit::Push),
        Just(Edit::Pop),
        (0usize..12).prop_map(Edit::DeleteAt),
        (0usize..12, "[a-z]{1,4}").prop_map(|(i, s)| Edit::InsertAt(i, s)),
        (0usize..12).prop_map(|start| Edit::Move { start }),
        count(8).prop_map(Edit::Resize),
    ]
}
