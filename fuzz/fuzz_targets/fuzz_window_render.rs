#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use serde_json::{Value, json};
use tether_core::Node;
use tether_runtime::{Count, DataBinding};
use tether_store::Store;

#[derive(Arbitrary, Debug)]
enum Op {
    Push(u8),
    Pop,
    Delete(u8),
    Insert(u8, u8),
    Splice { start: u8, delete: u8, insert: u8 },
    Start(u8),
    Count(Option<u8>),
}

#[derive(Arbitrary, Debug)]
struct Input {
    initial: u8,
    start: u8,
    count: Option<u8>,
    ops: Vec<Op>,
}

fn count(raw: Option<u8>) -> Count {
    raw.map_or(Count::Unbounded, |n| Count::Bounded(usize::from(n % 16)))
}

fuzz_target!(|input: Input| {
    let items: Vec<Value> = (0..input.initial % 32).map(|i| json!(i)).collect();
    let store = Store::new(Value::Array(items));
    let mut binding = DataBinding::new(store.clone());
    let list = Node::element("ul")
        .with_child(Node::element("li").with_attr("data-model", "bind:innerHTML"));

    let (mut start, mut window) = (usize::from(input.start % 32), count(input.count));
    binding.foreach(&list, "id", start, window);

    for op in input.ops.iter().take(64) {
        match *op {
            Op::Push(v) => {
                store.push(v);
            }
            Op::Pop => {
                store.pop();
            }
            Op::Delete(i) => {
                store.del(&i.to_string());
            }
            Op::Insert(i, v) => {
                store.splice(usize::from(i), 0, [json!(v)]);
            }
            Op::Splice { start, delete, insert } => {
                store.splice(
                    usize::from(start),
                    usize::from(delete % 8),
                    (0..insert % 8).map(|v| json!(v)),
                );
            }
            Op::Start(s) => {
                start = usize::from(s % 32);
                binding.update_start("id", start);
                binding.refresh("id");
            }
            Op::Count(c) => {
                window = count(c);
                binding.update_nb("id", window);
                binding.refresh("id");
            }
        }

        let len = store.len();
        let first = start.min(len);
        let end = match window {
            Count::Bounded(n) => (start + n).min(len),
            Count::Unbounded => len,
        };
        assert_eq!(list.child_count(), end.saturating_sub(first));
    }
});
