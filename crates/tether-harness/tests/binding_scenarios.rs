//! End-to-end binding scenarios.
//!
//! Each test builds a tree from `tether_harness::fixtures`, binds it to a
//! store with `DataBinding`, then drives the store or the tree and checks
//! both sides.

use serde_json::json;
use tether_core::{Event, Node};
use tether_harness::logging::init_test_tracing;
use tether_harness::{assert_markup, fixtures, stamps, texts};
use tether_runtime::{Count, DataBinding, ItemRenderer, LedgerKey};
use tether_store::Store;

fn bound(data: serde_json::Value, tree: &Node) -> DataBinding {
    init_test_tracing();
    let mut binding = DataBinding::new(Store::new(data));
    binding.apply(tree);
    binding
}

// =============================================================================
// Plain lists
// =============================================================================

#[test]
fn list_renders_every_item_in_order() {
    let list = fixtures::text_list();
    let _binding = bound(json!(["Olives", "is", "fun"]), &list);

    assert_eq!(texts(&list), ["Olives", "is", "fun"]);
    assert_eq!(stamps(&list), ["0", "1", "2"]);
    assert_markup!(
        list,
        r#"<ul data-model="foreach"><li data-model="bind:innerHTML" data-model_id="0">Olives</li><li data-model="bind:innerHTML" data-model_id="1">is</li><li data-model="bind:innerHTML" data-model_id="2">fun</li></ul>"#
    );
}

#[test]
fn item_updates_flow_into_the_rendered_node() {
    let list = fixtures::text_list();
    let binding = bound(json!(["Olives", "is", "fun"]), &list);

    binding.store().set("1", "are");
    assert_eq!(texts(&list), ["Olives", "are", "fun"]);
}

#[test]
fn splice_shifts_content_and_grows_the_tail() {
    let list = fixtures::text_list();
    let binding = bound(json!(["Olives", "is", "fun"]), &list);

    binding.store().splice(1, 1, [json!("are"), json!("really")]);
    assert_eq!(texts(&list), ["Olives", "are", "really", "fun"]);
    assert_eq!(stamps(&list), ["0", "1", "2", "3"]);
}

#[test]
fn pop_removes_the_last_item_and_its_observers() {
    let list = fixtures::text_list();
    let binding = bound(json!(["Olives", "is", "fun"]), &list);
    let renderer = binding.item_renderer("default").expect("default renderer");

    let before = binding.store().observer_count();
    assert!(!renderer.borrow().item_observers(2).is_empty());

    assert_eq!(binding.store().pop(), Some(json!("fun")));
    assert_eq!(texts(&list), ["Olives", "is"]);
    assert!(renderer.borrow().item_observers(2).is_empty());
    assert_eq!(binding.store().observer_count(), before - 1);
}

#[test]
fn rendering_twice_changes_nothing() {
    let list = fixtures::text_list();
    let binding = bound(json!(["a", "b", "c"]), &list);
    let markup = list.to_markup();

    assert!(binding.refresh("default"));
    let renderer = binding.item_renderer("default").expect("default renderer");
    assert!(renderer.borrow().last_report().is_empty());
    assert_eq!(list.to_markup(), markup);
}

#[test]
fn emptying_the_store_empties_the_list() {
    let list = fixtures::text_list();
    let binding = bound(json!(["a", "b"]), &list);

    binding.store().reset(json!([]));
    assert_eq!(list.child_count(), 0);

    binding.store().push("c");
    assert_eq!(texts(&list), ["c"]);
}

// =============================================================================
// Windows
// =============================================================================

#[test]
fn bounded_window_shows_a_slice() {
    init_test_tracing();
    let store = Store::new(json!(["a", "b", "c", "d", "e"]));
    let mut binding = DataBinding::new(store.clone());
    let list = fixtures::plain_list();

    assert!(binding.foreach(&list, "id", 1, Count::Bounded(3)));
    assert_eq!(texts(&list), ["b", "c", "d"]);
    assert_eq!(stamps(&list), ["1", "2", "3"]);

    store.push("f");
    assert_eq!(texts(&list), ["b", "c", "d"]);
}

#[test]
fn short_collection_fills_the_window_as_it_grows() {
    init_test_tracing();
    let store = Store::new(json!(["a", "b"]));
    let mut binding = DataBinding::new(store.clone());
    let list = fixtures::plain_list();
    binding.foreach(&list, "id", 1, Count::Bounded(3));
    assert_eq!(texts(&list), ["b"]);

    store.push("c");
    store.push("d");
    store.push("e");
    assert_eq!(texts(&list), ["b", "c", "d"]);
}

#[test]
fn moving_the_window_reuses_overlapping_items() {
    init_test_tracing();
    let store = Store::new(json!(["a", "b", "c", "d", "e"]));
    let mut binding = DataBinding::new(store);
    let list = fixtures::plain_list();
    binding.foreach(&list, "id", 0, Count::Bounded(3));
    let kept = list.element_children()[2].clone();

    assert!(binding.update_start("id", 2));
    assert!(binding.refresh("id"));

    assert_eq!(texts(&list), ["c", "d", "e"]);
    assert!(list.element_children()[0].ptr_eq(&kept));
    let renderer = binding.item_renderer("id").expect("renderer");
    let report = renderer.borrow().last_report().clone();
    assert_eq!(report.added, [3, 4]);
    assert_eq!(report.removed, [1, 0]);
}

#[test]
fn several_renderers_share_one_store() {
    init_test_tracing();
    let store = Store::new(json!(["a", "b", "c", "d"]));
    let mut binding = DataBinding::new(store.clone());
    let head = fixtures::plain_list();
    let tail = fixtures::plain_list();

    binding.foreach(&head, "head", 0, Count::Bounded(2));
    binding.foreach(&tail, "tail", 2, Count::Unbounded);
    assert_eq!(binding.renderer_ids(), ["head", "tail"]);
    assert_eq!(texts(&head), ["a", "b"]);
    assert_eq!(texts(&tail), ["c", "d"]);

    store.set("0", "A");
    store.push("e");
    assert_eq!(texts(&head), ["A", "b"]);
    assert_eq!(texts(&tail), ["c", "d", "e"]);
}

#[test]
fn deleting_the_head_trims_the_tail() {
    init_test_tracing();
    let store = Store::new(json!([0, 1, 2, 3, 4, 5]));
    let mut binding = DataBinding::new(store.clone());
    let list = fixtures::plain_list();
    binding.foreach(&list, "id", 0, Count::Unbounded);
    let renderer = binding.item_renderer("id").expect("renderer");

    store.del("0");
    assert_eq!(renderer.borrow().last_report().removed, [5]);
    assert_eq!(list.child_count(), 5);
    assert_eq!(texts(&list), ["1", "2", "3", "4", "5"]);

    store.splice(0, 3, Vec::new());
    assert_eq!(renderer.borrow().last_report().removed, [4, 3, 2]);
    assert_eq!(texts(&list), ["4", "5"]);
}

#[test]
fn custom_renderer_can_be_installed() {
    init_test_tracing();
    let store = Store::new(json!(["x", "y"]));
    let mut binding = DataBinding::new(store.clone());
    let list = fixtures::plain_list();
    let applier = fixtures::RecordingApplier::new();

    let mut renderer =
        ItemRenderer::with_root(store.clone(), std::rc::Rc::new(applier.clone()), &list);
    renderer.set_nb(Count::Unbounded);
    renderer.render();
    binding.set_item_renderer("custom", renderer);
    assert_eq!(applier.applied(), [0, 1]);
    assert_eq!(texts(&list), ["0", "1"]);

    store.push("z");
    assert_eq!(applier.applied(), [0, 1, 2]);
}

// =============================================================================
// Several collections in one tree
// =============================================================================

/// A `div` holding two lists marked with `first` and `second`.
fn two_lists(first: &str, second: &str) -> (Node, Node, Node) {
    let (a, b) = (fixtures::marked_list(first), fixtures::marked_list(second));
    let page = Node::element("div").with_child(a.clone()).with_child(b.clone());
    (page, a, b)
}

#[test]
fn two_unnamed_lists_stay_populated() {
    let (page, a, b) = two_lists("foreach", "foreach");
    let binding = bound(json!(["Olives", "is", "fun"]), &page);
    assert_eq!(binding.renderer_ids(), ["default", "default#1"]);
    assert_eq!(texts(&a), ["Olives", "is", "fun"]);
    assert_eq!(texts(&b), ["Olives", "is", "fun"]);

    binding.store().push("!");
    assert_eq!(texts(&a), ["Olives", "is", "fun", "!"]);
    assert_eq!(texts(&b), ["Olives", "is", "fun", "!"]);

    binding.store().pop();
    binding.store().pop();
    assert_eq!(texts(&a), ["Olives", "is"]);
    assert_eq!(texts(&b), ["Olives", "is"]);

    binding.store().splice(1, 1, [json!("are"), json!("really")]);
    assert_eq!(texts(&a), ["Olives", "are", "really"]);
    assert_eq!(texts(&b), ["Olives", "are", "really"]);
    assert_eq!(stamps(&a), ["0", "1", "2"]);
    assert_eq!(stamps(&b), ["0", "1", "2"]);
}

#[test]
fn unnamed_and_named_lists_stay_populated() {
    let (page, a, b) = two_lists("foreach", "foreach:todos");
    let binding = bound(json!(["a", "b"]), &page);
    assert_eq!(binding.renderer_ids(), ["default", "todos"]);

    binding.store().push("c");
    binding.store().splice(0, 1, Vec::new());
    assert_eq!(texts(&a), ["b", "c"]);
    assert_eq!(texts(&b), ["b", "c"]);

    binding.store().pop();
    assert_eq!(texts(&a), ["b"]);
    assert_eq!(texts(&b), ["b"]);
}

#[test]
fn named_windows_split_one_collection() {
    let (page, head, tail) = two_lists("foreach:head,0,2", "foreach:tail,2");
    let binding = bound(json!(["a", "b", "c", "d"]), &page);
    assert_eq!(texts(&head), ["a", "b"]);
    assert_eq!(texts(&tail), ["c", "d"]);

    binding.store().splice(1, 0, [json!("x")]);
    assert_eq!(texts(&head), ["a", "x"]);
    assert_eq!(texts(&tail), ["b", "c", "d"]);

    binding.store().pop();
    binding.store().pop();
    binding.store().pop();
    assert_eq!(texts(&head), ["a", "x"]);
    assert!(texts(&tail).is_empty());

    assert!(binding.update_nb("tail", Count::Bounded(1)));
    binding.store().push("y");
    binding.store().push("z");
    assert_eq!(texts(&tail), ["y"]);
}

#[test]
fn applying_the_tree_again_keeps_both_lists() {
    let (page, a, b) = two_lists("foreach", "foreach");
    let mut binding = bound(json!(["a"]), &page);
    binding.apply(&page);
    assert_eq!(binding.renderer_ids(), ["default", "default#1"]);

    binding.store().push("b");
    assert_eq!(texts(&a), ["a", "b"]);
    assert_eq!(texts(&b), ["a", "b"]);
}

#[test]
fn switching_stores_rerenders_every_list() {
    let (page, a, b) = two_lists("foreach", "foreach:todos,1");
    let mut binding = bound(json!(["a", "b"]), &page);
    assert_eq!(texts(&b), ["b"]);

    let next = Store::new(json!(["x", "y", "z"]));
    binding.set_store(next.clone());
    assert_eq!(texts(&a), ["x", "y", "z"]);
    assert_eq!(texts(&b), ["y", "z"]);

    next.pop();
    assert_eq!(texts(&a), ["x", "y"]);
    assert_eq!(texts(&b), ["y"]);
}

// =============================================================================
// Two-way bindings
// =============================================================================

#[test]
fn checkbox_writes_back_into_its_item() {
    let list = fixtures::checklist();
    let binding = bound(
        json!([
            {"title": "milk", "done": false},
            {"title": "bread", "done": true},
        ]),
        &list,
    );
    let boxes = list.elements_by_tag("input");
    assert_eq!(boxes.len(), 2);
    assert_eq!(boxes[0].property("checked"), Some(json!(false)));
    assert_eq!(boxes[1].property("checked"), Some(json!(true)));

    boxes[0].set_property("checked", true);
    boxes[0].dispatch(&Event::new("change"));
    assert_eq!(
        binding.store().get("0"),
        Some(json!({"title": "milk", "done": true}))
    );

    binding.store().update("1", &["done"], false);
    assert_eq!(boxes[1].property("checked"), Some(json!(false)));
}

#[test]
fn removed_item_stops_writing_back() {
    let list = fixtures::checklist();
    let binding = bound(
        json!([
            {"title": "milk", "done": false},
            {"title": "bread", "done": false},
        ]),
        &list,
    );
    let last = list.elements_by_tag("input")[1].clone();
    assert_eq!(last.listener_count("change"), 1);

    binding.store().pop();
    assert_eq!(last.listener_count("change"), 0);

    last.set_property("checked", true);
    last.dispatch(&Event::new("change"));
    assert_eq!(binding.store().len(), 1);
    assert!(!binding.store().has("1"));
}

#[test]
fn nested_paths_follow_their_leaf() {
    let card = fixtures::contact_card();
    let binding = bound(
        json!({"contact": {"mail": "ada@example.org", "office": "B12"}}),
        &card,
    );
    assert_eq!(texts(&card), ["ada@example.org", "B12"]);

    binding.store().update("contact", &["mail"], "ada@example.com");
    assert_eq!(texts(&card), ["ada@example.com", "B12"]);

    binding.store().set("contact", json!({"mail": "grace@example.org"}));
    assert_eq!(texts(&card), ["grace@example.org", ""]);

    let key = LedgerKey::Path("contact.mail".to_owned());
    assert_eq!(binding.observers(&key).len(), 1);
}

#[test]
fn unbind_disconnects_direct_binds() {
    let card = fixtures::contact_card();
    let mut binding = bound(json!({"contact": {"mail": "a", "office": "b"}}), &card);

    let key = LedgerKey::Path("contact.office".to_owned());
    assert_eq!(binding.unbind(&key), 1);

    binding.store().set("contact", json!({"mail": "c", "office": "d"}));
    assert_eq!(texts(&card), ["c", "b"]);
}

// =============================================================================
// Registry
// =============================================================================

#[test]
fn registered_reactions_receive_extra_arguments() {
    init_test_tracing();
    let log = fixtures::ReactionLog::new();
    let mut binding = DataBinding::new(Store::new(json!({"theme": "dark"})));
    assert!(binding.add_binding("paint", log.reaction()));

    let node = Node::element("div").with_attr("data-model", "bind:paint,theme,strong,wide");
    assert_eq!(binding.apply(&node), 1);
    binding.store().set("theme", "light");

    let calls = log.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].0, json!("dark"));
    assert_eq!(calls[1].0, json!("light"));
    assert_eq!(calls[1].1, ["strong", "wide"]);
}

#[test]
fn registry_rejects_empty_names() {
    init_test_tracing();
    let binding = DataBinding::new(Store::default());
    let log = fixtures::ReactionLog::new();

    assert!(!binding.add_binding("", log.reaction()));
    assert!(!binding.has_binding(""));

    let all = binding.add_bindings([
        ("shout".to_owned(), tether_runtime::reaction(log.reaction())),
        (String::new(), tether_runtime::reaction(log.reaction())),
    ]);
    assert!(!all);
    assert!(binding.has_binding("shout"));
}

// =============================================================================
// Forms
// =============================================================================

#[test]
fn submitting_a_form_stores_every_named_control() {
    let form = fixtures::signup_form();
    let binding = bound(json!({}), &form);

    let proceed = form.dispatch(&Event::new("submit"));
    assert!(!proceed, "submission must be cancelled");

    let store = binding.store();
    assert_eq!(store.get("firstname"), Some(json!("Ada")));
    assert_eq!(store.get("lastname"), Some(json!("Lovelace")));
    assert_eq!(store.get("mail"), Some(json!("ada@example.org")));
    assert_eq!(store.get("message"), Some(json!("")));
}

#[test]
fn resubmitting_picks_up_edited_values() {
    let form = fixtures::signup_form();
    let binding = bound(json!({}), &form);
    let first = fixtures::first(&form, "input").expect("input");

    form.dispatch(&Event::new("submit"));
    first.set_property("value", "Grace");
    form.dispatch(&Event::new("submit"));
    assert_eq!(binding.store().get("firstname"), Some(json!("Grace")));
}
