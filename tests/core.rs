//! Core lifecycle tests: mount, update, unmount, events, bindings.
//!
//! Each test runs on its own thread, so the per-thread document and
//! registries start clean.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use serde_json::{json, Value};

use tagtree::dom::{document, Event, Node};
use tagtree::{
    el, expr, live_instances, mount, register, text, EventExpr, Expr, Template, UnmountToken,
};

/// Insert a fresh element into the document, the way a host page would.
fn inject(tag: &str, id: Option<&str>) -> Node {
    let _ = env_logger::builder().is_test(true).try_init();
    let node = Node::element(tag);
    if let Some(id) = id {
        node.set_attribute("id", id);
    }
    document().append_child(&node);
    node
}

fn register_test_tag() {
    register(Template::new(
        "test",
        vec![el("p")
            .child(text("val: "))
            .child(expr(Expr::path("opts.val")))
            .into()],
    ));
}

#[test]
fn mount_and_unmount() {
    register_test_tag();
    inject("test", Some("test-tag"));
    inject("div", Some("foo"));
    let bar = inject("div", Some("bar"));

    let tag = mount("test", "test", json!({ "val": 10 }))
        .into_iter()
        .next()
        .unwrap();
    let tag2 = mount("#foo", "test", json!({ "val": 30 }))
        .into_iter()
        .next()
        .unwrap();
    let tag3 = mount(bar.clone(), "test", json!({ "val": 50 }))
        .into_iter()
        .next()
        .unwrap();

    assert_eq!(tag.root().unwrap().inner_html(), "<p>val: 10</p>");
    assert_eq!(tag2.root().unwrap().inner_html(), "<p>val: 30</p>");
    assert_eq!(tag3.root().unwrap().inner_html(), "<p>val: 50</p>");

    tag.unmount(false);
    tag2.unmount(false);
    tag3.unmount(true);

    assert!(!tag3.is_mounted());
    assert!(document().by_tag("test").is_empty());
    assert!(document().by_id("foo").is_none());
    // keep_root leaves the node itself in place
    assert!(document().by_id("bar").is_some());
    assert!(bar.children().is_empty());
}

#[test]
fn live_instance_registry() {
    register_test_tag();
    inject("test", None);
    inject("test", None);

    let tags = mount("test", "test", Value::Null);
    assert_eq!(tags.len(), 2);
    let live = live_instances();
    assert_eq!(live.len(), 2);
    for (a, b) in live.iter().zip(tags.iter()) {
        assert!(Rc::ptr_eq(a, b));
    }

    tags[0].unmount(false);
    assert_eq!(live_instances().len(), 1);
    tags[1].unmount(false);
    assert!(live_instances().is_empty());
}

#[test]
fn update_merges_data_and_patches() {
    register(Template::new(
        "message-box",
        vec![el("p").child(expr(Expr::path("message"))).into()],
    ));
    let root = inject("message-box", None);
    let tag = mount(root, "message-box", Value::Null)
        .into_iter()
        .next()
        .unwrap();

    assert_eq!(tag.root().unwrap().text_content(), "");
    tag.update(Some(json!({ "message": "hello" })));
    assert_eq!(tag.root().unwrap().text_content(), "hello");

    // no change, no patch needed, still correct
    tag.update(None);
    assert_eq!(tag.root().unwrap().text_content(), "hello");
}

#[test]
fn children_mount_before_parent_mount_event() {
    let log: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));

    let child_log = log.clone();
    register(Template::new("inner-tag", vec![el("span").into()]).init(move |tag| {
        let log = child_log.clone();
        tag.on("before-mount", {
            let log = log.clone();
            move |_| log.borrow_mut().push("inner before-mount".into())
        });
        tag.on("mount", move |t| {
            // by now the whole subtree is attached
            assert!(t.root().unwrap().is_connected());
            log.borrow_mut().push("inner mount".into());
        });
    }));

    let parent_log = log.clone();
    register(
        Template::new("outer-tag", vec![el("inner-tag").into()]).init(move |tag| {
            let log = parent_log.clone();
            tag.on("before-mount", {
                let log = log.clone();
                move |_| log.borrow_mut().push("outer before-mount".into())
            });
            tag.on("mount", move |t| {
                assert!(t.root().unwrap().is_connected());
                log.borrow_mut().push("outer mount".into());
            });
        }),
    );

    let root = inject("outer-tag", None);
    let tag = mount(root, "outer-tag", Value::Null)
        .into_iter()
        .next()
        .unwrap();

    assert_eq!(
        *log.borrow(),
        vec![
            "outer before-mount",
            "inner before-mount",
            "inner mount",
            "outer mount",
        ]
    );
    assert!(tag.is_mounted());
    assert!(tag.tags_one("inner-tag").unwrap().is_mounted());
}

#[test]
fn expressions_evaluate_exactly_once_per_update() {
    let count = Rc::new(Cell::new(0u32));
    let count_expr = count.clone();
    register(Template::new(
        "eval-count",
        vec![el("p")
            .child(expr(Expr::new(move |_| {
                count_expr.set(count_expr.get() + 1);
                Ok(json!(count_expr.get()))
            })))
            .into()],
    ));

    let root = inject("eval-count", None);
    let tag = mount(root, "eval-count", Value::Null)
        .into_iter()
        .next()
        .unwrap();
    assert_eq!(count.get(), 1);

    tag.update(None);
    assert_eq!(count.get(), 2);
    tag.update(None);
    assert_eq!(count.get(), 3);
}

#[test]
fn should_update_vetoes_the_whole_pass() {
    register(Template::new(
        "guarded",
        vec![el("p").child(expr(Expr::path("message"))).into()],
    ));
    let root = inject("guarded", None);
    let tag = mount(root, "guarded", Value::Null)
        .into_iter()
        .next()
        .unwrap();
    tag.update(Some(json!({ "message": "first" })));

    let updates = Rc::new(Cell::new(0u32));
    let updates_l = updates.clone();
    tag.on("update", move |_| updates_l.set(updates_l.get() + 1));

    tag.set_should_update(|_, _| false);
    tag.update(Some(json!({ "message": "second" })));

    // no events, no patch
    assert_eq!(updates.get(), 0);
    assert_eq!(tag.root().unwrap().text_content(), "first");

    tag.set_should_update(|_, _| true);
    tag.update(None);
    assert_eq!(updates.get(), 1);
    assert_eq!(tag.root().unwrap().text_content(), "second");
}

#[test]
fn update_listener_can_prevent_the_pass() {
    register(Template::new(
        "vetoed",
        vec![el("p").child(expr(Expr::path("message"))).into()],
    ));
    let root = inject("vetoed", None);
    let tag = mount(root, "vetoed", Value::Null)
        .into_iter()
        .next()
        .unwrap();
    tag.update(Some(json!({ "message": "first" })));

    let updated_fired = Rc::new(Cell::new(false));
    let updated_l = updated_fired.clone();
    tag.on("updated", move |_| updated_l.set(true));

    let block = Rc::new(Cell::new(true));
    let block_l = block.clone();
    tag.on("update", move |t| {
        if block_l.get() {
            t.prevent_update();
        }
    });

    tag.update(Some(json!({ "message": "second" })));
    assert_eq!(tag.root().unwrap().text_content(), "first");
    assert!(!updated_fired.get());

    block.set(false);
    tag.update(None);
    assert_eq!(tag.root().unwrap().text_content(), "second");
    assert!(updated_fired.get());
}

#[test]
fn deferred_unmount_waits_for_the_token() {
    register_test_tag();
    let root = inject("test", None);
    let tag = mount(root, "test", json!({ "val": 1 }))
        .into_iter()
        .next()
        .unwrap();

    let token: Rc<RefCell<Option<UnmountToken>>> = Rc::new(RefCell::new(None));
    let token_l = token.clone();
    tag.on("before-unmount", move |t| {
        *token_l.borrow_mut() = Some(t.hold_unmount());
    });

    tag.unmount(false);
    assert!(tag.is_mounted());
    assert!(!document().by_tag("test").is_empty());

    token.borrow().as_ref().unwrap().release();
    assert!(!tag.is_mounted());
    assert!(document().by_tag("test").is_empty());
}

#[test]
fn repeated_unmount_during_a_hold_is_a_noop() {
    register_test_tag();
    let root = inject("test", None);
    let tag = mount(root, "test", json!({ "val": 1 }))
        .into_iter()
        .next()
        .unwrap();

    let fired = Rc::new(Cell::new(0u32));
    let token: Rc<RefCell<Option<UnmountToken>>> = Rc::new(RefCell::new(None));
    let fired_l = fired.clone();
    let token_l = token.clone();
    tag.on("before-unmount", move |t| {
        fired_l.set(fired_l.get() + 1);
        *token_l.borrow_mut() = Some(t.hold_unmount());
    });

    tag.unmount(false);
    // a second call while the hold is pending neither re-fires the event
    // nor rewrites the pending keep_root
    tag.unmount(true);
    assert_eq!(fired.get(), 1);
    assert!(tag.is_mounted());

    token.borrow().as_ref().unwrap().release();
    assert_eq!(fired.get(), 1);
    assert!(!tag.is_mounted());
    assert!(document().by_tag("test").is_empty());
}

#[test]
fn lifecycle_misuse_is_a_noop() {
    register_test_tag();
    let root = inject("test", None);
    let tag = mount(root, "test", json!({ "val": 1 }))
        .into_iter()
        .next()
        .unwrap();

    tag.unmount(false);
    assert!(!tag.is_mounted());
    // double unmount and late update are tolerated
    tag.unmount(false);
    tag.update(Some(json!({ "val": 2 })));
    assert!(!tag.is_mounted());
}

#[test]
fn event_handlers_auto_update_unless_prevented() {
    register(Template::new(
        "clicker",
        vec![
            el("button")
                .on(
                    "click",
                    EventExpr::handler(|tag, _| {
                        let n = tag.get("count").as_i64().unwrap_or(0);
                        tag.set("count", json!(n + 1));
                    }),
                )
                .into(),
            el("p").child(expr(Expr::path("count"))).into(),
        ],
    ));
    let root = inject("clicker", None);
    let tag = mount(root, "clicker", Value::Null)
        .into_iter()
        .next()
        .unwrap();

    let button = tag.root().unwrap().by_tag("button").remove(0);
    button.dispatch(&Event::new("click"));
    assert_eq!(tag.root().unwrap().text_content(), "1");
    button.dispatch(&Event::new("click"));
    assert_eq!(tag.root().unwrap().text_content(), "2");
}

#[test]
fn prevented_handler_skips_the_refresh() {
    register(Template::new(
        "quiet-clicker",
        vec![
            el("button")
                .on(
                    "click",
                    EventExpr::handler(|tag, _| {
                        tag.set("count", json!(99));
                        tag.prevent_update();
                    }),
                )
                .into(),
            el("p").child(expr(Expr::path("count"))).into(),
        ],
    ));
    let root = inject("quiet-clicker", None);
    let tag = mount(root, "quiet-clicker", Value::Null)
        .into_iter()
        .next()
        .unwrap();

    let button = tag.root().unwrap().by_tag("button").remove(0);
    button.dispatch(&Event::new("click"));
    // state changed but the pass was vetoed
    assert_eq!(tag.get("count"), json!(99));
    assert_eq!(tag.root().unwrap().text_content(), "");

    tag.update(None);
    assert_eq!(tag.root().unwrap().text_content(), "99");
}

#[test]
fn runtime_event_listener_switch_does_not_accumulate() {
    let a_hits = Rc::new(Cell::new(0u32));
    let b_hits = Rc::new(Cell::new(0u32));

    let a: tagtree::template::EventHandler = {
        let hits = a_hits.clone();
        Rc::new(move |_, _| hits.set(hits.get() + 1))
    };
    let b: tagtree::template::EventHandler = {
        let hits = b_hits.clone();
        Rc::new(move |_, _| hits.set(hits.get() + 1))
    };

    register(Template::new(
        "switcher",
        vec![el("button")
            .on(
                "click",
                EventExpr::new(move |scope| {
                    if scope.get("which") == json!("a") {
                        Some(a.clone())
                    } else {
                        Some(b.clone())
                    }
                }),
            )
            .into()],
    ));
    let root = inject("switcher", None);
    let tag = mount(root, "switcher", Value::Null)
        .into_iter()
        .next()
        .unwrap();
    tag.update(Some(json!({ "which": "a" })));

    let button = tag.root().unwrap().by_tag("button").remove(0);
    button.dispatch(&Event::new("click"));
    assert_eq!((a_hits.get(), b_hits.get()), (1, 0));

    tag.set("which", json!("b"));
    tag.update(None);
    button.dispatch(&Event::new("click"));
    // the old listener is gone, only the new one fires
    assert_eq!((a_hits.get(), b_hits.get()), (1, 1));
}

#[test]
fn input_value_writes_preserve_the_cursor() {
    register(Template::new(
        "text-field",
        vec![el("input").value_expr(Expr::path("text")).into()],
    ));
    let root = inject("text-field", None);
    let tag = mount(root, "text-field", Value::Null)
        .into_iter()
        .next()
        .unwrap();
    tag.update(Some(json!({ "text": "hello" })));

    let input = tag.root().unwrap().by_tag("input").remove(0);
    assert_eq!(input.value(), "hello");
    input.set_selection(2, 2);

    // unchanged value: no DOM write, cursor untouched
    tag.update(None);
    assert_eq!(input.selection(), (2, 2));

    // changed value: written, cursor dropped to the end
    tag.update(Some(json!({ "text": "world!" })));
    assert_eq!(input.value(), "world!");
    assert_eq!(input.selection(), (6, 6));
}

#[test]
fn named_refs_collapse_between_one_and_many() {
    register(Template::new(
        "named-children",
        vec![
            el("p").named("row").into(),
            el("p").named("row").into(),
            el("span").named("label").into(),
        ],
    ));
    let root = inject("named-children", None);
    let tag = mount(root, "named-children", Value::Null)
        .into_iter()
        .next()
        .unwrap();

    assert_eq!(tag.ref_all("row").len(), 2);
    let label = tag.ref_one("label").unwrap();
    assert_eq!(label.as_element().unwrap().tag_name().unwrap(), "span");
}

#[test]
fn eval_errors_reach_the_hook_and_the_pass_continues() {
    let errors: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));
    let errors_hook = errors.clone();
    tagtree::set_error_hook(move |e| errors_hook.borrow_mut().push(e.message.clone()));

    register(Template::new(
        "half-broken",
        vec![
            el("p")
                .child(expr(Expr::new(|_| {
                    Err(tagtree::EvalError::new("bad expression"))
                })))
                .into(),
            el("p").child(expr(Expr::path("ok"))).into(),
        ],
    ));
    let root = inject("half-broken", None);
    let tag = mount(root, "half-broken", json!(null))
        .into_iter()
        .next()
        .unwrap();
    tag.update(Some(json!({ "ok": "still here" })));

    assert!(errors.borrow().iter().all(|m| m == "bad expression"));
    assert!(errors.borrow().len() >= 2); // mount pass + update pass
    assert_eq!(tag.root().unwrap().text_content(), "still here");
    tagtree::clear_error_hook();
}

#[test]
fn wildcard_mounts_every_resolvable_tag() {
    register_test_tag();
    let container = inject("div", Some("box"));
    let plain = Node::element("test");
    container.append_child(&plain);
    let typed = Node::element("div");
    typed.set_attribute("data-is", "test");
    container.append_child(&typed);
    let unrelated = Node::element("section");
    container.append_child(&unrelated);

    let tags = mount("#box", "*", json!({ "val": 7 }));
    assert_eq!(tags.len(), 2);
    assert_eq!(tags[0].root().unwrap(), plain);
    assert_eq!(tags[1].root().unwrap(), typed);
    assert_eq!(typed.attribute("data-is").as_deref(), Some("test"));
}

#[test]
fn tag_names_are_case_insensitive() {
    register_test_tag();
    inject("test", None);
    let tags = mount("Test", "TEST", json!({ "val": 1 }));
    assert_eq!(tags.len(), 1);
    assert_eq!(tags[0].name(), "test");
}

#[test]
fn remounting_a_node_replaces_in_place() {
    register_test_tag();
    register(Template::new(
        "clock",
        vec![el("p").child(text("tick")).into()],
    ));

    let div = inject("div", None);
    let first = mount(div.clone(), "clock", Value::Null)
        .into_iter()
        .next()
        .unwrap();
    assert_eq!(div.attribute("data-is").as_deref(), Some("clock"));
    assert!(first.is_mounted());

    let second = mount(div.clone(), "test", json!({ "val": 3 }))
        .into_iter()
        .next()
        .unwrap();
    assert_eq!(div.attribute("data-is").as_deref(), Some("test"));
    assert!(!first.is_mounted());
    assert!(second.is_mounted());
    assert_eq!(live_instances().len(), 1);
    assert_eq!(div.inner_html(), "<p>val: 3</p>");
}

#[test]
fn root_attributes_become_camel_cased_opts() {
    register(Template::new(
        "configured",
        vec![el("p").child(expr(Expr::path("opts.maxValue"))).into()],
    ));
    let root = inject("configured", None);
    root.set_attribute("max-value", "42");

    let tag = mount(root, "configured", Value::Null)
        .into_iter()
        .next()
        .unwrap();
    assert_eq!(tag.opt("maxValue"), json!("42"));
    assert_eq!(tag.root().unwrap().text_content(), "42");

    // literal opts win over attribute defaults
    let root2 = inject("configured", None);
    root2.set_attribute("max-value", "42");
    let tag2 = mount(root2, "configured", json!({ "maxValue": "7" }))
        .into_iter()
        .next()
        .unwrap();
    assert_eq!(tag2.opt("maxValue"), json!("7"));
}

#[test]
fn derived_templates_share_the_body_and_override_pieces() {
    let base = Template::new(
        "badge",
        vec![el("b").child(expr(Expr::path("kind"))).into()],
    )
    .css("badge { color: grey }")
    .init(|tag| tag.set("kind", json!("plain")));

    register(base.clone());
    register(
        base.extend("super-badge")
            .css("super-badge { color: gold }")
            .init(|tag| tag.set("kind", json!("super"))),
    );

    let plain_root = inject("badge", None);
    let super_root = inject("super-badge", None);
    let plain = mount(plain_root, "badge", Value::Null)
        .into_iter()
        .next()
        .unwrap();
    let fancy = mount(super_root, "super-badge", Value::Null)
        .into_iter()
        .next()
        .unwrap();

    // same body, each factory's own initializer and css
    assert_eq!(plain.root().unwrap().inner_html(), "<b>plain</b>");
    assert_eq!(fancy.root().unwrap().inner_html(), "<b>super</b>");
    assert_eq!(fancy.name(), "super-badge");
    let sheet = tagtree::template::style::styles();
    assert!(sheet.contains("badge { color: grey }"));
    assert!(sheet.contains("super-badge { color: gold }"));
}

#[test]
fn css_is_injected_once_per_tag_name() {
    register(
        Template::new("styled", vec![el("p").child(text("s")).into()])
            .css("styled { color: red }"),
    );
    inject("styled", None);
    inject("styled", None);
    mount("styled", "styled", Value::Null);

    let sheet = tagtree::template::style::styles();
    assert_eq!(sheet.matches("styled { color: red }").count(), 1);
}

#[test]
fn unregistered_tags_mount_nothing() {
    inject("mystery", None);
    assert!(mount("mystery", "mystery", Value::Null).is_empty());
}

#[test]
fn greet_scenario() {
    register(Template::new(
        "greet",
        vec![el("p").child(expr(Expr::path("opts.val"))).into()],
    ));
    register(Template::new("greet-host", vec![el("greet").into()]));

    let root = inject("greet-host", None);
    let host = mount(root, "greet-host", Value::Null)
        .into_iter()
        .next()
        .unwrap();
    let greet = host.tags_one("greet").unwrap();
    assert!(greet.is_mounted());

    greet.unmount(false);
    assert!(!host.has_tag("greet"));
    assert!(host.root().unwrap().by_tag("greet").is_empty());
}
