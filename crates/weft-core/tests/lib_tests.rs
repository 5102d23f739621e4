use std::cell::{Cell, RefCell};
use std::rc::Rc;

use weft_testing::{CountdownDeadline, TestHarness, Unlimited};

use weft_core::context::{create_context, Context};
use weft_core::element::{Element, PropValue};
use weft_core::hooks::{Cleanup, Deps, Scope, Setter};
use weft_core::host::MemoryHost;
use weft_core::runtime::Runtime;
use weft_core::{children, deps};

#[test]
fn mount_builds_the_host_tree() {
    let mut harness = TestHarness::new();
    harness.render(
        Element::host("div").attr("id", "app").children(children![
            Element::host("h1").child("hello"),
            Element::host("p").child("world"),
        ]),
    );
    harness.settle();

    let div = harness.find_by_tag("div").expect("div mounted");
    let host = harness.host();
    assert_eq!(
        host.attr(div, "id").and_then(PropValue::as_str),
        Some("app")
    );
    assert_eq!(host.text_content(div), "helloworld");
    assert_eq!(host.children_of(harness.container()), vec![div]);
}

fn keyed_list() -> Element {
    Element::host("ul").children(children![
        Element::host("li").key(1).child("one"),
        Element::host("li").key(2).child("two"),
    ])
}

#[test]
fn identical_rerender_reuses_every_handle() {
    let mut harness = TestHarness::new();
    harness.render(keyed_list());
    harness.settle();
    let items_before = harness.find_all_by_tag("li");
    let nodes_before = harness.host().len();

    harness.render(keyed_list());
    harness.settle();

    assert_eq!(harness.find_all_by_tag("li"), items_before);
    assert_eq!(harness.host().len(), nodes_before);
}

#[test]
fn keyed_reordering_preserves_identity() {
    let mut harness = TestHarness::new();
    harness.render(Element::host("ul").children(children![
        Element::host("li").key(1).child("alpha"),
        Element::host("li").key(2).child("beta"),
    ]));
    harness.settle();
    let mut before = harness.find_all_by_tag("li");
    let nodes_before = harness.host().len();

    harness.render(Element::host("ul").children(children![
        Element::host("li").key(2).child("beta"),
        Element::host("li").key(1).child("alpha"),
    ]));
    harness.settle();

    let mut after = harness.find_all_by_tag("li");
    before.sort_unstable();
    after.sort_unstable();
    assert_eq!(after, before, "reordered keyed fibers must keep their nodes");
    assert_eq!(harness.host().len(), nodes_before);
}

#[test]
fn type_change_replaces_the_node() {
    let mut harness = TestHarness::new();
    harness.render(Element::host("section").child(Element::host("div")));
    harness.settle();
    let div = harness.find_by_tag("div").expect("div mounted");

    harness.render(Element::host("section").child(Element::host("span")));
    harness.settle();

    assert!(harness.find_by_tag("div").is_none());
    assert!(!harness.host().contains(div));
    let section = harness.find_by_tag("section").expect("section kept");
    let span = harness.find_by_tag("span").expect("span mounted");
    assert_eq!(harness.host().children_of(section), vec![span]);
}

thread_local! {
    static SWAP_ORDER: Cell<bool> = Cell::new(false);
}

fn swapping_hooks(scope: &mut Scope<'_>) -> Element {
    if SWAP_ORDER.with(|swap| swap.get()) {
        scope.use_effect(Deps::always(), || None);
        let _ = scope.use_state(|| 0_i32);
    } else {
        let _ = scope.use_state(|| 0_i32);
        scope.use_effect(Deps::always(), || None);
    }
    Element::host("div")
}

#[test]
#[should_panic(expected = "hook order changed")]
fn swapping_hook_order_between_renders_panics() {
    let mut harness = TestHarness::new();
    harness.render(Element::component(swapping_hooks));
    harness.settle();

    SWAP_ORDER.with(|swap| swap.set(true));
    harness.runtime().handle().request_render();
    harness.settle();
}

thread_local! {
    static EFFECT_LOG: RefCell<Vec<String>> = RefCell::new(Vec::new());
    static GATED_SETTER: RefCell<Option<Setter<i64>>> = RefCell::new(None);
}

fn gated_effects(scope: &mut Scope<'_>) -> Element {
    let (count, setter) = scope.use_state(|| 0_i64);
    GATED_SETTER.with(|slot| *slot.borrow_mut() = Some(setter));
    scope.use_effect(deps![], || {
        EFFECT_LOG.with(|log| log.borrow_mut().push("mount".to_string()));
        None
    });
    scope.use_effect(deps![count], move || {
        EFFECT_LOG.with(|log| log.borrow_mut().push(format!("effect {count}")));
        Some(Box::new(move || {
            EFFECT_LOG.with(|log| log.borrow_mut().push(format!("cleanup {count}")));
        }) as Cleanup)
    });
    Element::host("div")
}

#[test]
fn effect_dependencies_gate_reruns() {
    let mut harness = TestHarness::new();
    harness.render(Element::component(gated_effects));
    harness.settle();
    EFFECT_LOG.with(|log| {
        assert_eq!(*log.borrow(), vec!["mount".to_string(), "effect 0".to_string()]);
    });

    // Re-render with unchanged state: neither effect fires again.
    harness.runtime().handle().request_render();
    harness.settle();
    EFFECT_LOG.with(|log| assert_eq!(log.borrow().len(), 2));

    GATED_SETTER.with(|slot| slot.borrow().as_ref().unwrap().set(5));
    harness.settle();
    EFFECT_LOG.with(|log| {
        assert_eq!(
            &log.borrow()[2..],
            &["cleanup 0".to_string(), "effect 5".to_string()]
        );
    });
}

thread_local! {
    static BATCH_SETTER: RefCell<Option<Setter<i64>>> = RefCell::new(None);
}

fn batching_counter(scope: &mut Scope<'_>) -> Element {
    let (count, setter) = scope.use_state(|| 1_i64);
    BATCH_SETTER.with(|slot| *slot.borrow_mut() = Some(setter));
    Element::host("p").child(count)
}

#[test]
fn queued_updates_fold_left_to_right() {
    let mut harness = TestHarness::new();
    harness.render(Element::component(batching_counter));
    harness.settle();
    let p = harness.find_by_tag("p").expect("p mounted");
    assert_eq!(harness.host().text_content(p), "1");

    BATCH_SETTER.with(|slot| {
        let setter = slot.borrow();
        let setter = setter.as_ref().unwrap();
        setter.update(|n| n + 1);
        setter.update(|n| n * 2);
    });
    harness.settle();
    assert_eq!(harness.host().text_content(p), "4");
}

thread_local! {
    static MEMO_CALLS: Cell<usize> = Cell::new(0);
    static CALLBACK_IDS: RefCell<Vec<usize>> = RefCell::new(Vec::new());
    static RENDER_TALLY: Cell<usize> = Cell::new(0);
    static MEMO_SETTER: RefCell<Option<Setter<i64>>> = RefCell::new(None);
}

fn memoizing(scope: &mut Scope<'_>) -> Element {
    let (_, setter) = scope.use_state(|| 0_i64);
    MEMO_SETTER.with(|slot| *slot.borrow_mut() = Some(setter));

    let label = scope.use_memo(deps![], || {
        MEMO_CALLS.with(|calls| calls.set(calls.get() + 1));
        "stable".to_string()
    });
    let handler = scope.use_callback(deps![], |_| {});
    CALLBACK_IDS.with(|ids| {
        ids.borrow_mut()
            .push(Rc::as_ptr(&handler) as *const () as usize)
    });

    let renders = scope.use_ref(|| 0_usize);
    *renders.borrow_mut() += 1;
    RENDER_TALLY.with(|tally| tally.set(*renders.borrow()));

    Element::host("div").child(label.as_str())
}

#[test]
fn memo_callback_and_ref_survive_rerenders() {
    let mut harness = TestHarness::new();
    harness.render(Element::component(memoizing));
    harness.settle();
    MEMO_SETTER.with(|slot| slot.borrow().as_ref().unwrap().set(1));
    harness.settle();

    assert_eq!(MEMO_CALLS.with(|calls| calls.get()), 1);
    CALLBACK_IDS.with(|ids| {
        let ids = ids.borrow();
        assert_eq!(ids.len(), 2);
        assert_eq!(ids[0], ids[1], "callback identity must be stable");
    });
    assert_eq!(RENDER_TALLY.with(|tally| tally.get()), 2);
}

thread_local! {
    static THEME: Context<String> = create_context("light".to_string());
    static THEME_SETTER: RefCell<Option<Setter<String>>> = RefCell::new(None);
}

fn themed_label(scope: &mut Scope<'_>) -> Element {
    let theme = THEME.with(|theme| scope.use_context(theme));
    Element::host("em").child(theme)
}

fn theme_app(scope: &mut Scope<'_>) -> Element {
    let (theme, setter) = scope.use_state(|| "dark".to_string());
    THEME_SETTER.with(|slot| *slot.borrow_mut() = Some(setter));
    THEME.with(|context| {
        context.provider(
            theme,
            children![Element::host("div").child(Element::component(themed_label))],
        )
    })
}

#[test]
fn provider_value_reaches_and_follows_subscribers() {
    let mut harness = TestHarness::new();
    harness.render(Element::component(theme_app));
    harness.settle();
    let em = harness.find_by_tag("em").expect("label mounted");
    assert_eq!(harness.host().text_content(em), "dark");

    THEME_SETTER.with(|slot| {
        slot.borrow().as_ref().unwrap().set("light".to_string());
    });
    harness.settle();
    let em = harness.find_by_tag("em").expect("label still mounted");
    assert_eq!(harness.host().text_content(em), "light");
}

fn orphan_consumer(scope: &mut Scope<'_>) -> Element {
    let theme = THEME.with(|theme| scope.use_context(theme));
    Element::host("i").child(theme)
}

#[test]
fn consumer_without_provider_reads_the_cell() {
    let mut harness = TestHarness::new();
    harness.render(Element::component(orphan_consumer));
    harness.settle();
    let i = harness.find_by_tag("i").expect("consumer mounted");
    // The cell carries whatever was last pushed; with no provider ever
    // mounted in this harness it is still the default.
    assert!(!harness.host().text_content(i).is_empty());
}

#[test]
fn work_loop_yields_and_resumes_without_losing_progress() {
    let mut harness = TestHarness::new();
    harness.render(Element::host("section").children(children![
        Element::host("ul").children(children![
            Element::host("li").child("a"),
            Element::host("li").child("b"),
            Element::host("li").child("c"),
        ]),
        Element::host("p").child("done"),
    ]));

    let mut invocations = 0;
    while harness.runtime().has_work() {
        harness.pump(&CountdownDeadline::new(1)).unwrap();
        invocations += 1;
        assert!(invocations < 100, "work loop failed to finish");
    }

    assert!(invocations > 1, "deadline never interrupted the walk");
    let section = harness.find_by_tag("section").expect("tree committed");
    assert_eq!(harness.host().text_content(section), "abcdone");
}

#[test]
fn interrupted_pass_leaves_current_tree_authoritative() {
    let mut host = MemoryHost::new();
    let container = host.create_container();
    let mut runtime = Runtime::new(host);

    runtime.render(
        Element::host("section").children(children![
            Element::host("li").child("one"),
            Element::host("li").child("two"),
            Element::host("li").child("three"),
        ]),
        container,
    );
    while runtime.has_work() {
        runtime.work_loop(&Unlimited).unwrap();
    }
    // root + section + 3 li + 3 text records
    assert_eq!(runtime.session.arena.len(), 8);

    runtime.render(
        Element::host("article").children(children![
            Element::host("h2").child("new"),
            Element::host("p").child("tree"),
        ]),
        container,
    );
    runtime.work_loop(&CountdownDeadline::new(1)).unwrap();
    assert!(
        runtime.session.next_unit.is_some(),
        "pass should be interrupted mid-walk"
    );
    let section = runtime.host().children_of(container);
    assert_eq!(runtime.host().tag(section[0]), Some("section"));

    // A third render abandons the in-flight pass entirely.
    runtime.render(Element::host("p").child("final"), container);
    while runtime.has_work() {
        runtime.work_loop(&Unlimited).unwrap();
    }

    let top = runtime.host().children_of(container);
    assert_eq!(runtime.host().tag(top[0]), Some("p"));
    assert_eq!(runtime.host().text_content(top[0]), "final");
    // Only the committed tree's records remain: root + p + text.
    assert_eq!(runtime.session.arena.len(), 3);
}

thread_local! {
    static UNMOUNT_LOG: RefCell<Vec<&'static str>> = RefCell::new(Vec::new());
    static SHOW_SETTER: RefCell<Option<Setter<bool>>> = RefCell::new(None);
}

fn effectful_child(scope: &mut Scope<'_>) -> Element {
    scope.use_effect(deps![], || {
        UNMOUNT_LOG.with(|log| log.borrow_mut().push("mounted"));
        Some(Box::new(|| {
            UNMOUNT_LOG.with(|log| log.borrow_mut().push("cleaned"));
        }) as Cleanup)
    });
    Element::host("span").child("child")
}

fn toggling_parent(scope: &mut Scope<'_>) -> Element {
    let (show, setter) = scope.use_state(|| true);
    SHOW_SETTER.with(|slot| *slot.borrow_mut() = Some(setter));
    let parent = Element::host("div");
    if show {
        parent.child(Element::component(effectful_child))
    } else {
        parent
    }
}

#[test]
fn deleting_a_subtree_runs_its_effect_cleanups() {
    let mut harness = TestHarness::new();
    harness.render(Element::component(toggling_parent));
    harness.settle();
    assert!(harness.find_by_tag("span").is_some());
    UNMOUNT_LOG.with(|log| assert_eq!(*log.borrow(), vec!["mounted"]));

    SHOW_SETTER.with(|slot| slot.borrow().as_ref().unwrap().set(false));
    harness.settle();

    assert!(harness.find_by_tag("span").is_none());
    UNMOUNT_LOG.with(|log| assert_eq!(*log.borrow(), vec!["mounted", "cleaned"]));
}

#[test]
fn update_diff_adds_changes_and_removes_attributes() {
    let mut harness = TestHarness::new();
    harness.render(
        Element::host("input")
            .attr("value", "old")
            .attr("disabled", true),
    );
    harness.settle();
    let input = harness.find_by_tag("input").unwrap();

    harness.render(
        Element::host("input")
            .attr("value", "new")
            .attr("placeholder", "type here"),
    );
    harness.settle();

    let host = harness.host();
    assert_eq!(
        host.attr(input, "value").and_then(PropValue::as_str),
        Some("new")
    );
    assert!(host.attr(input, "disabled").is_none());
    assert_eq!(
        host.attr(input, "placeholder").and_then(PropValue::as_str),
        Some("type here")
    );
}
