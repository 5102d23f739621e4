use std::cell::RefCell;

use weft_core::{children, create_context, Context, Element, Event, PropValue, Scope};
use weft_testing::{TestHarness, Unlimited};

fn counter(scope: &mut Scope<'_>) -> Element {
    let (count, setter) = scope.use_state(|| 1_i64);
    let increment = move |_: &Event| setter.update(|n| n + 1);
    Element::host("div").children(children![
        Element::host("h1").children(children!["Count: ", count]),
        Element::host("button")
            .attr("label", "increment")
            .on("click", increment),
    ])
}

#[test]
fn static_content_settles() {
    let mut harness = TestHarness::new();
    harness.render(Element::host("main").children(children![
        Element::host("h1").child("Hello"),
        Element::host("p").child("World"),
    ]));

    let mut ticks = 0;
    while harness.runtime().has_work() {
        harness.pump(&Unlimited).unwrap();
        ticks += 1;
        assert!(ticks < 8, "static content should settle quickly");
    }
    assert!(!harness.runtime().has_work());

    let main = harness.find_by_tag("main").unwrap();
    assert_eq!(harness.host().text_content(main), "HelloWorld");
}

#[test]
fn clicking_increments_the_counter() {
    let mut harness = TestHarness::new();
    harness.render(Element::component(counter));
    harness.settle();

    let h1 = harness.find_by_tag("h1").unwrap();
    assert_eq!(harness.host().text_content(h1), "Count: 1");

    let button = harness.find_by_tag("button").unwrap();
    assert!(harness.dispatch(button, &Event::new("click")));
    harness.settle();
    assert_eq!(harness.host().text_content(h1), "Count: 2");

    // Two synchronous clicks fold into one render pass.
    assert!(harness.dispatch(button, &Event::new("click")));
    assert!(harness.dispatch(button, &Event::new("click")));
    harness.settle();
    assert_eq!(harness.host().text_content(h1), "Count: 4");
}

thread_local! {
    static THEME: Context<&'static str> = create_context("light");
    static LABEL_RENDERS: RefCell<usize> = RefCell::new(0);
}

fn theme_label(scope: &mut Scope<'_>) -> Element {
    LABEL_RENDERS.with(|renders| *renders.borrow_mut() += 1);
    let theme = THEME.with(|context| scope.use_context(context));
    Element::host("output").attr("class", theme).child(theme)
}

fn theme_app(scope: &mut Scope<'_>) -> Element {
    let (theme, setter) = scope.use_state(|| "dark");
    let toggle = move |_: &Event| {
        setter.update(|current| if *current == "dark" { "light" } else { "dark" });
    };
    THEME.with(|context| {
        context.provider(
            theme,
            children![Element::host("main").children(children![
                Element::component(theme_label),
                Element::host("button").on("click", toggle),
            ])],
        )
    })
}

#[test]
fn toggling_the_provider_updates_the_consumer() {
    let mut harness = TestHarness::new();
    harness.render(Element::component(theme_app));
    harness.settle();

    let output = harness.find_by_tag("output").unwrap();
    assert_eq!(harness.host().text_content(output), "dark");
    assert!(LABEL_RENDERS.with(|renders| *renders.borrow()) >= 1);

    let button = harness.find_by_tag("button").unwrap();
    harness.dispatch(button, &Event::new("click"));
    harness.settle();

    let output = harness.find_by_tag("output").unwrap();
    assert_eq!(harness.host().text_content(output), "light");
    assert_eq!(
        harness
            .host()
            .attr(output, "class")
            .and_then(PropValue::as_str),
        Some("light")
    );
}

#[test]
fn dump_tree_shows_the_committed_structure() {
    let mut harness = TestHarness::new();
    harness.render(Element::host("ul").children(children![
        Element::host("li").child("one"),
        Element::host("li").child("two"),
    ]));
    harness.settle();

    let dump = harness.dump();
    assert!(dump.contains("<ul>"));
    assert!(dump.contains("\"one\""));
    assert!(dump.contains("\"two\""));
}
