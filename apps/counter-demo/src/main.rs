//! Counter and themed-subtree demo against the in-memory host.
//!
//! Run with `RUST_LOG=debug` to watch the runtime commit passes.

use std::cell::RefCell;
use std::time::Duration;

use weft_core::{
    children, create_context, deps, Context, Element, Event, HostId, MemoryHost, Runtime, Scope,
    TimeBudget,
};

thread_local! {
    static THEME: Context<&'static str> = create_context("light");
    static CLICKS: RefCell<u32> = RefCell::new(0);
}

fn counter(scope: &mut Scope<'_>) -> Element {
    let (count, setter) = scope.use_state(|| 0_i64);
    scope.use_effect(deps![count], move || {
        log::info!("counter is now {count}");
        None
    });
    let increment = move |_: &Event| {
        CLICKS.with(|clicks| *clicks.borrow_mut() += 1);
        setter.update(|n| n + 1);
    };
    Element::host("div").attr("class", "counter").children(children![
        Element::host("h1").children(children!["Count: ", count]),
        Element::host("button")
            .attr("label", "increment")
            .on("click", increment),
    ])
}

fn theme_badge(scope: &mut Scope<'_>) -> Element {
    let theme = THEME.with(|context| scope.use_context(context));
    Element::host("output").attr("class", theme).child(theme)
}

fn app(scope: &mut Scope<'_>) -> Element {
    let (theme, setter) = scope.use_state(|| "dark");
    let toggle = move |_: &Event| {
        setter.update(|current| if *current == "dark" { "light" } else { "dark" });
    };
    THEME.with(|context| {
        context.provider(
            theme,
            children![Element::host("main").children(children![
                Element::component(counter),
                Element::component(theme_badge),
                Element::host("button")
                    .attr("label", "toggle-theme")
                    .on("click", toggle),
            ])],
        )
    })
}

/// Drive the work loop in small slices until the runtime settles, the way
/// an idle-callback host would.
fn pump(runtime: &mut Runtime<MemoryHost>) {
    while runtime.has_work() {
        if let Err(err) = runtime.work_loop(&TimeBudget::new(Duration::from_millis(4))) {
            log::error!("frame failed: {err}");
            return;
        }
    }
}

fn find_by_label(host: &MemoryHost, root: HostId, label: &str) -> Option<HostId> {
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        if host
            .attr(id, "label")
            .and_then(weft_core::PropValue::as_str)
            == Some(label)
        {
            return Some(id);
        }
        stack.extend(host.children_of(id));
    }
    None
}

fn main() {
    env_logger::init();

    let mut host = MemoryHost::new();
    let container = host.create_container();
    let mut runtime = Runtime::new(host);

    runtime.render(Element::component(app), container);
    pump(&mut runtime);
    println!("-- initial tree --\n{}", runtime.host().dump_tree(container));

    let increment = find_by_label(runtime.host(), container, "increment").expect("counter button");
    runtime.host().dispatch(increment, &Event::new("click"));
    runtime.host().dispatch(increment, &Event::new("click"));
    pump(&mut runtime);
    println!(
        "-- after {} clicks --\n{}",
        CLICKS.with(|clicks| *clicks.borrow()),
        runtime.host().dump_tree(container)
    );

    let toggle = find_by_label(runtime.host(), container, "toggle-theme").expect("theme button");
    runtime.host().dispatch(toggle, &Event::new("click"));
    pump(&mut runtime);
    println!(
        "-- after theme toggle --\n{}",
        runtime.host().dump_tree(container)
    );
}
