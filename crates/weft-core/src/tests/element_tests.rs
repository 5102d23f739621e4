use std::rc::Rc;

use crate::element::{Element, ElementKind, Event, EventHandler, PropValue, Props};
use crate::hooks::Deps;
use crate::{children, create_element, deps};

#[test]
fn string_and_number_children_normalize_to_text() {
    let element = Element::host("h1").children(children!["Count: ", 3, 2.5]);
    let kids = element.props().children();
    assert_eq!(kids.len(), 3);
    assert!(matches!(kids[0].kind(), ElementKind::Text(t) if t == "Count: "));
    assert!(matches!(kids[1].kind(), ElementKind::Text(t) if t == "3"));
    assert!(matches!(kids[2].kind(), ElementKind::Text(t) if t == "2.5"));
}

#[test]
fn boolean_and_none_children_are_skipped() {
    let maybe: Option<Element> = None;
    let element = Element::host("div").children(children![
        false,
        Element::host("span"),
        true,
        maybe,
        Some("tail"),
    ]);
    let kids = element.props().children();
    assert_eq!(kids.len(), 2);
    assert!(matches!(kids[0].kind(), ElementKind::Host(tag) if tag == "span"));
    assert!(matches!(kids[1].kind(), ElementKind::Text(t) if t == "tail"));
}

#[test]
fn create_element_appends_children_to_props() {
    let props = Props::new().set("id", "root");
    let element = create_element("div", props, children![Element::host("p")]);
    assert_eq!(
        element.props().get("id").and_then(PropValue::as_str),
        Some("root")
    );
    assert_eq!(element.props().children().len(), 1);
}

#[test]
fn scalar_props_compare_by_value() {
    assert_eq!(PropValue::from("a"), PropValue::from("a"));
    assert_ne!(PropValue::from("a"), PropValue::from("b"));
    assert_eq!(PropValue::from(2), PropValue::from(2));
    assert_ne!(PropValue::from(2), PropValue::from(2.0));
}

#[test]
fn handler_props_compare_by_identity() {
    let handler: EventHandler = Rc::new(|_: &Event| {});
    let same = PropValue::Handler(Rc::clone(&handler));
    let other: EventHandler = Rc::new(|_: &Event| {});
    assert_eq!(PropValue::Handler(handler), same.clone());
    assert_ne!(PropValue::Handler(other), same);
}

#[test]
fn keyed_builder_records_key() {
    let element = Element::host("li").key(7);
    assert!(element.element_key().is_some());
    let by_str = Element::host("li").key("row");
    assert_ne!(element.element_key(), by_str.element_key());
}

#[test]
fn deps_change_detection_is_positional() {
    let a = deps![1, "x"];
    let same = deps![1, "x"];
    let reordered = deps!["x", 1];
    let shorter = deps![1];
    assert!(!same.changed_from(&a));
    assert!(reordered.changed_from(&a));
    assert!(shorter.changed_from(&a));
}

#[test]
fn missing_deps_list_always_changes() {
    let always = Deps::always();
    let empty = deps![];
    assert!(always.changed_from(&always));
    assert!(always.changed_from(&empty));
    assert!(empty.changed_from(&always));
    assert!(!empty.changed_from(&deps![]));
}
