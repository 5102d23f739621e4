//! The immutable element model.
//!
//! Elements are plain descriptions of a UI node: a kind, optional
//! reconciliation key, and a bag of props whose reserved `children` slot
//! holds the ordered child elements. They are produced fresh on every
//! render and never mutated; fibers are the mutable mirror.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::context::ProviderSpec;
use crate::hooks::ComponentFn;

/// Event delivered to a listener prop by the host tree.
pub struct Event {
    name: String,
    payload: Option<Rc<dyn Any>>,
}

impl Event {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            payload: None,
        }
    }

    pub fn with_payload(name: impl Into<String>, payload: Rc<dyn Any>) -> Self {
        Self {
            name: name.into(),
            payload: Some(payload),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn payload<T: 'static>(&self) -> Option<&T> {
        self.payload.as_deref().and_then(|p| p.downcast_ref::<T>())
    }
}

pub type EventHandler = Rc<dyn Fn(&Event)>;

/// A single prop value. A `Handler` prop *is* an event listener registered
/// under the prop's name; scalar variants are host attributes.
#[derive(Clone)]
pub enum PropValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Handler(EventHandler),
}

impl PropValue {
    pub fn is_handler(&self) -> bool {
        matches!(self, PropValue::Handler(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl PartialEq for PropValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (PropValue::Str(a), PropValue::Str(b)) => a == b,
            (PropValue::Int(a), PropValue::Int(b)) => a == b,
            (PropValue::Float(a), PropValue::Float(b)) => a == b,
            (PropValue::Bool(a), PropValue::Bool(b)) => a == b,
            // Handlers have no structural equality; identity of the
            // callback is the only meaningful comparison.
            (PropValue::Handler(a), PropValue::Handler(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropValue::Str(s) => write!(f, "{s:?}"),
            PropValue::Int(n) => write!(f, "{n}"),
            PropValue::Float(n) => write!(f, "{n}"),
            PropValue::Bool(b) => write!(f, "{b}"),
            PropValue::Handler(_) => write!(f, "<handler>"),
        }
    }
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        PropValue::Str(value.to_owned())
    }
}

impl From<String> for PropValue {
    fn from(value: String) -> Self {
        PropValue::Str(value)
    }
}

impl From<i64> for PropValue {
    fn from(value: i64) -> Self {
        PropValue::Int(value)
    }
}

impl From<i32> for PropValue {
    fn from(value: i32) -> Self {
        PropValue::Int(value as i64)
    }
}

impl From<f64> for PropValue {
    fn from(value: f64) -> Self {
        PropValue::Float(value)
    }
}

impl From<bool> for PropValue {
    fn from(value: bool) -> Self {
        PropValue::Bool(value)
    }
}

impl From<EventHandler> for PropValue {
    fn from(value: EventHandler) -> Self {
        PropValue::Handler(value)
    }
}

/// Reconciliation identity for list children.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ElementKey {
    Int(i64),
    Str(String),
}

impl From<i64> for ElementKey {
    fn from(value: i64) -> Self {
        ElementKey::Int(value)
    }
}

impl From<i32> for ElementKey {
    fn from(value: i32) -> Self {
        ElementKey::Int(value as i64)
    }
}

impl From<usize> for ElementKey {
    fn from(value: usize) -> Self {
        ElementKey::Int(value as i64)
    }
}

impl From<&str> for ElementKey {
    fn from(value: &str) -> Self {
        ElementKey::Str(value.to_owned())
    }
}

impl From<String> for ElementKey {
    fn from(value: String) -> Self {
        ElementKey::Str(value)
    }
}

/// Props bag. `children` is the reserved pseudo-prop of the element model,
/// kept as its own field so prop diffing never has to special-case it.
#[derive(Clone, Default)]
pub struct Props {
    pub(crate) attrs: IndexMap<String, PropValue>,
    pub(crate) children: Vec<Element>,
}

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, name: impl Into<String>, value: impl Into<PropValue>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    pub fn on(mut self, event: impl Into<String>, handler: impl Fn(&Event) + 'static) -> Self {
        self.attrs
            .insert(event.into(), PropValue::Handler(Rc::new(handler)));
        self
    }

    pub fn get(&self, name: &str) -> Option<&PropValue> {
        self.attrs.get(name)
    }

    pub fn attrs(&self) -> impl Iterator<Item = (&str, &PropValue)> {
        self.attrs.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn children(&self) -> &[Element] {
        &self.children
    }
}

impl fmt::Debug for Props {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Props")
            .field("attrs", &self.attrs)
            .field("children", &self.children.len())
            .finish()
    }
}

/// The closed kind variant, resolved once at element creation.
#[derive(Clone)]
pub enum ElementKind {
    /// Host node with its tag name.
    Host(String),
    /// Text sentinel carrying its scalar payload; never keyed, no children.
    Text(String),
    /// Function component. Plain `fn` pointers keep identity stable and
    /// comparable across renders.
    Component(ComponentFn),
    /// Context provider carrying its cell and supplied value.
    Provider(ProviderSpec),
}

impl fmt::Debug for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementKind::Host(tag) => write!(f, "Host({tag})"),
            ElementKind::Text(text) => write!(f, "Text({text:?})"),
            ElementKind::Component(func) => write!(f, "Component({:p})", *func as *const ()),
            ElementKind::Provider(spec) => write!(f, "Provider(#{})", spec.cell.id()),
        }
    }
}

impl From<&str> for ElementKind {
    fn from(tag: &str) -> Self {
        ElementKind::Host(tag.to_owned())
    }
}

impl From<String> for ElementKind {
    fn from(tag: String) -> Self {
        ElementKind::Host(tag)
    }
}

impl From<ComponentFn> for ElementKind {
    fn from(func: ComponentFn) -> Self {
        ElementKind::Component(func)
    }
}

/// Normalized child position: either an element or nothing. Strings and
/// numbers normalize to text elements; booleans and `None` are skipped
/// without producing a fiber.
pub enum Child {
    Node(Element),
    Skip,
}

impl From<Element> for Child {
    fn from(element: Element) -> Self {
        Child::Node(element)
    }
}

impl From<&str> for Child {
    fn from(text: &str) -> Self {
        Child::Node(Element::text(text))
    }
}

impl From<String> for Child {
    fn from(text: String) -> Self {
        Child::Node(Element::text(text))
    }
}

impl From<i64> for Child {
    fn from(value: i64) -> Self {
        Child::Node(Element::text(value.to_string()))
    }
}

impl From<i32> for Child {
    fn from(value: i32) -> Self {
        Child::Node(Element::text(value.to_string()))
    }
}

impl From<f64> for Child {
    fn from(value: f64) -> Self {
        Child::Node(Element::text(value.to_string()))
    }
}

impl From<bool> for Child {
    fn from(_: bool) -> Self {
        Child::Skip
    }
}

impl<C: Into<Child>> From<Option<C>> for Child {
    fn from(value: Option<C>) -> Self {
        match value {
            Some(inner) => inner.into(),
            None => Child::Skip,
        }
    }
}

/// Build a `Vec<Child>` from mixed child expressions.
#[macro_export]
macro_rules! children {
    ($($child:expr),* $(,)?) => {
        vec![$($crate::element::Child::from($child)),*]
    };
}

/// Immutable description of a UI node.
#[derive(Clone)]
pub struct Element {
    kind: ElementKind,
    key: Option<ElementKey>,
    props: Rc<Props>,
}

impl Element {
    pub fn new(kind: ElementKind, key: Option<ElementKey>, props: Props) -> Self {
        Self {
            kind,
            key,
            props: Rc::new(props),
        }
    }

    pub fn host(tag: impl Into<String>) -> Self {
        Self::new(ElementKind::Host(tag.into()), None, Props::new())
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::new(ElementKind::Text(text.into()), None, Props::new())
    }

    pub fn component(func: ComponentFn) -> Self {
        Self::new(ElementKind::Component(func), None, Props::new())
    }

    pub fn key(mut self, key: impl Into<ElementKey>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<PropValue>) -> Self {
        let props = Rc::make_mut(&mut self.props);
        props.attrs.insert(name.into(), value.into());
        self
    }

    pub fn on(mut self, event: impl Into<String>, handler: impl Fn(&Event) + 'static) -> Self {
        let props = Rc::make_mut(&mut self.props);
        props
            .attrs
            .insert(event.into(), PropValue::Handler(Rc::new(handler)));
        self
    }

    pub fn child(mut self, child: impl Into<Child>) -> Self {
        if let Child::Node(element) = child.into() {
            Rc::make_mut(&mut self.props).children.push(element);
        }
        self
    }

    pub fn children(mut self, children: impl IntoIterator<Item = Child>) -> Self {
        let props = Rc::make_mut(&mut self.props);
        props
            .children
            .extend(children.into_iter().filter_map(|child| match child {
                Child::Node(element) => Some(element),
                Child::Skip => None,
            }));
        self
    }

    pub fn kind(&self) -> &ElementKind {
        &self.kind
    }

    pub fn element_key(&self) -> Option<&ElementKey> {
        self.key.as_ref()
    }

    pub fn props(&self) -> &Props {
        &self.props
    }

    pub(crate) fn props_rc(&self) -> Rc<Props> {
        Rc::clone(&self.props)
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element")
            .field("kind", &self.kind)
            .field("key", &self.key)
            .field("props", &self.props)
            .finish()
    }
}

/// `createElement`-shaped constructor: kind, props, then normalized
/// children appended to the reserved `children` slot.
pub fn create_element(
    kind: impl Into<ElementKind>,
    props: Props,
    children: impl IntoIterator<Item = Child>,
) -> Element {
    Element::new(kind.into(), None, props).children(children)
}
