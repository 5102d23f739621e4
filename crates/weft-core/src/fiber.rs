//! Fiber records and the arena they live in.
//!
//! A fiber is the mutable unit-of-work record for one tree position. All
//! relations (parent, first child, next sibling, alternate) are arena
//! handles, never owning references; the arena owns every record.

use std::any::Any;
use std::rc::Rc;

use slotmap::new_key_type;

use crate::context::ContextCell;
use crate::element::{Element, ElementKey, ElementKind, Props};
use crate::hooks::{ComponentFn, Hook};
use crate::host::HostId;

new_key_type! {
    /// Stable generational handle into the fiber arena.
    pub struct FiberId;
}

pub type FiberArena = slotmap::SlotMap<FiberId, Fiber>;

/// The diff's verdict for a fiber, consumed only by the commit engine.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum EffectTag {
    None,
    Placement,
    Update,
    Deletion,
}

/// Fiber kind, resolved from the element kind once at creation.
pub(crate) enum FiberKind {
    /// The render root, owning the host container handle.
    Root,
    Host(String),
    /// Text sentinel; the payload pending for this pass lives here.
    Text(String),
    Component(ComponentFn),
    Provider(Rc<ContextCell>),
}

impl FiberKind {
    pub(crate) fn from_element(kind: &ElementKind) -> Self {
        match kind {
            ElementKind::Host(tag) => FiberKind::Host(tag.clone()),
            ElementKind::Text(text) => FiberKind::Text(text.clone()),
            ElementKind::Component(func) => FiberKind::Component(*func),
            ElementKind::Provider(spec) => FiberKind::Provider(Rc::clone(&spec.cell)),
        }
    }

    /// Same-kind check for reconciliation: tag for hosts, function pointer
    /// for components, cell identity for providers. Text matches text; a
    /// payload change is an update, not a replacement.
    pub(crate) fn matches(&self, element: &ElementKind) -> bool {
        match (self, element) {
            (FiberKind::Host(old), ElementKind::Host(new)) => old == new,
            (FiberKind::Text(_), ElementKind::Text(_)) => true,
            (FiberKind::Component(old), ElementKind::Component(new)) => *old == *new,
            (FiberKind::Provider(old), ElementKind::Provider(new)) => old.id() == new.cell.id(),
            _ => false,
        }
    }

    pub(crate) fn text(&self) -> Option<&str> {
        match self {
            FiberKind::Text(text) => Some(text),
            _ => None,
        }
    }
}

pub struct Fiber {
    pub(crate) kind: FiberKind,
    pub(crate) key: Option<ElementKey>,
    /// Owned output handle; `None` until created (and always `None` for
    /// component and provider fibers).
    pub(crate) host: Option<HostId>,
    pub(crate) parent: Option<FiberId>,
    pub(crate) child: Option<FiberId>,
    pub(crate) sibling: Option<FiberId>,
    /// Same tree position in the other buffer.
    pub(crate) alternate: Option<FiberId>,
    pub(crate) pending_props: Rc<Props>,
    pub(crate) memoized_props: Option<Rc<Props>>,
    pub(crate) effect_tag: EffectTag,
    pub(crate) hooks: Vec<Hook>,
    /// Value a provider fiber supplies to its subtree this pass.
    pub(crate) provider_value: Option<Rc<dyn Any>>,
}

impl Fiber {
    pub(crate) fn new(kind: FiberKind, key: Option<ElementKey>, props: Rc<Props>) -> Self {
        Self {
            kind,
            key,
            host: None,
            parent: None,
            child: None,
            sibling: None,
            alternate: None,
            pending_props: props,
            memoized_props: None,
            effect_tag: EffectTag::None,
            hooks: Vec::new(),
            provider_value: None,
        }
    }

    /// Fresh fiber for a new element, no output handle yet.
    pub(crate) fn from_element(element: &Element) -> Self {
        let mut fiber = Self::new(
            FiberKind::from_element(element.kind()),
            element.element_key().cloned(),
            element.props_rc(),
        );
        if let ElementKind::Provider(spec) = element.kind() {
            fiber.provider_value = Some(Rc::clone(&spec.value));
        }
        fiber
    }

    /// Root fiber over an existing host container.
    pub(crate) fn root(container: HostId, props: Rc<Props>) -> Self {
        let mut fiber = Self::new(FiberKind::Root, None, props);
        fiber.host = Some(container);
        fiber
    }
}
