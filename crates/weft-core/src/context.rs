//! Shared context cells and provider elements.
//!
//! A context is a process-wide value cell plus a subscriber set. Provider
//! fibers publish a value for their subtree; `use_context` walks ancestors
//! for the nearest provider and falls back to the cell's last-pushed value.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::marker::PhantomData;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::collections::map::HashSet;
use crate::element::{Child, Element, ElementKind, Props};
use crate::fiber::FiberId;

pub(crate) type ContextId = usize;

static NEXT_CONTEXT_ID: AtomicUsize = AtomicUsize::new(1);

fn next_context_id() -> ContextId {
    NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed)
}

/// Type-erased storage behind a `Context<T>`. The comparator captures the
/// concrete `T: PartialEq` so provider updates can detect value changes
/// without the runtime knowing the type.
pub struct ContextCell {
    id: ContextId,
    /// Last-pushed value; starts as the context default.
    current: RefCell<Rc<dyn Any>>,
    subscribers: RefCell<HashSet<FiberId>>,
    needs_update: Cell<bool>,
    values_equal: Box<dyn Fn(&dyn Any, &dyn Any) -> bool>,
}

impl ContextCell {
    pub(crate) fn id(&self) -> ContextId {
        self.id
    }

    pub(crate) fn current(&self) -> Rc<dyn Any> {
        Rc::clone(&self.current.borrow())
    }

    /// Publish a provider value. Flags the cell when the value differs from
    /// the previously published one.
    pub(crate) fn publish(&self, value: &Rc<dyn Any>) {
        let changed = !(self.values_equal)(self.current.borrow().as_ref(), value.as_ref());
        if changed {
            self.needs_update.set(true);
            *self.current.borrow_mut() = Rc::clone(value);
        }
    }

    pub(crate) fn subscribe(&self, fiber: FiberId) {
        self.subscribers.borrow_mut().insert(fiber);
    }

    pub(crate) fn unsubscribe(&self, fiber: FiberId) {
        self.subscribers.borrow_mut().remove(&fiber);
    }

    pub(crate) fn has_subscribers(&self) -> bool {
        !self.subscribers.borrow().is_empty()
    }

    /// Consume the pending-update flag, returning whether it was set.
    pub(crate) fn take_needs_update(&self) -> bool {
        self.needs_update.replace(false)
    }
}

/// Provider payload carried on a `Provider` element: the cell plus the
/// erased value supplied for the subtree.
#[derive(Clone)]
pub struct ProviderSpec {
    pub(crate) cell: Rc<ContextCell>,
    pub(crate) value: Rc<dyn Any>,
}

/// Typed handle over a shared context cell. Cloning shares the cell.
pub struct Context<T> {
    pub(crate) cell: Rc<ContextCell>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Context<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Rc::clone(&self.cell),
            _marker: PhantomData,
        }
    }
}

impl<T: Clone + PartialEq + 'static> Context<T> {
    /// Build a provider element supplying `value` to `children`.
    pub fn provider(&self, value: T, children: impl IntoIterator<Item = Child>) -> Element {
        let spec = ProviderSpec {
            cell: Rc::clone(&self.cell),
            value: Rc::new(value),
        };
        Element::new(ElementKind::Provider(spec), None, Props::new()).children(children)
    }
}

/// Create a context with a default value, used wherever no provider is in
/// scope above the consumer.
pub fn create_context<T: Clone + PartialEq + 'static>(default: T) -> Context<T> {
    let default: Rc<dyn Any> = Rc::new(default);
    let cell = ContextCell {
        id: next_context_id(),
        current: RefCell::new(default),
        subscribers: RefCell::new(HashSet::new()),
        needs_update: Cell::new(false),
        values_equal: Box::new(|a, b| {
            match (a.downcast_ref::<T>(), b.downcast_ref::<T>()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            }
        }),
    };
    Context {
        cell: Rc::new(cell),
        _marker: PhantomData,
    }
}
