//! Per-fiber hook slots and the render scope.
//!
//! Hook identity is positional: the Nth hook call on a fiber must line up
//! with the Nth record from its alternate. Changing the count or order of
//! hook calls between renders of the same fiber is a caller error and
//! panics rather than silently corrupting the slot index.

use std::any::Any;
use std::cell::RefCell;
use std::marker::PhantomData;
use std::rc::Rc;

use crate::context::{Context, ContextCell};
use crate::element::{Element, Event, EventHandler, Props};
use crate::fiber::{FiberId, FiberKind};
use crate::runtime::{RuntimeHandle, Session};

/// A function component. Plain function pointers give components a stable,
/// comparable identity across renders.
pub type ComponentFn = fn(&mut Scope<'_>) -> Element;

/// Cleanup returned by an effect body, run before the effect refires or
/// when its fiber is deleted.
pub type Cleanup = Box<dyn FnOnce()>;

pub(crate) type EffectBody = Box<dyn FnOnce() -> Option<Cleanup>>;

/// Cleanup slot shared across renders of the same effect hook, so an
/// abandoned work-in-progress pass cannot strand the committed tree's
/// cleanup.
pub(crate) type CleanupSlot = Rc<RefCell<Option<Cleanup>>>;

/// Dependency list gating effect/memo/callback re-evaluation.
///
/// Entries are hash fingerprints of the dependency values. `always()` (no
/// list) re-evaluates every render; an empty list evaluates exactly once.
#[derive(Clone, Debug, PartialEq)]
pub struct Deps(Option<Vec<u64>>);

impl Deps {
    /// No dependency list: re-evaluate on every render.
    pub fn always() -> Self {
        Deps(None)
    }

    /// Empty list: evaluate once, never again.
    pub fn none() -> Self {
        Deps(Some(Vec::new()))
    }

    pub fn list(entries: impl IntoIterator<Item = u64>) -> Self {
        Deps(Some(entries.into_iter().collect()))
    }

    /// Changed when either side has no list, the lengths differ, or any
    /// positional entry differs.
    pub(crate) fn changed_from(&self, previous: &Deps) -> bool {
        match (&self.0, &previous.0) {
            (None, _) | (_, None) => true,
            (Some(new), Some(old)) => {
                new.len() != old.len() || new.iter().zip(old.iter()).any(|(a, b)| a != b)
            }
        }
    }
}

/// Fingerprint dependency values into a [`Deps`] list.
#[macro_export]
macro_rules! deps {
    ($($dep:expr),* $(,)?) => {
        $crate::hooks::Deps::list([$($crate::hash::fingerprint(&$dep)),*])
    };
}

pub(crate) type ErasedUpdate = Box<dyn FnOnce(&dyn Any) -> Rc<dyn Any>>;
pub(crate) type UpdateQueue = Rc<RefCell<Vec<ErasedUpdate>>>;

/// Enqueues state updates and requests a root re-render. The queue is
/// shared across renders of the owning fiber, so setters captured by old
/// event handlers keep working.
pub struct Setter<T> {
    queue: UpdateQueue,
    handle: RuntimeHandle,
    _marker: PhantomData<fn(T)>,
}

impl<T> Clone for Setter<T> {
    fn clone(&self) -> Self {
        Self {
            queue: Rc::clone(&self.queue),
            handle: self.handle.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: Clone + 'static> Setter<T> {
    pub fn set(&self, value: T) {
        self.push(Box::new(move |_| Rc::new(value)));
    }

    pub fn update(&self, updater: impl FnOnce(&T) -> T + 'static) {
        self.push(Box::new(move |previous| {
            let previous = previous
                .downcast_ref::<T>()
                .expect("state hook value changed type between renders");
            Rc::new(updater(previous))
        }));
    }

    fn push(&self, update: ErasedUpdate) {
        self.queue.borrow_mut().push(update);
        self.handle.request_render();
    }
}

/// One hook record. Owned by a fiber, addressed by call order.
pub(crate) enum Hook {
    State {
        value: Rc<dyn Any>,
        queue: UpdateQueue,
    },
    Effect {
        deps: Deps,
        body: Option<EffectBody>,
        cleanup: CleanupSlot,
        /// Render-time decision: run during this commit.
        pending: bool,
    },
    Memo {
        deps: Deps,
        value: Rc<dyn Any>,
    },
    Callback {
        deps: Deps,
        value: EventHandler,
    },
    Ref {
        value: Rc<dyn Any>,
    },
    ContextSub {
        cell: Rc<ContextCell>,
    },
}

impl Hook {
    pub(crate) fn variant_name(&self) -> &'static str {
        match self {
            Hook::State { .. } => "use_state",
            Hook::Effect { .. } => "use_effect",
            Hook::Memo { .. } => "use_memo",
            Hook::Callback { .. } => "use_callback",
            Hook::Ref { .. } => "use_ref",
            Hook::ContextSub { .. } => "use_context",
        }
    }
}

/// The render-session handle passed to a component while it is the current
/// render subject. Hook calls go through it; it exists only for the
/// duration of that fiber's unit of work.
pub struct Scope<'a> {
    session: &'a mut Session,
    fiber: FiberId,
    pub(crate) cursor: usize,
}

impl<'a> Scope<'a> {
    pub(crate) fn new(session: &'a mut Session, fiber: FiberId) -> Self {
        Self {
            session,
            fiber,
            cursor: 0,
        }
    }

    /// Props the component was rendered with.
    pub fn props(&self) -> Rc<Props> {
        Rc::clone(&self.session.arena[self.fiber].pending_props)
    }

    /// Handle for scheduling work from outside the render (timers, stores).
    pub fn handle(&self) -> RuntimeHandle {
        self.session.handle()
    }

    fn next_index(&mut self) -> usize {
        let index = self.cursor;
        self.cursor += 1;
        index
    }

    fn alternate(&self) -> Option<FiberId> {
        self.session.arena[self.fiber].alternate
    }

    fn mismatch(&self, index: usize, expected: &str, found: &Hook) -> ! {
        panic!(
            "hook order changed between renders: slot {index} was {} last render, now {expected}",
            found.variant_name()
        );
    }

    pub fn use_state<T: Clone + 'static>(&mut self, init: impl FnOnce() -> T) -> (T, Setter<T>) {
        let index = self.next_index();
        let (mut value, queue): (Rc<dyn Any>, UpdateQueue) = match self.previous_hook(index) {
            Some(Hook::State { value, queue }) => (Rc::clone(value), Rc::clone(queue)),
            Some(other) => self.mismatch(index, "use_state", other),
            None => (
                Rc::new(init()) as Rc<dyn Any>,
                Rc::new(RefCell::new(Vec::new())),
            ),
        };

        // Fold queued updates left-to-right over the previous value.
        let updates: Vec<ErasedUpdate> = queue.borrow_mut().drain(..).collect();
        for update in updates {
            value = update(value.as_ref());
        }

        self.session.arena[self.fiber].hooks.push(Hook::State {
            value: Rc::clone(&value),
            queue: Rc::clone(&queue),
        });

        let current = value
            .downcast_ref::<T>()
            .expect("state hook value changed type between renders")
            .clone();
        let setter = Setter {
            queue,
            handle: self.session.handle(),
            _marker: PhantomData,
        };
        (current, setter)
    }

    pub fn use_effect(
        &mut self,
        deps: Deps,
        effect: impl FnOnce() -> Option<Cleanup> + 'static,
    ) {
        let index = self.next_index();
        let (pending, cleanup): (bool, CleanupSlot) = match self.previous_hook(index) {
            Some(Hook::Effect {
                deps: old_deps,
                cleanup,
                ..
            }) => {
                // The cleanup slot is shared with the previous record; it
                // only fires when the effect reruns or unmounts.
                (deps.changed_from(old_deps), Rc::clone(cleanup))
            }
            Some(other) => self.mismatch(index, "use_effect", other),
            None => (true, Rc::new(RefCell::new(None))),
        };

        self.session.arena[self.fiber].hooks.push(Hook::Effect {
            deps,
            body: Some(Box::new(effect)),
            cleanup,
            pending,
        });
    }

    pub fn use_memo<T: 'static>(&mut self, deps: Deps, factory: impl FnOnce() -> T) -> Rc<T> {
        let index = self.next_index();
        let value: Rc<dyn Any> = match self.previous_hook(index) {
            Some(Hook::Memo {
                deps: old_deps,
                value,
            }) if !deps.changed_from(old_deps) => Rc::clone(value),
            Some(Hook::Memo { .. }) | None => Rc::new(factory()),
            Some(other) => self.mismatch(index, "use_memo", other),
        };

        self.session.arena[self.fiber].hooks.push(Hook::Memo {
            deps,
            value: Rc::clone(&value),
        });
        value
            .downcast::<T>()
            .unwrap_or_else(|_| panic!("memo hook value changed type between renders"))
    }

    pub fn use_callback(
        &mut self,
        deps: Deps,
        callback: impl Fn(&Event) + 'static,
    ) -> EventHandler {
        let index = self.next_index();
        let value: EventHandler = match self.previous_hook(index) {
            Some(Hook::Callback {
                deps: old_deps,
                value,
            }) if !deps.changed_from(old_deps) => Rc::clone(value),
            Some(Hook::Callback { .. }) | None => Rc::new(callback),
            Some(other) => self.mismatch(index, "use_callback", other),
        };

        self.session.arena[self.fiber].hooks.push(Hook::Callback {
            deps,
            value: Rc::clone(&value),
        });
        value
    }

    pub fn use_ref<T: 'static>(&mut self, init: impl FnOnce() -> T) -> Rc<RefCell<T>> {
        let index = self.next_index();
        let value: Rc<dyn Any> = match self.previous_hook(index) {
            Some(Hook::Ref { value }) => Rc::clone(value),
            Some(other) => self.mismatch(index, "use_ref", other),
            None => Rc::new(RefCell::new(init())),
        };

        self.session.arena[self.fiber].hooks.push(Hook::Ref {
            value: Rc::clone(&value),
        });
        value
            .downcast::<RefCell<T>>()
            .unwrap_or_else(|_| panic!("ref hook value changed type between renders"))
    }

    pub fn use_context<T: Clone + 'static>(&mut self, context: &Context<T>) -> T {
        let index = self.next_index();
        if let Some(previous) = self.previous_hook(index) {
            if !matches!(previous, Hook::ContextSub { .. }) {
                self.mismatch(index, "use_context", previous);
            }
        }

        let cell = Rc::clone(&context.cell);
        let value = self
            .nearest_provider_value(cell.id())
            .unwrap_or_else(|| cell.current());

        // Re-point the subscription from the previous buffer's fiber to
        // this render's fiber.
        if let Some(alternate) = self.alternate() {
            cell.unsubscribe(alternate);
        }
        cell.subscribe(self.fiber);

        self.session.arena[self.fiber].hooks.push(Hook::ContextSub {
            cell: Rc::clone(&cell),
        });

        value
            .downcast_ref::<T>()
            .cloned()
            .expect("context value changed type between renders")
    }

    /// Nearest ancestor (or self) provider value for `context_id`.
    fn nearest_provider_value(&self, context_id: usize) -> Option<Rc<dyn Any>> {
        let mut cursor = Some(self.fiber);
        while let Some(id) = cursor {
            let fiber = &self.session.arena[id];
            if let FiberKind::Provider(cell) = &fiber.kind {
                if cell.id() == context_id {
                    if let Some(value) = &fiber.provider_value {
                        return Some(Rc::clone(value));
                    }
                }
            }
            cursor = fiber.parent;
        }
        None
    }

    fn previous_hook(&self, index: usize) -> Option<&Hook> {
        let alternate = self.alternate()?;
        match self.session.arena[alternate].hooks.get(index) {
            Some(hook) => Some(hook),
            None => hook_count_violation(index),
        }
    }
}

fn hook_count_violation(index: usize) -> ! {
    panic!(
        "hook count changed between renders: slot {index} has no counterpart from the previous render"
    );
}
