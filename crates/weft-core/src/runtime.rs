//! The render session and its cooperative work loop.
//!
//! All scheduler state (the fiber arena, the current and work-in-progress
//! roots, the next-unit cursor, the deletion list) lives in one explicit
//! [`Session`] owned by the [`Runtime`]; there are no process-wide
//! variables. An external driver pumps [`Runtime::work_loop`] under an
//! idle-callback or tick mechanism; the loop performs one fiber at a time
//! and yields when the deadline's slice is exhausted.

use std::cell::Cell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::commit::update_host_props;
use crate::element::{Element, Props};
use crate::fiber::{EffectTag, Fiber, FiberArena, FiberId, FiberKind};
use crate::hooks::{ComponentFn, Scope};
use crate::host::{HostError, HostId, HostTree};

/// Host capability for re-arming the work loop: called whenever the
/// runtime has (or expects) work and wants another idle slot.
pub trait WorkScheduler: Send + Sync {
    fn schedule_idle(&self);
}

/// Scheduler for drivers that poll [`Runtime::has_work`] themselves.
#[derive(Default)]
pub struct NoopScheduler;

impl WorkScheduler for NoopScheduler {
    fn schedule_idle(&self) {}
}

/// Remaining time in the current idle slice, as exposed by the host's
/// idle-callback mechanism.
pub trait Deadline {
    fn time_remaining(&self) -> Duration;
}

/// Wall-clock deadline over a fixed budget.
pub struct TimeBudget {
    started: Instant,
    budget: Duration,
}

impl TimeBudget {
    pub fn new(budget: Duration) -> Self {
        Self {
            started: Instant::now(),
            budget,
        }
    }
}

impl Deadline for TimeBudget {
    fn time_remaining(&self) -> Duration {
        self.budget.saturating_sub(self.started.elapsed())
    }
}

/// The loop yields once less than this much slice remains.
const YIELD_THRESHOLD: Duration = Duration::from_millis(1);

#[derive(Debug)]
pub enum RenderError {
    Host(HostError),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::Host(err) => write!(f, "host error during render: {err}"),
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::Host(err) => Some(err),
        }
    }
}

impl From<HostError> for RenderError {
    fn from(err: HostError) -> Self {
        RenderError::Host(err)
    }
}

/// Cross-cutting signal cell shared with setters and the context sweep.
pub(crate) struct Signals {
    needs_render: Cell<bool>,
    scheduler: Arc<dyn WorkScheduler>,
}

impl Signals {
    fn new(scheduler: Arc<dyn WorkScheduler>) -> Self {
        Self {
            needs_render: Cell::new(false),
            scheduler,
        }
    }

    pub(crate) fn request_render(&self) {
        self.needs_render.set(true);
        self.scheduler.schedule_idle();
    }

    pub(crate) fn ping(&self) {
        self.scheduler.schedule_idle();
    }

    fn take_render_request(&self) -> bool {
        self.needs_render.replace(false)
    }

    fn render_requested(&self) -> bool {
        self.needs_render.get()
    }
}

/// Weak handle into the session's signal cell. Setters, the context sweep,
/// and host-side callbacks use it to request a root re-render; requests
/// after the session is gone are dropped.
#[derive(Clone)]
pub struct RuntimeHandle(Weak<Signals>);

impl RuntimeHandle {
    pub fn request_render(&self) {
        if let Some(signals) = self.0.upgrade() {
            signals.request_render();
        }
    }
}

/// The non-generic half of the runtime: the fiber arena and every pointer
/// the scheduler owns. Hooks reach it through [`Scope`].
pub struct Session {
    pub arena: FiberArena,
    pub(crate) current_root: Option<FiberId>,
    pub(crate) wip_root: Option<FiberId>,
    pub next_unit: Option<FiberId>,
    pub(crate) deletions: Vec<FiberId>,
    pub(crate) signals: Rc<Signals>,
}

impl Session {
    fn new(scheduler: Arc<dyn WorkScheduler>) -> Self {
        Self {
            arena: FiberArena::default(),
            current_root: None,
            wip_root: None,
            next_unit: None,
            deletions: Vec::new(),
            signals: Rc::new(Signals::new(scheduler)),
        }
    }

    pub(crate) fn handle(&self) -> RuntimeHandle {
        RuntimeHandle(Rc::downgrade(&self.signals))
    }

    pub(crate) fn has_work(&self) -> bool {
        self.next_unit.is_some() || self.wip_root.is_some() || self.signals.render_requested()
    }

    /// Remove every record reachable from `root` via child/sibling links,
    /// dropping the removed fibers' context subscriptions with them.
    pub(crate) fn reclaim_tree(&mut self, root: FiberId) {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if let Some(fiber) = self.arena.remove(id) {
                for hook in &fiber.hooks {
                    if let crate::hooks::Hook::ContextSub { cell } = hook {
                        cell.unsubscribe(id);
                    }
                }
                if let Some(child) = fiber.child {
                    stack.push(child);
                }
                if let Some(sibling) = fiber.sibling {
                    stack.push(sibling);
                }
            }
        }
    }

    /// Discard an in-flight pass: the committed tree stays authoritative.
    pub(crate) fn abandon_work_in_progress(&mut self) {
        for id in self.deletions.drain(..) {
            if let Some(fiber) = self.arena.get_mut(id) {
                fiber.effect_tag = EffectTag::None;
            }
        }
        if let Some(wip) = self.wip_root.take() {
            self.reclaim_tree(wip);
        }
        self.next_unit = None;
    }

    /// Establish a fresh work-in-progress root over `container`. Any
    /// pending re-render request is folded in: the new pass drains state
    /// queues itself.
    fn start_pass(&mut self, props: Rc<Props>, container: HostId) {
        self.abandon_work_in_progress();
        self.signals.take_render_request();
        let mut root = Fiber::root(container, props);
        root.alternate = self.current_root;
        let id = self.arena.insert(root);
        self.wip_root = Some(id);
        self.next_unit = Some(id);
    }

    /// Fold a pending re-render request into a new pass that reuses the
    /// committed root's container and props.
    fn begin_requested_pass(&mut self) {
        if !self.signals.take_render_request() {
            return;
        }
        let Some(current) = self.current_root else {
            // Nothing committed yet; the in-flight or next explicit render
            // will pick the state up anyway.
            return;
        };
        let fiber = &self.arena[current];
        let props = Rc::clone(&fiber.pending_props);
        let Some(container) = fiber.host else {
            return;
        };
        self.start_pass(props, container);
    }
}

/// One render session bound to a host tree.
pub struct Runtime<H: HostTree> {
    pub(crate) host: H,
    pub session: Session,
}

impl<H: HostTree> Runtime<H> {
    pub fn new(host: H) -> Self {
        Self::with_scheduler(host, Arc::new(NoopScheduler))
    }

    pub fn with_scheduler(host: H, scheduler: Arc<dyn WorkScheduler>) -> Self {
        Self {
            host,
            session: Session::new(scheduler),
        }
    }

    pub fn handle(&self) -> RuntimeHandle {
        self.session.handle()
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Whether another work-loop invocation would make progress.
    pub fn has_work(&self) -> bool {
        self.session.has_work()
    }

    /// Schedule a render of `element` into `container`. Replaces any
    /// in-flight pass; the actual work happens in [`Self::work_loop`].
    pub fn render(&mut self, element: Element, container: HostId) {
        let mut props = Props::new();
        props.children = vec![element];
        self.session.start_pass(Rc::new(props), container);
        self.session.signals.ping();
    }

    /// One driver invocation: performs units until the deadline's slice is
    /// exhausted, committing when the whole tree has been walked. At least
    /// one unit runs per call, so progress is guaranteed.
    pub fn work_loop(&mut self, deadline: &dyn Deadline) -> Result<(), RenderError> {
        self.session.begin_requested_pass();

        while let Some(unit) = self.session.next_unit {
            match self.perform_unit_of_work(unit) {
                Ok(next) => self.session.next_unit = next,
                Err(err) => {
                    log::error!("render pass failed: {err}; discarding work-in-progress tree");
                    self.session.abandon_work_in_progress();
                    return Err(err.into());
                }
            }
            if deadline.time_remaining() < YIELD_THRESHOLD {
                break;
            }
        }

        if self.session.next_unit.is_none() && self.session.wip_root.is_some() {
            if let Err(err) = self.commit_root() {
                log::error!("commit failed: {err}; discarding work-in-progress tree");
                self.session.abandon_work_in_progress();
                return Err(err.into());
            }
        }

        if self.session.has_work() {
            self.session.signals.ping();
        }
        Ok(())
    }

    /// Begin-phase processing for one fiber, returning the next unit in
    /// pre-order (child first, then sibling, climbing on exhaustion).
    fn perform_unit_of_work(&mut self, id: FiberId) -> Result<Option<FiberId>, HostError> {
        enum Step {
            CreateHost(String),
            CreateText(String),
            Component(ComponentFn),
            Provider,
            Plain,
        }

        let step = {
            let fiber = &self.session.arena[id];
            match &fiber.kind {
                FiberKind::Host(tag) if fiber.host.is_none() => Step::CreateHost(tag.clone()),
                FiberKind::Text(text) if fiber.host.is_none() => Step::CreateText(text.clone()),
                FiberKind::Component(func) => Step::Component(*func),
                FiberKind::Provider(_) => Step::Provider,
                _ => Step::Plain,
            }
        };

        match step {
            Step::CreateHost(tag) => {
                let node = self.host.create_node(&tag)?;
                // Initial props go onto the still-detached node; attachment
                // is the commit phase's job.
                let props = Rc::clone(&self.session.arena[id].pending_props);
                update_host_props(&mut self.host, node, None, &props)?;
                self.session.arena[id].host = Some(node);
                self.reconcile_pending_children(id);
            }
            Step::CreateText(text) => {
                let node = self.host.create_text_node(&text)?;
                self.session.arena[id].host = Some(node);
            }
            Step::Component(func) => {
                let (element, used) = {
                    let mut scope = Scope::new(&mut self.session, id);
                    let element = func(&mut scope);
                    (element, scope.cursor)
                };
                if let Some(alternate) = self.session.arena[id].alternate {
                    let previous = self.session.arena[alternate].hooks.len();
                    if previous != used {
                        panic!(
                            "hook count changed between renders: {previous} hooks last render, {used} now"
                        );
                    }
                }
                self.session.reconcile_children(id, vec![element]);
            }
            Step::Provider => {
                {
                    let fiber = &self.session.arena[id];
                    if let (FiberKind::Provider(cell), Some(value)) =
                        (&fiber.kind, &fiber.provider_value)
                    {
                        // Publish before the subtree renders so descendants
                        // observe the new value this pass.
                        cell.publish(value);
                    }
                }
                self.reconcile_pending_children(id);
            }
            Step::Plain => {
                if !matches!(self.session.arena[id].kind, FiberKind::Text(_)) {
                    self.reconcile_pending_children(id);
                }
            }
        }

        Ok(self.next_unit_after(id))
    }

    fn reconcile_pending_children(&mut self, id: FiberId) {
        let children = self.session.arena[id].pending_props.children.clone();
        self.session.reconcile_children(id, children);
    }

    fn next_unit_after(&self, id: FiberId) -> Option<FiberId> {
        if let Some(child) = self.session.arena[id].child {
            return Some(child);
        }
        let mut cursor = Some(id);
        while let Some(fid) = cursor {
            let fiber = &self.session.arena[fid];
            if let Some(sibling) = fiber.sibling {
                return Some(sibling);
            }
            cursor = fiber.parent;
        }
        None
    }
}
