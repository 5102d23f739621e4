//! Deterministic drivers and harnesses for exercising the runtime.
//!
//! Real hosts re-arm the work loop from an idle callback; tests want the
//! loop under their own control. [`TestScheduler`] records re-arm requests
//! behind a take-flag, the deadline types make yielding deterministic, and
//! [`TestHarness`] bundles a runtime over a [`MemoryHost`] with a settle
//! loop.

use std::cell::Cell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use weft_core::{
    Deadline, Element, Event, HostId, MemoryHost, RenderError, Runtime, WorkScheduler,
};

/// Scheduler that records idle requests for the test to observe.
#[derive(Default)]
pub struct TestScheduler {
    requested: AtomicBool,
}

impl TestScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether an idle slot was requested since the last call.
    pub fn take_request(&self) -> bool {
        self.requested.swap(false, Ordering::SeqCst)
    }
}

impl WorkScheduler for TestScheduler {
    fn schedule_idle(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }
}

/// Deadline that never yields.
pub struct Unlimited;

impl Deadline for Unlimited {
    fn time_remaining(&self) -> Duration {
        Duration::from_secs(3600)
    }
}

/// Deadline that reports an exhausted slice after `polls` polls, so a
/// work-loop invocation performs a bounded number of units regardless of
/// wall-clock time.
pub struct CountdownDeadline {
    remaining: Cell<u32>,
}

impl CountdownDeadline {
    pub fn new(polls: u32) -> Self {
        Self {
            remaining: Cell::new(polls),
        }
    }
}

impl Deadline for CountdownDeadline {
    fn time_remaining(&self) -> Duration {
        let left = self.remaining.get();
        if left == 0 {
            return Duration::ZERO;
        }
        self.remaining.set(left - 1);
        Duration::from_millis(5)
    }
}

/// A runtime over a [`MemoryHost`] plus the drive-until-settled loop that
/// integration tests share.
pub struct TestHarness {
    runtime: Runtime<MemoryHost>,
    scheduler: Arc<TestScheduler>,
    container: HostId,
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

impl TestHarness {
    pub fn new() -> Self {
        let mut host = MemoryHost::new();
        let container = host.create_container();
        let scheduler = Arc::new(TestScheduler::new());
        let runtime = Runtime::with_scheduler(host, scheduler.clone());
        Self {
            runtime,
            scheduler,
            container,
        }
    }

    pub fn container(&self) -> HostId {
        self.container
    }

    pub fn runtime(&mut self) -> &mut Runtime<MemoryHost> {
        &mut self.runtime
    }

    pub fn host(&self) -> &MemoryHost {
        self.runtime.host()
    }

    pub fn host_mut(&mut self) -> &mut MemoryHost {
        self.runtime.host_mut()
    }

    /// Schedule a render into the harness container.
    pub fn render(&mut self, element: Element) {
        self.runtime.render(element, self.container);
    }

    /// One driver invocation under an explicit deadline.
    pub fn pump(&mut self, deadline: &dyn Deadline) -> Result<(), RenderError> {
        self.runtime.work_loop(deadline)
    }

    /// Drive work loops until no work remains. Panics if the runtime fails
    /// to settle, which usually means a render loop is re-requesting
    /// itself every pass.
    pub fn settle(&mut self) {
        let mut ticks = 0u32;
        while self.runtime.has_work() {
            self.runtime
                .work_loop(&Unlimited)
                .expect("render failed while settling");
            ticks += 1;
            assert!(ticks < 64, "runtime failed to settle after {ticks} ticks");
        }
        let _ = self.scheduler.take_request();
    }

    /// Whether the runtime asked for an idle slot since the last check.
    pub fn idle_requested(&self) -> bool {
        self.scheduler.take_request()
    }

    /// Fire an event listener on a host node.
    pub fn dispatch(&self, node: HostId, event: &Event) -> bool {
        self.runtime.host().dispatch(node, event)
    }

    /// First node with `tag` in document order under the container.
    pub fn find_by_tag(&self, tag: &str) -> Option<HostId> {
        self.find_all_by_tag(tag).into_iter().next()
    }

    pub fn find_all_by_tag(&self, tag: &str) -> Vec<HostId> {
        let host = self.runtime.host();
        let mut found = Vec::new();
        let mut stack = vec![self.container];
        while let Some(id) = stack.pop() {
            if host.tag(id) == Some(tag) {
                found.push(id);
            }
            let mut children = host.children_of(id);
            children.reverse();
            stack.extend(children);
        }
        found
    }

    pub fn dump(&self) -> String {
        self.runtime.host().dump_tree(self.container)
    }
}
