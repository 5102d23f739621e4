#![doc = r"Fiber-based UI reconciliation runtime.

Elements describe a tree, fibers mirror it as interruptible units of work,
a cooperative work loop diffs old against new one fiber at a time, and a
commit phase flushes the verdicts into a host-owned output tree. Hooks give
component fibers positional state, effects, memoized values, and context."]

pub mod collections;
pub mod commit;
pub mod context;
pub mod element;
pub mod fiber;
pub mod hash;
pub mod hooks;
pub mod host;
pub mod reconcile;
pub mod runtime;

pub use context::{create_context, Context, ProviderSpec};
pub use element::{
    create_element, Child, Element, ElementKey, ElementKind, Event, EventHandler, PropValue, Props,
};
pub use fiber::{EffectTag, FiberId};
pub use hooks::{Cleanup, ComponentFn, Deps, Scope, Setter};
pub use host::{HostError, HostId, HostTree, MemoryHost};
pub use runtime::{
    Deadline, NoopScheduler, RenderError, Runtime, RuntimeHandle, TimeBudget, WorkScheduler,
};

#[cfg(test)]
mod tests {
    mod element_tests;
}
