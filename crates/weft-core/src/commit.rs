//! The commit engine.
//!
//! Runs once per completed render pass, after the work loop drains:
//! deletions first, then placement/update mutations over the finished
//! work-in-progress tree, then deferred effects, then the context sweep.
//! Finally the buffers swap and the superseded tree's records are
//! reclaimed.

use std::rc::Rc;

use indexmap::IndexMap;

use crate::element::{PropValue, Props};
use crate::fiber::{EffectTag, FiberId, FiberKind};
use crate::hooks::{Cleanup, CleanupSlot, EffectBody, Hook};
use crate::host::{HostError, HostId, HostTree};
use crate::runtime::Runtime;

/// Diff `old` against `new` props on a host node: listeners absent or
/// changed in the new set are removed, attributes absent are removed, then
/// new or changed entries are applied. The `children` pseudo-prop lives
/// outside the attr map and never reaches the host.
pub(crate) fn update_host_props<H: HostTree>(
    host: &mut H,
    node: HostId,
    old: Option<&Props>,
    new: &Props,
) -> Result<(), HostError> {
    let empty = IndexMap::new();
    let old_attrs = old.map(|props| &props.attrs).unwrap_or(&empty);

    for (name, value) in old_attrs {
        let next = new.attrs.get(name);
        match value {
            PropValue::Handler(_) => {
                if next.map_or(true, |n| n != value) {
                    host.remove_event_listener(node, name)?;
                }
            }
            _ => {
                if next.is_none() {
                    host.remove_attribute(node, name)?;
                }
            }
        }
    }

    for (name, value) in &new.attrs {
        let unchanged = old_attrs.get(name).map_or(false, |prev| prev == value);
        if unchanged {
            continue;
        }
        match value {
            PropValue::Handler(handler) => {
                host.add_event_listener(node, name, Rc::clone(handler))?
            }
            other => host.set_attribute(node, name, other)?,
        }
    }

    Ok(())
}

impl<H: HostTree> Runtime<H> {
    pub(crate) fn commit_root(&mut self) -> Result<(), HostError> {
        let Some(wip) = self.session.wip_root else {
            return Ok(());
        };

        let deletions: Vec<FiberId> = self.session.deletions.drain(..).collect();
        for id in deletions {
            self.commit_deletion(id)?;
        }

        let root_child = self.session.arena[wip].child;
        self.commit_work(root_child)?;
        self.run_effects(root_child);

        let mut reschedule = false;
        self.sweep_context_updates(root_child, &mut reschedule);

        // Swap buffers: the committed tree becomes current and the
        // superseded one (including deletion-tagged subtrees, which are
        // still linked into it) is reclaimed in one walk.
        self.session.wip_root = None;
        let old = self.session.current_root.replace(wip);
        if let Some(old) = old {
            self.session.reclaim_tree(old);
        }
        self.clear_alternates(wip);

        if reschedule {
            self.session.signals.request_render();
        }
        log::debug!("committed render pass");
        Ok(())
    }

    /// Nearest ancestor output handle, skipping fibers that own none.
    fn find_host_ancestor(&self, id: FiberId) -> Option<HostId> {
        let mut cursor = self.session.arena[id].parent;
        while let Some(pid) = cursor {
            let fiber = &self.session.arena[pid];
            if let Some(host) = fiber.host {
                return Some(host);
            }
            cursor = fiber.parent;
        }
        None
    }

    fn commit_deletion(&mut self, id: FiberId) -> Result<(), HostError> {
        self.release_subtree(id);
        let Some(parent_host) = self.find_host_ancestor(id) else {
            log::warn!("deleted fiber has no host ancestor; skipping detach");
            return Ok(());
        };
        self.detach_hosts(id, parent_host)
    }

    /// Run effect cleanups and drop context subscriptions for a deleted
    /// fiber and everything below it.
    fn release_subtree(&mut self, id: FiberId) {
        let mut cleanups: Vec<Cleanup> = Vec::new();
        let child = {
            let fiber = &mut self.session.arena[id];
            for hook in &mut fiber.hooks {
                match hook {
                    Hook::Effect { cleanup, .. } => cleanups.extend(cleanup.borrow_mut().take()),
                    Hook::ContextSub { cell } => cell.unsubscribe(id),
                    _ => {}
                }
            }
            fiber.child
        };
        for cleanup in cleanups {
            cleanup();
        }
        let mut cursor = child;
        while let Some(cid) = cursor {
            self.release_subtree(cid);
            cursor = self.session.arena[cid].sibling;
        }
    }

    /// Detach the deleted fiber's output handle, descending past fibers
    /// that own none to the nearest descendants that do.
    fn detach_hosts(&mut self, id: FiberId, parent_host: HostId) -> Result<(), HostError> {
        let (host, child) = {
            let fiber = &self.session.arena[id];
            (fiber.host, fiber.child)
        };
        if let Some(node) = host {
            match self.host.remove_child(parent_host, node) {
                Ok(()) => {}
                Err(HostError::NotAChild { .. }) => {
                    log::warn!("host node {node} already detached from {parent_host}");
                }
                Err(err) => return Err(err),
            }
            return Ok(());
        }
        let mut cursor = child;
        while let Some(cid) = cursor {
            self.detach_hosts(cid, parent_host)?;
            cursor = self.session.arena[cid].sibling;
        }
        Ok(())
    }

    fn commit_work(&mut self, id: Option<FiberId>) -> Result<(), HostError> {
        let Some(id) = id else {
            return Ok(());
        };

        let (tag, host, child, sibling) = {
            let fiber = &self.session.arena[id];
            (fiber.effect_tag, fiber.host, fiber.child, fiber.sibling)
        };

        match tag {
            EffectTag::Placement => {
                if let Some(node) = host {
                    if let Some(parent_host) = self.find_host_ancestor(id) {
                        self.host.append_child(parent_host, node)?;
                    }
                }
            }
            EffectTag::Update => {
                if let Some(node) = host {
                    self.commit_update(id, node)?;
                }
            }
            EffectTag::None | EffectTag::Deletion => {}
        }

        {
            let fiber = &mut self.session.arena[id];
            fiber.memoized_props = Some(Rc::clone(&fiber.pending_props));
            fiber.effect_tag = EffectTag::None;
        }

        self.commit_work(child)?;
        self.commit_work(sibling)
    }

    fn commit_update(&mut self, id: FiberId, node: HostId) -> Result<(), HostError> {
        let fiber = &self.session.arena[id];
        if let FiberKind::Text(new_text) = &fiber.kind {
            let changed = fiber
                .alternate
                .and_then(|alt| self.session.arena[alt].kind.text())
                .map_or(true, |old_text| old_text != new_text);
            if changed {
                let text = new_text.clone();
                self.host.set_text(node, &text)?;
            }
            return Ok(());
        }

        let new = Rc::clone(&fiber.pending_props);
        let old = fiber
            .alternate
            .and_then(|alt| self.session.arena[alt].memoized_props.clone());
        update_host_props(&mut self.host, node, old.as_deref(), &new)
    }

    /// Execute effects whose render-time decision was "rerun", depth-first,
    /// parent before children. Cleanup from the previous run fires before
    /// the new body.
    fn run_effects(&mut self, id: Option<FiberId>) {
        let Some(id) = id else {
            return;
        };

        let mut jobs: Vec<(EffectBody, CleanupSlot)> = Vec::new();
        let (child, sibling) = {
            let fiber = &mut self.session.arena[id];
            for hook in &mut fiber.hooks {
                if let Hook::Effect {
                    body,
                    cleanup,
                    pending,
                    ..
                } = hook
                {
                    if !*pending {
                        continue;
                    }
                    *pending = false;
                    if let Some(body) = body.take() {
                        jobs.push((body, Rc::clone(cleanup)));
                    }
                }
            }
            (fiber.child, fiber.sibling)
        };

        for (body, slot) in jobs {
            let previous = slot.borrow_mut().take();
            if let Some(cleanup) = previous {
                cleanup();
            }
            *slot.borrow_mut() = body();
        }

        self.run_effects(child);
        self.run_effects(sibling);
    }

    /// Post-commit provider check: a provider whose cell changed value and
    /// has subscribers triggers one root re-render after this commit.
    fn sweep_context_updates(&mut self, id: Option<FiberId>, reschedule: &mut bool) {
        let Some(id) = id else {
            return;
        };
        let (child, sibling) = {
            let fiber = &self.session.arena[id];
            if let FiberKind::Provider(cell) = &fiber.kind {
                if cell.take_needs_update() && cell.has_subscribers() {
                    *reschedule = true;
                }
            }
            (fiber.child, fiber.sibling)
        };
        self.sweep_context_updates(child, reschedule);
        self.sweep_context_updates(sibling, reschedule);
    }

    /// The previous buffer is gone; drop the committed tree's dangling
    /// back-references.
    fn clear_alternates(&mut self, root: FiberId) {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if let Some(fiber) = self.session.arena.get_mut(id) {
                fiber.alternate = None;
                if let Some(child) = fiber.child {
                    stack.push(child);
                }
                if let Some(sibling) = fiber.sibling {
                    stack.push(sibling);
                }
            }
        }
    }
}
