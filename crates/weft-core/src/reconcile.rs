//! The diff engine.
//!
//! Runs once per fiber during its unit of work: walks the previous child
//! chain and the new element sequence, producing a fresh sibling chain
//! tagged with effect intents for the commit engine.

use std::collections::VecDeque;

use crate::collections::map::HashMap;
use crate::element::{Element, ElementKey};
use crate::fiber::{EffectTag, Fiber, FiberId};
use crate::runtime::Session;

impl Session {
    /// Build `parent.child` from `elements`, claiming old fibers keyed-first
    /// (by key, any position) and positionally for unkeyed children.
    ///
    /// A claim whose kind matches becomes an in-place `Update` carrying the
    /// old output handle — so keyed same-type pairs survive reordering
    /// without new handles. Host nodes are not physically moved on reorder;
    /// placement is linear.
    pub(crate) fn reconcile_children(&mut self, parent: FiberId, elements: Vec<Element>) {
        let alternate = self.arena[parent].alternate;
        let mut old_chain = Vec::new();
        if let Some(alt) = alternate {
            let mut cursor = self.arena[alt].child;
            while let Some(id) = cursor {
                old_chain.push(id);
                cursor = self.arena[id].sibling;
            }
        }

        let mut keyed: HashMap<ElementKey, VecDeque<FiberId>> = HashMap::new();
        let mut unkeyed: VecDeque<FiberId> = VecDeque::new();
        for id in &old_chain {
            match self.arena[*id].key.clone() {
                Some(key) => keyed.entry(key).or_default().push_back(*id),
                None => unkeyed.push_back(*id),
            }
        }

        let new_count = elements.len();
        let mut reused = 0usize;
        let mut first = None;
        let mut prev: Option<FiberId> = None;

        for element in elements {
            let candidate = match element.element_key() {
                Some(key) => keyed.get_mut(key).and_then(|list| list.pop_front()),
                None => unkeyed.pop_front(),
            };

            let new_id = match candidate {
                Some(old_id) if self.arena[old_id].kind.matches(element.kind()) => {
                    let mut fiber = Fiber::from_element(&element);
                    fiber.host = self.arena[old_id].host;
                    fiber.alternate = Some(old_id);
                    fiber.effect_tag = EffectTag::Update;
                    reused += 1;
                    self.arena.insert(fiber)
                }
                candidate => {
                    if let Some(old_id) = candidate {
                        self.mark_deleted(old_id);
                    }
                    let mut fiber = Fiber::from_element(&element);
                    fiber.effect_tag = EffectTag::Placement;
                    self.arena.insert(fiber)
                }
            };

            self.arena[new_id].parent = Some(parent);
            match prev {
                None => first = Some(new_id),
                Some(prev_id) => self.arena[prev_id].sibling = Some(new_id),
            }
            prev = Some(new_id);
        }

        // Everything unclaimed has no counterpart in the new sequence.
        for list in keyed.into_values() {
            for id in list {
                self.mark_deleted(id);
            }
        }
        for id in unkeyed {
            self.mark_deleted(id);
        }

        self.arena[parent].child = first;
        log::trace!(
            "reconciled {new_count} children ({} old, {reused} reused)",
            old_chain.len()
        );
    }

    /// Deletions are tracked only through fibers still reachable from the
    /// committed tree; freshly created work-in-progress fibers have no host
    /// presence to remove.
    fn mark_deleted(&mut self, id: FiberId) {
        self.arena[id].effect_tag = EffectTag::Deletion;
        self.deletions.push(id);
    }
}
