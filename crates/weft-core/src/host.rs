//! The output-tree capability.
//!
//! The runtime mutates a retained output tree (a DOM, a scene graph, a test
//! double) through this trait but never implements the tree itself.
//! `MemoryHost` is the bundled in-memory implementation used by tests and
//! demos.

use std::fmt;

use indexmap::IndexMap;

use crate::element::{Event, EventHandler, PropValue};

/// Opaque handle to an output-tree node.
pub type HostId = usize;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HostError {
    Missing { id: HostId },
    NotAChild { parent: HostId, child: HostId },
    NotAText { id: HostId },
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostError::Missing { id } => write!(f, "host node {id} missing"),
            HostError::NotAChild { parent, child } => {
                write!(f, "host node {child} is not a child of {parent}")
            }
            HostError::NotAText { id } => write!(f, "host node {id} is not a text node"),
        }
    }
}

impl std::error::Error for HostError {}

pub trait HostTree {
    fn create_node(&mut self, tag: &str) -> Result<HostId, HostError>;
    fn create_text_node(&mut self, text: &str) -> Result<HostId, HostError>;
    fn append_child(&mut self, parent: HostId, child: HostId) -> Result<(), HostError>;
    fn remove_child(&mut self, parent: HostId, child: HostId) -> Result<(), HostError>;
    fn set_attribute(
        &mut self,
        node: HostId,
        name: &str,
        value: &PropValue,
    ) -> Result<(), HostError>;
    fn remove_attribute(&mut self, node: HostId, name: &str) -> Result<(), HostError>;
    fn set_text(&mut self, node: HostId, text: &str) -> Result<(), HostError>;
    fn add_event_listener(
        &mut self,
        node: HostId,
        event: &str,
        handler: EventHandler,
    ) -> Result<(), HostError>;
    fn remove_event_listener(&mut self, node: HostId, event: &str) -> Result<(), HostError>;
}

enum MemoryNodeKind {
    Container,
    Element(String),
    Text,
}

struct MemoryNode {
    kind: MemoryNodeKind,
    text: String,
    attrs: IndexMap<String, PropValue>,
    listeners: IndexMap<String, EventHandler>,
    children: Vec<HostId>,
    parent: Option<HostId>,
}

impl MemoryNode {
    fn element(tag: &str) -> Self {
        Self {
            kind: MemoryNodeKind::Element(tag.to_owned()),
            text: String::new(),
            attrs: IndexMap::new(),
            listeners: IndexMap::new(),
            children: Vec::new(),
            parent: None,
        }
    }

    fn text_node(text: &str) -> Self {
        Self {
            kind: MemoryNodeKind::Text,
            text: text.to_owned(),
            attrs: IndexMap::new(),
            listeners: IndexMap::new(),
            children: Vec::new(),
            parent: None,
        }
    }

    fn container() -> Self {
        Self {
            kind: MemoryNodeKind::Container,
            text: String::new(),
            attrs: IndexMap::new(),
            listeners: IndexMap::new(),
            children: Vec::new(),
            parent: None,
        }
    }
}

/// Slab-backed retained tree for tests and demos.
#[derive(Default)]
pub struct MemoryHost {
    nodes: Vec<Option<MemoryNode>>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a render target container.
    pub fn create_container(&mut self) -> HostId {
        self.push(MemoryNode::container())
    }

    fn push(&mut self, node: MemoryNode) -> HostId {
        let id = self.nodes.len();
        self.nodes.push(Some(node));
        id
    }

    fn node(&self, id: HostId) -> Result<&MemoryNode, HostError> {
        self.nodes
            .get(id)
            .and_then(|slot| slot.as_ref())
            .ok_or(HostError::Missing { id })
    }

    fn node_mut(&mut self, id: HostId) -> Result<&mut MemoryNode, HostError> {
        self.nodes
            .get_mut(id)
            .and_then(|slot| slot.as_mut())
            .ok_or(HostError::Missing { id })
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: HostId) -> bool {
        self.nodes.get(id).map_or(false, |slot| slot.is_some())
    }

    pub fn tag(&self, id: HostId) -> Option<&str> {
        match &self.node(id).ok()?.kind {
            MemoryNodeKind::Element(tag) => Some(tag),
            _ => None,
        }
    }

    pub fn text(&self, id: HostId) -> Option<&str> {
        let node = self.node(id).ok()?;
        matches!(node.kind, MemoryNodeKind::Text).then_some(node.text.as_str())
    }

    pub fn attr(&self, id: HostId, name: &str) -> Option<&PropValue> {
        self.node(id).ok()?.attrs.get(name)
    }

    pub fn has_listener(&self, id: HostId, event: &str) -> bool {
        self.node(id)
            .map(|node| node.listeners.contains_key(event))
            .unwrap_or(false)
    }

    pub fn children_of(&self, id: HostId) -> Vec<HostId> {
        self.node(id)
            .map(|node| node.children.clone())
            .unwrap_or_default()
    }

    pub fn parent_of(&self, id: HostId) -> Option<HostId> {
        self.node(id).ok()?.parent
    }

    /// Fire the listener registered under `event.name()` on `node`.
    /// Returns whether a listener ran.
    pub fn dispatch(&self, node: HostId, event: &Event) -> bool {
        let handler = match self.node(node) {
            Ok(n) => n.listeners.get(event.name()).cloned(),
            Err(_) => None,
        };
        match handler {
            Some(handler) => {
                handler(event);
                true
            }
            None => false,
        }
    }

    /// Text content of a subtree, in document order.
    pub fn text_content(&self, id: HostId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: HostId, out: &mut String) {
        if let Ok(node) = self.node(id) {
            if matches!(node.kind, MemoryNodeKind::Text) {
                out.push_str(&node.text);
            }
            for child in &node.children {
                self.collect_text(*child, out);
            }
        }
    }

    /// Render the subtree under `root` as an indented debugging view.
    pub fn dump_tree(&self, root: HostId) -> String {
        let mut output = String::new();
        self.dump_node(&mut output, root, 0);
        output
    }

    fn dump_node(&self, output: &mut String, id: HostId, depth: usize) {
        let indent = "  ".repeat(depth);
        match self.node(id) {
            Ok(node) => {
                match &node.kind {
                    MemoryNodeKind::Container => {
                        output.push_str(&format!("{indent}[{id}] #container\n"));
                    }
                    MemoryNodeKind::Element(tag) => {
                        let mut line = format!("{indent}[{id}] <{tag}");
                        for (name, value) in &node.attrs {
                            line.push_str(&format!(" {name}={value:?}"));
                        }
                        for name in node.listeners.keys() {
                            line.push_str(&format!(" @{name}"));
                        }
                        line.push_str(">\n");
                        output.push_str(&line);
                    }
                    MemoryNodeKind::Text => {
                        output.push_str(&format!("{indent}[{id}] {:?}\n", node.text));
                    }
                }
                for child in &node.children {
                    self.dump_node(output, *child, depth + 1);
                }
            }
            Err(_) => output.push_str(&format!("{indent}[{id}] (missing)\n")),
        }
    }
}

impl HostTree for MemoryHost {
    fn create_node(&mut self, tag: &str) -> Result<HostId, HostError> {
        Ok(self.push(MemoryNode::element(tag)))
    }

    fn create_text_node(&mut self, text: &str) -> Result<HostId, HostError> {
        Ok(self.push(MemoryNode::text_node(text)))
    }

    fn append_child(&mut self, parent: HostId, child: HostId) -> Result<(), HostError> {
        self.node(parent)?;
        let previous = {
            let node = self.node_mut(child)?;
            node.parent.replace(parent)
        };
        // Reparenting detaches from the previous parent first.
        if let Some(previous) = previous {
            if previous != parent {
                if let Ok(node) = self.node_mut(previous) {
                    node.children.retain(|id| *id != child);
                }
            }
        }
        let node = self.node_mut(parent)?;
        if !node.children.contains(&child) {
            node.children.push(child);
        }
        Ok(())
    }

    fn remove_child(&mut self, parent: HostId, child: HostId) -> Result<(), HostError> {
        let node = self.node_mut(parent)?;
        let position = node
            .children
            .iter()
            .position(|id| *id == child)
            .ok_or(HostError::NotAChild { parent, child })?;
        node.children.remove(position);
        // Removal drops the detached subtree entirely.
        self.drop_subtree(child);
        Ok(())
    }

    fn set_attribute(
        &mut self,
        node: HostId,
        name: &str,
        value: &PropValue,
    ) -> Result<(), HostError> {
        self.node_mut(node)?
            .attrs
            .insert(name.to_owned(), value.clone());
        Ok(())
    }

    fn remove_attribute(&mut self, node: HostId, name: &str) -> Result<(), HostError> {
        self.node_mut(node)?.attrs.shift_remove(name);
        Ok(())
    }

    fn set_text(&mut self, node: HostId, text: &str) -> Result<(), HostError> {
        let inner = self.node_mut(node)?;
        if !matches!(inner.kind, MemoryNodeKind::Text) {
            return Err(HostError::NotAText { id: node });
        }
        inner.text = text.to_owned();
        Ok(())
    }

    fn add_event_listener(
        &mut self,
        node: HostId,
        event: &str,
        handler: EventHandler,
    ) -> Result<(), HostError> {
        self.node_mut(node)?
            .listeners
            .insert(event.to_owned(), handler);
        Ok(())
    }

    fn remove_event_listener(&mut self, node: HostId, event: &str) -> Result<(), HostError> {
        self.node_mut(node)?.listeners.shift_remove(event);
        Ok(())
    }
}

impl MemoryHost {
    fn drop_subtree(&mut self, id: HostId) {
        let children = match self.nodes.get_mut(id).and_then(|slot| slot.take()) {
            Some(node) => node.children,
            None => return,
        };
        for child in children {
            self.drop_subtree(child);
        }
    }
}
