//! The host tree adapter: the only seam through which the engine touches
//! the real (or simulated) output tree.

use std::fmt;

use indexmap::IndexMap;

use crate::element::{ElementKind, EventHandler, PropValue, Props};
use crate::hash::DefaultHashBuilder;

pub type HostId = usize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    Missing { id: HostId },
    TypeMismatch { id: HostId, expected: &'static str },
    NotAChild { parent: HostId, child: HostId },
    Unrepresentable { kind: &'static str },
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostError::Missing { id } => write!(f, "host node {id} missing"),
            HostError::TypeMismatch { id, expected } => {
                write!(f, "host node {id} type mismatch; expected {expected}")
            }
            HostError::NotAChild { parent, child } => {
                write!(f, "host node {child} is not a child of {parent}")
            }
            HostError::Unrepresentable { kind } => {
                write!(f, "{kind} nodes have no host representation")
            }
        }
    }
}

impl std::error::Error for HostError {}

/// Mutation commands the engine issues against the host tree. Creation
/// happens during the render phase (nodes are built detached); structural
/// attachment, detachment, and prop diffs happen during commit.
///
/// The adapter never retains ownership of the nodes it creates; the fiber
/// tree holds the only live references, by id.
pub trait HostAdapter {
    fn create_node(&mut self, kind: &ElementKind) -> Result<HostId, HostError>;
    fn set_attribute(
        &mut self,
        node: HostId,
        name: &str,
        value: &PropValue,
    ) -> Result<(), HostError>;
    fn clear_attribute(&mut self, node: HostId, name: &str) -> Result<(), HostError>;
    fn attach_listener(
        &mut self,
        node: HostId,
        event: &str,
        handler: &EventHandler,
    ) -> Result<(), HostError>;
    fn detach_listener(&mut self, node: HostId, event: &str) -> Result<(), HostError>;
    fn set_text(&mut self, node: HostId, value: &str) -> Result<(), HostError>;
    fn attach(&mut self, parent: HostId, child: HostId) -> Result<(), HostError>;
    fn detach(&mut self, parent: HostId, child: HostId) -> Result<(), HostError>;

    /// Reconciles one node's attributes and listeners against a prop
    /// change. Order is significant: stale listeners detach before new
    /// ones attach, and gone attributes clear before changed ones are
    /// set, so a node is never observed with two registrations for the
    /// same event. `children` is not an attribute and never appears here.
    fn apply_prop_diff(
        &mut self,
        node: HostId,
        prev: &Props,
        next: &Props,
    ) -> Result<(), HostError> {
        // listeners that changed or are gone
        for (name, value) in prev.attrs.iter() {
            if !Props::is_event(name) {
                continue;
            }
            if next.attrs.get(name) != Some(value) {
                self.detach_listener(node, &Props::event_type(name))?;
            }
        }
        // plain attributes that are gone
        for name in prev.attrs.keys() {
            if Props::is_event(name) {
                continue;
            }
            if !next.attrs.contains_key(name) {
                self.clear_attribute(node, name)?;
            }
        }
        // new or changed plain attributes
        for (name, value) in next.attrs.iter() {
            if Props::is_event(name) {
                continue;
            }
            if prev.attrs.get(name) != Some(value) {
                self.set_attribute(node, name, value)?;
            }
        }
        // new or changed listeners
        for (name, value) in next.attrs.iter() {
            if !Props::is_event(name) {
                continue;
            }
            if prev.attrs.get(name) == Some(value) {
                continue;
            }
            if let PropValue::Handler(handler) = value {
                self.attach_listener(node, &Props::event_type(name), handler)?;
            }
        }
        Ok(())
    }
}

enum MemoryNodeKind {
    Element { tag: String },
    Text { value: String },
}

struct MemoryNode {
    kind: MemoryNodeKind,
    attrs: IndexMap<String, PropValue, DefaultHashBuilder>,
    listeners: IndexMap<String, EventHandler, DefaultHashBuilder>,
    children: Vec<HostId>,
}

impl MemoryNode {
    fn new(kind: MemoryNodeKind) -> Self {
        Self {
            kind,
            attrs: IndexMap::default(),
            listeners: IndexMap::default(),
            children: Vec::new(),
        }
    }
}

/// In-memory reference adapter: a slab of nodes addressed by id. Used by
/// the test suites and the demo; doubles as the specification of adapter
/// behavior for real host bindings.
///
/// Detached nodes stay in the slab (the engine detaches, it never
/// destroys); they simply become unreachable from the root.
#[derive(Default)]
pub struct MemoryHost {
    nodes: Vec<Option<MemoryNode>>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    fn node(&self, id: HostId) -> Result<&MemoryNode, HostError> {
        self.nodes
            .get(id)
            .and_then(Option::as_ref)
            .ok_or(HostError::Missing { id })
    }

    fn node_mut(&mut self, id: HostId) -> Result<&mut MemoryNode, HostError> {
        self.nodes
            .get_mut(id)
            .and_then(Option::as_mut)
            .ok_or(HostError::Missing { id })
    }

    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn tag(&self, id: HostId) -> Result<&str, HostError> {
        match &self.node(id)?.kind {
            MemoryNodeKind::Element { tag } => Ok(tag),
            MemoryNodeKind::Text { .. } => Err(HostError::TypeMismatch {
                id,
                expected: "element",
            }),
        }
    }

    pub fn text(&self, id: HostId) -> Result<&str, HostError> {
        match &self.node(id)?.kind {
            MemoryNodeKind::Text { value } => Ok(value),
            MemoryNodeKind::Element { .. } => Err(HostError::TypeMismatch {
                id,
                expected: "text",
            }),
        }
    }

    pub fn attr(&self, id: HostId, name: &str) -> Result<Option<&PropValue>, HostError> {
        Ok(self.node(id)?.attrs.get(name))
    }

    pub fn children(&self, id: HostId) -> Result<&[HostId], HostError> {
        Ok(&self.node(id)?.children)
    }

    pub fn has_listener(&self, id: HostId, event: &str) -> Result<bool, HostError> {
        Ok(self.node(id)?.listeners.contains_key(event))
    }

    /// Fires the node's listener for `event`, if any. Returns whether a
    /// listener ran. The handler is cloned out first so it may freely
    /// re-enter engine state (the usual path: a click scheduling a
    /// re-render).
    pub fn dispatch(&self, id: HostId, event: &str) -> Result<bool, HostError> {
        let handler = self.node(id)?.listeners.get(event).cloned();
        match handler {
            Some(handler) => {
                handler.invoke();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn dump_tree(&self, root: Option<HostId>) -> String {
        let mut output = String::new();
        if let Some(root_id) = root {
            self.dump_node(&mut output, root_id, 0);
        } else {
            output.push_str("(no root)\n");
        }
        output
    }

    fn dump_node(&self, output: &mut String, id: HostId, depth: usize) {
        let indent = "  ".repeat(depth);
        match self.nodes.get(id).and_then(Option::as_ref) {
            Some(node) => {
                match &node.kind {
                    MemoryNodeKind::Element { tag } => {
                        output.push_str(&format!("{indent}[{id}] <{tag}>"));
                        for (name, value) in node.attrs.iter() {
                            if let PropValue::Text(text) = value {
                                output.push_str(&format!(" {name}={text:?}"));
                            }
                        }
                        output.push('\n');
                    }
                    MemoryNodeKind::Text { value } => {
                        output.push_str(&format!("{indent}[{id}] {value:?}\n"));
                    }
                }
                for child in node.children.clone() {
                    self.dump_node(output, child, depth + 1);
                }
            }
            None => output.push_str(&format!("{indent}[{id}] (missing)\n")),
        }
    }
}

impl HostAdapter for MemoryHost {
    fn create_node(&mut self, kind: &ElementKind) -> Result<HostId, HostError> {
        let kind = match kind {
            ElementKind::Host(tag) => MemoryNodeKind::Element { tag: tag.clone() },
            ElementKind::Text(value) => MemoryNodeKind::Text {
                value: value.clone(),
            },
            ElementKind::Component(_) => {
                return Err(HostError::Unrepresentable { kind: "component" })
            }
        };
        let id = self.nodes.len();
        self.nodes.push(Some(MemoryNode::new(kind)));
        Ok(id)
    }

    fn set_attribute(
        &mut self,
        node: HostId,
        name: &str,
        value: &PropValue,
    ) -> Result<(), HostError> {
        let node_ref = self.node_mut(node)?;
        if matches!(node_ref.kind, MemoryNodeKind::Text { .. }) {
            return Err(HostError::TypeMismatch {
                id: node,
                expected: "element",
            });
        }
        node_ref.attrs.insert(name.to_owned(), value.clone());
        Ok(())
    }

    fn clear_attribute(&mut self, node: HostId, name: &str) -> Result<(), HostError> {
        self.node_mut(node)?.attrs.shift_remove(name);
        Ok(())
    }

    fn attach_listener(
        &mut self,
        node: HostId,
        event: &str,
        handler: &EventHandler,
    ) -> Result<(), HostError> {
        self.node_mut(node)?
            .listeners
            .insert(event.to_owned(), handler.clone());
        Ok(())
    }

    fn detach_listener(&mut self, node: HostId, event: &str) -> Result<(), HostError> {
        self.node_mut(node)?.listeners.shift_remove(event);
        Ok(())
    }

    fn set_text(&mut self, node: HostId, value: &str) -> Result<(), HostError> {
        match &mut self.node_mut(node)?.kind {
            MemoryNodeKind::Text { value: slot } => {
                *slot = value.to_owned();
                Ok(())
            }
            MemoryNodeKind::Element { .. } => Err(HostError::TypeMismatch {
                id: node,
                expected: "text",
            }),
        }
    }

    fn attach(&mut self, parent: HostId, child: HostId) -> Result<(), HostError> {
        self.node(child)?;
        let parent_ref = self.node_mut(parent)?;
        if matches!(parent_ref.kind, MemoryNodeKind::Text { .. }) {
            return Err(HostError::TypeMismatch {
                id: parent,
                expected: "element",
            });
        }
        parent_ref.children.push(child);
        Ok(())
    }

    fn detach(&mut self, parent: HostId, child: HostId) -> Result<(), HostError> {
        let parent_ref = self.node_mut(parent)?;
        match parent_ref.children.iter().position(|&c| c == child) {
            Some(index) => {
                parent_ref.children.remove(index);
                Ok(())
            }
            None => Err(HostError::NotAChild { parent, child }),
        }
    }
}
