//! Headless document model.
//!
//! The bridge's host capabilities operate on an owned element tree rather
//! than a live browser DOM. Nodes live in an arena owned by [`Document`];
//! callers hold [`NodeId`] indices, never references, so a stale id after a
//! removal is an error instead of a dangling pointer.

use std::collections::BTreeMap;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> u32 {
        self.0
    }
}

#[derive(Debug, Error)]
pub enum PageError {
    #[error("unknown or removed node {0:?}")]
    UnknownNode(NodeId),
    #[error("invalid tag name {0:?}")]
    InvalidTagName(String),
    #[error("invalid attribute name {0:?}")]
    InvalidAttributeName(String),
    #[error("appending {child:?} under {parent:?} would create a cycle")]
    Cycle { parent: NodeId, child: NodeId },
    #[error("the document root cannot be removed")]
    RemoveRoot,
}

#[derive(Debug)]
struct Node {
    tag: String,
    attrs: BTreeMap<String, String>,
    text: Option<String>,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
}

impl Node {
    fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attrs: BTreeMap::new(),
            text: None,
            children: Vec::new(),
            parent: None,
        }
    }
}

/// An element tree with `html`/`body` roots, mirroring the document shape
/// the guest module expects to find on startup.
#[derive(Debug)]
pub struct Document {
    nodes: Vec<Option<Node>>,
    root: NodeId,
    body: NodeId,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        let mut doc = Self {
            nodes: Vec::new(),
            root: NodeId(0),
            body: NodeId(0),
        };
        doc.root = doc.insert(Node::new("html"));
        doc.body = doc.insert(Node::new("body"));
        doc.nodes[doc.body.0 as usize].as_mut().unwrap().parent = Some(doc.root);
        let root = doc.root;
        doc.nodes[root.0 as usize]
            .as_mut()
            .unwrap()
            .children
            .push(doc.body);
        doc
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes
            .get(id.0 as usize)
            .is_some_and(|slot| slot.is_some())
    }

    /// Creates a detached element. The node joins the tree through
    /// [`Document::append_child`].
    pub fn create_element(&mut self, tag: &str) -> Result<NodeId, PageError> {
        if !is_valid_name(tag) {
            return Err(PageError::InvalidTagName(tag.to_string()));
        }
        Ok(self.insert(Node::new(tag)))
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), PageError> {
        self.node(parent)?;
        self.node(child)?;
        if parent == child || self.is_ancestor(child, parent) {
            return Err(PageError::Cycle { parent, child });
        }
        self.detach(child)?;
        self.node_mut(child)?.parent = Some(parent);
        self.node_mut(parent)?.children.push(child);
        Ok(())
    }

    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) -> Result<(), PageError> {
        if !is_valid_name(name) {
            return Err(PageError::InvalidAttributeName(name.to_string()));
        }
        self.node_mut(id)?
            .attrs
            .insert(name.to_ascii_lowercase(), value.to_string());
        Ok(())
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Result<Option<&str>, PageError> {
        Ok(self.node(id)?.attrs.get(name).map(String::as_str))
    }

    pub fn set_text_content(&mut self, id: NodeId, text: Option<&str>) -> Result<(), PageError> {
        self.node_mut(id)?.text = text.map(str::to_string);
        Ok(())
    }

    pub fn text_content(&self, id: NodeId) -> Result<Option<&str>, PageError> {
        Ok(self.node(id)?.text.as_deref())
    }

    pub fn tag(&self, id: NodeId) -> Result<&str, PageError> {
        Ok(&self.node(id)?.tag)
    }

    pub fn children(&self, id: NodeId) -> Result<&[NodeId], PageError> {
        Ok(&self.node(id)?.children)
    }

    /// Removes a node and its whole subtree; their ids become invalid.
    pub fn remove(&mut self, id: NodeId) -> Result<(), PageError> {
        if id == self.root || id == self.body {
            return Err(PageError::RemoveRoot);
        }
        self.node(id)?;
        self.detach(id)?;
        let mut pending = vec![id];
        while let Some(next) = pending.pop() {
            if let Some(node) = self.nodes[next.0 as usize].take() {
                pending.extend(node.children);
            }
        }
        Ok(())
    }

    /// Elements whose whitespace-separated `class` attribute contains
    /// `class`, in document order.
    pub fn elements_with_class(&self, class: &str) -> Vec<NodeId> {
        let mut found = Vec::new();
        let mut pending = vec![self.root];
        while let Some(id) = pending.pop() {
            let Ok(node) = self.node(id) else { continue };
            if node
                .attrs
                .get("class")
                .is_some_and(|v| v.split_ascii_whitespace().any(|c| c == class))
            {
                found.push(id);
            }
            // depth-first, reversed so document order comes out of the stack
            pending.extend(node.children.iter().rev());
        }
        found
    }

    fn insert(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Some(node));
        id
    }

    fn detach(&mut self, id: NodeId) -> Result<(), PageError> {
        if let Some(parent) = self.node(id)?.parent {
            self.node_mut(parent)?.children.retain(|c| *c != id);
            self.node_mut(id)?.parent = None;
        }
        Ok(())
    }

    fn is_ancestor(&self, candidate: NodeId, of: NodeId) -> bool {
        let mut cursor = self.node(of).ok().and_then(|n| n.parent);
        while let Some(id) = cursor {
            if id == candidate {
                return true;
            }
            cursor = self.node(id).ok().and_then(|n| n.parent);
        }
        false
    }

    fn node(&self, id: NodeId) -> Result<&Node, PageError> {
        self.nodes
            .get(id.0 as usize)
            .and_then(Option::as_ref)
            .ok_or(PageError::UnknownNode(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, PageError> {
        self.nodes
            .get_mut(id.0 as usize)
            .and_then(Option::as_mut)
            .ok_or(PageError::UnknownNode(id))
    }
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    first.is_ascii_alphabetic()
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':'))
}
