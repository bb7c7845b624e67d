//! In-memory host.
//!
//! Keeps a plain node tree plus a log of every operation the renderer issued,
//! which makes it the host of choice for tests, benches and headless use.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::reactive::Value;

use super::host::HostOps;

/// Node handle of a [`MemoryHost`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// One logged host operation.
#[derive(Debug, Clone, PartialEq)]
pub enum HostOp {
    CreateElement {
        node: NodeId,
        tag: Arc<str>,
    },
    CreateText {
        node: NodeId,
        text: String,
    },
    SetText {
        node: NodeId,
        text: String,
    },
    SetElementText {
        node: NodeId,
        text: String,
    },
    Insert {
        child: NodeId,
        parent: NodeId,
        anchor: Option<NodeId>,
    },
    Remove {
        node: NodeId,
    },
    PatchProp {
        node: NodeId,
        key: String,
        value: Option<Value>,
    },
}

#[derive(Debug)]
enum NodeKind {
    Root,
    Element {
        tag: Arc<str>,
        props: IndexMap<String, Value>,
    },
    Text(String),
}

#[derive(Debug)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// A host that renders into memory.
///
/// ```rust,ignore
/// let mut host = MemoryHost::new();
/// let root = host.create_root();
/// let renderer = Renderer::new(host);
/// renderer.render(Some(h("p").with_text("hi")), &root)?;
/// assert_eq!(renderer.with_host(|host| host.render_html(root)), "<p>hi</p>");
/// ```
#[derive(Debug, Default)]
pub struct MemoryHost {
    nodes: Vec<NodeData>,
    targets: HashMap<String, NodeId>,
    ops: Vec<HostOp>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// A detached container to render into. Not logged.
    pub fn create_root(&mut self) -> NodeId {
        self.alloc(NodeKind::Root)
    }

    /// Make `node` resolvable as a teleport target under `selector`.
    pub fn register_target(&mut self, selector: &str, node: NodeId) {
        self.targets.insert(selector.to_owned(), node);
    }

    pub fn ops(&self) -> &[HostOp] {
        &self.ops
    }

    pub fn take_ops(&mut self) -> Vec<HostOp> {
        std::mem::take(&mut self.ops)
    }

    pub fn clear_ops(&mut self) {
        self.ops.clear();
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.data(node)
            .map(|data| data.children.clone())
            .unwrap_or_default()
    }

    pub fn tag(&self, node: NodeId) -> Option<&str> {
        match &self.data(node)?.kind {
            NodeKind::Element { tag, .. } => Some(tag),
            _ => None,
        }
    }

    pub fn text(&self, node: NodeId) -> Option<&str> {
        match &self.data(node)?.kind {
            NodeKind::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn prop(&self, node: NodeId, key: &str) -> Option<&Value> {
        match &self.data(node)?.kind {
            NodeKind::Element { props, .. } => props.get(key),
            _ => None,
        }
    }

    /// Concatenated text of every text node under `node`.
    pub fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(node, &mut out);
        out
    }

    /// Markup for the children of `node`. Empty text nodes, which the
    /// renderer uses as placeholders, print nothing.
    pub fn render_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        for child in self.children(node) {
            self.write_html(child, &mut out);
        }
        out
    }

    fn alloc(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    fn data(&self, node: NodeId) -> Option<&NodeData> {
        self.nodes.get(node.0)
    }

    fn detach(&mut self, node: NodeId) {
        let Some(parent) = self.nodes.get_mut(node.0).and_then(|data| data.parent.take()) else {
            return;
        };
        if let Some(parent) = self.nodes.get_mut(parent.0) {
            parent.children.retain(|child| *child != node);
        }
    }

    fn attach(&mut self, child: NodeId, parent: NodeId, anchor: Option<NodeId>) {
        self.detach(child);
        let Some(parent_data) = self.nodes.get_mut(parent.0) else {
            return;
        };
        let position = anchor
            .and_then(|anchor| parent_data.children.iter().position(|c| *c == anchor))
            .unwrap_or(parent_data.children.len());
        parent_data.children.insert(position, child);
        if let Some(child_data) = self.nodes.get_mut(child.0) {
            child_data.parent = Some(parent);
        }
    }

    fn collect_text(&self, node: NodeId, out: &mut String) {
        let Some(data) = self.data(node) else {
            return;
        };
        if let NodeKind::Text(text) = &data.kind {
            out.push_str(text);
        }
        for child in &data.children {
            self.collect_text(*child, out);
        }
    }

    fn write_html(&self, node: NodeId, out: &mut String) {
        let Some(data) = self.data(node) else {
            return;
        };
        match &data.kind {
            NodeKind::Text(text) => out.push_str(text),
            NodeKind::Root => {
                for child in &data.children {
                    self.write_html(*child, out);
                }
            }
            NodeKind::Element { tag, props } => {
                let _ = write!(out, "<{tag}");
                for (key, value) in props {
                    match value {
                        Value::String(s) => {
                            let _ = write!(out, " {key}=\"{s}\"");
                        }
                        other => {
                            let _ = write!(out, " {key}=\"{}\"", other.to_json());
                        }
                    }
                }
                out.push('>');
                for child in &data.children {
                    self.write_html(*child, out);
                }
                let _ = write!(out, "</{tag}>");
            }
        }
    }
}

impl HostOps for MemoryHost {
    type Node = NodeId;

    fn create_element(&mut self, tag: &str) -> NodeId {
        let tag: Arc<str> = tag.into();
        let node = self.alloc(NodeKind::Element {
            tag: tag.clone(),
            props: IndexMap::new(),
        });
        self.ops.push(HostOp::CreateElement { node, tag });
        node
    }

    fn create_text(&mut self, text: &str) -> NodeId {
        let node = self.alloc(NodeKind::Text(text.to_owned()));
        self.ops.push(HostOp::CreateText {
            node,
            text: text.to_owned(),
        });
        node
    }

    fn set_text(&mut self, node: &NodeId, text: &str) {
        if let Some(NodeData {
            kind: NodeKind::Text(content),
            ..
        }) = self.nodes.get_mut(node.0)
        {
            *content = text.to_owned();
        }
        self.ops.push(HostOp::SetText {
            node: *node,
            text: text.to_owned(),
        });
    }

    fn set_element_text(&mut self, el: &NodeId, text: &str) {
        for child in self.children(*el) {
            self.detach(child);
        }
        if !text.is_empty() {
            let content = self.alloc(NodeKind::Text(text.to_owned()));
            self.attach(content, *el, None);
        }
        self.ops.push(HostOp::SetElementText {
            node: *el,
            text: text.to_owned(),
        });
    }

    fn insert(&mut self, child: &NodeId, parent: &NodeId, anchor: Option<&NodeId>) {
        self.attach(*child, *parent, anchor.copied());
        self.ops.push(HostOp::Insert {
            child: *child,
            parent: *parent,
            anchor: anchor.copied(),
        });
    }

    fn remove(&mut self, child: &NodeId) {
        self.detach(*child);
        self.ops.push(HostOp::Remove { node: *child });
    }

    fn patch_prop(&mut self, el: &NodeId, key: &str, _prev: Option<&Value>, next: Option<&Value>) {
        if let Some(NodeData {
            kind: NodeKind::Element { props, .. },
            ..
        }) = self.nodes.get_mut(el.0)
        {
            match next {
                Some(value) => {
                    props.insert(key.to_owned(), value.clone());
                }
                None => {
                    props.shift_remove(key);
                }
            }
        }
        self.ops.push(HostOp::PatchProp {
            node: *el,
            key: key.to_owned(),
            value: next.cloned(),
        });
    }

    fn parent(&self, node: &NodeId) -> Option<NodeId> {
        self.data(*node)?.parent
    }

    fn next_sibling(&self, node: &NodeId) -> Option<NodeId> {
        let parent = self.data(*node)?.parent?;
        let siblings = &self.data(parent)?.children;
        let position = siblings.iter().position(|c| c == node)?;
        siblings.get(position + 1).copied()
    }

    fn query_target(&self, selector: &str) -> Option<NodeId> {
        self.targets.get(selector).copied()
    }

    fn has_content(&self, node: &NodeId) -> bool {
        self.data(*node)
            .map(|data| !data.children.is_empty())
            .unwrap_or(false)
    }
}
