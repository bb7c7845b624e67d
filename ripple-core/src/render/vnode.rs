//! Node descriptions.
//!
//! A [`VNode`] describes what one piece of the tree should look like. Render
//! functions build a fresh tree every time they run and the renderer diffs it
//! against what is currently mounted.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::reactive::Value;

use super::component::Component;

/// Props of a node, in the order they were given.
pub type Props = IndexMap<String, Value>;

/// A named slot. Called with the props the component passes to it.
pub type SlotFn = Arc<dyn Fn(&Props) -> Vec<VNode> + Send + Sync>;

/// Slots handed to a component, by name.
pub type Slots = IndexMap<String, SlotFn>;

/// Identity of a node among its siblings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VKey {
    Str(Arc<str>),
    Int(i64),
}

impl From<&str> for VKey {
    fn from(key: &str) -> Self {
        VKey::Str(key.into())
    }
}

impl From<String> for VKey {
    fn from(key: String) -> Self {
        VKey::Str(key.into())
    }
}

impl From<i64> for VKey {
    fn from(key: i64) -> Self {
        VKey::Int(key)
    }
}

impl From<i32> for VKey {
    fn from(key: i32) -> Self {
        VKey::Int(key.into())
    }
}

impl From<usize> for VKey {
    fn from(key: usize) -> Self {
        VKey::Int(key as i64)
    }
}

impl VKey {
    /// Keys given through `.prop("key", ..)`. Only strings and integral
    /// numbers can identify a node.
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(VKey::Str(s.clone())),
            Value::Number(_) => value.as_i64().map(VKey::Int),
            _ => None,
        }
    }
}

impl std::fmt::Display for VKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VKey::Str(s) => f.write_str(s),
            VKey::Int(i) => write!(f, "{i}"),
        }
    }
}

/// What kind of node a [`VNode`] describes.
#[derive(Clone)]
pub enum VNodeType {
    Element(Arc<str>),
    Text,
    Fragment,
    Teleport,
    Component(Component),
}

impl PartialEq for VNodeType {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (VNodeType::Element(a), VNodeType::Element(b)) => a == b,
            (VNodeType::Text, VNodeType::Text)
            | (VNodeType::Fragment, VNodeType::Fragment)
            | (VNodeType::Teleport, VNodeType::Teleport) => true,
            (VNodeType::Component(a), VNodeType::Component(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl std::fmt::Debug for VNodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VNodeType::Element(tag) => write!(f, "Element({tag})"),
            VNodeType::Text => f.write_str("Text"),
            VNodeType::Fragment => f.write_str("Fragment"),
            VNodeType::Teleport => f.write_str("Teleport"),
            VNodeType::Component(c) => write!(f, "Component({})", c.name()),
        }
    }
}

/// Children of a node.
#[derive(Clone, Default)]
pub enum Children {
    #[default]
    None,
    /// Text content of an element, or the content of a text node.
    Text(Arc<str>),
    List(Vec<VNode>),
    /// Slots of a component node.
    Slots(Slots),
}

impl Children {
    pub fn is_none(&self) -> bool {
        matches!(self, Children::None)
    }

    pub fn as_list(&self) -> Option<&[VNode]> {
        match self {
            Children::List(list) => Some(list),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Children::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl std::fmt::Debug for Children {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Children::None => f.write_str("None"),
            Children::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Children::List(list) => f.debug_list().entries(list).finish(),
            Children::Slots(slots) => f.debug_set().entries(slots.keys()).finish(),
        }
    }
}

/// Description of one node.
///
/// ```rust,ignore
/// let list = h("ul").with_children(
///     items.iter().map(|item| h("li").key(item.id).with_text(&item.label)),
/// );
/// ```
#[derive(Clone, Debug)]
pub struct VNode {
    ty: VNodeType,
    key: Option<VKey>,
    props: Props,
    children: Children,
}

/// An element node.
pub fn h(tag: &str) -> VNode {
    VNode::element(tag)
}

/// A text node.
pub fn text(content: impl AsRef<str>) -> VNode {
    VNode::text(content)
}

impl VNode {
    fn with_type(ty: VNodeType) -> Self {
        Self {
            ty,
            key: None,
            props: Props::new(),
            children: Children::None,
        }
    }

    pub fn element(tag: &str) -> Self {
        Self::with_type(VNodeType::Element(tag.into()))
    }

    pub fn text(content: impl AsRef<str>) -> Self {
        let mut node = Self::with_type(VNodeType::Text);
        node.children = Children::Text(content.as_ref().into());
        node
    }

    /// Several siblings without a wrapping element.
    pub fn fragment<I>(children: I) -> Self
    where
        I: IntoIterator<Item = VNode>,
    {
        let mut node = Self::with_type(VNodeType::Fragment);
        node.children = Children::List(children.into_iter().collect());
        node
    }

    /// Children rendered into the host node found for `to`, while the
    /// teleport itself stays in place.
    pub fn teleport<I>(to: &str, children: I) -> Self
    where
        I: IntoIterator<Item = VNode>,
    {
        let mut node = Self::with_type(VNodeType::Teleport);
        node.props.insert("to".into(), Value::from(to));
        node.children = Children::List(children.into_iter().collect());
        node
    }

    pub fn component(component: &Component) -> Self {
        Self::with_type(VNodeType::Component(component.clone()))
    }

    pub fn key(mut self, key: impl Into<VKey>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Set one prop. `"key"` sets the node key instead.
    pub fn prop(mut self, key: &str, value: impl Into<Value>) -> Self {
        let value = value.into();
        if key == "key" {
            self.key = VKey::from_value(&value);
            return self;
        }
        self.props.insert(key.to_owned(), value);
        self
    }

    pub fn with_props(mut self, props: Props) -> Self {
        for (key, value) in props {
            self = self.prop(&key, value);
        }
        self
    }

    /// Append a child.
    pub fn child(mut self, child: impl Into<VNode>) -> Self {
        let child = child.into();
        match &mut self.children {
            Children::List(list) => list.push(child),
            Children::Text(content) => {
                let existing = VNode::text(&**content);
                self.children = Children::List(vec![existing, child]);
            }
            _ => self.children = Children::List(vec![child]),
        }
        self
    }

    pub fn with_children<I>(mut self, children: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<VNode>,
    {
        self.children = Children::List(children.into_iter().map(Into::into).collect());
        self
    }

    /// Text content of an element.
    pub fn with_text(mut self, content: impl AsRef<str>) -> Self {
        if matches!(self.ty, VNodeType::Fragment | VNodeType::Teleport) {
            self.children = Children::List(vec![VNode::text(content)]);
        } else {
            self.children = Children::Text(content.as_ref().into());
        }
        self
    }

    /// Add a named slot to a component node.
    pub fn slot<F>(mut self, name: &str, render: F) -> Self
    where
        F: Fn(&Props) -> Vec<VNode> + Send + Sync + 'static,
    {
        let render: SlotFn = Arc::new(render);
        match &mut self.children {
            Children::Slots(slots) => {
                slots.insert(name.to_owned(), render);
            }
            _ => {
                let mut slots = Slots::new();
                slots.insert(name.to_owned(), render);
                self.children = Children::Slots(slots);
            }
        }
        self
    }

    pub fn node_type(&self) -> &VNodeType {
        &self.ty
    }

    pub fn vkey(&self) -> Option<&VKey> {
        self.key.as_ref()
    }

    pub fn props(&self) -> &Props {
        &self.props
    }

    pub fn children(&self) -> &Children {
        &self.children
    }

    pub fn tag(&self) -> Option<&str> {
        match &self.ty {
            VNodeType::Element(tag) => Some(tag),
            _ => None,
        }
    }

    pub fn as_component(&self) -> Option<&Component> {
        match &self.ty {
            VNodeType::Component(component) => Some(component),
            _ => None,
        }
    }

    /// Target selector of a teleport.
    pub(crate) fn teleport_to(&self) -> String {
        self.props
            .get("to")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned()
    }
}

impl From<&str> for VNode {
    fn from(content: &str) -> Self {
        VNode::text(content)
    }
}

impl From<String> for VNode {
    fn from(content: String) -> Self {
        VNode::text(content)
    }
}

/// Same type and same key: the old node can be patched into the new one.
pub fn is_same_vnode(a: &VNode, b: &VNode) -> bool {
    a.ty == b.ty && a.key == b.key
}
