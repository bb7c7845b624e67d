//! Renderer Implementation
//!
//! The renderer keeps, per container, the tree it mounted last time and turns
//! a new [`VNode`] tree into host operations against it.
//!
//! # How Patching Works
//!
//! 1. If the old and new node differ in type or key, the old node is
//!    unmounted and the new one is mounted where it used to be.
//!
//! 2. Otherwise the host node is reused: props are patched one at a time and
//!    the children are reconciled (text, list or nothing).
//!
//! 3. Child lists go through the keyed diff, which moves the fewest host
//!    nodes it can.
//!
//! Fragments and teleports have no host node of their own. They are
//! bracketed by two empty text nodes, which also serve as their insertion
//! anchors.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::error::Result;
use crate::reactive::same_value;
use crate::scheduler::flush_post_flush_cbs;

use super::component::InstanceState;
use super::host::HostOps;
use super::instance::ComponentInstance;
use super::vnode::{is_same_vnode, Children, Props, VNode, VNodeType};

/// Coarse node kind, copied out so matching never borrows the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NodeKind {
    Element,
    Text,
    Fragment,
    Teleport,
    Component,
}

impl NodeKind {
    pub(crate) fn of(vnode: &VNode) -> Self {
        match vnode.node_type() {
            VNodeType::Element(_) => NodeKind::Element,
            VNodeType::Text => NodeKind::Text,
            VNodeType::Fragment => NodeKind::Fragment,
            VNodeType::Teleport => NodeKind::Teleport,
            VNodeType::Component(_) => NodeKind::Component,
        }
    }
}

/// A mounted node: the description it was last patched with plus the host
/// nodes backing it.
pub(crate) struct Mounted<H: HostOps> {
    pub(crate) vnode: VNode,
    /// Element or text node; start placeholder of a fragment or teleport.
    pub(crate) el: Option<H::Node>,
    /// End placeholder of a fragment or teleport.
    pub(crate) anchor: Option<H::Node>,
    pub(crate) children: Vec<Mounted<H>>,
    pub(crate) component: Option<Arc<ComponentInstance<H>>>,
    pub(crate) target: Option<H::Node>,
    pub(crate) target_anchor: Option<H::Node>,
}

impl<H: HostOps> Mounted<H> {
    pub(crate) fn new(vnode: VNode) -> Self {
        Self {
            vnode,
            el: None,
            anchor: None,
            children: Vec::new(),
            component: None,
            target: None,
            target_anchor: None,
        }
    }

    pub(crate) fn kind(&self) -> NodeKind {
        NodeKind::of(&self.vnode)
    }
}

pub(crate) struct RendererInner<H: HostOps> {
    pub(crate) me: Weak<RendererInner<H>>,
    host: Mutex<H>,
    roots: Mutex<HashMap<H::Node, Mounted<H>>>,
}

/// Renders node trees into a host.
///
/// Cloning gives another handle to the same renderer.
///
/// ```rust,ignore
/// let mut host = MemoryHost::new();
/// let root = host.create_root();
/// let renderer = Renderer::new(host);
///
/// renderer.render(Some(h("ul").with_children(items)), &root)?;
/// renderer.render(None, &root)?; // unmount everything
/// ```
pub struct Renderer<H: HostOps> {
    inner: Arc<RendererInner<H>>,
}

impl<H: HostOps> Clone for Renderer<H> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<H: HostOps> Renderer<H> {
    pub fn new(host: H) -> Self {
        Self {
            inner: Arc::new_cyclic(|me| RendererInner {
                me: me.clone(),
                host: Mutex::new(host),
                roots: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Render `vnode` into `container`, patching whatever was rendered there
    /// before. `None` unmounts. Pending post jobs such as `mounted` hooks run
    /// before this returns.
    pub fn render(&self, vnode: Option<VNode>, container: &H::Node) -> Result<()> {
        let _span = tracing::debug_span!("render", container = ?container).entered();
        let result = self.render_root(vnode, container);
        flush_post_flush_cbs();
        result
    }

    fn render_root(&self, vnode: Option<VNode>, container: &H::Node) -> Result<()> {
        let inner = &self.inner;
        let old = inner.roots.lock().remove(container);

        let Some(vnode) = vnode else {
            if let Some(old) = old {
                inner.unmount(old, true);
            }
            return Ok(());
        };

        if old.is_none() && inner.host(|host| host.has_content(container)) {
            inner.host(|host| host.set_element_text(container, ""));
        }
        let mounted = inner.patch(old, vnode, container, None, None)?;
        inner.roots.lock().insert(container.clone(), mounted);
        Ok(())
    }

    /// Is anything rendered into `container`?
    pub fn is_mounted(&self, container: &H::Node) -> bool {
        self.inner.roots.lock().contains_key(container)
    }

    /// Borrow the host, e.g. to inspect it in tests.
    pub fn with_host<R>(&self, f: impl FnOnce(&mut H) -> R) -> R {
        self.inner.host(f)
    }
}

impl<H: HostOps> RendererInner<H> {
    pub(crate) fn host<R>(&self, f: impl FnOnce(&mut H) -> R) -> R {
        f(&mut self.host.lock())
    }

    /// Patch `old` into `vnode`, or mount `vnode` if there is nothing to
    /// patch. New host nodes go into `container` before `anchor`.
    ///
    /// On error `old` has been unmounted and nothing of `vnode` is left
    /// attached, so the caller only has to account for its other children.
    pub(crate) fn patch(
        &self,
        old: Option<Mounted<H>>,
        vnode: VNode,
        container: &H::Node,
        anchor: Option<&H::Node>,
        parent: Option<&Arc<InstanceState>>,
    ) -> Result<Mounted<H>> {
        let mut anchor = anchor.cloned();
        let old = match old {
            Some(old) if !is_same_vnode(&old.vnode, &vnode) => {
                tracing::trace!(
                    old = ?old.vnode.node_type(),
                    new = ?vnode.node_type(),
                    "node changed identity, remounting"
                );
                if let Some(next) = self.next_host_sibling(&old) {
                    anchor = Some(next);
                }
                self.unmount(old, true);
                None
            }
            old => old,
        };
        let anchor = anchor.as_ref();

        match NodeKind::of(&vnode) {
            NodeKind::Text => self.process_text(old, vnode, container, anchor),
            NodeKind::Element => self.process_element(old, vnode, container, anchor, parent),
            NodeKind::Fragment => self.process_fragment(old, vnode, container, anchor, parent),
            NodeKind::Teleport => self.process_teleport(old, vnode, container, anchor, parent),
            NodeKind::Component => self.process_component(old, vnode, container, anchor, parent),
        }
    }

    fn process_text(
        &self,
        old: Option<Mounted<H>>,
        vnode: VNode,
        container: &H::Node,
        anchor: Option<&H::Node>,
    ) -> Result<Mounted<H>> {
        let content = vnode.children().as_text().unwrap_or_default().to_owned();
        match old {
            None => {
                let el = self.host(|host| {
                    let el = host.create_text(&content);
                    host.insert(&el, container, anchor);
                    el
                });
                let mut mounted = Mounted::new(vnode);
                mounted.el = Some(el);
                Ok(mounted)
            }
            Some(mut old) => {
                if old.vnode.children().as_text() != Some(content.as_str()) {
                    if let Some(el) = &old.el {
                        self.host(|host| host.set_text(el, &content));
                    }
                }
                old.vnode = vnode;
                Ok(old)
            }
        }
    }

    fn process_element(
        &self,
        old: Option<Mounted<H>>,
        vnode: VNode,
        container: &H::Node,
        anchor: Option<&H::Node>,
        parent: Option<&Arc<InstanceState>>,
    ) -> Result<Mounted<H>> {
        let Some(mut old) = old else {
            return self.mount_element(vnode, container, anchor, parent);
        };
        let Some(el) = old.el.clone() else {
            return self.mount_element(vnode, container, anchor, parent);
        };

        self.patch_props(&el, old.vnode.props(), vnode.props());
        let children = std::mem::take(&mut old.children);
        let patched =
            self.patch_children(old.vnode.children(), children, vnode.children(), &el, None, parent);
        match patched {
            Ok(children) => old.children = children,
            Err(err) => {
                self.unmount(old, true);
                return Err(err);
            }
        }
        old.vnode = vnode;
        Ok(old)
    }

    fn mount_element(
        &self,
        vnode: VNode,
        container: &H::Node,
        anchor: Option<&H::Node>,
        parent: Option<&Arc<InstanceState>>,
    ) -> Result<Mounted<H>> {
        let tag = vnode.tag().unwrap_or_default();
        let el = self.host(|host| {
            let el = host.create_element(tag);
            for (key, value) in vnode.props() {
                host.patch_prop(&el, key, None, Some(value));
            }
            el
        });

        let children = match vnode.children() {
            Children::Text(content) => {
                self.host(|host| host.set_element_text(&el, content));
                Vec::new()
            }
            Children::List(list) => self.mount_children(list, &el, None, parent)?,
            Children::None | Children::Slots(_) => Vec::new(),
        };

        self.host(|host| host.insert(&el, container, anchor));
        let mut mounted = Mounted::new(vnode);
        mounted.el = Some(el);
        mounted.children = children;
        Ok(mounted)
    }

    fn process_fragment(
        &self,
        old: Option<Mounted<H>>,
        vnode: VNode,
        container: &H::Node,
        anchor: Option<&H::Node>,
        parent: Option<&Arc<InstanceState>>,
    ) -> Result<Mounted<H>> {
        match old {
            Some(mut old) => {
                let children = std::mem::take(&mut old.children);
                let end = old.anchor.clone();
                let patched = self.patch_children(
                    old.vnode.children(),
                    children,
                    vnode.children(),
                    container,
                    end.as_ref(),
                    parent,
                );
                match patched {
                    Ok(children) => old.children = children,
                    Err(err) => {
                        self.unmount(old, true);
                        return Err(err);
                    }
                }
                old.vnode = vnode;
                Ok(old)
            }
            None => {
                let (start, end) = self.host(|host| {
                    let start = host.create_text("");
                    let end = host.create_text("");
                    host.insert(&start, container, anchor);
                    host.insert(&end, container, anchor);
                    (start, end)
                });
                let list = vnode.children().as_list().unwrap_or_default();
                let children = self.mount_children(list, container, Some(&end), parent);

                let mut mounted = Mounted::new(vnode);
                mounted.el = Some(start);
                mounted.anchor = Some(end);
                match children {
                    Ok(children) => {
                        mounted.children = children;
                        Ok(mounted)
                    }
                    Err(err) => {
                        self.unmount(mounted, true);
                        Err(err)
                    }
                }
            }
        }
    }

    pub(crate) fn mount_children(
        &self,
        children: &[VNode],
        container: &H::Node,
        anchor: Option<&H::Node>,
        parent: Option<&Arc<InstanceState>>,
    ) -> Result<Vec<Mounted<H>>> {
        let mut mounted = Vec::with_capacity(children.len());
        for child in children {
            match self.patch(None, child.clone(), container, anchor, parent) {
                Ok(child) => mounted.push(child),
                Err(err) => {
                    self.unmount_children(mounted, true);
                    return Err(err);
                }
            }
        }
        Ok(mounted)
    }

    /// Reconcile the children of `el`.
    pub(crate) fn patch_children(
        &self,
        old_children: &Children,
        old_mounted: Vec<Mounted<H>>,
        new_children: &Children,
        el: &H::Node,
        anchor: Option<&H::Node>,
        parent: Option<&Arc<InstanceState>>,
    ) -> Result<Vec<Mounted<H>>> {
        match new_children {
            Children::Text(content) => {
                // Setting the text clears the host children, so only the
                // bookkeeping of the old list needs undoing.
                self.unmount_children(old_mounted, false);
                if old_children.as_text() != Some(&**content) {
                    self.host(|host| host.set_element_text(el, content));
                }
                Ok(Vec::new())
            }
            Children::List(list) => match old_children {
                Children::List(_) => self.patch_keyed_children(old_mounted, list, el, anchor, parent),
                Children::Text(_) => {
                    self.host(|host| host.set_element_text(el, ""));
                    self.mount_children(list, el, anchor, parent)
                }
                Children::None | Children::Slots(_) => self.mount_children(list, el, anchor, parent),
            },
            Children::None | Children::Slots(_) => {
                match old_children {
                    Children::List(_) => self.unmount_children(old_mounted, true),
                    Children::Text(_) => self.host(|host| host.set_element_text(el, "")),
                    Children::None | Children::Slots(_) => {}
                }
                Ok(Vec::new())
            }
        }
    }

    fn patch_props(&self, el: &H::Node, prev: &Props, next: &Props) {
        self.host(|host| {
            for (key, value) in next {
                let old = prev.get(key);
                if old.map_or(true, |old| !same_value(old, value)) {
                    host.patch_prop(el, key, old, Some(value));
                }
            }
            for (key, value) in prev {
                if !next.contains_key(key) {
                    host.patch_prop(el, key, Some(value), None);
                }
            }
        });
    }

    pub(crate) fn unmount_children(&self, children: Vec<Mounted<H>>, do_remove: bool) {
        for child in children {
            self.unmount(child, do_remove);
        }
    }

    /// Tear down `mounted`. With `do_remove` false the host nodes are left
    /// in place because an ancestor is being removed anyway; components still
    /// run their unmount hooks.
    pub(crate) fn unmount(&self, mounted: Mounted<H>, do_remove: bool) {
        match mounted.kind() {
            NodeKind::Component => {
                if let Some(instance) = &mounted.component {
                    self.unmount_component(instance, do_remove);
                }
            }
            NodeKind::Teleport => self.unmount_teleport(mounted, do_remove),
            NodeKind::Fragment => {
                self.unmount_children(mounted.children, do_remove);
                if do_remove {
                    self.host(|host| {
                        for node in [&mounted.el, &mounted.anchor].into_iter().flatten() {
                            host.remove(node);
                        }
                    });
                }
            }
            NodeKind::Element | NodeKind::Text => {
                self.unmount_children(mounted.children, false);
                if do_remove {
                    if let Some(el) = &mounted.el {
                        self.host(|host| host.remove(el));
                    }
                }
            }
        }
    }

    /// Move every host node of `mounted` into `container` before `anchor`.
    pub(crate) fn move_node(&self, mounted: &Mounted<H>, container: &H::Node, anchor: Option<&H::Node>) {
        match mounted.kind() {
            NodeKind::Component => {
                if let Some(instance) = &mounted.component {
                    instance.with_subtree(|subtree| {
                        if let Some(subtree) = subtree {
                            self.move_node(subtree, container, anchor);
                        }
                    });
                }
            }
            NodeKind::Fragment => {
                if let Some(start) = &mounted.el {
                    self.host(|host| host.insert(start, container, anchor));
                }
                for child in &mounted.children {
                    self.move_node(child, container, anchor);
                }
                if let Some(end) = &mounted.anchor {
                    self.host(|host| host.insert(end, container, anchor));
                }
            }
            // Teleported children stay in their target.
            NodeKind::Teleport => self.host(|host| {
                for node in [&mounted.el, &mounted.anchor].into_iter().flatten() {
                    host.insert(node, container, anchor);
                }
            }),
            NodeKind::Element | NodeKind::Text => {
                if let Some(el) = &mounted.el {
                    self.host(|host| host.insert(el, container, anchor));
                }
            }
        }
    }

    /// The first host node of `mounted` in document order.
    pub(crate) fn first_host_node(&self, mounted: &Mounted<H>) -> Option<H::Node> {
        match mounted.kind() {
            NodeKind::Component => mounted.component.as_ref().and_then(|instance| {
                instance.with_subtree(|subtree| subtree.and_then(|s| self.first_host_node(s)))
            }),
            _ => mounted.el.clone(),
        }
    }

    /// The host node right after everything `mounted` occupies.
    pub(crate) fn next_host_sibling(&self, mounted: &Mounted<H>) -> Option<H::Node> {
        match mounted.kind() {
            NodeKind::Component => mounted.component.as_ref().and_then(|instance| {
                instance.with_subtree(|subtree| subtree.and_then(|s| self.next_host_sibling(s)))
            }),
            NodeKind::Fragment | NodeKind::Teleport => {
                let end = mounted.anchor.as_ref()?;
                self.host(|host| host.next_sibling(end))
            }
            NodeKind::Element | NodeKind::Text => {
                let el = mounted.el.as_ref()?;
                self.host(|host| host.next_sibling(el))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::memory::{HostOp, MemoryHost, NodeId};
    use crate::render::vnode::{h, text};

    fn setup() -> (Renderer<MemoryHost>, NodeId) {
        let mut host = MemoryHost::new();
        let root = host.create_root();
        (Renderer::new(host), root)
    }

    fn html(renderer: &Renderer<MemoryHost>, root: NodeId) -> String {
        renderer.with_host(|host| host.render_html(root))
    }

    #[test]
    fn mounts_elements_with_props_and_text() {
        let (renderer, root) = setup();
        renderer
            .render(Some(h("p").prop("id", "greeting").with_text("hello")), &root)
            .unwrap();
        assert_eq!(html(&renderer, root), r#"<p id="greeting">hello</p>"#);
        assert!(renderer.is_mounted(&root));
    }

    #[test]
    fn patching_reuses_the_element() {
        let (renderer, root) = setup();
        renderer
            .render(Some(h("p").prop("class", "a").with_text("one")), &root)
            .unwrap();
        renderer.with_host(|host| host.clear_ops());

        renderer
            .render(Some(h("p").prop("title", "t").with_text("two")), &root)
            .unwrap();
        let ops = renderer.with_host(|host| host.take_ops());
        assert!(!ops.iter().any(|op| matches!(op, HostOp::CreateElement { .. })));
        assert!(ops.iter().any(|op| matches!(op, HostOp::PatchProp { key, value: None, .. } if key == "class")));
        assert!(ops.iter().any(|op| matches!(op, HostOp::SetElementText { text, .. } if text == "two")));
        assert_eq!(html(&renderer, root), r#"<p title="t">two</p>"#);
    }

    #[test]
    fn unchanged_tree_issues_no_ops() {
        let (renderer, root) = setup();
        let tree = || h("div").with_children([h("span").with_text("a"), h("span").with_text("b")]);
        renderer.render(Some(tree()), &root).unwrap();
        renderer.with_host(|host| host.clear_ops());

        renderer.render(Some(tree()), &root).unwrap();
        assert!(renderer.with_host(|host| host.ops().is_empty()));
    }

    #[test]
    fn type_change_remounts_in_place() {
        let (renderer, root) = setup();
        renderer
            .render(Some(h("div").with_children([h("p"), h("i")])), &root)
            .unwrap();
        let p = renderer.with_host(|host| {
            let div = host.children(root)[0];
            host.children(div)[0]
        });
        renderer.with_host(|host| host.clear_ops());

        renderer
            .render(Some(h("div").with_children([h("div"), h("i")])), &root)
            .unwrap();
        let ops = renderer.with_host(|host| host.take_ops());
        assert!(ops.contains(&HostOp::Remove { node: p }));
        assert!(ops.iter().any(|op| matches!(op, HostOp::CreateElement { tag, .. } if &**tag == "div")));
        assert_eq!(html(&renderer, root), "<div><div></div><i></i></div>");
    }

    #[test]
    fn text_and_list_children_swap() {
        let (renderer, root) = setup();
        renderer.render(Some(h("div").with_text("plain")), &root).unwrap();
        renderer
            .render(Some(h("div").with_children([h("b"), text("x")])), &root)
            .unwrap();
        assert_eq!(html(&renderer, root), "<div><b></b>x</div>");

        renderer.render(Some(h("div").with_text("again")), &root).unwrap();
        assert_eq!(html(&renderer, root), "<div>again</div>");

        renderer.render(Some(h("div")), &root).unwrap();
        assert_eq!(html(&renderer, root), "<div></div>");
    }

    #[test]
    fn fragments_keep_their_place() {
        let (renderer, root) = setup();
        let tree = |items: &[&str]| {
            h("div").with_children([
                h("header"),
                VNode::fragment(items.iter().map(|item| h("li").key(*item).with_text(*item))),
                h("footer"),
            ])
        };
        renderer.render(Some(tree(&["a", "b"])), &root).unwrap();
        assert_eq!(
            html(&renderer, root),
            "<div><header></header><li>a</li><li>b</li><footer></footer></div>"
        );

        renderer.render(Some(tree(&["b", "c", "a"])), &root).unwrap();
        assert_eq!(
            html(&renderer, root),
            "<div><header></header><li>b</li><li>c</li><li>a</li><footer></footer></div>"
        );
    }

    #[test]
    fn rendering_none_unmounts() {
        let (renderer, root) = setup();
        renderer
            .render(Some(VNode::fragment([h("a"), h("b")])), &root)
            .unwrap();
        renderer.render(None, &root).unwrap();
        assert_eq!(html(&renderer, root), "");
        assert!(renderer.with_host(|host| !host.has_content(&root)));
        assert!(!renderer.is_mounted(&root));
    }

    #[test]
    fn first_render_clears_existing_content() {
        let mut host = MemoryHost::new();
        let root = host.create_root();
        let stale = host.create_text("stale");
        host.insert(&stale, &root, None);
        let renderer = Renderer::new(host);

        renderer.render(Some(h("main")), &root).unwrap();
        assert_eq!(html(&renderer, root), "<main></main>");
    }
}
