//! Teleports render their children into a host node found by selector
//! instead of into their own container. Two empty placeholders mark where
//! the teleport sits in the parent; a third one marks the end of its content
//! inside the target.

use std::sync::Arc;

use crate::error::{Error, Result};

use super::component::InstanceState;
use super::host::HostOps;
use super::renderer::{Mounted, RendererInner};
use super::vnode::VNode;

impl<H: HostOps> RendererInner<H> {
    fn resolve_target(&self, selector: &str) -> Result<H::Node> {
        self.host(|host| host.query_target(selector))
            .ok_or_else(|| Error::TeleportTargetMissing {
                selector: selector.to_owned(),
            })
    }

    pub(crate) fn process_teleport(
        &self,
        old: Option<Mounted<H>>,
        vnode: VNode,
        container: &H::Node,
        anchor: Option<&H::Node>,
        parent: Option<&Arc<InstanceState>>,
    ) -> Result<Mounted<H>> {
        let to = vnode.teleport_to();

        let Some(mut old) = old else {
            return self.mount_teleport(vnode, &to, container, anchor, parent);
        };
        let (Some(target), Some(target_anchor)) = (old.target.clone(), old.target_anchor.clone())
        else {
            let anchor = self.next_host_sibling(&old).or_else(|| anchor.cloned());
            self.unmount(old, true);
            return self.mount_teleport(vnode, &to, container, anchor.as_ref(), parent);
        };

        let next_target = if old.vnode.teleport_to() != to {
            match self.resolve_target(&to) {
                Ok(next_target) => Some(next_target),
                Err(err) => {
                    self.unmount(old, true);
                    return Err(err);
                }
            }
        } else {
            None
        };

        let children = std::mem::take(&mut old.children);
        let patched = self.patch_children(
            old.vnode.children(),
            children,
            vnode.children(),
            &target,
            Some(&target_anchor),
            parent,
        );
        match patched {
            Ok(children) => old.children = children,
            Err(err) => {
                self.unmount(old, true);
                return Err(err);
            }
        }

        if let Some(next_target) = next_target {
            tracing::debug!(from = %old.vnode.teleport_to(), to = %to, "moving teleport");
            self.host(|host| host.insert(&target_anchor, &next_target, None));
            for child in &old.children {
                self.move_node(child, &next_target, Some(&target_anchor));
            }
            old.target = Some(next_target);
        }

        old.vnode = vnode;
        Ok(old)
    }

    fn mount_teleport(
        &self,
        vnode: VNode,
        to: &str,
        container: &H::Node,
        anchor: Option<&H::Node>,
        parent: Option<&Arc<InstanceState>>,
    ) -> Result<Mounted<H>> {
        let target = self.resolve_target(to)?;

        let (start, end, target_anchor) = self.host(|host| {
            let start = host.create_text("");
            let end = host.create_text("");
            host.insert(&start, container, anchor);
            host.insert(&end, container, anchor);
            let target_anchor = host.create_text("");
            host.insert(&target_anchor, &target, None);
            (start, end, target_anchor)
        });

        let list = vnode.children().as_list().unwrap_or_default();
        let children = self.mount_children(list, &target, Some(&target_anchor), parent);

        let mut mounted = Mounted::new(vnode);
        mounted.el = Some(start);
        mounted.anchor = Some(end);
        mounted.target = Some(target);
        mounted.target_anchor = Some(target_anchor);
        match children {
            Ok(children) => {
                mounted.children = children;
                Ok(mounted)
            }
            Err(err) => {
                self.unmount_teleport(mounted, true);
                Err(err)
            }
        }
    }

    /// The children always leave the target, even when an ancestor is being
    /// removed, since the target lives outside that ancestor.
    pub(crate) fn unmount_teleport(&self, mounted: Mounted<H>, do_remove: bool) {
        self.unmount_children(mounted.children, true);
        self.host(|host| {
            if let Some(target_anchor) = &mounted.target_anchor {
                host.remove(target_anchor);
            }
            if do_remove {
                for node in [&mounted.el, &mounted.anchor].into_iter().flatten() {
                    host.remove(node);
                }
            }
        });
    }
}
