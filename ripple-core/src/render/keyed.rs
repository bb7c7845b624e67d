//! Keyed Child Diff
//!
//! Reconciles two ordered child lists with as few host moves as possible.
//!
//! # How the Diff Works
//!
//! 1. Walk from the front while old and new nodes are the same node (same
//!    type and key), patching in place. Then do the same from the back.
//!
//! 2. If the old list is used up, whatever is left of the new list is
//!    mounted. If the new list is used up, what is left of the old list is
//!    unmounted.
//!
//! 3. Otherwise the middle is unordered. Each remaining old node looks up
//!    its new position (by key, or for keyless nodes the first unmatched
//!    keyless node of the same type) and is patched there or unmounted.
//!    `new_to_old` records, per new slot, which old node landed there.
//!
//! 4. If the matched old positions are not already increasing, the longest
//!    increasing subsequence of `new_to_old` is the largest group that can
//!    stay where it is. Walking the new range back to front, fresh slots are
//!    mounted and matched nodes outside that group are moved before the
//!    node that follows them.
//!
//! If patching any child fails, every child of the list is unmounted before
//! the error is returned, so no host node is left behind untracked.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::Result;

use super::component::InstanceState;
use super::host::HostOps;
use super::renderer::{Mounted, RendererInner};
use super::sequence::longest_increasing_subsequence;
use super::vnode::{is_same_vnode, VKey, VNode};

fn take_if_same<H: HostOps>(slot: &mut Option<Mounted<H>>, next: &VNode) -> Option<Mounted<H>> {
    if slot.as_ref().is_some_and(|old| is_same_vnode(&old.vnode, next)) {
        slot.take()
    } else {
        None
    }
}

impl<H: HostOps> RendererInner<H> {
    pub(crate) fn patch_keyed_children(
        &self,
        old: Vec<Mounted<H>>,
        new: &[VNode],
        container: &H::Node,
        anchor: Option<&H::Node>,
        parent: Option<&Arc<InstanceState>>,
    ) -> Result<Vec<Mounted<H>>> {
        let mut old: Vec<Option<Mounted<H>>> = old.into_iter().map(Some).collect();
        let mut placed: Vec<Option<Mounted<H>>> =
            std::iter::repeat_with(|| None).take(new.len()).collect();

        if let Err(err) = self.reconcile(&mut old, new, &mut placed, container, anchor, parent) {
            // The failed child cleaned up after itself; its siblings go too.
            for mounted in placed.into_iter().chain(old).flatten() {
                self.unmount(mounted, true);
            }
            return Err(err);
        }
        Ok(placed.into_iter().flatten().collect())
    }

    fn reconcile(
        &self,
        old: &mut [Option<Mounted<H>>],
        new: &[VNode],
        placed: &mut [Option<Mounted<H>>],
        container: &H::Node,
        anchor: Option<&H::Node>,
        parent: Option<&Arc<InstanceState>>,
    ) -> Result<()> {
        let mut start = 0;
        let mut old_end = old.len();
        let mut new_end = new.len();

        while start < old_end && start < new_end {
            let Some(prev) = take_if_same(&mut old[start], &new[start]) else {
                break;
            };
            placed[start] = Some(self.patch(Some(prev), new[start].clone(), container, None, parent)?);
            start += 1;
        }

        while start < old_end && start < new_end {
            let Some(prev) = take_if_same(&mut old[old_end - 1], &new[new_end - 1]) else {
                break;
            };
            placed[new_end - 1] =
                Some(self.patch(Some(prev), new[new_end - 1].clone(), container, None, parent)?);
            old_end -= 1;
            new_end -= 1;
        }

        if start >= old_end {
            let anchor = self.anchor_after(placed, new_end, anchor);
            for index in start..new_end {
                placed[index] =
                    Some(self.patch(None, new[index].clone(), container, anchor.as_ref(), parent)?);
            }
        } else if start >= new_end {
            for slot in &mut old[start..old_end] {
                if let Some(prev) = slot.take() {
                    self.unmount(prev, true);
                }
            }
        } else {
            self.patch_unordered(
                &mut old[start..old_end],
                new,
                start..new_end,
                placed,
                container,
                anchor,
                parent,
            )?;
        }

        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn patch_unordered(
        &self,
        old: &mut [Option<Mounted<H>>],
        new: &[VNode],
        range: std::ops::Range<usize>,
        placed: &mut [Option<Mounted<H>>],
        container: &H::Node,
        anchor: Option<&H::Node>,
        parent: Option<&Arc<InstanceState>>,
    ) -> Result<()> {
        let start = range.start;
        let to_be_patched = range.len();

        let mut key_to_new: HashMap<&VKey, usize> = HashMap::new();
        for index in range.clone() {
            if let Some(key) = new[index].vkey() {
                key_to_new.insert(key, index);
            }
        }

        let mut new_to_old: Vec<Option<usize>> = vec![None; to_be_patched];
        let mut patched = 0;
        let mut moved = false;
        let mut max_new_index = 0;

        for (offset, slot) in old.iter_mut().enumerate() {
            let Some(prev) = slot.take() else {
                continue;
            };
            if patched >= to_be_patched {
                // Every new slot is taken; the rest can only go.
                self.unmount(prev, true);
                continue;
            }

            let found = match prev.vnode.vkey() {
                Some(key) => key_to_new.get(key).copied().filter(|&index| {
                    new_to_old[index - start].is_none() && is_same_vnode(&prev.vnode, &new[index])
                }),
                None => range.clone().find(|&index| {
                    new_to_old[index - start].is_none()
                        && new[index].vkey().is_none()
                        && is_same_vnode(&prev.vnode, &new[index])
                }),
            };
            let Some(new_index) = found else {
                self.unmount(prev, true);
                continue;
            };

            new_to_old[new_index - start] = Some(start + offset);
            if new_index >= max_new_index {
                max_new_index = new_index;
            } else {
                moved = true;
            }
            placed[new_index] =
                Some(self.patch(Some(prev), new[new_index].clone(), container, None, parent)?);
            patched += 1;
        }

        let stable = if moved {
            longest_increasing_subsequence(&new_to_old)
        } else {
            Vec::new()
        };
        let mut stable = stable.iter().rev().peekable();

        for offset in (0..to_be_patched).rev() {
            let index = start + offset;
            let next_anchor = self.anchor_after(placed, index + 1, anchor);
            match new_to_old[offset] {
                None => {
                    placed[index] = Some(self.patch(
                        None,
                        new[index].clone(),
                        container,
                        next_anchor.as_ref(),
                        parent,
                    )?);
                }
                Some(_) if moved => {
                    if stable.peek() == Some(&&offset) {
                        stable.next();
                    } else if let Some(node) = &placed[index] {
                        tracing::trace!(index, "moving child");
                        self.move_node(node, container, next_anchor.as_ref());
                    }
                }
                Some(_) => {}
            }
        }

        Ok(())
    }

    /// Host node to insert before so that a node lands right before slot
    /// `index` of the new list; past the end, the list's own anchor.
    fn anchor_after(
        &self,
        placed: &[Option<Mounted<H>>],
        index: usize,
        fallback: Option<&H::Node>,
    ) -> Option<H::Node> {
        placed
            .get(index)
            .and_then(Option::as_ref)
            .and_then(|next| self.first_host_node(next))
            .or_else(|| fallback.cloned())
    }
}

#[cfg(test)]
mod tests {
    use crate::render::memory::{HostOp, MemoryHost, NodeId};
    use crate::render::renderer::Renderer;
    use crate::render::vnode::{h, VNode};

    fn list(keys: &[&str]) -> VNode {
        h("ul").with_children(keys.iter().map(|key| h("li").key(*key).with_text(*key)))
    }

    fn setup(keys: &[&str]) -> (Renderer<MemoryHost>, NodeId, Vec<NodeId>) {
        let mut host = MemoryHost::new();
        let root = host.create_root();
        let renderer = Renderer::new(host);
        renderer.render(Some(list(keys)), &root).unwrap();
        let items = renderer.with_host(|host| {
            let ul = host.children(root)[0];
            host.children(ul)
        });
        renderer.with_host(|host| host.clear_ops());
        (renderer, root, items)
    }

    fn texts(renderer: &Renderer<MemoryHost>, root: NodeId) -> Vec<String> {
        renderer.with_host(|host| {
            let ul = host.children(root)[0];
            host.children(ul)
                .into_iter()
                .map(|li| host.text_content(li))
                .collect()
        })
    }

    fn inserts(ops: &[HostOp]) -> Vec<(NodeId, Option<NodeId>)> {
        ops.iter()
            .filter_map(|op| match op {
                HostOp::Insert { child, anchor, .. } => Some((*child, *anchor)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn minimal_moves_for_a_reordered_middle() {
        let (renderer, root, items) = setup(&["a", "b", "c", "d", "e", "f", "g"]);
        let &[_, _, c, _, e, f, _] = items.as_slice() else {
            panic!("expected seven items");
        };

        renderer
            .render(Some(list(&["a", "b", "e", "c", "d", "h", "f", "g"])), &root)
            .unwrap();
        let ops = renderer.with_host(|host| host.take_ops());

        let created: Vec<NodeId> = ops
            .iter()
            .filter_map(|op| match op {
                HostOp::CreateElement { node, .. } => Some(*node),
                _ => None,
            })
            .collect();
        assert_eq!(created.len(), 1);
        let h_node = created[0];

        assert_eq!(inserts(&ops), vec![(h_node, Some(f)), (e, Some(c))]);
        assert!(!ops.iter().any(|op| matches!(op, HostOp::Remove { .. })));
        assert_eq!(texts(&renderer, root), ["a", "b", "e", "c", "d", "h", "f", "g"]);
    }

    #[test]
    fn appends_and_prepends() {
        let (renderer, root, items) = setup(&["a", "b"]);
        renderer.render(Some(list(&["a", "b", "c"])), &root).unwrap();
        let ops = renderer.with_host(|host| host.take_ops());
        assert_eq!(inserts(&ops).len(), 1);
        assert_eq!(inserts(&ops)[0].1, None);

        renderer.render(Some(list(&["z", "a", "b", "c"])), &root).unwrap();
        let ops = renderer.with_host(|host| host.take_ops());
        assert_eq!(inserts(&ops).len(), 1);
        assert_eq!(inserts(&ops)[0].1, Some(items[0]));
        assert_eq!(texts(&renderer, root), ["z", "a", "b", "c"]);
    }

    #[test]
    fn removes_from_the_middle() {
        let (renderer, root, items) = setup(&["a", "b", "c", "d"]);
        renderer.render(Some(list(&["a", "d"])), &root).unwrap();
        let ops = renderer.with_host(|host| host.take_ops());
        assert_eq!(
            ops,
            vec![
                HostOp::Remove { node: items[1] },
                HostOp::Remove { node: items[2] }
            ]
        );
        assert_eq!(texts(&renderer, root), ["a", "d"]);
    }

    #[test]
    fn reversal_moves_all_but_one() {
        let (renderer, root, _) = setup(&["a", "b", "c", "d"]);
        renderer.render(Some(list(&["d", "c", "b", "a"])), &root).unwrap();
        let ops = renderer.with_host(|host| host.take_ops());
        assert_eq!(inserts(&ops).len(), 3);
        assert_eq!(texts(&renderer, root), ["d", "c", "b", "a"]);
    }

    #[test]
    fn replaced_keys_are_remounted() {
        let (renderer, root, items) = setup(&["a", "b", "c"]);
        renderer.render(Some(list(&["a", "x", "c"])), &root).unwrap();
        let ops = renderer.with_host(|host| host.take_ops());
        assert!(ops.contains(&HostOp::Remove { node: items[1] }));
        let inserted = inserts(&ops);
        assert_eq!(inserted.len(), 1);
        assert_eq!(inserted[0].1, Some(items[2]));
        assert_eq!(texts(&renderer, root), ["a", "x", "c"]);
    }

    #[test]
    fn keyless_nodes_match_by_type() {
        let mut host = MemoryHost::new();
        let root = host.create_root();
        let renderer = Renderer::new(host);
        let tree = |children: Vec<VNode>| h("div").with_children(children);

        renderer
            .render(Some(tree(vec![h("p").key("k"), h("span"), h("i")])), &root)
            .unwrap();
        let span = renderer.with_host(|host| host.children(host.children(root)[0])[1]);
        renderer.with_host(|host| host.clear_ops());

        renderer
            .render(Some(tree(vec![h("b"), h("span"), h("p").key("k")])), &root)
            .unwrap();
        let ops = renderer.with_host(|host| host.take_ops());
        assert!(!ops.contains(&HostOp::Remove { node: span }));
        assert_eq!(
            renderer.with_host(|host| host.render_html(root)),
            "<div><b></b><span></span><p></p></div>"
        );
    }
}
