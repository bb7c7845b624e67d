//! The display surface seam.
//!
//! The renderer never touches a concrete surface. Everything it does to the
//! host tree goes through [`HostOps`]: create, insert, remove, and patch one
//! prop at a time. What a prop means on the surface is the host's business.

use std::fmt::Debug;
use std::hash::Hash;

use crate::reactive::Value;

/// Operations the renderer needs from a display surface.
pub trait HostOps: Send + 'static {
    /// Handle to one host node. Cheap to clone.
    type Node: Clone + Eq + Hash + Debug + Send + Sync + 'static;

    fn create_element(&mut self, tag: &str) -> Self::Node;

    fn create_text(&mut self, text: &str) -> Self::Node;

    /// Replace the content of a text node.
    fn set_text(&mut self, node: &Self::Node, text: &str);

    /// Replace every child of an element with `text`.
    fn set_element_text(&mut self, el: &Self::Node, text: &str);

    /// Insert `child` into `parent` before `anchor`, or at the end. A node
    /// that is already attached somewhere is moved.
    fn insert(&mut self, child: &Self::Node, parent: &Self::Node, anchor: Option<&Self::Node>);

    /// Detach `child` from its parent.
    fn remove(&mut self, child: &Self::Node);

    /// Apply a single prop change. `next` is `None` when the prop went away.
    fn patch_prop(&mut self, el: &Self::Node, key: &str, prev: Option<&Value>, next: Option<&Value>);

    fn parent(&self, node: &Self::Node) -> Option<Self::Node>;

    fn next_sibling(&self, node: &Self::Node) -> Option<Self::Node>;

    /// Resolve a teleport target.
    fn query_target(&self, selector: &str) -> Option<Self::Node>;

    /// Does `node` already have children?
    fn has_content(&self, node: &Self::Node) -> bool;
}
