//! Rendering
//!
//! This module turns [`VNode`] trees into operations on a host and keeps the
//! host in sync as the trees change.
//!
//! # Concepts
//!
//! ## Nodes
//!
//! A [`VNode`] describes an element, a text node, a fragment, a teleport or a
//! component. Two nodes are "the same node" when their type and key agree;
//! only then is the mounted host node reused.
//!
//! ## Hosts
//!
//! The renderer never touches a real tree itself. Everything goes through
//! [`HostOps`], so any backend that can create, insert and remove nodes can
//! be rendered into. [`MemoryHost`] keeps the tree in memory and logs every
//! operation.
//!
//! ## Components
//!
//! A [`Component`] has a setup function that runs once per instance and
//! returns a render function. The render function runs inside an effect, so
//! reactive state it reads re-renders the instance through the job queue.
//!
//! # Implementation Notes
//!
//! Keyed children are reconciled with the prefix/suffix scan plus longest
//! increasing subsequence approach used by Vue 3 and Inferno: only nodes
//! outside the longest run of already-ordered survivors are moved.

mod component;
mod host;
mod inject;
mod instance;
mod keyed;
mod lifecycle;
mod memory;
mod props;
mod renderer;
mod sequence;
mod teleport;
mod vnode;

pub use component::{current_instance, Component, ComponentBuilder, ComponentContext, RenderFn};
pub use host::HostOps;
pub use inject::{inject, inject_or, provide, try_inject, try_provide};
pub use lifecycle::{
    on_before_mount, on_before_unmount, on_before_update, on_mounted, on_unmounted, on_updated,
    register_hook, HookFn, LifecycleHook,
};
pub use memory::{HostOp, MemoryHost, NodeId};
pub use props::has_props_changed;
pub use renderer::Renderer;
pub use sequence::longest_increasing_subsequence;
pub use vnode::{h, is_same_vnode, text, Children, Props, SlotFn, Slots, VKey, VNode, VNodeType};

pub(crate) use component::adopt_effect;

