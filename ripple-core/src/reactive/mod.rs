//! Reactive Primitives
//!
//! This module implements the reactive-state runtime: wrapped containers,
//! signals, memos and effects. These primitives form the foundation of
//! Ripple's fine-grained reactivity.
//!
//! # Concepts
//!
//! ## Wrapped containers
//!
//! A [`Reactive`] is a view over a plain record or list. Reading a field
//! inside a running effect subscribes the effect to that field; writing the
//! field re-runs exactly the effects that read it.
//!
//! ## Signals
//!
//! A [`Signal`] is a single reactive value with its own dependency set.
//!
//! ## Memos
//!
//! A [`Memo`] is a derived value that caches its result. It re-evaluates only
//! when read after one of its dependencies changed.
//!
//! ## Effects
//!
//! An [`Effect`] is a side-effecting computation that runs whenever its
//! dependencies change. Effects with a scheduler hand their re-runs to the
//! job queue instead of running inline.
//!
//! # Implementation Notes
//!
//! The reactive system uses a thread-local tracking context to automatically
//! detect dependencies. When a field or signal is read, we check if there is
//! a running effect with tracking enabled and, if so, record the dependency
//! in the [`Runtime`] store.
//!
//! This approach (sometimes called "automatic dependency tracking" or
//! "transparent reactivity") is used by SolidJS, Vue 3, and Leptos.

mod array;
mod context;
mod effect;
mod memo;
mod proxy;
mod refs;
mod runtime;
mod signal;
mod subscriber;
mod target;
mod value;

pub use context::{
    enable_tracking, is_tracking, pause_tracking, reset_tracking, should_track, untracked,
    ReactiveContext,
};
pub use effect::{Effect, EffectKind, EffectOptions, EffectScheduler, StopHook, WeakEffect};
pub use memo::{Memo, MemoState};
pub use proxy::{is_reactive, reactive, try_reactive, Key, Reactive};
pub use refs::{custom_ref, to_ref, to_refs, CustomRef, FieldRef, RefTrack, RefTrigger};
pub use runtime::{DepKey, Mutation, Runtime, TriggerKind};
pub use signal::Signal;
pub use subscriber::{Dep, SubscriberId};
pub use target::{Shape, Target, TargetData, TargetId};
pub use value::{has_changed, same_value, to_raw, Value};
