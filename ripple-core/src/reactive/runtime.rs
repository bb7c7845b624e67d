//! Reactive Runtime
//!
//! The runtime owns the dependency store: container identity -> field key ->
//! set of subscribed effects. It is the single place where reads are recorded
//! (`track`) and where writes fan out to subscribers (`trigger`).
//!
//! # How It Works
//!
//! 1. When a wrapped container is read inside a running effect, the runtime
//!    adds that effect to the dependency set of `(container, key)`.
//!
//! 2. When a wrapped container is written, the runtime collects every
//!    dependency set affected by the mutation, merges them, and re-runs (or
//!    schedules) each subscriber once.
//!
//! 3. Memo getters are notified before plain effects, so an effect reading a
//!    memo never sees a stale cached value.
//!
//! # Thread Safety
//!
//! The store is thread-local. Reactivity is single-threaded and cooperative;
//! each thread is its own runtime, which also keeps parallel tests isolated.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

use indexmap::IndexMap;

use super::context::ReactiveContext;
use super::effect::Effect;
use super::proxy::ProxyInner;
use super::subscriber::{Dep, SubscriberId};
use super::target::{Shape, TargetId};

/// Key of one dependency set within a container.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DepKey {
    /// A named record field.
    Field(Arc<str>),
    /// A list index.
    Index(usize),
    /// A list's length.
    Length,
    /// Key enumeration or existence checks over a record.
    Iterate,
}

impl DepKey {
    pub fn field(name: &str) -> Self {
        DepKey::Field(Arc::from(name))
    }
}

/// The kind of mutation being reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerKind {
    /// An existing key changed value.
    Set,
    /// A key that did not exist was created.
    Add,
    /// A key was removed.
    Delete,
}

/// A mutation on one container, as reported to [`Runtime::trigger`].
#[derive(Debug, Clone)]
pub struct Mutation {
    pub target: TargetId,
    pub shape: Shape,
    pub kind: TriggerKind,
    pub key: DepKey,
    /// For a list `Length` write: the new length.
    pub new_length: Option<usize>,
}

#[derive(Default)]
struct Store {
    targets: HashMap<TargetId, IndexMap<DepKey, Dep>>,
    proxies: HashMap<TargetId, Weak<ProxyInner>>,
}

thread_local! {
    static STORE: RefCell<Store> = RefCell::new(Store::default());
}

/// The per-thread reactive runtime.
pub struct Runtime;

impl Runtime {
    /// Record that the running effect read `key` of `target`.
    ///
    /// No-op when no effect is running or tracking is paused.
    pub fn track(target: TargetId, key: DepKey) {
        let Some(effect) = ReactiveContext::tracking_target() else {
            return;
        };

        let dep = STORE.with(|store| {
            store
                .borrow_mut()
                .targets
                .entry(target)
                .or_default()
                .entry(key.clone())
                .or_default()
                .clone()
        });

        tracing::trace!(target_id = target.raw(), ?key, effect = effect.id().raw(), "track");
        effect.add_dep(&dep);
    }

    /// Subscribe the running effect to a standalone dependency set, such as a
    /// signal's or a memo's.
    pub fn track_dep(dep: &Dep) {
        if let Some(effect) = ReactiveContext::tracking_target() {
            effect.add_dep(dep);
        }
    }

    /// Notify subscribers affected by `mutation`.
    pub fn trigger(mutation: Mutation) {
        let deps = STORE.with(|store| {
            let store = store.borrow();
            let Some(deps_map) = store.targets.get(&mutation.target) else {
                return Vec::new();
            };
            Self::affected(deps_map, &mutation)
        });

        tracing::trace!(
            target_id = mutation.target.raw(),
            key = ?mutation.key,
            kind = ?mutation.kind,
            sets = deps.len(),
            "trigger"
        );

        if !deps.is_empty() {
            Self::trigger_deps(&deps);
        }
    }

    /// Collect the dependency sets a mutation touches.
    fn affected(deps_map: &IndexMap<DepKey, Dep>, mutation: &Mutation) -> Vec<Dep> {
        let mut deps = Vec::new();

        if mutation.shape == Shape::List && mutation.key == DepKey::Length {
            // Shrinking a list invalidates every index past the new end.
            let new_length = mutation.new_length.unwrap_or(0);
            for (key, dep) in deps_map {
                match key {
                    DepKey::Length => deps.push(dep.clone()),
                    DepKey::Index(index) if *index >= new_length => deps.push(dep.clone()),
                    _ => {}
                }
            }
            return deps;
        }

        if let Some(dep) = deps_map.get(&mutation.key) {
            deps.push(dep.clone());
        }

        match (mutation.kind, mutation.shape) {
            (TriggerKind::Add, Shape::Record) | (TriggerKind::Delete, Shape::Record) => {
                if let Some(dep) = deps_map.get(&DepKey::Iterate) {
                    deps.push(dep.clone());
                }
            }
            (TriggerKind::Add, Shape::List) if matches!(mutation.key, DepKey::Index(_)) => {
                // Writing past the end is a length change, and every existing
                // index is treated as affected.
                for (key, dep) in deps_map {
                    if matches!(key, DepKey::Length | DepKey::Index(_)) && key != &mutation.key {
                        deps.push(dep.clone());
                    }
                }
            }
            _ => {}
        }

        deps
    }

    /// Run or schedule every subscriber of `deps`, each at most once.
    ///
    /// Memo getters go first, then plain effects, each group in subscription
    /// order. The currently running effect is skipped.
    pub fn trigger_deps(deps: &[Dep]) {
        let mut seen: IndexMap<SubscriberId, Effect> = IndexMap::new();
        for dep in deps {
            for effect in dep.snapshot() {
                seen.entry(effect.id()).or_insert(effect);
            }
        }

        let current = ReactiveContext::current_subscriber();
        let (computed, plain): (Vec<Effect>, Vec<Effect>) =
            seen.into_values().partition(Effect::is_computed);

        for effect in computed.into_iter().chain(plain) {
            if Some(effect.id()) == current {
                continue;
            }
            effect.schedule();
        }
    }

    /// Subscribers of `(target, key)`, in subscription order.
    pub fn subscribers(target: TargetId, key: &DepKey) -> Vec<SubscriberId> {
        STORE.with(|store| {
            store
                .borrow()
                .targets
                .get(&target)
                .and_then(|deps| deps.get(key))
                .map(Dep::subscriber_ids)
                .unwrap_or_default()
        })
    }

    /// Whether the store holds any entry for `target`.
    pub fn is_tracked(target: TargetId) -> bool {
        STORE.with(|store| store.borrow().targets.contains_key(&target))
    }

    /// Drop everything recorded for a container. Called when the container's
    /// last handle goes away.
    pub(crate) fn forget_target(target: TargetId) {
        // The thread-local may already be gone during thread teardown.
        let _ = STORE.try_with(|store| {
            if let Ok(mut store) = store.try_borrow_mut() {
                store.targets.remove(&target);
                store.proxies.remove(&target);
            }
        });
    }

    pub(crate) fn proxy_for(target: TargetId) -> Option<Arc<ProxyInner>> {
        STORE.with(|store| {
            store
                .borrow()
                .proxies
                .get(&target)
                .and_then(Weak::upgrade)
        })
    }

    pub(crate) fn register_proxy(target: TargetId, proxy: &Arc<ProxyInner>) {
        STORE.with(|store| {
            store
                .borrow_mut()
                .proxies
                .insert(target, Arc::downgrade(proxy));
        });
    }

    /// Forget every recorded dependency and wrapper on this thread.
    ///
    /// Meant for test isolation and for tearing down an application.
    pub fn reset() {
        STORE.with(|store| *store.borrow_mut() = Store::default());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};

    fn counting_effect(
        target: TargetId,
        keys: Vec<DepKey>,
        count: Arc<AtomicI32>,
    ) -> Effect {
        Effect::new(move || {
            for key in &keys {
                Runtime::track(target, key.clone());
            }
            count.fetch_add(1, Ordering::SeqCst);
        })
    }

    fn target() -> super::super::target::Target {
        super::super::target::Target::record()
    }

    #[test]
    fn track_records_running_effect() {
        let t = target();
        let count = Arc::new(AtomicI32::new(0));
        let effect = counting_effect(t.id(), vec![DepKey::field("a")], count);

        assert_eq!(Runtime::subscribers(t.id(), &DepKey::field("a")), vec![effect.id()]);

        effect.dispose();
        assert!(Runtime::subscribers(t.id(), &DepKey::field("a")).is_empty());
    }

    #[test]
    fn track_outside_effect_is_noop() {
        let t = target();
        Runtime::track(t.id(), DepKey::field("a"));
        assert!(!Runtime::is_tracked(t.id()));
    }

    #[test]
    fn subscriber_runs_once_per_trigger() {
        let t = target();
        let count = Arc::new(AtomicI32::new(0));
        let _effect = counting_effect(
            t.id(),
            vec![DepKey::field("a"), DepKey::Iterate],
            count.clone(),
        );

        Runtime::trigger(Mutation {
            target: t.id(),
            shape: Shape::Record,
            kind: TriggerKind::Add,
            key: DepKey::field("a"),
            new_length: None,
        });

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn set_does_not_touch_iteration() {
        let t = target();
        let count = Arc::new(AtomicI32::new(0));
        let _effect = counting_effect(t.id(), vec![DepKey::Iterate], count.clone());

        Runtime::trigger(Mutation {
            target: t.id(),
            shape: Shape::Record,
            kind: TriggerKind::Set,
            key: DepKey::field("a"),
            new_length: None,
        });
        assert_eq!(count.load(Ordering::SeqCst), 1);

        Runtime::trigger(Mutation {
            target: t.id(),
            shape: Shape::Record,
            kind: TriggerKind::Delete,
            key: DepKey::field("a"),
            new_length: None,
        });
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn shrinking_length_hits_trailing_indices_only() {
        let t = target();
        let low = Arc::new(AtomicI32::new(0));
        let high = Arc::new(AtomicI32::new(0));
        let _low = counting_effect(t.id(), vec![DepKey::Index(0)], low.clone());
        let _high = counting_effect(t.id(), vec![DepKey::Index(3)], high.clone());

        Runtime::trigger(Mutation {
            target: t.id(),
            shape: Shape::List,
            kind: TriggerKind::Set,
            key: DepKey::Length,
            new_length: Some(2),
        });

        assert_eq!(low.load(Ordering::SeqCst), 1);
        assert_eq!(high.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn out_of_bounds_add_hits_length_and_every_index() {
        let t = target();
        let length = Arc::new(AtomicI32::new(0));
        let first = Arc::new(AtomicI32::new(0));
        let _length = counting_effect(t.id(), vec![DepKey::Length], length.clone());
        let _first = counting_effect(t.id(), vec![DepKey::Index(0)], first.clone());

        Runtime::trigger(Mutation {
            target: t.id(),
            shape: Shape::List,
            kind: TriggerKind::Add,
            key: DepKey::Index(5),
            new_length: None,
        });

        assert_eq!(length.load(Ordering::SeqCst), 2);
        assert_eq!(first.load(Ordering::SeqCst), 2);
    }
}
