//! Watchers
//!
//! A watcher is an effect whose re-runs go through the job queue. It either
//! calls a callback with the new and previous value of a source
//! ([`watch`]), or simply re-runs a side effect ([`watch_effect`]).
//!
//! # How Watchers Work
//!
//! 1. The source getter runs inside a lazy effect, so whatever it reads is
//!    tracked. With `deep`, the getter also walks the returned value so every
//!    nested field is tracked.
//!
//! 2. When a dependency changes, the effect's scheduler queues the watcher
//!    job in the phase picked by [`Flush`], or runs it inline for
//!    [`Flush::Sync`].
//!
//! 3. The job runs the registered cleanup, re-runs the getter, and calls the
//!    callback if the value changed (always, for deep watchers).
//!
//! A watcher created during component setup is stopped when the component
//! unmounts. Otherwise it runs until [`WatchHandle::stop`] is called.

use std::any::Any;
use std::collections::HashSet;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

use crate::reactive::{Effect, EffectOptions, Reactive, TargetId, Value, WeakEffect};

use super::job::Job;
use super::queue::{queue_post_flush_cb, queue_pre_flush_cb};

/// When a triggered watcher runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Flush {
    /// Before component updates, in the pre phase.
    #[default]
    Pre,
    /// After component updates, in the post phase.
    Post,
    /// Inline, inside the write that triggered it.
    Sync,
}

/// Options for [`watch`].
#[derive(Debug, Clone, Copy, Default)]
pub struct WatchOptions {
    /// Call the callback once right away, with no previous value.
    pub immediate: bool,
    /// Track every nested field of the returned value.
    pub deep: bool,
    pub flush: Flush,
}

type CleanupFn = Box<dyn FnOnce() + Send>;

/// Registrar for a cleanup callback, handed to watcher callbacks.
///
/// The registered callback runs before the watcher's next run and when the
/// watcher stops.
#[derive(Clone, Default)]
pub struct OnCleanup {
    slot: Arc<Mutex<Option<CleanupFn>>>,
}

impl OnCleanup {
    pub fn register<F>(&self, cleanup: F)
    where
        F: FnOnce() + Send + 'static,
    {
        *self.slot.lock() = Some(Box::new(cleanup));
    }

    fn run(&self) {
        let cleanup = self.slot.lock().take();
        if let Some(cleanup) = cleanup {
            cleanup();
        }
    }
}

/// Handle to a running watcher.
#[must_use = "a watcher created outside a component can only be stopped through its handle"]
#[derive(Clone, Debug)]
pub struct WatchHandle {
    effect: Effect,
}

impl WatchHandle {
    /// Stop the watcher. The pending cleanup runs.
    pub fn stop(&self) {
        self.effect.dispose();
    }

    pub fn is_active(&self) -> bool {
        self.effect.is_active()
    }

    pub fn effect(&self) -> &Effect {
        &self.effect
    }
}

/// Watch `source` and call `cb` with the new value, the previous one and a
/// cleanup registrar whenever it changes.
///
/// ```rust,ignore
/// let _handle = watch(
///     move || state.get("count"),
///     |count, previous, _| println!("{previous:?} -> {count:?}"),
///     WatchOptions::default(),
/// );
/// ```
pub fn watch<T, S, C>(source: S, cb: C, options: WatchOptions) -> WatchHandle
where
    T: Clone + PartialEq + Send + Sync + 'static,
    S: Fn() -> T + Send + Sync + 'static,
    C: Fn(&T, Option<&T>, &OnCleanup) + Send + Sync + 'static,
{
    let deep = options.deep;
    let cleanup = OnCleanup::default();
    let latest: Arc<Mutex<Option<T>>> = Arc::new(Mutex::new(None));
    let previous: Arc<Mutex<Option<T>>> = Arc::new(Mutex::new(None));
    let slot: Arc<OnceLock<WeakEffect>> = Arc::new(OnceLock::new());

    let getter = {
        let latest = latest.clone();
        move || {
            let value = source();
            if deep {
                traverse_any(&value);
            }
            *latest.lock() = Some(value);
        }
    };

    let job = Job::new({
        let slot = slot.clone();
        let cleanup = cleanup.clone();
        let latest = latest.clone();
        let previous = previous.clone();
        move || {
            let Some(effect) = slot.get().and_then(WeakEffect::upgrade) else {
                return;
            };
            if !effect.is_active() {
                return;
            }
            cleanup.run();
            effect.run();

            let Some(next) = latest.lock().clone() else {
                return;
            };
            let old = previous.lock().take();
            if deep || old.as_ref() != Some(&next) {
                cb(&next, old.as_ref(), &cleanup);
            }
            *previous.lock() = Some(next);
        }
    })
    .allow_recurse();

    let effect = build_effect(getter, job.clone(), options.flush, &slot, &cleanup);

    if options.immediate {
        job.run();
    } else {
        effect.run();
        *previous.lock() = latest.lock().take();
    }

    WatchHandle { effect }
}

/// Deep-watch a wrapped container. Every nested field is tracked and the
/// callback fires on any change.
pub fn watch_reactive<C>(source: &Reactive, cb: C, options: WatchOptions) -> WatchHandle
where
    C: Fn(&Value, Option<&Value>, &OnCleanup) + Send + Sync + 'static,
{
    let source = source.clone();
    watch(
        move || Value::Reactive(source.clone()),
        cb,
        WatchOptions {
            deep: true,
            ..options
        },
    )
}

/// Run `effect` now and again whenever what it read changes, in the pre
/// phase.
pub fn watch_effect<F>(effect: F) -> WatchHandle
where
    F: Fn(&OnCleanup) + Send + Sync + 'static,
{
    watch_effect_with(effect, Flush::Pre)
}

/// [`watch_effect`] flushed before component updates.
pub fn watch_pre_effect<F>(effect: F) -> WatchHandle
where
    F: Fn(&OnCleanup) + Send + Sync + 'static,
{
    watch_effect_with(effect, Flush::Pre)
}

/// [`watch_effect`] flushed after component updates.
pub fn watch_post_effect<F>(effect: F) -> WatchHandle
where
    F: Fn(&OnCleanup) + Send + Sync + 'static,
{
    watch_effect_with(effect, Flush::Post)
}

/// [`watch_effect`] re-run inline, inside the triggering write.
pub fn watch_sync_effect<F>(effect: F) -> WatchHandle
where
    F: Fn(&OnCleanup) + Send + Sync + 'static,
{
    watch_effect_with(effect, Flush::Sync)
}

fn watch_effect_with<F>(body: F, flush: Flush) -> WatchHandle
where
    F: Fn(&OnCleanup) + Send + Sync + 'static,
{
    let cleanup = OnCleanup::default();
    let slot: Arc<OnceLock<WeakEffect>> = Arc::new(OnceLock::new());

    let getter = {
        let cleanup = cleanup.clone();
        move || body(&cleanup)
    };

    let job = Job::new({
        let slot = slot.clone();
        let cleanup = cleanup.clone();
        move || {
            let Some(effect) = slot.get().and_then(WeakEffect::upgrade) else {
                return;
            };
            if !effect.is_active() {
                return;
            }
            cleanup.run();
            effect.run();
        }
    });

    let effect = build_effect(getter, job, flush, &slot, &cleanup);
    if flush == Flush::Post {
        let effect = effect.clone();
        queue_post_flush_cb(Job::new(move || effect.run()));
    } else {
        effect.run();
    }

    WatchHandle { effect }
}

fn build_effect<G>(
    getter: G,
    job: Job,
    flush: Flush,
    slot: &Arc<OnceLock<WeakEffect>>,
    cleanup: &OnCleanup,
) -> Effect
where
    G: Fn() + Send + Sync + 'static,
{
    let scheduler: Arc<dyn Fn() + Send + Sync> = match flush {
        Flush::Sync => Arc::new(move || job.run()),
        Flush::Pre => Arc::new(move || queue_pre_flush_cb(job.clone())),
        Flush::Post => Arc::new(move || queue_post_flush_cb(job.clone())),
    };

    let effect = Effect::with_options(
        getter,
        EffectOptions {
            lazy: true,
            scheduler: Some(scheduler),
        },
    );
    let _ = slot.set(effect.downgrade());

    let cleanup = cleanup.clone();
    effect.set_on_stop(Arc::new(move || cleanup.run()));

    crate::render::adopt_effect(&effect);
    effect
}

fn traverse_any<T: 'static>(value: &T) {
    let value: &dyn Any = value;
    let mut seen = HashSet::new();
    if let Some(value) = value.downcast_ref::<Value>() {
        traverse(value, &mut seen);
    } else if let Some(reactive) = value.downcast_ref::<Reactive>() {
        traverse(&Value::Reactive(reactive.clone()), &mut seen);
    }
}

/// Read every nested field of `value`, tracking all of them.
pub fn traverse(value: &Value, seen: &mut HashSet<TargetId>) {
    match value {
        Value::Reactive(reactive) => {
            if !seen.insert(reactive.id()) {
                return;
            }
            for key in reactive.keys() {
                traverse(&reactive.get(key), seen);
            }
        }
        Value::Ref(signal) => traverse(&signal.get(), seen),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::{drain, reset};
    use crate::reactive::Signal;
    use std::sync::atomic::{AtomicI32, Ordering};

    #[test]
    fn callback_fires_after_drain_with_old_value() {
        reset();
        let count = Signal::new(1);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let _handle = watch(
            {
                let count = count.clone();
                move || count.get()
            },
            {
                let seen = seen.clone();
                move |next: &i32, prev: Option<&i32>, _: &OnCleanup| {
                    seen.lock().push((*next, prev.copied()));
                }
            },
            WatchOptions::default(),
        );

        count.set(2);
        count.set(3);
        assert!(seen.lock().is_empty());

        drain().unwrap();
        assert_eq!(*seen.lock(), vec![(3, Some(1))]);
    }

    #[test]
    fn immediate_fires_without_previous_value() {
        reset();
        let count = Signal::new(1);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let _handle = watch(
            {
                let count = count.clone();
                move || count.get()
            },
            {
                let seen = seen.clone();
                move |next: &i32, prev: Option<&i32>, _: &OnCleanup| {
                    seen.lock().push((*next, prev.copied()));
                }
            },
            WatchOptions {
                immediate: true,
                ..WatchOptions::default()
            },
        );

        assert_eq!(*seen.lock(), vec![(1, None)]);
    }

    #[test]
    fn unchanged_result_does_not_fire() {
        reset();
        let count = Signal::new(1);
        let fired = Arc::new(AtomicI32::new(0));

        let _handle = watch(
            {
                let count = count.clone();
                move || count.get() % 2
            },
            {
                let fired = fired.clone();
                move |_: &i32, _: Option<&i32>, _: &OnCleanup| {
                    fired.fetch_add(1, Ordering::SeqCst);
                }
            },
            WatchOptions::default(),
        );

        count.set(3);
        drain().unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn deep_watch_sees_nested_writes() {
        reset();
        let state = crate::reactive::try_reactive(Value::from(serde_json::json!({
            "user": { "name": "a" }
        })))
        .unwrap();
        let fired = Arc::new(AtomicI32::new(0));

        let _handle = watch_reactive(
            &state,
            {
                let fired = fired.clone();
                move |_: &Value, _: Option<&Value>, _: &OnCleanup| {
                    fired.fetch_add(1, Ordering::SeqCst);
                }
            },
            WatchOptions {
                flush: Flush::Sync,
                ..WatchOptions::default()
            },
        );

        state.get("user").as_reactive().unwrap().set("name", "b");
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cleanup_runs_before_next_run_and_on_stop() {
        reset();
        let count = Signal::new(0);
        let cleanups = Arc::new(AtomicI32::new(0));

        let handle = watch_effect({
            let count = count.clone();
            let cleanups = cleanups.clone();
            move |on_cleanup: &OnCleanup| {
                count.get();
                let cleanups = cleanups.clone();
                on_cleanup.register(move || {
                    cleanups.fetch_add(1, Ordering::SeqCst);
                });
            }
        });

        count.set(1);
        drain().unwrap();
        assert_eq!(cleanups.load(Ordering::SeqCst), 1);

        handle.stop();
        assert_eq!(cleanups.load(Ordering::SeqCst), 2);

        count.set(2);
        drain().unwrap();
        assert_eq!(cleanups.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn post_effect_runs_on_drain() {
        reset();
        let runs = Arc::new(AtomicI32::new(0));
        let _handle = watch_post_effect({
            let runs = runs.clone();
            move |_: &OnCleanup| {
                runs.fetch_add(1, Ordering::SeqCst);
            }
        });

        assert_eq!(runs.load(Ordering::SeqCst), 0);
        drain().unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }
}
