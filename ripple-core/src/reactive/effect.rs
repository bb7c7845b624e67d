//! Effect Implementation
//!
//! An Effect is the re-runnable unit of the reactive system: a closure plus the
//! list of dependency sets it currently belongs to.
//!
//! # How Effects Work
//!
//! 1. When created (unless lazy), the effect runs its function immediately to
//!    establish initial dependencies.
//!
//! 2. Every run first removes the effect from all dependency sets it joined
//!    last time, then re-executes. The sets are re-populated from whatever the
//!    function actually reads this run, so branches not taken stop being
//!    tracked.
//!
//! 3. When a dependency changes, the effect either re-runs immediately or, if
//!    it carries a scheduler, hands itself to the scheduler instead.
//!
//! # Lifetime
//!
//! Dependency sets only hold weak references. A plain effect is owned by the
//! thread's live set from creation until it is disposed, so dropping every
//! handle does not stop it. A memo getter is owned by its memo instead.
//! Disposal stops an effect for good, and disposing from inside its own run
//! is deferred until the run finishes.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use smallvec::SmallVec;

use super::context::ReactiveContext;
use super::subscriber::{Dep, SubscriberId};

/// Custom re-run trigger. Called instead of re-running the effect inline.
pub type EffectScheduler = Arc<dyn Fn() + Send + Sync>;

/// Callback invoked once when an effect is disposed.
pub type StopHook = Arc<dyn Fn() + Send + Sync>;

/// What kind of computation an effect backs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectKind {
    /// A side-effecting computation, watcher or render function.
    Plain,
    /// The getter of a memo. Triggered before plain effects.
    Computed,
}

/// Options for [`Effect::with_options`].
#[derive(Clone, Default)]
pub struct EffectOptions {
    /// Do not run on creation.
    pub lazy: bool,
    /// Re-run trigger used instead of running inline.
    pub scheduler: Option<EffectScheduler>,
}

thread_local! {
    static LIVE_EFFECTS: RefCell<HashMap<SubscriberId, Effect>> = RefCell::new(HashMap::new());
}

struct EffectState {
    active: bool,
    running: bool,
    defer_stop: bool,
    deps: SmallVec<[Dep; 4]>,
    run_count: usize,
    on_stop: Option<StopHook>,
}

struct EffectInner {
    id: SubscriberId,
    run: Box<dyn Fn() + Send + Sync>,
    scheduler: Option<EffectScheduler>,
    kind: EffectKind,
    state: Mutex<EffectState>,
}

impl Drop for EffectInner {
    fn drop(&mut self) {
        for dep in self.state.get_mut().deps.drain(..) {
            dep.remove(self.id);
        }
    }
}

/// A re-runnable computation that tracks what it reads.
///
/// # Example
///
/// ```rust,ignore
/// let count = Signal::new(0);
///
/// let effect = Effect::new({
///     let count = count.clone();
///     move || println!("Count is: {}", count.get())
/// });
///
/// count.set(5);  // Prints: "Count is: 5"
/// ```
#[derive(Clone)]
pub struct Effect {
    inner: Arc<EffectInner>,
}

/// Non-owning handle to an effect.
#[derive(Clone)]
pub struct WeakEffect {
    inner: Weak<EffectInner>,
}

impl WeakEffect {
    pub fn upgrade(&self) -> Option<Effect> {
        self.inner.upgrade().map(|inner| Effect { inner })
    }
}

impl Effect {
    /// Create a new effect with the given function.
    ///
    /// The function runs immediately to establish dependencies.
    pub fn new<F>(run: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::with_options(run, EffectOptions::default())
    }

    /// Create a new effect without running it immediately.
    pub fn new_lazy<F>(run: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::with_options(
            run,
            EffectOptions {
                lazy: true,
                ..EffectOptions::default()
            },
        )
    }

    /// Create an effect that hands re-runs to `scheduler`.
    pub fn with_scheduler<F, S>(run: F, scheduler: S) -> Self
    where
        F: Fn() + Send + Sync + 'static,
        S: Fn() + Send + Sync + 'static,
    {
        Self::with_options(
            run,
            EffectOptions {
                lazy: false,
                scheduler: Some(Arc::new(scheduler)),
            },
        )
    }

    pub fn with_options<F>(run: F, options: EffectOptions) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let effect = Self::build(Box::new(run), options.scheduler, EffectKind::Plain);
        if !options.lazy {
            effect.run();
        }
        effect
    }

    /// Lazy effect backing a memo getter.
    pub(crate) fn computed(run: Box<dyn Fn() + Send + Sync>, scheduler: EffectScheduler) -> Self {
        Self::build(run, Some(scheduler), EffectKind::Computed)
    }

    fn build(
        run: Box<dyn Fn() + Send + Sync>,
        scheduler: Option<EffectScheduler>,
        kind: EffectKind,
    ) -> Self {
        let effect = Self {
            inner: Arc::new(EffectInner {
                id: SubscriberId::new(),
                run,
                scheduler,
                kind,
                state: Mutex::new(EffectState {
                    active: true,
                    running: false,
                    defer_stop: false,
                    deps: SmallVec::new(),
                    run_count: 0,
                    on_stop: None,
                }),
            }),
        };
        if kind == EffectKind::Plain {
            LIVE_EFFECTS.with(|live| {
                live.borrow_mut().insert(effect.id(), effect.clone());
            });
        }
        effect
    }

    /// Number of plain effects on this thread that have not been disposed.
    pub fn live_count() -> usize {
        LIVE_EFFECTS.with(|live| live.borrow().len())
    }

    /// Get the subscriber ID for this effect.
    pub fn id(&self) -> SubscriberId {
        self.inner.id
    }

    pub fn kind(&self) -> EffectKind {
        self.inner.kind
    }

    pub fn is_computed(&self) -> bool {
        self.inner.kind == EffectKind::Computed
    }

    pub fn downgrade(&self) -> WeakEffect {
        WeakEffect {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Execute the effect function, re-collecting its dependencies.
    ///
    /// Does nothing once disposed, or if this effect is already running
    /// further up the call stack.
    pub fn run(&self) {
        if !self.inner.state.lock().active {
            return;
        }
        if ReactiveContext::contains(self.id()) {
            return;
        }

        let _guard = RunGuard::enter(self);
        (self.inner.run)();
    }

    /// React to a dependency change: hand off to the scheduler if there is
    /// one, otherwise run inline.
    pub fn schedule(&self) {
        if !self.is_active() {
            return;
        }
        match &self.inner.scheduler {
            Some(scheduler) => scheduler(),
            None => self.run(),
        }
    }

    /// Dispose of the effect.
    ///
    /// Removes it from every dependency set and marks it permanently
    /// inactive. Called from inside the effect's own run, disposal happens
    /// once that run completes.
    pub fn dispose(&self) {
        let on_stop = {
            let mut state = self.inner.state.lock();
            if state.running {
                state.defer_stop = true;
                return;
            }
            if !state.active {
                return;
            }
            state.active = false;
            for dep in state.deps.drain(..) {
                dep.remove(self.inner.id);
            }
            state.on_stop.take()
        };

        tracing::trace!(effect = self.id().raw(), "effect disposed");
        if let Some(on_stop) = on_stop {
            on_stop();
        }

        // Released outside the borrow: dropping the closure may drop
        // containers, which reaches back into thread-locals.
        let owned = LIVE_EFFECTS
            .try_with(|live| live.try_borrow_mut().ok()?.remove(&self.id()))
            .ok()
            .flatten();
        drop(owned);
    }

    /// Register a callback to run when the effect is disposed.
    pub fn set_on_stop(&self, hook: StopHook) {
        self.inner.state.lock().on_stop = Some(hook);
    }

    pub fn is_active(&self) -> bool {
        self.inner.state.lock().active
    }

    /// Check if the effect has been disposed.
    pub fn is_disposed(&self) -> bool {
        !self.is_active()
    }

    pub fn is_running(&self) -> bool {
        self.inner.state.lock().running
    }

    /// Get the number of times the effect has run.
    pub fn run_count(&self) -> usize {
        self.inner.state.lock().run_count
    }

    /// Get the number of dependency sets the effect currently belongs to.
    pub fn dependency_count(&self) -> usize {
        self.inner.state.lock().deps.len()
    }

    /// Record membership in `dep`. Called by the runtime when tracking.
    pub(crate) fn add_dep(&self, dep: &Dep) {
        if dep.insert(self) {
            self.inner.state.lock().deps.push(dep.clone());
        }
    }

    pub fn ptr_eq(&self, other: &Effect) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn cleanup(&self) {
        let deps = std::mem::take(&mut self.inner.state.lock().deps);
        for dep in deps {
            dep.remove(self.inner.id);
        }
    }
}

/// Brackets one run: cleanup and context push on entry, context pop and any
/// deferred disposal on exit. Exit also happens on panic.
struct RunGuard<'a> {
    effect: &'a Effect,
    _context: ReactiveContext,
}

impl<'a> RunGuard<'a> {
    fn enter(effect: &'a Effect) -> Self {
        effect.cleanup();
        {
            let mut state = effect.inner.state.lock();
            state.running = true;
            state.run_count += 1;
        }
        Self {
            effect,
            _context: ReactiveContext::enter(effect),
        }
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        let deferred = {
            let mut state = self.effect.inner.state.lock();
            state.running = false;
            std::mem::take(&mut state.defer_stop)
        };
        if deferred {
            self.effect.dispose();
        }
    }
}

impl std::fmt::Debug for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.id())
            .field("kind", &self.kind())
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
