//! Memo Implementation
//!
//! A Memo is a cached derived value that re-evaluates only when it is read
//! after one of its dependencies changed.
//!
//! # How Memos Work
//!
//! 1. Creating a memo runs nothing. The getter runs on first access, inside
//!    its own effect, and the result is cached.
//!
//! 2. When a dependency changes, the effect does not recompute. Its scheduler
//!    only flips the memo to dirty and notifies the memo's own dependents.
//!
//! 3. On the next access, a dirty memo re-runs the getter, caches the result
//!    and becomes clean again.
//!
//! # Why This Matters
//!
//! This "lazy" approach avoids unnecessary recomputation:
//!
//! - A signal changes
//! - 10 memos depend on it
//! - Only the memos actually accessed will recompute
//! - Memos that are never read stay dirty (no wasted work)
//!
//! A memo is both a subscriber (its getter effect) and a dependency (its own
//! dependency set). Memo effects are triggered ahead of plain effects, so an
//! effect reading a memo always sees it dirty before it re-runs.

use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use super::effect::Effect;
use super::runtime::Runtime;
use super::subscriber::Dep;

/// Dirty state for a memo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoState {
    /// The cached value is up-to-date.
    Clean,

    /// A dependency changed (or the memo was never read). The next read
    /// recomputes.
    Dirty,
}

/// A cached derived value that recomputes only when dependencies change.
///
/// # Example
///
/// ```rust,ignore
/// let count = Signal::new(2);
/// let doubled = Memo::new({
///     let count = count.clone();
///     move || count.get() * 2
/// });
///
/// assert_eq!(doubled.get(), 4);
/// count.set(5);
/// assert_eq!(doubled.get(), 10);
/// ```
pub struct Memo<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// The cached value (None if never computed).
    value: Arc<RwLock<Option<T>>>,

    /// Set by the getter effect's scheduler, cleared on recompute.
    dirty: Arc<AtomicBool>,

    /// Effects depending on this memo.
    dep: Dep,

    /// The computation function, kept for untracked fallback reads.
    compute: Arc<dyn Fn() -> T + Send + Sync>,

    /// The getter effect. Lazy; runs only from `get`.
    effect: Effect,
}

impl<T> Memo<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a new memo with the given computation function.
    ///
    /// The computation is not run immediately. It runs on first access.
    pub fn new<F>(compute: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        let compute: Arc<dyn Fn() -> T + Send + Sync> = Arc::new(compute);
        let value = Arc::new(RwLock::new(None));
        let dirty = Arc::new(AtomicBool::new(true));
        let dep = Dep::new();

        let run = {
            let value = value.clone();
            let compute = compute.clone();
            move || {
                let next = compute();
                *value.write() = Some(next);
            }
        };

        let scheduler = {
            let dirty = dirty.clone();
            let dep = dep.clone();
            move || {
                if !dirty.swap(true, Ordering::SeqCst) {
                    Runtime::trigger_deps(std::slice::from_ref(&dep));
                }
            }
        };

        let effect = Effect::computed(Box::new(run), Arc::new(scheduler));

        Self {
            value,
            dirty,
            dep,
            compute,
            effect,
        }
    }

    /// Get the current value, recomputing if necessary.
    ///
    /// Inside a running effect, this subscribes the effect to the memo.
    pub fn get(&self) -> T {
        Runtime::track_dep(&self.dep);

        if self.dirty.swap(false, Ordering::SeqCst) {
            self.effect.run();
        }

        if let Some(value) = self.value.read().clone() {
            return value;
        }

        // Disposed before the first read: compute without caching.
        super::context::untracked(|| (self.compute)())
    }

    /// Mark the memo dirty and notify its dependents, as if a dependency
    /// had changed.
    pub fn mark_dirty(&self) {
        if !self.dirty.swap(true, Ordering::SeqCst) {
            Runtime::trigger_deps(std::slice::from_ref(&self.dep));
        }
    }

    /// Get the current dirty state.
    pub fn state(&self) -> MemoState {
        if self.dirty.load(Ordering::SeqCst) {
            MemoState::Dirty
        } else {
            MemoState::Clean
        }
    }

    /// Get the number of dependents.
    pub fn dependent_count(&self) -> usize {
        self.dep.len()
    }

    /// Check if the memo has a cached value.
    pub fn has_value(&self) -> bool {
        self.value.read().is_some()
    }

    /// Stop tracking. The last cached value stays readable.
    pub fn dispose(&self) {
        self.effect.dispose();
    }

    /// The getter effect backing this memo.
    pub fn effect(&self) -> &Effect {
        &self.effect
    }
}

impl<T> Clone for Memo<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
            dirty: Arc::clone(&self.dirty),
            dep: self.dep.clone(),
            compute: Arc::clone(&self.compute),
            effect: self.effect.clone(),
        }
    }
}

impl<T> Debug for Memo<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Memo")
            .field("id", &self.effect.id())
            .field("state", &self.state())
            .field("has_value", &self.has_value())
            .field("dependent_count", &self.dependent_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
