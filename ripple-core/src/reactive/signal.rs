//! Signal Implementation
//!
//! A Signal is the single-value reactive cell. It holds a value and its own
//! dependency set, independent of any container.
//!
//! # How Signals Work
//!
//! 1. When a signal is read within a running effect, the effect joins the
//!    signal's dependency set.
//!
//! 2. When the signal's value changes, every subscriber is re-run or
//!    scheduled through the runtime.
//!
//! 3. Writing a value equal to the current one is not a change and notifies
//!    nobody.
//!
//! Signals can also live inside a container as [`Value::Ref`](super::Value);
//! reading such a field through a wrapper unwraps the signal.
//!
//! # Memory Layout
//!
//! Each signal consists of:
//! - A unique ID (8 bytes)
//! - The value, stored behind an `Arc<RwLock<_>>` shared by all clones
//! - A dependency set (grows with number of dependents)

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use super::runtime::Runtime;
use super::subscriber::Dep;

/// Counter for generating unique signal IDs.
static SIGNAL_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a new unique signal ID.
fn next_signal_id() -> u64 {
    SIGNAL_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// A reactive signal holding a value of type T.
///
/// # Type Parameters
///
/// - `T`: The type of value stored in the signal. Must be Clone + Send + Sync.
///
/// # Example
///
/// ```rust,ignore
/// let count = Signal::new(0);
///
/// // Read the value
/// let value = count.get();
///
/// // Update the value (notifies subscribers)
/// count.set(5);
/// ```
pub struct Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Unique identifier for this signal.
    id: u64,

    /// The current value, shared by every clone.
    value: Arc<RwLock<T>>,

    /// Effects currently depending on this signal.
    dep: Dep,
}

impl<T> Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a new signal with the given initial value.
    pub fn new(value: T) -> Self {
        Self {
            id: next_signal_id(),
            value: Arc::new(RwLock::new(value)),
            dep: Dep::new(),
        }
    }

    /// Get the signal's unique ID.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Get the current value.
    ///
    /// If called within a running effect, this also subscribes the effect.
    pub fn get(&self) -> T {
        Runtime::track_dep(&self.dep);
        self.value.read().clone()
    }

    /// Get the current value without tracking dependencies.
    pub fn get_untracked(&self) -> T {
        self.value.read().clone()
    }

    /// Read the value by reference, tracked.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        Runtime::track_dep(&self.dep);
        f(&self.value.read())
    }

    /// Replace the value and notify subscribers unconditionally.
    pub fn set_always(&self, value: T) {
        *self.value.write() = value;
        self.notify();
    }

    /// Notify subscribers without changing the value.
    ///
    /// Useful after mutating shared data the signal points to.
    pub fn notify(&self) {
        Runtime::trigger_deps(std::slice::from_ref(&self.dep));
    }

    /// Get the number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.dep.len()
    }

    /// Two handles to the same signal.
    pub fn ptr_eq(&self, other: &Signal<T>) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }
}

impl<T> Signal<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    /// Set a new value and notify subscribers if it differs from the current
    /// one.
    pub fn set(&self, value: T) {
        {
            let mut guard = self.value.write();
            if *guard == value {
                return;
            }
            *guard = value;
        }

        tracing::trace!(signal = self.id, "signal changed");
        self.notify();
    }

    /// Update the value using a function.
    ///
    /// This is useful for updates that depend on the current value.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        let new_value = f(&self.value.read());
        self.set(new_value);
    }
}

impl<T> Clone for Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            value: Arc::clone(&self.value),
            dep: self.dep.clone(),
        }
    }
}

impl<T> Debug for Signal<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.id)
            .field("value", &self.get_untracked())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Effect;
    use std::sync::atomic::{AtomicI32, Ordering};

    #[test]
    fn signal_get_and_set() {
        let signal = Signal::new(0);
        assert_eq!(signal.get(), 0);

        signal.set(42);
        assert_eq!(signal.get(), 42);
    }

    #[test]
    fn signal_update() {
        let signal = Signal::new(10);
        signal.update(|v| v + 5);
        assert_eq!(signal.get(), 15);
    }

    #[test]
    fn signal_notifies_subscribers() {
        let signal = Signal::new(0);
        let call_count = Arc::new(AtomicI32::new(0));

        let _effect = Effect::new({
            let signal = signal.clone();
            let call_count = call_count.clone();
            move || {
                signal.get();
                call_count.fetch_add(1, Ordering::SeqCst);
            }
        });

        assert_eq!(call_count.load(Ordering::SeqCst), 1);
        assert_eq!(signal.subscriber_count(), 1);

        signal.set(1);
        assert_eq!(call_count.load(Ordering::SeqCst), 2);

        signal.set(2);
        assert_eq!(call_count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn equal_write_is_not_a_change() {
        let signal = Signal::new(7);
        let call_count = Arc::new(AtomicI32::new(0));

        let _effect = Effect::new({
            let signal = signal.clone();
            let call_count = call_count.clone();
            move || {
                signal.get();
                call_count.fetch_add(1, Ordering::SeqCst);
            }
        });

        signal.set(7);
        assert_eq!(call_count.load(Ordering::SeqCst), 1);

        signal.set_always(7);
        assert_eq!(call_count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn untracked_read_does_not_subscribe() {
        let signal = Signal::new(0);
        let _effect = Effect::new({
            let signal = signal.clone();
            move || {
                signal.get_untracked();
            }
        });

        assert_eq!(signal.subscriber_count(), 0);
    }

    #[test]
    fn disposing_effect_unsubscribes() {
        let signal = Signal::new(0);
        let effect = Effect::new({
            let signal = signal.clone();
            move || {
                signal.get();
            }
        });
        assert_eq!(signal.subscriber_count(), 1);

        effect.dispose();
        assert_eq!(signal.subscriber_count(), 0);
    }

    #[test]
    fn signal_clone_shares_state() {
        let signal1 = Signal::new(0);
        let signal2 = signal1.clone();

        signal1.set(42);
        assert_eq!(signal2.get(), 42);

        signal2.set(100);
        assert_eq!(signal1.get(), 100);
        assert!(signal1.ptr_eq(&signal2));
    }

    #[test]
    fn signal_ids_are_unique() {
        let s1 = Signal::new(0);
        let s2 = Signal::new(0);
        let s3 = Signal::new(0);

        assert_ne!(s1.id(), s2.id());
        assert_ne!(s2.id(), s3.id());
        assert_ne!(s1.id(), s3.id());
    }
}
