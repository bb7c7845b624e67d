//! Reactive Context
//!
//! The reactive context tracks which computation is currently running and
//! whether reads should be recorded at all. This enables automatic dependency
//! tracking: when a reactive field is read, the current computation is
//! registered as a dependent.
//!
//! # Implementation
//!
//! We use a thread-local stack of running effects. Entering an effect pushes
//! it; the returned guard pops it when dropped, so the stack stays balanced
//! even if the computation panics. Nested computations (a memo read inside an
//! effect) simply push on top of the outer one.
//!
//! A second thread-local stack holds the "should track" flag. Mutating list
//! operations pause tracking while they inspect the list, and every effect
//! run re-enables it for its own body.

use std::cell::{Cell, RefCell};

use super::effect::Effect;
use super::SubscriberId;

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<Effect>> = const { RefCell::new(Vec::new()) };
    static SHOULD_TRACK: Cell<bool> = const { Cell::new(true) };
    static TRACK_STACK: RefCell<Vec<bool>> = const { RefCell::new(Vec::new()) };
}

/// Guard that pops the context when dropped.
///
/// Restores the tracking flag that was in effect before the computation
/// started.
pub struct ReactiveContext {
    subscriber_id: SubscriberId,
    previous_should_track: bool,
}

impl ReactiveContext {
    /// Enter a new reactive context for the given effect.
    ///
    /// While this context is active, reactive reads register the effect as a
    /// dependent. Tracking is enabled for the duration of the context.
    pub fn enter(effect: &Effect) -> Self {
        CONTEXT_STACK.with(|stack| stack.borrow_mut().push(effect.clone()));
        let previous_should_track = SHOULD_TRACK.with(|flag| flag.replace(true));

        Self {
            subscriber_id: effect.id(),
            previous_should_track,
        }
    }

    /// Check if there is an active reactive context.
    pub fn is_active() -> bool {
        CONTEXT_STACK.with(|stack| !stack.borrow().is_empty())
    }

    /// Get the current subscriber ID, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().map(Effect::id))
    }

    /// The currently running effect, if any.
    pub(crate) fn current() -> Option<Effect> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().cloned())
    }

    /// The running effect, but only if reads should currently be recorded.
    pub(crate) fn tracking_target() -> Option<Effect> {
        if should_track() {
            Self::current()
        } else {
            None
        }
    }

    /// Whether the given subscriber is anywhere on the context stack.
    ///
    /// Used to refuse re-entrant runs of an effect that is already executing
    /// further down the stack.
    pub fn contains(id: SubscriberId) -> bool {
        CONTEXT_STACK.with(|stack| stack.borrow().iter().any(|effect| effect.id() == id))
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        let popped = CONTEXT_STACK.with(|stack| stack.borrow_mut().pop());
        SHOULD_TRACK.with(|flag| flag.set(self.previous_should_track));

        if let Some(effect) = popped {
            debug_assert_eq!(
                effect.id(),
                self.subscriber_id,
                "ReactiveContext mismatch: expected {:?}, got {:?}",
                self.subscriber_id,
                effect.id()
            );
        }
    }
}

/// Whether reads are currently being recorded.
pub fn should_track() -> bool {
    SHOULD_TRACK.with(Cell::get)
}

/// Is a computation running with tracking enabled?
pub fn is_tracking() -> bool {
    should_track() && ReactiveContext::is_active()
}

/// Stop recording reads until the matching [`reset_tracking`].
pub fn pause_tracking() {
    let previous = SHOULD_TRACK.with(|flag| flag.replace(false));
    TRACK_STACK.with(|stack| stack.borrow_mut().push(previous));
}

/// Record reads until the matching [`reset_tracking`].
pub fn enable_tracking() {
    let previous = SHOULD_TRACK.with(|flag| flag.replace(true));
    TRACK_STACK.with(|stack| stack.borrow_mut().push(previous));
}

/// Restore the tracking flag saved by the last pause or enable.
pub fn reset_tracking() {
    let previous = TRACK_STACK.with(|stack| stack.borrow_mut().pop());
    SHOULD_TRACK.with(|flag| flag.set(previous.unwrap_or(true)));
}

/// Run `f` without recording any reads.
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    struct Reset;
    impl Drop for Reset {
        fn drop(&mut self) {
            reset_tracking();
        }
    }

    pause_tracking();
    let _reset = Reset;
    f()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_tracks_subscriber() {
        let effect = Effect::new_lazy(|| {});

        assert!(!ReactiveContext::is_active());
        assert!(ReactiveContext::current_subscriber().is_none());

        {
            let _ctx = ReactiveContext::enter(&effect);

            assert!(ReactiveContext::is_active());
            assert_eq!(ReactiveContext::current_subscriber(), Some(effect.id()));
        }

        // Context should be cleaned up after drop
        assert!(!ReactiveContext::is_active());
        assert!(ReactiveContext::current_subscriber().is_none());
    }

    #[test]
    fn nested_contexts() {
        let outer = Effect::new_lazy(|| {});
        let inner = Effect::new_lazy(|| {});

        {
            let _ctx1 = ReactiveContext::enter(&outer);
            assert_eq!(ReactiveContext::current_subscriber(), Some(outer.id()));

            {
                let _ctx2 = ReactiveContext::enter(&inner);
                assert_eq!(ReactiveContext::current_subscriber(), Some(inner.id()));
                assert!(ReactiveContext::contains(outer.id()));
            }

            // After inner context drops, outer should be current
            assert_eq!(ReactiveContext::current_subscriber(), Some(outer.id()));
            assert!(!ReactiveContext::contains(inner.id()));
        }

        assert!(ReactiveContext::current_subscriber().is_none());
    }

    #[test]
    fn pause_and_reset_nest() {
        assert!(should_track());
        pause_tracking();
        assert!(!should_track());
        enable_tracking();
        assert!(should_track());
        reset_tracking();
        assert!(!should_track());
        reset_tracking();
        assert!(should_track());
    }

    #[test]
    fn entering_an_effect_re_enables_tracking() {
        let effect = Effect::new_lazy(|| {});

        pause_tracking();
        {
            let _ctx = ReactiveContext::enter(&effect);
            assert!(is_tracking());
        }
        assert!(!should_track());
        reset_tracking();
    }

    #[test]
    fn untracked_restores_flag() {
        let effect = Effect::new_lazy(|| {});
        let _ctx = ReactiveContext::enter(&effect);

        let inside = untracked(is_tracking);
        assert!(!inside);
        assert!(is_tracking());
    }
}
