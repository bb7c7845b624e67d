//! Flush settlement.
//!
//! There is no microtask queue to hang a flush on, so the pending flush runs
//! when someone waits for it: awaiting [`next_tick`] or calling [`drain`].

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::error::Result;

use super::queue::{flush_jobs, is_flushing, push_after_flush, register_waker};

/// Future returned by [`next_tick`].
///
/// Resolves once the pending flush (if any) has run to completion. Polled
/// from inside a running flush, it waits for that flush to finish.
#[must_use = "futures do nothing unless awaited"]
#[derive(Debug, Default)]
pub struct NextTick {
    _private: (),
}

impl Future for NextTick {
    type Output = Result<()>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if is_flushing() {
            register_waker(cx.waker());
            return Poll::Pending;
        }
        Poll::Ready(flush_jobs())
    }
}

/// Wait for the current batch of updates to settle.
///
/// ```rust,ignore
/// state.set("count", 1);
/// state.set("count", 2);
/// next_tick().await?;   // the dependent render job ran once
/// ```
pub fn next_tick() -> NextTick {
    NextTick::default()
}

/// Run `callback` after the next flush completes.
///
/// Arms a flush if none is pending, so the callback runs on the next
/// [`drain`] even when nothing else was queued.
pub fn next_tick_then<F>(callback: F)
where
    F: FnOnce() + 'static,
{
    push_after_flush(Box::new(callback));
}

/// Run the pending flush now.
pub fn drain() -> Result<()> {
    flush_jobs()
}
