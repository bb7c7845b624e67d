//! Job Queues
//!
//! Three queues, flushed in order once per tick:
//!
//! - **pre**: watcher callbacks that must see the updated state before any
//!   render happens.
//! - **render**: component update jobs, kept sorted by id so a parent always
//!   re-renders before its children.
//! - **post**: callbacks that need the patched tree, such as `mounted` and
//!   `updated` hooks.
//!
//! # Flush Algorithm
//!
//! 1. Enqueuing arms a flush. Nothing runs until the flush is drained by
//!    [`flush_jobs`], [`super::drain`] or awaiting [`super::next_tick`].
//!
//! 2. The pre queue is deduplicated, frozen and run. Jobs queued meanwhile
//!    are picked up by another pass until the pre queue stays empty.
//!
//! 3. The render queue is sorted and run in order. Jobs queued mid-flush are
//!    inserted by id after the current position.
//!
//! 4. The post queue is deduplicated, sorted and run once.
//!
//! 5. If any queue received work during the post pass, the whole flush
//!    repeats synchronously.
//!
//! A job queued while its queue is flushing is only suppressed if the same
//! job is still waiting further down the active queue.

use std::cell::RefCell;
use std::collections::HashMap;
use std::task::Waker;

use crate::config::RuntimeConfig;
use crate::error::{Error, Result};

use super::job::{dedup, Job};

type AfterFlush = Box<dyn FnOnce()>;

#[derive(Default)]
struct SchedulerState {
    is_flushing: bool,
    is_flush_pending: bool,

    pending_pre: Vec<Job>,
    active_pre: Option<Vec<Job>>,
    pre_flush_index: usize,
    pre_parent: Option<Job>,

    queue: Vec<Job>,
    flush_index: usize,

    pending_post: Vec<Job>,
    active_post: Option<Vec<Job>>,
    post_flush_index: usize,

    after_flush: Vec<AfterFlush>,
    wakers: Vec<Waker>,
    completed_flushes: u64,
}

impl SchedulerState {
    fn arm(&mut self) {
        if !self.is_flushing && !self.is_flush_pending {
            self.is_flush_pending = true;
            tracing::trace!("flush armed");
        }
    }

    fn has_pending_work(&self) -> bool {
        !self.queue.is_empty() || !self.pending_pre.is_empty() || !self.pending_post.is_empty()
    }
}

thread_local! {
    static STATE: RefCell<SchedulerState> = RefCell::new(SchedulerState::default());
    static CONFIG: RefCell<RuntimeConfig> = RefCell::new(RuntimeConfig::default());
}

fn with_state<R>(f: impl FnOnce(&mut SchedulerState) -> R) -> R {
    STATE.with(|state| f(&mut state.borrow_mut()))
}

/// Install the configuration for this thread.
pub fn configure(config: RuntimeConfig) {
    tracing::debug!(?config, "runtime configured");
    CONFIG.with(|slot| *slot.borrow_mut() = config);
}

/// The configuration in effect on this thread.
pub fn config() -> RuntimeConfig {
    CONFIG.with(|slot| slot.borrow().clone())
}

fn already_queued(active: &[Job], from: usize, job: &Job) -> bool {
    let from = if job.allows_recurse() { from + 1 } else { from };
    active.get(from..).is_some_and(|rest| rest.iter().any(|queued| queued.same(job)))
}

/// Queue a job for the pre phase.
pub fn queue_pre_flush_cb(job: Job) {
    with_state(|state| {
        let duplicate = state
            .active_pre
            .as_deref()
            .is_some_and(|active| already_queued(active, state.pre_flush_index, &job));
        if !duplicate {
            state.pending_pre.push(job);
        }
        state.arm();
    });
}

/// Queue a job for the post phase.
pub fn queue_post_flush_cb(job: Job) {
    with_state(|state| {
        let duplicate = state
            .active_post
            .as_deref()
            .is_some_and(|active| already_queued(active, state.post_flush_index, &job));
        if !duplicate {
            state.pending_post.push(job);
        }
        state.arm();
    });
}

/// Queue several post jobs at once, skipping deduplication.
///
/// Used for the batched lifecycle hooks of one component, which the caller
/// has already deduplicated.
pub fn queue_post_flush_cbs(jobs: Vec<Job>) {
    with_state(|state| {
        state.pending_post.extend(jobs);
        state.arm();
    });
}

/// Queue a job in the render queue, ordered by id.
pub fn queue_job(job: Job) {
    with_state(|state| {
        let from = if state.is_flushing && job.allows_recurse() {
            state.flush_index + 1
        } else {
            state.flush_index
        };
        let duplicate = state
            .queue
            .get(from..)
            .is_some_and(|rest| rest.iter().any(|queued| queued.same(&job)));
        let is_pre_parent = state.pre_parent.as_ref().is_some_and(|parent| parent.same(&job));

        if duplicate || is_pre_parent {
            return;
        }

        let start = if state.is_flushing {
            (state.flush_index + 1).min(state.queue.len())
        } else {
            0
        };
        let order = job.order();
        let offset = state.queue[start..].partition_point(|queued| queued.order() <= order);
        state.queue.insert(start + offset, job);
        state.arm();
    });
}

/// Remove a queued render job that has not run yet.
///
/// Used when a parent updates a child synchronously, making the child's own
/// queued update redundant.
pub fn invalidate_job(job: &Job) {
    with_state(|state| {
        let Some(index) = state.queue.iter().position(|queued| queued.same(job)) else {
            return;
        };
        if !state.is_flushing || index > state.flush_index {
            state.queue.remove(index);
        }
    });
}

/// Whether jobs are waiting for a flush.
pub fn has_pending_flush() -> bool {
    with_state(|state| state.is_flush_pending)
}

/// Whether a flush is running on this thread.
pub fn is_flushing() -> bool {
    with_state(|state| state.is_flushing)
}

/// Number of flushes completed on this thread.
pub fn completed_flushes() -> u64 {
    with_state(|state| state.completed_flushes)
}

/// Drop every queued job and callback. Meant for test isolation.
pub fn reset() {
    // Dropped outside the borrow: job closures may own effects.
    let previous = with_state(std::mem::take);
    drop(previous);
}

/// Per-flush run counts, used to catch jobs that keep re-queueing
/// themselves.
struct Seen {
    limit: usize,
    counts: HashMap<usize, usize>,
    errors: Vec<Error>,
}

impl Seen {
    fn new() -> Self {
        Self {
            limit: config().recursion_limit,
            counts: HashMap::new(),
            errors: Vec::new(),
        }
    }

    /// Count one run of `job`. Returns `false` once the job has used up its
    /// runs for this flush.
    fn admit(&mut self, job: &Job) -> bool {
        let count = self.counts.entry(job.key()).or_insert(0);
        if *count >= self.limit {
            let err = Error::RecursionLimit {
                job: job.id().unwrap_or_default(),
                limit: self.limit,
            };
            tracing::error!(error = %err, "job skipped");
            self.errors.push(err);
            return false;
        }
        *count += 1;
        true
    }

    fn into_result(self) -> Result<()> {
        match self.errors.into_iter().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Run pending pre jobs until none are left.
///
/// The renderer calls this before re-rendering a component, passing the
/// component's update job as `parent` so a pre job cannot queue it again.
pub fn flush_pre_flush_cbs(parent: Option<&Job>) {
    let mut seen = Seen::new();
    flush_pre(&mut seen, parent);
}

fn flush_pre(seen: &mut Seen, parent: Option<&Job>) {
    loop {
        let started = with_state(|state| {
            if state.pending_pre.is_empty() || state.active_pre.is_some() {
                return false;
            }
            state.active_pre = Some(dedup(std::mem::take(&mut state.pending_pre)));
            state.pre_flush_index = 0;
            state.pre_parent = parent.cloned();
            true
        });
        if !started {
            return;
        }

        let mut index = 0;
        while let Some(job) = with_state(|state| {
            state.pre_flush_index = index;
            state.active_pre.as_ref().and_then(|active| active.get(index).cloned())
        }) {
            if seen.admit(&job) {
                job.run();
            }
            index += 1;
        }

        with_state(|state| {
            state.active_pre = None;
            state.pre_flush_index = 0;
            state.pre_parent = None;
        });
    }
}

/// Run pending post jobs.
///
/// Called at the end of every flush, and by the renderer right after a
/// top-level render so `mounted` hooks fire without waiting for a tick.
pub fn flush_post_flush_cbs() {
    let mut seen = Seen::new();
    flush_post(&mut seen);
}

fn flush_post(seen: &mut Seen) {
    let started = with_state(|state| {
        if state.pending_post.is_empty() {
            return false;
        }
        let mut jobs = dedup(std::mem::take(&mut state.pending_post));
        if let Some(active) = state.active_post.as_mut() {
            // Nested call: append to the pass already running.
            active.extend(jobs);
            return false;
        }
        jobs.sort_by_key(Job::order);
        state.active_post = Some(jobs);
        state.post_flush_index = 0;
        true
    });
    if !started {
        return;
    }

    let mut index = 0;
    while let Some(job) = with_state(|state| {
        state.post_flush_index = index;
        state.active_post.as_ref().and_then(|active| active.get(index).cloned())
    }) {
        if seen.admit(&job) {
            job.run();
        }
        index += 1;
    }

    with_state(|state| {
        state.active_post = None;
        state.post_flush_index = 0;
    });
}

/// Resets flush bookkeeping when a flush ends, including by panic, so a
/// panicking job cannot leave the scheduler unable to flush again.
struct FlushGuard;

impl Drop for FlushGuard {
    fn drop(&mut self) {
        let _ = STATE.try_with(|state| {
            let Ok(mut state) = state.try_borrow_mut() else {
                return;
            };
            state.is_flushing = false;
            state.flush_index = 0;
            if std::thread::panicking() {
                state.queue.clear();
                state.active_pre = None;
                state.pre_flush_index = 0;
                state.pre_parent = None;
                state.active_post = None;
                state.post_flush_index = 0;
            }
        });
    }
}

fn run_flush(seen: &mut Seen) {
    let _span = tracing::debug_span!("flush").entered();
    let _guard = FlushGuard;

    with_state(|state| {
        state.is_flush_pending = false;
        state.is_flushing = true;
    });

    flush_pre(seen, None);

    with_state(|state| state.queue.sort_by_key(Job::order));
    let mut index = 0;
    while let Some(job) = with_state(|state| {
        state.flush_index = index;
        state.queue.get(index).cloned()
    }) {
        if seen.admit(&job) {
            job.run();
        }
        index += 1;
    }
    let rendered = with_state(|state| {
        state.flush_index = 0;
        std::mem::take(&mut state.queue).len()
    });

    flush_post(seen);
    tracing::debug!(rendered, "flush finished");
}

/// Drain everything queued on this thread.
///
/// Runs flushes until no queue has work left, then resolves pending
/// [`super::next_tick`] futures and runs `next_tick_then` callbacks.
/// Returns the first error recorded while flushing; the rest of the flush
/// still runs. Called from inside a running flush, this does nothing.
pub fn flush_jobs() -> Result<()> {
    if is_flushing() {
        return Ok(());
    }

    let mut seen = Seen::new();
    loop {
        loop {
            run_flush(&mut seen);
            let again = with_state(|state| state.has_pending_work());
            if !again {
                break;
            }
        }

        let (callbacks, wakers) = with_state(|state| {
            state.is_flush_pending = false;
            state.completed_flushes += 1;
            (
                std::mem::take(&mut state.after_flush),
                std::mem::take(&mut state.wakers),
            )
        });

        for waker in wakers {
            waker.wake();
        }
        for callback in callbacks {
            callback();
        }

        if !with_state(|state| state.has_pending_work() || !state.after_flush.is_empty()) {
            break;
        }
    }

    seen.into_result()
}

pub(crate) fn push_after_flush(callback: AfterFlush) {
    with_state(|state| {
        state.after_flush.push(callback);
        state.arm();
    });
}

pub(crate) fn register_waker(waker: &Waker) {
    with_state(|state| {
        if !state.wakers.iter().any(|known| known.will_wake(waker)) {
            state.wakers.push(waker.clone());
        }
    });
}
