//! Job Scheduler
//!
//! Effects that carry a scheduler do not re-run inside the write that
//! triggered them. They queue a job here instead, and the queued jobs run
//! together when the batch is flushed, each at most once.
//!
//! # Phases
//!
//! A flush runs three queues in order: pre (watchers), render (component
//! updates, sorted by component id) and post (lifecycle hooks and post
//! watchers). See [`queue`](self) for the exact algorithm.
//!
//! # Settlement
//!
//! Queues are per thread and there is no background task driving them.
//! Awaiting [`next_tick`] or calling [`drain`] runs the pending flush.

mod job;
mod next_tick;
mod queue;
mod watch;

pub use job::{Job, JobFn};
pub use next_tick::{drain, next_tick, next_tick_then, NextTick};
pub use queue::{
    completed_flushes, config, configure, flush_jobs, flush_post_flush_cbs, flush_pre_flush_cbs,
    has_pending_flush, invalidate_job, is_flushing, queue_job, queue_post_flush_cb,
    queue_post_flush_cbs, queue_pre_flush_cb, reset,
};
pub use watch::{
    traverse, watch, watch_effect, watch_post_effect, watch_pre_effect, watch_reactive,
    watch_sync_effect, Flush, OnCleanup, WatchHandle, WatchOptions,
};
