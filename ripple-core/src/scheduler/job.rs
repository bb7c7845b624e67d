//! Scheduler jobs.
//!
//! A job is a shared callback. Two jobs are the same job when they share the
//! same callback allocation, which is what queue deduplication compares.

use std::sync::Arc;

/// The callback behind a job.
pub type JobFn = Arc<dyn Fn() + Send + Sync>;

/// A unit of deferred work.
#[derive(Clone)]
pub struct Job {
    id: Option<u64>,
    run: JobFn,
    allow_recurse: bool,
}

impl Job {
    /// A job without an ordering id. It sorts after every job that has one.
    pub fn new<F>(run: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::from_fn(None, Arc::new(run))
    }

    /// A job ordered by `id` in the render queue. Component update jobs use
    /// the component uid, so parents always update before their children.
    pub fn with_id<F>(id: u64, run: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::from_fn(Some(id), Arc::new(run))
    }

    pub fn from_fn(id: Option<u64>, run: JobFn) -> Self {
        Self {
            id,
            run,
            allow_recurse: false,
        }
    }

    /// Let the job queue itself again while it is running.
    pub fn allow_recurse(mut self) -> Self {
        self.allow_recurse = true;
        self
    }

    pub fn id(&self) -> Option<u64> {
        self.id
    }

    pub fn allows_recurse(&self) -> bool {
        self.allow_recurse
    }

    pub fn run(&self) {
        (self.run)()
    }

    /// Same callback allocation.
    pub fn same(&self, other: &Job) -> bool {
        self.key() == other.key()
    }

    pub(crate) fn key(&self) -> usize {
        Arc::as_ptr(&self.run) as *const () as usize
    }

    /// Ordering key: jobs without an id go last.
    pub(crate) fn order(&self) -> u64 {
        self.id.unwrap_or(u64::MAX)
    }
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("allow_recurse", &self.allow_recurse)
            .finish()
    }
}

/// Drop duplicate jobs, keeping the first occurrence of each.
pub(crate) fn dedup(jobs: Vec<Job>) -> Vec<Job> {
    let mut seen = std::collections::HashSet::with_capacity(jobs.len());
    jobs.into_iter().filter(|job| seen.insert(job.key())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_follows_the_callback() {
        let a = Job::new(|| {});
        let b = Job::new(|| {});

        assert!(a.same(&a.clone()));
        assert!(!a.same(&b));
    }

    #[test]
    fn dedup_keeps_first_occurrence() {
        let a = Job::with_id(2, || {});
        let b = Job::with_id(1, || {});

        let jobs = dedup(vec![a.clone(), b.clone(), a.clone()]);
        assert_eq!(jobs.len(), 2);
        assert!(jobs[0].same(&a));
        assert!(jobs[1].same(&b));
    }

    #[test]
    fn jobs_without_id_order_last() {
        assert!(Job::with_id(7, || {}).order() < Job::new(|| {}).order());
    }
}
