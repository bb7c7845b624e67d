//! Lifecycle hooks.
//!
//! Hooks are registered during setup and run in registration order. The
//! `before_*` hooks run synchronously around the render; `mounted`,
//! `updated` and `unmounted` are queued as post jobs so they see the
//! patched tree.

use std::sync::Arc;

use smallvec::SmallVec;

use crate::error::{report_misuse, Error, Result};
use crate::reactive::untracked;
use crate::scheduler::{queue_post_flush_cbs, Job};

use super::component::{current_state, InstanceScope, InstanceState};

/// A registered hook.
pub type HookFn = Arc<dyn Fn() + Send + Sync>;

/// Points in an instance's life a hook can attach to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleHook {
    BeforeMount,
    Mounted,
    BeforeUpdate,
    Updated,
    BeforeUnmount,
    Unmounted,
}

impl LifecycleHook {
    fn api(self) -> &'static str {
        match self {
            LifecycleHook::BeforeMount => "on_before_mount",
            LifecycleHook::Mounted => "on_mounted",
            LifecycleHook::BeforeUpdate => "on_before_update",
            LifecycleHook::Updated => "on_updated",
            LifecycleHook::BeforeUnmount => "on_before_unmount",
            LifecycleHook::Unmounted => "on_unmounted",
        }
    }
}

type HookList = SmallVec<[HookFn; 1]>;

#[derive(Default)]
pub(crate) struct Hooks {
    before_mount: HookList,
    mounted: HookList,
    before_update: HookList,
    updated: HookList,
    before_unmount: HookList,
    unmounted: HookList,
}

impl Hooks {
    fn list(&self, kind: LifecycleHook) -> &HookList {
        match kind {
            LifecycleHook::BeforeMount => &self.before_mount,
            LifecycleHook::Mounted => &self.mounted,
            LifecycleHook::BeforeUpdate => &self.before_update,
            LifecycleHook::Updated => &self.updated,
            LifecycleHook::BeforeUnmount => &self.before_unmount,
            LifecycleHook::Unmounted => &self.unmounted,
        }
    }

    fn list_mut(&mut self, kind: LifecycleHook) -> &mut HookList {
        match kind {
            LifecycleHook::BeforeMount => &mut self.before_mount,
            LifecycleHook::Mounted => &mut self.mounted,
            LifecycleHook::BeforeUpdate => &mut self.before_update,
            LifecycleHook::Updated => &mut self.updated,
            LifecycleHook::BeforeUnmount => &mut self.before_unmount,
            LifecycleHook::Unmounted => &mut self.unmounted,
        }
    }

    #[cfg(test)]
    fn count(&self, kind: LifecycleHook) -> usize {
        self.list(kind).len()
    }
}

/// Register `hook` on the current instance.
///
/// Fails with [`Error::NoActiveInstance`] outside of setup.
pub fn register_hook<F>(kind: LifecycleHook, hook: F) -> Result<()>
where
    F: Fn() + Send + Sync + 'static,
{
    let state = current_state().ok_or(Error::NoActiveInstance { api: kind.api() })?;
    state.hooks.lock().list_mut(kind).push(Arc::new(hook));
    Ok(())
}

fn register_or_report<F>(kind: LifecycleHook, hook: F)
where
    F: Fn() + Send + Sync + 'static,
{
    if let Err(err) = register_hook(kind, hook) {
        report_misuse(&err);
    }
}

pub fn on_before_mount<F>(hook: F)
where
    F: Fn() + Send + Sync + 'static,
{
    register_or_report(LifecycleHook::BeforeMount, hook)
}

pub fn on_mounted<F>(hook: F)
where
    F: Fn() + Send + Sync + 'static,
{
    register_or_report(LifecycleHook::Mounted, hook)
}

pub fn on_before_update<F>(hook: F)
where
    F: Fn() + Send + Sync + 'static,
{
    register_or_report(LifecycleHook::BeforeUpdate, hook)
}

pub fn on_updated<F>(hook: F)
where
    F: Fn() + Send + Sync + 'static,
{
    register_or_report(LifecycleHook::Updated, hook)
}

pub fn on_before_unmount<F>(hook: F)
where
    F: Fn() + Send + Sync + 'static,
{
    register_or_report(LifecycleHook::BeforeUnmount, hook)
}

pub fn on_unmounted<F>(hook: F)
where
    F: Fn() + Send + Sync + 'static,
{
    register_or_report(LifecycleHook::Unmounted, hook)
}

fn hooks_of(state: &InstanceState, kind: LifecycleHook) -> HookList {
    state.hooks.lock().list(kind).clone()
}

/// Run the hooks of `kind` now, untracked, with `state` as the current
/// instance.
pub(crate) fn call_hooks(state: &Arc<InstanceState>, kind: LifecycleHook) {
    let hooks = hooks_of(state, kind);
    if hooks.is_empty() {
        return;
    }
    let _scope = InstanceScope::enter(state);
    untracked(|| {
        for hook in &hooks {
            hook();
        }
    });
}

/// Queue the hooks of `kind` as post jobs.
pub(crate) fn queue_hooks(state: &Arc<InstanceState>, kind: LifecycleHook) {
    let hooks = hooks_of(state, kind);
    if hooks.is_empty() {
        return;
    }
    let jobs = hooks
        .into_iter()
        .map(|hook| {
            let state = state.clone();
            Job::new(move || {
                let _scope = InstanceScope::enter(&state);
                untracked(|| hook());
            })
        })
        .collect();
    queue_post_flush_cbs(jobs);
}
