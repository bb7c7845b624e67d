//! Provide / inject.
//!
//! An instance starts out sharing its parent's provides map. The first
//! `provide` in an instance copies the map, so values provided by a
//! descendant never leak back up to its ancestors or siblings.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{report_misuse, Error, Result};

use super::component::current_state;

pub(crate) type Provides = Arc<HashMap<Arc<str>, Arc<dyn Any + Send + Sync>>>;

/// Make `value` available to every descendant of the current instance.
pub fn provide<T>(key: &str, value: T)
where
    T: Any + Send + Sync,
{
    if let Err(err) = try_provide(key, value) {
        report_misuse(&err);
    }
}

pub fn try_provide<T>(key: &str, value: T) -> Result<()>
where
    T: Any + Send + Sync,
{
    let state = current_state().ok_or(Error::NoActiveInstance { api: "provide" })?;
    let mut provides = state.provides.lock();
    Arc::make_mut(&mut *provides).insert(key.into(), Arc::new(value));
    Ok(())
}

/// Resolve `key` through the ancestors of the current instance.
///
/// Returns `None` when nothing provides `key`, when the provided value is
/// not a `T`, or (with a diagnostic) outside of setup.
pub fn inject<T>(key: &str) -> Option<T>
where
    T: Any + Clone,
{
    match try_inject(key) {
        Ok(value) => value,
        Err(err) => {
            report_misuse(&err);
            None
        }
    }
}

pub fn try_inject<T>(key: &str) -> Result<Option<T>>
where
    T: Any + Clone,
{
    let state = current_state().ok_or(Error::NoActiveInstance { api: "inject" })?;
    let Some(parent) = &state.parent else {
        return Ok(None);
    };
    let value = parent.provides.lock().get(key).cloned();
    Ok(value.and_then(|value| value.downcast_ref::<T>().cloned()))
}

/// [`inject`] with a fallback.
pub fn inject_or<T>(key: &str, default: T) -> T
where
    T: Any + Clone,
{
    inject(key).unwrap_or(default)
}
