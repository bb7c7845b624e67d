//! Ref-like views.
//!
//! [`FieldRef`] exposes one field of a wrapped container as a standalone
//! value cell, and [`CustomRef`] lets user code decide when to track and when
//! to trigger.

use std::sync::Arc;

use indexmap::IndexMap;

use super::proxy::{Key, Reactive};
use super::runtime::Runtime;
use super::subscriber::Dep;
use super::value::Value;

/// One field of a wrapped container, read and written through the wrapper.
#[derive(Clone, Debug)]
pub struct FieldRef {
    source: Reactive,
    key: Key,
    default: Value,
}

impl FieldRef {
    /// Tracked read. A missing or `Null` field reads as the default.
    pub fn get(&self) -> Value {
        match self.source.get(self.key.clone()) {
            Value::Null => self.default.clone(),
            value => value,
        }
    }

    pub fn set(&self, value: impl Into<Value>) {
        self.source.set(self.key.clone(), value);
    }

    pub fn key(&self) -> &Key {
        &self.key
    }

    pub fn source(&self) -> &Reactive {
        &self.source
    }
}

/// A view of `source[key]` that stays connected to the container.
pub fn to_ref(source: &Reactive, key: impl Into<Key>, default: impl Into<Value>) -> FieldRef {
    FieldRef {
        source: source.clone(),
        key: key.into(),
        default: default.into(),
    }
}

/// A [`FieldRef`] for every current key of `source`.
pub fn to_refs(source: &Reactive) -> IndexMap<String, FieldRef> {
    super::context::untracked(|| source.keys())
        .into_iter()
        .map(|key| (key.to_string(), to_ref(source, key, Value::Null)))
        .collect()
}

/// Handle passed to a [`custom_ref`] factory to record a read.
#[derive(Clone)]
pub struct RefTrack {
    dep: Dep,
}

impl RefTrack {
    pub fn track(&self) {
        Runtime::track_dep(&self.dep);
    }
}

/// Handle passed to a [`custom_ref`] factory to notify readers.
#[derive(Clone)]
pub struct RefTrigger {
    dep: Dep,
}

impl RefTrigger {
    pub fn trigger(&self) {
        Runtime::trigger_deps(std::slice::from_ref(&self.dep));
    }
}

type Getter<T> = Arc<dyn Fn() -> T + Send + Sync>;
type Setter<T> = Arc<dyn Fn(T) + Send + Sync>;

/// A value cell whose tracking and triggering are driven by user code.
pub struct CustomRef<T> {
    getter: Getter<T>,
    setter: Setter<T>,
    dep: Dep,
}

impl<T> CustomRef<T> {
    pub fn get(&self) -> T {
        (self.getter)()
    }

    pub fn set(&self, value: T) {
        (self.setter)(value)
    }

    pub fn subscriber_count(&self) -> usize {
        self.dep.len()
    }
}

impl<T> Clone for CustomRef<T> {
    fn clone(&self) -> Self {
        Self {
            getter: self.getter.clone(),
            setter: self.setter.clone(),
            dep: self.dep.clone(),
        }
    }
}

/// Build a ref from a factory that receives `track` and `trigger` handles and
/// returns the getter and setter.
///
/// ```rust,ignore
/// let debounced = custom_ref(|track, trigger| {
///     let value = Arc::new(Mutex::new(0));
///     let read = value.clone();
///     (
///         move || { track.track(); *read.lock() },
///         move |next| { *value.lock() = next; trigger.trigger(); },
///     )
/// });
/// ```
pub fn custom_ref<T, F, G, S>(factory: F) -> CustomRef<T>
where
    F: FnOnce(RefTrack, RefTrigger) -> (G, S),
    G: Fn() -> T + Send + Sync + 'static,
    S: Fn(T) + Send + Sync + 'static,
{
    let dep = Dep::new();
    let (getter, setter) = factory(RefTrack { dep: dep.clone() }, RefTrigger { dep: dep.clone() });
    CustomRef {
        getter: Arc::new(getter),
        setter: Arc::new(setter),
        dep,
    }
}
