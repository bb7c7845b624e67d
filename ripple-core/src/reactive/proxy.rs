//! Reactive Wrapper
//!
//! A [`Reactive`] is an explicit view over a raw [`Target`] that records reads
//! into the runtime's dependency store and triggers subscribers on writes.
//!
//! # How The Wrapper Works
//!
//! 1. `get`, `has`, `keys` and `len` call [`Runtime::track`] for the key they
//!    inspect (or the synthetic `Iterate` / `Length` keys) before reading.
//!
//! 2. `set`, `delete` and `set_len` mutate the raw data, then call
//!    [`Runtime::trigger`] with the kind of mutation so the runtime can work
//!    out which dependency sets are affected.
//!
//! 3. Nested containers are stored raw. Reading one returns its wrapper,
//!    created on first read and shared with every later read.
//!
//! Wrapping is idempotent: wrapping a container that already has a live
//! wrapper returns that wrapper.

use std::sync::Arc;

use crate::error::{report_misuse, Error, Result};

use super::runtime::{DepKey, Mutation, Runtime, TriggerKind};
use super::target::{Shape, Target, TargetData, TargetId};
use super::value::{has_changed, to_raw, Value};

/// Largest length a list may be grown to by a write.
pub const MAX_LIST_LEN: usize = 1 << 24;

/// A key into a container: a record field or a list index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Field(Arc<str>),
    Index(usize),
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::Field(Arc::from(name))
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Key::Field(Arc::from(name))
    }
}

impl From<&String> for Key {
    fn from(name: &String) -> Self {
        Key::Field(Arc::from(name.as_str()))
    }
}

impl From<usize> for Key {
    fn from(index: usize) -> Self {
        Key::Index(index)
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Key::Field(name) => f.write_str(name),
            Key::Index(index) => write!(f, "{index}"),
        }
    }
}

/// Where a key lands once the container's shape is known.
enum Slot {
    Field(Arc<str>),
    Index(usize),
    Length,
}

pub(crate) struct ProxyInner {
    target: Target,
}

/// A tracked view over a record or list.
///
/// Cloning a `Reactive` clones the handle; every clone observes the same
/// container.
#[derive(Clone)]
pub struct Reactive {
    inner: Arc<ProxyInner>,
}

impl Reactive {
    /// The wrapper for `target`, reusing a live one if it exists.
    pub fn new(target: Target) -> Self {
        if let Some(inner) = Runtime::proxy_for(target.id()) {
            return Self { inner };
        }

        let id = target.id();
        let inner = Arc::new(ProxyInner { target });
        Runtime::register_proxy(id, &inner);
        Self { inner }
    }

    /// A wrapper over a fresh empty record.
    pub fn record() -> Self {
        Self::new(Target::record())
    }

    /// A wrapper over a fresh empty list.
    pub fn list() -> Self {
        Self::new(Target::list())
    }

    /// The raw container behind this wrapper.
    pub fn target(&self) -> &Target {
        &self.inner.target
    }

    pub fn id(&self) -> TargetId {
        self.inner.target.id()
    }

    pub fn shape(&self) -> Shape {
        self.inner.target.shape()
    }

    pub fn is_list(&self) -> bool {
        self.shape() == Shape::List
    }

    pub fn ptr_eq(&self, other: &Reactive) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn slot(&self, key: Key) -> Option<Slot> {
        match (self.shape(), key) {
            (Shape::Record, Key::Field(name)) => Some(Slot::Field(name)),
            (Shape::Record, Key::Index(index)) => Some(Slot::Field(Arc::from(index.to_string()))),
            (Shape::List, Key::Index(index)) => Some(Slot::Index(index)),
            (Shape::List, Key::Field(name)) if &*name == "length" => Some(Slot::Length),
            (Shape::List, Key::Field(name)) => {
                if let Ok(index) = name.parse::<usize>() {
                    return Some(Slot::Index(index));
                }
                report_misuse(&Error::InvalidListKey {
                    key: name.to_string(),
                });
                None
            }
        }
    }

    fn track(&self, key: DepKey) {
        Runtime::track(self.id(), key);
    }

    fn trigger(&self, kind: TriggerKind, key: DepKey, new_length: Option<usize>) {
        Runtime::trigger(Mutation {
            target: self.id(),
            shape: self.shape(),
            kind,
            key,
            new_length,
        });
    }

    /// Tracked read.
    ///
    /// Signals stored in record fields are unwrapped; nested containers come
    /// back wrapped. Missing keys read as `Null`.
    pub fn get(&self, key: impl Into<Key>) -> Value {
        let Some(slot) = self.slot(key.into()) else {
            return Value::Null;
        };

        match slot {
            Slot::Length => Value::from(self.len()),
            Slot::Field(name) => {
                self.track(DepKey::Field(name.clone()));
                let raw = self.target().field(&name).unwrap_or_default();
                match raw {
                    Value::Ref(signal) => wrap_nested(signal.get()),
                    other => wrap_nested(other),
                }
            }
            Slot::Index(index) => {
                self.track(DepKey::Index(index));
                // Signals at list positions are returned as-is.
                wrap_nested(self.target().item(index).unwrap_or_default())
            }
        }
    }

    /// Read without tracking. Nested containers still come back wrapped.
    pub fn get_untracked(&self, key: impl Into<Key>) -> Value {
        super::context::untracked(|| self.get(key))
    }

    /// Tracked write.
    ///
    /// Writing a plain value over a field holding a signal writes through to
    /// the signal. Writing past the end of a list fills the gap with `Null`.
    pub fn set(&self, key: impl Into<Key>, value: impl Into<Value>) {
        let Some(slot) = self.slot(key.into()) else {
            return;
        };
        let value = to_raw(&value.into());

        match slot {
            Slot::Length => {
                let length = value
                    .as_f64()
                    .filter(|n| *n >= 0.0 && n.fract() == 0.0 && *n <= MAX_LIST_LEN as f64)
                    .map(|n| n as usize);
                match length {
                    Some(length) => self.set_len(length),
                    None => report_misuse(&Error::InvalidListKey {
                        key: format!("length = {}", value.kind()),
                    }),
                }
            }
            Slot::Field(name) => self.set_field(name, value),
            Slot::Index(index) => self.set_index(index, value),
        }
    }

    fn set_field(&self, name: Arc<str>, value: Value) {
        let old = self.target().field(&name);

        if let (Some(Value::Ref(signal)), false) = (&old, matches!(value, Value::Ref(_))) {
            signal.set(value);
            return;
        }

        self.target().write(|data| {
            if let TargetData::Record(fields) = data {
                fields.insert(name.to_string(), value.clone());
            }
        });

        match old {
            None => self.trigger(TriggerKind::Add, DepKey::Field(name), None),
            Some(old) if has_changed(&value, &old) => {
                self.trigger(TriggerKind::Set, DepKey::Field(name), None)
            }
            Some(_) => {}
        }
    }

    fn set_index(&self, index: usize, value: Value) {
        if index >= MAX_LIST_LEN {
            report_misuse(&Error::InvalidListKey {
                key: index.to_string(),
            });
            return;
        }
        let old = self.target().write(|data| {
            let TargetData::List(items) = data else {
                return None;
            };
            if index < items.len() {
                Some(std::mem::replace(&mut items[index], value.clone()))
            } else {
                items.resize(index, Value::Null);
                items.push(value.clone());
                None
            }
        });

        match old {
            None => self.trigger(TriggerKind::Add, DepKey::Index(index), None),
            Some(old) if has_changed(&value, &old) => {
                self.trigger(TriggerKind::Set, DepKey::Index(index), None)
            }
            Some(_) => {}
        }
    }

    /// Change a list's length, truncating or padding with `Null`.
    pub fn set_len(&self, length: usize) {
        if length > MAX_LIST_LEN {
            report_misuse(&Error::InvalidListKey {
                key: format!("length = {length}"),
            });
            return;
        }
        let changed = self.target().write(|data| {
            let TargetData::List(items) = data else {
                return false;
            };
            if items.len() == length {
                return false;
            }
            items.resize(length, Value::Null);
            true
        });

        if !self.is_list() {
            report_misuse(&Error::InvalidListKey {
                key: "length".to_string(),
            });
            return;
        }

        if changed {
            self.trigger(TriggerKind::Set, DepKey::Length, Some(length));
        }
    }

    /// Tracked existence check.
    pub fn has(&self, key: impl Into<Key>) -> bool {
        let Some(slot) = self.slot(key.into()) else {
            return false;
        };

        match slot {
            Slot::Length => true,
            Slot::Field(name) => {
                self.track(DepKey::Field(name.clone()));
                self.target().field(&name).is_some()
            }
            Slot::Index(index) => {
                self.track(DepKey::Index(index));
                index < self.target().len()
            }
        }
    }

    /// Tracked key enumeration: field names of a record, indices of a list.
    pub fn keys(&self) -> Vec<Key> {
        match self.shape() {
            Shape::Record => {
                self.track(DepKey::Iterate);
                self.target().read(|data| match data {
                    TargetData::Record(fields) => {
                        fields.keys().map(|k| Key::from(k.as_str())).collect()
                    }
                    TargetData::List(_) => Vec::new(),
                })
            }
            Shape::List => {
                self.track(DepKey::Length);
                (0..self.target().len()).map(Key::Index).collect()
            }
        }
    }

    /// Tracked values, in key order.
    pub fn values(&self) -> Vec<Value> {
        self.keys().into_iter().map(|key| self.get(key)).collect()
    }

    /// Tracked field count or list length.
    pub fn len(&self) -> usize {
        match self.shape() {
            Shape::Record => self.track(DepKey::Iterate),
            Shape::List => self.track(DepKey::Length),
        }
        self.target().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove a key. On a list the slot is left as `Null` and the length is
    /// unchanged. Returns whether the key existed.
    pub fn delete(&self, key: impl Into<Key>) -> bool {
        let Some(slot) = self.slot(key.into()) else {
            return false;
        };

        match slot {
            Slot::Length => false,
            Slot::Field(name) => {
                let removed = self.target().write(|data| match data {
                    TargetData::Record(fields) => fields.shift_remove(&*name).is_some(),
                    TargetData::List(_) => false,
                });
                if removed {
                    self.trigger(TriggerKind::Delete, DepKey::Field(name), None);
                }
                removed
            }
            Slot::Index(index) => {
                let existed = self.target().write(|data| match data {
                    TargetData::List(items) if index < items.len() => {
                        items[index] = Value::Null;
                        true
                    }
                    _ => false,
                });
                if existed {
                    self.trigger(TriggerKind::Delete, DepKey::Index(index), None);
                }
                existed
            }
        }
    }

    /// Untracked JSON snapshot of the container.
    pub fn to_json(&self) -> serde_json::Value {
        Value::Object(self.target().clone()).to_json()
    }
}

impl PartialEq for Reactive {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl std::fmt::Debug for Reactive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Reactive").field(self.target()).finish()
    }
}

fn wrap_nested(value: Value) -> Value {
    match value {
        Value::Object(target) => Value::Reactive(Reactive::new(target)),
        other => other,
    }
}

/// Wrap a structured value.
///
/// Non-structured values are reported as misuse and returned unchanged.
pub fn reactive(value: Value) -> Value {
    match value {
        Value::Object(target) => Value::Reactive(Reactive::new(target)),
        Value::Reactive(_) => value,
        other => {
            report_misuse(&Error::NotStructured { kind: other.kind() });
            other
        }
    }
}

/// Like [`reactive`], but returns an error for non-structured values.
pub fn try_reactive(value: Value) -> Result<Reactive> {
    match value {
        Value::Object(target) => Ok(Reactive::new(target)),
        Value::Reactive(reactive) => Ok(reactive),
        other => Err(Error::NotStructured { kind: other.kind() }),
    }
}

pub fn is_reactive(value: &Value) -> bool {
    matches!(value, Value::Reactive(_))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{Effect, Signal};
    use std::sync::atomic::{AtomicI32, Ordering};

    fn counter() -> Arc<AtomicI32> {
        Arc::new(AtomicI32::new(0))
    }

    #[test]
    fn wrapping_is_idempotent() {
        let raw = Value::record([("a", Value::from(1))]);
        let first = reactive(raw.clone());
        let second = reactive(raw);
        let again = reactive(first.clone());

        assert_eq!(first, second);
        assert_eq!(first, again);
        assert!(is_reactive(&first));
    }

    #[test]
    fn non_structured_values_pass_through() {
        assert_eq!(reactive(Value::from(3)), Value::from(3));
        assert!(matches!(
            try_reactive(Value::from("x")),
            Err(Error::NotStructured { kind: "string" })
        ));
    }

    #[test]
    fn nested_containers_are_wrapped_lazily_and_stably() {
        let state = try_reactive(Value::from(serde_json::json!({ "inner": { "n": 1 } }))).unwrap();
        let first = state.get("inner");
        let second = state.get("inner");

        assert!(is_reactive(&first));
        assert_eq!(first, second);
        assert_eq!(first.as_reactive().unwrap().get("n"), Value::from(1));
    }

    #[test]
    fn effect_tracks_and_reruns_on_set() {
        let state = Reactive::record();
        state.set("count", 0);
        let runs = counter();

        let _effect = Effect::new({
            let state = state.clone();
            let runs = runs.clone();
            move || {
                state.get("count");
                runs.fetch_add(1, Ordering::SeqCst);
            }
        });

        state.set("count", 1);
        state.set("count", 1);
        state.set("other", 1);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn adding_a_field_reruns_key_enumeration() {
        let state = Reactive::record();
        let runs = counter();

        let _effect = Effect::new({
            let state = state.clone();
            let runs = runs.clone();
            move || {
                state.keys();
                runs.fetch_add(1, Ordering::SeqCst);
            }
        });

        state.set("a", 1);
        assert_eq!(runs.load(Ordering::SeqCst), 2);

        state.set("a", 2);
        assert_eq!(runs.load(Ordering::SeqCst), 2);

        assert!(state.delete("a"));
        assert_eq!(runs.load(Ordering::SeqCst), 3);
        assert!(!state.delete("a"));
    }

    #[test]
    fn refs_in_fields_unwrap_and_write_through() {
        let count = Signal::new(Value::from(1));
        let state = Reactive::record();
        state.set("count", Value::Ref(count.clone()));

        assert_eq!(state.get("count"), Value::from(1));

        state.set("count", 5);
        assert_eq!(count.get_untracked(), Value::from(5));
        assert!(matches!(state.target().field("count"), Some(Value::Ref(_))));
    }

    #[test]
    fn refs_at_list_indices_are_not_unwrapped() {
        let list = Reactive::list();
        list.set(0usize, Value::Ref(Signal::new(Value::from(1))));
        assert!(matches!(list.get(0usize), Value::Ref(_)));
    }

    #[test]
    fn out_of_bounds_write_extends_list() {
        let list = Reactive::list();
        let length_runs = counter();

        let _effect = Effect::new({
            let list = list.clone();
            let length_runs = length_runs.clone();
            move || {
                list.len();
                length_runs.fetch_add(1, Ordering::SeqCst);
            }
        });

        list.set(2usize, "c");
        assert_eq!(list.to_json(), serde_json::json!([null, null, "c"]));
        assert_eq!(length_runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn oversized_or_fractional_lengths_are_ignored() {
        let list = try_reactive(Value::list([1, 2].map(Value::from))).unwrap();

        list.set("length", Value::from(1e300));
        list.set("length", Value::from(1.5));
        list.set("length", Value::from(-1));
        list.set(usize::MAX, "x");
        list.set(MAX_LIST_LEN, "x");
        list.set_len(MAX_LIST_LEN + 1);
        assert_eq!(list.to_json(), serde_json::json!([1, 2]));

        list.set("length", Value::from(3.0));
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn dropped_containers_leave_the_store() {
        let id = {
            let temp = Reactive::record();
            temp.set("n", 0);
            let effect = Effect::new({
                let temp = temp.clone();
                move || {
                    temp.get("n");
                }
            });
            let id = temp.id();
            assert!(Runtime::is_tracked(id));

            effect.dispose();
            id
        };
        assert!(!Runtime::is_tracked(id));
    }

    #[test]
    fn shrinking_length_reruns_readers_of_dropped_indices() {
        let list = try_reactive(Value::list([1, 2, 3].map(Value::from))).unwrap();
        let first = counter();
        let last = counter();

        let _first = Effect::new({
            let list = list.clone();
            let first = first.clone();
            move || {
                list.get(0usize);
                first.fetch_add(1, Ordering::SeqCst);
            }
        });
        let _last = Effect::new({
            let list = list.clone();
            let last = last.clone();
            move || {
                list.get(2usize);
                last.fetch_add(1, Ordering::SeqCst);
            }
        });

        list.set("length", 1);
        assert_eq!(list.get_untracked("length"), Value::from(1));
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(last.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn stored_values_are_raw() {
        let inner = Reactive::record();
        let outer = Reactive::record();
        outer.set("inner", Value::Reactive(inner.clone()));

        assert!(matches!(outer.target().field("inner"), Some(Value::Object(_))));
        assert_eq!(outer.get("inner"), Value::Reactive(inner));
    }
}
