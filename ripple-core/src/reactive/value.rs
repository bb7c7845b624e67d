//! Dynamic values stored in reactive containers.
//!
//! [`Value`] is the data model the reactive wrapper observes. Scalars are held
//! inline; structured values are shared [`Target`] handles so that nested
//! records keep their identity across reads.

use std::sync::Arc;

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use super::proxy::Reactive;
use super::signal::Signal;
use super::target::{Target, TargetData, TargetId};

/// A dynamically typed value.
#[derive(Clone, Debug, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(Arc<str>),
    /// A raw, unobserved container.
    Object(Target),
    /// A container seen through its reactive wrapper.
    Reactive(Reactive),
    /// A signal stored inside a container. Reads through a wrapper unwrap it.
    Ref(Signal<Value>),
}

impl Value {
    /// A fresh record built from `fields`.
    pub fn record<K, I>(fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Value::Object(Target::from_fields(fields))
    }

    /// A fresh list built from `items`.
    pub fn list<I>(items: I) -> Self
    where
        I: IntoIterator<Item = Value>,
    {
        Value::Object(Target::from_items(items))
    }

    /// Short name of the variant, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Object(_) => "object",
            Value::Reactive(_) => "reactive",
            Value::Ref(_) => "ref",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Records and lists, raw or wrapped.
    pub fn is_structured(&self) -> bool {
        matches!(self, Value::Object(_) | Value::Reactive(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_f64()
            .filter(|n| n.fract() == 0.0)
            .map(|n| n as i64)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_reactive(&self) -> Option<&Reactive> {
        match self {
            Value::Reactive(r) => Some(r),
            _ => None,
        }
    }

    /// The underlying container, whether raw or wrapped.
    pub fn target(&self) -> Option<&Target> {
        match self {
            Value::Object(target) => Some(target),
            Value::Reactive(reactive) => Some(reactive.target()),
            _ => None,
        }
    }

    pub fn target_id(&self) -> Option<TargetId> {
        self.target().map(Target::id)
    }

    /// JavaScript-style truthiness, handy for conditional renders.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// Untracked JSON snapshot. Cycles are cut with `null`.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Strip a reactive wrapper, returning the raw container. Other values pass
/// through unchanged.
pub fn to_raw(value: &Value) -> Value {
    match value {
        Value::Reactive(reactive) => Value::Object(reactive.target().clone()),
        other => other.clone(),
    }
}

/// `SameValue` comparison: `NaN` equals itself, `0.0` and `-0.0` differ,
/// containers and refs compare by identity.
pub fn same_value(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => {
            (x.is_nan() && y.is_nan()) || (x == y && x.is_sign_negative() == y.is_sign_negative())
        }
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Object(x), Value::Object(y)) => x.ptr_eq(y),
        (Value::Reactive(x), Value::Reactive(y)) => x.ptr_eq(y),
        (Value::Ref(x), Value::Ref(y)) => x.ptr_eq(y),
        _ => false,
    }
}

/// Whether writing `new` over `old` is an actual change.
pub fn has_changed(new: &Value, old: &Value) -> bool {
    !same_value(new, old)
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        same_value(self, other)
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Null
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

macro_rules! number_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(n: $ty) -> Self {
                    Value::Number(n as f64)
                }
            }
        )*
    };
}

number_from!(i32, i64, u32, u64, usize, f32, f64);

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Arc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Arc::from(s))
    }
}

impl From<Arc<str>> for Value {
    fn from(s: Arc<str>) -> Self {
        Value::String(s)
    }
}

impl From<Target> for Value {
    fn from(target: Target) -> Self {
        Value::Object(target)
    }
}

impl From<Reactive> for Value {
    fn from(reactive: Reactive) -> Self {
        Value::Reactive(reactive)
    }
}

impl From<Signal<Value>> for Value {
    fn from(signal: Signal<Value>) -> Self {
        Value::Ref(signal)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::from(s),
            serde_json::Value::Array(items) => Value::list(items.into_iter().map(Value::from)),
            serde_json::Value::Object(fields) => {
                Value::record(fields.into_iter().map(|(k, v)| (k, Value::from(v))))
            }
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut visiting = Vec::new();
        SerializeValue {
            value: self,
            visiting: &mut visiting,
        }
        .serialize(serializer)
    }
}

/// Serializes a value while remembering which containers are open, so a
/// container that contains itself serializes its inner occurrence as `null`.
struct SerializeValue<'a> {
    value: &'a Value,
    visiting: &'a mut Vec<TargetId>,
}

impl SerializeValue<'_> {
    fn serialize<S: Serializer>(self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.value {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) if n.fract() == 0.0 && n.abs() < 9.0e15 => {
                serializer.serialize_i64(*n as i64)
            }
            Value::Number(n) => serializer.serialize_f64(*n),
            Value::String(s) => serializer.serialize_str(s),
            Value::Ref(signal) => {
                let inner = signal.get_untracked();
                SerializeValue {
                    value: &inner,
                    visiting: self.visiting,
                }
                .serialize(serializer)
            }
            Value::Object(_) | Value::Reactive(_) => {
                let Some(target) = self.value.target() else {
                    return serializer.serialize_unit();
                };
                if self.visiting.contains(&target.id()) {
                    return serializer.serialize_unit();
                }
                self.visiting.push(target.id());
                let data = target.read(TargetData::clone);
                let result = serialize_data(&data, self.visiting, serializer);
                self.visiting.pop();
                result
            }
        }
    }
}

fn serialize_data<S: Serializer>(
    data: &TargetData,
    visiting: &mut Vec<TargetId>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match data {
        TargetData::Record(fields) => {
            let mut map = serializer.serialize_map(Some(fields.len()))?;
            for (key, value) in fields {
                map.serialize_key(key)?;
                map.serialize_value(&Nested::new(value, visiting))?;
            }
            map.end()
        }
        TargetData::List(items) => {
            let mut seq = serializer.serialize_seq(Some(items.len()))?;
            for value in items {
                seq.serialize_element(&Nested::new(value, visiting))?;
            }
            seq.end()
        }
    }
}

/// Adapter so nested values can go through `serialize_value`, which wants a
/// `&impl Serialize`.
struct Nested<'a> {
    value: &'a Value,
    visiting: std::cell::RefCell<&'a mut Vec<TargetId>>,
}

impl<'a> Nested<'a> {
    fn new(value: &'a Value, visiting: &'a mut Vec<TargetId>) -> Self {
        Self {
            value,
            visiting: std::cell::RefCell::new(visiting),
        }
    }
}

impl Serialize for Nested<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut visiting = self.visiting.borrow_mut();
        SerializeValue {
            value: self.value,
            visiting: &mut **visiting,
        }
        .serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn same_value_semantics() {
        assert!(same_value(&Value::from(f64::NAN), &Value::from(f64::NAN)));
        assert!(!same_value(&Value::from(0.0), &Value::from(-0.0)));
        assert!(same_value(&Value::from("a"), &Value::from("a")));

        let a = Value::record([("x", Value::from(1))]);
        let b = Value::record([("x", Value::from(1))]);
        assert!(same_value(&a, &a.clone()));
        assert!(!same_value(&a, &b));
    }

    #[test]
    fn json_conversion_preserves_structure() {
        let source = json!({ "b": 1, "a": [true, null, "x"], "c": { "d": 2.5 } });
        let value = Value::from(source.clone());
        assert_eq!(value.to_json(), source);
        assert_eq!(
            serde_json::to_string(&value).unwrap(),
            r#"{"a":[true,null,"x"],"b":1,"c":{"d":2.5}}"#
        );
    }

    #[test]
    fn self_referencing_container_serializes_as_null() {
        let target = Target::record();
        let value = Value::Object(target.clone());
        target.write(|data| {
            if let TargetData::Record(fields) = data {
                fields.insert("me".into(), value.clone());
            }
        });

        assert_eq!(value.to_json(), json!({ "me": null }));

        // Break the cycle so the container is freed.
        target.write(|data| {
            if let TargetData::Record(fields) = data {
                fields.clear();
            }
        });
    }

    #[test]
    fn truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::from(0).is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(Value::from("x").is_truthy());
        assert!(Value::list([]).is_truthy());
    }
}
