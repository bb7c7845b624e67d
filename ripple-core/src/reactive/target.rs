//! Raw state containers.
//!
//! A [`Target`] is the plain, unobserved data behind a reactive wrapper: an
//! insertion-ordered record or a list. Targets are shared by identity; cloning
//! a `Target` clones the handle, not the data.
//!
//! Reads and writes on a `Target` never track or trigger. Go through
//! [`Reactive`](super::Reactive) for that.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

use super::runtime::Runtime;
use super::value::Value;

/// Identity of a state container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(u64);

impl TargetId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Whether a container is a record or a list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Record,
    List,
}

/// The data held by a container.
#[derive(Debug, Clone)]
pub enum TargetData {
    Record(IndexMap<String, Value>),
    List(Vec<Value>),
}

impl TargetData {
    pub fn shape(&self) -> Shape {
        match self {
            TargetData::Record(_) => Shape::Record,
            TargetData::List(_) => Shape::List,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            TargetData::Record(fields) => fields.len(),
            TargetData::List(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct TargetInner {
    id: TargetId,
    data: RwLock<TargetData>,
}

impl Drop for TargetInner {
    fn drop(&mut self) {
        // Containers must not outlive their last handle through the store.
        Runtime::forget_target(self.id);
    }
}

/// A shared handle to a raw record or list.
#[derive(Clone)]
pub struct Target {
    inner: Arc<TargetInner>,
}

impl Target {
    pub fn new(data: TargetData) -> Self {
        Self {
            inner: Arc::new(TargetInner {
                id: TargetId::next(),
                data: RwLock::new(data),
            }),
        }
    }

    /// An empty record.
    pub fn record() -> Self {
        Self::new(TargetData::Record(IndexMap::new()))
    }

    /// An empty list.
    pub fn list() -> Self {
        Self::new(TargetData::List(Vec::new()))
    }

    pub fn from_fields<K, I>(fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Self::new(TargetData::Record(
            fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        ))
    }

    pub fn from_items<I>(items: I) -> Self
    where
        I: IntoIterator<Item = Value>,
    {
        Self::new(TargetData::List(items.into_iter().collect()))
    }

    pub fn id(&self) -> TargetId {
        self.inner.id
    }

    pub fn shape(&self) -> Shape {
        self.inner.data.read().shape()
    }

    pub fn is_list(&self) -> bool {
        self.shape() == Shape::List
    }

    /// Untracked length: field count for records, item count for lists.
    pub fn len(&self) -> usize {
        self.inner.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read the raw data.
    pub fn read<R>(&self, f: impl FnOnce(&TargetData) -> R) -> R {
        f(&self.inner.data.read())
    }

    /// Mutate the raw data. Nothing is triggered.
    pub fn write<R>(&self, f: impl FnOnce(&mut TargetData) -> R) -> R {
        f(&mut self.inner.data.write())
    }

    /// Untracked field read on a record.
    pub fn field(&self, key: &str) -> Option<Value> {
        self.read(|data| match data {
            TargetData::Record(fields) => fields.get(key).cloned(),
            TargetData::List(_) => None,
        })
    }

    /// Untracked item read on a list.
    pub fn item(&self, index: usize) -> Option<Value> {
        self.read(|data| match data {
            TargetData::List(items) => items.get(index).cloned(),
            TargetData::Record(_) => None,
        })
    }

    pub fn ptr_eq(&self, other: &Target) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PartialEq for Target {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl std::fmt::Debug for Target {
    // Containers can be cyclic, so only the identity and shape are printed.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Target")
            .field("id", &self.id())
            .field("shape", &self.shape())
            .field("len", &self.len())
            .finish()
    }
}
