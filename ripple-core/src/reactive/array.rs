//! List operations on wrapped containers.
//!
//! Search methods (`includes`, `index_of`, `last_index_of`) subscribe to every
//! index plus the length, because their answer depends on all of them. They
//! first compare the argument as given, then retry with the argument
//! unwrapped, since stored values are raw while callers often hold wrappers.
//!
//! Mutating methods (`push`, `pop`, `shift`, `unshift`, `splice`) pause
//! tracking for their own reads. Otherwise the caller would end up subscribed
//! to the length merely because pushing reads it.

use super::context::untracked;
use super::proxy::Reactive;
use super::runtime::DepKey;
use super::runtime::Runtime;
use super::target::TargetData;
use super::value::{same_value, to_raw, Value};

impl Reactive {
    fn track_all(&self) {
        let length = self.target().len();
        for index in 0..length {
            Runtime::track(self.id(), DepKey::Index(index));
        }
        Runtime::track(self.id(), DepKey::Length);
    }

    fn search(&self, needle: &Value, from_end: bool) -> Option<usize> {
        self.track_all();

        let find = |needle: &Value| {
            self.target().read(|data| {
                let TargetData::List(items) = data else {
                    return None;
                };
                if from_end {
                    items.iter().rposition(|item| same_value(item, needle))
                } else {
                    items.iter().position(|item| same_value(item, needle))
                }
            })
        };

        find(needle).or_else(|| find(&to_raw(needle)))
    }

    /// Whether the list contains `needle`.
    pub fn includes(&self, needle: &Value) -> bool {
        self.search(needle, false).is_some()
    }

    /// Position of the first occurrence of `needle`.
    pub fn index_of(&self, needle: &Value) -> Option<usize> {
        self.search(needle, false)
    }

    /// Position of the last occurrence of `needle`.
    pub fn last_index_of(&self, needle: &Value) -> Option<usize> {
        self.search(needle, true)
    }

    /// Append items, returning the new length.
    pub fn push<I>(&self, items: I) -> usize
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        untracked(|| {
            let mut length = self.target().len();
            for item in items {
                self.set(length, item);
                length += 1;
            }
            self.set_len(length);
            length
        })
    }

    /// Remove and return the last item.
    pub fn pop(&self) -> Option<Value> {
        untracked(|| {
            let length = self.target().len();
            if length == 0 {
                return None;
            }
            let last = self.get(length - 1);
            self.delete(length - 1);
            self.set_len(length - 1);
            Some(last)
        })
    }

    /// Remove and return the first item, shifting the rest down.
    pub fn shift(&self) -> Option<Value> {
        untracked(|| {
            let length = self.target().len();
            if length == 0 {
                return None;
            }
            let first = self.get(0usize);
            for from in 1..length {
                self.set(from - 1, self.get(from));
            }
            self.delete(length - 1);
            self.set_len(length - 1);
            Some(first)
        })
    }

    /// Insert items at the front, returning the new length.
    pub fn unshift<I>(&self, items: I) -> usize
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let items: Vec<Value> = items.into_iter().map(Into::into).collect();
        untracked(|| {
            let length = self.target().len();
            let count = items.len();
            for from in (0..length).rev() {
                self.set(from + count, self.get(from));
            }
            for (offset, item) in items.into_iter().enumerate() {
                self.set(offset, item);
            }
            self.set_len(length + count);
            length + count
        })
    }

    /// Remove `delete_count` items starting at `start` and insert `items`
    /// in their place. Returns the removed items.
    pub fn splice<I>(&self, start: usize, delete_count: usize, items: I) -> Vec<Value>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let items: Vec<Value> = items.into_iter().map(Into::into).collect();
        untracked(|| {
            let length = self.target().len();
            let start = start.min(length);
            let delete_count = delete_count.min(length - start);
            let item_count = items.len();

            let removed: Vec<Value> = (start..start + delete_count)
                .map(|index| self.get(index))
                .collect();

            if item_count < delete_count {
                for k in start..length - delete_count {
                    self.set(k + item_count, self.get(k + delete_count));
                }
                for k in (length - delete_count + item_count..length).rev() {
                    self.delete(k);
                }
            } else if item_count > delete_count {
                for k in (start..length - delete_count).rev() {
                    self.set(k + item_count, self.get(k + delete_count));
                }
            }

            for (offset, item) in items.into_iter().enumerate() {
                self.set(start + offset, item);
            }
            self.set_len(length - delete_count + item_count);
            removed
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{try_reactive, Effect};
    use serde_json::json;
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Arc;

    fn list(items: serde_json::Value) -> Reactive {
        try_reactive(Value::from(items)).unwrap()
    }

    #[test]
    fn search_finds_wrapped_and_raw_arguments() {
        let item = Value::record([("id", Value::from(1))]);
        let items = Reactive::list();
        items.push([item.clone()]);

        // The caller holds the wrapper it got from a read.
        let wrapped = items.get(0usize);
        assert!(crate::reactive::is_reactive(&wrapped));

        assert!(items.includes(&wrapped));
        assert!(items.includes(&item));
        assert_eq!(items.index_of(&wrapped), Some(0));
        assert_eq!(items.index_of(&Value::from(2)), None);
    }

    #[test]
    fn last_index_of_searches_from_the_end() {
        let items = list(json!([1, 2, 1]));
        assert_eq!(items.last_index_of(&Value::from(1)), Some(2));
        assert_eq!(items.index_of(&Value::from(1)), Some(0));
    }

    #[test]
    fn includes_reruns_when_any_index_changes() {
        let items = list(json!([1, 2, 3]));
        let runs = Arc::new(AtomicI32::new(0));

        let _effect = Effect::new({
            let items = items.clone();
            let runs = runs.clone();
            move || {
                items.includes(&Value::from(9));
                runs.fetch_add(1, Ordering::SeqCst);
            }
        });

        items.set(1usize, 9);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn push_does_not_subscribe_caller_to_length() {
        let items = list(json!([]));
        let runs = Arc::new(AtomicI32::new(0));

        // An effect that pushes must not re-run itself through the length
        // it read internally.
        let _effect = Effect::new({
            let items = items.clone();
            let runs = runs.clone();
            move || {
                items.push([1]);
                runs.fetch_add(1, Ordering::SeqCst);
            }
        });

        items.push([2]);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(items.to_json(), json!([1, 2]));
    }

    #[test]
    fn push_notifies_length_readers() {
        let items = list(json!([]));
        let lengths = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let _effect = Effect::new({
            let items = items.clone();
            let lengths = lengths.clone();
            move || {
                let length = items.len();
                lengths.lock().push(length);
            }
        });

        assert_eq!(items.push(["a"]), 1);
        assert_eq!(*lengths.lock(), vec![0, 1]);
    }

    #[test]
    fn pop_and_shift() {
        let items = list(json!(["a", "b", "c"]));

        assert_eq!(items.pop(), Some(Value::from("c")));
        assert_eq!(items.shift(), Some(Value::from("a")));
        assert_eq!(items.to_json(), json!(["b"]));

        assert_eq!(items.pop(), Some(Value::from("b")));
        assert_eq!(items.pop(), None);
        assert_eq!(items.shift(), None);
    }

    #[test]
    fn unshift_inserts_at_front() {
        let items = list(json!([3]));
        assert_eq!(items.unshift([1, 2]), 3);
        assert_eq!(items.to_json(), json!([1, 2, 3]));
    }

    #[test]
    fn splice_removes_and_inserts() {
        let items = list(json!([1, 2, 3, 4, 5]));

        let removed = items.splice(1, 2, [Value::from("x")]);
        assert_eq!(removed, vec![Value::from(2), Value::from(3)]);
        assert_eq!(items.to_json(), json!([1, "x", 4, 5]));

        let removed = items.splice(1, 0, ["y", "z"]);
        assert!(removed.is_empty());
        assert_eq!(items.to_json(), json!([1, "y", "z", "x", 4, 5]));

        let removed = items.splice(4, 10, Vec::<Value>::new());
        assert_eq!(removed, vec![Value::from(4), Value::from(5)]);
        assert_eq!(items.to_json(), json!([1, "y", "z", "x"]));
    }
}
