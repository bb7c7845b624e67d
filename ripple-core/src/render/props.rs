//! Component props.
//!
//! Raw props on a component node are split by the component's declared prop
//! names. Declared props live in a reactive record owned by the instance so
//! the child re-renders when a prop it read changes; the rest are attrs.

use crate::reactive::{same_value, TargetData};

use super::component::{slots_of, Component, InstanceState};
use super::vnode::{Children, Props, VNode};

/// Split raw props into `(declared, attrs)`.
pub(crate) fn split_props(component: &Component, raw: &Props) -> (Props, Props) {
    let mut props = Props::new();
    let mut attrs = Props::new();
    for (key, value) in raw {
        if component.declares(key) {
            props.insert(key.clone(), value.clone());
        } else {
            attrs.insert(key.clone(), value.clone());
        }
    }
    (props, attrs)
}

/// Apply the props and slots of `next` to a live instance.
///
/// Declared props are written through the reactive record, so only props
/// whose value changed notify readers. Declared props missing from `next`
/// are deleted.
pub(crate) fn update_props(state: &InstanceState, next: &VNode) {
    let (props, attrs) = split_props(&state.component, next.props());

    for (key, value) in &props {
        state.props.set(key.as_str(), value.clone());
    }
    let stale: Vec<String> = state
        .props
        .target()
        .read(|data| match data {
            TargetData::Record(fields) => fields
                .keys()
                .filter(|key| !props.contains_key(*key))
                .cloned()
                .collect(),
            TargetData::List(_) => Vec::new(),
        });
    for key in stale {
        state.props.delete(key.as_str());
    }

    *state.attrs.lock() = attrs;
    *state.slots.lock() = slots_of(next);
}

/// Did any prop change between two renders of the same component node?
pub fn has_props_changed(prev: &Props, next: &Props) -> bool {
    if prev.len() != next.len() {
        return true;
    }
    next.iter().any(|(key, value)| match prev.get(key) {
        Some(old) => !same_value(old, value),
        None => true,
    })
}

/// A child component re-renders when its parent re-renders only if it has
/// slots or its props changed.
pub(crate) fn should_update_component(prev: &VNode, next: &VNode) -> bool {
    if matches!(prev.children(), Children::Slots(_)) || matches!(next.children(), Children::Slots(_)) {
        return true;
    }
    has_props_changed(prev.props(), next.props())
}
