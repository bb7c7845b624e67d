//! Component Implementation
//!
//! A component is a named setup function. Setup runs once per mounted
//! instance and returns the render function that produces the instance's
//! subtree. The render function runs inside an effect, so whatever it reads
//! decides when the instance re-renders.
//!
//! # How Components Work
//!
//! 1. The raw props on the component node are split: names the component
//!    declared become reactive props, everything else lands in attrs.
//!
//! 2. Setup runs untracked, with the new instance set as the current one.
//!    Lifecycle hooks, `provide`/`inject` and watchers created here attach to
//!    that instance.
//!
//! 3. The render effect runs the render function and patches the result
//!    against the previous subtree. When its dependencies change it queues
//!    an update job ordered by instance uid, so parents update first.
//!
//! 4. Unmounting disposes the render effect and every watcher the instance
//!    adopted.

use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{report_misuse, Error, Result};
use crate::reactive::{Effect, Reactive, Target, Value};

use super::inject::Provides;
use super::lifecycle::Hooks;
use super::props::split_props;
use super::vnode::{Children, Props, Slots, VNode};

/// Render function returned by setup.
pub type RenderFn = Arc<dyn Fn(&ComponentContext) -> VNode + Send + Sync>;

type SetupFn = Arc<dyn Fn(&ComponentContext) -> RenderFn + Send + Sync>;

pub(crate) struct ComponentDef {
    name: Arc<str>,
    props: Vec<Arc<str>>,
    setup: SetupFn,
}

/// A component definition. Cloning shares the definition; two nodes are the
/// same component only if they share it.
#[derive(Clone)]
pub struct Component {
    def: Arc<ComponentDef>,
}

/// Builder returned by [`Component::new`].
pub struct ComponentBuilder {
    name: Arc<str>,
    props: Vec<Arc<str>>,
}

impl Component {
    /// Start defining a component.
    ///
    /// ```rust,ignore
    /// let counter = Component::new("Counter")
    ///     .props(["start"])
    ///     .setup(|ctx| {
    ///         ctx.set("count", ctx.get("start"));
    ///         |ctx: &ComponentContext| {
    ///             let count = ctx.get("count").as_i64().unwrap_or(0);
    ///             h("span").with_text(count.to_string())
    ///         }
    ///     });
    /// ```
    #[allow(clippy::new_ret_no_self)]
    pub fn new(name: &str) -> ComponentBuilder {
        ComponentBuilder {
            name: name.into(),
            props: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.def.name
    }

    /// Declared prop names.
    pub fn declared_props(&self) -> &[Arc<str>] {
        &self.def.props
    }

    pub fn declares(&self, key: &str) -> bool {
        self.def.props.iter().any(|prop| &**prop == key)
    }

    pub fn ptr_eq(&self, other: &Component) -> bool {
        Arc::ptr_eq(&self.def, &other.def)
    }

    pub(crate) fn run_setup(&self, ctx: &ComponentContext) -> RenderFn {
        (self.def.setup)(ctx)
    }
}

impl std::fmt::Debug for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Component")
            .field("name", &self.def.name)
            .field("props", &self.def.props)
            .finish()
    }
}

impl ComponentBuilder {
    pub fn props<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.props = names.into_iter().map(|name| name.as_ref().into()).collect();
        self
    }

    /// Finish with a setup function returning the render function.
    pub fn setup<F, R>(self, setup: F) -> Component
    where
        F: Fn(&ComponentContext) -> R + Send + Sync + 'static,
        R: Fn(&ComponentContext) -> VNode + Send + Sync + 'static,
    {
        let setup: SetupFn =
            Arc::new(move |ctx: &ComponentContext| -> RenderFn { Arc::new(setup(ctx)) });
        Component {
            def: Arc::new(ComponentDef {
                name: self.name,
                props: self.props,
                setup,
            }),
        }
    }

    /// Finish with a render function and no setup.
    pub fn render<R>(self, render: R) -> Component
    where
        R: Fn(&ComponentContext) -> VNode + Send + Sync + 'static,
    {
        let render: RenderFn = Arc::new(render);
        let setup: SetupFn = Arc::new(move |_: &ComponentContext| render.clone());
        Component {
            def: Arc::new(ComponentDef {
                name: self.name,
                props: self.props,
                setup,
            }),
        }
    }
}

static NEXT_UID: AtomicU64 = AtomicU64::new(1);

/// Host independent state of one mounted component.
pub(crate) struct InstanceState {
    pub(crate) uid: u64,
    pub(crate) component: Component,
    pub(crate) parent: Option<Arc<InstanceState>>,
    pub(crate) props: Reactive,
    pub(crate) attrs: Mutex<Props>,
    pub(crate) slots: Mutex<Slots>,
    pub(crate) data: Reactive,
    pub(crate) provides: Mutex<Provides>,
    pub(crate) hooks: Mutex<Hooks>,
    pub(crate) effects: Mutex<Vec<Effect>>,
    pub(crate) is_mounted: AtomicBool,
    pub(crate) is_unmounted: AtomicBool,
}

impl InstanceState {
    pub(crate) fn new(
        component: Component,
        vnode: &VNode,
        parent: Option<&Arc<InstanceState>>,
    ) -> Arc<Self> {
        let (props, attrs) = split_props(&component, vnode.props());
        let provides = parent
            .map(|parent| parent.provides.lock().clone())
            .unwrap_or_default();

        Arc::new(Self {
            uid: NEXT_UID.fetch_add(1, Ordering::Relaxed),
            component,
            parent: parent.cloned(),
            props: Reactive::new(Target::from_fields(props)),
            attrs: Mutex::new(attrs),
            slots: Mutex::new(slots_of(vnode)),
            data: Reactive::record(),
            provides: Mutex::new(provides),
            hooks: Mutex::new(Hooks::default()),
            effects: Mutex::new(Vec::new()),
            is_mounted: AtomicBool::new(false),
            is_unmounted: AtomicBool::new(false),
        })
    }

    /// Dispose every effect the instance adopted.
    pub(crate) fn stop_effects(&self) {
        let effects = std::mem::take(&mut *self.effects.lock());
        for effect in effects {
            effect.dispose();
        }
    }
}

pub(crate) fn slots_of(vnode: &VNode) -> Slots {
    match vnode.children() {
        Children::Slots(slots) => slots.clone(),
        _ => Slots::new(),
    }
}

/// The public view of a component instance, handed to setup and render.
#[derive(Clone)]
pub struct ComponentContext {
    pub(crate) state: Arc<InstanceState>,
}

impl ComponentContext {
    pub(crate) fn new(state: Arc<InstanceState>) -> Self {
        Self { state }
    }

    pub fn uid(&self) -> u64 {
        self.state.uid
    }

    pub fn name(&self) -> &str {
        self.state.component.name()
    }

    /// Resolved declared props. Reads are tracked.
    pub fn props(&self) -> &Reactive {
        &self.state.props
    }

    /// Instance-local reactive state.
    pub fn data(&self) -> &Reactive {
        &self.state.data
    }

    /// Props the component did not declare, as last passed by the parent.
    pub fn attrs(&self) -> Props {
        self.state.attrs.lock().clone()
    }

    pub fn attr(&self, key: &str) -> Value {
        self.state.attrs.lock().get(key).cloned().unwrap_or_default()
    }

    /// Look `key` up in instance data, then declared props, then attrs.
    pub fn get(&self, key: &str) -> Value {
        if self.state.data.has(key) {
            return self.state.data.get(key);
        }
        if self.state.component.declares(key) {
            return self.state.props.get(key);
        }
        self.attr(key)
    }

    /// Write instance data. Declared props are readonly; writing one is
    /// reported and ignored.
    pub fn set(&self, key: &str, value: impl Into<Value>) {
        if let Err(err) = self.try_set(key, value) {
            report_misuse(&err);
        }
    }

    pub fn try_set(&self, key: &str, value: impl Into<Value>) -> Result<()> {
        if self.state.component.declares(key) {
            return Err(Error::ReadonlyProp {
                key: key.to_owned(),
            });
        }
        self.state.data.set(key, value);
        Ok(())
    }

    pub fn has_slot(&self, name: &str) -> bool {
        self.state.slots.lock().contains_key(name)
    }

    /// Render slot `name` with `props`. A missing slot renders nothing.
    pub fn render_slot(&self, name: &str, props: &Props) -> Vec<VNode> {
        let slot = self.state.slots.lock().get(name).cloned();
        slot.map(|slot| slot(props)).unwrap_or_default()
    }

    /// Render slot `name` without props.
    pub fn slot(&self, name: &str) -> Vec<VNode> {
        self.render_slot(name, &Props::new())
    }

    pub fn is_mounted(&self) -> bool {
        self.state.is_mounted.load(Ordering::SeqCst)
    }

    pub fn is_unmounted(&self) -> bool {
        self.state.is_unmounted.load(Ordering::SeqCst)
    }

    pub fn parent(&self) -> Option<ComponentContext> {
        self.state.parent.clone().map(ComponentContext::new)
    }
}

impl std::fmt::Debug for ComponentContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentContext")
            .field("uid", &self.state.uid)
            .field("name", &self.name())
            .finish()
    }
}

thread_local! {
    static CURRENT_INSTANCE: RefCell<Vec<Arc<InstanceState>>> = const { RefCell::new(Vec::new()) };
}

/// Makes `state` the current instance until dropped.
pub(crate) struct InstanceScope {
    _private: (),
}

impl InstanceScope {
    pub(crate) fn enter(state: &Arc<InstanceState>) -> Self {
        CURRENT_INSTANCE.with(|stack| stack.borrow_mut().push(state.clone()));
        Self { _private: () }
    }
}

impl Drop for InstanceScope {
    fn drop(&mut self) {
        CURRENT_INSTANCE.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

pub(crate) fn current_state() -> Option<Arc<InstanceState>> {
    CURRENT_INSTANCE.with(|stack| stack.borrow().last().cloned())
}

/// The instance whose setup or lifecycle hook is running, if any.
pub fn current_instance() -> Option<ComponentContext> {
    current_state().map(ComponentContext::new)
}

/// Tie `effect` to the current instance so it is disposed on unmount.
/// Outside of a component this does nothing.
pub(crate) fn adopt_effect(effect: &Effect) {
    if let Some(state) = current_state() {
        state.effects.lock().push(effect.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::vnode::h;

    fn state_for(component: &Component, vnode: &VNode) -> Arc<InstanceState> {
        InstanceState::new(component.clone(), vnode, None)
    }

    #[test]
    fn lookup_order_is_data_props_attrs() {
        let component = Component::new("Card")
            .props(["title"])
            .render(|_: &ComponentContext| h("div"));
        let vnode = VNode::component(&component)
            .prop("title", "hello")
            .prop("class", "card");
        let ctx = ComponentContext::new(state_for(&component, &vnode));

        assert_eq!(ctx.get("title"), Value::from("hello"));
        assert_eq!(ctx.get("class"), Value::from("card"));
        assert_eq!(ctx.get("missing"), Value::Null);

        ctx.set("class", "override");
        assert_eq!(ctx.get("class"), Value::from("override"));
    }

    #[test]
    fn declared_props_are_readonly() {
        let component = Component::new("Card")
            .props(["title"])
            .render(|_: &ComponentContext| h("div"));
        let vnode = VNode::component(&component).prop("title", "hello");
        let ctx = ComponentContext::new(state_for(&component, &vnode));

        let err = ctx.try_set("title", "changed").unwrap_err();
        assert_eq!(err, Error::ReadonlyProp { key: "title".into() });
        ctx.set("title", "changed");
        assert_eq!(ctx.get("title"), Value::from("hello"));
    }

    #[test]
    fn slots_render_with_props() {
        let component = Component::new("List").render(|_: &ComponentContext| h("ul"));
        let vnode = VNode::component(&component).slot("item", |props: &Props| {
            let label = props.get("label").and_then(Value::as_str).unwrap_or("?");
            vec![h("li").with_text(label)]
        });
        let ctx = ComponentContext::new(state_for(&component, &vnode));

        assert!(ctx.has_slot("item"));
        let mut props = Props::new();
        props.insert("label".into(), Value::from("one"));
        let nodes = ctx.render_slot("item", &props);
        assert_eq!(nodes[0].children().as_text(), Some("one"));
        assert!(ctx.slot("missing").is_empty());
    }

    #[test]
    fn adoption_needs_a_current_instance() {
        let component = Component::new("Host").render(|_: &ComponentContext| h("div"));
        let state = state_for(&component, &VNode::component(&component));
        let effect = Effect::new_lazy(|| {});

        adopt_effect(&effect);
        assert!(state.effects.lock().is_empty());

        {
            let _scope = InstanceScope::enter(&state);
            assert_eq!(current_instance().map(|ctx| ctx.uid()), Some(state.uid));
            adopt_effect(&effect);
        }
        assert!(current_instance().is_none());

        state.stop_effects();
        assert!(effect.is_disposed());
    }

    #[test]
    fn uids_increase() {
        let component = Component::new("A").render(|_: &ComponentContext| h("div"));
        let vnode = VNode::component(&component);
        let first = state_for(&component, &vnode);
        let second = state_for(&component, &vnode);
        assert!(first.uid < second.uid);
    }
}
