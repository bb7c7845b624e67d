//! Mounted component instances.
//!
//! Each instance owns a lazy render effect. The effect renders and patches
//! the subtree when it runs; when something it read changes, its scheduler
//! queues the instance's update job instead of re-rendering inline.

use std::sync::atomic::Ordering;
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::reactive::{untracked, Effect, EffectOptions, EffectScheduler};
use crate::scheduler::{flush_pre_flush_cbs, invalidate_job, queue_job, Job};

use super::component::{ComponentContext, InstanceScope, InstanceState, RenderFn};
use super::host::HostOps;
use super::lifecycle::{call_hooks, queue_hooks, LifecycleHook};
use super::props::{should_update_component, update_props};
use super::renderer::{Mounted, RendererInner};
use super::vnode::VNode;

struct InstanceTree<H: HostOps> {
    /// Node handed down by the parent, applied on the next update.
    next: Option<VNode>,
    subtree: Option<Mounted<H>>,
    container: H::Node,
    anchor: Option<H::Node>,
}

pub(crate) struct ComponentInstance<H: HostOps> {
    pub(crate) state: Arc<InstanceState>,
    render: RenderFn,
    renderer: Weak<RendererInner<H>>,
    tree: Mutex<InstanceTree<H>>,
    effect: OnceLock<Effect>,
    job: OnceLock<Job>,
    error: Mutex<Option<Error>>,
}

impl<H: HostOps> ComponentInstance<H> {
    pub(crate) fn with_subtree<R>(&self, f: impl FnOnce(Option<&Mounted<H>>) -> R) -> R {
        f(self.tree.lock().subtree.as_ref())
    }

    /// Run the render effect now and report what went wrong inside it.
    fn run_effect(&self) -> Result<()> {
        if let Some(effect) = self.effect.get() {
            effect.run();
        }
        match self.error.lock().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Dispose the render effect, drop any queued update and stop the
    /// watchers created in setup.
    fn stop(&self) {
        if let Some(effect) = self.effect.get() {
            effect.dispose();
        }
        if let Some(job) = self.job.get() {
            invalidate_job(job);
        }
        self.state.stop_effects();
    }

    /// Body of the render effect.
    fn update(&self) {
        let Some(renderer) = self.renderer.upgrade() else {
            return;
        };
        if let Err(err) = renderer.render_component(self) {
            *self.error.lock() = Some(err);
        }
    }
}

impl<H: HostOps> RendererInner<H> {
    pub(crate) fn process_component(
        &self,
        old: Option<Mounted<H>>,
        vnode: VNode,
        container: &H::Node,
        anchor: Option<&H::Node>,
        parent: Option<&Arc<InstanceState>>,
    ) -> Result<Mounted<H>> {
        match old {
            None => self.mount_component(vnode, container, anchor, parent),
            Some(old) => self.update_component(old, vnode),
        }
    }

    fn mount_component(
        &self,
        vnode: VNode,
        container: &H::Node,
        anchor: Option<&H::Node>,
        parent: Option<&Arc<InstanceState>>,
    ) -> Result<Mounted<H>> {
        let Some(component) = vnode.as_component().cloned() else {
            return Ok(Mounted::new(vnode));
        };

        let state = InstanceState::new(component.clone(), &vnode, parent);
        tracing::debug!(component = component.name(), uid = state.uid, "mounting component");

        let render = {
            let _scope = InstanceScope::enter(&state);
            let ctx = ComponentContext::new(state.clone());
            untracked(|| component.run_setup(&ctx))
        };

        let instance = Arc::new(ComponentInstance {
            state,
            render,
            renderer: self.me.clone(),
            tree: Mutex::new(InstanceTree {
                next: None,
                subtree: None,
                container: container.clone(),
                anchor: anchor.cloned(),
            }),
            effect: OnceLock::new(),
            job: OnceLock::new(),
            error: Mutex::new(None),
        });

        let weak = Arc::downgrade(&instance);
        let job = Job::with_id(instance.state.uid, {
            let weak = weak.clone();
            move || {
                let Some(instance) = weak.upgrade() else {
                    return;
                };
                if let Err(err) = instance.run_effect() {
                    tracing::error!(
                        component = instance.state.component.name(),
                        error = %err,
                        "component update failed"
                    );
                }
            }
        });
        let scheduler: EffectScheduler = Arc::new({
            let job = job.clone();
            move || queue_job(job.clone())
        });
        let effect = Effect::with_options(
            move || {
                if let Some(instance) = weak.upgrade() {
                    instance.update();
                }
            },
            EffectOptions {
                lazy: true,
                scheduler: Some(scheduler),
            },
        );
        let _ = instance.job.set(job);
        let _ = instance.effect.set(effect);

        if let Err(err) = instance.run_effect() {
            // Never mounted: no unmount hooks, only the effects go.
            instance.stop();
            return Err(err);
        }

        let mut mounted = Mounted::new(vnode);
        mounted.component = Some(instance);
        Ok(mounted)
    }

    fn update_component(&self, old: Mounted<H>, vnode: VNode) -> Result<Mounted<H>> {
        let Some(instance) = old.component else {
            return Ok(Mounted::new(vnode));
        };

        if should_update_component(&old.vnode, &vnode) {
            instance.tree.lock().next = Some(vnode.clone());
            // The parent is updating the child right now; a queued update
            // would be redundant.
            if let Some(job) = instance.job.get() {
                invalidate_job(job);
            }
            if let Err(err) = instance.run_effect() {
                self.unmount_component(&instance, true);
                return Err(err);
            }
        }

        let mut mounted = Mounted::new(vnode);
        mounted.component = Some(instance);
        Ok(mounted)
    }

    /// Render the instance and patch the result into its subtree. Runs
    /// inside the instance's render effect, so the render function's reads
    /// are tracked.
    fn render_component(&self, instance: &ComponentInstance<H>) -> Result<()> {
        let state = &instance.state;
        let ctx = ComponentContext::new(state.clone());

        if !state.is_mounted.load(Ordering::SeqCst) {
            call_hooks(state, LifecycleHook::BeforeMount);
            let tree = (instance.render)(&ctx);

            let (container, anchor) = {
                let tree = instance.tree.lock();
                (tree.container.clone(), tree.anchor.clone())
            };
            let subtree = self.patch(None, tree, &container, anchor.as_ref(), Some(state))?;
            instance.tree.lock().subtree = Some(subtree);

            state.is_mounted.store(true, Ordering::SeqCst);
            queue_hooks(state, LifecycleHook::Mounted);
            return Ok(());
        }

        let next = instance.tree.lock().next.take();
        if let Some(next) = next {
            untracked(|| {
                update_props(state, &next);
                // Pre watchers on the new props run before the render.
                flush_pre_flush_cbs(instance.job.get());
            });
        }

        call_hooks(state, LifecycleHook::BeforeUpdate);
        let tree = (instance.render)(&ctx);

        let (old, fallback) = {
            let mut current = instance.tree.lock();
            (current.subtree.take(), current.container.clone())
        };
        let container = old
            .as_ref()
            .and_then(|old| self.first_host_node(old))
            .and_then(|node| self.host(|host| host.parent(&node)))
            .unwrap_or(fallback);

        let subtree = self.patch(old, tree, &container, None, Some(state))?;
        instance.tree.lock().subtree = Some(subtree);

        queue_hooks(state, LifecycleHook::Updated);
        Ok(())
    }

    pub(crate) fn unmount_component(&self, instance: &ComponentInstance<H>, do_remove: bool) {
        let state = &instance.state;
        tracing::debug!(component = state.component.name(), uid = state.uid, "unmounting component");

        call_hooks(state, LifecycleHook::BeforeUnmount);
        instance.stop();

        let subtree = instance.tree.lock().subtree.take();
        if let Some(subtree) = subtree {
            self.unmount(subtree, do_remove);
        }

        state.is_unmounted.store(true, Ordering::SeqCst);
        queue_hooks(state, LifecycleHook::Unmounted);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Arc;

    use parking_lot::Mutex;

    use crate::reactive::{Effect, Reactive};
    use crate::render::component::{Component, ComponentContext};
    use crate::render::inject::{inject_or, provide};
    use crate::render::lifecycle::{
        on_before_mount, on_before_unmount, on_before_update, on_mounted, on_unmounted, on_updated,
    };
    use crate::render::memory::{MemoryHost, NodeId};
    use crate::render::renderer::Renderer;
    use crate::render::vnode::{h, text, VNode};
    use crate::scheduler::{drain, next_tick, reset, watch_effect};

    fn setup() -> (Renderer<MemoryHost>, NodeId) {
        reset();
        let mut host = MemoryHost::new();
        let root = host.create_root();
        (Renderer::new(host), root)
    }

    fn html(renderer: &Renderer<MemoryHost>, root: NodeId) -> String {
        renderer.with_host(|host| host.render_html(root))
    }

    #[test]
    fn failed_update_leaves_no_stale_nodes() {
        let (renderer, root) = setup();
        let state = Reactive::record();
        state.set("broken", false);

        let component = Component::new("Flaky").render({
            let state = state.clone();
            move |_: &ComponentContext| {
                let mut children = vec![h("a")];
                if state.get("broken").is_truthy() {
                    children.push(VNode::teleport("#missing", [h("p")]));
                }
                h("div").with_children(children)
            }
        });
        renderer.render(Some(VNode::component(&component)), &root).unwrap();
        assert_eq!(html(&renderer, root), "<div><a></a></div>");

        // The failure is logged by the update job, not returned.
        state.set("broken", true);
        drain().unwrap();
        assert_eq!(html(&renderer, root), "");

        state.set("broken", false);
        drain().unwrap();
        assert_eq!(html(&renderer, root), "<div><a></a></div>");
    }

    #[test]
    fn failed_mount_stops_the_instance() {
        let (renderer, root) = setup();
        let state = Reactive::record();
        state.set("n", 0);
        let live = Effect::live_count();

        let component = Component::new("Broken").setup({
            let state = state.clone();
            move |_: &ComponentContext| {
                let _watcher = watch_effect({
                    let state = state.clone();
                    move |_| {
                        state.get("n");
                    }
                });
                |_: &ComponentContext| VNode::teleport("#missing", [h("p")])
            }
        });

        assert!(renderer.render(Some(VNode::component(&component)), &root).is_err());
        assert_eq!(html(&renderer, root), "");
        assert_eq!(Effect::live_count(), live);
    }

    #[tokio::test]
    async fn rerenders_once_per_batch() {
        let (renderer, root) = setup();
        let state = Reactive::record();
        state.set("count", 0);
        let renders = Arc::new(AtomicI32::new(0));

        let counter = Component::new("Counter").render({
            let state = state.clone();
            let renders = renders.clone();
            move |_: &ComponentContext| {
                renders.fetch_add(1, Ordering::SeqCst);
                let count = state.get("count").as_i64().unwrap_or_default();
                h("span").with_text(count.to_string())
            }
        });

        renderer.render(Some(VNode::component(&counter)), &root).unwrap();
        assert_eq!(html(&renderer, root), "<span>0</span>");
        assert_eq!(renders.load(Ordering::SeqCst), 1);

        state.set("count", 1);
        state.set("count", 2);
        assert_eq!(html(&renderer, root), "<span>0</span>");

        next_tick().await.unwrap();
        assert_eq!(html(&renderer, root), "<span>2</span>");
        assert_eq!(renders.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn lifecycle_hooks_fire_in_order() {
        let (renderer, root) = setup();
        let state = Reactive::record();
        state.set("n", 0);
        let log: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

        let component = Component::new("Logged").setup({
            let state = state.clone();
            let log = log.clone();
            move |_: &ComponentContext| {
                let push = |label: &'static str| {
                    let log = log.clone();
                    move || log.lock().push(label)
                };
                on_before_mount(push("before_mount"));
                on_mounted(push("mounted"));
                on_before_update(push("before_update"));
                on_updated(push("updated"));
                on_before_unmount(push("before_unmount"));
                on_unmounted(push("unmounted"));

                let state = state.clone();
                let log = log.clone();
                move |_: &ComponentContext| {
                    log.lock().push("render");
                    h("b").with_text(state.get("n").as_i64().unwrap_or_default().to_string())
                }
            }
        });

        renderer.render(Some(VNode::component(&component)), &root).unwrap();
        assert_eq!(*log.lock(), ["before_mount", "render", "mounted"]);

        log.lock().clear();
        state.set("n", 1);
        drain().unwrap();
        assert_eq!(*log.lock(), ["before_update", "render", "updated"]);

        log.lock().clear();
        renderer.render(None, &root).unwrap();
        assert_eq!(*log.lock(), ["before_unmount", "unmounted"]);
    }

    #[test]
    fn child_with_unchanged_props_is_skipped() {
        let (renderer, root) = setup();
        let state = Reactive::record();
        state.set("tick", 0);
        let child_renders = Arc::new(AtomicI32::new(0));

        let child = Component::new("Child").props(["label"]).render({
            let renders = child_renders.clone();
            move |ctx: &ComponentContext| {
                renders.fetch_add(1, Ordering::SeqCst);
                let label = ctx.props().get("label");
                h("i").with_text(label.as_str().unwrap_or_default())
            }
        });
        let parent = Component::new("Parent").render({
            let state = state.clone();
            move |_: &ComponentContext| {
                let tick = state.get("tick").as_i64().unwrap_or_default();
                h("div").with_children([
                    text(tick.to_string()),
                    VNode::component(&child).prop("label", "fixed"),
                ])
            }
        });

        renderer.render(Some(VNode::component(&parent)), &root).unwrap();
        assert_eq!(html(&renderer, root), "<div>0<i>fixed</i></div>");

        state.set("tick", 1);
        drain().unwrap();
        assert_eq!(html(&renderer, root), "<div>1<i>fixed</i></div>");
        assert_eq!(child_renders.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn changed_props_update_the_child() {
        let (renderer, root) = setup();
        let state = Reactive::record();
        state.set("label", "a");

        let child = Component::new("Label")
            .props(["label"])
            .render(|ctx: &ComponentContext| {
                let label = ctx.props().get("label");
                h("p").with_text(label.as_str().unwrap_or_default())
            });
        let parent = Component::new("Parent").render({
            let state = state.clone();
            move |_: &ComponentContext| {
                VNode::component(&child).prop("label", state.get("label"))
            }
        });

        renderer.render(Some(VNode::component(&parent)), &root).unwrap();
        assert_eq!(html(&renderer, root), "<p>a</p>");

        state.set("label", "b");
        drain().unwrap();
        assert_eq!(html(&renderer, root), "<p>b</p>");
    }

    #[test]
    fn undeclared_props_fall_through_to_attrs() {
        let (renderer, root) = setup();
        let card = Component::new("Card")
            .props(["title"])
            .render(|ctx: &ComponentContext| {
                h("section")
                    .prop("role", ctx.attr("role"))
                    .with_text(ctx.get("title").as_str().unwrap_or_default())
            });

        renderer
            .render(
                Some(VNode::component(&card).prop("title", "Hi").prop("role", "note")),
                &root,
            )
            .unwrap();
        assert_eq!(html(&renderer, root), r#"<section role="note">Hi</section>"#);
    }

    #[test]
    fn slots_render_parent_content() {
        let (renderer, root) = setup();
        let frame = Component::new("Frame").render(|ctx: &ComponentContext| {
            h("div").with_children(ctx.slot("default"))
        });

        renderer
            .render(
                Some(VNode::component(&frame).slot("default", |_| vec![h("em").with_text("inside")])),
                &root,
            )
            .unwrap();
        assert_eq!(html(&renderer, root), "<div><em>inside</em></div>");
    }

    #[test]
    fn unmount_stops_watchers_created_in_setup() {
        let (renderer, root) = setup();
        let state = Reactive::record();
        state.set("x", 0);
        let runs = Arc::new(AtomicI32::new(0));

        let component = Component::new("Watching").setup({
            let state = state.clone();
            let runs = runs.clone();
            move |_: &ComponentContext| {
                let state = state.clone();
                let runs = runs.clone();
                let _handle = watch_effect(move |_| {
                    state.get("x");
                    runs.fetch_add(1, Ordering::SeqCst);
                });
                |_: &ComponentContext| h("div")
            }
        });

        renderer.render(Some(VNode::component(&component)), &root).unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        state.set("x", 1);
        drain().unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 2);

        renderer.render(None, &root).unwrap();
        state.set("x", 2);
        drain().unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn provided_values_reach_descendants() {
        let (renderer, root) = setup();

        let leaf = Component::new("Leaf").setup(|_: &ComponentContext| {
            let theme: String = inject_or("theme", String::from("light"));
            move |_: &ComponentContext| h("span").with_text(theme.clone())
        });
        let middle = Component::new("Middle").render(move |_: &ComponentContext| {
            VNode::component(&leaf)
        });
        let app = Component::new("App").setup(move |_: &ComponentContext| {
            provide("theme", String::from("dark"));
            let middle = middle.clone();
            move |_: &ComponentContext| h("main").with_children([VNode::component(&middle)])
        });

        renderer.render(Some(VNode::component(&app)), &root).unwrap();
        assert_eq!(html(&renderer, root), "<main><span>dark</span></main>");
    }
}
