//! A small todo list rendered into the in-memory host.
//!
//! Run with `RUST_LOG=ripple_core=debug` to watch mounts, moves and updates.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing_subscriber::EnvFilter;

use ripple_core::reactive::{Reactive, Value};
use ripple_core::render::{
    h, inject_or, on_mounted, provide, Component, ComponentContext, HostOps, MemoryHost, NodeId,
    Renderer, VNode,
};
use ripple_core::scheduler::next_tick;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn add(todos: &Reactive, title: &str) {
    let todo = Value::record([
        ("id", Value::from(NEXT_ID.fetch_add(1, Ordering::Relaxed))),
        ("title", Value::from(title)),
        ("done", Value::from(false)),
    ]);
    todos.set(todos.target().len(), todo);
}

fn remove(todos: &Reactive, index: usize) {
    todos.splice(index, 1, std::iter::empty::<Value>());
}

fn todo_item() -> Component {
    Component::new("TodoItem")
        .props(["title", "done"])
        .setup(|_: &ComponentContext| {
            let marker: String = inject_or("marker", String::from("-"));
            move |ctx: &ComponentContext| {
                let props = ctx.props();
                let done = props.get("done").is_truthy();
                let title = props.get("title");
                h("li")
                    .prop("class", if done { "done" } else { "open" })
                    .with_text(format!("{marker} {}", title.as_str().unwrap_or_default()))
            }
        })
}

fn todo_app(todos: Reactive) -> Component {
    let item = todo_item();
    Component::new("TodoApp").setup(move |_: &ComponentContext| {
        provide("marker", String::from("*"));
        on_mounted(|| tracing::info!("todo app mounted"));

        let todos = todos.clone();
        let item = item.clone();
        move |_: &ComponentContext| {
            let rows = todos.values().into_iter().filter_map(|todo| {
                let todo = todo.as_reactive()?.clone();
                let id = todo.get("id").as_i64()?;
                Some(
                    VNode::component(&item)
                        .key(id)
                        .prop("title", todo.get("title"))
                        .prop("done", todo.get("done")),
                )
            });
            h("main").with_children([
                h("h1").with_text(format!("{} todos", todos.len())),
                h("ul").with_children(rows),
            ])
        }
    })
}

fn report(renderer: &Renderer<MemoryHost>, root: NodeId, step: &str) {
    let (html, ops) = renderer.with_host(|host| (host.render_html(root), host.take_ops()));
    println!("{step}: {} host ops", ops.len());
    println!("  {html}");
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ripple_core::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let todos = Reactive::list();
    for title in ["write docs", "review diff", "ship it"] {
        add(&todos, title);
    }

    let mut host = MemoryHost::new();
    let root = host.create_root();
    let renderer = Renderer::new(host);

    renderer.render(Some(VNode::component(&todo_app(todos.clone()))), &root)?;
    report(&renderer, root, "mounted");

    add(&todos, "celebrate");
    next_tick().await?;
    report(&renderer, root, "added");

    if let Some(first) = todos.get(0).as_reactive() {
        first.set("done", true);
    }
    next_tick().await?;
    report(&renderer, root, "completed first");

    remove(&todos, 1);
    next_tick().await?;
    report(&renderer, root, "removed second");

    renderer.render(None, &root)?;
    let empty = renderer.with_host(|host| !host.has_content(&root));
    println!("unmounted: container empty = {empty}");
    Ok(())
}
