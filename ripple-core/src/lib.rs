//! Ripple Core
//!
//! This crate provides the core runtime for the Ripple reactive UI framework.
//! It implements:
//!
//! - Reactive state (wrapped containers, signals, memos, effects)
//! - A job scheduler that batches and orders effect re-runs
//! - Virtual nodes, a keyed-list reconciler and components
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Wrapped containers and dependency tracking
//! - `scheduler`: Pre/render/post job queues and watchers
//! - `render`: Virtual nodes, the renderer and components
//! - `config`: Runtime configuration
//! - `error`: The crate's error type
//!
//! # Example
//!
//! ```rust,ignore
//! use ripple_core::reactive::Reactive;
//! use ripple_core::render::{h, Component, ComponentContext, MemoryHost, Renderer, VNode};
//! use ripple_core::scheduler::next_tick;
//!
//! let state = Reactive::record();
//! state.set("count", 0);
//!
//! let counter = Component::new("Counter").render({
//!     let state = state.clone();
//!     move |_: &ComponentContext| {
//!         let count = state.get("count").as_i64().unwrap_or(0);
//!         h("span").with_text(count.to_string())
//!     }
//! });
//!
//! let mut host = MemoryHost::new();
//! let root = host.create_root();
//! let renderer = Renderer::new(host);
//! renderer.render(Some(VNode::component(&counter)), &root)?;
//!
//! state.set("count", 1);
//! next_tick().await?;
//! // <span>1</span>
//! ```

pub mod config;
pub mod error;
pub mod reactive;
pub mod render;
pub mod scheduler;

pub use config::RuntimeConfig;
pub use error::{Error, Result};
