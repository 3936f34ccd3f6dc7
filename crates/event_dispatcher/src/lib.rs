//! # Event Dispatcher
//!
//! An in-process publish/subscribe event bus with polymorphic message
//! matching, composable dispatchers and pooled, allocation-free messages.
//!
//! ## Key Features
//!
//! - **Polymorphic Matching**: a listener registered for a category receives
//!   every message whose type satisfies it, whether the category is the type
//!   itself, a trait object it declares or a base message it embeds
//! - **Dispatcher Graphs**: dispatchers forward to each other along arbitrary
//!   (even cyclic) edges; every publish reaches each dispatcher at most once
//!   and always ends on the hub's global dispatcher
//! - **Pooled Messages**: scoped messages are borrowed from a per-type free
//!   list and published when the scope ends, without touching the heap once
//!   the pool is warm
//! - **Re-entrancy**: listeners may subscribe, unsubscribe, publish and
//!   rewire the graph while a publish is in progress
//!
//! ## Architecture
//!
//! - **DispatchHub**: arena owning the dispatchers, the type registry and the
//!   message pool
//! - **Dispatcher**: handle used to subscribe, publish and add forward edges
//! - **TypeRegistry**: memoized answers to "does type `M` satisfy `C`?"
//! - **MessagePool** / **ScopedMessage**: recycled message instances
//!
//! Everything is single-threaded: hubs and handles are `!Send`.
//!
//! ## Usage Examples
//!
//! ```rust
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use event_dispatcher::{Categories, DispatchHub, Message};
//!
//! trait Shape {
//!     fn sides(&self) -> u32;
//! }
//!
//! struct Triangle;
//! impl Shape for Triangle {
//!     fn sides(&self) -> u32 {
//!         3
//!     }
//! }
//! impl Message for Triangle {
//!     fn describe(categories: &mut Categories<Self>) {
//!         categories.implements::<dyn Shape>(|triangle| triangle);
//!     }
//! }
//!
//! let hub = DispatchHub::new();
//! let scene = hub.create("scene");
//! let hud = hub.create("hud");
//! scene.add_forward(&hud)?;
//!
//! let sides = Rc::new(Cell::new(0));
//! let seen = Rc::clone(&sides);
//! hud.subscribe::<dyn Shape, _>(move |shape| {
//!     seen.set(seen.get() + shape.sides());
//!     Ok(())
//! })?;
//!
//! scene.publish(&Triangle)?;
//! assert_eq!(sides.get(), 3);
//! # Ok::<(), event_dispatcher::EventError>(())
//! ```

mod cache;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod hub;
pub mod macros;
pub mod message;
mod node;
pub mod pool;
mod propagation;
pub mod registry;
pub mod stats;
mod table;

// Re-exports for convenience
pub use config::HubConfig;
pub use dispatcher::{Dispatcher, WeakDispatcher};
pub use error::EventError;
pub use hub::DispatchHub;
pub use message::{Categories, Message};
pub use node::NodeId;
pub use pool::{MessagePool, Pooled, ScopedMessage};
pub use registry::TypeRegistry;
pub use stats::{DispatcherStats, HubStats};
pub use table::{ListenerFn, ListenerId};

/// Crate version
pub const EVENT_DISPATCHER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, EventError>;
