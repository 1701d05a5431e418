//! # Tincan Store
//!
//! Observable state containers for Rust applications.
//!
//! A store holds one structured value and tells subscribers synchronously
//! about every write. Reads hand out independent copies, so nothing outside
//! the store can change its state behind its back.
//!
//! ## Stores
//!
//! - `Store<T>` - state container with whole-state and per-key subscriptions
//! - `MiddlewareStore<T, S>` - runs named hooks before and after every write
//! - `ScopedStore<P, C, S>` - a slice of a parent store, exposed as a store
//!
//! All three implement [`StateStore`], so they nest in any order.
//!
//! ## Messaging
//!
//! - `EventBus` - typed publish/subscribe keyed by event name
//! - `ModalQueue<P, R>` - FIFO of dialog requests with close callbacks
//!
//! ## Example
//!
//! ```
//! use tincan_store::prelude::*;
//!
//! record! {
//!     pub struct Counter => CounterPatch {
//!         pub count: i64,
//!         pub label: String,
//!     }
//! }
//!
//! let store = Store::new(Counter { count: 0, label: "clicks".into() });
//! let count = key!(Counter, count);
//!
//! store
//!     .subscribe_to_key(count, |value| println!("count is now {value}"))
//!     .unwrap();
//!
//! store.patch(CounterPatch { count: Some(5), ..Default::default() });
//! assert_eq!(store.get().count, 5);
//! ```
//!
//! A panicking subscriber, listener or hook never takes the store down with
//! it: the failure is logged through `tracing` and the remaining callbacks
//! still run.

pub mod config;
pub mod error;
pub mod event;
pub mod modal;
pub mod observability;
pub mod runtime;
pub mod store;

// Re-export main types for convenience
pub use config::Config;
pub use error::{BoxError, Error, Result};
pub use event::{Event, EventBus};
pub use modal::{ModalQueue, ModalRequest};
pub use runtime::{ListenerId, Subscription};
pub use store::{
    apply_middleware, FnMiddleware, HookResult, Key, Lens, LoggingMiddleware, Middleware,
    MiddlewareStore, Record, ScopedStore, StateStore, Store,
};

/// Everything needed to declare records and work with stores.
pub mod prelude {
    pub use crate::{
        key, record, Event, EventBus, Key, Middleware, MiddlewareStore, ModalQueue, ModalRequest,
        Record, ScopedStore, StateStore, Store, Subscription,
    };
}
