//! High-level state management with stores.
//!
//! Stores hold a [`Record`] value and notify subscribers on every write.
//! [`Store`] is the base container; [`MiddlewareStore`] intercepts its
//! writes and [`ScopedStore`] exposes a slice of it as a store of its own.
//! All three implement [`StateStore`].

mod key;
mod middleware;
mod record;
mod scoped;
mod store;
mod traits;

pub use key::Key;
pub use middleware::{
    apply_middleware, FnMiddleware, HookResult, LoggingMiddleware, Middleware, MiddlewareStore,
};
pub use record::Record;
pub use scoped::{Lens, ScopedStore};
pub use store::Store;
pub use traits::StateStore;
