//! Runtime support shared by every observable primitive.
//!
//! This module provides listener registries with snapshot-safe notification,
//! subscription handles, ordered delivery of notification passes, and panic
//! isolation for user callbacks.

mod dispatch;
mod isolate;
mod registry;

pub(crate) use dispatch::Dispatcher;
pub(crate) use isolate::isolate;
pub(crate) use registry::{deliver, Listener, Registry};
pub use registry::{ListenerId, Subscription};
