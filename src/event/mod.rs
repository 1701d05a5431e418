//! Typed publish/subscribe for cross-cutting notifications.
//!
//! The [`EventBus`] carries events between modules that share no state;
//! it stores nothing beyond the listeners currently registered.

mod bus;

pub use bus::{Event, EventBus};
