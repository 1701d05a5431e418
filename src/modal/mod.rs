//! Sequential dialog queue.
//!
//! Requests are shown one at a time in the order they were pushed. Closing
//! the active request hands its result to the request's close callback and
//! promotes the next one.

mod queue;

pub use queue::{ModalQueue, ModalRequest};
