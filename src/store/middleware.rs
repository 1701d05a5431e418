//! Write interception for stores.
//!
//! A [`MiddlewareStore`] runs every write through an ordered pipeline of
//! [`Middleware`] entries:
//!
//! ```text
//! patch ─▶ before_patch[0] ─▶ before_patch[1] ─▶ … ─▶ inner.patch
//!                                                        │
//!          after_patch[0] ◀─ after_patch[1] ◀─ … ◀───────┘ (in order)
//! ```
//!
//! Pre-write hooks chain: each one sees the patch produced by the previous
//! one. Post-write hooks only observe. A hook that fails or panics is logged
//! and skipped; the rest of the pipeline still runs.
//!
//! Pre-write hooks run inside the wrapped store's `update`, so they may read
//! the store but must not write to it. Post-write hooks run after the write
//! has been committed and may write freely.

use super::key::Key;
use super::record::Record;
use super::store::Store;
use super::traits::StateStore;
use crate::error::{BoxError, Error, Result};
use crate::runtime::{isolate, Subscription};
use std::collections::HashSet;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Result type of middleware hooks.
pub type HookResult<T> = std::result::Result<T, BoxError>;

/// A named interceptor around store writes.
///
/// Both hooks are optional; the defaults do nothing.
pub trait Middleware<T: Record>: Send + Sync {
    /// Name used in logs and for duplicate detection.
    fn name(&self) -> &str;

    /// Inspect `patch` before it is applied.
    ///
    /// Return `Ok(Some(replacement))` to change the patch seen by later
    /// entries and finally applied, or `Ok(None)` to leave it as is.
    fn before_patch(&self, state: &T, patch: &T::Patch) -> HookResult<Option<T::Patch>> {
        let _ = (state, patch);
        Ok(None)
    }

    /// Observe a completed write.
    ///
    /// `prev` and `next` are copies; nothing done here reaches the store.
    fn after_patch(&self, prev: &T, next: &T, patch: &T::Patch) -> HookResult<()> {
        let _ = (prev, next, patch);
        Ok(())
    }
}

/// A store whose writes pass through a middleware pipeline.
///
/// Reads and subscriptions go straight to the wrapped store. `set` and
/// `update` are turned into a full patch first, so every write path runs
/// the same pipeline. `reset` only runs the post-write hooks.
pub struct MiddlewareStore<T: Record, S = Store<T>> {
    inner: S,
    pipeline: Arc<[Box<dyn Middleware<T>>]>,
}

impl<T: Record, S: StateStore<T>> MiddlewareStore<T, S> {
    /// Wrap `inner` with `middleware`, run in the given order.
    ///
    /// Fails when a name is empty or used twice.
    pub fn new(inner: S, middleware: Vec<Box<dyn Middleware<T>>>) -> Result<Self> {
        let mut seen = HashSet::new();
        for entry in &middleware {
            let name = entry.name();
            if name.trim().is_empty() {
                return Err(Error::Config("middleware name must not be empty".to_string()));
            }
            if !seen.insert(name.to_string()) {
                return Err(Error::DuplicateMiddleware(name.to_string()));
            }
        }

        tracing::debug!(stages = middleware.len(), "middleware pipeline built");
        Ok(Self {
            inner,
            pipeline: Arc::from(middleware),
        })
    }

    /// The wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Names of the pipeline entries, in order.
    pub fn names(&self) -> Vec<&str> {
        self.pipeline.iter().map(|entry| entry.name()).collect()
    }

    fn run_before(&self, state: &T, patch: T::Patch) -> T::Patch {
        let mut current = patch;
        for entry in self.pipeline.iter() {
            let name = entry.name();
            match isolate("before_patch", || entry.before_patch(state, &current)) {
                Some(Ok(Some(replacement))) => {
                    tracing::trace!(middleware = name, patch = ?replacement, "patch replaced");
                    current = replacement;
                }
                Some(Ok(None)) => {}
                Some(Err(err)) => {
                    tracing::warn!(middleware = name, error = %err, "before_patch failed, skipping");
                }
                None => {
                    tracing::warn!(middleware = name, "before_patch panicked, skipping");
                }
            }
        }
        current
    }

    fn run_after(&self, prev: &T, next: &T, patch: &T::Patch) {
        for entry in self.pipeline.iter() {
            let name = entry.name();
            match isolate("after_patch", || entry.after_patch(prev, next, patch)) {
                Some(Ok(())) => {}
                Some(Err(err)) => {
                    tracing::warn!(middleware = name, error = %err, "after_patch failed");
                }
                None => {
                    tracing::warn!(middleware = name, "after_patch panicked");
                }
            }
        }
    }
}

impl<T: Record, S: StateStore<T>> MiddlewareStore<T, S> {
    /// Run one write through the pipeline as a single `update` of the
    /// wrapped store, then run the post-write hooks.
    ///
    /// `make_patch` and the pre-write hooks see the state the write is
    /// applied to, so concurrent writes cannot slip in between.
    fn write<P>(&self, make_patch: P)
    where
        P: FnOnce(&T) -> T::Patch,
    {
        let _span = tracing::debug_span!("middleware_patch", stages = self.pipeline.len()).entered();
        let mut applied = None;
        self.inner.update(|state| {
            let prev = state.clone();
            let patch = self.run_before(&prev, make_patch(&prev));
            state.apply_patch(patch.clone());
            applied = Some((prev, state.clone(), patch));
        });

        if let Some((prev, next, patch)) = applied {
            self.run_after(&prev, &next, &patch);
        }
    }
}

impl<T: Record, S: StateStore<T>> StateStore<T> for MiddlewareStore<T, S> {
    fn get(&self) -> T {
        self.inner.get()
    }

    fn set(&self, state: T) {
        self.write(|_| state.into_patch());
    }

    fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut T),
    {
        self.write(|prev| {
            let mut next = prev.clone();
            f(&mut next);
            next.into_patch()
        });
    }

    fn patch(&self, patch: T::Patch) {
        self.write(|_| patch);
    }

    fn reset(&self) {
        let _span = tracing::debug_span!("middleware_reset", stages = self.pipeline.len()).entered();
        let prev = self.inner.get();
        self.inner.reset();
        let next = self.inner.get();
        let patch = next.clone().into_patch();
        self.run_after(&prev, &next, &patch);
    }

    fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.inner.subscribe(callback)
    }

    fn select<R, F>(&self, selector: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        self.inner.select(selector)
    }

    fn subscribe_to_key<V, F>(&self, key: Key<T, V>, callback: F) -> Result<Subscription>
    where
        V: 'static,
        F: Fn(&V) + Send + Sync + 'static,
    {
        self.inner.subscribe_to_key(key, callback)
    }
}

impl<T: Record, S: Clone> Clone for MiddlewareStore<T, S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            pipeline: Arc::clone(&self.pipeline),
        }
    }
}

/// Wrap `store` with `middleware`.
///
/// Shorthand for [`MiddlewareStore::new`].
pub fn apply_middleware<T, S>(
    store: S,
    middleware: Vec<Box<dyn Middleware<T>>>,
) -> Result<MiddlewareStore<T, S>>
where
    T: Record,
    S: StateStore<T>,
{
    MiddlewareStore::new(store, middleware)
}

type BeforeHook<T> =
    Box<dyn Fn(&T, &<T as Record>::Patch) -> Option<<T as Record>::Patch> + Send + Sync>;
type AfterHook<T> = Box<dyn Fn(&T, &T, &<T as Record>::Patch) + Send + Sync>;

/// Middleware assembled from closures.
///
/// ```
/// use tincan_store::{record, FnMiddleware, Middleware};
///
/// record! {
///     pub struct Counter => CounterPatch {
///         pub count: i64,
///     }
/// }
///
/// let clamp = FnMiddleware::<Counter>::new("clamp").before(|_, patch| {
///     patch.count.map(|count| CounterPatch { count: Some(count.max(0)) })
/// });
/// assert_eq!(clamp.name(), "clamp");
/// ```
pub struct FnMiddleware<T: Record> {
    name: String,
    before: Option<BeforeHook<T>>,
    after: Option<AfterHook<T>>,
}

impl<T: Record> FnMiddleware<T> {
    /// A middleware with no hooks yet.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            before: None,
            after: None,
        }
    }

    /// Set the pre-write hook.
    pub fn before<F>(mut self, hook: F) -> Self
    where
        F: Fn(&T, &T::Patch) -> Option<T::Patch> + Send + Sync + 'static,
    {
        self.before = Some(Box::new(hook));
        self
    }

    /// Set the post-write hook.
    pub fn after<F>(mut self, hook: F) -> Self
    where
        F: Fn(&T, &T, &T::Patch) + Send + Sync + 'static,
    {
        self.after = Some(Box::new(hook));
        self
    }

    /// Box the middleware for use in a pipeline.
    pub fn boxed(self) -> Box<dyn Middleware<T>> {
        Box::new(self)
    }
}

impl<T: Record> Middleware<T> for FnMiddleware<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn before_patch(&self, state: &T, patch: &T::Patch) -> HookResult<Option<T::Patch>> {
        Ok(self.before.as_ref().and_then(|hook| hook(state, patch)))
    }

    fn after_patch(&self, prev: &T, next: &T, patch: &T::Patch) -> HookResult<()> {
        if let Some(hook) = &self.after {
            hook(prev, next, patch);
        }
        Ok(())
    }
}

impl<T: Record> fmt::Debug for FnMiddleware<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnMiddleware")
            .field("name", &self.name)
            .field("before", &self.before.is_some())
            .field("after", &self.after.is_some())
            .finish()
    }
}

/// Logs every write through `tracing`.
///
/// Patches are logged at `trace` before they are applied; the keys a write
/// changed are logged at `debug` afterwards.
pub struct LoggingMiddleware<T> {
    name: String,
    _record: PhantomData<fn() -> T>,
}

impl<T: Record> LoggingMiddleware<T> {
    /// A logger named `"logger"`.
    pub fn new() -> Self {
        Self::named("logger")
    }

    /// A logger with a custom name, so several can share a pipeline.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            _record: PhantomData,
        }
    }
}

impl<T: Record> Default for LoggingMiddleware<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Record> Middleware<T> for LoggingMiddleware<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn before_patch(&self, _state: &T, patch: &T::Patch) -> HookResult<Option<T::Patch>> {
        tracing::trace!(middleware = %self.name, patch = ?patch, "applying patch");
        Ok(None)
    }

    fn after_patch(&self, prev: &T, next: &T, _patch: &T::Patch) -> HookResult<()> {
        let changed = prev.changed_keys(next);
        tracing::debug!(middleware = %self.name, changed = ?changed, "state written");
        Ok(())
    }
}
