use super::key::{Key, KeyRegistry};
use super::record::Record;
use super::traits::StateStore;
use crate::error::Result;
use crate::runtime::{deliver, isolate, Dispatcher, Listener, Registry, Subscription};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A store for managing application state, shareable across threads.
///
/// The store owns one record value and the snapshot it was created with.
/// Whole-state subscribers hear about every write; key subscribers only
/// about writes that change their key. Subscribers that panic are logged
/// and skipped without affecting the others or the stored state.
///
/// Writes are applied one at a time and notifications go out in the order
/// the writes were applied. A write made from inside a callback is applied
/// at once, but its notification waits until the pass in progress has
/// reached every listener.
///
/// Cloning a `Store` yields another handle to the same state.
pub struct Store<T: Record> {
    state: Arc<RwLock<T>>,
    writer: Arc<Mutex<()>>,
    initial: Arc<T>,
    subscribers: Registry<T>,
    key_subscribers: KeyRegistry<T>,
    dispatcher: Dispatcher,
}

impl<T: Record> Store<T> {
    /// Create a new store with the given initial state.
    pub fn new(initial: T) -> Self {
        Self {
            state: Arc::new(RwLock::new(initial.clone())),
            writer: Arc::new(Mutex::new(())),
            initial: Arc::new(initial),
            subscribers: Registry::new(),
            key_subscribers: KeyRegistry::new(),
            dispatcher: Dispatcher::new(),
        }
    }

    fn read_state(&self) -> RwLockReadGuard<'_, T> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, T> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Get a clone of the current state.
    pub fn get(&self) -> T {
        self.read_state().clone()
    }

    /// Set a new state value.
    pub fn set(&self, new_state: T) {
        self.commit(|state| *state = new_state);
    }

    /// Update the state using a function.
    ///
    /// `f` works on a copy; the copy becomes the new state once `f` returns.
    /// No other write can land in between, so concurrent updates are never
    /// lost. `f` may read the store but must not write to it.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut T),
    {
        self.commit(f);
    }

    /// Shallow-merge `patch` into the current state.
    pub fn patch(&self, patch: T::Patch) {
        self.commit(|state| state.apply_patch(patch));
    }

    /// Restore the state the store was created with.
    pub fn reset(&self) {
        let initial = T::clone(&self.initial);
        self.commit(|state| *state = initial);
    }

    /// Subscribe to state changes.
    ///
    /// The callback is called right away with the current state, then after
    /// every write.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let callback: Listener<T> = Arc::new(callback);
        let (subscription, current) = {
            let state = self.read_state();
            (self.subscribers.insert(Arc::clone(&callback)), state.clone())
        };
        isolate("subscribe", || callback(&current));
        subscription
    }

    /// Read a value derived from a copy of the state.
    pub fn select<R, F>(&self, selector: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        selector(&self.get())
    }

    /// Subscribe to changes of a single top-level key.
    ///
    /// Fails with [`Error::UnknownKey`](crate::Error::UnknownKey) when the
    /// key does not belong to `T`.
    pub fn subscribe_to_key<V, F>(&self, key: Key<T, V>, callback: F) -> Result<Subscription>
    where
        V: 'static,
        F: Fn(&V) + Send + Sync + 'static,
    {
        let (subscription, listener, current) = {
            let state = self.read_state();
            let (subscription, listener) = self.key_subscribers.register(key, callback)?;
            (subscription, listener, state.clone())
        };
        isolate("subscribe_to_key", || listener(&current));
        Ok(subscription)
    }

    /// Number of whole-state subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Apply one write and deliver every pass queued so far.
    ///
    /// The writer lock spans read, `write` and install; it is released
    /// before any listener runs.
    fn commit<F>(&self, write: F)
    where
        F: FnOnce(&mut T),
    {
        {
            let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
            let mut next = self.get();
            write(&mut next);
            self.install(next);
        }
        self.dispatcher.drain();
    }

    /// Swap in `next` and queue its notification pass.
    ///
    /// Listeners are captured under the state lock, so a listener added
    /// after this write never receives it.
    fn install(&self, next: T) {
        let mut state = self.write_state();
        let prev = std::mem::replace(&mut *state, next.clone());
        let changed = prev.changed_keys(&next);
        let subscribers = self.subscribers.snapshot();
        let key_subscribers = self.key_subscribers.snapshot(&changed);

        self.dispatcher.enqueue(move || {
            tracing::trace!(changed = ?changed, "store updated");
            deliver(&subscribers, &next, "subscribe");
            deliver(&key_subscribers, &next, "subscribe_to_key");
        });
    }
}

impl<T: Record> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            writer: Arc::clone(&self.writer),
            initial: Arc::clone(&self.initial),
            subscribers: self.subscribers.clone(),
            key_subscribers: self.key_subscribers.clone(),
            dispatcher: self.dispatcher.clone(),
        }
    }
}

impl<T: Record> StateStore<T> for Store<T> {
    fn get(&self) -> T {
        Store::get(self)
    }

    fn set(&self, state: T) {
        Store::set(self, state);
    }

    fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut T),
    {
        Store::update(self, f);
    }

    fn patch(&self, patch: T::Patch) {
        Store::patch(self, patch);
    }

    fn reset(&self) {
        Store::reset(self);
    }

    fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        Store::subscribe(self, callback)
    }

    fn select<R, F>(&self, selector: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        Store::select(self, selector)
    }

    fn subscribe_to_key<V, F>(&self, key: Key<T, V>, callback: F) -> Result<Subscription>
    where
        V: 'static,
        F: Fn(&V) + Send + Sync + 'static,
    {
        Store::subscribe_to_key(self, key, callback)
    }
}
