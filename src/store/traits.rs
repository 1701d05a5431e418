use super::key::Key;
use super::record::Record;
use super::scoped::ScopedStore;
use crate::error::Result;
use crate::runtime::Subscription;

/// The common contract of every observable store.
///
/// [`Store`](super::Store), [`MiddlewareStore`](super::MiddlewareStore) and
/// [`ScopedStore`] all implement it, so wrappers compose freely: a scope
/// over a middleware-wrapped store, middleware over a scope, and so on.
///
/// Every read hands out an independent copy of the state. Every write
/// notifies subscribers synchronously, in the order writes were applied.
pub trait StateStore<T: Record>: Clone + Send + Sync + 'static {
    /// An independent copy of the current state.
    fn get(&self) -> T;

    /// Replace the whole state.
    fn set(&self, state: T);

    /// Mutate a copy of the current state and install it.
    ///
    /// The default reads with `get` and writes with `set`, so a write from
    /// another thread can land in between. The stores in this crate
    /// override it to run as one write: no other write is applied between
    /// the read and the install. `f` may read the store but must not write
    /// to it.
    fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut T),
    {
        let mut next = self.get();
        f(&mut next);
        self.set(next);
    }

    /// Shallow-merge `patch` into the current state.
    fn patch(&self, patch: T::Patch);

    /// Restore the state captured when the store was created.
    fn reset(&self);

    /// Register `callback` for every write.
    ///
    /// The callback runs once immediately with the current state.
    fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static;

    /// Compute a value from a copy of the current state.
    fn select<R, F>(&self, selector: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        selector(&self.get())
    }

    /// Register `callback` for changes of a single key.
    ///
    /// The callback runs once immediately with the key's current value, then
    /// only after writes that change that key.
    fn subscribe_to_key<V, F>(&self, key: Key<T, V>, callback: F) -> Result<Subscription>
    where
        V: 'static,
        F: Fn(&V) + Send + Sync + 'static;

    /// Derive a store bound to a slice of this one.
    ///
    /// See [`ScopedStore::new`].
    fn scope<C, Sel, Mer>(&self, select: Sel, merge: Mer) -> ScopedStore<T, C, Self>
    where
        C: Record,
        Sel: Fn(&T) -> C + Send + Sync + 'static,
        Mer: Fn(T, C) -> T + Send + Sync + 'static,
    {
        ScopedStore::new(self.clone(), select, merge)
    }
}
