//! Stores bound to a slice of a parent store.
//!
//! A [`ScopedStore`] projects a child record out of its parent through a
//! [`Lens`] and keeps the two in sync:
//!
//! - parent writes are re-projected, and scope subscribers are only told
//!   when a key of the projection actually changed;
//! - scope writes are merged back into the parent as one whole-state write
//!   (the parent's `update`, so no other parent write can slip between the
//!   read and the merge), and reach scope subscribers through the parent's
//!   notification.
//!
//! There is no second notification path, so a scope never reports a change
//! its parent did not make, and scope notifications keep the parent's write
//! order.

use super::key::{Key, KeyRegistry};
use super::record::Record;
use super::store::Store;
use super::traits::StateStore;
use crate::error::Result;
use crate::runtime::{deliver, isolate, Listener, Registry, Subscription};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard};

type SelectFn<P, C> = Arc<dyn Fn(&P) -> C + Send + Sync>;
type MergeFn<P, C> = Arc<dyn Fn(P, C) -> P + Send + Sync>;

/// A `select`/`merge` pair describing where a child lives inside a parent.
///
/// `merge(parent, select(&parent))` should give back an equivalent parent.
pub struct Lens<P, C> {
    select: SelectFn<P, C>,
    merge: MergeFn<P, C>,
}

impl<P, C> Lens<P, C> {
    /// Build a lens from its two projections.
    pub fn new<Sel, Mer>(select: Sel, merge: Mer) -> Self
    where
        Sel: Fn(&P) -> C + Send + Sync + 'static,
        Mer: Fn(P, C) -> P + Send + Sync + 'static,
    {
        Self {
            select: Arc::new(select),
            merge: Arc::new(merge),
        }
    }

    /// Extract the child from `parent`.
    pub fn select(&self, parent: &P) -> C {
        (self.select)(parent)
    }

    /// Write `child` back into `parent`.
    pub fn merge(&self, parent: P, child: C) -> P {
        (self.merge)(parent, child)
    }
}

impl<P, C> Clone for Lens<P, C> {
    fn clone(&self) -> Self {
        Self {
            select: Arc::clone(&self.select),
            merge: Arc::clone(&self.merge),
        }
    }
}

impl<P, C> fmt::Debug for Lens<P, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lens").finish_non_exhaustive()
    }
}

struct ScopeShared<P, C: Record> {
    lens: Lens<P, C>,
    initial: C,
    last: RwLock<C>,
    subscribers: Registry<C>,
    key_subscribers: KeyRegistry<C>,
    parent_subscription: Mutex<Option<Subscription>>,
}

impl<P, C: Record> ScopeShared<P, C> {
    /// Re-project a parent notification.
    ///
    /// Parent notifications arrive in write order, so `parent_state` is
    /// always newer than `last`.
    fn propagate(&self, parent_state: &P) {
        let current = self.lens.select(parent_state);
        let (changed, subscribers, key_subscribers) = {
            let mut last = self.last.write().unwrap_or_else(PoisonError::into_inner);
            let changed = last.changed_keys(&current);
            if changed.is_empty() {
                return;
            }
            *last = current.clone();
            let key_subscribers = self.key_subscribers.snapshot(&changed);
            (changed, self.subscribers.snapshot(), key_subscribers)
        };

        tracing::trace!(changed = ?changed, "scoped projection changed");
        deliver(&subscribers, &current, "scoped_subscribe");
        deliver(&key_subscribers, &current, "scoped_subscribe_to_key");
    }

    /// The projection as of the last parent notification.
    fn last(&self) -> RwLockReadGuard<'_, C> {
        self.last.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<P, C: Record> Drop for ScopeShared<P, C> {
    fn drop(&mut self) {
        let subscription = self
            .parent_subscription
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(subscription) = subscription {
            subscription.unsubscribe();
        }
    }
}

/// A store over a projection of a parent store.
///
/// Holds one subscription on the parent for as long as any clone of the
/// scope is alive.
pub struct ScopedStore<P: Record, C: Record, S = Store<P>> {
    parent: S,
    shared: Arc<ScopeShared<P, C>>,
}

impl<P, C, S> ScopedStore<P, C, S>
where
    P: Record,
    C: Record,
    S: StateStore<P>,
{
    /// Bind a new scope to `parent`.
    ///
    /// The projection of the parent's current state becomes the scope's
    /// reset snapshot.
    pub fn new<Sel, Mer>(parent: S, select: Sel, merge: Mer) -> Self
    where
        Sel: Fn(&P) -> C + Send + Sync + 'static,
        Mer: Fn(P, C) -> P + Send + Sync + 'static,
    {
        Self::with_lens(parent, Lens::new(select, merge))
    }

    /// Bind a new scope to `parent` through an existing lens.
    pub fn with_lens(parent: S, lens: Lens<P, C>) -> Self {
        let initial = lens.select(&parent.get());
        let shared = Arc::new(ScopeShared {
            lens,
            last: RwLock::new(initial.clone()),
            initial,
            subscribers: Registry::new(),
            key_subscribers: KeyRegistry::new(),
            parent_subscription: Mutex::new(None),
        });

        let weak = Arc::downgrade(&shared);
        let subscription = parent.subscribe(move |parent_state: &P| {
            if let Some(shared) = weak.upgrade() {
                shared.propagate(parent_state);
            }
        });
        *shared
            .parent_subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(subscription);

        tracing::debug!(
            parent = std::any::type_name::<P>(),
            child = std::any::type_name::<C>(),
            "scope created"
        );
        Self { parent, shared }
    }

    /// The parent store.
    pub fn parent(&self) -> &S {
        &self.parent
    }

    /// The projection captured when the scope was created.
    pub fn initial(&self) -> C {
        self.shared.initial.clone()
    }

    /// Number of whole-state subscribers of this scope.
    pub fn subscriber_count(&self) -> usize {
        self.shared.subscribers.len()
    }
}

impl<P, C, S> StateStore<C> for ScopedStore<P, C, S>
where
    P: Record,
    C: Record,
    S: StateStore<P>,
{
    fn get(&self) -> C {
        self.shared.lens.select(&self.parent.get())
    }

    fn set(&self, state: C) {
        let lens = &self.shared.lens;
        self.parent
            .update(|parent| *parent = lens.merge(parent.clone(), state));
    }

    fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut C),
    {
        let lens = &self.shared.lens;
        self.parent.update(|parent| {
            let mut child = lens.select(parent);
            f(&mut child);
            *parent = lens.merge(parent.clone(), child);
        });
    }

    fn patch(&self, patch: C::Patch) {
        self.update(|child| child.apply_patch(patch));
    }

    fn reset(&self) {
        self.set(self.shared.initial.clone());
    }

    /// Register `callback` for changes of the projection.
    ///
    /// The immediate call receives the projection as of the last parent
    /// notification, so a subscriber added from inside a callback never
    /// sees a value older than its first one.
    fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&C) + Send + Sync + 'static,
    {
        let callback: Listener<C> = Arc::new(callback);
        let (subscription, current) = {
            let last = self.shared.last();
            (self.shared.subscribers.insert(Arc::clone(&callback)), last.clone())
        };
        isolate("scoped_subscribe", || callback(&current));
        subscription
    }

    fn subscribe_to_key<V, F>(&self, key: Key<C, V>, callback: F) -> Result<Subscription>
    where
        V: 'static,
        F: Fn(&V) + Send + Sync + 'static,
    {
        let (subscription, listener, current) = {
            let last = self.shared.last();
            let (subscription, listener) = self.shared.key_subscribers.register(key, callback)?;
            (subscription, listener, last.clone())
        };
        isolate("scoped_subscribe_to_key", || listener(&current));
        Ok(subscription)
    }
}

impl<P: Record, C: Record, S: Clone> Clone for ScopedStore<P, C, S> {
    fn clone(&self) -> Self {
        Self {
            parent: self.parent.clone(),
            shared: Arc::clone(&self.shared),
        }
    }
}
