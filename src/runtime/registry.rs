use super::isolate::isolate;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// Identifier of a registered listener, unique within one registry.
pub type ListenerId = u64;

pub(crate) type Listener<A> = Arc<dyn Fn(&A) + Send + Sync>;

struct Slots<A: ?Sized> {
    next_id: ListenerId,
    // Kept in registration order.
    entries: Vec<(ListenerId, Listener<A>)>,
}

/// Ordered set of listeners receiving `&A`.
///
/// Notification always iterates a snapshot taken before the first call, and
/// no lock is held while a listener runs. A listener may therefore subscribe,
/// unsubscribe or trigger a nested notification without deadlocking or
/// disturbing the pass in progress.
pub(crate) struct Registry<A: ?Sized> {
    slots: Arc<Mutex<Slots<A>>>,
}

impl<A: ?Sized + 'static> Registry<A> {
    pub(crate) fn new() -> Self {
        Self {
            slots: Arc::new(Mutex::new(Slots {
                next_id: 0,
                entries: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slots<A>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Allocate an id without registering anything yet.
    ///
    /// Used by listeners that need their own handle before they exist.
    pub(crate) fn reserve(&self) -> ListenerId {
        let mut slots = self.lock();
        let id = slots.next_id;
        slots.next_id += 1;
        id
    }

    pub(crate) fn insert(&self, listener: Listener<A>) -> Subscription {
        let id = self.reserve();
        self.insert_with_id(id, listener)
    }

    pub(crate) fn insert_with_id(&self, id: ListenerId, listener: Listener<A>) -> Subscription {
        self.lock().entries.push((id, listener));
        self.handle(id)
    }

    /// A handle for `id`, whether or not it is currently registered.
    pub(crate) fn handle(&self, id: ListenerId) -> Subscription {
        let weak = Arc::downgrade(&self.slots);
        let owner: Weak<dyn Detach> = weak;
        Subscription { id, owner }
    }

    pub(crate) fn remove(&self, id: ListenerId) -> bool {
        self.slots.detach(id)
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub(crate) fn clear(&self) {
        self.lock().entries.clear();
    }

    pub(crate) fn snapshot(&self) -> Vec<Listener<A>> {
        self.lock()
            .entries
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect()
    }

    /// Call every listener registered at the time of the call.
    pub(crate) fn notify(&self, arg: &A, context: &'static str) {
        deliver(&self.snapshot(), arg, context);
    }
}

/// Call each of `listeners` in order, isolating panics.
pub(crate) fn deliver<A: ?Sized>(listeners: &[Listener<A>], arg: &A, context: &'static str) {
    tracing::trace!(context, listeners = listeners.len(), "notifying");
    for listener in listeners {
        isolate(context, || listener(arg));
    }
}

impl<A: ?Sized> Clone for Registry<A> {
    fn clone(&self) -> Self {
        Self {
            slots: Arc::clone(&self.slots),
        }
    }
}

impl<A: ?Sized + 'static> Default for Registry<A> {
    fn default() -> Self {
        Self::new()
    }
}

trait Detach: Send + Sync {
    fn detach(&self, id: ListenerId) -> bool;
    fn contains(&self, id: ListenerId) -> bool;
}

impl<A: ?Sized> Detach for Mutex<Slots<A>> {
    fn detach(&self, id: ListenerId) -> bool {
        let mut slots = self.lock().unwrap_or_else(PoisonError::into_inner);
        let before = slots.entries.len();
        slots.entries.retain(|(entry_id, _)| *entry_id != id);
        slots.entries.len() != before
    }

    fn contains(&self, id: ListenerId) -> bool {
        let slots = self.lock().unwrap_or_else(PoisonError::into_inner);
        slots.entries.iter().any(|(entry_id, _)| *entry_id == id)
    }
}

/// Handle returned by every `subscribe`-style call.
///
/// Dropping the handle does *not* unsubscribe: a listener stays registered
/// until [`Subscription::unsubscribe`] is called or its owner is dropped.
/// Handles are cheap to clone and only weakly reference their registry.
#[derive(Clone)]
pub struct Subscription {
    id: ListenerId,
    owner: Weak<dyn Detach>,
}

impl Subscription {
    /// The listener id this handle refers to.
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Remove the listener.
    ///
    /// Takes effect for every notification that starts afterwards, including
    /// when called from inside a listener. Returns `false` if the listener was
    /// already removed or its owner no longer exists. Calling it again is a
    /// no-op.
    pub fn unsubscribe(&self) -> bool {
        match self.owner.upgrade() {
            Some(owner) => owner.detach(self.id),
            None => false,
        }
    }

    /// Whether the owning registry still holds this listener.
    pub fn is_active(&self) -> bool {
        self.owner
            .upgrade()
            .is_some_and(|owner| owner.contains(self.id))
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
