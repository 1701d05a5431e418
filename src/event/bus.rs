use crate::runtime::{ListenerId, Registry, Subscription};
use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// An event that can travel over an [`EventBus`].
///
/// The event type is its own payload; `NAME` is the channel it is published
/// on.
///
/// ```
/// use tincan_store::Event;
///
/// struct LevelCompleted {
///     level: u32,
/// }
///
/// impl Event for LevelCompleted {
///     const NAME: &'static str = "level-completed";
/// }
/// ```
pub trait Event: Send + Sync + 'static {
    /// Channel name.
    const NAME: &'static str;
}

type Payload = dyn Any + Send + Sync;

/// Synchronous, typed publish/subscribe channel keyed by event name.
///
/// Every bus owns its own registry; clones share it.
///
/// Listeners are identified by the [`ListenerId`] of the [`Subscription`]
/// returned when they were added, never by the callback itself. The same
/// closure registered twice is two listeners, and removing one leaves the
/// other in place.
#[derive(Clone, Default)]
pub struct EventBus {
    channels: Arc<Mutex<HashMap<&'static str, Registry<Payload>>>>,
}

impl EventBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<&'static str, Registry<Payload>>> {
        self.channels.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn channel(&self, name: &'static str) -> Registry<Payload> {
        self.lock().entry(name).or_default().clone()
    }

    fn existing(&self, name: &'static str) -> Option<Registry<Payload>> {
        self.lock().get(name).cloned()
    }

    /// Listen for every `E` emitted from now on.
    pub fn on<E, F>(&self, callback: F) -> Subscription
    where
        E: Event,
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.channel(E::NAME).insert(typed::<E, F>(callback))
    }

    /// Listen for the next `E` only.
    ///
    /// The listener removes itself before `callback` runs. Unsubscribing
    /// through the returned handle before any emit cancels it.
    pub fn once<E, F>(&self, callback: F) -> Subscription
    where
        E: Event,
        F: Fn(&E) + Send + Sync + 'static,
    {
        let channel = self.channel(E::NAME);
        let id = channel.reserve();
        let own = channel.handle(id);
        let fired = AtomicBool::new(false);

        channel.insert_with_id(
            id,
            typed(move |event: &E| {
                if fired.swap(true, Ordering::SeqCst) {
                    return;
                }
                own.unsubscribe();
                callback(event);
            }),
        )
    }

    /// Remove the `E` listener registered under `id`.
    ///
    /// `id` comes from [`Subscription::id`]; the callback is not compared.
    /// Returns `false`, without error, if there was none.
    pub fn off<E: Event>(&self, id: ListenerId) -> bool {
        self.existing(E::NAME)
            .is_some_and(|channel| channel.remove(id))
    }

    /// Deliver `event` to its listeners, in registration order.
    ///
    /// Listeners registered or removed while the emit is running do not
    /// change who receives this event. A panicking listener is logged and
    /// skipped.
    pub fn emit<E: Event>(&self, event: &E) {
        let Some(channel) = self.existing(E::NAME) else {
            tracing::trace!(event = E::NAME, "emit without listeners");
            return;
        };
        let _span = tracing::debug_span!("emit", event = E::NAME).entered();
        let payload: &Payload = event;
        channel.notify(payload, "event_listener");
    }

    /// Number of listeners currently registered for `E`.
    pub fn listener_count<E: Event>(&self) -> usize {
        self.existing(E::NAME).map_or(0, |channel| channel.len())
    }

    /// Remove every listener of every event.
    pub fn clear(&self) {
        let channels: Vec<_> = self.lock().drain().map(|(_, channel)| channel).collect();
        for channel in channels {
            channel.clear();
        }
    }
}

fn typed<E, F>(callback: F) -> Arc<dyn Fn(&Payload) + Send + Sync>
where
    E: Event,
    F: Fn(&E) + Send + Sync + 'static,
{
    Arc::new(move |payload: &Payload| match payload.downcast_ref::<E>() {
        Some(event) => callback(event),
        None => tracing::warn!(event = E::NAME, "payload type mismatch, listener skipped"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[derive(Debug, PartialEq)]
    struct Scored {
        points: u32,
    }

    impl Event for Scored {
        const NAME: &'static str = "scored";
    }

    struct Paused;

    impl Event for Paused {
        const NAME: &'static str = "paused";
    }

    fn recorder(bus: &EventBus) -> Arc<Mutex<Vec<u32>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        bus.on(move |event: &Scored| sink.lock().unwrap().push(event.points));
        seen
    }

    #[test]
    fn emit_reaches_listeners_of_that_event_only() {
        let bus = EventBus::new();
        let seen = recorder(&bus);
        let paused = Arc::new(AtomicUsize::new(0));
        let counter = paused.clone();
        bus.on(move |_: &Paused| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        bus.emit(&Scored { points: 3 });

        assert_eq!(*seen.lock().unwrap(), vec![3]);
        assert_eq!(paused.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn listeners_run_in_registration_order() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        for tag in 1..=3 {
            let log = log.clone();
            bus.on(move |_: &Paused| log.lock().unwrap().push(tag));
        }

        bus.emit(&Paused);
        assert_eq!(*log.lock().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn unsubscribe_and_off_remove_listeners() {
        let bus = EventBus::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let first = calls.clone();
        let a = bus.on(move |_: &Paused| {
            first.fetch_add(1, Ordering::SeqCst);
        });
        let second = calls.clone();
        let b = bus.on(move |_: &Paused| {
            second.fetch_add(1, Ordering::SeqCst);
        });

        assert!(a.unsubscribe());
        assert!(bus.off::<Paused>(b.id()));
        assert!(!bus.off::<Paused>(b.id()));
        assert!(!bus.off::<Scored>(b.id()));

        bus.emit(&Paused);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(bus.listener_count::<Paused>(), 0);
    }

    #[test]
    fn off_removes_by_id_not_by_callback() {
        let bus = EventBus::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let callback = Arc::new(move |_: &Paused| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let shared = callback.clone();
        let first = bus.on(move |event: &Paused| shared(event));
        let shared = callback.clone();
        bus.on(move |event: &Paused| shared(event));
        assert_eq!(bus.listener_count::<Paused>(), 2);

        assert!(bus.off::<Paused>(first.id()));
        bus.emit(&Paused);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(bus.listener_count::<Paused>(), 1);
    }

    #[test]
    fn once_fires_a_single_time_with_the_first_payload() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        bus.once(move |event: &Scored| sink.lock().unwrap().push(event.points));

        bus.emit(&Scored { points: 1 });
        bus.emit(&Scored { points: 2 });

        assert_eq!(*seen.lock().unwrap(), vec![1]);
        assert_eq!(bus.listener_count::<Scored>(), 0);
    }

    #[test]
    fn once_can_be_cancelled_before_it_fires() {
        let bus = EventBus::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let subscription = bus.once(move |_: &Paused| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(subscription.unsubscribe());
        bus.emit(&Paused);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn once_survives_reentrant_emits() {
        let bus = EventBus::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let inner = bus.clone();
        bus.once(move |_: &Paused| {
            counter.fetch_add(1, Ordering::SeqCst);
            inner.emit(&Paused);
        });

        bus.emit(&Paused);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsubscribing_during_emit_uses_the_snapshot() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let later: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        let first_log = log.clone();
        let target = later.clone();
        bus.on(move |_: &Paused| {
            first_log.lock().unwrap().push("first");
            if let Some(subscription) = target.lock().unwrap().as_ref() {
                subscription.unsubscribe();
            }
        });
        let second_log = log.clone();
        let second = bus.on(move |_: &Paused| second_log.lock().unwrap().push("second"));
        *later.lock().unwrap() = Some(second);

        bus.emit(&Paused);
        bus.emit(&Paused);

        assert_eq!(*log.lock().unwrap(), vec!["first", "second", "first"]);
    }

    #[test]
    fn panicking_listener_does_not_block_the_rest() {
        let bus = EventBus::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let first = calls.clone();
        bus.on(move |_: &Paused| {
            first.fetch_add(1, Ordering::SeqCst);
        });
        bus.on(|_: &Paused| panic!("listener failure"));
        let third = calls.clone();
        bus.on(move |_: &Paused| {
            third.fetch_add(1, Ordering::SeqCst);
        });

        bus.emit(&Paused);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn buses_are_isolated() {
        let left = EventBus::new();
        let right = EventBus::new();
        let seen = recorder(&left);

        right.emit(&Scored { points: 9 });
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(right.listener_count::<Scored>(), 0);
    }

    #[test]
    fn clear_drops_every_listener() {
        let bus = EventBus::new();
        let seen = recorder(&bus);
        let subscription = bus.on(|_: &Paused| {});

        bus.clear();
        bus.emit(&Scored { points: 1 });

        assert!(seen.lock().unwrap().is_empty());
        assert!(!subscription.is_active());
    }

    #[test]
    fn mismatched_payload_types_are_skipped() {
        struct Impostor;

        impl Event for Impostor {
            const NAME: &'static str = "scored";
        }

        let bus = EventBus::new();
        let seen = recorder(&bus);
        bus.emit(&Impostor);
        assert!(seen.lock().unwrap().is_empty());
    }
}
