use crate::runtime::{deliver, isolate, Dispatcher, Registry, Subscription};
use serde_json::Value;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type OnClose<R> = Arc<dyn Fn(Option<R>) + Send + Sync>;

/// A pending dialog request.
///
/// `payload` describes what to show; the queue never looks inside it.
/// `on_close` runs when the request leaves the queue.
pub struct ModalRequest<P, R = Value> {
    /// Caller-chosen identifier. Not required to be unique.
    pub id: String,
    /// What to show.
    pub payload: P,
    /// Optional arguments for the dialog.
    pub args: Option<Value>,
    on_close: Option<OnClose<R>>,
}

impl<P, R> ModalRequest<P, R> {
    /// A request without arguments or close callback.
    pub fn new(id: impl Into<String>, payload: P) -> Self {
        Self {
            id: id.into(),
            payload,
            args: None,
            on_close: None,
        }
    }

    /// Attach arguments.
    pub fn with_args(mut self, args: Value) -> Self {
        self.args = Some(args);
        self
    }

    /// Run `callback` with the dismissal result when the request is closed.
    ///
    /// `clear` closes requests with `None`.
    pub fn on_close<F>(mut self, callback: F) -> Self
    where
        F: Fn(Option<R>) + Send + Sync + 'static,
    {
        self.on_close = Some(Arc::new(callback));
        self
    }

    /// Whether a close callback is attached.
    pub fn has_on_close(&self) -> bool {
        self.on_close.is_some()
    }
}

impl<P: Clone, R> Clone for ModalRequest<P, R> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            payload: self.payload.clone(),
            args: self.args.clone(),
            on_close: self.on_close.clone(),
        }
    }
}

impl<P: fmt::Debug, R> fmt::Debug for ModalRequest<P, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModalRequest")
            .field("id", &self.id)
            .field("payload", &self.payload)
            .field("args", &self.args)
            .field("on_close", &self.on_close.is_some())
            .finish()
    }
}

/// FIFO of dialog requests; only the head is active.
///
/// Subscribers receive the queue contents after every `push`, `pop` and
/// `clear`, in the order the operations were applied, including operations
/// made from inside a subscriber. Clones share the same queue.
pub struct ModalQueue<P, R = Value> {
    items: Arc<Mutex<VecDeque<ModalRequest<P, R>>>>,
    subscribers: Registry<[ModalRequest<P, R>]>,
    dispatcher: Dispatcher,
}

impl<P, R> ModalQueue<P, R>
where
    P: Clone + Send + Sync + 'static,
    R: 'static,
{
    /// Create an empty queue.
    pub fn new() -> Self {
        Self {
            items: Arc::new(Mutex::new(VecDeque::new())),
            subscribers: Registry::new(),
            dispatcher: Dispatcher::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<ModalRequest<P, R>>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn snapshot(items: &VecDeque<ModalRequest<P, R>>) -> Vec<ModalRequest<P, R>> {
        items.iter().cloned().collect()
    }

    /// Queue a notification pass with the contents and listeners as of now.
    ///
    /// Called with the items lock held, so passes queue in operation order.
    fn enqueue(&self, items: &VecDeque<ModalRequest<P, R>>) {
        let snapshot = Self::snapshot(items);
        let listeners = self.subscribers.snapshot();
        self.dispatcher.enqueue(move || {
            deliver(&listeners, snapshot.as_slice(), "modal_subscribe");
        });
    }

    /// Append a request at the tail.
    pub fn push(&self, request: ModalRequest<P, R>) {
        let id = request.id.clone();
        let depth = {
            let mut items = self.lock();
            items.push_back(request);
            self.enqueue(&items);
            items.len()
        };
        tracing::debug!(id = %id, depth, "modal queued");
        self.dispatcher.drain();
    }

    /// Close the active request, handing `result` to its close callback.
    ///
    /// Subscribers are notified even when the queue was already empty.
    pub fn pop(&self, result: Option<R>) -> Option<ModalRequest<P, R>> {
        let (head, depth) = {
            let mut items = self.lock();
            let head = items.pop_front();
            self.enqueue(&items);
            (head, items.len())
        };

        if let Some(request) = &head {
            tracing::debug!(id = %request.id, depth, "modal closed");
            if let Some(on_close) = &request.on_close {
                isolate("modal_on_close", || on_close(result));
            }
        }
        self.dispatcher.drain();
        head
    }

    /// Close every request, oldest first, each with a `None` result.
    ///
    /// Returns how many were removed.
    pub fn clear(&self) -> usize {
        let removed: Vec<_> = {
            let mut items = self.lock();
            let removed = items.drain(..).collect();
            self.enqueue(&items);
            removed
        };
        tracing::debug!(removed = removed.len(), "modal queue cleared");

        for request in &removed {
            if let Some(on_close) = &request.on_close {
                isolate("modal_on_close", || on_close(None));
            }
        }
        self.dispatcher.drain();
        removed.len()
    }

    /// The active request, if any.
    pub fn current(&self) -> Option<ModalRequest<P, R>> {
        self.lock().front().cloned()
    }

    /// A copy of every pending request, head first.
    pub fn items(&self) -> Vec<ModalRequest<P, R>> {
        Self::snapshot(&self.lock())
    }

    /// Number of pending requests.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Subscribe to queue changes.
    ///
    /// The callback runs immediately with the current contents.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&[ModalRequest<P, R>]) + Send + Sync + 'static,
    {
        let callback: Arc<dyn Fn(&[ModalRequest<P, R>]) + Send + Sync> = Arc::new(callback);
        let (subscription, current) = {
            let items = self.lock();
            (self.subscribers.insert(Arc::clone(&callback)), Self::snapshot(&items))
        };
        isolate("modal_subscribe", || callback(&current));
        subscription
    }
}

impl<P, R> Default for ModalQueue<P, R>
where
    P: Clone + Send + Sync + 'static,
    R: 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<P, R> Clone for ModalQueue<P, R> {
    fn clone(&self) -> Self {
        Self {
            items: Arc::clone(&self.items),
            subscribers: self.subscribers.clone(),
            dispatcher: self.dispatcher.clone(),
        }
    }
}
