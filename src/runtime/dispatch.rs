use super::isolate::isolate;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type Job = Box<dyn FnOnce() + Send>;

struct Pending {
    jobs: VecDeque<Job>,
    draining: bool,
}

/// FIFO of notification passes for one observable value.
///
/// A write queues its pass while it still holds the value's lock, so the
/// queue order is the write order. Passes run one after the other: a write
/// made from inside a listener queues behind the pass that is running
/// instead of interrupting it. Only one thread drains at a time; a write
/// from another thread during a drain is delivered by the draining thread.
pub(crate) struct Dispatcher {
    pending: Arc<Mutex<Pending>>,
}

impl Dispatcher {
    pub(crate) fn new() -> Self {
        Self {
            pending: Arc::new(Mutex::new(Pending {
                jobs: VecDeque::new(),
                draining: false,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Pending> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a pass. It runs on the next [`drain`](Self::drain).
    pub(crate) fn enqueue<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.lock().jobs.push_back(Box::new(job));
    }

    /// Run queued passes until none are left.
    ///
    /// Returns at once when called from inside a pass, or while another
    /// thread is draining.
    pub(crate) fn drain(&self) {
        {
            let mut pending = self.lock();
            if pending.draining {
                return;
            }
            pending.draining = true;
        }

        loop {
            let job = {
                let mut pending = self.lock();
                match pending.jobs.pop_front() {
                    Some(job) => job,
                    None => {
                        pending.draining = false;
                        return;
                    }
                }
            };
            isolate("dispatch", job);
        }
    }
}

impl Clone for Dispatcher {
    fn clone(&self) -> Self {
        Self {
            pending: Arc::clone(&self.pending),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passes_run_in_queue_order() {
        let dispatcher = Dispatcher::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        for n in 0..3 {
            let log = log.clone();
            dispatcher.enqueue(move || log.lock().unwrap().push(n));
        }

        dispatcher.drain();
        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2]);
        assert!(dispatcher.lock().jobs.is_empty());
    }

    #[test]
    fn nested_passes_wait_for_the_running_one() {
        let dispatcher = Dispatcher::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let inner = dispatcher.clone();
        let outer_log = log.clone();
        dispatcher.enqueue(move || {
            outer_log.lock().unwrap().push("outer:start");
            let nested_log = outer_log.clone();
            inner.enqueue(move || nested_log.lock().unwrap().push("nested"));
            inner.drain();
            outer_log.lock().unwrap().push("outer:end");
        });

        dispatcher.drain();
        assert_eq!(
            *log.lock().unwrap(),
            vec!["outer:start", "outer:end", "nested"]
        );
    }

    #[test]
    fn panicking_pass_does_not_stall_the_queue() {
        let dispatcher = Dispatcher::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        dispatcher.enqueue(|| panic!("pass failure"));
        let sink = log.clone();
        dispatcher.enqueue(move || sink.lock().unwrap().push("after"));

        dispatcher.drain();
        assert_eq!(*log.lock().unwrap(), vec!["after"]);

        let sink = log.clone();
        dispatcher.enqueue(move || sink.lock().unwrap().push("later"));
        dispatcher.drain();
        assert_eq!(*log.lock().unwrap(), vec!["after", "later"]);
    }
}
