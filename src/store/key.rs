use super::record::Record;
use crate::error::{Error, Result};
use crate::runtime::{Listener, Registry, Subscription};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A typed reference to one top-level key of a record.
///
/// Built with [`key!`](crate::key) in most code.
pub struct Key<T, V> {
    name: &'static str,
    get: fn(&T) -> &V,
}

impl<T, V> Key<T, V> {
    /// Create a key from its name and field accessor.
    pub const fn new(name: &'static str, get: fn(&T) -> &V) -> Self {
        Self { name, get }
    }

    /// The key's name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Read the key's value out of `state`.
    pub fn get<'a>(&self, state: &'a T) -> &'a V {
        (self.get)(state)
    }
}

impl<T, V> Clone for Key<T, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T, V> Copy for Key<T, V> {}

impl<T, V> fmt::Debug for Key<T, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Key").field(&self.name).finish()
    }
}

/// Build a [`Key`] for a field of a record type.
///
/// ```
/// use tincan_store::{key, record};
///
/// record! {
///     pub struct Score => ScorePatch {
///         pub points: u64,
///     }
/// }
///
/// let points = key!(Score, points);
/// assert_eq!(points.name(), "points");
/// assert_eq!(*points.get(&Score { points: 7 }), 7);
/// ```
#[macro_export]
macro_rules! key {
    ($record:ty, $field:ident) => {
        $crate::Key::<$record, _>::new(stringify!($field), |state: &$record| &state.$field)
    };
}

/// Per-key listeners, grouped by key name.
pub(crate) struct KeyRegistry<T> {
    by_key: Arc<Mutex<HashMap<&'static str, Registry<T>>>>,
}

impl<T: Record> KeyRegistry<T> {
    pub(crate) fn new() -> Self {
        Self {
            by_key: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<&'static str, Registry<T>>> {
        self.by_key.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `callback` for `key`.
    ///
    /// Returns the handle and the registered listener, so the caller can make
    /// the immediate call once it has read the current state.
    pub(crate) fn register<V, F>(
        &self,
        key: Key<T, V>,
        callback: F,
    ) -> Result<(Subscription, Listener<T>)>
    where
        V: 'static,
        F: Fn(&V) + Send + Sync + 'static,
    {
        if !T::has_key(key.name()) {
            return Err(Error::UnknownKey {
                key: key.name(),
                record: std::any::type_name::<T>(),
            });
        }

        let registry = self.lock().entry(key.name()).or_default().clone();
        let listener: Listener<T> = Arc::new(move |state: &T| callback(key.get(state)));
        let subscription = registry.insert(Arc::clone(&listener));
        Ok((subscription, listener))
    }

    /// The listeners of every key in `changed`, grouped by key in that order.
    pub(crate) fn snapshot(&self, changed: &[&'static str]) -> Vec<Listener<T>> {
        let by_key = self.lock();
        changed
            .iter()
            .filter_map(|key| by_key.get(key))
            .flat_map(Registry::snapshot)
            .collect()
    }
}

impl<T> Clone for KeyRegistry<T> {
    fn clone(&self) -> Self {
        Self {
            by_key: Arc::clone(&self.by_key),
        }
    }
}
