//! Keyed get-or-load memoization.
//!
//! A key is either settled (`Ready`) or has exactly one load in flight
//! (`Pending`). Callers that arrive while a load is pending await the same
//! shared future instead of starting a second one. Failures are handed to
//! every waiter and then evicted, so the next call for that key retries.

use std::{cell::RefCell, collections::HashMap, fmt::Display, future::Future, hash::Hash, rc::Rc};

use futures::future::{FutureExt, LocalBoxFuture, Shared};

use crate::error::Result;

type SharedLoad<V> = Shared<LocalBoxFuture<'static, Result<Rc<V>>>>;

enum Slot<V> {
    Ready(Rc<V>),
    Pending(SharedLoad<V>),
}

pub struct ResourceCache<K, V> {
    entries: RefCell<HashMap<K, Slot<V>>>,
}

impl<K, V> Default for ResourceCache<K, V> {
    fn default() -> Self {
        Self {
            entries: RefCell::new(HashMap::new()),
        }
    }
}

impl<K, V> ResourceCache<K, V>
where
    K: Hash + Eq + Clone + Display,
    V: 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached value for `key`, or runs `load` and caches its result.
    ///
    /// `load` is only invoked when no value and no in-flight load exists for
    /// `key`. It must not touch this cache synchronously.
    pub async fn get_or_load<F, Fut>(&self, key: K, load: F) -> Result<Rc<V>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>> + 'static,
    {
        let pending = {
            let mut entries = self.entries.borrow_mut();
            match entries.get(&key) {
                Some(Slot::Ready(value)) => {
                    log::trace!("cache hit for {key}");
                    return Ok(value.clone());
                }
                Some(Slot::Pending(pending)) => {
                    log::debug!("joining in-flight load of {key}");
                    pending.clone()
                }
                None => {
                    log::debug!("loading {key}");
                    let pending = load().map(|r| r.map(Rc::new)).boxed_local().shared();
                    entries.insert(key.clone(), Slot::Pending(pending.clone()));
                    pending
                }
            }
        };

        let result = pending.clone().await;

        // The first waiter to wake settles the slot; later ones find it done.
        let mut entries = self.entries.borrow_mut();
        let ours = matches!(entries.get(&key), Some(Slot::Pending(p)) if p.ptr_eq(&pending));
        if ours {
            match &result {
                Ok(value) => {
                    entries.insert(key, Slot::Ready(value.clone()));
                }
                Err(e) => {
                    log::warn!("load of {key} failed: {e}");
                    entries.remove(&key);
                }
            }
        }
        result
    }

    /// The settled value for `key`, if any. Pending loads are not awaited.
    pub fn get(&self, key: &K) -> Option<Rc<V>> {
        match self.entries.borrow().get(key) {
            Some(Slot::Ready(value)) => Some(value.clone()),
            _ => None,
        }
    }

    pub fn is_pending(&self, key: &K) -> bool {
        matches!(self.entries.borrow().get(key), Some(Slot::Pending(_)))
    }

    /// Number of keys that are settled or in flight.
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
