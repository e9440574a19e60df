//! Single-use waiters for join and ping replies.
//!
//! Each caller registers a oneshot under a key and holds a guard. The read
//! loop resolves every waiter under a key at once; the guard removes its own
//! waiter if the caller gives up first (timeout, cancellation, drop), so
//! nothing is left behind on any exit path.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::oneshot;

pub(crate) struct Waiters<T> {
    map: DashMap<String, Vec<(u64, oneshot::Sender<T>)>>,
    next_id: AtomicU64,
}

impl<T> Waiters<T> {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            map: DashMap::new(),
            next_id: AtomicU64::new(0),
        })
    }

    pub fn register(self: &Arc<Self>, key: &str) -> (WaiterGuard<T>, oneshot::Receiver<T>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.map.entry(key.to_string()).or_default().push((id, tx));
        let guard = WaiterGuard {
            waiters: Arc::clone(self),
            key: key.to_string(),
            id,
        };
        (guard, rx)
    }

    /// Resolve every waiter under `key`. Returns how many were woken.
    pub fn resolve(&self, key: &str, make: impl Fn() -> T) -> usize {
        let Some((_, list)) = self.map.remove(key) else {
            return 0;
        };
        list.into_iter()
            .filter(|(_, tx)| !tx.is_closed())
            .map(|(_, tx)| tx.send(make()).is_ok())
            .filter(|sent| *sent)
            .count()
    }

    /// Resolve every registered waiter.
    pub fn resolve_all(&self, make: impl Fn(&str) -> T) {
        let keys: Vec<String> = self.map.iter().map(|e| e.key().clone()).collect();
        for key in keys {
            if let Some((key, list)) = self.map.remove(&key) {
                for (_, tx) in list {
                    let _ = tx.send(make(&key));
                }
            }
        }
    }

    /// Number of outstanding waiters.
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.map.iter().map(|e| e.value().len()).sum()
    }
}

/// Removes its waiter on drop.
pub(crate) struct WaiterGuard<T> {
    waiters: Arc<Waiters<T>>,
    key: String,
    id: u64,
}

impl<T> Drop for WaiterGuard<T> {
    fn drop(&mut self) {
        let now_empty = match self.waiters.map.get_mut(&self.key) {
            Some(mut list) => {
                list.retain(|(id, _)| *id != self.id);
                list.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.waiters.map.remove_if(&self.key, |_, list| list.is_empty());
        }
    }
}
