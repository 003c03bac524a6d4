use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use tokio::sync::OwnedMutexGuard;

/// Per-key serialization: every resource key gets its own async mutex,
/// created lazily on first use. Operations on distinct keys never contend.
pub struct KeyedMutex<K> {
    entries: Mutex<HashMap<K, Arc<tokio::sync::Mutex<()>>>>,
}

impl<K: Eq + Hash + Clone> KeyedMutex<K> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Acquire the mutex for `key`, waiting if another task holds it.
    /// The registry lock is dropped before awaiting the key lock.
    pub async fn lock(&self, key: &K) -> OwnedMutexGuard<()> {
        let entry = {
            let mut entries = self.entries.lock().unwrap();
            entries
                .entry(key.clone())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };
        entry.lock_owned().await
    }
}

impl<K: Eq + Hash + Clone> Default for KeyedMutex<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn same_key_serializes() {
        let locks = Arc::new(KeyedMutex::new());
        let counter = Arc::new(AtomicU32::new(0));
        let mut handles = Vec::new();

        for _ in 0..8 {
            let locks = locks.clone();
            let counter = counter.clone();
            handles.push(tokio::spawn(async move {
                let _guard = locks.lock(&"doctor-1").await;
                let seen = counter.fetch_add(1, Ordering::SeqCst);
                tokio::task::yield_now().await;
                counter.fetch_sub(1, Ordering::SeqCst);
                seen
            }));
        }

        for handle in handles {
            // No task ever observes another inside the critical section.
            assert_eq!(handle.await.unwrap(), 0);
        }
    }

    #[tokio::test]
    async fn distinct_keys_run_in_parallel() {
        let locks = Arc::new(KeyedMutex::new());
        let guard_a = locks.lock(&1u32).await;
        // A second key must not wait on the first.
        let guard_b = locks.lock(&2u32).await;
        drop(guard_a);
        drop(guard_b);
    }
}
