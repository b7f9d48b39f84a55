//! Per-namespace reader/writer locking.
//!
//! One lock per tenant namespace key, created lazily on first access and
//! retained for the life of the process. The table is expected to stay
//! small (tenant cardinality), so entries are never evicted.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

/// Table of per-key reader/writer locks.
///
/// The map itself is guarded by its own mutex, held only long enough to
/// clone out the per-key lock, so it is never held across I/O.
#[derive(Debug, Default)]
pub struct LockTable {
    locks: Mutex<HashMap<String, Arc<RwLock<()>>>>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, key: &str) -> Arc<RwLock<()>> {
        // Unit payload: recovering from a poisoned guard loses nothing.
        let mut table = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        table.entry(key.to_string()).or_default().clone()
    }

    /// Run `f` holding the shared side of the key's lock. Multiple readers
    /// of the same key run concurrently; the guard is released on every
    /// exit path, including panics inside `f`.
    pub fn with_read<T>(&self, key: &str, f: impl FnOnce() -> T) -> T {
        let lock = self.lock_for(key);
        let _guard = lock.read().unwrap_or_else(|e| e.into_inner());
        f()
    }

    /// Run `f` holding the exclusive side of the key's lock, excluding all
    /// readers and writers of the same key for the full duration of `f`.
    pub fn with_write<T>(&self, key: &str, f: impl FnOnce() -> T) -> T {
        let lock = self.lock_for(key);
        let _guard = lock.write().unwrap_or_else(|e| e.into_inner());
        f()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_concurrent_readers_do_not_block_each_other() {
        let table = Arc::new(LockTable::new());
        let barrier = Arc::new(Barrier::new(2));

        // Both closures must be inside the read lock at the same time to
        // pass the barrier; exclusive readers would deadlock here.
        let handles: Vec<_> = (0..2)
            .map(|_| {
                let table = Arc::clone(&table);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    table.with_read("tenant", move || {
                        barrier.wait();
                    })
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
    }

    #[test]
    fn test_writer_excludes_readers() {
        let table = Arc::new(LockTable::new());
        let flag = Arc::new(AtomicUsize::new(0));

        let writer = {
            let table = Arc::clone(&table);
            let flag = Arc::clone(&flag);
            thread::spawn(move || {
                table.with_write("tenant", || {
                    thread::sleep(Duration::from_millis(150));
                    flag.store(1, Ordering::SeqCst);
                })
            })
        };
        // Give the writer time to take the lock first.
        thread::sleep(Duration::from_millis(30));
        let seen = table.with_read("tenant", || flag.load(Ordering::SeqCst));
        assert_eq!(seen, 1, "reader ran before the writer released the lock");
        writer.join().unwrap();
    }

    #[test]
    fn test_distinct_keys_are_independent() {
        let table = Arc::new(LockTable::new());
        let barrier = Arc::new(Barrier::new(2));

        let handles: Vec<_> = ["tenant-a", "tenant-b"]
            .into_iter()
            .map(|key| {
                let table = Arc::clone(&table);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    table.with_write(key, move || {
                        barrier.wait();
                    })
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
    }

    #[test]
    fn test_lock_is_released_after_panic() {
        let table = Arc::new(LockTable::new());
        let t = Arc::clone(&table);
        let _ = thread::spawn(move || {
            t.with_write("tenant", || panic!("boom"));
        })
        .join();
        // A poisoned lock must still be usable.
        let value = table.with_write("tenant", || 42);
        assert_eq!(value, 42);
    }
}
