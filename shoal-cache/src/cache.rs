//! # Cache Shell
//!
//! Concurrency wrapper around one [`Lru`] instance. A single mutex covers
//! each store operation and nothing else; the LRU itself stays
//! single-threaded. The store is built lazily on first insert using the
//! byte budget captured at construction, so groups that never see a miss
//! pay nothing.

use parking_lot::Mutex;

use crate::lru::Lru;
use crate::view::ByteView;

/// Mutex-guarded, lazily-initialized LRU of byte views.
pub struct LocalCache {
    capacity: usize,
    inner: Mutex<Option<Lru<ByteView>>>,
}

impl LocalCache {
    /// Creates a shell that will build its store with `capacity` bytes
    /// (`0` = unbounded) on first insert.
    pub fn new(capacity: usize) -> Self {
        LocalCache {
            capacity,
            inner: Mutex::new(None),
        }
    }

    /// Inserts a view under the lock, initializing the store if needed.
    pub fn add(&self, key: &str, value: ByteView) {
        let mut guard = self.inner.lock();
        let lru = guard.get_or_insert_with(|| Lru::new(self.capacity, None));
        lru.set(key, value);
    }

    /// Looks up a key under the lock. Always a miss before the first insert.
    pub fn get(&self, key: &str) -> Option<ByteView> {
        let mut guard = self.inner.lock();
        guard.as_mut()?.get(key).cloned()
    }

    /// Number of live entries (0 before the first insert).
    pub fn len(&self) -> usize {
        self.inner.lock().as_ref().map_or(0, Lru::len)
    }

    /// Returns true when the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current byte usage (0 before the first insert).
    pub fn used_bytes(&self) -> usize {
        self.inner.lock().as_ref().map_or(0, Lru::used_bytes)
    }
}
