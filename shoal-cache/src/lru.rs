//! # LRU Store
//!
//! Byte-budgeted key/value store with least-recently-used eviction and an
//! optional per-eviction callback.
//!
//! ## Design Principles
//!
//! 1. **Byte-Based Budget**: Entries are charged `len(key) + value.cost()`;
//!    eviction triggers on total bytes, not entry count.
//! 2. **Index-Based Intrusive List**: Recency order lives in a dense node
//!    arena with index links for O(1) promotion and removal without heap
//!    pointers or unsafe code.
//! 3. **Shared Key Buffers**: The index map and the node hold the same
//!    `Arc<str>`, so each key is allocated once.
//! 4. **External Synchronization**: The store is single-threaded on purpose;
//!    its only concurrent caller is the cache shell, which owns the lock.
//!
//! A budget of `0` disables the bound entirely. When the budget is exceeded,
//! entries are evicted from the cold end until usage fits again — except
//! that the last remaining entry is never evicted, so a single entry larger
//! than the whole budget is allowed to stay.

use std::sync::Arc;

use ahash::RandomState;
use hashbrown::HashMap;

/// Capability every cached value must expose: its memory cost in bytes.
///
/// The store charges `len(key) + value.cost()` per entry. Higher layers
/// restrict values to [`crate::ByteView`]; tests may use plain strings.
pub trait Cost {
    fn cost(&self) -> usize;
}

impl Cost for String {
    fn cost(&self) -> usize {
        self.len()
    }
}

/// Callback invoked once per evicted entry, after the entry has left both
/// the index and the recency list.
pub type EvictCallback<V> = Box<dyn FnMut(&str, &V) + Send>;

/// Internal node for a single key/value entry.
#[derive(Debug)]
struct Node<V> {
    // Shared with the index map to avoid a duplicate allocation.
    key: Arc<str>,
    value: V,
    // Byte charge for eviction accounting (key + value).
    size: usize,
    // Intrusive recency links (index-based to keep nodes packed).
    prev: Option<usize>,
    next: Option<usize>,
}

/// Byte-budgeted LRU store.
///
/// `head` is the eviction victim (least recently used); `tail` is the most
/// recently used end, updated by both `get` hits and `set`.
pub struct Lru<V: Cost> {
    /// Maximum allowed bytes; `0` means unbounded.
    max_bytes: usize,
    /// Current byte usage across live entries.
    used_bytes: usize,
    /// Key -> node index for O(1) lookup.
    map: HashMap<Arc<str>, usize, RandomState>,
    /// Dense node storage.
    nodes: Vec<Option<Node<V>>>,
    /// Free-list for recycling node slots under churn.
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    on_evict: Option<EvictCallback<V>>,
}

impl<V: Cost> Lru<V> {
    /// Creates a store with a byte budget (`0` = unbounded) and an optional
    /// eviction callback.
    pub fn new(max_bytes: usize, on_evict: Option<EvictCallback<V>>) -> Self {
        Lru {
            max_bytes,
            used_bytes: 0,
            map: HashMap::with_hasher(RandomState::new()),
            nodes: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            on_evict,
        }
    }

    /// Looks up a key, promoting the entry to most recently used on hit.
    pub fn get(&mut self, key: &str) -> Option<&V> {
        let idx = *self.map.get(key)?;
        self.touch(idx);
        self.nodes[idx].as_ref().map(|node| &node.value)
    }

    /// Inserts or replaces an entry and promotes it, then evicts from the
    /// cold end while usage exceeds a non-zero budget (stopping when only
    /// one entry remains).
    pub fn set(&mut self, key: &str, value: V) {
        if let Some(&idx) = self.map.get(key) {
            let new_size = key.len() + value.cost();
            if let Some(node) = self.nodes[idx].as_mut() {
                self.used_bytes -= node.size;
                self.used_bytes += new_size;
                node.value = value;
                node.size = new_size;
            }
            self.touch(idx);
        } else {
            let key: Arc<str> = Arc::from(key);
            let size = key.len() + value.cost();
            self.insert_new(key, value, size);
            self.used_bytes += size;
        }

        while self.max_bytes != 0 && self.used_bytes > self.max_bytes && self.map.len() > 1 {
            self.evict_oldest();
        }
    }

    /// Removes the least-recently-used entry, updates the accounting, and
    /// fires the eviction callback with the removed pair.
    pub fn evict_oldest(&mut self) {
        let Some(idx) = self.head else { return };
        let Some(node) = self.remove_idx(idx) else { return };
        self.used_bytes -= node.size;
        if let Some(on_evict) = self.on_evict.as_mut() {
            on_evict(&node.key, &node.value);
        }
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns true when the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Current byte usage.
    pub fn used_bytes(&self) -> usize {
        self.used_bytes
    }

    /// Configured byte budget (`0` = unbounded).
    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Detaches `idx` from the recency list.
    fn unlink(&mut self, idx: usize) {
        let (prev, next) = {
            let node = self.nodes[idx].as_ref().expect("node exists");
            (node.prev, node.next)
        };

        if let Some(prev_idx) = prev {
            if let Some(prev_node) = self.nodes[prev_idx].as_mut() {
                prev_node.next = next;
            }
        } else {
            self.head = next;
        }

        if let Some(next_idx) = next {
            if let Some(next_node) = self.nodes[next_idx].as_mut() {
                next_node.prev = prev;
            }
        } else {
            self.tail = prev;
        }

        if let Some(node) = self.nodes[idx].as_mut() {
            node.prev = None;
            node.next = None;
        }
    }

    /// Appends `idx` at the most-recently-used end.
    fn push_back(&mut self, idx: usize) {
        let tail = self.tail;
        if let Some(node) = self.nodes[idx].as_mut() {
            node.prev = tail;
            node.next = None;
        }

        if let Some(tail_idx) = tail {
            if let Some(tail_node) = self.nodes[tail_idx].as_mut() {
                tail_node.next = Some(idx);
            }
        } else {
            self.head = Some(idx);
        }

        self.tail = Some(idx);
    }

    /// Marks a node as recently used; skips relinking when already newest.
    fn touch(&mut self, idx: usize) {
        if self.tail == Some(idx) {
            return;
        }
        self.unlink(idx);
        self.push_back(idx);
    }

    /// Inserts a new node, reusing a free slot when available.
    fn insert_new(&mut self, key: Arc<str>, value: V, size: usize) {
        let idx = self.free.pop().unwrap_or_else(|| {
            self.nodes.push(None);
            self.nodes.len() - 1
        });

        self.nodes[idx] = Some(Node {
            key: Arc::clone(&key),
            value,
            size,
            prev: None,
            next: None,
        });
        self.push_back(idx);
        self.map.insert(key, idx);
    }

    /// Removes a node by index and returns it for callback delivery.
    fn remove_idx(&mut self, idx: usize) -> Option<Node<V>> {
        self.nodes[idx].as_ref()?;
        // Detach before clearing the slot so the links stay valid.
        self.unlink(idx);
        let node = self.nodes[idx].take()?;
        self.map.remove(node.key.as_ref());
        self.free.push(idx);
        Some(node)
    }
}
