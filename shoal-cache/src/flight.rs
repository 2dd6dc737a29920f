//! # Single-Flight Coalescer
//!
//! Deduplicates concurrent executions of the same load: for any set of
//! callers that observe the same key while one call is in flight, the
//! underlying future runs exactly once and every caller receives a clone of
//! the identical result.
//!
//! ## Design Principles
//!
//! 1. **Leader/Waiter Split**: The first caller for a key becomes the
//!    leader and executes the future; everyone else waits on the leader's
//!    call record.
//! 2. **Unlocked Execution**: The map mutex is held only to register or
//!    look up a record, never across the future.
//! 3. **Remove On Completion**: The leader's record is removed when it
//!    finishes (or is dropped), so a later call for the same key starts a
//!    fresh execution.
//!
//! Cancellation is not supported: waiters share the leader's fate. If the
//! leader is dropped before publishing, the record is still cleaned up and
//! waiters observe [`CacheError::LoadInterrupted`] rather than hanging.

use std::collections::HashMap;
use std::future::Future;

use parking_lot::Mutex;
use tokio::sync::watch;

use shoal_common::{CacheError, CacheResult};

/// Slot carried by a call record: `None` while in flight, `Some` once the
/// leader has published.
type Slot<T> = Option<CacheResult<T>>;

/// One in-flight call; waiters clone the receiver and await the slot.
struct Call<T> {
    rx: watch::Receiver<Slot<T>>,
}

/// Per-key coalescing of concurrent loads.
pub struct SingleFlight<T> {
    calls: Mutex<HashMap<String, Call<T>>>,
}

impl<T: Clone> SingleFlight<T> {
    pub fn new() -> Self {
        SingleFlight {
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// Runs `fut` for `key`, coalescing with any call already in flight.
    ///
    /// **Logic**:
    /// 1. Under the map lock: join an existing record as a waiter, or
    ///    register a fresh one and become the leader.
    /// 2. Leader: execute `fut` unlocked, publish the result to the record,
    ///    remove the record, return the result.
    /// 3. Waiter: await the record's slot and clone whatever the leader
    ///    published.
    pub async fn run<F>(&self, key: &str, fut: F) -> CacheResult<T>
    where
        F: Future<Output = CacheResult<T>>,
    {
        enum Entry<S> {
            Leader(watch::Sender<S>),
            Waiter(watch::Receiver<S>),
        }

        let entry = {
            let mut calls = self.calls.lock();
            if let Some(call) = calls.get(key) {
                Entry::Waiter(call.rx.clone())
            } else {
                let (tx, rx) = watch::channel(None);
                calls.insert(key.to_string(), Call { rx });
                Entry::Leader(tx)
            }
        };

        match entry {
            Entry::Waiter(mut rx) => match rx.wait_for(|slot| slot.is_some()).await {
                Ok(slot) => (*slot).clone().unwrap_or(Err(CacheError::LoadInterrupted)),
                // Sender dropped without publishing: the leader went away.
                Err(_) => Err(CacheError::LoadInterrupted),
            },
            Entry::Leader(tx) => {
                let _cleanup = RemoveOnDrop {
                    calls: &self.calls,
                    key,
                };
                let result = fut.await;
                let _ = tx.send(Some(result.clone()));
                result
            }
        }
    }

    /// Number of calls currently in flight.
    pub fn in_flight(&self) -> usize {
        self.calls.lock().len()
    }
}

impl<T: Clone> Default for SingleFlight<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Removes the leader's record when the leader completes or is dropped.
struct RemoveOnDrop<'a, T> {
    calls: &'a Mutex<HashMap<String, Call<T>>>,
    key: &'a str,
}

impl<T> Drop for RemoveOnDrop<'_, T> {
    fn drop(&mut self) {
        self.calls.lock().remove(self.key);
    }
}
