//! # Shoalcache Core
//!
//! The in-process half of Shoalcache: named cache groups that answer reads
//! from a byte-budgeted local LRU store, delegate misses to the peer that
//! owns the key, fall back to a user-supplied backing source, and coalesce
//! concurrent duplicate loads so the expensive path runs once.
//!
//! ## Structure Overview
//!
//! ```text
//! Group (named, registered process-wide)
//!   ├── LocalCache ── Mutex<Lru<ByteView>>      local store
//!   ├── Arc<dyn PeerPicker>                     key ownership (write-once)
//!   ├── Arc<dyn Source>                         backing source on miss
//!   └── SingleFlight<ByteView>                  per-key load coalescing
//! ```
//!
//! The transport that connects groups across nodes lives in `shoal-server`
//! (HTTP pool) and `shoal-client` (peer fetcher); this crate only defines
//! the seams they implement.

pub mod cache;
pub mod flight;
pub mod group;
pub mod lru;
pub mod peer;
pub mod ring;
pub mod view;

pub use cache::LocalCache;
pub use flight::SingleFlight;
pub use group::{get_group, Group, Source, SourceFn, Stats, StatsSnapshot};
pub use lru::{Cost, Lru};
pub use peer::{PeerFetcher, PeerPicker};
pub use ring::HashRing;
pub use view::ByteView;
