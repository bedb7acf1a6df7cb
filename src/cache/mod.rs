//! Cache module for storing flight offers to disk
//!
//! The gateway talks to persistence only through the `CacheStore` trait so
//! tests can substitute their own store. `JsonFileStore` is the default
//! implementation; freshness is decided by the pure `is_fresh` function, the
//! store itself knows nothing about TTLs.

mod store;

pub use store::{is_fresh, CacheEntry, CacheStore, JsonFileStore, PersistenceError};
