//! Catalog cache plumbing.
//!
//! The catalog read path keeps a single serialized entry under [`CATALOG_CACHE_KEY`] in a
//! [`CacheBackend`]. The backend is a capability: the in-process [`MemoryCache`] is the default
//! implementation, and anything that can store bytes with a TTL can stand in for it.
//!
//! ```toml
//! [cache]
//! enabled = true
//! ttl_seconds = 3600
//! capacity = 16
//! ```

mod config;
pub(crate) mod lock;
mod store;

pub use config::CacheConfig;
pub use store::{CacheBackend, CacheError, MemoryCache};

/// Key under which the full newest-first episode list is cached.
pub const CATALOG_CACHE_KEY: &str = "podcasts";
