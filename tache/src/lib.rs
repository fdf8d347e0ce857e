//! Storage backends for cache-aside caching.
//!
//! A backend stores encoded values under string keys with an expiry, either in a
//! networked key-value store ([`NetworkedBackend`]) or as files on disk
//! ([`LocalBackend`]). Reads report a missing entry as [`NO_VALUE`], which is
//! never confused with a cached "nothing" such as `Option::None`.

pub mod backend;
pub mod backends;
pub mod domain;
pub mod ports;
pub mod serializer;

pub use backend::{Backend, negative_ttl};
pub use backends::{LocalBackend, NetworkedBackend};
pub use domain::{COUNTER_KEY, Entry, Format, Lookup, NO_VALUE, NoValue};
pub use ports::{Counter, StorageBackend, StoreClient};
pub use serializer::Serializer;
pub use shared::{Error, Result};
