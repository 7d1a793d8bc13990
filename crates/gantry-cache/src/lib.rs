//! Cache key digests and artifact stores for Gantry.

pub mod keys;
pub mod store;

pub use keys::{CacheKeyBuilder, sanitize_key};
pub use store::{FilesystemStore, MemoryStore};
