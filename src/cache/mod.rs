//! Cache Module
//!
//! The item map, item metadata, LRU victim selection and statistics.

mod entry;
pub mod lru;
mod stats;
mod store;


// Re-export public types
pub use entry::Item;
pub use lru::Evicted;
pub use stats::{CacheStats, StatsSnapshot};
pub use store::Store;
