//! Cache module - typed caching on top of Moka.
//!
//! Used for in-memory state that must stay bounded over the process
//! lifetime, such as per-user flood records.

mod config;
mod typed;

pub use config::CacheConfig;
pub use typed::TypedCache;
