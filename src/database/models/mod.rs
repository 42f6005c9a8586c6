//! Database models.

pub mod keyword;
pub mod motd;

pub use keyword::{AliasRow, ContentRow, Counter, KeywordSpace};
pub use motd::MotdEntry;
