//! Database module exports.

mod keywords;
mod models;
mod mongo;
mod motd;
mod repository;
mod store;

pub use keywords::KeywordIndex;
pub use models::*;
pub use mongo::Database;
pub use motd::{MotdStatus, MotdStore};
pub use repository::KeywordRepository;
pub use store::{KeywordStore, StoreError};
