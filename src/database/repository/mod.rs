//! Repository module - data access layer.

mod keyword_repository;

pub use keyword_repository::KeywordRepository;
