//! Keyword store interface.
//!
//! The dispatcher only talks to the keyword tables through [`KeywordStore`],
//! so tests can swap MongoDB for an in-memory table.

use thiserror::Error;

use super::models::{AliasRow, ContentRow, KeywordSpace};

/// Errors raised by a keyword store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("malformed document: {0}")]
    Decode(#[from] mongodb::bson::de::Error),

    #[error("keyword store unavailable: {0}")]
    Unavailable(String),
}

/// Query shapes needed by the keyword index and the admin commands.
///
/// Keywords, aliases and tags are expected to be lowercase already.
#[allow(async_fn_in_trait)]
pub trait KeywordStore {
    /// Distinct canonical keywords with at least one content row.
    async fn keywords(&self, space: KeywordSpace) -> Result<Vec<String>, StoreError>;

    /// All alias rows, ordered by id.
    async fn aliases(&self, space: KeywordSpace) -> Result<Vec<AliasRow>, StoreError>;

    /// One random content row for `keyword`, restricted to `tag` when given.
    async fn random_content(
        &self,
        space: KeywordSpace,
        keyword: &str,
        tag: Option<&str>,
    ) -> Result<Option<ContentRow>, StoreError>;

    /// All content rows for `keyword`, ordered by id.
    async fn contents(
        &self,
        space: KeywordSpace,
        keyword: &str,
    ) -> Result<Vec<ContentRow>, StoreError>;

    async fn content_by_id(
        &self,
        space: KeywordSpace,
        id: i64,
    ) -> Result<Option<ContentRow>, StoreError>;

    /// Insert a content row and return its id.
    async fn insert_content(
        &self,
        space: KeywordSpace,
        keyword: &str,
        content: &str,
        tag: Option<&str>,
    ) -> Result<i64, StoreError>;

    /// Insert an alias row and return its id.
    async fn insert_alias(
        &self,
        space: KeywordSpace,
        alias: &str,
        keyword: &str,
    ) -> Result<i64, StoreError>;

    /// Delete a content row. Returns whether a row was removed.
    async fn delete_content(&self, space: KeywordSpace, id: i64) -> Result<bool, StoreError>;

    /// Delete an alias row. Returns whether a row was removed.
    async fn delete_alias(&self, space: KeywordSpace, id: i64) -> Result<bool, StoreError>;
}
