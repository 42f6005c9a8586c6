//! MongoDB-backed keyword tables.
//!
//! Each table lives in its own collection. Rows use integer `_id`s issued by
//! the `counters` collection so admins can delete them by number.

use futures::StreamExt;
use mongodb::Collection;
use mongodb::bson::{self, Bson, Document, doc};
use mongodb::options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument};
use tracing::debug;

use crate::database::Database;
use crate::database::models::{AliasRow, ContentRow, Counter, KeywordSpace};
use crate::database::store::{KeywordStore, StoreError};

/// Repository for the four keyword tables.
#[derive(Debug, Clone)]
pub struct KeywordRepository {
    db: Database,
    counters: Collection<Counter>,
}

impl KeywordRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            db: db.clone(),
            counters: db.collection("counters"),
        }
    }

    fn content_coll(&self, space: KeywordSpace) -> Collection<ContentRow> {
        self.db.collection(space.content_table())
    }

    fn alias_coll(&self, space: KeywordSpace) -> Collection<AliasRow> {
        self.db.collection(space.alias_table())
    }

    /// Issue the next id for a table.
    async fn next_id(&self, table: &str) -> Result<i64, StoreError> {
        let options = FindOneAndUpdateOptions::builder()
            .upsert(true)
            .return_document(ReturnDocument::After)
            .build();

        let counter = self
            .counters
            .find_one_and_update(doc! { "_id": table }, doc! { "$inc": { "seq": 1_i64 } })
            .with_options(options)
            .await?;

        counter
            .map(|c| c.seq)
            .ok_or_else(|| StoreError::Unavailable(format!("no id counter for {table}")))
    }

    /// Drain a typed cursor, failing on the first bad document.
    async fn collect<T>(mut cursor: mongodb::Cursor<T>) -> Result<Vec<T>, StoreError>
    where
        T: serde::de::DeserializeOwned + Unpin + Send + Sync,
    {
        let mut rows = Vec::new();
        while let Some(row) = cursor.next().await {
            rows.push(row?);
        }
        Ok(rows)
    }

    fn by_id() -> FindOptions {
        FindOptions::builder().sort(doc! { "_id": 1 }).build()
    }
}

impl KeywordStore for KeywordRepository {
    async fn keywords(&self, space: KeywordSpace) -> Result<Vec<String>, StoreError> {
        let values = self
            .content_coll(space)
            .distinct("keyword", doc! {})
            .await?;

        Ok(values
            .into_iter()
            .filter_map(|v| match v {
                Bson::String(s) => Some(s),
                _ => None,
            })
            .collect())
    }

    async fn aliases(&self, space: KeywordSpace) -> Result<Vec<AliasRow>, StoreError> {
        let cursor = self
            .alias_coll(space)
            .find(doc! {})
            .with_options(Self::by_id())
            .await?;
        Self::collect(cursor).await
    }

    async fn random_content(
        &self,
        space: KeywordSpace,
        keyword: &str,
        tag: Option<&str>,
    ) -> Result<Option<ContentRow>, StoreError> {
        let mut filter = doc! { "keyword": keyword };
        if let Some(tag) = tag {
            filter.insert("tag", tag);
        }

        let pipeline = [doc! { "$match": filter }, doc! { "$sample": { "size": 1 } }];
        let mut cursor = self.content_coll(space).aggregate(pipeline).await?;

        match cursor.next().await {
            Some(raw) => {
                let raw: Document = raw?;
                Ok(Some(bson::from_document(raw)?))
            }
            None => {
                debug!("No {:?} content for '{}' (tag {:?})", space, keyword, tag);
                Ok(None)
            }
        }
    }

    async fn contents(
        &self,
        space: KeywordSpace,
        keyword: &str,
    ) -> Result<Vec<ContentRow>, StoreError> {
        let cursor = self
            .content_coll(space)
            .find(doc! { "keyword": keyword })
            .with_options(Self::by_id())
            .await?;
        Self::collect(cursor).await
    }

    async fn content_by_id(
        &self,
        space: KeywordSpace,
        id: i64,
    ) -> Result<Option<ContentRow>, StoreError> {
        Ok(self.content_coll(space).find_one(doc! { "_id": id }).await?)
    }

    async fn insert_content(
        &self,
        space: KeywordSpace,
        keyword: &str,
        content: &str,
        tag: Option<&str>,
    ) -> Result<i64, StoreError> {
        let row = ContentRow {
            id: self.next_id(space.content_table()).await?,
            keyword: keyword.to_string(),
            content: content.to_string(),
            tag: match space {
                KeywordSpace::Photo => tag.map(str::to_string),
                KeywordSpace::Text => None,
            },
        };

        self.content_coll(space).insert_one(&row).await?;
        debug!("Inserted {} #{} for '{}'", space.content_table(), row.id, keyword);
        Ok(row.id)
    }

    async fn insert_alias(
        &self,
        space: KeywordSpace,
        alias: &str,
        keyword: &str,
    ) -> Result<i64, StoreError> {
        let row = AliasRow {
            id: self.next_id(space.alias_table()).await?,
            alias: alias.to_string(),
            keyword: keyword.to_string(),
        };

        self.alias_coll(space).insert_one(&row).await?;
        debug!("Inserted {} #{}: {} -> {}", space.alias_table(), row.id, alias, keyword);
        Ok(row.id)
    }

    async fn delete_content(&self, space: KeywordSpace, id: i64) -> Result<bool, StoreError> {
        let result = self.content_coll(space).delete_one(doc! { "_id": id }).await?;
        Ok(result.deleted_count > 0)
    }

    async fn delete_alias(&self, space: KeywordSpace, id: i64) -> Result<bool, StoreError> {
        let result = self.alias_coll(space).delete_one(doc! { "_id": id }).await?;
        Ok(result.deleted_count > 0)
    }
}
