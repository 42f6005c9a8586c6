//! In-process fakes for engine tests.

use std::collections::{HashMap, VecDeque};
use std::future;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeZone, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tempfile::TempDir;
use tokio::sync::Notify;

use crate::bot::BotEngine;
use crate::bot::transport::{
    Message, PhotoSource, SentPhoto, Transport, TransportError, Update,
};
use crate::database::{
    AliasRow, ContentRow, KeywordIndex, KeywordSpace, KeywordStore, MotdStore, StoreError,
};
use crate::i18n::Strings;
use crate::permissions::Permissions;

pub const ADMIN: u64 = 1;
pub const USER: u64 = 2;
pub const OPERATIONAL_CHAT: i64 = -100;
pub const RESTRICTED_CHAT: i64 = -200;
pub const MOTD_CHAT: i64 = -300;
pub const INVASIVE_CHAT: i64 = -400;
pub const UNKNOWN_CHAT: i64 = -999;

/// Something the fake transport was asked to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Text {
        chat_id: i64,
        text: String,
        reply_to: Option<i32>,
    },
    Photo {
        chat_id: i64,
        photo: PhotoSource,
        reply_to: Option<i32>,
    },
}

/// Scripted transport that records every send.
#[derive(Default)]
pub struct FakeTransport {
    pub sent: Mutex<Vec<Sent>>,
    /// Batches handed out by `fetch_updates`, in order.
    pub script: VecDeque<Result<Vec<Update>, TransportError>>,
    /// Offsets passed to `fetch_updates`.
    pub offsets: Vec<Option<u32>>,
    pub reconnects: u32,
    /// Signalled once the script runs dry.
    pub exhausted: Arc<Notify>,
    pub fail_photos: bool,
    /// Every `send_text` fails with a retriable error.
    pub fail_texts: bool,
    next_message_id: AtomicI32,
}

impl FakeTransport {
    pub fn texts(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter_map(|s| match s {
                Sent::Text { text, .. } => Some(text.clone()),
                Sent::Photo { .. } => None,
            })
            .collect()
    }

    pub fn photos(&self) -> Vec<PhotoSource> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter_map(|s| match s {
                Sent::Photo { photo, .. } => Some(photo.clone()),
                Sent::Text { .. } => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }
}

impl Transport for FakeTransport {
    async fn fetch_updates(
        &mut self,
        offset: Option<u32>,
        _timeout_secs: u32,
    ) -> Result<Vec<Update>, TransportError> {
        self.offsets.push(offset);
        match self.script.pop_front() {
            Some(batch) => batch,
            None => {
                self.exhausted.notify_one();
                future::pending().await
            }
        }
    }

    async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        reply_to: Option<i32>,
    ) -> Result<(), TransportError> {
        if self.fail_texts {
            return Err(TransportError::Retriable("send timed out".to_string()));
        }

        self.sent.lock().unwrap().push(Sent::Text {
            chat_id,
            text: text.to_string(),
            reply_to,
        });
        Ok(())
    }

    async fn send_photo(
        &self,
        chat_id: i64,
        photo: PhotoSource,
        reply_to: Option<i32>,
    ) -> Result<SentPhoto, TransportError> {
        if self.fail_photos {
            return Err(TransportError::Fatal("photo rejected".to_string()));
        }

        let photo_ref = match &photo {
            PhotoSource::FileId(id) => id.clone(),
            PhotoSource::Path(path) => format!("uploaded:{}", path.display()),
        };
        self.sent.lock().unwrap().push(Sent::Photo {
            chat_id,
            photo,
            reply_to,
        });

        Ok(SentPhoto {
            message_id: 10_000 + self.next_message_id.fetch_add(1, Ordering::Relaxed),
            photo_refs: vec![format!("{photo_ref}-small"), photo_ref],
        })
    }

    async fn reconnect(&mut self) -> Result<(), TransportError> {
        self.reconnects += 1;
        Ok(())
    }
}

#[derive(Default)]
struct Tables {
    content: HashMap<KeywordSpace, Vec<ContentRow>>,
    aliases: HashMap<KeywordSpace, Vec<AliasRow>>,
    next_id: i64,
}

/// Keyword store over plain vectors. Random picks use a seeded rng.
pub struct MemoryKeywordStore {
    tables: Mutex<Tables>,
    sampler: Mutex<StdRng>,
    failing: AtomicBool,
    failing_loads: AtomicBool,
}

impl Default for MemoryKeywordStore {
    fn default() -> Self {
        Self {
            tables: Mutex::default(),
            sampler: Mutex::new(StdRng::seed_from_u64(7)),
            failing: AtomicBool::new(false),
            failing_loads: AtomicBool::new(false),
        }
    }
}

impl MemoryKeywordStore {
    /// Make every call fail until reset.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Relaxed);
    }

    /// Make only the index loading calls fail until reset.
    pub fn set_failing_loads(&self, failing: bool) {
        self.failing_loads.store(failing, Ordering::Relaxed);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::Relaxed) {
            return Err(StoreError::Unavailable("store offline".to_string()));
        }
        Ok(())
    }

    fn check_load(&self) -> Result<(), StoreError> {
        self.check()?;
        if self.failing_loads.load(Ordering::Relaxed) {
            return Err(StoreError::Unavailable("store offline".to_string()));
        }
        Ok(())
    }
}

impl KeywordStore for MemoryKeywordStore {
    async fn keywords(&self, space: KeywordSpace) -> Result<Vec<String>, StoreError> {
        self.check_load()?;
        let tables = self.tables.lock().unwrap();
        let mut keywords: Vec<String> = Vec::new();
        for row in tables.content.get(&space).into_iter().flatten() {
            if !keywords.contains(&row.keyword) {
                keywords.push(row.keyword.clone());
            }
        }
        Ok(keywords)
    }

    async fn aliases(&self, space: KeywordSpace) -> Result<Vec<AliasRow>, StoreError> {
        self.check_load()?;
        let tables = self.tables.lock().unwrap();
        Ok(tables.aliases.get(&space).cloned().unwrap_or_default())
    }

    async fn random_content(
        &self,
        space: KeywordSpace,
        keyword: &str,
        tag: Option<&str>,
    ) -> Result<Option<ContentRow>, StoreError> {
        self.check()?;
        let tables = self.tables.lock().unwrap();
        let pool: Vec<&ContentRow> = tables
            .content
            .get(&space)
            .into_iter()
            .flatten()
            .filter(|row| row.keyword == keyword && tag.is_none_or(|t| row.tag.as_deref() == Some(t)))
            .collect();
        let mut sampler = self.sampler.lock().unwrap();
        Ok(pool.choose(&mut *sampler).map(|row| (*row).clone()))
    }

    async fn contents(
        &self,
        space: KeywordSpace,
        keyword: &str,
    ) -> Result<Vec<ContentRow>, StoreError> {
        self.check()?;
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .content
            .get(&space)
            .into_iter()
            .flatten()
            .filter(|row| row.keyword == keyword)
            .cloned()
            .collect())
    }

    async fn content_by_id(
        &self,
        space: KeywordSpace,
        id: i64,
    ) -> Result<Option<ContentRow>, StoreError> {
        self.check()?;
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .content
            .get(&space)
            .into_iter()
            .flatten()
            .find(|row| row.id == id)
            .cloned())
    }

    async fn insert_content(
        &self,
        space: KeywordSpace,
        keyword: &str,
        content: &str,
        tag: Option<&str>,
    ) -> Result<i64, StoreError> {
        self.check()?;
        let mut tables = self.tables.lock().unwrap();
        tables.next_id += 1;
        let id = tables.next_id;
        tables.content.entry(space).or_default().push(ContentRow {
            id,
            keyword: keyword.to_string(),
            content: content.to_string(),
            tag: tag.map(str::to_string),
        });
        Ok(id)
    }

    async fn insert_alias(
        &self,
        space: KeywordSpace,
        alias: &str,
        keyword: &str,
    ) -> Result<i64, StoreError> {
        self.check()?;
        let mut tables = self.tables.lock().unwrap();
        tables.next_id += 1;
        let id = tables.next_id;
        tables.aliases.entry(space).or_default().push(AliasRow {
            id,
            alias: alias.to_string(),
            keyword: keyword.to_string(),
        });
        Ok(id)
    }

    async fn delete_content(&self, space: KeywordSpace, id: i64) -> Result<bool, StoreError> {
        self.check()?;
        let mut tables = self.tables.lock().unwrap();
        let rows = tables.content.entry(space).or_default();
        let before = rows.len();
        rows.retain(|row| row.id != id);
        Ok(rows.len() < before)
    }

    async fn delete_alias(&self, space: KeywordSpace, id: i64) -> Result<bool, StoreError> {
        self.check()?;
        let mut tables = self.tables.lock().unwrap();
        let rows = tables.aliases.entry(space).or_default();
        let before = rows.len();
        rows.retain(|row| row.id != id);
        Ok(rows.len() < before)
    }
}

pub type TestEngine = BotEngine<FakeTransport, MemoryKeywordStore>;

pub fn permissions() -> Permissions {
    Permissions::new(
        [ADMIN],
        [OPERATIONAL_CHAT],
        [RESTRICTED_CHAT],
        [MOTD_CHAT],
        [INVASIVE_CHAT],
    )
}

/// Engine over fakes with a seeded rng. The motd file lives in the
/// returned temp dir.
pub async fn engine_with(store: MemoryKeywordStore) -> (TestEngine, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let motd = MotdStore::load(dir.path().join("motd.json")).unwrap();
    let index = KeywordIndex::load(&store).await.unwrap();

    let engine = BotEngine::new(
        FakeTransport::default(),
        store,
        index,
        motd,
        Strings::builtin(),
        permissions(),
    )
    .with_bot_username("test_bot")
    .with_images_dir(dir.path().join("images"))
    .with_rng(StdRng::seed_from_u64(42));

    (engine, dir)
}

pub async fn engine() -> (TestEngine, TempDir) {
    engine_with(MemoryKeywordStore::default()).await
}

pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

pub fn message(chat_id: i64, user_id: u64, text: &str) -> Message {
    Message {
        chat_id,
        chat_is_private: chat_id > 0,
        user_id,
        message_id: 1,
        text: Some(text.to_string()),
        photo_refs: Vec::new(),
        date: at(0),
    }
}

pub fn text_update(id: u32, chat_id: i64, user_id: u64, text: &str) -> Update {
    Update {
        id,
        message: Some(message(chat_id, user_id, text)),
    }
}
