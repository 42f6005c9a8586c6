//! Messaging transport.
//!
//! The engine sees the platform through [`Transport`]: fetch a batch of
//! updates, send text, send a photo. [`TelegramTransport`] implements it on
//! top of teloxide with the Throttle adaptor for rate limiting.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use teloxide::RequestError;
use teloxide::adaptors::Throttle;
use teloxide::adaptors::throttle::Limits;
use teloxide::prelude::*;
use teloxide::types::{InputFile, MessageId, ReplyParameters, UpdateKind};
use thiserror::Error;
use tracing::info;

/// Bot type with Throttle adaptor for automatic rate limiting.
pub type ThrottledBot = Throttle<Bot>;

/// A polled update. Only new messages carry a payload.
#[derive(Debug, Clone)]
pub struct Update {
    pub id: u32,
    pub message: Option<Message>,
}

/// The parts of an incoming message the engine looks at.
#[derive(Debug, Clone)]
pub struct Message {
    pub chat_id: i64,
    pub chat_is_private: bool,
    pub user_id: u64,
    pub message_id: i32,
    pub text: Option<String>,
    /// Photo references, largest size last.
    pub photo_refs: Vec<String>,
    pub date: DateTime<Utc>,
}

/// Photo to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhotoSource {
    /// A reference the platform already knows.
    FileId(String),
    /// A local file to upload.
    Path(PathBuf),
}

/// What the platform returned for a sent photo.
#[derive(Debug, Clone)]
pub struct SentPhoto {
    pub message_id: i32,
    /// Largest size last.
    pub photo_refs: Vec<String>,
}

/// Transport failures, split by whether retrying can help.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("retriable transport error: {0}")]
    Retriable(String),

    #[error("transport error: {0}")]
    Fatal(String),
}

impl TransportError {
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Retriable(_))
    }
}

impl From<RequestError> for TransportError {
    fn from(e: RequestError) -> Self {
        match e {
            RequestError::Network(_) | RequestError::RetryAfter(_) | RequestError::Io(_) => {
                Self::Retriable(e.to_string())
            }
            _ => Self::Fatal(e.to_string()),
        }
    }
}

/// Messaging platform operations used by the engine.
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Long-poll for updates with id >= `offset`.
    async fn fetch_updates(
        &mut self,
        offset: Option<u32>,
        timeout_secs: u32,
    ) -> Result<Vec<Update>, TransportError>;

    async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        reply_to: Option<i32>,
    ) -> Result<(), TransportError>;

    async fn send_photo(
        &self,
        chat_id: i64,
        photo: PhotoSource,
        reply_to: Option<i32>,
    ) -> Result<SentPhoto, TransportError>;

    /// Drop the current connection and build a new one.
    async fn reconnect(&mut self) -> Result<(), TransportError>;
}

/// Telegram Bot API transport.
pub struct TelegramTransport {
    token: String,
    bot: ThrottledBot,
}

impl TelegramTransport {
    pub fn new(token: &str) -> Self {
        Self {
            token: token.to_string(),
            bot: connect(token),
        }
    }

    /// Username of the bot account, without `@`.
    pub async fn username(&self) -> Result<String, TransportError> {
        let me = self.bot.get_me().await?;
        Ok(me.username().to_string())
    }
}

// Throttle keeps to Telegram's limits:
// - 30 messages per second globally
// - 1 message per second to the same chat
// - 20 messages per minute to the same group
fn connect(token: &str) -> ThrottledBot {
    Bot::new(token).throttle(Limits::default())
}

fn photo_refs(msg: &teloxide::types::Message) -> Vec<String> {
    msg.photo()
        .map(|sizes| {
            let mut sizes = sizes.to_vec();
            sizes.sort_by_key(|p| p.width * p.height);
            sizes.into_iter().map(|p| p.file.id).collect()
        })
        .unwrap_or_default()
}

fn convert(update: teloxide::types::Update) -> Update {
    let message = match update.kind {
        UpdateKind::Message(msg) => Some(Message {
            chat_id: msg.chat.id.0,
            chat_is_private: msg.chat.is_private(),
            user_id: msg.from.as_ref().map_or(0, |u| u.id.0),
            message_id: msg.id.0,
            text: msg.text().map(str::to_string),
            photo_refs: photo_refs(&msg),
            date: msg.date,
        }),
        _ => None,
    };

    Update {
        id: update.id.0,
        message,
    }
}

impl Transport for TelegramTransport {
    async fn fetch_updates(
        &mut self,
        offset: Option<u32>,
        timeout_secs: u32,
    ) -> Result<Vec<Update>, TransportError> {
        let mut request = self.bot.get_updates().timeout(timeout_secs);
        if let Some(offset) = offset {
            request = request.offset(i32::try_from(offset).unwrap_or(i32::MAX));
        }

        let updates = request.await?;
        Ok(updates.into_iter().map(convert).collect())
    }

    async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        reply_to: Option<i32>,
    ) -> Result<(), TransportError> {
        let mut request = self.bot.send_message(ChatId(chat_id), text);
        if let Some(id) = reply_to {
            request = request.reply_parameters(ReplyParameters::new(MessageId(id)));
        }
        request.await?;
        Ok(())
    }

    async fn send_photo(
        &self,
        chat_id: i64,
        photo: PhotoSource,
        reply_to: Option<i32>,
    ) -> Result<SentPhoto, TransportError> {
        let file = match photo {
            PhotoSource::FileId(id) => InputFile::file_id(id),
            PhotoSource::Path(path) => InputFile::file(path),
        };

        let mut request = self.bot.send_photo(ChatId(chat_id), file);
        if let Some(id) = reply_to {
            request = request.reply_parameters(ReplyParameters::new(MessageId(id)));
        }

        let sent = request.await?;
        Ok(SentPhoto {
            message_id: sent.id.0,
            photo_refs: photo_refs(&sent),
        })
    }

    async fn reconnect(&mut self) -> Result<(), TransportError> {
        info!("Re-establishing Telegram connection");
        self.bot = connect(&self.token);
        Ok(())
    }
}
