//! Photo harvesting.
//!
//! While photo-accepting mode is on, photos sent by admins are echoed back
//! with their platform reference so they can be bound to keywords later.
//! The bulk upload phrase does the same for every `*.jpg` in the image
//! directory.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::HandlerOutcome;
use crate::bot::dispatcher::{BotEngine, CommandContext};
use crate::bot::transport::{Message, PhotoSource, Transport};
use crate::database::KeywordStore;

pub fn accept_photos<T: Transport, S: KeywordStore>(
    engine: &mut BotEngine<T, S>,
    on: bool,
) -> HandlerOutcome {
    engine.accepting_photos = on;
    info!("Photo accepting mode: {}", on);
    HandlerOutcome::Acknowledge
}

/// Send a photo and answer the sent message with its reference.
/// Failures are logged only.
async fn send_and_label<T: Transport, S: KeywordStore>(
    engine: &BotEngine<T, S>,
    chat_id: i64,
    photo: PhotoSource,
    reply_to: Option<i32>,
) {
    let sent = match engine.transport.send_photo(chat_id, photo, reply_to).await {
        Ok(sent) => sent,
        Err(e) => {
            warn!("Failed to send photo to chat {}: {}", chat_id, e);
            return;
        }
    };

    let Some(photo_ref) = sent.photo_refs.last() else {
        return;
    };

    if let Err(e) = engine
        .transport
        .send_text(chat_id, photo_ref, Some(sent.message_id))
        .await
    {
        warn!("Failed to label photo in chat {}: {}", chat_id, e);
    }
}

/// Echo an admin's photo while photo-accepting mode is on.
/// Returns whether the photo was taken.
pub async fn relay_photo<T: Transport, S: KeywordStore>(
    engine: &BotEngine<T, S>,
    msg: &Message,
) -> bool {
    if !engine.accepting_photos || !engine.permissions.is_admin(msg.user_id) {
        return false;
    }

    let Some(photo_ref) = msg.photo_refs.last() else {
        return false;
    };

    send_and_label(
        engine,
        msg.chat_id,
        PhotoSource::FileId(photo_ref.clone()),
        Some(msg.message_id),
    )
    .await;
    true
}

/// Every `*.jpg` directly inside `dir`, sorted by path.
fn list_images(dir: &Path) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Cannot read image directory {}: {}", dir.display(), e);
            return Vec::new();
        }
    };

    let mut images: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("jpg"))
        })
        .collect();
    images.sort();
    images
}

/// Upload every image in the image directory. Only admins may trigger it;
/// returns false when the message is not a bulk upload request.
pub async fn bulk_upload<T: Transport, S: KeywordStore>(
    engine: &mut BotEngine<T, S>,
    ctx: &CommandContext,
) -> anyhow::Result<bool> {
    let phrase = engine.strings.text("photos.bulk_upload").to_lowercase();
    if !ctx.admin || !ctx.lowered.starts_with(&phrase) {
        return Ok(false);
    }

    let images = list_images(&engine.images_dir);
    if images.is_empty() {
        let text = engine.strings.text("photos.bulk_empty");
        engine.reply(ctx, &text).await?;
        return Ok(true);
    }

    info!("Bulk uploading {} images to chat {}", images.len(), ctx.chat_id);
    for path in images {
        send_and_label(engine, ctx.chat_id, PhotoSource::Path(path), None).await;
    }

    Ok(true)
}
