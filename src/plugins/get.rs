//! /get and /getid photo commands.

use tracing::debug;

use super::HandlerOutcome;
use crate::bot::dispatcher::{BotEngine, CommandContext};
use crate::bot::transport::{PhotoSource, Transport};
use crate::database::{KeywordSpace, KeywordStore};
use crate::utils::{append_smiles, command_args};

async fn reply_nothing<T: Transport, S: KeywordStore>(
    engine: &mut BotEngine<T, S>,
    ctx: &CommandContext,
) -> anyhow::Result<HandlerOutcome> {
    let text = append_smiles(&engine.strings.text("get.nothing"), &mut engine.rng);
    engine.reply(ctx, &text).await?;
    Ok(HandlerOutcome::Replied)
}

async fn reply_usage<T: Transport, S: KeywordStore>(
    engine: &mut BotEngine<T, S>,
    ctx: &CommandContext,
) -> anyhow::Result<HandlerOutcome> {
    let text = engine.strings.text("get.usage");
    engine.reply(ctx, &text).await?;
    Ok(HandlerOutcome::Replied)
}

/// `/get <keyword> [tag]`
pub async fn get_command<T: Transport, S: KeywordStore>(
    engine: &mut BotEngine<T, S>,
    ctx: &CommandContext,
) -> anyhow::Result<HandlerOutcome> {
    let mut args = command_args(&ctx.lowered).split_whitespace();
    let Some(keyword) = args.next() else {
        return reply_usage(engine, ctx).await;
    };
    let tag = args.next();

    let photo = engine.index.resolve_photo(&engine.store, keyword, tag).await?;
    let Some(photo) = photo else {
        debug!("No photo for '{}'", keyword);
        return reply_nothing(engine, ctx).await;
    };

    engine
        .transport
        .send_photo(ctx.chat_id, PhotoSource::FileId(photo), Some(ctx.message_id))
        .await?;
    Ok(HandlerOutcome::Replied)
}

/// `/getid <row id>`
pub async fn get_by_id_command<T: Transport, S: KeywordStore>(
    engine: &mut BotEngine<T, S>,
    ctx: &CommandContext,
) -> anyhow::Result<HandlerOutcome> {
    let Ok(id) = command_args(&ctx.lowered).parse::<i64>() else {
        return reply_usage(engine, ctx).await;
    };

    let Some(row) = engine.store.content_by_id(KeywordSpace::Photo, id).await? else {
        return reply_nothing(engine, ctx).await;
    };

    engine
        .transport
        .send_photo(
            ctx.chat_id,
            PhotoSource::FileId(row.content),
            Some(ctx.message_id),
        )
        .await?;
    Ok(HandlerOutcome::Replied)
}
