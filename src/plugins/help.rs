//! /help command.

use super::HandlerOutcome;
use crate::bot::dispatcher::{BotEngine, CommandContext};
use crate::bot::transport::Transport;
use crate::database::KeywordStore;

pub async fn help_command<T: Transport, S: KeywordStore>(
    engine: &mut BotEngine<T, S>,
    ctx: &CommandContext,
) -> anyhow::Result<HandlerOutcome> {
    let text = engine.strings.text("help.text");
    engine.reply(ctx, &text).await?;
    Ok(HandlerOutcome::Replied)
}
