//! Run-mode control: reload, stop and resume.

use tracing::{info, warn};

use super::HandlerOutcome;
use crate::bot::dispatcher::{BotEngine, CommandContext};
use crate::bot::transport::Transport;
use crate::database::KeywordStore;
use crate::utils::fill;

/// Rebuild the keyword index, telling the admin about a failure.
/// Returns whether the index was rebuilt.
pub async fn refresh_index<T: Transport, S: KeywordStore>(
    engine: &mut BotEngine<T, S>,
    ctx: &CommandContext,
) -> anyhow::Result<bool> {
    match engine.index.reload(&engine.store).await {
        Ok(()) => Ok(true),
        Err(e) => {
            warn!("Keyword reload failed: {}", e);
            let text = fill(
                &engine.strings.text("control.reload_failed"),
                &[("error", &e.to_string())],
            );
            engine.reply(ctx, &text).await?;
            Ok(false)
        }
    }
}

pub async fn reload<T: Transport, S: KeywordStore>(
    engine: &mut BotEngine<T, S>,
    ctx: &CommandContext,
) -> anyhow::Result<HandlerOutcome> {
    if !refresh_index(engine, ctx).await? {
        return Ok(HandlerOutcome::Replied);
    }

    info!("Keyword index reloaded by user {}", ctx.user_id);
    Ok(HandlerOutcome::Acknowledge)
}

pub async fn stop<T: Transport, S: KeywordStore>(
    engine: &mut BotEngine<T, S>,
    ctx: &CommandContext,
) -> anyhow::Result<HandlerOutcome> {
    engine.running = false;
    info!("Bot stopped by user {}", ctx.user_id);
    Ok(HandlerOutcome::Acknowledge)
}

/// Wake a stopped bot. The keyword index is reloaded first; if that fails
/// the bot stays stopped.
pub async fn resume<T: Transport, S: KeywordStore>(
    engine: &mut BotEngine<T, S>,
    ctx: &CommandContext,
) -> anyhow::Result<()> {
    if reload(engine, ctx).await? == HandlerOutcome::Replied {
        return Ok(());
    }

    engine.running = true;
    info!("Bot resumed by user {}", ctx.user_id);
    let text = engine.strings.text("control.resumed");
    engine.reply(ctx, &text).await?;
    Ok(())
}
