//! Message of the day.
//!
//! `/motd` or any trigger phrase shows the chat's message; an admin's
//! `/motd <text>` replaces it. Group chats only.

use tracing::info;

use crate::bot::dispatcher::{BotEngine, CommandContext};
use crate::bot::transport::Transport;
use crate::database::{KeywordStore, MotdStatus};
use crate::i18n::Strings;
use crate::plugins::is_command;
use crate::utils::{command_args, fill};

const MOTD_COMMAND: &str = "/motd";

/// Whether the message asks for (or sets) the message of the day.
pub fn is_motd_request(ctx: &CommandContext, strings: &Strings) -> bool {
    is_command(&ctx.lowered, MOTD_COMMAND)
        || strings
            .list("motd.triggers")
            .iter()
            .any(|trigger| ctx.lowered.contains(&trigger.to_lowercase()))
}

pub async fn motd_command<T: Transport, S: KeywordStore>(
    engine: &mut BotEngine<T, S>,
    ctx: &CommandContext,
) -> anyhow::Result<()> {
    if ctx.chat_is_private {
        let text = engine.strings.text("motd.group_only");
        engine.reply(ctx, &text).await?;
        return Ok(());
    }

    let today = ctx.date.date_naive();

    let new_motd = if is_command(&ctx.lowered, MOTD_COMMAND) {
        command_args(&ctx.text)
    } else {
        ""
    };

    if !new_motd.is_empty() && ctx.admin {
        engine.motd.update(ctx.chat_id, new_motd, today)?;
        info!("Motd for chat {} set by user {}", ctx.chat_id, ctx.user_id);

        let text = fill(
            &engine.strings.text("motd.updated"),
            &[("date", &today.format("%Y-%m-%d").to_string())],
        );
        engine.reply(ctx, &text).await?;
        return Ok(());
    }

    let text = match engine.motd.status(ctx.chat_id, today) {
        MotdStatus::Missing => engine.strings.text("motd.none"),
        MotdStatus::Stale(entry) => fill(
            &engine.strings.text("motd.stale"),
            &[
                ("date", &entry.date.format("%Y-%m-%d").to_string()),
                ("motd", &entry.msg),
            ],
        ),
        MotdStatus::Fresh(entry) => fill(
            &engine.strings.text("motd.fresh"),
            &[
                ("date", &entry.date.format("%Y-%m-%d").to_string()),
                ("motd", &entry.msg),
            ],
        ),
    };

    engine.reply(ctx, &text).await?;
    Ok(())
}
