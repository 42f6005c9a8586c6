//! `/adm` keyword table administration.
//!
//! Subcommands:
//! - `begin_get` / `end_get`: toggle photo-accepting mode
//! - `mk_get <photo-ref> <kw> [tag]`: bind a photo to a /get keyword
//! - `getpic_id <photo-ref>`: show a photo by reference
//! - `ls_get [kw]` / `ls_kw [kw]`: list keywords, or one keyword's rows
//! - `mk_kw <kw> <content>`: add a text reply
//! - `mk_sym <kw> <alias>` / `mk_get_sym <kw> <alias>`: add an alias
//! - `rm_kw` / `rm_get` / `rm_sym` / `rm_get_sym <id>`: delete a row by id

use tracing::{info, warn};

use super::HandlerOutcome;
use super::control::refresh_index;
use crate::bot::dispatcher::{BotEngine, CommandContext};
use crate::bot::transport::{PhotoSource, Transport};
use crate::database::{KeywordSpace, KeywordStore};
use crate::utils::{command_args, fill};

/// Which table a remove command targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RowKind {
    Content,
    Alias,
}

/// Split off the first word.
fn split_word(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    match s.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (s, ""),
    }
}

/// `kw => value`, or `(alias -> kw) => value` when `keyword` was an alias.
fn echo(keyword: &str, canonical: &str, value: &str) -> String {
    if keyword == canonical {
        format!("{keyword} => {value}")
    } else {
        format!("({keyword} -> {canonical}) => {value}")
    }
}

pub async fn adm_command<T: Transport, S: KeywordStore>(
    engine: &mut BotEngine<T, S>,
    ctx: &CommandContext,
) -> anyhow::Result<HandlerOutcome> {
    let (sub, rest) = split_word(command_args(&ctx.text));
    let sub = sub.to_lowercase();
    let args: Vec<&str> = rest.split_whitespace().collect();

    info!("Admin {} ran /adm {}", ctx.user_id, sub);

    match sub.as_str() {
        "begin_get" => set_accepting(engine, ctx, true).await?,
        "end_get" => set_accepting(engine, ctx, false).await?,
        "mk_get" => match args.as_slice() {
            [photo, keyword, tag @ ..] => {
                mk_get(engine, ctx, photo, keyword, tag.first().copied()).await?
            }
            _ => usage(engine, ctx).await?,
        },
        "getpic_id" => match args.first() {
            Some(photo) => getpic(engine, ctx, photo).await?,
            None => usage(engine, ctx).await?,
        },
        "ls_get" => list(engine, ctx, KeywordSpace::Photo, args.first().copied()).await?,
        "ls_kw" => list(engine, ctx, KeywordSpace::Text, args.first().copied()).await?,
        "mk_kw" => {
            let (keyword, content) = split_word(rest);
            if keyword.is_empty() || content.is_empty() {
                usage(engine, ctx).await?;
            } else {
                mk_kw(engine, ctx, keyword, content).await?;
            }
        }
        "mk_sym" | "mk_get_sym" => {
            let space = if sub == "mk_sym" {
                KeywordSpace::Text
            } else {
                KeywordSpace::Photo
            };
            match args.as_slice() {
                [keyword, alias, ..] => mk_sym(engine, ctx, space, keyword, alias).await?,
                _ => usage(engine, ctx).await?,
            }
        }
        "rm_kw" => remove(engine, ctx, KeywordSpace::Text, RowKind::Content, &args).await?,
        "rm_get" => remove(engine, ctx, KeywordSpace::Photo, RowKind::Content, &args).await?,
        "rm_sym" => remove(engine, ctx, KeywordSpace::Text, RowKind::Alias, &args).await?,
        "rm_get_sym" => remove(engine, ctx, KeywordSpace::Photo, RowKind::Alias, &args).await?,
        "" => usage(engine, ctx).await?,
        _ => {
            let text = engine.strings.text("adm.unknown");
            engine.reply(ctx, &text).await?;
        }
    }

    Ok(HandlerOutcome::Replied)
}

async fn usage<T: Transport, S: KeywordStore>(
    engine: &mut BotEngine<T, S>,
    ctx: &CommandContext,
) -> anyhow::Result<()> {
    let text = engine.strings.text("adm.usage");
    engine.reply(ctx, &text).await?;
    Ok(())
}

async fn set_accepting<T: Transport, S: KeywordStore>(
    engine: &mut BotEngine<T, S>,
    ctx: &CommandContext,
    on: bool,
) -> anyhow::Result<()> {
    engine.accepting_photos = on;
    let key = if on {
        "photos.accept_on_ok"
    } else {
        "photos.accept_off_ok"
    };
    let text = engine.strings.text(key);
    engine.reply(ctx, &text).await?;
    Ok(())
}

async fn mk_get<T: Transport, S: KeywordStore>(
    engine: &mut BotEngine<T, S>,
    ctx: &CommandContext,
    photo: &str,
    keyword: &str,
    tag: Option<&str>,
) -> anyhow::Result<()> {
    let keyword = keyword.to_lowercase();
    let tag = tag.map(str::to_lowercase);
    let canonical = engine.index.canonical(KeywordSpace::Photo, &keyword).to_string();

    let sent = match engine
        .transport
        .send_photo(
            ctx.chat_id,
            PhotoSource::FileId(photo.to_string()),
            Some(ctx.message_id),
        )
        .await
    {
        Ok(sent) => sent,
        Err(e) => {
            warn!("mk_get could not send {}: {}", photo, e);
            let text = fill(
                &engine.strings.text("adm.photo_failed"),
                &[("keyword", &keyword), ("photo", photo)],
            );
            engine.reply(ctx, &text).await?;
            return Ok(());
        }
    };

    engine
        .transport
        .send_text(
            ctx.chat_id,
            &echo(&keyword, &canonical, photo),
            Some(sent.message_id),
        )
        .await?;

    engine
        .store
        .insert_content(KeywordSpace::Photo, &canonical, photo, tag.as_deref())
        .await?;
    refresh_index(engine, ctx).await?;
    Ok(())
}

async fn getpic<T: Transport, S: KeywordStore>(
    engine: &mut BotEngine<T, S>,
    ctx: &CommandContext,
    photo: &str,
) -> anyhow::Result<()> {
    let result = engine
        .transport
        .send_photo(
            ctx.chat_id,
            PhotoSource::FileId(photo.to_string()),
            Some(ctx.message_id),
        )
        .await;

    if let Err(e) = result {
        warn!("getpic_id could not send {}: {}", photo, e);
        let text = fill(
            &engine.strings.text("adm.photo_failed"),
            &[("keyword", "getpic_id"), ("photo", photo)],
        );
        engine.reply(ctx, &text).await?;
    }
    Ok(())
}

async fn list<T: Transport, S: KeywordStore>(
    engine: &mut BotEngine<T, S>,
    ctx: &CommandContext,
    space: KeywordSpace,
    keyword: Option<&str>,
) -> anyhow::Result<()> {
    let Some(keyword) = keyword else {
        let header = match space {
            KeywordSpace::Text => engine.strings.text("adm.kw_header"),
            KeywordSpace::Photo => engine.strings.text("adm.get_header"),
        };
        let mut lines = vec![header];
        lines.extend(engine.index.listing(space));
        engine.reply(ctx, &lines.join("\n")).await?;
        return Ok(());
    };

    let keyword = keyword.to_lowercase();
    let canonical = engine.index.canonical(space, &keyword).to_string();
    let no_tag = engine.strings.text("adm.no_tag");

    let mut lines = vec![echo(&keyword, &canonical, "").trim_end().to_string()];
    for row in engine.store.contents(space, &canonical).await? {
        let line = match space {
            KeywordSpace::Text => format!("#{} {}", row.id, row.content),
            KeywordSpace::Photo => format!(
                "#{} {} ({})",
                row.id,
                row.content,
                row.tag.as_deref().unwrap_or(&no_tag)
            ),
        };
        lines.push(line);
    }

    engine.reply(ctx, &lines.join("\n")).await?;
    Ok(())
}

async fn mk_kw<T: Transport, S: KeywordStore>(
    engine: &mut BotEngine<T, S>,
    ctx: &CommandContext,
    keyword: &str,
    content: &str,
) -> anyhow::Result<()> {
    let keyword = keyword.to_lowercase();
    let canonical = engine.index.canonical(KeywordSpace::Text, &keyword).to_string();

    engine
        .store
        .insert_content(KeywordSpace::Text, &canonical, content, None)
        .await?;
    if !refresh_index(engine, ctx).await? {
        return Ok(());
    }

    engine.reply(ctx, &echo(&keyword, &canonical, content)).await?;
    Ok(())
}

async fn mk_sym<T: Transport, S: KeywordStore>(
    engine: &mut BotEngine<T, S>,
    ctx: &CommandContext,
    space: KeywordSpace,
    keyword: &str,
    alias: &str,
) -> anyhow::Result<()> {
    let keyword = keyword.to_lowercase();
    let alias = alias.to_lowercase();
    let canonical = engine.index.canonical(space, &keyword).to_string();

    if alias == canonical || engine.index.is_keyword(space, &alias) {
        let text = fill(&engine.strings.text("adm.alias_conflict"), &[("alias", &alias)]);
        engine.reply(ctx, &text).await?;
        return Ok(());
    }

    engine.store.insert_alias(space, &alias, &canonical).await?;
    if !refresh_index(engine, ctx).await? {
        return Ok(());
    }

    engine.reply(ctx, &format!("{alias} -> {canonical}")).await?;
    Ok(())
}

async fn remove<T: Transport, S: KeywordStore>(
    engine: &mut BotEngine<T, S>,
    ctx: &CommandContext,
    space: KeywordSpace,
    kind: RowKind,
    args: &[&str],
) -> anyhow::Result<()> {
    let Some(id) = args.first().and_then(|raw| raw.trim_start_matches('#').parse::<i64>().ok())
    else {
        return usage(engine, ctx).await;
    };

    let removed = match kind {
        RowKind::Content => engine.store.delete_content(space, id).await?,
        RowKind::Alias => engine.store.delete_alias(space, id).await?,
    };

    if removed && !refresh_index(engine, ctx).await? {
        return Ok(());
    }

    let key = if removed { "adm.removed" } else { "adm.not_found" };

    let text = fill(&engine.strings.text(key), &[("id", &id.to_string())]);
    engine.reply(ctx, &text).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_word() {
        assert_eq!(split_word("mk_kw foo bar baz"), ("mk_kw", "foo bar baz"));
        assert_eq!(split_word("  ls_kw"), ("ls_kw", ""));
        assert_eq!(split_word(""), ("", ""));
    }

    #[test]
    fn test_echo() {
        assert_eq!(echo("foo", "foo", "bar"), "foo => bar");
        assert_eq!(echo("kitty", "cat", "meow"), "(kitty -> cat) => meow");
    }
}
