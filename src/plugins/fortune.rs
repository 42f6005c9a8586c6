//! Daily fortune teller.
//!
//! "today's fortune" (and the yesterday/tomorrow forms) gets a level that is
//! stable for a given user and day: the level is picked from a SHA-256
//! digest of the user id and the salted date.

use std::fmt::Write;

use chrono::{NaiveDate, TimeDelta};
use sha2::{Digest, Sha256};

use super::HandlerOutcome;
use crate::bot::dispatcher::{BotEngine, CommandContext};
use crate::bot::transport::Transport;
use crate::database::KeywordStore;
use crate::i18n::Strings;
use crate::utils::fill;

/// Period keys and their day offsets.
const PERIODS: [(&str, i64); 3] = [
    ("fortune.yesterday", -1),
    ("fortune.today", 0),
    ("fortune.tomorrow", 1),
];

/// Digest byte that selects the level.
const LEVEL_BYTE: usize = 12;

/// Which period the lowercased text asks about, if any.
fn match_period(lowered: &str, strings: &Strings) -> Option<(String, i64)> {
    let suffix = strings.text("fortune.suffix").to_lowercase();

    PERIODS.iter().find_map(|(key, offset)| {
        let period = strings.text(key);
        let phrase = format!("{}{}", period.to_lowercase(), suffix);
        lowered.contains(&phrase).then_some((period, *offset))
    })
}

/// Matcher for the fortune rule.
pub fn is_fortune_query(lowered: &str, strings: &Strings) -> bool {
    match_period(lowered, strings).is_some()
}

/// Index into the level table for `user_id` on `date`.
fn level_index(user_id: u64, date: NaiveDate, salt: &str, levels: usize) -> anyhow::Result<usize> {
    let mut seed = user_id.to_string();
    write!(seed, "{}", date.format(salt))?;

    let digest = Sha256::digest(seed.as_bytes());
    Ok(usize::from(digest[LEVEL_BYTE]) % levels.max(1))
}

pub async fn fortune_command<T: Transport, S: KeywordStore>(
    engine: &mut BotEngine<T, S>,
    ctx: &CommandContext,
) -> anyhow::Result<HandlerOutcome> {
    let Some((period, offset)) = match_period(&ctx.lowered, &engine.strings) else {
        return Ok(HandlerOutcome::Replied);
    };

    let date = ctx.date.date_naive() + TimeDelta::days(offset);
    let levels = engine.strings.list("fortune.levels");
    let index = level_index(
        ctx.user_id,
        date,
        &engine.strings.text("fortune.salt"),
        levels.len(),
    )?;

    let level = levels.get(index).map_or("", String::as_str);
    let text = fill(
        &engine.strings.text("fortune.reply"),
        &[("period", &period), ("level", level)],
    );

    engine.reply(ctx, &text).await?;
    Ok(HandlerOutcome::Replied)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_period() {
        let strings = Strings::builtin();

        assert_eq!(
            match_period("what's today's fortune?", &strings),
            Some(("today's".to_string(), 0))
        );
        assert_eq!(
            match_period("yesterday's fortune", &strings),
            Some(("yesterday's".to_string(), -1))
        );
        assert_eq!(
            match_period("tomorrow's fortune pls", &strings),
            Some(("tomorrow's".to_string(), 1))
        );
        assert!(match_period("today's weather", &strings).is_none());
    }

    #[test]
    fn test_level_is_stable_per_user_and_day() {
        let salt = Strings::builtin().text("fortune.salt");
        let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();

        let a = level_index(42, day, &salt, 5).unwrap();
        let b = level_index(42, day, &salt, 5).unwrap();
        assert_eq!(a, b);
        assert!(a < 5);
    }

    #[test]
    fn test_level_varies_across_inputs() {
        let salt = Strings::builtin().text("fortune.salt");
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

        let levels: std::collections::HashSet<usize> = (0..60)
            .map(|d| level_index(42, start + TimeDelta::days(d), &salt, 5).unwrap())
            .collect();
        assert!(levels.len() > 1);
    }
}
