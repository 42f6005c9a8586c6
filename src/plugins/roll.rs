//! /roll dice roller.
//!
//! Accepted forms:
//! - `/roll` : 1-100
//! - `/roll 1000` : 1-1000
//! - `/roll 20-30` : 20-30
//! - `/roll 2d6`, `/roll 1d20+12` : dice with optional modifier
//! - `/roll 2d6s4` : count dice showing at least 4

use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;

use super::HandlerOutcome;
use crate::bot::dispatcher::{BotEngine, CommandContext};
use crate::bot::transport::Transport;
use crate::database::KeywordStore;
use crate::i18n::Strings;
use crate::utils::{command_args, fill};

/// More dice than this are silently dropped.
const MAX_DICE: u32 = 100;

static SUCCESS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)d(\d+)s(\d+)").expect("valid success regex"));

static DICE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)d(\d+)([+-]\d+)?").expect("valid dice regex"));

static RANGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)(?:-(\d+))?").expect("valid range regex"));

/// A parsed roll request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RollSpec {
    Range { low: u32, high: u32 },
    Dice { count: u32, faces: u32, modifier: i32 },
    Successes { count: u32, faces: u32, target: u32 },
}

/// A finished roll.
#[derive(Debug, Clone, PartialEq, Eq)]
enum RollResult {
    Range { value: u32, low: u32, high: u32 },
    Dice { count: u32, faces: u32, modifier: i32, rolls: Vec<u32> },
    Successes { count: u32, faces: u32, target: u32, rolls: Vec<u32> },
}

/// Parse the lowercased argument string. `None` means show usage.
fn parse(args: &str) -> Option<RollSpec> {
    let args = args.trim();
    if args.is_empty() {
        return Some(RollSpec::Range { low: 1, high: 100 });
    }

    if let Some(caps) = SUCCESS_RE.captures(args) {
        let count: u32 = caps[1].parse().ok()?;
        let faces: u32 = caps[2].parse().ok()?;
        let target: u32 = caps[3].parse().ok()?;
        if count == 0 || faces == 0 {
            return None;
        }
        return Some(RollSpec::Successes {
            count: count.min(MAX_DICE),
            faces,
            target,
        });
    }

    if let Some(caps) = DICE_RE.captures(args) {
        let count: u32 = caps[1].parse().ok()?;
        let faces: u32 = caps[2].parse().ok()?;
        // Out-of-range modifiers fail to parse and get the usage reply.
        let modifier: i32 = match caps.get(3) {
            Some(m) => m.as_str().parse().ok()?,
            None => 0,
        };
        if count == 0 || faces == 0 {
            return None;
        }
        return Some(RollSpec::Dice {
            count: count.min(MAX_DICE),
            faces,
            modifier,
        });
    }

    if let Some(caps) = RANGE_RE.captures(args) {
        let first: u32 = caps[1].parse().ok()?;
        let (low, high) = match caps.get(2) {
            Some(m) => (first, m.as_str().parse().ok()?),
            None => (1, first),
        };
        if low > high {
            return None;
        }
        return Some(RollSpec::Range { low, high });
    }

    None
}

fn roll_dice<R: Rng>(count: u32, faces: u32, rng: &mut R) -> Vec<u32> {
    (0..count).map(|_| rng.gen_range(1..=faces)).collect()
}

fn roll<R: Rng>(spec: RollSpec, rng: &mut R) -> RollResult {
    match spec {
        RollSpec::Range { low, high } => RollResult::Range {
            value: rng.gen_range(low..=high),
            low,
            high,
        },
        RollSpec::Dice { count, faces, modifier } => RollResult::Dice {
            count,
            faces,
            modifier,
            rolls: roll_dice(count, faces, rng),
        },
        RollSpec::Successes { count, faces, target } => RollResult::Successes {
            count,
            faces,
            target,
            rolls: roll_dice(count, faces, rng),
        },
    }
}

fn join(rolls: &[u32]) -> String {
    rolls
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn render(result: &RollResult, strings: &Strings) -> String {
    match result {
        RollResult::Range { value, low, high } => fill(
            &strings.text("roll.range"),
            &[
                ("value", &value.to_string()),
                ("low", &low.to_string()),
                ("high", &high.to_string()),
            ],
        ),
        RollResult::Dice {
            count,
            faces,
            modifier,
            rolls,
        } => {
            // At most MAX_DICE rolls of u32 each, so i64 cannot overflow.
            let sum: i64 = rolls.iter().map(|&r| i64::from(r)).sum();
            let spec = format!("{count}d{faces}");
            let rolls = join(rolls);

            if *modifier == 0 {
                fill(
                    &strings.text("roll.dice"),
                    &[("spec", &spec), ("rolls", &rolls), ("sum", &sum.to_string())],
                )
            } else {
                fill(
                    &strings.text("roll.dice_modified"),
                    &[
                        ("spec", &spec),
                        ("rolls", &rolls),
                        ("sum", &sum.to_string()),
                        ("modifier", &format!("{modifier:+}")),
                        ("total", &(sum + i64::from(*modifier)).to_string()),
                    ],
                )
            }
        }
        RollResult::Successes {
            count,
            faces,
            target,
            rolls,
        } => {
            let successes = rolls.iter().filter(|&&r| r >= *target).count();
            fill(
                &strings.text("roll.successes"),
                &[
                    ("spec", &format!("{count}d{faces}s{target}")),
                    ("rolls", &join(rolls)),
                    ("target", &target.to_string()),
                    ("successes", &successes.to_string()),
                ],
            )
        }
    }
}

pub async fn roll_command<T: Transport, S: KeywordStore>(
    engine: &mut BotEngine<T, S>,
    ctx: &CommandContext,
) -> anyhow::Result<HandlerOutcome> {
    let text = match parse(command_args(&ctx.lowered)) {
        Some(spec) => {
            let result = roll(spec, &mut engine.rng);
            render(&result, &engine.strings)
        }
        None => engine.strings.text("roll.usage"),
    };

    engine.reply(ctx, &text).await?;
    Ok(HandlerOutcome::Replied)
}
