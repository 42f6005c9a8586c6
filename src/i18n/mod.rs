//! Localized string table.
//!
//! Every user-facing phrase (trigger phrases included) lives in a JSON table
//! addressed with dot-notation keys, e.g. `"motd.updated"`. Values are either
//! strings or arrays of strings (phrase pools).

use std::path::Path;

use chrono::format::{Item, StrftimeItems};
use rand::Rng;
use rand::seq::SliceRandom;
use serde_json::Value;

use crate::config::ConfigError;

/// Keys that must resolve to a string.
const REQUIRED_TEXT: &[&str] = &[
    "status.query",
    "status.running",
    "status.stopped",
    "control.resume",
    "control.resumed",
    "control.stop",
    "control.stopped",
    "control.stop_denied",
    "control.reload",
    "control.reloaded",
    "control.reload_denied",
    "control.reload_failed",
    "photos.accept_on",
    "photos.accept_on_ok",
    "photos.accept_on_denied",
    "photos.accept_off",
    "photos.accept_off_ok",
    "photos.accept_off_denied",
    "photos.bulk_upload",
    "photos.bulk_empty",
    "motd.updated",
    "motd.none",
    "motd.stale",
    "motd.fresh",
    "motd.group_only",
    "fortune.yesterday",
    "fortune.today",
    "fortune.tomorrow",
    "fortune.suffix",
    "fortune.salt",
    "fortune.reply",
    "roll.usage",
    "roll.range",
    "roll.dice",
    "roll.dice_modified",
    "roll.successes",
    "get.usage",
    "get.nothing",
    "adm.unknown",
    "adm.usage",
    "adm.alias_conflict",
    "adm.removed",
    "adm.not_found",
    "adm.photo_failed",
    "adm.kw_header",
    "adm.get_header",
    "adm.no_tag",
    "register.notice",
    "help.text",
    "common.apology",
];

/// Keys that must resolve to a non-empty array of strings.
const REQUIRED_LISTS: &[&str] = &[
    "flood.phrases",
    "flood.invasive_phrases",
    "motd.triggers",
    "fortune.levels",
];

/// Trigger phrases; an empty one would match every message.
const NON_EMPTY_TEXT: &[&str] = &[
    "status.query",
    "control.resume",
    "control.stop",
    "control.reload",
    "photos.accept_on",
    "photos.accept_off",
    "photos.bulk_upload",
];

/// Validated string table.
#[derive(Debug, Clone)]
pub struct Strings {
    table: Value,
}

impl Strings {
    /// The embedded English table.
    pub fn builtin() -> Self {
        let table = serde_json::from_str(include_str!("en.json"))
            .unwrap_or_else(|_| Value::Object(Default::default()));
        Self { table }
    }

    /// Load and validate a table from disk.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::StringsIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    /// Parse and validate a table.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let strings = Self {
            table: serde_json::from_str(raw)?,
        };
        strings.validate()?;
        Ok(strings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for key in REQUIRED_TEXT {
            if self.lookup(key).and_then(Value::as_str).is_none() {
                return Err(ConfigError::MissingString(key.to_string()));
            }
        }

        for key in REQUIRED_LISTS {
            if self.list(key).is_empty() {
                return Err(ConfigError::MissingString(key.to_string()));
            }
        }

        for key in NON_EMPTY_TEXT {
            if self.text(key).trim().is_empty() {
                return Err(ConfigError::InvalidString {
                    key: key.to_string(),
                    reason: "trigger phrase is empty".to_string(),
                });
            }
        }

        let salt = self.text("fortune.salt");
        if StrftimeItems::new(&salt).any(|item| matches!(item, Item::Error)) {
            return Err(ConfigError::InvalidString {
                key: "fortune.salt".to_string(),
                reason: "not a valid date format".to_string(),
            });
        }

        Ok(())
    }

    /// Get text for a key. Falls back to the key itself.
    pub fn text(&self, key: &str) -> String {
        self.lookup(key)
            .and_then(Value::as_str)
            .map_or_else(|| key.to_string(), str::to_string)
    }

    /// Get a phrase list for a key. Missing keys yield an empty list.
    pub fn list(&self, key: &str) -> Vec<String> {
        self.lookup(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Pick a random phrase from one or more pools.
    pub fn pick<R: Rng>(&self, keys: &[&str], rng: &mut R) -> Option<String> {
        let pool: Vec<String> = keys.iter().flat_map(|key| self.list(key)).collect();
        pool.choose(rng).cloned()
    }

    fn lookup(&self, key: &str) -> Option<&Value> {
        key.split('.').try_fold(&self.table, |current, part| current.get(part))
    }
}
