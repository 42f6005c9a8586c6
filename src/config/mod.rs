//! Configuration module for the bot.
//!
//! Loads configuration from environment variables (a `.env` file is honoured).
//! List values are comma-separated.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

/// Errors raised while loading configuration or the string table.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key} has an invalid value: {value:?}")]
    Invalid { key: &'static str, value: String },

    #[error("failed to read string table {path}: {source}")]
    StringsIo {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("string table is not valid JSON: {0}")]
    StringsFormat(#[from] serde_json::Error),

    #[error("string table is missing key `{0}`")]
    MissingString(String),

    #[error("string `{key}` is invalid: {reason}")]
    InvalidString { key: String, reason: String },
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    // Telegram
    pub bot_token: String,

    /// Bot username (without @), stripped from `/cmd@username` mentions.
    /// Optional - will be fetched via getMe if not set.
    pub bot_username: Option<String>,

    /// Long-poll timeout handed to getUpdates.
    pub poll_timeout_secs: u32,

    /// Skip updates queued while the bot was offline.
    pub skip_backlog: bool,

    // Tiers
    /// Admin user IDs. Their private chats are operational too.
    pub admin_ids: Vec<u64>,
    pub operational_chats: Vec<i64>,
    pub restricted_chats: Vec<i64>,
    pub motd_only_chats: Vec<i64>,
    /// Chats that get the noisier flood phrases and random taunts.
    pub invasive_chats: Vec<i64>,

    // MongoDB
    pub mongodb_uri: String,
    pub mongodb_database: String,

    // Files
    /// String table; the embedded English table is used when unset.
    pub strings_path: Option<PathBuf>,
    pub motd_path: PathBuf,
    /// Source directory for the bulk photo upload command.
    pub images_dir: PathBuf,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let require = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let admin_ids = parse_list::<u64>("ADMIN_IDS", &require("ADMIN_IDS")?)?;
        if admin_ids.is_empty() {
            return Err(ConfigError::Missing("ADMIN_IDS"));
        }

        let list = |key: &'static str| -> Result<Vec<i64>, ConfigError> {
            get(key).map_or(Ok(Vec::new()), |raw| parse_list(key, &raw))
        };

        let poll_timeout_secs = match get("POLL_TIMEOUT_SECS") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                key: "POLL_TIMEOUT_SECS",
                value: raw,
            })?,
            None => 10,
        };

        let skip_backlog = match get("SKIP_BACKLOG").map(|v| v.to_lowercase()) {
            None => true,
            Some(v) if matches!(v.as_str(), "1" | "true" | "yes") => true,
            Some(v) if matches!(v.as_str(), "0" | "false" | "no") => false,
            Some(v) => {
                return Err(ConfigError::Invalid {
                    key: "SKIP_BACKLOG",
                    value: v,
                });
            }
        };

        // Parse bot username (strip @ if present)
        let bot_username = get("BOT_USERNAME")
            .map(|s| s.trim_start_matches('@').to_string())
            .filter(|s| !s.is_empty());

        Ok(Self {
            bot_token: require("BOT_TOKEN")?,
            bot_username,
            poll_timeout_secs,
            skip_backlog,
            admin_ids,
            operational_chats: list("OPERATIONAL_CHATS")?,
            restricted_chats: list("RESTRICTED_CHATS")?,
            motd_only_chats: list("MOTD_ONLY_CHATS")?,
            invasive_chats: list("INVASIVE_CHATS")?,
            mongodb_uri: require("MONGODB_URI")?,
            mongodb_database: get("MONGODB_DATABASE").unwrap_or_else(|| "replybot".to_string()),
            strings_path: get("STRINGS_PATH").map(PathBuf::from),
            motd_path: get("MOTD_PATH").map_or_else(|| PathBuf::from("motd.json"), PathBuf::from),
            images_dir: get("IMAGES_DIR").map_or_else(|| PathBuf::from("images"), PathBuf::from),
        })
    }
}

/// Parse a comma-separated list, rejecting malformed entries.
fn parse_list<T: FromStr>(key: &'static str, raw: &str) -> Result<Vec<T>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse().map_err(|_| ConfigError::Invalid {
                key,
                value: s.to_string(),
            })
        })
        .collect()
}
