//! Replybot - keyword-response Telegram bot
//!
//! Answers keyword triggers from a MongoDB-backed table, runs a handful of
//! commands (dice, fortunes, message of the day, photo lookups) and tells
//! off users who repeat themselves.
//!
//! ## Architecture
//!
//! - `config` - Environment configuration
//! - `i18n` - User-facing string table
//! - `database` - MongoDB keyword tables, keyword index, motd file
//! - `cache` - Bounded in-memory state with Moka
//! - `permissions` - Chat tier checks
//! - `events` - Repeated-message guard
//! - `plugins` - Command handlers
//! - `bot` - Transport, dispatcher and polling loop
//! - `utils` - Utility functions

mod bot;
mod cache;
mod config;
mod database;
mod events;
mod i18n;
mod permissions;
mod plugins;
mod utils;

#[cfg(test)]
mod testing;

use std::fs::OpenOptions;
use std::sync::Mutex;

use tracing::info;
use tracing_subscriber::EnvFilter;

use bot::{BotEngine, RunOptions, TelegramTransport};
use config::Config;
use database::{Database, KeywordIndex, KeywordRepository, MotdStore};
use i18n::Strings;
use permissions::Permissions;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

/// Log to stderr, or append to `LOG_FILE` when set.
fn init_logging() -> anyhow::Result<()> {
    // If RUST_LOG is not set, default to "info" level for our crate
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("replybot=info,teloxide=warn"));

    match std::env::var("LOG_FILE").ok().filter(|p| !p.is_empty()) {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(&path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file first (before anything else)
    dotenvy::dotenv().ok();
    init_logging()?;

    info!("Starting replybot...");

    let config = Config::from_env()?;
    info!("Configuration loaded successfully");

    let strings = match &config.strings_path {
        Some(path) => Strings::load(path)?,
        None => Strings::builtin(),
    };

    let motd = MotdStore::load(&config.motd_path)?;

    info!("Connecting to MongoDB...");
    let db = Database::connect(&config.mongodb_uri, &config.mongodb_database).await?;
    let store = KeywordRepository::new(&db);
    let index = KeywordIndex::load(&store).await?;

    let transport = TelegramTransport::new(&config.bot_token);
    let bot_username = match config.bot_username.clone() {
        Some(username) => username,
        None => transport.username().await?,
    };
    info!("Using bot username: @{}", bot_username);
    info!("Bot admins: {:?}", config.admin_ids);

    let mut engine = BotEngine::new(
        transport,
        store,
        index,
        motd,
        strings,
        Permissions::from_config(&config),
    )
    .with_bot_username(bot_username)
    .with_images_dir(config.images_dir.clone());

    let options = RunOptions {
        poll_timeout_secs: config.poll_timeout_secs,
        skip_backlog: config.skip_backlog,
    };

    bot::run(&mut engine, options, bot::shutdown_signal()).await;

    info!("Bye");
    Ok(())
}
