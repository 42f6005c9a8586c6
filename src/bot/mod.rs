//! Bot module - Core bot functionality.

pub mod dispatcher;
mod runtime;
pub mod transport;

pub use dispatcher::BotEngine;
pub use runtime::{RunOptions, run, shutdown_signal};
pub use transport::TelegramTransport;
