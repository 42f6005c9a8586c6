//! Bot runtime - the long-polling loop.

use std::future::Future;

use tokio::pin;
use tracing::{error, info, warn};

use super::dispatcher::BotEngine;
use super::transport::Transport;
use crate::database::KeywordStore;

/// Polling behaviour.
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// Long-poll timeout handed to the transport.
    pub poll_timeout_secs: u32,
    /// Start after whatever is already queued instead of replaying it.
    pub skip_backlog: bool,
}

/// Fetch once without an offset and return the offset just past the
/// newest pending update. `None` when nothing is pending.
async fn skip_backlog<T: Transport>(transport: &mut T) -> Option<u32> {
    match transport.fetch_updates(None, 0).await {
        Ok(pending) => {
            let next = pending.iter().map(|u| u.id).max().map(|id| id + 1);
            if let Some(next) = next {
                info!("Skipping {} pending updates", pending.len());
                Some(next)
            } else {
                None
            }
        }
        Err(e) => {
            warn!("Could not fetch pending updates: {}", e);
            None
        }
    }
}

/// Resolves on Ctrl-C or, on Unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl-C"),
                    _ = sigterm.recv() => info!("Received SIGTERM"),
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await;
                info!("Received Ctrl-C");
            }
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await;
        info!("Received Ctrl-C");
    }
}

/// Poll and dispatch until `shutdown` resolves.
///
/// Updates are processed strictly in order and the offset always moves past
/// an update once it has been handled, failed or not. Fetch errors trigger
/// a reconnect; the offset is kept so nothing is skipped.
pub async fn run<T, S, F>(engine: &mut BotEngine<T, S>, options: RunOptions, shutdown: F)
where
    T: Transport,
    S: KeywordStore,
    F: Future<Output = ()>,
{
    pin!(shutdown);

    let mut offset = if options.skip_backlog {
        skip_backlog(&mut engine.transport).await
    } else {
        None
    };

    info!("Polling for updates...");

    loop {
        let fetched = tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown requested, leaving polling loop");
                break;
            }
            fetched = engine.transport.fetch_updates(offset, options.poll_timeout_secs) => fetched,
        };

        let updates = match fetched {
            Ok(updates) => updates,
            Err(e) => {
                if e.is_retriable() {
                    warn!("Polling failed: {}", e);
                } else {
                    error!("Polling failed: {}", e);
                }

                if let Err(e) = engine.transport.reconnect().await {
                    error!("Reconnect failed: {}", e);
                }

                if offset.is_none() && options.skip_backlog {
                    offset = skip_backlog(&mut engine.transport).await;
                }
                continue;
            }
        };

        for update in updates {
            engine.handle_update(&update).await;
            offset = Some(update.id + 1);
        }
    }
}
