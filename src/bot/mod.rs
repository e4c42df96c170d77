//! Update dispatch loop.
//!
//! A single long-polling consumer owns the getUpdates offset. Updates are
//! routed by kind: private messages feed the command and session handlers,
//! channel posts feed the monitor. Long-running mirror jobs are spawned off
//! the loop so monitoring keeps flowing while a range transfer runs.
//!
//! Transport failures back off briefly and resume; the loop exits promptly
//! when shutdown is signalled.

mod commands;

use std::time::Duration;

use tokio::sync::watch;

use crate::config::{DISPATCH_RETRY_DELAY_SECS, LONG_POLL_TIMEOUT_SECS};
use crate::error::AppError;
use crate::monitor;
use crate::state::AppState;
use crate::telegram::{TelegramError, Update};

/// Run the dispatcher until shutdown is signalled
pub async fn run(state: AppState, mut shutdown: watch::Receiver<bool>) {
    let client = state.telegram.client().clone();
    let mut offset: Option<i64> = None;

    tracing::info!("Update dispatcher started");

    loop {
        let result = tokio::select! {
            _ = shutdown.changed() => {
                tracing::info!("Update dispatcher stopping");
                return;
            }
            result = client.get_updates(offset, LONG_POLL_TIMEOUT_SECS) => result,
        };

        match result {
            Ok(updates) => {
                for update in updates {
                    // Acknowledge the update whether or not handling works;
                    // redelivery would repeat side effects, not fix them
                    offset = Some(update.update_id + 1);
                    if let Err(e) = route_update(&state, &update).await {
                        tracing::warn!(
                            error = %e,
                            update_id = update.update_id,
                            "Failed to handle update"
                        );
                    }
                }
            }
            Err(TelegramError::FloodWait { retry_after }) => {
                tracing::warn!(retry_after, "Flood wait on getUpdates");
                if backoff(&mut shutdown, retry_after).await {
                    return;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "getUpdates failed, backing off");
                if backoff(&mut shutdown, DISPATCH_RETRY_DELAY_SECS).await {
                    return;
                }
            }
        }
    }
}

/// Sleep for the given number of seconds; returns true if shutdown was
/// signalled during the wait
async fn backoff(shutdown: &mut watch::Receiver<bool>, secs: u64) -> bool {
    tokio::select! {
        _ = shutdown.changed() => {
            tracing::info!("Update dispatcher stopping");
            true
        }
        _ = tokio::time::sleep(Duration::from_secs(secs)) => false,
    }
}

async fn route_update(state: &AppState, update: &Update) -> Result<(), AppError> {
    if let Some(msg) = &update.message {
        if msg.chat.kind == "private" {
            commands::handle_private_message(state, msg).await?;
        }
    } else if let Some(post) = &update.channel_post {
        monitor::handle_channel_post(state, post).await?;
    }
    Ok(())
}
