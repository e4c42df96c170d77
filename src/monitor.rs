//! Channel monitoring.
//!
//! Once a range mirror completes, the source channel stays registered and
//! every new media post is mirrored as it arrives. New posts are delivered by
//! the Bot API as `channel_post` updates on the long-polling stream, so
//! monitoring is update-driven: the dispatcher hands posts from registered
//! chats to [`handle_channel_post`]. The in-memory registry mirrors the
//! persistent store and carries the per-channel high-water mark that makes
//! delivery idempotent.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;

use crate::error::AppError;
use crate::state::AppState;
use crate::store::MonitorStore;
use crate::telegram::{Message, TelegramError};

/// A channel being monitored in this process
#[derive(Debug, Clone)]
pub struct ActiveMonitor {
    pub name: String,
    /// Highest message id mirrored so far
    pub last_msg_id: i64,
}

/// In-memory registry of monitored channels
#[derive(Clone)]
pub struct MonitorRegistry {
    active: Arc<RwLock<HashMap<i64, ActiveMonitor>>>,
}

impl MonitorRegistry {
    pub fn new() -> Self {
        Self {
            active: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn insert(&self, chat_id: i64, name: String, last_msg_id: i64) {
        self.active
            .write()
            .await
            .insert(chat_id, ActiveMonitor { name, last_msg_id });
    }

    pub async fn get(&self, chat_id: i64) -> Option<ActiveMonitor> {
        self.active.read().await.get(&chat_id).cloned()
    }

    pub async fn is_active(&self, chat_id: i64) -> bool {
        self.active.read().await.contains_key(&chat_id)
    }

    /// Advance a channel's high-water mark; never moves backwards
    pub async fn update_watermark(&self, chat_id: i64, msg_id: i64) {
        if let Some(monitor) = self.active.write().await.get_mut(&chat_id) {
            if msg_id > monitor.last_msg_id {
                monitor.last_msg_id = msg_id;
            }
        }
    }
}

/// Restore monitoring for every channel in the persistent registry.
/// Returns the number of channels restored.
pub async fn restore(registry: &MonitorRegistry, store: &MonitorStore) -> usize {
    let mut restored = 0;
    for (chat_id, channel) in store.list().await {
        registry
            .insert(chat_id, channel.name.clone(), channel.last_msg_id)
            .await;
        tracing::info!(
            chat_id,
            channel = %channel.name,
            last_msg_id = channel.last_msg_id,
            "Restored channel monitoring"
        );
        restored += 1;
    }
    restored
}

/// Handle a channel post from the update stream.
///
/// Posts from unregistered chats and posts at or below the high-water mark
/// are ignored. Media posts are copied to the target channel, falling back to
/// download-reupload when the channel forbids copying; the watermark advances
/// regardless of the mirror outcome so one bad message cannot wedge a
/// channel.
pub async fn handle_channel_post(state: &AppState, post: &Message) -> Result<(), AppError> {
    let chat_id = post.chat.id;
    let Some(active) = state.monitors.get(chat_id).await else {
        return Ok(());
    };
    if post.message_id <= active.last_msg_id {
        return Ok(());
    }

    if let Some(kind) = post.media_kind() {
        let target = state.config.telegram.target_channel;

        match mirror_post(state, post, target).await {
            Ok(()) => {
                tracing::info!(
                    chat_id,
                    message_id = post.message_id,
                    ?kind,
                    channel = %active.name,
                    "Mirrored new media"
                );
            }
            Err(e) => {
                tracing::warn!(
                    chat_id,
                    message_id = post.message_id,
                    channel = %active.name,
                    error = %e,
                    "Failed to mirror new media"
                );
            }
        }

        // Pace consecutive mirrors from busy channels
        tokio::time::sleep(Duration::from_secs(
            state.config.transfer.monitor_delay_seconds,
        ))
        .await;
    }

    state
        .monitors
        .update_watermark(chat_id, post.message_id)
        .await;
    state
        .store
        .advance_watermark(chat_id, post.message_id)
        .await?;
    Ok(())
}

/// Copy one post to the target, waiting out a single flood wait and falling
/// back to download-reupload when copying is forbidden
async fn mirror_post(state: &AppState, post: &Message, target: i64) -> Result<(), TelegramError> {
    let chat_id = post.chat.id;

    let mut attempt = state
        .telegram
        .copy_message(chat_id, post.message_id, target)
        .await;

    if let Err(TelegramError::FloodWait { retry_after }) = &attempt {
        tracing::warn!(retry_after, chat_id, "Flood wait while mirroring channel post");
        tokio::time::sleep(Duration::from_secs(*retry_after)).await;
        attempt = state
            .telegram
            .copy_message(chat_id, post.message_id, target)
            .await;
    }

    match attempt {
        Ok(_) => Ok(()),
        Err(e) if e.is_copy_forbidden() => {
            // Protected content: the update carries the file id, so the
            // media itself can still be fetched and re-uploaded
            let Some(file_id) = post.media_file_id() else {
                return Err(e);
            };
            tracing::debug!(chat_id, message_id = post.message_id, "Copy forbidden, re-uploading");
            state
                .telegram
                .mirror_via_upload(
                    file_id,
                    post.media_file_name().map(str::to_string),
                    target,
                )
                .await
        }
        Err(e) => Err(e),
    }
}
