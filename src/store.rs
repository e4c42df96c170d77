//! Persistent monitoring registry.
//!
//! Monitored channels survive restarts in a small JSON file mapping chat id
//! to channel metadata. The file is rewritten on every mutation; a missing or
//! corrupt file is treated as an empty registry so a bad deploy never blocks
//! startup.

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

/// A channel registered for monitoring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoredChannel {
    /// Display title at registration time
    pub name: String,
    /// When the channel was registered
    pub added_at: DateTime<Utc>,
    /// Highest message id mirrored so far
    pub last_msg_id: i64,
}

/// JSON-file-backed registry of monitored channels
#[derive(Clone)]
pub struct MonitorStore {
    path: PathBuf,
    channels: Arc<Mutex<HashMap<i64, MonitoredChannel>>>,
}

impl MonitorStore {
    /// Load the registry from disk. A missing file yields an empty registry;
    /// a corrupt file is logged and replaced on the next write.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let channels = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(channels) => channels,
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        path = %path.display(),
                        "Monitoring registry is corrupt, starting empty"
                    );
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    path = %path.display(),
                    "Could not read monitoring registry, starting empty"
                );
                HashMap::new()
            }
        };

        Self {
            path,
            channels: Arc::new(Mutex::new(channels)),
        }
    }

    async fn persist(&self, channels: &HashMap<i64, MonitoredChannel>) -> io::Result<()> {
        let contents = serde_json::to_string_pretty(channels)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        tokio::fs::write(&self.path, contents).await
    }

    /// Register a channel, replacing any existing entry for the same chat
    pub async fn add(&self, chat_id: i64, channel: MonitoredChannel) -> io::Result<()> {
        let mut channels = self.channels.lock().await;
        channels.insert(chat_id, channel);
        self.persist(&channels).await
    }

    /// Advance a channel's high-water mark. Returns false if the channel is
    /// not registered or the mark would move backwards.
    pub async fn advance_watermark(&self, chat_id: i64, msg_id: i64) -> io::Result<bool> {
        let mut channels = self.channels.lock().await;
        let Some(channel) = channels.get_mut(&chat_id) else {
            return Ok(false);
        };
        if msg_id <= channel.last_msg_id {
            return Ok(false);
        }
        channel.last_msg_id = msg_id;
        self.persist(&channels).await?;
        Ok(true)
    }

    /// All registered channels, ordered by chat id for stable listings
    pub async fn list(&self) -> Vec<(i64, MonitoredChannel)> {
        let channels = self.channels.lock().await;
        let mut entries: Vec<_> = channels
            .iter()
            .map(|(id, channel)| (*id, channel.clone()))
            .collect();
        entries.sort_by_key(|(id, _)| *id);
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel(last_msg_id: i64) -> MonitoredChannel {
        MonitoredChannel {
            name: "releases".to_string(),
            added_at: Utc::now(),
            last_msg_id,
        }
    }

    #[tokio::test]
    async fn test_missing_file_is_empty_registry() {
        let dir = tempfile::tempdir().unwrap();
        let store = MonitorStore::load(dir.path().join("missing.json")).await;
        assert!(store.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_add_persists_across_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("channels.json");

        let store = MonitorStore::load(&path).await;
        store.add(-1001, channel(50)).await.unwrap();
        store.add(-1002, channel(7)).await.unwrap();

        let reloaded = MonitorStore::load(&path).await;
        let entries = reloaded.list().await;
        assert_eq!(entries.len(), 2);
        // Ordered by chat id
        assert_eq!(entries[0].0, -1002);
        assert_eq!(entries[1].0, -1001);
        assert_eq!(entries[1].1.last_msg_id, 50);
    }

    #[tokio::test]
    async fn test_watermark_advances_only_forward() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("channels.json");

        let store = MonitorStore::load(&path).await;
        store.add(-1001, channel(50)).await.unwrap();

        assert!(store.advance_watermark(-1001, 60).await.unwrap());
        assert!(!store.advance_watermark(-1001, 55).await.unwrap());
        assert!(!store.advance_watermark(-1001, 60).await.unwrap());

        let reloaded = MonitorStore::load(&path).await;
        assert_eq!(reloaded.list().await[0].1.last_msg_id, 60);
    }

    #[tokio::test]
    async fn test_watermark_for_unknown_channel_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let store = MonitorStore::load(dir.path().join("channels.json")).await;
        assert!(!store.advance_watermark(-9999, 10).await.unwrap());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_empty_registry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("channels.json");
        tokio::fs::write(&path, "{not json").await.unwrap();

        let store = MonitorStore::load(&path).await;
        assert!(store.list().await.is_empty());

        // The next write replaces the corrupt file
        store.add(-1001, channel(1)).await.unwrap();
        let reloaded = MonitorStore::load(&path).await;
        assert_eq!(reloaded.list().await.len(), 1);
    }

    #[tokio::test]
    async fn test_add_overwrites_existing_entry() {
        let dir = tempfile::tempdir().unwrap();
        let store = MonitorStore::load(dir.path().join("channels.json")).await;
        store.add(-1001, channel(10)).await.unwrap();
        store.add(-1001, channel(99)).await.unwrap();

        let entries = store.list().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].1.last_msg_id, 99);
    }
}
