//! Telegram worker that processes requests from priority queues
//!
//! Each worker pulls requests from shared priority queues and executes them
//! against the Bot API. High-priority requests (operator-facing) are
//! processed before normal and low-priority requests. Aging prevents
//! starvation of low-priority requests under sustained high load.
//!
//! Rate limiting: short flood waits are absorbed here with a bounded number
//! of retries; longer waits are returned to the caller so jobs can announce
//! the pause and resume at the same position.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use async_channel::Receiver;
use tracing::instrument;
use uuid::Uuid;

use crate::config::{
    FLOOD_WAIT_MAX_RETRIES, FLOOD_WAIT_WORKER_MAX_SECS, TELEGRAM_PRIORITY_AGING_SECS,
};

use super::client::BotApiClient;
use super::messages::{TelegramError, TelegramRequest, TelegramResponse};

/// Priority queue receivers for the worker.
///
/// Groups the three priority-level queue receivers that workers pull
/// requests from.
pub struct WorkerQueues {
    /// High-priority request queue (operator-facing sends/edits)
    pub high: Receiver<TelegramRequest>,
    /// Normal-priority request queue (mirror transfers)
    pub normal: Receiver<TelegramRequest>,
    /// Low-priority request queue (background lookups)
    pub low: Receiver<TelegramRequest>,
}

/// Worker that processes Telegram requests from priority queues
pub struct TelegramWorker {
    id: usize,
    client: BotApiClient,
    /// Directory for temporary media downloads
    temp_dir: PathBuf,
    /// Priority queue receivers
    queues: WorkerQueues,
}

impl TelegramWorker {
    pub fn new(id: usize, client: BotApiClient, temp_dir: PathBuf, queues: WorkerQueues) -> Self {
        Self {
            id,
            client,
            temp_dir,
            queues,
        }
    }

    /// Receive the next request, respecting priority with aging to prevent
    /// starvation.
    ///
    /// Priority order: High > Normal > Low
    /// Aging: If low-priority requests have been waiting longer than
    /// TELEGRAM_PRIORITY_AGING_SECS, process one low-priority request to
    /// prevent indefinite starvation.
    #[allow(clippy::never_loop)] // Loop is intentional for tokio::select! pattern
    async fn recv_prioritized(
        &self,
        last_low_process: &mut Instant,
    ) -> Result<TelegramRequest, async_channel::RecvError> {
        loop {
            // Check for aging: if the low-priority queue hasn't been serviced
            // recently, process one low-priority request
            let should_check_aging =
                last_low_process.elapsed().as_secs() >= TELEGRAM_PRIORITY_AGING_SECS;

            if should_check_aging {
                if let Ok(req) = self.queues.low.try_recv() {
                    *last_low_process = Instant::now();
                    tracing::trace!(
                        priority = "low",
                        reason = "aging",
                        "Processing aged low-priority request"
                    );
                    return Ok(req);
                }
            }

            // Try high priority (non-blocking)
            if let Ok(req) = self.queues.high.try_recv() {
                return Ok(req);
            }

            // Try normal priority (non-blocking)
            if let Ok(req) = self.queues.normal.try_recv() {
                return Ok(req);
            }

            // Try low priority (non-blocking)
            if let Ok(req) = self.queues.low.try_recv() {
                *last_low_process = Instant::now();
                return Ok(req);
            }

            // All queues empty - wait for any request using biased select
            // to maintain priority order when multiple arrive simultaneously
            tokio::select! {
                biased;

                result = self.queues.high.recv() => return result,
                result = self.queues.normal.recv() => return result,
                result = self.queues.low.recv() => {
                    *last_low_process = Instant::now();
                    return result;
                }
            }
        }
    }

    /// Run the worker loop until the request channels close
    #[instrument(name = "telegram.worker", skip(self), fields(worker_id = self.id))]
    pub async fn run(self) {
        tracing::info!("Worker starting");

        // Track when we last processed a low-priority request (for aging)
        let mut last_low_process = Instant::now();

        loop {
            let request = match self.recv_prioritized(&mut last_low_process).await {
                Ok(req) => req,
                Err(_) => {
                    tracing::info!("Request channels closed, worker shutting down");
                    return;
                }
            };

            // Log queue depths at trace level for monitoring
            tracing::trace!(
                high_depth = self.queues.high.len(),
                normal_depth = self.queues.normal.len(),
                low_depth = self.queues.low.len(),
                priority = %request.priority(),
                "Processing request"
            );

            let result = self.handle_request(&request).await;
            request.respond(result);
        }
    }

    /// Handle a single request, absorbing short flood waits
    #[instrument(
        name = "telegram.worker.handle_request",
        skip(self, request),
        fields(operation = request.operation(), duration_ms)
    )]
    async fn handle_request(
        &self,
        request: &TelegramRequest,
    ) -> Result<TelegramResponse, TelegramError> {
        let start = Instant::now();
        let mut attempts = 0u32;

        let result = loop {
            match self.handle_request_inner(request).await {
                Err(TelegramError::FloodWait { retry_after })
                    if retry_after <= FLOOD_WAIT_WORKER_MAX_SECS
                        && attempts < FLOOD_WAIT_MAX_RETRIES =>
                {
                    attempts += 1;
                    tracing::warn!(retry_after, attempts, "Flood wait, retrying after delay");
                    tokio::time::sleep(Duration::from_secs(retry_after)).await;
                }
                other => break other,
            }
        };

        tracing::Span::current().record("duration_ms", start.elapsed().as_millis() as u64);
        result
    }

    /// Inner request handling logic
    async fn handle_request_inner(
        &self,
        request: &TelegramRequest,
    ) -> Result<TelegramResponse, TelegramError> {
        match request {
            TelegramRequest::SendMessage { chat_id, text, .. } => {
                tracing::debug!(chat_id, "Sending message");
                let message = self.client.send_message(*chat_id, text).await?;
                Ok(TelegramResponse::Sent(message))
            }

            TelegramRequest::EditMessageText {
                chat_id,
                message_id,
                text,
                ..
            } => {
                tracing::debug!(chat_id, message_id, "Editing message");
                self.client
                    .edit_message_text(*chat_id, *message_id, text)
                    .await?;
                Ok(TelegramResponse::Edited)
            }

            TelegramRequest::CopyMessage {
                from_chat,
                message_id,
                to_chat,
                ..
            } => {
                tracing::debug!(from_chat, message_id, to_chat, "Copying message");
                let copied = self
                    .client
                    .copy_message(*from_chat, *message_id, *to_chat)
                    .await?;
                tracing::debug!(copied_id = copied.message_id, "Message copied");
                Ok(TelegramResponse::Copied(copied))
            }

            TelegramRequest::DownloadUpload {
                file_id,
                file_name,
                to_chat,
                ..
            } => {
                tracing::debug!(%file_id, to_chat, "Mirroring via download-reupload");
                self.download_upload(file_id, file_name.as_deref(), *to_chat)
                    .await?;
                Ok(TelegramResponse::Mirrored)
            }

            TelegramRequest::GetChat { chat, .. } => {
                tracing::debug!(%chat, "Resolving chat");
                let info = self.client.get_chat(chat).await?;
                Ok(TelegramResponse::Chat(info))
            }
        }
    }

    /// Download a file by id into the temp directory, re-upload it as a
    /// document, and remove the temp file whether or not the upload worked
    async fn download_upload(
        &self,
        file_id: &str,
        file_name: Option<&str>,
        to_chat: i64,
    ) -> Result<(), TelegramError> {
        let file = self.client.get_file(file_id).await?;
        let Some(file_path) = file.file_path else {
            return Err(TelegramError::Transport(
                "getFile returned no file path".to_string(),
            ));
        };

        let name = file_name
            .or_else(|| file_path.rsplit('/').next())
            .unwrap_or("media.bin")
            .to_string();
        let temp_path = self.temp_dir.join(format!("media_{}", Uuid::new_v4()));

        tracing::debug!(size = ?file.file_size, name = %name, "Downloading media");
        let result = async {
            self.client.download_file(&file_path, &temp_path).await?;
            self.client.send_document(to_chat, &temp_path, &name).await?;
            Ok(())
        }
        .await;

        if let Err(e) = tokio::fs::remove_file(&temp_path).await {
            // The download may have failed before the file was created
            tracing::trace!(error = %e, path = %temp_path.display(), "Temp file cleanup skipped");
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_aging_threshold_is_10_seconds() {
        // Verify the aging threshold constant is 10 seconds as documented
        assert_eq!(TELEGRAM_PRIORITY_AGING_SECS, 10);
    }

    #[test]
    fn test_worker_retries_only_short_flood_waits() {
        // Waits at or below the threshold are retried in the worker; longer
        // waits must surface to the caller
        assert!(FLOOD_WAIT_WORKER_MAX_SECS < 10);
        assert!(FLOOD_WAIT_MAX_RETRIES > 0);
    }
}
