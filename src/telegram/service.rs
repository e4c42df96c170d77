//! Telegram service backed by a prioritized worker pool
//!
//! Public operation methods enqueue requests on one of three bounded priority
//! queues and await the worker's response with a timeout. Operator-facing
//! sends stay responsive while bulk transfers are in flight because workers
//! drain the high-priority queue first. Chat metadata lookups are cached.

use std::path::PathBuf;
use std::time::Duration;

use async_channel::{Receiver, Sender};
use moka::future::Cache;
use tokio::sync::oneshot;

use crate::config::{
    AppConfig, CHAT_CACHE_MAX_CAPACITY, CHAT_CACHE_TTL_SECS,
    TELEGRAM_HIGH_PRIORITY_QUEUE_CAPACITY, TELEGRAM_LOW_PRIORITY_QUEUE_CAPACITY,
    TELEGRAM_NORMAL_PRIORITY_QUEUE_CAPACITY,
};

use super::client::BotApiClient;
use super::messages::{Priority, TelegramError, TelegramRequest};
use super::types::{Chat, ChatRef, Message, MessageId};
use super::worker::{TelegramWorker, WorkerQueues};

/// Handle to the Telegram worker pool. Cloneable; all clones share the same
/// queues, client, and cache.
#[derive(Clone)]
pub struct TelegramService {
    /// High-priority request queue (operator-facing sends/edits)
    high_tx: Sender<TelegramRequest>,
    high_rx: Receiver<TelegramRequest>,
    /// Normal-priority request queue (mirror transfers)
    normal_tx: Sender<TelegramRequest>,
    normal_rx: Receiver<TelegramRequest>,
    /// Low-priority request queue (background lookups)
    low_tx: Sender<TelegramRequest>,
    low_rx: Receiver<TelegramRequest>,
    /// Shared API client; also used directly by the long-polling dispatcher
    client: BotApiClient,
    /// End-to-end timeout for a pooled request
    request_timeout: Duration,
    /// Cache for getChat results
    chat_cache: Cache<ChatRef, Chat>,
    /// Directory for temporary media downloads
    temp_dir: PathBuf,
    worker_count: usize,
}

impl TelegramService {
    /// Create a new service from configuration. Fails if the HTTP client
    /// cannot be constructed.
    pub fn new(config: &AppConfig) -> Result<Self, TelegramError> {
        let client = BotApiClient::new(&config.telegram.api_base, &config.telegram.bot_token)?;

        // Create priority request channels with backpressure
        let (high_tx, high_rx) = async_channel::bounded(TELEGRAM_HIGH_PRIORITY_QUEUE_CAPACITY);
        let (normal_tx, normal_rx) =
            async_channel::bounded(TELEGRAM_NORMAL_PRIORITY_QUEUE_CAPACITY);
        let (low_tx, low_rx) = async_channel::bounded(TELEGRAM_LOW_PRIORITY_QUEUE_CAPACITY);

        let chat_cache = Cache::builder()
            .max_capacity(CHAT_CACHE_MAX_CAPACITY)
            .time_to_live(Duration::from_secs(CHAT_CACHE_TTL_SECS))
            .build();

        Ok(Self {
            high_tx,
            high_rx,
            normal_tx,
            normal_rx,
            low_tx,
            low_rx,
            client,
            request_timeout: Duration::from_secs(config.telegram.request_timeout_seconds),
            chat_cache,
            temp_dir: PathBuf::from(&config.storage.temp_dir),
            worker_count: config.telegram.worker_count(),
        })
    }

    /// Direct access to the API client for the single long-polling consumer.
    /// Everything else should go through the pooled operation methods.
    pub fn client(&self) -> &BotApiClient {
        &self.client
    }

    /// Spawn worker tasks for this service
    pub fn spawn_workers(&self) {
        for id in 0..self.worker_count {
            let worker = TelegramWorker::new(
                id,
                self.client.clone(),
                self.temp_dir.clone(),
                WorkerQueues {
                    high: self.high_rx.clone(),
                    normal: self.normal_rx.clone(),
                    low: self.low_rx.clone(),
                },
            );
            tokio::spawn(worker.run());
        }
        tracing::info!(count = self.worker_count, "Spawned Telegram API workers");
    }

    /// Send a request to the appropriate priority queue
    async fn send_request(&self, request: TelegramRequest) -> Result<(), TelegramError> {
        let result = match request.priority() {
            Priority::High => self.high_tx.send(request).await,
            Priority::Normal => self.normal_tx.send(request).await,
            Priority::Low => self.low_tx.send(request).await,
        };
        result.map_err(|_| TelegramError::PoolClosed)
    }

    /// Wait for a worker's response with the configured timeout
    async fn await_response<T>(
        &self,
        rx: oneshot::Receiver<Result<T, TelegramError>>,
    ) -> Result<T, TelegramError> {
        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(TelegramError::PoolClosed),
            Err(_) => Err(TelegramError::Timeout),
        }
    }

    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
    ) -> Result<Message, TelegramError> {
        let (tx, rx) = oneshot::channel();
        self.send_request(TelegramRequest::SendMessage {
            chat_id,
            text: text.to_string(),
            response: tx,
        })
        .await?;
        self.await_response(rx).await
    }

    pub async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
    ) -> Result<(), TelegramError> {
        let (tx, rx) = oneshot::channel();
        self.send_request(TelegramRequest::EditMessageText {
            chat_id,
            message_id,
            text: text.to_string(),
            response: tx,
        })
        .await?;
        self.await_response(rx).await
    }

    pub async fn copy_message(
        &self,
        from_chat: i64,
        message_id: i64,
        to_chat: i64,
    ) -> Result<MessageId, TelegramError> {
        let (tx, rx) = oneshot::channel();
        self.send_request(TelegramRequest::CopyMessage {
            from_chat,
            message_id,
            to_chat,
            response: tx,
        })
        .await?;
        self.await_response(rx).await
    }

    /// Mirror a file into a chat by downloading it and re-uploading it as a
    /// document. Used when copyMessage is refused for protected content.
    pub async fn mirror_via_upload(
        &self,
        file_id: &str,
        file_name: Option<String>,
        to_chat: i64,
    ) -> Result<(), TelegramError> {
        let (tx, rx) = oneshot::channel();
        self.send_request(TelegramRequest::DownloadUpload {
            file_id: file_id.to_string(),
            file_name,
            to_chat,
            response: tx,
        })
        .await?;
        self.await_response(rx).await
    }

    /// Resolve chat metadata, consulting the cache first
    pub async fn get_chat(&self, chat: &ChatRef) -> Result<Chat, TelegramError> {
        if let Some(cached) = self.chat_cache.get(chat).await {
            return Ok(cached);
        }

        let (tx, rx) = oneshot::channel();
        self.send_request(TelegramRequest::GetChat {
            chat: chat.clone(),
            response: tx,
        })
        .await?;
        let info = self.await_response(rx).await?;
        self.chat_cache.insert(chat.clone(), info.clone()).await;
        Ok(info)
    }
}
