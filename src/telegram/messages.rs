//! Message types for the Telegram worker pool
//!
//! These messages are sent from the TelegramService to worker tasks via
//! async_channel, with responses sent back via oneshot channels. Requests are
//! prioritized so operator-facing sends and edits are processed before bulk
//! transfers, and transfers before background lookups.

use std::fmt;

use tokio::sync::oneshot;

use super::types::{Chat, ChatRef, Message, MessageId};

/// Priority levels for Telegram operations.
///
/// Higher priority requests are processed before lower priority ones so the
/// operator keeps getting feedback while a bulk mirror is running. Aging
/// prevents starvation of low-priority requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    /// Operator-facing sends and status edits
    High,
    /// Mirror transfers (copyMessage, download-reupload)
    Normal,
    /// Background lookups (getChat)
    Low,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::High => write!(f, "high"),
            Priority::Normal => write!(f, "normal"),
            Priority::Low => write!(f, "low"),
        }
    }
}

/// Error type for Telegram operations that can be sent across channels
#[derive(Debug, Clone, thiserror::Error)]
pub enum TelegramError {
    /// The API rejected the request
    #[error("Telegram API error {code}: {description}")]
    Api { code: i64, description: String },

    /// Rate limited; retry after the given number of seconds
    #[error("flood wait: retry after {retry_after}s")]
    FloodWait { retry_after: u64 },

    /// HTTP transport or decoding failure
    #[error("transport error: {0}")]
    Transport(String),

    /// Local file I/O failure during a media transfer
    #[error("io error: {0}")]
    Io(String),

    /// No worker answered within the request timeout
    #[error("request timeout")]
    Timeout,

    /// The worker pool has shut down
    #[error("worker pool closed")]
    PoolClosed,
}

impl From<reqwest::Error> for TelegramError {
    fn from(err: reqwest::Error) -> Self {
        TelegramError::Transport(err.to_string())
    }
}

impl From<std::io::Error> for TelegramError {
    fn from(err: std::io::Error) -> Self {
        TelegramError::Io(err.to_string())
    }
}

impl TelegramError {
    /// True for "message to copy not found" and similar: the source message
    /// was deleted or never existed, so the id should be skipped
    pub fn is_not_found(&self) -> bool {
        match self {
            TelegramError::Api { description, .. } => {
                description.to_lowercase().contains("not found")
            }
            _ => false,
        }
    }

    /// True when the API refuses to copy a message (protected content or a
    /// service message); the caller may fall back to download-reupload
    pub fn is_copy_forbidden(&self) -> bool {
        match self {
            TelegramError::Api { description, .. } => {
                let description = description.to_lowercase();
                description.contains("can't be copied")
                    || description.contains("can't be forwarded")
            }
            _ => false,
        }
    }
}

/// Request messages sent to Telegram workers
pub enum TelegramRequest {
    /// Send a text message
    SendMessage {
        chat_id: i64,
        text: String,
        response: oneshot::Sender<Result<Message, TelegramError>>,
    },
    /// Edit a previously sent text message
    EditMessageText {
        chat_id: i64,
        message_id: i64,
        text: String,
        response: oneshot::Sender<Result<(), TelegramError>>,
    },
    /// Copy a single message into another chat
    CopyMessage {
        from_chat: i64,
        message_id: i64,
        to_chat: i64,
        response: oneshot::Sender<Result<MessageId, TelegramError>>,
    },
    /// Download a file by id and re-upload it as a document
    DownloadUpload {
        file_id: String,
        file_name: Option<String>,
        to_chat: i64,
        response: oneshot::Sender<Result<(), TelegramError>>,
    },
    /// Resolve chat metadata (title, numeric id)
    GetChat {
        chat: ChatRef,
        response: oneshot::Sender<Result<Chat, TelegramError>>,
    },
}

impl TelegramRequest {
    /// Get the priority level for this request type.
    ///
    /// Priority is determined by how latency-sensitive the operation is:
    /// - High: the operator is looking at the chat and waiting
    /// - Normal: bulk mirror operations
    /// - Low: metadata lookups that tolerate delay
    pub fn priority(&self) -> Priority {
        match self {
            TelegramRequest::SendMessage { .. } | TelegramRequest::EditMessageText { .. } => {
                Priority::High
            }
            TelegramRequest::CopyMessage { .. } | TelegramRequest::DownloadUpload { .. } => {
                Priority::Normal
            }
            TelegramRequest::GetChat { .. } => Priority::Low,
        }
    }

    /// Short operation name for tracing spans
    pub fn operation(&self) -> &'static str {
        match self {
            TelegramRequest::SendMessage { .. } => "send_message",
            TelegramRequest::EditMessageText { .. } => "edit_message_text",
            TelegramRequest::CopyMessage { .. } => "copy_message",
            TelegramRequest::DownloadUpload { .. } => "download_upload",
            TelegramRequest::GetChat { .. } => "get_chat",
        }
    }

    /// Send the response for this request
    pub fn respond(self, result: Result<TelegramResponse, TelegramError>) {
        match self {
            TelegramRequest::SendMessage { response, .. } => {
                if let Ok(TelegramResponse::Sent(message)) = result {
                    let _ = response.send(Ok(message));
                } else if let Err(e) = result {
                    let _ = response.send(Err(e));
                }
            }
            TelegramRequest::EditMessageText { response, .. } => {
                if let Ok(TelegramResponse::Edited) = result {
                    let _ = response.send(Ok(()));
                } else if let Err(e) = result {
                    let _ = response.send(Err(e));
                }
            }
            TelegramRequest::CopyMessage { response, .. } => {
                if let Ok(TelegramResponse::Copied(id)) = result {
                    let _ = response.send(Ok(id));
                } else if let Err(e) = result {
                    let _ = response.send(Err(e));
                }
            }
            TelegramRequest::DownloadUpload { response, .. } => {
                if let Ok(TelegramResponse::Mirrored) = result {
                    let _ = response.send(Ok(()));
                } else if let Err(e) = result {
                    let _ = response.send(Err(e));
                }
            }
            TelegramRequest::GetChat { response, .. } => {
                if let Ok(TelegramResponse::Chat(chat)) = result {
                    let _ = response.send(Ok(chat));
                } else if let Err(e) = result {
                    let _ = response.send(Err(e));
                }
            }
        }
    }
}

/// Response types from Telegram operations
pub enum TelegramResponse {
    Sent(Message),
    Edited,
    Copied(MessageId),
    Mirrored,
    Chat(Chat),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::oneshot;

    #[test]
    fn test_priority_send_message_is_high() {
        let (tx, _rx) = oneshot::channel();
        let req = TelegramRequest::SendMessage {
            chat_id: 42,
            text: "hello".to_string(),
            response: tx,
        };
        assert_eq!(req.priority(), Priority::High);
    }

    #[test]
    fn test_priority_edit_message_is_high() {
        let (tx, _rx) = oneshot::channel();
        let req = TelegramRequest::EditMessageText {
            chat_id: 42,
            message_id: 7,
            text: "progress".to_string(),
            response: tx,
        };
        assert_eq!(req.priority(), Priority::High);
    }

    #[test]
    fn test_priority_copy_message_is_normal() {
        let (tx, _rx) = oneshot::channel();
        let req = TelegramRequest::CopyMessage {
            from_chat: -100,
            message_id: 1,
            to_chat: -200,
            response: tx,
        };
        assert_eq!(req.priority(), Priority::Normal);
    }

    #[test]
    fn test_priority_download_upload_is_normal() {
        let (tx, _rx) = oneshot::channel();
        let req = TelegramRequest::DownloadUpload {
            file_id: "f".to_string(),
            file_name: None,
            to_chat: -200,
            response: tx,
        };
        assert_eq!(req.priority(), Priority::Normal);
    }

    #[test]
    fn test_priority_get_chat_is_low() {
        let (tx, _rx) = oneshot::channel();
        let req = TelegramRequest::GetChat {
            chat: ChatRef::Username("durov".to_string()),
            response: tx,
        };
        assert_eq!(req.priority(), Priority::Low);
    }

    #[test]
    fn test_priority_display() {
        assert_eq!(format!("{}", Priority::High), "high");
        assert_eq!(format!("{}", Priority::Normal), "normal");
        assert_eq!(format!("{}", Priority::Low), "low");
    }

    #[test]
    fn test_priority_ordering() {
        // High < Normal < Low in the Ord implementation (smaller = higher priority)
        assert!(Priority::High < Priority::Normal);
        assert!(Priority::Normal < Priority::Low);
    }

    #[test]
    fn test_not_found_detection() {
        let err = TelegramError::Api {
            code: 400,
            description: "Bad Request: message to copy not found".to_string(),
        };
        assert!(err.is_not_found());
        assert!(!err.is_copy_forbidden());
    }

    #[test]
    fn test_copy_forbidden_detection() {
        let err = TelegramError::Api {
            code: 400,
            description: "Bad Request: message can't be copied".to_string(),
        };
        assert!(err.is_copy_forbidden());
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_flood_wait_is_neither() {
        let err = TelegramError::FloodWait { retry_after: 30 };
        assert!(!err.is_not_found());
        assert!(!err.is_copy_forbidden());
    }

    #[test]
    fn test_error_display() {
        let err = TelegramError::FloodWait { retry_after: 30 };
        assert_eq!(format!("{}", err), "flood wait: retry after 30s");
    }
}
