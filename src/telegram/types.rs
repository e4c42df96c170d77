//! Wire types for the Telegram Bot API.
//!
//! Only the fields this application reads are declared; serde ignores the
//! rest of each payload. The envelope type [`ApiResponse`] carries either a
//! result or an error description, with `parameters.retry_after` present on
//! rate-limit errors.

use std::fmt;

use serde::Deserialize;

/// Response envelope returned by every Bot API method
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
    pub error_code: Option<i64>,
    pub parameters: Option<ResponseParameters>,
}

/// Extra error context; `retry_after` is set on HTTP 429 responses
#[derive(Debug, Deserialize)]
pub struct ResponseParameters {
    pub retry_after: Option<u64>,
}

/// One item from the getUpdates stream
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub channel_post: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub from: Option<User>,
    pub chat: Chat,
    pub text: Option<String>,
    pub photo: Option<Vec<PhotoSize>>,
    pub document: Option<Document>,
    pub video: Option<Video>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    pub first_name: String,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
    /// Chat type: "private", "group", "supergroup", or "channel"
    #[serde(rename = "type")]
    pub kind: String,
    pub title: Option<String>,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PhotoSize {
    pub file_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Document {
    pub file_id: String,
    pub file_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Video {
    pub file_id: String,
    pub file_name: Option<String>,
}

/// File metadata from getFile; `file_path` is the download path segment
#[derive(Debug, Clone, Deserialize)]
pub struct File {
    pub file_path: Option<String>,
    pub file_size: Option<u64>,
}

/// Result of copyMessage: the id of the new message in the target chat
#[derive(Debug, Clone, Deserialize)]
pub struct MessageId {
    pub message_id: i64,
}

/// Media kinds this application mirrors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Photo,
    Document,
    Video,
}

impl Message {
    /// Classify the message's media, if it carries a mirrorable kind.
    /// Web previews, polls, and other media kinds are not mirrored.
    pub fn media_kind(&self) -> Option<MediaKind> {
        if self.photo.as_ref().is_some_and(|sizes| !sizes.is_empty()) {
            Some(MediaKind::Photo)
        } else if self.document.is_some() {
            Some(MediaKind::Document)
        } else if self.video.is_some() {
            Some(MediaKind::Video)
        } else {
            None
        }
    }

    /// File id of the message's media. For photos this is the largest size
    /// (the API lists sizes in ascending order).
    pub fn media_file_id(&self) -> Option<&str> {
        if let Some(sizes) = &self.photo {
            return sizes.last().map(|s| s.file_id.as_str());
        }
        if let Some(doc) = &self.document {
            return Some(&doc.file_id);
        }
        if let Some(video) = &self.video {
            return Some(&video.file_id);
        }
        None
    }

    /// Original file name of the media, when the API provides one
    pub fn media_file_name(&self) -> Option<&str> {
        if let Some(doc) = &self.document {
            return doc.file_name.as_deref();
        }
        if let Some(video) = &self.video {
            return video.file_name.as_deref();
        }
        None
    }
}

/// Reference to a chat: a numeric id or a public username
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChatRef {
    Id(i64),
    Username(String),
}

impl ChatRef {
    /// JSON value accepted by the API's `chat_id` parameters
    pub fn to_param(&self) -> serde_json::Value {
        match self {
            ChatRef::Id(id) => serde_json::Value::from(*id),
            ChatRef::Username(name) => serde_json::Value::from(format!("@{name}")),
        }
    }
}

impl fmt::Display for ChatRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatRef::Id(id) => write!(f, "{id}"),
            ChatRef::Username(name) => write!(f, "@{name}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_channel_post_update() {
        let raw = r#"{
            "update_id": 1001,
            "channel_post": {
                "message_id": 77,
                "chat": {"id": -1002233445566, "type": "channel", "title": "releases"},
                "photo": [
                    {"file_id": "small", "width": 90, "height": 90},
                    {"file_id": "large", "width": 1280, "height": 1280}
                ]
            }
        }"#;
        let update: Update = serde_json::from_str(raw).unwrap();
        assert_eq!(update.update_id, 1001);
        let post = update.channel_post.unwrap();
        assert_eq!(post.chat.id, -1002233445566);
        assert_eq!(post.chat.kind, "channel");
        assert_eq!(post.media_kind(), Some(MediaKind::Photo));
        // Largest photo size wins
        assert_eq!(post.media_file_id(), Some("large"));
    }

    #[test]
    fn test_deserialize_private_text_message() {
        let raw = r#"{
            "update_id": 1002,
            "message": {
                "message_id": 5,
                "from": {"id": 42, "first_name": "Op", "username": "operator"},
                "chat": {"id": 42, "type": "private"},
                "text": "https://t.me/c/1234/56"
            }
        }"#;
        let update: Update = serde_json::from_str(raw).unwrap();
        let msg = update.message.unwrap();
        assert_eq!(msg.from.as_ref().unwrap().id, 42);
        assert_eq!(msg.text.as_deref(), Some("https://t.me/c/1234/56"));
        assert_eq!(msg.media_kind(), None);
        assert_eq!(msg.media_file_id(), None);
    }

    #[test]
    fn test_document_media_name() {
        let raw = r#"{
            "message_id": 9,
            "chat": {"id": -100, "type": "channel"},
            "document": {"file_id": "doc1", "file_name": "notes.pdf", "mime_type": "application/pdf"}
        }"#;
        let msg: Message = serde_json::from_str(raw).unwrap();
        assert_eq!(msg.media_kind(), Some(MediaKind::Document));
        assert_eq!(msg.media_file_id(), Some("doc1"));
        assert_eq!(msg.media_file_name(), Some("notes.pdf"));
    }

    #[test]
    fn test_deserialize_flood_wait_envelope() {
        let raw = r#"{
            "ok": false,
            "error_code": 429,
            "description": "Too Many Requests: retry after 31",
            "parameters": {"retry_after": 31}
        }"#;
        let resp: ApiResponse<MessageId> = serde_json::from_str(raw).unwrap();
        assert!(!resp.ok);
        assert_eq!(resp.error_code, Some(429));
        assert_eq!(resp.parameters.unwrap().retry_after, Some(31));
    }

    #[test]
    fn test_chat_ref_params() {
        assert_eq!(
            ChatRef::Id(-1001234).to_param(),
            serde_json::Value::from(-1001234i64)
        );
        assert_eq!(
            ChatRef::Username("durov".to_string()).to_param(),
            serde_json::Value::from("@durov")
        );
        assert_eq!(format!("{}", ChatRef::Username("durov".to_string())), "@durov");
    }
}
