//! HTTPS client for the Telegram Bot API.
//!
//! Every method call is a POST of JSON parameters to
//! `https://api.telegram.org/bot<token>/<method>`; file downloads go through
//! the `/file/bot<token>/<path>` tree. Responses arrive in the
//! [`ApiResponse`] envelope; rate-limit errors carry a `retry_after` that is
//! mapped to [`TelegramError::FloodWait`].

use std::path::Path;
use std::time::Duration;

use futures::StreamExt;
use reqwest::multipart;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::AsyncWriteExt;

use crate::config::{API_CALL_TIMEOUT_SECS, MEDIA_TRANSFER_TIMEOUT_SECS, USER_AGENT};

use super::messages::TelegramError;
use super::types::{ApiResponse, Chat, ChatRef, File, Message, MessageId, ResponseParameters, Update, User};

/// Low-level Bot API client. Cheap to clone; the underlying connection pool
/// is shared between clones.
#[derive(Clone)]
pub struct BotApiClient {
    http: reqwest::Client,
    /// Method endpoint prefix, e.g. `https://api.telegram.org/bot<token>`
    base: String,
    /// File download prefix, e.g. `https://api.telegram.org/file/bot<token>`
    file_base: String,
}

impl BotApiClient {
    pub fn new(api_base: &str, token: &str) -> Result<Self, TelegramError> {
        let api_base = api_base.trim_end_matches('/');
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            http,
            base: format!("{api_base}/bot{token}"),
            file_base: format!("{api_base}/file/bot{token}"),
        })
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/{}", self.base, method)
    }

    /// POST a method call and unwrap the response envelope
    async fn call<T, P>(
        &self,
        method: &str,
        params: &P,
        timeout: Option<Duration>,
    ) -> Result<T, TelegramError>
    where
        T: DeserializeOwned,
        P: Serialize + ?Sized,
    {
        let request = self
            .http
            .post(self.endpoint(method))
            .json(params)
            .timeout(timeout.unwrap_or(Duration::from_secs(API_CALL_TIMEOUT_SECS)));

        let response = request.send().await?;
        let body: ApiResponse<T> = response.json().await?;
        unwrap_envelope(method, body)
    }

    /// Identify the bot account; used at startup to verify the token
    pub async fn get_me(&self) -> Result<User, TelegramError> {
        self.call("getMe", &serde_json::json!({}), None).await
    }

    /// Long-poll for updates. Blocks up to `timeout_secs` on the server
    /// side; the HTTP timeout is padded to cover the poll window.
    pub async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, TelegramError> {
        let mut params = serde_json::json!({
            "timeout": timeout_secs,
            "allowed_updates": ["message", "channel_post"],
        });
        if let Some(offset) = offset {
            params["offset"] = offset.into();
        }
        self.call(
            "getUpdates",
            &params,
            Some(Duration::from_secs(timeout_secs + 10)),
        )
        .await
    }

    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<Message, TelegramError> {
        let params = serde_json::json!({ "chat_id": chat_id, "text": text });
        self.call("sendMessage", &params, None).await
    }

    pub async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
    ) -> Result<Message, TelegramError> {
        let params = serde_json::json!({
            "chat_id": chat_id,
            "message_id": message_id,
            "text": text,
        });
        self.call("editMessageText", &params, None).await
    }

    /// Copy a message into another chat without a forward header
    pub async fn copy_message(
        &self,
        from_chat: i64,
        message_id: i64,
        to_chat: i64,
    ) -> Result<MessageId, TelegramError> {
        let params = serde_json::json!({
            "chat_id": to_chat,
            "from_chat_id": from_chat,
            "message_id": message_id,
        });
        self.call("copyMessage", &params, None).await
    }

    pub async fn get_chat(&self, chat: &ChatRef) -> Result<Chat, TelegramError> {
        let params = serde_json::json!({ "chat_id": chat.to_param() });
        self.call("getChat", &params, None).await
    }

    pub async fn get_file(&self, file_id: &str) -> Result<File, TelegramError> {
        let params = serde_json::json!({ "file_id": file_id });
        self.call("getFile", &params, None).await
    }

    /// Stream a file from the API's file tree to a local path
    pub async fn download_file(&self, file_path: &str, dest: &Path) -> Result<(), TelegramError> {
        let url = format!("{}/{}", self.file_base, file_path.trim_start_matches('/'));
        let response = self
            .http
            .get(url)
            .timeout(Duration::from_secs(MEDIA_TRANSFER_TIMEOUT_SECS))
            .send()
            .await?
            .error_for_status()?;

        let mut stream = response.bytes_stream();
        let mut file = tokio::fs::File::create(dest).await?;
        while let Some(chunk) = stream.next().await {
            file.write_all(&chunk?).await?;
        }
        file.flush().await?;
        Ok(())
    }

    /// Upload a local file as a document. The Bot API caps uploads at 50 MB,
    /// so buffering the file in memory is acceptable.
    pub async fn send_document(
        &self,
        chat_id: i64,
        path: &Path,
        file_name: &str,
    ) -> Result<Message, TelegramError> {
        let data = tokio::fs::read(path).await?;
        let part = multipart::Part::bytes(data).file_name(file_name.to_string());
        let form = multipart::Form::new()
            .text("chat_id", chat_id.to_string())
            .part("document", part);

        let response = self
            .http
            .post(self.endpoint("sendDocument"))
            .multipart(form)
            .timeout(Duration::from_secs(MEDIA_TRANSFER_TIMEOUT_SECS))
            .send()
            .await?;
        let body: ApiResponse<Message> = response.json().await?;
        unwrap_envelope("sendDocument", body)
    }
}

/// Turn a response envelope into a result, mapping rate limits to FloodWait
fn unwrap_envelope<T>(method: &str, body: ApiResponse<T>) -> Result<T, TelegramError> {
    if body.ok {
        return body
            .result
            .ok_or_else(|| TelegramError::Transport(format!("{method}: missing result")));
    }
    Err(api_error(method, body.error_code, body.description, body.parameters))
}

fn api_error(
    method: &str,
    code: Option<i64>,
    description: Option<String>,
    parameters: Option<ResponseParameters>,
) -> TelegramError {
    if let Some(retry_after) = parameters.and_then(|p| p.retry_after) {
        return TelegramError::FloodWait { retry_after };
    }
    TelegramError::Api {
        code: code.unwrap_or(0),
        description: description.unwrap_or_else(|| format!("{method} failed")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_building() {
        let client = BotApiClient::new("https://api.telegram.org/", "123:abc").unwrap();
        assert_eq!(
            client.endpoint("sendMessage"),
            "https://api.telegram.org/bot123:abc/sendMessage"
        );
        assert_eq!(
            client.file_base,
            "https://api.telegram.org/file/bot123:abc"
        );
    }

    #[test]
    fn test_flood_wait_extraction() {
        let err = api_error(
            "copyMessage",
            Some(429),
            Some("Too Many Requests: retry after 17".to_string()),
            Some(ResponseParameters {
                retry_after: Some(17),
            }),
        );
        assert!(matches!(err, TelegramError::FloodWait { retry_after: 17 }));
    }

    #[test]
    fn test_api_error_without_parameters() {
        let err = api_error(
            "copyMessage",
            Some(400),
            Some("Bad Request: message to copy not found".to_string()),
            None,
        );
        match err {
            TelegramError::Api { code, description } => {
                assert_eq!(code, 400);
                assert!(description.contains("not found"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_ok_envelope_unwraps_result() {
        let body = ApiResponse {
            ok: true,
            result: Some(MessageId { message_id: 12 }),
            description: None,
            error_code: None,
            parameters: None,
        };
        let id = unwrap_envelope("copyMessage", body).unwrap();
        assert_eq!(id.message_id, 12);
    }

    #[test]
    fn test_ok_envelope_without_result_is_transport_error() {
        let body: ApiResponse<MessageId> = ApiResponse {
            ok: true,
            result: None,
            description: None,
            error_code: None,
            parameters: None,
        };
        assert!(matches!(
            unwrap_envelope("copyMessage", body),
            Err(TelegramError::Transport(_))
        ));
    }
}
