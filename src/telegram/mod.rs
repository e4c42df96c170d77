//! Telegram Bot API client module.
//!
//! This module contains the wire types for the Bot API, a low-level HTTPS
//! client, and a prioritized worker pool that keeps operator-facing traffic
//! responsive while bulk mirror transfers are running.
//!
//! Key re-exports:
//! - [`TelegramService`] - pooled, prioritized access to the Bot API
//! - [`BotApiClient`] - low-level client (used directly by the long poller)

mod client;
mod messages;
mod service;
mod types;
mod worker;

pub use client::BotApiClient;
pub use messages::{Priority, TelegramError};
pub use service::TelegramService;
pub use types::{Chat, ChatRef, MediaKind, Message, Update, User};
