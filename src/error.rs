//! Application-level error type.
//!
//! Wraps the failure modes that cross module boundaries: Telegram API errors
//! from the worker pool and I/O errors from the persistent registry. Errors
//! surfaced during update handling are logged by the dispatcher; errors during
//! startup abort the process with a non-zero exit.

use std::io;

use crate::telegram::TelegramError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Telegram API error: {0}")]
    Telegram(#[from] TelegramError),

    #[error("registry I/O error: {0}")]
    Store(#[from] io::Error),
}
