//! Range mirroring engine.
//!
//! Copies every message in an inclusive id range from a source channel into
//! the target channel, one at a time with a fixed delay between operations.
//! Deleted and service messages are skipped via the API's errors; the Bot API
//! does not expose message contents by id, so each surviving message is
//! copied as-is. A status message in the operator chat is edited with
//! progress periodically and flood waits pause the job before it resumes at
//! the same message id.

use std::time::Duration;

use tracing::instrument;

use crate::config::TransferConfig;
use crate::error::AppError;
use crate::session::SourceChannel;
use crate::telegram::{TelegramError, TelegramService};

/// Result of a completed range mirror
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeOutcome {
    pub copied: u64,
    pub skipped: u64,
    /// High-water mark for subsequent monitoring
    pub last_id: i64,
}

/// Put a possibly-reversed id pair into ascending order
pub fn normalize_range(a: i64, b: i64) -> (i64, i64) {
    if a > b {
        (b, a)
    } else {
        (a, b)
    }
}

/// Edit the status message, logging instead of failing when the edit is
/// rejected (progress reporting must never abort a transfer)
pub async fn update_status(telegram: &TelegramService, chat_id: i64, message_id: i64, text: &str) {
    if let Err(e) = telegram.edit_message_text(chat_id, message_id, text).await {
        tracing::debug!(error = %e, "Failed to update status message");
    }
}

/// Mirror all messages in the given range into the target channel.
///
/// Returns the copy/skip counts and the range end as the high-water mark.
/// Fails only when the worker pool has shut down; per-message errors are
/// counted as skips.
#[instrument(
    name = "transfer.mirror_range",
    skip(telegram, config),
    fields(chat_id = source.chat_id, channel = %source.title)
)]
pub async fn mirror_range(
    telegram: &TelegramService,
    config: &TransferConfig,
    source: &SourceChannel,
    start_id: i64,
    end_id: i64,
    target: i64,
    status_chat: i64,
    status_msg: i64,
) -> Result<RangeOutcome, AppError> {
    let (start, end) = normalize_range(start_id, end_id);
    let delay = Duration::from_secs(config.message_delay_seconds);

    tracing::info!(start, end, target, "Mirror started");
    update_status(
        telegram,
        status_chat,
        status_msg,
        &format!(
            "Mirror started for {}.\nRange: #{start} to #{end}",
            source.title
        ),
    )
    .await;

    let mut copied = 0u64;
    let mut skipped = 0u64;
    let mut id = start;

    while id <= end {
        match telegram.copy_message(source.chat_id, id, target).await {
            Ok(_) => {
                copied += 1;
                tracing::debug!(message_id = id, copied, "Copied message");
            }
            Err(TelegramError::FloodWait { retry_after }) => {
                tracing::warn!(retry_after, message_id = id, "Rate limited, pausing transfer");
                update_status(
                    telegram,
                    status_chat,
                    status_msg,
                    &format!(
                        "Rate limited, waiting {retry_after}s.\nCopied so far: {copied}\nResuming at: #{id}"
                    ),
                )
                .await;
                tokio::time::sleep(Duration::from_secs(retry_after)).await;
                // Retry the same message id
                continue;
            }
            Err(e @ TelegramError::PoolClosed) => {
                // Shutdown: abort the job instead of burning through the range
                return Err(e.into());
            }
            Err(e) if e.is_not_found() => {
                skipped += 1;
                tracing::debug!(message_id = id, "Message gone, skipping");
            }
            Err(e) => {
                skipped += 1;
                tracing::warn!(message_id = id, error = %e, "Failed to copy message, skipping");
            }
        }

        let processed = (id - start + 1) as u64;
        if processed % u64::from(config.status_interval.max(1)) == 0 {
            update_status(
                telegram,
                status_chat,
                status_msg,
                &format!(
                    "Mirroring {}.\nAt: #{id} of #{end}\nCopied: {copied}\nSkipped: {skipped}",
                    source.title
                ),
            )
            .await;
        }

        tokio::time::sleep(delay).await;
        id += 1;
    }

    tracing::info!(copied, skipped, "Mirror complete");
    Ok(RangeOutcome {
        copied,
        skipped,
        last_id: end,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_range_keeps_ascending_order() {
        assert_eq!(normalize_range(10, 20), (10, 20));
    }

    #[test]
    fn test_normalize_range_swaps_reversed_order() {
        assert_eq!(normalize_range(20, 10), (10, 20));
    }

    #[test]
    fn test_normalize_range_single_message() {
        assert_eq!(normalize_range(7, 7), (7, 7));
    }
}
