//! Operator command and conversation handlers.
//!
//! Only the configured owner may drive the bot. Commands get an explicit
//! unauthorized reply; plain text from strangers is dropped silently. Plain
//! text from the owner feeds the three-step mirror setup flow.

use chrono::Utc;

use crate::error::AppError;
use crate::links::{self, LinkError, ParsedLink};
use crate::session::{SessionStep, SourceChannel};
use crate::state::AppState;
use crate::store::MonitoredChannel;
use crate::telegram::{ChatRef, Message, User};
use crate::transfer;

/// Route a private message to the matching command or session step
pub(crate) async fn handle_private_message(
    state: &AppState,
    msg: &Message,
) -> Result<(), AppError> {
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };
    let Some(text) = msg.text.as_deref() else {
        return Ok(());
    };
    let text = text.trim();

    if let Some(command) = parse_command(text) {
        return match command {
            "start" => start_command(state, msg, from).await,
            "channels" => channels_command(state, msg, from).await,
            // Unknown commands are ignored
            _ => Ok(()),
        };
    }

    // Plain text from anyone but the owner is dropped without a reply
    if from.id != state.config.telegram.owner_id {
        return Ok(());
    }
    handle_step(state, msg, from, text).await
}

/// Extract a command name from "/name" or "/name@botname arguments"
fn parse_command(text: &str) -> Option<&str> {
    let rest = text.strip_prefix('/')?;
    let word = rest.split_whitespace().next().unwrap_or_default();
    let name = word.split('@').next().unwrap_or_default();
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

async fn start_command(state: &AppState, msg: &Message, from: &User) -> Result<(), AppError> {
    if from.id != state.config.telegram.owner_id {
        state
            .telegram
            .send_message(msg.chat.id, "Unauthorized.")
            .await?;
        return Ok(());
    }

    let help = format!(
        "courier {} - Telegram channel media mirror.\n\n\
         Send a message link from the source channel, then the link to the \
         first message of the range, then the link to the last one. Every \
         message in the range is copied to the target channel, and new posts \
         are mirrored from then on.\n\n\
         Commands:\n\
         /channels - list monitored channels\n\
         /start - this help message\n\n\
         Supported links:\n\
         https://t.me/channelname/123\n\
         https://t.me/c/1234567890/456",
        env!("CARGO_PKG_VERSION"),
    );
    state.telegram.send_message(msg.chat.id, &help).await?;
    Ok(())
}

async fn channels_command(state: &AppState, msg: &Message, from: &User) -> Result<(), AppError> {
    if from.id != state.config.telegram.owner_id {
        state
            .telegram
            .send_message(msg.chat.id, "Unauthorized.")
            .await?;
        return Ok(());
    }

    let entries = state.store.list().await;
    if entries.is_empty() {
        state
            .telegram
            .send_message(msg.chat.id, "No channels are being monitored.")
            .await?;
        return Ok(());
    }

    let mut text = String::from("Monitored channels:\n");
    for (chat_id, channel) in entries {
        let status = if state.monitors.is_active(chat_id).await {
            "monitoring"
        } else {
            "inactive"
        };
        text.push_str(&format!(
            "\n{}\n  id: {}\n  last mirrored: #{}\n  added: {}\n  status: {}\n",
            channel.name,
            chat_id,
            channel.last_msg_id,
            channel.added_at.format("%Y-%m-%d"),
            status,
        ));
    }
    state.telegram.send_message(msg.chat.id, &text).await?;
    Ok(())
}

/// Drive the three-step mirror setup flow with the owner's message
async fn handle_step(
    state: &AppState,
    msg: &Message,
    from: &User,
    text: &str,
) -> Result<(), AppError> {
    let chat_id = msg.chat.id;

    match state.sessions.current(from.id).await {
        SessionStep::AwaitingSource => {
            let status = state
                .telegram
                .send_message(chat_id, "Looking up source channel...")
                .await?;

            let reply = match links::parse_link(text) {
                Ok(ParsedLink::Message { chat, .. }) => {
                    resolve_source(state, from.id, &chat).await
                }
                Ok(ParsedLink::Invite { .. }) => {
                    "Invite links cannot identify a message range. Send a link \
                     to a specific message in the source channel instead."
                        .to_string()
                }
                Err(e) => format!(
                    "That does not look like a message link ({e}).\n\
                     Send a message link from the source channel."
                ),
            };
            state
                .telegram
                .edit_message_text(chat_id, status.message_id, &reply)
                .await?;
        }

        SessionStep::AwaitingStart { source } => {
            let reply = match parse_message_id(text) {
                Ok(start_id) => {
                    state
                        .sessions
                        .set(from.id, SessionStep::AwaitingEnd { source, start_id })
                        .await;
                    format!(
                        "Start message set to #{start_id}.\n\n\
                         Now send the link to the last message in the range."
                    )
                }
                Err(e) => format!("Could not read a message id from that link ({e})."),
            };
            state.telegram.send_message(chat_id, &reply).await?;
        }

        SessionStep::AwaitingEnd { source, start_id } => {
            let end_id = match parse_message_id(text) {
                Ok(end_id) => end_id,
                Err(e) => {
                    state
                        .telegram
                        .send_message(
                            chat_id,
                            &format!("Could not read a message id from that link ({e})."),
                        )
                        .await?;
                    return Ok(());
                }
            };

            let status = state
                .telegram
                .send_message(
                    chat_id,
                    &format!(
                        "Starting mirror of {}.\nRange: #{start_id} to #{end_id}",
                        source.title
                    ),
                )
                .await?;
            state.sessions.reset(from.id).await;

            spawn_mirror_job(
                state.clone(),
                source,
                start_id,
                end_id,
                chat_id,
                status.message_id,
            );
        }
    }
    Ok(())
}

/// Resolve a source-channel reference and move the session forward.
/// Returns the reply text for the operator.
async fn resolve_source(state: &AppState, user_id: i64, chat: &ChatRef) -> String {
    match state.telegram.get_chat(chat).await {
        Ok(info) => {
            let title = info
                .title
                .or(info.username)
                .unwrap_or_else(|| info.id.to_string());
            state
                .sessions
                .set(
                    user_id,
                    SessionStep::AwaitingStart {
                        source: SourceChannel {
                            chat_id: info.id,
                            title: title.clone(),
                        },
                    },
                )
                .await;
            format!(
                "Source channel found: {title}\n\n\
                 Now send the link to the first message in the range."
            )
        }
        Err(e) => format!(
            "Could not access that channel ({e}).\n\
             The bot must be a member of the source channel."
        ),
    }
}

/// Parse a message link, keeping only the message id
fn parse_message_id(text: &str) -> Result<i64, LinkError> {
    match links::parse_link(text)? {
        ParsedLink::Message { message_id, .. } => Ok(message_id),
        ParsedLink::Invite { hash } => Err(LinkError::Unrecognized(format!("t.me/+{hash}"))),
    }
}

/// Run the range mirror in the background, then register the channel for
/// monitoring and report the result to the operator
fn spawn_mirror_job(
    state: AppState,
    source: SourceChannel,
    start_id: i64,
    end_id: i64,
    status_chat: i64,
    status_msg: i64,
) {
    tokio::spawn(async move {
        let target = state.config.telegram.target_channel;
        let result = transfer::mirror_range(
            &state.telegram,
            &state.config.transfer,
            &source,
            start_id,
            end_id,
            target,
            status_chat,
            status_msg,
        )
        .await;

        match result {
            Ok(outcome) => {
                if let Err(e) = state
                    .store
                    .add(
                        source.chat_id,
                        MonitoredChannel {
                            name: source.title.clone(),
                            added_at: Utc::now(),
                            last_msg_id: outcome.last_id,
                        },
                    )
                    .await
                {
                    tracing::error!(error = %e, chat_id = source.chat_id, "Failed to persist monitored channel");
                }
                state
                    .monitors
                    .insert(source.chat_id, source.title.clone(), outcome.last_id)
                    .await;

                transfer::update_status(
                    &state.telegram,
                    status_chat,
                    status_msg,
                    &format!(
                        "Mirror complete for {}.\nCopied: {}\nSkipped: {}\nRange: #{} to #{}\n\n\
                         Now monitoring for new posts.",
                        source.title,
                        outcome.copied,
                        outcome.skipped,
                        start_id.min(end_id),
                        start_id.max(end_id),
                    ),
                )
                .await;
            }
            Err(e) => {
                tracing::error!(error = %e, chat_id = source.chat_id, "Mirror job failed");
                transfer::update_status(
                    &state.telegram,
                    status_chat,
                    status_msg,
                    &format!("Mirror failed: {e}"),
                )
                .await;
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command_plain() {
        assert_eq!(parse_command("/start"), Some("start"));
        assert_eq!(parse_command("/channels"), Some("channels"));
    }

    #[test]
    fn test_parse_command_with_bot_suffix_and_args() {
        assert_eq!(parse_command("/start@courier_bot"), Some("start"));
        assert_eq!(parse_command("/channels extra args"), Some("channels"));
    }

    #[test]
    fn test_parse_command_rejects_plain_text() {
        assert_eq!(parse_command("https://t.me/chan/1"), None);
        assert_eq!(parse_command("hello"), None);
        assert_eq!(parse_command("/"), None);
    }

    #[test]
    fn test_parse_message_id_from_link() {
        assert_eq!(parse_message_id("https://t.me/chan/123").unwrap(), 123);
        assert_eq!(
            parse_message_id("https://t.me/c/1234567890/456").unwrap(),
            456
        );
    }

    #[test]
    fn test_parse_message_id_rejects_invites() {
        assert!(parse_message_id("https://t.me/+AbCd123").is_err());
    }
}
