//! Parsing of t.me links.
//!
//! The operator drives the bot by pasting message links. Two shapes identify
//! a message: `https://t.me/<username>/<id>` for public channels and
//! `https://t.me/c/<internal>/<id>` for private ones, where the internal id
//! maps to the Bot API chat id `-100<internal>`. Invite links
//! (`https://t.me/+<hash>` and `https://t.me/joinchat/<hash>`) are recognized
//! so they can be rejected with a useful message.

use crate::telegram::ChatRef;

/// A recognized t.me link
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedLink {
    /// Link to a single message in a channel or group
    Message { chat: ChatRef, message_id: i64 },
    /// Invite link; cannot identify a message range
    Invite { hash: String },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LinkError {
    #[error("no t.me link found in \"{0}\"")]
    NotTelegram(String),
    #[error("unrecognized t.me link: {0}")]
    Unrecognized(String),
    #[error("invalid message id: {0}")]
    InvalidMessageId(String),
}

/// Parse the first t.me link found in the input.
///
/// The link may appear anywhere in the text; query strings and fragments are
/// ignored. Topic links (`t.me/c/<id>/<topic>/<msg>`) resolve to the first
/// numeric segment after the chat.
pub fn parse_link(input: &str) -> Result<ParsedLink, LinkError> {
    let trimmed = input.trim();
    let Some(idx) = trimmed.find("t.me/") else {
        return Err(LinkError::NotTelegram(trimmed.to_string()));
    };
    // Reject lookalike hosts such as "next.me" where "t.me/" matches
    // mid-token; the match must start the token or follow the scheme
    if idx > 0 {
        let prev = trimmed.as_bytes()[idx - 1];
        if prev.is_ascii_alphanumeric() || prev == b'.' || prev == b'-' {
            return Err(LinkError::NotTelegram(trimmed.to_string()));
        }
    }
    let rest = &trimmed[idx + "t.me/".len()..];

    // The link may be followed by more text; drop everything from the first
    // whitespace, query string, or fragment
    let rest = rest
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .split(['?', '#'])
        .next()
        .unwrap_or_default();

    if let Some(hash) = rest.strip_prefix('+') {
        return parse_invite(hash, trimmed);
    }
    if let Some(hash) = rest.strip_prefix("joinchat/") {
        return parse_invite(hash, trimmed);
    }

    // Private links use a `c/` prefix before the internal chat id; public
    // links start directly with the username. After stripping the prefix
    // both shapes are <chat>/<message id>.
    let rest = rest.strip_prefix("c/").unwrap_or(rest);

    let mut parts = rest.splitn(2, '/');
    let chat_part = parts.next().unwrap_or_default();
    let Some(tail) = parts.next() else {
        return Err(LinkError::Unrecognized(trimmed.to_string()));
    };
    let msg_part = tail.split('/').next().unwrap_or_default();

    if chat_part.is_empty()
        || !chat_part
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(LinkError::Unrecognized(trimmed.to_string()));
    }

    // Take the leading digit run so trailing punctuation does not break the id
    let digits: &str = &msg_part[..msg_part
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(msg_part.len())];
    let message_id: i64 = digits
        .parse()
        .map_err(|_| LinkError::InvalidMessageId(msg_part.to_string()))?;
    if message_id <= 0 {
        return Err(LinkError::InvalidMessageId(msg_part.to_string()));
    }

    // A numeric chat segment is a private channel's internal id
    let chat = if chat_part.chars().all(|c| c.is_ascii_digit()) {
        let id: i64 = format!("-100{chat_part}")
            .parse()
            .map_err(|_| LinkError::Unrecognized(trimmed.to_string()))?;
        ChatRef::Id(id)
    } else {
        ChatRef::Username(chat_part.to_string())
    };

    Ok(ParsedLink::Message { chat, message_id })
}

fn parse_invite(hash: &str, original: &str) -> Result<ParsedLink, LinkError> {
    let hash = hash.split('/').next().unwrap_or_default();
    if hash.is_empty()
        || !hash
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(LinkError::Unrecognized(original.to_string()));
    }
    Ok(ParsedLink::Invite {
        hash: hash.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_message_link() {
        let parsed = parse_link("https://t.me/some_channel/123").unwrap();
        assert_eq!(
            parsed,
            ParsedLink::Message {
                chat: ChatRef::Username("some_channel".to_string()),
                message_id: 123,
            }
        );
    }

    #[test]
    fn test_private_message_link() {
        let parsed = parse_link("https://t.me/c/1234567890/456").unwrap();
        assert_eq!(
            parsed,
            ParsedLink::Message {
                chat: ChatRef::Id(-1001234567890),
                message_id: 456,
            }
        );
    }

    #[test]
    fn test_numeric_chat_without_c_prefix_is_private() {
        let parsed = parse_link("https://t.me/1234567890/7").unwrap();
        assert_eq!(
            parsed,
            ParsedLink::Message {
                chat: ChatRef::Id(-1001234567890),
                message_id: 7,
            }
        );
    }

    #[test]
    fn test_link_embedded_in_text() {
        let parsed = parse_link("see https://t.me/chan/9 for details").unwrap();
        assert!(matches!(parsed, ParsedLink::Message { message_id: 9, .. }));
    }

    #[test]
    fn test_query_string_is_ignored() {
        let parsed = parse_link("https://t.me/chan/55?single").unwrap();
        assert!(matches!(parsed, ParsedLink::Message { message_id: 55, .. }));
    }

    #[test]
    fn test_trailing_punctuation_is_ignored() {
        let parsed = parse_link("https://t.me/chan/9.").unwrap();
        assert!(matches!(parsed, ParsedLink::Message { message_id: 9, .. }));
    }

    #[test]
    fn test_topic_link_takes_first_numeric_segment() {
        let parsed = parse_link("https://t.me/c/123/456/789").unwrap();
        assert_eq!(
            parsed,
            ParsedLink::Message {
                chat: ChatRef::Id(-100123),
                message_id: 456,
            }
        );
    }

    #[test]
    fn test_plus_invite_link() {
        let parsed = parse_link("https://t.me/+AbCd_123-xyz").unwrap();
        assert_eq!(
            parsed,
            ParsedLink::Invite {
                hash: "AbCd_123-xyz".to_string()
            }
        );
    }

    #[test]
    fn test_joinchat_invite_link() {
        let parsed = parse_link("https://t.me/joinchat/AbCd123").unwrap();
        assert_eq!(
            parsed,
            ParsedLink::Invite {
                hash: "AbCd123".to_string()
            }
        );
    }

    #[test]
    fn test_not_a_telegram_link() {
        assert!(matches!(
            parse_link("https://example.com/foo/1"),
            Err(LinkError::NotTelegram(_))
        ));
    }

    #[test]
    fn test_lookalike_host_is_rejected() {
        assert!(matches!(
            parse_link("https://next.me/chan/5"),
            Err(LinkError::NotTelegram(_))
        ));
    }

    #[test]
    fn test_missing_message_id() {
        assert!(matches!(
            parse_link("https://t.me/some_channel"),
            Err(LinkError::Unrecognized(_))
        ));
    }

    #[test]
    fn test_non_numeric_message_id() {
        assert!(matches!(
            parse_link("https://t.me/some_channel/abc"),
            Err(LinkError::InvalidMessageId(_))
        ));
    }

    #[test]
    fn test_invalid_username_characters() {
        assert!(matches!(
            parse_link("https://t.me/bad name/12"),
            Err(LinkError::Unrecognized(_))
        ));
    }
}
