//! Operator conversation state.
//!
//! Setting up a mirror takes three messages: the source-channel link, the
//! range-start link, and the range-end link. Each operator's position in that
//! flow is tracked here; completing the flow (or an explicit reset) returns
//! the operator to the first step.

use std::collections::HashMap;

use tokio::sync::Mutex;

/// A resolved source channel: numeric chat id plus display title
#[derive(Debug, Clone, PartialEq)]
pub struct SourceChannel {
    pub chat_id: i64,
    pub title: String,
}

/// Position in the three-step mirror setup flow
#[derive(Debug, Clone, Default, PartialEq)]
pub enum SessionStep {
    /// Waiting for a message link identifying the source channel
    #[default]
    AwaitingSource,
    /// Waiting for the range-start message link
    AwaitingStart { source: SourceChannel },
    /// Waiting for the range-end message link
    AwaitingEnd { source: SourceChannel, start_id: i64 },
}

/// Per-operator session storage
pub struct SessionMap {
    inner: Mutex<HashMap<i64, SessionStep>>,
}

impl SessionMap {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Current step for a user, defaulting to the start of the flow
    pub async fn current(&self, user_id: i64) -> SessionStep {
        self.inner
            .lock()
            .await
            .get(&user_id)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn set(&self, user_id: i64, step: SessionStep) {
        self.inner.lock().await.insert(user_id, step);
    }

    /// Return the user to the start of the flow
    pub async fn reset(&self, user_id: i64) {
        self.inner.lock().await.remove(&user_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> SourceChannel {
        SourceChannel {
            chat_id: -1001234,
            title: "releases".to_string(),
        }
    }

    #[tokio::test]
    async fn test_unknown_user_starts_at_awaiting_source() {
        let sessions = SessionMap::new();
        assert_eq!(sessions.current(42).await, SessionStep::AwaitingSource);
    }

    #[tokio::test]
    async fn test_step_progression() {
        let sessions = SessionMap::new();

        sessions
            .set(42, SessionStep::AwaitingStart { source: source() })
            .await;
        assert_eq!(
            sessions.current(42).await,
            SessionStep::AwaitingStart { source: source() }
        );

        sessions
            .set(
                42,
                SessionStep::AwaitingEnd {
                    source: source(),
                    start_id: 100,
                },
            )
            .await;
        assert_eq!(
            sessions.current(42).await,
            SessionStep::AwaitingEnd {
                source: source(),
                start_id: 100,
            }
        );
    }

    #[tokio::test]
    async fn test_reset_returns_to_first_step() {
        let sessions = SessionMap::new();
        sessions
            .set(42, SessionStep::AwaitingStart { source: source() })
            .await;
        sessions.reset(42).await;
        assert_eq!(sessions.current(42).await, SessionStep::AwaitingSource);
    }

    #[tokio::test]
    async fn test_sessions_are_per_user() {
        let sessions = SessionMap::new();
        sessions
            .set(1, SessionStep::AwaitingStart { source: source() })
            .await;
        assert_eq!(sessions.current(2).await, SessionStep::AwaitingSource);
    }
}
