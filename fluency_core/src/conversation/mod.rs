//! Conversation records for practice sessions.
//!
//! A [`UserHistoryRecord`] is the durable, per-user log of past turns.
//! It never holds the system directive; that is attached when a context
//! is built for the model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ChatMessage, Role};

mod directive;
mod history;

pub use directive::{SystemDirective, THERAPIST_DIRECTIVE};
pub use history::{DialogueContextBuilder, HistoryWindow};

/// One utterance in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
    /// Set when the turn is created, never by the store.
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// The model-facing form of this turn, without storage metadata.
    #[must_use]
    pub fn to_message(&self) -> ChatMessage {
        ChatMessage {
            role: self.role,
            content: self.content.clone(),
        }
    }
}

/// Stored history of one user, oldest turn first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserHistoryRecord {
    pub user_id: String,
    pub history: Vec<ConversationTurn>,
}

impl UserHistoryRecord {
    #[must_use]
    pub const fn new(user_id: String) -> Self {
        Self {
            user_id,
            history: Vec::new(),
        }
    }

    /// Number of completed (user, assistant) exchanges.
    #[must_use]
    pub const fn turn_count(&self) -> usize {
        self.history.len() / 2
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Last `n` stored turns.
    #[must_use]
    pub fn last_n_turns(&self, n: usize) -> &[ConversationTurn] {
        let start = self.history.len().saturating_sub(n);
        &self.history[start..]
    }

    #[must_use]
    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.history.last().map(|t| t.timestamp)
    }
}

/// Reject pairs that would break the stored-history invariants.
pub fn ensure_pair(
    user_turn: &ConversationTurn,
    assistant_turn: &ConversationTurn,
) -> anyhow::Result<()> {
    if user_turn.role != Role::User {
        anyhow::bail!(
            "First turn of a pair must have role user, got {}",
            user_turn.role
        );
    }
    if assistant_turn.role != Role::Assistant {
        anyhow::bail!(
            "Second turn of a pair must have role assistant, got {}",
            assistant_turn.role
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_message_drops_timestamp() {
        let turn = ConversationTurn::user("Hi, I'm Sam");
        let msg = turn.to_message();
        assert_eq!(msg, ChatMessage::new(Role::User, "Hi, I'm Sam"));

        let json = serde_json::to_value(&msg).unwrap_or_default();
        assert!(json.get("timestamp").is_none());
    }

    #[test]
    fn record_counts_pairs() {
        let mut record = UserHistoryRecord::new("u1".to_string());
        assert!(record.is_empty());
        assert!(record.last_updated().is_none());

        record.history.push(ConversationTurn::user("Hello"));
        record.history.push(ConversationTurn::assistant("Hi! Tell me your name."));

        assert_eq!(record.turn_count(), 1);
        assert_eq!(record.last_n_turns(1)[0].content, "Hi! Tell me your name.");
        assert_eq!(record.last_n_turns(10).len(), 2);
    }

    #[test]
    fn ensure_pair_checks_roles() {
        let user = ConversationTurn::user("Hello");
        let assistant = ConversationTurn::assistant("Hi");
        let system = ConversationTurn::new(Role::System, "persona");

        assert!(ensure_pair(&user, &assistant).is_ok());
        assert!(ensure_pair(&assistant, &user).is_err());
        assert!(ensure_pair(&user, &system).is_err());
    }
}
