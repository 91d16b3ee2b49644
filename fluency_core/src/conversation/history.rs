//! Context assembly for the conversational model.
//!
//! The context is always `[directive] ++ stored history ++ [new user turn]`.
//! By default the full stored history is forwarded. A [`HistoryWindow`]
//! with a turn limit evicts the oldest exchanges first, whole pairs at a
//! time, so the model never sees an assistant reply without its prompt.

use crate::{ChatMessage, Role};

use super::{ConversationTurn, SystemDirective, UserHistoryRecord};

/// Selects which stored turns are forwarded to the model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistoryWindow {
    /// Maximum number of (user, assistant) exchanges; `None` keeps everything.
    max_turns: Option<usize>,
}

impl HistoryWindow {
    /// Forward the full history.
    #[must_use]
    pub const fn unbounded() -> Self {
        Self { max_turns: None }
    }

    /// Forward at most `max_turns` of the most recent exchanges.
    #[must_use]
    pub const fn last_turns(max_turns: usize) -> Self {
        Self {
            max_turns: Some(max_turns),
        }
    }

    /// Apply the window to a stored history.
    #[must_use]
    pub fn select<'a>(&self, history: &'a [ConversationTurn]) -> &'a [ConversationTurn] {
        let Some(max_turns) = self.max_turns else {
            return history;
        };

        let mut start = history.len().saturating_sub(max_turns.saturating_mul(2));
        // Never start on an assistant reply whose prompt was evicted.
        while start < history.len() && history[start].role != Role::User {
            start += 1;
        }
        &history[start..]
    }
}

/// Builds the ordered message list sent to the conversational model.
#[derive(Debug, Clone, Copy, Default)]
pub struct DialogueContextBuilder {
    window: HistoryWindow,
}

impl DialogueContextBuilder {
    #[must_use]
    pub const fn new(window: HistoryWindow) -> Self {
        Self { window }
    }

    /// Assemble the context for one reply.
    ///
    /// An absent record is an empty history. Stored turns contribute only
    /// their role and content; a stray `system` turn in storage is skipped
    /// so the directive stays the only system message.
    #[must_use]
    pub fn build_context(
        &self,
        system: &SystemDirective,
        record: Option<&UserHistoryRecord>,
        new_user_text: &str,
    ) -> Vec<ChatMessage> {
        let history = record.map_or(&[][..], |r| self.window.select(&r.history));

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(system.to_message());
        messages.extend(
            history
                .iter()
                .filter(|turn| turn.role != Role::System)
                .map(ConversationTurn::to_message),
        );
        messages.push(ChatMessage::new(Role::User, new_user_text));

        messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_with_pairs(user_id: &str, pairs: usize) -> UserHistoryRecord {
        let mut record = UserHistoryRecord::new(user_id.to_string());
        for i in 0..pairs {
            record.history.push(ConversationTurn::user(format!("user {i}")));
            record
                .history
                .push(ConversationTurn::assistant(format!("assistant {i}")));
        }
        record
    }

    #[test]
    fn new_user_gets_directive_and_utterance() {
        let builder = DialogueContextBuilder::default();
        let directive = SystemDirective::default();

        let context = builder.build_context(&directive, None, "Hi, I'm Sam");

        assert_eq!(
            context,
            vec![
                directive.to_message(),
                ChatMessage::new(Role::User, "Hi, I'm Sam"),
            ]
        );
    }

    #[test]
    fn prior_pair_precedes_new_utterance() {
        let builder = DialogueContextBuilder::default();
        let directive = SystemDirective::default();
        let mut record = UserHistoryRecord::new("u1".to_string());
        record.history.push(ConversationTurn::user("Hi, I'm Sam"));
        record
            .history
            .push(ConversationTurn::assistant("Nice to meet you, Sam."));

        let context = builder.build_context(&directive, Some(&record), "Let's continue");

        assert_eq!(
            context,
            vec![
                directive.to_message(),
                ChatMessage::new(Role::User, "Hi, I'm Sam"),
                ChatMessage::new(Role::Assistant, "Nice to meet you, Sam."),
                ChatMessage::new(Role::User, "Let's continue"),
            ]
        );
    }

    #[test]
    fn build_context_is_idempotent() {
        let builder = DialogueContextBuilder::default();
        let directive = SystemDirective::new("Be brief.");
        let record = record_with_pairs("u1", 3);

        let first = builder.build_context(&directive, Some(&record), "again");
        let second = builder.build_context(&directive, Some(&record), "again");

        assert_eq!(first, second);
        assert_eq!(first.len(), 8);
    }

    #[test]
    fn unbounded_window_keeps_full_history() {
        let builder = DialogueContextBuilder::new(HistoryWindow::unbounded());
        let record = record_with_pairs("u1", 50);

        let context = builder.build_context(&SystemDirective::default(), Some(&record), "next");

        assert_eq!(context.len(), 102);
        assert_eq!(context[1].content, "user 0");
    }

    #[test]
    fn bounded_window_evicts_oldest_pairs() {
        let builder = DialogueContextBuilder::new(HistoryWindow::last_turns(2));
        let record = record_with_pairs("u1", 5);

        let context = builder.build_context(&SystemDirective::default(), Some(&record), "next");

        let contents: Vec<&str> = context.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(
            &contents[1..],
            &["user 3", "assistant 3", "user 4", "assistant 4", "next"]
        );
    }

    #[test]
    fn window_never_starts_on_orphan_reply() {
        let mut history = vec![ConversationTurn::assistant("orphan")];
        history.push(ConversationTurn::user("user 0"));
        history.push(ConversationTurn::assistant("assistant 0"));

        let selected = HistoryWindow::last_turns(2).select(&history);

        assert_eq!(selected.len(), 2);
        assert_eq!(selected[0].role, Role::User);
    }

    #[test]
    fn stored_system_turns_are_not_forwarded() {
        let builder = DialogueContextBuilder::default();
        let mut record = UserHistoryRecord::new("u1".to_string());
        record
            .history
            .push(ConversationTurn::new(Role::System, "old persona"));

        let context = builder.build_context(&SystemDirective::default(), Some(&record), "hello");

        assert_eq!(context.len(), 2);
        assert_eq!(
            context.iter().filter(|m| m.role == Role::System).count(),
            1
        );
    }
}
