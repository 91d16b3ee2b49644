//! Per-user conversation persistence.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::conversation::{ConversationTurn, UserHistoryRecord, ensure_pair};

/// Durable per-user turn history.
///
/// `append_pair` must be atomic with respect to concurrent callers for the
/// same user: both turns land together, adjacent, after all earlier pairs.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Point lookup. Unknown users yield `None`.
    async fn load(&self, user_id: &str) -> anyhow::Result<Option<UserHistoryRecord>>;

    /// Append one exchange, creating the record when absent.
    async fn append_pair(
        &self,
        user_id: &str,
        user_turn: &ConversationTurn,
        assistant_turn: &ConversationTurn,
    ) -> anyhow::Result<()>;

    /// Remove a user's history entirely.
    async fn clear(&self, user_id: &str) -> anyhow::Result<()>;

    /// User ids that have stored history.
    async fn list_users(&self) -> anyhow::Result<Vec<String>>;
}

#[async_trait]
impl<T: ConversationStore + ?Sized> ConversationStore for Arc<T> {
    async fn load(&self, user_id: &str) -> anyhow::Result<Option<UserHistoryRecord>> {
        (**self).load(user_id).await
    }

    async fn append_pair(
        &self,
        user_id: &str,
        user_turn: &ConversationTurn,
        assistant_turn: &ConversationTurn,
    ) -> anyhow::Result<()> {
        (**self).append_pair(user_id, user_turn, assistant_turn).await
    }

    async fn clear(&self, user_id: &str) -> anyhow::Result<()> {
        (**self).clear(user_id).await
    }

    async fn list_users(&self) -> anyhow::Result<Vec<String>> {
        (**self).list_users().await
    }
}

/// Process-local store keyed by user id. The whole pair is pushed under a
/// single lock acquisition.
#[derive(Debug, Default)]
pub struct InMemoryConversationStore {
    records: Mutex<HashMap<String, Vec<ConversationTurn>>>,
}

impl InMemoryConversationStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn load(&self, user_id: &str) -> anyhow::Result<Option<UserHistoryRecord>> {
        let records = self.records.lock().await;
        Ok(records.get(user_id).map(|history| UserHistoryRecord {
            user_id: user_id.to_string(),
            history: history.clone(),
        }))
    }

    async fn append_pair(
        &self,
        user_id: &str,
        user_turn: &ConversationTurn,
        assistant_turn: &ConversationTurn,
    ) -> anyhow::Result<()> {
        ensure_pair(user_turn, assistant_turn)?;

        let mut records = self.records.lock().await;
        let history = records.entry(user_id.to_string()).or_default();
        history.push(user_turn.clone());
        history.push(assistant_turn.clone());

        debug!("Appended pair for {user_id}; {} turns stored", history.len());
        Ok(())
    }

    async fn clear(&self, user_id: &str) -> anyhow::Result<()> {
        self.records.lock().await.remove(user_id);
        Ok(())
    }

    async fn list_users(&self) -> anyhow::Result<Vec<String>> {
        let mut users: Vec<String> = self.records.lock().await.keys().cloned().collect();
        users.sort();
        Ok(users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Role;

    #[tokio::test]
    #[expect(clippy::expect_used, reason = "Test failure should panic with context")]
    async fn unknown_user_loads_none() {
        let store = InMemoryConversationStore::new();
        assert!(store.load("nobody").await.expect("load").is_none());
    }

    #[tokio::test]
    #[expect(clippy::expect_used, reason = "Test failure should panic with context")]
    async fn append_then_load_round_trips_pair() {
        let store = InMemoryConversationStore::new();
        let user = ConversationTurn::user("Hi, I'm Sam");
        let assistant = ConversationTurn::assistant("Hello Sam, say your name slowly.");

        store
            .append_pair("u1", &user, &assistant)
            .await
            .expect("append");

        let record = store.load("u1").await.expect("load").expect("record");
        assert_eq!(record.user_id, "u1");
        assert_eq!(record.history, vec![user, assistant]);
    }

    #[tokio::test]
    #[expect(clippy::expect_used, reason = "Test failure should panic with context")]
    async fn system_turns_are_rejected() {
        let store = InMemoryConversationStore::new();
        let result = store
            .append_pair(
                "u1",
                &ConversationTurn::new(Role::System, "persona"),
                &ConversationTurn::assistant("reply"),
            )
            .await;

        assert!(result.is_err());
        assert!(store.load("u1").await.expect("load").is_none());
    }

    #[tokio::test]
    #[expect(clippy::expect_used, reason = "Test failure should panic with context")]
    async fn concurrent_appends_keep_pairs_adjacent() {
        let store = Arc::new(InMemoryConversationStore::new());

        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .append_pair(
                        "u1",
                        &ConversationTurn::user(format!("q{i}")),
                        &ConversationTurn::assistant(format!("a{i}")),
                    )
                    .await
            }));
        }
        for handle in handles {
            handle.await.expect("join").expect("append");
        }

        let record = store.load("u1").await.expect("load").expect("record");
        assert_eq!(record.history.len(), 32);
        for pair in record.history.chunks(2) {
            assert_eq!(pair[0].role, Role::User);
            assert_eq!(pair[1].role, Role::Assistant);
            assert_eq!(pair[0].content[1..], pair[1].content[1..]);
        }
    }

    #[tokio::test]
    #[expect(clippy::expect_used, reason = "Test failure should panic with context")]
    async fn clear_and_list_users() {
        let store = InMemoryConversationStore::new();
        for user in ["u2", "u1"] {
            store
                .append_pair(
                    user,
                    &ConversationTurn::user("hi"),
                    &ConversationTurn::assistant("hello"),
                )
                .await
                .expect("append");
        }

        assert_eq!(store.list_users().await.expect("list"), vec!["u1", "u2"]);

        store.clear("u1").await.expect("clear");
        assert!(store.load("u1").await.expect("load").is_none());
        assert_eq!(store.list_users().await.expect("list"), vec!["u2"]);
    }
}
