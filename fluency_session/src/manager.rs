use async_trait::async_trait;
use fluency_core::conversation::ensure_pair;
use fluency_core::{ConversationStore, ConversationTurn, Role, UserHistoryRecord};
use fluency_entities::conversation_turns;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, Database, DatabaseConnection, DbErr,
    EntityTrait, QueryFilter, QueryOrder, QuerySelect, Schema, Set, TransactionTrait,
};
use tracing::{debug, info};

fn is_table_already_exists_error(err: &DbErr) -> bool {
    err.to_string().contains("table") && err.to_string().contains("already exists")
}

/// `ConversationStore` backed by a SQL database (SQLite by default).
///
/// Each turn is a row; a pair is inserted inside one transaction, so
/// concurrent appends for the same user never interleave or half-land.
pub struct SessionManager {
    db: DatabaseConnection,
}

impl SessionManager {
    pub async fn new(db_url: &str) -> anyhow::Result<Self> {
        info!("Connecting to database: {}", db_url);

        let db = Database::connect(db_url).await?;

        let backend = db.get_database_backend();
        let schema = Schema::new(backend);
        let stmt = schema.create_table_from_entity(conversation_turns::Entity);
        match db
            .execute_unprepared(&backend.build(&stmt).to_string())
            .await
        {
            Ok(_) => {}
            Err(e) if is_table_already_exists_error(&e) => {
                info!("Table already exists, skipping creation");
            }
            Err(e) => return Err(e.into()),
        }

        info!("SessionManager initialized");
        Ok(Self { db })
    }

    fn to_active_model(user_id: &str, turn: &ConversationTurn) -> conversation_turns::ActiveModel {
        conversation_turns::ActiveModel {
            user_id: Set(user_id.to_owned()),
            role: Set(turn.role.as_str().to_owned()),
            content: Set(turn.content.clone()),
            created_at: Set(turn.timestamp.naive_utc()),
            ..Default::default()
        }
    }

    fn to_turn(model: conversation_turns::Model) -> anyhow::Result<ConversationTurn> {
        Ok(ConversationTurn {
            role: model.role.parse::<Role>()?,
            content: model.content,
            timestamp: model.created_at.and_utc(),
        })
    }
}

#[async_trait]
impl ConversationStore for SessionManager {
    async fn load(&self, user_id: &str) -> anyhow::Result<Option<UserHistoryRecord>> {
        let rows = conversation_turns::Entity::find()
            .filter(conversation_turns::Column::UserId.eq(user_id))
            .order_by_asc(conversation_turns::Column::Id)
            .all(&self.db)
            .await?;

        if rows.is_empty() {
            return Ok(None);
        }

        let history = rows
            .into_iter()
            .map(Self::to_turn)
            .collect::<anyhow::Result<Vec<_>>>()?;

        debug!("Loaded {} turns for {}", history.len(), user_id);
        Ok(Some(UserHistoryRecord {
            user_id: user_id.to_owned(),
            history,
        }))
    }

    async fn append_pair(
        &self,
        user_id: &str,
        user_turn: &ConversationTurn,
        assistant_turn: &ConversationTurn,
    ) -> anyhow::Result<()> {
        ensure_pair(user_turn, assistant_turn)?;

        let txn = self.db.begin().await?;
        Self::to_active_model(user_id, user_turn).insert(&txn).await?;
        Self::to_active_model(user_id, assistant_turn)
            .insert(&txn)
            .await?;
        txn.commit().await?;

        info!("Appended turn pair for user: {}", user_id);
        Ok(())
    }

    async fn clear(&self, user_id: &str) -> anyhow::Result<()> {
        conversation_turns::Entity::delete_many()
            .filter(conversation_turns::Column::UserId.eq(user_id))
            .exec(&self.db)
            .await?;

        info!("Cleared history for user: {}", user_id);
        Ok(())
    }

    async fn list_users(&self) -> anyhow::Result<Vec<String>> {
        let users = conversation_turns::Entity::find()
            .select_only()
            .column(conversation_turns::Column::UserId)
            .distinct()
            .order_by_asc(conversation_turns::Column::UserId)
            .into_tuple::<String>()
            .all(&self.db)
            .await?;

        Ok(users)
    }
}
