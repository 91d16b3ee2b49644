use fluency_config::Config;
use fluency_core::ConversationStore;

/// Input parameters for the History command strategy.
#[derive(Debug, Clone)]
pub struct HistoryInput {
    pub user: String,
}

/// Strategy for printing a user's stored conversation, oldest first.
#[derive(Debug, Clone, Copy)]
pub struct HistoryStrategy;

impl super::CommandStrategy for HistoryStrategy {
    type Input = HistoryInput;

    async fn execute(&self, input: Self::Input) -> anyhow::Result<()> {
        let config = Config::load()?;
        let store = super::open_store(&config).await?;

        let Some(record) = store.load(&input.user).await? else {
            println!("No conversation stored for {}", input.user);
            return Ok(());
        };

        println!(
            "=== {} ({} exchanges) ===\n",
            record.user_id,
            record.turn_count()
        );
        for turn in &record.history {
            println!(
                "[{}] {:>9}: {}",
                turn.timestamp.format("%Y-%m-%d %H:%M:%S"),
                turn.role.as_str(),
                turn.content
            );
        }

        Ok(())
    }
}
