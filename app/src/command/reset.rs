use fluency_config::Config;
use fluency_core::ConversationStore;

/// Input parameters for the Reset command strategy.
#[derive(Debug, Clone)]
pub struct ResetInput {
    pub user: String,
}

/// Strategy for deleting a user's stored conversation.
#[derive(Debug, Clone, Copy)]
pub struct ResetStrategy;

impl super::CommandStrategy for ResetStrategy {
    type Input = ResetInput;

    async fn execute(&self, input: Self::Input) -> anyhow::Result<()> {
        let config = Config::load()?;
        let store = super::open_store(&config).await?;

        store.clear(&input.user).await?;
        println!("Cleared conversation for {}", input.user);
        Ok(())
    }
}
