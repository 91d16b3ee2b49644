use fluency_config::Config;
use fluency_core::ConversationStore;

/// Strategy for listing users with a stored conversation.
#[derive(Debug, Clone, Copy)]
pub struct UsersStrategy;

impl super::CommandStrategy for UsersStrategy {
    type Input = ();

    async fn execute(&self, _input: Self::Input) -> anyhow::Result<()> {
        let config = Config::load()?;
        let store = super::open_store(&config).await?;

        let users = store.list_users().await?;
        if users.is_empty() {
            println!("No stored conversations");
        }
        for user in users {
            println!("{user}");
        }
        Ok(())
    }
}
