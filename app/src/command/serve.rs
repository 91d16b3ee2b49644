use std::sync::Arc;

use fluency_config::Config;

use crate::server::{self, AppState};

/// Input parameters for the Serve command strategy.
#[derive(Debug, Clone)]
pub struct ServeInput {
    /// Listen address; falls back to `server.bind` from config.
    pub bind: Option<String>,
}

/// Strategy for running the practice web service.
#[derive(Debug, Clone, Copy)]
pub struct ServeStrategy;

impl super::CommandStrategy for ServeStrategy {
    type Input = ServeInput;

    async fn execute(&self, input: Self::Input) -> anyhow::Result<()> {
        let config = Config::load()?;
        let store = super::open_store(&config).await?;
        let orchestrator = super::build_orchestrator(&config, store)?;

        let bind = input.bind.unwrap_or_else(|| config.server.bind.clone());
        let state = AppState::new(Arc::new(orchestrator));
        let assets = std::env::current_dir()?;

        server::serve(&bind, state, &assets).await
    }
}
