//! Static strategy pattern for CLI commands.
//!
//! Each command is a separate strategy type with its own input, so
//! dispatch in `main` is resolved at compile time.

use std::sync::Arc;

use fluency_config::Config;
use fluency_core::{
    ArtifactDir, ConversationStore, LLMProvider, ResponseGenerator, SpeechSynthesizer,
    SpeechToText, TextToSpeech, Transcriber, TurnOrchestrator,
};
use fluency_providers::{GoogleTts, GroqProvider};
use fluency_session::SessionManager;
use tracing::info;

mod history;
mod info;
mod init;
mod reset;
mod serve;
mod turn;
mod users;
mod version;

pub use history::{HistoryInput, HistoryStrategy};
pub use info::InfoStrategy;
pub use init::InitStrategy;
pub use reset::{ResetInput, ResetStrategy};
pub use serve::{ServeInput, ServeStrategy};
pub use turn::{TurnInput, TurnStrategy};
pub use users::UsersStrategy;
pub use version::VersionStrategy;

/// Contract shared by all command strategies.
pub trait CommandStrategy: Send + Sync + 'static {
    /// The input type this strategy accepts.
    type Input;

    /// Execute the command with the given input.
    async fn execute(&self, input: Self::Input) -> anyhow::Result<()>;
}

/// Connect to the configured conversation database.
async fn open_store(config: &Config) -> anyhow::Result<Arc<SessionManager>> {
    info!("Connecting to database");
    Ok(Arc::new(SessionManager::new(&config.database.url).await?))
}

/// Wire the Groq and Google TTS clients and the store into a turn pipeline.
fn build_orchestrator(
    config: &Config,
    store: Arc<dyn ConversationStore>,
) -> anyhow::Result<TurnOrchestrator> {
    let timeout = config.request_timeout();

    let mut groq = GroqProvider::new(config.providers.groq.api_key.clone(), timeout)?
        .with_transcription_model(config.transcription.model.clone());
    if let Some(base_url) = &config.providers.groq.base_url {
        groq = groq.with_base_url(base_url.clone());
    }
    let groq = Arc::new(groq);

    let stt: Arc<dyn SpeechToText> = groq.clone();
    let llm: Arc<dyn LLMProvider> = groq;
    let tts: Arc<dyn TextToSpeech> =
        Arc::new(GoogleTts::new(timeout)?.with_tld(config.speech.tld.clone()));

    let therapist = &config.therapist;
    let mut orchestrator = TurnOrchestrator::new(
        Transcriber::new(stt, config.transcription.language.clone()),
        ResponseGenerator::new(llm, therapist.generation_params()),
        SpeechSynthesizer::new(tts, config.speech.voice()),
        store,
    )
    .with_directive(therapist.directive())
    .with_history_window(therapist.history_window());

    if let Some(reply) = &therapist.empty_transcript_reply {
        orchestrator = orchestrator.with_empty_transcript_reply(reply.clone());
    }
    if let Some(dir) = &config.artifact_dir {
        std::fs::create_dir_all(dir)?;
        orchestrator = orchestrator.with_artifact_dir(ArtifactDir::new(dir.clone()));
    }

    info!(
        "Turn pipeline ready: model={}, history_window={:?}",
        therapist.model,
        therapist.history_limit
    );
    Ok(orchestrator)
}
