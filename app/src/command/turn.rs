use std::path::PathBuf;

use fluency_config::Config;
use fluency_core::AudioFormat;
use tracing::info;

/// Input parameters for the Turn command strategy.
#[derive(Debug, Clone)]
pub struct TurnInput {
    pub user: String,
    pub audio: PathBuf,
    /// Reply audio destination; the reply is only printed when unset.
    pub out: Option<PathBuf>,
}

/// Strategy for running a single practice turn from the command line.
///
/// Uses the same pipeline as the HTTP service, so the turn is stored in
/// the user's history like any other.
#[derive(Debug, Clone, Copy)]
pub struct TurnStrategy;

impl super::CommandStrategy for TurnStrategy {
    type Input = TurnInput;

    async fn execute(&self, input: Self::Input) -> anyhow::Result<()> {
        let config = Config::load()?;
        let store = super::open_store(&config).await?;

        let format = AudioFormat::from_file_name(&input.audio.to_string_lossy());
        let orchestrator = super::build_orchestrator(&config, store)?.with_input_format(format);

        let audio = tokio::fs::read(&input.audio).await?;
        info!(
            "Read {} bytes of {:?} audio from {}",
            audio.len(),
            format,
            input.audio.display()
        );

        let result = orchestrator.process_turn(&input.user, &audio).await?;

        println!("You:       {}", result.transcript);
        println!("Therapist: {}", result.reply_text);

        match (result.reply_audio, input.out) {
            (Some(bytes), Some(out)) => {
                tokio::fs::write(&out, &bytes).await?;
                println!("Reply audio written to {}", out.display());
            }
            (Some(bytes), None) => {
                println!("Reply audio: {} bytes (use --out to save it)", bytes.len());
            }
            (None, _) => println!("No reply audio for an empty recording"),
        }

        Ok(())
    }
}
