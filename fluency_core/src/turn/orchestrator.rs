//! One request/response cycle of a practice session.

use std::sync::Arc;

use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::artifact::{ArtifactDir, AudioArtifact, AudioFormat};
use crate::conversation::{
    ConversationTurn, DialogueContextBuilder, HistoryWindow, SystemDirective,
};
use crate::store::ConversationStore;

use super::adapters::{ResponseGenerator, SpeechSynthesizer, Transcriber, Transcript};
use super::error::{TurnError, TurnFailure, TurnStage};

/// Reply used when the recording contained no intelligible speech.
pub const DEFAULT_EMPTY_TRANSCRIPT_REPLY: &str = "I couldn't hear you.";

/// Result of a turn that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnResult {
    pub transcript: String,
    pub reply_text: String,
    /// `None` only when the transcript was empty.
    pub reply_audio: Option<Vec<u8>>,
}

/// Coordinates transcription, context building, generation, persistence
/// and synthesis for one utterance.
///
/// Turns for different users share nothing but the store, so one
/// orchestrator can serve concurrent requests.
pub struct TurnOrchestrator {
    transcriber: Transcriber,
    generator: ResponseGenerator,
    synthesizer: SpeechSynthesizer,
    store: Arc<dyn ConversationStore>,
    directive: SystemDirective,
    context_builder: DialogueContextBuilder,
    artifacts: ArtifactDir,
    input_format: AudioFormat,
    empty_transcript_reply: String,
}

impl TurnOrchestrator {
    pub fn new(
        transcriber: Transcriber,
        generator: ResponseGenerator,
        synthesizer: SpeechSynthesizer,
        store: Arc<dyn ConversationStore>,
    ) -> Self {
        Self {
            transcriber,
            generator,
            synthesizer,
            store,
            directive: SystemDirective::default(),
            context_builder: DialogueContextBuilder::default(),
            artifacts: ArtifactDir::system_temp(),
            input_format: AudioFormat::Webm,
            empty_transcript_reply: DEFAULT_EMPTY_TRANSCRIPT_REPLY.to_string(),
        }
    }

    #[must_use]
    pub fn with_directive(mut self, directive: SystemDirective) -> Self {
        self.directive = directive;
        self
    }

    #[must_use]
    pub const fn with_history_window(mut self, window: HistoryWindow) -> Self {
        self.context_builder = DialogueContextBuilder::new(window);
        self
    }

    /// Directory for input and synthesized artifacts.
    #[must_use]
    pub fn with_artifact_dir(mut self, artifacts: ArtifactDir) -> Self {
        self.synthesizer.set_artifact_dir(artifacts.clone());
        self.artifacts = artifacts;
        self
    }

    #[must_use]
    pub const fn with_input_format(mut self, format: AudioFormat) -> Self {
        self.input_format = format;
        self
    }

    #[must_use]
    pub fn with_empty_transcript_reply(mut self, reply: impl Into<String>) -> Self {
        self.empty_transcript_reply = reply.into();
        self
    }

    #[must_use]
    pub const fn directive(&self) -> &SystemDirective {
        &self.directive
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn ConversationStore> {
        &self.store
    }

    /// Process one recorded utterance for `user_id`.
    ///
    /// Never panics on adapter errors: every failure comes back as a
    /// [`TurnFailure`]. All audio artifacts created for the turn are
    /// deleted before this returns.
    pub async fn process_turn(
        &self,
        user_id: &str,
        audio_bytes: &[u8],
    ) -> Result<TurnResult, TurnFailure> {
        let turn_id = Uuid::now_v7();
        let span = info_span!("turn", %turn_id, user_id);

        async {
            let mut stage = TurnStage::Received;
            match self.run(user_id, audio_bytes, &mut stage).await {
                Ok(result) => Ok(result),
                Err(e) => {
                    error!("Turn failed while {stage}: {e}");
                    Err(TurnFailure::new(&e, stage))
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn run(
        &self,
        user_id: &str,
        audio_bytes: &[u8],
        stage: &mut TurnStage,
    ) -> Result<TurnResult, TurnError> {
        if user_id.trim().is_empty() {
            return Err(TurnError::InvalidInput("user id is empty".to_string()));
        }
        if audio_bytes.is_empty() {
            return Err(TurnError::InvalidInput("audio payload is empty".to_string()));
        }
        info!("Received {} bytes of audio", audio_bytes.len());

        let input = self.artifacts.create(self.input_format, audio_bytes)?;
        let result = self.respond(user_id, &input, stage).await;
        Self::release(input);
        result
    }

    async fn respond(
        &self,
        user_id: &str,
        input: &AudioArtifact,
        stage: &mut TurnStage,
    ) -> Result<TurnResult, TurnError> {
        advance(stage, TurnStage::Transcribing);
        let transcript = self
            .transcriber
            .transcribe(input)
            .await
            .map_err(TurnError::Transcription)?;

        let user_text = match transcript {
            Transcript::Empty => {
                info!("Empty transcript, answering with fallback");
                return Ok(TurnResult {
                    transcript: String::new(),
                    reply_text: self.empty_transcript_reply.clone(),
                    reply_audio: None,
                });
            }
            Transcript::Speech(text) => text,
        };
        let user_turn = ConversationTurn::user(&user_text);
        debug!("Transcript: {user_text}");

        advance(stage, TurnStage::ContextBuilding);
        let record = self.store.load(user_id).await.map_err(TurnError::Store)?;
        let context =
            self.context_builder
                .build_context(&self.directive, record.as_ref(), &user_text);

        advance(stage, TurnStage::Generating);
        let reply_text = self
            .generator
            .generate(&context)
            .await
            .map_err(TurnError::Generation)?;
        let assistant_turn = ConversationTurn::assistant(&reply_text);

        advance(stage, TurnStage::Persisting);
        self.store
            .append_pair(user_id, &user_turn, &assistant_turn)
            .await
            .map_err(TurnError::Store)?;

        advance(stage, TurnStage::Synthesizing);
        let output = self
            .synthesizer
            .synthesize(&reply_text)
            .await
            .map_err(TurnError::Synthesis)?;
        let reply_audio = output.read().await;
        Self::release(output);
        let reply_audio = reply_audio?;

        advance(stage, TurnStage::Completed);
        Ok(TurnResult {
            transcript: user_text,
            reply_text,
            reply_audio: Some(reply_audio),
        })
    }

    fn release(artifact: AudioArtifact) {
        if let Err(e) = artifact.release() {
            warn!("Resource cleanup failure: {e}");
        }
    }
}

fn advance(stage: &mut TurnStage, next: TurnStage) {
    debug!("Turn stage {stage} -> {next}");
    *stage = next;
}
