//! Thin adapters between the turn pipeline and the external capabilities.

use std::sync::Arc;

use tracing::{debug, info};

use crate::artifact::{ArtifactDir, AudioArtifact};
use crate::{ChatMessage, GenerationParams, LLMProvider, SpeechToText, TextToSpeech, VoiceSelection};

/// Outcome of transcribing one utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transcript {
    /// The service returned no intelligible speech.
    Empty,
    /// Trimmed, non-empty transcript.
    Speech(String),
}

impl Transcript {
    #[must_use]
    pub fn from_raw(raw: &str) -> Self {
        let text = raw.trim();
        if text.is_empty() {
            Self::Empty
        } else {
            Self::Speech(text.to_string())
        }
    }
}

/// Audio artifact to text, with the language fixed to one locale.
pub struct Transcriber<S = Arc<dyn SpeechToText>> {
    backend: S,
    language: String,
}

impl<S: SpeechToText> Transcriber<S> {
    pub fn new(backend: S, language: impl Into<String>) -> Self {
        Self {
            backend,
            language: language.into(),
        }
    }

    pub async fn transcribe(&self, audio: &AudioArtifact) -> anyhow::Result<Transcript> {
        let bytes = audio.read().await?;
        debug!(
            "Transcribing {} bytes of {} audio",
            bytes.len(),
            audio.format().extension()
        );

        let raw = self
            .backend
            .transcribe(&bytes, &audio.file_name(), &self.language)
            .await?;

        Ok(Transcript::from_raw(&raw))
    }
}

/// Message context to a single reply, with decoding parameters held fixed.
pub struct ResponseGenerator<P = Arc<dyn LLMProvider>> {
    provider: P,
    params: GenerationParams,
}

impl<P: LLMProvider> ResponseGenerator<P> {
    pub const fn new(provider: P, params: GenerationParams) -> Self {
        Self { provider, params }
    }

    pub async fn generate(&self, context: &[ChatMessage]) -> anyhow::Result<String> {
        for (i, msg) in context.iter().enumerate() {
            debug!(
                "Message {}: role={}, content_len={}",
                i,
                msg.role,
                msg.content.len()
            );
        }

        let response = self.provider.chat(context, &self.params).await?;

        if let Some(usage) = &response.usage {
            info!(
                "Tokens: {} prompt + {} completion = {} total",
                usage.prompt_tokens, usage.completion_tokens, usage.total_tokens
            );
        }

        let reply = response.content.trim();
        if reply.is_empty() {
            anyhow::bail!("Empty response from model {}", self.params.model);
        }
        Ok(reply.to_string())
    }
}

/// Reply text to a new, caller-owned audio artifact.
pub struct SpeechSynthesizer<T = Arc<dyn TextToSpeech>> {
    backend: T,
    voice: VoiceSelection,
    artifacts: ArtifactDir,
}

impl<T: TextToSpeech> SpeechSynthesizer<T> {
    pub fn new(backend: T, voice: VoiceSelection) -> Self {
        Self {
            backend,
            voice,
            artifacts: ArtifactDir::system_temp(),
        }
    }

    pub(crate) fn set_artifact_dir(&mut self, artifacts: ArtifactDir) {
        self.artifacts = artifacts;
    }

    pub async fn synthesize(&self, text: &str) -> anyhow::Result<AudioArtifact> {
        let audio = self.backend.synthesize(text, &self.voice).await?;
        if audio.is_empty() {
            anyhow::bail!("Speech backend returned no audio");
        }
        let artifact = self.artifacts.create(self.backend.output_format(), &audio)?;
        Ok(artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transcript_trims_and_detects_silence() {
        assert_eq!(Transcript::from_raw(""), Transcript::Empty);
        assert_eq!(Transcript::from_raw("  \n\t "), Transcript::Empty);
        assert_eq!(
            Transcript::from_raw("  Hi, I'm Sam \n"),
            Transcript::Speech("Hi, I'm Sam".to_string())
        );
    }
}
