#![deny(
    clippy::all,
    clippy::nursery,
    clippy::pedantic,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::correctness,
    clippy::suspicious,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(
    clippy::similar_names,
    clippy::missing_safety_doc,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc
)]

//! Turn-processing core for spoken speech-therapy practice.
//!
//! One turn takes a recorded utterance and a user id, transcribes it,
//! asks a conversational model for a therapeutic reply, persists the
//! exchange and synthesizes the reply back to audio. Speech recognition,
//! generation and synthesis are reached through the capability traits
//! defined here; the crates that talk to real services implement them.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod artifact;
pub mod conversation;
pub mod store;
pub mod turn;

pub use artifact::{ArtifactDir, ArtifactError, AudioArtifact, AudioFormat};
pub use conversation::{
    ConversationTurn, DialogueContextBuilder, HistoryWindow, SystemDirective, UserHistoryRecord,
};
pub use store::{ConversationStore, InMemoryConversationStore};
pub use turn::{
    DEFAULT_EMPTY_TRANSCRIPT_REPLY, FailureKind, ResponseGenerator, SpeechSynthesizer,
    Transcriber, Transcript, TurnError, TurnFailure, TurnOrchestrator, TurnResult, TurnStage,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            "system" => Ok(Self::System),
            other => anyhow::bail!("Unknown role: {other}"),
        }
    }
}

/// A message as sent to the conversational model: role and content only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LLMResponse {
    pub content: String,
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Decoding parameters held fixed for every reply.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            model: "llama-3.3-70b-versatile".to_string(),
            max_tokens: 250,
            temperature: 0.6,
        }
    }
}

/// Voice selection for speech synthesis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceSelection {
    pub language: String,
    pub slow: bool,
}

impl Default for VoiceSelection {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            slow: false,
        }
    }
}

/// Conversational-model capability.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        params: &GenerationParams,
    ) -> anyhow::Result<LLMResponse>;
}

/// Speech-to-text capability.
///
/// Returns whatever text the service produced; an empty string means the
/// service heard nothing, which is not an error.
#[async_trait]
pub trait SpeechToText: Send + Sync {
    async fn transcribe(
        &self,
        audio: &[u8],
        file_name: &str,
        language: &str,
    ) -> anyhow::Result<String>;
}

/// Text-to-speech capability. Returns an encoded audio payload.
#[async_trait]
pub trait TextToSpeech: Send + Sync {
    async fn synthesize(&self, text: &str, voice: &VoiceSelection) -> anyhow::Result<Vec<u8>>;

    /// Container format of the payloads this backend produces.
    fn output_format(&self) -> AudioFormat {
        AudioFormat::Mp3
    }
}

#[async_trait]
impl<T: LLMProvider + ?Sized> LLMProvider for Arc<T> {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        params: &GenerationParams,
    ) -> anyhow::Result<LLMResponse> {
        (**self).chat(messages, params).await
    }
}

#[async_trait]
impl<T: SpeechToText + ?Sized> SpeechToText for Arc<T> {
    async fn transcribe(
        &self,
        audio: &[u8],
        file_name: &str,
        language: &str,
    ) -> anyhow::Result<String> {
        (**self).transcribe(audio, file_name, language).await
    }
}

#[async_trait]
impl<T: TextToSpeech + ?Sized> TextToSpeech for Arc<T> {
    async fn synthesize(&self, text: &str, voice: &VoiceSelection) -> anyhow::Result<Vec<u8>> {
        (**self).synthesize(text, voice).await
    }

    fn output_format(&self) -> AudioFormat {
        (**self).output_format()
    }
}
