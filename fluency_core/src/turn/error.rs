use serde::Serialize;
use thiserror::Error;

use crate::artifact::ArtifactError;

/// Pipeline position of a turn. Used for logging and to report where a
/// failed turn stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnStage {
    Received,
    Transcribing,
    ContextBuilding,
    Generating,
    Persisting,
    Synthesizing,
    Completed,
}

impl std::fmt::Display for TurnStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Received => "received",
            Self::Transcribing => "transcribing",
            Self::ContextBuilding => "context_building",
            Self::Generating => "generating",
            Self::Persisting => "persisting",
            Self::Synthesizing => "synthesizing",
            Self::Completed => "completed",
        };
        f.write_str(name)
    }
}

/// Errors raised inside one turn.
#[derive(Debug, Error)]
pub enum TurnError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("audio artifact error: {0}")]
    Artifact(#[from] ArtifactError),

    #[error("transcription failed: {0}")]
    Transcription(#[source] anyhow::Error),

    #[error("reply generation failed: {0}")]
    Generation(#[source] anyhow::Error),

    #[error("speech synthesis failed: {0}")]
    Synthesis(#[source] anyhow::Error),

    #[error("conversation store error: {0}")]
    Store(#[source] anyhow::Error),
}

impl TurnError {
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::InvalidInput(_) => FailureKind::InvalidInput,
            Self::Artifact(_) => FailureKind::ArtifactFailure,
            Self::Transcription(_) => FailureKind::TranscriptionFailure,
            Self::Generation(_) => FailureKind::GenerationFailure,
            Self::Synthesis(_) => FailureKind::SynthesisFailure,
            Self::Store(_) => FailureKind::StoreFailure,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    InvalidInput,
    ArtifactFailure,
    TranscriptionFailure,
    GenerationFailure,
    SynthesisFailure,
    StoreFailure,
}

/// What a caller sees when a turn fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("turn failed while {stage} ({kind:?}): {message}")]
pub struct TurnFailure {
    pub kind: FailureKind,
    pub stage: TurnStage,
    pub message: String,
}

impl TurnFailure {
    #[must_use]
    pub fn new(error: &TurnError, stage: TurnStage) -> Self {
        Self {
            kind: error.kind(),
            stage,
            message: error.to_string(),
        }
    }
}
