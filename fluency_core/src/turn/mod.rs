mod adapters;
mod error;
mod orchestrator;

pub use adapters::{ResponseGenerator, SpeechSynthesizer, Transcriber, Transcript};
pub use error::{FailureKind, TurnError, TurnFailure, TurnStage};
pub use orchestrator::{DEFAULT_EMPTY_TRANSCRIPT_REPLY, TurnOrchestrator, TurnResult};
