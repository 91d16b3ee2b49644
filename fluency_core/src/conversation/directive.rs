use crate::{ChatMessage, Role};

/// Persona and behavioral instructions for the practice therapist.
pub const THERAPIST_DIRECTIVE: &str = "You are a compassionate, patient, and encouraging Speech Therapist. \
Your goal is to help the user overcome stammering (stuttering) and mispronunciation.\n\n\
Your method:\n\
1. Listen carefully to the user's input.\n\
2. If the user stammers or mispronounces, gently point it out and ask them to repeat slowly.\n\
3. Conduct short 'Repeat After Me' exercises.\n\
4. Focus on breathing and pacing.\n\
5. Keep responses concise (2-3 sentences).\n\
6. Be encouraging and celebrate small wins.\n\n\
Start by asking the user to introduce themselves.";

/// The system message placed first in every context. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemDirective {
    content: String,
}

impl SystemDirective {
    #[must_use]
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }

    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    #[must_use]
    pub fn to_message(&self) -> ChatMessage {
        ChatMessage {
            role: Role::System,
            content: self.content.clone(),
        }
    }
}

impl Default for SystemDirective {
    fn default() -> Self {
        Self::new(THERAPIST_DIRECTIVE)
    }
}
