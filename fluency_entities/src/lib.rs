//! Database entities for conversation persistence.

pub mod conversation_turns;
