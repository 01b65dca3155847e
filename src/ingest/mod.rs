//! Audio ingestion.
//!
//! Audio clips arrive through the HTTP transport or the CLI and are turned
//! into text here before extraction:
//!
//! ```text
//! audio bytes → Transcriber → transcript → Assistant (archive + extract)
//! ```

pub mod transcriber;

pub use transcriber::{
    Transcriber, TranscriptResult, WhisperApiTranscriber, CONVERSATION_PROMPT, DICTATION_PROMPT,
};
