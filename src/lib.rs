//! quill - voice/text assistant backend
//!
//! Turns a free-form message (typed, or transcribed from audio) into
//! structured items with an LLM, then creates each item in the service that
//! owns it: tasks in Google Tasks, events in Google Calendar, notes and
//! shopping lists in Notion, with a push notification per item via ntfy.
//!
//! # Architecture
//!
//! ```text
//! text / audio → Transcriber → ExtractionClient → StructuredData
//!     → Dispatcher → Integration adapters → NotificationDispatcher
//!     → DispatchSummary
//! ```
//!
//! One item failing never stops the others: every adapter call ends in its
//! own `Outcome`.
//!
//! # Modules
//!
//! - `adapters`: External system integrations (Google, Notion, ntfy, LLM)
//! - `core`: Extraction, dispatch, notifications and the assistant facade
//! - `domain`: Data structures (items, recurrence, dispatch results)
//! - `ingest`: Speech-to-text
//! - `server`: HTTP transport
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Process one message
//! quill text "Buy milk tomorrow and call Alice on Friday at 3pm"
//!
//! # Run the HTTP server
//! quill serve --bind 0.0.0.0:8000
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod ingest;
pub mod server;

// Re-export main types at crate root for convenience
pub use core::{Assistant, AssistantError, Dispatcher, ExtractionClient, ExtractionError};
pub use domain::{DispatchResult, DispatchSummary, Outcome, StructuredData, Summary};
