//! Core pipeline logic.
//!
//! This module contains:
//! - Extraction: LLM prompt and reply parsing
//! - Dispatcher: Per-item fan-out to integrations
//! - Notifications: Best-effort push for each result
//! - Assistant: Text/audio/conversation entry points

pub mod assistant;
pub mod dispatcher;
pub mod extraction;
pub mod notifications;

use std::sync::Arc;

use chrono::{Local, NaiveDateTime};

// Re-export commonly used types
pub use assistant::{Assistant, AssistantError, AudioReply, ConversationReply};
pub use dispatcher::{Dispatcher, SHOPPING_LIST_TITLE_PREFIX};
pub use extraction::{build_prompt, find_json_span, parse_reply, ExtractionClient, ExtractionError};
pub use notifications::{render, template_for, NotificationDispatcher, Template};

/// Source of local wall-clock time; swapped for a fixed time in tests
pub type Clock = Arc<dyn Fn() -> NaiveDateTime + Send + Sync>;

/// The local system clock
pub fn system_clock() -> Clock {
    Arc::new(|| Local::now().naive_local())
}

/// A clock frozen at `at`
pub fn fixed_clock(at: NaiveDateTime) -> Clock {
    Arc::new(move || at)
}
