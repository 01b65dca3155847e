//! Domain types for quill.
//!
//! This module contains the core data structures:
//! - Items: Validated extraction output (tasks, events, notes, shopping lists)
//! - Recurrence: Normalized recurrence rules for events
//! - Dispatch: Per-item outcomes and the request summary

pub mod dispatch;
pub mod items;
pub mod recurrence;

// Re-export commonly used types
pub use dispatch::{
    DispatchResult, DispatchSummary, EventReceipt, Failure, ItemKind, LinkField, Outcome,
    PageReceipt, Receipt, SourceItem, Summary, TaskReceipt,
};
pub use items::{
    EventItem, NoteItem, ShoppingListItem, StructuredData, TaskItem, DEFAULT_DESCRIPTION,
    DEFAULT_NOTE_TITLE, DEFAULT_SHOPPING_CONTENT, DEFAULT_TITLE,
};
pub use recurrence::{Frequency, RawRecurrence, RecurrenceError, RecurrenceRule, Weekday};
