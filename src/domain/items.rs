//! Structured items extracted from a user message.
//!
//! These are the validated, typed form of what the LLM returned. Every
//! sequence may be empty; missing fields were already defaulted during
//! extraction, so downstream code never sees a partially-filled item.

use serde::{Deserialize, Serialize};

use super::recurrence::RecurrenceRule;

/// Fallback title for tasks and events without one
pub const DEFAULT_TITLE: &str = "No Title";

/// Fallback description used when creating calendar events
pub const DEFAULT_DESCRIPTION: &str = "No Description";

/// Fallback title for notes
pub const DEFAULT_NOTE_TITLE: &str = "Untitled";

/// Fallback content for shopping lists
pub const DEFAULT_SHOPPING_CONTENT: &str = "No content";

/// Everything extracted from one message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuredData {
    #[serde(default)]
    pub tasks: Vec<TaskItem>,

    #[serde(default)]
    pub events: Vec<EventItem>,

    #[serde(default)]
    pub notes: Vec<NoteItem>,

    #[serde(default)]
    pub shopping_lists: Vec<ShoppingListItem>,
}

impl StructuredData {
    /// Total number of items across all kinds
    pub fn item_count(&self) -> usize {
        self.tasks.len() + self.events.len() + self.notes.len() + self.shopping_lists.len()
    }

    /// True when nothing was extracted
    pub fn is_empty(&self) -> bool {
        self.item_count() == 0
    }
}

/// A to-do item for the task manager
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskItem {
    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Due date as returned by the LLM (expected `YYYY-MM-DD`, not validated here)
    #[serde(default)]
    pub due_date: Option<String>,
}

impl TaskItem {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            due_date: None,
        }
    }

    pub fn with_due_date(mut self, due_date: impl Into<String>) -> Self {
        self.due_date = Some(due_date.into());
        self
    }
}

/// A calendar event.
///
/// `start` and `end` keep the LLM's local datetime text (`YYYY-MM-DD HH:MM:SS`);
/// the calendar adapter interprets them in its configured timezone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventItem {
    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(rename = "start_datetime", alias = "start")]
    pub start: String,

    /// Missing end means "one hour after start"
    #[serde(rename = "end_datetime", alias = "end", default)]
    pub end: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence: Option<RecurrenceRule>,
}

impl EventItem {
    pub fn new(title: impl Into<String>, start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            start: start.into(),
            end: Some(end.into()),
            recurrence: None,
        }
    }
}

/// A free-form note
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteItem {
    pub title: String,
    pub content: String,
}

impl NoteItem {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
        }
    }
}

/// A shopping list; categories live inside the free-text content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShoppingListItem {
    pub content: String,
}
