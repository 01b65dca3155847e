//! Per-item dispatch results and the request summary.
//!
//! A [`DispatchResult`] pairs the item that was sent to an integration with
//! the [`Outcome`] of that call. Results live only for one request: the
//! notifier and the summary builder read them, then they are returned to
//! the caller and dropped.

use serde::ser::{SerializeStruct, Serializer};
use serde::Serialize;

use super::items::{EventItem, NoteItem, StructuredData, TaskItem};

/// Kind of dispatched item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Task,
    Event,
    Note,
    ShoppingList,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Task => "task",
            Self::Event => "event",
            Self::Note => "note",
            Self::ShoppingList => "shopping_list",
        }
    }
}

/// The item that was handed to an adapter.
///
/// Shopping lists carry the synthesized note (title + content) that was
/// actually created.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SourceItem {
    Task(TaskItem),
    Event(EventItem),
    Note(NoteItem),
    ShoppingList(NoteItem),
}

impl SourceItem {
    pub fn kind(&self) -> ItemKind {
        match self {
            Self::Task(_) => ItemKind::Task,
            Self::Event(_) => ItemKind::Event,
            Self::Note(_) => ItemKind::Note,
            Self::ShoppingList(_) => ItemKind::ShoppingList,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Self::Task(task) => &task.title,
            Self::Event(event) => &event.title,
            Self::Note(note) | Self::ShoppingList(note) => &note.title,
        }
    }

    /// Event start, if this is an event
    pub fn start(&self) -> Option<&str> {
        match self {
            Self::Event(event) => Some(&event.start),
            _ => None,
        }
    }
}

/// Receipt fields that can carry a link back to the created resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkField {
    /// Google Tasks `webViewLink`
    WebViewLink,
    /// Google Calendar `htmlLink`
    HtmlLink,
    /// Notion page `url`
    Url,
}

/// Created Google task
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TaskReceipt {
    pub task_id: Option<String>,
    pub title: Option<String>,
    pub due: Option<String>,
    pub status: Option<String>,
    #[serde(rename = "webViewLink")]
    pub web_view_link: Option<String>,
}

/// Created calendar event
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EventReceipt {
    #[serde(rename = "htmlLink")]
    pub html_link: Option<String>,
    pub event_data: serde_json::Value,
}

/// Created Notion page
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PageReceipt {
    pub url: Option<String>,
    pub page_data: serde_json::Value,
}

/// Success payload of an adapter call
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Receipt {
    Task(TaskReceipt),
    Event(EventReceipt),
    Page(PageReceipt),
}

impl Receipt {
    /// Look up a link field; `None` if this receipt has no such field or it is empty
    pub fn link(&self, field: LinkField) -> Option<&str> {
        let value = match (self, field) {
            (Self::Task(r), LinkField::WebViewLink) => r.web_view_link.as_deref(),
            (Self::Event(r), LinkField::HtmlLink) => r.html_link.as_deref(),
            (Self::Page(r), LinkField::Url) => r.url.as_deref(),
            _ => None,
        };
        value.filter(|v| !v.is_empty())
    }
}

/// Failure payload of an adapter call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub error: String,

    /// Suggested remediation, when the adapter knows one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix: Option<String>,
}

/// Result of one adapter call
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Created(Receipt),
    Failed(Failure),
}

impl Outcome {
    pub fn failed(error: impl Into<String>) -> Self {
        Self::Failed(Failure {
            error: error.into(),
            fix: None,
        })
    }

    pub fn failed_with_fix(error: impl Into<String>, fix: impl Into<String>) -> Self {
        Self::Failed(Failure {
            error: error.into(),
            fix: Some(fix.into()),
        })
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Created(_))
    }

    pub fn receipt(&self) -> Option<&Receipt> {
        match self {
            Self::Created(receipt) => Some(receipt),
            Self::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Created(_) => None,
            Self::Failed(failure) => Some(&failure.error),
        }
    }
}

// Flattened to `{"success": bool, ...payload}` so clients see one envelope shape.
impl Serialize for Outcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Envelope<'a> {
            success: bool,
            #[serde(flatten)]
            receipt: Option<&'a Receipt>,
            #[serde(flatten)]
            failure: Option<&'a Failure>,
        }

        let envelope = match self {
            Self::Created(receipt) => Envelope {
                success: true,
                receipt: Some(receipt),
                failure: None,
            },
            Self::Failed(failure) => Envelope {
                success: false,
                receipt: None,
                failure: Some(failure),
            },
        };
        envelope.serialize(serializer)
    }
}

/// One processed item
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchResult {
    pub item: SourceItem,
    pub outcome: Outcome,
}

impl DispatchResult {
    pub fn new(item: SourceItem, outcome: Outcome) -> Self {
        Self { item, outcome }
    }

    pub fn kind(&self) -> ItemKind {
        self.item.kind()
    }
}

impl Serialize for DispatchResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("DispatchResult", 3)?;
        state.serialize_field("type", &self.kind())?;
        state.serialize_field("data", &self.item)?;
        state.serialize_field("response", &self.outcome)?;
        state.end()
    }
}

/// Counts per kind (attempts, regardless of success) and token usage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub tasks_created: usize,
    pub events_created: usize,
    pub notes_created: usize,
    pub shopping_lists_created: usize,
    pub total_tokens: u64,
}

impl Summary {
    pub fn from_results(results: &[DispatchResult], total_tokens: u64) -> Self {
        let mut summary = Self {
            total_tokens,
            ..Default::default()
        };
        for result in results {
            match result.kind() {
                ItemKind::Task => summary.tasks_created += 1,
                ItemKind::Event => summary.events_created += 1,
                ItemKind::Note => summary.notes_created += 1,
                ItemKind::ShoppingList => summary.shopping_lists_created += 1,
            }
        }
        summary
    }

    pub fn failed_count(results: &[DispatchResult]) -> usize {
        results.iter().filter(|r| !r.outcome.is_success()).count()
    }
}

/// Everything one dispatch produced
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchSummary {
    pub parsed_data: StructuredData,
    pub results: Vec<DispatchResult>,
    pub summary: Summary,
}
