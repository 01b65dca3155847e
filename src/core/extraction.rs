//! LLM extraction of structured items from free text.
//!
//! The reply is parsed in two stages: first the widest `{ ... }` span is
//! located and parsed as JSON, then each array entry is coerced into its
//! typed item with defaults applied. A malformed entry is dropped on its own;
//! only a reply with no usable JSON object fails the request.

use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use super::Clock;
use crate::adapters::LanguageModel;
use crate::domain::{
    EventItem, NoteItem, RawRecurrence, ShoppingListItem, StructuredData, TaskItem,
    DEFAULT_DESCRIPTION, DEFAULT_NOTE_TITLE, DEFAULT_SHOPPING_CONTENT, DEFAULT_TITLE,
};

/// Why a reply could not be turned into [`StructuredData`]
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("LLM returned an empty reply")]
    Empty,

    #[error("LLM reply does not contain a JSON object")]
    Format,

    #[error("LLM reply is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("LLM call failed: {0}")]
    Llm(#[source] anyhow::Error),
}

/// Build the extraction prompt for `message`, anchored at `now`
pub fn build_prompt(message: &str, now: NaiveDateTime) -> String {
    format!(
        r#"Analyze the message below and extract tasks, calendar events, notes and shopping lists.
Reply with exactly one JSON object and nothing else. The object must have exactly these keys:
"tasks", "events", "notes", "shopping_lists". Each key holds an array, which may be empty.

Today is {now} ({weekday}). Resolve relative dates ("tomorrow", "next Friday") against it.
All events must be in the future, never in the past.

Item shapes:
- tasks: {{"title": string, "description": string, "due_date": "YYYY-MM-DD" or null}}
- events: {{"title": string, "description": string,
            "start_datetime": "YYYY-MM-DD HH:MM:SS", "end_datetime": "YYYY-MM-DD HH:MM:SS",
            "recurrence": recurrence object or null}}
  If the end cannot be determined, assume the event lasts one hour.
- notes: {{"title": string, "content": string}}
- shopping_lists: {{"content": string}} with the products grouped by category inside the text.

Recurrence object, only for repeating events:
{{"freq": "DAILY" | "WEEKLY" | "MONTHLY" | "YEARLY",
  "interval": integer >= 1 (default 1),
  "count": number of occurrences, optional,
  "until": "YYYY-MM-DD", optional,
  "byday": ["MO", "TU", "WE", "TH", "FR", "SA", "SU"], optional}}
Use either "count" or "until", never both.

Example reply:
{{
  "tasks": [{{"title": "Buy milk", "description": "", "due_date": "2025-09-12"}}],
  "events": [{{"title": "Call Alice", "description": "Project sync",
              "start_datetime": "2025-09-12 15:00:00", "end_datetime": "2025-09-12 16:00:00",
              "recurrence": null}}],
  "notes": [],
  "shopping_lists": []
}}

Message: {message}"#,
        now = now.format("%Y-%m-%d %H:%M:%S"),
        weekday = now.format("%A"),
        message = message,
    )
}

/// Byte range of the widest `{ ... }` span: first `{` to last `}`
pub fn find_json_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

/// Parse an LLM reply into structured data
pub fn parse_reply(reply: &str) -> Result<StructuredData, ExtractionError> {
    if reply.trim().is_empty() {
        return Err(ExtractionError::Empty);
    }
    let span = find_json_span(reply).ok_or(ExtractionError::Format)?;
    let value: Value = serde_json::from_str(span)?;
    match value {
        Value::Object(map) => Ok(coerce(map)),
        _ => Err(ExtractionError::Format),
    }
}

#[derive(Debug, Deserialize)]
struct RawTask {
    title: Option<String>,
    description: Option<String>,
    due_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    title: Option<String>,
    description: Option<String>,
    #[serde(alias = "start")]
    start_datetime: Option<String>,
    #[serde(alias = "end")]
    end_datetime: Option<String>,
    recurrence: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RawNote {
    title: Option<String>,
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawShoppingList {
    content: Option<String>,
}

impl From<RawTask> for TaskItem {
    fn from(raw: RawTask) -> Self {
        Self {
            title: raw.title.unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            description: raw.description,
            due_date: raw.due_date.filter(|d| !d.trim().is_empty()),
        }
    }
}

impl From<RawEvent> for EventItem {
    fn from(raw: RawEvent) -> Self {
        let recurrence = raw
            .recurrence
            .filter(|v| !v.is_null())
            .and_then(|value| match RawRecurrence::deserialize(value) {
                Ok(raw) => match raw.normalize() {
                    Ok(rule) => Some(rule),
                    Err(e) => {
                        warn!(error = %e, "Dropping invalid recurrence");
                        None
                    }
                },
                Err(e) => {
                    warn!(error = %e, "Dropping malformed recurrence");
                    None
                }
            });

        Self {
            title: raw.title.unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            description: Some(
                raw.description
                    .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string()),
            ),
            start: raw.start_datetime.unwrap_or_default(),
            end: raw.end_datetime.filter(|e| !e.trim().is_empty()),
            recurrence,
        }
    }
}

impl From<RawNote> for NoteItem {
    fn from(raw: RawNote) -> Self {
        Self {
            title: raw.title.unwrap_or_else(|| DEFAULT_NOTE_TITLE.to_string()),
            content: raw.content.unwrap_or_default(),
        }
    }
}

impl From<RawShoppingList> for ShoppingListItem {
    fn from(raw: RawShoppingList) -> Self {
        Self {
            content: raw
                .content
                .unwrap_or_else(|| DEFAULT_SHOPPING_CONTENT.to_string()),
        }
    }
}

/// Coerce every entry under `key`; non-arrays count as absent
fn items<R, T>(map: &mut Map<String, Value>, key: &str) -> Vec<T>
where
    R: for<'de> Deserialize<'de>,
    T: From<R>,
{
    let entries = match map.remove(key) {
        Some(Value::Array(entries)) => entries,
        Some(Value::Null) | None => return Vec::new(),
        Some(other) => {
            warn!(key, kind = json_kind(&other), "Expected an array, ignoring");
            return Vec::new();
        }
    };

    entries
        .into_iter()
        .enumerate()
        .filter_map(|(index, entry)| match R::deserialize(entry) {
            Ok(raw) => Some(T::from(raw)),
            Err(e) => {
                warn!(key, index, error = %e, "Dropping malformed item");
                None
            }
        })
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn coerce(mut map: Map<String, Value>) -> StructuredData {
    StructuredData {
        tasks: items::<RawTask, _>(&mut map, "tasks"),
        events: items::<RawEvent, _>(&mut map, "events"),
        notes: items::<RawNote, _>(&mut map, "notes"),
        shopping_lists: items::<RawShoppingList, _>(&mut map, "shopping_lists"),
    }
}

/// Calls the LLM and parses its reply
pub struct ExtractionClient {
    model: Arc<dyn LanguageModel>,
    clock: Clock,
}

impl ExtractionClient {
    pub fn new(model: Arc<dyn LanguageModel>, clock: Clock) -> Self {
        Self { model, clock }
    }

    /// Extract items from `message`; returns the data and the tokens spent
    #[instrument(skip(self, message), fields(model = self.model.name(), chars = message.len()))]
    pub async fn extract(&self, message: &str) -> Result<(StructuredData, u64), ExtractionError> {
        let prompt = build_prompt(message, (self.clock)());

        let output = self
            .model
            .complete(&prompt)
            .await
            .map_err(ExtractionError::Llm)?;
        let tokens = output.tokens_used.unwrap_or(0);
        debug!(tokens, "LLM reply received");

        let data = parse_reply(&output.content)?;
        info!(
            tasks = data.tasks.len(),
            events = data.events.len(),
            notes = data.notes.len(),
            shopping_lists = data.shopping_lists.len(),
            "Extracted items"
        );
        Ok((data, tokens))
    }
}
