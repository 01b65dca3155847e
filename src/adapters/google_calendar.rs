//! Google Calendar adapter.
//!
//! Creates one event per [`EventItem`] in the configured calendar. Event
//! times from the LLM are local wall-clock times; they are sent together with
//! the configured IANA timezone and Google resolves the offset.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDateTime};
use regex::Regex;
use serde::Serialize;
use tracing::{debug, error, instrument, warn};

use super::{ensure_success, AdapterError, GoogleAuth, Integration};
use crate::domain::{EventItem, EventReceipt, Outcome, Receipt, DEFAULT_DESCRIPTION};

const INTEGRATION: &str = "google_calendar";
const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/calendar/v3";

const LOCAL_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Google Calendar REST client
pub struct GoogleCalendarClient {
    base_url: String,
    calendar_id: String,
    timezone: String,
    auth: Arc<GoogleAuth>,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct EventTime<'a> {
    #[serde(rename = "dateTime")]
    date_time: String,
    #[serde(rename = "timeZone")]
    time_zone: &'a str,
}

#[derive(Debug, Serialize)]
struct EventBody<'a> {
    summary: &'a str,
    description: &'a str,
    start: EventTime<'a>,
    end: EventTime<'a>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    recurrence: Vec<String>,
}

impl GoogleCalendarClient {
    pub fn new(
        calendar_id: impl Into<String>,
        timezone: impl Into<String>,
        auth: Arc<GoogleAuth>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            calendar_id: calendar_id.into(),
            timezone: timezone.into(),
            auth,
            client,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn insert(&self, event: &EventItem) -> Result<EventReceipt, AdapterError> {
        let start = parse_local(&event.start).ok_or_else(|| AdapterError::InvalidItem {
            integration: INTEGRATION,
            reason: format!("unparseable start datetime '{}'", event.start),
        })?;
        let end = match event.end.as_deref().map(|raw| (raw, parse_local(raw))) {
            Some((_, Some(end))) => end,
            Some((raw, None)) => {
                warn!(end = raw, "Unparseable end datetime, assuming one hour");
                start + Duration::hours(1)
            }
            None => start + Duration::hours(1),
        };

        let body = EventBody {
            summary: &event.title,
            description: event.description.as_deref().unwrap_or(DEFAULT_DESCRIPTION),
            start: EventTime {
                date_time: start.format("%Y-%m-%dT%H:%M:%S").to_string(),
                time_zone: &self.timezone,
            },
            end: EventTime {
                date_time: end.format("%Y-%m-%dT%H:%M:%S").to_string(),
                time_zone: &self.timezone,
            },
            recurrence: event.recurrence.iter().map(|r| r.to_rrule()).collect(),
        };

        let token = self
            .auth
            .access_token()
            .await
            .map_err(|source| AdapterError::Auth {
                integration: INTEGRATION,
                source,
            })?;

        let response = self
            .client
            .post(format!(
                "{}/calendars/{}/events",
                self.base_url, self.calendar_id
            ))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(AdapterError::http(INTEGRATION))?;

        let text = ensure_success(INTEGRATION, response)
            .await?
            .text()
            .await
            .map_err(AdapterError::http(INTEGRATION))?;

        Ok(receipt_from_reply(&text))
    }
}

/// Build a receipt from the raw reply.
///
/// JSON replies carry `htmlLink`; text replies may embed a markdown link
/// instead, which is picked out by pattern.
fn receipt_from_reply(text: &str) -> EventReceipt {
    match serde_json::from_str::<serde_json::Value>(text) {
        Ok(value) => {
            let html_link = value
                .get("htmlLink")
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .or_else(|| extract_markdown_link(text));
            EventReceipt {
                html_link,
                event_data: value,
            }
        }
        Err(_) => EventReceipt {
            html_link: extract_markdown_link(text),
            event_data: serde_json::Value::String(text.to_string()),
        },
    }
}

/// Target of the first markdown link in `text`, e.g. `[here](https://...)`
pub fn extract_markdown_link(text: &str) -> Option<String> {
    static LINK: OnceLock<Regex> = OnceLock::new();
    let re = LINK.get_or_init(|| Regex::new(r"\[[^\]]*\]\(([^)\s]+)\)").expect("valid regex"));
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Parse an LLM datetime as local wall-clock time
pub fn parse_local(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    LOCAL_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.naive_local()))
}

#[async_trait]
impl Integration<EventItem> for GoogleCalendarClient {
    fn name(&self) -> &str {
        INTEGRATION
    }

    #[instrument(skip(self, event), fields(title = %event.title, start = %event.start))]
    async fn create(&self, event: &EventItem) -> Outcome {
        match self.insert(event).await {
            Ok(receipt) => {
                debug!(link = ?receipt.html_link, "Created calendar event");
                Outcome::Created(Receipt::Event(receipt))
            }
            Err(e) => {
                error!(error = %e, "Failed to create calendar event");
                Outcome::failed(e.to_string())
            }
        }
    }
}
