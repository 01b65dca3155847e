//! Shared fakes for integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::json;

use quill::adapters::{
    AdapterError, AdapterOutput, Integration, LanguageModel, PushNotification, PushNotifier,
};
use quill::core::{
    fixed_clock, Assistant, Dispatcher, ExtractionClient, NotificationDispatcher,
};
use quill::domain::{NoteItem, Outcome, PageReceipt, Receipt};
use quill::ingest::{Transcriber, TranscriptResult};

/// 2026-10-16 09:30:00, a Friday
pub fn now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 10, 16)
        .unwrap()
        .and_hms_opt(9, 30, 0)
        .unwrap()
}

/// LLM that always answers with the same text
pub struct CannedModel {
    pub reply: String,
    pub tokens: u64,
    pub prompts: Mutex<Vec<String>>,
}

impl CannedModel {
    pub fn new(reply: impl Into<String>, tokens: u64) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.into(),
            tokens,
            prompts: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl LanguageModel for CannedModel {
    fn name(&self) -> &str {
        "canned"
    }

    async fn complete(&self, prompt: &str) -> Result<AdapterOutput> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(AdapterOutput::new(self.reply.clone()).with_tokens(self.tokens))
    }
}

/// Integration that records every item title it sees.
///
/// Titles listed in `fail_titles` produce a failure outcome.
pub struct Recorder {
    pub name: &'static str,
    pub calls: Arc<Mutex<Vec<String>>>,
    pub fail_titles: Vec<String>,
}

impl Recorder {
    pub fn new(name: &'static str, calls: Arc<Mutex<Vec<String>>>) -> Arc<Self> {
        Arc::new(Self {
            name,
            calls,
            fail_titles: Vec::new(),
        })
    }

    pub fn failing(
        name: &'static str,
        calls: Arc<Mutex<Vec<String>>>,
        fail_titles: &[&str],
    ) -> Arc<Self> {
        Arc::new(Self {
            name,
            calls,
            fail_titles: fail_titles.iter().map(|s| s.to_string()).collect(),
        })
    }

    fn record(&self, title: &str) -> Outcome {
        self.calls
            .lock()
            .unwrap()
            .push(format!("{}:{}", self.name, title));
        if self.fail_titles.iter().any(|t| t == title) {
            return Outcome::failed(format!("{} rejected {}", self.name, title));
        }
        Outcome::Created(Receipt::Page(PageReceipt {
            url: Some(format!("https://example.com/{}", self.name)),
            page_data: json!({"title": title}),
        }))
    }
}

#[async_trait]
impl Integration<quill::domain::TaskItem> for Recorder {
    fn name(&self) -> &str {
        self.name
    }

    async fn create(&self, item: &quill::domain::TaskItem) -> Outcome {
        self.record(&item.title)
    }
}

#[async_trait]
impl Integration<quill::domain::EventItem> for Recorder {
    fn name(&self) -> &str {
        self.name
    }

    async fn create(&self, item: &quill::domain::EventItem) -> Outcome {
        self.record(&item.title)
    }
}

#[async_trait]
impl Integration<NoteItem> for Recorder {
    fn name(&self) -> &str {
        self.name
    }

    async fn create(&self, item: &NoteItem) -> Outcome {
        self.record(&item.title)
    }
}

/// Notifier that collects pushes; optionally fails every send
#[derive(Default)]
pub struct CollectingNotifier {
    pub sent: Mutex<Vec<PushNotification>>,
    pub fail: bool,
}

#[async_trait]
impl PushNotifier for CollectingNotifier {
    async fn push(&self, notification: &PushNotification) -> Result<(), AdapterError> {
        self.sent.lock().unwrap().push(notification.clone());
        if self.fail {
            return Err(AdapterError::Api {
                integration: "ntfy",
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        Ok(())
    }
}

/// Transcriber with a fixed transcript
pub struct FixedTranscriber {
    pub text: String,
    pub prompts: Mutex<Vec<Option<String>>>,
}

impl FixedTranscriber {
    pub fn new(text: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            text: text.into(),
            prompts: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl Transcriber for FixedTranscriber {
    async fn transcribe(
        &self,
        _audio: Vec<u8>,
        _mime_type: &str,
        prompt: Option<&str>,
    ) -> Result<TranscriptResult> {
        self.prompts.lock().unwrap().push(prompt.map(str::to_string));
        Ok(TranscriptResult {
            text: self.text.clone(),
            ..Default::default()
        })
    }
}

/// Everything a test may want to inspect after running the assistant
pub struct Harness {
    pub assistant: Assistant,
    pub model: Arc<CannedModel>,
    pub calls: Arc<Mutex<Vec<String>>>,
    pub archived: Arc<Mutex<Vec<String>>>,
    pub notifier: Arc<CollectingNotifier>,
    pub transcriber: Arc<FixedTranscriber>,
}

impl Harness {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn notifications(&self) -> Vec<PushNotification> {
        self.notifier.sent.lock().unwrap().clone()
    }
}

pub struct HarnessBuilder {
    reply: String,
    tokens: u64,
    transcript: String,
    failing_events: Vec<&'static str>,
    failing_notifier: bool,
}

impl HarnessBuilder {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            tokens: 0,
            transcript: String::new(),
            failing_events: Vec::new(),
            failing_notifier: false,
        }
    }

    pub fn tokens(mut self, tokens: u64) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn transcript(mut self, text: impl Into<String>) -> Self {
        self.transcript = text.into();
        self
    }

    pub fn failing_events(mut self, titles: &[&'static str]) -> Self {
        self.failing_events = titles.to_vec();
        self
    }

    pub fn failing_notifier(mut self) -> Self {
        self.failing_notifier = true;
        self
    }

    pub fn build(self) -> Harness {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let archived = Arc::new(Mutex::new(Vec::new()));
        let model = CannedModel::new(self.reply, self.tokens);
        let notifier = Arc::new(CollectingNotifier {
            fail: self.failing_notifier,
            ..Default::default()
        });
        let transcriber = FixedTranscriber::new(self.transcript);
        let clock = fixed_clock(now());

        let tasks: Arc<dyn Integration<quill::domain::TaskItem>> =
            Recorder::new("tasks", calls.clone());
        let events: Arc<dyn Integration<quill::domain::EventItem>> =
            Recorder::failing("events", calls.clone(), &self.failing_events);
        let notes: Arc<dyn Integration<NoteItem>> = Recorder::new("notes", calls.clone());
        let archive: Arc<dyn Integration<NoteItem>> = Recorder::new("archive", archived.clone());

        let dispatcher = Dispatcher::new(
            tasks,
            events,
            notes,
            NotificationDispatcher::new(notifier.clone()),
            clock.clone(),
        );
        let assistant = Assistant::new(
            ExtractionClient::new(model.clone(), clock.clone()),
            dispatcher,
            transcriber.clone(),
            archive,
            clock,
        );

        Harness {
            assistant,
            model,
            calls,
            archived,
            notifier,
            transcriber,
        }
    }
}
