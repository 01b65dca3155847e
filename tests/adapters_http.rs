//! HTTP-level tests for the outbound adapters against a mock server.

use std::path::Path;
use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, body_string, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use quill::adapters::google_auth::{CALENDAR_SCOPE, TASKS_SCOPE};
use quill::adapters::{
    GoogleAuth, GoogleCalendarClient, GoogleTasksClient, Integration, LanguageModel,
    NotionClient, NtfyClient, OpenAiChatClient, PushNotification, PushNotifier,
};
use quill::domain::{
    EventItem, Frequency, NoteItem, Outcome, Receipt, RecurrenceRule, TaskItem,
};
use quill::ingest::{Transcriber, WhisperApiTranscriber};

fn write_token(dir: &Path, token_uri: &str, expires_in: Duration, scopes: &[&str]) -> GoogleAuth {
    let path = dir.join("google_token.json");
    let token = json!({
        "token": "ya29.current",
        "refresh_token": "1//refresh",
        "token_uri": token_uri,
        "client_id": "client-id",
        "client_secret": "client-secret",
        "scopes": scopes,
        "expiry": (Utc::now() + expires_in).to_rfc3339(),
    });
    std::fs::write(&path, token.to_string()).unwrap();
    GoogleAuth::new(path, reqwest::Client::new())
}

fn fresh_auth(dir: &Path, scopes: &[&str]) -> Arc<GoogleAuth> {
    Arc::new(write_token(
        dir,
        "https://oauth2.googleapis.com/token",
        Duration::hours(1),
        scopes,
    ))
}

#[tokio::test]
async fn test_task_creation_resolves_list_once() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/users/@me/lists"))
        .and(header("authorization", "Bearer ya29.current"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"items": [{"id": "list-1"}]})),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/lists/list-1/tasks"))
        .and(body_partial_json(json!({
            "title": "Buy milk",
            "due": "2026-10-17T00:00:00.000Z"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "task-1",
            "title": "Buy milk",
            "due": "2026-10-17T00:00:00.000Z",
            "status": "needsAction",
            "webViewLink": "https://tasks.google.com/task-1"
        })))
        .expect(2)
        .mount(&server)
        .await;

    let client = GoogleTasksClient::with_base_url(
        server.uri(),
        fresh_auth(temp.path(), &[CALENDAR_SCOPE, TASKS_SCOPE]),
        reqwest::Client::new(),
    );
    let task = TaskItem::new("Buy milk").with_due_date("2026-10-17");

    for _ in 0..2 {
        match client.create(&task).await {
            Outcome::Created(Receipt::Task(receipt)) => {
                assert_eq!(receipt.task_id.as_deref(), Some("task-1"));
                assert_eq!(
                    receipt.web_view_link.as_deref(),
                    Some("https://tasks.google.com/task-1")
                );
            }
            other => panic!("Expected created task, got {:?}", other),
        }
    }
}

#[tokio::test]
async fn test_task_without_scope_fails_with_fix() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/users/@me/lists"))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .mount(&server)
        .await;

    let client = GoogleTasksClient::with_base_url(
        server.uri(),
        fresh_auth(temp.path(), &[CALENDAR_SCOPE]),
        reqwest::Client::new(),
    );

    match client.create(&TaskItem::new("Buy milk")).await {
        Outcome::Failed(failure) => {
            assert!(failure.error.contains("Google Tasks permissions"));
            assert!(failure.fix.is_some());
        }
        other => panic!("Expected failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_task_with_token_lacking_scope_list_is_created() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/users/@me/lists"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"items": [{"id": "list-1"}]})),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/lists/list-1/tasks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "task-1"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = GoogleTasksClient::with_base_url(
        server.uri(),
        fresh_auth(temp.path(), &[]),
        reqwest::Client::new(),
    );

    let outcome = client.create(&TaskItem::new("Buy milk")).await;
    assert!(outcome.is_success(), "{:?}", outcome);
}

#[tokio::test]
async fn test_task_with_missing_token_file_fails() {
    let temp = TempDir::new().unwrap();
    let auth = Arc::new(GoogleAuth::new(
        temp.path().join("missing.json"),
        reqwest::Client::new(),
    ));
    let client = GoogleTasksClient::new(auth, reqwest::Client::new());

    let outcome = client.create(&TaskItem::new("Buy milk")).await;
    assert!(!outcome.is_success());
}

#[tokio::test]
async fn test_event_creation_sends_timezone_and_rrule() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();

    Mock::given(method("POST"))
        .and(path("/calendars/primary/events"))
        .and(body_partial_json(json!({
            "summary": "Standup",
            "description": "No Description",
            "start": {"dateTime": "2026-10-19T09:00:00", "timeZone": "Europe/Warsaw"},
            "end": {"dateTime": "2026-10-19T10:00:00", "timeZone": "Europe/Warsaw"},
            "recurrence": ["RRULE:FREQ=WEEKLY;COUNT=3"]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "evt-1",
            "htmlLink": "https://calendar.google.com/event?eid=evt-1"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = GoogleCalendarClient::new(
        "primary",
        "Europe/Warsaw",
        fresh_auth(temp.path(), &[CALENDAR_SCOPE, TASKS_SCOPE]),
        reqwest::Client::new(),
    )
    .with_base_url(server.uri());

    let mut rule = RecurrenceRule::new(Frequency::Weekly);
    rule.count = Some(3);
    let event = EventItem {
        title: "Standup".to_string(),
        description: None,
        start: "2026-10-19 09:00:00".to_string(),
        end: None,
        recurrence: Some(rule),
    };

    match client.create(&event).await {
        Outcome::Created(Receipt::Event(receipt)) => {
            assert_eq!(
                receipt.html_link.as_deref(),
                Some("https://calendar.google.com/event?eid=evt-1")
            );
            assert_eq!(receipt.event_data["id"], "evt-1");
        }
        other => panic!("Expected created event, got {:?}", other),
    }
}

#[tokio::test]
async fn test_event_api_error_becomes_failure() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("backend error"))
        .mount(&server)
        .await;

    let client = GoogleCalendarClient::new(
        "primary",
        "Europe/Warsaw",
        fresh_auth(temp.path(), &[CALENDAR_SCOPE]),
        reqwest::Client::new(),
    )
    .with_base_url(server.uri());

    let outcome = client
        .create(&EventItem::new(
            "Call Alice",
            "2026-10-23 15:00:00",
            "2026-10-23 16:00:00",
        ))
        .await;
    assert!(outcome.error().unwrap().contains("HTTP 500"));
}

#[tokio::test]
async fn test_expired_token_is_refreshed_and_persisted() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "ya29.refreshed",
            "expires_in": 3600,
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let auth = write_token(
        temp.path(),
        &format!("{}/token", server.uri()),
        Duration::minutes(-5),
        &[CALENDAR_SCOPE],
    );

    assert_eq!(auth.access_token().await.unwrap(), "ya29.refreshed");
    // Cached: no second refresh
    assert_eq!(auth.access_token().await.unwrap(), "ya29.refreshed");

    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(auth.token_path()).unwrap()).unwrap();
    assert_eq!(written["token"], "ya29.refreshed");
    assert_eq!(written["refresh_token"], "1//refresh");
}

#[tokio::test]
async fn test_concurrent_callers_share_one_refresh() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "ya29.refreshed", "expires_in": 3600}))
                .set_delay(std::time::Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let auth = Arc::new(write_token(
        temp.path(),
        &format!("{}/token", server.uri()),
        Duration::minutes(-5),
        &[CALENDAR_SCOPE, TASKS_SCOPE],
    ));

    let handles: Vec<_> = (0..5)
        .map(|_| {
            let auth = auth.clone();
            tokio::spawn(async move { auth.access_token().await })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), "ya29.refreshed");
    }
}

#[tokio::test]
async fn test_notion_page_creation() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/pages"))
        .and(header("authorization", "Bearer secret_notion"))
        .and(header("Notion-Version", "2022-06-28"))
        .and(body_partial_json(json!({
            "parent": {"page_id": "parent-1"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "page-1",
            "url": "https://www.notion.so/page-1"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = NotionClient::new("secret_notion", "parent-1", reqwest::Client::new())
        .with_base_url(server.uri());

    match client.create(&NoteItem::new("Ideas", "More tests")).await {
        Outcome::Created(receipt) => {
            assert_eq!(
                receipt.link(quill::domain::LinkField::Url),
                Some("https://www.notion.so/page-1")
            );
        }
        other => panic!("Expected created page, got {:?}", other),
    }
}

#[tokio::test]
async fn test_ntfy_push_headers() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/inbox"))
        .and(header("Title", "New task in Google Tasks"))
        .and(header("Tags", "white_check_mark"))
        .and(body_string("Task \"Buy milk\" was created."))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = NtfyClient::new(&server.uri(), "inbox", reqwest::Client::new());
    let notification = PushNotification::new("Task \"Buy milk\" was created.")
        .with_title("New task in Google Tasks")
        .with_tags(["white_check_mark"])
        .with_action("Open task", "https://tasks/1");

    client.push(&notification).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let actions = requests[0].headers.get("Actions").unwrap().to_str().unwrap();
    assert_eq!(actions, "view, Open task, https://tasks/1");
}

#[tokio::test]
async fn test_ntfy_error_status_is_reported() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
        .mount(&server)
        .await;

    let client = NtfyClient::new(&server.uri(), "inbox", reqwest::Client::new());
    let err = client
        .push(&PushNotification::new("hello"))
        .await
        .unwrap_err();
    assert_eq!(err.integration(), "ntfy");
}

#[tokio::test]
async fn test_chat_completion_reports_tokens() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer llm-key"))
        .and(body_partial_json(json!({
            "model": "gemini-2.5-flash",
            "messages": [{"role": "user", "content": "extract this"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "{\"tasks\": []}"}}],
            "usage": {"prompt_tokens": 30, "completion_tokens": 12, "total_tokens": 42}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let model = OpenAiChatClient::new(
        server.uri(),
        "llm-key",
        "gemini-2.5-flash",
        reqwest::Client::new(),
    );
    let output = model.complete("extract this").await.unwrap();

    assert_eq!(output.content, "{\"tasks\": []}");
    assert_eq!(output.tokens_used, Some(42));
}

#[tokio::test]
async fn test_chat_completion_http_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .mount(&server)
        .await;

    let model = OpenAiChatClient::new(server.uri(), "wrong", "m", reqwest::Client::new());
    let err = model.complete("hi").await.unwrap_err();
    assert!(err.to_string().contains("401"));
}

#[tokio::test]
async fn test_transcription_upload() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/audio/transcriptions"))
        .and(header("authorization", "Bearer stt-key"))
        .and(body_string_contains("whisper-large-v3-turbo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "text": "  Buy milk tomorrow. ",
            "language": "english",
            "duration": 2.5
        })))
        .expect(1)
        .mount(&server)
        .await;

    let transcriber = WhisperApiTranscriber::new(
        server.uri(),
        "stt-key",
        "whisper-large-v3-turbo",
        reqwest::Client::new(),
    );
    let result = transcriber
        .transcribe(vec![0u8; 32], "audio/3gpp", Some("Transcribe this audio recording."))
        .await
        .unwrap();

    assert_eq!(result.text, "Buy milk tomorrow.");
    assert_eq!(result.language.as_deref(), Some("english"));
    assert_eq!(result.duration_seconds, Some(2.5));
}
