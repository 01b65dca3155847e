//! Google Tasks adapter.
//!
//! Creates one task per [`TaskItem`] in the account's first task list. The
//! list id is looked up once and cached.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, error, instrument, warn};

use super::google_auth::TASKS_SCOPE;
use super::{ensure_success, AdapterError, AuthError, GoogleAuth, Integration};
use crate::domain::{Outcome, Receipt, TaskItem, TaskReceipt};

const INTEGRATION: &str = "google_tasks";
const DEFAULT_BASE_URL: &str = "https://tasks.googleapis.com/tasks/v1";

const MISSING_PERMISSION: &str = "Missing Google Tasks permissions. Please re-authenticate.";
const MISSING_PERMISSION_FIX: &str = "Run `quill auth reset` and authorize again";
const INSUFFICIENT_SCOPES: &str = "Insufficient authentication scopes for Google Tasks";
const INSUFFICIENT_SCOPES_FIX: &str = "Delete the Google token file and restart to re-authenticate";

/// Google Tasks REST client
pub struct GoogleTasksClient {
    base_url: String,
    auth: Arc<GoogleAuth>,
    client: reqwest::Client,
    tasklist_id: OnceCell<String>,
}

#[derive(Debug, Deserialize)]
struct TaskListsResponse {
    #[serde(default)]
    items: Vec<TaskList>,
}

#[derive(Debug, Deserialize)]
struct TaskList {
    id: String,
}

#[derive(Debug, Serialize)]
struct TaskBody<'a> {
    title: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    notes: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    due: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TaskResponse {
    id: Option<String>,
    title: Option<String>,
    due: Option<String>,
    status: Option<String>,
    #[serde(rename = "webViewLink")]
    web_view_link: Option<String>,
}

impl GoogleTasksClient {
    pub fn new(auth: Arc<GoogleAuth>, client: reqwest::Client) -> Self {
        Self::with_base_url(DEFAULT_BASE_URL, auth, client)
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        auth: Arc<GoogleAuth>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth,
            client,
            tasklist_id: OnceCell::new(),
        }
    }

    async fn token(&self) -> Result<String, AdapterError> {
        self.auth
            .access_token()
            .await
            .map_err(|source| AdapterError::Auth {
                integration: INTEGRATION,
                source,
            })
    }

    /// Explain a failed call: a token that lists scopes but not the Tasks
    /// one is reported as a missing permission. Tokens without a scope list
    /// keep the original error.
    async fn diagnose(&self, err: AdapterError) -> AdapterError {
        if matches!(err, AdapterError::Auth { .. }) {
            return err;
        }
        match self.auth.scope_report().await {
            Ok(report) if !report.current_scopes.is_empty() && !report.has_tasks => {
                AdapterError::MissingScope {
                    integration: INTEGRATION,
                    scope: TASKS_SCOPE,
                }
            }
            _ => err,
        }
    }

    /// First task list of the account, fetched once
    async fn tasklist_id(&self, token: &str) -> Result<&String, AdapterError> {
        self.tasklist_id
            .get_or_try_init(|| async {
                let response = self
                    .client
                    .get(format!("{}/users/@me/lists", self.base_url))
                    .bearer_auth(token)
                    .send()
                    .await
                    .map_err(AdapterError::http(INTEGRATION))?;
                let lists: TaskListsResponse = ensure_success(INTEGRATION, response)
                    .await?
                    .json()
                    .await
                    .map_err(AdapterError::http(INTEGRATION))?;

                let first = lists.items.into_iter().next().ok_or(AdapterError::NotConfigured {
                    integration: INTEGRATION,
                    reason: "no task lists found".to_string(),
                })?;
                debug!(tasklist = %first.id, "Resolved default task list");
                Ok::<_, AdapterError>(first.id)
            })
            .await
    }

    async fn insert(&self, task: &TaskItem) -> Result<TaskReceipt, AdapterError> {
        match self.try_insert(task).await {
            Ok(receipt) => Ok(receipt),
            Err(e) => Err(self.diagnose(e).await),
        }
    }

    async fn try_insert(&self, task: &TaskItem) -> Result<TaskReceipt, AdapterError> {
        let token = self.token().await?;
        let tasklist = self.tasklist_id(&token).await?;

        let body = TaskBody {
            title: &task.title,
            notes: task.description.as_deref().filter(|d| !d.is_empty()),
            due: task.due_date.as_deref().and_then(format_due),
        };

        let response = self
            .client
            .post(format!("{}/lists/{}/tasks", self.base_url, tasklist))
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await
            .map_err(AdapterError::http(INTEGRATION))?;

        let created: TaskResponse = ensure_success(INTEGRATION, response)
            .await?
            .json()
            .await
            .map_err(AdapterError::http(INTEGRATION))?;

        Ok(TaskReceipt {
            task_id: created.id,
            title: created.title,
            due: created.due,
            status: created.status,
            web_view_link: created.web_view_link,
        })
    }
}

/// Convert a `YYYY-MM-DD` due date into the RFC 3339 form Google expects.
///
/// Anything else is logged and dropped; the task is still created.
pub fn format_due(raw: &str) -> Option<String> {
    match NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d") {
        Ok(date) => Some(format!("{}T00:00:00.000Z", date.format("%Y-%m-%d"))),
        Err(_) => {
            warn!(due_date = raw, "Invalid due date format, expected YYYY-MM-DD");
            None
        }
    }
}

/// Map an adapter error to a failure outcome with remediation where known
fn failure_outcome(err: &AdapterError) -> Outcome {
    match err {
        AdapterError::MissingScope { .. } => {
            Outcome::failed_with_fix(MISSING_PERMISSION, MISSING_PERMISSION_FIX)
        }
        AdapterError::Auth {
            source: AuthError::ReauthorizationRequired(_),
            ..
        } => Outcome::failed_with_fix(MISSING_PERMISSION, MISSING_PERMISSION_FIX),
        AdapterError::Api { body, .. }
            if body
                .to_lowercase()
                .contains("insufficient authentication scopes") =>
        {
            Outcome::failed_with_fix(INSUFFICIENT_SCOPES, INSUFFICIENT_SCOPES_FIX)
        }
        other => Outcome::failed(format!("Failed to create task: {}", other)),
    }
}

#[async_trait]
impl Integration<TaskItem> for GoogleTasksClient {
    fn name(&self) -> &str {
        INTEGRATION
    }

    #[instrument(skip(self, task), fields(title = %task.title))]
    async fn create(&self, task: &TaskItem) -> Outcome {
        match self.insert(task).await {
            Ok(receipt) => {
                debug!(task_id = ?receipt.task_id, "Created Google task");
                Outcome::Created(Receipt::Task(receipt))
            }
            Err(e) => {
                error!(error = %e, "Failed to create Google task");
                failure_outcome(&e)
            }
        }
    }
}
