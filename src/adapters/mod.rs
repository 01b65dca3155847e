//! Adapter interfaces for external systems.
//!
//! Adapters translate one structured item into one outbound call:
//! - `google_tasks`: task creation
//! - `google_calendar`: event creation
//! - `notion`: note and shopping-list pages
//! - `ntfy`: push notifications
//! - `openai`: LLM completion (OpenAI-compatible chat API)
//!
//! Item adapters never return errors to the pipeline: [`Integration::create`]
//! always yields an [`Outcome`], with every failure folded into
//! `Outcome::Failed`.

pub mod google_auth;
pub mod google_calendar;
pub mod google_tasks;
pub mod notion;
pub mod ntfy;
pub mod openai;

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

use crate::domain::Outcome;

pub use google_auth::{AuthError, GoogleAuth, ScopeReport, StoredToken};
pub use google_calendar::GoogleCalendarClient;
pub use google_tasks::GoogleTasksClient;
pub use notion::NotionClient;
pub use ntfy::NtfyClient;
pub use openai::OpenAiChatClient;

/// Output from a language model call
#[derive(Debug, Clone)]
pub struct AdapterOutput {
    /// The content returned by the model
    pub content: String,

    /// Tokens used (if available)
    pub tokens_used: Option<u64>,
}

impl AdapterOutput {
    /// Create a new adapter output with just content
    pub fn new(content: String) -> Self {
        Self {
            content,
            tokens_used: None,
        }
    }

    pub fn with_tokens(mut self, tokens: u64) -> Self {
        self.tokens_used = Some(tokens);
        self
    }
}

/// Trait for the extraction LLM
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Human-readable adapter name
    fn name(&self) -> &str;

    /// Send a single prompt and return the reply
    async fn complete(&self, prompt: &str) -> Result<AdapterOutput>;
}

/// Creates one external resource per item
#[async_trait]
pub trait Integration<I: Sync + ?Sized>: Send + Sync {
    /// Human-readable integration name
    fn name(&self) -> &str;

    /// Create the resource; failures are returned as `Outcome::Failed`
    async fn create(&self, item: &I) -> Outcome;
}

/// An action button on a push notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushAction {
    pub label: String,
    pub url: String,
}

/// A push notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushNotification {
    pub title: Option<String>,
    pub message: String,
    /// Presentation hints (ntfy renders known tags as emoji)
    pub tags: Vec<String>,
    pub actions: Vec<PushAction>,
}

impl PushNotification {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            title: None,
            message: message.into(),
            tags: Vec::new(),
            actions: Vec::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_action(mut self, label: impl Into<String>, url: impl Into<String>) -> Self {
        self.actions.push(PushAction {
            label: label.into(),
            url: url.into(),
        });
        self
    }
}

/// Best-effort push channel
#[async_trait]
pub trait PushNotifier: Send + Sync {
    async fn push(&self, notification: &PushNotification) -> std::result::Result<(), AdapterError>;
}

/// Stand-in for an integration that has no credentials configured.
///
/// Every item fails with a [`AdapterError::NotConfigured`] message, so the
/// rest of the pipeline keeps working.
pub struct Unconfigured {
    integration: &'static str,
    reason: String,
}

impl Unconfigured {
    pub fn new(integration: &'static str, reason: impl Into<String>) -> Self {
        Self {
            integration,
            reason: reason.into(),
        }
    }

    fn error(&self) -> AdapterError {
        AdapterError::NotConfigured {
            integration: self.integration,
            reason: self.reason.clone(),
        }
    }
}

#[async_trait]
impl<I: Sync + ?Sized> Integration<I> for Unconfigured {
    fn name(&self) -> &str {
        self.integration
    }

    async fn create(&self, _item: &I) -> Outcome {
        Outcome::failed(self.error().to_string())
    }
}

#[async_trait]
impl PushNotifier for Unconfigured {
    async fn push(&self, _notification: &PushNotification) -> std::result::Result<(), AdapterError> {
        Err(self.error())
    }
}

/// Errors raised inside an adapter before they are folded into an outcome
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("{integration} is not configured: {reason}")]
    NotConfigured {
        integration: &'static str,
        reason: String,
    },

    #[error("{integration} request failed: {source}")]
    Http {
        integration: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{integration} returned HTTP {status}: {body}")]
    Api {
        integration: &'static str,
        status: u16,
        body: String,
    },

    #[error("{integration} authentication failed: {source}")]
    Auth {
        integration: &'static str,
        #[source]
        source: AuthError,
    },

    #[error("{integration} cannot handle item: {reason}")]
    InvalidItem {
        integration: &'static str,
        reason: String,
    },

    #[error("{integration} token lacks the {scope} scope")]
    MissingScope {
        integration: &'static str,
        scope: &'static str,
    },
}

impl AdapterError {
    /// Name of the integration that failed
    pub fn integration(&self) -> &'static str {
        match self {
            Self::NotConfigured { integration, .. }
            | Self::Http { integration, .. }
            | Self::Api { integration, .. }
            | Self::Auth { integration, .. }
            | Self::InvalidItem { integration, .. }
            | Self::MissingScope { integration, .. } => integration,
        }
    }

    pub(crate) fn http(integration: &'static str) -> impl FnOnce(reqwest::Error) -> Self {
        move |source| Self::Http {
            integration,
            source,
        }
    }
}

/// Check an HTTP response status, turning non-2xx into [`AdapterError::Api`]
pub(crate) async fn ensure_success(
    integration: &'static str,
    response: reqwest::Response,
) -> std::result::Result<reqwest::Response, AdapterError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(AdapterError::Api {
        integration,
        status: status.as_u16(),
        body,
    })
}
