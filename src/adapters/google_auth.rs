//! Google OAuth credential cache.
//!
//! The token file uses the "authorized user" JSON layout written by Google's
//! client libraries (`token`, `refresh_token`, `token_uri`, `client_id`,
//! `client_secret`, `scopes`, `expiry`). It is loaded lazily on first use,
//! cached for the life of the process, refreshed when it is about to expire
//! and written back to disk after every refresh.
//!
//! The cache sits behind an async mutex, so concurrent callers wait for a
//! single refresh instead of racing each other. Creating the token file in
//! the first place (the interactive consent flow) happens outside quill.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub const CALENDAR_SCOPE: &str = "https://www.googleapis.com/auth/calendar";
pub const TASKS_SCOPE: &str = "https://www.googleapis.com/auth/tasks";

/// Scopes quill needs
pub const REQUIRED_SCOPES: [&str; 2] = [CALENDAR_SCOPE, TASKS_SCOPE];

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Refresh this long before the recorded expiry
const EXPIRY_SKEW_SECONDS: i64 = 60;

/// Errors from the credential cache
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("No usable Google token at {0}; re-run the consent flow")]
    ReauthorizationRequired(PathBuf),

    #[error("Token refresh failed: {0}")]
    Refresh(String),

    #[error("Token file is not valid JSON: {0}")]
    InvalidToken(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// On-disk token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredToken {
    #[serde(default, alias = "access_token")]
    pub token: Option<String>,

    #[serde(default)]
    pub refresh_token: Option<String>,

    #[serde(default = "default_token_uri")]
    pub token_uri: String,

    #[serde(default)]
    pub client_id: Option<String>,

    #[serde(default)]
    pub client_secret: Option<String>,

    #[serde(default)]
    pub scopes: Vec<String>,

    #[serde(default)]
    pub expiry: Option<DateTime<Utc>>,

    /// Fields we don't use but must write back untouched
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl StoredToken {
    /// True if the access token can be used at `now`
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        if self.token.as_deref().map_or(true, str::is_empty) {
            return false;
        }
        match self.expiry {
            Some(expiry) => expiry - Duration::seconds(EXPIRY_SKEW_SECONDS) > now,
            None => true,
        }
    }

    pub fn has_scope(&self, needle: &str) -> bool {
        self.scopes.iter().any(|s| s.contains(needle))
    }

    fn can_refresh(&self) -> bool {
        self.refresh_token.is_some() && self.client_id.is_some() && self.client_secret.is_some()
    }
}

/// Scope inspection of the stored token
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScopeReport {
    pub current_scopes: Vec<String>,
    pub required_scopes: Vec<String>,
    pub missing_scopes: Vec<String>,
    pub has_all_scopes: bool,
    pub has_calendar: bool,
    pub has_tasks: bool,
}

impl ScopeReport {
    pub fn from_token(token: &StoredToken) -> Self {
        let missing_scopes: Vec<String> = REQUIRED_SCOPES
            .iter()
            .filter(|required| !token.scopes.iter().any(|s| s == *required))
            .map(|s| s.to_string())
            .collect();

        Self {
            current_scopes: token.scopes.clone(),
            required_scopes: REQUIRED_SCOPES.iter().map(|s| s.to_string()).collect(),
            has_all_scopes: missing_scopes.is_empty(),
            missing_scopes,
            has_calendar: token.has_scope("calendar"),
            has_tasks: token.has_scope("tasks"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    scope: Option<String>,
}

/// Process-wide Google credential cache
pub struct GoogleAuth {
    token_path: PathBuf,
    client: reqwest::Client,
    cache: Mutex<Option<StoredToken>>,
}

impl GoogleAuth {
    pub fn new(token_path: PathBuf, client: reqwest::Client) -> Self {
        Self {
            token_path,
            client,
            cache: Mutex::new(None),
        }
    }

    pub fn token_path(&self) -> &Path {
        &self.token_path
    }

    /// Get a valid access token, loading or refreshing as needed
    pub async fn access_token(&self) -> Result<String, AuthError> {
        let mut guard = self.cache.lock().await;

        let mut token = match guard.take() {
            Some(token) => token,
            None => self.load().await?,
        };

        if !token.is_fresh(Utc::now()) {
            token = self.refresh(token).await?;
            self.persist(&token).await?;
        }

        let access = token
            .token
            .clone()
            .ok_or_else(|| AuthError::ReauthorizationRequired(self.token_path.clone()))?;
        *guard = Some(token);
        Ok(access)
    }

    /// Inspect which scopes the current token carries
    pub async fn scope_report(&self) -> Result<ScopeReport, AuthError> {
        let mut guard = self.cache.lock().await;
        if guard.is_none() {
            *guard = Some(self.load().await?);
        }
        match guard.as_ref() {
            Some(token) => Ok(ScopeReport::from_token(token)),
            None => Err(AuthError::ReauthorizationRequired(self.token_path.clone())),
        }
    }

    /// Forget the cached token and delete the token file
    pub async fn reset(&self) -> Result<(), AuthError> {
        let mut guard = self.cache.lock().await;
        *guard = None;
        match tokio::fs::remove_file(&self.token_path).await {
            Ok(()) => {
                info!(path = %self.token_path.display(), "Removed Google token file");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn load(&self) -> Result<StoredToken, AuthError> {
        let content = match tokio::fs::read_to_string(&self.token_path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AuthError::ReauthorizationRequired(self.token_path.clone()));
            }
            Err(e) => return Err(e.into()),
        };
        debug!(path = %self.token_path.display(), "Loaded Google token");
        Ok(serde_json::from_str(&content)?)
    }

    async fn refresh(&self, mut token: StoredToken) -> Result<StoredToken, AuthError> {
        if !token.can_refresh() {
            warn!("Google token expired and cannot be refreshed");
            return Err(AuthError::ReauthorizationRequired(self.token_path.clone()));
        }

        let params = [
            ("client_id", token.client_id.clone().unwrap_or_default()),
            ("client_secret", token.client_secret.clone().unwrap_or_default()),
            ("refresh_token", token.refresh_token.clone().unwrap_or_default()),
            ("grant_type", "refresh_token".to_string()),
        ];

        let response = self
            .client
            .post(&token.token_uri)
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Refresh(format!("HTTP {}: {}", status, body)));
        }

        let refreshed: RefreshResponse = response.json().await?;
        token.token = Some(refreshed.access_token);
        token.expiry = refreshed
            .expires_in
            .map(|secs| Utc::now() + Duration::seconds(secs));
        if let Some(scope) = refreshed.scope {
            token.scopes = scope.split_whitespace().map(str::to_string).collect();
        }

        info!("Refreshed Google access token");
        Ok(token)
    }

    async fn persist(&self, token: &StoredToken) -> Result<(), AuthError> {
        let path = self.token_path.clone();
        let json = serde_json::to_vec_pretty(token)?;
        tokio::task::spawn_blocking(move || write_token_file(&path, &json))
            .await
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))??;
        Ok(())
    }
}

/// Atomically replace the token file, holding an exclusive lock file so
/// that two processes never interleave writes.
fn write_token_file(path: &Path, contents: &[u8]) -> Result<(), AuthError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;

    let lock_path = path.with_extension("lock");
    let lock = std::fs::OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&lock_path)?;
    lock.lock_exclusive()?;

    let mut temp = tempfile::NamedTempFile::new_in(dir)?;
    temp.write_all(contents)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;

    lock.unlock()?;
    Ok(())
}
