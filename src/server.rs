//! HTTP transport.
//!
//! Routes:
//! - `POST /message`: JSON `{"message": "..."}`
//! - `POST /audio`: raw audio body, extracted and dispatched
//! - `POST /conversation`: raw audio body, transcribed and archived only
//! - `GET /health`: liveness, no auth
//!
//! Everything except `/health` requires the `x-auth` header to match the
//! configured secret.

use std::sync::Arc;

use anyhow::Context;
use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, DefaultBodyLimit, Request, State},
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::core::{Assistant, AssistantError};

/// Header carrying the shared secret
pub const AUTH_HEADER: &str = "x-auth";

/// Shared handler state
pub struct AppState {
    pub assistant: Assistant,
    /// `None` disables the header check
    pub auth_token: Option<String>,
    pub max_audio_bytes: usize,
    pub audio_content_type: String,
}

/// Request-level rejections
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Missing or invalid x-auth header")]
    Unauthorized,

    #[error("Missing 'message' in request body")]
    MissingMessage,

    #[error("Invalid content type: {0}. Only {1} is accepted.")]
    InvalidContentType(String, String),

    #[error("Audio file is too large. Maximum size is {0} bytes.")]
    PayloadTooLarge(usize),

    #[error("Failed to read request body: {0}")]
    InvalidBody(String),

    #[error("{0}")]
    Processing(#[from] AssistantError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::MissingMessage | Self::InvalidContentType(..) | Self::InvalidBody(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::PayloadTooLarge(_) | Self::Processing(AssistantError::AudioTooLarge { .. }) => {
                StatusCode::PAYLOAD_TOO_LARGE
            }
            Self::Processing(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        } else {
            warn!(error = %self, status = status.as_u16(), "Request rejected");
        }
        (status, Json(json!({"detail": self.to_string()}))).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct MessageRequest {
    #[serde(default)]
    message: Option<String>,
}

/// Wraps a payload with the top-level `success` flag
#[derive(Debug, Serialize)]
struct Success<T> {
    success: bool,
    #[serde(flatten)]
    body: T,
}

impl<T> Success<T> {
    fn new(body: T) -> Json<Self> {
        Json(Self {
            success: true,
            body,
        })
    }
}

async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(expected) = &state.auth_token {
        let provided = request
            .headers()
            .get(AUTH_HEADER)
            .and_then(|v| v.to_str().ok());
        if provided != Some(expected.as_str()) {
            return Err(ApiError::Unauthorized);
        }
    }
    Ok(next.run(request).await)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({"status": "ok"}))
}

async fn message(
    State(state): State<Arc<AppState>>,
    Json(request): Json<MessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let message = request
        .message
        .filter(|m| !m.trim().is_empty())
        .ok_or(ApiError::MissingMessage)?;
    let summary = state.assistant.handle_text(&message).await?;
    Ok(Success::new(summary))
}

/// Content-type and size checks shared by the audio routes
///
/// The body limit layer on these routes is set to the configured ceiling, so
/// an oversize upload arrives here as a length-limit rejection.
fn checked_audio(
    state: &AppState,
    headers: &HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<Vec<u8>, ApiError> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if content_type != state.audio_content_type {
        return Err(ApiError::InvalidContentType(
            content_type.to_string(),
            state.audio_content_type.clone(),
        ));
    }
    let body = body.map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge(state.max_audio_bytes)
        } else {
            ApiError::InvalidBody(rejection.body_text())
        }
    })?;
    if body.len() > state.max_audio_bytes {
        return Err(ApiError::PayloadTooLarge(state.max_audio_bytes));
    }
    Ok(body.to_vec())
}

async fn audio(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let audio = checked_audio(&state, &headers, body)?;
    let reply = state
        .assistant
        .handle_audio(audio, state.max_audio_bytes)
        .await?;
    Ok(Success::new(reply))
}

async fn conversation(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let audio = checked_audio(&state, &headers, body)?;
    let reply = state
        .assistant
        .handle_conversation(audio, state.max_audio_bytes)
        .await?;
    Ok(Success::new(reply))
}

/// Build the router
pub fn create_router(state: Arc<AppState>) -> Router {
    let limit = state.max_audio_bytes;
    let protected = Router::new()
        .route("/message", post(message))
        .route("/audio", post(audio).layer(DefaultBodyLimit::max(limit)))
        .route("/conversation", post(conversation).layer(DefaultBodyLimit::max(limit)))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/health", get(health))
        .merge(protected)
        .with_state(state)
}

/// Serve until the process is stopped
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> anyhow::Result<()> {
    if state.auth_token.is_none() {
        warn!("AUTH_TOKEN_SECRET is not set, requests are not authenticated");
    }
    let addr = listener.local_addr().context("Failed to read bound address")?;
    info!(%addr, "Listening");
    axum::serve(listener, create_router(state))
        .await
        .context("HTTP server failed")
}
