//! Speech-to-text backend.
//!
//! Uploads the audio clip to an OpenAI-compatible
//! `POST {base_url}/audio/transcriptions` endpoint as multipart form data.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::{debug, instrument};

/// Prompt for single-speaker dictation
pub const DICTATION_PROMPT: &str = "Transcribe this audio recording.";

/// Prompt for a two-person conversation
pub const CONVERSATION_PROMPT: &str = "Transcribe this audio recording. It is a \
conversation between two people; clearly separate the lines of each speaker.";

/// Result of transcription
#[derive(Debug, Clone, Default)]
pub struct TranscriptResult {
    pub text: String,
    pub language: Option<String>,
    pub duration_seconds: Option<f64>,
}

impl TranscriptResult {
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Turns an audio clip into text
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(
        &self,
        audio: Vec<u8>,
        mime_type: &str,
        prompt: Option<&str>,
    ) -> Result<TranscriptResult>;
}

/// `verbose_json` transcription reply; plain `json` only carries `text`
#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: String,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
}

/// Whisper-style transcription over HTTP
pub struct WhisperApiTranscriber {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl WhisperApiTranscriber {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            client,
        }
    }
}

/// File name with an extension matching the MIME type; some providers sniff it
fn file_name_for(mime_type: &str) -> &'static str {
    match mime_type {
        "audio/3gpp" => "audio.3gp",
        "audio/mp4" | "audio/m4a" | "audio/x-m4a" => "audio.m4a",
        "audio/mpeg" => "audio.mp3",
        "audio/ogg" => "audio.ogg",
        "audio/webm" => "audio.webm",
        _ => "audio.wav",
    }
}

#[async_trait]
impl Transcriber for WhisperApiTranscriber {
    #[instrument(skip(self, audio, prompt), fields(model = %self.model, bytes = audio.len()))]
    async fn transcribe(
        &self,
        audio: Vec<u8>,
        mime_type: &str,
        prompt: Option<&str>,
    ) -> Result<TranscriptResult> {
        let file_part = Part::bytes(audio)
            .file_name(file_name_for(mime_type))
            .mime_str(mime_type)?;

        let mut form = Form::new()
            .text("model", self.model.clone())
            .text("response_format", "verbose_json")
            .part("file", file_part);

        if let Some(prompt) = prompt {
            form = form.text("prompt", prompt.to_string());
        }

        let response = self
            .client
            .post(format!("{}/audio/transcriptions", self.base_url))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .context("Failed to reach the transcription endpoint")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Transcription failed with HTTP {}: {}", status, body);
        }

        let reply: TranscriptionResponse = response
            .json()
            .await
            .context("Failed to parse transcription response")?;

        debug!(chars = reply.text.len(), "Transcription received");
        Ok(TranscriptResult {
            text: reply.text.trim().to_string(),
            language: reply.language,
            duration_seconds: reply.duration,
        })
    }
}
