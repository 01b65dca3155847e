//! Assistant facade: the entry points used by the HTTP server and the CLI.
//!
//! Text goes straight to extraction and dispatch. Audio is transcribed
//! first, the transcript is archived to the notes workspace, and only then
//! extracted. Conversations are transcribed and archived without extraction.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::dispatcher::Dispatcher;
use super::extraction::{ExtractionClient, ExtractionError};
use super::notifications::NotificationDispatcher;
use super::{system_clock, Clock};
use crate::adapters::{
    GoogleAuth, GoogleCalendarClient, GoogleTasksClient, Integration, NotionClient, NtfyClient,
    OpenAiChatClient, PushNotifier, Unconfigured,
};
use crate::config::ResolvedConfig;
use crate::domain::{DispatchSummary, NoteItem, Outcome};
use crate::ingest::{Transcriber, WhisperApiTranscriber, CONVERSATION_PROMPT, DICTATION_PROMPT};

/// Facade-level failures
#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("Audio is too large: {size} bytes (maximum {max})")]
    AudioTooLarge { size: usize, max: usize },

    #[error("Transcription failed: {0}")]
    Transcription(#[source] anyhow::Error),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),
}

/// Reply to an audio message
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AudioReply {
    pub transcription: String,

    /// Absent when the transcript was empty
    #[serde(flatten)]
    pub dispatch: Option<DispatchSummary>,
}

/// Reply to a recorded conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationReply {
    pub transcription: String,
}

/// Wires transcription, extraction and dispatch together
pub struct Assistant {
    extraction: ExtractionClient,
    dispatcher: Dispatcher,
    transcriber: Arc<dyn Transcriber>,
    /// Where transcripts are archived
    archive: Arc<dyn Integration<NoteItem>>,
    audio_content_type: String,
    clock: Clock,
}

impl Assistant {
    pub fn new(
        extraction: ExtractionClient,
        dispatcher: Dispatcher,
        transcriber: Arc<dyn Transcriber>,
        archive: Arc<dyn Integration<NoteItem>>,
        clock: Clock,
    ) -> Self {
        Self {
            extraction,
            dispatcher,
            transcriber,
            archive,
            audio_content_type: crate::config::DEFAULT_AUDIO_CONTENT_TYPE.to_string(),
            clock,
        }
    }

    pub fn with_audio_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.audio_content_type = content_type.into();
        self
    }

    /// Build the production wiring from resolved configuration
    pub fn from_config(config: &ResolvedConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.llm.timeout_seconds))
            .build()
            .context("Failed to build HTTP client")?;
        let clock = system_clock();

        let llm_key = config
            .llm
            .api_key
            .clone()
            .context("LLM_API_KEY is not set")?;
        let model = Arc::new(OpenAiChatClient::new(
            &config.llm.base_url,
            llm_key,
            &config.llm.model,
            client.clone(),
        ));
        let transcriber = Arc::new(WhisperApiTranscriber::new(
            &config.llm.transcription_base_url,
            config
                .llm
                .transcription_api_key
                .clone()
                .unwrap_or_default(),
            &config.llm.transcription_model,
            client.clone(),
        ));

        let auth = Arc::new(GoogleAuth::new(
            config.google.token_path.clone(),
            client.clone(),
        ));
        let tasks = Arc::new(GoogleTasksClient::new(auth.clone(), client.clone()));
        let events = Arc::new(GoogleCalendarClient::new(
            &config.google.calendar_id,
            &config.google.timezone,
            auth,
            client.clone(),
        ));

        let notes: Arc<dyn Integration<NoteItem>> =
            notion_integration(config, config.notion.page_id.as_deref(), &client);
        let archive: Arc<dyn Integration<NoteItem>> = notion_integration(
            config,
            config
                .notion
                .transcription_page_id
                .as_deref()
                .or(config.notion.page_id.as_deref()),
            &client,
        );

        let notifier: Arc<dyn PushNotifier> = match &config.ntfy.channel {
            Some(channel) => Arc::new(NtfyClient::new(&config.ntfy.server, channel, client)),
            None => Arc::new(Unconfigured::new("ntfy", "NTFY_CHANNEL is not set")),
        };

        let dispatcher = Dispatcher::new(
            tasks,
            events,
            notes,
            NotificationDispatcher::new(notifier),
            clock.clone(),
        );

        Ok(Self::new(
            ExtractionClient::new(model, clock.clone()),
            dispatcher,
            transcriber,
            archive,
            clock,
        )
        .with_audio_content_type(&config.server.audio_content_type))
    }

    /// Extract and dispatch a text message
    pub async fn handle_text(&self, message: &str) -> Result<DispatchSummary, AssistantError> {
        let request_id = Uuid::new_v4();
        async {
            info!("Processing text message");
            self.process(message).await
        }
        .instrument(info_span!("text", %request_id))
        .await
    }

    /// Transcribe, archive, then extract and dispatch an audio message
    pub async fn handle_audio(
        &self,
        audio: Vec<u8>,
        max_size_bytes: usize,
    ) -> Result<AudioReply, AssistantError> {
        let request_id = Uuid::new_v4();
        async {
            let transcription = self
                .transcribe(audio, max_size_bytes, DICTATION_PROMPT)
                .await?;
            if transcription.is_empty() {
                info!("Empty transcription, nothing to process");
                return Ok(AudioReply {
                    transcription,
                    dispatch: None,
                });
            }

            self.archive("Transcription", &transcription).await;
            let dispatch = self.process(&transcription).await?;
            Ok::<_, AssistantError>(AudioReply {
                transcription,
                dispatch: Some(dispatch),
            })
        }
        .instrument(info_span!("audio", %request_id))
        .await
    }

    /// Transcribe and archive a two-person conversation
    pub async fn handle_conversation(
        &self,
        audio: Vec<u8>,
        max_size_bytes: usize,
    ) -> Result<ConversationReply, AssistantError> {
        let request_id = Uuid::new_v4();
        async {
            let transcription = self
                .transcribe(audio, max_size_bytes, CONVERSATION_PROMPT)
                .await?;
            if transcription.is_empty() {
                info!("Empty transcription, nothing to archive");
            } else {
                self.archive("Conversation", &transcription).await;
            }
            Ok::<_, AssistantError>(ConversationReply { transcription })
        }
        .instrument(info_span!("conversation", %request_id))
        .await
    }

    async fn process(&self, message: &str) -> Result<DispatchSummary, AssistantError> {
        let (data, tokens) = self.extraction.extract(message).await?;
        Ok(self.dispatcher.dispatch(data, tokens).await)
    }

    async fn transcribe(
        &self,
        audio: Vec<u8>,
        max_size_bytes: usize,
        prompt: &str,
    ) -> Result<String, AssistantError> {
        if audio.len() > max_size_bytes {
            return Err(AssistantError::AudioTooLarge {
                size: audio.len(),
                max: max_size_bytes,
            });
        }
        let transcript = self
            .transcriber
            .transcribe(audio, &self.audio_content_type, Some(prompt))
            .await
            .map_err(AssistantError::Transcription)?;
        debug!(chars = transcript.text.len(), "Transcription successful");
        Ok(if transcript.is_empty() {
            String::new()
        } else {
            transcript.text
        })
    }

    /// Archive a transcript as a page; failures are logged only
    async fn archive(&self, label: &str, transcription: &str) {
        let title = format!("{} - {}", label, (self.clock)().format("%Y-%m-%d %H:%M:%S"));
        let note = NoteItem::new(title, transcription);
        match self.archive.create(&note).await {
            Outcome::Created(_) => debug!(title = %note.title, "Transcription archived"),
            Outcome::Failed(failure) => {
                warn!(error = %failure.error, "Failed to archive transcription")
            }
        }
    }
}

fn notion_integration(
    config: &ResolvedConfig,
    parent_page_id: Option<&str>,
    client: &reqwest::Client,
) -> Arc<dyn Integration<NoteItem>> {
    match (&config.notion.api_key, parent_page_id) {
        (Some(key), Some(parent)) => Arc::new(NotionClient::new(key, parent, client.clone())),
        (None, _) => Arc::new(Unconfigured::new("notion", "NOTION_API_KEY is not set")),
        (_, None) => Arc::new(Unconfigured::new("notion", "NOTION_PAGE_ID is not set")),
    }
}
