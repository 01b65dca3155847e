//! Command-line interface for quill.
//!
//! Provides commands for running the HTTP server, processing a message or
//! an audio file once, inspecting Google credentials, and showing the
//! resolved configuration.

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use crate::adapters::GoogleAuth;
use crate::config;
use crate::core::Assistant;
use crate::server::{self, AppState};

/// quill - turn free-form messages into tasks, events and notes
#[derive(Parser, Debug)]
#[command(name = "quill")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP server
    Serve {
        /// Address to bind to (overrides config)
        #[arg(short, long, env = "QUILL_BIND")]
        bind: Option<String>,
    },

    /// Extract and dispatch a text message
    Text {
        /// Message text (reads from stdin if not provided)
        message: Option<String>,

        /// Read the message from a file
        #[arg(short, long, conflicts_with = "message")]
        input: Option<PathBuf>,
    },

    /// Transcribe an audio file, then extract and dispatch it
    Audio {
        /// Audio file to process
        file: PathBuf,

        /// Treat the recording as a two-person conversation (archive only)
        #[arg(long)]
        conversation: bool,
    },

    /// Inspect or reset the stored Google credentials
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },

    /// Show current configuration
    Config,
}

#[derive(Subcommand, Debug)]
pub enum AuthCommands {
    /// Show which scopes the stored token carries
    Status,

    /// Delete the stored token so the consent flow runs again
    Reset,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Serve { bind } => serve(bind).await,
            Commands::Text { message, input } => process_text(message, input).await,
            Commands::Audio { file, conversation } => process_audio(&file, conversation).await,
            Commands::Auth { command } => match command {
                AuthCommands::Status => auth_status().await,
                AuthCommands::Reset => auth_reset().await,
            },
            Commands::Config => show_config(),
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to serialize result")?
    );
    Ok(())
}

async fn serve(bind: Option<String>) -> Result<()> {
    let cfg = config::config()?;
    let assistant = Assistant::from_config(cfg)?;

    let bind = bind.unwrap_or_else(|| cfg.server.bind.clone());
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;

    let state = Arc::new(AppState {
        assistant,
        auth_token: cfg.server.auth_token.clone(),
        max_audio_bytes: cfg.server.max_audio_bytes,
        audio_content_type: cfg.server.audio_content_type.clone(),
    });
    server::serve(listener, state).await
}

async fn process_text(message: Option<String>, input_file: Option<PathBuf>) -> Result<()> {
    let message = if let Some(message) = message {
        message
    } else if let Some(path) = input_file {
        std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read input file: {}", path.display()))?
    } else {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read from stdin")?;
        buffer
    };

    if message.trim().is_empty() {
        anyhow::bail!("No message provided. Pass it as an argument, use --input <file> or pipe to stdin");
    }

    let cfg = config::config()?;
    let assistant = Assistant::from_config(cfg)?;
    let summary = assistant.handle_text(&message).await?;

    let failed = summary.results.iter().filter(|r| !r.outcome.is_success()).count();
    print_json(&summary)?;
    if failed > 0 {
        eprintln!("\n[{} of {} items failed]", failed, summary.results.len());
    }
    Ok(())
}

async fn process_audio(file: &Path, conversation: bool) -> Result<()> {
    let audio = tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read audio file: {}", file.display()))?;

    let cfg = config::config()?;
    let assistant = Assistant::from_config(cfg)?;
    let max = cfg.server.max_audio_bytes;

    if conversation {
        print_json(&assistant.handle_conversation(audio, max).await?)
    } else {
        print_json(&assistant.handle_audio(audio, max).await?)
    }
}

async fn auth_status() -> Result<()> {
    let cfg = config::config()?;
    let auth = GoogleAuth::new(cfg.google.token_path.clone(), reqwest::Client::new());

    println!("Token file: {}", auth.token_path().display());
    let report = auth.scope_report().await?;
    println!();
    println!("Current scopes:");
    for scope in &report.current_scopes {
        println!("  {}", scope);
    }
    if report.has_all_scopes {
        println!();
        println!("All required scopes are granted.");
    } else {
        println!();
        println!("Missing scopes:");
        for scope in &report.missing_scopes {
            println!("  {}", scope);
        }
        println!();
        println!("Run `quill auth reset` and authorize again.");
    }
    Ok(())
}

async fn auth_reset() -> Result<()> {
    let cfg = config::config()?;
    let auth = GoogleAuth::new(cfg.google.token_path.clone(), reqwest::Client::new());
    auth.reset().await?;
    eprintln!("Removed {}", auth.token_path().display());
    Ok(())
}

fn set_or_missing(value: &Option<String>) -> &'static str {
    if value.is_some() {
        "set"
    } else {
        "(not set)"
    }
}

/// Show the resolved configuration (for debugging)
fn show_config() -> Result<()> {
    let cfg = config::config()?;

    println!("quill configuration");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!("Home:        {}", cfg.home.display());
    println!();
    println!("LLM:");
    println!("  Base URL:   {}", cfg.llm.base_url);
    println!("  Model:      {}", cfg.llm.model);
    println!("  API key:    {}", set_or_missing(&cfg.llm.api_key));
    println!("  Timeout:    {}s", cfg.llm.timeout_seconds);
    println!();
    println!("Transcription:");
    println!("  Base URL:   {}", cfg.llm.transcription_base_url);
    println!("  Model:      {}", cfg.llm.transcription_model);
    println!("  API key:    {}", set_or_missing(&cfg.llm.transcription_api_key));
    println!();
    println!("Google:");
    println!("  Calendar:   {}", cfg.google.calendar_id);
    println!("  Timezone:   {}", cfg.google.timezone);
    println!("  Token file: {}", cfg.google.token_path.display());
    println!();
    println!("Notion:");
    println!("  API key:    {}", set_or_missing(&cfg.notion.api_key));
    println!(
        "  Page:       {}",
        cfg.notion.page_id.as_deref().unwrap_or("(not set)")
    );
    println!(
        "  Archive:    {}",
        cfg.notion
            .transcription_page_id
            .as_deref()
            .unwrap_or("(same as page)")
    );
    println!();
    println!("ntfy:");
    println!("  Server:     {}", cfg.ntfy.server);
    println!(
        "  Channel:    {}",
        cfg.ntfy.channel.as_deref().unwrap_or("(not set)")
    );
    println!();
    println!("Server:");
    println!("  Bind:       {}", cfg.server.bind);
    println!("  Auth token: {}", set_or_missing(&cfg.server.auth_token));
    println!("  Max audio:  {} bytes", cfg.server.max_audio_bytes);
    println!("  Audio type: {}", cfg.server.audio_content_type);

    Ok(())
}
