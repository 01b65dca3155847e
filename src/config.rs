//! Configuration for quill.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (QUILL_HOME, LLM_API_KEY, NOTION_PAGE_ID, ...)
//! 2. Config file (.quill/config.yaml)
//! 3. Defaults (~/.quill)
//!
//! Secrets (API keys, the shared auth token) are only read from the
//! environment, never from the config file.
//!
//! Config file discovery:
//! - Searches current directory and parents for .quill/config.yaml
//! - Relative paths in the config file are resolved against its .quill/ directory

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub llm: Option<LlmConfig>,
    #[serde(default)]
    pub google: Option<GoogleConfig>,
    #[serde(default)]
    pub notion: Option<NotionConfig>,
    #[serde(default)]
    pub ntfy: Option<NtfyConfig>,
    #[serde(default)]
    pub server: Option<ServerConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// State directory (relative to .quill/)
    pub home: Option<String>,
    /// Google token file (relative to .quill/)
    pub google_token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LlmConfig {
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub transcription_base_url: Option<String>,
    pub transcription_model: Option<String>,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GoogleConfig {
    pub calendar_id: Option<String>,
    pub timezone: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotionConfig {
    pub page_id: Option<String>,
    pub transcription_page_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NtfyConfig {
    pub server: Option<String>,
    pub channel: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerConfig {
    pub bind: Option<String>,
    pub max_audio_bytes: Option<usize>,
    pub audio_content_type: Option<String>,
}

/// Resolved configuration
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Absolute path to quill home (token file, state)
    pub home: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    pub llm: LlmSettings,
    pub google: GoogleSettings,
    pub notion: NotionSettings,
    pub ntfy: NtfySettings,
    pub server: ServerSettings,
}

#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub transcription_base_url: String,
    pub transcription_api_key: Option<String>,
    pub transcription_model: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct GoogleSettings {
    pub calendar_id: String,
    pub timezone: String,
    pub token_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct NotionSettings {
    pub api_key: Option<String>,
    pub page_id: Option<String>,
    pub transcription_page_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NtfySettings {
    pub server: String,
    pub channel: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub bind: String,
    pub auth_token: Option<String>,
    pub max_audio_bytes: usize,
    pub audio_content_type: String,
}

pub const DEFAULT_LLM_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";
pub const DEFAULT_LLM_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_TRANSCRIPTION_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_TRANSCRIPTION_MODEL: &str = "whisper-large-v3-turbo";
pub const DEFAULT_TIMEZONE: &str = "Europe/Warsaw";
pub const DEFAULT_NTFY_SERVER: &str = "https://ntfy.sh";
pub const DEFAULT_BIND: &str = "0.0.0.0:8000";
pub const DEFAULT_MAX_AUDIO_BYTES: usize = 500 * 1024; // ~5 minutes of 3gpp
pub const DEFAULT_AUDIO_CONTENT_TYPE: &str = "audio/3gpp";
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".quill").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
pub fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's directory
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

/// Pick the first non-empty value: environment, then file, then default
fn pick(env_value: Option<String>, file_value: Option<&String>, default: &str) -> String {
    env_value
        .filter(|v| !v.is_empty())
        .or_else(|| file_value.filter(|v| !v.is_empty()).cloned())
        .unwrap_or_else(|| default.to_string())
}

impl ResolvedConfig {
    /// Merge a parsed config file with environment lookups.
    ///
    /// `env` is injected so resolution can be tested without touching the
    /// process environment.
    pub fn resolve(
        file: Option<&ConfigFile>,
        config_path: Option<&Path>,
        default_home: &Path,
        env: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let empty = ConfigFile::default();
        let file = file.unwrap_or(&empty);
        let quill_dir = config_path.and_then(Path::parent);

        let home = match (env("QUILL_HOME"), &file.paths.home, quill_dir) {
            (Some(env_home), _, _) if !env_home.is_empty() => PathBuf::from(env_home),
            (_, Some(home), Some(dir)) => resolve_path(dir, home),
            _ => default_home.to_path_buf(),
        };

        let token_path = match (env("GOOGLE_TOKEN_PATH"), &file.paths.google_token, quill_dir) {
            (Some(path), _, _) if !path.is_empty() => PathBuf::from(path),
            (_, Some(path), Some(dir)) => resolve_path(dir, path),
            _ => home.join("google_token.json"),
        };

        let llm = file.llm.clone().unwrap_or_default();
        let api_key = env("LLM_API_KEY").filter(|v| !v.is_empty());
        let llm = LlmSettings {
            base_url: pick(env("LLM_BASE_URL"), llm.base_url.as_ref(), DEFAULT_LLM_BASE_URL),
            model: pick(env("LLM_MODEL"), llm.model.as_ref(), DEFAULT_LLM_MODEL),
            transcription_base_url: pick(
                env("TRANSCRIPTION_BASE_URL"),
                llm.transcription_base_url.as_ref(),
                DEFAULT_TRANSCRIPTION_BASE_URL,
            ),
            transcription_api_key: env("TRANSCRIPTION_API_KEY")
                .filter(|v| !v.is_empty())
                .or_else(|| api_key.clone()),
            transcription_model: pick(
                env("TRANSCRIPTION_MODEL"),
                llm.transcription_model.as_ref(),
                DEFAULT_TRANSCRIPTION_MODEL,
            ),
            timeout_seconds: llm.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECONDS),
            api_key,
        };

        let google = file.google.clone().unwrap_or_default();
        let google = GoogleSettings {
            calendar_id: pick(env("CALENDAR_ID"), google.calendar_id.as_ref(), "primary"),
            timezone: pick(env("CALENDAR_TIMEZONE"), google.timezone.as_ref(), DEFAULT_TIMEZONE),
            token_path,
        };

        let notion = file.notion.clone().unwrap_or_default();
        let notion = NotionSettings {
            api_key: env("NOTION_API_KEY").filter(|v| !v.is_empty()),
            page_id: env("NOTION_PAGE_ID")
                .filter(|v| !v.is_empty())
                .or(notion.page_id),
            transcription_page_id: env("NOTION_TRANSCRIPTION_PAGE_ID")
                .filter(|v| !v.is_empty())
                .or(notion.transcription_page_id),
        };

        let ntfy = file.ntfy.clone().unwrap_or_default();
        let ntfy = NtfySettings {
            server: pick(env("NTFY_SERVER"), ntfy.server.as_ref(), DEFAULT_NTFY_SERVER),
            channel: env("NTFY_CHANNEL").filter(|v| !v.is_empty()).or(ntfy.channel),
        };

        let server = file.server.clone().unwrap_or_default();
        let server = ServerSettings {
            bind: pick(env("QUILL_BIND"), server.bind.as_ref(), DEFAULT_BIND),
            auth_token: env("AUTH_TOKEN_SECRET").filter(|v| !v.is_empty()),
            max_audio_bytes: server.max_audio_bytes.unwrap_or(DEFAULT_MAX_AUDIO_BYTES),
            audio_content_type: server
                .audio_content_type
                .unwrap_or_else(|| DEFAULT_AUDIO_CONTENT_TYPE.to_string()),
        };

        Self {
            home,
            config_file: config_path.map(Path::to_path_buf),
            llm,
            google,
            notion,
            ntfy,
            server,
        }
    }
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".quill");

    let config_path = find_config_file();
    let file = match config_path {
        Some(ref path) => Some(load_config_file(path)?),
        None => None,
    };

    Ok(ResolvedConfig::resolve(
        file.as_ref(),
        config_path.as_deref(),
        &default_home,
        |key| std::env::var(key).ok(),
    ))
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| e.to_string()));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}
