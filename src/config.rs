//! # Configuration Management Module
//!
//! Questo modulo gestisce tutta la configurazione dell'applicazione.
//!
//! ## Responsabilità:
//! - Definisce la struct `Config` con tutti i parametri della pipeline di ingest
//! - Fornisce validazione robusta dei parametri di input
//! - Supporta caricamento/salvataggio configurazione da/verso file JSON
//! - Legge la API key dall'ambiente (anche da `.env`), mai dal file
//!
//! ## Parametri di configurazione:
//! - `model`: Modello di analisi remoto (default: "gemini-3-flash-preview")
//! - `max_upload_bytes`: Limite upload del servizio (default: 2 GiB)
//! - `max_long_edge`: Lato lungo massimo prima del transcode (default: 1280)
//! - `safe_codecs`: Codec accettati senza transcode (H.264/H.265)
//! - `transcode_workers`: Encoder hardware in parallelo (default: 2)
//! - `transcoder`: Programma, preset e timeout del transcoder hardware
//! - `poll_interval_ms` / `max_upload_wait_secs`: Attesa elaborazione upload
//! - `retry`: Parametri di backoff per le chiamate remote
//!
//! ## Esempio:
//! ```rust,ignore
//! let config = Config {
//!     transcode_workers: 4,
//!     ..Default::default()
//! };
//! config.validate()?;
//! ```

use crate::error::IngestError;
use crate::retry::RetryConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable holding the analysis service key
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "mxf", "avi", "webm", "mkv", "r3d", "braw"];
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "aac", "flac", "ogg", "m4a"];

/// Hardware transcoder invocation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TranscoderConfig {
    /// Binary name or absolute path
    pub program: PathBuf,
    /// Fixed output profile passed to the tool
    pub preset: String,
    /// Upper bound for a single transcode
    pub timeout_secs: u64,
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("/usr/bin/avconvert"),
            preset: "Preset1280x720".to_string(),
            timeout_secs: 3600,
        }
    }
}

/// Backoff parameters for remote calls
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 4,
            base_delay_ms: 2000,
            max_delay_ms: 60_000,
        }
    }
}

impl From<&RetrySettings> for RetryConfig {
    fn from(settings: &RetrySettings) -> Self {
        RetryConfig {
            max_retries: settings.max_retries,
            base_delay: Duration::from_millis(settings.base_delay_ms),
            max_delay: Duration::from_millis(settings.max_delay_ms),
        }
    }
}

/// Configuration for footage ingestion
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Analysis service key, only ever read from the environment
    #[serde(skip)]
    pub api_key: String,
    /// Analysis model name, recorded in every sidecar
    pub model: String,
    /// Base URL of the analysis service
    pub api_base_url: String,
    /// Upload size ceiling of the analysis service
    pub max_upload_bytes: u64,
    /// Longest edge (pixels) accepted without transcoding
    pub max_long_edge: u32,
    /// Codecs accepted without transcoding
    pub safe_codecs: Vec<String>,
    /// Number of concurrent hardware transcodes
    pub transcode_workers: usize,
    /// Hardware transcoder invocation
    pub transcoder: TranscoderConfig,
    /// ffprobe binary name or absolute path
    pub ffprobe_path: PathBuf,
    /// Fixed interval between upload status polls
    pub poll_interval_ms: u64,
    /// Give up on an upload stuck in processing after this long
    pub max_upload_wait_secs: u64,
    /// Backoff for remote calls
    pub retry: RetrySettings,
    /// Output progress and status as JSON lines for programmatic use
    pub json_output: bool,
    /// Draw a terminal progress bar
    pub show_progress: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "gemini-3-flash-preview".to_string(),
            api_base_url: "https://generativelanguage.googleapis.com".to_string(),
            max_upload_bytes: 2 * 1024 * 1024 * 1024,
            max_long_edge: 1280,
            safe_codecs: ["h264", "avc", "avc1", "hevc", "h265", "hev1"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
            transcode_workers: 2,
            transcoder: TranscoderConfig::default(),
            ffprobe_path: PathBuf::from("ffprobe"),
            poll_interval_ms: 2000,
            max_upload_wait_secs: 30 * 60,
            retry: RetrySettings::default(),
            json_output: false,
            show_progress: false,
        }
    }
}

impl Config {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.transcode_workers == 0 {
            return Err(anyhow::anyhow!("Number of transcode workers must be greater than 0"));
        }

        if self.max_upload_bytes == 0 {
            return Err(anyhow::anyhow!("Upload ceiling must be greater than 0"));
        }

        if self.max_long_edge == 0 {
            return Err(anyhow::anyhow!("Max long edge must be greater than 0"));
        }

        if self.model.trim().is_empty() {
            return Err(anyhow::anyhow!("Analysis model must not be empty"));
        }

        if self.poll_interval_ms == 0 {
            return Err(anyhow::anyhow!("Poll interval must be greater than 0"));
        }

        if self.transcoder.timeout_secs == 0 {
            return Err(anyhow::anyhow!("Transcode timeout must be greater than 0"));
        }

        Ok(())
    }

    /// Read the API key from the environment (and `.env`).
    ///
    /// A missing key is fatal.
    pub fn with_api_key_from_env(mut self) -> Result<Self, IngestError> {
        let _ = dotenvy::dotenv();
        match std::env::var(API_KEY_ENV) {
            Ok(key) if !key.trim().is_empty() => {
                self.api_key = key.trim().to_string();
                Ok(self)
            }
            _ => Err(IngestError::MissingCredential(format!(
                "{} not set. Export it or add it to a .env file.",
                API_KEY_ENV
            ))),
        }
    }

    /// Default location of the config file
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".resolve-assistant").join("config.json"))
    }

    /// Load configuration from file
    pub async fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn max_upload_wait(&self) -> Duration {
        Duration::from_secs(self.max_upload_wait_secs)
    }
}
