//! # Error Types Module
//!
//! Questo modulo definisce tutti i tipi di errore custom dell'applicazione.
//!
//! ## Responsabilità:
//! - Definisce `IngestError` per gli errori locali (I/O, tool esterni, configurazione)
//! - Definisce `RemoteError` per gli errori del servizio di analisi remoto
//! - Classifica gli errori: fatali (abortiscono il processo) vs per-file
//! - Classifica gli errori remoti: transienti (retry) vs terminali
//!
//! ## Categorie di errori locali:
//! - `MissingDependency` / `MissingCredential`: fatali, solo all'avvio
//! - `Transcode`, `Probe`, `UploadState`, `Remote`, `Json`: per-file, finiscono
//!   nella lista `errors` del progress record
//!
//! ## Esempio:
//! ```rust,ignore
//! if !tool_exists {
//!     return Err(IngestError::MissingDependency("ffprobe".to_string()));
//! }
//! ```

use std::time::Duration;

/// Errors raised while ingesting a folder
#[derive(thiserror::Error, Debug)]
pub enum IngestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("probe failed: {0}")]
    Probe(String),

    #[error("transcode failed: {0}")]
    Transcode(String),

    #[error("Dependency missing: {0}")]
    MissingDependency(String),

    #[error("Credential missing: {0}")]
    MissingCredential(String),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("upload state={0}")]
    UploadState(String),

    #[error("validation error: {0}")]
    Validation(String),
}

impl IngestError {
    /// Configuration errors abort the whole run instead of a single file.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            IngestError::MissingDependency(_) | IngestError::MissingCredential(_)
        )
    }
}

/// Errors returned by the remote analysis service
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum RemoteError {
    #[error("network error: {0}")]
    Network(String),

    #[error("rate limited: {message}")]
    RateLimited {
        message: String,
        retry_after: Option<Duration>,
    },

    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl RemoteError {
    /// Map an HTTP status and body onto the taxonomy.
    pub fn from_status(status: u16, body: String, retry_after: Option<Duration>) -> Self {
        match status {
            401 | 403 => RemoteError::Auth(body),
            429 => RemoteError::RateLimited {
                message: body,
                retry_after,
            },
            500..=599 => RemoteError::Server {
                status,
                message: body,
            },
            _ => RemoteError::BadRequest(format!("HTTP {}: {}", status, body)),
        }
    }

    /// Transient failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RemoteError::Network(_) | RemoteError::RateLimited { .. } | RemoteError::Server { .. }
        )
    }

    /// Delay requested by the service, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            RemoteError::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            RemoteError::InvalidResponse(err.to_string())
        } else if let Some(status) = err.status() {
            RemoteError::from_status(status.as_u16(), err.to_string(), None)
        } else {
            RemoteError::Network(err.to_string())
        }
    }
}
