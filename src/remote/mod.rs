//! # Remote Analysis Module
//!
//! Interfaccia verso il servizio di analisi multimodale remoto.
//!
//! ## Operazioni:
//! - `upload(file) -> RemoteFile`: asincrono lato servizio, va interrogato con `get_file`
//! - `get_file(name)`: stato corrente del job (processing / active / failed)
//! - `analyze(file, request)`: analisi strutturata con prompt e schema di risposta
//!
//! ## Implementazioni:
//! - `GeminiClient`: REST API di Google Gemini (Files API + generateContent)

pub mod gemini;
pub mod schema;

pub use gemini::GeminiClient;
pub use schema::AnalysisProfile;

use crate::error::RemoteError;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::path::Path;

/// Processing state of an uploaded file as reported by the service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileState {
    Processing,
    Active,
    Failed,
    Other(String),
}

impl FileState {
    pub fn parse(state: &str) -> Self {
        match state {
            "PROCESSING" => FileState::Processing,
            "ACTIVE" => FileState::Active,
            "FAILED" => FileState::Failed,
            other => FileState::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            FileState::Processing => "PROCESSING",
            FileState::Active => "ACTIVE",
            FileState::Failed => "FAILED",
            FileState::Other(s) => s,
        }
    }
}

impl fmt::Display for FileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle to a file uploaded to the service
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteFile {
    /// Service resource name, e.g. `files/abc123`
    pub name: String,
    pub display_name: String,
    pub uri: String,
    pub mime_type: String,
    pub state: FileState,
}

/// Prompt and expected response shape for one analysis call
#[derive(Debug, Clone, Copy)]
pub struct AnalysisRequest<'a> {
    pub prompt: &'a str,
    pub response_schema: &'a Value,
    pub high_resolution: bool,
}

/// Remote multimodal analysis service
#[async_trait]
pub trait AnalysisService: Send + Sync {
    /// Model name recorded in sidecars
    fn model(&self) -> &str;

    async fn upload(&self, path: &Path) -> Result<RemoteFile, RemoteError>;

    async fn get_file(&self, name: &str) -> Result<RemoteFile, RemoteError>;

    /// Returns the structured response as JSON text
    async fn analyze(&self, file: &RemoteFile, request: AnalysisRequest<'_>) -> Result<String, RemoteError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_state_parse() {
        assert_eq!(FileState::parse("ACTIVE"), FileState::Active);
        assert_eq!(FileState::parse("PROCESSING"), FileState::Processing);
        assert_eq!(FileState::parse("FAILED"), FileState::Failed);
        let other = FileState::parse("STATE_UNSPECIFIED");
        assert_eq!(other.to_string(), "STATE_UNSPECIFIED");
    }
}
