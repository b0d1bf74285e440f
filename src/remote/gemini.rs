//! Gemini REST client: Files API upload/status and structured generateContent.

use super::{AnalysisRequest, AnalysisService, FileState, RemoteFile};
use crate::config::Config;
use crate::error::RemoteError;
use crate::file_manager::FileManager;
use async_trait::async_trait;
use reqwest::header::{CONTENT_LENGTH, RETRY_AFTER};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;
use tokio_util::io::ReaderStream;
use tracing::debug;

/// Gemini API client
pub struct GeminiClient {
    api_key: String,
    base_url: String,
    model: String,
    client: Client,
}

/// File resource as returned by the Files API
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileResource {
    name: String,
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    uri: String,
    #[serde(default)]
    mime_type: String,
    #[serde(default)]
    state: String,
}

impl From<FileResource> for RemoteFile {
    fn from(file: FileResource) -> Self {
        RemoteFile {
            name: file.name,
            display_name: file.display_name,
            uri: file.uri,
            mime_type: file.mime_type,
            state: FileState::parse(&file.state),
        }
    }
}

#[derive(Debug, Deserialize)]
struct FileEnvelope {
    file: FileResource,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content>,
    generation_config: GenerationConfig<'a>,
}

#[derive(Debug, Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    response_mime_type: &'static str,
    response_schema: &'a Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    media_resolution: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

impl GeminiClient {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| RemoteError::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            client,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, RemoteError> {
        Self::new(config.api_key.clone(), config.api_base_url.clone(), config.model.clone())
    }
}

#[async_trait]
impl AnalysisService for GeminiClient {
    fn model(&self) -> &str {
        &self.model
    }

    /// Resumable upload: open a session, then stream the file and finalize
    async fn upload(&self, path: &Path) -> Result<RemoteFile, RemoteError> {
        let size = tokio::fs::metadata(path)
            .await
            .map_err(|e| RemoteError::BadRequest(format!("cannot read {}: {}", path.display(), e)))?
            .len();
        let mime_type = mime_type_for(path);
        let display_name = FileManager::display_name(path);

        let start = self
            .client
            .post(format!("{}/upload/v1beta/files", self.base_url))
            .header("x-goog-api-key", &self.api_key)
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", size.to_string())
            .header("X-Goog-Upload-Header-Content-Type", mime_type)
            .json(&json!({ "file": { "display_name": display_name } }))
            .send()
            .await?;
        let start = check_status(start).await?;

        let upload_url = start
            .headers()
            .get("x-goog-upload-url")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| RemoteError::InvalidResponse("upload session URL missing".into()))?
            .to_string();

        let file = tokio::fs::File::open(path)
            .await
            .map_err(|e| RemoteError::BadRequest(format!("cannot open {}: {}", path.display(), e)))?;
        let body = reqwest::Body::wrap_stream(ReaderStream::new(file));

        debug!("Uploading {} ({})", display_name, FileManager::format_size(size));
        let response = self
            .client
            .post(upload_url)
            .header(CONTENT_LENGTH, size.to_string())
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .body(body)
            .send()
            .await?;
        let envelope: FileEnvelope = check_status(response).await?.json().await?;
        Ok(envelope.file.into())
    }

    async fn get_file(&self, name: &str) -> Result<RemoteFile, RemoteError> {
        let response = self
            .client
            .get(format!("{}/v1beta/{}", self.base_url, name))
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await?;
        let file: FileResource = check_status(response).await?.json().await?;
        Ok(file.into())
    }

    async fn analyze(&self, file: &RemoteFile, request: AnalysisRequest<'_>) -> Result<String, RemoteError> {
        let body = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![
                    json!({ "fileData": { "mimeType": file.mime_type, "fileUri": file.uri } }),
                    json!({ "text": request.prompt }),
                ],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                response_schema: request.response_schema,
                media_resolution: request.high_resolution.then_some("MEDIA_RESOLUTION_HIGH"),
            },
        };

        let response = self
            .client
            .post(format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;
        let response: GenerateResponse = check_status(response).await?.json().await?;

        let text: String = response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            let reason = response
                .prompt_feedback
                .map(|f| f.to_string())
                .unwrap_or_else(|| "no content".to_string());
            return Err(RemoteError::InvalidResponse(format!("empty analysis response: {}", reason)));
        }

        Ok(text)
    }
}

/// Turn non-2xx responses into classified errors
async fn check_status(response: Response) -> Result<Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs);
    let body = response.text().await.unwrap_or_default();
    let body: String = body.chars().take(500).collect();
    Err(RemoteError::from_status(status.as_u16(), body, retry_after))
}

fn mime_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "mxf" => "application/mxf",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "aac" => "audio/aac",
        "flac" => "audio/flac",
        "ogg" => "audio/ogg",
        "m4a" => "audio/mp4",
        _ => "application/octet-stream",
    }
}
