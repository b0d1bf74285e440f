//! # Sidecar Module
//!
//! Metadati per-file persistiti come JSON accanto al file sorgente
//! (`<nome file>.json`).
//!
//! ## Responsabilità:
//! - Modello `Sidecar` / `Segment` con preservazione dei campi sconosciuti
//! - Costruzione del sidecar dalla risposta del servizio di analisi
//! - Scrittura atomica (mai un documento parziale)
//! - Caricamento di tutti i sidecar di una cartella
//!
//! ## Precedenza dei campi:
//! - `file_path`, `filename`, `analysis_model` iniettati localmente
//! - Per i video `fps`/`duration` misurati da ffprobe sovrascrivono le stime remote

use crate::error::IngestError;
use crate::file_manager::{FileManager, MediaKind};
use crate::probe::ProbeInfo;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Sidecar location for a media file: the full file name plus `.json`
pub fn sidecar_path(media: &Path) -> PathBuf {
    let mut name = media.file_name().unwrap_or_default().to_os_string();
    name.push(".json");
    media.with_file_name(name)
}

/// A time-bounded moment of interest within one media file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Segment {
    #[serde(default)]
    pub start_sec: f64,
    #[serde(default)]
    pub end_sec: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Segment {
    pub fn new(start_sec: f64, end_sec: f64) -> Self {
        Self {
            start_sec,
            end_sec,
            extra: Map::new(),
        }
    }

    /// Only forward ranges are usable downstream
    pub fn is_usable(&self) -> bool {
        self.end_sec > self.start_sec
    }
}

/// Durable per-file analysis result
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Sidecar {
    #[serde(default)]
    pub file_path: String,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub media_type: String,
    #[serde(default)]
    pub analysis_model: String,
    #[serde(default)]
    pub segments: Vec<Segment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fps: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    /// Service-provided fields kept verbatim
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Sidecar {
    /// Build a sidecar from the service's structured response text
    pub fn from_analysis(
        response_text: &str,
        media_path: &Path,
        kind: MediaKind,
        model: &str,
        probe: Option<&ProbeInfo>,
    ) -> Result<Self, IngestError> {
        let mut data: Map<String, Value> = match serde_json::from_str(strip_code_fence(response_text))? {
            Value::Object(map) => map,
            other => {
                return Err(IngestError::Validation(format!(
                    "analysis response is not a JSON object: {}",
                    type_name(&other)
                )));
            }
        };

        data.insert("file_path".into(), Value::String(media_path.display().to_string()));
        data.insert("filename".into(), Value::String(FileManager::display_name(media_path)));
        data.insert("analysis_model".into(), Value::String(model.to_string()));
        if !matches!(data.get("media_type"), Some(Value::String(s)) if !s.is_empty()) {
            data.insert("media_type".into(), Value::String(kind.as_str().to_string()));
        }

        let mut sidecar: Sidecar = serde_json::from_value(Value::Object(data))?;

        if kind == MediaKind::Video {
            if let Some(probe) = probe {
                if let Some(fps) = probe.fps {
                    sidecar.fps = Some(round3(fps));
                }
                if let Some(duration) = probe.duration {
                    sidecar.duration = Some(round3(duration));
                }
            }
        }

        Ok(sidecar)
    }

    pub fn is_audio(&self) -> bool {
        self.media_type == "audio" || self.media_type.starts_with("audio/")
    }

    /// Source file name without extension, used as the clip key
    pub fn clip_stem(&self) -> String {
        let source = if self.file_path.is_empty() {
            &self.filename
        } else {
            &self.file_path
        };
        Path::new(source)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    /// Persist beside its media file as one complete document
    pub fn write(&self, media_path: &Path) -> Result<PathBuf> {
        let path = sidecar_path(media_path);
        FileManager::write_json_atomic(&path, self)?;
        Ok(path)
    }

    /// Load every readable sidecar under a folder, in discovery order
    pub fn load_all(root: &Path) -> Result<Vec<Sidecar>> {
        let mut sidecars = Vec::new();
        for kind in [MediaKind::Video, MediaKind::Audio] {
            for media in FileManager::list_media(root, kind)? {
                let path = sidecar_path(&media);
                if !path.exists() {
                    continue;
                }
                match std::fs::read_to_string(&path)
                    .map_err(anyhow::Error::from)
                    .and_then(|s| serde_json::from_str::<Sidecar>(&s).map_err(anyhow::Error::from))
                {
                    Ok(sidecar) => sidecars.push(sidecar),
                    Err(e) => warn!("Skipping unreadable sidecar {}: {}", path.display(), e),
                }
            }
        }
        Ok(sidecars)
    }
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Models sometimes wrap JSON in a markdown fence
pub fn strip_code_fence(text: &str) -> &str {
    let text = text.trim();
    let text = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .unwrap_or(text);
    text.strip_suffix("```").unwrap_or(text).trim()
}
