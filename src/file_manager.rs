//! # File Management Module
//!
//! Questo modulo gestisce tutte le operazioni sui file e la discovery di media.
//!
//! ## Responsabilità:
//! - Discovery ricorsiva di file media in una cartella di footage
//! - Determinazione tipo file (video vs audio) tramite estensione
//! - Query dei file "pending" (senza sidecar JSON accanto)
//! - Scrittura atomica di documenti JSON (sidecar e progress record)
//! - Formattazione human-readable delle dimensioni
//!
//! ## Regole di discovery:
//! - Ordine deterministico (per nome file)
//! - File e cartelle nascosti ignorati
//! - Proxy di transcode (`*.gemini.mp4`) mai considerati media
//!
//! ## Esempio:
//! ```rust,ignore
//! let pending = FileManager::list_pending(&root, MediaKind::Video)?;
//! for video in pending {
//!     // transcode + analyze
//! }
//! ```

use crate::config::{AUDIO_EXTENSIONS, VIDEO_EXTENSIONS};
use crate::sidecar::sidecar_path;
use crate::transcode::is_proxy;
use anyhow::Result;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Media family of a source file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Audio,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
        }
    }
}

/// Manages file operations and discovery
pub struct FileManager;

impl FileManager {
    /// Classify a path by extension, `None` for anything that is not footage
    pub fn classify(path: &Path) -> Option<MediaKind> {
        if is_proxy(path) {
            return None;
        }
        let ext = path.extension()?.to_string_lossy().to_lowercase();
        if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            Some(MediaKind::Video)
        } else if AUDIO_EXTENSIONS.contains(&ext.as_str()) {
            Some(MediaKind::Audio)
        } else {
            None
        }
    }

    /// Find all media files of one kind under a folder
    pub fn list_media(root: &Path, kind: MediaKind) -> Result<Vec<PathBuf>> {
        if !root.is_dir() {
            return Err(anyhow::anyhow!("Not a directory: {}", root.display()));
        }

        let files = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e))
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| Self::classify(p) == Some(kind))
            .collect();

        Ok(files)
    }

    /// Media files of one kind that have no sidecar yet
    pub fn list_pending(root: &Path, kind: MediaKind) -> Result<Vec<PathBuf>> {
        Ok(Self::list_media(root, kind)?
            .into_iter()
            .filter(|p| !sidecar_path(p).exists())
            .collect())
    }

    /// Count of all footage (video + audio) regardless of sidecars
    pub fn count_all(root: &Path) -> Result<usize> {
        Ok(Self::list_media(root, MediaKind::Video)?.len() + Self::list_media(root, MediaKind::Audio)?.len())
    }

    /// Count of footage still lacking a sidecar
    pub fn count_pending(root: &Path) -> Result<usize> {
        Ok(Self::list_pending(root, MediaKind::Video)?.len() + Self::list_pending(root, MediaKind::Audio)?.len())
    }

    /// Display name used in progress records and error entries
    pub fn display_name(path: &Path) -> String {
        path.file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string())
    }

    /// Write a JSON document so readers never observe a partial file
    pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
        Self::write_atomic(path, &serde_json::to_vec_pretty(value)?)
    }

    /// Replace `path` with `contents` in one rename
    pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)?;

        let mut temp = tempfile::NamedTempFile::new_in(dir)?;
        temp.write_all(contents)?;
        temp.flush()?;
        temp.as_file().sync_all()?;
        temp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }

    /// Get human-readable file size
    pub fn format_size(size: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = size as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", size as u64, UNITS[unit_index])
        } else {
            format!("{:.2} {}", size, UNITS[unit_index])
        }
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}
