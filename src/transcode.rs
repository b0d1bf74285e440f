//! # Transcode Module
//!
//! Questo modulo decide se un video va transcodificato prima dell'upload e
//! memoizza il risultato su un path derivato deterministico.
//!
//! ## Responsabilità:
//! - Decide se il file rispetta i vincoli di upload (dimensione, codec, lato lungo)
//! - Restituisce il path originale se il file è già "safe"
//! - Altrimenti restituisce `<stem>.gemini.mp4`, transcodificando solo se non esiste
//! - Delega il transcode a un tool hardware esterno (avconvert / VideoToolbox)
//!
//! ## Cache:
//! - L'esistenza di `<stem>.gemini.mp4` significa "già preparato"
//! - Il tool scrive su `<stem>.gemini.partial.mp4`, rinominato solo a successo
//! - La decisione precede il controllo della cache: un file "safe" non riceve
//!   mai il proxy di un altro file con lo stesso stem
//! - Oltre il limite di dimensione il proxy in cache è restituito senza probe
//!
//! ## Errori:
//! - Tool mancante: `MissingDependency` (fatale)
//! - Exit code non zero o timeout: `Transcode` (errore per-file)
//! - Proxy ancora troppo grande: solo warning, il path viene comunque restituito
//!
//! ## Esempio:
//! ```rust,ignore
//! let cache = TranscodeCache::new(UploadLimits::from(&config), prober, transcoder);
//! let upload_path = cache.prepare(&video_path).await?;
//! ```

use crate::config::Config;
use crate::error::IngestError;
use crate::file_manager::FileManager;
use crate::probe::{MediaProber, ProbeInfo};
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

const PROXY_SUFFIX: &str = ".gemini.mp4";
const PARTIAL_SUFFIX: &str = ".gemini.partial.mp4";

/// Cached upload-safe stand-in for a video: `<stem>.gemini.mp4`
pub fn proxy_path(video: &Path) -> PathBuf {
    with_stem_suffix(video, PROXY_SUFFIX)
}

fn partial_path(video: &Path) -> PathBuf {
    with_stem_suffix(video, PARTIAL_SUFFIX)
}

fn with_stem_suffix(video: &Path, suffix: &str) -> PathBuf {
    let stem = video.file_stem().unwrap_or_default().to_string_lossy();
    video.with_file_name(format!("{}{}", stem, suffix))
}

/// True for proxies and in-flight proxies, which are never footage
pub fn is_proxy(path: &Path) -> bool {
    path.file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .map(|n| n.ends_with(PROXY_SUFFIX) || n.ends_with(PARTIAL_SUFFIX))
        .unwrap_or(false)
}

/// Constraints a file must meet to be uploaded as-is
#[derive(Debug, Clone)]
pub struct UploadLimits {
    pub max_bytes: u64,
    pub max_long_edge: u32,
    pub safe_codecs: HashSet<String>,
}

impl From<&Config> for UploadLimits {
    fn from(config: &Config) -> Self {
        Self {
            max_bytes: config.max_upload_bytes,
            max_long_edge: config.max_long_edge,
            safe_codecs: config.safe_codecs.iter().map(|c| c.to_lowercase()).collect(),
        }
    }
}

impl UploadLimits {
    /// Decide whether a video needs transcoding before upload
    pub fn needs_transcode(&self, size: u64, probe: &ProbeInfo) -> bool {
        if size > self.max_bytes {
            return true;
        }
        match probe.codec.as_deref() {
            Some(codec) if self.safe_codecs.contains(codec) => {}
            _ => return true,
        }
        matches!(probe.long_edge(), Some(edge) if edge > self.max_long_edge)
    }
}

/// External hardware transcoder
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Re-encode `source` into `target` with the fixed upload profile
    async fn transcode(&self, source: &Path, target: &Path) -> Result<(), IngestError>;
}

/// macOS `avconvert` (AVFoundation / VideoToolbox hardware encoders)
pub struct AvconvertTranscoder {
    program: PathBuf,
    preset: String,
    timeout: Duration,
}

impl AvconvertTranscoder {
    pub fn new(program: impl Into<PathBuf>, preset: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            preset: preset.into(),
            timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.transcoder.program.clone(),
            config.transcoder.preset.clone(),
            Duration::from_secs(config.transcoder.timeout_secs),
        )
    }
}

#[async_trait]
impl Transcoder for AvconvertTranscoder {
    async fn transcode(&self, source: &Path, target: &Path) -> Result<(), IngestError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(crate::args![
            "--preset",
            self.preset,
            "--source",
            source,
            "--output",
            target,
            "--replace"
        ])
        .kill_on_drop(true);

        let start_time = std::time::Instant::now();
        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(IngestError::MissingDependency(format!(
                    "{} not found. Requires macOS 13+ with Xcode command-line tools.",
                    self.program.display()
                )));
            }
            Ok(Err(e)) => {
                return Err(IngestError::Transcode(format!(
                    "failed to run {}: {}",
                    self.program.display(),
                    e
                )));
            }
            Err(_) => {
                return Err(IngestError::Transcode(format!(
                    "timed out after {}s",
                    self.timeout.as_secs()
                )));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr: String = stderr.chars().take(500).collect();
            return Err(IngestError::Transcode(format!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                stderr.trim()
            )));
        }

        debug!(
            "Transcode of {} finished in {:.1}s",
            FileManager::display_name(source),
            start_time.elapsed().as_secs_f64()
        );
        Ok(())
    }
}

/// Decides and memoizes upload-safe copies of videos
pub struct TranscodeCache {
    limits: UploadLimits,
    prober: Arc<dyn MediaProber>,
    transcoder: Arc<dyn Transcoder>,
}

impl TranscodeCache {
    pub fn new(limits: UploadLimits, prober: Arc<dyn MediaProber>, transcoder: Arc<dyn Transcoder>) -> Self {
        Self {
            limits,
            prober,
            transcoder,
        }
    }

    /// Return an upload-safe path for `video`.
    ///
    /// The decision comes first: a file that already meets the limits is
    /// returned unchanged even when a proxy with the same stem exists.
    pub async fn prepare(&self, video: &Path) -> Result<PathBuf, IngestError> {
        let cache_path = proxy_path(video);
        let size = tokio::fs::metadata(video).await?.len();

        // Over the size ceiling no probe result can make the file safe
        if size > self.limits.max_bytes && tokio::fs::try_exists(&cache_path).await? {
            debug!("Using cached proxy {}", cache_path.display());
            return Ok(cache_path);
        }

        let probe = self.prober.probe(video).await?;
        if !self.limits.needs_transcode(size, &probe) {
            debug!("{} is upload-safe, no transcode", FileManager::display_name(video));
            return Ok(video.to_path_buf());
        }

        if tokio::fs::try_exists(&cache_path).await? {
            debug!("Using cached proxy {}", cache_path.display());
            return Ok(cache_path);
        }

        let partial = partial_path(video);
        info!(
            "Transcoding {} -> {}",
            FileManager::display_name(video),
            FileManager::display_name(&cache_path)
        );

        if let Err(e) = self.transcoder.transcode(video, &partial).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e);
        }
        tokio::fs::rename(&partial, &cache_path).await?;

        let proxy_size = tokio::fs::metadata(&cache_path).await?.len();
        if proxy_size > self.limits.max_bytes {
            warn!(
                "{} is still {} after transcode, upload may be rejected",
                FileManager::display_name(&cache_path),
                FileManager::format_size(proxy_size)
            );
        }

        Ok(cache_path)
    }
}
