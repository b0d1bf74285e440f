//! Stage B: upload, wait, analyze and persist one file at a time.

use crate::config::Config;
use crate::error::IngestError;
use crate::file_manager::{FileManager, MediaKind};
use crate::ingest::progress_tracker::IngestProgress;
use crate::ingest::upload_wait::UploadWait;
use crate::probe::MediaProber;
use crate::remote::{AnalysisProfile, AnalysisService};
use crate::retry::{with_retry, RetryConfig};
use crate::sidecar::Sidecar;
use crate::state::IngestStep;
use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub struct AnalyzeStage<'a> {
    service: &'a dyn AnalysisService,
    prober: &'a dyn MediaProber,
    retry: RetryConfig,
    wait: UploadWait,
}

impl<'a> AnalyzeStage<'a> {
    pub fn new(config: &Config, service: &'a dyn AnalysisService, prober: &'a dyn MediaProber) -> Self {
        Self {
            service,
            prober,
            retry: RetryConfig::from(&config.retry),
            wait: UploadWait::from_config(config),
        }
    }

    /// Analyze `media` by uploading `upload_path` and write its sidecar
    pub async fn analyze_file(
        &self,
        media: &Path,
        kind: MediaKind,
        upload_path: &Path,
        progress: &IngestProgress,
        completed: usize,
    ) -> Result<PathBuf> {
        let name = FileManager::display_name(media);
        let service = self.service;

        progress.step(Some(name.clone()), IngestStep::Uploading, completed);
        if upload_path != media {
            debug!("Uploading proxy {} for {}", upload_path.display(), name);
        }
        let uploaded = with_retry(&self.retry, "upload", || service.upload(upload_path)).await?;
        let active = self.wait.wait(service, uploaded).await?;

        progress.step(Some(name.clone()), IngestStep::Analyzing, completed);
        let profile = AnalysisProfile::for_kind(kind);
        let text = with_retry(&self.retry, "analyze", || service.analyze(&active, profile.request())).await?;

        let probe = match kind {
            MediaKind::Video => Some(self.prober.probe(media).await?),
            MediaKind::Audio => None,
        };
        let sidecar = Sidecar::from_analysis(&text, media, kind, service.model(), probe.as_ref())?;
        let path = sidecar.write(media)?;

        info!("Analyzed {} ({} segment(s))", name, sidecar.segments.len());
        Ok(path)
    }
}

/// Configuration errors abort the run; anything else is a per-file error
pub fn is_fatal(error: &anyhow::Error) -> bool {
    error
        .downcast_ref::<IngestError>()
        .map(IngestError::is_fatal)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RemoteError;
    use crate::probe::ProbeInfo;
    use crate::sidecar::sidecar_path;
    use crate::test_support::{FakeAnalysis, FakeProber};
    use tempfile::TempDir;

    fn config() -> Config {
        Config {
            poll_interval_ms: 1,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_writes_sidecar_with_probe_values() {
        let dir = TempDir::new().unwrap();
        let media = dir.path().join("A001.mov");
        std::fs::write(&media, b"v").unwrap();

        let service = FakeAnalysis::default();
        let prober = FakeProber::with_default(ProbeInfo {
            fps: Some(25.0),
            duration: Some(10.0),
            ..Default::default()
        });
        let progress = IngestProgress::new(dir.path(), &Config::default(), 1, 0);
        let stage = AnalyzeStage::new(&config(), &service, &prober);

        let path = stage
            .analyze_file(&media, MediaKind::Video, &media, &progress, 0)
            .await
            .unwrap();
        assert_eq!(path, sidecar_path(&media));

        let sidecar: Sidecar = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(sidecar.analysis_model, "fake-model");
        assert_eq!(sidecar.fps, Some(25.0));
        assert_eq!(sidecar.extra["summary"], "video of A001.mov");
    }

    #[tokio::test]
    async fn test_terminal_error_is_not_fatal() {
        let dir = TempDir::new().unwrap();
        let media = dir.path().join("X.wav");
        std::fs::write(&media, b"a").unwrap();

        let service = FakeAnalysis::default().failing_analyze(["X.wav"]);
        let prober = FakeProber::default();
        let progress = IngestProgress::new(dir.path(), &Config::default(), 1, 0);
        let stage = AnalyzeStage::new(&config(), &service, &prober);

        let err = stage
            .analyze_file(&media, MediaKind::Audio, &media, &progress, 0)
            .await
            .unwrap_err();
        assert!(!is_fatal(&err));
        assert!(matches!(
            err.downcast_ref::<RemoteError>(),
            Some(RemoteError::BadRequest(_))
        ));
        assert!(!sidecar_path(&media).exists());
        assert_eq!(service.uploads().len(), 1);
    }
}
