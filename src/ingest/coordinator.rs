//! # Ingest Pipeline Coordinator
//!
//! Orchestratore principale: delega la preparazione dei video allo stage A
//! (pool parallelo limitato) e upload/analisi allo stage B (sequenziale).
//!
//! ## Flusso:
//! 1. `total` = tutti i media della cartella, `already_done` = quelli con sidecar
//! 2. Stage A: transcode dei video pending, in ordine di completamento
//! 3. Barriera: lo stage B parte solo a pool svuotato
//! 4. Stage B: video poi audio, uno alla volta, nell'ordine di discovery
//! 5. Record terminale `complete` con il conteggio pending ricalcolato
//! 6. Hook post-ingest opzionale (il suo fallimento non cambia lo stato)

use crate::config::Config;
use crate::file_manager::{FileManager, MediaKind};
use crate::ingest::analyze_stage::{self, AnalyzeStage};
use crate::ingest::progress_tracker::IngestProgress;
use crate::ingest::transcode_stage;
use crate::probe::MediaProber;
use crate::progress::IngestSummary;
use crate::remote::AnalysisService;
use crate::state::ProgressRecord;
use crate::transcode::TranscodeCache;
use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};

/// Outcome of one ingest run
#[derive(Debug, Clone)]
pub struct IngestReport {
    /// The terminal progress record as written to disk
    pub record: ProgressRecord,
    pub summary: IngestSummary,
}

/// One-shot callback run after the terminal record is written
#[async_trait]
pub trait PostIngestHook: Send + Sync {
    async fn after_ingest(&self, root: &Path, instruction: &str, report: &IngestReport) -> Result<()>;
}

pub struct IngestCoordinator {
    config: Arc<Config>,
    service: Arc<dyn AnalysisService>,
    prober: Arc<dyn MediaProber>,
    cache: Arc<TranscodeCache>,
    hook: Option<Arc<dyn PostIngestHook>>,
}

impl IngestCoordinator {
    pub fn new(
        config: Arc<Config>,
        service: Arc<dyn AnalysisService>,
        prober: Arc<dyn MediaProber>,
        cache: Arc<TranscodeCache>,
    ) -> Self {
        Self {
            config,
            service,
            prober,
            cache,
            hook: None,
        }
    }

    pub fn with_hook(mut self, hook: Arc<dyn PostIngestHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    /// Process every pending file under `root`.
    ///
    /// Only configuration errors are returned; per-file failures end up in
    /// the record's `errors` and the run still completes.
    pub async fn run(&self, root: &Path, build_instruction: Option<&str>) -> Result<IngestReport> {
        let videos = FileManager::list_pending(root, MediaKind::Video)?;
        let audio = FileManager::list_pending(root, MediaKind::Audio)?;
        let pending = videos.len() + audio.len();
        let total = FileManager::count_all(root)?;
        // Two separate walks, the folder may change in between
        let already_done = total.saturating_sub(pending);

        info!(
            "Ingesting {}: {} file(s), {} pending ({} video, {} audio)",
            root.display(),
            total,
            pending,
            videos.len(),
            audio.len()
        );

        let mut progress = IngestProgress::new(root, &self.config, total, already_done);
        progress.start(root, pending, self.service.model());

        let proxies = transcode_stage::run(
            self.cache.clone(),
            &videos,
            self.config.transcode_workers,
            &mut progress,
            already_done,
        )
        .await?;

        let stage = AnalyzeStage::new(&self.config, self.service.as_ref(), self.prober.as_ref());
        let queue = videos
            .iter()
            .map(|p| (p, MediaKind::Video))
            .chain(audio.iter().map(|p| (p, MediaKind::Audio)));

        for (i, (media, kind)) in queue.enumerate() {
            let upload_path = proxies.get(media).unwrap_or(media);
            match stage
                .analyze_file(media, kind, upload_path, &progress, already_done + i)
                .await
            {
                Ok(sidecar) => progress.file_complete(media, &sidecar),
                Err(e) if analyze_stage::is_fatal(&e) => return Err(e),
                Err(e) => progress.record_error(media, &e.to_string()),
            }
        }

        let remaining = FileManager::count_pending(root)?;
        let record = progress.finish(total.saturating_sub(remaining));
        info!("Ingest finished: {}", progress.summary().format_summary());

        let report = IngestReport {
            record,
            summary: progress.summary().clone(),
        };

        if let (Some(hook), Some(instruction)) = (&self.hook, build_instruction) {
            if let Err(e) = hook.after_ingest(root, instruction, &report).await {
                error!("Post-ingest step failed for {}: {:#}", root.display(), e);
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IngestError;
    use crate::probe::ProbeInfo;
    use crate::remote::FileState;
    use crate::sidecar::sidecar_path;
    use crate::state::{ingest_status, RunStatus};
    use crate::test_support::{EventLog, FakeAnalysis, FakeProber, FakeTranscoder};
    use crate::transcode::{proxy_path, UploadLimits};
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;

    fn config() -> Arc<Config> {
        Arc::new(Config {
            poll_interval_ms: 1,
            ..Default::default()
        })
    }

    fn safe_probe() -> ProbeInfo {
        ProbeInfo {
            codec: Some("h264".into()),
            width: Some(1280),
            height: Some(720),
            fps: Some(25.0),
            duration: Some(8.0),
        }
    }

    fn raw_probe() -> ProbeInfo {
        ProbeInfo {
            codec: Some("prores".into()),
            width: Some(3840),
            height: Some(2160),
            ..Default::default()
        }
    }

    struct Harness {
        service: Arc<FakeAnalysis>,
        transcoder: Arc<FakeTranscoder>,
        coordinator: IngestCoordinator,
    }

    fn harness(service: FakeAnalysis, probe: ProbeInfo, transcoder: FakeTranscoder) -> Harness {
        let config = config();
        let service = Arc::new(service);
        let prober: Arc<FakeProber> = Arc::new(FakeProber::with_default(probe));
        let transcoder = Arc::new(transcoder);
        let cache = Arc::new(TranscodeCache::new(
            UploadLimits::from(config.as_ref()),
            prober.clone(),
            transcoder.clone(),
        ));
        let coordinator = IngestCoordinator::new(config, service.clone(), prober, cache);
        Harness {
            service,
            transcoder,
            coordinator,
        }
    }

    fn folder(names: &[&str]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for name in names {
            std::fs::write(dir.path().join(name), b"media").unwrap();
        }
        dir
    }

    fn sidecars(dir: &Path) -> Vec<PathBuf> {
        let mut found: Vec<PathBuf> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| p.to_string_lossy().ends_with(".json") && !p.ends_with(".ingest_progress.json"))
            .collect();
        found.sort();
        found
    }

    #[tokio::test]
    async fn test_full_run_writes_sidecars_and_completes() {
        let dir = folder(&["A001.mov", "B002.mp4", "vo.wav", "notes.txt"]);
        let h = harness(FakeAnalysis::default(), safe_probe(), FakeTranscoder::default());

        let report = h.coordinator.run(dir.path(), None).await.unwrap();

        assert_eq!(report.record.status, RunStatus::Complete);
        assert_eq!(report.record.total, 3);
        assert_eq!(report.record.completed, 3);
        assert!(report.record.errors.is_empty());
        assert_eq!(report.summary.analyzed, 3);
        assert_eq!(sidecars(dir.path()).len(), 3);
        assert_eq!(ingest_status(dir.path()), Some(report.record));

        // Videos first, then audio, each in discovery order
        assert_eq!(h.service.analyzed(), vec!["A001.mov", "B002.mp4", "vo.wav"]);
        assert_eq!(h.transcoder.calls(), 0);
    }

    #[tokio::test]
    async fn test_second_run_is_idempotent() {
        let dir = folder(&["A001.mov", "vo.wav"]);
        let first = harness(FakeAnalysis::default(), safe_probe(), FakeTranscoder::default());
        first.coordinator.run(dir.path(), None).await.unwrap();
        let before: Vec<String> = sidecars(dir.path())
            .iter()
            .map(|p| std::fs::read_to_string(p).unwrap())
            .collect();

        let second = harness(FakeAnalysis::default(), safe_probe(), FakeTranscoder::default());
        let report = second.coordinator.run(dir.path(), None).await.unwrap();

        assert!(second.service.uploads().is_empty());
        assert_eq!(report.record.total, 2);
        assert_eq!(report.record.completed, 2);
        let after: Vec<String> = sidecars(dir.path())
            .iter()
            .map(|p| std::fs::read_to_string(p).unwrap())
            .collect();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_resumes_only_missing_files() {
        let dir = folder(&["A001.mov", "B002.mov", "C003.mov", "D004.mov"]);
        for done in ["A001.mov", "C003.mov"] {
            std::fs::write(sidecar_path(&dir.path().join(done)), br#"{"segments": []}"#).unwrap();
        }
        let h = harness(FakeAnalysis::default(), safe_probe(), FakeTranscoder::default());

        let report = h.coordinator.run(dir.path(), None).await.unwrap();

        assert_eq!(h.service.analyzed(), vec!["B002.mov", "D004.mov"]);
        assert_eq!(report.summary.already_done, 2);
        assert_eq!(report.record.completed, report.record.total);
        assert_eq!(report.record.total, 4);
    }

    #[tokio::test]
    async fn test_one_failing_file_does_not_stop_the_run() {
        let dir = folder(&["A001.mov", "X.mov", "vo.wav"]);
        let h = harness(
            FakeAnalysis::default().failing_analyze(["X.mov"]),
            safe_probe(),
            FakeTranscoder::default(),
        );

        let report = h.coordinator.run(dir.path(), None).await.unwrap();

        assert_eq!(report.record.status, RunStatus::Complete);
        assert_eq!(report.record.errors.len(), 1);
        assert!(report.record.errors[0].starts_with("X.mov: "));
        assert!(sidecar_path(&dir.path().join("A001.mov")).exists());
        assert!(sidecar_path(&dir.path().join("vo.wav")).exists());
        assert!(!sidecar_path(&dir.path().join("X.mov")).exists());
        assert_eq!(report.record.completed, 2);
        assert_eq!(report.record.total, 3);
    }

    #[tokio::test]
    async fn test_upload_state_failure_is_recorded() {
        let dir = folder(&["A001.mov", "B002.mov"]);
        let h = harness(
            FakeAnalysis::default().with_poll_states("B002.mov", [FileState::Failed]),
            safe_probe(),
            FakeTranscoder::default(),
        );

        let report = h.coordinator.run(dir.path(), None).await.unwrap();

        assert_eq!(report.record.errors, vec!["B002.mov: upload state=FAILED".to_string()]);
        assert_eq!(h.service.analyzed(), vec!["A001.mov"]);
    }

    #[tokio::test]
    async fn test_proxy_is_uploaded_in_place_of_original() {
        let dir = folder(&["raw.mov", "vo.wav"]);
        let h = harness(FakeAnalysis::default(), raw_probe(), FakeTranscoder::default());

        let report = h.coordinator.run(dir.path(), None).await.unwrap();

        let raw = dir.path().join("raw.mov");
        assert_eq!(h.service.uploads(), vec![proxy_path(&raw), dir.path().join("vo.wav")]);
        assert_eq!(h.transcoder.calls(), 1);
        assert_eq!(report.summary.transcoded, 1);

        // Sidecar belongs to the original, the proxy is never footage
        let sidecar: crate::sidecar::Sidecar =
            serde_json::from_str(&std::fs::read_to_string(sidecar_path(&raw)).unwrap()).unwrap();
        assert_eq!(sidecar.filename, "raw.mov");
        assert!(!sidecar_path(&proxy_path(&raw)).exists());
        assert_eq!(report.record.total, 2);
    }

    #[tokio::test]
    async fn test_cached_proxy_is_not_transcoded_again() {
        let dir = folder(&["raw.mov"]);
        let raw = dir.path().join("raw.mov");
        std::fs::write(proxy_path(&raw), b"proxy").unwrap();
        let h = harness(FakeAnalysis::default(), raw_probe(), FakeTranscoder::default());

        h.coordinator.run(dir.path(), None).await.unwrap();

        assert_eq!(h.transcoder.calls(), 0);
        assert_eq!(h.service.uploads(), vec![proxy_path(&raw)]);
    }

    #[tokio::test]
    async fn test_uploads_start_after_every_transcode_returned() {
        let dir = folder(&["a.mov", "b.mov", "c.mov", "vo.wav"]);
        let log: EventLog = Arc::new(Mutex::new(Vec::new()));
        let h = harness(
            FakeAnalysis::default().with_log(log.clone()),
            raw_probe(),
            FakeTranscoder::default()
                .with_delay(Duration::from_millis(20))
                .with_log(log.clone()),
        );

        h.coordinator.run(dir.path(), None).await.unwrap();

        let events = log.lock().unwrap().clone();
        let last_transcode = events.iter().rposition(|e| e.starts_with("transcoded ")).unwrap();
        let first_upload = events.iter().position(|e| e.starts_with("upload ")).unwrap();
        assert_eq!(h.transcoder.calls(), 3);
        assert!(last_transcode < first_upload, "{:?}", events);
        assert_eq!(
            &events[first_upload..],
            &["upload a.gemini.mp4", "upload b.gemini.mp4", "upload c.gemini.mp4", "upload vo.wav"]
        );
    }

    #[tokio::test]
    async fn test_files_appearing_during_the_run_do_not_break_counts() {
        // Probing the analyzed video drops new footage into the folder
        struct GrowingProber {
            root: PathBuf,
        }

        #[async_trait]
        impl MediaProber for GrowingProber {
            async fn probe(&self, _path: &Path) -> Result<ProbeInfo, IngestError> {
                for name in ["late1.wav", "late2.wav"] {
                    std::fs::write(self.root.join(name), b"media").unwrap();
                }
                Ok(safe_probe())
            }
        }

        let dir = folder(&["A001.mov"]);
        let config = config();
        let prober: Arc<dyn MediaProber> = Arc::new(GrowingProber {
            root: dir.path().to_path_buf(),
        });
        let cache = Arc::new(TranscodeCache::new(
            UploadLimits::from(config.as_ref()),
            prober.clone(),
            Arc::new(FakeTranscoder::default()),
        ));
        let coordinator = IngestCoordinator::new(config, Arc::new(FakeAnalysis::default()), prober, cache);

        let report = coordinator.run(dir.path(), None).await.unwrap();

        assert_eq!(report.record.status, RunStatus::Complete);
        assert_eq!(report.record.total, 1);
        assert_eq!(report.record.completed, 0);
        assert!(sidecar_path(&dir.path().join("A001.mov")).exists());
    }

    #[tokio::test]
    async fn test_transcode_failure_falls_back_to_original() {
        let dir = folder(&["broken.mov"]);
        let h = harness(
            FakeAnalysis::default(),
            raw_probe(),
            FakeTranscoder::failing(["broken.mov"]),
        );

        let report = h.coordinator.run(dir.path(), None).await.unwrap();

        let original = dir.path().join("broken.mov");
        assert_eq!(h.service.uploads(), vec![original.clone()]);
        assert!(sidecar_path(&original).exists());
        assert_eq!(report.record.errors.len(), 1);
        assert!(report.record.errors[0].starts_with("broken.mov: transcode failed"));
        assert_eq!(report.record.completed, 1);
    }

    #[tokio::test]
    async fn test_orphaned_upload_is_uploaded_again_next_run() {
        let dir = folder(&["A001.mov"]);
        let media = dir.path().join("A001.mov");

        // Upload succeeds, then the run dies before the sidecar exists
        let interrupted = harness(
            FakeAnalysis::default().failing_analyze(["A001.mov"]),
            safe_probe(),
            FakeTranscoder::default(),
        );
        interrupted.coordinator.run(dir.path(), None).await.unwrap();
        assert_eq!(interrupted.service.uploads().len(), 1);
        assert!(!sidecar_path(&media).exists());
        assert_eq!(ingest_status(dir.path()).unwrap().completed, 0);

        let resumed = harness(FakeAnalysis::default(), safe_probe(), FakeTranscoder::default());
        let report = resumed.coordinator.run(dir.path(), None).await.unwrap();

        assert_eq!(resumed.service.uploads(), vec![media.clone()]);
        assert!(sidecar_path(&media).exists());
        assert_eq!(report.record.completed, 1);
        assert!(report.record.errors.is_empty());
    }

    #[tokio::test]
    async fn test_missing_tool_aborts_the_run() {
        struct MissingProber;

        #[async_trait]
        impl MediaProber for MissingProber {
            async fn probe(&self, _path: &Path) -> Result<ProbeInfo, IngestError> {
                Err(IngestError::MissingDependency("ffprobe".into()))
            }
        }

        let dir = folder(&["A001.mov"]);
        let config = config();
        let prober: Arc<dyn MediaProber> = Arc::new(MissingProber);
        let cache = Arc::new(TranscodeCache::new(
            UploadLimits::from(config.as_ref()),
            prober.clone(),
            Arc::new(FakeTranscoder::default()),
        ));
        let coordinator = IngestCoordinator::new(config, Arc::new(FakeAnalysis::default()), prober, cache);

        let err = coordinator.run(dir.path(), None).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<IngestError>(),
            Some(IngestError::MissingDependency(_))
        ));
    }

    struct CountingHook {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl PostIngestHook for CountingHook {
        async fn after_ingest(&self, _root: &Path, instruction: &str, report: &IngestReport) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(instruction, "Day 1 selects");
            assert_eq!(report.record.status, RunStatus::Complete);
            if self.fail {
                anyhow::bail!("editing host exploded");
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_hook_failure_does_not_change_status() {
        let dir = folder(&["A001.mov"]);
        let hook = Arc::new(CountingHook {
            calls: AtomicUsize::new(0),
            fail: true,
        });
        let h = harness(FakeAnalysis::default(), safe_probe(), FakeTranscoder::default());
        let coordinator = h.coordinator.with_hook(hook.clone());

        let report = coordinator.run(dir.path(), Some("Day 1 selects")).await.unwrap();

        assert_eq!(hook.calls.load(Ordering::SeqCst), 1);
        assert_eq!(report.record.status, RunStatus::Complete);
        assert_eq!(ingest_status(dir.path()).unwrap().status, RunStatus::Complete);
    }

    #[tokio::test]
    async fn test_hook_skipped_without_instruction() {
        let dir = folder(&["A001.mov"]);
        let hook = Arc::new(CountingHook {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let h = harness(FakeAnalysis::default(), safe_probe(), FakeTranscoder::default());
        let coordinator = h.coordinator.with_hook(hook.clone());

        coordinator.run(dir.path(), None).await.unwrap();
        assert_eq!(hook.calls.load(Ordering::SeqCst), 0);
    }
}
