//! Stage A: bounded parallel preparation of pending videos.

use crate::error::IngestError;
use crate::ingest::progress_tracker::IngestProgress;
use crate::state::IngestStep;
use crate::transcode::TranscodeCache;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{Id, JoinSet};
use tracing::{error, info};

/// Prepare every video on a pool of `workers` slots.
///
/// Results are handled in completion order. Returns original → proxy for
/// the videos that need one; a failed transcode is recorded and the video
/// is left out of the map so stage B uploads the original.
pub async fn run(
    cache: Arc<TranscodeCache>,
    videos: &[PathBuf],
    workers: usize,
    progress: &mut IngestProgress,
    completed: usize,
) -> Result<HashMap<PathBuf, PathBuf>, IngestError> {
    let mut proxies = HashMap::new();
    if videos.is_empty() {
        return Ok(proxies);
    }

    let stage_total = videos.len();
    info!("Preparing {} video(s) with {} transcode worker(s)", stage_total, workers);
    progress.step(Some(format!("(0/{} videos)", stage_total)), IngestStep::Transcoding, completed);

    let semaphore = Arc::new(Semaphore::new(workers.max(1)));
    let mut tasks = JoinSet::new();
    // Task id -> video, so a panicked task can still be attributed
    let mut owners: HashMap<Id, PathBuf> = HashMap::new();

    for video in videos.iter().cloned() {
        let semaphore = semaphore.clone();
        let cache = cache.clone();
        let source = video.clone();
        let handle = tasks.spawn(async move {
            match semaphore.acquire_owned().await {
                Ok(_permit) => cache.prepare(&source).await,
                Err(_) => Err(IngestError::Transcode("worker pool closed".into())),
            }
        });
        owners.insert(handle.id(), video);
    }

    let mut done = 0;
    while let Some(joined) = tasks.join_next_with_id().await {
        done += 1;
        let (id, result) = match joined {
            Ok((id, result)) => (id, result),
            Err(e) => (e.id(), Err(IngestError::Transcode(format!("worker task failed: {}", e)))),
        };

        match (owners.remove(&id), result) {
            (None, _) => error!("Transcode task {} finished without a source video", id),
            (Some(video), Ok(prepared)) => {
                if prepared != video {
                    progress.record_transcoded();
                    proxies.insert(video, prepared);
                }
            }
            (Some(video), Err(e)) if e.is_fatal() => {
                error!("Aborting ingest while preparing {}: {}", video.display(), e);
                tasks.abort_all();
                return Err(e);
            }
            (Some(video), Err(e)) => {
                progress.record_transcode_error(&video, &e.to_string());
            }
        }
        progress.step(
            Some(format!("({}/{} videos)", done, stage_total)),
            IngestStep::Transcoding,
            completed,
        );
    }

    Ok(proxies)
}
