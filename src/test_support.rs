//! In-memory stand-ins for the external collaborators, shared by unit tests.

use crate::error::{IngestError, RemoteError};
use crate::file_manager::FileManager;
use crate::probe::{MediaProber, ProbeInfo};
use crate::remote::{AnalysisRequest, AnalysisService, FileState, RemoteFile};
use crate::transcode::Transcoder;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Ordered record of calls shared between fakes
pub type EventLog = Arc<Mutex<Vec<String>>>;

fn log_event(log: &Option<EventLog>, event: String) {
    if let Some(log) = log {
        log.lock().unwrap().push(event);
    }
}

/// Prober answering per file name, with a default for everything else
#[derive(Default)]
pub struct FakeProber {
    info: ProbeInfo,
    by_name: HashMap<String, ProbeInfo>,
    calls: AtomicUsize,
}

impl FakeProber {
    pub fn with_default(info: ProbeInfo) -> Self {
        Self {
            info,
            ..Default::default()
        }
    }

    /// Answer `info` for the file named `name`
    pub fn with_path(mut self, name: &str, info: ProbeInfo) -> Self {
        self.by_name.insert(name.to_string(), info);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaProber for FakeProber {
    async fn probe(&self, path: &Path) -> Result<ProbeInfo, IngestError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let info = self.by_name.get(&FileManager::display_name(path)).unwrap_or(&self.info);
        Ok(info.clone())
    }
}

/// Transcoder that writes a small target file instead of encoding
pub struct FakeTranscoder {
    failing: HashSet<String>,
    panicking: HashSet<String>,
    output_size: usize,
    delay: Duration,
    log: Option<EventLog>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl Default for FakeTranscoder {
    fn default() -> Self {
        Self {
            failing: HashSet::new(),
            panicking: HashSet::new(),
            output_size: 4,
            delay: Duration::ZERO,
            log: None,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }
}

impl FakeTranscoder {
    /// Fails with a non-zero exit for the given source file names
    pub fn failing<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            failing: names.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Panics inside the worker task for the given source file names
    pub fn panicking<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            panicking: names.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn with_output_size(output_size: usize) -> Self {
        Self {
            output_size,
            ..Default::default()
        }
    }

    /// Hold each call open for `delay`
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Log `transcoded <name>` when a call returns
    pub fn with_log(mut self, log: EventLog) -> Self {
        self.log = Some(log);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of calls that were running at the same time
    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transcoder for FakeTranscoder {
    async fn transcode(&self, source: &Path, target: &Path) -> Result<(), IngestError> {
        let name = FileManager::display_name(source);
        self.calls.fetch_add(1, Ordering::SeqCst);
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(running, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        log_event(&self.log, format!("transcoded {}", name));

        if self.panicking.contains(&name) {
            panic!("fake encoder crashed on {}", name);
        }
        if self.failing.contains(&name) {
            return Err(IngestError::Transcode("fake encoder exited with 1".into()));
        }
        tokio::fs::write(target, vec![0u8; self.output_size]).await?;
        Ok(())
    }
}

#[derive(Default)]
struct FakeAnalysisState {
    uploads: Vec<PathBuf>,
    /// Remote name -> uploaded display name
    names: HashMap<String, String>,
    /// Display name -> states returned by successive polls
    poll_states: HashMap<String, VecDeque<FileState>>,
    analyzed: Vec<String>,
}

/// Analysis service answering from memory
///
/// Uploads start in `PROCESSING`; polls return the scripted states for the
/// uploaded display name and `ACTIVE` once the script runs out.
pub struct FakeAnalysis {
    model: String,
    failing_analyze: HashSet<String>,
    log: Option<EventLog>,
    state: Mutex<FakeAnalysisState>,
}

impl Default for FakeAnalysis {
    fn default() -> Self {
        Self {
            model: "fake-model".to_string(),
            failing_analyze: HashSet::new(),
            log: None,
            state: Mutex::new(FakeAnalysisState::default()),
        }
    }
}

impl FakeAnalysis {
    /// Analysis of these display names always fails terminally
    pub fn failing_analyze<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.failing_analyze = names.into_iter().map(Into::into).collect();
        self
    }

    /// Log `upload <name>` on every upload
    pub fn with_log(mut self, log: EventLog) -> Self {
        self.log = Some(log);
        self
    }

    /// Script the poll results for one display name
    pub fn with_poll_states<I>(self, name: &str, states: I) -> Self
    where
        I: IntoIterator<Item = FileState>,
    {
        self.state
            .lock()
            .unwrap()
            .poll_states
            .insert(name.to_string(), states.into_iter().collect());
        self
    }

    pub fn uploads(&self) -> Vec<PathBuf> {
        self.state.lock().unwrap().uploads.clone()
    }

    pub fn analyzed(&self) -> Vec<String> {
        self.state.lock().unwrap().analyzed.clone()
    }

    fn remote_file(name: &str, display_name: &str, state: FileState) -> RemoteFile {
        RemoteFile {
            name: name.to_string(),
            display_name: display_name.to_string(),
            uri: format!("fake://{}", name),
            mime_type: "application/octet-stream".to_string(),
            state,
        }
    }
}

#[async_trait]
impl AnalysisService for FakeAnalysis {
    fn model(&self) -> &str {
        &self.model
    }

    async fn upload(&self, path: &Path) -> Result<RemoteFile, RemoteError> {
        let display_name = FileManager::display_name(path);
        log_event(&self.log, format!("upload {}", display_name));
        let mut state = self.state.lock().unwrap();
        state.uploads.push(path.to_path_buf());
        let name = format!("files/{}", state.uploads.len());
        state.names.insert(name.clone(), display_name.clone());
        Ok(Self::remote_file(&name, &display_name, FileState::Processing))
    }

    async fn get_file(&self, name: &str) -> Result<RemoteFile, RemoteError> {
        let mut state = self.state.lock().unwrap();
        let display_name = state
            .names
            .get(name)
            .cloned()
            .ok_or_else(|| RemoteError::BadRequest(format!("unknown file {}", name)))?;
        let next = state
            .poll_states
            .get_mut(&display_name)
            .and_then(|queue| queue.pop_front())
            .unwrap_or(FileState::Active);
        Ok(Self::remote_file(name, &display_name, next))
    }

    async fn analyze(&self, file: &RemoteFile, request: AnalysisRequest<'_>) -> Result<String, RemoteError> {
        if self.failing_analyze.contains(&file.display_name) {
            return Err(RemoteError::BadRequest("fake analysis rejected the request".into()));
        }
        self.state.lock().unwrap().analyzed.push(file.display_name.clone());
        let kind = if request.high_resolution { "video" } else { "audio" };
        Ok(format!(
            r#"{{"summary": "{} of {}", "segments": [{{"start_sec": 0.0, "end_sec": 2.0, "description": "opening"}}]}}"#,
            kind, file.display_name
        ))
    }
}
