//! Waiting for an uploaded file to become usable.
//!
//! The service processes uploads asynchronously. The wait is an explicit
//! state machine that only transitions on a poll, sleeps a fixed interval
//! between polls, and gives up after a maximum wait.

use crate::config::Config;
use crate::error::IngestError;
use crate::remote::{AnalysisService, FileState, RemoteFile};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadPhase {
    Submitted,
    Processing,
    Active,
    /// Terminal, carries the state the service reported
    Failed(String),
}

impl UploadPhase {
    /// Transition on one observed service state
    pub fn observe(&self, state: &FileState) -> UploadPhase {
        match (self, state) {
            (UploadPhase::Active, _) | (UploadPhase::Failed(_), _) => self.clone(),
            (_, FileState::Processing) => UploadPhase::Processing,
            (_, FileState::Active) => UploadPhase::Active,
            (_, other) => UploadPhase::Failed(other.to_string()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, UploadPhase::Active | UploadPhase::Failed(_))
    }
}

#[derive(Debug, Clone)]
pub struct UploadWait {
    poll_interval: Duration,
    max_wait: Duration,
}

impl UploadWait {
    pub fn new(poll_interval: Duration, max_wait: Duration) -> Self {
        Self {
            poll_interval,
            max_wait,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.poll_interval(), config.max_upload_wait())
    }

    /// Poll until the file is active; anything else is `UploadState`
    pub async fn wait(&self, service: &dyn AnalysisService, uploaded: RemoteFile) -> Result<RemoteFile, IngestError> {
        let started = Instant::now();
        let mut phase = UploadPhase::Submitted;
        let mut file = uploaded;

        loop {
            phase = phase.observe(&file.state);
            if phase.is_terminal() {
                return match phase {
                    UploadPhase::Failed(state) => Err(IngestError::UploadState(state)),
                    _ => Ok(file),
                };
            }

            if started.elapsed() >= self.max_wait {
                return Err(IngestError::UploadState(file.state.to_string()));
            }

            debug!("{} is {}, polling again", file.display_name, file.state);
            tokio::time::sleep(self.poll_interval).await;
            // Status polls are not retried, a network error fails this file
            file = service.get_file(&file.name).await?;
        }
    }
}
