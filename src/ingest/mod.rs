//! # Ingest Module
//!
//! Pipeline di ingest di una cartella di footage.
//!
//! ## Moduli:
//! - `coordinator`: Orchestratore dei due stage e hook post-ingest
//! - `transcode_stage`: Stage A, preparazione video su pool limitato
//! - `analyze_stage`: Stage B, upload + analisi sequenziali
//! - `upload_wait`: Attesa a stati dell'elaborazione remota dell'upload
//! - `progress_tracker`: Progress record, progress bar ed eventi JSON

pub mod analyze_stage;
pub mod coordinator;
pub mod progress_tracker;
pub mod transcode_stage;
pub mod upload_wait;

pub use coordinator::{IngestCoordinator, IngestReport, PostIngestHook};
pub use upload_wait::{UploadPhase, UploadWait};
