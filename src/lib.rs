//! # Resolve Assistant Library
//!
//! Questo è il modulo principale della libreria che espone tutte le API pubbliche.
//!
//! ## Responsabilità:
//! - Ingest di una cartella di footage: transcode, analisi remota, sidecar JSON
//! - Resumability: ogni run tocca solo i file ancora senza sidecar
//! - Assemblaggio deterministico di un edit plan "key moments" dai sidecar
//!
//! ## Architettura dei moduli:
//! - `config`: Gestione configurazione e validazione parametri
//! - `error`: Tipi di errore locali e remoti
//! - `file_manager`: Discovery media e scritture atomiche
//! - `tool_resolver` / `probe` / `transcode`: Tool esterni (ffprobe, transcoder hardware)
//! - `retry` / `remote`: Chiamate al servizio di analisi
//! - `sidecar` / `state`: Artefatti per-file e progress record per-cartella
//! - `ingest`: Orchestratore della pipeline
//! - `key_moments` / `timeline` / `fcp_xml`: Edit plan, consegna all'host di editing, export XML
//! - `progress` / `json_output`: Feedback su terminale e output JSON
//!
//! ## Utilizzo:
//! ```rust,ignore
//! use resolve_assistant::{Config, IngestCoordinator};
//!
//! let report = coordinator.run(&folder, None).await?;
//! println!("{}", report.record.describe());
//! ```

pub mod config;
pub mod error;
pub mod fcp_xml;
pub mod file_manager;
pub mod ingest;
pub mod json_output;
pub mod key_moments;
pub mod probe;
pub mod progress;
pub mod remote;
pub mod retry;
pub mod sidecar;
pub mod state;
pub mod timeline;
pub mod tool_resolver;
pub mod transcode;
pub mod utils;

#[cfg(test)]
mod test_support;

pub use config::Config;
pub use error::{IngestError, RemoteError};
pub use ingest::{IngestCoordinator, IngestReport, PostIngestHook};
pub use key_moments::{assemble, Cut, EditPlan};
pub use sidecar::Sidecar;
pub use state::{ingest_status, ProgressRecord};
pub use timeline::build_key_moments_timeline;
