//! # Timeline Module
//!
//! Consegna un edit plan all'applicazione di editing, oppure lo salva come
//! file di interscambio per l'import manuale.
//!
//! ## Responsabilità:
//! - `TimelineSink`: host di editing che accetta una lista di cut
//! - Export FCP7 XML `key-moments-<nome>.xml` per l'import manuale
//! - Copia di riferimento del plan in `.key-moments-<nome>.edl.json`
//! - Operazione "key moments timeline" completa (load, filtro, assemble, consegna)

use crate::fcp_xml;
use crate::file_manager::FileManager;
use crate::key_moments::{assemble, parse_clip_filter, EditPlan};
use crate::sidecar::Sidecar;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Editing host that appends clips to a named timeline
#[async_trait]
pub trait TimelineSink: Send + Sync {
    /// `false` when the host application is not running
    async fn is_available(&self) -> bool;

    /// Append the plan's cuts, returning a short report
    async fn append(&self, plan: &EditPlan) -> Result<String>;
}

/// Timeline names become part of a hidden file name
pub fn safe_name(timeline_name: &str) -> String {
    timeline_name.replace(':', " -").replace(['/', '\\'], "-")
}

/// Location of the saved plan for a timeline
pub fn plan_path(root: &Path, timeline_name: &str) -> PathBuf {
    root.join(format!(".key-moments-{}.edl.json", safe_name(timeline_name)))
}

/// Location of the importable XML for a timeline
pub fn xml_path(root: &Path, timeline_name: &str) -> PathBuf {
    root.join(format!("key-moments-{}.xml", safe_name(timeline_name)))
}

/// Save the plan for reference
pub fn save_plan(root: &Path, plan: &EditPlan) -> Result<PathBuf> {
    let path = plan_path(root, &plan.timeline_name);
    FileManager::write_json_atomic(&path, plan)?;
    Ok(path)
}

/// Render and save the FCP7 XML for manual import
pub fn save_xml(root: &Path, plan: &EditPlan, sidecars: &[Sidecar]) -> Result<PathBuf> {
    let path = xml_path(root, &plan.timeline_name);
    let xml = fcp_xml::render(plan, sidecars)?;
    FileManager::write_atomic(&path, xml.as_bytes())?;
    Ok(path)
}

/// Build a timeline with one clip per key moment found in the folder's sidecars
pub async fn build_key_moments_timeline(
    root: &Path,
    timeline_name: &str,
    clip_filter: &str,
    sink: Option<&dyn TimelineSink>,
) -> Result<String> {
    if !root.is_dir() {
        return Err(anyhow!("'{}' is not a valid directory", root.display()));
    }

    let sidecars = Sidecar::load_all(root)?;
    if sidecars.is_empty() {
        return Err(anyhow!("No sidecar JSONs found in {}. Run ingest first.", root.display()));
    }

    let filter = parse_clip_filter(clip_filter);
    let plan = assemble(&sidecars, timeline_name, filter.as_ref());
    if plan.is_empty() {
        return Err(anyhow!(
            "No segments found in sidecars (filter may have excluded all clips)"
        ));
    }

    let saved = save_plan(root, &plan)?;
    let saved_name = FileManager::display_name(&saved);

    // The XML is a fallback, a failed export never stops the build
    let xml_name = match save_xml(root, &plan, &sidecars) {
        Ok(path) => Some(FileManager::display_name(&path)),
        Err(e) => {
            warn!("XML export failed: {:#}", e);
            None
        }
    };

    let host_message = match sink {
        Some(sink) if sink.is_available().await => match sink.append(&plan).await {
            Ok(message) => message,
            Err(e) => {
                warn!("Timeline build failed in the editing host: {:#}", e);
                let backup = xml_name
                    .map(|name| format!(" Backup XML: {}", name))
                    .unwrap_or_default();
                format!("Editing host build failed ({}).{}", e, backup)
            }
        },
        _ => match xml_name {
            Some(name) => format!("Editing host not running, import XML manually: {}", name),
            None => format!(
                "Editing host not running and XML export failed. Cut list saved to {}.",
                saved_name
            ),
        },
    };

    let clips = sidecars.iter().filter(|s| !s.is_audio()).count();
    let filtered = filter
        .map(|f| format!(" (filtered to {} clips)", f.len()))
        .unwrap_or_default();
    let summary = format!(
        "Key Moments timeline built: {} segments from {} clip(s){}. {}",
        plan.cuts.len(),
        clips,
        filtered,
        host_message
    );
    info!("{}", summary);
    Ok(summary)
}
