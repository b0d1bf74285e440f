//! # Tool Path Resolver
//!
//! This module handles finding the external tools the pipeline shells out to:
//! - `ffprobe` for media probing
//! - the hardware transcoder (`avconvert` on macOS by default)
//!
//! A configured absolute path is used as-is; a bare name is searched in `PATH`.
//! A missing tool is a configuration error and aborts the run before any file
//! is touched.

use crate::config::Config;
use crate::error::IngestError;
use std::env;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Resolves external tool locations
pub struct ToolPathResolver {
    search_path: Vec<PathBuf>,
}

impl ToolPathResolver {
    /// Create a resolver over the current `PATH`
    pub fn new() -> Self {
        let search_path = env::var_os("PATH")
            .map(|p| env::split_paths(&p).collect())
            .unwrap_or_default();
        Self::with_search_path(search_path)
    }

    /// Create a resolver over an explicit list of directories
    pub fn with_search_path(search_path: Vec<PathBuf>) -> Self {
        Self { search_path }
    }

    /// Resolve a program given by name or path
    pub fn resolve_tool(&self, program: &Path) -> Option<PathBuf> {
        if program.components().count() > 1 || program.is_absolute() {
            debug!("Checking explicit tool path: {}", program.display());
            return program.is_file().then(|| program.to_path_buf());
        }

        let extension = if cfg!(windows) { ".exe" } else { "" };
        let name = format!("{}{}", program.display(), extension);

        let found = self
            .search_path
            .iter()
            .map(|dir| dir.join(&name))
            .find(|candidate| candidate.is_file());
        debug!("Resolved tool {} -> {:?}", program.display(), found);
        found
    }

    /// Check if a tool is available and provide installation instructions if not
    pub fn check_tool_with_instructions(&self, program: &Path) -> Result<PathBuf, IngestError> {
        self.resolve_tool(program).ok_or_else(|| {
            IngestError::MissingDependency(format!(
                "'{}' not found. {}",
                program.display(),
                install_hint(program)
            ))
        })
    }

    /// Verify every tool the ingest pipeline needs
    pub fn verify_tools(&self, config: &Config) -> Result<(), IngestError> {
        self.check_tool_with_instructions(&config.ffprobe_path)?;
        self.check_tool_with_instructions(&config.transcoder.program)?;
        Ok(())
    }

    /// Get a report of tool availability
    pub fn get_tools_report(&self, config: &Config) -> String {
        let mut report = String::from("External tools:\n");
        for (role, program) in [
            ("probe", &config.ffprobe_path),
            ("transcode", &config.transcoder.program),
        ] {
            match self.check_tool_with_instructions(program) {
                Ok(path) => report.push_str(&format!("  [OK] {:<10} {}\n", role, path.display())),
                Err(e) => report.push_str(&format!("  [MISSING] {:<10} {}\n", role, e)),
            }
        }
        report
    }
}

impl Default for ToolPathResolver {
    fn default() -> Self {
        Self::new()
    }
}

fn install_hint(program: &Path) -> &'static str {
    let name = program
        .file_stem()
        .map(|s| s.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match name.as_str() {
        "ffprobe" | "ffmpeg" if cfg!(target_os = "macos") => "Install with: brew install ffmpeg",
        "ffprobe" | "ffmpeg" => "Install with: sudo apt-get install ffmpeg",
        "avconvert" => "Requires macOS 13+ with the Xcode command-line tools.",
        _ => "Install it or point the config at its absolute path.",
    }
}
