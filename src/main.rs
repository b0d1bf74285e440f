//! # Resolve Assistant - Main Entry Point
//!
//! Questo è il punto di ingresso principale dell'applicazione.
//!
//! ## Responsabilità:
//! - Parsing degli argomenti della command line con `clap`
//! - Inizializzazione del logging con `tracing` (su stderr)
//! - Controlli fatali all'avvio: API key e tool esterni
//! - Costruzione esplicita dei client e avvio del coordinator
//!
//! ## Comandi:
//! - `ingest <cartella>`: analizza i file senza sidecar
//! - `status <cartella>`: stato dell'ultimo ingest
//! - `key-moments <cartella>`: edit plan con un clip per ogni momento chiave
//! - `tools`: verifica dei tool esterni
//!
//! ## Esempio di utilizzo:
//! ```bash
//! resolve-assistant ingest /Volumes/Card01 --workers 2 --build "Day 1 selects"
//! ```

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use resolve_assistant::json_output::JsonMessage;
use resolve_assistant::key_moments::DEFAULT_TIMELINE_NAME;
use resolve_assistant::probe::{FfprobeProber, MediaProber};
use resolve_assistant::remote::GeminiClient;
use resolve_assistant::tool_resolver::ToolPathResolver;
use resolve_assistant::transcode::{AvconvertTranscoder, TranscodeCache, UploadLimits};
use resolve_assistant::{
    build_key_moments_timeline, ingest_status, Config, IngestCoordinator, IngestReport, PostIngestHook,
};

#[derive(Parser)]
#[command(name = "resolve-assistant")]
#[command(about = "Analyze raw footage into per-clip metadata and build key-moment timelines")]
struct Args {
    /// Config file (defaults to ~/.resolve-assistant/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Transcode, upload and analyze every file that has no sidecar yet
    Ingest {
        /// Folder containing the footage
        folder: PathBuf,

        /// Number of parallel hardware transcodes
        #[arg(short, long)]
        workers: Option<usize>,

        /// Build a key-moments timeline with this name when ingest completes
        #[arg(long)]
        build: Option<String>,

        /// Output progress and results as JSON lines
        #[arg(long)]
        json: bool,

        /// Do not draw a progress bar
        #[arg(long)]
        no_progress: bool,
    },

    /// Show the progress record of a folder
    Status {
        folder: PathBuf,

        #[arg(long)]
        json: bool,
    },

    /// Build a timeline with one clip per key moment found in the sidecars
    KeyMoments {
        folder: PathBuf,

        /// Timeline name
        #[arg(short, long, default_value = DEFAULT_TIMELINE_NAME)]
        name: String,

        /// Comma-separated file stems to include, e.g. "A001,A002"
        #[arg(short, long, default_value = "")]
        filter: String,
    },

    /// Check the external tools the pipeline needs
    Tools,
}

/// Builds the key-moments timeline after a successful ingest
struct KeyMomentsHook;

#[async_trait]
impl PostIngestHook for KeyMomentsHook {
    async fn after_ingest(&self, root: &Path, instruction: &str, report: &IngestReport) -> Result<()> {
        info!(
            "Ingest complete ({}/{}), building '{}'",
            report.record.completed, report.record.total, instruction
        );
        let summary = build_key_moments_timeline(root, instruction, "", None).await?;
        info!("{}", summary);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // RUST_LOG wins over --verbose
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = load_config(args.config.as_deref()).await?;

    match args.command {
        Command::Ingest {
            folder,
            workers,
            build,
            json,
            no_progress,
        } => {
            let mut config = config;
            if let Some(workers) = workers {
                config.transcode_workers = workers;
            }
            config.json_output = json;
            config.show_progress = !json && !no_progress;
            config.validate()?;

            match ingest(&folder, config, build).await {
                Ok(report) if !json => {
                    println!("{}", report.record.describe());
                    for error in &report.record.errors {
                        println!("  - {}", error);
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    if json {
                        JsonMessage::error(format!("{:#}", e)).emit();
                    }
                    return Err(e);
                }
            }
        }
        Command::Status { folder, json } => {
            let record = ingest_status(&folder);
            if json {
                println!("{}", serde_json::to_string(&record)?);
            } else {
                match record {
                    Some(record) => {
                        println!("{}", record.describe());
                        for error in &record.errors {
                            println!("  - {}", error);
                        }
                    }
                    None => println!("No ingest has run in {}", folder.display()),
                }
            }
        }
        Command::KeyMoments { folder, name, filter } => {
            let folder = resolve_folder(&folder)?;
            let summary = build_key_moments_timeline(&folder, &name, &filter, None).await?;
            println!("{}", summary);
        }
        Command::Tools => {
            print!("{}", ToolPathResolver::new().get_tools_report(&config));
        }
    }

    Ok(())
}

async fn load_config(path: Option<&Path>) -> Result<Config> {
    match path.map(Path::to_path_buf).or_else(Config::default_path) {
        Some(path) => Config::from_file(&path).await,
        None => Ok(Config::default()),
    }
}

fn resolve_folder(folder: &Path) -> Result<PathBuf> {
    let folder = std::fs::canonicalize(folder)
        .with_context(|| format!("Folder does not exist: {}", folder.display()))?;
    if !folder.is_dir() {
        return Err(anyhow::anyhow!("Not a directory: {}", folder.display()));
    }
    Ok(folder)
}

async fn ingest(folder: &Path, config: Config, build: Option<String>) -> Result<IngestReport> {
    let folder = resolve_folder(folder)?;

    // Fatal configuration checks before any file is touched
    let config = config.with_api_key_from_env()?;
    ToolPathResolver::new().verify_tools(&config)?;

    let config = Arc::new(config);
    let service = Arc::new(GeminiClient::from_config(&config)?);
    let prober: Arc<dyn MediaProber> = Arc::new(FfprobeProber::new(config.ffprobe_path.clone()));
    let transcoder = Arc::new(AvconvertTranscoder::from_config(&config));
    let cache = Arc::new(TranscodeCache::new(
        UploadLimits::from(config.as_ref()),
        prober.clone(),
        transcoder,
    ));

    let mut coordinator = IngestCoordinator::new(config, service, prober, cache);
    if build.is_some() {
        coordinator = coordinator.with_hook(Arc::new(KeyMomentsHook));
    }

    coordinator.run(&folder, build.as_deref()).await
}
