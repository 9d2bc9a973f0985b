//! Release tool generating `update_manifest.json` for incremental updates.
//!
//! ```text
//! update-manifest --version 1.2.8
//! update-manifest --version 1.2.8 --compare old_manifest.json
//! update-manifest --version 1.2.8 --output dist/update_manifest.json lru_tracker.exe config.json
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use lru_tracker::libs::http::human_readable_size;
use lru_tracker::libs::manifest_builder::{write_manifest, ManifestBuilder, DEFAULT_OUTPUT, DEFAULT_REPO};
use lru_tracker::libs::messages::Message;
use lru_tracker::libs::version::Version;
use lru_tracker::libs::view::View;
use lru_tracker::{msg_info, msg_print, msg_success, msg_warning};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "update-manifest", about = "Generate the update manifest for a release")]
struct Args {
    /// Version number of the release (e.g. 1.2.8)
    #[arg(long, required = true)]
    version: String,

    /// Previous manifest to compare against
    #[arg(long)]
    compare: Option<PathBuf>,

    /// Output file
    #[arg(long, default_value = DEFAULT_OUTPUT)]
    output: PathBuf,

    /// Directory the tracked files are relative to
    #[arg(long, default_value = ".")]
    base_dir: PathBuf,

    /// GitHub repository the release is published in
    #[arg(long, default_value = DEFAULT_REPO)]
    repo: String,

    /// Base URL for file downloads (defaults to the repository's raw URL)
    #[arg(long)]
    download_base: Option<String>,

    /// Size in bytes of the full download the savings are measured against
    #[arg(long)]
    full_size: Option<u64>,

    /// Release notes written into the manifest
    #[arg(long)]
    notes: Option<String>,

    /// Files to track; every file below the base directory when omitted
    files: Vec<String>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .without_time()
        .init();

    let args = Args::parse();
    let version = Version::parse(&args.version).with_context(|| format!("invalid --version '{}'", args.version))?;

    let mut builder = ManifestBuilder::new(version, &args.base_dir).with_repo(&args.repo);
    if let Some(base) = &args.download_base {
        builder = builder.with_download_base(base);
    }
    if let Some(size) = args.full_size {
        builder = builder.with_full_download_size(size);
    }
    if let Some(notes) = &args.notes {
        builder = builder.with_release_notes(notes);
    }

    let files = if args.files.is_empty() {
        builder.auto_detect_files()
    } else {
        args.files.clone()
    };

    let manifest = builder.build(&files)?;
    write_manifest(&manifest, &args.output)?;

    msg_success!(Message::ManifestGenerated(args.output.display().to_string()), true);
    msg_print!(Message::ManifestSummary {
        version: manifest.version.to_string(),
        files: manifest.files.len(),
        size: human_readable_size(manifest.total_size()),
    });
    if let Some(info) = &manifest.incremental_update_info {
        msg_print!(Message::ManifestSavings {
            mb: info.comparison.savings_mb,
            percent: info.comparison.savings_percent,
        });
    }
    View::manifest_files(&manifest).map_err(|e| anyhow::anyhow!(e.to_string()))?;

    if let Some(old) = &args.compare {
        if old.exists() {
            let comparison = builder.compare_with_previous(old, &files)?;
            msg_info!(Message::ManifestComparisonHeader, true);
            View::manifest_comparison(&comparison).map_err(|e| anyhow::anyhow!(e.to_string()))?;
        } else {
            msg_warning!(Message::ManifestPreviousNotFound(old.display().to_string()));
        }
    }

    msg_print!(Message::ManifestNextSteps, true);
    Ok(())
}
