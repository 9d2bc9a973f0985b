//! Offline generation of the incremental update manifest.
//!
//! Run by the release tooling (`update-manifest`), never by the installed
//! application. The builder hashes every tracked file below a base directory
//! and records its size and download URL. It can also compare the current tree
//! with a previously published manifest to show what a release changes.

use crate::libs::error::{UpdateError, UpdateResult};
use crate::libs::hasher;
use crate::libs::installer::BACKUP_DIR_PREFIX;
use crate::libs::manifest::{DownloadComparison, IncrementalUpdateInfo, ManifestEntry, UpdateManifest, STRATEGY_INCREMENTAL};
use crate::libs::version::Version;
use chrono::Local;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

pub const DEFAULT_REPO: &str = "HaltTheGrey/lru-tracker";
pub const DEFAULT_OUTPUT: &str = "update_manifest.json";
pub const DEFAULT_RELEASE_NOTES: &str = "See GitHub release for details";
pub const DEFAULT_MINIMUM_VERSION: &str = "1.2.0";
/// Size of the full installer download the savings are measured against.
pub const DEFAULT_FULL_DOWNLOAD_SIZE: u64 = 133_169_152;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// How the current tree differs from a previous manifest.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ManifestComparison {
    pub added: Vec<String>,
    pub modified: Vec<String>,
    pub removed: Vec<String>,
    pub unchanged: Vec<String>,
}

impl ManifestComparison {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.removed.is_empty() && self.unchanged.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct ManifestBuilder {
    version: Version,
    base_dir: PathBuf,
    repo: String,
    download_base: String,
    full_download_size: u64,
    release_notes: String,
    minimum_version: String,
}

impl ManifestBuilder {
    pub fn new(version: Version, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            version,
            base_dir: base_dir.into(),
            repo: DEFAULT_REPO.to_string(),
            download_base: raw_base_for(DEFAULT_REPO),
            full_download_size: DEFAULT_FULL_DOWNLOAD_SIZE,
            release_notes: DEFAULT_RELEASE_NOTES.to_string(),
            minimum_version: DEFAULT_MINIMUM_VERSION.to_string(),
        }
    }

    /// Repository used for the changelog link and the default download base.
    pub fn with_repo(mut self, repo: &str) -> Self {
        self.repo = repo.to_string();
        self.download_base = raw_base_for(repo);
        self
    }

    pub fn with_download_base(mut self, download_base: &str) -> Self {
        let mut base = download_base.to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        self.download_base = base;
        self
    }

    pub fn with_full_download_size(mut self, size: u64) -> Self {
        self.full_download_size = size;
        self
    }

    pub fn with_release_notes(mut self, notes: &str) -> Self {
        self.release_notes = notes.to_string();
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Hashes `files` (relative to the base directory) into a manifest.
    ///
    /// Missing files are skipped with a warning.
    pub fn build(&self, files: &[String]) -> UpdateResult<UpdateManifest> {
        let mut entries = BTreeMap::new();

        for file in files {
            let relative = file.replace('\\', "/");
            let full_path = self.base_dir.join(&relative);

            if !full_path.is_file() {
                warn!("{} not found, skipping", file);
                continue;
            }

            let sha256 = hasher::digest_file(&full_path).map_err(|e| UpdateError::io(&full_path, e))?;
            let size = fs::metadata(&full_path).map_err(|e| UpdateError::io(&full_path, e))?.len();
            let description = Path::new(&relative)
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| relative.clone());

            debug!("{}: {} bytes, {}", relative, size, sha256);
            entries.insert(
                relative.clone(),
                ManifestEntry {
                    size,
                    sha256,
                    download_url: Some(format!("{}{}", self.download_base, relative)),
                    description: Some(description),
                },
            );
        }

        let total_size: u64 = entries.values().map(|e: &ManifestEntry| e.size).sum();

        Ok(UpdateManifest {
            version: self.version.clone(),
            release_date: Some(Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()),
            release_notes: self.release_notes.clone(),
            update_strategy: STRATEGY_INCREMENTAL.to_string(),
            minimum_version: Some(self.minimum_version.clone()),
            changelog_url: Some(format!("https://github.com/{}/releases/tag/v{}", self.repo, self.version)),
            incremental_update_info: Some(IncrementalUpdateInfo {
                total_files_changed: entries.len(),
                total_download_size: total_size,
                comparison: self.comparison(total_size),
            }),
            files: entries,
        })
    }

    fn comparison(&self, incremental: u64) -> DownloadComparison {
        let full = self.full_download_size;
        let savings_percent = if full == 0 {
            0.0
        } else {
            round2((1.0 - incremental as f64 / full as f64) * 100.0)
        };

        DownloadComparison {
            full_download: full,
            incremental_download: incremental,
            savings_mb: round2((full as f64 - incremental as f64) / BYTES_PER_MB),
            savings_percent,
        }
    }

    /// Every regular file below the base directory except hidden entries,
    /// build output, update staging directories and manifests.
    pub fn auto_detect_files(&self) -> Vec<String> {
        let mut files: Vec<String> = WalkDir::new(&self.base_dir)
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_excluded(entry))
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| {
                entry
                    .path()
                    .strip_prefix(&self.base_dir)
                    .ok()
                    .map(|p| p.to_string_lossy().replace('\\', "/"))
            })
            .collect();

        files.sort();
        files
    }

    /// Compares `current_files` with the entries of a previously published manifest.
    ///
    /// A missing previous manifest yields an empty comparison.
    pub fn compare_with_previous(&self, old_manifest_path: &Path, current_files: &[String]) -> UpdateResult<ManifestComparison> {
        if !old_manifest_path.exists() {
            warn!("Previous manifest not found: {}", old_manifest_path.display());
            return Ok(ManifestComparison::default());
        }

        let raw = fs::read_to_string(old_manifest_path).map_err(|e| UpdateError::io(old_manifest_path, e))?;
        let old = UpdateManifest::from_json(&raw)?;

        let mut comparison = ManifestComparison::default();
        let current: Vec<String> = current_files.iter().map(|f| f.replace('\\', "/")).collect();

        for file in &current {
            let full_path = self.base_dir.join(file);
            if !full_path.is_file() {
                continue;
            }

            let digest = hasher::digest_file(&full_path).map_err(|e| UpdateError::io(&full_path, e))?;
            match old.files.get(file) {
                None => comparison.added.push(file.clone()),
                Some(entry) if !hasher::digests_match(&entry.sha256, &digest) => comparison.modified.push(file.clone()),
                Some(_) => comparison.unchanged.push(file.clone()),
            }
        }

        for old_file in old.files.keys() {
            if !current.contains(old_file) {
                comparison.removed.push(old_file.clone());
            }
        }

        Ok(comparison)
    }
}

/// Writes `manifest` as pretty-printed JSON.
pub fn write_manifest(manifest: &UpdateManifest, output: &Path) -> UpdateResult<()> {
    let json = manifest
        .to_json_pretty()
        .map_err(|e| UpdateError::MalformedUpdateData(e.to_string()))?;
    fs::write(output, json).map_err(|e| UpdateError::io(output, e))
}

fn raw_base_for(repo: &str) -> String {
    format!("https://raw.githubusercontent.com/{}/main/", repo)
}

fn is_excluded(entry: &DirEntry) -> bool {
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.')
        || name.starts_with(BACKUP_DIR_PREFIX)
        || (entry.file_type().is_dir() && name == "target")
        || (entry.file_type().is_file() && name == DEFAULT_OUTPUT)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
