//! Applying an update to the install directory.
//!
//! Two strategies exist:
//!
//! - **Incremental** ([`Installer::install_files`]): every changed file is
//!   backed up into a private staging directory, downloaded in place and
//!   verified against its manifest digest. Any failure restores the backups
//!   and removes files that did not exist before, so the installation is left
//!   exactly as it was.
//! - **Single binary** ([`Installer::download_binary`]): the new executable is
//!   downloaded as `<exe>.new` and a helper script is scheduled to swap it in
//!   after exit (see [`crate::libs::self_replace`]).
//!
//! Progress is reported through a plain callback so the installer has no
//! knowledge of how it is displayed.

use crate::libs::config::Packaging;
use crate::libs::context::AppContext;
use crate::libs::diff::{compute_change_set, resolve_entry_path, ChangeSet};
use crate::libs::error::{UpdateError, UpdateResult};
use crate::libs::guard::OperationGuard;
use crate::libs::hasher;
use crate::libs::http::{Http, TransportPolicy, BINARY_DOWNLOAD_TIMEOUT, FILE_DOWNLOAD_TIMEOUT};
use crate::libs::manifest::UpdateManifest;
use crate::libs::self_replace::{schedule_self_replace_recording, staged_binary_path, RestartMode};
use crate::libs::update::{UpdateInfo, UpdatePayload};
use crate::libs::version::{Version, VersionRecord};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, error, info, warn};

/// Prefix of the per-attempt staging directory inside the install directory.
pub const BACKUP_DIR_PREFIX: &str = ".update_backup";

#[derive(Debug, Clone, PartialEq)]
pub enum InstallProgress {
    /// About to fetch file `index` (1-based) of `total`.
    File { index: usize, total: usize, path: String },
    /// Bytes received for the file currently downloading.
    Bytes { downloaded: u64, total: Option<u64> },
}

/// Progress sink handed to the installer.
pub type ProgressFn<'a> = &'a (dyn Fn(InstallProgress) + Send + Sync);

/// Callback that discards progress events.
pub fn no_progress(_: InstallProgress) {}

#[derive(Debug, Clone, PartialEq)]
pub struct InstallReport {
    pub version: Version,
    pub files_updated: Vec<String>,
    pub bytes_downloaded: u64,
    pub restart: RestartMode,
}

/// What a single touched file looked like before the attempt.
struct Touched {
    target: PathBuf,
    backup: Option<PathBuf>,
    /// Outermost directory the download had to create for `target`.
    created_dir: Option<PathBuf>,
}

pub struct Installer {
    http: Http,
    install_dir: PathBuf,
    base_download_url: String,
    packaging: Packaging,
    live_binary: Option<PathBuf>,
    guard: OperationGuard,
}

impl Installer {
    pub fn new(install_dir: impl Into<PathBuf>, base_download_url: &str, policy: TransportPolicy) -> Self {
        Self {
            http: Http::new(policy),
            install_dir: install_dir.into(),
            base_download_url: base_download_url.to_string(),
            packaging: Packaging::MultiFile,
            live_binary: None,
            guard: OperationGuard::new(),
        }
    }

    pub fn from_context(ctx: &AppContext) -> Self {
        let update = ctx.update_config();
        Self {
            http: Http::new(ctx.policy),
            install_dir: ctx.install_dir.clone(),
            base_download_url: update.base_download_url,
            packaging: update.packaging,
            live_binary: None,
            guard: ctx.guard.clone(),
        }
    }

    pub fn with_packaging(mut self, packaging: Packaging) -> Self {
        self.packaging = packaging;
        self
    }

    /// Overrides the executable that a single-binary install replaces.
    pub fn with_live_binary(mut self, path: impl Into<PathBuf>) -> Self {
        self.live_binary = Some(path.into());
        self
    }

    pub fn install_dir(&self) -> &Path {
        &self.install_dir
    }

    /// Installs `info` with the strategy matching its payload and the packaging.
    ///
    /// On `Err` every change has already been rolled back.
    pub async fn install(&self, info: &UpdateInfo, progress: ProgressFn<'_>) -> UpdateResult<InstallReport> {
        let _ticket = self.guard.try_acquire("install").map_err(UpdateError::Busy)?;

        match &info.payload {
            UpdatePayload::Incremental { manifest } => {
                if self.packaging == Packaging::SingleBinary {
                    if let Some(report) = self.install_binary_from_manifest(info, manifest, progress).await? {
                        return Ok(report);
                    }
                }
                let change_set = compute_change_set(manifest, &self.install_dir)?;
                self.install_files(&info.version, change_set, progress).await
            }
            UpdatePayload::SingleFile { download_url, size_mb } => {
                let expected = size_mb.map(|mb| (mb * 1024.0 * 1024.0) as u64);
                let staged = self.download_binary(download_url, expected, None, progress).await?;
                let script = self.schedule_swap(&staged, &info.version)?;
                Ok(InstallReport {
                    version: info.version.clone(),
                    files_updated: vec![self.live_binary()?.display().to_string()],
                    bytes_downloaded: fs::metadata(&staged).map(|m| m.len()).unwrap_or(0),
                    restart: RestartMode::SingleBinary { script },
                })
            }
        }
    }

    /// Single-binary installs take the executable's own manifest entry when the
    /// release lists one, so the download is still digest-checked.
    async fn install_binary_from_manifest(
        &self,
        info: &UpdateInfo,
        manifest: &UpdateManifest,
        progress: ProgressFn<'_>,
    ) -> UpdateResult<Option<InstallReport>> {
        let live = self.live_binary()?;
        let Some(live_name) = live.file_name().map(|n| n.to_string_lossy().to_string()) else {
            return Ok(None);
        };

        let Some((path, entry)) = manifest
            .files
            .iter()
            .find(|(path, _)| path.replace('\\', "/").rsplit('/').next() == Some(live_name.as_str()))
        else {
            debug!("Manifest has no entry for {}, installing file by file", live_name);
            return Ok(None);
        };

        if let Ok(digest) = hasher::digest_file(&live) {
            if hasher::digests_match(&digest, &entry.sha256) {
                debug!("{} already matches the manifest", live_name);
                return Ok(None);
            }
        }

        let url = self.entry_url(path, entry.download_url.as_deref());
        let staged = self.download_binary(&url, Some(entry.size), Some(&entry.sha256), progress).await?;
        let script = self.schedule_swap(&staged, &info.version)?;

        Ok(Some(InstallReport {
            version: info.version.clone(),
            files_updated: vec![path.clone()],
            bytes_downloaded: entry.size,
            restart: RestartMode::SingleBinary { script },
        }))
    }

    /// Downloads and verifies every entry of `change_set` in order.
    pub async fn install_files(&self, version: &Version, change_set: ChangeSet, progress: ProgressFn<'_>) -> UpdateResult<InstallReport> {
        let staging = tempfile::Builder::new()
            .prefix(BACKUP_DIR_PREFIX)
            .tempdir_in(&self.install_dir)
            .map_err(|e| UpdateError::io(&self.install_dir, e))?;

        let mut touched: Vec<Touched> = Vec::new();
        let result = self.apply_change_set(version, &change_set, &staging, &mut touched, progress).await;

        match result {
            Ok(bytes_downloaded) => {
                if let Err(e) = staging.close() {
                    warn!("Could not remove update staging directory: {}", e);
                }
                info!("Installed {} file(s) for version {}", change_set.len(), version);
                Ok(InstallReport {
                    version: version.clone(),
                    files_updated: change_set.paths().into_iter().map(str::to_string).collect(),
                    bytes_downloaded,
                    restart: RestartMode::MultiFile,
                })
            }
            Err(e) => {
                error!("Update failed, rolling back {} file(s): {}", touched.len(), e);
                rollback(&touched);
                if let Err(close_err) = staging.close() {
                    warn!("Could not remove update staging directory: {}", close_err);
                }
                Err(e)
            }
        }
    }

    async fn apply_change_set(
        &self,
        version: &Version,
        change_set: &ChangeSet,
        staging: &TempDir,
        touched: &mut Vec<Touched>,
        progress: ProgressFn<'_>,
    ) -> UpdateResult<u64> {
        let total = change_set.len();
        let mut bytes_downloaded = 0;

        for (index, (path, entry)) in change_set.entries().iter().enumerate() {
            progress(InstallProgress::File {
                index: index + 1,
                total,
                path: path.clone(),
            });

            let target = resolve_entry_path(&self.install_dir, path)?;
            let backup = if target.exists() {
                let backup = resolve_entry_path(staging.path(), path)?;
                if let Some(parent) = backup.parent() {
                    fs::create_dir_all(parent).map_err(|e| UpdateError::io(parent, e))?;
                }
                fs::copy(&target, &backup).map_err(|e| UpdateError::io(&target, e))?;
                Some(backup)
            } else {
                None
            };
            touched.push(Touched {
                target: target.clone(),
                backup,
                created_dir: outermost_missing_dir(&self.install_dir, &target),
            });

            let url = self.entry_url(path, entry.download_url.as_deref());
            let mut on_bytes = |downloaded: u64, total: Option<u64>| progress(InstallProgress::Bytes { downloaded, total });
            bytes_downloaded += self.http.download_to_file(&url, &target, FILE_DOWNLOAD_TIMEOUT, &mut on_bytes).await?;

            let actual = hasher::digest_file(&target).map_err(|e| UpdateError::io(&target, e))?;
            if !hasher::digests_match(&actual, &entry.sha256) {
                return Err(UpdateError::Integrity {
                    path: path.clone(),
                    expected: entry.sha256.clone(),
                    actual,
                });
            }
        }

        VersionRecord::new(&self.install_dir).write(version)?;
        Ok(bytes_downloaded)
    }

    /// Downloads a replacement executable to `<exe>.new`.
    ///
    /// The partial file is removed on any failure, including a digest mismatch
    /// when `expected_sha256` is given.
    pub async fn download_binary(
        &self,
        url: &str,
        expected_size: Option<u64>,
        expected_sha256: Option<&str>,
        progress: ProgressFn<'_>,
    ) -> UpdateResult<PathBuf> {
        let staged = staged_binary_path(&self.live_binary()?);

        let mut on_bytes = |downloaded: u64, total: Option<u64>| {
            progress(InstallProgress::Bytes {
                downloaded,
                total: total.or(expected_size),
            })
        };

        let outcome = async {
            self.http.download_to_file(url, &staged, BINARY_DOWNLOAD_TIMEOUT, &mut on_bytes).await?;
            if let Some(expected) = expected_sha256 {
                let actual = hasher::digest_file(&staged).map_err(|e| UpdateError::io(&staged, e))?;
                if !hasher::digests_match(&actual, expected) {
                    return Err(UpdateError::Integrity {
                        path: staged.display().to_string(),
                        expected: expected.to_string(),
                        actual,
                    });
                }
            }
            Ok(())
        }
        .await;

        if let Err(e) = outcome {
            let _ = fs::remove_file(&staged);
            return Err(e);
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&staged, fs::Permissions::from_mode(0o755)).map_err(|e| UpdateError::io(&staged, e))?;
        }

        info!("Downloaded new executable to {}", staged.display());
        Ok(staged)
    }

    /// Writes the helper script for `staged`; the version record is updated by
    /// the script itself, after the swap succeeded.
    fn schedule_swap(&self, staged: &Path, version: &Version) -> UpdateResult<PathBuf> {
        schedule_self_replace_recording(staged, &VersionRecord::new(&self.install_dir), version).inspect_err(|_| {
            let _ = fs::remove_file(staged);
        })
    }

    fn entry_url(&self, path: &str, download_url: Option<&str>) -> String {
        match download_url {
            Some(url) if !url.is_empty() => url.to_string(),
            _ => format!("{}{}", self.base_download_url, path.replace('\\', "/")),
        }
    }

    fn live_binary(&self) -> UpdateResult<PathBuf> {
        match &self.live_binary {
            Some(path) => Ok(path.clone()),
            None => env::current_exe().map_err(|e| UpdateError::io("current executable", e)),
        }
    }
}

/// Restores every touched file to its pre-update state, newest first.
fn rollback(touched: &[Touched]) {
    for item in touched.iter().rev() {
        let outcome = match &item.backup {
            Some(backup) => fs::copy(backup, &item.target).map(|_| ()),
            None if item.target.exists() => fs::remove_file(&item.target),
            None => Ok(()),
        };
        if let Err(e) = outcome {
            error!("Rollback of {} failed: {}", item.target.display(), e);
        }
    }
    for dir in touched.iter().filter_map(|item| item.created_dir.as_ref()) {
        if dir.exists() {
            if let Err(e) = fs::remove_dir_all(dir) {
                error!("Rollback of directory {} failed: {}", dir.display(), e);
            }
        }
    }
    info!("Update rolled back");
}

/// Highest ancestor of `target` below `root` that does not exist yet.
fn outermost_missing_dir(root: &Path, target: &Path) -> Option<PathBuf> {
    let mut missing = None;
    let mut dir = target.parent();
    while let Some(current) = dir {
        if current == root || !current.starts_with(root) || current.exists() {
            break;
        }
        missing = Some(current.to_path_buf());
        dir = current.parent();
    }
    missing
}
