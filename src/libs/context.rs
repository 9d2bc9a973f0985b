//! Application context built once at startup and handed to each component.
//!
//! Components never reach for process-wide state on their own: the update
//! client, the installer and the sync orchestrator all receive an
//! [`AppContext`] and share its [`OperationGuard`]. Tests build a context
//! around a temporary directory with [`AppContext::new`].

use crate::libs::config::{Config, SyncConfig, UpdateConfig};
use crate::libs::data_storage::DataStorage;
use crate::libs::guard::OperationGuard;
use crate::libs::http::TransportPolicy;
use crate::libs::version::{Version, VersionRecord};
use anyhow::{Context as _, Result};
use std::env;
use std::path::{Path, PathBuf};

include!(concat!(env!("OUT_DIR"), "/app_metadata.rs"));

#[derive(Debug, Clone)]
pub struct AppContext {
    pub config: Config,
    pub storage: DataStorage,
    pub install_dir: PathBuf,
    /// Baseline for update comparisons.
    pub current_version: String,
    pub guard: OperationGuard,
    pub policy: TransportPolicy,
}

impl AppContext {
    /// Loads configuration from the per-user data directory and resolves the install directory.
    pub fn load() -> Result<Self> {
        let storage = DataStorage::new();
        let config = Config::read_from(&storage)?;

        let install_dir = match config.update.as_ref().and_then(|u| u.install_dir.clone()) {
            Some(dir) => dir,
            None => {
                let exe = env::current_exe().context("cannot locate the running executable")?;
                exe.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."))
            }
        };

        Ok(Self::new(config, storage, install_dir))
    }

    /// Context around explicit locations. The baseline version is the newer of
    /// the version record in `install_dir` and the compiled version, so a record
    /// left behind by an older install never hides a swapped-in binary.
    pub fn new(config: Config, storage: DataStorage, install_dir: impl Into<PathBuf>) -> Self {
        let install_dir = install_dir.into();
        let current_version = baseline_version(VersionRecord::new(&install_dir).read(), APP_METADATA_VERSION);

        Self {
            config,
            storage,
            install_dir,
            current_version,
            guard: OperationGuard::new(),
            policy: TransportPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: TransportPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_current_version(mut self, version: &str) -> Self {
        self.current_version = version.to_string();
        self
    }

    pub fn update_config(&self) -> UpdateConfig {
        self.config.update_or_default()
    }

    pub fn sync_config(&self) -> SyncConfig {
        self.config.sync_or_default()
    }

    pub fn version_record(&self) -> VersionRecord {
        VersionRecord::new(&self.install_dir)
    }

    /// Name of the running application.
    pub fn app_name() -> &'static str {
        APP_METADATA_NAME
    }
}

/// Newer of the recorded version and `compiled`. Malformed values lose.
pub fn baseline_version(recorded: Option<Version>, compiled: &str) -> String {
    match (recorded, Version::parse(compiled).ok()) {
        (Some(recorded), Some(compiled)) => recorded.max(compiled).to_string(),
        (Some(recorded), None) => recorded.to_string(),
        (None, _) => compiled.to_string(),
    }
}
