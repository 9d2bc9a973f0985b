//! Configuration management for lru-tracker.
//!
//! The configuration is a JSON document (`config.json`) stored in the per-user
//! data directory resolved by [`DataStorage`]. It has two optional sections:
//!
//! - **update**: where release manifests and files are published, and how the
//!   application is packaged on this machine
//! - **sync**: the GitHub repository and file that hold the shared station data
//!
//! Missing sections fall back to defaults that point at the application's own
//! public repository, so a fresh installation can check for updates without
//! running `lru-tracker init` first.
//!
//! ## Storage and Security
//!
//! The GitHub access token is never written to this file. It is read from the
//! `LRU_TRACKER_GITHUB_TOKEN` environment variable or from the encrypted secret
//! written by `lru-tracker sync login` (see [`crate::libs::secret`]).
//!
//! ## Usage
//!
//! ```rust,no_run
//! use lru_tracker::libs::config::Config;
//!
//! let config = Config::read()?;
//! let update = config.update_or_default();
//! println!("Manifest: {}", update.manifest_url);
//! # Ok::<(), anyhow::Error>(())
//! ```

use super::data_storage::DataStorage;
use crate::libs::messages::Message;
use crate::msg_print;
use anyhow::Result;
use chrono::{DateTime, Local};
use dialoguer::{theme::ColorfulTheme, Input, MultiSelect, Select};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::path::PathBuf;

pub const CONFIG_FILE_NAME: &str = "config.json";

/// File holding the last known remote revision between runs.
pub const SYNC_STATE_FILE_NAME: &str = "sync_state.json";

pub const DEFAULT_VERSION_URL: &str = "https://raw.githubusercontent.com/HaltTheGrey/lru-tracker/main/version.json";
pub const DEFAULT_MANIFEST_URL: &str = "https://raw.githubusercontent.com/HaltTheGrey/lru-tracker/main/update_manifest.json";
pub const DEFAULT_BASE_DOWNLOAD_URL: &str = "https://raw.githubusercontent.com/HaltTheGrey/lru-tracker/main/";
pub const DEFAULT_API_BASE: &str = "https://api.github.com";
pub const DEFAULT_DATA_FILE_PATH: &str = "shared_data/lru_data.json";
pub const DEFAULT_BRANCH: &str = "main";
pub const DEFAULT_LOCAL_DATA_FILE: &str = "lru_data.json";

/// A section offered by the setup wizard.
#[derive(Debug, Clone)]
pub struct ConfigModule {
    pub key: String,
    pub name: String,
}

/// How the application is laid out on disk, which decides the restart path after an install.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Packaging {
    /// One self-contained executable; replaced through a helper script after exit.
    #[default]
    SingleBinary,
    /// An interpreter or launcher plus loose files; restarted by re-spawning the process.
    MultiFile,
}

/// Where releases are published.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct UpdateConfig {
    /// Incremental manifest (tier 1).
    pub manifest_url: String,
    /// Legacy version descriptor (tier 2).
    pub version_url: String,
    /// Prefix for manifest entries without their own `download_url`.
    pub base_download_url: String,
    /// Directory holding the installed files. Defaults to the executable's directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_dir: Option<PathBuf>,
    #[serde(default)]
    pub packaging: Packaging,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        UpdateConfig {
            manifest_url: DEFAULT_MANIFEST_URL.to_string(),
            version_url: DEFAULT_VERSION_URL.to_string(),
            base_download_url: DEFAULT_BASE_DOWNLOAD_URL.to_string(),
            install_dir: None,
            packaging: Packaging::default(),
        }
    }
}

impl UpdateConfig {
    /// Manifest URL published next to a version descriptor.
    pub fn manifest_url_for(version_url: &str) -> String {
        version_url.replace("version.json", "update_manifest.json")
    }
}

/// Where the shared station data lives.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SyncConfig {
    pub repo_owner: String,
    pub repo_name: String,
    #[serde(default = "default_data_file_path")]
    pub data_file_path: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    /// Local JSON file the shared data is pulled into and pushed from.
    #[serde(default = "default_local_data_file")]
    pub local_data_file: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

fn default_data_file_path() -> String {
    DEFAULT_DATA_FILE_PATH.to_string()
}

fn default_branch() -> String {
    DEFAULT_BRANCH.to_string()
}

fn default_local_data_file() -> String {
    DEFAULT_LOCAL_DATA_FILE.to_string()
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            repo_owner: String::new(),
            repo_name: String::new(),
            data_file_path: default_data_file_path(),
            branch: default_branch(),
            local_data_file: default_local_data_file(),
            api_base: default_api_base(),
        }
    }
}

impl SyncConfig {
    pub fn is_configured(&self) -> bool {
        !self.repo_owner.trim().is_empty() && !self.repo_name.trim().is_empty()
    }

    /// `owner/name`.
    pub fn repo(&self) -> String {
        format!("{}/{}", self.repo_owner, self.repo_name)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update: Option<UpdateConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync: Option<SyncConfig>,
}

impl Config {
    /// Reads `config.json` from the per-user data directory.
    ///
    /// A missing file is not an error and yields the default configuration.
    pub fn read() -> Result<Config> {
        Self::read_from(&DataStorage::new())
    }

    pub fn read_from(storage: &DataStorage) -> Result<Config> {
        let config_file_path = storage.get_path(CONFIG_FILE_NAME)?;

        if !config_file_path.exists() {
            return Ok(Config::default());
        }

        let config_str = fs::read_to_string(config_file_path)?;
        let config: Config = serde_json::from_str(&config_str)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&DataStorage::new())
    }

    pub fn save_to(&self, storage: &DataStorage) -> Result<()> {
        let config_file_path = storage.get_path(CONFIG_FILE_NAME)?;
        let config_file = File::create(config_file_path)?;
        serde_json::to_writer_pretty(&config_file, &self)?;
        Ok(())
    }

    pub fn update_or_default(&self) -> UpdateConfig {
        self.update.clone().unwrap_or_default()
    }

    pub fn sync_or_default(&self) -> SyncConfig {
        self.sync.clone().unwrap_or_default()
    }

    /// Interactive setup wizard.
    ///
    /// Existing values are offered as defaults, so running the wizard twice
    /// only changes what the user edits.
    pub fn init() -> Result<Self> {
        let mut config = Self::read().unwrap_or_default();

        let modules = vec![
            ConfigModule {
                key: "update".to_string(),
                name: "Updates".to_string(),
            },
            ConfigModule {
                key: "sync".to_string(),
                name: "Shared data (GitHub)".to_string(),
            },
        ];

        let selected = MultiSelect::with_theme(&ColorfulTheme::default())
            .with_prompt(Message::PromptSelectModules.to_string())
            .items(&modules.iter().map(|module| &module.name).collect::<Vec<_>>())
            .interact()?;

        for &selection in &selected {
            match modules[selection].key.as_str() {
                "update" => {
                    let default = config.update_or_default();
                    msg_print!(Message::ConfigModuleUpdate);

                    let version_url: String = Input::with_theme(&ColorfulTheme::default())
                        .with_prompt(Message::PromptVersionUrl.to_string())
                        .default(default.version_url.clone())
                        .interact_text()?;

                    let manifest_default = if version_url == default.version_url {
                        default.manifest_url.clone()
                    } else {
                        UpdateConfig::manifest_url_for(&version_url)
                    };

                    let manifest_url: String = Input::with_theme(&ColorfulTheme::default())
                        .with_prompt(Message::PromptManifestUrl.to_string())
                        .default(manifest_default)
                        .interact_text()?;

                    let base_download_url: String = Input::with_theme(&ColorfulTheme::default())
                        .with_prompt(Message::PromptBaseDownloadUrl.to_string())
                        .default(default.base_download_url.clone())
                        .interact_text()?;

                    let packaging_options = [Packaging::SingleBinary, Packaging::MultiFile];
                    let packaging_index = Select::with_theme(&ColorfulTheme::default())
                        .with_prompt(Message::PromptPackaging.to_string())
                        .items(&[Message::PackagingSingleBinary.to_string(), Message::PackagingMultiFile.to_string()])
                        .default(packaging_options.iter().position(|p| *p == default.packaging).unwrap_or(0))
                        .interact()?;

                    config.update = Some(UpdateConfig {
                        manifest_url,
                        version_url,
                        base_download_url,
                        install_dir: default.install_dir,
                        packaging: packaging_options[packaging_index],
                    });
                }
                "sync" => {
                    let default = config.sync_or_default();
                    msg_print!(Message::ConfigModuleSync);
                    config.sync = Some(SyncConfig {
                        repo_owner: Input::with_theme(&ColorfulTheme::default())
                            .with_prompt(Message::PromptRepoOwner.to_string())
                            .default(default.repo_owner)
                            .interact_text()?,
                        repo_name: Input::with_theme(&ColorfulTheme::default())
                            .with_prompt(Message::PromptRepoName.to_string())
                            .default(default.repo_name)
                            .interact_text()?,
                        data_file_path: Input::with_theme(&ColorfulTheme::default())
                            .with_prompt(Message::PromptDataFilePath.to_string())
                            .default(default.data_file_path)
                            .interact_text()?,
                        branch: Input::with_theme(&ColorfulTheme::default())
                            .with_prompt(Message::PromptBranch.to_string())
                            .default(default.branch)
                            .interact_text()?,
                        local_data_file: Input::with_theme(&ColorfulTheme::default())
                            .with_prompt(Message::PromptLocalDataFile.to_string())
                            .default(default.local_data_file)
                            .interact_text()?,
                        api_base: default.api_base,
                    });
                }
                _ => {}
            }
        }

        Ok(config)
    }
}

/// Sync bookkeeping kept between runs: the last revision seen and when.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct SyncRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_revision: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync: Option<DateTime<Local>>,
}

impl SyncRecord {
    pub fn read_from(storage: &DataStorage) -> Result<Self> {
        let path = storage.get_path(SYNC_STATE_FILE_NAME)?;
        if !path.exists() {
            return Ok(SyncRecord::default());
        }
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save_to(&self, storage: &DataStorage) -> Result<()> {
        let path = storage.get_path(SYNC_STATE_FILE_NAME)?;
        let file = File::create(path)?;
        serde_json::to_writer_pretty(&file, &self)?;
        Ok(())
    }

    /// Records a successful exchange with the remote store.
    pub fn record(&mut self, revision: Option<String>) {
        if revision.is_some() {
            self.last_revision = revision;
        }
        self.last_sync = Some(Local::now());
    }
}
