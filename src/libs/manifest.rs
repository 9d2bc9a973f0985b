//! Wire formats published next to each release.
//!
//! Two documents exist. The incremental [`UpdateManifest`] lists every file of
//! a release with its size and SHA-256 digest. The legacy [`VersionDescriptor`]
//! only announces a version and a single download URL.
//!
//! Both are parsed through [`UpdateManifest::from_json`] /
//! [`VersionDescriptor::from_json`], which validate required fields once so
//! downstream code never has to re-check key presence.

use crate::libs::error::{UpdateError, UpdateResult};
use crate::libs::hasher;
use crate::libs::version::Version;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default value of `update_strategy`.
pub const STRATEGY_INCREMENTAL: &str = "incremental";

/// One file of a release.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ManifestEntry {
    /// Size in bytes.
    pub size: u64,
    /// Lowercase hex SHA-256 of the file contents.
    pub sha256: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Download comparison between a full installer and an incremental update.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DownloadComparison {
    pub full_download: u64,
    pub incremental_download: u64,
    pub savings_mb: f64,
    pub savings_percent: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct IncrementalUpdateInfo {
    pub total_files_changed: usize,
    pub total_download_size: u64,
    pub comparison: DownloadComparison,
}

/// Incremental update manifest (tier 1).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct UpdateManifest {
    pub version: Version,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,
    #[serde(default)]
    pub release_notes: String,
    /// Files keyed by relative path. Sorted so serialization is deterministic.
    pub files: BTreeMap<String, ManifestEntry>,
    #[serde(default = "default_strategy")]
    pub update_strategy: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changelog_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incremental_update_info: Option<IncrementalUpdateInfo>,
}

fn default_strategy() -> String {
    STRATEGY_INCREMENTAL.to_string()
}

impl UpdateManifest {
    /// Parses and validates a manifest received from the network.
    ///
    /// Fails with [`UpdateError::MalformedUpdateData`] when the JSON does not
    /// match the format, the version is not `major.minor.patch` or an entry
    /// carries something other than a SHA-256 digest.
    pub fn from_json(body: &str) -> UpdateResult<Self> {
        let manifest: UpdateManifest =
            serde_json::from_str(body).map_err(|e| UpdateError::MalformedUpdateData(format!("update manifest: {}", e)))?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn validate(&self) -> UpdateResult<()> {
        for (path, entry) in &self.files {
            if path.trim().is_empty() {
                return Err(UpdateError::MalformedUpdateData("manifest entry with an empty path".to_string()));
            }
            if !hasher::is_valid_digest(&entry.sha256) {
                return Err(UpdateError::MalformedUpdateData(format!(
                    "manifest entry '{}' has an invalid sha256 '{}'",
                    path, entry.sha256
                )));
            }
        }
        Ok(())
    }

    /// Sum of all entry sizes.
    pub fn total_size(&self) -> u64 {
        self.files.values().map(|entry| entry.size).sum()
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Legacy single-file version descriptor (tier 2).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct VersionDescriptor {
    pub version: String,
    pub download_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_mb: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,
}

impl VersionDescriptor {
    /// Parses a descriptor; `version` must be strict and `download_url` non-empty.
    pub fn from_json(body: &str) -> UpdateResult<Self> {
        let descriptor: VersionDescriptor =
            serde_json::from_str(body).map_err(|e| UpdateError::MalformedUpdateData(format!("version descriptor: {}", e)))?;

        Version::parse(&descriptor.version)
            .map_err(|_| UpdateError::MalformedUpdateData(format!("version descriptor has malformed version '{}'", descriptor.version)))?;

        if descriptor.download_url.trim().is_empty() {
            return Err(UpdateError::MalformedUpdateData("version descriptor has an empty download_url".to_string()));
        }

        Ok(descriptor)
    }
}
