//! Update checking against published release metadata.
//!
//! Two tiers are consulted, in order:
//!
//! 1. **Incremental manifest** (`update_manifest.json`): lists every file of the
//!    release with its digest, enabling a file-level install.
//! 2. **Legacy version descriptor** (`version.json`): announces a version and a
//!    single download URL for the whole executable.
//!
//! Any failure of tier 1 (network, bad JSON, bad version) is logged and the
//! check falls through to tier 2, except a refused transport: a manifest URL
//! that redirects to plaintext ends the check. A well-formed tier-1 manifest is
//! authoritative: when it is not newer than the running version, tier 2 is not
//! consulted.
//!
//! Both URLs are validated against the [`TransportPolicy`] before any request
//! is made, and every redirect hop is validated again by the HTTP client.

use crate::libs::context::AppContext;
use crate::libs::error::{UpdateError, UpdateResult};
use crate::libs::guard::OperationGuard;
use crate::libs::http::{Http, TransportPolicy, MANIFEST_TIMEOUT};
use crate::libs::manifest::{UpdateManifest, VersionDescriptor};
use crate::libs::version::{is_newer, Version};
use tracing::{debug, info, warn};

/// Which publication format an update came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateTier {
    Incremental,
    SingleFile,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UpdatePayload {
    Incremental { manifest: UpdateManifest },
    SingleFile { download_url: String, size_mb: Option<f64> },
}

/// An available update.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateInfo {
    pub version: Version,
    pub release_notes: String,
    pub release_date: Option<String>,
    pub payload: UpdatePayload,
}

impl UpdateInfo {
    pub fn tier(&self) -> UpdateTier {
        match self.payload {
            UpdatePayload::Incremental { .. } => UpdateTier::Incremental,
            UpdatePayload::SingleFile { .. } => UpdateTier::SingleFile,
        }
    }

    fn from_manifest(manifest: UpdateManifest) -> Self {
        Self {
            version: manifest.version.clone(),
            release_notes: manifest.release_notes.clone(),
            release_date: manifest.release_date.clone(),
            payload: UpdatePayload::Incremental { manifest },
        }
    }

    fn from_descriptor(descriptor: VersionDescriptor) -> UpdateResult<Self> {
        Ok(Self {
            version: Version::parse(&descriptor.version)
                .map_err(|_| UpdateError::MalformedUpdateData(format!("malformed version '{}'", descriptor.version)))?,
            release_notes: descriptor.release_notes.unwrap_or_default(),
            release_date: descriptor.release_date,
            payload: UpdatePayload::SingleFile {
                download_url: descriptor.download_url,
                size_mb: descriptor.size_mb,
            },
        })
    }
}

pub struct UpdateClient {
    http: Http,
    manifest_url: String,
    version_url: String,
    guard: OperationGuard,
}

impl UpdateClient {
    pub fn new(manifest_url: &str, version_url: &str, policy: TransportPolicy) -> Self {
        Self {
            http: Http::new(policy),
            manifest_url: manifest_url.to_string(),
            version_url: version_url.to_string(),
            guard: OperationGuard::new(),
        }
    }

    pub fn from_context(ctx: &AppContext) -> Self {
        let update = ctx.update_config();
        Self {
            http: Http::new(ctx.policy),
            manifest_url: update.manifest_url,
            version_url: update.version_url,
            guard: ctx.guard.clone(),
        }
    }

    pub fn with_guard(mut self, guard: OperationGuard) -> Self {
        self.guard = guard;
        self
    }

    /// Checks whether a release newer than `current` is published.
    ///
    /// Returns `Ok(None)` when up to date (including when `current` itself is
    /// malformed).
    pub async fn check_for_updates(&self, current: &str) -> UpdateResult<Option<UpdateInfo>> {
        self.http.policy().ensure(&self.manifest_url)?;
        self.http.policy().ensure(&self.version_url)?;

        let _ticket = self.guard.try_acquire("update check").map_err(UpdateError::Busy)?;

        match self.fetch_manifest().await {
            Ok(manifest) => {
                debug!("Incremental manifest announces {}", manifest.version);
                if is_newer(&manifest.version.to_string(), current) {
                    info!("Update {} available (incremental)", manifest.version);
                    return Ok(Some(UpdateInfo::from_manifest(manifest)));
                }
                return Ok(None);
            }
            Err(e @ UpdateError::InsecureTransport(_)) => return Err(e),
            Err(e) => {
                warn!("Incremental manifest unavailable, falling back to version descriptor: {}", e);
            }
        }

        let descriptor = self.fetch_descriptor().await?;
        if is_newer(&descriptor.version, current) {
            info!("Update {} available (single file)", descriptor.version);
            return Ok(Some(UpdateInfo::from_descriptor(descriptor)?));
        }

        Ok(None)
    }

    async fn fetch_manifest(&self) -> UpdateResult<UpdateManifest> {
        let body = self.http.get_text(&self.manifest_url, MANIFEST_TIMEOUT).await?;
        UpdateManifest::from_json(&body)
    }

    async fn fetch_descriptor(&self) -> UpdateResult<VersionDescriptor> {
        let body = self.http.get_text(&self.version_url, MANIFEST_TIMEOUT).await?;
        VersionDescriptor::from_json(&body)
    }
}

/// What the user is told after a check.
#[derive(Debug)]
pub enum UpdateCheck {
    Available(UpdateInfo),
    UpToDate,
    Offline(String),
    BadServerData(String),
    Insecure(String),
    Busy(String),
}

impl UpdateCheck {
    pub fn from_result(result: UpdateResult<Option<UpdateInfo>>) -> Self {
        match result {
            Ok(Some(info)) => UpdateCheck::Available(info),
            Ok(None) => UpdateCheck::UpToDate,
            Err(UpdateError::Network(e)) => UpdateCheck::Offline(e),
            Err(UpdateError::InsecureTransport(url)) => UpdateCheck::Insecure(url),
            Err(UpdateError::Busy(op)) => UpdateCheck::Busy(op),
            Err(e) => UpdateCheck::BadServerData(e.to_string()),
        }
    }
}
