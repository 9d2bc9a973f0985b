//! Remote stores for the shared station data.
//!
//! The shared data is a single JSON document kept in a hosted repository.
//! Every version of the document carries an opaque revision tag; a write must
//! name the revision it was based on and is rejected when someone else wrote
//! in between (optimistic concurrency).
//!
//! ## Implementations
//!
//! - [`github::GitHubStore`]: the GitHub contents API
//! - [`memory::MemoryStore`]: an in-process store with the same revision rules
//!
//! ## Usage
//!
//! ```rust,no_run
//! use lru_tracker::api::{github::GitHubStore, RemoteStore};
//! use lru_tracker::libs::{config::SyncConfig, http::TransportPolicy};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = SyncConfig { repo_owner: "HaltTheGrey".into(), repo_name: "lru-data".into(), ..Default::default() };
//! let mut store = GitHubStore::new(&config, None, TransportPolicy::HttpsOnly)?;
//! if let Some(document) = store.pull().await? {
//!     println!("revision {}", document.revision);
//! }
//! # Ok(())
//! # }
//! ```

use crate::libs::error::SyncResult;
use chrono::Local;
use serde_json::Value;
use sysinfo::System;

pub mod github;
pub mod memory;

pub use github::GitHubStore;
pub use memory::MemoryStore;

/// Revision information for the stored document, without its content.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteMetadata {
    pub revision: String,
    pub size: Option<u64>,
}

/// The stored document together with the revision it was read at.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteDocument {
    pub content: Value,
    pub revision: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PushOutcome {
    /// The write was accepted and produced `revision`.
    Committed { revision: String },
    /// The expected revision was stale; nothing was written.
    Conflict,
}

#[allow(async_fn_in_trait)]
pub trait RemoteStore {
    /// Current revision of the stored document, `None` when it does not exist yet.
    async fn read_revision(&self) -> SyncResult<Option<RemoteMetadata>>;

    /// Reads the document and caches its revision.
    async fn pull(&mut self) -> SyncResult<Option<RemoteDocument>>;

    /// Writes `content` on top of the cached revision.
    ///
    /// `message` defaults to [`default_commit_message`].
    async fn push(&mut self, content: &Value, message: Option<&str>) -> SyncResult<PushOutcome>;

    /// Checks that the store is reachable and the credentials work.
    async fn test_connection(&self) -> (bool, String);

    fn cached_revision(&self) -> Option<&str>;

    fn set_cached_revision(&mut self, revision: Option<String>);

    /// Whether the stored document moved past `last_known`.
    ///
    /// A missing document is reported as unchanged; an unknown `last_known`
    /// against an existing document counts as changed.
    async fn has_remote_changed(&self, last_known: Option<&str>) -> SyncResult<(bool, Option<RemoteMetadata>)> {
        let Some(metadata) = self.read_revision().await? else {
            return Ok((false, None));
        };

        let changed = match last_known {
            Some(known) => known != metadata.revision,
            None => true,
        };

        Ok((changed, Some(metadata)))
    }
}

/// `Updated by <host> at <YYYY-mm-dd HH:MM:SS>`.
pub fn default_commit_message() -> String {
    let host = System::host_name().unwrap_or_else(|| "unknown".to_string());
    format!("Updated by {} at {}", host, Local::now().format("%Y-%m-%d %H:%M:%S"))
}

/// First eight characters of a revision, for display.
pub fn short_revision(revision: &str) -> String {
    let short: String = revision.chars().take(8).collect();
    format!("{}...", short)
}
