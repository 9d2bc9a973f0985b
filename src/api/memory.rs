//! In-process [`RemoteStore`] with the same revision rules as the hosted one.
//!
//! Handles created with [`MemoryStore::client`] share one backing document but
//! keep their own cached revision, which makes it easy to play two machines
//! against each other.

use super::{default_commit_message, PushOutcome, RemoteDocument, RemoteMetadata, RemoteStore};
use crate::libs::error::{SyncError, SyncResult};
use crate::libs::hasher;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Default)]
struct Backend {
    document: Option<RemoteDocument>,
    commits: Vec<String>,
    offline: bool,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    backend: Arc<Mutex<Backend>>,
    cached_revision: Option<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Another handle on the same backing document with an empty revision cache.
    pub fn client(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            cached_revision: None,
        }
    }

    /// Simulates a connectivity loss for every handle.
    pub fn set_offline(&self, offline: bool) {
        self.backend.lock().offline = offline;
    }

    /// Commit messages accepted so far, oldest first.
    pub fn commits(&self) -> Vec<String> {
        self.backend.lock().commits.clone()
    }

    /// Current document, bypassing revision bookkeeping.
    pub fn snapshot(&self) -> Option<RemoteDocument> {
        self.backend.lock().document.clone()
    }

    fn check_online(backend: &Backend) -> SyncResult<()> {
        if backend.offline {
            return Err(SyncError::Network("memory store is offline".to_string()));
        }
        Ok(())
    }
}

impl RemoteStore for MemoryStore {
    async fn read_revision(&self) -> SyncResult<Option<RemoteMetadata>> {
        let backend = self.backend.lock();
        Self::check_online(&backend)?;
        Ok(backend.document.as_ref().map(|d| RemoteMetadata {
            revision: d.revision.clone(),
            size: serde_json::to_vec(&d.content).ok().map(|b| b.len() as u64),
        }))
    }

    async fn pull(&mut self) -> SyncResult<Option<RemoteDocument>> {
        let document = {
            let backend = self.backend.lock();
            Self::check_online(&backend)?;
            backend.document.clone()
        };

        if let Some(document) = &document {
            self.cached_revision = Some(document.revision.clone());
        }
        Ok(document)
    }

    async fn push(&mut self, content: &Value, message: Option<&str>) -> SyncResult<PushOutcome> {
        let mut backend = self.backend.lock();
        Self::check_online(&backend)?;

        let current = backend.document.as_ref().map(|d| d.revision.clone());
        if current.as_deref() != self.cached_revision.as_deref() {
            debug!("Rejecting push: expected {:?}, store is at {:?}", self.cached_revision, current);
            return Ok(PushOutcome::Conflict);
        }

        let serialized = serde_json::to_string(content)?;
        let revision = hasher::digest_bytes(format!("{}:{}", backend.commits.len(), serialized).as_bytes());

        backend.document = Some(RemoteDocument {
            content: content.clone(),
            revision: revision.clone(),
        });
        backend.commits.push(message.map(str::to_string).unwrap_or_else(default_commit_message));
        drop(backend);

        self.cached_revision = Some(revision.clone());
        Ok(PushOutcome::Committed { revision })
    }

    async fn test_connection(&self) -> (bool, String) {
        if self.backend.lock().offline {
            (false, "Connection error: memory store is offline".to_string())
        } else {
            (true, "Connected to in-memory store".to_string())
        }
    }

    fn cached_revision(&self) -> Option<&str> {
        self.cached_revision.as_deref()
    }

    fn set_cached_revision(&mut self, revision: Option<String>) {
        self.cached_revision = revision;
    }
}
