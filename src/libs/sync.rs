//! Pull/push orchestration for the shared station data.
//!
//! The orchestrator owns the rules around a [`RemoteStore`]:
//!
//! - a pull never silently drops unsaved local edits; the user chooses to
//!   save them first, discard them or cancel
//! - a push over a document someone else changed needs explicit confirmation,
//!   and a confirmed push overwrites the revision the user was shown, not
//!   whatever happens to be there later
//! - a conflict reported by the store is surfaced, never retried
//!
//! Every operation holds the shared [`OperationGuard`], so a pull and a push
//! (or an update install) can never interleave.

use crate::api::{PushOutcome, RemoteStore};
use crate::libs::error::{SyncError, SyncResult};
use crate::libs::guard::OperationGuard;
use crate::libs::local_data::LocalDocument;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncPhase {
    #[default]
    Idle,
    Checking,
    Pulling,
    Pushing,
}

/// Answer to "you have unsaved local changes".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsavedChoice {
    SaveThenPull,
    DiscardAndPull,
    Abort,
}

/// Decisions the orchestrator delegates to the user.
pub trait SyncPrompt {
    fn resolve_unsaved(&self) -> UnsavedChoice;

    /// Whether to overwrite a remote document that changed since the last sync.
    fn confirm_overwrite(&self) -> bool;
}

#[derive(Debug, Clone, PartialEq)]
pub enum PullOutcome {
    Pulled { revision: String },
    NoRemoteData,
    Aborted,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PushResult {
    Pushed { revision: String },
    /// The user chose not to overwrite remote changes.
    Declined,
    /// The store rejected the write because the remote moved again.
    Conflict,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RemoteCheck {
    Missing,
    Changed { revision: String },
    UpToDate,
}

/// Resets the phase to idle when an operation ends, however it ends.
struct PhaseReset(Arc<Mutex<SyncPhase>>);

impl Drop for PhaseReset {
    fn drop(&mut self) {
        *self.0.lock() = SyncPhase::Idle;
    }
}

pub struct SyncOrchestrator<S: RemoteStore> {
    store: S,
    guard: OperationGuard,
    phase: Arc<Mutex<SyncPhase>>,
}

impl<S: RemoteStore> SyncOrchestrator<S> {
    pub fn new(store: S, guard: OperationGuard) -> Self {
        Self {
            store,
            guard,
            phase: Arc::new(Mutex::new(SyncPhase::Idle)),
        }
    }

    pub fn phase(&self) -> SyncPhase {
        *self.phase.lock()
    }

    /// Shared handle for observing the phase from elsewhere.
    pub fn phase_handle(&self) -> Arc<Mutex<SyncPhase>> {
        Arc::clone(&self.phase)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    fn enter(&self, phase: SyncPhase) -> PhaseReset {
        *self.phase.lock() = phase;
        PhaseReset(Arc::clone(&self.phase))
    }

    fn set_phase(&self, phase: SyncPhase) {
        *self.phase.lock() = phase;
    }

    pub async fn pull<L: LocalDocument, P: SyncPrompt>(&mut self, local: &mut L, prompt: &P) -> SyncResult<PullOutcome> {
        let _ticket = self.guard.try_acquire("pull").map_err(SyncError::Busy)?;

        if local.has_unsaved_changes() {
            match prompt.resolve_unsaved() {
                UnsavedChoice::Abort => {
                    debug!("Pull cancelled because of unsaved changes");
                    return Ok(PullOutcome::Aborted);
                }
                UnsavedChoice::SaveThenPull => local.save()?,
                UnsavedChoice::DiscardAndPull => debug!("Discarding unsaved changes before pull"),
            }
        }

        let _reset = self.enter(SyncPhase::Pulling);
        let Some(document) = self.store.pull().await? else {
            info!("No shared data on the remote yet");
            return Ok(PullOutcome::NoRemoteData);
        };

        local.replace(document.content)?;
        Ok(PullOutcome::Pulled {
            revision: document.revision,
        })
    }

    pub async fn push<L: LocalDocument, P: SyncPrompt>(&mut self, local: &L, prompt: &P, message: Option<&str>) -> SyncResult<PushResult> {
        let _ticket = self.guard.try_acquire("push").map_err(SyncError::Busy)?;
        let _reset = self.enter(SyncPhase::Checking);

        let last_known = self.store.cached_revision().map(str::to_string);
        let (changed, remote) = self.store.has_remote_changed(last_known.as_deref()).await?;

        match remote {
            Some(remote) if changed => {
                if !prompt.confirm_overwrite() {
                    return Ok(PushResult::Declined);
                }
                // Overwrite exactly the revision the user agreed to replace.
                self.store.set_cached_revision(Some(remote.revision));
            }
            Some(_) => {}
            None => {
                if last_known.is_some() {
                    warn!("Remote document disappeared, pushing as a new file");
                }
                self.store.set_cached_revision(None);
            }
        }

        self.set_phase(SyncPhase::Pushing);
        match self.store.push(&local.snapshot(), message).await? {
            PushOutcome::Committed { revision } => Ok(PushResult::Pushed { revision }),
            PushOutcome::Conflict => Ok(PushResult::Conflict),
        }
    }

    pub async fn check(&mut self) -> SyncResult<RemoteCheck> {
        let _ticket = self.guard.try_acquire("check").map_err(SyncError::Busy)?;
        let _reset = self.enter(SyncPhase::Checking);

        let last_known = self.store.cached_revision().map(str::to_string);
        match self.store.has_remote_changed(last_known.as_deref()).await? {
            (_, None) => Ok(RemoteCheck::Missing),
            (true, Some(remote)) => Ok(RemoteCheck::Changed { revision: remote.revision }),
            (false, Some(_)) => Ok(RemoteCheck::UpToDate),
        }
    }
}
