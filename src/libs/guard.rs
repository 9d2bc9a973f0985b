//! Single-flight guard shared by update and sync operations.
//!
//! Only one network operation may run at a time: a second update check or a
//! push started while a pull is in progress is refused instead of interleaved.
//! The guard hands out an [`OperationTicket`] that releases the slot on drop.

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct OperationGuard {
    current: Arc<Mutex<Option<String>>>,
}

/// Proof that the holder owns the guard. Dropping it frees the slot.
#[derive(Debug)]
pub struct OperationTicket {
    slot: Arc<Mutex<Option<String>>>,
    operation: String,
}

impl OperationGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the guard for `operation`.
    ///
    /// Returns the name of the running operation when the guard is taken.
    pub fn try_acquire(&self, operation: &str) -> Result<OperationTicket, String> {
        let mut current = self.current.lock();
        if let Some(running) = current.as_ref() {
            return Err(running.clone());
        }

        *current = Some(operation.to_string());
        debug!("Operation '{}' started", operation);

        Ok(OperationTicket {
            slot: Arc::clone(&self.current),
            operation: operation.to_string(),
        })
    }

    /// Name of the operation holding the guard, if any.
    pub fn current(&self) -> Option<String> {
        self.current.lock().clone()
    }

    pub fn is_busy(&self) -> bool {
        self.current.lock().is_some()
    }
}

impl OperationTicket {
    pub fn operation(&self) -> &str {
        &self.operation
    }
}

impl Drop for OperationTicket {
    fn drop(&mut self) {
        *self.slot.lock() = None;
        debug!("Operation '{}' finished", self.operation);
    }
}
