//! Single-slot registry of the current scan
//!
//! The slot holds the instance that is running, or the paused successor
//! waiting to be resumed. Every read-modify-write happens under one lock, so
//! the slot is the serialization point between starting scans and scans
//! handing work over to their successors.

use log::debug;
use parking_lot::Mutex;

use crate::error::ScanError;
use crate::lifecycle::ScanLifecycle;
use crate::models::ScanState;

/// Holder of the active scan slot
#[derive(Debug, Default)]
pub struct ScanRegistry {
    slot: Mutex<Option<ScanLifecycle>>,
}

impl ScanRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Put `scan` into the slot, replacing whatever was there
    pub fn set(&self, scan: ScanLifecycle) {
        *self.slot.lock() = Some(scan);
    }

    /// Empty the slot only if it still holds `scan`; returns whether it did
    pub fn clear_if_current(&self, scan: &ScanLifecycle) -> bool {
        let mut slot = self.slot.lock();
        if slot.as_ref().is_some_and(|current| current.same_as(scan)) {
            *slot = None;
            true
        } else {
            false
        }
    }

    /// The slot's instance if it is running
    pub fn get_running_or_null(&self) -> Option<ScanLifecycle> {
        self.slot
            .lock()
            .as_ref()
            .filter(|scan| scan.state() == ScanState::Running)
            .cloned()
    }

    /// The slot's instance in any state
    pub fn current(&self) -> Option<ScanLifecycle> {
        self.slot.lock().clone()
    }

    /// Move `candidate` from idle to running and install it.
    ///
    /// Fails with `AlreadyRunning` when the candidate is not idle or the slot
    /// holds a different instance that is running. An occupant that is only
    /// cancelling is replaced.
    pub(crate) fn claim(&self, candidate: &ScanLifecycle) -> Result<(), ScanError> {
        let mut slot = self.slot.lock();

        if let Some(current) = slot.as_ref() {
            if !current.same_as(candidate) && current.state() == ScanState::Running {
                return Err(ScanError::already_running(current.label()));
            }
        }

        if !candidate.transition(ScanState::Idle, ScanState::Running) {
            return Err(ScanError::already_running(candidate.label()));
        }

        *slot = Some(candidate.clone());
        Ok(())
    }

    /// Hand a paused scan's pending paths to a new successor.
    ///
    /// The successor is installed when `from` still owns the slot or the slot
    /// is empty. Otherwise someone else already claimed the slot, and the
    /// pending paths are given back untouched.
    pub(crate) fn hand_over(
        &self,
        from: &ScanLifecycle,
        pending: Vec<String>,
    ) -> Result<ScanLifecycle, Vec<String>> {
        let mut slot = self.slot.lock();

        let owns_slot = slot.as_ref().is_some_and(|current| current.same_as(from));
        if !owns_slot && slot.is_some() {
            return Err(pending);
        }

        let successor = from.successor(pending);
        debug!(
            "Installing successor #{} in place of #{}",
            successor.id(),
            from.id()
        );
        *slot = Some(successor.clone());
        Ok(successor)
    }
}
