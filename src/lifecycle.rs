//! Background scan lifecycle: start, cancel or pause, resume, complete
//!
//! A [`ScanLifecycle`] runs one [`RecursiveWalker`] pass on its own thread.
//! Cancelling with a collector pauses it: the unvisited paths are handed to a
//! fresh idle successor installed in the [`ScanRegistry`], and calling
//! [`ScanLifecycle::resume_if_necessary`] on that successor continues the
//! work. A chain of such instances makes up one logical scan.

use log::{info, warn};
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;

use crate::error::ScanError;
use crate::filter::ImageFilter;
use crate::indexer::FolderIndexer;
use crate::models::{ScanOutcome, ScanProgress, ScanState};
use crate::progress::{ProgressObserver, ScanStatistics};
use crate::registry::ScanRegistry;
use crate::scanner::{CancelSignal, RecursiveWalker};

static NEXT_SCAN_ID: AtomicU64 = AtomicU64::new(1);

struct Inner {
    id: u64,
    label: String,
    /// The registry owns the instance through its slot, not the reverse
    registry: Weak<ScanRegistry>,
    indexer: Arc<dyn FolderIndexer>,
    filter: ImageFilter,
    state: AtomicU8,
    signal: CancelSignal,
    stats: ScanStatistics,
    /// Paths carried over from a paused predecessor
    inherited: Mutex<Option<Vec<String>>>,
    /// Paths kept after a pause whose successor could not be installed
    retained: Mutex<Option<Vec<String>>>,
    observer: Mutex<Option<Arc<dyn ProgressObserver>>>,
    outcome: Mutex<Option<ScanOutcome>>,
    settled: Condvar,
}

/// Handle to one scan instance; clones refer to the same instance
#[derive(Clone)]
pub struct ScanLifecycle {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for ScanLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanLifecycle")
            .field("id", &self.inner.id)
            .field("label", &self.inner.label)
            .field("state", &self.state())
            .finish()
    }
}

impl ScanLifecycle {
    /// Create an idle scan
    pub fn new(
        registry: Arc<ScanRegistry>,
        indexer: Arc<dyn FolderIndexer>,
        filter: ImageFilter,
        label: impl Into<String>,
    ) -> Self {
        Self::with_inherited(Arc::downgrade(&registry), indexer, filter, label.into(), None)
    }

    fn with_inherited(
        registry: Weak<ScanRegistry>,
        indexer: Arc<dyn FolderIndexer>,
        filter: ImageFilter,
        label: String,
        inherited: Option<Vec<String>>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                id: NEXT_SCAN_ID.fetch_add(1, Ordering::Relaxed),
                label,
                registry,
                indexer,
                filter,
                state: AtomicU8::new(ScanState::Idle.as_u8()),
                signal: CancelSignal::new(),
                stats: ScanStatistics::new(),
                inherited: Mutex::new(inherited),
                retained: Mutex::new(None),
                observer: Mutex::new(None),
                outcome: Mutex::new(None),
                settled: Condvar::new(),
            }),
        }
    }

    /// Idle instance that will continue `pending` when resumed
    pub(crate) fn successor(&self, pending: Vec<String>) -> Self {
        Self::with_inherited(
            Weak::clone(&self.inner.registry),
            Arc::clone(&self.inner.indexer),
            self.inner.filter.clone(),
            format!("resumed {}", self.inner.label),
            Some(pending),
        )
    }

    /// The running scan in `registry`, if any
    pub fn active(registry: &ScanRegistry) -> Option<ScanLifecycle> {
        registry.get_running_or_null()
    }

    /// Process-unique id of this instance
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Why this scan was started
    pub fn label(&self) -> &str {
        &self.inner.label
    }

    /// Current lifecycle state
    pub fn state(&self) -> ScanState {
        ScanState::from_u8(self.inner.state.load(Ordering::SeqCst))
    }

    /// Whether both handles refer to the same instance
    pub fn same_as(&self, other: &ScanLifecycle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn registry(&self) -> Result<Arc<ScanRegistry>, ScanError> {
        self.inner
            .registry
            .upgrade()
            .ok_or_else(|| ScanError::registry_dropped(&self.inner.label))
    }

    pub(crate) fn transition(&self, from: ScanState, to: ScanState) -> bool {
        self.inner
            .state
            .compare_exchange(from.as_u8(), to.as_u8(), Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Start walking `request` on a background thread
    pub fn start(&self, request: Vec<String>) -> Result<(), ScanError> {
        self.registry()?.claim(self)?;
        self.spawn_walk(request)
    }

    /// Start and block until the scan settles; returns the change count
    pub fn run_blocking(&self, request: Vec<String>) -> Result<u64, ScanError> {
        self.start(request)?;
        Ok(self.wait().map(|outcome| outcome.changed).unwrap_or(0))
    }

    /// Start an idle successor on the paths inherited from its predecessor.
    ///
    /// Returns `Ok(false)` without effect when there is nothing to resume.
    pub fn resume_if_necessary(&self) -> Result<bool, ScanError> {
        let mut inherited = self.inner.inherited.lock();
        if self.state() != ScanState::Idle || inherited.is_none() {
            return Ok(false);
        }

        self.registry()?.claim(self)?;
        let request = inherited.take().unwrap_or_default();
        drop(inherited);

        self.spawn_walk(request)?;
        Ok(true)
    }

    fn spawn_walk(&self, request: Vec<String>) -> Result<(), ScanError> {
        info!(
            "Scan '{}' (#{}) started with {} path(s)",
            self.inner.label,
            self.inner.id,
            request.len()
        );

        let scan = self.clone();
        let spawned = thread::Builder::new()
            .name(format!("media-rescan-{}", self.inner.id))
            .spawn(move || {
                let changed = scan.walk(&request);
                scan.finish(changed);
            });

        if let Err(e) = spawned {
            if let Some(registry) = self.inner.registry.upgrade() {
                registry.clear_if_current(self);
            }
            self.publish(ScanOutcome {
                changed: 0,
                state: ScanState::Completed,
                cancelled: false,
            });
            return Err(ScanError::io_error(None, e.to_string()));
        }
        Ok(())
    }

    fn walk(&self, request: &[String]) -> u64 {
        let inner = &self.inner;
        RecursiveWalker::new(inner.indexer.as_ref(), &inner.filter, &inner.signal, &inner.stats)
            .walk(request)
    }

    /// Ask the walker to stop.
    ///
    /// With `Some(collector)` the scan pauses: unvisited paths are appended to
    /// the collector and carried to a successor. With `None` it stops for
    /// good. Only the first request on a running scan has an effect.
    pub fn request_cancel(&self, collector: Option<Vec<String>>) -> bool {
        if !self.transition(ScanState::Running, ScanState::CancelRequested) {
            return false;
        }
        let pausing = collector.is_some();
        self.inner.signal.cancel(collector);
        info!(
            "Scan '{}' (#{}) {} requested",
            self.inner.label,
            self.inner.id,
            if pausing { "pause" } else { "cancel" }
        );
        true
    }

    /// Completion handling, run once on the walker thread after it settles
    fn finish(&self, changed: u64) {
        let cancelled = self.inner.signal.is_cancelled();
        let pending = if cancelled {
            self.inner.signal.take_pending()
        } else {
            None
        };

        let state = match pending {
            Some(pending) => {
                self.hand_over(pending);
                ScanState::Paused
            }
            None => {
                if let Some(registry) = self.inner.registry.upgrade() {
                    registry.clear_if_current(self);
                }
                info!(
                    "Scan '{}' (#{}) {} with {} change(s)",
                    self.inner.label,
                    self.inner.id,
                    if cancelled { "stopped" } else { "completed" },
                    changed
                );
                ScanState::Completed
            }
        };

        self.inner.state.store(state.as_u8(), Ordering::SeqCst);

        let observer = self.inner.observer.lock().clone();
        if let Some(observer) = observer {
            observer.on_ended(cancelled);
        }

        self.publish(ScanOutcome {
            changed,
            state,
            cancelled,
        });
    }

    /// Install a successor for `pending`, or keep the paths on this instance
    fn hand_over(&self, pending: Vec<String>) {
        let Some(registry) = self.inner.registry.upgrade() else {
            warn!("{}", ScanError::registry_dropped(&self.inner.label));
            *self.inner.retained.lock() = Some(pending);
            return;
        };

        match registry.hand_over(self, pending) {
            Ok(successor) => info!(
                "Scan '{}' (#{}) paused, {} path(s) handed to #{}",
                self.inner.label,
                self.inner.id,
                successor.inherited_pending().map_or(0, |p| p.len()),
                successor.id()
            ),
            Err(pending) => {
                warn!("{}", ScanError::pause_race_lost(&self.inner.label));
                *self.inner.retained.lock() = Some(pending);
            }
        }
    }

    fn publish(&self, outcome: ScanOutcome) {
        self.inner.state.store(outcome.state.as_u8(), Ordering::SeqCst);
        *self.inner.outcome.lock() = Some(outcome);
        self.inner.settled.notify_all();
    }

    /// Attach an observer that is told when this instance ends
    pub fn attach_observer(&self, observer: Arc<dyn ProgressObserver>) {
        *self.inner.observer.lock() = Some(observer);
    }

    /// Detach the current observer; the scan carries on headless
    pub fn detach_observer(&self) {
        *self.inner.observer.lock() = None;
    }

    /// Snapshot of the statistics for pollers
    pub fn statistics(&self) -> ScanProgress {
        ScanProgress {
            current_folder: self.inner.stats.current_folder(),
            processed: self.inner.stats.processed(),
            dirs_visited: self.inner.stats.dirs_visited(),
            state: self.state(),
        }
    }

    /// Paths this idle successor will walk when resumed
    pub fn inherited_pending(&self) -> Option<Vec<String>> {
        self.inner.inherited.lock().clone()
    }

    /// Paths kept by a paused scan that could not install a successor
    pub fn pending_paths(&self) -> Option<Vec<String>> {
        self.inner.retained.lock().clone()
    }

    /// Block until the scan settles; `None` if it was never started
    pub fn wait(&self) -> Option<ScanOutcome> {
        let mut outcome = self.inner.outcome.lock();
        while outcome.is_none() {
            if self.state() == ScanState::Idle {
                return None;
            }
            self.inner.settled.wait(&mut outcome);
        }
        outcome.clone()
    }

    /// Like [`wait`](Self::wait) but gives up after `timeout`
    pub fn wait_timeout(&self, timeout: Duration) -> Option<ScanOutcome> {
        let mut outcome = self.inner.outcome.lock();
        if outcome.is_none() && self.state() != ScanState::Idle {
            self.inner.settled.wait_for(&mut outcome, timeout);
        }
        outcome.clone()
    }
}
