//! Progress reporting for scan operations
//!
//! The scanner only records statistics; it never pushes progress. Observers
//! poll [`ScanStatistics`] at whatever cadence they like (see
//! [`poll_until_settled`]) and are told once when a scan ends.

use parking_lot::Mutex;
use serde::Serialize;
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::lifecycle::ScanLifecycle;
use crate::models::ScanOutcome;

/// Statistics written by the walker thread and read by pollers.
///
/// Reads are best effort: the folder and counters are updated separately, so
/// a reader may briefly see a folder paired with an older count.
#[derive(Debug, Default)]
pub struct ScanStatistics {
    current_folder: Mutex<String>,
    processed: AtomicU64,
    dirs_visited: AtomicU64,
}

impl ScanStatistics {
    /// Create zeroed statistics
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that the walker entered a directory
    pub fn enter_folder(&self, folder: &str) {
        *self.current_folder.lock() = folder.to_string();
        self.dirs_visited.fetch_add(1, Ordering::Relaxed);
    }

    /// Mark the folder whose batch is being indexed
    pub fn set_current_folder(&self, folder: &str) {
        *self.current_folder.lock() = folder.to_string();
    }

    /// Add the change count of a finished batch
    pub fn add_processed(&self, count: u64) {
        self.processed.fetch_add(count, Ordering::Relaxed);
    }

    /// Directory most recently entered
    pub fn current_folder(&self) -> String {
        self.current_folder.lock().clone()
    }

    /// Index entries changed so far
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    /// Directories entered so far
    pub fn dirs_visited(&self) -> u64 {
        self.dirs_visited.load(Ordering::Relaxed)
    }
}

/// Receives scan progress; implemented by UIs and the stderr reporter
pub trait ProgressObserver: Send + Sync {
    /// Called by the polling side with the latest statistics
    fn on_progress(&self, current_folder: &str, processed: u64);

    /// Called once by the scan when it settles
    fn on_ended(&self, was_cancelled: bool);
}

/// Start message sent when scan begins
#[derive(Debug, Clone, Serialize)]
pub struct StartMessage {
    /// Message type identifier
    #[serde(rename = "_t")]
    pub msg_type: &'static str,
    /// Sequence number
    pub seq: u64,
    /// Timestamp in milliseconds since reporter creation
    pub ts: u64,
    /// Why the scan was started
    pub label: String,
    /// Requested root paths
    pub roots: Vec<String>,
}

impl StartMessage {
    /// Create a new start message
    pub fn new(seq: u64, ts: u64, label: String, roots: Vec<String>) -> Self {
        Self {
            msg_type: "start",
            seq,
            ts,
            label,
            roots,
        }
    }
}

/// Progress message sent during scan
#[derive(Debug, Clone, Serialize)]
pub struct ProgressMessage {
    /// Message type identifier ("p" for progress)
    #[serde(rename = "_t")]
    pub msg_type: &'static str,
    /// Sequence number
    pub seq: u64,
    /// Timestamp in milliseconds since reporter creation
    pub ts: u64,
    /// Current directory being scanned
    pub dir: String,
    /// Number of index entries changed
    #[serde(rename = "n")]
    pub processed: u64,
}

impl ProgressMessage {
    /// Create a new progress message
    pub fn new(seq: u64, ts: u64, dir: String, processed: u64) -> Self {
        Self {
            msg_type: "p",
            seq,
            ts,
            dir,
            processed,
        }
    }
}

/// Done message sent when scan ends
#[derive(Debug, Clone, Serialize)]
pub struct DoneMessage {
    /// Message type identifier ("done" for completion)
    #[serde(rename = "_t")]
    pub msg_type: &'static str,
    /// Sequence number
    pub seq: u64,
    /// Timestamp in milliseconds since reporter creation
    pub ts: u64,
    /// Whether the scan was cancelled or paused
    pub cancelled: bool,
}

impl DoneMessage {
    /// Create a new done message
    pub fn new(seq: u64, ts: u64, cancelled: bool) -> Self {
        Self {
            msg_type: "done",
            seq,
            ts,
            cancelled,
        }
    }
}

/// Progress reporter writing JSON lines to stderr
///
/// Handles timing, sequence numbers, and formatting of the message types.
pub struct JsonProgressReporter {
    /// Whether progress reporting is enabled
    enabled: bool,
    /// Reporting interval in milliseconds
    interval_ms: u64,
    /// Last report time
    last_report: Mutex<Instant>,
    /// Sequence number for messages
    seq: AtomicU64,
    /// Start time of the reporter
    start_time: Instant,
}

impl JsonProgressReporter {
    /// Create a new reporter
    ///
    /// # Arguments
    /// * `enabled` - Whether progress reporting is enabled
    /// * `interval_ms` - Minimum interval between progress messages in milliseconds
    pub fn new(enabled: bool, interval_ms: u64) -> Self {
        let now = Instant::now();
        Self {
            enabled,
            interval_ms,
            last_report: Mutex::new(now),
            seq: AtomicU64::new(0),
            start_time: now,
        }
    }

    /// Check if enough time has passed since the last report
    pub fn should_report(&self) -> bool {
        if !self.enabled {
            return false;
        }
        let elapsed = self.last_report.lock().elapsed().as_millis() as u64;
        elapsed >= self.interval_ms
    }

    /// Get the next sequence number (monotonically increasing)
    pub fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::SeqCst)
    }

    /// Get the current timestamp in milliseconds since reporter creation
    pub fn current_timestamp(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }

    /// Output a serializable message to stderr as JSON
    pub fn output_to_stderr<T: Serialize>(&self, msg: &T) {
        if let Ok(json) = serde_json::to_string(msg) {
            eprintln!("{}", json);
            std::io::stderr().flush().ok();
        }
    }

    /// Report scan start
    pub fn report_start(&self, label: &str, roots: &[String]) {
        if !self.enabled {
            return;
        }
        let msg = StartMessage::new(
            self.next_seq(),
            self.current_timestamp(),
            label.to_string(),
            roots.to_vec(),
        );
        self.output_to_stderr(&msg);
    }

    /// Check if the reporter is enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

impl ProgressObserver for JsonProgressReporter {
    fn on_progress(&self, current_folder: &str, processed: u64) {
        if !self.should_report() {
            return;
        }
        let msg = ProgressMessage::new(
            self.next_seq(),
            self.current_timestamp(),
            current_folder.to_string(),
            processed,
        );
        self.output_to_stderr(&msg);
        *self.last_report.lock() = Instant::now();
    }

    fn on_ended(&self, was_cancelled: bool) {
        if !self.enabled {
            return;
        }
        let msg = DoneMessage::new(self.next_seq(), self.current_timestamp(), was_cancelled);
        self.output_to_stderr(&msg);
    }
}

/// Poll a scan's statistics into `observer` every `interval` until it settles.
///
/// Returns `None` for an instance that was never started.
pub fn poll_until_settled(
    scan: &ScanLifecycle,
    observer: &dyn ProgressObserver,
    interval: Duration,
) -> Option<ScanOutcome> {
    loop {
        let snapshot = scan.statistics();
        observer.on_progress(&snapshot.current_folder, snapshot.processed);
        if snapshot.state == crate::models::ScanState::Idle {
            return None;
        }
        if let Some(outcome) = scan.wait_timeout(interval) {
            let last = scan.statistics();
            observer.on_progress(&last.current_folder, last.processed);
            return Some(outcome);
        }
    }
}
