//! Core data models for the rescanner

use serde::{Deserialize, Serialize};

/// Lifecycle state of one scan instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScanState {
    /// Constructed, not yet started
    #[default]
    Idle,
    /// Walking on its background thread
    Running,
    /// Cancel was signalled, walker has not settled yet
    CancelRequested,
    /// Settled after a cancel that collected pending paths
    Paused,
    /// Settled after exhausting the walk or after a full stop
    Completed,
}

impl ScanState {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanState::Idle => "idle",
            ScanState::Running => "running",
            ScanState::CancelRequested => "cancel_requested",
            ScanState::Paused => "paused",
            ScanState::Completed => "completed",
        }
    }

    /// Whether the instance has finished its run
    pub fn is_settled(&self) -> bool {
        matches!(self, ScanState::Paused | ScanState::Completed)
    }

    pub(crate) fn as_u8(self) -> u8 {
        match self {
            ScanState::Idle => 0,
            ScanState::Running => 1,
            ScanState::CancelRequested => 2,
            ScanState::Paused => 3,
            ScanState::Completed => 4,
        }
    }

    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => ScanState::Running,
            2 => ScanState::CancelRequested,
            3 => ScanState::Paused,
            4 => ScanState::Completed,
            _ => ScanState::Idle,
        }
    }
}

impl std::fmt::Display for ScanState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Point-in-time view of a scan's statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanProgress {
    /// Directory most recently entered
    pub current_folder: String,
    /// Index entries changed so far
    pub processed: u64,
    /// Directories entered so far
    pub dirs_visited: u64,
    /// Lifecycle state at the time of the snapshot
    pub state: ScanState,
}

/// Final result of one scan instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanOutcome {
    /// Total index entries changed by this instance
    pub changed: u64,
    /// State the instance settled in
    pub state: ScanState,
    /// Whether the run ended because of a cancel request
    pub cancelled: bool,
}
