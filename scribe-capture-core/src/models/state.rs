use std::fmt;

use super::error::CaptureError;
use super::stats::RecordingStatistics;

/// Capture session state machine.
///
/// State transitions:
/// ```text
/// idle → configuring → recording → stopping → saved / failed
///   └──────────┴──────────────────────────────→ failed
/// ```
/// `Saved` and `Failed` are terminal; a session records once.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureState {
    Idle,
    Configuring,
    Recording { elapsed_secs: f64 },
    Stopping,
    Saved(Box<RecordingStatistics>),
    Failed(CaptureError),
}

impl CaptureState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_recording(&self) -> bool {
        matches!(self, Self::Recording { .. })
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Saved(_) | Self::Failed(_))
    }

    /// A recording may only be started before any stream was opened.
    pub fn can_start(&self) -> bool {
        matches!(self, Self::Idle | Self::Configuring)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Configuring => "configuring",
            Self::Recording { .. } => "recording",
            Self::Stopping => "stopping",
            Self::Saved(_) => "saved",
            Self::Failed(_) => "failed",
        }
    }
}

impl fmt::Display for CaptureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
