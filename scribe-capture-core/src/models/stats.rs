use std::path::PathBuf;

use chrono::{DateTime, Local};
use serde::Serialize;

use super::config::AudioFormat;

/// Why the capture loop stopped reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    #[default]
    Running,
    StopRequested,
    MaxDurationReached,
    Cancelled,
    DeviceLost,
}

/// Statistics for one recording.
///
/// Counters only grow while recording. Readers always get a cloned snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordingStatistics {
    pub started_at: DateTime<Local>,
    pub ended_at: Option<DateTime<Local>>,
    pub duration_secs: f64,
    pub file_size: u64,
    /// Successful buffered reads appended to the frame buffer.
    pub chunks_captured: u64,
    /// Audio frames (one sample per channel) captured.
    pub samples_recorded: u64,
    pub audio_detected: bool,
    pub filename: PathBuf,
    pub format: AudioFormat,
    /// Hex SHA-256 of the finished file.
    pub checksum: Option<String>,
    pub exit_reason: ExitReason,
}

impl RecordingStatistics {
    pub fn new(filename: PathBuf, format: AudioFormat) -> Self {
        Self {
            started_at: Local::now(),
            ended_at: None,
            duration_secs: 0.0,
            file_size: 0,
            chunks_captured: 0,
            samples_recorded: 0,
            audio_detected: false,
            filename,
            format,
            checksum: None,
            exit_reason: ExitReason::Running,
        }
    }

    pub fn is_running(&self) -> bool {
        self.ended_at.is_none()
    }

    /// Seconds between start and `now`, never negative.
    pub fn elapsed_until(&self, now: DateTime<Local>) -> f64 {
        let millis = (now - self.started_at).num_milliseconds().max(0);
        millis as f64 / 1000.0
    }

    /// Close the record at `at` unless the capture loop already did.
    pub fn finish(&mut self, at: DateTime<Local>, reason: ExitReason) {
        if self.ended_at.is_some() {
            return;
        }
        self.ended_at = Some(at);
        self.duration_secs = self.elapsed_until(at);
        self.exit_reason = reason;
    }

    pub fn file_size_mb(&self) -> f64 {
        self.file_size as f64 / (1024.0 * 1024.0)
    }
}
