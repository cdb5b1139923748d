use std::sync::Arc;

use chrono::Local;

use crate::models::config::CaptureConfiguration;
use crate::models::error::CaptureError;
use crate::models::state::CaptureState;
use crate::models::stats::RecordingStatistics;
use crate::models::status::{SessionId, StatusSnapshot, StatusTag};
use crate::traits::status_observer::StatusObserver;

/// Builds status snapshots for one recording and forwards them to the observer.
#[derive(Clone)]
pub(crate) struct StatusReporter {
    observer: Option<Arc<dyn StatusObserver>>,
    session_id: SessionId,
    filename: String,
    /// Requested duration in whole seconds, 0 when unbounded.
    duration: u64,
    quality: Option<String>,
    device: String,
    sample_rate: u32,
    channels: u16,
}

impl StatusReporter {
    pub fn new(
        observer: Option<Arc<dyn StatusObserver>>,
        session_id: SessionId,
        filename: String,
        duration: u64,
        quality: Option<String>,
        config: &CaptureConfiguration,
    ) -> Self {
        Self {
            observer,
            session_id,
            filename,
            duration,
            quality,
            device: config.device.name.clone(),
            sample_rate: config.sample_rate,
            channels: config.channels,
        }
    }

    pub fn snapshot(&self, status: StatusTag, stats: &RecordingStatistics) -> StatusSnapshot {
        let elapsed = if stats.is_running() {
            stats.elapsed_until(Local::now())
        } else {
            stats.duration_secs
        };

        StatusSnapshot {
            status,
            session_id: self.session_id.clone(),
            filename: self.filename.clone(),
            duration: self.duration,
            elapsed,
            progress: match status {
                StatusTag::Completed if self.duration > 0 => 100,
                _ => StatusSnapshot::progress_for(elapsed, self.duration),
            },
            quality: self.quality.clone(),
            device: self.device.clone(),
            sample_rate: self.sample_rate,
            channels: self.channels,
            frames_captured: stats.chunks_captured,
            has_audio: stats.audio_detected,
            file_size_mb: match status {
                StatusTag::Completed => Some((stats.file_size_mb() * 100.0).round() / 100.0),
                _ => None,
            },
            error: None,
        }
    }

    pub fn report(&self, status: StatusTag, stats: &RecordingStatistics) {
        if let Some(observer) = &self.observer {
            observer.on_status(&self.snapshot(status, stats));
        }
    }

    pub fn report_error(&self, error: &CaptureError, stats: Option<&RecordingStatistics>) {
        let Some(observer) = &self.observer else {
            return;
        };
        observer.on_error(error);

        let mut snapshot = match stats {
            Some(stats) => self.snapshot(StatusTag::Error, stats),
            None => StatusSnapshot {
                status: StatusTag::Error,
                session_id: self.session_id.clone(),
                filename: self.filename.clone(),
                duration: self.duration,
                elapsed: 0.0,
                progress: 0,
                quality: self.quality.clone(),
                device: self.device.clone(),
                sample_rate: self.sample_rate,
                channels: self.channels,
                frames_captured: 0,
                has_audio: false,
                file_size_mb: None,
                error: None,
            },
        };
        snapshot.error = Some(error.to_string());
        observer.on_status(&snapshot);
    }

    pub fn state_changed(&self, state: &CaptureState) {
        if let Some(observer) = &self.observer {
            observer.on_state_changed(state);
        }
    }
}
