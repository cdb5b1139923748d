use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use chrono::Local;
use parking_lot::Mutex;

use crate::models::config::CaptureConfiguration;
use crate::models::error::CaptureError;
use crate::models::state::CaptureState;
use crate::models::stats::ExitReason;
use crate::models::status::StatusTag;
use crate::processing::level;
use crate::traits::audio_host::InputStream;
use crate::traits::cancellation::CancellationSignal;
use crate::traits::status_observer::ProgressCallback;

use super::recorder::SessionState;
use super::status_reporter::StatusReporter;

/// Everything the background capture thread owns or shares.
///
/// The stream is owned exclusively by the loop and closed when `run` returns.
pub(crate) struct CaptureLoop {
    pub stream: Box<dyn InputStream>,
    pub config: CaptureConfiguration,
    /// Loop bound; may include the manual-recording cap.
    pub max_duration: Option<Duration>,
    pub running: Arc<AtomicBool>,
    pub session_state: Arc<Mutex<SessionState>>,
    pub frames: Arc<Mutex<Vec<Vec<u8>>>>,
    pub cancellation: Option<Arc<dyn CancellationSignal>>,
    pub progress: Option<ProgressCallback>,
    pub reporter: StatusReporter,
    pub poll_interval: Duration,
    pub status_interval: Duration,
    pub started: Instant,
}

impl CaptureLoop {
    /// Read until a stop condition holds. Never panics on stream errors; fatal
    /// ones are recorded in the session state.
    pub fn run(mut self) -> ExitReason {
        log::debug!("Capture loop started for {}", self.config.device.name);
        let frame_size = self.config.frame_size().max(1);
        let mut last_status = Instant::now();

        let reason = loop {
            let elapsed = self.started.elapsed();

            if let Some(max) = self.max_duration {
                if elapsed >= max {
                    log::info!("Maximum duration reached: {:.1}s", max.as_secs_f64());
                    break ExitReason::MaxDurationReached;
                }
            }

            if !self.running.load(Ordering::SeqCst) {
                break ExitReason::StopRequested;
            }

            if let Some(signal) = &self.cancellation {
                if signal.is_requested() {
                    log::info!("Stop signal received");
                    signal.acknowledge();
                    break ExitReason::Cancelled;
                }
            }

            if self.stream.is_stopped() {
                log::error!("Audio stream was interrupted");
                self.record_device_loss("stream stopped".into());
                break ExitReason::DeviceLost;
            }

            match self.stream.read(self.config.buffer_frames) {
                Ok(chunk) if chunk.is_empty() => {
                    log::warn!("No data captured from audio stream");
                }
                Ok(chunk) => self.append(chunk, frame_size),
                Err(e) if e.is_fatal() => {
                    log::error!("Capture device unavailable, stopping recording: {}", e);
                    self.record_device_loss(e.to_string());
                    break ExitReason::DeviceLost;
                }
                Err(e) => log::warn!("Error reading audio data: {}", e),
            }

            let elapsed_secs = self.started.elapsed().as_secs_f64();
            {
                let mut s = self.session_state.lock();
                if s.state.is_recording() {
                    s.state = CaptureState::Recording { elapsed_secs };
                }
            }

            if let Some(callback) = &self.progress {
                callback(elapsed_secs);
            }

            if last_status.elapsed() >= self.status_interval && self.running.load(Ordering::SeqCst) {
                last_status = Instant::now();
                let stats = self.session_state.lock().stats.clone();
                if let Some(stats) = stats {
                    self.reporter.report(StatusTag::Recording, &stats);
                }
            }

            let pause = self.pause();
            if !pause.is_zero() {
                thread::sleep(pause);
            }
        };

        self.stream.close();

        let mut s = self.session_state.lock();
        if let Some(stats) = s.stats.as_mut() {
            stats.finish(Local::now(), reason);
            log::info!(
                "Capture loop finished ({:?}): {} chunks, {:.1}s",
                reason,
                stats.chunks_captured,
                stats.duration_secs
            );
        }
        reason
    }

    /// Sleep before the next read, never past the duration bound.
    fn pause(&self) -> Duration {
        match self.max_duration {
            Some(max) => self
                .poll_interval
                .min(max.saturating_sub(self.started.elapsed())),
            None => self.poll_interval,
        }
    }

    fn append(&mut self, chunk: Vec<u8>, frame_size: usize) {
        // A detached loop must not touch statistics the session already finalized.
        if !self.running.load(Ordering::SeqCst) {
            return;
        }
        let mut s = self.session_state.lock();
        let Some(stats) = s.stats.as_mut() else {
            return;
        };

        stats.chunks_captured += 1;
        stats.samples_recorded += (chunk.len() / frame_size) as u64;
        if !stats.audio_detected {
            let rms = level::chunk_rms(&chunk, self.config.sample_format);
            if rms > level::AUDIO_DETECTION_THRESHOLD {
                stats.audio_detected = true;
                log::info!("Audio detected, level {:.2}", rms);
            }
        }
        // Appended under the session lock so counters and buffer stay in step.
        self.frames.lock().push(chunk);
    }

    fn record_device_loss(&self, cause: String) {
        let error = CaptureError::DeviceAccess(format!("capture stream lost: {}", cause));
        let stats = {
            let mut s = self.session_state.lock();
            s.last_error = Some(error.clone());
            s.stats.clone()
        };
        self.reporter.report_error(&error, stats.as_ref());
    }
}
