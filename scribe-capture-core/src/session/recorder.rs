use std::mem;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use chrono::Local;
use parking_lot::Mutex;

use crate::catalog::device_catalog::DeviceCatalog;
use crate::catalog::selector::DeviceSelector;
use crate::models::config::{AudioFormat, CaptureConfiguration};
use crate::models::error::CaptureError;
use crate::models::quality::QualityPreset;
use crate::models::state::CaptureState;
use crate::models::stats::{ExitReason, RecordingStatistics};
use crate::models::status::{SessionId, StatusTag};
use crate::settings::RecorderSettings;
use crate::storage::encoder::Encoder;
use crate::traits::audio_host::{AudioHost, StreamParams};
use crate::traits::cancellation::CancellationSignal;
use crate::traits::status_observer::{ProgressCallback, StatusObserver};

use super::capture_loop::CaptureLoop;
use super::status_reporter::StatusReporter;

/// Mutable session state shared with the capture thread, protected by `parking_lot::Mutex`.
pub(crate) struct SessionState {
    pub state: CaptureState,
    pub stats: Option<RecordingStatistics>,
    pub last_error: Option<CaptureError>,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            state: CaptureState::Idle,
            stats: None,
            last_error: None,
        }
    }
}

/// One recording's lifecycle: device configuration, a background capture
/// thread, and encoding on stop.
///
/// ```text
/// [AudioHost stream] → capture thread → [frame buffer] ─stop→ [Encoder] → file
///                            └→ stats / status observer
/// ```
///
/// A session records once. Create a new session for the next recording.
pub struct CaptureSession {
    catalog: DeviceCatalog,
    settings: RecorderSettings,
    encoder: Encoder,
    session_id: SessionId,
    config: Option<CaptureConfiguration>,
    quality: Option<QualityPreset>,
    session_state: Arc<Mutex<SessionState>>,
    frames: Arc<Mutex<Vec<Vec<u8>>>>,

    observer: Option<Arc<dyn StatusObserver>>,
    cancellation: Option<Arc<dyn CancellationSignal>>,
    progress: Option<ProgressCallback>,
    reporter: Option<StatusReporter>,

    // Capture thread control
    running: Arc<AtomicBool>,
    capture_handle: Option<thread::JoinHandle<()>>,
    capture_done: Option<mpsc::Receiver<ExitReason>>,
}

impl CaptureSession {
    /// Session over `host`. Hosts without the loopback-capable API degrade to
    /// microphone-only capture with a warning.
    pub fn new(host: Arc<dyn AudioHost>, settings: RecorderSettings) -> Result<Self, CaptureError> {
        let catalog = match DeviceCatalog::new(Arc::clone(&host)) {
            Ok(catalog) => catalog,
            Err(CaptureError::NativeCaptureApiUnavailable(reason)) => {
                log::warn!("System audio capture unavailable ({}); microphone only", reason);
                DeviceCatalog::allow_microphone_only(host)
            }
            Err(e) => return Err(e),
        };
        Ok(Self::with_catalog(catalog, settings))
    }

    pub fn with_catalog(catalog: DeviceCatalog, settings: RecorderSettings) -> Self {
        Self {
            catalog,
            settings,
            encoder: Encoder::new(),
            session_id: SessionId::generate(),
            config: None,
            quality: None,
            session_state: Arc::new(Mutex::new(SessionState::new())),
            frames: Arc::new(Mutex::new(Vec::new())),
            observer: None,
            cancellation: None,
            progress: None,
            reporter: None,
            running: Arc::new(AtomicBool::new(false)),
            capture_handle: None,
            capture_done: None,
        }
    }

    pub fn set_observer(&mut self, observer: Arc<dyn StatusObserver>) {
        self.observer = Some(observer);
    }

    pub fn set_cancellation(&mut self, signal: Arc<dyn CancellationSignal>) {
        self.cancellation = Some(signal);
    }

    pub fn set_progress_callback(&mut self, callback: ProgressCallback) {
        self.progress = Some(callback);
    }

    pub fn set_encoder(&mut self, encoder: Encoder) {
        self.encoder = encoder;
    }

    pub fn set_session_id(&mut self, session_id: SessionId) {
        self.session_id = session_id;
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn catalog(&self) -> &DeviceCatalog {
        &self.catalog
    }

    pub fn settings(&self) -> &RecorderSettings {
        &self.settings
    }

    pub fn configuration(&self) -> Option<&CaptureConfiguration> {
        self.config.as_ref()
    }

    pub fn state(&self) -> CaptureState {
        self.session_state.lock().state.clone()
    }

    pub fn last_error(&self) -> Option<CaptureError> {
        self.session_state.lock().last_error.clone()
    }

    pub fn is_recording(&self) -> bool {
        self.session_state.lock().state.is_recording()
    }

    pub fn device_name(&self) -> Option<&str> {
        self.config.as_ref().map(|c| c.device.name.as_str())
    }

    pub fn frames_captured(&self) -> u64 {
        self.session_state
            .lock()
            .stats
            .as_ref()
            .map_or(0, |s| s.chunks_captured)
    }

    pub fn has_audio_detected(&self) -> bool {
        self.session_state
            .lock()
            .stats
            .as_ref()
            .is_some_and(|s| s.audio_detected)
    }

    /// Use an explicit configuration. Transitions: idle → configuring.
    pub fn configure(&mut self, config: CaptureConfiguration) -> Result<(), CaptureError> {
        if !self.session_state.lock().state.can_start() {
            return Err(CaptureError::AlreadyRecording);
        }
        config.validate()?;

        log::info!(
            "Configured {} ({} Hz, {} ch, {} frames)",
            config.device.name,
            config.sample_rate,
            config.channels,
            config.buffer_frames
        );
        self.config = Some(config);
        self.set_state(CaptureState::Configuring);
        Ok(())
    }

    /// Pick the best recording-capable device. Returns false when none exists
    /// or the catalog cannot be read.
    pub fn configure_auto(&mut self) -> bool {
        match self.try_configure_auto() {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Automatic device configuration failed: {}", e);
                false
            }
        }
    }

    fn try_configure_auto(&mut self) -> Result<(), CaptureError> {
        let device = DeviceSelector::new(&self.catalog)
            .best_recording_device()?
            .ok_or(CaptureError::NoDeviceAvailable)?;

        let mut config = CaptureConfiguration::for_device(device, self.settings.recordings_dir.clone())
            .with_format(self.settings.default_format);
        if let Some(preset) = &self.quality {
            config = config.with_preset(preset);
        }

        log::info!(
            "Device configured automatically: {} (channels: {})",
            config.device.name,
            config.channels
        );
        self.configure(config)
    }

    /// Apply a quality preset to the current configuration, or to the one
    /// chosen later by auto-configuration.
    pub fn apply_quality(&mut self, preset: QualityPreset) -> Result<(), CaptureError> {
        if !self.session_state.lock().state.can_start() {
            return Err(CaptureError::AlreadyRecording);
        }
        if let Some(config) = self.config.take() {
            self.config = Some(config.with_preset(&preset));
        }
        self.quality = Some(preset);
        Ok(())
    }

    /// Start recording into `<output_dir>/<filename>.<ext>`. Returns the file path.
    ///
    /// Auto-configures a device when none was configured. Transitions:
    /// configuring → recording, or → failed when the stream cannot be opened.
    pub fn start(
        &mut self,
        filename: Option<&str>,
        max_duration: Option<Duration>,
        format: AudioFormat,
    ) -> Result<PathBuf, CaptureError> {
        if !self.session_state.lock().state.can_start() {
            return Err(CaptureError::AlreadyRecording);
        }

        if self.config.is_none() {
            log::info!("No configuration, detecting device automatically");
            self.try_configure_auto()?;
        }
        let config = self
            .config
            .take()
            .ok_or(CaptureError::NoDeviceAvailable)?
            .with_format(format)
            .with_max_duration(max_duration);
        self.config = Some(config.clone());
        config.validate()?;

        let stem = match filename {
            Some(name) => name.to_string(),
            None => format!("meeting_{}", Local::now().format("%Y%m%d_%H%M%S")),
        };
        let file_name = format.normalize_filename(&stem);
        let file_path = config.output_dir.join(&file_name);

        let reporter = StatusReporter::new(
            self.observer.clone(),
            self.session_id.clone(),
            file_name,
            max_duration.map_or(0, |d| d.as_secs()),
            self.quality.map(|q| q.key.to_string()),
            &config,
        );
        self.reporter = Some(reporter.clone());

        if let Err(e) = std::fs::create_dir_all(&config.output_dir) {
            let error = CaptureError::CaptureStart(format!(
                "cannot create output directory {}: {}",
                config.output_dir.display(),
                e
            ));
            log::error!("Error starting recording: {}", error);
            return Err(self.fail(error, None));
        }

        let params = StreamParams {
            device_index: config.device.index,
            sample_format: config.sample_format,
            channels: config.channels,
            sample_rate: config.sample_rate,
            buffer_frames: config.buffer_frames,
        };
        let stream = match self.catalog.host().open_input(&params) {
            Ok(stream) => stream,
            Err(e) => {
                let error = match e {
                    CaptureError::CaptureStart(_) => e,
                    other => CaptureError::CaptureStart(other.to_string()),
                };
                log::error!("Error starting recording: {}", error);
                return Err(self.fail(error, None));
            }
        };
        log::info!("Audio stream opened for device {}", config.device.name);

        let stats = RecordingStatistics::new(file_path.clone(), format);
        let started = Instant::now();
        {
            let mut s = self.session_state.lock();
            s.stats = Some(stats.clone());
            s.last_error = None;
        }
        self.frames.lock().clear();
        self.running.store(true, Ordering::SeqCst);

        let loop_bound = max_duration.or_else(|| {
            let cap = self.settings.max_manual_duration();
            (!cap.is_zero()).then_some(cap)
        });
        let capture = CaptureLoop {
            stream,
            config,
            max_duration: loop_bound,
            running: Arc::clone(&self.running),
            session_state: Arc::clone(&self.session_state),
            frames: Arc::clone(&self.frames),
            cancellation: self.cancellation.clone(),
            progress: self.progress.clone(),
            reporter: reporter.clone(),
            poll_interval: self.settings.poll_interval(),
            status_interval: self.settings.status_interval(),
            started,
        };

        // Recording is entered before the thread runs so its first state update sticks.
        self.set_state(CaptureState::Recording { elapsed_secs: 0.0 });

        let (done_tx, done_rx) = mpsc::channel();
        let spawned = thread::Builder::new()
            .name("capture-loop".into())
            .spawn(move || {
                let reason = capture.run();
                let _ = done_tx.send(reason);
            });
        match spawned {
            Ok(handle) => {
                self.capture_handle = Some(handle);
                self.capture_done = Some(done_rx);
            }
            Err(e) => {
                // The unspawned closure was dropped, which closed the stream.
                self.running.store(false, Ordering::SeqCst);
                let error = CaptureError::CaptureStart(format!("failed to spawn capture thread: {}", e));
                return Err(self.fail(error, Some(&stats)));
            }
        }

        reporter.report(StatusTag::Recording, &stats);
        log::info!("Recording started: {}", file_path.display());
        Ok(file_path)
    }

    /// Stop the capture thread, encode the frame buffer and return final statistics.
    /// Transitions: recording → stopping → saved / failed.
    pub fn stop(&mut self) -> Result<RecordingStatistics, CaptureError> {
        let has_stats = {
            let s = self.session_state.lock();
            s.state.is_recording() && s.stats.is_some()
        };
        if !has_stats {
            return Err(CaptureError::NothingToStop);
        }

        log::info!("Stopping recording...");
        self.set_state(CaptureState::Stopping);
        self.join_capture_thread();

        let (config, reporter) = match (self.config.clone(), self.reporter.clone()) {
            (Some(config), Some(reporter)) => (config, reporter),
            _ => return Err(CaptureError::NothingToStop),
        };

        let mut stats = {
            let mut s = self.session_state.lock();
            let Some(stats) = s.stats.as_mut() else {
                return Err(CaptureError::NothingToStop);
            };
            stats.finish(Local::now(), ExitReason::StopRequested);
            stats.clone()
        };
        let frames = mem::take(&mut *self.frames.lock());

        match self.encoder.encode(&frames, &config, &stats.filename) {
            Ok(encoded) => {
                stats.file_size = encoded.file_size;
                stats.checksum = Some(encoded.checksum);
                self.session_state.lock().stats = Some(stats.clone());
                log::info!(
                    "Recording saved: {} ({:.2} MB)",
                    stats.filename.display(),
                    stats.file_size_mb()
                );

                self.set_state(CaptureState::Saved(Box::new(stats.clone())));
                reporter.report(StatusTag::Completed, &stats);
                Ok(stats)
            }
            Err(e) => {
                let error = match e {
                    CaptureError::CompressedEncodingUnavailable(_) | CaptureError::Save(_) => e,
                    other => CaptureError::Save(other.to_string()),
                };
                log::error!("Error saving recording: {}", error);
                Err(self.fail(error, Some(&stats)))
            }
        }
    }

    /// Current statistics. While recording, the duration is recomputed against now.
    pub fn get_current_stats(&self) -> Option<RecordingStatistics> {
        let mut stats = self.session_state.lock().stats.clone()?;
        if stats.is_running() {
            stats.duration_secs = stats.elapsed_until(Local::now());
        }
        Some(stats)
    }

    /// Release the capture thread and stream without encoding. Safe to call
    /// more than once; also run on drop.
    pub fn close(&mut self) {
        if self.capture_handle.is_none() && self.capture_done.is_none() {
            return;
        }
        log::debug!("Closing capture session {}", self.session_id);
        self.join_capture_thread();
        self.frames.lock().clear();

        let mut s = self.session_state.lock();
        if s.state.is_recording() || matches!(s.state, CaptureState::Stopping) {
            // Single-use: an abandoned recording cannot be restarted.
            s.state = CaptureState::Failed(CaptureError::Save(
                "recording discarded: session closed before stop".into(),
            ));
        }
    }

    fn join_capture_thread(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        let timeout = self.settings.stop_timeout();

        if let Some(done) = self.capture_done.take() {
            match done.recv_timeout(timeout) {
                Ok(_) | Err(RecvTimeoutError::Disconnected) => {
                    if let Some(handle) = self.capture_handle.take() {
                        if handle.join().is_err() {
                            log::error!("Capture thread panicked");
                        }
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    log::warn!(
                        "Recording thread did not finish within {:.1}s; continuing",
                        timeout.as_secs_f64()
                    );
                    // Detached; the thread still closes its stream when the read returns.
                    self.capture_handle = None;
                }
            }
        }
    }

    fn fail(&mut self, error: CaptureError, stats: Option<&RecordingStatistics>) -> CaptureError {
        self.session_state.lock().last_error = Some(error.clone());
        self.set_state(CaptureState::Failed(error.clone()));
        if let Some(reporter) = &self.reporter {
            reporter.report_error(&error, stats);
        }
        error
    }

    fn set_state(&self, new_state: CaptureState) {
        self.session_state.lock().state = new_state.clone();
        if let Some(observer) = &self.observer {
            observer.on_state_changed(&new_state);
        }
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.close();
    }
}
