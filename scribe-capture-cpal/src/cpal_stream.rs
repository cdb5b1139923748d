//! Blocking input stream over a cpal callback stream.
//!
//! `cpal::Stream` is not `Send` on every platform, so the stream is built and
//! kept alive on a dedicated holder thread. The data callback appends
//! little-endian bytes to a shared queue; `read` drains it.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{HostId, SampleRate, StreamConfig};
use parking_lot::{Condvar, Mutex};

use scribe_capture_core::models::config::SampleFormat;
use scribe_capture_core::models::error::{CaptureError, StreamReadError};
use scribe_capture_core::processing::pcm;
use scribe_capture_core::traits::audio_host::{InputStream, StreamParams};

/// Seconds of audio buffered before the oldest data is dropped.
const QUEUE_SECONDS: usize = 10;

const HOLDER_WAKE_INTERVAL: Duration = Duration::from_millis(100);

/// The device a stream is opened on.
#[derive(Debug, Clone)]
pub(crate) struct StreamTarget {
    pub host_id: HostId,
    pub device_name: String,
    /// Capture the render side of an output device.
    pub loopback: bool,
}

/// State shared between the cpal callbacks and the reader.
struct Shared {
    queue: Mutex<VecDeque<u8>>,
    ready: Condvar,
    capacity: usize,
    lost: AtomicBool,
    overflowed: AtomicBool,
}

impl Shared {
    fn new(capacity: usize) -> Self {
        Self {
            queue: Mutex::new(VecDeque::with_capacity(capacity)),
            ready: Condvar::new(),
            capacity,
            lost: AtomicBool::new(false),
            overflowed: AtomicBool::new(false),
        }
    }

    fn push(&self, bytes: &[u8]) {
        let mut queue = self.queue.lock();
        queue.extend(bytes);
        if queue.len() > self.capacity {
            let excess = queue.len() - self.capacity;
            queue.drain(..excess);
            self.overflowed.store(true, Ordering::SeqCst);
        }
        self.ready.notify_one();
    }

    fn on_error(&self, err: cpal::StreamError) {
        match err {
            cpal::StreamError::DeviceNotAvailable => {
                log::error!("Capture device disconnected");
                self.lost.store(true, Ordering::SeqCst);
                self.ready.notify_all();
            }
            other => log::warn!("Audio stream error: {}", other),
        }
    }
}

/// Blocking reader over a cpal input stream.
pub struct CpalInputStream {
    shared: Arc<Shared>,
    running: Arc<AtomicBool>,
    holder: Option<thread::JoinHandle<()>>,
    frame_size: usize,
    sample_rate: u32,
    closed: bool,
}

impl CpalInputStream {
    /// Build and start the stream on the holder thread. Returns once the
    /// stream is playing or has failed to open.
    pub(crate) fn open(target: StreamTarget, params: &StreamParams) -> Result<Self, CaptureError> {
        let frame_size = params.sample_format.sample_size() * params.channels as usize;
        if frame_size == 0 || params.sample_rate == 0 {
            return Err(CaptureError::CaptureStart(format!(
                "invalid stream parameters for {}",
                target.device_name
            )));
        }

        let capacity = frame_size * params.sample_rate as usize * QUEUE_SECONDS;
        let shared = Arc::new(Shared::new(capacity));
        let running = Arc::new(AtomicBool::new(true));
        let config = StreamConfig {
            channels: params.channels,
            sample_rate: SampleRate(params.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };
        let requested = params.sample_format;
        let device_name = target.device_name.clone();

        let (opened_tx, opened_rx) = mpsc::sync_channel(1);
        let holder = {
            let shared = Arc::clone(&shared);
            let running = Arc::clone(&running);
            thread::Builder::new()
                .name("cpal-input-holder".into())
                .spawn(move || hold_stream(target, config, requested, shared, running, opened_tx))
                .map_err(|e| CaptureError::CaptureStart(format!("failed to spawn stream thread: {}", e)))?
        };

        match opened_rx.recv() {
            Ok(Ok(())) => {
                log::info!(
                    "Opened input stream on {} ({} Hz, {} ch, {:?})",
                    device_name,
                    params.sample_rate,
                    params.channels,
                    requested
                );
                Ok(Self {
                    shared,
                    running,
                    holder: Some(holder),
                    frame_size,
                    sample_rate: params.sample_rate,
                    closed: false,
                })
            }
            Ok(Err(e)) => {
                let _ = holder.join();
                Err(e)
            }
            Err(_) => {
                let _ = holder.join();
                Err(CaptureError::CaptureStart(format!(
                    "stream thread for {} exited before opening",
                    device_name
                )))
            }
        }
    }

    /// Upper bound on how long one read waits for data.
    fn read_deadline(&self, frames: usize) -> Duration {
        let buffer = Duration::from_secs_f64(frames as f64 / self.sample_rate as f64);
        buffer * 2
    }
}

impl InputStream for CpalInputStream {
    fn read(&mut self, frames: usize) -> Result<Vec<u8>, StreamReadError> {
        if self.closed {
            return Err(StreamReadError::StreamClosed);
        }
        if self.shared.overflowed.swap(false, Ordering::SeqCst) {
            return Err(StreamReadError::Overflow);
        }

        let wanted = frames.max(1) * self.frame_size;
        let deadline = Instant::now() + self.read_deadline(frames.max(1));
        let mut queue = self.shared.queue.lock();

        while queue.len() < wanted {
            if self.shared.lost.load(Ordering::SeqCst) {
                break;
            }
            if self.shared.ready.wait_until(&mut queue, deadline).timed_out() {
                break;
            }
        }

        let available = queue.len().min(wanted);
        let whole = available - available % self.frame_size;
        if whole == 0 {
            return Err(if self.shared.lost.load(Ordering::SeqCst) {
                StreamReadError::DeviceUnavailable
            } else {
                StreamReadError::Timeout
            });
        }
        Ok(queue.drain(..whole).collect())
    }

    fn is_stopped(&self) -> bool {
        self.closed || self.shared.lost.load(Ordering::SeqCst)
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.holder.take() {
            handle.thread().unpark();
            let _ = handle.join();
        }
        log::debug!("Input stream closed");
    }
}

impl Drop for CpalInputStream {
    fn drop(&mut self) {
        self.close();
    }
}

/// Holder thread body: open, report, then keep the stream alive until closed.
fn hold_stream(
    target: StreamTarget,
    config: StreamConfig,
    requested: SampleFormat,
    shared: Arc<Shared>,
    running: Arc<AtomicBool>,
    opened: mpsc::SyncSender<Result<(), CaptureError>>,
) {
    let stream = match build_stream(&target, &config, requested, &shared) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = opened.send(Err(e));
            return;
        }
    };

    if let Err(e) = stream.play() {
        let _ = opened.send(Err(CaptureError::CaptureStart(format!(
            "failed to start stream on {}: {}",
            target.device_name, e
        ))));
        return;
    }
    let _ = opened.send(Ok(()));

    while running.load(Ordering::SeqCst) {
        thread::park_timeout(HOLDER_WAKE_INTERVAL);
    }
    drop(stream);
}

fn build_stream(
    target: &StreamTarget,
    config: &StreamConfig,
    requested: SampleFormat,
    shared: &Arc<Shared>,
) -> Result<cpal::Stream, CaptureError> {
    let device = resolve_device(target)?;
    let native = if target.loopback {
        device.default_output_config()
    } else {
        device.default_input_config()
    }
    .map_err(|e| CaptureError::CaptureStart(format!("no usable config on {}: {}", target.device_name, e)))?
    .sample_format();

    let data = Arc::clone(shared);
    let errors = Arc::clone(shared);
    let error_callback = move |err: cpal::StreamError| errors.on_error(err);

    let stream = match native {
        cpal::SampleFormat::I16 => device.build_input_stream(
            config,
            move |samples: &[i16], _: &cpal::InputCallbackInfo| {
                data.push(&i16_to_bytes(samples, requested));
            },
            error_callback,
            None,
        ),
        cpal::SampleFormat::F32 => device.build_input_stream(
            config,
            move |samples: &[f32], _: &cpal::InputCallbackInfo| {
                data.push(&f32_to_bytes(samples, requested));
            },
            error_callback,
            None,
        ),
        other => {
            return Err(CaptureError::CaptureStart(format!(
                "unsupported native sample format {:?} on {}",
                other, target.device_name
            )))
        }
    };

    stream.map_err(|e| CaptureError::CaptureStart(format!("failed to open {}: {}", target.device_name, e)))
}

/// Find the device again by name; cpal device handles are not kept across threads.
fn resolve_device(target: &StreamTarget) -> Result<cpal::Device, CaptureError> {
    let host = cpal::host_from_id(target.host_id)
        .map_err(|e| CaptureError::CaptureStart(format!("host {:?} unavailable: {}", target.host_id, e)))?;
    let mut devices = host
        .devices()
        .map_err(|e| CaptureError::CaptureStart(format!("failed to list devices: {}", e)))?;

    devices
        .find(|device| {
            let name_matches = device.name().map(|n| n == target.device_name).unwrap_or(false);
            let has_side = if target.loopback {
                device.default_output_config().is_ok()
            } else {
                device.default_input_config().is_ok()
            };
            name_matches && has_side
        })
        .ok_or_else(|| CaptureError::CaptureStart(format!("device {} is no longer present", target.device_name)))
}

fn i16_to_bytes(samples: &[i16], format: SampleFormat) -> Vec<u8> {
    match format {
        SampleFormat::I16 => pcm::encode_i16(samples),
        SampleFormat::F32 => {
            let floats: Vec<f32> = samples.iter().map(|&s| s as f32 / 32768.0).collect();
            pcm::encode_f32(&floats)
        }
    }
}

fn f32_to_bytes(samples: &[f32], format: SampleFormat) -> Vec<u8> {
    match format {
        SampleFormat::F32 => pcm::encode_f32(samples),
        SampleFormat::I16 => {
            let ints: Vec<i16> = samples.iter().map(|&s| pcm::f32_to_i16(s)).collect();
            pcm::encode_i16(&ints)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn i16_passthrough() {
        assert_eq!(i16_to_bytes(&[1, -2], SampleFormat::I16), vec![0x01, 0x00, 0xfe, 0xff]);
    }

    #[test]
    fn i16_widened_to_float() {
        let bytes = i16_to_bytes(&[-32768, 0, 16384], SampleFormat::F32);
        assert_eq!(pcm::decode_f32(&bytes), vec![-1.0, 0.0, 0.5]);
    }

    #[test]
    fn float_narrowed_to_i16() {
        let bytes = f32_to_bytes(&[0.0, 2.0, -2.0], SampleFormat::I16);
        let samples = pcm::decode_i16(&bytes);
        assert_eq!(samples[0], 0);
        assert_eq!(samples[1], i16::MAX);
        assert!(samples[2] <= -32767);
    }

    #[test]
    fn queue_drops_oldest_on_overflow() {
        let shared = Shared::new(4);
        shared.push(&[1, 2, 3]);
        assert!(!shared.overflowed.load(Ordering::SeqCst));
        shared.push(&[4, 5, 6]);
        assert!(shared.overflowed.load(Ordering::SeqCst));
        assert_eq!(shared.queue.lock().iter().copied().collect::<Vec<_>>(), vec![3, 4, 5, 6]);
    }

    #[test]
    fn device_loss_marks_shared_state() {
        let shared = Shared::new(16);
        shared.on_error(cpal::StreamError::DeviceNotAvailable);
        assert!(shared.lost.load(Ordering::SeqCst));
    }
}
