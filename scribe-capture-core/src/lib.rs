//! # scribe-capture-core
//!
//! Platform-agnostic core of the meeting recorder.
//!
//! Finds a capture endpoint (system loopback preferred, microphone as
//! fallback), records it on a background thread, and encodes the result to
//! WAV or m4a. Native audio backends implement the `AudioHost` trait and plug
//! into `DeviceCatalog` and `CaptureSession`.
//!
//! ## Architecture
//!
//! ```text
//! scribe-capture-core (this crate)
//! ├── traits/       ← AudioHost, InputStream, CancellationSignal, StatusObserver
//! ├── models/       ← CaptureError, CaptureState, DeviceRecord, CaptureConfiguration, QualityPreset, etc.
//! ├── catalog/      ← DeviceCatalog, DeviceSelector
//! ├── processing/   ← PCM decoding, RMS level detection
//! ├── session/      ← CaptureSession + capture loop
//! ├── storage/      ← Encoder (hound / ffmpeg), status file, stop marker
//! ├── host/         ← VirtualHost (scripted, in-memory)
//! └── settings      ← RecorderSettings
//! ```

pub mod catalog;
pub mod host;
pub mod models;
pub mod processing;
pub mod session;
pub mod settings;
pub mod storage;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use catalog::device_catalog::DeviceCatalog;
pub use catalog::selector::DeviceSelector;
pub use host::virtual_host::{SignalStep, VirtualDevice, VirtualHost};
pub use models::config::{AudioFormat, CaptureConfiguration, SampleFormat};
pub use models::device::{DeviceRecord, EndpointInfo, LOOPBACK_HOST_API};
pub use models::error::{CaptureError, StreamReadError};
pub use models::quality::QualityPreset;
pub use models::state::CaptureState;
pub use models::stats::{ExitReason, RecordingStatistics};
pub use models::status::{SessionId, StatusSnapshot, StatusTag};
pub use session::recorder::CaptureSession;
pub use settings::RecorderSettings;
pub use storage::encoder::{EncodedFile, Encoder, Transcoder};
pub use storage::status_file::JsonStatusFile;
pub use storage::stop_marker::StopMarkerFile;
pub use traits::audio_host::{AudioHost, InputStream, StreamParams};
pub use traits::cancellation::{CancellationFlag, CancellationSignal};
pub use traits::status_observer::{ProgressCallback, StatusObserver};
