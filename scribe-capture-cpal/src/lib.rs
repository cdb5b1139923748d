//! # scribe-capture-cpal
//!
//! Native audio backend for scribe-capture, built on cpal.
//!
//! Provides:
//! - `CpalHost`: `AudioHost` over every cpal host (WASAPI, ASIO, Core Audio, ALSA, JACK)
//! - `CpalInputStream`: blocking reads over a callback stream held on its own thread
//! - `host_api`: host API naming and WASAPI loopback endpoints
//!
//! ## Platform Notes
//! - System-audio capture needs WASAPI. Render devices appear a second time
//!   with a `[Loopback]` suffix and capture what the device plays.
//! - Elsewhere only microphones and virtual loopback drivers are recordable.
//!
//! ## Usage
//! ```ignore
//! use std::sync::Arc;
//! use scribe_capture_core::{AudioFormat, CaptureSession, RecorderSettings};
//! use scribe_capture_cpal::CpalHost;
//!
//! let mut session = CaptureSession::new(Arc::new(CpalHost::new()), RecorderSettings::default())?;
//! session.start(None, None, AudioFormat::Wav)?;
//! // ...
//! let stats = session.stop()?;
//! ```

pub mod cpal_host;
pub mod cpal_stream;
pub mod host_api;

pub use cpal_host::CpalHost;
pub use cpal_stream::CpalInputStream;
