use crate::models::config::SampleFormat;
use crate::models::device::EndpointInfo;
use crate::models::error::{CaptureError, StreamReadError};

/// Parameters for opening an input stream on one endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamParams {
    /// Index into the host's current enumeration.
    pub device_index: usize,
    pub sample_format: SampleFormat,
    pub channels: u16,
    pub sample_rate: u32,
    /// Frames per buffered read.
    pub buffer_frames: usize,
}

/// The native audio subsystem, narrowed to what discovery and capture need.
///
/// Implemented by:
/// - `CpalHost` (scribe-capture-cpal)
/// - `VirtualHost` (in-memory, scripted)
///
/// Indices returned by `enumerate` stay valid until the next call to `enumerate`.
pub trait AudioHost: Send + Sync {
    /// Names of the host APIs present on this machine.
    fn host_apis(&self) -> Result<Vec<String>, CaptureError>;

    /// Take a fresh snapshot of the endpoint topology and return its size.
    ///
    /// Fails with [`CaptureError::DeviceAccess`] when the subsystem is unreachable.
    fn enumerate(&self) -> Result<usize, CaptureError>;

    /// Query one endpoint of the current snapshot.
    fn endpoint_info(&self, index: usize) -> Result<EndpointInfo, CaptureError>;

    fn default_input_index(&self) -> Option<usize>;

    fn default_output_index(&self) -> Option<usize>;

    /// Open a blocking input stream. The stream is owned by the caller and
    /// released by [`InputStream::close`] or on drop.
    fn open_input(&self, params: &StreamParams) -> Result<Box<dyn InputStream>, CaptureError>;
}

/// A buffered, blocking input stream.
pub trait InputStream: Send {
    /// Read `frames` interleaved little-endian frames. Blocks for roughly one
    /// buffer duration.
    fn read(&mut self, frames: usize) -> Result<Vec<u8>, StreamReadError>;

    /// Whether the stream has stopped delivering audio (closed or device lost).
    fn is_stopped(&self) -> bool;

    /// Stop and release the native stream. Safe to call more than once.
    fn close(&mut self);
}
