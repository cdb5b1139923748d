use thiserror::Error;

/// Errors that can occur during device discovery, capture, and encoding.
///
/// Clonable so a failure can be stored in [`CaptureState::Failed`] and in the
/// session's last-error slot while also being returned to the caller.
///
/// [`CaptureState::Failed`]: crate::models::state::CaptureState::Failed
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// The audio subsystem could not be reached or queried.
    #[error("audio device access failed: {0}")]
    DeviceAccess(String),

    /// The loopback-capable host API is missing on this machine.
    /// Enumeration may still work; system-audio capture will not.
    #[error("native loopback capture API unavailable: {0}")]
    NativeCaptureApiUnavailable(String),

    /// Auto-configuration found no device with input channels.
    #[error("no recording-capable audio device found")]
    NoDeviceAvailable,

    #[error("a recording is already in progress or this session was already used")]
    AlreadyRecording,

    #[error("no recording to stop")]
    NothingToStop,

    /// The capture stream could not be opened (busy, invalid parameters, disconnected).
    #[error("failed to start capture: {0}")]
    CaptureStart(String),

    #[error("invalid capture configuration: {0}")]
    InvalidConfiguration(String),

    /// No transcoding backend is installed. Install `ffmpeg` to enable m4a output.
    #[error("compressed encoding unavailable: {0}")]
    CompressedEncodingUnavailable(String),

    #[error("failed to save recording: {0}")]
    Save(String),
}

impl CaptureError {
    /// Whether the error stems from enumerating or querying devices.
    pub fn is_device_access(&self) -> bool {
        matches!(
            self,
            Self::DeviceAccess(_) | Self::NativeCaptureApiUnavailable(_) | Self::NoDeviceAvailable
        )
    }

    /// Misuse guards that are rejected before any state changes.
    pub fn is_misuse(&self) -> bool {
        matches!(self, Self::AlreadyRecording | Self::NothingToStop)
    }
}

/// Failure of a single buffered read on an open input stream.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StreamReadError {
    #[error("device unavailable")]
    DeviceUnavailable,

    #[error("stream closed")]
    StreamClosed,

    #[error("input overflow")]
    Overflow,

    #[error("read timed out")]
    Timeout,

    #[error("backend error: {0}")]
    Backend(String),
}

impl StreamReadError {
    /// Fatal errors end the capture loop; everything else is retried on the next iteration.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::DeviceUnavailable | Self::StreamClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_loss_is_fatal() {
        assert!(StreamReadError::DeviceUnavailable.is_fatal());
        assert!(StreamReadError::StreamClosed.is_fatal());
    }

    #[test]
    fn transient_read_errors_are_not_fatal() {
        assert!(!StreamReadError::Overflow.is_fatal());
        assert!(!StreamReadError::Timeout.is_fatal());
        assert!(!StreamReadError::Backend("glitch".into()).is_fatal());
    }

    #[test]
    fn no_device_counts_as_device_access() {
        assert!(CaptureError::NoDeviceAvailable.is_device_access());
        assert!(!CaptureError::CaptureStart("busy".into()).is_device_access());
    }

    #[test]
    fn misuse_guards() {
        assert!(CaptureError::AlreadyRecording.is_misuse());
        assert!(CaptureError::NothingToStop.is_misuse());
        assert!(!CaptureError::Save("disk full".into()).is_misuse());
    }
}
