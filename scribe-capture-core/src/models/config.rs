use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::device::DeviceRecord;
use super::error::CaptureError;
use super::quality::QualityPreset;

/// Extensions removed from a caller-supplied filename before the container
/// extension is appended.
const KNOWN_EXTENSIONS: [&str; 3] = [".wav", ".m4a", ".mp4"];

/// Container/codec of the finished recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    #[default]
    Wav,
    /// AAC in an MP4 container.
    M4a,
}

impl AudioFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Wav => "wav",
            Self::M4a => "m4a",
        }
    }

    pub fn codec(&self) -> &'static str {
        match self {
            Self::Wav => "pcm",
            Self::M4a => "aac",
        }
    }

    /// Strip any recognized audio extension from `name` and append this format's.
    pub fn normalize_filename(&self, name: &str) -> String {
        let lower = name.to_lowercase();
        let stem = KNOWN_EXTENSIONS
            .iter()
            .find(|ext| lower.ends_with(*ext))
            .map(|ext| &name[..name.len() - ext.len()])
            .unwrap_or(name);
        format!("{}.{}", stem, self.extension())
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for AudioFormat {
    type Err = CaptureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "wav" => Ok(Self::Wav),
            "m4a" | "aac" => Ok(Self::M4a),
            other => Err(CaptureError::InvalidConfiguration(format!(
                "unsupported audio format '{}', expected wav or m4a",
                other
            ))),
        }
    }
}

/// Sample encoding of the raw chunks delivered by an input stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleFormat {
    /// Signed 16-bit little-endian.
    #[default]
    I16,
    /// 32-bit float little-endian, nominal range [-1.0, 1.0].
    F32,
}

impl SampleFormat {
    /// Bytes per sample.
    pub fn sample_size(&self) -> usize {
        match self {
            Self::I16 => 2,
            Self::F32 => 4,
        }
    }

    pub fn bits_per_sample(&self) -> u16 {
        (self.sample_size() * 8) as u16
    }
}

/// Configuration for one capture session. Built before recording starts and
/// not changed while recording.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureConfiguration {
    pub device: DeviceRecord,

    /// Sample rate in Hz.
    pub sample_rate: u32,

    /// 1 = mono, 2 = stereo interleaved.
    pub channels: u16,

    /// Frames requested per buffered read.
    pub buffer_frames: usize,

    pub sample_format: SampleFormat,

    /// Maximum recording duration (None = unbounded).
    pub max_duration: Option<Duration>,

    /// Directory where recording files are written (created if absent).
    pub output_dir: PathBuf,

    pub format: AudioFormat,
}

impl CaptureConfiguration {
    /// Configuration for `device` at its default sample rate with the
    /// professional buffer size.
    pub fn for_device(device: DeviceRecord, output_dir: PathBuf) -> Self {
        let preset = QualityPreset::professional();
        let sample_rate = if device.default_sample_rate >= 1.0 {
            device.default_sample_rate.round() as u32
        } else {
            preset.sample_rate
        };
        let channels = device.capture_channels();

        Self {
            device,
            sample_rate,
            channels,
            buffer_frames: preset.buffer_frames,
            sample_format: SampleFormat::I16,
            max_duration: None,
            output_dir,
            format: AudioFormat::Wav,
        }
    }

    /// Apply a quality preset. Channels never exceed what the device can capture.
    pub fn with_preset(mut self, preset: &QualityPreset) -> Self {
        self.sample_rate = preset.sample_rate;
        self.channels = preset.channels.min(self.device.capture_channels());
        self.buffer_frames = preset.buffer_frames;
        self
    }

    pub fn with_format(mut self, format: AudioFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_max_duration(mut self, max_duration: Option<Duration>) -> Self {
        self.max_duration = max_duration;
        self
    }

    /// Wall-clock length of one buffered read.
    pub fn buffer_duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.buffer_frames as f64 / self.sample_rate as f64)
    }

    /// Size in bytes of one interleaved frame.
    pub fn frame_size(&self) -> usize {
        self.channels as usize * self.sample_format.sample_size()
    }

    pub fn validate(&self) -> Result<(), CaptureError> {
        if self.sample_rate == 0 {
            return Err(CaptureError::InvalidConfiguration("sample rate must be positive".into()));
        }
        if ![1, 2].contains(&self.channels) {
            return Err(CaptureError::InvalidConfiguration(format!(
                "unsupported channel count: {}",
                self.channels
            )));
        }
        if self.buffer_frames == 0 {
            return Err(CaptureError::InvalidConfiguration("buffer size must be positive".into()));
        }
        if self.max_duration == Some(Duration::ZERO) {
            return Err(CaptureError::InvalidConfiguration("max duration must be positive".into()));
        }
        Ok(())
    }
}
