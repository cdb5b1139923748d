use std::fmt;

use chrono::Local;
use serde::{Deserialize, Serialize};

/// Identifier of one recording session, used to key status and stop-marker files.
///
/// Format: `rec-<YYYYmmdd_HHMMSS>-<8 hex>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn generate() -> Self {
        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        Self(format!("rec-{}-{}", stamp, &suffix[..8]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusTag {
    Recording,
    Completed,
    Error,
}

/// Progress record handed to status observers.
///
/// Field names match the JSON consumed by the frontend process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub status: StatusTag,
    pub session_id: SessionId,
    pub filename: String,
    /// Configured duration in seconds, 0 when unbounded.
    pub duration: u64,
    pub elapsed: f64,
    /// 0..=100, always 0 when unbounded.
    pub progress: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<String>,
    pub device: String,
    pub sample_rate: u32,
    pub channels: u16,
    pub frames_captured: u64,
    pub has_audio: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size_mb: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StatusSnapshot {
    /// Progress percentage of `elapsed` against a bounded `duration`.
    pub fn progress_for(elapsed: f64, duration: u64) -> u8 {
        if duration == 0 {
            return 0;
        }
        let pct = (elapsed / duration as f64 * 100.0).floor();
        pct.clamp(0.0, 100.0) as u8
    }
}
