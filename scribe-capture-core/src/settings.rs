use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::models::config::AudioFormat;
use crate::models::error::CaptureError;
use crate::models::quality::QualityPreset;

/// Recorder-wide settings, passed explicitly to each capture session.
///
/// Directory layout under `storage_dir`:
/// ```text
/// storage/
/// ├── recordings/   ← finished audio files
/// ├── status/       ← <session_id>.json progress snapshots
/// └── signals/      ← <session_id>.stop markers
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecorderSettings {
    pub storage_dir: PathBuf,
    #[serde(skip)]
    pub recordings_dir: PathBuf,
    #[serde(skip)]
    pub status_dir: PathBuf,
    #[serde(skip)]
    pub signals_dir: PathBuf,

    /// Quality preset key; unknown keys resolve to `professional`.
    pub default_quality: String,
    pub default_format: AudioFormat,

    /// Upper bound applied to recordings started without a duration.
    pub max_manual_duration_secs: u64,
    pub status_interval_ms: u64,
    /// Sleep between capture-loop reads.
    pub poll_interval_ms: u64,
    /// How long `stop` waits for the capture loop to exit.
    pub stop_timeout_ms: u64,
}

/// On-disk form; every field is optional so partial files still load.
#[derive(Debug, Default, Deserialize)]
struct StoredSettings {
    storage_dir: Option<PathBuf>,
    recordings_dir: Option<PathBuf>,
    default_quality: Option<String>,
    default_format: Option<AudioFormat>,
    max_manual_duration_secs: Option<u64>,
    status_interval_ms: Option<u64>,
    poll_interval_ms: Option<u64>,
    stop_timeout_ms: Option<u64>,
}

impl Default for RecorderSettings {
    fn default() -> Self {
        Self::from_storage_dir(PathBuf::from("storage"))
    }
}

impl RecorderSettings {
    pub fn from_storage_dir(storage_dir: PathBuf) -> Self {
        Self {
            recordings_dir: storage_dir.join("recordings"),
            status_dir: storage_dir.join("status"),
            signals_dir: storage_dir.join("signals"),
            storage_dir,
            default_quality: QualityPreset::professional().key.to_string(),
            default_format: AudioFormat::Wav,
            max_manual_duration_secs: 7200,
            status_interval_ms: 1000,
            poll_interval_ms: 50,
            stop_timeout_ms: 5000,
        }
    }

    /// Load settings from a JSON file. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, CaptureError> {
        if !path.exists() {
            log::debug!("No settings file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| {
            CaptureError::InvalidConfiguration(format!("failed to read {}: {}", path.display(), e))
        })?;
        let stored: StoredSettings = serde_json::from_str(&content).map_err(|e| {
            CaptureError::InvalidConfiguration(format!("failed to parse {}: {}", path.display(), e))
        })?;

        // Older files only carry recordings_dir; its parent is the storage root.
        let storage_dir = stored
            .storage_dir
            .or_else(|| stored.recordings_dir.and_then(|p| p.parent().map(Path::to_path_buf)))
            .unwrap_or_else(|| PathBuf::from("storage"));

        let defaults = Self::from_storage_dir(storage_dir);
        Ok(Self {
            default_quality: stored.default_quality.unwrap_or(defaults.default_quality.clone()),
            default_format: stored.default_format.unwrap_or(defaults.default_format),
            max_manual_duration_secs: stored
                .max_manual_duration_secs
                .unwrap_or(defaults.max_manual_duration_secs),
            status_interval_ms: stored.status_interval_ms.unwrap_or(defaults.status_interval_ms),
            poll_interval_ms: stored.poll_interval_ms.unwrap_or(defaults.poll_interval_ms),
            stop_timeout_ms: stored.stop_timeout_ms.unwrap_or(defaults.stop_timeout_ms),
            ..defaults
        })
    }

    pub fn save_to(&self, path: &Path) -> Result<(), CaptureError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| CaptureError::Save(format!("failed to create settings directory: {}", e)))?;
        }
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| CaptureError::Save(format!("failed to serialize settings: {}", e)))?;
        fs::write(path, content).map_err(|e| CaptureError::Save(format!("failed to write settings: {}", e)))
    }

    pub fn ensure_directories(&self) -> Result<(), CaptureError> {
        for dir in [&self.recordings_dir, &self.status_dir, &self.signals_dir] {
            fs::create_dir_all(dir)
                .map_err(|e| CaptureError::Save(format!("failed to create {}: {}", dir.display(), e)))?;
        }
        Ok(())
    }

    pub fn quality_preset(&self) -> QualityPreset {
        QualityPreset::get(&self.default_quality)
    }

    pub fn max_manual_duration(&self) -> Duration {
        Duration::from_secs(self.max_manual_duration_secs)
    }

    pub fn status_interval(&self) -> Duration {
        Duration::from_millis(self.status_interval_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_directories() {
        let settings = RecorderSettings::from_storage_dir(PathBuf::from("/data/scribe"));
        assert_eq!(settings.recordings_dir, PathBuf::from("/data/scribe/recordings"));
        assert_eq!(settings.status_dir, PathBuf::from("/data/scribe/status"));
        assert_eq!(settings.signals_dir, PathBuf::from("/data/scribe/signals"));
        assert_eq!(settings.max_manual_duration(), Duration::from_secs(7200));
        assert_eq!(settings.status_interval(), Duration::from_secs(1));
        assert_eq!(settings.poll_interval(), Duration::from_millis(50));
        assert_eq!(settings.stop_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = RecorderSettings::load_from(&dir.path().join("absent.json")).unwrap();
        assert_eq!(settings, RecorderSettings::default());
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config").join("recorder.json");
        let mut settings = RecorderSettings::from_storage_dir(dir.path().join("storage"));
        settings.default_quality = "high".into();
        settings.default_format = AudioFormat::M4a;
        settings.poll_interval_ms = 10;

        settings.save_to(&path).unwrap();
        assert_eq!(RecorderSettings::load_from(&path).unwrap(), settings);
    }

    #[test]
    fn legacy_recordings_dir_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.json");
        fs::write(&path, r#"{"recordings_dir": "/srv/meetings/recordings"}"#).unwrap();

        let settings = RecorderSettings::load_from(&path).unwrap();
        assert_eq!(settings.storage_dir, PathBuf::from("/srv/meetings"));
        assert_eq!(settings.default_quality, "professional");
    }

    #[test]
    fn malformed_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            RecorderSettings::load_from(&path),
            Err(CaptureError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn ensure_directories_creates_layout() {
        let dir = tempfile::tempdir().unwrap();
        let settings = RecorderSettings::from_storage_dir(dir.path().join("storage"));
        settings.ensure_directories().unwrap();
        assert!(settings.recordings_dir.is_dir());
        assert!(settings.status_dir.is_dir());
        assert!(settings.signals_dir.is_dir());
    }

    #[test]
    fn unknown_quality_resolves_to_professional() {
        let mut settings = RecorderSettings::default();
        settings.default_quality = "ultra".into();
        assert_eq!(settings.quality_preset(), QualityPreset::professional());
    }
}
