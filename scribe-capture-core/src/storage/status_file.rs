use std::fs;
use std::path::{Path, PathBuf};

use crate::models::error::CaptureError;
use crate::models::status::{SessionId, StatusSnapshot};
use crate::traits::status_observer::StatusObserver;

/// Writes each status snapshot to `<status_dir>/<session_id>.json`.
///
/// Write failures are logged and never reach the capture loop.
pub struct JsonStatusFile {
    path: PathBuf,
}

impl JsonStatusFile {
    pub fn new(status_dir: &Path, session_id: &SessionId) -> Self {
        Self {
            path: status_dir.join(format!("{}.json", session_id)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&self, snapshot: &StatusSnapshot) -> Result<(), CaptureError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| CaptureError::Save(format!("failed to create status directory: {}", e)))?;
        }
        let json = serde_json::to_string_pretty(snapshot)
            .map_err(|e| CaptureError::Save(format!("failed to serialize status: {}", e)))?;
        fs::write(&self.path, json)
            .map_err(|e| CaptureError::Save(format!("failed to write status: {}", e)))?;
        Ok(())
    }

    pub fn read(&self) -> Result<StatusSnapshot, CaptureError> {
        let json = fs::read_to_string(&self.path)
            .map_err(|e| CaptureError::Save(format!("failed to read status: {}", e)))?;
        serde_json::from_str(&json).map_err(|e| CaptureError::Save(format!("failed to parse status: {}", e)))
    }
}

impl StatusObserver for JsonStatusFile {
    fn on_status(&self, snapshot: &StatusSnapshot) {
        if let Err(e) = self.write(snapshot) {
            log::warn!("Status update for {} not written: {}", snapshot.session_id, e);
        }
    }
}
