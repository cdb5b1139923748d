use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::models::error::CaptureError;
use crate::models::status::SessionId;
use crate::traits::cancellation::CancellationSignal;

/// Cancellation through a marker file at `<signals_dir>/<session_id>.stop`.
///
/// Another process requests the stop by creating the file; the capture loop
/// deletes it once observed.
pub struct StopMarkerFile {
    path: PathBuf,
}

impl StopMarkerFile {
    pub fn new(signals_dir: &Path, session_id: &SessionId) -> Self {
        Self {
            path: signals_dir.join(format!("{}.stop", session_id)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the marker for `session_id`. Used by the controlling process.
    pub fn request(signals_dir: &Path, session_id: &SessionId) -> Result<PathBuf, CaptureError> {
        let marker = Self::new(signals_dir, session_id);
        fs::create_dir_all(signals_dir)
            .map_err(|e| CaptureError::Save(format!("failed to create signals directory: {}", e)))?;
        fs::write(&marker.path, b"")
            .map_err(|e| CaptureError::Save(format!("failed to write stop marker: {}", e)))?;
        Ok(marker.path)
    }
}

impl CancellationSignal for StopMarkerFile {
    fn is_requested(&self) -> bool {
        self.path.exists()
    }

    fn acknowledge(&self) {
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => log::warn!("Could not delete stop marker {}: {}", self.path.display(), e),
        }
    }
}
