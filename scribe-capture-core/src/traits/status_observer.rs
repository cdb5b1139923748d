use std::sync::Arc;

use crate::models::error::CaptureError;
use crate::models::state::CaptureState;
use crate::models::status::StatusSnapshot;

/// Callback invoked from the capture thread with elapsed seconds after each read.
pub type ProgressCallback = Arc<dyn Fn(f64) + Send + Sync + 'static>;

/// Receives session notifications.
///
/// `on_status` fires at start, once per status interval while recording, and
/// once on completion or error. Calls come from the capture thread as well as
/// the controlling thread; keep them short.
pub trait StatusObserver: Send + Sync {
    fn on_status(&self, snapshot: &StatusSnapshot);

    fn on_state_changed(&self, _state: &CaptureState) {}

    fn on_error(&self, _error: &CaptureError) {}
}
