use crate::models::device::DeviceRecord;
use crate::models::error::CaptureError;

use super::device_catalog::DeviceCatalog;

/// Picks the device used for unattended recording.
pub struct DeviceSelector<'a> {
    catalog: &'a DeviceCatalog,
}

impl<'a> DeviceSelector<'a> {
    pub fn new(catalog: &'a DeviceCatalog) -> Self {
        Self { catalog }
    }

    /// Highest-ranked recording-capable device, or `None` when the host has none.
    pub fn best_recording_device(&self) -> Result<Option<DeviceRecord>, CaptureError> {
        let candidates = self.catalog.get_recording_capable_devices()?;
        Ok(pick(&candidates).cloned())
    }
}

/// First candidate, unless it reports no input channels; then the first one that does.
pub fn pick(candidates: &[DeviceRecord]) -> Option<&DeviceRecord> {
    let first = candidates.first()?;
    if first.can_record() {
        return Some(first);
    }

    log::warn!("Device {} has no input channels, searching for alternative", first.name);
    candidates.iter().find(|d| d.can_record())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::host::virtual_host::{VirtualDevice, VirtualHost};
    use crate::models::device::LOOPBACK_HOST_API;

    fn record(index: usize, name: &str, input: u16) -> DeviceRecord {
        DeviceRecord {
            index,
            name: name.into(),
            max_input_channels: input,
            max_output_channels: 0,
            default_sample_rate: 48000.0,
            host_api: "MME".into(),
            is_loopback: false,
            is_default: false,
        }
    }

    #[test]
    fn picks_first_candidate() {
        let candidates = [record(0, "A", 2), record(1, "B", 1)];
        assert_eq!(pick(&candidates).unwrap().name, "A");
    }

    #[test]
    fn skips_zero_input_head() {
        let candidates = [record(0, "Ghost", 0), record(1, "Ghost 2", 0), record(2, "Mic", 1)];
        assert_eq!(pick(&candidates).unwrap().name, "Mic");
    }

    #[test]
    fn nothing_usable() {
        assert!(pick(&[]).is_none());
        assert!(pick(&[record(0, "Ghost", 0)]).is_none());
    }

    #[test]
    fn prefers_loopback_over_microphone() {
        let catalog = DeviceCatalog::new(Arc::new(VirtualHost::loopback_and_microphone())).unwrap();
        let best = DeviceSelector::new(&catalog).best_recording_device().unwrap().unwrap();
        assert_eq!(best.name, "Speakers (Realtek) [Loopback]");
    }

    #[test]
    fn output_only_host_has_no_recording_device() {
        let catalog = DeviceCatalog::new(Arc::new(
            VirtualHost::new().with_device(VirtualDevice::new("Speakers", 0, 2, LOOPBACK_HOST_API)),
        ))
        .unwrap();
        assert_eq!(DeviceSelector::new(&catalog).best_recording_device().unwrap(), None);
    }
}
