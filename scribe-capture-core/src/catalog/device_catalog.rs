use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::device::{is_loopback_host_api, DeviceRecord, LOOPBACK_HOST_API};
use crate::models::error::CaptureError;
use crate::traits::audio_host::AudioHost;

/// Enumerates and classifies the endpoints of one [`AudioHost`].
///
/// The device list is cached on first use and only re-read on an explicit
/// refresh. Each catalog owns its cache; nothing is shared between sessions.
pub struct DeviceCatalog {
    host: Arc<dyn AudioHost>,
    cache: Mutex<Option<Enumeration>>,
    loopback_supported: bool,
}

/// One enumeration pass: records plus the default indices that refer into it.
#[derive(Debug, Clone)]
struct Enumeration {
    devices: Vec<DeviceRecord>,
    default_input: Option<usize>,
    default_output: Option<usize>,
}

impl DeviceCatalog {
    /// Create a catalog that requires the loopback-capable host API.
    ///
    /// Fails with [`CaptureError::NativeCaptureApiUnavailable`] when the host
    /// lacks it, or [`CaptureError::DeviceAccess`] when the host cannot be queried.
    pub fn new(host: Arc<dyn AudioHost>) -> Result<Self, CaptureError> {
        let apis = host.host_apis()?;
        if !apis.iter().any(|api| is_loopback_host_api(api)) {
            return Err(CaptureError::NativeCaptureApiUnavailable(format!(
                "'{}' not found among host APIs [{}]",
                LOOPBACK_HOST_API,
                apis.join(", ")
            )));
        }

        log::info!("Device catalog initialized ({} host APIs)", apis.len());
        Ok(Self {
            host,
            cache: Mutex::new(None),
            loopback_supported: true,
        })
    }

    /// Create a catalog without requiring loopback support. System-audio
    /// capture may not work; microphones still do.
    pub fn allow_microphone_only(host: Arc<dyn AudioHost>) -> Self {
        let loopback_supported = host
            .host_apis()
            .map(|apis| apis.iter().any(|api| is_loopback_host_api(api)))
            .unwrap_or(false);

        Self {
            host,
            cache: Mutex::new(None),
            loopback_supported,
        }
    }

    pub fn host(&self) -> &Arc<dyn AudioHost> {
        &self.host
    }

    pub fn supports_loopback(&self) -> bool {
        self.loopback_supported
    }

    /// All endpoints, from cache unless `refresh` is set or nothing is cached yet.
    pub fn list_devices(&self, refresh: bool) -> Result<Vec<DeviceRecord>, CaptureError> {
        Ok(self.enumeration(refresh)?.devices)
    }

    fn enumeration(&self, refresh: bool) -> Result<Enumeration, CaptureError> {
        let mut cache = self.cache.lock();
        if !refresh {
            if let Some(enumeration) = cache.as_ref() {
                return Ok(enumeration.clone());
            }
        }

        let enumeration = self.enumerate_devices()?;
        *cache = Some(enumeration.clone());
        Ok(enumeration)
    }

    fn enumerate_devices(&self) -> Result<Enumeration, CaptureError> {
        let count = self.host.enumerate()?;
        let default_input = self.host.default_input_index();
        let default_output = self.host.default_output_index();

        let mut devices = Vec::with_capacity(count);
        for index in 0..count {
            match self.host.endpoint_info(index) {
                Ok(info) => {
                    devices.push(DeviceRecord::classify(index, info, default_input, default_output))
                }
                Err(e) => log::warn!("Skipping endpoint {}: {}", index, e),
            }
        }

        log::debug!("Enumerated {} of {} endpoints", devices.len(), count);
        Ok(Enumeration {
            devices,
            default_input,
            default_output,
        })
    }

    /// The endpoint to use for "what you hear" capture, if any.
    ///
    /// Loopback devices win (default first, else enumeration order); then
    /// output devices on the loopback-capable API (default first).
    pub fn get_default_speakers(&self) -> Result<Option<DeviceRecord>, CaptureError> {
        let devices = self.list_devices(false)?;

        let loopbacks: Vec<&DeviceRecord> = devices.iter().filter(|d| d.is_loopback).collect();
        if let Some(device) = prefer_default(&loopbacks) {
            return Ok(Some(device.clone()));
        }

        let outputs: Vec<&DeviceRecord> = devices
            .iter()
            .filter(|d| d.is_on_loopback_api() && d.max_output_channels > 0)
            .collect();
        Ok(prefer_default(&outputs).cloned())
    }

    pub fn get_device_by_index(&self, index: usize) -> Result<Option<DeviceRecord>, CaptureError> {
        Ok(self
            .list_devices(false)?
            .into_iter()
            .find(|d| d.index == index))
    }

    /// Devices whose host API name contains `api_name` (case-insensitive).
    pub fn get_devices_by_api(&self, api_name: &str) -> Result<Vec<DeviceRecord>, CaptureError> {
        let needle = api_name.to_lowercase();
        Ok(self
            .list_devices(false)?
            .into_iter()
            .filter(|d| d.host_api.to_lowercase().contains(&needle))
            .collect())
    }

    pub fn get_system_default_input(&self) -> Result<Option<DeviceRecord>, CaptureError> {
        let enumeration = self.enumeration(false)?;
        Ok(find_index(enumeration.devices, enumeration.default_input))
    }

    pub fn get_system_default_output(&self) -> Result<Option<DeviceRecord>, CaptureError> {
        let enumeration = self.enumeration(false)?;
        Ok(find_index(enumeration.devices, enumeration.default_output))
    }

    /// Devices with input channels, best first. Equal scores keep enumeration order.
    pub fn get_recording_capable_devices(&self) -> Result<Vec<DeviceRecord>, CaptureError> {
        let mut devices: Vec<DeviceRecord> = self
            .list_devices(false)?
            .into_iter()
            .filter(DeviceRecord::can_record)
            .collect();
        // sort_by_key is stable
        devices.sort_by_key(|d| std::cmp::Reverse(d.preference_score()));
        Ok(devices)
    }
}

fn find_index(devices: Vec<DeviceRecord>, index: Option<usize>) -> Option<DeviceRecord> {
    let index = index?;
    devices.into_iter().find(|d| d.index == index)
}

fn prefer_default<'a>(candidates: &[&'a DeviceRecord]) -> Option<&'a DeviceRecord> {
    candidates
        .iter()
        .find(|d| d.is_default)
        .or_else(|| candidates.first())
        .copied()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use crate::host::virtual_host::{VirtualDevice, VirtualHost};
    use crate::models::device::EndpointInfo;
    use crate::traits::audio_host::{InputStream, StreamParams};

    fn catalog(host: VirtualHost) -> DeviceCatalog {
        DeviceCatalog::new(Arc::new(host)).unwrap()
    }

    #[test]
    fn loopback_scenario() {
        let catalog = catalog(VirtualHost::loopback_and_microphone());

        let speakers = catalog.get_default_speakers().unwrap().unwrap();
        assert_eq!(speakers.name, "Speakers (Realtek) [Loopback]");
        assert!(speakers.is_loopback);

        let recording = catalog.get_recording_capable_devices().unwrap();
        assert_eq!(recording.len(), 2);
        assert_eq!(recording[0].name, "Speakers (Realtek) [Loopback]");
        assert_eq!(recording[1].name, "Microphone (USB Audio)");
    }

    #[test]
    fn missing_native_api_is_distinct_error() {
        let host = Arc::new(VirtualHost::new().with_device(VirtualDevice::new("Mic", 1, 0, "MME")));
        let err = DeviceCatalog::new(host.clone()).err().unwrap();
        assert!(matches!(err, CaptureError::NativeCaptureApiUnavailable(_)));

        let fallback = DeviceCatalog::allow_microphone_only(host);
        assert!(!fallback.supports_loopback());
        assert_eq!(fallback.list_devices(false).unwrap().len(), 1);
    }

    #[test]
    fn unreachable_subsystem_is_device_access() {
        let host = VirtualHost::loopback_and_microphone();
        host.set_unavailable(true);
        let err = DeviceCatalog::new(Arc::new(host)).err().unwrap();
        assert!(matches!(err, CaptureError::DeviceAccess(_)));
    }

    #[test]
    fn failed_endpoint_is_skipped() {
        let catalog = catalog(
            VirtualHost::loopback_and_microphone()
                .with_device(VirtualDevice::new("Broken", 2, 0, "MME").failing_query()),
        );
        let devices = catalog.list_devices(false).unwrap();
        assert_eq!(devices.len(), 2);
        assert!(devices.iter().all(|d| d.name != "Broken"));
    }

    #[test]
    fn cache_is_kept_until_refresh() {
        let host = Arc::new(VirtualHost::loopback_and_microphone());
        let catalog = DeviceCatalog::new(host.clone()).unwrap();
        let first = catalog.list_devices(false).unwrap();

        host.add_device(VirtualDevice::new("Line In", 2, 0, "MME"));
        assert_eq!(catalog.list_devices(false).unwrap(), first);
        assert_eq!(catalog.list_devices(true).unwrap().len(), 3);
    }

    #[test]
    fn enumeration_failure_after_init() {
        let host = Arc::new(VirtualHost::loopback_and_microphone());
        let catalog = DeviceCatalog::new(host.clone()).unwrap();
        host.set_unavailable(true);
        assert!(catalog.list_devices(true).unwrap_err().is_device_access());
    }

    #[test]
    fn recording_order_is_stable() {
        let catalog = catalog(
            VirtualHost::new()
                .with_device(VirtualDevice::new("Mic A", 1, 0, "MME"))
                .with_device(VirtualDevice::new("Render", 0, 2, LOOPBACK_HOST_API))
                .with_device(VirtualDevice::new("Mic B", 1, 0, "MME"))
                .with_device(VirtualDevice::new("Stereo Mix", 2, 0, "MME"))
                .with_device(VirtualDevice::new("Mic C", 1, 0, "MME"))
                .with_device(VirtualDevice::new("Capture", 2, 2, LOOPBACK_HOST_API)),
        );

        let names: Vec<String> = catalog
            .get_recording_capable_devices()
            .unwrap()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, ["Capture", "Stereo Mix", "Mic A", "Mic B", "Mic C"]);

        let scores: Vec<u32> = catalog
            .get_recording_capable_devices()
            .unwrap()
            .iter()
            .map(DeviceRecord::preference_score)
            .collect();
        assert!(scores.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn default_speakers_prefers_default_loopback() {
        let catalog = catalog(
            VirtualHost::new()
                .with_device(VirtualDevice::new("Stereo Mix", 2, 0, "MME"))
                .with_device(VirtualDevice::new("Headphones (USB) [Loopback]", 2, 0, LOOPBACK_HOST_API))
                .with_default_output(1),
        );
        assert_eq!(
            catalog.get_default_speakers().unwrap().unwrap().name,
            "Headphones (USB) [Loopback]"
        );
    }

    #[test]
    fn default_speakers_falls_back_to_native_output() {
        let catalog = catalog(
            VirtualHost::new()
                .with_device(VirtualDevice::new("Mic", 1, 0, "MME"))
                .with_device(VirtualDevice::new("Realtek Output", 0, 2, LOOPBACK_HOST_API))
                .with_device(VirtualDevice::new("HDMI Output", 0, 2, LOOPBACK_HOST_API))
                .with_default_output(2),
        );
        assert_eq!(catalog.get_default_speakers().unwrap().unwrap().name, "HDMI Output");
    }

    #[test]
    fn default_speakers_absent() {
        let catalog = catalog(
            VirtualHost::new()
                .with_host_api(LOOPBACK_HOST_API)
                .with_device(VirtualDevice::new("Mic", 1, 0, "MME")),
        );
        assert_eq!(catalog.get_default_speakers().unwrap(), None);
    }

    #[test]
    fn projections() {
        let catalog = catalog(VirtualHost::loopback_and_microphone().with_default_output(0));

        assert_eq!(catalog.get_device_by_index(1).unwrap().unwrap().name, "Microphone (USB Audio)");
        assert_eq!(catalog.get_device_by_index(9).unwrap(), None);
        assert_eq!(catalog.get_devices_by_api("wasapi").unwrap().len(), 1);
        assert_eq!(catalog.get_devices_by_api("ASIO").unwrap().len(), 0);
        assert_eq!(catalog.get_system_default_input().unwrap().unwrap().index, 1);
        assert_eq!(catalog.get_system_default_output().unwrap().unwrap().index, 0);
    }

    #[test]
    fn classification_is_idempotent_without_refresh() {
        let catalog = catalog(VirtualHost::loopback_and_microphone());
        let a = catalog.list_devices(false).unwrap();
        let b = catalog.list_devices(false).unwrap();
        assert_eq!(a, b);
        assert!(a[0].is_loopback);
        assert!(!a[1].is_loopback);
    }

    /// Reports default devices only for the snapshot taken by `enumerate`.
    #[derive(Default)]
    struct SnapshotHost {
        enumerated: AtomicBool,
    }

    impl AudioHost for SnapshotHost {
        fn host_apis(&self) -> Result<Vec<String>, CaptureError> {
            Ok(vec![LOOPBACK_HOST_API.to_string()])
        }

        fn enumerate(&self) -> Result<usize, CaptureError> {
            self.enumerated.store(true, Ordering::SeqCst);
            Ok(2)
        }

        fn endpoint_info(&self, index: usize) -> Result<EndpointInfo, CaptureError> {
            let (name, input, output) = if index == 0 { ("Mic", 1, 0) } else { ("Speakers", 0, 2) };
            Ok(EndpointInfo {
                name: name.into(),
                max_input_channels: input,
                max_output_channels: output,
                default_sample_rate: 48000.0,
                host_api: LOOPBACK_HOST_API.into(),
            })
        }

        fn default_input_index(&self) -> Option<usize> {
            self.enumerated.load(Ordering::SeqCst).then_some(0)
        }

        fn default_output_index(&self) -> Option<usize> {
            self.enumerated.load(Ordering::SeqCst).then_some(1)
        }

        fn open_input(&self, _params: &StreamParams) -> Result<Box<dyn InputStream>, CaptureError> {
            Err(CaptureError::CaptureStart("not supported".into()))
        }
    }

    #[test]
    fn system_defaults_on_fresh_catalog() {
        let catalog = DeviceCatalog::new(Arc::new(SnapshotHost::default())).unwrap();
        assert_eq!(catalog.get_system_default_input().unwrap().unwrap().name, "Mic");

        let catalog = DeviceCatalog::new(Arc::new(SnapshotHost::default())).unwrap();
        assert_eq!(catalog.get_system_default_output().unwrap().unwrap().name, "Speakers");
    }
}
