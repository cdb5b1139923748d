//! `AudioHost` over every cpal host available on this machine.
//!
//! Each enumeration walks all hosts and records one endpoint per device with
//! its input and output channel counts. On WASAPI every render device also
//! gets a `[Loopback]` twin that captures what it plays.

use cpal::traits::{DeviceTrait, HostTrait};
use cpal::HostId;
use parking_lot::Mutex;

use scribe_capture_core::models::device::EndpointInfo;
use scribe_capture_core::models::error::CaptureError;
use scribe_capture_core::traits::audio_host::{AudioHost, InputStream, StreamParams};

use crate::cpal_stream::{CpalInputStream, StreamTarget};
use crate::host_api::{host_api_name, loopback_endpoint};

#[derive(Debug, Clone)]
struct Endpoint {
    host_id: HostId,
    device_name: String,
    loopback: bool,
    info: Result<EndpointInfo, String>,
}

#[derive(Debug, Default)]
struct Snapshot {
    endpoints: Vec<Endpoint>,
    default_input: Option<usize>,
    default_output: Option<usize>,
}

/// Native audio host backed by cpal.
pub struct CpalHost {
    snapshot: Mutex<Snapshot>,
}

impl CpalHost {
    pub fn new() -> Self {
        Self {
            snapshot: Mutex::new(Snapshot::default()),
        }
    }
}

impl Default for CpalHost {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioHost for CpalHost {
    fn host_apis(&self) -> Result<Vec<String>, CaptureError> {
        Ok(cpal::available_hosts()
            .iter()
            .map(|id| host_api_name(id.name()))
            .collect())
    }

    fn enumerate(&self) -> Result<usize, CaptureError> {
        let mut endpoints = Vec::new();
        let mut reachable = 0;

        for host_id in cpal::available_hosts() {
            let host = match cpal::host_from_id(host_id) {
                Ok(host) => host,
                Err(e) => {
                    log::warn!("Audio host {} unavailable: {}", host_id.name(), e);
                    continue;
                }
            };
            let devices = match host.devices() {
                Ok(devices) => devices,
                Err(e) => {
                    log::warn!("Failed to list {} devices: {}", host_id.name(), e);
                    continue;
                }
            };
            reachable += 1;

            let api = host_api_name(host_id.name());
            for device in devices {
                endpoints.extend(describe(host_id, &api, &device));
            }
        }

        if reachable == 0 {
            return Err(CaptureError::DeviceAccess(
                "no audio host could be enumerated".into(),
            ));
        }

        let host = cpal::default_host();
        let default_id = host.id();
        let default_input = host
            .default_input_device()
            .and_then(|d| d.name().ok())
            .and_then(|name| position_of(&endpoints, default_id, &name, true));
        let default_output = host
            .default_output_device()
            .and_then(|d| d.name().ok())
            .and_then(|name| position_of(&endpoints, default_id, &name, false));

        let count = endpoints.len();
        log::debug!(
            "Enumerated {} endpoints (default input {:?}, default output {:?})",
            count,
            default_input,
            default_output
        );

        *self.snapshot.lock() = Snapshot {
            endpoints,
            default_input,
            default_output,
        };
        Ok(count)
    }

    fn endpoint_info(&self, index: usize) -> Result<EndpointInfo, CaptureError> {
        let snapshot = self.snapshot.lock();
        let endpoint = snapshot
            .endpoints
            .get(index)
            .ok_or_else(|| CaptureError::DeviceAccess(format!("no endpoint at index {}", index)))?;

        endpoint.info.clone().map_err(|e| {
            CaptureError::DeviceAccess(format!("failed to query endpoint {}: {}", index, e))
        })
    }

    fn default_input_index(&self) -> Option<usize> {
        self.snapshot.lock().default_input
    }

    fn default_output_index(&self) -> Option<usize> {
        self.snapshot.lock().default_output
    }

    fn open_input(&self, params: &StreamParams) -> Result<Box<dyn InputStream>, CaptureError> {
        let target = {
            let snapshot = self.snapshot.lock();
            let endpoint = snapshot.endpoints.get(params.device_index).ok_or_else(|| {
                CaptureError::CaptureStart(format!("no endpoint at index {}", params.device_index))
            })?;
            StreamTarget {
                host_id: endpoint.host_id,
                device_name: endpoint.device_name.clone(),
                loopback: endpoint.loopback,
            }
        };

        Ok(Box::new(CpalInputStream::open(target, params)?))
    }
}

/// Endpoints for one device: the device itself, plus its loopback twin where
/// the host API supports render capture.
fn describe(host_id: HostId, api: &str, device: &cpal::Device) -> Vec<Endpoint> {
    let name = match device.name() {
        Ok(name) => name,
        Err(e) => {
            return vec![Endpoint {
                host_id,
                device_name: String::new(),
                loopback: false,
                info: Err(e.to_string()),
            }]
        }
    };

    let input = device.default_input_config().ok();
    let output = device.default_output_config().ok();
    let info = match input.as_ref().or(output.as_ref()) {
        None => Err("no supported stream configuration".to_string()),
        Some(default) => {
            let max_input = device
                .supported_input_configs()
                .ok()
                .and_then(|configs| configs.map(|c| c.channels()).max());
            let max_output = device
                .supported_output_configs()
                .ok()
                .and_then(|configs| configs.map(|c| c.channels()).max());

            Ok(EndpointInfo {
                name: name.clone(),
                max_input_channels: max_input.or(input.as_ref().map(|c| c.channels())).unwrap_or(0),
                max_output_channels: max_output.or(output.as_ref().map(|c| c.channels())).unwrap_or(0),
                default_sample_rate: default.sample_rate().0 as f64,
                host_api: api.to_string(),
            })
        }
    };

    let twin = info.as_ref().ok().and_then(loopback_endpoint).map(|info| Endpoint {
        host_id,
        device_name: name.clone(),
        loopback: true,
        info: Ok(info),
    });

    let mut endpoints = vec![Endpoint {
        host_id,
        device_name: name,
        loopback: false,
        info,
    }];
    endpoints.extend(twin);
    endpoints
}

/// Index of the non-loopback endpoint named `name` on `host_id` that has the
/// requested direction.
fn position_of(endpoints: &[Endpoint], host_id: HostId, name: &str, input: bool) -> Option<usize> {
    endpoints.iter().position(|e| {
        let direction = match &e.info {
            Ok(info) if input => info.max_input_channels > 0,
            Ok(info) => info.max_output_channels > 0,
            Err(_) => false,
        };
        e.host_id == host_id && !e.loopback && e.device_name == name && direction
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use scribe_capture_core::models::config::SampleFormat;

    fn endpoint(host_id: HostId, name: &str, input: u16, output: u16, loopback: bool) -> Endpoint {
        Endpoint {
            host_id,
            device_name: name.into(),
            loopback,
            info: Ok(EndpointInfo {
                name: name.into(),
                max_input_channels: input,
                max_output_channels: output,
                default_sample_rate: 48000.0,
                host_api: "Windows WASAPI".into(),
            }),
        }
    }

    #[test]
    fn defaults_skip_loopback_twins() {
        let id = cpal::default_host().id();
        let endpoints = vec![
            endpoint(id, "Speakers", 0, 2, false),
            endpoint(id, "Speakers", 2, 0, true),
            endpoint(id, "Microphone", 1, 0, false),
        ];
        assert_eq!(position_of(&endpoints, id, "Speakers", false), Some(0));
        assert_eq!(position_of(&endpoints, id, "Speakers", true), None);
        assert_eq!(position_of(&endpoints, id, "Microphone", true), Some(2));
    }

    #[test]
    fn failed_endpoints_never_default() {
        let id = cpal::default_host().id();
        let endpoints = vec![Endpoint {
            host_id: id,
            device_name: "Broken".into(),
            loopback: false,
            info: Err("query failed".into()),
        }];
        assert_eq!(position_of(&endpoints, id, "Broken", true), None);
    }

    #[test]
    fn empty_snapshot_before_enumeration() {
        let host = CpalHost::new();
        assert!(matches!(host.endpoint_info(0), Err(CaptureError::DeviceAccess(_))));
        assert_eq!(host.default_input_index(), None);
        assert_eq!(host.default_output_index(), None);

        let params = StreamParams {
            device_index: 0,
            sample_format: SampleFormat::I16,
            channels: 1,
            sample_rate: 48000,
            buffer_frames: 1024,
        };
        assert!(matches!(host.open_input(&params), Err(CaptureError::CaptureStart(_))));
    }

    #[test]
    fn host_apis_are_translated() {
        let host = CpalHost::new();
        let apis = host.host_apis().unwrap();
        assert_eq!(apis.len(), cpal::available_hosts().len());
        assert!(!apis.iter().any(|api| api == "WASAPI"));
    }
}
