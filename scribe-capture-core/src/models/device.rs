use serde::{Deserialize, Serialize};

/// Host API through which loopback (render capture) endpoints are exposed.
pub const LOOPBACK_HOST_API: &str = "Windows WASAPI";

/// Lower-case name fragments that identify loopback / "what you hear" endpoints.
pub const LOOPBACK_NAME_HINTS: [&str; 6] = [
    "loopback",
    "stereo mix",
    "what u hear",
    "wave out mix",
    "speakers (",
    "headphones (",
];

/// Endpoint metadata as reported by the native audio subsystem, before
/// classification.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointInfo {
    pub name: String,
    pub max_input_channels: u16,
    pub max_output_channels: u16,
    pub default_sample_rate: f64,
    pub host_api: String,
}

/// One audio endpoint, normalized and classified.
///
/// `index` is only meaningful for the enumeration it came from; a change in
/// device topology requires a catalog refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub index: usize,
    pub name: String,
    pub max_input_channels: u16,
    pub max_output_channels: u16,
    pub default_sample_rate: f64,
    pub host_api: String,
    pub is_loopback: bool,
    pub is_default: bool,
}

impl DeviceRecord {
    /// Build a record from raw endpoint info, classifying loopback and default status.
    pub fn classify(
        index: usize,
        info: EndpointInfo,
        default_input: Option<usize>,
        default_output: Option<usize>,
    ) -> Self {
        let is_loopback = is_loopback_endpoint(
            &info.name,
            info.max_input_channels,
            info.max_output_channels,
            &info.host_api,
        );
        let is_default = default_input == Some(index) || default_output == Some(index);

        Self {
            index,
            name: info.name,
            max_input_channels: info.max_input_channels,
            max_output_channels: info.max_output_channels,
            default_sample_rate: info.default_sample_rate,
            host_api: info.host_api,
            is_loopback,
            is_default,
        }
    }

    pub fn can_record(&self) -> bool {
        self.max_input_channels > 0
    }

    pub fn is_on_loopback_api(&self) -> bool {
        is_loopback_host_api(&self.host_api)
    }

    /// Ranking used for recording-device selection: +30 native API, +20 loopback, +10 default.
    pub fn preference_score(&self) -> u32 {
        let mut score = 0;
        if self.is_on_loopback_api() {
            score += 30;
        }
        if self.is_loopback {
            score += 20;
        }
        if self.is_default {
            score += 10;
        }
        score
    }

    /// Channel count to capture with: at most stereo, mono when the device reports none.
    pub fn capture_channels(&self) -> u16 {
        if self.max_input_channels == 0 {
            1
        } else {
            self.max_input_channels.min(2)
        }
    }
}

pub fn is_loopback_host_api(host_api: &str) -> bool {
    host_api.eq_ignore_ascii_case(LOOPBACK_HOST_API)
}

/// Loopback heuristic: a name hint match, or an input-only endpoint on the
/// loopback-capable host API.
pub fn is_loopback_endpoint(name: &str, input_channels: u16, output_channels: u16, host_api: &str) -> bool {
    let name = name.to_lowercase();
    if LOOPBACK_NAME_HINTS.iter().any(|hint| name.contains(hint)) {
        return true;
    }

    input_channels > 0 && output_channels == 0 && is_loopback_host_api(host_api)
}
