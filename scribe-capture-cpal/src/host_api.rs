//! Host API naming and loopback endpoint synthesis.
//!
//! cpal identifies hosts by short ids ("WASAPI", "CoreAudio"). The catalog
//! matches on the conventional full names, so every id is translated here.

use scribe_capture_core::models::device::{is_loopback_host_api, EndpointInfo};

/// Suffix appended to render endpoints re-exposed as loopback inputs.
pub const LOOPBACK_SUFFIX: &str = " [Loopback]";

/// Translate a cpal host id name into the host API name used by the catalog.
pub fn host_api_name(cpal_name: &str) -> String {
    match cpal_name {
        "WASAPI" => "Windows WASAPI",
        "ASIO" => "ASIO",
        "CoreAudio" => "Core Audio",
        "ALSA" => "ALSA",
        "JACK" => "JACK",
        "Oboe" => "AAudio",
        "WebAudio" => "Web Audio",
        other => other,
    }
    .to_string()
}

/// The loopback input that mirrors a render endpoint, if the host API can
/// capture render endpoints.
///
/// The synthesized endpoint is input-only: its input channels are the render
/// endpoint's output channels.
pub fn loopback_endpoint(render: &EndpointInfo) -> Option<EndpointInfo> {
    if render.max_output_channels == 0 || !is_loopback_host_api(&render.host_api) {
        return None;
    }

    Some(EndpointInfo {
        name: format!("{}{}", render.name, LOOPBACK_SUFFIX),
        max_input_channels: render.max_output_channels,
        max_output_channels: 0,
        default_sample_rate: render.default_sample_rate,
        host_api: render.host_api.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use scribe_capture_core::models::device::{is_loopback_endpoint, LOOPBACK_HOST_API};

    fn render(name: &str, api: &str) -> EndpointInfo {
        EndpointInfo {
            name: name.into(),
            max_input_channels: 0,
            max_output_channels: 2,
            default_sample_rate: 48000.0,
            host_api: api.into(),
        }
    }

    #[test]
    fn wasapi_maps_to_loopback_api() {
        assert_eq!(host_api_name("WASAPI"), LOOPBACK_HOST_API);
        assert_eq!(host_api_name("CoreAudio"), "Core Audio");
        assert_eq!(host_api_name("ALSA"), "ALSA");
        assert_eq!(host_api_name("PulseAudio"), "PulseAudio");
    }

    #[test]
    fn wasapi_render_gets_loopback_twin() {
        let twin = loopback_endpoint(&render("Speakers (Realtek Audio)", LOOPBACK_HOST_API)).unwrap();
        assert_eq!(twin.name, "Speakers (Realtek Audio) [Loopback]");
        assert_eq!(twin.max_input_channels, 2);
        assert_eq!(twin.max_output_channels, 0);
        assert!(is_loopback_endpoint(
            &twin.name,
            twin.max_input_channels,
            twin.max_output_channels,
            &twin.host_api
        ));
    }

    #[test]
    fn no_loopback_outside_wasapi() {
        assert!(loopback_endpoint(&render("Built-in Output", "Core Audio")).is_none());
        assert!(loopback_endpoint(&render("default", "ALSA")).is_none());
    }

    #[test]
    fn capture_only_endpoint_has_no_twin() {
        let mic = EndpointInfo {
            name: "Microphone (USB Audio)".into(),
            max_input_channels: 1,
            max_output_channels: 0,
            default_sample_rate: 48000.0,
            host_api: LOOPBACK_HOST_API.into(),
        };
        assert!(loopback_endpoint(&mic).is_none());
    }
}
