use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::models::config::SampleFormat;
use crate::models::device::{EndpointInfo, LOOPBACK_HOST_API};
use crate::models::error::{CaptureError, StreamReadError};
use crate::processing::pcm;
use crate::traits::audio_host::{AudioHost, InputStream, StreamParams};

/// What a virtual stream produces on each read.
#[derive(Debug, Clone, PartialEq)]
pub enum SignalStep {
    Silence,
    /// Constant level, as a fraction of full scale.
    Tone(f32),
    Fail(StreamReadError),
}

/// A scripted endpoint.
#[derive(Debug, Clone)]
pub struct VirtualDevice {
    pub info: EndpointInfo,
    /// Steps played in order, one per read.
    pub script: Vec<SignalStep>,
    /// Played on every read after the script is exhausted.
    pub then: SignalStep,
    pub fail_query: bool,
    pub open_error: Option<String>,
}

impl VirtualDevice {
    pub fn new(name: &str, input_channels: u16, output_channels: u16, host_api: &str) -> Self {
        Self {
            info: EndpointInfo {
                name: name.to_string(),
                max_input_channels: input_channels,
                max_output_channels: output_channels,
                default_sample_rate: 48000.0,
                host_api: host_api.to_string(),
            },
            script: Vec::new(),
            then: SignalStep::Silence,
            fail_query: false,
            open_error: None,
        }
    }

    pub fn with_sample_rate(mut self, rate: f64) -> Self {
        self.info.default_sample_rate = rate;
        self
    }

    pub fn with_script(mut self, script: Vec<SignalStep>) -> Self {
        self.script = script;
        self
    }

    /// Make every read after the script produce a constant tone.
    pub fn with_tone(mut self, level: f32) -> Self {
        self.then = SignalStep::Tone(level);
        self
    }

    pub fn failing_query(mut self) -> Self {
        self.fail_query = true;
        self
    }

    pub fn failing_open(mut self, reason: &str) -> Self {
        self.open_error = Some(reason.to_string());
        self
    }
}

struct VirtualState {
    apis: Vec<String>,
    devices: Vec<VirtualDevice>,
    snapshot: Vec<VirtualDevice>,
    default_input: Option<usize>,
    default_output: Option<usize>,
    unavailable: bool,
}

/// In-memory audio subsystem with scripted devices.
///
/// Streams are paced in real time by default: each read blocks for one buffer
/// duration, like a native buffered read.
pub struct VirtualHost {
    state: Mutex<VirtualState>,
    paced: bool,
    opened: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
}

impl VirtualHost {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(VirtualState {
                apis: Vec::new(),
                devices: Vec::new(),
                snapshot: Vec::new(),
                default_input: None,
                default_output: None,
                unavailable: false,
            }),
            paced: true,
            opened: Arc::new(AtomicUsize::new(0)),
            closed: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A loopback render endpoint on WASAPI plus a plain microphone on MME.
    pub fn loopback_and_microphone() -> Self {
        Self::new()
            .with_device(VirtualDevice::new(
                "Speakers (Realtek) [Loopback]",
                2,
                0,
                LOOPBACK_HOST_API,
            ))
            .with_device(VirtualDevice::new("Microphone (USB Audio)", 1, 0, "MME"))
            .with_default_input(1)
    }

    pub fn with_device(self, device: VirtualDevice) -> Self {
        {
            let mut state = self.state.lock();
            if !state.apis.contains(&device.info.host_api) {
                state.apis.push(device.info.host_api.clone());
            }
            state.devices.push(device);
        }
        self
    }

    /// Register a host API that has no devices.
    pub fn with_host_api(self, name: &str) -> Self {
        {
            let mut state = self.state.lock();
            if !state.apis.iter().any(|api| api == name) {
                state.apis.push(name.to_string());
            }
        }
        self
    }

    pub fn with_default_input(self, index: usize) -> Self {
        self.state.lock().default_input = Some(index);
        self
    }

    pub fn with_default_output(self, index: usize) -> Self {
        self.state.lock().default_output = Some(index);
        self
    }

    pub fn without_pacing(mut self) -> Self {
        self.paced = false;
        self
    }

    /// Simulate the subsystem becoming unreachable (or coming back).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().unavailable = unavailable;
    }

    /// Topology change; visible after the next enumeration.
    pub fn add_device(&self, device: VirtualDevice) {
        let mut state = self.state.lock();
        if !state.apis.contains(&device.info.host_api) {
            state.apis.push(device.info.host_api.clone());
        }
        state.devices.push(device);
    }

    pub fn opened_streams(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed_streams(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Default for VirtualHost {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioHost for VirtualHost {
    fn host_apis(&self) -> Result<Vec<String>, CaptureError> {
        let state = self.state.lock();
        if state.unavailable {
            return Err(CaptureError::DeviceAccess("virtual subsystem unavailable".into()));
        }
        Ok(state.apis.clone())
    }

    fn enumerate(&self) -> Result<usize, CaptureError> {
        let mut state = self.state.lock();
        if state.unavailable {
            return Err(CaptureError::DeviceAccess("virtual subsystem unavailable".into()));
        }
        state.snapshot = state.devices.clone();
        Ok(state.snapshot.len())
    }

    fn endpoint_info(&self, index: usize) -> Result<EndpointInfo, CaptureError> {
        let state = self.state.lock();
        let device = state
            .snapshot
            .get(index)
            .ok_or_else(|| CaptureError::DeviceAccess(format!("no endpoint at index {}", index)))?;
        if device.fail_query {
            return Err(CaptureError::DeviceAccess(format!(
                "query failed for endpoint {}",
                index
            )));
        }
        Ok(device.info.clone())
    }

    fn default_input_index(&self) -> Option<usize> {
        self.state.lock().default_input
    }

    fn default_output_index(&self) -> Option<usize> {
        self.state.lock().default_output
    }

    fn open_input(&self, params: &StreamParams) -> Result<Box<dyn InputStream>, CaptureError> {
        let state = self.state.lock();
        if state.unavailable {
            return Err(CaptureError::CaptureStart("virtual subsystem unavailable".into()));
        }
        let device = state.snapshot.get(params.device_index).ok_or_else(|| {
            CaptureError::CaptureStart(format!("invalid device index {}", params.device_index))
        })?;
        if let Some(reason) = &device.open_error {
            return Err(CaptureError::CaptureStart(reason.clone()));
        }
        if device.info.max_input_channels == 0 {
            return Err(CaptureError::CaptureStart(format!(
                "'{}' has no input channels",
                device.info.name
            )));
        }

        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(VirtualStream {
            params: params.clone(),
            script: device.script.clone(),
            then: device.then.clone(),
            position: 0,
            paced: self.paced,
            lost: false,
            closed: false,
            closed_counter: Arc::clone(&self.closed),
        }))
    }
}

struct VirtualStream {
    params: StreamParams,
    script: Vec<SignalStep>,
    then: SignalStep,
    position: usize,
    paced: bool,
    lost: bool,
    closed: bool,
    closed_counter: Arc<AtomicUsize>,
}

impl VirtualStream {
    fn render(&self, frames: usize, level: f32) -> Vec<u8> {
        let samples = frames * self.params.channels as usize;
        match self.params.sample_format {
            SampleFormat::I16 => pcm::encode_i16(&vec![pcm::f32_to_i16(level); samples]),
            SampleFormat::F32 => pcm::encode_f32(&vec![level.clamp(-1.0, 1.0); samples]),
        }
    }
}

impl InputStream for VirtualStream {
    fn read(&mut self, frames: usize) -> Result<Vec<u8>, StreamReadError> {
        if self.closed {
            return Err(StreamReadError::StreamClosed);
        }
        if self.lost {
            return Err(StreamReadError::DeviceUnavailable);
        }
        if self.paced && self.params.sample_rate > 0 {
            thread::sleep(Duration::from_secs_f64(
                frames as f64 / self.params.sample_rate as f64,
            ));
        }

        let step = self.script.get(self.position).unwrap_or(&self.then).clone();
        self.position += 1;
        match step {
            SignalStep::Silence => Ok(self.render(frames, 0.0)),
            SignalStep::Tone(level) => Ok(self.render(frames, level)),
            SignalStep::Fail(err) => {
                if err == StreamReadError::DeviceUnavailable {
                    self.lost = true;
                }
                Err(err)
            }
        }
    }

    fn is_stopped(&self) -> bool {
        self.closed || self.lost
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.closed_counter.fetch_add(1, Ordering::SeqCst);
    }
}

impl Drop for VirtualStream {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(index: usize) -> StreamParams {
        StreamParams {
            device_index: index,
            sample_format: SampleFormat::I16,
            channels: 2,
            sample_rate: 48000,
            buffer_frames: 256,
        }
    }

    #[test]
    fn enumeration_snapshot_ignores_later_changes() {
        let host = VirtualHost::loopback_and_microphone();
        assert_eq!(host.enumerate().unwrap(), 2);

        host.add_device(VirtualDevice::new("Line In", 2, 0, "MME"));
        assert!(host.endpoint_info(2).is_err());
        assert_eq!(host.enumerate().unwrap(), 3);
        assert_eq!(host.endpoint_info(2).unwrap().name, "Line In");
    }

    #[test]
    fn unavailable_subsystem_fails_enumeration() {
        let host = VirtualHost::loopback_and_microphone();
        host.set_unavailable(true);
        assert!(matches!(host.enumerate(), Err(CaptureError::DeviceAccess(_))));
        assert!(host.host_apis().is_err());
    }

    #[test]
    fn scripted_stream_reads() {
        let host = VirtualHost::new()
            .with_device(VirtualDevice::new("Mic", 2, 0, "MME").with_script(vec![
                SignalStep::Tone(0.5),
                SignalStep::Fail(StreamReadError::Overflow),
                SignalStep::Fail(StreamReadError::DeviceUnavailable),
            ]))
            .without_pacing();
        host.enumerate().unwrap();

        let mut stream = host.open_input(&params(0)).unwrap();
        let chunk = stream.read(256).unwrap();
        assert_eq!(chunk.len(), 256 * 2 * 2);
        assert_eq!(pcm::decode_i16(&chunk)[0], pcm::f32_to_i16(0.5));

        assert_eq!(stream.read(256), Err(StreamReadError::Overflow));
        assert!(!stream.is_stopped());
        assert_eq!(stream.read(256), Err(StreamReadError::DeviceUnavailable));
        assert!(stream.is_stopped());
    }

    #[test]
    fn close_is_counted_once() {
        let host = VirtualHost::loopback_and_microphone().without_pacing();
        host.enumerate().unwrap();

        let mut stream = host.open_input(&params(0)).unwrap();
        stream.close();
        stream.close();
        drop(stream);

        assert_eq!(host.opened_streams(), 1);
        assert_eq!(host.closed_streams(), 1);
    }

    #[test]
    fn open_failure_is_capture_start() {
        let host = VirtualHost::new()
            .with_device(VirtualDevice::new("Busy Mic", 1, 0, "MME").failing_open("device busy"));
        host.enumerate().unwrap();
        assert_eq!(
            host.open_input(&params(0)).err(),
            Some(CaptureError::CaptureStart("device busy".into()))
        );
    }
}
