use std::fs::{self, File};
use std::io::{self, Cursor, Seek, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;

use sha2::{Digest, Sha256};

use crate::models::config::{AudioFormat, CaptureConfiguration, SampleFormat};
use crate::models::error::CaptureError;
use crate::processing::pcm;

/// AAC bitrate used for m4a output.
pub const AAC_BITRATE: &str = "256k";

/// A finished recording on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedFile {
    pub path: PathBuf,
    pub file_size: u64,
    /// Hex SHA-256 of the file contents.
    pub checksum: String,
}

/// Turns the captured frame buffer into a finished file.
#[derive(Debug, Clone, Default)]
pub struct Encoder {
    transcoder: Transcoder,
}

impl Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_transcoder(transcoder: Transcoder) -> Self {
        Self { transcoder }
    }

    /// Write `frames` to `path` in the configured container and report size and checksum.
    pub fn encode(
        &self,
        frames: &[Vec<u8>],
        config: &CaptureConfiguration,
        path: &Path,
    ) -> Result<EncodedFile, CaptureError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| CaptureError::Save(format!("failed to create directory: {}", e)))?;
        }

        match config.format {
            AudioFormat::Wav => write_wav(frames, config, path)?,
            AudioFormat::M4a => write_compressed(frames, config, path, &self.transcoder)?,
        }

        let file_size = fs::metadata(path)
            .map_err(|e| CaptureError::Save(format!("failed to stat {}: {}", path.display(), e)))?
            .len();
        let checksum = sha256_file(path)?;

        Ok(EncodedFile {
            path: path.to_path_buf(),
            file_size,
            checksum,
        })
    }
}

/// Write an uncompressed WAV with the captured parameters, frames in append order.
pub fn write_wav(frames: &[Vec<u8>], config: &CaptureConfiguration, path: &Path) -> Result<(), CaptureError> {
    let file = File::create(path)
        .map_err(|e| CaptureError::Save(format!("failed to create {}: {}", path.display(), e)))?;
    write_wav_to(io::BufWriter::new(file), frames, config)
}

/// Render the frame buffer to an in-memory WAV image.
pub fn render_wav(frames: &[Vec<u8>], config: &CaptureConfiguration) -> Result<Vec<u8>, CaptureError> {
    let mut buffer = Cursor::new(Vec::new());
    write_wav_to(&mut buffer, frames, config)?;
    Ok(buffer.into_inner())
}

/// Transcode the frame buffer to AAC in an MP4 container.
///
/// Fails with [`CaptureError::CompressedEncodingUnavailable`] when the
/// transcoder binary is not installed.
pub fn write_compressed(
    frames: &[Vec<u8>],
    config: &CaptureConfiguration,
    path: &Path,
    transcoder: &Transcoder,
) -> Result<(), CaptureError> {
    let wav = render_wav(frames, config)?;
    transcoder.transcode(&wav, path)
}

fn wav_spec(config: &CaptureConfiguration) -> hound::WavSpec {
    hound::WavSpec {
        channels: config.channels,
        sample_rate: config.sample_rate,
        bits_per_sample: config.sample_format.bits_per_sample(),
        sample_format: match config.sample_format {
            SampleFormat::I16 => hound::SampleFormat::Int,
            SampleFormat::F32 => hound::SampleFormat::Float,
        },
    }
}

fn write_wav_to<W: Write + Seek>(
    target: W,
    frames: &[Vec<u8>],
    config: &CaptureConfiguration,
) -> Result<(), CaptureError> {
    let save_err = |e: hound::Error| CaptureError::Save(format!("WAV write failed: {}", e));

    let mut writer = hound::WavWriter::new(target, wav_spec(config)).map_err(save_err)?;
    let data = frames.concat();
    match config.sample_format {
        SampleFormat::I16 => {
            for sample in pcm::decode_i16(&data) {
                writer.write_sample(sample).map_err(save_err)?;
            }
        }
        SampleFormat::F32 => {
            for sample in pcm::decode_f32(&data) {
                writer.write_sample(sample).map_err(save_err)?;
            }
        }
    }
    writer.finalize().map_err(save_err)
}

/// External `ffmpeg` process that converts a WAV image to m4a.
#[derive(Debug, Clone)]
pub struct Transcoder {
    program: PathBuf,
}

impl Default for Transcoder {
    fn default() -> Self {
        Self {
            program: PathBuf::from("ffmpeg"),
        }
    }
}

impl Transcoder {
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn args(output: &Path) -> Vec<String> {
        vec![
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-f".to_string(),
            "wav".to_string(),
            "-i".to_string(),
            "pipe:0".to_string(),
            "-c:a".to_string(),
            "aac".to_string(),
            "-b:a".to_string(),
            AAC_BITRATE.to_string(),
            "-movflags".to_string(),
            "+faststart".to_string(),
            "-y".to_string(),
            output.to_string_lossy().to_string(),
        ]
    }

    /// Pipe `wav` through the transcoder into `destination`.
    pub fn transcode(&self, wav: &[u8], destination: &Path) -> Result<(), CaptureError> {
        let mut child = Command::new(&self.program)
            .args(Self::args(destination))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == io::ErrorKind::NotFound {
                    CaptureError::CompressedEncodingUnavailable(format!(
                        "'{}' not found; install ffmpeg to record m4a",
                        self.program.display()
                    ))
                } else {
                    CaptureError::Save(format!("failed to start transcoder: {}", e))
                }
            })?;

        let stdin = child.stdin.take();
        // Feed stdin from a helper thread so a chatty stderr cannot stall the pipe.
        let (write_result, output) = thread::scope(|scope| {
            let writer = scope.spawn(move || match stdin {
                Some(mut stdin) => stdin.write_all(wav),
                None => Err(io::Error::new(io::ErrorKind::BrokenPipe, "transcoder stdin unavailable")),
            });
            let output = child.wait_with_output();
            let write_result = writer
                .join()
                .unwrap_or_else(|_| Err(io::Error::other("transcoder writer panicked")));
            (write_result, output)
        });

        let output = output.map_err(|e| CaptureError::Save(format!("transcoder failed: {}", e)))?;
        if !output.status.success() {
            return Err(CaptureError::Save(format!(
                "transcoder exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        write_result.map_err(|e| CaptureError::Save(format!("failed to pipe audio to transcoder: {}", e)))?;

        log::debug!("Transcoded {} bytes of WAV to {}", wav.len(), destination.display());
        Ok(())
    }
}

/// Compute SHA-256 hex digest of a file.
pub fn sha256_file(path: &Path) -> Result<String, CaptureError> {
    let mut file = File::open(path)
        .map_err(|e| CaptureError::Save(format!("failed to read file for checksum: {}", e)))?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)
        .map_err(|e| CaptureError::Save(format!("failed to read file for checksum: {}", e)))?;
    Ok(hex_encode(&hasher.finalize()))
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::device::DeviceRecord;

    fn config(channels: u16, sample_format: SampleFormat, dir: &Path) -> CaptureConfiguration {
        let device = DeviceRecord {
            index: 0,
            name: "Mic".into(),
            max_input_channels: channels,
            max_output_channels: 0,
            default_sample_rate: 16000.0,
            host_api: "MME".into(),
            is_loopback: false,
            is_default: true,
        };
        let mut config = CaptureConfiguration::for_device(device, dir.to_path_buf());
        config.sample_format = sample_format;
        config
    }

    #[test]
    fn wav_preserves_parameters_and_order() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(2, SampleFormat::I16, dir.path());
        let frames = vec![pcm::encode_i16(&[1, 2, 3, 4]), pcm::encode_i16(&[5, 6])];
        let path = dir.path().join("out.wav");

        write_wav(&frames, &config, &path).unwrap();

        let mut reader = hound::WavReader::open(&path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 2);
        assert_eq!(spec.sample_rate, 16000);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(reader.duration(), 3);
        let samples: Vec<i16> = reader.samples::<i16>().map(Result::unwrap).collect();
        assert_eq!(samples, [1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn float_wav() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(1, SampleFormat::F32, dir.path());
        let path = dir.path().join("float.wav");

        write_wav(&[pcm::encode_f32(&[0.25, -0.5])], &config, &path).unwrap();

        let mut reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().sample_format, hound::SampleFormat::Float);
        let samples: Vec<f32> = reader.samples::<f32>().map(Result::unwrap).collect();
        assert_eq!(samples, [0.25, -0.5]);
    }

    #[test]
    fn in_memory_image_matches_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(1, SampleFormat::I16, dir.path());
        let frames = vec![pcm::encode_i16(&[7; 32])];
        let path = dir.path().join("a.wav");

        write_wav(&frames, &config, &path).unwrap();
        assert_eq!(render_wav(&frames, &config).unwrap(), fs::read(&path).unwrap());
    }

    #[test]
    fn encode_reports_size_and_checksum() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(1, SampleFormat::I16, dir.path());
        let path = dir.path().join("nested").join("b.wav");

        let encoded = Encoder::new().encode(&[pcm::encode_i16(&[0; 100])], &config, &path).unwrap();

        assert_eq!(encoded.file_size, 44 + 200);
        assert_eq!(encoded.checksum.len(), 64);
        assert_eq!(encoded.checksum, sha256_file(&path).unwrap());
    }

    #[test]
    fn missing_transcoder_is_distinct_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(1, SampleFormat::I16, dir.path()).with_format(AudioFormat::M4a);
        let encoder = Encoder::with_transcoder(Transcoder::with_program(
            dir.path().join("no-such-ffmpeg"),
        ));

        let err = encoder
            .encode(&[pcm::encode_i16(&[0; 10])], &config, &dir.path().join("c.m4a"))
            .unwrap_err();
        assert!(matches!(err, CaptureError::CompressedEncodingUnavailable(_)));
    }

    #[cfg(unix)]
    #[test]
    fn failing_transcoder_is_save_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(1, SampleFormat::I16, dir.path());

        let err = Transcoder::with_program("false")
            .transcode(&render_wav(&[], &config).unwrap(), &dir.path().join("d.m4a"))
            .unwrap_err();
        assert!(matches!(err, CaptureError::Save(_)));
    }

    #[test]
    fn transcoder_arguments() {
        let args = Transcoder::args(Path::new("out.m4a"));
        let joined = args.join(" ");
        assert!(joined.contains("-i pipe:0"));
        assert!(joined.contains("-c:a aac -b:a 256k"));
        assert!(joined.contains("-movflags +faststart"));
        assert_eq!(args.last().unwrap(), "out.m4a");
    }
}
