use crate::models::config::SampleFormat;

use super::pcm;

/// RMS above which a chunk counts as audible, in 16-bit sample units.
pub const AUDIO_DETECTION_THRESHOLD: f64 = 100.0;

/// RMS of a slice of samples. Empty input is silent.
pub fn rms_level(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = samples.iter().map(|s| s * s).sum();
    (sum_sq / samples.len() as f64).sqrt()
}

/// RMS of a raw chunk, scaled to 16-bit sample units for either format.
pub fn chunk_rms(data: &[u8], format: SampleFormat) -> f64 {
    let samples: Vec<f64> = match format {
        SampleFormat::I16 => pcm::decode_i16(data).into_iter().map(f64::from).collect(),
        SampleFormat::F32 => pcm::decode_f32(data)
            .into_iter()
            .map(|s| f64::from(s) * f64::from(i16::MAX))
            .collect(),
    };
    rms_level(&samples)
}

/// Whether a chunk is loud enough to count as detected audio.
pub fn is_audible(data: &[u8], format: SampleFormat) -> bool {
    chunk_rms(data, format) > AUDIO_DETECTION_THRESHOLD
}
