//! Conversions between raw little-endian chunks and typed samples.
//!
//! Trailing bytes that do not form a whole sample are ignored.

/// Decode signed 16-bit little-endian samples.
pub fn decode_i16(data: &[u8]) -> Vec<i16> {
    data.chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]))
        .collect()
}

/// Decode 32-bit float little-endian samples.
pub fn decode_f32(data: &[u8]) -> Vec<f32> {
    data.chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

/// Encode samples as 16-bit PCM, little-endian.
pub fn encode_i16(samples: &[i16]) -> Vec<u8> {
    let mut data = Vec::with_capacity(samples.len() * 2);
    for sample in samples {
        data.extend_from_slice(&sample.to_le_bytes());
    }
    data
}

/// Encode samples as 32-bit float, little-endian.
pub fn encode_f32(samples: &[f32]) -> Vec<u8> {
    let mut data = Vec::with_capacity(samples.len() * 4);
    for sample in samples {
        data.extend_from_slice(&sample.to_le_bytes());
    }
    data
}

/// Convert an f32 sample in `[-1.0, 1.0]` to i16, clamping out-of-range values.
pub fn f32_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn i16_bytes_are_little_endian() {
        let bytes = encode_i16(&[1, -2, i16::MAX]);
        assert_eq!(&bytes[..2], &[0x01, 0x00]);
        assert_eq!(decode_i16(&bytes), vec![1, -2, i16::MAX]);
    }

    #[test]
    fn odd_trailing_byte_is_ignored() {
        assert_eq!(decode_i16(&[0x10, 0x00, 0xff]), vec![16]);
        assert!(decode_f32(&[0, 0, 0]).is_empty());
    }

    #[test]
    fn f32_conversion_clamps() {
        assert_eq!(f32_to_i16(2.0), i16::MAX);
        assert_eq!(f32_to_i16(-2.0), -i16::MAX);
        assert_eq!(f32_to_i16(0.0), 0);
    }
}
