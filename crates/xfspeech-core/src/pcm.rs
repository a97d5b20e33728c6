//! Conversions between 16-bit signed samples and the little-endian byte
//! layout the service speaks (`audio/L16`).

pub fn samples_to_bytes(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

/// A trailing odd byte is dropped.
pub fn bytes_to_samples(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_samples_to_bytes_little_endian() {
        let bytes = samples_to_bytes(&[1, -1, 0x1234]);
        assert_eq!(bytes, vec![0x01, 0x00, 0xff, 0xff, 0x34, 0x12]);
    }

    #[test]
    fn test_bytes_to_samples_extremes() {
        let samples = bytes_to_samples(&[0x00, 0x80, 0xff, 0x7f]);
        assert_eq!(samples, vec![i16::MIN, i16::MAX]);
    }

    #[test]
    fn test_bytes_to_samples_drops_trailing_byte() {
        let samples = bytes_to_samples(&[0x02, 0x00, 0x09]);
        assert_eq!(samples, vec![2]);
    }

    #[test]
    fn test_empty_input() {
        assert!(samples_to_bytes(&[]).is_empty());
        assert!(bytes_to_samples(&[]).is_empty());
    }
}
