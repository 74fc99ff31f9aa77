//! Gzip-or-raw payload selection

use flate2::Compression;
use flate2::write::GzEncoder;
use std::io::Write;

use crate::{Error, Result};

/// Bytes chosen to be sent for a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedPayload {
    /// Gzip bytes if they were smaller than the raw file, else the raw bytes
    pub bytes: Vec<u8>,
    /// Whether `bytes` is gzip data
    pub is_compressed: bool,
}

/// Gzip `raw` and keep whichever representation is strictly smaller.
///
/// Ties go to the raw bytes.
pub fn select_payload(raw: Vec<u8>) -> Result<SelectedPayload> {
    let compressed = gzip(&raw)?;

    tracing::debug!(
        raw = raw.len(),
        compressed = compressed.len(),
        "Compressed payload"
    );

    if compressed.len() < raw.len() {
        Ok(SelectedPayload {
            bytes: compressed,
            is_compressed: true,
        })
    } else {
        Ok(SelectedPayload {
            bytes: raw,
            is_compressed: false,
        })
    }
}

fn gzip(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).map_err(|e| {
        Error::compression(
            format!("Failed to gzip {} bytes: {}", data.len(), e),
            "The system may be out of memory",
        )
    })?;
    encoder.finish().map_err(|e| {
        Error::compression(
            format!("Failed to finish gzip stream: {}", e),
            "The system may be out of memory",
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::Read;

    fn gunzip(data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        GzDecoder::new(data).read_to_end(&mut out).unwrap();
        out
    }

    #[test]
    fn test_repetitive_data_is_compressed() {
        let raw = vec![b'a'; 10_000];
        let selected = select_payload(raw.clone()).unwrap();

        assert!(selected.is_compressed);
        assert!(selected.bytes.len() < raw.len());
        assert_eq!(gunzip(&selected.bytes), raw);
    }

    #[test]
    fn test_tiny_data_stays_raw() {
        // Gzip framing alone is larger than this
        let raw = b"hi".to_vec();
        let selected = select_payload(raw.clone()).unwrap();

        assert!(!selected.is_compressed);
        assert_eq!(selected.bytes, raw);
    }

    #[test]
    fn test_empty_data_stays_raw() {
        let selected = select_payload(Vec::new()).unwrap();

        assert!(!selected.is_compressed);
        assert!(selected.bytes.is_empty());
    }

    #[test]
    fn test_flag_matches_size_comparison() {
        let inputs: Vec<Vec<u8>> = vec![
            b"0123456789".to_vec(),
            (0..=255u8).collect(),
            b"abcabcabcabcabcabcabcabcabcabcabcabcabcabc".to_vec(),
            vec![0u8; 64],
        ];

        for raw in inputs {
            let gz_len = gzip(&raw).unwrap().len();
            let selected = select_payload(raw.clone()).unwrap();

            assert_eq!(selected.is_compressed, gz_len < raw.len());
            if selected.is_compressed {
                assert_eq!(selected.bytes.len(), gz_len);
                assert_eq!(gunzip(&selected.bytes), raw);
            } else {
                assert_eq!(selected.bytes, raw);
            }
        }
    }
}
