//! The JSON record describing one deployed file

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};
use std::io::Read;

use crate::{Error, Result};

use super::compress::SelectedPayload;

/// A file as it travels over the wire
///
/// Serialized as `{"name": .., "isCompressed": .., "data": ..}` with `data`
/// holding the base64 of either the raw or the gzip-compressed file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteFileRecord {
    /// Path relative to the deployment root, `/`-separated
    pub name: String,
    /// Whether `data` decodes to gzip bytes
    pub is_compressed: bool,
    /// Base64 payload
    pub data: String,
}

impl RemoteFileRecord {
    /// Build a record from a wire name and the selected payload
    pub fn new(name: impl Into<String>, payload: &SelectedPayload) -> Self {
        Self {
            name: name.into(),
            is_compressed: payload.is_compressed,
            data: BASE64.encode(&payload.bytes),
        }
    }

    /// Serialize the record as UTF-8 JSON
    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| {
            Error::encoding(
                format!("Failed to serialize record for '{}': {}", self.name, e),
                "This is likely a bug in rdeploy",
            )
        })
    }

    /// Parse a record from UTF-8 JSON
    pub fn from_json(json: &[u8]) -> Result<Self> {
        serde_json::from_slice(json).map_err(|e| {
            Error::decoding(
                format!("Failed to parse record: {}", e),
                "The sender may not speak the rdeploy protocol",
            )
        })
    }

    /// Recover the original file contents
    ///
    /// Decodes the base64 `data` and gunzips it when `is_compressed` is set.
    pub fn decode_contents(&self) -> Result<Vec<u8>> {
        let bytes = BASE64.decode(&self.data).map_err(|e| {
            Error::decoding(
                format!("Invalid base64 data for '{}': {}", self.name, e),
                "The record payload is corrupted",
            )
        })?;

        if !self.is_compressed {
            return Ok(bytes);
        }

        let mut contents = Vec::new();
        GzDecoder::new(&bytes[..])
            .read_to_end(&mut contents)
            .map_err(|e| {
                Error::decoding(
                    format!("Invalid gzip data for '{}': {}", self.name, e),
                    "The record payload is corrupted",
                )
            })?;
        Ok(contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deploy::compress::select_payload;

    #[test]
    fn test_json_field_names_and_order() {
        let payload = SelectedPayload {
            bytes: b"hello".to_vec(),
            is_compressed: false,
        };
        let record = RemoteFileRecord::new("dir/hello.txt", &payload);
        let json = String::from_utf8(record.to_json().unwrap()).unwrap();

        assert_eq!(
            json,
            r#"{"name":"dir/hello.txt","isCompressed":false,"data":"aGVsbG8="}"#
        );
    }

    #[test]
    fn test_compressed_contents_round_trip() {
        let original = b"line\n".repeat(500);
        let payload = select_payload(original.clone()).unwrap();
        assert!(payload.is_compressed);

        let record = RemoteFileRecord::new("logs/app.log", &payload);
        let parsed = RemoteFileRecord::from_json(&record.to_json().unwrap()).unwrap();

        assert_eq!(parsed, record);
        assert_eq!(parsed.decode_contents().unwrap(), original);
    }

    #[test]
    fn test_non_ascii_name_is_utf8() {
        let payload = SelectedPayload {
            bytes: Vec::new(),
            is_compressed: false,
        };
        let record = RemoteFileRecord::new("données/é.txt", &payload);
        let json = record.to_json().unwrap();

        assert!(std::str::from_utf8(&json).unwrap().contains("données/é.txt"));
    }

    #[test]
    fn test_corrupted_data_fails_to_decode() {
        let record = RemoteFileRecord {
            name: "a".to_string(),
            is_compressed: true,
            data: BASE64.encode(b"not gzip"),
        };
        assert!(matches!(
            record.decode_contents(),
            Err(Error::Decoding { .. })
        ));

        let record = RemoteFileRecord {
            name: "a".to_string(),
            is_compressed: false,
            data: "%%%".to_string(),
        };
        assert!(matches!(
            record.decode_contents(),
            Err(Error::Decoding { .. })
        ));
    }
}
