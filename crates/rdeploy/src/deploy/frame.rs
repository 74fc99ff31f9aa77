//! Length-prefixed framing
//!
//! A frame is a little-endian `u32` byte count followed by exactly that many
//! payload bytes. One frame is sent per connection.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{Error, Result};

/// Size of the length prefix in bytes
pub const HEADER_LEN: usize = 4;

/// A serialized record together with its length prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    header: [u8; HEADER_LEN],
    payload: Vec<u8>,
}

impl Frame {
    /// Frame a serialized record
    ///
    /// Fails if the payload does not fit a `u32` length.
    pub fn new(payload: Vec<u8>) -> Result<Self> {
        let length = u32::try_from(payload.len()).map_err(|_| {
            Error::encoding(
                format!("Record of {} bytes is too large to frame", payload.len()),
                "Frames are limited to 4 GiB",
            )
        })?;

        Ok(Self {
            header: length.to_le_bytes(),
            payload,
        })
    }

    /// Payload length as announced in the header
    pub fn length(&self) -> u32 {
        u32::from_le_bytes(self.header)
    }

    /// The 4 length bytes
    pub fn header(&self) -> &[u8; HEADER_LEN] {
        &self.header
    }

    /// The serialized record
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Total number of bytes on the wire
    pub fn wire_len(&self) -> usize {
        HEADER_LEN + self.payload.len()
    }

    /// Header and payload as one contiguous buffer
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.wire_len());
        bytes.extend_from_slice(&self.header);
        bytes.extend_from_slice(&self.payload);
        bytes
    }

    /// Write the length bytes, then the payload bytes
    pub async fn write_to<W: AsyncWrite + Unpin>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_all(&self.header).await?;
        writer.write_all(&self.payload).await?;
        writer.flush().await
    }
}

/// Read one frame and return its payload
///
/// `max_len` bounds the announced length so a garbage header cannot make the
/// reader allocate gigabytes.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R, max_len: u32) -> Result<Vec<u8>> {
    let mut header = [0u8; HEADER_LEN];
    reader.read_exact(&mut header).await?;

    let length = u32::from_le_bytes(header);
    if length > max_len {
        return Err(Error::decoding(
            format!("Frame announces {} bytes, limit is {}", length, max_len),
            "The sender may not speak the rdeploy protocol",
        ));
    }

    let mut payload = vec![0u8; length as usize];
    reader.read_exact(&mut payload).await.map_err(|e| {
        Error::decoding(
            format!("Frame truncated, expected {} bytes: {}", length, e),
            "The connection was closed before the whole record arrived",
        )
    })?;

    Ok(payload)
}
