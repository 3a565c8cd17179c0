//! Checksummed record frames for append-only files.
//!
//! ## Frame Format
//!
//! - 4 bytes: payload length (u32, little-endian)
//! - 4 bytes: CRC32 of the payload (u32, little-endian)
//! - N bytes: CBOR payload
//!
//! A frame is written with a single append, so after a crash only the last
//! frame of a file can be damaged. Readers stop at the first damaged frame
//! and report how many bytes were valid.

use crate::error::{CodecError, CodecResult};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Size of the frame header in bytes.
pub const FRAME_HEADER_LEN: usize = 8;

/// Encodes a value as one frame.
pub fn encode_frame<T: Serialize>(value: &T) -> CodecResult<Vec<u8>> {
    let mut payload = Vec::new();
    ciborium::ser::into_writer(value, &mut payload)
        .map_err(|e| CodecError::encoding_failed(e.to_string()))?;

    let len = u32::try_from(payload.len())
        .map_err(|_| CodecError::encoding_failed("frame payload exceeds 4 GiB"))?;

    let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + payload.len());
    frame.extend_from_slice(&len.to_le_bytes());
    frame.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Sequential reader over a buffer of frames.
#[derive(Debug)]
pub struct FrameReader<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl<'a> FrameReader<'a> {
    /// Creates a reader positioned at the start of `buf`.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, offset: 0 }
    }

    /// End offset of the last frame read successfully.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Returns the next payload, or `None` at a clean end of input.
    pub fn next_payload(&mut self) -> CodecResult<Option<&'a [u8]>> {
        let rest = &self.buf[self.offset..];
        if rest.is_empty() {
            return Ok(None);
        }
        if rest.len() < FRAME_HEADER_LEN {
            return Err(CodecError::UnexpectedEof {
                offset: self.offset,
            });
        }

        let len = u32::from_le_bytes([rest[0], rest[1], rest[2], rest[3]]) as usize;
        let expected = u32::from_le_bytes([rest[4], rest[5], rest[6], rest[7]]);
        let end = FRAME_HEADER_LEN + len;
        if rest.len() < end {
            return Err(CodecError::UnexpectedEof {
                offset: self.offset,
            });
        }

        let payload = &rest[FRAME_HEADER_LEN..end];
        let actual = crc32fast::hash(payload);
        if actual != expected {
            return Err(CodecError::ChecksumMismatch {
                offset: self.offset,
                expected,
                actual,
            });
        }

        self.offset += end;
        Ok(Some(payload))
    }

    /// Decodes the next frame into `T`.
    pub fn next_value<T: DeserializeOwned>(&mut self) -> CodecResult<Option<T>> {
        match self.next_payload()? {
            Some(payload) => decode_payload(payload).map(Some),
            None => Ok(None),
        }
    }
}

/// Decodes a frame payload.
pub fn decode_payload<T: DeserializeOwned>(payload: &[u8]) -> CodecResult<T> {
    ciborium::de::from_reader(payload).map_err(|e| CodecError::decoding_failed(e.to_string()))
}
