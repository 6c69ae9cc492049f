//! CBOR encoding and length-prefixed framing for wire messages.
//!
//! A frame is a 4-byte big-endian body length followed by the CBOR body.

use crate::error::ProtocolError;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

/// Largest frame body accepted.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

const LENGTH_PREFIX: usize = 4;

/// Serialization errors.
#[derive(Debug, Error)]
pub enum SerializationError {
    /// CBOR encoding failed.
    #[error("CBOR encoding failed: {0}")]
    Encode(String),

    /// CBOR decoding failed.
    #[error("CBOR decoding failed: {0}")]
    Decode(String),

    #[error("frame of {len} bytes exceeds limit of {max}")]
    FrameTooLarge { len: usize, max: usize },

    #[error("frame truncated: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },
}

impl From<SerializationError> for ProtocolError {
    fn from(err: SerializationError) -> Self {
        match err {
            SerializationError::Encode(_) => ProtocolError::internal(err.to_string()),
            _ => ProtocolError::bad_request(err.to_string()),
        }
    }
}

/// Serialize to CBOR bytes.
pub fn to_cbor<T: Serialize>(value: &T) -> Result<Vec<u8>, SerializationError> {
    let mut bytes = Vec::new();
    ciborium::into_writer(value, &mut bytes)
        .map_err(|e| SerializationError::Encode(format!("{:?}", e)))?;
    Ok(bytes)
}

/// Deserialize from CBOR bytes.
pub fn from_cbor<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, SerializationError> {
    ciborium::from_reader(bytes).map_err(|e| SerializationError::Decode(format!("{:?}", e)))
}

/// Encode `value` as one length-prefixed frame.
pub fn encode_frame<T: Serialize>(value: &T) -> Result<Vec<u8>, SerializationError> {
    let body = to_cbor(value)?;
    if body.len() > MAX_FRAME_LEN {
        return Err(SerializationError::FrameTooLarge {
            len: body.len(),
            max: MAX_FRAME_LEN,
        });
    }

    let mut frame = Vec::with_capacity(LENGTH_PREFIX + body.len());
    frame.extend_from_slice(&(body.len() as u32).to_be_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}

/// Decode a single frame. Trailing bytes after the body are rejected.
pub fn decode_frame<T: DeserializeOwned>(frame: &[u8]) -> Result<T, SerializationError> {
    if frame.len() < LENGTH_PREFIX {
        return Err(SerializationError::Truncated {
            expected: LENGTH_PREFIX,
            actual: frame.len(),
        });
    }

    let mut prefix = [0u8; LENGTH_PREFIX];
    prefix.copy_from_slice(&frame[..LENGTH_PREFIX]);
    let len = u32::from_be_bytes(prefix) as usize;
    if len > MAX_FRAME_LEN {
        return Err(SerializationError::FrameTooLarge {
            len,
            max: MAX_FRAME_LEN,
        });
    }

    let body = &frame[LENGTH_PREFIX..];
    if body.len() != len {
        return Err(SerializationError::Truncated {
            expected: len,
            actual: body.len(),
        });
    }
    from_cbor(body)
}
