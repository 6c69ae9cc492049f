//! Threshold OPRF claim types.

use crate::redaction::REDACTION_CHAR;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Domain separator mixed into every nullifier this crate requests.
pub const TOPRF_DOMAIN_SEPARATOR: &str = "tls-witness";

/// Byte range `[from_index, from_index + length)` local to a block or chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataLocation {
    pub from_index: usize,
    pub length: usize,
}

impl DataLocation {
    pub fn new(from_index: usize, length: usize) -> Self {
        Self { from_index, length }
    }

    /// One past the last byte, `None` when the location overflows.
    pub fn end(&self) -> Option<usize> {
        self.from_index.checked_add(self.length)
    }

    /// `from_index..end` when the location fits inside `len` bytes.
    pub fn range_within(&self, len: usize) -> Option<Range<usize>> {
        let end = self.end()?;
        (end <= len).then_some(self.from_index..end)
    }

    /// Shift the location so it is relative to `base`.
    pub fn rebase(&self, base: usize) -> Option<Self> {
        self.from_index
            .checked_sub(base)
            .map(|from_index| Self::new(from_index, self.length))
    }
}

/// Blinding factor of an OPRF request. Never serialized, zeroed on drop.
#[derive(Clone, Default, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct OprfMask(Vec<u8>);

impl OprfMask {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for OprfMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OprfMask(..)")
    }
}

/// Partial evaluation returned by one OPRF server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OprfResponse {
    pub server_index: u32,
    pub public_key_share: Vec<u8>,
    pub evaluated: Vec<u8>,
}

/// OPRF commitment replacing a sensitive range of plaintext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToprfClaim {
    pub nullifier: Vec<u8>,
    pub responses: Vec<OprfResponse>,
    #[serde(skip)]
    pub mask: OprfMask,
    pub data_location: DataLocation,
}

impl ToprfClaim {
    /// Same claim with its location replaced.
    pub fn at(&self, data_location: DataLocation) -> Self {
        Self {
            data_location,
            ..self.clone()
        }
    }
}

/// Printable encoding of a nullifier sized to exactly `len` bytes.
///
/// Base64 of the nullifier, truncated, or padded with the redaction byte.
pub fn nullifier_to_printable(nullifier: &[u8], len: usize) -> Vec<u8> {
    let mut encoded = STANDARD.encode(nullifier).into_bytes();
    encoded.resize(len, REDACTION_CHAR);
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_printable_truncates() {
        let printable = nullifier_to_printable(&[0xab; 32], 5);
        assert_eq!(printable.len(), 5);
        assert!(printable.iter().all(|b| b.is_ascii_graphic()));
    }

    #[test]
    fn test_printable_pads_with_redaction_char() {
        let printable = nullifier_to_printable(&[1, 2, 3], 10);
        assert_eq!(&printable[..4], b"AQID");
        assert!(printable[4..].iter().all(|b| *b == REDACTION_CHAR));
    }

    #[test]
    fn test_mask_is_not_serialized() {
        let claim = ToprfClaim {
            nullifier: vec![1; 32],
            responses: vec![],
            mask: OprfMask::new(vec![9; 32]),
            data_location: DataLocation::new(3, 4),
        };
        let json = serde_json::to_value(&claim).unwrap();
        assert!(json.get("mask").is_none());

        let decoded: ToprfClaim = serde_json::from_value(json).unwrap();
        assert!(decoded.mask.as_bytes().is_empty());
        assert_eq!(decoded.nullifier, claim.nullifier);
    }

    #[test]
    fn test_location_rebase() {
        let loc = DataLocation::new(90, 6);
        assert_eq!(loc.rebase(80), Some(DataLocation::new(10, 6)));
        assert_eq!(loc.rebase(100), None);
        assert_eq!(loc.range_within(96), Some(90..96));
        assert_eq!(loc.range_within(95), None);
    }

    #[test]
    fn test_location_overflow_never_fits() {
        let loc = DataLocation::new(usize::MAX, 2);
        assert_eq!(loc.end(), None);
        assert_eq!(loc.range_within(usize::MAX), None);
    }
}
