//! Byte-level redaction helpers shared by the planner, prover and verifier.

use crate::error::{ProtocolError, ProtocolResult};
use serde::{Deserialize, Serialize};

/// Sentinel written over every redacted byte.
pub const REDACTION_CHAR: u8 = b'*';

/// How a redacted range is disclosed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RedactionKind {
    /// Replaced by sentinel bytes.
    Blackout,
    /// Replaced by the printable encoding of an OPRF nullifier.
    Hash,
}

/// `[from_index, to_index)` over one direction's concatenated plaintext.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RedactionRange {
    pub from_index: usize,
    pub to_index: usize,
    pub kind: RedactionKind,
}

impl RedactionRange {
    pub fn blackout(from_index: usize, to_index: usize) -> Self {
        Self {
            from_index,
            to_index,
            kind: RedactionKind::Blackout,
        }
    }

    pub fn hash(from_index: usize, to_index: usize) -> Self {
        Self {
            from_index,
            to_index,
            kind: RedactionKind::Hash,
        }
    }

    pub fn len(&self) -> usize {
        self.to_index.saturating_sub(self.from_index)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Sort, bounds-check and merge ranges over a plaintext of `total_len` bytes.
///
/// Overlapping or touching blackout ranges are merged. A hash range may not
/// overlap any other range.
pub fn normalize_ranges(
    ranges: &[RedactionRange],
    total_len: usize,
) -> ProtocolResult<Vec<RedactionRange>> {
    let mut sorted: Vec<RedactionRange> = Vec::with_capacity(ranges.len());
    for range in ranges {
        if range.from_index > range.to_index || range.to_index > total_len {
            return Err(ProtocolError::bad_request(format!(
                "redaction range [{}, {}) out of bounds for {} bytes",
                range.from_index, range.to_index, total_len
            )));
        }
        if !range.is_empty() {
            sorted.push(*range);
        }
    }
    sorted.sort_by_key(|r| (r.from_index, r.to_index));

    let mut normalized: Vec<RedactionRange> = Vec::with_capacity(sorted.len());
    for range in sorted {
        if let Some(last) = normalized.last_mut() {
            let overlaps = range.from_index < last.to_index;
            let both_blackout =
                last.kind == RedactionKind::Blackout && range.kind == RedactionKind::Blackout;

            if overlaps && !both_blackout {
                return Err(ProtocolError::bad_request(format!(
                    "redaction [{}, {}) overlaps a hash range",
                    range.from_index, range.to_index
                )));
            }
            if both_blackout && range.from_index <= last.to_index {
                last.to_index = last.to_index.max(range.to_index);
                continue;
            }
        }
        normalized.push(range);
    }

    Ok(normalized)
}

/// Overwrite `[from, to)` of `data` with the sentinel.
pub fn redact_range(data: &mut [u8], from: usize, to: usize) {
    let to = to.min(data.len());
    if from < to {
        data[from..to].fill(REDACTION_CHAR);
    }
}

/// True when every byte is the sentinel.
pub fn is_fully_redacted(data: &[u8]) -> bool {
    data.iter().all(|b| *b == REDACTION_CHAR)
}

/// True when `redacted` agrees with `original` at every non-sentinel position.
pub fn is_redaction_congruent(redacted: &[u8], original: &[u8]) -> bool {
    redacted.len() == original.len()
        && redacted
            .iter()
            .zip(original.iter())
            .all(|(r, o)| *r == REDACTION_CHAR || r == o)
}

/// Positions of `redacted` that hold the sentinel.
pub fn redaction_mask(redacted: &[u8]) -> Vec<bool> {
    redacted.iter().map(|b| *b == REDACTION_CHAR).collect()
}

/// Copy of `data` with every masked position replaced by the sentinel.
pub fn apply_redaction_mask(data: &[u8], mask: &[bool]) -> Vec<u8> {
    data.iter()
        .zip(mask.iter().chain(std::iter::repeat(&false)))
        .map(|(byte, masked)| if *masked { REDACTION_CHAR } else { *byte })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_congruency() {
        assert!(is_redaction_congruent(b"he**o", b"hello"));
        assert!(is_redaction_congruent(b"*****", b"hello"));
        assert!(!is_redaction_congruent(b"hexlo", b"hello"));
        assert!(!is_redaction_congruent(b"hell", b"hello"));
    }

    #[test]
    fn test_fully_redacted() {
        assert!(is_fully_redacted(b"***"));
        assert!(!is_fully_redacted(b"**a"));
    }

    #[test]
    fn test_mask_application() {
        let mask = redaction_mask(b"a**d");
        assert_eq!(mask, vec![false, true, true, false]);
        assert_eq!(apply_redaction_mask(b"wxyz", &mask), b"w**z".to_vec());
    }

    #[test]
    fn test_normalize_merges_blackouts() {
        let ranges = [
            RedactionRange::blackout(5, 8),
            RedactionRange::blackout(2, 4),
            RedactionRange::blackout(4, 6),
            RedactionRange::blackout(9, 9),
        ];
        let normalized = normalize_ranges(&ranges, 10).unwrap();
        assert_eq!(normalized, vec![RedactionRange::blackout(2, 8)]);
    }

    #[test]
    fn test_normalize_keeps_adjacent_hash_separate() {
        let ranges = [RedactionRange::blackout(0, 2), RedactionRange::hash(2, 5)];
        let normalized = normalize_ranges(&ranges, 5).unwrap();
        assert_eq!(normalized.len(), 2);
    }

    #[test]
    fn test_normalize_rejects_out_of_bounds_and_hash_overlap() {
        assert!(normalize_ranges(&[RedactionRange::blackout(0, 11)], 10).is_err());
        assert!(normalize_ranges(&[RedactionRange::blackout(4, 2)], 10).is_err());
        assert!(normalize_ranges(
            &[RedactionRange::hash(0, 4), RedactionRange::blackout(3, 6)],
            10
        )
        .is_err());
    }
}
