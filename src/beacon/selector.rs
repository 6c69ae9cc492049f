//! Deterministic witness selection.
//!
//! ## Algorithm
//!
//! 1. `seed = Keccak256(identifier \n epoch \n required \n timestamp_s)`
//! 2. Read the seed as 32-bit big-endian windows, advancing 4 bytes per draw
//!    and wrapping to the start once exhausted.
//! 3. Each window modulo the remaining pool size picks the next witness,
//!    which is then swap-removed from the pool.
//!
//! Anyone holding the same beacon state can recompute which witnesses a claim
//! should have used.

use super::types::{BeaconState, WitnessData};
use crate::error::{ProtocolError, ProtocolResult};
use sha3::{Digest, Keccak256};

const WINDOW: usize = 4;

/// Seed hash for a claim's witness draw.
pub fn selection_seed(state: &BeaconState, identifier: &str, timestamp_s: u32) -> [u8; 32] {
    let joined = format!(
        "{}\n{}\n{}\n{}",
        identifier, state.epoch, state.witnesses_required_for_claim, timestamp_s
    );
    Keccak256::digest(joined.as_bytes()).into()
}

/// Ordered witnesses that must attest the claim `identifier`.
pub fn select_witnesses(
    state: &BeaconState,
    identifier: &str,
    timestamp_s: u32,
) -> ProtocolResult<Vec<WitnessData>> {
    let required = state.witnesses_required_for_claim as usize;
    if required > state.witnesses.len() {
        return Err(ProtocolError::bad_request(format!(
            "epoch {} needs {} witnesses, only {} registered",
            state.epoch,
            required,
            state.witnesses.len()
        )));
    }

    let seed = selection_seed(state, identifier, timestamp_s);
    let mut pool = state.witnesses.clone();
    let mut selected = Vec::with_capacity(required);
    let mut offset = 0;

    for _ in 0..required {
        if offset + WINDOW > seed.len() {
            offset = 0;
        }
        let mut window = [0u8; WINDOW];
        window.copy_from_slice(&seed[offset..offset + WINDOW]);
        offset += WINDOW;

        let index = u32::from_be_bytes(window) as usize % pool.len();
        selected.push(pool.swap_remove(index));
    }

    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    fn state(witnesses: usize, required: u32) -> BeaconState {
        BeaconState {
            epoch: 1,
            witnesses: (0..witnesses)
                .map(|i| WitnessData::new(format!("0x{:040x}", i), format!("wss://w{}.example", i)))
                .collect(),
            witnesses_required_for_claim: required,
            next_epoch_timestamp_s: 0,
        }
    }

    #[test]
    fn test_selection_matches_manual_draw() {
        let state = state(5, 2);
        let seed = selection_seed(&state, "0xabc", 100);

        let mut pool = state.witnesses.clone();
        let first = u32::from_be_bytes([seed[0], seed[1], seed[2], seed[3]]) as usize % 5;
        let a = pool.swap_remove(first);
        let second = u32::from_be_bytes([seed[4], seed[5], seed[6], seed[7]]) as usize % 4;
        let b = pool.swap_remove(second);

        assert_eq!(select_witnesses(&state, "0xabc", 100).unwrap(), vec![a, b]);
    }

    #[test]
    fn test_windows_wrap_around() {
        let state = state(12, 10);
        let selected = select_witnesses(&state, "0xabc", 7).unwrap();
        assert_eq!(selected.len(), 10);

        let mut ids: Vec<&str> = selected.iter().map(|w| w.id.as_str()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 10, "witnesses are drawn without replacement");
    }

    #[test]
    fn test_not_enough_witnesses() {
        let err = select_witnesses(&state(2, 3), "0xabc", 1).unwrap_err();
        assert_eq!(err.code, ErrorCode::BadRequest);
    }

    #[test]
    fn test_zero_required_selects_nothing() {
        assert!(select_witnesses(&state(2, 0), "0xabc", 1).unwrap().is_empty());
    }
}
