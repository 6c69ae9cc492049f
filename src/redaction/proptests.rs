//! Property-based tests for reveal planning
//!
//! Tests for:
//! - Congruency: every revealed byte matches the original plaintext
//! - Coverage: every redacted position is the sentinel in a surviving block
//! - Dropping: no surviving block is fully redacted

use super::{is_fully_redacted, is_redaction_congruent, plan_reveals, RedactionRange, RevealPlan};
use super::REDACTION_CHAR;
use crate::error::{ProtocolError, ProtocolResult};
use crate::oprf::ToprfClaim;
use crate::transcript::BlockIndex;
use futures::executor::block_on;
use proptest::prelude::*;

async fn no_oprf(_: Vec<u8>) -> ProtocolResult<ToprfClaim> {
    Err(ProtocolError::internal("OPRF not expected"))
}

// Plaintext bytes never contain the sentinel so coverage checks are exact.
fn block_strategy() -> impl Strategy<Value = Vec<Vec<u8>>> {
    prop::collection::vec(prop::collection::vec(b'a'..=b'z', 1..24), 1..8)
}

fn ranges_for(total: usize, raw: &[(usize, usize)]) -> Vec<RedactionRange> {
    raw.iter()
        .map(|(a, b)| {
            let from = a % (total + 1);
            let to = from + (b % (total - from + 1));
            RedactionRange::blackout(from, to)
        })
        .collect()
}

proptest! {
    /// Property: revealed bytes agree with the original plaintext
    #[test]
    fn prop_revealed_blocks_are_congruent(
        blocks in block_strategy(),
        raw in prop::collection::vec((any::<usize>(), any::<usize>()), 1..6),
    ) {
        let total: usize = blocks.iter().map(Vec::len).sum();
        let ranges = ranges_for(total, &raw);
        let indexed: Vec<(BlockIndex, &[u8])> = blocks
            .iter()
            .enumerate()
            .map(|(i, b)| (BlockIndex(i), b.as_slice()))
            .collect();

        let plan = block_on(plan_reveals(&indexed, &ranges, no_oprf)).unwrap();

        if let RevealPlan::Blocks(planned) = plan {
            for block in &planned {
                let original = &blocks[block.index.0];
                prop_assert!(is_redaction_congruent(&block.redacted_plaintext, original));
                prop_assert!(!is_fully_redacted(&block.redacted_plaintext));
            }
        }
    }

    /// Property: every redacted position is hidden or its block is dropped
    #[test]
    fn prop_redacted_positions_are_hidden(
        blocks in block_strategy(),
        raw in prop::collection::vec((any::<usize>(), any::<usize>()), 1..6),
    ) {
        let total: usize = blocks.iter().map(Vec::len).sum();
        let ranges = ranges_for(total, &raw);
        let indexed: Vec<(BlockIndex, &[u8])> = blocks
            .iter()
            .enumerate()
            .map(|(i, b)| (BlockIndex(i), b.as_slice()))
            .collect();

        let plan = block_on(plan_reveals(&indexed, &ranges, no_oprf)).unwrap();
        let planned = match plan {
            RevealPlan::All => {
                prop_assert!(ranges.iter().all(RedactionRange::is_empty));
                return Ok(());
            }
            RevealPlan::Blocks(planned) => planned,
        };

        let mut offset = 0;
        for (i, block) in blocks.iter().enumerate() {
            let surviving = planned.iter().find(|p| p.index.0 == i);
            for local in 0..block.len() {
                let position = offset + local;
                let hidden = ranges
                    .iter()
                    .any(|r| position >= r.from_index && position < r.to_index);
                match surviving {
                    Some(p) => prop_assert_eq!(
                        p.redacted_plaintext[local] == REDACTION_CHAR,
                        hidden
                    ),
                    None => prop_assert!(hidden),
                }
            }
            offset += block.len();
        }
    }
}
