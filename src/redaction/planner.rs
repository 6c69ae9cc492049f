//! Reveal planning.
//!
//! Turns redaction ranges over one direction's concatenated plaintext into a
//! per-block plan:
//!
//! 1. No ranges: reveal everything ([`RevealPlan::All`]).
//! 2. Walk a cursor over the blocks in range order. Blackout ranges become
//!    sentinel bytes; a hash range is sent through the OPRF callback and
//!    replaced by the printable nullifier.
//! 3. Drop every block left entirely redacted.
//!
//! The OPRF callback is awaited before the cursor moves on, so each claim is
//! bound to the block holding its range.

use super::primitives::{
    is_fully_redacted, normalize_ranges, redact_range, RedactionKind, RedactionRange,
};
use crate::error::{ProtocolError, ProtocolResult};
use crate::oprf::{nullifier_to_printable, DataLocation, OprfOperator, ToprfClaim};
use crate::transcript::{BlockIndex, Sender, Transcript};
use std::future::Future;
use tracing::debug;

/// Redacted view of one block that will be disclosed to the verifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedBlock {
    pub index: BlockIndex,
    pub redacted_plaintext: Vec<u8>,
    /// OPRF commitments with block-local locations. The planner emits at most one.
    pub toprfs: Vec<ToprfClaim>,
}

/// Outcome of planning one direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevealPlan {
    /// No redactions: every block may be revealed with its key.
    All,
    /// Blocks that survive redaction, in transcript order.
    Blocks(Vec<PlannedBlock>),
}

struct Cursor {
    block: usize,
    block_start: usize,
}

impl Cursor {
    /// Move to the block containing `position`.
    fn seek(&mut self, position: usize, lengths: &[usize]) {
        while self.block < lengths.len() && position >= self.block_start + lengths[self.block] {
            self.block_start += lengths[self.block];
            self.block += 1;
        }
    }
}

/// Plan reveals for `blocks` (index, plaintext) under `ranges`.
///
/// `oprf` receives the exact plaintext of each hash range.
pub async fn plan_reveals<F, Fut>(
    blocks: &[(BlockIndex, &[u8])],
    ranges: &[RedactionRange],
    mut oprf: F,
) -> ProtocolResult<RevealPlan>
where
    F: FnMut(Vec<u8>) -> Fut,
    Fut: Future<Output = ProtocolResult<ToprfClaim>>,
{
    let lengths: Vec<usize> = blocks.iter().map(|(_, p)| p.len()).collect();
    let total_len: usize = lengths.iter().sum();

    let ranges = normalize_ranges(ranges, total_len)?;
    if ranges.is_empty() {
        return Ok(RevealPlan::All);
    }

    let mut planned: Vec<PlannedBlock> = blocks
        .iter()
        .map(|(index, plaintext)| PlannedBlock {
            index: *index,
            redacted_plaintext: plaintext.to_vec(),
            toprfs: Vec::new(),
        })
        .collect();

    let mut cursor = Cursor {
        block: 0,
        block_start: 0,
    };

    for range in &ranges {
        cursor.seek(range.from_index, &lengths);

        match range.kind {
            RedactionKind::Blackout => {
                let mut position = range.from_index;
                while position < range.to_index {
                    cursor.seek(position, &lengths);
                    let block_end = cursor.block_start + lengths[cursor.block];
                    let until = range.to_index.min(block_end);
                    redact_range(
                        &mut planned[cursor.block].redacted_plaintext,
                        position - cursor.block_start,
                        until - cursor.block_start,
                    );
                    position = until;
                }
            }
            RedactionKind::Hash => {
                let block_end = cursor.block_start + lengths[cursor.block];
                if range.to_index > block_end {
                    return Err(ProtocolError::bad_request(format!(
                        "hash range [{}, {}) crosses a record boundary",
                        range.from_index, range.to_index
                    )));
                }

                let target = &mut planned[cursor.block];
                if !target.toprfs.is_empty() {
                    return Err(ProtocolError::bad_request(format!(
                        "block {} already holds an OPRF claim",
                        target.index
                    ))
                    .with_data(serde_json::json!({ "block": target.index.0 })));
                }

                let from = range.from_index - cursor.block_start;
                let to = range.to_index - cursor.block_start;
                let data = blocks[cursor.block].1[from..to].to_vec();
                let claim = oprf(data).await?;

                let printable = nullifier_to_printable(&claim.nullifier, to - from);
                target.redacted_plaintext[from..to].copy_from_slice(&printable);
                target
                    .toprfs
                    .push(claim.at(DataLocation::new(from, to - from)));

                debug!(block = %target.index, from, len = to - from, "bound OPRF claim");
            }
        }
    }

    let total = planned.len();
    let surviving: Vec<PlannedBlock> = planned
        .into_iter()
        .filter(|block| !is_fully_redacted(&block.redacted_plaintext))
        .collect();
    debug!(
        blocks = total,
        revealed = surviving.len(),
        ranges = ranges.len(),
        "planned reveals"
    );

    Ok(RevealPlan::Blocks(surviving))
}

/// Plan one direction's application data blocks of `transcript`.
pub async fn plan_transcript(
    transcript: &Transcript,
    sender: Sender,
    ranges: &[RedactionRange],
    oprf: &dyn OprfOperator,
    domain_separator: &str,
) -> ProtocolResult<RevealPlan> {
    let blocks: Vec<(BlockIndex, &[u8])> = transcript
        .application_data(sender)
        .into_iter()
        .filter_map(|index| {
            transcript
                .get(index)
                .map(|block| (index, block.plaintext.as_slice()))
        })
        .collect();

    plan_reveals(&blocks, ranges, |data| async move {
        oprf.evaluate(&data, domain_separator).await
    })
    .await
}
