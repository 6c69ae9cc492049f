//! Proof chunk orchestration.
//!
//! A partially revealed block is proven chunk by chunk. Each cipher suite
//! fixes the chunk size of its circuit, so a record body of `n` bytes needs up
//! to `ceil(n / chunk_size)` proofs. Scheduling per block:
//!
//! 1. Chunks holding an OPRF claim go first, with the claim's location
//!    rebased to the chunk. Two claims in one chunk reject the block.
//! 2. The remaining chunks follow in ascending offset order.
//! 3. Chunks that are fully redacted are skipped.
//!
//! The total number of scheduled chunks across a claim is capped; crossing the
//! cap fails in [`ChunkedProofGenerator::add_block`], before any proof runs.
//! Proofs then run on a bounded pool and results are handed back per block,
//! sorted by offset, once every chunk of the claim has finished.

use super::cache::ZkOperatorCache;
use super::types::{ProofChunk, ProofInput, PublicSignals, ToprfSignals, ZkEngine};
use crate::error::{ProtocolError, ProtocolResult};
use crate::oprf::{DataLocation, ToprfClaim, TOPRF_DOMAIN_SEPARATOR};
use crate::redaction::{apply_redaction_mask, is_fully_redacted, redaction_mask, PlannedBlock};
use crate::transcript::{record_nonce, BlockIndex, CipherSuite, TranscriptBlock};
use futures::stream::{self, StreamExt};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Default ceiling on proofs per claim.
pub const DEFAULT_MAX_CHUNKS_PER_CLAIM: usize = 200;

/// Default width of the proving pool.
pub const DEFAULT_PROOF_CONCURRENCY: usize = 10;

/// Receives a block's proven chunks, sorted by `start_idx`.
pub type ChunksReady = Box<dyn FnOnce(BlockIndex, Vec<ProofChunk>) + Send>;

struct ProofJob {
    slot: usize,
    start_idx: usize,
    input: ProofInput,
    redacted_plaintext: Vec<u8>,
    toprf: Option<ToprfClaim>,
}

struct PendingBlock {
    index: BlockIndex,
    on_ready: ChunksReady,
    chunks: Vec<ProofChunk>,
}

/// Chunk ciphertext as the circuit sees it.
///
/// Bytes the claimant redacted are replaced by the sentinel. An OPRF location
/// keeps its real ciphertext even where the printable nullifier is padded
/// with sentinels, since the circuit hashes the plaintext behind it.
pub fn public_ciphertext(
    ciphertext: &[u8],
    redacted_plaintext: &[u8],
    toprf_location: Option<DataLocation>,
) -> Vec<u8> {
    let mut mask = redaction_mask(redacted_plaintext);
    if let Some(range) = toprf_location.and_then(|location| location.range_within(mask.len())) {
        mask[range].fill(false);
    }
    apply_redaction_mask(ciphertext, &mask)
}

/// Collects blocks, then proves all their chunks.
pub struct ChunkedProofGenerator {
    cache: Arc<ZkOperatorCache>,
    engine: ZkEngine,
    max_chunks: usize,
    concurrency: usize,
    jobs: Vec<ProofJob>,
    blocks: Vec<PendingBlock>,
    suites: BTreeSet<CipherSuite>,
}

impl ChunkedProofGenerator {
    pub fn new(cache: Arc<ZkOperatorCache>, engine: ZkEngine) -> Self {
        Self {
            cache,
            engine,
            max_chunks: DEFAULT_MAX_CHUNKS_PER_CLAIM,
            concurrency: DEFAULT_PROOF_CONCURRENCY,
            jobs: Vec::new(),
            blocks: Vec::new(),
            suites: BTreeSet::new(),
        }
    }

    pub fn with_max_chunks(mut self, max_chunks: usize) -> Self {
        self.max_chunks = max_chunks;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Chunks scheduled so far across every added block.
    pub fn total_chunks(&self) -> usize {
        self.jobs.len()
    }

    /// Schedule the chunks of `block` revealed according to `plan`.
    ///
    /// Nothing is scheduled for the block when this returns an error.
    pub fn add_block(
        &mut self,
        block: &TranscriptBlock,
        plan: &PlannedBlock,
        on_chunks_ready: ChunksReady,
    ) -> ProtocolResult<()> {
        let suite = block.cipher_suite;
        let body = block.body();
        if plan.redacted_plaintext.len() != body.len() {
            return Err(ProtocolError::bad_request(format!(
                "block {} plan covers {} bytes, record has {}",
                plan.index,
                plan.redacted_plaintext.len(),
                body.len()
            )));
        }

        let chunk_size = suite.chunk_size();
        let chunk_count = body.len().div_ceil(chunk_size);
        let nonce = record_nonce(&block.fixed_iv, block.record_number)?.to_vec();

        let mut toprf_by_chunk: Vec<Option<ToprfClaim>> = vec![None; chunk_count];
        for claim in &plan.toprfs {
            let location = claim.data_location;
            let chunk = location.from_index / chunk_size;
            let chunk_start = chunk * chunk_size;
            let chunk_end = (chunk_start + chunk_size).min(body.len());
            if chunk >= chunk_count || location.range_within(chunk_end).is_none() {
                return Err(ProtocolError::bad_request(format!(
                    "OPRF claim of {} bytes at {} in block {} crosses a proof chunk boundary",
                    location.length, location.from_index, plan.index
                )));
            }
            if toprf_by_chunk[chunk].is_some() {
                return Err(ProtocolError::bad_request(format!(
                    "chunk {} of block {} holds more than one OPRF claim",
                    chunk, plan.index
                )));
            }
            let rebased = location.rebase(chunk_start).ok_or_else(|| {
                ProtocolError::internal("OPRF location precedes its chunk")
            })?;
            toprf_by_chunk[chunk] = Some(claim.at(rebased));
        }

        let (mut order, rest): (Vec<usize>, Vec<usize>) =
            (0..chunk_count).partition(|chunk| toprf_by_chunk[*chunk].is_some());
        order.extend(rest);

        let slot = self.blocks.len();
        let mut jobs = Vec::new();
        for chunk in order {
            let start = chunk * chunk_size;
            let end = (start + chunk_size).min(body.len());
            let redacted_plaintext = plan.redacted_plaintext[start..end].to_vec();
            let toprf = toprf_by_chunk[chunk].take();

            let ciphertext = public_ciphertext(
                &body[start..end],
                &redacted_plaintext,
                toprf.as_ref().map(|claim| claim.data_location),
            );
            if toprf.is_none()
                && is_fully_redacted(&redacted_plaintext)
                && is_fully_redacted(&ciphertext)
            {
                continue;
            }

            jobs.push(ProofJob {
                slot,
                start_idx: start,
                input: ProofInput {
                    key: Arc::clone(&block.key),
                    public: PublicSignals {
                        suite,
                        nonce: nonce.clone(),
                        counter: suite.counter_at(start),
                        ciphertext,
                        toprf: toprf
                            .as_ref()
                            .map(|claim| ToprfSignals::from_claim(claim, TOPRF_DOMAIN_SEPARATOR)),
                    },
                    oprf_mask: toprf.as_ref().map(|claim| claim.mask.clone()),
                },
                redacted_plaintext,
                toprf,
            });
        }

        let total = self.jobs.len() + jobs.len();
        if total > self.max_chunks {
            warn!(
                block = %plan.index,
                chunks = total,
                max = self.max_chunks,
                "claim needs too many proofs"
            );
            return Err(ProtocolError::invalid_claim(format!(
                "claim needs {} proof chunks, limit is {}",
                total, self.max_chunks
            ))
            .with_data(serde_json::json!({ "chunks": total, "max": self.max_chunks })));
        }

        debug!(block = %plan.index, %suite, chunks = jobs.len(), "scheduled block");
        self.jobs.extend(jobs);
        self.suites.insert(suite);
        self.blocks.push(PendingBlock {
            index: plan.index,
            on_ready: on_chunks_ready,
            chunks: Vec::new(),
        });
        Ok(())
    }

    /// Prove every scheduled chunk.
    ///
    /// `on_progress(done, total)` fires after each chunk. Once a chunk fails,
    /// in-flight proofs still run to completion but no block is delivered.
    /// Backends used by this claim are released afterwards either way.
    pub async fn generate_all<P>(mut self, mut on_progress: P) -> ProtocolResult<()>
    where
        P: FnMut(usize, usize) + Send,
    {
        let total = self.jobs.len();
        let jobs = std::mem::take(&mut self.jobs);
        info!(chunks = total, blocks = self.blocks.len(), "generating proofs");

        let result = self.run(jobs, total, &mut on_progress).await;

        for suite in &self.suites {
            self.cache.release(*suite, self.engine).await;
        }

        let finished = result?;
        for (slot, chunk) in finished {
            self.blocks[slot].chunks.push(chunk);
        }
        for block in self.blocks {
            let mut chunks = block.chunks;
            chunks.sort_by_key(|chunk| chunk.start_idx);
            (block.on_ready)(block.index, chunks);
        }
        Ok(())
    }

    async fn run<P>(
        &self,
        jobs: Vec<ProofJob>,
        total: usize,
        on_progress: &mut P,
    ) -> ProtocolResult<Vec<(usize, ProofChunk)>>
    where
        P: FnMut(usize, usize) + Send,
    {
        let mut prepared = Vec::with_capacity(jobs.len());
        for job in jobs {
            let operator = self.cache.get(job.input.public.suite, self.engine).await?;
            prepared.push((operator, job));
        }

        let mut results = stream::iter(prepared.into_iter().map(|(operator, job)| async move {
            let output = operator.generate_proof(job.input).await?;
            Ok::<_, ProtocolError>((
                job.slot,
                ProofChunk {
                    proof_data: output.proof_data,
                    decrypted_redacted_ciphertext: output.decrypted_redacted_ciphertext,
                    redacted_plaintext: job.redacted_plaintext,
                    start_idx: job.start_idx,
                    toprf: job.toprf,
                },
            ))
        }))
        .buffer_unordered(self.concurrency);

        let mut done = 0;
        let mut finished = Vec::with_capacity(total);
        let mut first_error = None;
        while let Some(result) = results.next().await {
            done += 1;
            match result {
                Ok(chunk) => finished.push(chunk),
                Err(err) => {
                    warn!(code = %err.code, "proof generation failed: {}", err.message);
                    first_error.get_or_insert(err);
                }
            }
            on_progress(done, total);
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(finished),
        }
    }
}
