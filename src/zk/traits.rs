//! Proving backend capability.
//!
//! Backends are opaque: the protocol only needs to prove a chunk, verify a
//! chunk proof, and drop whatever resources the backend holds.

use super::types::{ProofInput, ProofOutput, PublicSignals, ZkEngine};
use crate::error::ProtocolResult;
use crate::transcript::CipherSuite;
use async_trait::async_trait;
use std::sync::Arc;

/// Proves and verifies decryption of one ciphertext chunk.
#[async_trait]
pub trait ZkOperator: Send + Sync {
    async fn generate_proof(&self, input: ProofInput) -> ProtocolResult<ProofOutput>;

    /// `Ok(false)` means the proof is well-formed but does not verify.
    async fn verify_proof(
        &self,
        output: &ProofOutput,
        public: &PublicSignals,
    ) -> ProtocolResult<bool>;

    /// Free proving keys, circuits and any other cached state.
    async fn release(&self);
}

/// Builds operators for a cipher suite and engine.
#[async_trait]
pub trait ZkOperatorFactory: Send + Sync {
    async fn create(
        &self,
        suite: CipherSuite,
        engine: ZkEngine,
    ) -> ProtocolResult<Arc<dyn ZkOperator>>;
}
