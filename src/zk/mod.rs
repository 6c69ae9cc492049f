//! Zero-knowledge proofs over symmetric record decryption.
//!
//! The proving system itself is an external capability ([`ZkOperator`]).
//! This module schedules chunk proofs for partially revealed blocks and keeps
//! one backend handle per `(cipher suite, engine)` pair.

pub mod cache;
pub mod chunks;
pub mod traits;
pub mod transparent;
pub mod types;

pub use cache::ZkOperatorCache;
pub use chunks::{
    public_ciphertext, ChunkedProofGenerator, ChunksReady, DEFAULT_MAX_CHUNKS_PER_CLAIM,
    DEFAULT_PROOF_CONCURRENCY,
};
pub use traits::{ZkOperator, ZkOperatorFactory};
pub use transparent::{TransparentZkFactory, TransparentZkOperator};
pub use types::{
    BackendSource, ProofChunk, ProofInput, ProofOutput, PublicSignals, ToprfSignals, ZkEngine,
};
