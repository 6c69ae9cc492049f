//! Types exchanged with proving backends.

use crate::oprf::{DataLocation, OprfMask, OprfResponse, ToprfClaim};
use crate::transcript::{CipherSuite, TrafficKey};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Proving system a backend is built on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ZkEngine {
    #[default]
    Gnark,
    Snarkjs,
}

impl fmt::Display for ZkEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gnark => f.write_str("gnark"),
            Self::Snarkjs => f.write_str("snarkjs"),
        }
    }
}

/// Where circuit artifacts are loaded from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BackendSource {
    Local { path: PathBuf },
    Remote { url: String },
}

impl Default for BackendSource {
    fn default() -> Self {
        Self::Local {
            path: PathBuf::from("circuits"),
        }
    }
}

impl BackendSource {
    /// Location of the artifacts for one `(suite, engine)` pair.
    pub fn artifact_location(&self, suite: CipherSuite, engine: ZkEngine) -> String {
        match self {
            Self::Local { path } => path
                .join(engine.to_string())
                .join(suite.name())
                .display()
                .to_string(),
            Self::Remote { url } => {
                format!("{}/{}/{}", url.trim_end_matches('/'), engine, suite.name())
            }
        }
    }
}

/// OPRF part of a chunk's public signals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToprfSignals {
    /// Chunk-local location of the hashed bytes.
    pub location: DataLocation,
    pub domain_separator: String,
    pub nullifier: Vec<u8>,
    pub responses: Vec<OprfResponse>,
}

impl ToprfSignals {
    pub fn from_claim(claim: &ToprfClaim, domain_separator: &str) -> Self {
        Self {
            location: claim.data_location,
            domain_separator: domain_separator.to_string(),
            nullifier: claim.nullifier.clone(),
            responses: claim.responses.clone(),
        }
    }
}

/// Inputs both prover and verifier can compute for one chunk.
///
/// `ciphertext` has every position the claimant redacted replaced by the
/// sentinel, so the proof says nothing about those bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicSignals {
    pub suite: CipherSuite,
    /// Per-record nonce (`fixed_iv XOR record_number`).
    pub nonce: Vec<u8>,
    /// Keystream counter of the chunk's first cipher block.
    pub counter: u32,
    pub ciphertext: Vec<u8>,
    pub toprf: Option<ToprfSignals>,
}

/// Everything a backend needs to prove one chunk.
#[derive(Debug, Clone)]
pub struct ProofInput {
    pub key: Arc<TrafficKey>,
    pub public: PublicSignals,
    /// Blinding mask of the OPRF request, when the chunk carries a claim.
    pub oprf_mask: Option<OprfMask>,
}

/// Result of proving one chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofOutput {
    pub proof_data: Vec<u8>,
    /// Decryption of the redacted ciphertext. Inside an OPRF location it holds
    /// the printable nullifier instead.
    pub decrypted_redacted_ciphertext: Vec<u8>,
}

/// One proven chunk of a partially revealed block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofChunk {
    pub proof_data: Vec<u8>,
    pub decrypted_redacted_ciphertext: Vec<u8>,
    pub redacted_plaintext: Vec<u8>,
    /// Offset of the chunk within the record body.
    pub start_idx: usize,
    pub toprf: Option<ToprfClaim>,
}
