//! tls-witness - Selective disclosure of TLS transcripts
//!
//! A claimant records a TLS session through a witness, hides what it does not
//! want to disclose and proves that the rest decrypts correctly. The witness
//! checks the proofs against the ciphertext it relayed, asks a provider
//! whether the revealed data supports the claim, and signs the result.
//!
//! Layout:
//! - `transcript`, `redaction`, `oprf`, `zk`: record crypto, reveal planning
//!   and chunk proofs
//! - `claims`, `beacon`, `provider`: claim identity, witness selection and
//!   the provider contract
//! - `wire`, `verifier`, `client`: the claim tunnel protocol on both sides

pub mod beacon;
pub mod claims;
pub mod client;
pub mod config;
pub mod error;
pub mod oprf;
pub mod provider;
pub mod redaction;
pub mod transcript;
pub mod verifier;
pub mod wire;
pub mod zk;

pub use error::{ErrorCode, ProtocolError, ProtocolResult};
