//! Client-side claim creation.
//!
//! The client records a TLS session through a witness tunnel, decides what to
//! reveal, proves the partially revealed records and asks the witness to sign
//! the resulting claim.

pub mod create_claim;
pub mod local;
pub mod pool;
pub mod retry;
pub mod tunnel;

pub use create_claim::{
    assert_valid_claim_response, direction_plaintext, ClaimCreator, ClaimServices,
    ClaimSettings, CreateClaimOptions, CreatedClaim, ProgressCallback,
};
pub use local::{
    LocalTunnel, LocalTunnelOpener, LocalWitnessClient, LocalWitnessConnector, Responder,
    MAX_RECORD_PLAINTEXT,
};
pub use pool::{ConnectionPool, WitnessClient, WitnessConnector};
pub use retry::{is_protocol_error_retryable, retry_with_backoff, RetryPolicy, DEFAULT_MAX_RETRIES};
pub use tunnel::{Tunnel, TunnelOpener, TunnelTarget};
