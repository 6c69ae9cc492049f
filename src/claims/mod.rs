//! Claim construction, identity and signatures.

pub mod canonical;
pub mod identifier;
pub mod owner;
pub mod signature;

pub use canonical::{canonicalize_context, canonicalize_parameters, canonicalize_value};
pub use identifier::{claim_sign_data, ClaimInfo, CompleteClaimData};
pub use owner::{recover_claim_signers, sign_claim, ClaimOwnerProof};
pub use signature::{address_for_key, parse_private_key, EthSecp256k1, SignatureScheme};
