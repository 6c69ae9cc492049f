//! Threshold OPRF commitments for hashed redactions.

pub mod local;
pub mod traits;
pub mod types;

pub use local::LocalOprfOperator;
pub use traits::OprfOperator;
pub use types::{
    nullifier_to_printable, DataLocation, OprfMask, OprfResponse, ToprfClaim,
    TOPRF_DOMAIN_SEPARATOR,
};
