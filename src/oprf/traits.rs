//! OPRF capability.

use super::types::ToprfClaim;
use crate::error::ProtocolResult;
use async_trait::async_trait;

/// Hashes data into a verifiable commitment through threshold OPRF servers.
///
/// The returned claim's `data_location` spans the whole input; callers rebase
/// it onto the block the data came from.
#[async_trait]
pub trait OprfOperator: Send + Sync {
    async fn evaluate(&self, data: &[u8], domain_separator: &str) -> ProtocolResult<ToprfClaim>;
}
