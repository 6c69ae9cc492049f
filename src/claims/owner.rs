//! Owner proofs and witness attestations over claims.

use super::identifier::{claim_sign_data, CompleteClaimData};
use super::signature::{address_for_key, SignatureScheme};
use crate::error::{ProtocolError, ProtocolResult};
use serde::{Deserialize, Serialize};

/// Binds a payload to the address that signed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimOwnerProof {
    pub signature: Vec<u8>,
    pub address: String,
}

impl ClaimOwnerProof {
    pub fn create(
        scheme: &dyn SignatureScheme,
        payload: &[u8],
        private_key: &[u8],
    ) -> ProtocolResult<Self> {
        Ok(Self {
            signature: scheme.sign(payload, private_key)?,
            address: address_for_key(scheme, private_key)?,
        })
    }

    pub fn verify(&self, scheme: &dyn SignatureScheme, payload: &[u8]) -> ProtocolResult<()> {
        if scheme.verify(payload, &self.signature, &self.address)? {
            Ok(())
        } else {
            Err(ProtocolError::authentication_failed(format!(
                "payload not signed by {}",
                self.address
            )))
        }
    }
}

/// Witness signature over the claim sign data.
pub fn sign_claim(
    scheme: &dyn SignatureScheme,
    claim: &CompleteClaimData,
    private_key: &[u8],
) -> ProtocolResult<Vec<u8>> {
    scheme.sign(claim_sign_data(claim).as_bytes(), private_key)
}

/// Addresses of the witnesses that produced `signatures` over `claim`.
pub fn recover_claim_signers(
    scheme: &dyn SignatureScheme,
    claim: &CompleteClaimData,
    signatures: &[Vec<u8>],
) -> ProtocolResult<Vec<String>> {
    let data = claim_sign_data(claim);
    signatures
        .iter()
        .map(|signature| scheme.recover_address(data.as_bytes(), signature))
        .collect()
}
