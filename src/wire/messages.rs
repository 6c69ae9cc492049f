//! Claim tunnel messages.

use super::codec::to_cbor;
use crate::claims::{ClaimOwnerProof, CompleteClaimData};
use crate::error::{ProtocolError, ProtocolResult};
use crate::transcript::Sender;
use crate::zk::ProofChunk;
use serde::{Deserialize, Serialize};

/// Tunnel the claim was recorded through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TunnelRequest {
    pub host: String,
    pub port: u16,
    pub geo_location: Option<String>,
    pub tunnel_id: u32,
}

impl TunnelRequest {
    pub fn host_port(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// A record as the claimant saw it on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptMessage {
    pub sender: Sender,
    /// Encrypted record including its authentication tag.
    pub message: Vec<u8>,
}

/// Complete reveal: the record's traffic key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectReveal {
    pub key: Vec<u8>,
    pub iv: Vec<u8>,
    pub record_number: u64,
}

/// Partial reveal: chunk proofs over the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZkReveal {
    pub iv: Vec<u8>,
    pub record_number: u64,
    pub proofs: Vec<ProofChunk>,
}

/// How one transcript message is revealed. Messages without a reveal are
/// treated as fully redacted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockReveal {
    /// Position of the message in the claim transcript.
    pub index: usize,
    pub direct_reveal: Option<DirectReveal>,
    pub zk_reveal: Option<ZkReveal>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestSignatures {
    pub request_signature: Vec<u8>,
}

/// Client to witness: attest this tunnel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimTunnelRequest {
    pub request: TunnelRequest,
    pub data: CompleteClaimData,
    pub transcript: Vec<TranscriptMessage>,
    pub reveals: Vec<BlockReveal>,
    pub signatures: RequestSignatures,
}

impl ClaimTunnelRequest {
    /// Bytes the owner signs: the request with its signatures cleared.
    pub fn signing_payload(&self) -> ProtocolResult<Vec<u8>> {
        let mut unsigned = self.clone();
        unsigned.signatures = RequestSignatures::default();
        Ok(to_cbor(&unsigned)?)
    }

    /// The request signature attributed to the claim owner.
    pub fn owner_proof(&self) -> ClaimOwnerProof {
        ClaimOwnerProof {
            signature: self.signatures.request_signature.clone(),
            address: self.data.owner.clone(),
        }
    }
}

/// Outcome of a claim, either the attested claim or the reason it was refused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClaimOutcome {
    Claim(CompleteClaimData),
    Error(ProtocolError),
}

impl ClaimOutcome {
    pub fn claim(&self) -> Option<&CompleteClaimData> {
        match self {
            Self::Claim(claim) => Some(claim),
            Self::Error(_) => None,
        }
    }

    pub fn into_result(self) -> ProtocolResult<CompleteClaimData> {
        match self {
            Self::Claim(claim) => Ok(claim),
            Self::Error(err) => Err(err),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseSignatures {
    /// Witness signature over the claim sign data. Absent on error.
    pub claim_signature: Option<Vec<u8>>,
    /// Witness signature over the whole response.
    pub result_signature: Vec<u8>,
}

/// Witness to client: signed outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimTunnelResponse {
    pub request: ClaimTunnelRequest,
    pub outcome: ClaimOutcome,
    pub signatures: ResponseSignatures,
}

impl ClaimTunnelResponse {
    /// Bytes covered by `result_signature`.
    pub fn signing_payload(&self) -> ProtocolResult<Vec<u8>> {
        let mut unsigned = self.clone();
        unsigned.signatures = ResponseSignatures::default();
        Ok(to_cbor(&unsigned)?)
    }
}
