//! Claim creation.
//!
//! One attempt runs:
//!
//! 1. Claim info and identifier from the provider parameters.
//! 2. Beacon state and witness selection.
//! 3. A recorded tunnel through the first selected witness.
//! 4. Reveal planning per direction, then chunk proofs.
//! 5. The signed `claim_tunnel` request and a check of the witness's reply.
//!
//! Network failures restart the whole attempt under the retry policy.

use super::pool::ConnectionPool;
use super::retry::{is_protocol_error_retryable, retry_with_backoff, RetryPolicy};
use super::tunnel::{Tunnel, TunnelOpener, TunnelTarget};
use crate::beacon::{select_witnesses, BeaconStateCache, WitnessData};
use crate::claims::{
    address_for_key, canonicalize_value, claim_sign_data, ClaimInfo, ClaimOwnerProof,
    CompleteClaimData, SignatureScheme,
};
use crate::error::{ProtocolError, ProtocolResult};
use crate::oprf::{OprfOperator, TOPRF_DOMAIN_SEPARATOR};
use crate::provider::ProviderRegistry;
use crate::redaction::{plan_transcript, RedactionKind, RevealPlan};
use crate::transcript::{BlockIndex, Sender, Transcript, TranscriptBlock};
use crate::wire::{
    BlockReveal, ClaimOutcome, ClaimTunnelRequest, ClaimTunnelResponse, DirectReveal,
    RequestSignatures, TranscriptMessage, TunnelRequest, ZkReveal,
};
use crate::zk::{
    ChunkedProofGenerator, ProofChunk, ZkEngine, ZkOperatorCache, DEFAULT_MAX_CHUNKS_PER_CLAIM,
    DEFAULT_PROOF_CONCURRENCY,
};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

/// Receives `(done, total)` as chunk proofs finish.
pub type ProgressCallback = Arc<dyn Fn(usize, usize) + Send + Sync>;

/// Tunables for claim creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimSettings {
    pub engine: ZkEngine,
    pub max_chunks_per_claim: usize,
    pub proof_concurrency: usize,
    pub retry: RetryPolicy,
}

impl Default for ClaimSettings {
    fn default() -> Self {
        Self {
            engine: ZkEngine::default(),
            max_chunks_per_claim: DEFAULT_MAX_CHUNKS_PER_CLAIM,
            proof_concurrency: DEFAULT_PROOF_CONCURRENCY,
            retry: RetryPolicy::default(),
        }
    }
}

/// Services a claim attempt talks to.
#[derive(Clone)]
pub struct ClaimServices {
    pub beacon: Arc<BeaconStateCache>,
    pub tunnels: Arc<dyn TunnelOpener>,
    pub pool: Arc<ConnectionPool>,
    pub zk: Arc<ZkOperatorCache>,
    pub oprf: Arc<dyn OprfOperator>,
}

/// What to claim.
#[derive(Clone)]
pub struct CreateClaimOptions {
    pub provider: String,
    pub params: Value,
    /// Never leaves the client; only the provider's request builder sees it.
    pub secret_params: Value,
    pub context: String,
    /// Claim time. Defaults to now.
    pub timestamp_s: Option<u32>,
    pub on_progress: Option<ProgressCallback>,
}

impl CreateClaimOptions {
    pub fn new(provider: impl Into<String>, params: Value) -> Self {
        Self {
            provider: provider.into(),
            params,
            secret_params: Value::Null,
            context: String::new(),
            timestamp_s: None,
            on_progress: None,
        }
    }

    pub fn with_secret_params(mut self, secret_params: Value) -> Self {
        self.secret_params = secret_params;
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    pub fn with_timestamp(mut self, timestamp_s: u32) -> Self {
        self.timestamp_s = Some(timestamp_s);
        self
    }

    pub fn with_progress(mut self, on_progress: ProgressCallback) -> Self {
        self.on_progress = Some(on_progress);
        self
    }
}

/// An attested claim.
#[derive(Debug, Clone)]
pub struct CreatedClaim {
    pub claim: CompleteClaimData,
    pub witness: WitnessData,
    pub claim_signature: Vec<u8>,
    pub response: ClaimTunnelResponse,
}

/// Creates claims on behalf of one owner key.
pub struct ClaimCreator {
    services: ClaimServices,
    providers: ProviderRegistry,
    scheme: Arc<dyn SignatureScheme>,
    owner_key: Zeroizing<Vec<u8>>,
    owner: String,
    settings: ClaimSettings,
}

impl ClaimCreator {
    pub fn new(
        services: ClaimServices,
        providers: ProviderRegistry,
        scheme: Arc<dyn SignatureScheme>,
        owner_key: Zeroizing<Vec<u8>>,
    ) -> ProtocolResult<Self> {
        let owner = address_for_key(scheme.as_ref(), &owner_key)?;
        Ok(Self {
            services,
            providers,
            scheme,
            owner_key,
            owner,
            settings: ClaimSettings::default(),
        })
    }

    pub fn with_settings(mut self, settings: ClaimSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Address claims are created for.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub async fn create_claim(&self, options: CreateClaimOptions) -> ProtocolResult<CreatedClaim> {
        let options = &options;
        retry_with_backoff(
            self.settings.retry,
            |attempt| async move {
                info!(attempt, provider = %options.provider, "creating claim");
                self.attempt(options).await
            },
            is_protocol_error_retryable,
        )
        .await
    }

    async fn attempt(&self, options: &CreateClaimOptions) -> ProtocolResult<CreatedClaim> {
        let provider = self.providers.get(&options.provider)?;
        let info = ClaimInfo::new(
            &options.provider,
            canonicalize_value(&options.params)?,
            options.context.clone(),
        );
        let identifier = info.identifier()?;

        let state = self.services.beacon.get_state(None).await?;
        let timestamp_s = options.timestamp_s.unwrap_or_else(unix_now);
        let witness = select_witnesses(&state, &identifier, timestamp_s)?
            .into_iter()
            .next()
            .ok_or_else(|| ProtocolError::bad_request("no witness selected for claim"))?;

        let target = TunnelTarget::parse(
            &provider.host_port().resolve(&options.params)?,
            provider.geo_location().resolve(&options.params)?,
        )?;
        let request = provider.create_request(&options.params, &options.secret_params)?;
        if request
            .redactions
            .iter()
            .any(|range| range.kind == RedactionKind::Hash)
        {
            return Err(ProtocolError::bad_request(
                "request redactions cannot be hashed",
            ));
        }

        let tunnel = self
            .services
            .tunnels
            .open(&witness, &target, &request.data)
            .await?;
        debug!(tunnel_id = tunnel.id(), witness = %witness.id, "tunnel open");

        let prepared = async {
            let transcript = tunnel.transcript();
            let response = direction_plaintext(&transcript, Sender::Server);
            let response_redactions = provider.response_redactions(&response, &options.params)?;

            let oprf = self.services.oprf.as_ref();
            let plans = vec![
                plan_transcript(
                    &transcript,
                    Sender::Client,
                    &request.redactions,
                    oprf,
                    TOPRF_DOMAIN_SEPARATOR,
                )
                .await?,
                plan_transcript(
                    &transcript,
                    Sender::Server,
                    &response_redactions,
                    oprf,
                    TOPRF_DOMAIN_SEPARATOR,
                )
                .await?,
            ];

            if !tunnel.is_open() {
                return Err(ProtocolError::network(format!(
                    "tunnel {} closed before proof generation",
                    tunnel.id()
                )));
            }
            let reveals = self
                .build_reveals(
                    &transcript,
                    [Sender::Client, Sender::Server].into_iter().zip(plans),
                    options.on_progress.clone(),
                )
                .await?;

            let mut claim_request = ClaimTunnelRequest {
                request: TunnelRequest {
                    host: target.host.clone(),
                    port: target.port,
                    geo_location: target.geo_location.clone(),
                    tunnel_id: tunnel.id(),
                },
                data: CompleteClaimData::new(&info, &self.owner, timestamp_s, state.epoch)?,
                transcript: transcript
                    .iter()
                    .map(|(_, block)| TranscriptMessage {
                        sender: block.sender,
                        message: block.ciphertext.clone(),
                    })
                    .collect(),
                reveals,
                signatures: RequestSignatures::default(),
            };
            let payload = claim_request.signing_payload()?;
            let proof = ClaimOwnerProof::create(self.scheme.as_ref(), &payload, &self.owner_key)?;
            claim_request.signatures.request_signature = proof.signature;
            Ok::<_, ProtocolError>(claim_request)
        }
        .await;
        close_tunnel(tunnel.as_ref()).await;
        let claim_request = prepared?;

        let client = self.services.pool.get(&witness.url).await?;
        let response = client.claim_tunnel(claim_request).await?;
        let claim = assert_valid_claim_response(self.scheme.as_ref(), &response, &witness.id)?;
        info!(identifier = %claim.identifier, witness = %witness.id, "claim attested");

        let claim_signature = response
            .signatures
            .claim_signature
            .clone()
            .unwrap_or_default();
        Ok(CreatedClaim {
            claim,
            witness,
            claim_signature,
            response,
        })
    }

    async fn build_reveals(
        &self,
        transcript: &Transcript,
        plans: impl Iterator<Item = (Sender, RevealPlan)>,
        on_progress: Option<ProgressCallback>,
    ) -> ProtocolResult<Vec<BlockReveal>> {
        let mut generator =
            ChunkedProofGenerator::new(Arc::clone(&self.services.zk), self.settings.engine)
                .with_max_chunks(self.settings.max_chunks_per_claim)
                .with_concurrency(self.settings.proof_concurrency);
        let (tx, rx) = mpsc::channel::<(BlockIndex, Vec<ProofChunk>)>();
        let mut reveals = BTreeMap::new();

        for (sender, plan) in plans {
            match plan {
                RevealPlan::All => {
                    for index in transcript.application_data(sender) {
                        let block = block_at(transcript, index)?;
                        reveals.insert(
                            index,
                            BlockReveal {
                                index: index.0,
                                direct_reveal: Some(DirectReveal {
                                    key: block.key.as_bytes().to_vec(),
                                    iv: block.fixed_iv.clone(),
                                    record_number: block.record_number,
                                }),
                                zk_reveal: None,
                            },
                        );
                    }
                }
                RevealPlan::Blocks(planned) => {
                    for plan in &planned {
                        let tx = tx.clone();
                        generator.add_block(
                            block_at(transcript, plan.index)?,
                            plan,
                            Box::new(move |index, chunks| {
                                if let Err(err) = tx.send((index, chunks)) {
                                    let (index, _) = err.0;
                                    warn!(block = %index, "proof receiver gone, dropping chunks");
                                }
                            }),
                        )?;
                    }
                }
            }
        }
        drop(tx);

        generator
            .generate_all(|done, total| {
                debug!(done, total, "chunk proven");
                if let Some(on_progress) = &on_progress {
                    on_progress(done, total);
                }
            })
            .await?;

        for (index, proofs) in rx.try_iter() {
            let block = block_at(transcript, index)?;
            reveals.insert(
                index,
                BlockReveal {
                    index: index.0,
                    direct_reveal: None,
                    zk_reveal: Some(ZkReveal {
                        iv: block.fixed_iv.clone(),
                        record_number: block.record_number,
                        proofs,
                    }),
                },
            );
        }
        Ok(reveals.into_values().collect())
    }
}

/// Check a witness reply and return the attested claim.
///
/// The result signature must come from `witness_address`. A refusal is
/// returned as its error; an attested claim must carry a valid claim
/// signature from the same witness.
pub fn assert_valid_claim_response(
    scheme: &dyn SignatureScheme,
    response: &ClaimTunnelResponse,
    witness_address: &str,
) -> ProtocolResult<CompleteClaimData> {
    let payload = response.signing_payload()?;
    if !scheme.verify(
        &payload,
        &response.signatures.result_signature,
        witness_address,
    )? {
        return Err(ProtocolError::authentication_failed(format!(
            "response not signed by witness {}",
            witness_address
        )));
    }

    let claim = match &response.outcome {
        ClaimOutcome::Claim(claim) => claim,
        ClaimOutcome::Error(err) => return Err(err.clone()),
    };
    let claim_signature = response
        .signatures
        .claim_signature
        .as_deref()
        .ok_or_else(|| ProtocolError::authentication_failed("claim is missing its signature"))?;
    if !scheme.verify(
        claim_sign_data(claim).as_bytes(),
        claim_signature,
        witness_address,
    )? {
        return Err(ProtocolError::authentication_failed(format!(
            "claim not signed by witness {}",
            witness_address
        )));
    }
    Ok(claim.clone())
}

/// Concatenated application data plaintext sent by `sender`.
pub fn direction_plaintext(transcript: &Transcript, sender: Sender) -> Vec<u8> {
    transcript
        .application_data(sender)
        .into_iter()
        .filter_map(|index| transcript.get(index))
        .flat_map(|block| block.plaintext.iter().copied())
        .collect()
}

fn block_at(
    transcript: &Transcript,
    index: BlockIndex,
) -> ProtocolResult<&TranscriptBlock> {
    transcript
        .get(index)
        .ok_or_else(|| ProtocolError::internal(format!("block {} missing from transcript", index)))
}

async fn close_tunnel(tunnel: &dyn Tunnel) {
    if !tunnel.is_open() {
        return;
    }
    if let Err(err) = tunnel.close().await {
        warn!(tunnel_id = tunnel.id(), "failed to close tunnel: {}", err.message);
    }
}

fn unix_now() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as u32)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::{sign_claim, EthSecp256k1};
    use crate::error::ErrorCode;
    use crate::transcript::{CipherSuite, TrafficKey, TranscriptBlock, IV_LEN};
    use crate::wire::ResponseSignatures;

    const WITNESS_KEY: [u8; 32] = [0x33; 32];

    fn signed_response(outcome: ClaimOutcome, witness_key: &[u8]) -> ClaimTunnelResponse {
        let data = CompleteClaimData::new(&ClaimInfo::new("http", "{}", ""), "0xowner", 5, 1)
            .unwrap();
        let mut response = ClaimTunnelResponse {
            request: ClaimTunnelRequest {
                request: TunnelRequest {
                    host: "example.com".to_string(),
                    port: 443,
                    geo_location: None,
                    tunnel_id: 1,
                },
                data,
                transcript: vec![],
                reveals: vec![],
                signatures: RequestSignatures::default(),
            },
            outcome,
            signatures: ResponseSignatures::default(),
        };
        if let ClaimOutcome::Claim(claim) = &response.outcome {
            response.signatures.claim_signature =
                Some(sign_claim(&EthSecp256k1, claim, witness_key).unwrap());
        }
        let payload = response.signing_payload().unwrap();
        response.signatures.result_signature = EthSecp256k1.sign(&payload, witness_key).unwrap();
        response
    }

    fn claim() -> CompleteClaimData {
        CompleteClaimData::new(&ClaimInfo::new("http", r#"{"a":1}"#, ""), "0xowner", 5, 1).unwrap()
    }

    #[test]
    fn test_valid_response_yields_claim() {
        let witness = address_for_key(&EthSecp256k1, &WITNESS_KEY).unwrap();
        let response = signed_response(ClaimOutcome::Claim(claim()), &WITNESS_KEY);
        let attested = assert_valid_claim_response(&EthSecp256k1, &response, &witness).unwrap();
        assert_eq!(attested, claim());
    }

    #[test]
    fn test_response_from_other_witness_rejected() {
        let witness = address_for_key(&EthSecp256k1, &WITNESS_KEY).unwrap();
        let response = signed_response(ClaimOutcome::Claim(claim()), &[0x44; 32]);
        let err = assert_valid_claim_response(&EthSecp256k1, &response, &witness).unwrap_err();
        assert_eq!(err.code, ErrorCode::AuthenticationFailed);
    }

    #[test]
    fn test_refusal_is_returned_as_error() {
        let witness = address_for_key(&EthSecp256k1, &WITNESS_KEY).unwrap();
        let response = signed_response(
            ClaimOutcome::Error(ProtocolError::invalid_claim("no match")),
            &WITNESS_KEY,
        );
        let err = assert_valid_claim_response(&EthSecp256k1, &response, &witness).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidClaim);
        assert_eq!(err.message, "no match");
    }

    #[test]
    fn test_missing_claim_signature_rejected() {
        let witness = address_for_key(&EthSecp256k1, &WITNESS_KEY).unwrap();
        let mut response = signed_response(ClaimOutcome::Claim(claim()), &WITNESS_KEY);
        response.signatures.claim_signature = None;
        let payload = response.signing_payload().unwrap();
        response.signatures.result_signature = EthSecp256k1.sign(&payload, &WITNESS_KEY).unwrap();

        let err = assert_valid_claim_response(&EthSecp256k1, &response, &witness).unwrap_err();
        assert_eq!(err.code, ErrorCode::AuthenticationFailed);
    }

    #[test]
    fn test_direction_plaintext_concatenates_in_order() {
        let suite = CipherSuite::Aes128Gcm;
        let key = Arc::new(TrafficKey::new(vec![1; 16]));
        let mut transcript = Transcript::new();
        for (sender, n, text) in [
            (Sender::Server, 0, "HTTP/1.1 "),
            (Sender::Client, 0, "GET /"),
            (Sender::Server, 1, "200 OK"),
        ] {
            transcript.push(
                TranscriptBlock::seal(
                    sender,
                    suite,
                    Arc::clone(&key),
                    vec![0; IV_LEN],
                    n,
                    text.as_bytes().to_vec(),
                )
                .unwrap(),
            );
        }
        assert_eq!(
            direction_plaintext(&transcript, Sender::Server),
            b"HTTP/1.1 200 OK".to_vec()
        );
        assert_eq!(direction_plaintext(&transcript, Sender::Client), b"GET /".to_vec());
    }
}
