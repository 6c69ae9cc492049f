//! Witness-side claim tunnel handling.
//!
//! Each request moves through
//! `Received -> SignatureChecked -> TranscriptMatched -> TranscriptDecrypted
//! -> ProviderValidated -> Signed`. A failure at any stage skips straight to
//! `Signed`: the error is placed in the response and signed like a claim, so
//! a rejection is attributable to the witness that issued it.

use super::decrypt::{hidden_plaintext, reveal_block};
use super::records::TunnelRecordStore;
use super::transcript_match::match_transcript;
use crate::claims::{address_for_key, sign_claim, CompleteClaimData, SignatureScheme};
use crate::error::{ErrorCode, ProtocolError, ProtocolResult};
use crate::provider::{parse_params, ProviderReceipt, ProviderRegistry, ReceiptMessage};
use crate::wire::{
    decode_frame, encode_frame, ClaimOutcome, ClaimTunnelRequest, ClaimTunnelResponse,
    ResponseSignatures,
};
use crate::zk::{ZkEngine, ZkOperatorCache};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

/// Verifies claim tunnel requests and signs the outcome.
pub struct ClaimTunnelHandler {
    records: Arc<dyn TunnelRecordStore>,
    providers: ProviderRegistry,
    zk: Arc<ZkOperatorCache>,
    engine: ZkEngine,
    scheme: Arc<dyn SignatureScheme>,
    private_key: Zeroizing<Vec<u8>>,
    address: String,
}

impl ClaimTunnelHandler {
    pub fn new(
        records: Arc<dyn TunnelRecordStore>,
        providers: ProviderRegistry,
        zk: Arc<ZkOperatorCache>,
        scheme: Arc<dyn SignatureScheme>,
        private_key: Zeroizing<Vec<u8>>,
    ) -> ProtocolResult<Self> {
        let address = address_for_key(scheme.as_ref(), &private_key)?;
        Ok(Self {
            records,
            providers,
            zk,
            engine: ZkEngine::default(),
            scheme,
            private_key,
            address,
        })
    }

    pub fn with_engine(mut self, engine: ZkEngine) -> Self {
        self.engine = engine;
        self
    }

    /// Address this witness signs with.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Verify `request` and return the signed outcome.
    ///
    /// Verification failures are reported inside the response. An `Err` means
    /// the witness could not sign at all.
    pub async fn claim_tunnel(
        &self,
        request: ClaimTunnelRequest,
    ) -> ProtocolResult<ClaimTunnelResponse> {
        let tunnel_id = request.request.tunnel_id;
        let outcome = match self.verify(&request).await {
            Ok(claim) => {
                info!(tunnel_id, identifier = %claim.identifier, "claim attested");
                ClaimOutcome::Claim(claim)
            }
            Err(err) => {
                warn!(tunnel_id, code = %err.code, "claim rejected: {}", err.message);
                ClaimOutcome::Error(err)
            }
        };

        let mut response = ClaimTunnelResponse {
            request,
            outcome,
            signatures: ResponseSignatures::default(),
        };

        if let ClaimOutcome::Claim(claim) = &response.outcome {
            response.signatures.claim_signature =
                Some(sign_claim(self.scheme.as_ref(), claim, &self.private_key)?);
        }
        let payload = response.signing_payload()?;
        response.signatures.result_signature = self.scheme.sign(&payload, &self.private_key)?;
        Ok(response)
    }

    /// Decode a request frame, handle it and encode the response frame.
    pub async fn handle_frame(&self, frame: &[u8]) -> ProtocolResult<Vec<u8>> {
        let request: ClaimTunnelRequest = decode_frame(frame)?;
        let response = self.claim_tunnel(request).await?;
        Ok(encode_frame(&response)?)
    }

    async fn verify(&self, request: &ClaimTunnelRequest) -> ProtocolResult<CompleteClaimData> {
        let data = &request.data;

        // SignatureChecked
        let payload = request.signing_payload()?;
        request.owner_proof().verify(self.scheme.as_ref(), &payload)?;

        let info = data.info();
        let expected_identifier = info.identifier()?;
        if expected_identifier != data.identifier {
            return Err(ProtocolError::invalid_claim(format!(
                "identifier {} does not match claim, expected {}",
                data.identifier, expected_identifier
            )));
        }

        let provider = self.providers.get(&data.provider)?;
        let params = parse_params(&data.parameters)?;
        let host_port = provider.host_port().resolve(&params)?;
        if host_port != request.request.host_port() {
            return Err(ProtocolError::bad_request(format!(
                "provider {} expects {}, tunnel went to {}",
                data.provider,
                host_port,
                request.request.host_port()
            )));
        }

        let record = self
            .records
            .get(request.request.tunnel_id)
            .await
            .ok_or_else(|| {
                ProtocolError::bad_request(format!(
                    "unknown tunnel {}",
                    request.request.tunnel_id
                ))
            })?;
        if record.host != request.request.host || record.port != request.request.port {
            return Err(ProtocolError::bad_request(
                "tunnel destination does not match request",
            ));
        }

        // TranscriptMatched
        match_transcript(&request.transcript, &record)?;
        debug!(messages = request.transcript.len(), "transcript matched");

        // TranscriptDecrypted
        let mut revealed = BTreeMap::new();
        let operator = self.zk.get(record.cipher_suite, self.engine).await?;
        for reveal in &request.reveals {
            let recorded = record.messages.get(reveal.index).filter(|_| {
                reveal.index < request.transcript.len()
            });
            let Some(recorded) = recorded else {
                return Err(ProtocolError::bad_request(format!(
                    "reveal for unknown message {}",
                    reveal.index
                )));
            };
            if revealed.contains_key(&reveal.index) {
                return Err(ProtocolError::bad_request(format!(
                    "message {} revealed twice",
                    reveal.index
                )));
            }

            let plaintext = reveal_block(
                record.cipher_suite,
                &recorded.ciphertext,
                reveal,
                operator.as_ref(),
            )
            .await?;
            revealed.insert(reveal.index, plaintext);
        }
        debug!(revealed = revealed.len(), "transcript decrypted");

        let receipt = ProviderReceipt {
            messages: request
                .transcript
                .iter()
                .enumerate()
                .map(|(index, message)| ReceiptMessage {
                    sender: message.sender,
                    data: revealed
                        .remove(&index)
                        .unwrap_or_else(|| hidden_plaintext(&record.messages[index].ciphertext)),
                })
                .collect(),
        };

        // ProviderValidated
        let extracted = provider
            .assert_valid_provider_receipt(&receipt, &params)
            .map_err(|err| match err.code {
                ErrorCode::InvalidClaim => err,
                _ => ProtocolError::invalid_claim(format!(
                    "provider {} rejected receipt: {}",
                    data.provider, err.message
                )),
            })?;

        let merged = info.with_extracted_parameters(&extracted)?;
        CompleteClaimData::new(&merged, &data.owner, data.timestamp_s, data.epoch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::{ClaimInfo, ClaimOwnerProof, EthSecp256k1};
    use crate::provider::{ExtractedParameters, Provider, ProviderField, ProviderRequest};
    use crate::redaction::RedactionRange;
    use crate::transcript::{CipherSuite, Sender, TrafficKey, TranscriptBlock, IV_LEN};
    use crate::verifier::{MemoryTunnelStore, RecordedMessage, TunnelRecord};
    use crate::wire::{BlockReveal, DirectReveal, RequestSignatures, TranscriptMessage, TunnelRequest};
    use crate::zk::TransparentZkFactory;
    use serde_json::{Map, Value};

    const OWNER_KEY: [u8; 32] = [0x11; 32];
    const WITNESS_KEY: [u8; 32] = [0x22; 32];

    struct Echo {
        host_port: ProviderField<String>,
        geo: ProviderField<Option<String>>,
    }

    impl Provider for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn host_port(&self) -> &ProviderField<String> {
            &self.host_port
        }

        fn geo_location(&self) -> &ProviderField<Option<String>> {
            &self.geo
        }

        fn create_request(&self, _: &Value, _: &Value) -> ProtocolResult<ProviderRequest> {
            Ok(ProviderRequest {
                data: b"ping".to_vec(),
                redactions: vec![],
            })
        }

        fn response_redactions(&self, _: &[u8], _: &Value) -> ProtocolResult<Vec<RedactionRange>> {
            Ok(vec![])
        }

        fn assert_valid_provider_receipt(
            &self,
            receipt: &ProviderReceipt,
            _: &Value,
        ) -> ProtocolResult<ExtractedParameters> {
            if receipt.bytes_from(Sender::Server) != b"pong" {
                return Err(ProtocolError::bad_request("expected pong"));
            }
            let mut extracted = Map::new();
            extracted.insert("reply".to_string(), Value::String("pong".to_string()));
            Ok(extracted)
        }
    }

    struct Fixture {
        handler: ClaimTunnelHandler,
        request: ClaimTunnelRequest,
    }

    async fn fixture(server_reply: &[u8]) -> Fixture {
        let suite = CipherSuite::Aes128Gcm;
        let client_key = Arc::new(TrafficKey::new(vec![1; 16]));
        let server_key = Arc::new(TrafficKey::new(vec![2; 16]));
        let ping = TranscriptBlock::seal(
            Sender::Client,
            suite,
            Arc::clone(&client_key),
            vec![3; IV_LEN],
            0,
            b"ping".to_vec(),
        )
        .unwrap();
        let pong = TranscriptBlock::seal(
            Sender::Server,
            suite,
            Arc::clone(&server_key),
            vec![4; IV_LEN],
            0,
            server_reply.to_vec(),
        )
        .unwrap();

        let store = Arc::new(MemoryTunnelStore::new());
        store
            .insert(TunnelRecord {
                tunnel_id: 5,
                host: "echo.example".to_string(),
                port: 443,
                geo_location: None,
                cipher_suite: suite,
                messages: vec![
                    RecordedMessage {
                        sender: Sender::Client,
                        ciphertext: ping.ciphertext.clone(),
                    },
                    RecordedMessage {
                        sender: Sender::Server,
                        ciphertext: pong.ciphertext.clone(),
                    },
                ],
            })
            .await;

        let mut providers = ProviderRegistry::new();
        providers.register(Arc::new(Echo {
            host_port: ProviderField::Static("echo.example:443".to_string()),
            geo: ProviderField::Static(None),
        }));

        let scheme: Arc<dyn SignatureScheme> = Arc::new(EthSecp256k1);
        let handler = ClaimTunnelHandler::new(
            store,
            providers,
            Arc::new(ZkOperatorCache::new(Arc::new(TransparentZkFactory::default()))),
            Arc::clone(&scheme),
            Zeroizing::new(WITNESS_KEY.to_vec()),
        )
        .unwrap();

        let owner = address_for_key(scheme.as_ref(), &OWNER_KEY).unwrap();
        let data = CompleteClaimData::new(&ClaimInfo::new("echo", "{}", ""), &owner, 100, 1).unwrap();
        let reveal = |index: usize, block: &TranscriptBlock| BlockReveal {
            index,
            direct_reveal: Some(DirectReveal {
                key: block.key.as_bytes().to_vec(),
                iv: block.fixed_iv.clone(),
                record_number: block.record_number,
            }),
            zk_reveal: None,
        };

        let mut request = ClaimTunnelRequest {
            request: TunnelRequest {
                host: "echo.example".to_string(),
                port: 443,
                geo_location: None,
                tunnel_id: 5,
            },
            data,
            transcript: vec![
                TranscriptMessage {
                    sender: Sender::Client,
                    message: ping.ciphertext.clone(),
                },
                TranscriptMessage {
                    sender: Sender::Server,
                    message: pong.ciphertext.clone(),
                },
            ],
            reveals: vec![reveal(0, &ping), reveal(1, &pong)],
            signatures: RequestSignatures::default(),
        };
        sign_request(&mut request);

        Fixture { handler, request }
    }

    fn sign_request(request: &mut ClaimTunnelRequest) {
        let payload = request.signing_payload().unwrap();
        request.signatures.request_signature =
            ClaimOwnerProof::create(&EthSecp256k1, &payload, &OWNER_KEY)
                .unwrap()
                .signature;
    }

    #[tokio::test]
    async fn test_valid_claim_is_signed() {
        let Fixture { handler, request } = fixture(b"pong").await;
        let response = handler.claim_tunnel(request).await.unwrap();

        let claim = response.outcome.claim().cloned().unwrap();
        let context: Value = serde_json::from_str(&claim.context).unwrap();
        assert_eq!(context["extractedParameters"]["reply"], "pong");
        assert_eq!(claim.identifier, claim.info().identifier().unwrap());

        let claim_signature = response.signatures.claim_signature.clone().unwrap();
        let signers =
            crate::claims::recover_claim_signers(&EthSecp256k1, &claim, &[claim_signature]).unwrap();
        assert_eq!(signers, vec![handler.address().to_string()]);

        let payload = response.signing_payload().unwrap();
        assert!(EthSecp256k1
            .verify(&payload, &response.signatures.result_signature, handler.address())
            .unwrap());
    }

    #[tokio::test]
    async fn test_rejections_are_signed_errors() {
        let Fixture { handler, request } = fixture(b"nope").await;
        let response = handler.claim_tunnel(request).await.unwrap();

        let ClaimOutcome::Error(err) = &response.outcome else {
            panic!("expected error outcome");
        };
        assert_eq!(err.code, ErrorCode::InvalidClaim);
        assert!(response.signatures.claim_signature.is_none());

        let payload = response.signing_payload().unwrap();
        assert!(EthSecp256k1
            .verify(&payload, &response.signatures.result_signature, handler.address())
            .unwrap());
    }

    #[tokio::test]
    async fn test_bad_owner_signature() {
        let Fixture { handler, mut request } = fixture(b"pong").await;
        request.signatures.request_signature[0] ^= 1;
        let response = handler.claim_tunnel(request).await.unwrap();
        assert_eq!(
            response.outcome.into_result().unwrap_err().code,
            ErrorCode::AuthenticationFailed
        );
    }

    #[tokio::test]
    async fn test_request_signed_by_someone_else() {
        let Fixture { handler, mut request } = fixture(b"pong").await;
        let payload = request.signing_payload().unwrap();
        request.signatures.request_signature =
            ClaimOwnerProof::create(&EthSecp256k1, &payload, &WITNESS_KEY)
                .unwrap()
                .signature;

        let response = handler.claim_tunnel(request).await.unwrap();
        assert_eq!(
            response.outcome.into_result().unwrap_err().code,
            ErrorCode::AuthenticationFailed
        );
    }

    #[tokio::test]
    async fn test_tampered_identifier() {
        let Fixture { handler, mut request } = fixture(b"pong").await;
        request.data.identifier = format!("0x{}", "00".repeat(32));
        sign_request(&mut request);
        let response = handler.claim_tunnel(request).await.unwrap();
        assert_eq!(
            response.outcome.into_result().unwrap_err().code,
            ErrorCode::InvalidClaim
        );
    }

    #[tokio::test]
    async fn test_unknown_tunnel_and_frames() {
        let Fixture { handler, mut request } = fixture(b"pong").await;
        request.request.tunnel_id = 99;
        sign_request(&mut request);

        let frame = encode_frame(&request).unwrap();
        let response: ClaimTunnelResponse =
            decode_frame(&handler.handle_frame(&frame).await.unwrap()).unwrap();
        assert_eq!(
            response.outcome.into_result().unwrap_err().code,
            ErrorCode::BadRequest
        );

        assert!(handler.handle_frame(&[0, 0, 0, 1, 0xff]).await.is_err());
    }

    #[tokio::test]
    async fn test_unrevealed_messages_are_hidden() {
        let Fixture { handler, mut request } = fixture(b"pong").await;
        request.reveals.truncate(1);
        sign_request(&mut request);
        let response = handler.claim_tunnel(request).await.unwrap();
        // The provider sees "****" for the server reply and refuses.
        assert_eq!(
            response.outcome.into_result().unwrap_err().code,
            ErrorCode::InvalidClaim
        );
    }
}
