//! Reference proving backend.
//!
//! The "proof" is the traffic key itself, so verification simply recomputes
//! the keystream. It is not zero knowledge. It exists to exercise chunking,
//! congruency and OPRF binding end to end without a circuit toolchain.

use super::traits::{ZkOperator, ZkOperatorFactory};
use super::types::{BackendSource, ProofInput, ProofOutput, PublicSignals, ZkEngine};
use crate::error::{ProtocolError, ProtocolResult};
use crate::oprf::{nullifier_to_printable, LocalOprfOperator};
use crate::transcript::{CipherSuite, RecordCipher};
use crate::wire::codec::{from_cbor, to_cbor};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;
use zeroize::Zeroizing;

#[derive(Serialize, Deserialize)]
struct TransparentProof {
    engine: ZkEngine,
    key: Vec<u8>,
}

#[derive(Default)]
struct Counters {
    created: AtomicUsize,
    released: AtomicUsize,
}

/// Operator bound to a single cipher suite.
pub struct TransparentZkOperator {
    suite: CipherSuite,
    engine: ZkEngine,
    oprf: Option<Arc<LocalOprfOperator>>,
    counters: Arc<Counters>,
}

impl TransparentZkOperator {
    pub fn new(suite: CipherSuite, engine: ZkEngine) -> Self {
        Self {
            suite,
            engine,
            oprf: None,
            counters: Arc::default(),
        }
    }

    /// Check OPRF chunks against `oprf`. Without one they never verify.
    pub fn with_oprf(mut self, oprf: Arc<LocalOprfOperator>) -> Self {
        self.oprf = Some(oprf);
        self
    }

    /// `ciphertext XOR keystream` for the chunk described by `public`.
    fn decrypt(&self, key: &[u8], public: &PublicSignals) -> ProtocolResult<Vec<u8>> {
        if public.suite != self.suite {
            return Err(ProtocolError::bad_request(format!(
                "{} operator cannot handle {} chunks",
                self.suite, public.suite
            )));
        }
        let start_counter = self.suite.start_counter();
        if public.counter < start_counter {
            return Err(ProtocolError::bad_request(format!(
                "counter {} precedes first data block",
                public.counter
            )));
        }

        let offset = (public.counter - start_counter) as usize * self.suite.block_size();
        let cipher = RecordCipher::new(self.suite, key)?;
        // The nonce is already combined with the record number.
        let stream = cipher.keystream(&public.nonce, 0, offset + public.ciphertext.len())?;

        Ok(public
            .ciphertext
            .iter()
            .zip(&stream[offset..])
            .map(|(c, k)| c ^ k)
            .collect())
    }

    fn bind_nullifier(output: &mut [u8], public: &PublicSignals) -> ProtocolResult<()> {
        if let Some(toprf) = &public.toprf {
            let range = toprf.location.range_within(output.len()).ok_or_else(|| {
                ProtocolError::bad_request("OPRF location extends past the chunk")
            })?;
            let printable = nullifier_to_printable(&toprf.nullifier, toprf.location.length);
            output[range].copy_from_slice(&printable);
        }
        Ok(())
    }
}

#[async_trait]
impl ZkOperator for TransparentZkOperator {
    async fn generate_proof(&self, input: ProofInput) -> ProtocolResult<ProofOutput> {
        let mut output = self.decrypt(input.key.as_bytes(), &input.public)?;
        Self::bind_nullifier(&mut output, &input.public)?;

        let proof = TransparentProof {
            engine: self.engine,
            key: input.key.as_bytes().to_vec(),
        };
        Ok(ProofOutput {
            proof_data: to_cbor(&proof)?,
            decrypted_redacted_ciphertext: output,
        })
    }

    async fn verify_proof(
        &self,
        output: &ProofOutput,
        public: &PublicSignals,
    ) -> ProtocolResult<bool> {
        let proof: TransparentProof = from_cbor(&output.proof_data)?;
        let key = Zeroizing::new(proof.key);
        if proof.engine != self.engine || key.len() != self.suite.key_len() {
            return Ok(false);
        }

        let mut expected = self.decrypt(&key, public)?;

        if let Some(toprf) = &public.toprf {
            let Some(oprf) = &self.oprf else {
                debug!("no OPRF evaluator configured, rejecting OPRF chunk");
                return Ok(false);
            };
            let Some(hashed) = toprf
                .location
                .range_within(expected.len())
                .and_then(|range| expected.get(range))
            else {
                return Ok(false);
            };
            if oprf.nullifier(hashed, &toprf.domain_separator) != toprf.nullifier {
                return Ok(false);
            }
        }

        Self::bind_nullifier(&mut expected, public)?;
        Ok(expected == output.decrypted_redacted_ciphertext)
    }

    async fn release(&self) {
        self.counters.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// Factory for [`TransparentZkOperator`]s.
#[derive(Default)]
pub struct TransparentZkFactory {
    source: BackendSource,
    oprf: Option<Arc<LocalOprfOperator>>,
    counters: Arc<Counters>,
}

impl TransparentZkFactory {
    pub fn new(source: BackendSource) -> Self {
        Self {
            source,
            ..Self::default()
        }
    }

    pub fn with_oprf(mut self, oprf: Arc<LocalOprfOperator>) -> Self {
        self.oprf = Some(oprf);
        self
    }

    /// Operators built so far.
    pub fn created(&self) -> usize {
        self.counters.created.load(Ordering::SeqCst)
    }

    /// Operators released so far.
    pub fn released(&self) -> usize {
        self.counters.released.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ZkOperatorFactory for TransparentZkFactory {
    async fn create(
        &self,
        suite: CipherSuite,
        engine: ZkEngine,
    ) -> ProtocolResult<Arc<dyn ZkOperator>> {
        debug!(
            %suite,
            %engine,
            artifacts = %self.source.artifact_location(suite, engine),
            "loading transparent backend"
        );
        self.counters.created.fetch_add(1, Ordering::SeqCst);

        let mut operator = TransparentZkOperator::new(suite, engine);
        operator.counters = Arc::clone(&self.counters);
        if let Some(oprf) = &self.oprf {
            operator = operator.with_oprf(Arc::clone(oprf));
        }
        Ok(Arc::new(operator))
    }
}
