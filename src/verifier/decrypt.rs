//! Reconstructing revealed plaintext from the recorded ciphertext.

use crate::error::{ProtocolError, ProtocolResult};
use crate::oprf::{nullifier_to_printable, TOPRF_DOMAIN_SEPARATOR};
use crate::redaction::{is_redaction_congruent, REDACTION_CHAR};
use crate::transcript::{record_nonce, CipherSuite, RecordCipher, TAG_LEN};
use crate::wire::{BlockReveal, DirectReveal, ZkReveal};
use crate::zk::{public_ciphertext, ProofOutput, PublicSignals, ToprfSignals, ZkOperator};
use std::collections::BTreeSet;

/// Sentinel-filled plaintext for a record nobody revealed.
pub fn hidden_plaintext(ciphertext: &[u8]) -> Vec<u8> {
    vec![REDACTION_CHAR; ciphertext.len().saturating_sub(TAG_LEN)]
}

/// Redacted plaintext of `ciphertext` as disclosed by `reveal`.
///
/// `ciphertext` must be the witness's own copy of the record.
pub async fn reveal_block(
    suite: CipherSuite,
    ciphertext: &[u8],
    reveal: &BlockReveal,
    operator: &dyn ZkOperator,
) -> ProtocolResult<Vec<u8>> {
    match (&reveal.direct_reveal, &reveal.zk_reveal) {
        (Some(direct), None) => open_direct(suite, ciphertext, direct),
        (None, Some(zk)) => verify_zk(suite, ciphertext, zk, operator).await,
        _ => Err(ProtocolError::bad_request(format!(
            "message {} must carry exactly one of a direct or ZK reveal",
            reveal.index
        ))),
    }
}

fn open_direct(
    suite: CipherSuite,
    ciphertext: &[u8],
    reveal: &DirectReveal,
) -> ProtocolResult<Vec<u8>> {
    RecordCipher::new(suite, &reveal.key)?.open(&reveal.iv, reveal.record_number, ciphertext)
}

async fn verify_zk(
    suite: CipherSuite,
    ciphertext: &[u8],
    reveal: &ZkReveal,
    operator: &dyn ZkOperator,
) -> ProtocolResult<Vec<u8>> {
    let body = &ciphertext[..ciphertext.len().saturating_sub(TAG_LEN)];
    let nonce = record_nonce(&reveal.iv, reveal.record_number)?.to_vec();
    let chunk_size = suite.chunk_size();

    let mut plaintext = vec![REDACTION_CHAR; body.len()];
    let mut seen = BTreeSet::new();

    for chunk in &reveal.proofs {
        let start = chunk.start_idx;
        if start % chunk_size != 0 || start >= body.len() || !seen.insert(start) {
            return Err(ProtocolError::bad_request(format!(
                "invalid or duplicate chunk offset {}",
                start
            )));
        }
        let end = (start + chunk_size).min(body.len());
        if chunk.redacted_plaintext.len() != end - start
            || chunk.decrypted_redacted_ciphertext.len() != end - start
        {
            return Err(ProtocolError::bad_request(format!(
                "chunk at {} does not cover {} bytes",
                start,
                end - start
            )));
        }

        let toprf_location = chunk.toprf.as_ref().map(|t| t.data_location);
        let toprf_range = match toprf_location {
            Some(location) => match location.range_within(end - start) {
                Some(range) if !range.is_empty() => Some(range),
                _ => {
                    return Err(ProtocolError::bad_request(format!(
                        "OPRF location of chunk at {} lies outside the chunk",
                        start
                    )))
                }
            },
            None => None,
        };

        let public = PublicSignals {
            suite,
            nonce: nonce.clone(),
            counter: suite.counter_at(start),
            ciphertext: public_ciphertext(&body[start..end], &chunk.redacted_plaintext, toprf_location),
            toprf: chunk
                .toprf
                .as_ref()
                .map(|claim| ToprfSignals::from_claim(claim, TOPRF_DOMAIN_SEPARATOR)),
        };
        let output = ProofOutput {
            proof_data: chunk.proof_data.clone(),
            decrypted_redacted_ciphertext: chunk.decrypted_redacted_ciphertext.clone(),
        };
        if !operator.verify_proof(&output, &public).await? {
            return Err(ProtocolError::invalid_claim(format!(
                "proof for chunk at {} does not verify",
                start
            )));
        }

        if !is_redaction_congruent(&chunk.redacted_plaintext, &chunk.decrypted_redacted_ciphertext)
        {
            return Err(ProtocolError::invalid_claim(format!(
                "redacted plaintext of chunk at {} diverges from the proven decryption",
                start
            ))
            .with_data(serde_json::json!({ "startIdx": start })));
        }

        if let (Some(claim), Some(range)) = (&chunk.toprf, toprf_range) {
            let printable = nullifier_to_printable(&claim.nullifier, range.len());
            if chunk.redacted_plaintext[range] != printable[..] {
                return Err(ProtocolError::invalid_claim(format!(
                    "chunk at {} does not show its nullifier",
                    start
                )));
            }
        }

        plaintext[start..end].copy_from_slice(&chunk.redacted_plaintext);
    }

    Ok(plaintext)
}
