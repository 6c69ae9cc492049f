//! In-process threshold OPRF simulation.
//!
//! Server key shares are derived with HKDF-SHA256 from a seed. The nullifier
//! is `SHA-256(domain || 0x00 || HMAC(master, data))`, so it depends only on
//! the data, the domain separator and the seed, never on the blinding mask.
//! Used for tests and local development; production deployments talk to
//! remote OPRF servers through their own `OprfOperator`.

use super::traits::OprfOperator;
use super::types::{DataLocation, OprfMask, OprfResponse, ToprfClaim};
use crate::error::{ProtocolError, ProtocolResult};
use async_trait::async_trait;
use hkdf::Hkdf;
use rand::RngCore;
use ring::hmac;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

const OPRF_SALT: &[u8] = b"tls-witness-oprf-v1";

/// Reference OPRF operator with `servers` simulated key holders.
pub struct LocalOprfOperator {
    master: Zeroizing<[u8; 32]>,
    shares: Vec<Zeroizing<[u8; 32]>>,
}

impl LocalOprfOperator {
    pub fn new(seed: &[u8], servers: usize) -> ProtocolResult<Self> {
        if servers == 0 {
            return Err(ProtocolError::bad_request(
                "OPRF operator needs at least one server",
            ));
        }

        let hk = Hkdf::<Sha256>::new(Some(OPRF_SALT), seed);
        let mut master = Zeroizing::new([0u8; 32]);
        hk.expand(b"master", &mut master[..])
            .map_err(|e| ProtocolError::internal(format!("OPRF key derivation failed: {}", e)))?;

        let mut shares = Vec::with_capacity(servers);
        for index in 0..servers {
            let mut share = Zeroizing::new([0u8; 32]);
            hk.expand(format!("server-{}", index).as_bytes(), &mut share[..])
                .map_err(|e| {
                    ProtocolError::internal(format!("OPRF key derivation failed: {}", e))
                })?;
            shares.push(share);
        }

        Ok(Self { master, shares })
    }

    /// Deterministic nullifier for `data` under `domain_separator`.
    pub fn nullifier(&self, data: &[u8], domain_separator: &str) -> Vec<u8> {
        let key = hmac::Key::new(hmac::HMAC_SHA256, &self.master[..]);
        let evaluation = hmac::sign(&key, data);

        let mut hasher = Sha256::new();
        hasher.update(domain_separator.as_bytes());
        hasher.update([0u8]);
        hasher.update(evaluation.as_ref());
        hasher.finalize().to_vec()
    }

    fn blind(data: &[u8], mask: &[u8]) -> Vec<u8> {
        Sha256::digest(data)
            .iter()
            .zip(mask.iter())
            .map(|(d, m)| d ^ m)
            .collect()
    }
}

#[async_trait]
impl OprfOperator for LocalOprfOperator {
    async fn evaluate(&self, data: &[u8], domain_separator: &str) -> ProtocolResult<ToprfClaim> {
        if data.is_empty() {
            return Err(ProtocolError::bad_request("cannot evaluate OPRF on empty data"));
        }

        let mut mask = vec![0u8; 32];
        rand::thread_rng().fill_bytes(&mut mask);
        let blinded = Self::blind(data, &mask);

        let responses = self
            .shares
            .iter()
            .enumerate()
            .map(|(index, share)| {
                let key = hmac::Key::new(hmac::HMAC_SHA256, &share[..]);
                OprfResponse {
                    server_index: index as u32,
                    public_key_share: Sha256::digest(&share[..]).to_vec(),
                    evaluated: hmac::sign(&key, &blinded).as_ref().to_vec(),
                }
            })
            .collect();

        Ok(ToprfClaim {
            nullifier: self.nullifier(data, domain_separator),
            responses,
            mask: OprfMask::new(mask),
            data_location: DataLocation::new(0, data.len()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oprf::TOPRF_DOMAIN_SEPARATOR;

    #[tokio::test]
    async fn test_nullifier_is_deterministic() {
        let operator = LocalOprfOperator::new(b"seed", 3).unwrap();

        let first = operator
            .evaluate(b"alice@example.com", TOPRF_DOMAIN_SEPARATOR)
            .await
            .unwrap();
        let second = operator
            .evaluate(b"alice@example.com", TOPRF_DOMAIN_SEPARATOR)
            .await
            .unwrap();

        assert_eq!(first.nullifier, second.nullifier);
        assert_ne!(first.mask, second.mask, "mask must be fresh per request");
        assert_eq!(first.responses.len(), 3);
    }

    #[tokio::test]
    async fn test_nullifier_depends_on_domain_and_data() {
        let operator = LocalOprfOperator::new(b"seed", 1).unwrap();
        let base = operator.nullifier(b"data", "a");

        assert_ne!(base, operator.nullifier(b"data", "b"));
        assert_ne!(base, operator.nullifier(b"date", "a"));
    }

    #[tokio::test]
    async fn test_rejects_empty_data() {
        let operator = LocalOprfOperator::new(b"seed", 1).unwrap();
        assert!(operator.evaluate(b"", "x").await.is_err());
        assert!(LocalOprfOperator::new(b"seed", 0).is_err());
    }
}
