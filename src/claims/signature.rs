//! Pluggable signature schemes.
//!
//! The default scheme is secp256k1 ECDSA with Ethereum personal-message
//! hashing and addresses, so claims can be checked by existing wallets and
//! contracts.

use crate::error::{ProtocolError, ProtocolResult};
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use sha3::{Digest, Keccak256};
use zeroize::Zeroizing;

/// Signing capability used for owner proofs and witness attestations.
pub trait SignatureScheme: Send + Sync {
    fn sign(&self, data: &[u8], private_key: &[u8]) -> ProtocolResult<Vec<u8>>;

    /// True when `signature` over `data` was produced by `address`.
    fn verify(&self, data: &[u8], signature: &[u8], address: &str) -> ProtocolResult<bool>;

    fn get_public_key(&self, private_key: &[u8]) -> ProtocolResult<Vec<u8>>;

    fn get_address(&self, public_key: &[u8]) -> ProtocolResult<String>;

    /// Address that produced `signature` over `data`.
    fn recover_address(&self, data: &[u8], signature: &[u8]) -> ProtocolResult<String>;
}

/// secp256k1 with EIP-191 message hashing.
///
/// Signatures are 65 bytes: `r || s || v` with `v` in `{27, 28}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EthSecp256k1;

impl EthSecp256k1 {
    fn message_hash(data: &[u8]) -> [u8; 32] {
        let mut hasher = Keccak256::new();
        hasher.update(format!("\x19Ethereum Signed Message:\n{}", data.len()).as_bytes());
        hasher.update(data);
        hasher.finalize().into()
    }

    fn signing_key(private_key: &[u8]) -> ProtocolResult<SigningKey> {
        SigningKey::from_slice(private_key)
            .map_err(|_| ProtocolError::bad_request("invalid secp256k1 private key"))
    }

    fn address_of(key: &VerifyingKey) -> String {
        let point = key.to_encoded_point(false);
        let hash = Keccak256::digest(&point.as_bytes()[1..]);
        format!("0x{}", hex::encode(&hash[12..]))
    }
}

impl SignatureScheme for EthSecp256k1 {
    fn sign(&self, data: &[u8], private_key: &[u8]) -> ProtocolResult<Vec<u8>> {
        let key = Self::signing_key(private_key)?;
        let (signature, recovery_id) = key
            .sign_prehash_recoverable(&Self::message_hash(data))
            .map_err(|e| ProtocolError::internal(format!("signing failed: {}", e)))?;

        let mut bytes = signature.to_bytes().to_vec();
        bytes.push(27 + recovery_id.to_byte());
        Ok(bytes)
    }

    fn verify(&self, data: &[u8], signature: &[u8], address: &str) -> ProtocolResult<bool> {
        match self.recover_address(data, signature) {
            Ok(recovered) => Ok(recovered.eq_ignore_ascii_case(address)),
            Err(_) => Ok(false),
        }
    }

    fn get_public_key(&self, private_key: &[u8]) -> ProtocolResult<Vec<u8>> {
        let key = Self::signing_key(private_key)?;
        Ok(key
            .verifying_key()
            .to_encoded_point(false)
            .as_bytes()
            .to_vec())
    }

    fn get_address(&self, public_key: &[u8]) -> ProtocolResult<String> {
        let key = VerifyingKey::from_sec1_bytes(public_key)
            .map_err(|_| ProtocolError::bad_request("invalid secp256k1 public key"))?;
        Ok(Self::address_of(&key))
    }

    fn recover_address(&self, data: &[u8], signature: &[u8]) -> ProtocolResult<String> {
        if signature.len() != 65 {
            return Err(ProtocolError::authentication_failed(format!(
                "signature must be 65 bytes, got {}",
                signature.len()
            )));
        }

        let parsed = Signature::from_slice(&signature[..64])
            .map_err(|_| ProtocolError::authentication_failed("malformed signature"))?;
        let v = signature[64];
        let recovery_id = RecoveryId::from_byte(v.checked_sub(27).unwrap_or(v))
            .ok_or_else(|| ProtocolError::authentication_failed("invalid recovery id"))?;

        let key = VerifyingKey::recover_from_prehash(&Self::message_hash(data), &parsed, recovery_id)
            .map_err(|_| ProtocolError::authentication_failed("signature recovery failed"))?;
        Ok(Self::address_of(&key))
    }
}

/// Decode a hex private key, with or without `0x`.
pub fn parse_private_key(encoded: &str) -> ProtocolResult<Zeroizing<Vec<u8>>> {
    let trimmed = encoded.trim().trim_start_matches("0x");
    hex::decode(trimmed)
        .map(Zeroizing::new)
        .map_err(|_| ProtocolError::bad_request("private key must be hex"))
}

/// Address controlled by `private_key` under `scheme`.
pub fn address_for_key(scheme: &dyn SignatureScheme, private_key: &[u8]) -> ProtocolResult<String> {
    scheme.get_address(&scheme.get_public_key(private_key)?)
}
