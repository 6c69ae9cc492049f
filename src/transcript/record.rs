//! TLS 1.3 record protection.
//!
//! - Nonce: `fixed_iv XOR be64(record_number)` left-padded to 12 bytes
//! - AAD: record header `17 03 03 len` where `len` counts ciphertext and tag
//! - AEAD: AES-128-GCM, AES-256-GCM or ChaCha20-Poly1305 via `ring`

use super::types::{CipherSuite, IV_LEN, TAG_LEN};
use crate::error::{ProtocolError, ProtocolResult};
use ring::aead::{
    Aad, Algorithm, LessSafeKey, Nonce, UnboundKey, AES_128_GCM, AES_256_GCM, CHACHA20_POLY1305,
};

/// Record content type byte of application data.
pub const TLS_APPLICATION_DATA: u8 = 0x17;

/// Legacy record version written in every TLS 1.3 record header.
const TLS_LEGACY_VERSION: [u8; 2] = [0x03, 0x03];

fn algorithm(suite: CipherSuite) -> &'static Algorithm {
    match suite {
        CipherSuite::Aes128Gcm => &AES_128_GCM,
        CipherSuite::Aes256Gcm => &AES_256_GCM,
        CipherSuite::ChaCha20Poly1305 => &CHACHA20_POLY1305,
    }
}

/// Per-record nonce derived from the fixed IV and the record sequence number.
pub fn record_nonce(fixed_iv: &[u8], record_number: u64) -> ProtocolResult<[u8; IV_LEN]> {
    if fixed_iv.len() != IV_LEN {
        return Err(ProtocolError::bad_request(format!(
            "fixed IV must be {} bytes, got {}",
            IV_LEN,
            fixed_iv.len()
        )));
    }

    let mut nonce = [0u8; IV_LEN];
    nonce.copy_from_slice(fixed_iv);
    for (slot, byte) in nonce[IV_LEN - 8..]
        .iter_mut()
        .zip(record_number.to_be_bytes())
    {
        *slot ^= byte;
    }
    Ok(nonce)
}

/// Additional data authenticated with an application data record.
pub fn record_aad(ciphertext_len: usize) -> [u8; 5] {
    let len = (ciphertext_len as u16).to_be_bytes();
    [
        TLS_APPLICATION_DATA,
        TLS_LEGACY_VERSION[0],
        TLS_LEGACY_VERSION[1],
        len[0],
        len[1],
    ]
}

/// AEAD bound to one traffic key.
pub struct RecordCipher {
    suite: CipherSuite,
    key: LessSafeKey,
}

impl RecordCipher {
    pub fn new(suite: CipherSuite, key: &[u8]) -> ProtocolResult<Self> {
        if key.len() != suite.key_len() {
            return Err(ProtocolError::bad_request(format!(
                "{} key must be {} bytes, got {}",
                suite,
                suite.key_len(),
                key.len()
            )));
        }

        let unbound = UnboundKey::new(algorithm(suite), key)
            .map_err(|_| ProtocolError::internal(format!("failed to load {} key", suite)))?;
        Ok(Self {
            suite,
            key: LessSafeKey::new(unbound),
        })
    }

    pub fn suite(&self) -> CipherSuite {
        self.suite
    }

    /// Encrypt a record, appending the tag.
    pub fn seal(
        &self,
        fixed_iv: &[u8],
        record_number: u64,
        plaintext: &[u8],
    ) -> ProtocolResult<Vec<u8>> {
        let nonce = Nonce::assume_unique_for_key(record_nonce(fixed_iv, record_number)?);
        let aad = record_aad(plaintext.len() + TAG_LEN);

        let mut in_out = plaintext.to_vec();
        self.key
            .seal_in_place_append_tag(nonce, Aad::from(aad), &mut in_out)
            .map_err(|_| ProtocolError::internal("record encryption failed"))?;
        Ok(in_out)
    }

    /// Decrypt and authenticate a record.
    pub fn open(
        &self,
        fixed_iv: &[u8],
        record_number: u64,
        ciphertext: &[u8],
    ) -> ProtocolResult<Vec<u8>> {
        if ciphertext.len() < TAG_LEN {
            return Err(ProtocolError::invalid_claim(
                "record shorter than authentication tag",
            ));
        }

        let nonce = Nonce::assume_unique_for_key(record_nonce(fixed_iv, record_number)?);
        let aad = record_aad(ciphertext.len());

        let mut in_out = ciphertext.to_vec();
        let plaintext = self
            .key
            .open_in_place(nonce, Aad::from(aad), &mut in_out)
            .map_err(|_| {
                ProtocolError::invalid_claim(format!(
                    "failed to decrypt record {} with revealed key",
                    record_number
                ))
            })?;
        Ok(plaintext.to_vec())
    }

    /// Counter-mode keystream covering the first `len` bytes of a record.
    ///
    /// Encrypting zeros yields the keystream; the tag is discarded.
    pub fn keystream(
        &self,
        fixed_iv: &[u8],
        record_number: u64,
        len: usize,
    ) -> ProtocolResult<Vec<u8>> {
        let nonce = Nonce::assume_unique_for_key(record_nonce(fixed_iv, record_number)?);
        let mut stream = vec![0u8; len];
        let _tag = self
            .key
            .seal_in_place_separate_tag(nonce, Aad::empty(), &mut stream)
            .map_err(|_| ProtocolError::internal("keystream derivation failed"))?;
        Ok(stream)
    }
}
