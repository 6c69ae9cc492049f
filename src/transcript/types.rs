//! Transcript arena and cipher suite parameters.

use super::record::RecordCipher;
use crate::error::ProtocolResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Length of the fixed IV for every supported suite.
pub const IV_LEN: usize = 12;

/// Length of the AEAD authentication tag appended to every record.
pub const TAG_LEN: usize = 16;

/// Symmetric cipher suites a transcript may be encrypted with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CipherSuite {
    Aes128Gcm,
    Aes256Gcm,
    ChaCha20Poly1305,
}

impl CipherSuite {
    /// Key length in bytes.
    pub fn key_len(&self) -> usize {
        match self {
            Self::Aes128Gcm => 16,
            Self::Aes256Gcm | Self::ChaCha20Poly1305 => 32,
        }
    }

    /// Size of one keystream block of the underlying stream cipher.
    pub fn block_size(&self) -> usize {
        match self {
            Self::Aes128Gcm | Self::Aes256Gcm => 16,
            Self::ChaCha20Poly1305 => 64,
        }
    }

    /// Counter value of the first keystream block used for record data.
    pub fn start_counter(&self) -> u32 {
        match self {
            Self::Aes128Gcm | Self::Aes256Gcm => 2,
            Self::ChaCha20Poly1305 => 1,
        }
    }

    /// Word width of the proving circuit, in bits.
    pub fn bits_per_word(&self) -> usize {
        match self {
            Self::Aes128Gcm | Self::Aes256Gcm => 8,
            Self::ChaCha20Poly1305 => 32,
        }
    }

    /// Number of words one proof covers.
    pub fn words_per_chunk(&self) -> usize {
        match self {
            Self::Aes128Gcm | Self::Aes256Gcm => 80,
            Self::ChaCha20Poly1305 => 32,
        }
    }

    /// Bytes of ciphertext covered by a single proof.
    ///
    /// AES: 80 bytes (5 blocks). ChaCha20: 128 bytes (2 blocks).
    pub fn chunk_size(&self) -> usize {
        self.bits_per_word() * self.words_per_chunk() / 8
    }

    /// Keystream counter for the chunk starting at `offset` within a record.
    pub fn counter_at(&self, offset: usize) -> u32 {
        self.start_counter() + (offset / self.block_size()) as u32
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Aes128Gcm => "aes-128-gcm",
            Self::Aes256Gcm => "aes-256-gcm",
            Self::ChaCha20Poly1305 => "chacha20-poly1305",
        }
    }
}

impl fmt::Display for CipherSuite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Direction of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    Client,
    Server,
}

/// Record classification relevant to reveal planning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContentType {
    Handshake,
    ApplicationData,
}

/// Traffic key of one direction. Zeroed on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct TrafficKey(Vec<u8>);

impl TrafficKey {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for TrafficKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TrafficKey({} bytes)", self.0.len())
    }
}

/// Stable index of a block inside a [`Transcript`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockIndex(pub usize);

impl fmt::Display for BlockIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One encrypted record of the TLS session together with its plaintext.
///
/// `ciphertext` includes the trailing authentication tag.
#[derive(Debug, Clone)]
pub struct TranscriptBlock {
    pub sender: Sender,
    pub content_type: ContentType,
    pub plaintext: Vec<u8>,
    pub ciphertext: Vec<u8>,
    pub cipher_suite: CipherSuite,
    pub key: Arc<TrafficKey>,
    pub fixed_iv: Vec<u8>,
    pub record_number: u64,
}

impl TranscriptBlock {
    /// Encrypt `plaintext` as an application data record.
    pub fn seal(
        sender: Sender,
        cipher_suite: CipherSuite,
        key: Arc<TrafficKey>,
        fixed_iv: Vec<u8>,
        record_number: u64,
        plaintext: Vec<u8>,
    ) -> ProtocolResult<Self> {
        let cipher = RecordCipher::new(cipher_suite, key.as_bytes())?;
        let ciphertext = cipher.seal(&fixed_iv, record_number, &plaintext)?;
        Ok(Self {
            sender,
            content_type: ContentType::ApplicationData,
            plaintext,
            ciphertext,
            cipher_suite,
            key,
            fixed_iv,
            record_number,
        })
    }

    /// Ciphertext without the authentication tag.
    pub fn body(&self) -> &[u8] {
        let end = self.ciphertext.len().saturating_sub(TAG_LEN);
        &self.ciphertext[..end]
    }
}

/// Arena of transcript blocks, in the order they crossed the wire.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    blocks: Vec<TranscriptBlock>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a block. Blocks are immutable once appended.
    pub fn push(&mut self, block: TranscriptBlock) -> BlockIndex {
        self.blocks.push(block);
        BlockIndex(self.blocks.len() - 1)
    }

    pub fn get(&self, index: BlockIndex) -> Option<&TranscriptBlock> {
        self.blocks.get(index.0)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (BlockIndex, &TranscriptBlock)> {
        self.blocks
            .iter()
            .enumerate()
            .map(|(i, block)| (BlockIndex(i), block))
    }

    /// Indexes of one direction's application data blocks, in order.
    pub fn application_data(&self, sender: Sender) -> Vec<BlockIndex> {
        self.iter()
            .filter(|(_, block)| {
                block.sender == sender && block.content_type == ContentType::ApplicationData
            })
            .map(|(index, _)| index)
            .collect()
    }
}
