//! Recorded TLS session transcripts.
//!
//! The TLS handshake and record layer live outside this crate; what arrives
//! here is the recorded session: every record with its plaintext, ciphertext
//! and the traffic key material needed to reveal it.

pub mod record;
pub mod types;

pub use record::{record_aad, record_nonce, RecordCipher};
pub use types::{
    BlockIndex, CipherSuite, ContentType, Sender, TrafficKey, Transcript, TranscriptBlock,
    IV_LEN, TAG_LEN,
};
