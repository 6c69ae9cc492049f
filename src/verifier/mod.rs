//! Witness-side transcript verification.

pub mod decrypt;
pub mod handler;
pub mod records;
pub mod transcript_match;

pub use decrypt::{hidden_plaintext, reveal_block};
pub use handler::ClaimTunnelHandler;
pub use records::{MemoryTunnelStore, RecordedMessage, TunnelRecord, TunnelRecordStore};
pub use transcript_match::match_transcript;
