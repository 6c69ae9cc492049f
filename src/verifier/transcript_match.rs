//! Matching the claimed transcript against the witness's record.

use super::records::TunnelRecord;
use crate::error::{ProtocolError, ProtocolResult};
use crate::transcript::Sender;
use crate::wire::TranscriptMessage;

/// Check `claimed` against what the witness recorded.
///
/// Every claimed message must equal the recorded message at the same
/// position. The claimant may leave out trailing messages, but only ones the
/// server sent: client bytes must match in full, server bytes only up to what
/// the claim reveals.
pub fn match_transcript(claimed: &[TranscriptMessage], record: &TunnelRecord) -> ProtocolResult<()> {
    if claimed.len() > record.messages.len() {
        return Err(ProtocolError::invalid_claim(format!(
            "claim has {} messages, tunnel recorded {}",
            claimed.len(),
            record.messages.len()
        )));
    }

    for (index, (claim, recorded)) in claimed.iter().zip(&record.messages).enumerate() {
        if claim.sender != recorded.sender || claim.message != recorded.ciphertext {
            return Err(ProtocolError::invalid_claim(format!(
                "message {} does not match the tunnel record",
                index
            ))
            .with_data(serde_json::json!({ "index": index })));
        }
    }

    let omitted_client = record.messages[claimed.len()..]
        .iter()
        .any(|m| m.sender == Sender::Client);
    if omitted_client {
        return Err(ProtocolError::invalid_claim(
            "claim omits data the client sent",
        ));
    }

    Ok(())
}
