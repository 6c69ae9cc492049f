//! Wire format for the claim tunnel RPC.
//!
//! Messages are serde structs encoded as CBOR and carried in length-prefixed
//! frames. Transport (WebSocket, gRPC, ...) is left to the embedder.

pub mod codec;
pub mod messages;

pub use codec::{decode_frame, encode_frame, from_cbor, to_cbor, SerializationError, MAX_FRAME_LEN};
pub use messages::{
    BlockReveal, ClaimOutcome, ClaimTunnelRequest, ClaimTunnelResponse, DirectReveal,
    RequestSignatures, ResponseSignatures, TranscriptMessage, TunnelRequest, ZkReveal,
};
