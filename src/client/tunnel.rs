//! Tunnels through a witness.
//!
//! The TLS session itself is negotiated by the tunnel implementation; the
//! claim flow only needs the recorded transcript and to know whether the
//! session is still usable.

use crate::beacon::WitnessData;
use crate::error::{ProtocolError, ProtocolResult};
use crate::transcript::Transcript;
use async_trait::async_trait;

/// Destination of a tunnel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelTarget {
    pub host: String,
    pub port: u16,
    pub geo_location: Option<String>,
}

impl TunnelTarget {
    /// Parse a `host:port` pair.
    pub fn parse(host_port: &str, geo_location: Option<String>) -> ProtocolResult<Self> {
        let (host, port) = host_port.rsplit_once(':').ok_or_else(|| {
            ProtocolError::bad_request(format!(
                "{:?} is not a host:port pair",
                host_port
            ))
        })?;
        let port = port.parse::<u16>().map_err(|_| {
            ProtocolError::bad_request(format!("invalid port in {:?}", host_port))
        })?;
        Ok(Self {
            host: host.to_string(),
            port,
            geo_location,
        })
    }
}

/// A TLS session relayed by a witness.
#[async_trait]
pub trait Tunnel: Send + Sync {
    /// Id the witness assigned to the tunnel.
    fn id(&self) -> u32;

    /// Every record exchanged so far, with keys.
    fn transcript(&self) -> Transcript;

    /// False once the session was torn down, by either side.
    fn is_open(&self) -> bool;

    async fn close(&self) -> ProtocolResult<()>;
}

/// Opens a tunnel, sends `request` and waits for the complete response.
#[async_trait]
pub trait TunnelOpener: Send + Sync {
    async fn open(
        &self,
        witness: &WitnessData,
        target: &TunnelTarget,
        request: &[u8],
    ) -> ProtocolResult<Box<dyn Tunnel>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_parse_target() {
        let target = TunnelTarget::parse("api.example.com:8443", Some("US".to_string())).unwrap();
        assert_eq!(target.host, "api.example.com");
        assert_eq!(target.port, 8443);

        for bad in ["api.example.com", "api.example.com:https", "h:70000"] {
            let err = TunnelTarget::parse(bad, None).unwrap_err();
            assert_eq!(err.code, ErrorCode::BadRequest, "{}", bad);
        }
    }
}
