//! In-process witness and tunnel implementations.
//!
//! A [`LocalTunnelOpener`] plays both the remote server and the witness's
//! recording proxy: it seals the exchange under fresh traffic keys and files
//! the ciphertext in a [`MemoryTunnelStore`] that a [`ClaimTunnelHandler`]
//! reads from. Used for tests and local development.

use super::pool::{WitnessClient, WitnessConnector};
use super::tunnel::{Tunnel, TunnelOpener, TunnelTarget};
use crate::beacon::WitnessData;
use crate::error::{ProtocolError, ProtocolResult};
use crate::transcript::{CipherSuite, Sender, TrafficKey, Transcript, TranscriptBlock, IV_LEN};
use crate::verifier::{ClaimTunnelHandler, MemoryTunnelStore, RecordedMessage, TunnelRecord};
use crate::wire::{decode_frame, encode_frame, ClaimTunnelRequest, ClaimTunnelResponse};
use async_trait::async_trait;
use rand::RngCore;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Largest plaintext a TLS 1.3 record carries.
pub const MAX_RECORD_PLAINTEXT: usize = 16_384;

/// Witness reached through its frame handler, without a socket.
pub struct LocalWitnessClient {
    handler: Arc<ClaimTunnelHandler>,
    connected: AtomicBool,
}

impl LocalWitnessClient {
    pub fn new(handler: Arc<ClaimTunnelHandler>) -> Self {
        Self {
            handler,
            connected: AtomicBool::new(true),
        }
    }

    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl WitnessClient for LocalWitnessClient {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn claim_tunnel(
        &self,
        request: ClaimTunnelRequest,
    ) -> ProtocolResult<ClaimTunnelResponse> {
        if !self.is_connected() {
            return Err(ProtocolError::network("witness connection closed"));
        }
        let frame = encode_frame(&request)?;
        let reply = self.handler.handle_frame(&frame).await?;
        Ok(decode_frame(&reply)?)
    }
}

/// Connects to in-process witnesses by URL.
#[derive(Default)]
pub struct LocalWitnessConnector {
    witnesses: HashMap<String, Arc<ClaimTunnelHandler>>,
    failures: AtomicU32,
}

impl LocalWitnessConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_witness(mut self, url: impl Into<String>, handler: Arc<ClaimTunnelHandler>) -> Self {
        self.witnesses.insert(url.into(), handler);
        self
    }

    /// Fail the next `count` connection attempts with a network error.
    pub fn fail_next(&self, count: u32) {
        self.failures.store(count, Ordering::SeqCst);
    }
}

#[async_trait]
impl WitnessConnector for LocalWitnessConnector {
    async fn connect(&self, url: &str) -> ProtocolResult<Arc<dyn WitnessClient>> {
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(ProtocolError::network(format!("connection to {} refused", url)));
        }

        let handler = self
            .witnesses
            .get(url)
            .ok_or_else(|| ProtocolError::network(format!("no witness listening at {}", url)))?;
        Ok(Arc::new(LocalWitnessClient::new(Arc::clone(handler))))
    }
}

/// Computes the server's response to a request.
pub type Responder = Arc<dyn Fn(&TunnelTarget, &[u8]) -> Vec<u8> + Send + Sync>;

/// Tunnel whose records were produced in-process.
pub struct LocalTunnel {
    id: u32,
    transcript: Transcript,
    open: AtomicBool,
}

#[async_trait]
impl Tunnel for LocalTunnel {
    fn id(&self) -> u32 {
        self.id
    }

    fn transcript(&self) -> Transcript {
        self.transcript.clone()
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn close(&self) -> ProtocolResult<()> {
        self.open.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// Opens tunnels against an in-process server, recording them for a witness.
pub struct LocalTunnelOpener {
    store: Arc<MemoryTunnelStore>,
    responder: Responder,
    suite: CipherSuite,
    max_record_len: usize,
    next_id: AtomicU32,
    drop_sessions: AtomicBool,
}

impl LocalTunnelOpener {
    pub fn new(store: Arc<MemoryTunnelStore>, responder: Responder) -> Self {
        Self {
            store,
            responder,
            suite: CipherSuite::Aes128Gcm,
            max_record_len: MAX_RECORD_PLAINTEXT,
            next_id: AtomicU32::new(1),
            drop_sessions: AtomicBool::new(false),
        }
    }

    pub fn with_suite(mut self, suite: CipherSuite) -> Self {
        self.suite = suite;
        self
    }

    /// Split each direction into records of at most `len` bytes.
    pub fn with_max_record_len(mut self, len: usize) -> Self {
        self.max_record_len = len.max(1);
        self
    }

    /// Hand out tunnels the server has already torn down.
    pub fn drop_sessions(&self, drop: bool) {
        self.drop_sessions.store(drop, Ordering::SeqCst);
    }

    fn seal_direction(
        &self,
        transcript: &mut Transcript,
        sender: Sender,
        data: &[u8],
    ) -> ProtocolResult<()> {
        let mut rng = rand::thread_rng();
        let mut key = vec![0u8; self.suite.key_len()];
        rng.fill_bytes(&mut key);
        let mut fixed_iv = vec![0u8; IV_LEN];
        rng.fill_bytes(&mut fixed_iv);
        let key = Arc::new(TrafficKey::new(key));

        for (record_number, chunk) in data.chunks(self.max_record_len).enumerate() {
            transcript.push(TranscriptBlock::seal(
                sender,
                self.suite,
                Arc::clone(&key),
                fixed_iv.clone(),
                record_number as u64,
                chunk.to_vec(),
            )?);
        }
        Ok(())
    }
}

#[async_trait]
impl TunnelOpener for LocalTunnelOpener {
    async fn open(
        &self,
        witness: &WitnessData,
        target: &TunnelTarget,
        request: &[u8],
    ) -> ProtocolResult<Box<dyn Tunnel>> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let response = (self.responder)(target, request);

        let mut transcript = Transcript::new();
        self.seal_direction(&mut transcript, Sender::Client, request)?;
        self.seal_direction(&mut transcript, Sender::Server, &response)?;

        self.store
            .insert(TunnelRecord {
                tunnel_id: id,
                host: target.host.clone(),
                port: target.port,
                geo_location: target.geo_location.clone(),
                cipher_suite: self.suite,
                messages: transcript
                    .iter()
                    .map(|(_, block)| RecordedMessage {
                        sender: block.sender,
                        ciphertext: block.ciphertext.clone(),
                    })
                    .collect(),
            })
            .await;
        debug!(
            tunnel_id = id,
            witness = %witness.id,
            records = transcript.len(),
            "local tunnel recorded"
        );

        Ok(Box::new(LocalTunnel {
            id,
            transcript,
            open: AtomicBool::new(!self.drop_sessions.load(Ordering::SeqCst)),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verifier::TunnelRecordStore;

    fn echo() -> Responder {
        Arc::new(|_, request| request.iter().rev().copied().collect())
    }

    #[tokio::test]
    async fn test_opener_records_what_it_returns() {
        let store = Arc::new(MemoryTunnelStore::new());
        let opener = LocalTunnelOpener::new(Arc::clone(&store), echo())
            .with_suite(CipherSuite::ChaCha20Poly1305)
            .with_max_record_len(4);
        let target = TunnelTarget::parse("echo.local:443", None).unwrap();
        let witness = WitnessData::new("0xabc", "local://w");

        let tunnel = opener.open(&witness, &target, b"abcdef").await.unwrap();
        assert!(tunnel.is_open());

        let transcript = tunnel.transcript();
        assert_eq!(transcript.application_data(Sender::Client).len(), 2);
        assert_eq!(transcript.application_data(Sender::Server).len(), 2);
        let reply: Vec<u8> = transcript
            .application_data(Sender::Server)
            .into_iter()
            .flat_map(|i| transcript.get(i).unwrap().plaintext.clone())
            .collect();
        assert_eq!(reply, b"fedcba".to_vec());

        let record = store.get(tunnel.id()).await.unwrap();
        assert_eq!(record.cipher_suite, CipherSuite::ChaCha20Poly1305);
        assert_eq!(record.messages.len(), 4);
        assert_eq!(
            record.messages[3].ciphertext,
            transcript.get(crate::transcript::BlockIndex(3)).unwrap().ciphertext
        );

        tunnel.close().await.unwrap();
        assert!(!tunnel.is_open());
    }

    #[tokio::test]
    async fn test_dropped_sessions_come_back_closed() {
        let opener = LocalTunnelOpener::new(Arc::new(MemoryTunnelStore::new()), echo());
        opener.drop_sessions(true);
        let tunnel = opener
            .open(
                &WitnessData::new("0xabc", "local://w"),
                &TunnelTarget::parse("echo.local:443", None).unwrap(),
                b"x",
            )
            .await
            .unwrap();
        assert!(!tunnel.is_open());
        assert_ne!(tunnel.id(), 0);
    }

    #[tokio::test]
    async fn test_connector_failures_then_unknown_url() {
        let connector = LocalWitnessConnector::new();
        connector.fail_next(1);
        let err = connector.connect("local://w").await.err().unwrap();
        assert!(err.is_retryable());
        // No failure injected now, but nothing listens there.
        let err = connector.connect("local://w").await.err().unwrap();
        assert!(err.message.contains("no witness"));
    }
}
