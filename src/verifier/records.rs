//! The witness's own record of each tunnel.

use crate::transcript::{CipherSuite, Sender};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// A record as it crossed the witness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedMessage {
    pub sender: Sender,
    pub ciphertext: Vec<u8>,
}

/// Everything the witness observed on one tunnel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelRecord {
    pub tunnel_id: u32,
    pub host: String,
    pub port: u16,
    pub geo_location: Option<String>,
    pub cipher_suite: CipherSuite,
    pub messages: Vec<RecordedMessage>,
}

/// Lookup of tunnel records by id.
#[async_trait]
pub trait TunnelRecordStore: Send + Sync {
    async fn get(&self, tunnel_id: u32) -> Option<TunnelRecord>;
}

/// In-memory store.
#[derive(Default)]
pub struct MemoryTunnelStore {
    records: RwLock<HashMap<u32, TunnelRecord>>,
}

impl MemoryTunnelStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, record: TunnelRecord) {
        self.records.write().await.insert(record.tunnel_id, record);
    }

    pub async fn remove(&self, tunnel_id: u32) -> Option<TunnelRecord> {
        self.records.write().await.remove(&tunnel_id)
    }
}

#[async_trait]
impl TunnelRecordStore for MemoryTunnelStore {
    async fn get(&self, tunnel_id: u32) -> Option<TunnelRecord> {
        self.records.read().await.get(&tunnel_id).cloned()
    }
}
