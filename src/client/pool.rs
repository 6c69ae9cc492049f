//! Witness connections keyed by URL.

use crate::error::ProtocolResult;
use crate::wire::{ClaimTunnelRequest, ClaimTunnelResponse};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// RPC surface of a connected witness.
#[async_trait]
pub trait WitnessClient: Send + Sync {
    fn is_connected(&self) -> bool;

    async fn claim_tunnel(&self, request: ClaimTunnelRequest)
        -> ProtocolResult<ClaimTunnelResponse>;
}

/// Opens connections to witnesses.
#[async_trait]
pub trait WitnessConnector: Send + Sync {
    async fn connect(&self, url: &str) -> ProtocolResult<Arc<dyn WitnessClient>>;
}

/// Process-wide pool of witness connections.
///
/// A connection is created on first use. When a pooled connection reports it
/// is no longer connected it is evicted and replaced, so callers may get a
/// different instance for the same URL.
pub struct ConnectionPool {
    connector: Arc<dyn WitnessConnector>,
    clients: Mutex<HashMap<String, Arc<dyn WitnessClient>>>,
}

impl ConnectionPool {
    pub fn new(connector: Arc<dyn WitnessConnector>) -> Self {
        Self {
            connector,
            clients: Mutex::new(HashMap::new()),
        }
    }

    pub async fn get(&self, url: &str) -> ProtocolResult<Arc<dyn WitnessClient>> {
        let mut clients = self.clients.lock().await;
        if let Some(client) = clients.get(url) {
            if client.is_connected() {
                return Ok(Arc::clone(client));
            }
            info!(url, "witness connection lost, reconnecting");
            clients.remove(url);
        }

        debug!(url, "connecting to witness");
        let client = self.connector.connect(url).await?;
        clients.insert(url.to_string(), Arc::clone(&client));
        Ok(client)
    }

    /// Number of pooled connections.
    pub async fn len(&self) -> usize {
        self.clients.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
