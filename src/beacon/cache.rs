//! Beacon access and per-epoch state caching.

use super::types::BeaconState;
use crate::error::{ProtocolError, ProtocolResult};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Source of beacon state.
#[async_trait]
pub trait Beacon: Send + Sync {
    /// State of `epoch`, or of the current epoch for `None`.
    async fn get_state(&self, epoch: Option<u32>) -> ProtocolResult<BeaconState>;
}

/// Beacon backed by a fixed set of states, typically from configuration.
pub struct StaticBeacon {
    states: BTreeMap<u32, BeaconState>,
}

impl StaticBeacon {
    pub fn new(states: impl IntoIterator<Item = BeaconState>) -> ProtocolResult<Self> {
        let states: BTreeMap<u32, BeaconState> =
            states.into_iter().map(|s| (s.epoch, s)).collect();
        if states.is_empty() {
            return Err(ProtocolError::bad_request("beacon needs at least one epoch"));
        }
        Ok(Self { states })
    }
}

#[async_trait]
impl Beacon for StaticBeacon {
    async fn get_state(&self, epoch: Option<u32>) -> ProtocolResult<BeaconState> {
        let state = match epoch {
            None | Some(0) => self.states.values().next_back(),
            Some(epoch) => self.states.get(&epoch),
        };
        state
            .cloned()
            .ok_or_else(|| ProtocolError::bad_request(format!("unknown epoch {:?}", epoch)))
    }
}

/// Caches beacon states by concrete epoch.
///
/// Requests for the current epoch (`None` or `0`) always reach the beacon;
/// the answer is then cached under its own epoch number.
pub struct BeaconStateCache {
    beacon: Arc<dyn Beacon>,
    states: Mutex<HashMap<u32, BeaconState>>,
}

impl BeaconStateCache {
    pub fn new(beacon: Arc<dyn Beacon>) -> Self {
        Self {
            beacon,
            states: Mutex::new(HashMap::new()),
        }
    }

    pub async fn get_state(&self, epoch: Option<u32>) -> ProtocolResult<BeaconState> {
        let concrete = epoch.filter(|e| *e != 0);
        if let Some(epoch) = concrete {
            if let Some(state) = self.states.lock().await.get(&epoch) {
                return Ok(state.clone());
            }
        }

        let state = self.beacon.get_state(concrete).await?;
        debug!(epoch = state.epoch, witnesses = state.witnesses.len(), "fetched beacon state");
        self.states
            .lock()
            .await
            .insert(state.epoch, state.clone());
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beacon::WitnessData;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn state(epoch: u32) -> BeaconState {
        BeaconState {
            epoch,
            witnesses: vec![WitnessData::new("0x01", "wss://a")],
            witnesses_required_for_claim: 1,
            next_epoch_timestamp_s: 0,
        }
    }

    struct CountingBeacon {
        inner: StaticBeacon,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Beacon for CountingBeacon {
        async fn get_state(&self, epoch: Option<u32>) -> ProtocolResult<BeaconState> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.get_state(epoch).await
        }
    }

    #[tokio::test]
    async fn test_static_beacon_current_is_latest() {
        let beacon = StaticBeacon::new([state(1), state(3), state(2)]).unwrap();
        assert_eq!(beacon.get_state(None).await.unwrap().epoch, 3);
        assert_eq!(beacon.get_state(Some(0)).await.unwrap().epoch, 3);
        assert_eq!(beacon.get_state(Some(2)).await.unwrap().epoch, 2);
        assert!(beacon.get_state(Some(9)).await.is_err());
    }

    #[tokio::test]
    async fn test_current_requests_bypass_cache() {
        let beacon = Arc::new(CountingBeacon {
            inner: StaticBeacon::new([state(1), state(2)]).unwrap(),
            calls: AtomicUsize::new(0),
        });
        let cache = BeaconStateCache::new(beacon.clone());

        cache.get_state(None).await.unwrap();
        cache.get_state(Some(0)).await.unwrap();
        assert_eq!(beacon.calls.load(Ordering::SeqCst), 2);

        // Current answer was cached under epoch 2.
        assert_eq!(cache.get_state(Some(2)).await.unwrap().epoch, 2);
        assert_eq!(beacon.calls.load(Ordering::SeqCst), 2);

        cache.get_state(Some(1)).await.unwrap();
        cache.get_state(Some(1)).await.unwrap();
        assert_eq!(beacon.calls.load(Ordering::SeqCst), 3);
    }
}
