//! Beacon state: the witness set of an epoch.

use serde::{Deserialize, Serialize};

/// A witness able to attest claims.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WitnessData {
    /// Witness address, `0x`-prefixed hex.
    pub id: String,
    pub url: String,
}

impl WitnessData {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
        }
    }
}

/// Witness set and selection parameters of one epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeaconState {
    pub epoch: u32,
    pub witnesses: Vec<WitnessData>,
    pub witnesses_required_for_claim: u32,
    pub next_epoch_timestamp_s: u32,
}
