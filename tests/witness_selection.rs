//! Witness selection determinism across epochs, caches and config.

use std::sync::Arc;
use tempfile::TempDir;
use tls_witness::beacon::{
    select_witnesses, Beacon, BeaconState, BeaconStateCache, StaticBeacon, WitnessData,
};
use tls_witness::claims::ClaimInfo;
use tls_witness::config::Config;

fn witnesses(count: usize) -> Vec<WitnessData> {
    (0..count)
        .map(|i| WitnessData::new(format!("0x{:040x}", i + 1), format!("wss://w{}.example/ws", i)))
        .collect()
}

fn state(epoch: u32, count: usize, required: u32) -> BeaconState {
    BeaconState {
        epoch,
        witnesses: witnesses(count),
        witnesses_required_for_claim: required,
        next_epoch_timestamp_s: epoch * 3600,
    }
}

fn identifier() -> String {
    ClaimInfo::new("http", r#"{"url":"https://example.com"}"#, "")
        .identifier()
        .unwrap()
}

#[test]
fn test_selection_is_deterministic() {
    let state = state(3, 10, 4);
    let first = select_witnesses(&state, &identifier(), 1_700_000_000).unwrap();
    let second = select_witnesses(&state, &identifier(), 1_700_000_000).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.len(), 4);
}

#[test]
fn test_inputs_change_the_draw() {
    let base = state(3, 50, 5);
    let reference = select_witnesses(&base, &identifier(), 1_000).unwrap();

    // With 50 witnesses a collision across all three variations is
    // vanishingly unlikely.
    let other_time = select_witnesses(&base, &identifier(), 1_001).unwrap();
    let other_epoch = select_witnesses(&state(4, 50, 5), &identifier(), 1_000).unwrap();
    let other_claim = select_witnesses(&base, "0x1234", 1_000).unwrap();
    assert!(other_time != reference || other_epoch != reference || other_claim != reference);
}

#[tokio::test]
async fn test_cached_state_selects_same_witnesses() {
    let beacon = Arc::new(StaticBeacon::new([state(1, 6, 2), state(2, 8, 3)]).unwrap());
    let cache = BeaconStateCache::new(beacon.clone());

    let current = cache.get_state(None).await.unwrap();
    assert_eq!(current.epoch, 2);
    let cached = cache.get_state(Some(2)).await.unwrap();
    let direct = beacon.get_state(Some(2)).await.unwrap();

    assert_eq!(
        select_witnesses(&cached, &identifier(), 9).unwrap(),
        select_witnesses(&direct, &identifier(), 9).unwrap()
    );
    assert_eq!(cache.get_state(Some(1)).await.unwrap().witnesses.len(), 6);
}

#[tokio::test]
async fn test_configured_beacon_round_trips() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");

    let mut config = Config::default();
    config.beacon.epoch = 9;
    config.beacon.witnesses_required_for_claim = 2;
    config.beacon.witnesses = witnesses(5);
    config.save(&path).unwrap();

    let loaded = Config::load(&path).unwrap();
    loaded.validate().unwrap();
    let state = loaded.beacon.beacon().unwrap().get_state(None).await.unwrap();
    assert_eq!(state, config.beacon.state());
    assert_eq!(select_witnesses(&state, &identifier(), 5).unwrap().len(), 2);
}
