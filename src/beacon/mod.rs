//! Witness sets per epoch and deterministic witness selection.

pub mod cache;
pub mod selector;
pub mod types;

pub use cache::{Beacon, BeaconStateCache, StaticBeacon};
pub use selector::{select_witnesses, selection_seed};
pub use types::{BeaconState, WitnessData};
