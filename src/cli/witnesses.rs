use super::config::load_or_default;
use std::path::Path;
use std::sync::Arc;
use tls_witness::beacon::{select_witnesses, BeaconStateCache};

/// Print the witnesses selected for a claim in the configured epoch
pub async fn execute(
    config_path: &Path,
    identifier: &str,
    timestamp: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_or_default(config_path)?;
    config.validate()?;

    let cache = BeaconStateCache::new(Arc::new(config.beacon.beacon()?));
    let state = cache.get_state(None).await?;
    let selected = select_witnesses(&state, identifier, timestamp)?;

    println!("Epoch {}", state.epoch);
    for (position, witness) in selected.iter().enumerate() {
        println!("  {}. {} {}", position + 1, witness.id, witness.url);
    }
    Ok(())
}
