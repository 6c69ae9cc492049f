//! Configuration file handling
//!
//! Configuration files are TOML. Every section is optional and falls back to
//! defaults, so an empty file is a valid configuration for local use.
//!
//! The `[beacon]` section describes a trusted witness set for deployments
//! without an on-chain beacon.

use crate::beacon::{BeaconState, StaticBeacon, WitnessData};
use crate::client::{ClaimSettings, RetryPolicy, DEFAULT_MAX_RETRIES};
use crate::error::{ErrorCode, ProtocolError, ProtocolResult};
use crate::zk::{BackendSource, ZkEngine, DEFAULT_MAX_CHUNKS_PER_CLAIM, DEFAULT_PROOF_CONCURRENCY};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default log level
const DEFAULT_LOG_LEVEL: &str = "info";

const DEFAULT_RETRY_BACKOFF: &str = "1s";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("failed to write config file '{path}': {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl From<ConfigError> for ProtocolError {
    fn from(err: ConfigError) -> Self {
        let code = match err {
            ConfigError::Invalid(_) | ConfigError::Parse { .. } => ErrorCode::BadRequest,
            _ => ErrorCode::Internal,
        };
        ProtocolError::new(code, err.to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub prover: ProverConfig,

    #[serde(default)]
    pub client: ClientConfig,

    #[serde(default)]
    pub beacon: BeaconConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Proof generation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProverConfig {
    /// Ceiling on chunk proofs per claim
    #[serde(default = "default_max_chunks")]
    pub max_chunks_per_claim: usize,

    /// Chunk proofs generated in parallel
    #[serde(default = "default_concurrency")]
    pub proof_concurrency: usize,

    #[serde(default)]
    pub engine: ZkEngine,

    #[serde(default)]
    pub backend: BackendSource,
}

/// Claim submission settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Retries after a failed attempt (network errors only)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Backoff before the first retry, doubled per retry (e.g. "500ms", "2s")
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff: String,
}

/// Trusted beacon settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeaconConfig {
    #[serde(default = "default_epoch")]
    pub epoch: u32,

    #[serde(default = "default_witnesses_required")]
    pub witnesses_required_for_claim: u32,

    #[serde(default)]
    pub next_epoch_timestamp_s: u32,

    #[serde(default)]
    pub witnesses: Vec<WitnessData>,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_max_chunks() -> usize {
    DEFAULT_MAX_CHUNKS_PER_CLAIM
}

fn default_concurrency() -> usize {
    DEFAULT_PROOF_CONCURRENCY
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_retry_backoff() -> String {
    DEFAULT_RETRY_BACKOFF.to_string()
}

fn default_epoch() -> u32 {
    1
}

fn default_witnesses_required() -> u32 {
    1
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

impl Default for ProverConfig {
    fn default() -> Self {
        Self {
            max_chunks_per_claim: default_max_chunks(),
            proof_concurrency: default_concurrency(),
            engine: ZkEngine::default(),
            backend: BackendSource::default(),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_backoff: default_retry_backoff(),
        }
    }
}

impl ClientConfig {
    pub fn retry_policy(&self) -> Result<RetryPolicy, ConfigError> {
        let base_backoff = humantime::parse_duration(&self.retry_backoff).map_err(|e| {
            ConfigError::Invalid(format!("retry_backoff '{}': {}", self.retry_backoff, e))
        })?;
        Ok(RetryPolicy {
            max_retries: self.max_retries,
            base_backoff,
        })
    }
}

impl Default for BeaconConfig {
    fn default() -> Self {
        Self {
            epoch: default_epoch(),
            witnesses_required_for_claim: default_witnesses_required(),
            next_epoch_timestamp_s: 0,
            witnesses: Vec::new(),
        }
    }
}

impl BeaconConfig {
    pub fn state(&self) -> BeaconState {
        BeaconState {
            epoch: self.epoch,
            witnesses: self.witnesses.clone(),
            witnesses_required_for_claim: self.witnesses_required_for_claim,
            next_epoch_timestamp_s: self.next_epoch_timestamp_s,
        }
    }

    pub fn beacon(&self) -> ProtocolResult<StaticBeacon> {
        StaticBeacon::new([self.state()])
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        write_file(path, &contents)
    }

    /// Check values the type system cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.prover.proof_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "prover.proof_concurrency must be at least 1".to_string(),
            ));
        }
        if self.prover.max_chunks_per_claim == 0 {
            return Err(ConfigError::Invalid(
                "prover.max_chunks_per_claim must be at least 1".to_string(),
            ));
        }

        let required = self.beacon.witnesses_required_for_claim as usize;
        if required == 0 {
            return Err(ConfigError::Invalid(
                "beacon.witnesses_required_for_claim must be at least 1".to_string(),
            ));
        }
        if !self.beacon.witnesses.is_empty() && required > self.beacon.witnesses.len() {
            return Err(ConfigError::Invalid(format!(
                "beacon requires {} witnesses per claim but lists {}",
                required,
                self.beacon.witnesses.len()
            )));
        }

        self.client.retry_policy()?;
        Ok(())
    }

    pub fn claim_settings(&self) -> Result<ClaimSettings, ConfigError> {
        Ok(ClaimSettings {
            engine: self.prover.engine,
            max_chunks_per_claim: self.prover.max_chunks_per_claim,
            proof_concurrency: self.prover.proof_concurrency,
            retry: self.client.retry_policy()?,
        })
    }

    /// Generate default configuration content as a string with comments
    pub fn generate_default_toml() -> String {
        format!(
            r#"# tls-witness configuration

[prover]
# Ceiling on chunk proofs per claim
max_chunks_per_claim = {max_chunks}

# Chunk proofs generated in parallel
proof_concurrency = {concurrency}

# Proving engine: "gnark" or "snarkjs"
engine = "gnark"

# Circuit artifacts: a local directory, or a remote base URL
[prover.backend]
kind = "local"
path = "circuits"
# kind = "remote"
# url = "https://artifacts.example.com/circuits"

[client]
# Retries after a failed attempt; only network errors are retried
max_retries = {max_retries}

# Backoff before the first retry, doubled per retry
retry_backoff = "{backoff}"

[beacon]
epoch = 1
witnesses_required_for_claim = 1
next_epoch_timestamp_s = 0

# Trusted witnesses
# [[beacon.witnesses]]
# id = "0x..."
# url = "wss://witness.example.com/ws"

[logging]
# Log level: trace, debug, info, warn, error
level = "{level}"
"#,
            max_chunks = DEFAULT_MAX_CHUNKS_PER_CLAIM,
            concurrency = DEFAULT_PROOF_CONCURRENCY,
            max_retries = DEFAULT_MAX_RETRIES,
            backoff = DEFAULT_RETRY_BACKOFF,
            level = DEFAULT_LOG_LEVEL,
        )
    }

    /// Create and save a default configuration file
    pub fn create_default(path: &Path) -> Result<(), ConfigError> {
        write_file(path, &Self::generate_default_toml())
    }
}

fn write_file(path: &Path, contents: &str) -> Result<(), ConfigError> {
    let write_err = |source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    };

    // Create parent directory if needed
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(write_err)?;
    }
    fs::write(path, contents).map_err(write_err)
}

/// Get the default config file path
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tls-witness")
        .join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.prover.max_chunks_per_claim, 200);
        assert_eq!(config.prover.proof_concurrency, 10);
        assert_eq!(config.prover.engine, ZkEngine::Gnark);
        assert_eq!(config.client.max_retries, 3);
        assert_eq!(config.logging.level, "info");
        config.validate().unwrap();
    }

    #[test]
    fn test_save_and_load_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.prover.engine = ZkEngine::Snarkjs;
        config.prover.backend = BackendSource::Remote {
            url: "https://circuits.example".to_string(),
        };
        config.beacon.witnesses = vec![WitnessData::new("0xabc", "wss://w1")];
        config.save(&config_path).unwrap();

        let loaded = Config::load(&config_path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_create_default_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        Config::create_default(&config_path).unwrap();
        assert!(config_path.exists());

        // Verify it can be loaded
        let config = Config::load(&config_path).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_config_with_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        let minimal_config = r#"
[client]
retry_backoff = "250ms"

[[beacon.witnesses]]
id = "0xabc"
url = "wss://w1"
"#;
        fs::write(&config_path, minimal_config).unwrap();

        let config = Config::load(&config_path).unwrap();
        assert_eq!(config.client.max_retries, 3);
        assert_eq!(
            config.client.retry_policy().unwrap().base_backoff,
            Duration::from_millis(250)
        );
        assert_eq!(config.beacon.state().witnesses.len(), 1);
        assert_eq!(config.prover.backend, BackendSource::default());
    }

    #[test]
    fn test_validation() {
        let mut config = Config::default();
        config.prover.proof_concurrency = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.beacon.witnesses_required_for_claim = 2;
        config.beacon.witnesses = vec![WitnessData::new("0xabc", "wss://w1")];
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.client.retry_backoff = "soon".to_string();
        let err: ProtocolError = config.validate().unwrap_err().into();
        assert_eq!(err.code, ErrorCode::BadRequest);
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let temp_dir = TempDir::new().unwrap();
        let err = Config::load(&temp_dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_default_config_path() {
        assert!(default_config_path().ends_with("tls-witness/config.toml"));
    }
}
