//! Attestor configuration.
//!
//! Loaded from a JSON file, then overridden from `ZKPRICE_*` environment
//! variables. The signing key is not part of the file: it is read from
//! `ZKPRICE_SIGNING_KEY` by the binary and never written to disk.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::ledger::verifier::VerifierConfig;
use crate::publisher::PublisherConfig;
use crate::utils::constants::{DEFAULT_TOLERANCE_BPS, MAX_TOLERANCE_BPS, MIN_PRICE_SOURCES};
use crate::utils::math::PriceScale;
use crate::zkp::commitment::AssetRegistry;

// ═══════════════════════════════════════════════════════════════════════════════
// ATTESTOR CONFIGURATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Full configuration of one attestor process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestorConfig {
    /// Agreement band between sources, in basis points
    pub tolerance_bps: u64,
    /// Minimum successful sources per round
    pub min_sources: usize,
    /// Decimal conventions of the off-chain side
    pub scale: PriceScale,
    /// Submission timing and retries
    pub publisher: PublisherConfig,
    /// Ledger verifier parameters
    pub verifier: VerifierConfig,
    /// Asset universe; encodings must be collision-free
    pub assets: Vec<String>,
    /// Directory for the local ledger store
    pub data_dir: PathBuf,
}

impl Default for AttestorConfig {
    fn default() -> Self {
        Self {
            tolerance_bps: DEFAULT_TOLERANCE_BPS,
            min_sources: MIN_PRICE_SOURCES,
            scale: PriceScale::default(),
            publisher: PublisherConfig::default(),
            verifier: VerifierConfig::default(),
            assets: vec!["NVDA".into(), "TSLA".into(), "AAPL".into()],
            data_dir: default_data_dir(),
        }
    }
}

impl AttestorConfig {
    /// Load from file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;

        serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Save to file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content =
            serde_json::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Io(e.to_string()))?;
        }

        std::fs::write(path, content).map_err(|e| ConfigError::Io(e.to_string()))
    }

    /// Defaults overridden from environment variables
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Apply `ZKPRICE_*` overrides; unparsable values are ignored
    pub fn with_env_overrides(mut self) -> Self {
        fn parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
            std::env::var(name).ok()?.trim().parse().ok()
        }

        if let Some(bps) = parsed("ZKPRICE_TOLERANCE_BPS") {
            self.tolerance_bps = bps;
        }
        if let Some(n) = parsed("ZKPRICE_MIN_SOURCES") {
            self.min_sources = n;
        }
        if let Ok(assets) = std::env::var("ZKPRICE_ASSETS") {
            self.assets = assets
                .split(',')
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .map(String::from)
                .collect();
        }
        if let Ok(dir) = std::env::var("ZKPRICE_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(ms) = parsed("ZKPRICE_POLL_INTERVAL_MS") {
            self.publisher.poll_interval_ms = ms;
        }
        if let Some(secs) = parsed("ZKPRICE_MAX_WAIT_SECS") {
            self.publisher.max_wait_secs = secs;
        }
        if let Some(n) = parsed("ZKPRICE_MAX_RETRIES") {
            self.publisher.max_retries = n;
        }

        self
    }

    /// Get default config file path
    pub fn default_path() -> PathBuf {
        default_data_dir().join("config.json")
    }

    /// Path of the local ledger store
    pub fn ledger_dir(&self) -> PathBuf {
        self.data_dir.join("ledger")
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tolerance_bps > MAX_TOLERANCE_BPS {
            return Err(ConfigError::Validation(format!(
                "tolerance {} bps exceeds maximum {}",
                self.tolerance_bps, MAX_TOLERANCE_BPS
            )));
        }

        if self.min_sources < MIN_PRICE_SOURCES {
            return Err(ConfigError::Validation(format!(
                "at least {} sources required",
                MIN_PRICE_SOURCES
            )));
        }

        self.scale
            .factor()
            .map_err(|e| ConfigError::Validation(e.to_string()))?;

        if self.verifier.scale() != self.scale {
            return Err(ConfigError::Validation(
                "verifier decimals must match attestor decimals".into(),
            ));
        }

        if self.verifier.min_proof_len == 0 {
            return Err(ConfigError::Validation("Minimum proof length must be greater than 0".into()));
        }

        if self.publisher.poll_interval_ms == 0 || self.publisher.max_wait_secs == 0 {
            return Err(ConfigError::Validation(
                "Poll interval and maximum wait must be greater than 0".into(),
            ));
        }

        if self.assets.is_empty() {
            return Err(ConfigError::Validation("At least one asset required".into()));
        }

        AssetRegistry::from_config(self).map_err(|e| ConfigError::Validation(e.to_string()))?;

        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONFIG ERROR
// ═══════════════════════════════════════════════════════════════════════════════

/// Configuration error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// IO error
    Io(String),
    /// Parse error
    Parse(String),
    /// Serialization error
    Serialize(String),
    /// Validation error
    Validation(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(msg) => write!(f, "IO error: {}", msg),
            ConfigError::Parse(msg) => write!(f, "Parse error: {}", msg),
            ConfigError::Serialize(msg) => write!(f, "Serialization error: {}", msg),
            ConfigError::Validation(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

// ═══════════════════════════════════════════════════════════════════════════════
// HELPER FUNCTIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// Get default data directory
fn default_data_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata).join("zkprice");
        }
    }

    #[cfg(not(target_os = "windows"))]
    {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(".zkprice");
        }
    }

    PathBuf::from(".zkprice")
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = AttestorConfig::default();
        assert_eq!(config.tolerance_bps, 700);
        assert_eq!(config.verifier.min_proof_len, 64);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = AttestorConfig::default();
        config.assets = vec!["MSFT".into()];
        config.save(&path).unwrap();

        assert_eq!(AttestorConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_config_load_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        assert!(matches!(AttestorConfig::load(&missing), Err(ConfigError::Io(_))));

        let garbage = dir.path().join("garbage.json");
        std::fs::write(&garbage, "{ not json").unwrap();
        assert!(matches!(AttestorConfig::load(&garbage), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_config_validation() {
        let mut config = AttestorConfig::default();
        config.tolerance_bps = MAX_TOLERANCE_BPS + 1;
        assert!(config.validate().is_err());

        let mut config = AttestorConfig::default();
        config.min_sources = 1;
        assert!(config.validate().is_err());

        let mut config = AttestorConfig::default();
        config.verifier.output_decimals = 3;
        assert!(config.validate().is_err());

        let mut config = AttestorConfig::default();
        config.assets = vec!["not an asset".into()];
        assert!(config.validate().is_err());

        let mut config = AttestorConfig::default();
        config.assets.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        std::env::set_var("ZKPRICE_TOLERANCE_BPS", "250");
        std::env::set_var("ZKPRICE_ASSETS", "NVDA, AMD ,");
        let config = AttestorConfig::from_env();
        std::env::remove_var("ZKPRICE_TOLERANCE_BPS");
        std::env::remove_var("ZKPRICE_ASSETS");

        assert_eq!(config.tolerance_bps, 250);
        assert_eq!(config.assets, vec!["NVDA".to_string(), "AMD".to_string()]);
    }
}
