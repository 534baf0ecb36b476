//! Engine configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::warn;

use dyad_external::EntropySource;
use dyad_types::GovernanceParams;

use crate::archive::{ArchivePolicy, VoterRefKey};
use crate::error::GovernanceError;

/// Configuration for a governance engine deployment.
///
/// Can be loaded from a TOML file via [`EngineConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Directory holding the LMDB environment.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// LMDB map size in bytes.
    #[serde(default = "default_map_size")]
    pub lmdb_map_size: usize,

    /// Seconds between background sweeps.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    #[serde(default)]
    pub archive: ArchivePolicy,

    /// Hex-encoded secret behind archive voter references. Never written
    /// back out; when unset a random key is drawn at startup.
    #[serde(default, skip_serializing)]
    pub archive_voter_key: Option<String>,

    #[serde(default)]
    pub params: GovernanceParams,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./dyad_data")
}

fn default_map_size() -> usize {
    1 << 30
}

fn default_sweep_interval() -> u64 {
    60
}

// ── Impl ───────────────────────────────────────────────────────────────

impl EngineConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &str) -> Result<Self, GovernanceError> {
        let content = std::fs::read_to_string(path).map_err(|e| GovernanceError::Config(format!("{path}: {e}")))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string, then sanity-check the params.
    pub fn from_toml_str(s: &str) -> Result<Self, GovernanceError> {
        let config: Self = toml::from_str(s).map_err(|e| GovernanceError::Config(e.to_string()))?;
        config.params.validate().map_err(GovernanceError::Config)?;
        if let Some(encoded) = &config.archive_voter_key {
            VoterRefKey::from_hex(encoded)?;
        }
        Ok(config)
    }

    /// The configured voter reference key, or a random one.
    pub fn voter_ref_key(&self, entropy: &dyn EntropySource) -> Result<VoterRefKey, GovernanceError> {
        match &self.archive_voter_key {
            Some(encoded) => VoterRefKey::from_hex(encoded),
            None => {
                warn!("no archive voter key configured; references will not match across restarts");
                VoterRefKey::generate(entropy)
            }
        }
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, GovernanceError> {
        toml::to_string_pretty(self).map_err(|e| GovernanceError::Config(e.to_string()))
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            log_format: default_log_format(),
            log_level: default_log_level(),
            data_dir: default_data_dir(),
            lmdb_map_size: default_map_size(),
            sweep_interval_secs: default_sweep_interval(),
            archive: ArchivePolicy::default(),
            archive_voter_key: None,
            params: GovernanceParams::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = EngineConfig::default();
        let toml_str = config.to_toml_string().expect("should serialize");
        let parsed = EngineConfig::from_toml_str(&toml_str).expect("should parse");
        assert_eq!(parsed, config);
    }

    #[test]
    fn minimal_toml_uses_defaults() {
        let config = EngineConfig::from_toml_str("").expect("empty toml should use defaults");
        assert_eq!(config.log_format, "human");
        assert_eq!(config.sweep_interval_secs, 60);
        assert_eq!(config.params, GovernanceParams::defaults());
    }

    #[test]
    fn partial_toml_overrides() {
        let toml = r#"
            log_level = "debug"

            [params]
            max_vote_changes = 2
            petition_signature_threshold = 7

            [archive]
            max_attempts = 9
        "#;
        let config = EngineConfig::from_toml_str(toml).expect("should parse");
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.params.max_vote_changes, 2);
        assert_eq!(config.params.petition_signature_threshold, 7);
        assert_eq!(config.params.multiplier_min_bps, 7_000); // default
        assert_eq!(config.archive.max_attempts, 9);
        assert_eq!(config.archive.initial_backoff_ms, 200); // default
    }

    #[test]
    fn invalid_params_are_rejected() {
        let toml = r#"
            [params]
            multiplier_min_bps = 20000
            multiplier_max_bps = 10000
        "#;
        let err = EngineConfig::from_toml_str(toml).unwrap_err();
        assert!(matches!(err, GovernanceError::Config(_)));
    }

    #[test]
    fn voter_key_is_read_but_never_written() {
        let key = "5c".repeat(64);
        let config = EngineConfig::from_toml_str(&format!("archive_voter_key = \"{key}\"")).expect("should parse");
        assert_eq!(config.archive_voter_key.as_deref(), Some(key.as_str()));
        config.voter_ref_key(&dyad_crypto::OsEntropy).expect("configured key");

        let rendered = config.to_toml_string().expect("should serialize");
        assert!(!rendered.contains(&key));
        assert!(!rendered.contains("archive_voter_key"));
    }

    #[test]
    fn malformed_voter_key_is_rejected() {
        let err = EngineConfig::from_toml_str("archive_voter_key = \"beef\"").unwrap_err();
        assert!(matches!(err, GovernanceError::Config(_)));
    }

    #[test]
    fn missing_file_returns_config_error() {
        let result = EngineConfig::from_toml_file("/nonexistent/dyad.toml");
        assert!(matches!(result, Err(GovernanceError::Config(_))));
    }
}
