//! Scanner configuration.

use chrono::Duration;
use copresence_env::LocateOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::identity::{IdentityRule, DEFAULT_IDENTITY_PREFIX};
use crate::verifier::VerificationPolicy;

/// Longest countdown an issuing device may show: one day.
pub const MAX_CREDENTIAL_VALIDITY_SECS: u64 = 86_400;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    
    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    
    #[error("{field} = {value} is out of range (1..={max})")]
    OutOfRange {
        field: &'static str,
        value: u64,
        max: u64,
    },
}

/// Configuration for a scanning/issuing device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Time and distance tolerances
    pub policy: VerificationPolicy,
    
    /// Location request options (timeout, freshness, accuracy)
    pub locate: LocateOptions,
    
    /// Literal prefix of subject and scanner ids (default: "ABC1")
    pub identity_prefix: String,
    
    /// Countdown shown after issuing a credential, seconds (default: 15)
    pub credential_validity_secs: u64,
    
    /// Ledger database directory
    pub store_path: PathBuf,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            policy: VerificationPolicy::default(),
            locate: LocateOptions::default(),
            identity_prefix: DEFAULT_IDENTITY_PREFIX.to_string(),
            credential_validity_secs: 15,
            store_path: PathBuf::from("copresence-ledger"),
        }
    }
}

impl ScannerConfig {
    /// Loads a JSON config file. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }
    
    /// Rejects values the session cannot represent.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.credential_validity().map(|_| ())
    }
    
    /// The issuing countdown as a chrono duration.
    pub fn credential_validity(&self) -> Result<Duration, ConfigError> {
        let secs = self.credential_validity_secs;
        let out_of_range = ConfigError::OutOfRange {
            field: "credential_validity_secs",
            value: secs,
            max: MAX_CREDENTIAL_VALIDITY_SECS,
        };
        if secs == 0 || secs > MAX_CREDENTIAL_VALIDITY_SECS {
            return Err(out_of_range);
        }
        i64::try_from(secs)
            .ok()
            .and_then(Duration::try_seconds)
            .ok_or(out_of_range)
    }
    
    pub fn identity_rule(&self) -> IdentityRule {
        IdentityRule::new(self.identity_prefix.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    
    fn write_config(name: &str, json: &str) -> tempfile::TempPath {
        let mut file = tempfile::Builder::new().prefix(name).suffix(".json").tempfile().unwrap();
        std::io::Write::write_all(&mut file, json.as_bytes()).unwrap();
        file.into_temp_path()
    }
    
    #[test]
    fn test_partial_json_uses_defaults() {
        let config: ScannerConfig = serde_json::from_str(
            r#"{"policy": {"max_distance_m": 25.0}, "locate": {"timeout": 3000}}"#,
        )
        .unwrap();
        
        assert_eq!(config.policy.max_distance_m, 25.0);
        assert_eq!(config.policy.max_time_delta_ms, 15_000);
        assert_eq!(config.locate.timeout, Duration::from_secs(3));
        assert!(config.locate.high_accuracy);
        assert_eq!(config.identity_prefix, "ABC1");
    }
    
    #[test]
    fn test_validity_bounds() {
        let mut config = ScannerConfig::default();
        assert_eq!(config.credential_validity().unwrap(), chrono::Duration::seconds(15));
        
        config.credential_validity_secs = MAX_CREDENTIAL_VALIDITY_SECS;
        assert!(config.validate().is_ok());
        
        for secs in [0, MAX_CREDENTIAL_VALIDITY_SECS + 1, 9_000_000_000_000, u64::MAX] {
            config.credential_validity_secs = secs;
            let err = config.credential_validity().unwrap_err();
            assert!(matches!(err, ConfigError::OutOfRange { value, .. } if value == secs));
        }
    }
    
    #[test]
    fn test_file_with_huge_validity_rejected() {
        for raw in ["9000000000000", "18446744073709551615"] {
            let path = write_config("copresence-validity", &format!(r#"{{"credential_validity_secs": {}}}"#, raw));
            let err = ScannerConfig::from_json_file(&path).unwrap_err();
            assert!(matches!(err, ConfigError::OutOfRange { field: "credential_validity_secs", .. }));
        }
        
        let path = write_config("copresence-validity", r#"{"credential_validity_secs": 30}"#);
        let config = ScannerConfig::from_json_file(&path).unwrap();
        assert_eq!(config.credential_validity_secs, 30);
    }
    
    #[test]
    fn test_missing_file_reported() {
        let err = ScannerConfig::from_json_file("/nonexistent/copresence.json").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
