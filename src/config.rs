/*!
 * Keystore configuration
 *
 * Runtime knobs for a `KeystoreService`: reported security level, whether
 * encrypted-at-rest entries can be honoured, certificate defaults for
 * generated key pairs and default key sizes.
 */

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{KeystoreError, KeystoreResult};

/// 2048-01-01T00:00:00Z in milliseconds since the epoch
pub const DEFAULT_CERT_NOT_AFTER_MS: i64 = 2_461_449_600_000;

/// Where key material is reported to live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SecurityLevel {
    Software,
    TrustedEnvironment,
    StrongBox,
}

impl SecurityLevel {
    pub fn is_secure_hardware(&self) -> bool {
        !matches!(self, SecurityLevel::Software)
    }
}

/// Configuration for a keystore backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeystoreConfig {
    pub security_level: SecurityLevel,
    /// Without a configured lock screen, encrypted-at-rest imports are refused
    pub lock_screen_configured: bool,
    pub default_certificate_subject: String,
    pub default_certificate_serial: u64,
    pub default_certificate_not_before_ms: i64,
    pub default_certificate_not_after_ms: i64,
    pub default_rsa_key_size: u32,
    pub default_ec_key_size: u32,
    pub default_aes_key_size: u32,
    pub max_entries: Option<usize>,
}

impl Default for KeystoreConfig {
    fn default() -> Self {
        Self {
            security_level: SecurityLevel::TrustedEnvironment,
            lock_screen_configured: false,
            default_certificate_subject: "CN=fake".to_string(),
            default_certificate_serial: 1,
            default_certificate_not_before_ms: 0,
            default_certificate_not_after_ms: DEFAULT_CERT_NOT_AFTER_MS,
            default_rsa_key_size: 2048,
            default_ec_key_size: 256,
            default_aes_key_size: 128,
            max_entries: None,
        }
    }
}

impl KeystoreConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> KeystoreResult<Self> {
        let config: KeystoreConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON configuration file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> KeystoreResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn to_json_string(&self) -> KeystoreResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check internal consistency
    pub fn validate(&self) -> KeystoreResult<()> {
        if self.default_certificate_not_before_ms < 0 {
            return Err(KeystoreError::Configuration(
                "default_certificate_not_before_ms must not precede the epoch".to_string(),
            ));
        }
        if self.default_certificate_not_after_ms <= self.default_certificate_not_before_ms {
            return Err(KeystoreError::Configuration(
                "default certificate validity window is empty".to_string(),
            ));
        }
        if !matches!(self.default_ec_key_size, 224 | 256 | 384 | 521) {
            return Err(KeystoreError::Configuration(format!(
                "default_ec_key_size {} does not name a supported curve",
                self.default_ec_key_size
            )));
        }
        if !matches!(self.default_aes_key_size, 128 | 192 | 256) {
            return Err(KeystoreError::Configuration(format!(
                "default_aes_key_size {} is not an AES key size",
                self.default_aes_key_size
            )));
        }
        if self.default_rsa_key_size < 512 || self.default_rsa_key_size % 8 != 0 {
            return Err(KeystoreError::Configuration(format!(
                "default_rsa_key_size {} is not supported",
                self.default_rsa_key_size
            )));
        }
        if self.max_entries == Some(0) {
            return Err(KeystoreError::Configuration(
                "max_entries must be positive when set".to_string(),
            ));
        }
        Ok(())
    }
}
