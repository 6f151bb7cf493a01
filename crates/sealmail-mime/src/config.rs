//! Signing configuration

use serde::{Deserialize, Serialize};

/// Environment variable enabling S/MIME signing
pub const SIGNING_ENV: &str = "SEALMAIL_SMIME_SIGNING";

/// Environment variable naming the key store alias
pub const ALIAS_ENV: &str = "SEALMAIL_SMIME_ALIAS";

/// Per-account signing settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningConfig {
    /// Sign outgoing messages
    #[serde(default)]
    pub enabled: bool,

    /// Key store alias of the signing identity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_alias: Option<String>,
}

impl SigningConfig {
    /// Signing enabled with the given alias
    pub fn with_alias(alias: impl Into<String>) -> Self {
        Self {
            enabled: true,
            certificate_alias: Some(alias.into()),
        }
    }

    /// Create configuration from environment variables
    ///
    /// `SEALMAIL_SMIME_SIGNING` accepts `true`, `1` or `yes`; anything else
    /// leaves signing disabled. An empty alias counts as unset.
    pub fn from_env() -> Self {
        Self {
            enabled: std::env::var(SIGNING_ENV)
                .ok()
                .is_some_and(|v| parse_flag(&v)),
            certificate_alias: std::env::var(ALIAS_ENV)
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
        }
    }

    /// Alias to sign with, if signing should happen at all
    pub fn active_alias(&self) -> Option<&str> {
        if !self.enabled {
            return None;
        }
        self.certificate_alias.as_deref().filter(|a| !a.is_empty())
    }
}

fn parse_flag(value: &str) -> bool {
    let value = value.trim();
    ["true", "1", "yes"]
        .iter()
        .any(|accepted| value.eq_ignore_ascii_case(accepted))
}
