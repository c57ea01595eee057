//! Configuration types for L402 clients.
//!
//! The configuration document is JSON. Every section is optional and falls
//! back to [`config_defaults`]:
//!
//! ```json
//! {
//!   "budget": {
//!     "maxSatsPerRequest": 1000,
//!     "maxSatsPerHour": 10000,
//!     "maxSatsPerDay": 50000,
//!     "allowedDomains": ["api.example.com"]
//!   },
//!   "cache": { "maxSize": 256, "defaultTtlSeconds": 3600 },
//!   "wallets": {
//!     "priority": "strike",
//!     "strikeApiKey": "${STRIKE_API_KEY}",
//!     "nwcConnectionString": "nostr+walletconnect://..."
//!   }
//! }
//! ```
//!
//! Setting `"budget": null` disables spending limits altogether.
//!
//! # Environment Variable Resolution
//!
//! Wallet secrets are [`LiteralOrEnv`] values: either literals or `$VAR` /
//! `${VAR}` references resolved when the wallet is selected. A reference to an
//! unset variable counts as "not configured" rather than an error, so a config
//! file shared between machines does not fail to load.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration document.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct L402Config {
    /// Spending limits. `None` disables budget enforcement.
    #[serde(default = "config_defaults::default_budget")]
    pub budget: Option<BudgetConfig>,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub wallets: WalletConfig,
}

impl Default for L402Config {
    fn default() -> Self {
        Self {
            budget: config_defaults::default_budget(),
            cache: CacheConfig::default(),
            wallets: WalletConfig::default(),
        }
    }
}

/// Spending ceilings in satoshis and an optional domain allow-list.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BudgetConfig {
    #[serde(default = "config_defaults::default_max_sats_per_request")]
    pub max_sats_per_request: u64,
    #[serde(default = "config_defaults::default_max_sats_per_hour")]
    pub max_sats_per_hour: u64,
    #[serde(default = "config_defaults::default_max_sats_per_day")]
    pub max_sats_per_day: u64,
    /// If set, only invoices from these hosts are paid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_domains: Option<HashSet<String>>,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            max_sats_per_request: config_defaults::DEFAULT_MAX_SATS_PER_REQUEST,
            max_sats_per_hour: config_defaults::DEFAULT_MAX_SATS_PER_HOUR,
            max_sats_per_day: config_defaults::DEFAULT_MAX_SATS_PER_DAY,
            allowed_domains: None,
        }
    }
}

/// Credential cache sizing and expiry.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CacheConfig {
    #[serde(default = "config_defaults::default_cache_max_size")]
    pub max_size: usize,
    /// Lifetime of a credential stored without an explicit expiry.
    /// `null` keeps such credentials until evicted.
    #[serde(default = "config_defaults::default_cache_ttl_seconds")]
    pub default_ttl_seconds: Option<u64>,
}

impl CacheConfig {
    pub fn default_ttl(&self) -> Option<Duration> {
        self.default_ttl_seconds.map(Duration::from_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: config_defaults::DEFAULT_CACHE_MAX_SIZE,
            default_ttl_seconds: config_defaults::default_cache_ttl_seconds(),
        }
    }
}

/// Wallet credentials found in the configuration file.
///
/// LND is configured through environment variables only.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WalletConfig {
    /// Preferred provider, tried before the default order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nwc_connection_string: Option<LiteralOrEnv>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strike_api_key: Option<LiteralOrEnv>,
    #[serde(default, rename = "openNodeApiKey", skip_serializing_if = "Option::is_none")]
    pub opennode_api_key: Option<LiteralOrEnv>,
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {0}: {1}")]
    FileRead(PathBuf, std::io::Error),
    #[error("Failed to parse config file: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl L402Config {
    /// `~/.lightning-enable/config.json`, if a home directory is known.
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| {
            home.join(config_defaults::CONFIG_DIR)
                .join(config_defaults::CONFIG_FILE)
        })
    }

    /// Loads configuration from `path`.
    ///
    /// A missing file yields the defaults; an unreadable or malformed one is an error.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::FileRead(path.to_path_buf(), e)),
        };
        Self::from_json(&content)
    }

    /// Loads configuration from [`L402Config::default_path`], or defaults.
    pub fn load() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) => Self::load_from_path(path),
            None => Ok(Self::default()),
        }
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: L402Config = serde_json::from_str(content)?;
        Ok(config)
    }
}

pub mod config_defaults {
    use super::BudgetConfig;

    pub const DEFAULT_MAX_SATS_PER_REQUEST: u64 = 1_000;
    pub const DEFAULT_MAX_SATS_PER_HOUR: u64 = 10_000;
    pub const DEFAULT_MAX_SATS_PER_DAY: u64 = 50_000;
    pub const DEFAULT_CACHE_MAX_SIZE: usize = 256;
    pub const DEFAULT_CACHE_TTL_SECONDS: u64 = 3_600;
    pub const CONFIG_DIR: &str = ".lightning-enable";
    pub const CONFIG_FILE: &str = "config.json";

    pub fn default_budget() -> Option<BudgetConfig> {
        Some(BudgetConfig::default())
    }

    pub fn default_max_sats_per_request() -> u64 {
        DEFAULT_MAX_SATS_PER_REQUEST
    }

    pub fn default_max_sats_per_hour() -> u64 {
        DEFAULT_MAX_SATS_PER_HOUR
    }

    pub fn default_max_sats_per_day() -> u64 {
        DEFAULT_MAX_SATS_PER_DAY
    }

    pub fn default_cache_max_size() -> usize {
        DEFAULT_CACHE_MAX_SIZE
    }

    pub fn default_cache_ttl_seconds() -> Option<u64> {
        Some(DEFAULT_CACHE_TTL_SECONDS)
    }
}

// ============================================================================
// Environment Variable Resolution
// ============================================================================

/// A configuration string that is either a literal or an environment reference.
///
/// Supports both literal values and environment variable references:
/// - Literal: `"sk_live_abc"`
/// - Simple env var: `"$STRIKE_API_KEY"`
/// - Braced env var: `"${STRIKE_API_KEY}"`
///
/// Resolution is deferred to [`LiteralOrEnv::resolve`], which takes the
/// environment lookup as a parameter.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct LiteralOrEnv(String);

impl LiteralOrEnv {
    pub fn from_literal(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw string as written in the configuration.
    pub fn raw(&self) -> &str {
        &self.0
    }

    /// Resolves the value, returning `None` for blanks, unset variables and
    /// unresolved `${...}` placeholders.
    pub fn resolve<F>(&self, env: F) -> Option<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = match Self::parse_env_var_syntax(&self.0) {
            Some(var_name) => env(&var_name)?,
            None => self.0.clone(),
        };
        is_real_value(&value).then_some(value)
    }

    /// Returns the variable name if the string matches `$VAR` or `${VAR}` syntax.
    fn parse_env_var_syntax(s: &str) -> Option<String> {
        if let Some(inner) = s.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
            Some(inner.to_string())
        } else if let Some(var_name) = s.strip_prefix('$') {
            let is_name =
                !var_name.is_empty() && var_name.chars().all(|c| c.is_alphanumeric() || c == '_');
            is_name.then(|| var_name.to_string())
        } else {
            None
        }
    }
}

/// Whether a credential value is usable: non-blank and not an unexpanded `${...}` placeholder.
pub fn is_real_value(value: &str) -> bool {
    let value = value.trim();
    !value.is_empty() && !value.starts_with("${")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(name: &str) -> Option<String> {
        match name {
            "STRIKE_API_KEY" => Some("sk_from_env".to_string()),
            "PLACEHOLDER" => Some("${STILL_UNEXPANDED}".to_string()),
            _ => None,
        }
    }

    #[test]
    fn test_default_path_is_under_home() {
        if let Some(path) = L402Config::default_path() {
            assert!(path.ends_with(".lightning-enable/config.json"));
            assert_eq!(path.parent().and_then(Path::parent), dirs::home_dir().as_deref());
        }
    }

    #[test]
    fn test_defaults() {
        let config = L402Config::from_json("{}").unwrap();
        let budget = config.budget.unwrap();
        assert_eq!(budget.max_sats_per_request, 1_000);
        assert_eq!(budget.max_sats_per_hour, 10_000);
        assert_eq!(budget.max_sats_per_day, 50_000);
        assert!(budget.allowed_domains.is_none());
        assert_eq!(config.cache.max_size, 256);
        assert_eq!(config.cache.default_ttl(), Some(Duration::from_secs(3600)));
        assert!(config.wallets.priority.is_none());
    }

    #[test]
    fn test_budget_disabled_with_null() {
        let config = L402Config::from_json(r#"{"budget": null}"#).unwrap();
        assert!(config.budget.is_none());
    }

    #[test]
    fn test_partial_sections() {
        let config = L402Config::from_json(
            r#"{
                "budget": {"maxSatsPerRequest": 500, "allowedDomains": ["api.example.com"]},
                "cache": {"defaultTtlSeconds": null},
                "wallets": {"priority": "nostr", "openNodeApiKey": "on_key"}
            }"#,
        )
        .unwrap();
        let budget = config.budget.unwrap();
        assert_eq!(budget.max_sats_per_request, 500);
        assert_eq!(budget.max_sats_per_hour, 10_000);
        assert!(budget.allowed_domains.unwrap().contains("api.example.com"));
        assert_eq!(config.cache.max_size, 256);
        assert_eq!(config.cache.default_ttl(), None);
        assert_eq!(config.wallets.priority.as_deref(), Some("nostr"));
        assert_eq!(config.wallets.opennode_api_key.unwrap().raw(), "on_key");
    }

    #[test]
    fn test_malformed_json() {
        let result = L402Config::from_json("{ not json");
        assert!(matches!(result, Err(ConfigError::JsonParse(_))));
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = L402Config::load_from_path("/nonexistent/l402/config.json").unwrap();
        assert_eq!(config, L402Config::default());
    }

    #[test]
    fn test_literal_or_env_resolution() {
        assert_eq!(
            LiteralOrEnv::from_literal("sk_literal").resolve(env).as_deref(),
            Some("sk_literal")
        );
        assert_eq!(
            LiteralOrEnv::from_literal("$STRIKE_API_KEY").resolve(env).as_deref(),
            Some("sk_from_env")
        );
        assert_eq!(
            LiteralOrEnv::from_literal("${STRIKE_API_KEY}").resolve(env).as_deref(),
            Some("sk_from_env")
        );
        assert_eq!(LiteralOrEnv::from_literal("${MISSING}").resolve(env), None);
        assert_eq!(LiteralOrEnv::from_literal("$PLACEHOLDER").resolve(env), None);
        assert_eq!(LiteralOrEnv::from_literal("  ").resolve(env), None);
    }
}
