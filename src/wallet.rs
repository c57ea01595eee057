//! Wallet auto-selection.
//!
//! Picks a payment backend from environment variables and the configuration
//! file. Selection is a pure function of its inputs: the environment lookup is
//! passed in, and turning resolved credentials into a live [`PaymentPort`] is
//! the job of a caller-supplied connector. This crate ships no backends.
//!
//! Resolution order for each provider: environment variable first, then the
//! `wallets` section of the configuration file. Values that are still
//! `${...}` placeholders are ignored.
//!
//! Default priority is LND, NWC, Strike, OpenNode. `wallets.priority` moves one
//! provider to the front (`nostr` is accepted as an alias of `nwc`).
//!
//! ```
//! use std::sync::Arc;
//! use l402_rs::payment::PaymentPort;
//! use l402_rs::wallet::{resolve_wallet, WalletCredentials};
//! use l402_types::config::WalletConfig;
//! use l402_types::error::{BoxError, L402Error};
//!
//! struct Strike(String);
//!
//! #[async_trait::async_trait]
//! impl PaymentPort for Strike {
//!     async fn pay_invoice(&self, _invoice: &str) -> Result<String, BoxError> {
//!         unimplemented!()
//!     }
//! }
//!
//! let env = |name: &str| (name == "STRIKE_API_KEY").then(|| "sk_test".to_string());
//! let wallet = resolve_wallet(&WalletConfig::default(), env, |credentials| match credentials {
//!     WalletCredentials::Strike { api_key } => Ok(Arc::new(Strike(api_key)) as Arc<dyn PaymentPort>),
//!     _ => Err(L402Error::NoWallet),
//! });
//! assert!(wallet.is_ok());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::Arc;

use l402_types::config::{LiteralOrEnv, WalletConfig, is_real_value};
use l402_types::error::L402Error;

use crate::payment::PaymentPort;

const ENV_LND_REST_HOST: &str = "LND_REST_HOST";
const ENV_LND_MACAROON_HEX: &str = "LND_MACAROON_HEX";
const ENV_LND_TLS_CERT_PATH: &str = "LND_TLS_CERT_PATH";
const ENV_NWC_CONNECTION_STRING: &str = "NWC_CONNECTION_STRING";
const ENV_STRIKE_API_KEY: &str = "STRIKE_API_KEY";
const ENV_OPENNODE_API_KEY: &str = "OPENNODE_API_KEY";

/// Supported payment providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WalletKind {
    Lnd,
    Nwc,
    Strike,
    OpenNode,
}

impl WalletKind {
    /// Order in which providers are tried when no priority is configured.
    pub const DEFAULT_PRIORITY: [WalletKind; 4] = [
        WalletKind::Lnd,
        WalletKind::Nwc,
        WalletKind::Strike,
        WalletKind::OpenNode,
    ];
}

impl Display for WalletKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            WalletKind::Lnd => write!(f, "lnd"),
            WalletKind::Nwc => write!(f, "nwc"),
            WalletKind::Strike => write!(f, "strike"),
            WalletKind::OpenNode => write!(f, "opennode"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown wallet provider: {0}")]
pub struct UnknownWalletKind(String);

impl FromStr for WalletKind {
    type Err = UnknownWalletKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "lnd" => Ok(WalletKind::Lnd),
            "nwc" | "nostr" => Ok(WalletKind::Nwc),
            "strike" => Ok(WalletKind::Strike),
            "opennode" => Ok(WalletKind::OpenNode),
            _ => Err(UnknownWalletKind(s.to_string())),
        }
    }
}

/// Credentials for one provider, ready to be handed to a connector.
#[derive(Clone, PartialEq, Eq)]
pub enum WalletCredentials {
    Lnd {
        host: String,
        macaroon_hex: String,
        tls_cert_path: Option<String>,
    },
    Nwc {
        connection_string: String,
    },
    Strike {
        api_key: String,
    },
    OpenNode {
        api_key: String,
    },
}

impl WalletCredentials {
    pub fn kind(&self) -> WalletKind {
        match self {
            WalletCredentials::Lnd { .. } => WalletKind::Lnd,
            WalletCredentials::Nwc { .. } => WalletKind::Nwc,
            WalletCredentials::Strike { .. } => WalletKind::Strike,
            WalletCredentials::OpenNode { .. } => WalletKind::OpenNode,
        }
    }
}

/// Secrets are never printed.
impl fmt::Debug for WalletCredentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            WalletCredentials::Lnd { host, tls_cert_path, .. } => f
                .debug_struct("Lnd")
                .field("host", host)
                .field("tls_cert_path", tls_cert_path)
                .finish_non_exhaustive(),
            other => f.debug_struct(&other.kind().to_string()).finish_non_exhaustive(),
        }
    }
}

/// Provider order after applying the configured preference.
pub fn wallet_priority(config: &WalletConfig) -> Vec<WalletKind> {
    let mut priority = WalletKind::DEFAULT_PRIORITY.to_vec();
    let preferred = config
        .priority
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .and_then(|p| match p.parse::<WalletKind>() {
            Ok(kind) => Some(kind),
            Err(error) => {
                tracing::warn!(%error, "Ignoring wallet priority");
                None
            }
        });
    if let Some(preferred) = preferred {
        priority.retain(|kind| *kind != preferred);
        priority.insert(0, preferred);
    }
    priority
}

/// Environment first (placeholders skipped), then the configuration file.
fn resolve_secret<F>(env: &F, var: &str, configured: Option<&LiteralOrEnv>) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    env(var)
        .filter(|value| is_real_value(value))
        .or_else(|| configured.and_then(|value| value.resolve(env)))
}

/// Credentials for `kind`, if configured.
pub fn wallet_credentials<F>(kind: WalletKind, config: &WalletConfig, env: &F) -> Option<WalletCredentials>
where
    F: Fn(&str) -> Option<String>,
{
    match kind {
        WalletKind::Lnd => {
            let host = env(ENV_LND_REST_HOST).filter(|v| is_real_value(v))?;
            let macaroon_hex = env(ENV_LND_MACAROON_HEX).filter(|v| is_real_value(v))?;
            Some(WalletCredentials::Lnd {
                host,
                macaroon_hex,
                tls_cert_path: env(ENV_LND_TLS_CERT_PATH).filter(|v| is_real_value(v)),
            })
        }
        WalletKind::Nwc => resolve_secret(
            env,
            ENV_NWC_CONNECTION_STRING,
            config.nwc_connection_string.as_ref(),
        )
        .map(|connection_string| WalletCredentials::Nwc { connection_string }),
        WalletKind::Strike => resolve_secret(env, ENV_STRIKE_API_KEY, config.strike_api_key.as_ref())
            .map(|api_key| WalletCredentials::Strike { api_key }),
        WalletKind::OpenNode => {
            resolve_secret(env, ENV_OPENNODE_API_KEY, config.opennode_api_key.as_ref())
                .map(|api_key| WalletCredentials::OpenNode { api_key })
        }
    }
}

/// First configured provider in priority order.
pub fn select_wallet<F>(config: &WalletConfig, env: F) -> Result<WalletCredentials, L402Error>
where
    F: Fn(&str) -> Option<String>,
{
    wallet_priority(config)
        .into_iter()
        .find_map(|kind| wallet_credentials(kind, config, &env))
        .ok_or(L402Error::NoWallet)
}

/// Selects a provider and connects to it.
///
/// # Errors
///
/// [`L402Error::NoWallet`] if no provider is configured; otherwise whatever
/// `connect` returns.
pub fn resolve_wallet<F, C>(
    config: &WalletConfig,
    env: F,
    connect: C,
) -> Result<Arc<dyn PaymentPort>, L402Error>
where
    F: Fn(&str) -> Option<String>,
    C: FnOnce(WalletCredentials) -> Result<Arc<dyn PaymentPort>, L402Error>,
{
    let credentials = select_wallet(config, env)?;
    tracing::info!(wallet = %credentials.kind(), "Selected Lightning wallet");
    connect(credentials)
}

/// Reads the process environment. Pass to [`select_wallet`] / [`resolve_wallet`].
pub fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_no_wallet() {
        let result = select_wallet(&WalletConfig::default(), env_of(&[]));
        assert!(matches!(result, Err(L402Error::NoWallet)));
    }

    #[test]
    fn test_default_priority_prefers_lnd() {
        let env = env_of(&[
            ("STRIKE_API_KEY", "sk"),
            ("LND_REST_HOST", "https://localhost:8080"),
            ("LND_MACAROON_HEX", "0201"),
        ]);
        let credentials = select_wallet(&WalletConfig::default(), env).unwrap();
        assert_eq!(
            credentials,
            WalletCredentials::Lnd {
                host: "https://localhost:8080".to_string(),
                macaroon_hex: "0201".to_string(),
                tls_cert_path: None,
            }
        );
    }

    #[test]
    fn test_lnd_requires_both_variables() {
        let env = env_of(&[("LND_REST_HOST", "https://localhost:8080"), ("OPENNODE_API_KEY", "on")]);
        let credentials = select_wallet(&WalletConfig::default(), env).unwrap();
        assert_eq!(credentials.kind(), WalletKind::OpenNode);
    }

    #[test]
    fn test_configured_priority_moves_to_front() {
        let config = WalletConfig {
            priority: Some("Strike".to_string()),
            ..WalletConfig::default()
        };
        let env = env_of(&[("NWC_CONNECTION_STRING", "nostr+walletconnect://x"), ("STRIKE_API_KEY", "sk")]);
        assert_eq!(select_wallet(&config, env).unwrap().kind(), WalletKind::Strike);
        assert_eq!(
            wallet_priority(&config),
            vec![WalletKind::Strike, WalletKind::Lnd, WalletKind::Nwc, WalletKind::OpenNode]
        );
    }

    #[test]
    fn test_nostr_alias_and_unknown_priority() {
        let config = WalletConfig {
            priority: Some("nostr".to_string()),
            ..WalletConfig::default()
        };
        assert_eq!(wallet_priority(&config)[0], WalletKind::Nwc);

        let config = WalletConfig {
            priority: Some("paypal".to_string()),
            ..WalletConfig::default()
        };
        assert_eq!(wallet_priority(&config), WalletKind::DEFAULT_PRIORITY.to_vec());
    }

    #[test]
    fn test_placeholder_env_falls_back_to_config() {
        let config = WalletConfig {
            strike_api_key: Some(LiteralOrEnv::from_literal("sk_from_file")),
            ..WalletConfig::default()
        };
        let env = env_of(&[("STRIKE_API_KEY", "${STRIKE_API_KEY}")]);
        assert_eq!(
            select_wallet(&config, env).unwrap(),
            WalletCredentials::Strike {
                api_key: "sk_from_file".to_string()
            }
        );
    }

    #[test]
    fn test_config_placeholder_is_not_configured() {
        let config = WalletConfig {
            nwc_connection_string: Some(LiteralOrEnv::from_literal("${NWC_URI}")),
            ..WalletConfig::default()
        };
        assert!(matches!(select_wallet(&config, env_of(&[])), Err(L402Error::NoWallet)));
    }

    #[test]
    fn test_resolve_wallet_calls_connector() {
        struct Dummy;

        #[async_trait::async_trait]
        impl PaymentPort for Dummy {
            async fn pay_invoice(&self, _invoice: &str) -> Result<String, l402_types::error::BoxError> {
                Ok("00".to_string())
            }
        }

        let env = env_of(&[("OPENNODE_API_KEY", "on")]);
        let mut seen = None;
        let wallet = resolve_wallet(&WalletConfig::default(), env, |credentials| {
            seen = Some(credentials.kind());
            Ok(Arc::new(Dummy) as Arc<dyn PaymentPort>)
        });
        assert!(wallet.is_ok());
        assert_eq!(seen, Some(WalletKind::OpenNode));
    }

    #[test]
    fn test_debug_hides_secrets() {
        let credentials = WalletCredentials::Strike {
            api_key: "sk_secret".to_string(),
        };
        assert!(!format!("{credentials:?}").contains("sk_secret"));
    }
}
