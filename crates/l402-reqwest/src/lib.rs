#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Reqwest clients with automatic [L402](https://docs.lightning.engineering/the-lightning-network/l402)
//! payment handling.
//!
//! When a request comes back `402 Payment Required` with an L402 challenge in
//! `WWW-Authenticate`, the client checks the invoice against the spending
//! budget, pays it through a Lightning wallet, caches the resulting credential
//! and retries the request once with `Authorization: L402 <macaroon>:<preimage>`.
//! Later requests to the same host and route prefix reuse the cached credential
//! without paying again.
//!
//! Two flavours are provided:
//!
//! - [`L402Client`], a [`reqwest_middleware`] middleware for async code.
//! - [`BlockingL402Client`], a wrapper around [`reqwest::blocking::Client`].
//!
//! ## Quickstart
//!
//! ```rust,ignore
//! use l402_reqwest::{L402Client, ReqwestWithL402};
//! use l402_rs::wallet::{process_env, resolve_wallet};
//! use l402_types::config::L402Config;
//!
//! let config = L402Config::load()?;
//! let wallet = resolve_wallet(&config.wallets, process_env, my_connector)?;
//! let http = reqwest::Client::new()
//!     .with_l402(L402Client::from_config(config, wallet))
//!     .build();
//!
//! let response = http.get("https://api.example.com/v1/data").send().await?;
//! ```
//!
//! Spending is recorded in the client's [`SpendingLedger`](l402_rs::ledger::SpendingLedger),
//! reachable through [`L402Client::ledger`].

mod blocking;
mod builder;
mod client;

pub use blocking::*;
pub use builder::*;
pub use client::*;
