//! Client-side state for paying [L402](https://docs.lightning.engineering/the-lightning-network/l402)
//! challenges over Lightning.
//!
//! An L402 server answers `402 Payment Required` with a macaroon and a BOLT11
//! invoice. Paying the invoice yields a preimage, and the pair
//! `macaroon:preimage` is the credential for retrying the request. This crate
//! holds everything between the HTTP client and the wallet:
//!
//! - [`budget`]: per-request, hourly and daily spending ceilings plus an optional domain allow-list.
//! - [`credential_cache`]: LRU cache of paid credentials keyed by host and route prefix.
//! - [`ledger`]: append-only record of every payment attempt.
//! - [`payment`]: the [`PaymentPort`](payment::PaymentPort) wallet boundary and its blocking bridge.
//! - [`wallet`]: wallet auto-selection from environment and configuration.
//! - [`orchestrator`]: the steps of the pay-and-retry flow shared by all HTTP clients.
//!
//! Protocol types (challenge parsing, invoice amounts, errors, configuration)
//! live in [`l402_types`], re-exported here as [`types`]. HTTP clients live in
//! the `l402-reqwest` crate.

pub mod budget;
pub mod credential_cache;
pub mod ledger;
pub mod orchestrator;
pub mod payment;
pub mod wallet;

pub use l402_types as types;
