#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Core types for the L402 payment protocol.
//!
//! This crate provides the foundational types used by the L402 client crates
//! for handling HTTP 402 Payment Required flows backed by Lightning invoices.
//! It does not talk to the network and does not pay anything: it only knows
//! how to read what a server asks for, and how to describe what went wrong.
//!
//! # Overview
//!
//! An L402-protected server answers an unauthenticated request with
//! `402 Payment Required` and a `WWW-Authenticate` challenge carrying a
//! macaroon and a BOLT11 invoice. Once the invoice is paid, the payment
//! preimage together with the macaroon form a bearer credential:
//!
//! ```text
//! WWW-Authenticate: L402 macaroon="AGIAJEemVQUTEyNCR0exk7ek90Cg==", invoice="lnbc10u1p..."
//! Authorization:    L402 AGIAJEemVQUTEyNCR0exk7ek90Cg==:<preimage-hex>
//! ```
//!
//! # Modules
//!
//! - [`challenge`] - Parsing of `WWW-Authenticate` L402 (and legacy LSAT) challenges
//! - [`config`] - Budget, cache and wallet configuration, environment variable resolution
//! - [`error`] - The [`L402Error`](error::L402Error) taxonomy shared by all crates
//! - [`invoice`] - Satoshi amount extraction from BOLT11 invoice strings
//! - [`timestamp`] - Unix timestamp utilities for credential expiry and spending windows

pub mod challenge;
pub mod config;
pub mod error;
pub mod invoice;
pub mod timestamp;
