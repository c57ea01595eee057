//! Parsing of L402 challenges from `402 Payment Required` responses.
//!
//! A server protecting a resource with L402 answers with a `WWW-Authenticate`
//! header in one of these shapes:
//!
//! ```text
//! L402 macaroon="<mac>", invoice="<bolt11>"
//! L402 macaroon=<mac>, invoice=<bolt11>
//! LSAT macaroon="<mac>", invoice="<bolt11>"   (legacy scheme name)
//! ```
//!
//! The scheme name and the `macaroon=` / `invoice=` keys are matched
//! case-insensitively.
//!
//! # Example
//!
//! ```
//! use l402_types::challenge::parse_challenge;
//!
//! let challenge = parse_challenge(r#"L402 macaroon="abc", invoice="lnbc10u1pxyz""#).unwrap();
//! assert_eq!(challenge.macaroon, "abc");
//! assert_eq!(challenge.invoice, "lnbc10u1pxyz");
//! ```

use http::HeaderMap;
use http::header::WWW_AUTHENTICATE;
use regex::Regex;
use std::sync::LazyLock;

use crate::error::L402Error;

/// Scheme name written into the retry `Authorization` header.
pub const L402_SCHEME: &str = "L402";

static CHALLENGE_QUOTED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(?:L402|LSAT)\s+macaroon="([^"]+)"\s*,\s*invoice="([^"]+)""#)
        .expect("valid regex")
});

static CHALLENGE_UNQUOTED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(?:L402|LSAT)\s+macaroon=([^\s,]+)\s*,?\s*invoice=([^\s,]+)"#)
        .expect("valid regex")
});

/// A parsed L402 challenge. Produced per response and never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    pub macaroon: String,
    pub invoice: String,
}

impl Challenge {
    /// The `Authorization` header value proving payment of this challenge.
    pub fn authorization(&self, preimage: &str) -> String {
        authorization(&self.macaroon, preimage)
    }
}

/// Formats `L402 <macaroon>:<preimage>`.
pub fn authorization(macaroon: &str, preimage: &str) -> String {
    format!("{L402_SCHEME} {macaroon}:{preimage}")
}

/// Parses a `WWW-Authenticate` header value into a [`Challenge`].
///
/// # Errors
///
/// Returns [`L402Error::ChallengeParse`] if the header is empty, carries no
/// L402/LSAT challenge, or the macaroon or invoice is blank.
pub fn parse_challenge(header: &str) -> Result<Challenge, L402Error> {
    if header.trim().is_empty() {
        return Err(L402Error::challenge_parse(header, "empty header"));
    }

    let captures = CHALLENGE_QUOTED
        .captures(header)
        .or_else(|| CHALLENGE_UNQUOTED.captures(header))
        .ok_or_else(|| L402Error::challenge_parse(header, "no L402/LSAT challenge found"))?;

    let macaroon = captures.get(1).map_or("", |m| m.as_str()).trim();
    let invoice = captures.get(2).map_or("", |m| m.as_str()).trim();

    if macaroon.is_empty() {
        return Err(L402Error::challenge_parse(header, "empty macaroon"));
    }
    if invoice.is_empty() {
        return Err(L402Error::challenge_parse(header, "empty invoice"));
    }

    Ok(Challenge {
        macaroon: macaroon.to_string(),
        invoice: invoice.to_string(),
    })
}

/// Looks for an L402 challenge among response headers.
///
/// Returns `None` when there is no `WWW-Authenticate` header or none of its
/// values parse. A server may send several challenges (e.g. `Basic` next to
/// `L402`), so every value is tried.
pub fn find_challenge(headers: &HeaderMap) -> Option<Challenge> {
    headers
        .get_all(WWW_AUTHENTICATE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(|value| match parse_challenge(value) {
            Ok(challenge) => Some(challenge),
            Err(error) => {
                tracing::trace!(%error, "Ignoring WWW-Authenticate value");
                None
            }
        })
}
