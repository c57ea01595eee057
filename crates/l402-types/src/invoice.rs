//! Satoshi amount extraction from BOLT11 invoice strings.
//!
//! Only the human-readable prefix of an invoice is inspected:
//!
//! ```text
//! ln{network}{amount?}{multiplier?}1{data}
//! ```
//!
//! | Multiplier | Scale (BTC) |
//! |------------|-------------|
//! | `m`        | 10⁻³        |
//! | `u`        | 10⁻⁶        |
//! | `n`        | 10⁻⁹        |
//! | `p`        | 10⁻¹²       |
//!
//! Without a multiplier the digits are whole bitcoin. Without digits the
//! invoice is an "any amount" invoice and no amount is returned.
//!
//! # Example
//!
//! ```
//! use l402_types::invoice::extract_amount_sats;
//!
//! assert_eq!(extract_amount_sats("lnbc10u1pjk4x5c"), Some(1_000));
//! assert_eq!(extract_amount_sats("lnbc1pjk4x5c"), None);
//! ```

use regex::Regex;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::str::FromStr;
use std::sync::LazyLock;

static BOLT11_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^ln(?P<network>[a-z]+?)(?P<amount>\d+)?(?P<multiplier>[munp])?1")
        .expect("valid regex")
});

const SATS_PER_BTC: i64 = 100_000_000;

/// Fractional-BTC scale for a multiplier character.
fn multiplier_scale(multiplier: &str) -> Option<Decimal> {
    match multiplier {
        "m" => Some(Decimal::new(1, 3)),
        "u" => Some(Decimal::new(1, 6)),
        "n" => Some(Decimal::new(1, 9)),
        "p" => Some(Decimal::new(1, 12)),
        _ => None,
    }
}

/// Extracts the invoice amount in satoshis, truncated to an integer.
///
/// Returns `None` for "any amount" invoices, for strings that do not look
/// like a BOLT11 invoice, and for amounts too large to represent. Extraction
/// is best-effort: callers decide whether a missing amount matters.
pub fn extract_amount_sats(invoice: &str) -> Option<u64> {
    let invoice = invoice.trim().to_lowercase();
    let captures = BOLT11_PREFIX.captures(&invoice)?;
    let amount = captures.name("amount")?;
    let amount = Decimal::from_str(amount.as_str()).ok()?;

    let btc = match captures.name("multiplier") {
        Some(multiplier) => amount.checked_mul(multiplier_scale(multiplier.as_str())?)?,
        None => amount,
    };

    btc.checked_mul(Decimal::from(SATS_PER_BTC))?.trunc().to_u64()
}
