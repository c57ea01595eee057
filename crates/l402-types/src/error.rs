//! Error taxonomy for L402 payment handling.
//!
//! Every failure the payment flow can produce on its own is a variant of
//! [`L402Error`]. Transport failures stay with the HTTP client crate.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::{Display, Formatter};

/// Boxed error type used at the payment backend boundary.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Which spending ceiling a payment would break.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetLimit {
    PerRequest,
    PerHour,
    PerDay,
}

impl Display for BudgetLimit {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            BudgetLimit::PerRequest => write!(f, "per_request"),
            BudgetLimit::PerHour => write!(f, "per_hour"),
            BudgetLimit::PerDay => write!(f, "per_day"),
        }
    }
}

/// Errors raised while handling an L402 challenge.
#[derive(Debug, thiserror::Error)]
pub enum L402Error {
    /// The `WWW-Authenticate` value is absent, empty, or not an L402/LSAT challenge.
    #[error("Failed to parse L402 challenge: {reason}")]
    ChallengeParse { header: String, reason: String },
    /// The origin is not on the configured allow-list.
    #[error("Domain not in allowed list: {origin}")]
    DomainNotAllowed { origin: String },
    /// Paying the invoice would exceed a configured ceiling.
    ///
    /// `current` is what was already spent inside the window, `requested` is the
    /// invoice amount. Both are in satoshis.
    #[error(
        "Budget exceeded: {kind} limit is {limit} sats, already spent {current} sats, invoice requires {requested} sats"
    )]
    BudgetExceeded {
        kind: BudgetLimit,
        limit: u64,
        current: u64,
        requested: u64,
    },
    /// The payment backend failed or returned an unusable result.
    #[error("Payment failed: {reason}")]
    PaymentFailed {
        reason: String,
        invoice: Option<String>,
        #[source]
        source: Option<BoxError>,
    },
    /// The invoice expired before it could be paid.
    #[error("Invoice has expired")]
    InvoiceExpired { invoice: Option<String> },
    /// No payment backend could be resolved from configuration or environment.
    #[error(
        "No wallet configured. Set environment variables for one of: STRIKE_API_KEY, OPENNODE_API_KEY, NWC_CONNECTION_STRING, LND_REST_HOST + LND_MACAROON_HEX"
    )]
    NoWallet,
}

impl L402Error {
    pub fn challenge_parse(header: impl Into<String>, reason: impl Into<String>) -> Self {
        L402Error::ChallengeParse {
            header: header.into(),
            reason: reason.into(),
        }
    }

    /// A payment failure without an underlying cause, e.g. an empty preimage.
    pub fn payment_failed(reason: impl Into<String>, invoice: impl Into<String>) -> Self {
        L402Error::PaymentFailed {
            reason: reason.into(),
            invoice: Some(invoice.into()),
            source: None,
        }
    }

    /// Wraps a backend error that is not already an [`L402Error`].
    pub fn payment_failed_from(source: BoxError, invoice: impl Into<String>) -> Self {
        L402Error::PaymentFailed {
            reason: source.to_string(),
            invoice: Some(invoice.into()),
            source: Some(source),
        }
    }

    /// Recovers an [`L402Error`] from a backend error, wrapping anything else as
    /// [`L402Error::PaymentFailed`].
    pub fn from_payment_error(error: BoxError, invoice: &str) -> Self {
        match error.downcast::<L402Error>() {
            Ok(own) => *own,
            Err(other) => L402Error::payment_failed_from(other, invoice),
        }
    }
}
