//! Transport-independent steps of the L402 request flow.
//!
//! A client variant drives the flow like this:
//!
//! 1. [`Orchestrator::cached_authorization`] before the first send.
//! 2. Send. Anything but a `402` carrying an L402 challenge is returned as-is.
//! 3. [`Orchestrator::prepare`] checks the invoice against the budget.
//! 4. Pay the invoice (async or blocking, depending on the variant).
//! 5. [`Orchestrator::settle`] records the outcome and caches the credential.
//! 6. Retry once with the returned credential's `Authorization` header.
//!
//! At most one payment is made per request.

use std::sync::Arc;
use url::Url;

use l402_types::challenge::Challenge;
use l402_types::config::L402Config;
use l402_types::error::{BoxError, L402Error};
use l402_types::invoice::extract_amount_sats;

use crate::budget::BudgetController;
use crate::credential_cache::{Credential, CredentialCache};
use crate::ledger::SpendingLedger;

/// Where a request goes, as far as budgets and credentials are concerned.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    /// Lowercased host, without scheme or port.
    pub origin: String,
    pub path: String,
}

impl Target {
    pub fn new(origin: &str, path: &str) -> Self {
        Self {
            origin: origin.to_lowercase(),
            path: path.to_string(),
        }
    }

    pub fn from_url(url: &Url) -> Self {
        Self::new(url.host_str().unwrap_or_default(), url.path())
    }
}

/// A payment that passed the budget check and has yet to be made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingPayment {
    pub target: Target,
    pub challenge: Challenge,
    /// `None` for any-amount invoices.
    pub amount_sats: Option<u64>,
}

/// Budget, credential cache and ledger shared by all requests of one client.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    budget: Option<Arc<BudgetController>>,
    cache: Arc<CredentialCache>,
    ledger: Arc<SpendingLedger>,
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self {
            budget: Some(Arc::new(BudgetController::default())),
            cache: Arc::new(CredentialCache::default()),
            ledger: Arc::new(SpendingLedger::new()),
        }
    }
}

impl From<L402Config> for Orchestrator {
    fn from(config: L402Config) -> Self {
        Self {
            budget: config.budget.map(|b| Arc::new(BudgetController::new(b))),
            cache: Arc::new(CredentialCache::from(config.cache)),
            ledger: Arc::new(SpendingLedger::new()),
        }
    }
}

impl Orchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_budget(mut self, budget: impl Into<Arc<BudgetController>>) -> Self {
        self.budget = Some(budget.into());
        self
    }

    /// Disables spending limits and the domain allow-list.
    pub fn without_budget(mut self) -> Self {
        self.budget = None;
        self
    }

    pub fn with_cache(mut self, cache: impl Into<Arc<CredentialCache>>) -> Self {
        self.cache = cache.into();
        self
    }

    pub fn with_ledger(mut self, ledger: Arc<SpendingLedger>) -> Self {
        self.ledger = ledger;
        self
    }

    pub fn budget(&self) -> Option<&Arc<BudgetController>> {
        self.budget.as_ref()
    }

    pub fn cache(&self) -> &Arc<CredentialCache> {
        &self.cache
    }

    pub fn ledger(&self) -> &Arc<SpendingLedger> {
        &self.ledger
    }

    /// The `Authorization` value of a live cached credential for `target`, if any.
    pub fn cached_authorization(&self, target: &Target) -> Option<String> {
        let credential = self.cache.get(&target.origin, &target.path)?;
        tracing::debug!(origin = %target.origin, path = %target.path, "Using cached L402 credential");
        Some(credential.authorization_header())
    }

    /// Checks `challenge` against the budget before paying.
    ///
    /// Invoices without an amount cannot be checked and are let through.
    ///
    /// # Errors
    ///
    /// [`L402Error::DomainNotAllowed`] or [`L402Error::BudgetExceeded`].
    pub fn prepare(&self, target: Target, challenge: Challenge) -> Result<PendingPayment, L402Error> {
        let amount_sats = extract_amount_sats(&challenge.invoice);
        match (amount_sats, &self.budget) {
            (Some(amount), Some(budget)) => {
                if let Err(error) = budget.check(amount, &target.origin) {
                    tracing::warn!(origin = %target.origin, path = %target.path, amount_sats = amount, %error, "L402 payment refused");
                    return Err(error);
                }
            }
            (None, Some(_)) => {
                tracing::warn!(origin = %target.origin, path = %target.path, "Invoice has no amount, skipping budget check");
            }
            (_, None) => {}
        }
        tracing::debug!(origin = %target.origin, path = %target.path, amount_sats, "Paying L402 invoice");
        Ok(PendingPayment {
            target,
            challenge,
            amount_sats,
        })
    }

    /// Records the outcome of a payment and caches the resulting credential.
    ///
    /// An empty preimage counts as a failed payment.
    ///
    /// # Errors
    ///
    /// An [`L402Error`] returned by the backend is passed through unchanged;
    /// any other failure becomes [`L402Error::PaymentFailed`].
    pub fn settle(
        &self,
        pending: PendingPayment,
        outcome: Result<String, BoxError>,
    ) -> Result<Credential, L402Error> {
        let PendingPayment {
            target,
            challenge,
            amount_sats,
        } = pending;

        let outcome = outcome.and_then(|preimage| {
            if preimage.trim().is_empty() {
                Err(Box::new(L402Error::payment_failed(
                    "wallet returned an empty preimage",
                    challenge.invoice.as_str(),
                )) as BoxError)
            } else {
                Ok(preimage)
            }
        });

        let preimage = match outcome {
            Ok(preimage) => preimage,
            Err(error) => {
                if let Some(amount) = amount_sats {
                    self.ledger
                        .record(&target.origin, &target.path, amount, "", false);
                }
                let error = L402Error::from_payment_error(error, &challenge.invoice);
                tracing::warn!(origin = %target.origin, path = %target.path, %error, "L402 payment failed");
                return Err(error);
            }
        };

        if let Some(amount) = amount_sats {
            if let Some(budget) = &self.budget {
                budget.record_payment(amount);
            }
            self.ledger
                .record(&target.origin, &target.path, amount, &preimage, true);
        }
        tracing::info!(origin = %target.origin, path = %target.path, amount_sats, "L402 payment succeeded");

        Ok(self.cache.put(
            &target.origin,
            &target.path,
            &challenge.macaroon,
            &preimage,
            None,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use l402_types::config::BudgetConfig;
    use l402_types::error::BudgetLimit;

    // 10u BTC = 1000 sats.
    const INVOICE_1000: &str = "lnbc10u1pjexampleinvoice";

    fn challenge(invoice: &str) -> Challenge {
        Challenge {
            macaroon: "mac".to_string(),
            invoice: invoice.to_string(),
        }
    }

    fn target() -> Target {
        Target::new("API.example.com", "/v1/data/items")
    }

    #[test]
    fn test_target_from_url() {
        let url = Url::parse("https://API.Example.com:8443/v1/data?x=1").unwrap();
        let target = Target::from_url(&url);
        assert_eq!(target.origin, "api.example.com");
        assert_eq!(target.path, "/v1/data");
    }

    #[test]
    fn test_successful_payment_is_recorded_and_cached() {
        let orchestrator = Orchestrator::new();
        assert_eq!(orchestrator.cached_authorization(&target()), None);

        let pending = orchestrator.prepare(target(), challenge(INVOICE_1000)).unwrap();
        assert_eq!(pending.amount_sats, Some(1_000));
        let credential = orchestrator.settle(pending, Ok("ab12".to_string())).unwrap();
        assert_eq!(credential.authorization_header(), "L402 mac:ab12");

        let records = orchestrator.ledger().records();
        assert_eq!(records.len(), 1);
        assert!(records[0].success);
        assert_eq!(records[0].amount_sats, 1_000);
        assert_eq!(records[0].origin, "api.example.com");
        assert_eq!(orchestrator.budget().unwrap().spent_last_hour(), 1_000);

        let sibling = Target::new("api.example.com", "/v1/data/other");
        assert_eq!(
            orchestrator.cached_authorization(&sibling).as_deref(),
            Some("L402 mac:ab12")
        );
    }

    #[test]
    fn test_budget_refusal() {
        let orchestrator = Orchestrator::new().with_budget(BudgetController::new(BudgetConfig {
            max_sats_per_request: 500,
            ..BudgetConfig::default()
        }));
        match orchestrator.prepare(target(), challenge(INVOICE_1000)) {
            Err(L402Error::BudgetExceeded { kind, requested, .. }) => {
                assert_eq!(kind, BudgetLimit::PerRequest);
                assert_eq!(requested, 1_000);
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert!(orchestrator.ledger().is_empty());
    }

    #[test]
    fn test_any_amount_invoice_skips_budget() {
        let orchestrator = Orchestrator::new().with_budget(BudgetController::new(BudgetConfig {
            max_sats_per_request: 1,
            ..BudgetConfig::default()
        }));
        let pending = orchestrator.prepare(target(), challenge("lnbc1pjanyamount")).unwrap();
        assert_eq!(pending.amount_sats, None);
        orchestrator.settle(pending, Ok("ff".to_string())).unwrap();
        assert!(orchestrator.ledger().is_empty());
        assert_eq!(orchestrator.cache().len(), 1);
    }

    #[test]
    fn test_without_budget() {
        let orchestrator = Orchestrator::new().without_budget();
        assert!(orchestrator.budget().is_none());
        let pending = orchestrator
            .prepare(target(), challenge("lnbc1m1pjbig"))
            .unwrap();
        assert_eq!(pending.amount_sats, Some(100_000));
    }

    #[test]
    fn test_failed_payment_is_recorded() {
        let orchestrator = Orchestrator::new();
        let pending = orchestrator.prepare(target(), challenge(INVOICE_1000)).unwrap();
        let error = orchestrator
            .settle(pending, Err("route not found".into()))
            .unwrap_err();
        match error {
            L402Error::PaymentFailed { invoice, .. } => {
                assert_eq!(invoice.as_deref(), Some(INVOICE_1000))
            }
            other => panic!("unexpected: {other:?}"),
        }
        let records = orchestrator.ledger().records();
        assert_eq!(records.len(), 1);
        assert!(!records[0].success);
        assert_eq!(records[0].preimage, "");
        assert_eq!(orchestrator.budget().unwrap().spent_last_hour(), 0);
        assert!(orchestrator.cache().is_empty());
    }

    #[test]
    fn test_backend_l402_error_passes_through() {
        let orchestrator = Orchestrator::new();
        let pending = orchestrator.prepare(target(), challenge(INVOICE_1000)).unwrap();
        let error = orchestrator
            .settle(
                pending,
                Err(Box::new(L402Error::InvoiceExpired {
                    invoice: Some(INVOICE_1000.to_string()),
                })),
            )
            .unwrap_err();
        assert!(matches!(error, L402Error::InvoiceExpired { .. }));
    }

    #[test]
    fn test_empty_preimage_is_failure() {
        let orchestrator = Orchestrator::new();
        let pending = orchestrator.prepare(target(), challenge(INVOICE_1000)).unwrap();
        let error = orchestrator.settle(pending, Ok(String::new())).unwrap_err();
        assert!(matches!(error, L402Error::PaymentFailed { .. }));
        assert!(!orchestrator.ledger().records()[0].success);
        assert!(orchestrator.cache().is_empty());
    }

    #[test]
    fn test_from_config_without_budget() {
        let config = L402Config::from_json(r#"{"budget": null, "cache": {"maxSize": 2}}"#).unwrap();
        let orchestrator = Orchestrator::from(config);
        assert!(orchestrator.budget().is_none());
        assert_eq!(orchestrator.cache().max_size(), 2);
    }
}
