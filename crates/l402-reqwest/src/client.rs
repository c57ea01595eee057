//! Async L402 payment handling for reqwest.
//!
//! [`L402Client`] is a `reqwest-middleware` middleware. It attaches a cached
//! credential when one exists, and on a `402 Payment Required` carrying an
//! L402 challenge it pays the invoice and retries the request once.

use http::header::{AUTHORIZATION, InvalidHeaderValue};
use http::{Extensions, HeaderValue, StatusCode};
use reqwest::{Request, Response};
use reqwest_middleware as rqm;
use std::sync::Arc;

use l402_rs::credential_cache::Credential;
use l402_rs::ledger::SpendingLedger;
use l402_rs::orchestrator::{Orchestrator, Target};
use l402_rs::payment::PaymentPort;
use l402_types::challenge::{Challenge, find_challenge};
use l402_types::config::L402Config;
use l402_types::error::L402Error;

#[cfg(feature = "telemetry")]
use tracing::{info, instrument, trace};

/// Errors surfaced by the L402 clients.
#[derive(Debug, thiserror::Error)]
pub enum L402ClientError {
    #[error(transparent)]
    L402(#[from] L402Error),
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
    /// The request body is a stream and cannot be replayed after payment.
    #[error("Request is not cloneable, cannot retry with L402 credential")]
    RequestNotCloneable,
    #[error("Invalid Authorization header value")]
    InvalidHeader(#[from] InvalidHeaderValue),
}

impl From<L402ClientError> for rqm::Error {
    fn from(error: L402ClientError) -> Self {
        match error {
            L402ClientError::Transport(e) => rqm::Error::Reqwest(e),
            other => rqm::Error::Middleware(other.into()),
        }
    }
}

/// Builds the `Authorization` header value for a credential.
pub(crate) fn authorization_value(authorization: &str) -> Result<HeaderValue, L402ClientError> {
    let mut value = HeaderValue::from_str(authorization)?;
    value.set_sensitive(true);
    Ok(value)
}

/// Reqwest middleware that pays L402 challenges.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use l402_reqwest::L402Client;
/// # use l402_rs::payment::PaymentPort;
/// # async fn run(wallet: Arc<dyn PaymentPort>) -> Result<(), Box<dyn std::error::Error>> {
/// let http = L402Client::new(wallet).into_http_client(reqwest::Client::new());
/// let response = http.get("https://api.example.com/v1/data").send().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct L402Client {
    orchestrator: Orchestrator,
    port: Arc<dyn PaymentPort>,
}

impl L402Client {
    /// Client with default budget and cache settings.
    pub fn new(port: Arc<dyn PaymentPort>) -> Self {
        Self {
            orchestrator: Orchestrator::default(),
            port,
        }
    }

    pub fn from_config(config: L402Config, port: Arc<dyn PaymentPort>) -> Self {
        Self {
            orchestrator: Orchestrator::from(config),
            port,
        }
    }

    /// Replaces budget, cache and ledger. Clients built from clones of one
    /// orchestrator share their state.
    pub fn with_orchestrator(mut self, orchestrator: Orchestrator) -> Self {
        self.orchestrator = orchestrator;
        self
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn ledger(&self) -> &Arc<SpendingLedger> {
        self.orchestrator.ledger()
    }

    /// Checks the budget, pays the invoice and stores the credential.
    ///
    /// # Errors
    ///
    /// Budget refusals and payment failures as [`L402Error`].
    #[cfg_attr(feature = "telemetry", instrument(name = "l402.reqwest.pay", skip_all, err, fields(origin = %target.origin)))]
    pub async fn pay(&self, target: Target, challenge: Challenge) -> Result<Credential, L402Error> {
        let pending = self.orchestrator.prepare(target, challenge)?;
        let outcome = self.port.pay_invoice(&pending.challenge.invoice).await;
        self.orchestrator.settle(pending, outcome)
    }
}

impl std::fmt::Debug for L402Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("L402Client")
            .field("orchestrator", &self.orchestrator)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl rqm::Middleware for L402Client {
    /// Sends the request, paying for access on an L402 challenge.
    ///
    /// A `402` without a parsable challenge is returned untouched. The retry
    /// response is returned as-is, whatever its status.
    #[cfg_attr(feature = "telemetry", instrument(name = "l402.reqwest.handle", skip_all, err))]
    async fn handle(
        &self,
        mut req: Request,
        extensions: &mut Extensions,
        next: rqm::Next<'_>,
    ) -> rqm::Result<Response> {
        let target = Target::from_url(req.url());
        if let Some(authorization) = self.orchestrator.cached_authorization(&target) {
            req.headers_mut()
                .insert(AUTHORIZATION, authorization_value(&authorization)?);
        }

        let retry_req = req.try_clone();
        let res = next.clone().run(req, extensions).await?;

        if res.status() != StatusCode::PAYMENT_REQUIRED {
            #[cfg(feature = "telemetry")]
            trace!(status = ?res.status(), "No payment required, returning response");
            return Ok(res);
        }
        let Some(challenge) = find_challenge(res.headers()) else {
            #[cfg(feature = "telemetry")]
            trace!(url = %res.url(), "402 without L402 challenge, returning response");
            return Ok(res);
        };

        #[cfg(feature = "telemetry")]
        info!(url = %res.url(), "Received L402 challenge, paying invoice");

        let mut retry = retry_req.ok_or(L402ClientError::RequestNotCloneable)?;
        let credential = self
            .pay(target, challenge)
            .await
            .map_err(L402ClientError::from)?;
        retry.headers_mut().insert(
            AUTHORIZATION,
            authorization_value(&credential.authorization_header())?,
        );

        #[cfg(feature = "telemetry")]
        trace!(url = %retry.url(), "Retrying request with L402 credential");

        next.run(retry, extensions).await
    }
}
