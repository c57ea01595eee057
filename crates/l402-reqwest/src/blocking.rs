//! Blocking L402 client.
//!
//! Same flow as the async middleware, over [`reqwest::blocking::Client`].
//! Payments go through [`BlockingPayment`], which runs the async wallet on its
//! own worker thread, so this client is safe to call from plain threads.
//! Like any reqwest blocking client it must not be used from inside an async
//! runtime; use [`L402Client`](crate::L402Client) there.

use http::header::AUTHORIZATION;
use http::{Method, StatusCode};
use reqwest::IntoUrl;
use reqwest::blocking::{Body, Client, Request, Response};
use std::sync::Arc;
use std::time::Duration;

use l402_rs::credential_cache::Credential;
use l402_rs::ledger::SpendingLedger;
use l402_rs::orchestrator::{Orchestrator, Target};
use l402_rs::payment::{BlockingPayment, PaymentPort};
use l402_types::challenge::{Challenge, find_challenge};
use l402_types::config::L402Config;
use l402_types::error::L402Error;

use crate::client::{L402ClientError, authorization_value};

#[cfg(feature = "telemetry")]
use tracing::{info, instrument, trace};

/// Blocking HTTP client that pays L402 challenges.
#[derive(Debug, Clone)]
pub struct BlockingL402Client {
    http: Client,
    orchestrator: Orchestrator,
    payment: BlockingPayment,
}

impl BlockingL402Client {
    /// Client with default budget, cache and a fresh reqwest client.
    pub fn new(port: Arc<dyn PaymentPort>) -> Self {
        Self {
            http: Client::new(),
            orchestrator: Orchestrator::default(),
            payment: BlockingPayment::new(port),
        }
    }

    pub fn from_config(config: L402Config, port: Arc<dyn PaymentPort>) -> Self {
        Self::new(port).with_orchestrator(Orchestrator::from(config))
    }

    pub fn with_http_client(mut self, http: Client) -> Self {
        self.http = http;
        self
    }

    pub fn with_orchestrator(mut self, orchestrator: Orchestrator) -> Self {
        self.orchestrator = orchestrator;
        self
    }

    /// How long a single payment may take before it is reported as failed.
    pub fn with_payment_timeout(mut self, timeout: Duration) -> Self {
        self.payment = self.payment.with_timeout(timeout);
        self
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn ledger(&self) -> &Arc<SpendingLedger> {
        self.orchestrator.ledger()
    }

    pub fn get<U: IntoUrl>(&self, url: U) -> Result<Response, L402ClientError> {
        self.send(Method::GET, url, None)
    }

    pub fn head<U: IntoUrl>(&self, url: U) -> Result<Response, L402ClientError> {
        self.send(Method::HEAD, url, None)
    }

    pub fn delete<U: IntoUrl>(&self, url: U) -> Result<Response, L402ClientError> {
        self.send(Method::DELETE, url, None)
    }

    pub fn options<U: IntoUrl>(&self, url: U) -> Result<Response, L402ClientError> {
        self.send(Method::OPTIONS, url, None)
    }

    pub fn post<U: IntoUrl, B: Into<Body>>(&self, url: U, body: B) -> Result<Response, L402ClientError> {
        self.send(Method::POST, url, Some(body.into()))
    }

    pub fn put<U: IntoUrl, B: Into<Body>>(&self, url: U, body: B) -> Result<Response, L402ClientError> {
        self.send(Method::PUT, url, Some(body.into()))
    }

    pub fn patch<U: IntoUrl, B: Into<Body>>(&self, url: U, body: B) -> Result<Response, L402ClientError> {
        self.send(Method::PATCH, url, Some(body.into()))
    }

    fn send<U: IntoUrl>(&self, method: Method, url: U, body: Option<Body>) -> Result<Response, L402ClientError> {
        let mut builder = self.http.request(method, url);
        if let Some(body) = body {
            builder = builder.body(body);
        }
        self.execute(builder.build()?)
    }

    /// Sends `request`, paying for access on an L402 challenge and retrying once.
    ///
    /// # Errors
    ///
    /// Transport failures, budget refusals, payment failures, and
    /// [`L402ClientError::RequestNotCloneable`] when a streamed body would
    /// have to be replayed.
    #[cfg_attr(feature = "telemetry", instrument(name = "l402.reqwest.blocking.execute", skip_all, err))]
    pub fn execute(&self, mut request: Request) -> Result<Response, L402ClientError> {
        let target = Target::from_url(request.url());
        if let Some(authorization) = self.orchestrator.cached_authorization(&target) {
            request
                .headers_mut()
                .insert(AUTHORIZATION, authorization_value(&authorization)?);
        }

        let retry_request = request.try_clone();
        let response = self.http.execute(request)?;

        if response.status() != StatusCode::PAYMENT_REQUIRED {
            #[cfg(feature = "telemetry")]
            trace!(status = ?response.status(), "No payment required, returning response");
            return Ok(response);
        }
        let Some(challenge) = find_challenge(response.headers()) else {
            #[cfg(feature = "telemetry")]
            trace!(url = %response.url(), "402 without L402 challenge, returning response");
            return Ok(response);
        };

        #[cfg(feature = "telemetry")]
        info!(url = %response.url(), "Received L402 challenge, paying invoice");

        let mut retry = retry_request.ok_or(L402ClientError::RequestNotCloneable)?;
        let credential = self.pay(target, challenge)?;
        retry.headers_mut().insert(
            AUTHORIZATION,
            authorization_value(&credential.authorization_header())?,
        );

        #[cfg(feature = "telemetry")]
        trace!(url = %retry.url(), "Retrying request with L402 credential");

        Ok(self.http.execute(retry)?)
    }

    /// Checks the budget, pays the invoice and stores the credential.
    ///
    /// # Errors
    ///
    /// Budget refusals and payment failures as [`L402Error`].
    pub fn pay(&self, target: Target, challenge: Challenge) -> Result<Credential, L402Error> {
        let pending = self.orchestrator.prepare(target, challenge)?;
        let outcome = self.payment.pay_invoice(&pending.challenge.invoice);
        self.orchestrator.settle(pending, outcome)
    }
}
