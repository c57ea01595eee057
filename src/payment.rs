//! The payment backend boundary.
//!
//! A backend (LND, NWC, Strike, ...) is anything that can pay a BOLT11 invoice
//! and hand back the preimage. Backends implement the async [`PaymentPort`].
//! Blocking callers go through [`BlockingPayment`], which runs the payment on a
//! dedicated worker thread with its own runtime and cancels it at a timeout,
//! so a nested runtime is never started on the calling thread.

use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use l402_types::error::{BoxError, L402Error};

/// Upper bound a blocking caller waits for a payment to complete.
pub const DEFAULT_PAYMENT_TIMEOUT: Duration = Duration::from_secs(60);

/// Extra time the caller waits for the worker to report its own timeout.
const WORKER_GRACE: Duration = Duration::from_secs(1);

/// Pays Lightning invoices.
///
/// Implementations return the payment preimage as a hex string. Errors may be
/// any error type; returning an [`L402Error`] (e.g. [`L402Error::InvoiceExpired`])
/// propagates it to the caller unchanged, anything else is reported as
/// [`L402Error::PaymentFailed`].
#[async_trait::async_trait]
pub trait PaymentPort: Send + Sync {
    async fn pay_invoice(&self, invoice: &str) -> Result<String, BoxError>;
}

#[async_trait::async_trait]
impl<T: PaymentPort + ?Sized> PaymentPort for Arc<T> {
    async fn pay_invoice(&self, invoice: &str) -> Result<String, BoxError> {
        (**self).pay_invoice(invoice).await
    }
}

/// Synchronous adapter over a [`PaymentPort`].
#[derive(Clone)]
pub struct BlockingPayment {
    port: Arc<dyn PaymentPort>,
    timeout: Duration,
}

impl BlockingPayment {
    pub fn new(port: Arc<dyn PaymentPort>) -> Self {
        Self {
            port,
            timeout: DEFAULT_PAYMENT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn port(&self) -> &Arc<dyn PaymentPort> {
        &self.port
    }

    /// Pays `invoice`, blocking the current thread until the payment completes
    /// or the timeout elapses.
    ///
    /// The payment future is dropped at the deadline, so a timed-out payment
    /// never settles afterwards.
    #[tracing::instrument(name = "l402.pay_invoice_blocking", skip_all, fields(timeout = ?self.timeout))]
    pub fn pay_invoice(&self, invoice: &str) -> Result<String, BoxError> {
        let (tx, rx) = mpsc::sync_channel(1);
        let port = Arc::clone(&self.port);
        let owned_invoice = invoice.to_string();
        let timeout = self.timeout;

        thread::Builder::new()
            .name("l402-payment".to_string())
            .spawn(move || {
                let result = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .map_err(BoxError::from)
                    .and_then(|runtime| {
                        runtime.block_on(async {
                            tokio::time::timeout(timeout, port.pay_invoice(&owned_invoice))
                                .await
                                .unwrap_or_else(|_| {
                                    tracing::warn!("Payment did not complete in time, cancelled");
                                    Err(timed_out(timeout, &owned_invoice))
                                })
                        })
                    });
                // The receiver is gone if the caller gave up first.
                let _ = tx.send(result);
            })
            .map_err(BoxError::from)?;

        // Backstop for a worker that cannot finish, e.g. a backend blocking its runtime thread.
        match rx.recv_timeout(timeout.saturating_add(WORKER_GRACE)) {
            Ok(result) => result,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                tracing::warn!("Payment worker did not return in time");
                Err(timed_out(timeout, invoice))
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(Box::new(L402Error::payment_failed(
                "payment worker exited without a result",
                invoice,
            ))),
        }
    }
}

fn timed_out(timeout: Duration, invoice: &str) -> BoxError {
    Box::new(L402Error::payment_failed(
        format!("payment timed out after {timeout:?}"),
        invoice,
    ))
}

impl std::fmt::Debug for BlockingPayment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockingPayment")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedPreimage;

    #[async_trait::async_trait]
    impl PaymentPort for FixedPreimage {
        async fn pay_invoice(&self, invoice: &str) -> Result<String, BoxError> {
            tokio::task::yield_now().await;
            Ok(format!("preimage-for-{invoice}"))
        }
    }

    struct Slow(Duration);

    #[async_trait::async_trait]
    impl PaymentPort for Slow {
        async fn pay_invoice(&self, _invoice: &str) -> Result<String, BoxError> {
            tokio::time::sleep(self.0).await;
            Ok("late".to_string())
        }
    }

    struct Failing;

    #[async_trait::async_trait]
    impl PaymentPort for Failing {
        async fn pay_invoice(&self, _invoice: &str) -> Result<String, BoxError> {
            Err("insufficient balance".into())
        }
    }

    #[test]
    fn test_blocking_pay() {
        let payment = BlockingPayment::new(Arc::new(FixedPreimage));
        assert_eq!(payment.pay_invoice("lnbc1").unwrap(), "preimage-for-lnbc1");
    }

    #[test]
    fn test_blocking_pay_propagates_error() {
        let payment = BlockingPayment::new(Arc::new(Failing));
        let error = payment.pay_invoice("lnbc1").unwrap_err();
        assert_eq!(error.to_string(), "insufficient balance");
    }

    #[test]
    fn test_blocking_pay_timeout() {
        let payment = BlockingPayment::new(Arc::new(Slow(Duration::from_secs(5))))
            .with_timeout(Duration::from_millis(50));
        let error = payment.pay_invoice("lnbc1").unwrap_err();
        match error.downcast::<L402Error>().map(|e| *e) {
            Ok(L402Error::PaymentFailed { reason, invoice, .. }) => {
                assert!(reason.contains("timed out"));
                assert_eq!(invoice.as_deref(), Some("lnbc1"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    struct SettlesLate {
        delay: Duration,
        settled: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl PaymentPort for SettlesLate {
        async fn pay_invoice(&self, _invoice: &str) -> Result<String, BoxError> {
            tokio::time::sleep(self.delay).await;
            self.settled.fetch_add(1, Ordering::SeqCst);
            Ok("late".to_string())
        }
    }

    #[test]
    fn test_timed_out_payment_never_settles() {
        let settled = Arc::new(AtomicUsize::new(0));
        let payment = BlockingPayment::new(Arc::new(SettlesLate {
            delay: Duration::from_millis(300),
            settled: Arc::clone(&settled),
        }))
        .with_timeout(Duration::from_millis(50));

        let error = payment.pay_invoice("lnbc1").unwrap_err();
        assert!(error.to_string().contains("timed out"));

        thread::sleep(Duration::from_millis(600));
        assert_eq!(settled.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_blocking_pay_from_async_context() {
        let payment = BlockingPayment::new(Arc::new(FixedPreimage));
        let preimage = tokio::task::spawn_blocking(move || payment.pay_invoice("lnbc2"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(preimage, "preimage-for-lnbc2");
    }
}
