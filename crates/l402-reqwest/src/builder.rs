//! Wiring [`L402Client`] into reqwest.

use reqwest::{Client, ClientBuilder};
use reqwest_middleware as rqm;

use crate::client::L402Client;

impl L402Client {
    /// Middleware stack with L402 handling as its first layer. Further
    /// middlewares can be added with [`rqm::ClientBuilder::with`].
    pub fn middleware_builder(self, http: Client) -> rqm::ClientBuilder {
        rqm::ClientBuilder::new(http).with(self)
    }

    /// `http` with L402 handling and nothing else.
    pub fn into_http_client(self, http: Client) -> rqm::ClientWithMiddleware {
        self.middleware_builder(http).build()
    }
}

/// Adds L402 handling to a reqwest [`Client`] or [`ClientBuilder`].
///
/// Both yield a [`rqm::ClientBuilder`]; call `build()` on it for the final
/// client, or stack further middlewares first.
pub trait ReqwestWithL402 {
    type Output;

    fn with_l402(self, l402_client: L402Client) -> Self::Output;
}

impl ReqwestWithL402 for Client {
    type Output = rqm::ClientBuilder;

    fn with_l402(self, l402_client: L402Client) -> Self::Output {
        l402_client.middleware_builder(self)
    }
}

impl ReqwestWithL402 for ClientBuilder {
    /// Fails when the reqwest client itself cannot be built.
    type Output = Result<rqm::ClientBuilder, reqwest::Error>;

    fn with_l402(self, l402_client: L402Client) -> Self::Output {
        Ok(l402_client.middleware_builder(self.build()?))
    }
}
