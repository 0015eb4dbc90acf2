//! Stored-token verification against `/auth/verify`.

use futures_util::future::BoxFuture;
use reqwest::Method;
use serde::Deserialize;

use crate::api::ApiClient;

pub const VERIFY_PATH: &str = "/auth/verify";

/// Outcome of a verification round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct Verification {
    #[serde(default)]
    pub valid: bool,
}

impl Verification {
    pub const INVALID: Verification = Verification { valid: false };
    pub const VALID: Verification = Verification { valid: true };
}

/// Confirms that a stored token is still accepted.
///
/// Implementations never fail: anything other than an explicit
/// `{valid: true}` counts as invalid.
pub trait SessionVerifier: Send + Sync {
    fn verify<'a>(&'a self, token: &'a str) -> BoxFuture<'a, Verification>;
}

/// Verifier backed by the REST endpoint.
#[derive(Debug, Clone)]
pub struct HttpVerifier {
    client: ApiClient,
}

impl HttpVerifier {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    async fn check(&self, token: &str) -> Verification {
        let builder = match self.client.authed(Method::GET, VERIFY_PATH, token) {
            Ok(builder) => builder,
            Err(_) => return Verification::INVALID,
        };

        match ApiClient::send_json::<Verification>(builder).await {
            Ok(verification) => verification,
            Err(err) => {
                tracing::info!(kind = %err.kind, "session verification failed: {err}");
                Verification::INVALID
            }
        }
    }
}

impl SessionVerifier for HttpVerifier {
    fn verify<'a>(&'a self, token: &'a str) -> BoxFuture<'a, Verification> {
        Box::pin(self.check(token))
    }
}
