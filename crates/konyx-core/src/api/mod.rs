//! REST client for the Konyx backend.
//!
//! One `reqwest::Client` is shared by every call. Authenticated requests
//! carry `Authorization: Bearer <token>`; invoice requests also carry the
//! selected company as `X-Company`.

mod error;
mod types;

use std::time::Duration;

use anyhow::Result;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;

pub use error::{ApiError, ApiErrorKind, ApiResult, extract_detail};
pub(crate) use error::classify_reqwest_error;
pub use types::{AdminStatus, ApiKeysUpdate, Company, Invoice};
use types::UpdateAck;

use crate::config::Config;

/// Standard User-Agent header for Konyx requests.
pub const USER_AGENT: &str = concat!("konyx/", env!("CARGO_PKG_VERSION"));

/// Header the backend uses to pick the active company.
pub const COMPANY_HEADER: &str = "X-Company";

/// Konyx backend client.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    timeout: Option<Duration>,
    http: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, timeout: Option<Duration>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            timeout,
            http: reqwest::Client::new(),
        }
    }

    /// Builds a client from the resolved backend URL and timeout.
    ///
    /// # Errors
    /// Returns an error if the configured backend URL is invalid.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(config.backend_url()?, config.timeout()))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Plain request with the per-request timeout applied.
    pub(crate) fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.request_url(method, &self.url(path))
    }

    /// Like [`Self::request`] for a URL that was already assembled.
    pub(crate) fn request_url(&self, method: Method, url: &str) -> RequestBuilder {
        tracing::debug!(%method, url, "backend request");
        let builder = self
            .http
            .request(method, url)
            .header(reqwest::header::USER_AGENT, USER_AGENT);
        match self.timeout {
            Some(timeout) => builder.timeout(timeout),
            None => builder,
        }
    }

    /// Long-lived event-stream request; no overall timeout.
    pub(crate) fn stream_request(&self, path: &str) -> RequestBuilder {
        tracing::debug!(path, "opening event stream");
        self.http
            .get(self.url(path))
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .header(reqwest::header::ACCEPT, "text/event-stream")
    }

    /// Request carrying the bearer token. Refuses to build one without a token.
    pub(crate) fn authed(
        &self,
        method: Method,
        path: &str,
        token: &str,
    ) -> ApiResult<RequestBuilder> {
        let token = token.trim();
        if token.is_empty() {
            return Err(ApiError::not_authenticated());
        }
        Ok(self.request(method, path).bearer_auth(token))
    }

    /// Sends a request and turns non-2xx answers into errors.
    pub(crate) async fn send(builder: RequestBuilder) -> ApiResult<Response> {
        let response = builder
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::http_status(status.as_u16(), &body));
        }
        Ok(response)
    }

    pub(crate) async fn send_json<T: DeserializeOwned>(builder: RequestBuilder) -> ApiResult<T> {
        let response = Self::send(builder).await?;
        let body = response
            .text()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;
        serde_json::from_str(&body)
            .map_err(|e| ApiError::parse(format!("Unexpected response body: {e}")))
    }

    /// `GET /companies`
    ///
    /// # Errors
    /// Returns an error if no token is held, the request fails, or the body is malformed.
    pub async fn companies(&self, token: &str) -> ApiResult<Vec<Company>> {
        let builder = self.authed(Method::GET, "/companies", token)?;
        Self::send_json(builder).await
    }

    /// `GET /invoices`, scoped to `company` through `X-Company`.
    ///
    /// # Errors
    /// Returns an error if no token is held, the request fails, or the body is malformed.
    pub async fn invoices(&self, token: &str, company: Option<&str>) -> ApiResult<Vec<Invoice>> {
        let mut builder = self.authed(Method::GET, "/invoices", token)?;
        if let Some(company) = company.map(str::trim).filter(|c| !c.is_empty()) {
            builder = builder.header(COMPANY_HEADER, company);
        }
        Self::send_json(builder).await
    }

    /// `GET /auth/status`
    ///
    /// # Errors
    /// Returns an error if no token is held, the request fails, or the body is malformed.
    pub async fn admin_status(&self, token: &str) -> ApiResult<AdminStatus> {
        let builder = self.authed(Method::GET, "/auth/status", token)?;
        Self::send_json(builder).await
    }

    /// Rotates the backend password.
    ///
    /// Both entries must be non-empty and equal; nothing is sent otherwise.
    ///
    /// # Errors
    /// Returns an error if validation fails, no token is held, or the request fails.
    pub async fn update_password(
        &self,
        token: &str,
        new_password: &str,
        confirm: &str,
    ) -> ApiResult<String> {
        check_new_password(new_password, confirm)?;

        let builder = self
            .authed(Method::POST, "/auth/update_password", token)?
            .json(&serde_json::json!({ "password": new_password }));
        let ack: UpdateAck = Self::send_json(builder).await?;
        tracing::info!("backend password rotated");
        Ok(ack.into_message("Password updated"))
    }

    /// Rotates one or more integration API keys.
    ///
    /// # Errors
    /// Returns an error if no key is given, no token is held, or the request fails.
    pub async fn update_api_keys(&self, token: &str, update: &ApiKeysUpdate) -> ApiResult<String> {
        if update.is_empty() {
            return Err(ApiError::invalid("No API key given"));
        }

        let builder = self
            .authed(Method::POST, "/auth/update_apis", token)?
            .json(update);
        let ack: UpdateAck = Self::send_json(builder).await?;
        tracing::info!("integration API keys rotated");
        Ok(ack.into_message("API keys updated"))
    }
}

/// Client-side check run before a password rotation is sent.
///
/// # Errors
/// Returns an `Invalid` error when the password is blank or the
/// confirmation differs.
pub fn check_new_password(new_password: &str, confirm: &str) -> ApiResult<()> {
    if new_password.trim().is_empty() {
        return Err(ApiError::invalid("New password cannot be empty"));
    }
    if new_password != confirm {
        return Err(ApiError::invalid("Passwords do not match"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[tokio::test]
    async fn test_companies_sends_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/companies"))
            .and(header("authorization", "Bearer abc123"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([{"id": "k", "name": "Kissoro"}])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = ApiClient::new(server.uri(), None);
        let companies = client.companies("abc123").await.unwrap();
        assert_eq!(
            companies,
            vec![Company {
                id: "k".to_string(),
                name: "Kissoro".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_invoices_carries_company_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/invoices"))
            .and(header("x-company", "k"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([{"id": 1, "number": "F2501", "total": 120.5}])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = ApiClient::new(server.uri(), None);
        let invoices = client.invoices("abc123", Some("k")).await.unwrap();
        assert_eq!(invoices.len(), 1);
        assert_eq!(invoices[0].number, "F2501");
        assert!((invoices[0].total - 120.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_empty_token_never_reaches_server() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = ApiClient::new(server.uri(), None);
        let err = client.companies("  ").await.unwrap_err();
        assert_eq!(err.kind, ApiErrorKind::NotAuthenticated);
    }

    #[tokio::test]
    async fn test_password_mismatch_is_rejected_locally() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = ApiClient::new(server.uri(), None);
        let err = client
            .update_password("abc123", "new-secret", "typo")
            .await
            .unwrap_err();
        assert_eq!(err.kind, ApiErrorKind::Invalid);
        assert_eq!(err.to_string(), "Passwords do not match");
    }

    #[tokio::test]
    async fn test_update_password_posts_new_value() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/update_password"))
            .and(body_json(json!({"password": "s3cret"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                json!({"message": "Contraseña actualizada correctamente", "password": "s3cret"}),
            ))
            .expect(1)
            .mount(&server)
            .await;

        let client = ApiClient::new(server.uri(), None);
        let message = client
            .update_password("abc123", "s3cret", "s3cret")
            .await
            .unwrap();
        assert_eq!(message, "Contraseña actualizada correctamente");
    }

    #[tokio::test]
    async fn test_update_api_keys_sends_only_given_keys() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/update_apis"))
            .and(body_json(json!({"apiKissoro": "k-2"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"apiKissoro": "k-2"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = ApiClient::new(server.uri(), None);
        let update = ApiKeysUpdate {
            api_kissoro: Some("k-2".to_string()),
            ..ApiKeysUpdate::default()
        };
        let message = client.update_api_keys("abc123", &update).await.unwrap();
        assert_eq!(message, "API keys updated");
    }

    #[tokio::test]
    async fn test_server_error_carries_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/status"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let client = ApiClient::new(server.uri(), None);
        let err = client.admin_status("abc123").await.unwrap_err();
        assert_eq!(err.kind, ApiErrorKind::HttpStatus);
        assert_eq!(err.status, Some(500));
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_network_error() {
        // Port 9 (discard) on localhost is closed in test environments.
        let client = ApiClient::new("http://127.0.0.1:9", Some(Duration::from_secs(2)));
        let err = client.companies("abc123").await.unwrap_err();
        assert!(err.is_network(), "unexpected kind: {}", err.kind);
    }
}
