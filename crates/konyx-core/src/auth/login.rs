//! Credential submission against `/auth/login`.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use reqwest::Method;
use serde_json::{Value, json};

use super::state::AuthProvider;
use crate::api::{ApiClient, ApiError, ApiErrorKind, extract_detail};

pub const LOGIN_PATH: &str = "/auth/login";

#[derive(Clone, Default)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Both fields must be non-blank.
    ///
    /// # Errors
    /// Returns `MissingField` naming the first empty field.
    pub fn validate(&self) -> Result<(), LoginError> {
        if self.username.trim().is_empty() {
            return Err(LoginError::MissingField("username"));
        }
        if self.password.trim().is_empty() {
            return Err(LoginError::MissingField("password"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginError {
    MissingField(&'static str),
    /// 4xx answer; carries the backend's reason when it gave one
    InvalidCredentials(Option<String>),
    Unreachable(String),
    MalformedResponse(String),
    Server(String),
    /// Token accepted but could not be saved
    Storage(String),
}

impl fmt::Display for LoginError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoginError::MissingField(field) => write!(f, "{field} is required"),
            LoginError::InvalidCredentials(Some(detail)) => write!(f, "{detail}"),
            LoginError::InvalidCredentials(None) => write!(f, "invalid credentials"),
            LoginError::Unreachable(_) => write!(f, "service unreachable"),
            LoginError::MalformedResponse(_) => write!(f, "invalid login response"),
            LoginError::Server(message) => write!(f, "login failed: {message}"),
            LoginError::Storage(message) => write!(f, "could not save session: {message}"),
        }
    }
}

impl std::error::Error for LoginError {}

impl From<ApiError> for LoginError {
    fn from(err: ApiError) -> Self {
        match err.kind {
            ApiErrorKind::Timeout | ApiErrorKind::Unreachable => {
                LoginError::Unreachable(err.message)
            }
            ApiErrorKind::Parse => LoginError::MalformedResponse(err.message),
            _ if err.is_client_error() => LoginError::InvalidCredentials(
                err.details.as_deref().and_then(extract_detail),
            ),
            _ => LoginError::Server(err.message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    LoggedIn,
    /// Another submission was already in flight, or the session was
    /// closed before the reply arrived.
    Ignored,
}

/// Pulls the bearer token out of a login response body.
///
/// Accepts `{"token": ..}`, `{"access_token": ..}`, a bare JSON string,
/// or a plain-text body. Blank values never count.
pub fn extract_token(body: &str) -> Option<String> {
    let non_blank = |s: &str| {
        let s = s.trim();
        (!s.is_empty()).then(|| s.to_string())
    };

    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => ["token", "access_token"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_str).and_then(non_blank)),
        Ok(Value::String(token)) => non_blank(&token),
        Ok(_) => None,
        Err(_) => {
            let text = body.trim();
            // Reject anything that looks like a broken JSON or HTML document.
            if text.contains(char::is_whitespace) || text.starts_with(['{', '[', '<']) {
                None
            } else {
                non_blank(text)
            }
        }
    }
}

/// Clears the in-flight flag when a submission finishes, however it ends.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Login form state.
#[derive(Debug, Default)]
pub struct LoginFlow {
    in_flight: AtomicBool,
}

impl LoginFlow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_submitting(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Submits credentials and stores the returned token.
    ///
    /// # Errors
    /// Returns a `LoginError` describing why no session was established.
    /// The stored session is untouched on failure.
    pub async fn submit(
        &self,
        client: &ApiClient,
        auth: &AuthProvider,
        credentials: &Credentials,
    ) -> Result<LoginOutcome, LoginError> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("login already in flight, ignoring submit");
            return Ok(LoginOutcome::Ignored);
        }
        let _in_flight = InFlight(&self.in_flight);

        credentials.validate()?;

        let username = credentials.username.trim();
        let builder = client.request(Method::POST, LOGIN_PATH).json(&json!({
            "username": username,
            "user": username,
            "password": credentials.password,
        }));

        let response = ApiClient::send(builder).await.map_err(|err| {
            tracing::info!(kind = %err.kind, "login rejected: {err}");
            LoginError::from(err)
        })?;
        let body = response
            .text()
            .await
            .map_err(|e| LoginError::Unreachable(e.to_string()))?;

        let token = extract_token(&body)
            .ok_or_else(|| LoginError::MalformedResponse("no token in response".to_string()))?;

        let applied = auth
            .set_token_if_open(Some(&token))
            .map_err(|e| LoginError::Storage(format!("{e:#}")))?;
        if !applied {
            tracing::debug!("session closed while logging in, dropping token");
            return Ok(LoginOutcome::Ignored);
        }
        tracing::info!(user = username, "logged in");
        Ok(LoginOutcome::LoggedIn)
    }
}
