//! Application context shared by every command.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::Result;

use crate::api::{ApiClient, ApiError, ApiResult};
use crate::auth::{
    AuthProvider, Credentials, HttpVerifier, LoginError, LoginFlow, LoginOutcome, RouteOutcome,
    Router, SessionPhase, SessionVerifier, TokenStore, open_store,
};
use crate::config::Config;
use crate::export::{ExportSubscriber, ExportSubscription};

/// Owns the auth provider, router and API client for one process.
pub struct AppContext {
    config: Config,
    client: ApiClient,
    auth: AuthProvider,
    router: Mutex<Router>,
    login: LoginFlow,
}

impl AppContext {
    /// Builds the context described by `config`.
    ///
    /// # Errors
    /// Returns an error if the backend URL is invalid.
    pub fn new(config: Config) -> Result<Self> {
        let client = ApiClient::from_config(&config)?;
        let store = open_store(config.session.storage);
        let verifier: Option<Arc<dyn SessionVerifier>> = config
            .session
            .verify
            .then(|| Arc::new(HttpVerifier::new(client.clone())) as Arc<dyn SessionVerifier>);
        Ok(Self::with_parts(config, client, store, verifier))
    }

    pub fn with_parts(
        config: Config,
        client: ApiClient,
        store: Box<dyn TokenStore>,
        verifier: Option<Arc<dyn SessionVerifier>>,
    ) -> Self {
        let router = Router::new(config.routes.clone());
        Self {
            config,
            client,
            auth: AuthProvider::new(store, verifier),
            router: Mutex::new(router),
            login: LoginFlow::new(),
        }
    }

    /// Settles the session from storage.
    pub async fn start(&self) -> SessionPhase {
        self.auth.bootstrap().await
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn auth(&self) -> &AuthProvider {
        &self.auth
    }

    /// Selected company, sent as `X-Company` on invoice requests.
    pub fn company(&self) -> Option<&str> {
        self.config
            .company
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }

    fn router(&self) -> MutexGuard<'_, Router> {
        self.router.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Navigates through the route guard using the current session phase.
    pub fn navigate(&self, path: &str) -> RouteOutcome {
        let phase = self.auth.phase();
        self.router().navigate(path, &phase)
    }

    pub fn history(&self) -> Vec<String> {
        self.router().history().to_vec()
    }

    /// Logs in and lands on the default protected view, unless the guard
    /// already put us there.
    ///
    /// # Errors
    /// Returns the login failure; session and location are unchanged then.
    pub async fn login(&self, credentials: &Credentials) -> Result<LoginOutcome, LoginError> {
        let outcome = self
            .login
            .submit(&self.client, &self.auth, credentials)
            .await?;
        let default = self.config.routes.default.as_str();
        if outcome == LoginOutcome::LoggedIn && self.router().current() != Some(default) {
            self.navigate(default);
        }
        Ok(outcome)
    }

    /// Clears the session and returns to the login view.
    ///
    /// # Errors
    /// Returns an error if the stored session cannot be removed.
    pub fn logout(&self) -> Result<RouteOutcome> {
        self.auth.logout()?;
        let login = self.config.routes.login_path().to_string();
        Ok(self.navigate(&login))
    }

    /// Token for an authenticated call.
    ///
    /// # Errors
    /// Returns `NotAuthenticated` when no session is held.
    pub fn require_token(&self) -> ApiResult<String> {
        self.auth.token().ok_or_else(ApiError::not_authenticated)
    }

    pub fn mount_export(&self) -> ExportSubscription {
        ExportSubscriber::new(self.client.clone()).mount()
    }
}
