//! CLI command handlers.

pub mod admin;
pub mod auth;
pub mod companies;
pub mod config;
pub mod export;
pub mod session;

use anyhow::{Result, bail};
use konyx_core::app::AppContext;
use konyx_core::auth::RouteOutcome;

/// Settles the session and enters a protected view.
///
/// Returns the bearer token for the calls the view makes.
pub async fn enter(app: &AppContext, path: &str) -> Result<String> {
    app.start().await;
    match app.navigate(path) {
        RouteOutcome::Rendered {
            redirected_from: None,
            ..
        } => Ok(app.require_token()?),
        RouteOutcome::Rendered { .. } => bail!("Not logged in. Run `konyx login` first."),
        RouteOutcome::Suspended { path } | RouteOutcome::Blocked { path } => {
            bail!("Cannot open {path}: session not available")
        }
    }
}
