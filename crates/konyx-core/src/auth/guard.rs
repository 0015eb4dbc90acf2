//! Route guarding and navigation.

use url::form_urlencoded;

use super::state::SessionPhase;
use crate::config::RoutesConfig;

/// What the guard decided for a navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    /// Session not settled yet; render nothing.
    Suspend,
    /// Navigate here instead.
    Redirect(String),
}

/// Splits `path?query` and returns the path component.
fn strip_query(path: &str) -> &str {
    path.split_once('?').map_or(path, |(path, _)| path)
}

fn login_redirect(routes: &RoutesConfig, from: &str) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("from", from)
        .finish();
    format!("{}?{query}", routes.login_path())
}

/// Decides whether `path` may render for the given session phase.
pub fn guard(path: &str, phase: &SessionPhase, routes: &RoutesConfig) -> GuardDecision {
    let path = strip_query(path);
    let protected = routes.is_protected(path);
    let login = routes.is_login(path);

    if !protected && !login {
        return GuardDecision::Allow;
    }

    match phase {
        SessionPhase::Uninitialized | SessionPhase::Loading => GuardDecision::Suspend,
        SessionPhase::Anonymous if protected => GuardDecision::Redirect(login_redirect(routes, path)),
        SessionPhase::Authenticated(_) if login => GuardDecision::Redirect(routes.default.clone()),
        _ => GuardDecision::Allow,
    }
}

/// Result of a navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    Rendered {
        path: String,
        redirected_from: Option<String>,
    },
    Suspended {
        path: String,
    },
    /// Redirect chain did not settle within one hop.
    Blocked {
        path: String,
    },
}

impl RouteOutcome {
    /// Path that ended up rendered, if any.
    pub fn rendered(&self) -> Option<&str> {
        match self {
            RouteOutcome::Rendered { path, .. } => Some(path),
            _ => None,
        }
    }
}

/// Holds the current location and runs the guard on every navigation.
#[derive(Debug, Clone)]
pub struct Router {
    routes: RoutesConfig,
    current: Option<String>,
    history: Vec<String>,
}

impl Router {
    pub fn new(routes: RoutesConfig) -> Self {
        Self {
            routes,
            current: None,
            history: Vec::new(),
        }
    }

    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Every path rendered so far, oldest first.
    pub fn history(&self) -> &[String] {
        &self.history
    }

    pub fn navigate(&mut self, path: &str, phase: &SessionPhase) -> RouteOutcome {
        let (target, redirected_from) = match guard(path, phase, &self.routes) {
            GuardDecision::Allow => (path.to_string(), None),
            GuardDecision::Suspend => {
                tracing::debug!(path, "navigation suspended until session settles");
                return RouteOutcome::Suspended {
                    path: path.to_string(),
                };
            }
            GuardDecision::Redirect(target) => match guard(&target, phase, &self.routes) {
                GuardDecision::Allow => (target, Some(path.to_string())),
                GuardDecision::Suspend => return RouteOutcome::Suspended { path: target },
                GuardDecision::Redirect(next) => {
                    tracing::warn!(path, via = %target, to = %next, "redirect loop in route table");
                    return RouteOutcome::Blocked {
                        path: path.to_string(),
                    };
                }
            },
        };

        if let Some(from) = &redirected_from {
            tracing::info!(from = %from, to = %target, "redirected");
        }
        self.current = Some(target.clone());
        self.history.push(target.clone());
        RouteOutcome::Rendered {
            path: target,
            redirected_from,
        }
    }
}
