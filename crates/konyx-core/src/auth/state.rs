//! Auth state provider.
//!
//! Owns the session phase and is the only writer of the token store.
//! Startup verification is tagged with a generation so that an explicit
//! `set_token` issued while it is in flight always wins.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::Result;
use tokio::sync::watch;

use super::generation::VerificationGate;
use super::token_store::TokenStore;
use super::verifier::SessionVerifier;
use crate::logging::mask_token;

/// Where the session currently stands.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionPhase {
    /// Provider created, storage not read yet
    #[default]
    Uninitialized,
    /// Stored token found, verification in flight
    Loading,
    Authenticated(String),
    Anonymous,
}

impl SessionPhase {
    pub fn token(&self) -> Option<&str> {
        match self {
            SessionPhase::Authenticated(token) => Some(token),
            _ => None,
        }
    }

    /// True until a decision has been reached.
    pub fn is_loading(&self) -> bool {
        matches!(self, SessionPhase::Uninitialized | SessionPhase::Loading)
    }

    pub fn label(&self) -> &'static str {
        match self {
            SessionPhase::Uninitialized => "uninitialized",
            SessionPhase::Loading => "loading",
            SessionPhase::Authenticated(_) => "authenticated",
            SessionPhase::Anonymous => "anonymous",
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    phase: SessionPhase,
    verification: VerificationGate,
    closed: bool,
}

pub struct AuthProvider {
    store: Box<dyn TokenStore>,
    verifier: Option<Arc<dyn SessionVerifier>>,
    inner: Mutex<Inner>,
    phase_tx: watch::Sender<SessionPhase>,
}

impl AuthProvider {
    /// Creates a provider. Without a verifier, stored tokens are trusted as-is.
    pub fn new(store: Box<dyn TokenStore>, verifier: Option<Arc<dyn SessionVerifier>>) -> Self {
        let (phase_tx, _) = watch::channel(SessionPhase::Uninitialized);
        Self {
            store,
            verifier,
            inner: Mutex::new(Inner::default()),
            phase_tx,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn transition(&self, inner: &mut Inner, phase: SessionPhase) {
        if inner.phase != phase {
            tracing::info!(from = inner.phase.label(), to = phase.label(), "session transition");
        }
        inner.phase = phase.clone();
        self.phase_tx.send_replace(phase);
    }

    /// Reads the stored token and settles the session.
    ///
    /// Never fails: unreadable storage, an invalid token and an unreachable
    /// verifier all end in `Anonymous`.
    pub async fn bootstrap(&self) -> SessionPhase {
        let stored = match self.store.read() {
            Ok(token) => token.filter(|t| !t.trim().is_empty()),
            Err(err) => {
                tracing::warn!("failed to read stored session: {err:#}");
                None
            }
        };

        let Some(token) = stored else {
            let mut inner = self.lock();
            if !inner.closed && inner.phase == SessionPhase::Uninitialized {
                self.transition(&mut inner, SessionPhase::Anonymous);
            }
            return inner.phase.clone();
        };

        let Some(verifier) = self.verifier.clone() else {
            let mut inner = self.lock();
            if !inner.closed && inner.phase == SessionPhase::Uninitialized {
                self.transition(&mut inner, SessionPhase::Authenticated(token));
            }
            return inner.phase.clone();
        };

        let generation = {
            let mut inner = self.lock();
            if inner.closed || inner.phase != SessionPhase::Uninitialized {
                return inner.phase.clone();
            }
            let generation = inner.verification.issue();
            self.transition(&mut inner, SessionPhase::Loading);
            generation
        };

        tracing::debug!(token = %mask_token(&token), "verifying stored session");
        let verification = verifier.verify(&token).await;

        let mut inner = self.lock();
        if inner.closed || !inner.verification.settle(generation) {
            tracing::debug!("discarding stale session verification");
            return inner.phase.clone();
        }

        if verification.valid {
            self.transition(&mut inner, SessionPhase::Authenticated(token));
        } else {
            if let Err(err) = self.store.write(None) {
                tracing::warn!("failed to clear rejected session: {err:#}");
            }
            self.transition(&mut inner, SessionPhase::Anonymous);
        }
        inner.phase.clone()
    }

    /// Replaces the session token, or clears it with `None`.
    ///
    /// Any verification still in flight is retired once the store accepts
    /// the write.
    ///
    /// # Errors
    /// Returns an error if the token store cannot be written. The phase and
    /// any in-flight verification are left as they were.
    pub fn set_token(&self, token: Option<&str>) -> Result<()> {
        let mut inner = self.lock();
        self.replace_token(&mut inner, token)
    }

    /// Like [`set_token`](Self::set_token), but does nothing once the
    /// provider is closed. Returns whether the token was applied.
    ///
    /// # Errors
    /// Returns an error if the token store cannot be written.
    pub fn set_token_if_open(&self, token: Option<&str>) -> Result<bool> {
        let mut inner = self.lock();
        if inner.closed {
            tracing::debug!("provider closed, dropping token update");
            return Ok(false);
        }
        self.replace_token(&mut inner, token)?;
        Ok(true)
    }

    fn replace_token(&self, inner: &mut Inner, token: Option<&str>) -> Result<()> {
        let token = token.map(str::trim).filter(|t| !t.is_empty());
        self.store.write(token)?;
        inner.verification.retire();

        let phase = match token {
            Some(token) => SessionPhase::Authenticated(token.to_string()),
            None => SessionPhase::Anonymous,
        };
        self.transition(inner, phase);
        Ok(())
    }

    /// Clears the session.
    ///
    /// # Errors
    /// Returns an error if the token store cannot be cleared.
    pub fn logout(&self) -> Result<()> {
        self.set_token(None)
    }

    pub fn phase(&self) -> SessionPhase {
        self.lock().phase.clone()
    }

    pub fn token(&self) -> Option<String> {
        self.lock().phase.token().map(str::to_string)
    }

    pub fn is_loading(&self) -> bool {
        self.lock().phase.is_loading()
    }

    /// Receiver that observes every phase transition.
    pub fn subscribe(&self) -> watch::Receiver<SessionPhase> {
        self.phase_tx.subscribe()
    }

    /// Detaches the provider from its view. Verification results and
    /// login replies that arrive afterwards are dropped.
    pub fn close(&self) {
        let mut inner = self.lock();
        inner.closed = true;
        inner.verification.retire();
    }

    pub fn store(&self) -> &dyn TokenStore {
        self.store.as_ref()
    }
}
