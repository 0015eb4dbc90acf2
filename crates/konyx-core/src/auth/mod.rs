//! Session lifecycle: token storage, verification, state, route guard and login.

mod generation;
pub mod guard;
pub mod login;
pub mod state;
pub mod token_store;
pub mod verifier;

pub use guard::{GuardDecision, RouteOutcome, Router, guard};
pub use login::{Credentials, LoginError, LoginFlow, LoginOutcome};
pub use state::{AuthProvider, SessionPhase};
pub use token_store::{FileTokenStore, MemoryTokenStore, TokenStore, open_store};
pub use verifier::{HttpVerifier, SessionVerifier, Verification};
