use anyhow::{Result, anyhow};
use std::sync::Arc;
use crate::tprintln;

use super::principal::Principal;
use super::session::{Session, SessionManager};

#[derive(Debug, Clone)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

/// Capability contract for session lifecycle. The HTTP layer only ever talks
/// to this trait, so tests can substitute a fake oracle; authorization status
/// that cannot be positively confirmed is treated by callers as absent.
pub trait SessionOracle: Send + Sync {
    /// Resolve the current session for a token. `Ok(None)` means no session;
    /// `Err` means the lookup itself failed and the caller must fail closed.
    fn current_session(&self, token: &str) -> Result<Option<Principal>>;
    fn sign_in(&self, req: &SignInRequest) -> Result<Session>;
    fn sign_up(&self, email: &str, password: &str) -> Result<()>;
    fn sign_out(&self, token: &str) -> bool;
}

/// Oracle backed by the local credential store and in-memory session table.
pub struct LocalSessionOracle {
    data_root: String,
    pub sm: Arc<SessionManager>,
}

impl LocalSessionOracle {
    pub fn new(data_root: String, sm: Arc<SessionManager>) -> Self {
        Self { data_root, sm }
    }
}

impl SessionOracle for LocalSessionOracle {
    fn current_session(&self, token: &str) -> Result<Option<Principal>> {
        Ok(self.sm.validate(token))
    }

    fn sign_in(&self, req: &SignInRequest) -> Result<Session> {
        // Verify the credential pair against the user store
        if !crate::security::authenticate(&self.data_root, &req.email, &req.password)? {
            return Err(anyhow!("invalid_credentials"));
        }
        let principal = Principal::new(req.email.trim());
        let session = self.sm.issue(principal);
        tprintln!("auth.sign_in user={} sid={}", req.email, session.session_id);
        Ok(session)
    }

    fn sign_up(&self, email: &str, password: &str) -> Result<()> {
        crate::security::add_user(&self.data_root, email, password)?;
        tprintln!("auth.sign_up user={}", email);
        Ok(())
    }

    fn sign_out(&self, token: &str) -> bool {
        self.sm.logout(token)
    }
}
