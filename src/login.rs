use crate::error::{TribesError, TribesResult};
use serde::Serialize;

/// Access code used when none is configured
pub const DEFAULT_ACCESS_CODE: &str = "1247";

/// Where the gate stands for this process
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum SessionState {
    Unauthenticated,
    Authenticated,
}

/// Fixed-code login gate
///
/// Starts `Unauthenticated` and moves to `Authenticated` once a submitted
/// code matches the shared secret exactly. There is no way back: the state
/// lives as long as the process and is never written to disk.
#[derive(Debug, Clone)]
pub struct SessionGate {
    secret: String,
    state: SessionState,
}

impl SessionGate {
    pub fn new(secret: impl Into<String>) -> Self {
        SessionGate {
            secret: secret.into(),
            state: SessionState::Unauthenticated,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_authenticated(&self) -> bool {
        self.state == SessionState::Authenticated
    }

    /// Check a submitted code against the secret
    ///
    /// # Arguments
    /// * `code` - The code as typed by the user; not trimmed
    ///
    /// # Returns
    /// * `TribesResult<()>` - `AuthenticationFailed` on mismatch. A mismatch
    ///   never changes the state, so an authenticated gate stays open.
    pub fn authenticate(&mut self, code: &str) -> TribesResult<()> {
        if code == self.secret {
            if !self.is_authenticated() {
                log::info!("login succeeded");
            }
            self.state = SessionState::Authenticated;
            Ok(())
        } else {
            log::warn!("login rejected: incorrect access code");
            Err(TribesError::AuthenticationFailed)
        }
    }

    /// Fail with `NotAuthenticated` unless the gate is open.
    pub fn require(&self) -> TribesResult<()> {
        if self.is_authenticated() {
            Ok(())
        } else {
            Err(TribesError::NotAuthenticated)
        }
    }
}

impl Default for SessionGate {
    fn default() -> Self {
        SessionGate::new(DEFAULT_ACCESS_CODE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_locked() {
        let gate = SessionGate::default();
        assert_eq!(gate.state(), SessionState::Unauthenticated);
        assert!(matches!(gate.require(), Err(TribesError::NotAuthenticated)));
    }

    #[test]
    fn correct_code_opens_the_gate() {
        let mut gate = SessionGate::default();
        gate.authenticate("1247").unwrap();
        assert_eq!(gate.state(), SessionState::Authenticated);
        assert!(gate.require().is_ok());
    }

    #[test]
    fn wrong_codes_keep_it_locked() {
        let mut gate = SessionGate::default();
        for code in ["", "12", "124", "12470", "1248", "7421", " 1247"] {
            assert!(
                matches!(gate.authenticate(code), Err(TribesError::AuthenticationFailed)),
                "code {:?} should be rejected",
                code
            );
            assert_eq!(gate.state(), SessionState::Unauthenticated);
        }
        // Retries are unlimited.
        gate.authenticate("1247").unwrap();
        assert!(gate.is_authenticated());
    }

    #[test]
    fn wrong_code_after_login_does_not_log_out() {
        let mut gate = SessionGate::new("abcd");
        gate.authenticate("abcd").unwrap();
        assert!(gate.authenticate("nope").is_err());
        assert!(gate.is_authenticated());
    }
}
