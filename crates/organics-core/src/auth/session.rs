use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::api::AuthApi;
use crate::error::LoginError;

use super::credentials::Credential;
use super::storage::TokenStorage;

/// Where the operator is in the login lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum SessionStatus {
    Unauthenticated,
    /// A login request is outstanding. Only drives the busy indicator;
    /// protected views treat it like `Unauthenticated`.
    Authenticating,
    Authenticated,
}

/// Read-only view of the session handed to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    /// Number of sessions that have ended so far. Differs between two
    /// snapshots whenever a logout happened in between, even if a new login
    /// followed before anyone looked.
    pub generation: u64,
}

impl SessionSnapshot {
    pub fn is_authenticated(&self) -> bool {
        self.status == SessionStatus::Authenticated
    }

    pub fn is_busy(&self) -> bool {
        self.status == SessionStatus::Authenticating
    }
}

struct SessionState {
    status: SessionStatus,
    credential: Option<Credential>,
    generation: u64,
}

impl SessionState {
    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            status: self.status,
            generation: self.generation,
        }
    }
}

/// Owner of the operator's authenticated state.
///
/// Construct one per process with [`SessionManager::initialize`] and share it
/// as `Arc<SessionManager>`. It is the only writer of the credential store.
pub struct SessionManager {
    api: Arc<dyn AuthApi>,
    storage: Box<dyn TokenStorage>,
    state: Mutex<SessionState>,
    status_tx: watch::Sender<SessionSnapshot>,
}

impl SessionManager {
    /// Restore the session from durable storage.
    ///
    /// A stored credential is accepted as-is without asking the server
    /// (trust-on-presence); the first rejected API call ends the session.
    /// An unreadable store is treated as empty.
    pub fn initialize(api: Arc<dyn AuthApi>, storage: Box<dyn TokenStorage>) -> Self {
        let credential = match storage.load() {
            Ok(credential) => credential,
            Err(e) => {
                warn!(error = %e, "Failed to read stored credential, starting signed out");
                None
            }
        };

        let status = if credential.is_some() {
            SessionStatus::Authenticated
        } else {
            SessionStatus::Unauthenticated
        };
        debug!(?status, "Session initialized");

        let state = SessionState {
            status,
            credential,
            generation: 0,
        };
        let (status_tx, _) = watch::channel(state.snapshot());

        Self {
            api,
            storage,
            state: Mutex::new(state),
            status_tx,
        }
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publish the status while the state lock is held so observers see
    /// transitions in order.
    fn publish(&self, state: &SessionState) {
        self.status_tx.send_replace(state.snapshot());
    }

    pub fn status(&self) -> SessionStatus {
        self.state().status
    }

    pub fn is_authenticated(&self) -> bool {
        self.status() == SessionStatus::Authenticated
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state().snapshot()
    }

    /// True while the session that was current at `generation` is still
    /// authenticated.
    pub fn is_current(&self, generation: u64) -> bool {
        let state = self.state();
        state.status == SessionStatus::Authenticated && state.generation == generation
    }

    /// Watch status transitions. The receiver starts at the current status.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.status_tx.subscribe()
    }

    /// Current bearer credential, if signed in. No validation, no I/O.
    pub fn current_credential(&self) -> Option<Credential> {
        let state = self.state();
        match state.status {
            SessionStatus::Authenticated => state.credential.clone(),
            _ => None,
        }
    }

    /// Credential of the session identified by `generation`, or `None` once
    /// that session has ended.
    pub fn credential_for(&self, generation: u64) -> Option<Credential> {
        let state = self.state();
        match state.status {
            SessionStatus::Authenticated if state.generation == generation => {
                state.credential.clone()
            }
            _ => None,
        }
    }

    /// Sign in with an identifier/secret pair.
    ///
    /// Every outcome is reported through the returned `Result`; the durable
    /// store is written only on success.
    pub async fn login(&self, identifier: &str, secret: &str) -> Result<(), LoginError> {
        let identifier = identifier.trim();
        if identifier.is_empty() || secret.is_empty() {
            return Err(LoginError::Validation(
                "Email and password are required".to_string(),
            ));
        }

        {
            let mut state = self.state();
            match state.status {
                SessionStatus::Authenticated => {
                    return Err(LoginError::Validation("Already signed in".to_string()));
                }
                SessionStatus::Authenticating => {
                    return Err(LoginError::Validation(
                        "Sign-in already in progress".to_string(),
                    ));
                }
                SessionStatus::Unauthenticated => {
                    state.status = SessionStatus::Authenticating;
                    self.publish(&state);
                }
            }
        }

        // Reverts to Unauthenticated if this future is dropped mid-request
        let mut guard = AuthenticatingGuard {
            session: self,
            armed: true,
        };

        info!(identifier = identifier, "Attempting login");
        let outcome = self.api.authenticate(identifier, secret).await;
        guard.armed = false;

        let mut state = self.state();
        match outcome {
            Ok(credential) => {
                if let Err(e) = self.storage.save(&credential) {
                    warn!(error = %e, "Failed to persist credential");
                }
                state.credential = Some(credential);
                state.status = SessionStatus::Authenticated;
                self.publish(&state);
                info!("Login successful");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Login failed");
                state.credential = None;
                state.status = SessionStatus::Unauthenticated;
                self.publish(&state);
                Err(LoginError::from(e))
            }
        }
    }

    /// Sign out. Idempotent: calling it while signed out does nothing.
    pub fn logout(&self) {
        if self.end_session(None) {
            info!("Logged out");
        } else {
            debug!("Logout requested while not signed in");
        }
    }

    /// End the session because a downstream call reported the credential as
    /// rejected. No-op if the session already ended.
    pub fn invalidate(&self) {
        if self.end_session(None) {
            warn!("Credential rejected by server, session ended");
        }
    }

    /// Like [`invalidate`](Self::invalidate), but only while the session
    /// identified by `generation` is still the current one. A rejection
    /// that belongs to an earlier session must not sign out a newer one.
    pub fn invalidate_if_current(&self, generation: u64) {
        if self.end_session(Some(generation)) {
            warn!(generation = generation, "Credential rejected by server, session ended");
        }
    }

    fn end_session(&self, generation: Option<u64>) -> bool {
        let mut state = self.state();
        if state.status != SessionStatus::Authenticated {
            return false;
        }
        if generation.is_some_and(|g| g != state.generation) {
            return false;
        }

        state.credential = None;
        state.status = SessionStatus::Unauthenticated;
        state.generation += 1;
        if let Err(e) = self.storage.clear() {
            warn!(error = %e, "Failed to clear stored credential");
        }
        self.publish(&state);
        true
    }
}

struct AuthenticatingGuard<'a> {
    session: &'a SessionManager,
    armed: bool,
}

impl Drop for AuthenticatingGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = self.session.state();
        if state.status == SessionStatus::Authenticating {
            debug!("Login abandoned before completion");
            state.status = SessionStatus::Unauthenticated;
            self.session.publish(&state);
        }
    }
}
