//! Account sync controller.
//!
//! Every fetch runs as its own spawned task and draws an issuance number
//! from the ledger. Local mutations draw one too. A result is applied only
//! when its number is newer than the last applied one, so whatever was
//! issued last decides the final collection no matter which response lands
//! first.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::watch;
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::api::{AccountsApi, ApiError};
use crate::auth::{Credential, SessionManager, SessionSnapshot};
use crate::config::Config;
use crate::error::SyncError;
use crate::models::ConnectedAccount;

use super::state::{SyncPhase, SyncSnapshot};

type SharedFetch = Shared<BoxFuture<'static, Result<(), SyncError>>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    /// Background refresh period. `None` disables polling.
    pub poll_interval: Option<Duration>,
    /// OAuth authorization URL surfaced through [`AccountSyncController::connect_url`]
    pub connect_url: String,
}

impl SyncOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            connect_url: config.connect_url.clone(),
        }
    }
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    /// Operator asked; failures are surfaced as the `Error` phase
    Manual,
    /// Poll tick or post-delete refresh; failures are recorded quietly
    Background,
}

struct InFlight {
    seq: u64,
    fetch: SharedFetch,
    /// Upgraded when a manual refresh joins a background fetch
    manual: Arc<AtomicBool>,
}

#[derive(Default)]
struct Ledger {
    issued: u64,
    applied: u64,
    in_flight: Option<InFlight>,
    tasks: HashMap<u64, AbortHandle>,
    torn_down: bool,
}

struct Inner {
    session: Arc<SessionManager>,
    /// Session generation at mount; results from any other session are dropped
    generation: u64,
    api: Arc<dyn AccountsApi>,
    state_tx: watch::Sender<SyncSnapshot>,
    ledger: Mutex<Ledger>,
}

impl Inner {
    fn ledger(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start a fetch, or join the one already running unless `force` is set.
    fn issue_fetch(self: &Arc<Self>, trigger: Trigger, force: bool) -> Result<SharedFetch, SyncError> {
        let mut ledger = self.ledger();
        let credential = self.credential(&mut ledger)?;
        if ledger.torn_down {
            return Err(SyncError::Cancelled);
        }

        if !force {
            if let Some(in_flight) = &ledger.in_flight {
                if trigger == Trigger::Manual {
                    in_flight.manual.store(true, Ordering::SeqCst);
                    self.state_tx.send_modify(|state| {
                        state.last_error = None;
                        state.phase = SyncPhase::Loading;
                    });
                }
                debug!(seq = in_flight.seq, ?trigger, "Joining in-flight account fetch");
                return Ok(in_flight.fetch.clone());
            }
        }

        ledger.issued += 1;
        let seq = ledger.issued;
        let manual = Arc::new(AtomicBool::new(trigger == Trigger::Manual));

        self.state_tx.send_modify(|state| {
            state.last_error = None;
            if trigger == Trigger::Manual || state.phase == SyncPhase::Idle {
                state.phase = SyncPhase::Loading;
            }
        });
        debug!(seq = seq, ?trigger, "Fetching connected accounts");

        let inner = Arc::clone(self);
        let task_manual = Arc::clone(&manual);
        let handle: JoinHandle<Result<(), SyncError>> = tokio::spawn(async move {
            let result = inner.api.list_accounts(&credential).await;
            inner.complete_fetch(seq, result, task_manual.load(Ordering::SeqCst))
        });
        ledger.tasks.insert(seq, handle.abort_handle());

        let fetch = handle
            .map(|joined| joined.unwrap_or(Err(SyncError::Cancelled)))
            .boxed()
            .shared();
        ledger.in_flight = Some(InFlight {
            seq,
            fetch: fetch.clone(),
            manual,
        });

        Ok(fetch)
    }

    fn complete_fetch(
        &self,
        seq: u64,
        result: Result<Vec<ConnectedAccount>, ApiError>,
        manual: bool,
    ) -> Result<(), SyncError> {
        let mut ledger = self.ledger();
        ledger.tasks.remove(&seq);
        if ledger.in_flight.as_ref().is_some_and(|f| f.seq == seq) {
            ledger.in_flight = None;
        }
        if ledger.torn_down || self.session_ended(&mut ledger) {
            return Err(SyncError::Cancelled);
        }

        let result = result.map_err(SyncError::from);
        if matches!(result, Err(SyncError::AuthRejected)) {
            drop(ledger);
            self.session.invalidate_if_current(self.generation);
            return Err(SyncError::AuthRejected);
        }

        if seq <= ledger.applied {
            debug!(seq = seq, applied = ledger.applied, "Discarding stale account fetch");
            return result.map(|_| ());
        }
        ledger.applied = seq;

        match result {
            Ok(accounts) => {
                info!(seq = seq, count = accounts.len(), "Connected accounts synced");
                self.state_tx.send_modify(|state| {
                    state.accounts = accounts;
                    state.phase = SyncPhase::Ready;
                    state.last_error = None;
                    state.last_synced_at = Some(Utc::now());
                });
                Ok(())
            }
            Err(e) => {
                warn!(seq = seq, manual = manual, error = %e, "Account fetch failed");
                self.state_tx.send_modify(|state| {
                    state.last_error = Some(e.to_string());
                    state.phase = if manual || state.last_synced_at.is_none() {
                        SyncPhase::Error
                    } else {
                        SyncPhase::Ready
                    };
                });
                Err(e)
            }
        }
    }

    /// Drop a confirmed-deleted account locally. Returns false once torn down.
    fn apply_removal(&self, account_id: &str) -> bool {
        let mut ledger = self.ledger();
        if ledger.torn_down || self.session_ended(&mut ledger) {
            return false;
        }

        // Anything issued before this point is now older than the collection
        ledger.issued += 1;
        ledger.applied = ledger.issued;
        ledger.in_flight = None;

        self.state_tx.send_modify(|state| {
            state.accounts.retain(|a| a.id != account_id);
            state.last_error = None;
        });
        true
    }

    fn record_error(&self, error: &SyncError) {
        let mut ledger = self.ledger();
        if ledger.torn_down || self.session_ended(&mut ledger) {
            return;
        }
        self.state_tx.send_modify(|state| {
            state.last_error = Some(error.to_string());
        });
    }

    /// Credential of the session this controller was mounted for. Tears the
    /// controller down once that session is gone.
    fn credential(&self, ledger: &mut Ledger) -> Result<Credential, SyncError> {
        match self.session.credential_for(self.generation) {
            Some(credential) => Ok(credential),
            None => {
                Self::tear_down_locked(ledger);
                Err(SyncError::NotAuthenticated)
            }
        }
    }

    /// True, after tearing down, if the mounted session has ended. Catches a
    /// logout followed by a new login before the supervisor got to run.
    fn session_ended(&self, ledger: &mut Ledger) -> bool {
        if self.session.is_current(self.generation) {
            return false;
        }
        if Self::tear_down_locked(ledger) {
            info!(generation = self.generation, "Session ended, account sync stopped");
        }
        true
    }

    /// Stop applying results and abort every in-flight fetch. Returns false
    /// if this already happened.
    fn tear_down(&self) -> bool {
        Self::tear_down_locked(&mut self.ledger())
    }

    fn tear_down_locked(ledger: &mut Ledger) -> bool {
        if ledger.torn_down {
            return false;
        }
        ledger.torn_down = true;
        ledger.in_flight = None;
        for (_, task) in ledger.tasks.drain() {
            task.abort();
        }
        true
    }

    fn is_active(&self) -> bool {
        let mut ledger = self.ledger();
        !ledger.torn_down && !self.session_ended(&mut ledger)
    }
}

/// Keeps the local account list in step with the server.
///
/// Mount it once the session is authenticated. It stops by itself when the
/// session ends, or when [`shutdown`](Self::shutdown) is called or it is
/// dropped.
pub struct AccountSyncController {
    inner: Arc<Inner>,
    connect_url: String,
    shutdown_tx: watch::Sender<bool>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl AccountSyncController {
    /// Mount the controller and start its supervisor.
    ///
    /// Fails with [`SyncError::NotAuthenticated`] unless the session is
    /// authenticated. Must be called from within a Tokio runtime.
    pub fn mount(
        session: Arc<SessionManager>,
        api: Arc<dyn AccountsApi>,
        options: SyncOptions,
    ) -> Result<Self, SyncError> {
        let mut session_rx = session.subscribe();
        let mounted = *session_rx.borrow_and_update();
        if !mounted.is_authenticated() {
            return Err(SyncError::NotAuthenticated);
        }

        let (state_tx, _) = watch::channel(SyncSnapshot::default());
        let inner = Arc::new(Inner {
            session,
            generation: mounted.generation,
            api,
            state_tx,
            ledger: Mutex::new(Ledger::default()),
        });

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let ticker = options.poll_interval.filter(|p| !p.is_zero()).map(|period| {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker
        });

        info!(poll_interval = ?options.poll_interval, "Account sync mounted");
        let supervisor = tokio::spawn(supervise(
            Arc::clone(&inner),
            session_rx,
            shutdown_rx,
            ticker,
        ));

        Ok(Self {
            inner,
            connect_url: options.connect_url,
            shutdown_tx,
            supervisor: Mutex::new(Some(supervisor)),
        })
    }

    /// Fetch the collection now, joining a fetch that is already running.
    pub async fn refresh(&self) -> Result<(), SyncError> {
        let fetch = self.inner.issue_fetch(Trigger::Manual, false)?;
        fetch.await
    }

    /// Fetch the collection now with a brand new request. An in-flight fetch
    /// keeps running but its result will be discarded.
    pub async fn reload(&self) -> Result<(), SyncError> {
        let fetch = self.inner.issue_fetch(Trigger::Manual, true)?;
        fetch.await
    }

    /// Delete an account on the server, then drop it locally.
    ///
    /// The local collection only changes after the server confirms. A fresh
    /// background fetch follows so the list is re-derived from the server.
    pub async fn remove(&self, account_id: &str) -> Result<(), SyncError> {
        let credential = {
            let mut ledger = self.inner.ledger();
            let credential = self.inner.credential(&mut ledger)?;
            if ledger.torn_down {
                return Err(SyncError::Cancelled);
            }
            credential
        };

        match self.inner.api.delete_account(&credential, account_id).await {
            Ok(()) => {
                info!(account_id = account_id, "Connected account deleted");
                if self.inner.apply_removal(account_id) {
                    if let Err(e) = self.inner.issue_fetch(Trigger::Background, true) {
                        debug!(error = %e, "Skipped refresh after delete");
                    }
                }
                Ok(())
            }
            Err(e) => {
                let err = SyncError::from(e);
                warn!(account_id = account_id, error = %err, "Failed to delete account");
                if err == SyncError::AuthRejected {
                    self.inner.session.invalidate_if_current(self.inner.generation);
                } else {
                    self.inner.record_error(&err);
                }
                Err(err)
            }
        }
    }

    /// Stop polling and abort in-flight fetches. No state updates are
    /// applied afterwards. Safe to call more than once.
    pub fn shutdown(&self) {
        if self.inner.tear_down() {
            info!("Account sync stopped");
        }
        self.shutdown_tx.send_replace(true);
        let supervisor = self
            .supervisor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(supervisor) = supervisor {
            supervisor.abort();
        }
    }

    /// False once the controller has been torn down or the session it was
    /// mounted for has ended.
    pub fn is_active(&self) -> bool {
        self.inner.is_active()
    }

    pub fn snapshot(&self) -> SyncSnapshot {
        self.inner.state_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncSnapshot> {
        self.inner.state_tx.subscribe()
    }

    pub fn connect_url(&self) -> &str {
        &self.connect_url
    }
}

impl Drop for AccountSyncController {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn supervise(
    inner: Arc<Inner>,
    mut session_rx: watch::Receiver<SessionSnapshot>,
    mut shutdown_rx: watch::Receiver<bool>,
    mut ticker: Option<Interval>,
) {
    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => break,
            changed = session_rx.changed() => {
                // Compare generations: a logout and a new login may have
                // coalesced into a single change
                let current = changed.is_ok() && {
                    let session = session_rx.borrow_and_update();
                    session.is_authenticated() && session.generation == inner.generation
                };
                if !current {
                    if inner.tear_down() {
                        info!("Session ended, account sync stopped");
                    }
                    break;
                }
            }
            _ = next_tick(&mut ticker) => {
                if let Err(e) = inner.issue_fetch(Trigger::Background, false) {
                    debug!(error = %e, "Skipped scheduled account fetch");
                }
            }
        }
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}
