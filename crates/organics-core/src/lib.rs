//! Core library for the organics operator console.
//!
//! Two components, in dependency order:
//!
//! - [`SessionManager`]: owns the operator's bearer credential, persists it
//!   across restarts and gates access to protected views.
//! - [`AccountSyncController`]: mirrors the remote list of connected TikTok
//!   accounts, with polling, coalesced refreshes, issuance-ordered results and
//!   confirmed deletes. Authorization failures are handed back to the
//!   session, which then ends.
//!
//! Everything presentational lives outside this crate; front ends read the
//! snapshots exposed here and invoke the operations.

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod sync;
pub mod utils;

pub use api::{AccountsApi, ApiClient, ApiError, AuthApi};
pub use auth::{
    Credential, FileTokenStorage, KeyringTokenStorage, MemoryTokenStorage, SessionManager,
    SessionSnapshot, SessionStatus, TokenStorage,
};
pub use config::{Config, CredentialBackend};
pub use error::{ErrorKind, LoginError, SyncError};
pub use models::ConnectedAccount;
pub use sync::{AccountSyncController, SyncOptions, SyncPhase, SyncSnapshot};
