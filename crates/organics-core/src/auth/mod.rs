//! Authentication module for managing the operator session and credentials.
//!
//! This module provides:
//! - `SessionManager`: the login/logout state machine and the single writer
//!   of the persisted credential
//! - `Credential`: the issued bearer token and its type
//! - `TokenStorage` backends: a JSON file, the OS keyring, or memory
//!
//! A stored credential is trusted on presence at startup; the backend is the
//! only judge of whether it is still valid.

pub mod credentials;
pub mod session;
pub mod storage;

pub use credentials::{Credential, KeyringTokenStorage};
pub use session::{SessionManager, SessionSnapshot, SessionStatus};
pub use storage::{FileTokenStorage, MemoryTokenStorage, TokenStorage};
