//! Local mirror of the remote connected-accounts collection.
//!
//! [`AccountSyncController`] is mounted once a session is authenticated and
//! torn down when it ends. Front ends read [`SyncSnapshot`]s and call the
//! controller's operations; they never touch the collection directly.

pub mod controller;
pub mod state;

pub use controller::{AccountSyncController, SyncOptions};
pub use state::{SyncPhase, SyncSnapshot};
