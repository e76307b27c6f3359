//! Data models for connected-account records.
//!
//! - `ConnectedAccount`: a TikTok account linked through the OAuth flow,
//!   mirrored from the backend that owns it

pub mod account;

pub use account::ConnectedAccount;
