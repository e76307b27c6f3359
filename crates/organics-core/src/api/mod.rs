//! REST API client module for the organics backend.
//!
//! This module provides the `ApiClient` for communicating with the backend
//! that stores connected TikTok accounts, plus the two seams the core
//! components talk through:
//!
//! - [`AuthApi`]: exchanges operator credentials for a bearer token
//! - [`AccountsApi`]: lists and deletes connected accounts
//!
//! Tests substitute in-process fakes for these traits; production code uses
//! `ApiClient`, which implements both.

pub mod client;
pub mod error;

use async_trait::async_trait;

pub use client::ApiClient;
pub use error::ApiError;

use crate::auth::Credential;
use crate::models::ConnectedAccount;

/// Operator authentication endpoint.
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// Exchange an identifier/secret pair for a bearer credential.
    async fn authenticate(&self, identifier: &str, secret: &str) -> Result<Credential, ApiError>;
}

/// Connected-accounts resource.
#[async_trait]
pub trait AccountsApi: Send + Sync {
    /// Fetch the full current collection.
    async fn list_accounts(&self, credential: &Credential) -> Result<Vec<ConnectedAccount>, ApiError>;

    /// Delete one account by identifier.
    async fn delete_account(&self, credential: &Credential, account_id: &str) -> Result<(), ApiError>;
}
