use std::fmt;

use anyhow::{Context, Result};
use keyring::Entry;
use serde::{Deserialize, Serialize};

use super::storage::TokenStorage;

const SERVICE_NAME: &str = "organics";

/// Keyring entry holding the bearer token
const ACCESS_TOKEN_KEY: &str = "access_token";

/// Keyring entry holding the token type
const TOKEN_TYPE_KEY: &str = "token_type";

/// Bearer credential issued by the login endpoint.
///
/// Opaque to the client: it is stored, sent, and discarded, never inspected.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    access_token: String,
    token_type: String,
}

impl Credential {
    pub fn new(access_token: impl Into<String>, token_type: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: token_type.into(),
        }
    }

    /// Credential with the default `bearer` token type
    pub fn bearer(access_token: impl Into<String>) -> Self {
        Self::new(access_token, "bearer")
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn token_type(&self) -> &str {
        &self.token_type
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .finish()
    }
}

/// Credential storage in the OS keychain.
///
/// The token and its type are kept as two separate entries under one
/// service name.
pub struct KeyringTokenStorage {
    service: String,
}

impl KeyringTokenStorage {
    pub fn new() -> Self {
        Self::with_service(SERVICE_NAME)
    }

    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: &str) -> Result<Entry> {
        Entry::new(&self.service, key).context("Failed to create keyring entry")
    }

    /// Read one entry, mapping "no such entry" to `None`
    fn read(&self, key: &str) -> Result<Option<String>> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to retrieve credential from keychain"),
        }
    }

    fn delete(&self, key: &str) -> Result<()> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete credential from keychain"),
        }
    }
}

impl Default for KeyringTokenStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenStorage for KeyringTokenStorage {
    fn load(&self) -> Result<Option<Credential>> {
        let Some(access_token) = self.read(ACCESS_TOKEN_KEY)? else {
            return Ok(None);
        };
        let token_type = self
            .read(TOKEN_TYPE_KEY)?
            .unwrap_or_else(|| "bearer".to_string());
        Ok(Some(Credential::new(access_token, token_type)))
    }

    fn save(&self, credential: &Credential) -> Result<()> {
        self.entry(ACCESS_TOKEN_KEY)?
            .set_password(credential.access_token())
            .context("Failed to store access token in keychain")?;
        self.entry(TOKEN_TYPE_KEY)?
            .set_password(credential.token_type())
            .context("Failed to store token type in keychain")?;

        // Without a platform store, keyring falls back to a mock that forgets
        // the value as soon as the entry is dropped
        if self.load()?.as_ref() != Some(credential) {
            anyhow::bail!("Keychain did not retain the credential; no usable keyring backend");
        }
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.delete(ACCESS_TOKEN_KEY)?;
        self.delete(TOKEN_TYPE_KEY)
    }
}
