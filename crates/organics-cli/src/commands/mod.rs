//! CLI subcommands and the shared wiring they run on.

pub mod accounts;
pub mod auth;
pub mod watch;

use std::sync::Arc;

use anyhow::{Context as _, Result};
use organics_core::{
    AccountSyncController, ApiClient, Config, SessionManager, SyncError, SyncOptions,
};

/// Loaded configuration, API client and restored session.
pub struct Context {
    pub config: Config,
    pub client: ApiClient,
    pub session: Arc<SessionManager>,
}

impl Context {
    pub fn load(api_url: Option<&str>) -> Result<Self> {
        let mut config = Config::load().context("Failed to load configuration")?;
        if let Some(url) = api_url {
            config.api_base_url = url.to_string();
        }

        let client = ApiClient::from_config(&config).context("Invalid API configuration")?;
        let storage = config.token_storage()?;
        let session = Arc::new(SessionManager::initialize(Arc::new(client.clone()), storage));

        Ok(Self {
            config,
            client,
            session,
        })
    }

    /// Mount the account controller, or explain why the operator must sign in first.
    pub fn mount_accounts(&self, poll: bool) -> Result<AccountSyncController> {
        let mut options = SyncOptions::from_config(&self.config);
        if !poll {
            options.poll_interval = None;
        }
        match AccountSyncController::mount(
            Arc::clone(&self.session),
            Arc::new(self.client.clone()),
            options,
        ) {
            Ok(controller) => Ok(controller),
            Err(SyncError::NotAuthenticated) => {
                anyhow::bail!("Not signed in. Run `organics login` first.")
            }
            Err(e) => Err(e.into()),
        }
    }
}
