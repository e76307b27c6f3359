//! View-state published by the account sync controller.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::ConnectedAccount;
use crate::utils::format_age;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum SyncPhase {
    /// Nothing fetched yet
    #[default]
    Idle,
    Loading,
    Ready,
    Error,
}

/// Read-only snapshot of the local account mirror. Never persisted.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct SyncSnapshot {
    pub phase: SyncPhase,
    pub accounts: Vec<ConnectedAccount>,
    /// Most recent failure, cleared when the next fetch starts
    pub last_error: Option<String>,
    /// When the last successful fetch was applied
    #[cfg_attr(feature = "ts", ts(type = "string | null"))]
    pub last_synced_at: Option<DateTime<Utc>>,
}

impl SyncSnapshot {
    pub fn is_loading(&self) -> bool {
        self.phase == SyncPhase::Loading
    }

    pub fn account(&self, id: &str) -> Option<&ConnectedAccount> {
        self.accounts.iter().find(|a| a.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.account(id).is_some()
    }

    pub fn account_ids(&self) -> Vec<&str> {
        self.accounts.iter().map(|a| a.id.as_str()).collect()
    }

    /// "Last updated" label, e.g. "5m ago", or "never"
    pub fn last_synced_display(&self, now: DateTime<Utc>) -> String {
        self.last_synced_at
            .map(|at| format_age(at, now))
            .unwrap_or_else(|| "never".to_string())
    }
}
