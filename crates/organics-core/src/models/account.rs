//! Domain model for a connected TikTok account.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::{format_timestamp, mask_secret};

/// Number of refresh-token characters shown before masking.
const VISIBLE_TOKEN_CHARS: usize = 20;

/// A third-party account record owned by the backend.
///
/// The local copy is only ever a cache; identity is `id`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct ConnectedAccount {
    pub id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default)]
    #[cfg_attr(feature = "ts", ts(type = "string | null"))]
    pub refresh_token_expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl ConnectedAccount {
    /// Label for lists: the display name, or the id when the name is blank.
    pub fn label(&self) -> &str {
        if self.display_name.trim().is_empty() {
            &self.id
        } else {
            &self.display_name
        }
    }

    /// Refresh token with everything past the first few characters hidden.
    pub fn masked_refresh_token(&self) -> String {
        mask_secret(&self.refresh_token, VISIBLE_TOKEN_CHARS)
    }

    pub fn scopes_display(&self) -> String {
        if self.scopes.is_empty() {
            "-".to_string()
        } else {
            self.scopes.join(", ")
        }
    }

    pub fn expiry_display(&self) -> String {
        self.refresh_token_expires_at
            .map(format_timestamp)
            .unwrap_or_else(|| "No expiry".to_string())
    }

    /// Whether the refresh token had expired as of `now`. Absent expiry never expires.
    pub fn is_refresh_token_expired(&self, now: DateTime<Utc>) -> bool {
        self.refresh_token_expires_at
            .map(|expiry| expiry <= now)
            .unwrap_or(false)
    }
}

impl fmt::Debug for ConnectedAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectedAccount")
            .field("id", &self.id)
            .field("display_name", &self.display_name)
            .field("refresh_token", &self.masked_refresh_token())
            .field("refresh_token_expires_at", &self.refresh_token_expires_at)
            .field("scopes", &self.scopes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn account() -> ConnectedAccount {
        ConnectedAccount {
            id: "7301".to_string(),
            display_name: "@organics.daily".to_string(),
            refresh_token: "rft.0123456789abcdefghijKLMNOP".to_string(),
            refresh_token_expires_at: Some(Utc.with_ymd_and_hms(2026, 11, 2, 14, 30, 0).unwrap()),
            scopes: vec!["user.info.basic".to_string(), "video.list".to_string()],
        }
    }

    #[test]
    fn test_parse_backend_record() {
        let json = r#"{
            "id": "7301",
            "display_name": "@organics.daily",
            "refresh_token": "rft.0123456789abcdefghijKLMNOP",
            "refresh_token_expires_at": "2026-11-02T14:30:00Z",
            "scopes": ["user.info.basic", "video.list"]
        }"#;
        let parsed: ConnectedAccount = serde_json::from_str(json).expect("parse account");
        assert_eq!(parsed, account());
    }

    #[test]
    fn test_parse_minimal_record() {
        let parsed: ConnectedAccount =
            serde_json::from_str(r#"{"id": "9", "refresh_token_expires_at": null}"#)
                .expect("parse account");
        assert_eq!(parsed.id, "9");
        assert_eq!(parsed.label(), "9");
        assert!(parsed.refresh_token_expires_at.is_none());
        assert!(parsed.scopes.is_empty());
        assert_eq!(parsed.scopes_display(), "-");
        assert_eq!(parsed.expiry_display(), "No expiry");
    }

    #[test]
    fn test_masked_refresh_token() {
        assert_eq!(account().masked_refresh_token(), "rft.0123456789abcdef...");
    }

    #[test]
    fn test_debug_hides_refresh_token() {
        let debug = format!("{:?}", account());
        assert!(!debug.contains("KLMNOP"));
        assert!(debug.contains("rft.0123456789abcdef..."));
    }

    #[test]
    fn test_refresh_token_expiry() {
        let acct = account();
        let before = Utc.with_ymd_and_hms(2026, 11, 1, 0, 0, 0).unwrap();
        let after = Utc.with_ymd_and_hms(2026, 11, 3, 0, 0, 0).unwrap();
        assert!(!acct.is_refresh_token_expired(before));
        assert!(acct.is_refresh_token_expired(after));
        assert_eq!(acct.expiry_display(), "Nov 02, 2026 14:30 UTC");
        assert_eq!(acct.scopes_display(), "user.info.basic, video.list");
    }
}
