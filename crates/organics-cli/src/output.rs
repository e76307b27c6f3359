//! Terminal output: human-readable lines or JSON documents.

use chrono::{DateTime, Utc};
use organics_core::{ConnectedAccount, SyncSnapshot};
use serde_json::json;

/// Output format selector
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputFormat {
    Human,
    Json,
}

/// Trait for formatting CLI output
pub trait OutputFormatter {
    fn success(&self, message: &str);
    fn error(&self, message: &str);
    fn warn(&self, message: &str);
    fn info(&self, message: &str);
    fn print_json(&self, value: &serde_json::Value);
    fn accounts(&self, snapshot: &SyncSnapshot);
}

/// Human-readable output formatter with checkmarks and indentation
pub struct HumanFormatter;

impl OutputFormatter for HumanFormatter {
    fn success(&self, message: &str) {
        println!("\u{2713} {}", message);
    }
    fn error(&self, message: &str) {
        eprintln!("\u{2717} Error: {}", message);
    }
    fn warn(&self, message: &str) {
        eprintln!("\u{26a0} Warning: {}", message);
    }
    fn info(&self, message: &str) {
        println!("  {}", message);
    }
    fn print_json(&self, _value: &serde_json::Value) {
        // Human formatter doesn't print JSON
    }
    fn accounts(&self, snapshot: &SyncSnapshot) {
        if snapshot.accounts.is_empty() {
            println!("No TikTok accounts connected.");
        } else {
            for line in account_table(&snapshot.accounts, Utc::now()) {
                println!("{}", line);
            }
        }
        println!();
        println!("Last updated: {}", snapshot.last_synced_display(Utc::now()));
        if let Some(error) = &snapshot.last_error {
            self.warn(error);
        }
    }
}

/// JSON output formatter
pub struct JsonFormatter;

impl OutputFormatter for JsonFormatter {
    fn success(&self, message: &str) {
        println!("{}", json!({"success": true, "message": message}));
    }
    fn error(&self, message: &str) {
        eprintln!("{}", json!({"success": false, "error": message}));
    }
    fn warn(&self, message: &str) {
        eprintln!("{}", json!({"level": "warning", "message": message}));
    }
    fn info(&self, _message: &str) {}
    fn print_json(&self, value: &serde_json::Value) {
        println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
    }
    fn accounts(&self, snapshot: &SyncSnapshot) {
        // Refresh tokens are masked here too; the raw value never leaves the process
        let now = Utc::now();
        let accounts: Vec<serde_json::Value> = snapshot
            .accounts
            .iter()
            .map(|a| {
                json!({
                    "id": a.id,
                    "display_name": a.display_name,
                    "refresh_token": a.masked_refresh_token(),
                    "refresh_token_expires_at": a.refresh_token_expires_at,
                    "refresh_token_expired": a.is_refresh_token_expired(now),
                    "scopes": a.scopes,
                })
            })
            .collect();
        self.print_json(&json!({
            "phase": snapshot.phase,
            "accounts": accounts,
            "last_error": snapshot.last_error,
            "last_synced_at": snapshot.last_synced_at,
        }));
    }
}

pub fn get_formatter(json: bool) -> Box<dyn OutputFormatter> {
    if json {
        Box::new(JsonFormatter)
    } else {
        Box::new(HumanFormatter)
    }
}

/// Fixed-width rows: header, separator, one row per account. Tokens already
/// expired at `now` are flagged in the EXPIRES column.
fn account_table(accounts: &[ConnectedAccount], now: DateTime<Utc>) -> Vec<String> {
    let rows: Vec<[String; 5]> = accounts
        .iter()
        .map(|a| {
            [
                a.id.clone(),
                a.label().to_string(),
                a.masked_refresh_token(),
                expiry_cell(a, now),
                a.scopes_display(),
            ]
        })
        .collect();

    let header = ["ID", "ACCOUNT", "REFRESH TOKEN", "EXPIRES", "SCOPES"];
    let mut widths = header.map(|h| h.chars().count());
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row.iter()).take(4) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let format_row = |cells: [&str; 5]| {
        let mut line = String::new();
        for (i, cell) in cells.iter().enumerate() {
            if i < 4 {
                line.push_str(&format!("{:<width$}  ", cell, width = widths[i]));
            } else {
                line.push_str(cell);
            }
        }
        line
    };

    let mut lines = vec![format_row(header)];
    lines.push(format_row(widths.map(|w| "-".repeat(w)).each_ref().map(|s| s.as_str())));
    for row in &rows {
        lines.push(format_row(row.each_ref().map(|s| s.as_str())));
    }
    lines
}

fn expiry_cell(account: &ConnectedAccount, now: DateTime<Utc>) -> String {
    if account.is_refresh_token_expired(now) {
        format!("{} (expired)", account.expiry_display())
    } else {
        account.expiry_display()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn account(id: &str, name: &str) -> ConnectedAccount {
        ConnectedAccount {
            id: id.to_string(),
            display_name: name.to_string(),
            refresh_token: "rft.0123456789abcdefghijKLMNOP".to_string(),
            refresh_token_expires_at: None,
            scopes: vec!["user.info.basic".to_string()],
        }
    }

    #[test]
    fn test_account_table_layout() {
        let lines = account_table(&[account("7301", "@organics.daily"), account("12", "")], Utc::now());
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("ID    ACCOUNT"));
        assert!(lines[2].contains("@organics.daily"));
        assert!(lines[2].contains("rft.0123456789abcdef..."));
        assert!(!lines[2].contains("KLMNOP"));
        assert!(lines[3].starts_with("12    12"));
        assert!(lines[3].ends_with("user.info.basic"));
    }

    #[test]
    fn test_account_table_flags_expired_tokens() {
        let expiry = Utc.with_ymd_and_hms(2026, 11, 2, 14, 30, 0).unwrap();
        let mut acct = account("7301", "@organics.daily");
        acct.refresh_token_expires_at = Some(expiry);

        let before = account_table(std::slice::from_ref(&acct), expiry - chrono::Duration::days(1));
        assert!(before[2].contains("Nov 02, 2026 14:30 UTC"));
        assert!(!before[2].contains("(expired)"));

        let after = account_table(&[acct, account("12", "")], expiry + chrono::Duration::hours(1));
        assert!(after[2].contains("Nov 02, 2026 14:30 UTC (expired)"));
        assert!(after[3].contains("No expiry"));
        assert!(!after[3].contains("(expired)"));
    }
}
