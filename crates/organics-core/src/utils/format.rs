use chrono::{DateTime, Utc};

/// Show the first `visible` characters of a secret followed by an ellipsis.
/// Secrets no longer than `visible` are still suffixed so the output never
/// reveals whether the full value was shown.
pub fn mask_secret(secret: &str, visible: usize) -> String {
    let shown: String = secret.chars().take(visible).collect();
    format!("{}...", shown)
}

/// Format a timestamp for display, e.g. "Nov 02, 2026 14:30 UTC"
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format("%b %d, %Y %H:%M UTC").to_string()
}

/// Relative age of `then` as seen from `now`, e.g. "just now", "5m ago", "2h ago"
pub fn format_age(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let minutes = (now - then).num_minutes();
    if minutes < 1 {
        // Clock skew lands here too
        "just now".to_string()
    } else if minutes < 60 {
        format!("{}m ago", minutes)
    } else if minutes < 1440 {
        let hours = minutes / 60;
        let remaining_mins = minutes % 60;
        if remaining_mins >= 30 {
            format!("{}h ago", hours + 1)
        } else {
            format!("{}h ago", hours)
        }
    } else {
        let days = minutes / 1440;
        let remaining_hours = (minutes % 1440) / 60;
        if remaining_hours >= 12 {
            format!("{}d ago", days + 1)
        } else {
            format!("{}d ago", days)
        }
    }
}
