use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Unauthorized - token may be expired")]
    Unauthorized,

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    /// 422 with the server's validation detail, already extracted.
    #[error("{0}")]
    Validation(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid API base URL: {0}")]
    InvalidBaseUrl(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        match body.char_indices().nth(MAX_ERROR_BODY_LENGTH) {
            None => body.to_string(),
            Some((cut, _)) => format!(
                "{}... (truncated, {} total bytes)",
                &body[..cut],
                body.len()
            ),
        }
    }

    /// Pull a human-readable message out of a `{"detail": ...}` error body.
    ///
    /// The backend reports either a plain string or a list of validation
    /// entries carrying a `msg` field. Anything else falls back to the
    /// (truncated) raw body.
    pub fn extract_detail(body: &str) -> String {
        let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
        let detail = parsed.as_ref().and_then(|v| v.get("detail"));

        match detail {
            Some(serde_json::Value::String(message)) => message.clone(),
            Some(serde_json::Value::Array(entries)) => {
                let messages: Vec<String> = entries
                    .iter()
                    .filter_map(|entry| {
                        let msg = entry.get("msg")?.as_str()?;
                        let field = entry
                            .get("loc")
                            .and_then(|loc| loc.as_array())
                            .and_then(|loc| loc.last())
                            .and_then(|last| last.as_str());
                        Some(match field {
                            Some(field) => format!("{}: {}", field, msg),
                            None => msg.to_string(),
                        })
                    })
                    .collect();
                if messages.is_empty() {
                    Self::truncate_body(body)
                } else {
                    messages.join("; ")
                }
            }
            _ => Self::truncate_body(body),
        }
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        match status.as_u16() {
            401 => ApiError::Unauthorized,
            403 => ApiError::AccessDenied(Self::extract_detail(body)),
            404 => ApiError::NotFound(Self::extract_detail(body)),
            422 => ApiError::Validation(Self::extract_detail(body)),
            429 => ApiError::RateLimited,
            500..=599 => ApiError::ServerError(Self::truncate_body(body)),
            _ => ApiError::InvalidResponse(format!(
                "Status {}: {}",
                status,
                Self::truncate_body(body)
            )),
        }
    }

    /// True when the request never produced a usable HTTP exchange.
    pub fn is_connectivity(&self) -> bool {
        match self {
            ApiError::NetworkError(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            _ => false,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ApiError::NetworkError(e) if e.is_timeout())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_from_status_classification() {
        assert!(matches!(
            ApiError::from_status(StatusCode::UNAUTHORIZED, ""),
            ApiError::Unauthorized
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::TOO_MANY_REQUESTS, ""),
            ApiError::RateLimited
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::BAD_GATEWAY, "upstream down"),
            ApiError::ServerError(ref body) if body == "upstream down"
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::IM_A_TEAPOT, "short and stout"),
            ApiError::InvalidResponse(_)
        ));
    }

    #[test]
    fn test_extract_detail_string() {
        let body = r#"{"detail": "Account not found"}"#;
        assert_eq!(ApiError::extract_detail(body), "Account not found");
        assert!(matches!(
            ApiError::from_status(StatusCode::NOT_FOUND, body),
            ApiError::NotFound(ref msg) if msg == "Account not found"
        ));
    }

    #[test]
    fn test_extract_detail_validation_array() {
        let body = r#"{"detail":[{"loc":["body","username"],"msg":"field required","type":"value_error.missing"},{"loc":["body","password"],"msg":"field required","type":"value_error.missing"}]}"#;
        assert_eq!(
            ApiError::extract_detail(body),
            "username: field required; password: field required"
        );
    }

    #[test]
    fn test_extract_detail_falls_back_to_body() {
        assert_eq!(ApiError::extract_detail("Bad Gateway"), "Bad Gateway");
        assert_eq!(ApiError::extract_detail(r#"{"error": "nope"}"#), r#"{"error": "nope"}"#);
    }

    #[test]
    fn test_truncate_body() {
        let long = "x".repeat(MAX_ERROR_BODY_LENGTH + 20);
        let truncated = ApiError::truncate_body(&long);
        assert!(truncated.starts_with(&"x".repeat(MAX_ERROR_BODY_LENGTH)));
        assert!(truncated.ends_with("(truncated, 520 total bytes)"));

        // Multi-byte characters must not be split
        let wide = "é".repeat(MAX_ERROR_BODY_LENGTH + 1);
        assert!(ApiError::truncate_body(&wide).contains("truncated"));
    }
}
