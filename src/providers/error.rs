use std::fmt;

/// Classified provider error — tells the caller *why* the API call failed
/// so it can pick the right recovery strategy.
#[derive(Debug)]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub status: Option<u16>,
    pub message: String,
    /// Seconds to wait before retrying (from 429 Retry-After body).
    pub retry_after_secs: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// 401/403 — bad API key or permissions.
    Auth,
    /// 400 — malformed request; retrying the same payload cannot help.
    BadRequest,
    /// 402 — billing/quota exhausted.
    Billing,
    /// 429 — rate limited; check retry_after_secs.
    RateLimit,
    /// 404 or "model not found" — bad model name.
    NotFound,
    /// 408, request timeout, or provider took too long.
    Timeout,
    /// Connection refused, DNS failure, reset, etc.
    Network,
    /// 500/502/503/504 — provider-side outage.
    ServerError,
    /// Anything else.
    Unknown,
}

impl ProviderError {
    pub fn from_status(status: u16, body: &str) -> Self {
        let kind = match status {
            400 => ProviderErrorKind::BadRequest,
            401 | 403 => ProviderErrorKind::Auth,
            402 => ProviderErrorKind::Billing,
            404 => ProviderErrorKind::NotFound,
            408 => ProviderErrorKind::Timeout,
            429 => ProviderErrorKind::RateLimit,
            500 | 502 | 503 | 504 => ProviderErrorKind::ServerError,
            _ => ProviderErrorKind::Unknown,
        };

        // Try to extract retry_after from JSON body for 429s
        let retry_after_secs = if kind == ProviderErrorKind::RateLimit {
            extract_retry_after(body)
        } else {
            None
        };

        Self {
            kind,
            status: Some(status),
            message: truncate_body(body),
            retry_after_secs,
        }
    }

    pub fn network(err: &reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            ProviderErrorKind::Timeout
        } else {
            ProviderErrorKind::Network
        };
        Self {
            kind,
            status: None,
            message: err.to_string(),
            retry_after_secs: None,
        }
    }

    /// Whether this error is worth retrying with the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            ProviderErrorKind::RateLimit
                | ProviderErrorKind::Timeout
                | ProviderErrorKind::Network
                | ProviderErrorKind::ServerError
        )
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(status) = self.status {
            write!(
                f,
                "Provider error ({}, {:?}): {}",
                status, self.kind, self.message
            )
        } else {
            write!(f, "Provider error ({:?}): {}", self.kind, self.message)
        }
    }
}

impl std::error::Error for ProviderError {}

/// Try to parse retry_after from a JSON response body.
/// Handles: {"error": {"retry_after": 5}} and {"retry_after": 5}
fn extract_retry_after(body: &str) -> Option<u64> {
    let v: serde_json::Value = serde_json::from_str(body).ok()?;
    v["error"]["retry_after"]
        .as_u64()
        .or_else(|| v["retry_after"].as_u64())
        .or_else(|| {
            // Some providers use a float
            v["error"]["retry_after"]
                .as_f64()
                .or_else(|| v["retry_after"].as_f64())
                .map(|f| f.ceil() as u64)
        })
}

fn truncate_body(body: &str) -> String {
    if body.len() > 300 {
        let mut end = 300;
        while end > 0 && !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &body[..end])
    } else {
        body.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert_eq!(
            ProviderError::from_status(401, "").kind,
            ProviderErrorKind::Auth
        );
        assert_eq!(
            ProviderError::from_status(400, "").kind,
            ProviderErrorKind::BadRequest
        );
        assert_eq!(
            ProviderError::from_status(429, "").kind,
            ProviderErrorKind::RateLimit
        );
        assert_eq!(
            ProviderError::from_status(503, "").kind,
            ProviderErrorKind::ServerError
        );
        assert_eq!(
            ProviderError::from_status(418, "").kind,
            ProviderErrorKind::Unknown
        );
    }

    #[test]
    fn retryable_kinds() {
        assert!(ProviderError::from_status(429, "").is_retryable());
        assert!(ProviderError::from_status(502, "").is_retryable());
        assert!(!ProviderError::from_status(401, "").is_retryable());
        assert!(!ProviderError::from_status(400, "").is_retryable());
    }

    #[test]
    fn retry_after_from_nested_body() {
        let err = ProviderError::from_status(429, r#"{"error":{"retry_after":7}}"#);
        assert_eq!(err.retry_after_secs, Some(7));
    }

    #[test]
    fn retry_after_from_flat_float_body() {
        let err = ProviderError::from_status(429, r#"{"retry_after":2.3}"#);
        assert_eq!(err.retry_after_secs, Some(3));
    }

    #[test]
    fn long_body_truncated() {
        let body = "x".repeat(1000);
        let err = ProviderError::from_status(500, &body);
        assert!(err.message.len() < 400);
        assert!(err.message.ends_with("..."));
    }
}
