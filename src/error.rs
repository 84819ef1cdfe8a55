use thiserror::Error;

/// Failures of a single page fetch. The display string is what ends up in
/// the store's `error` field.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Too many requests: market data rate limit exceeded (HTTP 429)")]
    RateLimited,

    #[error("Market data request timed out")]
    Timeout,

    #[error("Market data provider returned HTTP {status}")]
    Status { status: u16 },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Fetch was cancelled before it completed")]
    Aborted,
}

impl FetchError {
    /// Maps a non-success HTTP status. 429 gets its own variant so it can be
    /// told apart in logs.
    pub fn from_status(status: u16) -> Self {
        if status == 429 {
            FetchError::RateLimited
        } else {
            FetchError::Status { status }
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, FetchError::RateLimited)
    }

    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::RateLimited => "rate_limited",
            FetchError::Timeout => "timeout",
            FetchError::Status { .. } => "status",
            FetchError::Network(_) => "network",
            FetchError::Aborted => "aborted",
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else if let Some(status) = err.status() {
            FetchError::from_status(status.as_u16())
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_429_is_rate_limit() {
        assert!(FetchError::from_status(429).is_rate_limited());
        assert!(!FetchError::from_status(503).is_rate_limited());
        assert_eq!(
            FetchError::from_status(503).to_string(),
            "Market data provider returned HTTP 503"
        );
        assert_eq!(FetchError::RateLimited.kind(), "rate_limited");
    }
}
