/// Failure of a single fetch against the monitoring backend.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Backend unreachable, timed out, or the body stream broke off.
    #[error("request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Backend answered with a non-success status.
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// Body was not JSON or lacked the expected array field.
    #[error("malformed response from {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Coarse classification of a [`FetchError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    Network,
    Protocol,
}

impl std::fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchErrorKind::Network => write!(f, "network error"),
            FetchErrorKind::Protocol => write!(f, "protocol error"),
        }
    }
}

impl FetchError {
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            FetchError::Network { .. } => FetchErrorKind::Network,
            FetchError::Status { .. } | FetchError::Body { .. } => FetchErrorKind::Protocol,
        }
    }

    pub fn url(&self) -> &str {
        match self {
            FetchError::Network { url, .. }
            | FetchError::Status { url, .. }
            | FetchError::Body { url, .. } => url,
        }
    }
}
