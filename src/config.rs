use std::time::Duration;

use anyhow::{bail, Context, Result};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the monitoring backend, without a trailing slash.
    pub base_url: String,
    /// Poll cycle interval in seconds.
    pub poll_interval_secs: u64,
    /// Per-request HTTP timeout in seconds.
    pub http_timeout_secs: u64,
    /// How often the dashboard view is recomputed, in seconds.
    pub render_interval_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a `Config` from an arbitrary key → value lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let optional = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_owned());

        Ok(Self {
            base_url: normalize_base_url(&optional("MONITOR_BASE_URL", "http://localhost:8000"))?,
            poll_interval_secs: parse_secs("POLL_INTERVAL_SECS", &optional("POLL_INTERVAL_SECS", "10"))?,
            http_timeout_secs: parse_secs("HTTP_TIMEOUT_SECS", &optional("HTTP_TIMEOUT_SECS", "10"))?,
            render_interval_secs: parse_secs(
                "RENDER_INTERVAL_SECS",
                &optional("RENDER_INTERVAL_SECS", "1"),
            )?,
        })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn render_interval(&self) -> Duration {
        Duration::from_secs(self.render_interval_secs)
    }
}

/// Trim whitespace and a trailing `/`, and require an `http(s)://` scheme.
fn normalize_base_url(raw: &str) -> Result<String> {
    let url = raw.trim().trim_end_matches('/');
    if !url.starts_with("http://") && !url.starts_with("https://") {
        bail!("MONITOR_BASE_URL must start with http:// or https://, got: {raw:?}");
    }
    Ok(url.to_owned())
}

fn parse_secs(key: &str, raw: &str) -> Result<u64> {
    let secs: u64 = raw
        .trim()
        .parse()
        .with_context(|| format!("{key} must be a positive integer, got: {raw:?}"))?;
    if secs == 0 {
        bail!("{key} must be a positive integer, got: 0");
    }
    Ok(secs)
}
