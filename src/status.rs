use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};

use crate::monitor::models::Alert;

/// How long after its timestamp an alert keeps the system critical.
pub const CRITICAL_WINDOW: TimeDelta = TimeDelta::minutes(5);

/// System-wide status derived from alert recency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Criticality {
    Critical,
    Normal,
}

impl fmt::Display for Criticality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Criticality::Critical => "critical",
            Criticality::Normal => "normal",
        };
        f.write_str(s)
    }
}

/// The alert with the newest timestamp; ties go to the earliest position.
///
/// The backend delivers newest first, in which case this is `alerts[0]`.
/// Scanning keeps the answer right if that ordering is ever broken.
pub fn latest_alert(alerts: &[Alert]) -> Option<&Alert> {
    alerts.iter().fold(None, |best: Option<&Alert>, alert| match best {
        Some(b) if b.timestamp >= alert.timestamp => Some(b),
        _ => Some(alert),
    })
}

/// `Critical` iff the latest alert is strictly younger than [`CRITICAL_WINDOW`].
///
/// Must be called on every read: the result changes as `now` advances even
/// when `alerts` does not.
pub fn derive_criticality(alerts: &[Alert], now: DateTime<Utc>) -> Criticality {
    match latest_alert(alerts) {
        Some(alert) if now - alert.timestamp < CRITICAL_WINDOW => Criticality::Critical,
        _ => Criticality::Normal,
    }
}
