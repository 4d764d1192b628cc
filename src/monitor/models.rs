use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};

// ---------------------------------------------------------------------------
// Alert: element of GET /alerts/recent
// ---------------------------------------------------------------------------

/// A power spike recorded by the backend.
///
/// The backend keys documents by `_id`; a plain `id` is accepted as well.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Alert {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,

    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,

    /// Appliance label, e.g. `"laptop"`.
    pub appliance_id: String,

    /// Measured power in watts.
    pub power: f64,

    /// Forecast spike threshold in watts that `power` exceeded.
    pub threshold: f64,

    pub message: String,
}

// ---------------------------------------------------------------------------
// Reading: element of GET /readings/recent
// ---------------------------------------------------------------------------

/// One sampled power measurement.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Reading {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,

    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,

    /// Power in watts.
    pub power: f64,
}

// ---------------------------------------------------------------------------
// Response envelopes
//
// Both endpoints wrap their payload in an object with a single named array:
//
//   { "alerts":   [ <Alert>, ... ] }
//   { "readings": [ <Reading>, ... ] }
//
// A missing or non-array field fails deserialization.
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct AlertsEnvelope {
    pub alerts: Vec<Alert>,
}

#[derive(Debug, Deserialize)]
pub struct ReadingsEnvelope {
    pub readings: Vec<Reading>,
}

// ---------------------------------------------------------------------------
// Timestamps
//
// Stored datetimes come back without an offset (`2024-05-01T12:30:00.123`).
// Those are read as UTC; anything carrying an offset is converted to UTC.
// ---------------------------------------------------------------------------

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).map_err(serde::de::Error::custom)
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(dt) => Ok(dt.with_timezone(&Utc)),
        Err(_) => raw.parse::<NaiveDateTime>().map(|naive| naive.and_utc()),
    }
}
