use std::fmt::{self, Display};

use chrono::{DateTime, Local, TimeZone, Utc};

use crate::{
    chart::{chart_points, ChartPoint},
    monitor::{error::FetchErrorKind, models::Alert},
    poller::SyncSnapshot,
    status::{derive_criticality, latest_alert, Criticality},
};

const CLOCK_FORMAT: &str = "%H:%M:%S";

/// One entry of the recent-alerts list.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertRow {
    pub appliance: String,
    pub time: String,
    pub power: String,
    pub limit: String,
    pub message: String,
}

/// Everything the text dashboard shows, computed from one snapshot.
///
/// Criticality is derived at capture time; capture again to see an alert
/// age out.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardView {
    pub criticality: Criticality,
    pub loading: bool,
    pub detail: String,
    pub last_updated: String,
    pub consecutive_failures: u32,
    /// Kind of the error that ended the last cycle, if it failed.
    pub last_error: Option<FetchErrorKind>,
    pub chart: Vec<ChartPoint>,
    pub alerts: Vec<AlertRow>,
}

impl DashboardView {
    pub fn capture(snapshot: &SyncSnapshot, now: DateTime<Utc>) -> Self {
        Self::capture_in(snapshot, now, &Local)
    }

    pub fn capture_in<Tz>(snapshot: &SyncSnapshot, now: DateTime<Utc>, tz: &Tz) -> Self
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        let criticality = derive_criticality(&snapshot.alerts, now);
        let detail = match (criticality, latest_alert(&snapshot.alerts)) {
            (Criticality::Critical, Some(alert)) => alert.message.clone(),
            _ => "Power consumption is within expected range.".to_owned(),
        };

        Self {
            criticality,
            loading: snapshot.loading,
            detail,
            last_updated: snapshot
                .last_updated
                .map(|t| clock(&t, tz))
                .unwrap_or_default(),
            consecutive_failures: snapshot.consecutive_failures,
            last_error: snapshot.last_error.as_ref().map(|e| e.kind()),
            chart: chart_points(&snapshot.readings, tz),
            alerts: snapshot.alerts.iter().map(|a| alert_row(a, tz)).collect(),
        }
    }

    pub fn status_label(&self) -> &'static str {
        match self.criticality {
            Criticality::Critical => "CRITICAL ALERT",
            Criticality::Normal => "SYSTEM NORMAL",
        }
    }

    pub fn headline(&self) -> &'static str {
        match self.criticality {
            Criticality::Critical => "Spike Detected!",
            Criticality::Normal => "All Systems Safe",
        }
    }

    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl Display for DashboardView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let spinner = if self.loading { "  (refreshing...)" } else { "" };

        writeln!(f, "Energy Monitor  [{}]{spinner}", self.status_label())?;
        writeln!(f)?;
        writeln!(f, "Current Status: {}", self.headline())?;
        writeln!(f, "  {}", self.detail)?;
        writeln!(f, "  Last updated: {}", self.last_updated)?;
        if self.consecutive_failures > 0 {
            write!(
                f,
                "  Showing last good data ({} failed refreshes",
                self.consecutive_failures
            )?;
            if let Some(kind) = self.last_error {
                write!(f, ", last: {kind}")?;
            }
            writeln!(f, ")")?;
        }

        writeln!(f)?;
        writeln!(f, "Live Power Usage (Last Hour)")?;
        if self.chart.is_empty() {
            writeln!(f, "  Waiting for data...")?;
        }
        for point in &self.chart {
            writeln!(f, "  {}  {}W", point.display_time, point.power)?;
        }

        writeln!(f)?;
        writeln!(f, "Recent Alerts")?;
        if self.alerts.is_empty() {
            writeln!(f, "  No alerts in the last hour. Great job!")?;
        }
        for row in &self.alerts {
            writeln!(
                f,
                "  [{}] {}  {} / {} Limit",
                row.appliance, row.time, row.power, row.limit
            )?;
            writeln!(f, "    {}", row.message)?;
        }

        Ok(())
    }
}

fn clock<Tz>(t: &DateTime<Utc>, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    t.with_timezone(tz).format(CLOCK_FORMAT).to_string()
}

fn alert_row<Tz>(alert: &Alert, tz: &Tz) -> AlertRow
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    AlertRow {
        appliance: alert.appliance_id.clone(),
        time: clock(&alert.timestamp, tz),
        power: format!("{}W", alert.power),
        limit: format!("{:.2}W", alert.threshold),
        message: alert.message.clone(),
    }
}
