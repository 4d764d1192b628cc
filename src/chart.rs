use chrono::TimeZone;

use crate::monitor::models::Reading;

/// Zero-padded 24-hour `HH:MM`.
pub const DISPLAY_TIME_FORMAT: &str = "%H:%M";

/// One plotted point of the live power chart.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartPoint {
    pub display_time: String,
    pub power: f64,
}

/// Map readings to chart points, formatting times in `tz`.
///
/// One point per reading, input order preserved. An empty slice yields an
/// empty vec, which callers render as "no data yet".
pub fn chart_points<Tz>(readings: &[Reading], tz: &Tz) -> Vec<ChartPoint>
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    readings
        .iter()
        .map(|r| ChartPoint {
            display_time: r
                .timestamp
                .with_timezone(tz)
                .format(DISPLAY_TIME_FORMAT)
                .to_string(),
            power: r.power,
        })
        .collect()
}
