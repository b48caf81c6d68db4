//! # Dashboard Metrics
//! Point-in-time summary statistics over the merged feed. All window
//! boundaries are offsets from `now` with a closed upper bound — never
//! calendar-day truncation, which would wobble across timezones for
//! globally distributed sources.

use std::collections::HashSet;

use serde::Serialize;

use crate::event::{Event, Severity, ThreatLevel};
use crate::severity;

const DAY_SECS: u64 = 24 * 3600;
const WEEK_SECS: u64 = 7 * DAY_SECS;

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct PercentageChanges {
    pub events: f64,
    pub fatalities: f64,
    pub active_locations: f64,
    pub critical_alerts: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardMetrics {
    pub events_today: usize,
    pub fatalities_today: u64,
    pub events_yesterday: usize,
    pub fatalities_yesterday: u64,
    /// Distinct locations over the trailing 7 days.
    pub active_locations: usize,
    /// High/Critical events over the trailing 24h.
    pub critical_alerts: usize,
    pub global_threat_level: ThreatLevel,
    pub percentage_changes: PercentageChanges,
}

/// Percentage delta between a current and prior window, special-cased when
/// the prior period is zero: any growth from nothing reads as +100, and
/// nothing-to-nothing reads as 0.
pub fn calculate_percentage_change(current: u64, previous: u64) -> f64 {
    if previous == 0 {
        return if current > 0 { 100.0 } else { 0.0 };
    }
    let raw = (current as f64 - previous as f64) / previous as f64 * 100.0;
    (raw * 10.0).round() / 10.0
}

/// `start < timestamp <= end`
fn in_window(ev: &Event, start: u64, end: u64) -> bool {
    ev.timestamp > start && ev.timestamp <= end
}

pub fn calculate(events: &[Event], now: u64) -> DashboardMetrics {
    let today_start = now.saturating_sub(DAY_SECS);
    let yesterday_start = now.saturating_sub(2 * DAY_SECS);
    let week_start = now.saturating_sub(WEEK_SECS);
    let prior_week_start = now.saturating_sub(2 * WEEK_SECS);

    let mut events_today = 0usize;
    let mut fatalities_today = 0u64;
    let mut events_yesterday = 0usize;
    let mut fatalities_yesterday = 0u64;
    let mut locations: HashSet<&str> = HashSet::new();
    let mut prior_locations: HashSet<&str> = HashSet::new();
    let mut critical_alerts = 0usize;
    let mut prior_critical_alerts = 0usize;

    for ev in events {
        if in_window(ev, today_start, now) {
            events_today += 1;
            fatalities_today += u64::from(ev.fatalities);
            if ev.severity >= Severity::High {
                critical_alerts += 1;
            }
        } else if in_window(ev, yesterday_start, today_start) {
            events_yesterday += 1;
            fatalities_yesterday += u64::from(ev.fatalities);
            if ev.severity >= Severity::High {
                prior_critical_alerts += 1;
            }
        }

        if in_window(ev, week_start, now) {
            locations.insert(ev.location.as_str());
        } else if in_window(ev, prior_week_start, week_start) {
            prior_locations.insert(ev.location.as_str());
        }
    }

    let percentage_changes = PercentageChanges {
        events: calculate_percentage_change(events_today as u64, events_yesterday as u64),
        fatalities: calculate_percentage_change(fatalities_today, fatalities_yesterday),
        active_locations: calculate_percentage_change(
            locations.len() as u64,
            prior_locations.len() as u64,
        ),
        critical_alerts: calculate_percentage_change(
            critical_alerts as u64,
            prior_critical_alerts as u64,
        ),
    };

    DashboardMetrics {
        events_today,
        fatalities_today,
        events_yesterday,
        fatalities_yesterday,
        active_locations: locations.len(),
        critical_alerts,
        global_threat_level: severity::global_threat_level(events, now),
        percentage_changes,
    }
}
