//! # Severity Classifier
//! Pure, testable scoring that maps a fully-normalized event → severity tier,
//! plus the global threat level aggregate over the recent window. No I/O and
//! no hidden state, so every branch is directly unit-testable.
//!
//! Policy: a non-zero floor (every incident has baseline severity) plus
//! addends for fatality count, category lethality, source trust, and
//! recency, bucketed into the four tiers. The score is monotone in the
//! fatality count for fixed other inputs.

use crate::event::{Category, Event, Severity, SourceKind, ThreatLevel};

/// Events younger than this get the recency addend.
const RECENT_SECS: u64 = 6 * 3600;

/// Window for the global threat level aggregate.
const THREAT_WINDOW_SECS: u64 = 24 * 3600;

/// Classify one event. `now` is the fetch time of the aggregation pass so
/// the result is deterministic for a given input pair.
pub fn classify(
    category: Category,
    fatalities: u32,
    source: SourceKind,
    verified: bool,
    timestamp: u64,
    now: u64,
) -> Severity {
    let score = score_event(category, fatalities, source, verified, timestamp, now);
    bucket(score)
}

fn score_event(
    category: Category,
    fatalities: u32,
    source: SourceKind,
    verified: bool,
    timestamp: u64,
    now: u64,
) -> u32 {
    // Baseline floor: zero-fatality incidents still carry severity.
    let mut score = 1u32;

    score += match fatalities {
        0 => 0,
        1..=4 => 1,
        5..=9 => 2,
        10..=24 => 3,
        25..=99 => 4,
        _ => 5,
    };

    score += match category {
        Category::Bombing | Category::ViolenceAgainstCivilians => 2,
        Category::Battle | Category::CyberAttack | Category::Humanitarian => 1,
        Category::Protest | Category::Other => 0,
    };

    if verified || source.is_reliable() {
        score += 1;
    }

    if now.saturating_sub(timestamp) < RECENT_SECS {
        score += 1;
    }

    score
}

fn bucket(score: u32) -> Severity {
    match score {
        0..=2 => Severity::Low,
        3..=5 => Severity::Medium,
        6..=7 => Severity::High,
        _ => Severity::Critical,
    }
}

/// Global threat level over the trailing 24h: critical-event density and
/// total fatalities each map to a level independently; the more critical
/// one wins when both partially trigger.
pub fn global_threat_level(events: &[Event], now: u64) -> ThreatLevel {
    let cutoff = now.saturating_sub(THREAT_WINDOW_SECS);

    let mut critical_count = 0usize;
    let mut fatalities: u64 = 0;
    for ev in events {
        if ev.timestamp <= now && ev.timestamp > cutoff {
            if ev.severity == Severity::Critical {
                critical_count += 1;
            }
            fatalities += u64::from(ev.fatalities);
        }
    }

    let by_count = match critical_count {
        0 => ThreatLevel::Minimal,
        1..=2 => ThreatLevel::Elevated,
        3..=5 => ThreatLevel::High,
        6..=9 => ThreatLevel::Severe,
        _ => ThreatLevel::Critical,
    };

    let by_fatalities = match fatalities {
        0..=19 => ThreatLevel::Minimal,
        20..=74 => ThreatLevel::Elevated,
        75..=199 => ThreatLevel::High,
        200..=499 => ThreatLevel::Severe,
        _ => ThreatLevel::Critical,
    };

    by_count.max(by_fatalities)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Coordinates;

    fn ev(severity: Severity, fatalities: u32, age_secs: u64, now: u64) -> Event {
        Event {
            id: "t-1".into(),
            location: "Ukraine".into(),
            coordinates: Coordinates::UNKNOWN,
            timestamp: now - age_secs,
            category: Category::Battle,
            source: SourceKind::News,
            fatalities,
            actors: vec![],
            severity,
            verified: false,
            tags: vec![],
        }
    }

    #[test]
    fn zero_fatality_protest_is_low_floor() {
        let s = classify(
            Category::Protest,
            0,
            SourceKind::Social,
            false,
            0,
            1_000_000_000,
        );
        assert_eq!(s, Severity::Low);
    }

    #[test]
    fn mass_casualty_bombing_is_critical() {
        let now = 1_000_000_000;
        let s = classify(
            Category::Bombing,
            120,
            SourceKind::StructuredApi,
            true,
            now - 60,
            now,
        );
        assert_eq!(s, Severity::Critical);
    }

    #[test]
    fn monotone_in_fatalities() {
        let now = 1_000_000_000u64;
        let mut prev = Severity::Low;
        for f in [0u32, 1, 4, 5, 9, 10, 24, 25, 99, 100, 10_000] {
            let s = classify(Category::Battle, f, SourceKind::News, false, now - 60, now);
            assert!(s >= prev, "severity regressed at fatalities={f}");
            prev = s;
        }
    }

    #[test]
    fn recency_and_trust_raise_the_tier() {
        let now = 1_000_000_000u64;
        let old_untrusted =
            classify(Category::Battle, 5, SourceKind::Social, false, now - 48 * 3600, now);
        let fresh_trusted =
            classify(Category::Battle, 5, SourceKind::StructuredApi, true, now - 60, now);
        assert!(fresh_trusted > old_untrusted);
    }

    #[test]
    fn threat_level_max_of_count_and_fatalities() {
        let now = 1_000_000_000u64;
        // One critical event (Elevated by count) but massive fatalities.
        let events = vec![ev(Severity::Critical, 600, 3600, now)];
        assert_eq!(global_threat_level(&events, now), ThreatLevel::Critical);

        // Many criticals, few fatalities: count dominates.
        let many: Vec<Event> = (0..12).map(|_| ev(Severity::Critical, 0, 3600, now)).collect();
        assert_eq!(global_threat_level(&many, now), ThreatLevel::Critical);
    }

    #[test]
    fn threat_level_ignores_events_outside_window() {
        let now = 1_000_000_000u64;
        let events = vec![ev(Severity::Critical, 600, 25 * 3600, now)];
        assert_eq!(global_threat_level(&events, now), ThreatLevel::Minimal);
    }

    #[test]
    fn quiet_day_is_minimal() {
        let now = 1_000_000_000u64;
        let events = vec![ev(Severity::Low, 0, 3600, now), ev(Severity::Medium, 2, 7200, now)];
        assert_eq!(global_threat_level(&events, now), ThreatLevel::Minimal);
    }
}
