//! Streak, engagement tier and loyalty scoring.
//!
//! Everything here is a pure fold over check-in history; the cached
//! `EngagementStats` on the entity is only ever the output of
//! [`compute_stats`].

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};

use crate::model::attendance::{AttendanceRecord, TimeSlot};
use crate::model::entity::{EngagementLevel, EngagementStats};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreakSummary {
    pub current: u32,
    pub longest: u32,
}

/// Current and longest runs of consecutive visit days. The current streak
/// survives when the most recent visit was yesterday, and is zero once the
/// gap reaches two days.
pub fn calculate_streak(days: &BTreeSet<NaiveDate>, today: NaiveDate) -> StreakSummary {
    if days.is_empty() {
        return StreakSummary { current: 0, longest: 0 };
    }

    let mut longest = 1u32;
    let mut run = 1u32;
    let mut prev: Option<NaiveDate> = None;
    for day in days {
        if let Some(p) = prev {
            if *day - p == Duration::days(1) {
                run += 1;
            } else {
                run = 1;
            }
            longest = longest.max(run);
        }
        prev = Some(*day);
    }

    let anchor = if days.contains(&today) {
        Some(today)
    } else if days.contains(&(today - Duration::days(1))) {
        Some(today - Duration::days(1))
    } else {
        None
    };

    let current = match anchor {
        Some(mut day) => {
            let mut count = 1u32;
            while days.contains(&(day - Duration::days(1))) {
                count += 1;
                day = day - Duration::days(1);
            }
            count
        }
        None => 0,
    };

    StreakSummary { current, longest: longest.max(current) }
}

/// Time-based tiers beat frequency tiers: a long absence marks the entity
/// dormant or at-risk no matter how busy the month started out.
pub fn engagement_level(
    this_month_visits: u32,
    last_visited_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> EngagementLevel {
    let last = match last_visited_at {
        Some(last) => last,
        None => return EngagementLevel::Dormant,
    };

    let days_since = (now.date_naive() - last.date_naive()).num_days();
    if days_since >= 30 {
        return EngagementLevel::Dormant;
    }
    if days_since >= 14 {
        return EngagementLevel::AtRisk;
    }

    match this_month_visits {
        v if v >= 12 => EngagementLevel::HighlyActive,
        v if v >= 8 => EngagementLevel::Active,
        v if v >= 4 => EngagementLevel::Regular,
        v if v >= 1 => EngagementLevel::Occasional,
        _ => EngagementLevel::Inactive,
    }
}

/// 0..=100 weighted score: visit volume 40, streak 30, monthly cadence 20,
/// tenure 10, each term capped.
pub fn loyalty_score(
    total_visits: u64,
    current_streak: u32,
    monthly_average: f64,
    months_since_first: f64,
) -> u8 {
    let visits = (total_visits as f64 / 200.0 * 40.0).min(40.0);
    let streak = (current_streak as f64 / 90.0 * 30.0).min(30.0);
    let cadence = (monthly_average / 15.0 * 20.0).min(20.0);
    let tenure = (months_since_first / 24.0 * 10.0).min(10.0);
    ((visits + streak + cadence + tenure).round() as u64).min(100) as u8
}

fn months_between(from: (i32, u32), to: (i32, u32)) -> i64 {
    (to.0 as i64 - from.0 as i64) * 12 + to.1 as i64 - from.1 as i64
}

/// Rebuild the full stats snapshot from period records. Invalidated
/// entries are excluded; the caller passes records already reflecting any
/// mutation in flight, so the level is always computed after the newest
/// visit is folded in.
pub fn compute_stats(records: &[&AttendanceRecord], now: DateTime<Utc>) -> EngagementStats {
    let mut timestamps: Vec<DateTime<Utc>> = records
        .iter()
        .flat_map(|r| r.countable_entries().map(|e| e.check_in))
        .collect();
    timestamps.sort();

    if timestamps.is_empty() {
        return EngagementStats::empty(now);
    }

    let first = timestamps[0];
    let last = timestamps[timestamps.len() - 1];
    let total_visits = timestamps.len() as u64;

    let days: BTreeSet<NaiveDate> = timestamps.iter().map(|t| t.date_naive()).collect();
    let streak = calculate_streak(&days, now.date_naive());

    let this_period = (now.year(), now.month());
    let last_period = if now.month() == 1 {
        (now.year() - 1, 12)
    } else {
        (now.year(), now.month() - 1)
    };
    let this_month_visits = timestamps
        .iter()
        .filter(|t| (t.year(), t.month()) == this_period)
        .count() as u32;
    let last_month_visits = timestamps
        .iter()
        .filter(|t| (t.year(), t.month()) == last_period)
        .count() as u32;

    let months_active = months_between((first.year(), first.month()), this_period).max(0) + 1;
    let monthly_average = total_visits as f64 / months_active as f64;

    let mut slot_counts: BTreeMap<TimeSlot, u32> = BTreeMap::new();
    for record in records {
        for entry in record.countable_entries() {
            *slot_counts.entry(entry.time_slot).or_insert(0) += 1;
        }
    }
    let favorite_time_slot = slot_counts
        .iter()
        .max_by_key(|(_, count)| **count)
        .map(|(slot, _)| *slot);

    let months_since_first =
        months_between((first.year(), first.month()), this_period).max(0) as f64;

    EngagementStats {
        total_visits,
        first_visit_at: Some(first),
        last_visited_at: Some(last),
        current_streak: streak.current,
        longest_streak: streak.longest,
        monthly_average,
        this_month_visits,
        last_month_visits,
        engagement_level: engagement_level(this_month_visits, Some(last), now),
        days_since_last_visit: Some((now.date_naive() - last.date_naive()).num_days()),
        favorite_time_slot,
        loyalty_score: loyalty_score(
            total_visits,
            streak.current,
            monthly_average,
            months_since_first,
        ),
        updated_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn consecutive_days_build_streak() {
        let days: BTreeSet<NaiveDate> =
            [d(2026, 3, 1), d(2026, 3, 2), d(2026, 3, 3)].into_iter().collect();
        let s = calculate_streak(&days, d(2026, 3, 3));
        assert_eq!(s.current, 3);
        assert_eq!(s.longest, 3);
    }

    #[test]
    fn streak_survives_a_single_day_gap_from_today() {
        let days: BTreeSet<NaiveDate> =
            [d(2026, 3, 1), d(2026, 3, 2)].into_iter().collect();
        // last visit was yesterday
        let s = calculate_streak(&days, d(2026, 3, 3));
        assert_eq!(s.current, 2);
        // two days ago: streak dead
        let s = calculate_streak(&days, d(2026, 3, 4));
        assert_eq!(s.current, 0);
        assert_eq!(s.longest, 2);
    }

    #[test]
    fn gap_resets_current_but_longest_remembers() {
        let days: BTreeSet<NaiveDate> = [
            d(2026, 2, 10),
            d(2026, 2, 11),
            d(2026, 2, 12),
            d(2026, 2, 13),
            // gap
            d(2026, 3, 2),
            d(2026, 3, 3),
        ]
        .into_iter()
        .collect();
        let s = calculate_streak(&days, d(2026, 3, 3));
        assert_eq!(s.current, 2);
        assert_eq!(s.longest, 4);
        assert!(s.longest >= s.current);
    }

    #[test]
    fn time_tiers_take_precedence_over_frequency() {
        let now = Utc.with_ymd_and_hms(2026, 3, 31, 12, 0, 0).unwrap();
        // 20 visits this month but last one 31 days ago
        let long_ago = now - Duration::days(31);
        assert_eq!(engagement_level(20, Some(long_ago), now), EngagementLevel::Dormant);
        let two_weeks = now - Duration::days(15);
        assert_eq!(engagement_level(20, Some(two_weeks), now), EngagementLevel::AtRisk);
        // never visited
        assert_eq!(engagement_level(0, None, now), EngagementLevel::Dormant);
    }

    #[test]
    fn frequency_tiers() {
        let now = Utc.with_ymd_and_hms(2026, 3, 31, 12, 0, 0).unwrap();
        let recent = now - Duration::days(1);
        assert_eq!(engagement_level(12, Some(recent), now), EngagementLevel::HighlyActive);
        assert_eq!(engagement_level(8, Some(recent), now), EngagementLevel::Active);
        assert_eq!(engagement_level(4, Some(recent), now), EngagementLevel::Regular);
        assert_eq!(engagement_level(1, Some(recent), now), EngagementLevel::Occasional);
        assert_eq!(engagement_level(0, Some(recent), now), EngagementLevel::Inactive);
    }

    #[test]
    fn loyalty_terms_are_capped() {
        // everything far beyond the caps still lands at 100
        assert_eq!(loyalty_score(10_000, 1000, 100.0, 240.0), 100);
        assert_eq!(loyalty_score(0, 0, 0.0, 0.0), 0);
        // half the visit cap alone: 100/200 * 40 = 20
        assert_eq!(loyalty_score(100, 0, 0.0, 0.0), 20);
    }

    #[test]
    fn compute_stats_folds_history() {
        use crate::model::Actor;
        use crate::model::attendance::{AttendanceRecord, CheckInEntry, CheckInMethod, PeriodKey};

        let mut rec = AttendanceRecord::new(PeriodKey::new("t1", "member", "m1", 2026, 3));
        for day in 1..=3 {
            let at = Utc.with_ymd_and_hms(2026, 3, day, 9, 0, 0).unwrap();
            rec.append_check_in(CheckInEntry::new(
                format!("c{day}"),
                at,
                None,
                CheckInMethod::Qr,
                Actor::new("a", "A", "staff"),
                None,
            ));
        }

        let now = Utc.with_ymd_and_hms(2026, 3, 3, 18, 0, 0).unwrap();
        let stats = compute_stats(&[&rec], now);
        assert_eq!(stats.total_visits, 3);
        assert_eq!(stats.current_streak, 3);
        assert_eq!(stats.this_month_visits, 3);
        assert_eq!(stats.days_since_last_visit, Some(0));
        assert_eq!(stats.favorite_time_slot, Some(TimeSlot::Morning));
        // 3 visits this month, last visit today
        assert_eq!(stats.engagement_level, EngagementLevel::Occasional);
    }
}
