//! Attendance type classification.
//!
//! Pure: identical inputs always give the identical type, with no clock
//! access beyond the passed check-in time, so reclassifying historical
//! entries during corrections reproduces exactly.

use chrono::{DateTime, Timelike, Utc};

use crate::model::attendance::AttendanceType;
use crate::model::entity::EntitySchedule;
use crate::model::settings::{AttendanceSettings, ClassifierMode};

/// Classify a closed check-in from its duration, the entity's schedule
/// (if any) and the per-entity-type settings.
pub fn classify(
    check_in: DateTime<Utc>,
    duration_minutes: i64,
    schedule: Option<&EntitySchedule>,
    settings: &AttendanceSettings,
) -> AttendanceType {
    let hours = duration_minutes as f64 / 60.0;

    match settings.mode {
        ClassifierMode::TimeBased => {
            if duration_minutes >= settings.min_visit_minutes {
                AttendanceType::FullDay
            } else {
                // too short to count toward work-day totals
                AttendanceType::UnpaidLeave
            }
        }
        ClassifierMode::ScheduleAware => match schedule {
            Some(schedule) => {
                let standard = standard_hours(schedule).unwrap_or(settings.default_standard_hours);
                let pct = hours / standard * 100.0;
                if pct >= settings.overtime_threshold_pct {
                    AttendanceType::Overtime
                } else if pct >= settings.full_day_threshold_pct {
                    AttendanceType::FullDay
                } else if pct >= settings.half_day_threshold_pct {
                    half_day(check_in, settings)
                } else {
                    AttendanceType::UnpaidLeave
                }
            }
            // no schedule at all: fixed hour thresholds
            None => {
                if hours >= settings.fixed_overtime_hours {
                    AttendanceType::Overtime
                } else if hours >= settings.fixed_full_day_hours {
                    AttendanceType::FullDay
                } else if hours >= settings.fixed_half_day_hours {
                    half_day(check_in, settings)
                } else {
                    AttendanceType::UnpaidLeave
                }
            }
        },
    }
}

/// Standard daily hours, resolved in order: explicit hours/day, hours/week
/// over the working-day count, shift span.
pub fn standard_hours(schedule: &EntitySchedule) -> Option<f64> {
    if let Some(h) = schedule.hours_per_day.filter(|h| *h > 0.0) {
        return Some(h);
    }
    if let Some(week) = schedule.hours_per_week.filter(|h| *h > 0.0) {
        let days = schedule.working_days.len();
        if days > 0 {
            return Some(week / days as f64);
        }
    }
    if let (Some(start), Some(end)) = (schedule.shift_start, schedule.shift_end) {
        let span = (end - start).num_minutes();
        if span > 0 {
            return Some(span as f64 / 60.0);
        }
    }
    None
}

fn half_day(check_in: DateTime<Utc>, settings: &AttendanceSettings) -> AttendanceType {
    if check_in.hour() < settings.half_day_cutoff_hour {
        AttendanceType::HalfDayMorning
    } else {
        AttendanceType::HalfDayAfternoon
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveTime, TimeZone};

    fn eight_hour_schedule() -> EntitySchedule {
        EntitySchedule { hours_per_day: Some(8.0), ..Default::default() }
    }

    fn morning() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
    }

    fn minutes(hours: f64) -> i64 {
        (hours * 60.0).round() as i64
    }

    #[test]
    fn schedule_aware_thresholds() {
        let settings = AttendanceSettings::schedule_aware();
        let schedule = eight_hour_schedule();

        // 9.2h of 8h = 115% >= 110%
        assert_eq!(
            classify(morning(), minutes(9.2), Some(&schedule), &settings),
            AttendanceType::Overtime
        );
        // 9h of 8h = 112.5% still overtime
        assert_eq!(
            classify(morning(), minutes(9.0), Some(&schedule), &settings),
            AttendanceType::Overtime
        );
        // 6.5h of 8h = 81.25% >= 75%
        assert_eq!(
            classify(morning(), minutes(6.5), Some(&schedule), &settings),
            AttendanceType::FullDay
        );
        // 3.5h of 8h = 43.75% >= 40%, morning check-in
        assert_eq!(
            classify(morning(), minutes(3.5), Some(&schedule), &settings),
            AttendanceType::HalfDayMorning
        );
        // below 40%
        assert_eq!(
            classify(morning(), minutes(2.0), Some(&schedule), &settings),
            AttendanceType::UnpaidLeave
        );
    }

    #[test]
    fn half_day_split_uses_cutoff_hour() {
        let settings = AttendanceSettings::schedule_aware();
        let schedule = eight_hour_schedule();
        let afternoon = Utc.with_ymd_and_hms(2026, 3, 2, 14, 0, 0).unwrap();
        assert_eq!(
            classify(afternoon, minutes(3.5), Some(&schedule), &settings),
            AttendanceType::HalfDayAfternoon
        );
    }

    #[test]
    fn standard_hours_resolution_order() {
        let weekly = EntitySchedule {
            hours_per_week: Some(40.0),
            working_days: vec!["mon".into(), "tue".into(), "wed".into(), "thu".into(), "fri".into()],
            ..Default::default()
        };
        assert_eq!(standard_hours(&weekly), Some(8.0));

        let shift = EntitySchedule {
            shift_start: NaiveTime::from_hms_opt(9, 0, 0),
            shift_end: NaiveTime::from_hms_opt(17, 30, 0),
            ..Default::default()
        };
        assert_eq!(standard_hours(&shift), Some(8.5));

        assert_eq!(standard_hours(&EntitySchedule::default()), None);
    }

    #[test]
    fn no_schedule_falls_back_to_fixed_thresholds() {
        let settings = AttendanceSettings::schedule_aware();
        assert_eq!(
            classify(morning(), minutes(9.5), None, &settings),
            AttendanceType::Overtime
        );
        assert_eq!(
            classify(morning(), minutes(7.0), None, &settings),
            AttendanceType::FullDay
        );
        assert_eq!(
            classify(morning(), minutes(4.0), None, &settings),
            AttendanceType::HalfDayMorning
        );
        assert_eq!(
            classify(morning(), minutes(1.0), None, &settings),
            AttendanceType::UnpaidLeave
        );
    }

    #[test]
    fn time_based_mode_counts_full_or_nothing() {
        let settings = AttendanceSettings::time_based();
        assert_eq!(
            classify(morning(), 45, None, &settings),
            AttendanceType::FullDay
        );
        assert_eq!(
            classify(morning(), 10, None, &settings),
            AttendanceType::UnpaidLeave
        );
        // schedule is irrelevant in time-based mode
        assert_eq!(
            classify(morning(), 45, Some(&eight_hour_schedule()), &settings),
            AttendanceType::FullDay
        );
    }

    #[test]
    fn deterministic_for_identical_inputs() {
        let settings = AttendanceSettings::schedule_aware();
        let schedule = eight_hour_schedule();
        let a = classify(morning(), minutes(6.5), Some(&schedule), &settings);
        let b = classify(morning(), minutes(6.5), Some(&schedule), &settings);
        assert_eq!(a, b);
    }
}
