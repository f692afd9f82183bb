use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Which classifier an entity type runs under.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize,
    strum::Display, strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ClassifierMode {
    /// Payroll-style: thresholds are percentages of the entity's standard
    /// daily hours.
    ScheduleAware,
    /// Simple visit tracking: one minimum duration, full day or nothing.
    TimeBased,
}

/// Immutable per-entity-type configuration, built once at startup and
/// passed by reference into every operation. No ambient globals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceSettings {
    pub mode: ClassifierMode,

    // Schedule-aware thresholds (percent of standard daily hours).
    pub overtime_threshold_pct: f64,
    pub full_day_threshold_pct: f64,
    pub half_day_threshold_pct: f64,
    /// Hour of day splitting half days into morning/afternoon. One global
    /// cutoff, not a schedule-relative midpoint.
    pub half_day_cutoff_hour: u32,
    /// Standard daily hours when the schedule has none resolvable.
    pub default_standard_hours: f64,

    // Fixed fallback thresholds (hours) for entities without a schedule.
    pub fixed_overtime_hours: f64,
    pub fixed_full_day_hours: f64,
    pub fixed_half_day_hours: f64,

    // Time-based mode.
    pub min_visit_minutes: i64,

    /// Strict mode refuses to classify schedule-aware entities that have
    /// no schedule instead of falling back to fixed thresholds.
    pub strict_schedule_validation: bool,

    pub duplicate_window_minutes: i64,
    pub auto_checkout_enabled: bool,
    pub max_session_minutes: i64,

    pub visit_milestones: Vec<u64>,
    pub streak_milestones: Vec<u32>,
}

impl AttendanceSettings {
    pub fn schedule_aware() -> Self {
        Self {
            mode: ClassifierMode::ScheduleAware,
            overtime_threshold_pct: 110.0,
            full_day_threshold_pct: 75.0,
            half_day_threshold_pct: 40.0,
            half_day_cutoff_hour: 12,
            default_standard_hours: 8.0,
            fixed_overtime_hours: 9.0,
            fixed_full_day_hours: 6.0,
            fixed_half_day_hours: 3.0,
            min_visit_minutes: 30,
            strict_schedule_validation: false,
            duplicate_window_minutes: 5,
            auto_checkout_enabled: true,
            max_session_minutes: 12 * 60,
            visit_milestones: vec![10, 50, 100, 250, 500, 1000],
            streak_milestones: vec![7, 30, 90, 180, 365],
        }
    }

    pub fn time_based() -> Self {
        Self {
            mode: ClassifierMode::TimeBased,
            ..Self::schedule_aware()
        }
    }
}

impl Default for AttendanceSettings {
    fn default() -> Self {
        Self::time_based()
    }
}

/// Per-entity-type settings table. Unknown types get the default so a
/// registered store never runs without configuration.
#[derive(Debug, Clone, Default)]
pub struct SettingsMap {
    by_type: HashMap<String, AttendanceSettings>,
    fallback: AttendanceSettings,
}

impl SettingsMap {
    pub fn new(fallback: AttendanceSettings) -> Self {
        Self { by_type: HashMap::new(), fallback }
    }

    pub fn with(mut self, entity_type: impl Into<String>, settings: AttendanceSettings) -> Self {
        self.by_type.insert(entity_type.into(), settings);
        self
    }

    pub fn for_type(&self, entity_type: &str) -> &AttendanceSettings {
        self.by_type.get(entity_type).unwrap_or(&self.fallback)
    }

    /// Parse an `ENTITY_TYPES` spec like
    /// `member:time_based,employee:schedule_aware`. Used at startup to
    /// decide which stores get registered and under which mode.
    pub fn from_spec(spec: &str) -> Self {
        let mut map = Self::default();
        for part in spec.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (tag, mode) = match part.split_once(':') {
                Some((tag, mode)) => (tag.trim(), mode.trim()),
                None => (part, "time_based"),
            };
            let settings = match mode.parse::<ClassifierMode>() {
                Ok(ClassifierMode::ScheduleAware) => AttendanceSettings::schedule_aware(),
                Ok(ClassifierMode::TimeBased) => AttendanceSettings::time_based(),
                Err(_) => {
                    tracing::warn!(entity_type = tag, mode, "unknown classifier mode, using time_based");
                    AttendanceSettings::time_based()
                }
            };
            map.by_type.insert(tag.to_string(), settings);
        }
        map
    }

    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.by_type.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_parsing_registers_modes() {
        let map = SettingsMap::from_spec("member:time_based, employee:schedule_aware");
        assert_eq!(map.for_type("member").mode, ClassifierMode::TimeBased);
        assert_eq!(map.for_type("employee").mode, ClassifierMode::ScheduleAware);
        // unknown type falls back
        assert_eq!(map.for_type("visitor").mode, ClassifierMode::TimeBased);
    }
}
