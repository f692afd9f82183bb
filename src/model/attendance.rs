use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::Actor;
use super::correction::CorrectionRequest;

/// How a presence event reached the system.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema,
    strum::Display, strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CheckInMethod {
    Manual,
    Qr,
    Rfid,
    Biometric,
    Api,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema,
    strum::Display, strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CheckInStatus {
    Valid,
    Invalid,
    Corrected,
    Disputed,
}

/// Final classification of a closed check-in. Provisional (`None` on the
/// entry) until check-out.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema,
    strum::Display, strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AttendanceType {
    FullDay,
    HalfDayMorning,
    HalfDayAfternoon,
    Overtime,
    PaidLeave,
    UnpaidLeave,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
    strum::Display, strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TimeSlot {
    EarlyMorning,
    Morning,
    Afternoon,
    Evening,
    Night,
}

impl TimeSlot {
    pub fn for_time(at: DateTime<Utc>) -> Self {
        match at.hour() {
            5..=8 => TimeSlot::EarlyMorning,
            9..=11 => TimeSlot::Morning,
            12..=16 => TimeSlot::Afternoon,
            17..=20 => TimeSlot::Evening,
            _ => TimeSlot::Night,
        }
    }
}

/// One line of the per-entry edit history. Applied corrections append
/// here; nothing is ever overwritten silently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CorrectionAudit {
    #[schema(example = "check_out_time")]
    pub field: String,
    pub before: Option<String>,
    pub after: Option<String>,
    pub reason: String,
    pub actor: Actor,
    pub at: DateTime<Utc>,
}

/// One presence event inside a period record. The id is assigned before
/// the first write so a retried append stays idempotent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CheckInEntry {
    pub id: String,
    pub check_in: DateTime<Utc>,
    pub check_out: Option<DateTime<Utc>>,
    pub expected_check_out: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i64>,
    pub attendance_type: Option<AttendanceType>,
    pub method: CheckInMethod,
    pub status: CheckInStatus,
    pub time_slot: TimeSlot,
    pub recorded_by: Actor,
    pub checked_out_by: Option<Actor>,
    #[serde(default)]
    pub auto_checked_out: bool,
    pub notes: Option<String>,
    #[serde(default)]
    pub corrections: Vec<CorrectionAudit>,
}

impl CheckInEntry {
    pub fn new(
        id: String,
        check_in: DateTime<Utc>,
        expected_check_out: Option<DateTime<Utc>>,
        method: CheckInMethod,
        recorded_by: Actor,
        notes: Option<String>,
    ) -> Self {
        Self {
            id,
            check_in,
            check_out: None,
            expected_check_out,
            duration_minutes: None,
            attendance_type: None,
            method,
            status: CheckInStatus::Valid,
            time_slot: TimeSlot::for_time(check_in),
            recorded_by,
            checked_out_by: None,
            auto_checked_out: false,
            notes,
            corrections: Vec::new(),
        }
    }

    /// Calendar-day key used for unique-day counting.
    pub fn day_key(&self) -> String {
        self.check_in.format("%Y-%m-%d").to_string()
    }

    pub fn is_open(&self) -> bool {
        self.check_out.is_none()
    }

    pub fn push_audit(
        &mut self,
        field: &str,
        before: Option<String>,
        after: Option<String>,
        reason: &str,
        actor: &Actor,
        at: DateTime<Utc>,
    ) {
        self.corrections.push(CorrectionAudit {
            field: field.to_string(),
            before,
            after,
            reason: reason.to_string(),
            actor: actor.clone(),
            at,
        });
    }
}

/// Composite key of a period record: one record per tenant × entity ×
/// calendar month, unique.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeriodKey {
    pub tenant_id: String,
    pub entity_type: String,
    pub entity_id: String,
    pub year: i32,
    pub month: u32,
}

impl PeriodKey {
    pub fn new(
        tenant_id: impl Into<String>,
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
        year: i32,
        month: u32,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
            year,
            month,
        }
    }

    pub fn for_timestamp(
        tenant_id: &str,
        entity_type: &str,
        entity_id: &str,
        at: DateTime<Utc>,
    ) -> Self {
        Self::new(tenant_id, entity_type, entity_id, at.year(), at.month())
    }

    /// `YYYY-MM` label used in logs and API payloads.
    pub fn period_label(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }
}

/// The monthly aggregate: source of truth for presence history. Derived
/// counters are always recomputed as a fold over `check_ins`, never
/// patched incrementally, so applied corrections can never leave them
/// stale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AttendanceRecord {
    pub tenant_id: String,
    pub entity_type: String,
    pub entity_id: String,
    pub year: i32,
    pub month: u32,
    pub check_ins: Vec<CheckInEntry>,
    #[serde(default)]
    pub correction_requests: Vec<CorrectionRequest>,
    pub monthly_total: u32,
    pub unique_days_visited: u32,
    #[schema(value_type = Vec<String>, example = json!(["2026-03-02", "2026-03-03"]))]
    pub visited_days: BTreeSet<String>,
    pub full_days_count: u32,
    pub half_days_count: u32,
    pub paid_leave_days_count: u32,
    pub overtime_days_count: u32,
    pub total_work_days: f64,
    #[schema(value_type = Object)]
    pub time_slot_histogram: BTreeMap<String, u32>,
    #[schema(value_type = Object)]
    pub weekday_histogram: BTreeMap<String, u32>,
}

impl AttendanceRecord {
    pub fn new(key: PeriodKey) -> Self {
        Self {
            tenant_id: key.tenant_id,
            entity_type: key.entity_type,
            entity_id: key.entity_id,
            year: key.year,
            month: key.month,
            check_ins: Vec::new(),
            correction_requests: Vec::new(),
            monthly_total: 0,
            unique_days_visited: 0,
            visited_days: BTreeSet::new(),
            full_days_count: 0,
            half_days_count: 0,
            paid_leave_days_count: 0,
            overtime_days_count: 0,
            total_work_days: 0.0,
            time_slot_histogram: BTreeMap::new(),
            weekday_histogram: BTreeMap::new(),
        }
    }

    pub fn key(&self) -> PeriodKey {
        PeriodKey::new(
            self.tenant_id.clone(),
            self.entity_type.clone(),
            self.entity_id.clone(),
            self.year,
            self.month,
        )
    }

    pub fn entry(&self, check_in_id: &str) -> Option<&CheckInEntry> {
        self.check_ins.iter().find(|e| e.id == check_in_id)
    }

    pub fn entry_mut(&mut self, check_in_id: &str) -> Option<&mut CheckInEntry> {
        self.check_ins.iter_mut().find(|e| e.id == check_in_id)
    }

    pub fn correction(&self, request_id: &str) -> Option<&CorrectionRequest> {
        self.correction_requests.iter().find(|r| r.id == request_id)
    }

    pub fn correction_mut(&mut self, request_id: &str) -> Option<&mut CorrectionRequest> {
        self.correction_requests.iter_mut().find(|r| r.id == request_id)
    }

    pub fn append_check_in(&mut self, entry: CheckInEntry) {
        self.check_ins.push(entry);
        self.recompute_derived();
    }

    /// Entries that still count: invalidated duplicates stay in the list
    /// for audit but drop out of day counting and histograms.
    pub fn countable_entries(&self) -> impl Iterator<Item = &CheckInEntry> {
        self.check_ins
            .iter()
            .filter(|e| e.status != CheckInStatus::Invalid)
    }

    /// Full fold over the entry list. `monthly_total` stays the literal
    /// entry count (invalidated entries included) so it always equals
    /// `check_ins.len()`.
    pub fn recompute_derived(&mut self) {
        self.monthly_total = self.check_ins.len() as u32;

        let mut visited: BTreeSet<String> = BTreeSet::new();
        let mut slots: BTreeMap<String, u32> = BTreeMap::new();
        let mut weekdays: BTreeMap<String, u32> = BTreeMap::new();
        let mut full = 0u32;
        let mut half = 0u32;
        let mut paid_leave = 0u32;
        let mut overtime = 0u32;

        for entry in self.check_ins.iter().filter(|e| e.status != CheckInStatus::Invalid) {
            visited.insert(entry.day_key());
            *slots.entry(entry.time_slot.to_string()).or_insert(0) += 1;
            *weekdays
                .entry(entry.check_in.weekday().to_string())
                .or_insert(0) += 1;

            match entry.attendance_type {
                Some(AttendanceType::FullDay) => full += 1,
                Some(AttendanceType::HalfDayMorning)
                | Some(AttendanceType::HalfDayAfternoon) => half += 1,
                Some(AttendanceType::PaidLeave) => paid_leave += 1,
                Some(AttendanceType::Overtime) => overtime += 1,
                Some(AttendanceType::UnpaidLeave) | None => {}
            }
        }

        self.unique_days_visited = visited.len() as u32;
        self.visited_days = visited;
        self.time_slot_histogram = slots;
        self.weekday_histogram = weekdays;
        self.full_days_count = full;
        self.half_days_count = half;
        self.paid_leave_days_count = paid_leave;
        self.overtime_days_count = overtime;
        self.total_work_days =
            full as f64 + half as f64 * 0.5 + paid_leave as f64 + overtime as f64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry_at(id: &str, at: DateTime<Utc>) -> CheckInEntry {
        CheckInEntry::new(
            id.to_string(),
            at,
            None,
            CheckInMethod::Manual,
            Actor::new("a1", "Tester", "staff"),
            None,
        )
    }

    fn record() -> AttendanceRecord {
        AttendanceRecord::new(PeriodKey::new("t1", "member", "m1", 2026, 3))
    }

    #[test]
    fn append_keeps_counter_invariants() {
        let mut rec = record();
        let day1 = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        let day1_later = Utc.with_ymd_and_hms(2026, 3, 2, 18, 0, 0).unwrap();
        let day2 = Utc.with_ymd_and_hms(2026, 3, 3, 9, 0, 0).unwrap();

        rec.append_check_in(entry_at("c1", day1));
        rec.append_check_in(entry_at("c2", day1_later));
        rec.append_check_in(entry_at("c3", day2));

        assert_eq!(rec.monthly_total as usize, rec.check_ins.len());
        assert_eq!(rec.unique_days_visited as usize, rec.visited_days.len());
        // two entries on the same day count once for uniqueness
        assert_eq!(rec.unique_days_visited, 2);
        assert!(rec.visited_days.contains("2026-03-02"));
    }

    #[test]
    fn work_day_totals_fold_is_idempotent() {
        let mut rec = record();
        let at = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();

        let mut full = entry_at("c1", at);
        full.attendance_type = Some(AttendanceType::FullDay);
        let mut half = entry_at("c2", at + chrono::Duration::days(1));
        half.attendance_type = Some(AttendanceType::HalfDayAfternoon);
        let mut over = entry_at("c3", at + chrono::Duration::days(2));
        over.attendance_type = Some(AttendanceType::Overtime);

        rec.append_check_in(full);
        rec.append_check_in(half);
        rec.append_check_in(over);

        assert_eq!(rec.full_days_count, 1);
        assert_eq!(rec.half_days_count, 1);
        assert_eq!(rec.overtime_days_count, 1);
        assert_eq!(rec.total_work_days, 2.5);

        let before = rec.clone();
        rec.recompute_derived();
        assert_eq!(rec, before);
    }

    #[test]
    fn invalidated_entries_leave_monthly_total_but_not_day_counts() {
        let mut rec = record();
        let at = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();

        let mut a = entry_at("c1", at);
        a.attendance_type = Some(AttendanceType::FullDay);
        let mut b = entry_at("c2", at);
        b.attendance_type = Some(AttendanceType::FullDay);
        rec.append_check_in(a);
        rec.append_check_in(b);
        assert_eq!(rec.full_days_count, 2);

        rec.entry_mut("c2").unwrap().status = CheckInStatus::Invalid;
        rec.recompute_derived();

        assert_eq!(rec.monthly_total, 2);
        assert_eq!(rec.full_days_count, 1);
        assert_eq!(rec.total_work_days, 1.0);
        assert_eq!(rec.unique_days_visited, 1);
    }

    #[test]
    fn time_slot_buckets() {
        let morning = Utc.with_ymd_and_hms(2026, 3, 2, 10, 30, 0).unwrap();
        let night = Utc.with_ymd_and_hms(2026, 3, 2, 23, 0, 0).unwrap();
        assert_eq!(TimeSlot::for_time(morning), TimeSlot::Morning);
        assert_eq!(TimeSlot::for_time(night), TimeSlot::Night);
    }
}
