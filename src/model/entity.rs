use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::attendance::{CheckInMethod, TimeSlot};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema,
    strum::Display, strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EntityStatus {
    Active,
    Pending,
    Suspended,
    Archived,
}

impl EntityStatus {
    /// Statuses allowed to open a session.
    pub fn can_check_in(&self) -> bool {
        matches!(self, EntityStatus::Active | EntityStatus::Pending)
    }
}

/// Working-time schedule, present for payroll-relevant entities. Any of
/// the fields may be missing; the classifier resolves standard hours in
/// order: hours/day, hours/week over working days, shift span.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, ToSchema)]
pub struct EntitySchedule {
    pub hours_per_day: Option<f64>,
    pub hours_per_week: Option<f64>,
    #[serde(default)]
    #[schema(example = json!(["mon", "tue", "wed", "thu", "fri"]))]
    pub working_days: Vec<String>,
    #[schema(value_type = Option<String>, format = "time", example = "09:00:00")]
    pub shift_start: Option<NaiveTime>,
    #[schema(value_type = Option<String>, format = "time", example = "17:00:00")]
    pub shift_end: Option<NaiveTime>,
}

/// Cached "am I checked in right now" flag kept on the entity so presence
/// queries avoid scanning period records. The record store remains the
/// source of truth; this projection is read-repaired on the next
/// check-in/out if it drifts.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, ToSchema)]
pub struct CurrentSession {
    pub is_active: bool,
    pub check_in_id: Option<String>,
    pub check_in_time: Option<DateTime<Utc>>,
    pub expected_check_out: Option<DateTime<Utc>>,
    pub method: Option<CheckInMethod>,
}

impl CurrentSession {
    pub fn active(
        check_in_id: String,
        check_in_time: DateTime<Utc>,
        expected_check_out: Option<DateTime<Utc>>,
        method: CheckInMethod,
    ) -> Self {
        Self {
            is_active: true,
            check_in_id: Some(check_in_id),
            check_in_time: Some(check_in_time),
            expected_check_out,
            method: Some(method),
        }
    }

    pub fn cleared() -> Self {
        Self::default()
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema,
    strum::Display, strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EngagementLevel {
    HighlyActive,
    Active,
    Regular,
    Occasional,
    Inactive,
    AtRisk,
    Dormant,
}

/// Derived activity snapshot cached on the entity. A materialized view:
/// fully recomputable from the record store at any time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct EngagementStats {
    pub total_visits: u64,
    pub first_visit_at: Option<DateTime<Utc>>,
    pub last_visited_at: Option<DateTime<Utc>>,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub monthly_average: f64,
    pub this_month_visits: u32,
    pub last_month_visits: u32,
    pub engagement_level: EngagementLevel,
    pub days_since_last_visit: Option<i64>,
    pub favorite_time_slot: Option<TimeSlot>,
    pub loyalty_score: u8,
    pub updated_at: DateTime<Utc>,
}

impl EngagementStats {
    pub fn empty(now: DateTime<Utc>) -> Self {
        Self {
            total_visits: 0,
            first_visit_at: None,
            last_visited_at: None,
            current_streak: 0,
            longest_streak: 0,
            monthly_average: 0.0,
            this_month_visits: 0,
            last_month_visits: 0,
            engagement_level: EngagementLevel::Dormant,
            days_since_last_visit: None,
            favorite_time_slot: None,
            loyalty_score: 0,
            updated_at: now,
        }
    }
}

/// Read view of an entity as the attendance core sees it. Identity,
/// eligibility and schedule come from the owning store; session and stats
/// are the cached fields this crate writes back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TrackedEntity {
    pub id: String,
    pub tenant_id: String,
    pub entity_type: String,
    pub display_name: String,
    /// RFID/QR badge token, when the entity has one bound.
    pub badge_token: Option<String>,
    pub status: EntityStatus,
    pub attendance_enabled: bool,
    pub schedule: Option<EntitySchedule>,
    pub current_session: CurrentSession,
    pub stats: EngagementStats,
}
