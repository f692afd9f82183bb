use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::Actor;
use super::attendance::AttendanceType;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema,
    strum::Display, strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CorrectionType {
    UpdateCheckInTime,
    UpdateCheckOutTime,
    OverrideAttendanceType,
    DeleteDuplicate,
    AddMissingAttendance,
}

impl CorrectionType {
    /// All types except add-missing edit an existing entry and must
    /// reference it.
    pub fn requires_target(&self) -> bool {
        !matches!(self, CorrectionType::AddMissingAttendance)
    }
}

/// Status is monotonic: pending → approved|rejected, approved → applied.
/// `rejected` and `applied` are terminal.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema,
    strum::Display, strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CorrectionStatus {
    Pending,
    Approved,
    Rejected,
    Applied,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema,
    strum::Display, strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CorrectionPriority {
    Low,
    Normal,
    High,
}

/// A proposed retroactive edit, embedded in the period record it targets
/// so the edit history stays co-located with the data it edits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CorrectionRequest {
    pub id: String,
    pub request_type: CorrectionType,
    pub status: CorrectionStatus,
    /// Absent only for add-missing-attendance.
    pub check_in_id: Option<String>,
    pub requested_check_in: Option<DateTime<Utc>>,
    pub requested_check_out: Option<DateTime<Utc>>,
    pub requested_type: Option<AttendanceType>,
    pub reason: String,
    pub priority: CorrectionPriority,
    pub requested_by: Actor,
    pub requested_at: DateTime<Utc>,
    pub reviewer: Option<Actor>,
    pub reviewer_notes: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub applied_at: Option<DateTime<Utc>>,
}
