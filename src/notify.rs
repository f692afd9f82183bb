use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::attendance::{AttendanceType, CheckInMethod};
use crate::model::entity::{EngagementLevel, EngagementStats};

/// What a visit/streak milestone was measured in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MilestoneKind {
    TotalVisits,
    Streak,
}

/// Typed domain events emitted after a committed mutation. Delivery and
/// subscription mechanics live outside this crate; sinks only receive.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum AttendanceEvent {
    CheckInRecorded {
        tenant_id: String,
        entity_type: String,
        entity_id: String,
        entity_name: String,
        check_in_id: String,
        at: DateTime<Utc>,
        method: CheckInMethod,
        stats: EngagementStats,
    },
    CheckOutRecorded {
        tenant_id: String,
        entity_type: String,
        entity_id: String,
        entity_name: String,
        check_in_id: String,
        at: DateTime<Utc>,
        duration_minutes: i64,
        attendance_type: AttendanceType,
        auto_checked_out: bool,
        stats: EngagementStats,
    },
    MilestoneAchieved {
        tenant_id: String,
        entity_type: String,
        entity_id: String,
        entity_name: String,
        kind: MilestoneKind,
        value: u64,
    },
    EngagementChanged {
        tenant_id: String,
        entity_type: String,
        entity_id: String,
        entity_name: String,
        from: EngagementLevel,
        to: EngagementLevel,
    },
}

impl AttendanceEvent {
    pub fn name(&self) -> &'static str {
        match self {
            AttendanceEvent::CheckInRecorded { .. } => "checkIn:recorded",
            AttendanceEvent::CheckOutRecorded { .. } => "checkOut:recorded",
            AttendanceEvent::MilestoneAchieved { .. } => "milestone:achieved",
            AttendanceEvent::EngagementChanged { .. } => "engagement:changed",
        }
    }
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn emit(&self, event: AttendanceEvent);
}

/// Default sink: structured log lines. Downstream consumers tail these or
/// a real bus implementation replaces this at wiring time.
pub struct TracingSink;

#[async_trait]
impl NotificationSink for TracingSink {
    async fn emit(&self, event: AttendanceEvent) {
        let payload = serde_json::to_string(&event).unwrap_or_default();
        tracing::info!(event = event.name(), %payload, "domain event");
    }
}

/// Test sink collecting everything emitted.
#[cfg(test)]
pub struct CollectingSink(pub std::sync::Mutex<Vec<AttendanceEvent>>);

#[cfg(test)]
impl CollectingSink {
    pub fn new() -> Self {
        Self(std::sync::Mutex::new(Vec::new()))
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.0.lock().expect("sink poisoned").iter().map(|e| e.name()).collect()
    }
}

#[cfg(test)]
#[async_trait]
impl NotificationSink for CollectingSink {
    async fn emit(&self, event: AttendanceEvent) {
        self.0.lock().expect("sink poisoned").push(event);
    }
}
