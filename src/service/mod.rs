pub mod classifier;
pub mod correction;
pub mod engagement;
pub mod session;
pub mod sweeper;

use chrono::{DateTime, Utc};

use crate::error::AttendanceError;
use crate::model::attendance::AttendanceRecord;
use crate::model::entity::EngagementStats;
use crate::store::AttendanceStore;

/// Stats snapshot over the entity's full history, with the in-flight
/// record replacing its stored (still stale) month.
pub(crate) async fn fold_stats<R: AttendanceStore>(
    records: &R,
    current: &AttendanceRecord,
    now: DateTime<Utc>,
) -> Result<EngagementStats, AttendanceError> {
    let history = records
        .load_history(&current.tenant_id, &current.entity_type, &current.entity_id)
        .await?;
    let mut refs: Vec<&AttendanceRecord> = history
        .iter()
        .filter(|r| !(r.year == current.year && r.month == current.month))
        .collect();
    refs.push(current);
    Ok(engagement::compute_stats(&refs, now))
}

#[cfg(test)]
pub(crate) mod testkit {
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};

    use crate::model::Actor;
    use crate::model::entity::{
        CurrentSession, EngagementStats, EntitySchedule, EntityStatus, TrackedEntity,
    };
    use crate::model::settings::{AttendanceSettings, SettingsMap};
    use crate::notify::{CollectingSink, NotificationSink};
    use crate::service::correction::CorrectionService;
    use crate::service::session::SessionService;
    use crate::service::sweeper::ExpirySweeper;
    use crate::store::EntityRegistry;
    use crate::store::memory::{MemoryAttendanceStore, MemoryBackend, MemoryEntityStore};

    pub struct TestEnv {
        pub backend: Arc<MemoryBackend>,
        pub sessions: Arc<SessionService<MemoryAttendanceStore, MemoryEntityStore>>,
        pub corrections: CorrectionService<MemoryAttendanceStore, MemoryEntityStore>,
        pub sweeper: ExpirySweeper<MemoryAttendanceStore, MemoryEntityStore>,
        pub sink: Arc<CollectingSink>,
    }

    impl TestEnv {
        pub fn add_member(&self, id: &str) {
            self.backend.insert_entity(member_entity("t1", id));
        }

        pub fn add_employee(&self, id: &str) {
            self.backend.insert_entity(employee_entity("t1", id));
        }
    }

    fn build(types: Vec<(&str, AttendanceSettings)>) -> TestEnv {
        let backend = MemoryBackend::new();
        let mut registry = EntityRegistry::new();
        let mut settings = SettingsMap::new(AttendanceSettings::default());
        for (tag, s) in types {
            registry = registry
                .with(tag, Arc::new(MemoryEntityStore::new(backend.clone(), tag)));
            settings = settings.with(tag, s);
        }
        let registry = Arc::new(registry);
        let settings = Arc::new(settings);
        let records = Arc::new(MemoryAttendanceStore::new(backend.clone()));
        let sink = Arc::new(CollectingSink::new());
        let sink_dyn: Arc<dyn NotificationSink> = sink.clone();

        let sessions = Arc::new(SessionService::new(
            records.clone(),
            registry.clone(),
            settings.clone(),
            sink_dyn.clone(),
        ));
        let corrections =
            CorrectionService::new(records, registry.clone(), settings, sink_dyn);
        let sweeper = ExpirySweeper::new(sessions.clone(), registry);

        TestEnv { backend, sessions, corrections, sweeper, sink }
    }

    /// Gym-style tenant: members, time-based classification.
    pub fn gym() -> TestEnv {
        build(vec![("member", AttendanceSettings::time_based())])
    }

    pub fn gym_with_milestones(visits: Vec<u64>, streaks: Vec<u32>) -> TestEnv {
        let mut settings = AttendanceSettings::time_based();
        settings.visit_milestones = visits;
        settings.streak_milestones = streaks;
        build(vec![("member", settings)])
    }

    /// Office-style tenant: employees on an 8h schedule, schedule-aware
    /// classification.
    pub fn office() -> TestEnv {
        build(vec![("employee", AttendanceSettings::schedule_aware())])
    }

    pub fn actor() -> Actor {
        Actor::new("usr-1", "Front Desk", "staff")
    }

    pub fn member_entity(tenant_id: &str, id: &str) -> TrackedEntity {
        let epoch = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        TrackedEntity {
            id: id.to_string(),
            tenant_id: tenant_id.to_string(),
            entity_type: "member".to_string(),
            display_name: format!("Member {id}"),
            badge_token: Some(format!("BADGE-{id}")),
            status: EntityStatus::Active,
            attendance_enabled: true,
            schedule: None,
            current_session: CurrentSession::cleared(),
            stats: EngagementStats::empty(epoch),
        }
    }

    pub fn employee_entity(tenant_id: &str, id: &str) -> TrackedEntity {
        let mut entity = member_entity(tenant_id, id);
        entity.entity_type = "employee".to_string();
        entity.display_name = format!("Employee {id}");
        entity.schedule = Some(EntitySchedule {
            hours_per_day: Some(8.0),
            hours_per_week: None,
            working_days: vec![
                "mon".into(),
                "tue".into(),
                "wed".into(),
                "thu".into(),
                "fri".into(),
            ],
            shift_start: None,
            shift_end: None,
        });
        entity
    }
}
