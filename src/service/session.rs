//! Session lifecycle: check-in, check-out, single-tap toggle.
//!
//! Each operation mutates exactly one period record inside a store
//! transaction; the entity's cached session projection and stats ride
//! along in the same commit. Engagement stats are always recomputed after
//! the new visit is folded in, so `days_since_last_visit` and the tier
//! never lag one step behind.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::AttendanceError;
use crate::model::Actor;
use crate::model::attendance::{
    AttendanceRecord, AttendanceType, CheckInEntry, CheckInMethod, PeriodKey,
};
use crate::model::entity::{CurrentSession, EngagementStats, TrackedEntity};
use crate::model::settings::{ClassifierMode, SettingsMap};
use crate::notify::{AttendanceEvent, MilestoneKind, NotificationSink};
use crate::service::{classifier, engagement};
use crate::store::{AttendanceStore, EntityPatch, EntityRegistry, EntityStore};

fn default_method() -> CheckInMethod {
    CheckInMethod::Manual
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CheckInRequest {
    #[serde(default = "default_method")]
    #[schema(example = "qr")]
    pub method: CheckInMethod,
    pub notes: Option<String>,
}

impl Default for CheckInRequest {
    fn default() -> Self {
        Self { method: CheckInMethod::Manual, notes: None }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CheckInOutcome {
    pub check_in: CheckInEntry,
    pub record: AttendanceRecord,
    pub session: CurrentSession,
    pub stats: EngagementStats,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CheckOutOutcome {
    pub check_in: CheckInEntry,
    pub duration_minutes: i64,
    pub attendance_type: AttendanceType,
    pub record: AttendanceRecord,
    pub stats: EngagementStats,
}

/// What a single kiosk tap ended up doing.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ToggleOutcome {
    CheckedIn(CheckInOutcome),
    CheckedOut(CheckOutOutcome),
}

pub struct SessionService<R: AttendanceStore, E: EntityStore> {
    records: Arc<R>,
    entities: Arc<EntityRegistry<E>>,
    settings: Arc<SettingsMap>,
    notifier: Arc<dyn NotificationSink>,
}

impl<R: AttendanceStore, E: EntityStore> SessionService<R, E> {
    pub fn new(
        records: Arc<R>,
        entities: Arc<EntityRegistry<E>>,
        settings: Arc<SettingsMap>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self { records, entities, settings, notifier }
    }

    pub async fn check_in(
        &self,
        entity_type: &str,
        tenant_id: &str,
        entity_id: &str,
        request: &CheckInRequest,
        actor: &Actor,
    ) -> Result<CheckInOutcome, AttendanceError> {
        self.check_in_at(entity_type, tenant_id, entity_id, request, actor, Utc::now()).await
    }

    #[instrument(name = "attendance_check_in", skip(self, request, actor))]
    pub async fn check_in_at(
        &self,
        entity_type: &str,
        tenant_id: &str,
        entity_id: &str,
        request: &CheckInRequest,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<CheckInOutcome, AttendanceError> {
        let store = self.entities.get(entity_type)?;
        let entity = store.find(tenant_id, entity_id).await?.ok_or_else(|| {
            AttendanceError::invalid_member(format!("unknown {entity_type} '{entity_id}'"))
        })?;
        ensure_eligible(&entity)?;

        let settings = self.settings.for_type(entity_type);
        if let Some(last) = entity.stats.last_visited_at {
            let next_allowed = last + Duration::minutes(settings.duplicate_window_minutes);
            if now < next_allowed {
                return Err(AttendanceError::DuplicateCheckIn {
                    last_check_in_at: last,
                    next_allowed_at: next_allowed,
                });
            }
        }

        // id generated before the write: a retried append stays idempotent
        let check_in_id = Uuid::new_v4().to_string();
        let expected_check_out = if settings.auto_checkout_enabled {
            Some(now + Duration::minutes(settings.max_session_minutes))
        } else {
            None
        };
        let entry = CheckInEntry::new(
            check_in_id.clone(),
            now,
            expected_check_out,
            request.method,
            actor.clone(),
            request.notes.clone(),
        );

        let key = PeriodKey::for_timestamp(tenant_id, entity_type, entity_id, now);
        let (mut record, guard) = self.records.acquire(&key).await?;
        record.append_check_in(entry.clone());

        let stats = self.fold_stats(&record, now).await?;
        let session = CurrentSession::active(
            check_in_id.clone(),
            now,
            expected_check_out,
            request.method,
        );
        let patch = EntityPatch {
            tenant_id: tenant_id.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            session: session.clone(),
            stats: stats.clone(),
        };
        self.records.commit(guard, &record, Some(&patch)).await?;

        info!(
            entity_type,
            entity_id,
            check_in_id = %entry.id,
            period = %key.period_label(),
            "check-in recorded"
        );

        self.notifier
            .emit(AttendanceEvent::CheckInRecorded {
                tenant_id: tenant_id.to_string(),
                entity_type: entity_type.to_string(),
                entity_id: entity_id.to_string(),
                entity_name: entity.display_name.clone(),
                check_in_id: entry.id.clone(),
                at: now,
                method: request.method,
                stats: stats.clone(),
            })
            .await;
        self.emit_milestones(&entity, &stats, settings.visit_milestones.as_slice(), settings.streak_milestones.as_slice())
            .await;
        self.emit_engagement_change(&entity, &stats).await;

        Ok(CheckInOutcome { check_in: entry, record, session, stats })
    }

    pub async fn check_out(
        &self,
        entity_type: &str,
        tenant_id: &str,
        entity_id: &str,
        check_in_id: &str,
        actor: &Actor,
    ) -> Result<CheckOutOutcome, AttendanceError> {
        self.check_out_at(entity_type, tenant_id, entity_id, check_in_id, actor, false, Utc::now())
            .await
    }

    #[instrument(name = "attendance_check_out", skip(self, actor))]
    pub async fn check_out_at(
        &self,
        entity_type: &str,
        tenant_id: &str,
        entity_id: &str,
        check_in_id: &str,
        actor: &Actor,
        auto_checked_out: bool,
        now: DateTime<Utc>,
    ) -> Result<CheckOutOutcome, AttendanceError> {
        let store = self.entities.get(entity_type)?;
        let entity = store.find(tenant_id, entity_id).await?.ok_or_else(|| {
            AttendanceError::invalid_member(format!("unknown {entity_type} '{entity_id}'"))
        })?;
        let settings = self.settings.for_type(entity_type);
        if settings.mode == ClassifierMode::ScheduleAware
            && settings.strict_schedule_validation
            && entity.schedule.is_none()
        {
            return Err(AttendanceError::validation(format!(
                "entity '{entity_id}' has no schedule and strict schedule validation is on"
            )));
        }

        // the projection knows which period holds an open overnight
        // session; otherwise look in the current month
        let key = match (&entity.current_session.check_in_id, entity.current_session.check_in_time)
        {
            (Some(active_id), Some(opened_at)) if active_id == check_in_id => {
                PeriodKey::for_timestamp(tenant_id, entity_type, entity_id, opened_at)
            }
            _ => PeriodKey::for_timestamp(tenant_id, entity_type, entity_id, now),
        };

        let (mut record, guard) = self.records.acquire(&key).await?;
        let entry = record.entry_mut(check_in_id).ok_or_else(|| {
            AttendanceError::NoActiveSession { check_in_id: check_in_id.to_string() }
        })?;
        if entry.check_out.is_some() {
            return Err(AttendanceError::AlreadyCheckedOut {
                check_in_id: check_in_id.to_string(),
            });
        }

        let duration_minutes = (now - entry.check_in).num_minutes().max(0);
        let attendance_type = classifier::classify(
            entry.check_in,
            duration_minutes,
            entity.schedule.as_ref(),
            settings,
        );

        entry.check_out = Some(now);
        entry.duration_minutes = Some(duration_minutes);
        entry.attendance_type = Some(attendance_type);
        entry.checked_out_by = Some(actor.clone());
        entry.auto_checked_out = auto_checked_out;
        let entry_snapshot = entry.clone();

        record.recompute_derived();

        let stats = self.fold_stats(&record, now).await?;
        let patch = EntityPatch {
            tenant_id: tenant_id.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            session: CurrentSession::cleared(),
            stats: stats.clone(),
        };
        self.records.commit(guard, &record, Some(&patch)).await?;

        info!(
            entity_type,
            entity_id,
            check_in_id,
            duration_minutes,
            %attendance_type,
            auto_checked_out,
            "check-out recorded"
        );

        self.notifier
            .emit(AttendanceEvent::CheckOutRecorded {
                tenant_id: tenant_id.to_string(),
                entity_type: entity_type.to_string(),
                entity_id: entity_id.to_string(),
                entity_name: entity.display_name.clone(),
                check_in_id: check_in_id.to_string(),
                at: now,
                duration_minutes,
                attendance_type,
                auto_checked_out,
                stats: stats.clone(),
            })
            .await;
        self.emit_engagement_change(&entity, &stats).await;

        Ok(CheckOutOutcome {
            check_in: entry_snapshot,
            duration_minutes,
            attendance_type,
            record,
            stats,
        })
    }

    /// Single-tap kiosk entry point: the device does not know whether the
    /// entity is currently inside.
    pub async fn toggle(
        &self,
        entity_type: &str,
        tenant_id: &str,
        entity_id: &str,
        request: &CheckInRequest,
        actor: &Actor,
    ) -> Result<ToggleOutcome, AttendanceError> {
        self.toggle_at(entity_type, tenant_id, entity_id, request, actor, Utc::now()).await
    }

    pub async fn toggle_at(
        &self,
        entity_type: &str,
        tenant_id: &str,
        entity_id: &str,
        request: &CheckInRequest,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<ToggleOutcome, AttendanceError> {
        let store = self.entities.get(entity_type)?;
        let entity = store.find(tenant_id, entity_id).await?.ok_or_else(|| {
            AttendanceError::invalid_member(format!("unknown {entity_type} '{entity_id}'"))
        })?;

        match entity.current_session.check_in_id.clone() {
            Some(active_id) if entity.current_session.is_active => Ok(ToggleOutcome::CheckedOut(
                self.check_out_at(entity_type, tenant_id, entity_id, &active_id, actor, false, now)
                    .await?,
            )),
            _ => Ok(ToggleOutcome::CheckedIn(
                self.check_in_at(entity_type, tenant_id, entity_id, request, actor, now).await?,
            )),
        }
    }

    /// Read one period record (allowlist enforced).
    pub async fn period(
        &self,
        entity_type: &str,
        tenant_id: &str,
        entity_id: &str,
        year: i32,
        month: u32,
    ) -> Result<Option<AttendanceRecord>, AttendanceError> {
        self.entities.get(entity_type)?;
        self.records
            .find_period(&PeriodKey::new(tenant_id, entity_type, entity_id, year, month))
            .await
    }

    /// Freshly folded stats (ignores the cached snapshot on the entity).
    pub async fn stats(
        &self,
        entity_type: &str,
        tenant_id: &str,
        entity_id: &str,
    ) -> Result<EngagementStats, AttendanceError> {
        self.stats_at(entity_type, tenant_id, entity_id, Utc::now()).await
    }

    pub async fn stats_at(
        &self,
        entity_type: &str,
        tenant_id: &str,
        entity_id: &str,
        now: DateTime<Utc>,
    ) -> Result<EngagementStats, AttendanceError> {
        self.entities.get(entity_type)?;
        let history = self.records.load_history(tenant_id, entity_type, entity_id).await?;
        let refs: Vec<&AttendanceRecord> = history.iter().collect();
        Ok(engagement::compute_stats(&refs, now))
    }

    async fn fold_stats(
        &self,
        current: &AttendanceRecord,
        now: DateTime<Utc>,
    ) -> Result<EngagementStats, AttendanceError> {
        super::fold_stats(self.records.as_ref(), current, now).await
    }

    async fn emit_milestones(
        &self,
        entity: &TrackedEntity,
        stats: &EngagementStats,
        visit_milestones: &[u64],
        streak_milestones: &[u32],
    ) {
        for milestone in visit_milestones {
            if entity.stats.total_visits < *milestone && stats.total_visits >= *milestone {
                self.notifier
                    .emit(AttendanceEvent::MilestoneAchieved {
                        tenant_id: entity.tenant_id.clone(),
                        entity_type: entity.entity_type.clone(),
                        entity_id: entity.id.clone(),
                        entity_name: entity.display_name.clone(),
                        kind: MilestoneKind::TotalVisits,
                        value: *milestone,
                    })
                    .await;
            }
        }
        for milestone in streak_milestones {
            if entity.stats.current_streak < *milestone && stats.current_streak >= *milestone {
                self.notifier
                    .emit(AttendanceEvent::MilestoneAchieved {
                        tenant_id: entity.tenant_id.clone(),
                        entity_type: entity.entity_type.clone(),
                        entity_id: entity.id.clone(),
                        entity_name: entity.display_name.clone(),
                        kind: MilestoneKind::Streak,
                        value: *milestone as u64,
                    })
                    .await;
            }
        }
    }

    async fn emit_engagement_change(&self, entity: &TrackedEntity, stats: &EngagementStats) {
        if stats.engagement_level != entity.stats.engagement_level {
            self.notifier
                .emit(AttendanceEvent::EngagementChanged {
                    tenant_id: entity.tenant_id.clone(),
                    entity_type: entity.entity_type.clone(),
                    entity_id: entity.id.clone(),
                    entity_name: entity.display_name.clone(),
                    from: entity.stats.engagement_level,
                    to: stats.engagement_level,
                })
                .await;
        }
    }
}

fn ensure_eligible(entity: &TrackedEntity) -> Result<(), AttendanceError> {
    if !entity.attendance_enabled {
        return Err(AttendanceError::AttendanceNotEnabled);
    }
    if !entity.status.can_check_in() {
        return Err(AttendanceError::invalid_member(format!(
            "entity '{}' has status '{}'",
            entity.id, entity.status
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::entity::EntityStatus;
    use crate::service::testkit;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, h, m, 0).unwrap()
    }

    #[actix_web::test]
    async fn check_in_creates_record_and_projection() {
        let env = testkit::gym();
        env.add_member("m1");

        let outcome = env
            .sessions
            .check_in_at("member", "t1", "m1", &CheckInRequest::default(), &testkit::actor(), at(9, 0))
            .await
            .unwrap();

        assert_eq!(outcome.record.monthly_total, 1);
        assert_eq!(outcome.record.unique_days_visited, 1);
        assert!(outcome.session.is_active);
        assert_eq!(outcome.stats.total_visits, 1);
        assert_eq!(outcome.stats.days_since_last_visit, Some(0));

        let entity = env.backend.entity("t1", "member", "m1").unwrap();
        assert!(entity.current_session.is_active);
        assert_eq!(entity.current_session.check_in_id, Some(outcome.check_in.id.clone()));
        assert_eq!(env.sink.names()[0], "checkIn:recorded");
    }

    #[actix_web::test]
    async fn duplicate_window_blocks_then_allows() {
        let env = testkit::gym();
        env.add_member("m1");
        let actor = testkit::actor();

        env.sessions
            .check_in_at("member", "t1", "m1", &CheckInRequest::default(), &actor, at(9, 0))
            .await
            .unwrap();

        // 2 minutes later: inside the 5 minute window
        let err = env
            .sessions
            .check_in_at("member", "t1", "m1", &CheckInRequest::default(), &actor, at(9, 2))
            .await
            .unwrap_err();
        match err {
            AttendanceError::DuplicateCheckIn { next_allowed_at, .. } => {
                assert_eq!(next_allowed_at, at(9, 5));
            }
            other => panic!("expected DuplicateCheckIn, got {other:?}"),
        }

        // 6 minutes later: window elapsed
        env.sessions
            .check_in_at("member", "t1", "m1", &CheckInRequest::default(), &actor, at(9, 6))
            .await
            .unwrap();
    }

    #[actix_web::test]
    async fn check_out_classifies_and_clears_projection() {
        let env = testkit::office();
        env.add_employee("e1");
        let actor = testkit::actor();

        let check_in = env
            .sessions
            .check_in_at("employee", "t1", "e1", &CheckInRequest::default(), &actor, at(9, 0))
            .await
            .unwrap();

        // 8.5h on an 8h schedule: 106% -> full day
        let out = env
            .sessions
            .check_out_at("employee", "t1", "e1", &check_in.check_in.id, &actor, false, at(17, 30))
            .await
            .unwrap();

        assert_eq!(out.duration_minutes, 510);
        assert_eq!(out.attendance_type, AttendanceType::FullDay);
        assert_eq!(out.record.full_days_count, 1);
        assert_eq!(out.record.total_work_days, 1.0);

        let entity = env.backend.entity("t1", "employee", "e1").unwrap();
        assert!(!entity.current_session.is_active);
        assert_eq!(entity.current_session.check_in_id, None);
    }

    #[actix_web::test]
    async fn check_out_error_cases_leave_no_mutation() {
        let env = testkit::gym();
        env.add_member("m1");
        let actor = testkit::actor();

        let err = env
            .sessions
            .check_out_at("member", "t1", "m1", "no-such-id", &actor, false, at(10, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, AttendanceError::NoActiveSession { .. }));

        let check_in = env
            .sessions
            .check_in_at("member", "t1", "m1", &CheckInRequest::default(), &actor, at(10, 0))
            .await
            .unwrap();
        env.sessions
            .check_out_at("member", "t1", "m1", &check_in.check_in.id, &actor, false, at(11, 0))
            .await
            .unwrap();

        let err = env
            .sessions
            .check_out_at("member", "t1", "m1", &check_in.check_in.id, &actor, false, at(12, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, AttendanceError::AlreadyCheckedOut { .. }));

        // the second check-out changed nothing
        let record = env
            .sessions
            .period("member", "t1", "m1", 2026, 3)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.entry(&check_in.check_in.id).unwrap().check_out, Some(at(11, 0)));
    }

    #[actix_web::test]
    async fn toggle_flips_between_states() {
        let env = testkit::gym();
        env.add_member("m1");
        let actor = testkit::actor();

        let first = env
            .sessions
            .toggle_at("member", "t1", "m1", &CheckInRequest::default(), &actor, at(9, 0))
            .await
            .unwrap();
        assert!(matches!(first, ToggleOutcome::CheckedIn(_)));

        let second = env
            .sessions
            .toggle_at("member", "t1", "m1", &CheckInRequest::default(), &actor, at(10, 0))
            .await
            .unwrap();
        assert!(matches!(second, ToggleOutcome::CheckedOut(_)));
    }

    #[actix_web::test]
    async fn eligibility_checks_fire_in_order() {
        let env = testkit::gym();

        let err = env
            .sessions
            .check_in_at("member", "t1", "ghost", &CheckInRequest::default(), &testkit::actor(), at(9, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, AttendanceError::InvalidMember { .. }));

        let mut disabled = testkit::member_entity("t1", "m2");
        disabled.attendance_enabled = false;
        env.backend.insert_entity(disabled);
        let err = env
            .sessions
            .check_in_at("member", "t1", "m2", &CheckInRequest::default(), &testkit::actor(), at(9, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, AttendanceError::AttendanceNotEnabled));

        let mut suspended = testkit::member_entity("t1", "m3");
        suspended.status = EntityStatus::Suspended;
        env.backend.insert_entity(suspended);
        let err = env
            .sessions
            .check_in_at("member", "t1", "m3", &CheckInRequest::default(), &testkit::actor(), at(9, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, AttendanceError::InvalidMember { .. }));

        let err = env
            .sessions
            .check_in_at("droid", "t1", "m1", &CheckInRequest::default(), &testkit::actor(), at(9, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, AttendanceError::TargetModelNotAllowed { .. }));
    }

    #[actix_web::test]
    async fn milestone_event_fires_on_crossing() {
        let env = testkit::gym_with_milestones(vec![2], vec![]);
        env.add_member("m1");
        let actor = testkit::actor();

        env.sessions
            .check_in_at("member", "t1", "m1", &CheckInRequest::default(), &actor, at(9, 0))
            .await
            .unwrap();
        assert!(!env.sink.names().contains(&"milestone:achieved"));

        env.sessions
            .check_in_at("member", "t1", "m1", &CheckInRequest::default(), &actor, at(10, 0))
            .await
            .unwrap();
        assert!(env.sink.names().contains(&"milestone:achieved"));
    }
}
