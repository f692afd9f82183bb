//! Correction request engine.
//!
//! A small state machine embedded in the period record: pending →
//! approved|rejected, approved → applied, with rejected and applied
//! terminal. Applying dispatches on the request type, appends an audit
//! line for every field it touches, then recomputes every derived
//! aggregate from scratch.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::AttendanceError;
use crate::model::Actor;
use crate::model::attendance::{
    AttendanceRecord, AttendanceType, CheckInEntry, CheckInMethod, CheckInStatus, PeriodKey,
    TimeSlot,
};
use crate::model::correction::{
    CorrectionPriority, CorrectionRequest, CorrectionStatus, CorrectionType,
};
use crate::model::entity::TrackedEntity;
use crate::model::settings::SettingsMap;
use crate::notify::{AttendanceEvent, NotificationSink};
use crate::service::{classifier, fold_stats};
use crate::store::{AttendanceStore, EntityPatch, EntityRegistry, EntityStore};

fn default_priority() -> CorrectionPriority {
    CorrectionPriority::Normal
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SubmitCorrection {
    #[schema(example = 2026)]
    pub year: i32,
    #[schema(example = 3)]
    pub month: u32,
    pub request_type: CorrectionType,
    /// Required for every type except add-missing-attendance.
    pub check_in_id: Option<String>,
    pub requested_check_in: Option<DateTime<Utc>>,
    pub requested_check_out: Option<DateTime<Utc>>,
    pub requested_type: Option<AttendanceType>,
    #[schema(example = "forgot to check out before leaving")]
    pub reason: String,
    #[serde(default = "default_priority")]
    pub priority: CorrectionPriority,
}

pub struct CorrectionService<R: AttendanceStore, E: EntityStore> {
    records: Arc<R>,
    entities: Arc<EntityRegistry<E>>,
    settings: Arc<SettingsMap>,
    notifier: Arc<dyn NotificationSink>,
}

impl<R: AttendanceStore, E: EntityStore> CorrectionService<R, E> {
    pub fn new(
        records: Arc<R>,
        entities: Arc<EntityRegistry<E>>,
        settings: Arc<SettingsMap>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self { records, entities, settings, notifier }
    }

    pub async fn submit(
        &self,
        entity_type: &str,
        tenant_id: &str,
        entity_id: &str,
        payload: &SubmitCorrection,
        actor: &Actor,
    ) -> Result<CorrectionRequest, AttendanceError> {
        self.submit_at(entity_type, tenant_id, entity_id, payload, actor, Utc::now()).await
    }

    #[instrument(name = "correction_submit", skip(self, payload, actor))]
    pub async fn submit_at(
        &self,
        entity_type: &str,
        tenant_id: &str,
        entity_id: &str,
        payload: &SubmitCorrection,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<CorrectionRequest, AttendanceError> {
        let store = self.entities.get(entity_type)?;
        store.find(tenant_id, entity_id).await?.ok_or_else(|| {
            AttendanceError::invalid_member(format!("unknown {entity_type} '{entity_id}'"))
        })?;
        validate_submission(payload)?;

        let key =
            PeriodKey::new(tenant_id, entity_type, entity_id, payload.year, payload.month);
        // create-or-find: a correction may target a period whose record
        // does not otherwise exist yet (adding a fully missing day)
        let (mut record, guard) = self.records.acquire(&key).await?;

        if payload.request_type.requires_target() {
            let target = payload.check_in_id.as_deref().unwrap_or_default();
            if record.entry(target).is_none() {
                return Err(AttendanceError::validation(format!(
                    "check-in '{target}' does not exist in period {}",
                    key.period_label()
                )));
            }
        }

        let request = CorrectionRequest {
            id: Uuid::new_v4().to_string(),
            request_type: payload.request_type,
            status: CorrectionStatus::Pending,
            check_in_id: payload.check_in_id.clone(),
            requested_check_in: payload.requested_check_in,
            requested_check_out: payload.requested_check_out,
            requested_type: payload.requested_type,
            reason: payload.reason.trim().to_string(),
            priority: payload.priority,
            requested_by: actor.clone(),
            requested_at: now,
            reviewer: None,
            reviewer_notes: None,
            reviewed_at: None,
            applied_at: None,
        };
        record.correction_requests.push(request.clone());
        self.records.commit(guard, &record, None).await?;

        info!(
            entity_type,
            entity_id,
            request_id = %request.id,
            request_type = %request.request_type,
            period = %key.period_label(),
            "correction request submitted"
        );
        Ok(request)
    }

    pub async fn review(
        &self,
        entity_type: &str,
        tenant_id: &str,
        entity_id: &str,
        year: i32,
        month: u32,
        request_id: &str,
        approve: bool,
        reviewer: &Actor,
        notes: Option<String>,
    ) -> Result<CorrectionRequest, AttendanceError> {
        self.review_at(
            entity_type, tenant_id, entity_id, year, month, request_id, approve, reviewer,
            notes,
            Utc::now(),
        )
        .await
    }

    /// pending → approved | rejected. Anything else is a state violation.
    pub async fn review_at(
        &self,
        entity_type: &str,
        tenant_id: &str,
        entity_id: &str,
        year: i32,
        month: u32,
        request_id: &str,
        approve: bool,
        reviewer: &Actor,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<CorrectionRequest, AttendanceError> {
        self.entities.get(entity_type)?;
        let key = PeriodKey::new(tenant_id, entity_type, entity_id, year, month);
        let (mut record, guard) = self.records.acquire(&key).await?;

        let request = record.correction_mut(request_id).ok_or_else(|| {
            AttendanceError::validation(format!("unknown correction request '{request_id}'"))
        })?;
        if request.status != CorrectionStatus::Pending {
            return Err(AttendanceError::validation(format!(
                "cannot review a request in status '{}'",
                request.status
            )));
        }

        request.status =
            if approve { CorrectionStatus::Approved } else { CorrectionStatus::Rejected };
        request.reviewer = Some(reviewer.clone());
        request.reviewer_notes = notes;
        request.reviewed_at = Some(now);
        let reviewed = request.clone();

        self.records.commit(guard, &record, None).await?;

        info!(
            entity_type,
            entity_id,
            request_id,
            status = %reviewed.status,
            "correction request reviewed"
        );
        Ok(reviewed)
    }

    pub async fn apply(
        &self,
        entity_type: &str,
        tenant_id: &str,
        entity_id: &str,
        year: i32,
        month: u32,
        request_id: &str,
        actor: &Actor,
    ) -> Result<CorrectionRequest, AttendanceError> {
        self.apply_at(entity_type, tenant_id, entity_id, year, month, request_id, actor, Utc::now())
            .await
    }

    /// approved → applied, exactly once. Mutates the targeted entry (or
    /// appends a new one), audits every touched field, then rebuilds all
    /// derived aggregates and the entity's stats snapshot.
    #[instrument(name = "correction_apply", skip(self, actor))]
    pub async fn apply_at(
        &self,
        entity_type: &str,
        tenant_id: &str,
        entity_id: &str,
        year: i32,
        month: u32,
        request_id: &str,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<CorrectionRequest, AttendanceError> {
        let store = self.entities.get(entity_type)?;
        let entity = store.find(tenant_id, entity_id).await?.ok_or_else(|| {
            AttendanceError::invalid_member(format!("unknown {entity_type} '{entity_id}'"))
        })?;
        let settings = self.settings.for_type(entity_type);

        let key = PeriodKey::new(tenant_id, entity_type, entity_id, year, month);
        let (mut record, guard) = self.records.acquire(&key).await?;

        let request = record
            .correction(request_id)
            .ok_or_else(|| {
                AttendanceError::validation(format!("unknown correction request '{request_id}'"))
            })?
            .clone();
        if request.status != CorrectionStatus::Approved {
            return Err(AttendanceError::validation(format!(
                "cannot apply a request in status '{}'",
                request.status
            )));
        }

        apply_mutation(&mut record, &request, &entity, settings, actor, now)?;

        let applied = {
            let request = record
                .correction_mut(request_id)
                .ok_or_else(|| AttendanceError::operation("correction request vanished"))?;
            request.status = CorrectionStatus::Applied;
            request.applied_at = Some(now);
            request.clone()
        };

        record.recompute_derived();

        let stats = fold_stats(self.records.as_ref(), &record, now).await?;
        let patch = EntityPatch {
            tenant_id: tenant_id.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            session: entity.current_session.clone(),
            stats: stats.clone(),
        };
        self.records.commit(guard, &record, Some(&patch)).await?;

        if stats.engagement_level != entity.stats.engagement_level {
            self.notifier
                .emit(AttendanceEvent::EngagementChanged {
                    tenant_id: tenant_id.to_string(),
                    entity_type: entity_type.to_string(),
                    entity_id: entity_id.to_string(),
                    entity_name: entity.display_name.clone(),
                    from: entity.stats.engagement_level,
                    to: stats.engagement_level,
                })
                .await;
        }

        info!(
            entity_type,
            entity_id,
            request_id,
            request_type = %applied.request_type,
            "correction applied"
        );
        Ok(applied)
    }

    /// Embedded requests of one period, optionally filtered by status.
    pub async fn list(
        &self,
        entity_type: &str,
        tenant_id: &str,
        entity_id: &str,
        year: i32,
        month: u32,
        status: Option<CorrectionStatus>,
    ) -> Result<Vec<CorrectionRequest>, AttendanceError> {
        self.entities.get(entity_type)?;
        let key = PeriodKey::new(tenant_id, entity_type, entity_id, year, month);
        let record = self.records.find_period(&key).await?;
        Ok(record
            .map(|r| {
                r.correction_requests
                    .into_iter()
                    .filter(|c| status.map_or(true, |s| c.status == s))
                    .collect()
            })
            .unwrap_or_default())
    }
}

fn validate_submission(payload: &SubmitCorrection) -> Result<(), AttendanceError> {
    if payload.reason.trim().is_empty() {
        return Err(AttendanceError::validation("a reason is required"));
    }
    if !(1..=12).contains(&payload.month) {
        return Err(AttendanceError::validation(format!("invalid month {}", payload.month)));
    }
    if payload.request_type.requires_target() && payload.check_in_id.is_none() {
        return Err(AttendanceError::validation(format!(
            "'{}' requires a check_in_id",
            payload.request_type
        )));
    }

    match payload.request_type {
        CorrectionType::UpdateCheckInTime if payload.requested_check_in.is_none() => {
            Err(AttendanceError::validation("requested_check_in is required"))
        }
        CorrectionType::UpdateCheckOutTime if payload.requested_check_out.is_none() => {
            Err(AttendanceError::validation("requested_check_out is required"))
        }
        CorrectionType::OverrideAttendanceType if payload.requested_type.is_none() => {
            Err(AttendanceError::validation("requested_type is required"))
        }
        CorrectionType::AddMissingAttendance => {
            match (payload.requested_check_in, payload.requested_check_out) {
                (Some(check_in), Some(check_out)) if check_out > check_in => Ok(()),
                (Some(_), Some(_)) => {
                    Err(AttendanceError::validation("check-out must be after check-in"))
                }
                _ => Err(AttendanceError::validation(
                    "both requested_check_in and requested_check_out are required",
                )),
            }
        }
        _ => Ok(()),
    }
}

fn target_entry<'a>(
    record: &'a mut AttendanceRecord,
    request: &CorrectionRequest,
) -> Result<&'a mut CheckInEntry, AttendanceError> {
    let id = request.check_in_id.as_deref().unwrap_or_default();
    record
        .entry_mut(id)
        .ok_or_else(|| AttendanceError::validation(format!("check-in '{id}' no longer exists")))
}

fn apply_mutation(
    record: &mut AttendanceRecord,
    request: &CorrectionRequest,
    entity: &TrackedEntity,
    settings: &crate::model::settings::AttendanceSettings,
    actor: &Actor,
    now: DateTime<Utc>,
) -> Result<(), AttendanceError> {
    match request.request_type {
        CorrectionType::UpdateCheckInTime => {
            let new_time = request
                .requested_check_in
                .ok_or_else(|| AttendanceError::validation("requested_check_in is required"))?;
            let entry = target_entry(record, request)?;
            let before = entry.check_in.to_rfc3339();
            entry.check_in = new_time;
            entry.time_slot = TimeSlot::for_time(new_time);
            if let Some(check_out) = entry.check_out {
                let minutes = (check_out - new_time).num_minutes();
                if minutes < 0 {
                    return Err(AttendanceError::validation("check-out would precede check-in"));
                }
                entry.duration_minutes = Some(minutes);
            }
            entry.status = CheckInStatus::Corrected;
            entry.push_audit(
                "check_in_time",
                Some(before),
                Some(new_time.to_rfc3339()),
                &request.reason,
                actor,
                now,
            );
        }
        CorrectionType::UpdateCheckOutTime => {
            let new_time = request
                .requested_check_out
                .ok_or_else(|| AttendanceError::validation("requested_check_out is required"))?;
            let entry = target_entry(record, request)?;
            let minutes = (new_time - entry.check_in).num_minutes();
            if minutes < 0 {
                return Err(AttendanceError::validation("check-out would precede check-in"));
            }
            let before = entry.check_out.map(|t| t.to_rfc3339());
            entry.check_out = Some(new_time);
            entry.duration_minutes = Some(minutes);
            entry.status = CheckInStatus::Corrected;
            entry.push_audit(
                "check_out_time",
                before,
                Some(new_time.to_rfc3339()),
                &request.reason,
                actor,
                now,
            );
        }
        CorrectionType::OverrideAttendanceType => {
            let new_type = request
                .requested_type
                .ok_or_else(|| AttendanceError::validation("requested_type is required"))?;
            let entry = target_entry(record, request)?;
            let before = entry.attendance_type.map(|t| t.to_string());
            entry.attendance_type = Some(new_type);
            entry.status = CheckInStatus::Corrected;
            entry.push_audit(
                "attendance_type",
                before,
                Some(new_type.to_string()),
                &request.reason,
                actor,
                now,
            );
        }
        CorrectionType::DeleteDuplicate => {
            // marked invalid, never physically removed: the audit trail
            // stays intact
            let entry = target_entry(record, request)?;
            let before = entry.status.to_string();
            entry.status = CheckInStatus::Invalid;
            entry.push_audit(
                "status",
                Some(before),
                Some(CheckInStatus::Invalid.to_string()),
                &request.reason,
                actor,
                now,
            );
        }
        CorrectionType::AddMissingAttendance => {
            let check_in = request
                .requested_check_in
                .ok_or_else(|| AttendanceError::validation("requested_check_in is required"))?;
            let check_out = request
                .requested_check_out
                .ok_or_else(|| AttendanceError::validation("requested_check_out is required"))?;
            let minutes = (check_out - check_in).num_minutes();
            if minutes < 0 {
                return Err(AttendanceError::validation("check-out would precede check-in"));
            }
            let attendance_type = request.requested_type.unwrap_or_else(|| {
                classifier::classify(check_in, minutes, entity.schedule.as_ref(), settings)
            });

            let mut entry = CheckInEntry::new(
                Uuid::new_v4().to_string(),
                check_in,
                None,
                CheckInMethod::Manual,
                request.requested_by.clone(),
                Some(request.reason.clone()),
            );
            entry.check_out = Some(check_out);
            entry.duration_minutes = Some(minutes);
            entry.attendance_type = Some(attendance_type);
            entry.checked_out_by = Some(actor.clone());
            entry.push_audit(
                "created",
                None,
                Some("added via correction".to_string()),
                &request.reason,
                actor,
                now,
            );
            record.check_ins.push(entry);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::session::CheckInRequest;
    use crate::service::testkit;
    use chrono::TimeZone;

    fn at(day: u32, h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, h, m, 0).unwrap()
    }

    fn submission(request_type: CorrectionType, check_in_id: Option<String>) -> SubmitCorrection {
        SubmitCorrection {
            year: 2026,
            month: 3,
            request_type,
            check_in_id,
            requested_check_in: None,
            requested_check_out: None,
            requested_type: None,
            reason: "badge reader was down".to_string(),
            priority: CorrectionPriority::Normal,
        }
    }

    /// One closed full-day entry; returns its check-in id.
    async fn seed_full_day(env: &testkit::TestEnv) -> String {
        let actor = testkit::actor();
        let outcome = env
            .sessions
            .check_in_at("employee", "t1", "e1", &CheckInRequest::default(), &actor, at(10, 9, 0))
            .await
            .unwrap();
        env.sessions
            .check_out_at("employee", "t1", "e1", &outcome.check_in.id, &actor, false, at(10, 17, 30))
            .await
            .unwrap();
        outcome.check_in.id
    }

    #[actix_web::test]
    async fn submit_requires_reason_and_valid_target() {
        let env = testkit::office();
        env.add_employee("e1");
        let actor = testkit::actor();

        let mut payload = submission(CorrectionType::DeleteDuplicate, Some("x".into()));
        payload.reason = "  ".into();
        let err = env
            .corrections
            .submit_at("employee", "t1", "e1", &payload, &actor, at(11, 9, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, AttendanceError::Validation { .. }));

        // well-formed but pointing at a check-in that does not exist
        let payload = submission(CorrectionType::DeleteDuplicate, Some("nope".into()));
        let err = env
            .corrections
            .submit_at("employee", "t1", "e1", &payload, &actor, at(11, 9, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, AttendanceError::Validation { .. }));
    }

    #[actix_web::test]
    async fn review_transitions_only_from_pending() {
        let env = testkit::office();
        env.add_employee("e1");
        let actor = testkit::actor();
        let check_in_id = seed_full_day(&env).await;

        let mut payload =
            submission(CorrectionType::OverrideAttendanceType, Some(check_in_id));
        payload.requested_type = Some(AttendanceType::HalfDayMorning);
        let request = env
            .corrections
            .submit_at("employee", "t1", "e1", &payload, &actor, at(11, 9, 0))
            .await
            .unwrap();

        let reviewed = env
            .corrections
            .review_at("employee", "t1", "e1", 2026, 3, &request.id, false, &actor, None, at(11, 10, 0))
            .await
            .unwrap();
        assert_eq!(reviewed.status, CorrectionStatus::Rejected);

        // rejected is terminal
        let err = env
            .corrections
            .review_at("employee", "t1", "e1", 2026, 3, &request.id, true, &actor, None, at(11, 11, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, AttendanceError::Validation { .. }));
    }

    #[actix_web::test]
    async fn apply_only_from_approved_and_exactly_once() {
        let env = testkit::office();
        env.add_employee("e1");
        let actor = testkit::actor();
        let check_in_id = seed_full_day(&env).await;

        let mut payload =
            submission(CorrectionType::OverrideAttendanceType, Some(check_in_id));
        payload.requested_type = Some(AttendanceType::HalfDayMorning);
        let request = env
            .corrections
            .submit_at("employee", "t1", "e1", &payload, &actor, at(11, 9, 0))
            .await
            .unwrap();

        // pending: apply refused
        let err = env
            .corrections
            .apply_at("employee", "t1", "e1", 2026, 3, &request.id, &actor, at(11, 10, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, AttendanceError::Validation { .. }));

        env.corrections
            .review_at("employee", "t1", "e1", 2026, 3, &request.id, true, &actor, None, at(11, 10, 0))
            .await
            .unwrap();

        let applied = env
            .corrections
            .apply_at("employee", "t1", "e1", 2026, 3, &request.id, &actor, at(11, 11, 0))
            .await
            .unwrap();
        assert_eq!(applied.status, CorrectionStatus::Applied);
        assert!(applied.applied_at.is_some());

        // applied is terminal: no double application
        let err = env
            .corrections
            .apply_at("employee", "t1", "e1", 2026, 3, &request.id, &actor, at(11, 12, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, AttendanceError::Validation { .. }));
    }

    #[actix_web::test]
    async fn override_recomputes_work_day_counters() {
        let env = testkit::office();
        env.add_employee("e1");
        let actor = testkit::actor();
        let check_in_id = seed_full_day(&env).await;

        let before = env
            .sessions
            .period("employee", "t1", "e1", 2026, 3)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(before.full_days_count, 1);
        assert_eq!(before.total_work_days, 1.0);

        let mut payload =
            submission(CorrectionType::OverrideAttendanceType, Some(check_in_id.clone()));
        payload.requested_type = Some(AttendanceType::HalfDayMorning);
        let request = env
            .corrections
            .submit_at("employee", "t1", "e1", &payload, &actor, at(11, 9, 0))
            .await
            .unwrap();
        env.corrections
            .review_at("employee", "t1", "e1", 2026, 3, &request.id, true, &actor, None, at(11, 10, 0))
            .await
            .unwrap();
        env.corrections
            .apply_at("employee", "t1", "e1", 2026, 3, &request.id, &actor, at(11, 11, 0))
            .await
            .unwrap();

        let after = env
            .sessions
            .period("employee", "t1", "e1", 2026, 3)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(after.full_days_count, 0);
        assert_eq!(after.half_days_count, 1);
        assert_eq!(after.total_work_days, 0.5);

        let entry = after.entry(&check_in_id).unwrap();
        assert_eq!(entry.attendance_type, Some(AttendanceType::HalfDayMorning));
        assert_eq!(entry.status, CheckInStatus::Corrected);
        assert_eq!(entry.corrections.len(), 1);
        assert_eq!(entry.corrections[0].field, "attendance_type");
        assert_eq!(entry.corrections[0].before.as_deref(), Some("full_day"));
    }

    #[actix_web::test]
    async fn delete_duplicate_invalidates_without_removing() {
        let env = testkit::office();
        env.add_employee("e1");
        let actor = testkit::actor();
        let check_in_id = seed_full_day(&env).await;

        let request = env
            .corrections
            .submit_at(
                "employee",
                "t1",
                "e1",
                &submission(CorrectionType::DeleteDuplicate, Some(check_in_id.clone())),
                &actor,
                at(11, 9, 0),
            )
            .await
            .unwrap();
        env.corrections
            .review_at("employee", "t1", "e1", 2026, 3, &request.id, true, &actor, None, at(11, 10, 0))
            .await
            .unwrap();
        env.corrections
            .apply_at("employee", "t1", "e1", 2026, 3, &request.id, &actor, at(11, 11, 0))
            .await
            .unwrap();

        let record = env
            .sessions
            .period("employee", "t1", "e1", 2026, 3)
            .await
            .unwrap()
            .unwrap();
        // entry still present, aggregates no longer count it
        assert_eq!(record.monthly_total, 1);
        assert_eq!(record.entry(&check_in_id).unwrap().status, CheckInStatus::Invalid);
        assert_eq!(record.full_days_count, 0);
        assert_eq!(record.unique_days_visited, 0);
        assert_eq!(record.total_work_days, 0.0);
    }

    #[actix_web::test]
    async fn add_missing_attendance_creates_classified_entry() {
        let env = testkit::office();
        env.add_employee("e1");
        let actor = testkit::actor();

        // no record exists for the period yet
        let mut payload = submission(CorrectionType::AddMissingAttendance, None);
        payload.requested_check_in = Some(at(5, 9, 0));
        payload.requested_check_out = Some(at(5, 17, 30));
        let request = env
            .corrections
            .submit_at("employee", "t1", "e1", &payload, &actor, at(11, 9, 0))
            .await
            .unwrap();
        env.corrections
            .review_at("employee", "t1", "e1", 2026, 3, &request.id, true, &actor, None, at(11, 10, 0))
            .await
            .unwrap();
        env.corrections
            .apply_at("employee", "t1", "e1", 2026, 3, &request.id, &actor, at(11, 11, 0))
            .await
            .unwrap();

        let record = env
            .sessions
            .period("employee", "t1", "e1", 2026, 3)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.monthly_total, 1);
        let entry = &record.check_ins[0];
        // 8.5h on the 8h schedule
        assert_eq!(entry.attendance_type, Some(AttendanceType::FullDay));
        assert_eq!(entry.duration_minutes, Some(510));
        assert_eq!(record.total_work_days, 1.0);
        assert!(record.visited_days.contains("2026-03-05"));
    }

    #[actix_web::test]
    async fn update_check_out_time_recomputes_duration() {
        let env = testkit::office();
        env.add_employee("e1");
        let actor = testkit::actor();
        let check_in_id = seed_full_day(&env).await;

        let mut payload =
            submission(CorrectionType::UpdateCheckOutTime, Some(check_in_id.clone()));
        payload.requested_check_out = Some(at(10, 18, 0));
        let request = env
            .corrections
            .submit_at("employee", "t1", "e1", &payload, &actor, at(11, 9, 0))
            .await
            .unwrap();
        env.corrections
            .review_at("employee", "t1", "e1", 2026, 3, &request.id, true, &actor, None, at(11, 10, 0))
            .await
            .unwrap();
        env.corrections
            .apply_at("employee", "t1", "e1", 2026, 3, &request.id, &actor, at(11, 11, 0))
            .await
            .unwrap();

        let record = env
            .sessions
            .period("employee", "t1", "e1", 2026, 3)
            .await
            .unwrap()
            .unwrap();
        let entry = record.entry(&check_in_id).unwrap();
        assert_eq!(entry.check_out, Some(at(10, 18, 0)));
        // 09:00 -> 18:00
        assert_eq!(entry.duration_minutes, Some(540));
        assert_eq!(entry.corrections.last().unwrap().field, "check_out_time");
    }
}
