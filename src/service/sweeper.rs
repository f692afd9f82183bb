//! Expiry sweeper: force-closes sessions left open past their expected
//! check-out. Runs through the regular check-out path with the
//! auto-checked-out flag set, one entity at a time; a failing entity is
//! recorded and the batch moves on.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::model::Actor;
use crate::service::session::SessionService;
use crate::store::{AttendanceStore, EntityRegistry, EntityStore};

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SweptSession {
    pub entity_type: String,
    pub entity_id: String,
    pub check_in_id: String,
    pub duration_minutes: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SweepFailure {
    pub entity_type: String,
    pub entity_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct SweepOutcome {
    pub scanned: usize,
    pub checked_out: Vec<SweptSession>,
    pub failures: Vec<SweepFailure>,
}

pub struct ExpirySweeper<R: AttendanceStore, E: EntityStore> {
    sessions: Arc<SessionService<R, E>>,
    entities: Arc<EntityRegistry<E>>,
}

impl<R: AttendanceStore, E: EntityStore> ExpirySweeper<R, E> {
    pub fn new(sessions: Arc<SessionService<R, E>>, entities: Arc<EntityRegistry<E>>) -> Self {
        Self { sessions, entities }
    }

    pub async fn sweep(
        &self,
        tenant_id: Option<&str>,
        cutoff: DateTime<Utc>,
        actor: &Actor,
    ) -> SweepOutcome {
        self.sweep_at(tenant_id, cutoff, actor, Utc::now()).await
    }

    pub async fn sweep_at(
        &self,
        tenant_id: Option<&str>,
        cutoff: DateTime<Utc>,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> SweepOutcome {
        let mut outcome = SweepOutcome::default();

        for (entity_type, store) in self.entities.iter() {
            let candidates = match store.expired_sessions(tenant_id, cutoff).await {
                Ok(candidates) => candidates,
                Err(e) => {
                    warn!(entity_type, error = %e, "expired-session scan failed");
                    outcome.failures.push(SweepFailure {
                        entity_type: entity_type.to_string(),
                        entity_id: String::new(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            for entity in candidates {
                outcome.scanned += 1;
                let Some(check_in_id) = entity.current_session.check_in_id.clone() else {
                    outcome.failures.push(SweepFailure {
                        entity_type: entity_type.to_string(),
                        entity_id: entity.id.clone(),
                        reason: "active session without a check-in id".to_string(),
                    });
                    continue;
                };

                match self
                    .sessions
                    .check_out_at(
                        entity_type,
                        &entity.tenant_id,
                        &entity.id,
                        &check_in_id,
                        actor,
                        true,
                        now,
                    )
                    .await
                {
                    Ok(out) => outcome.checked_out.push(SweptSession {
                        entity_type: entity_type.to_string(),
                        entity_id: entity.id.clone(),
                        check_in_id,
                        duration_minutes: out.duration_minutes,
                    }),
                    Err(e) => outcome.failures.push(SweepFailure {
                        entity_type: entity_type.to_string(),
                        entity_id: entity.id.clone(),
                        reason: e.to_string(),
                    }),
                }
            }
        }

        info!(
            scanned = outcome.scanned,
            checked_out = outcome.checked_out.len(),
            failures = outcome.failures.len(),
            "expiry sweep finished"
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::attendance::CheckInStatus;
    use crate::service::session::CheckInRequest;
    use crate::service::testkit;
    use chrono::{Duration, TimeZone};

    #[actix_web::test]
    async fn sweeps_expired_sessions_and_collects_failures() {
        let env = testkit::gym();
        env.add_member("m1");
        env.add_member("m2");
        let actor = testkit::actor();

        let opened = Utc.with_ymd_and_hms(2026, 3, 10, 6, 0, 0).unwrap();
        env.sessions
            .check_in_at("member", "t1", "m1", &CheckInRequest::default(), &actor, opened)
            .await
            .unwrap();

        // m2 has a corrupt projection: active but no check-in id
        let mut broken = env.backend.entity("t1", "member", "m2").unwrap();
        broken.current_session.is_active = true;
        broken.current_session.expected_check_out = Some(opened + Duration::hours(1));
        env.backend.insert_entity(broken);

        // cutoff well past the 12h max session
        let cutoff = opened + Duration::hours(20);
        let outcome = env.sweeper.sweep_at(None, cutoff, &Actor::system(), cutoff).await;

        assert_eq!(outcome.scanned, 2);
        assert_eq!(outcome.checked_out.len(), 1);
        assert_eq!(outcome.checked_out[0].entity_id, "m1");
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].entity_id, "m2");

        // the swept entry carries the auto flag
        let record = env
            .sessions
            .period("member", "t1", "m1", 2026, 3)
            .await
            .unwrap()
            .unwrap();
        let entry = &record.check_ins[0];
        assert!(entry.auto_checked_out);
        assert_eq!(entry.status, CheckInStatus::Valid);
        assert!(entry.check_out.is_some());

        let entity = env.backend.entity("t1", "member", "m1").unwrap();
        assert!(!entity.current_session.is_active);
    }

    #[actix_web::test]
    async fn sweep_skips_sessions_inside_the_window() {
        let env = testkit::gym();
        env.add_member("m1");
        let actor = testkit::actor();

        let opened = Utc.with_ymd_and_hms(2026, 3, 10, 6, 0, 0).unwrap();
        env.sessions
            .check_in_at("member", "t1", "m1", &CheckInRequest::default(), &actor, opened)
            .await
            .unwrap();

        // cutoff before expected check-out: nothing to do
        let cutoff = opened + Duration::hours(1);
        let outcome = env.sweeper.sweep_at(None, cutoff, &Actor::system(), cutoff).await;
        assert_eq!(outcome.scanned, 0);
        assert!(outcome.checked_out.is_empty());
    }
}
