//! In-memory store backend.
//!
//! Reference semantics for the persistence contract and the test double
//! behind the service-level tests. Not safe against lost updates under
//! real concurrency; the MySQL backend is the production one.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::AttendanceError;
use crate::model::attendance::{AttendanceRecord, PeriodKey};
use crate::model::entity::TrackedEntity;

use super::{AttendanceStore, EntityPatch, EntityStore};

type EntityKey = (String, String, String); // tenant, entity_type, id

#[derive(Default)]
pub struct MemoryBackend {
    periods: Mutex<HashMap<PeriodKey, AttendanceRecord>>,
    entities: Mutex<HashMap<EntityKey, TrackedEntity>>,
}

impl MemoryBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn insert_entity(&self, entity: TrackedEntity) {
        let key = (entity.tenant_id.clone(), entity.entity_type.clone(), entity.id.clone());
        self.entities.lock().expect("entity map poisoned").insert(key, entity);
    }

    pub fn entity(
        &self,
        tenant_id: &str,
        entity_type: &str,
        entity_id: &str,
    ) -> Option<TrackedEntity> {
        self.entities
            .lock()
            .expect("entity map poisoned")
            .get(&(tenant_id.to_string(), entity_type.to_string(), entity_id.to_string()))
            .cloned()
    }
}

pub struct MemoryAttendanceStore {
    backend: Arc<MemoryBackend>,
}

impl MemoryAttendanceStore {
    pub fn new(backend: Arc<MemoryBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl AttendanceStore for MemoryAttendanceStore {
    type Guard = PeriodKey;

    async fn acquire(
        &self,
        key: &PeriodKey,
    ) -> Result<(AttendanceRecord, Self::Guard), AttendanceError> {
        let periods = self.backend.periods.lock().expect("period map poisoned");
        let record = periods
            .get(key)
            .cloned()
            .unwrap_or_else(|| AttendanceRecord::new(key.clone()));
        Ok((record, key.clone()))
    }

    async fn commit(
        &self,
        guard: Self::Guard,
        record: &AttendanceRecord,
        patch: Option<&EntityPatch>,
    ) -> Result<(), AttendanceError> {
        self.backend
            .periods
            .lock()
            .expect("period map poisoned")
            .insert(guard, record.clone());

        if let Some(patch) = patch {
            let key = (
                patch.tenant_id.clone(),
                patch.entity_type.clone(),
                patch.entity_id.clone(),
            );
            let mut entities = self.backend.entities.lock().expect("entity map poisoned");
            if let Some(entity) = entities.get_mut(&key) {
                entity.current_session = patch.session.clone();
                entity.stats = patch.stats.clone();
            }
        }
        Ok(())
    }

    async fn find_period(
        &self,
        key: &PeriodKey,
    ) -> Result<Option<AttendanceRecord>, AttendanceError> {
        Ok(self.backend.periods.lock().expect("period map poisoned").get(key).cloned())
    }

    async fn load_history(
        &self,
        tenant_id: &str,
        entity_type: &str,
        entity_id: &str,
    ) -> Result<Vec<AttendanceRecord>, AttendanceError> {
        let periods = self.backend.periods.lock().expect("period map poisoned");
        let mut records: Vec<AttendanceRecord> = periods
            .values()
            .filter(|r| {
                r.tenant_id == tenant_id
                    && r.entity_type == entity_type
                    && r.entity_id == entity_id
            })
            .cloned()
            .collect();
        records.sort_by_key(|r| (r.year, r.month));
        Ok(records)
    }
}

pub struct MemoryEntityStore {
    backend: Arc<MemoryBackend>,
    entity_type: String,
}

impl MemoryEntityStore {
    pub fn new(backend: Arc<MemoryBackend>, entity_type: impl Into<String>) -> Self {
        Self { backend, entity_type: entity_type.into() }
    }
}

#[async_trait]
impl EntityStore for MemoryEntityStore {
    async fn find(
        &self,
        tenant_id: &str,
        entity_id: &str,
    ) -> Result<Option<TrackedEntity>, AttendanceError> {
        Ok(self.backend.entity(tenant_id, &self.entity_type, entity_id))
    }

    async fn find_by_badge(
        &self,
        tenant_id: &str,
        badge_token: &str,
    ) -> Result<Option<TrackedEntity>, AttendanceError> {
        let entities = self.backend.entities.lock().expect("entity map poisoned");
        Ok(entities
            .values()
            .find(|e| {
                e.tenant_id == tenant_id
                    && e.entity_type == self.entity_type
                    && e.badge_token.as_deref() == Some(badge_token)
            })
            .cloned())
    }

    async fn expired_sessions(
        &self,
        tenant_id: Option<&str>,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<TrackedEntity>, AttendanceError> {
        let entities = self.backend.entities.lock().expect("entity map poisoned");
        Ok(entities
            .values()
            .filter(|e| {
                e.entity_type == self.entity_type
                    && tenant_id.map_or(true, |t| e.tenant_id == t)
                    && e.current_session.is_active
                    && e.current_session
                        .expected_check_out
                        .map_or(false, |expected| expected < cutoff)
            })
            .cloned()
            .collect())
    }
}
