//! Persistence contracts for the attendance core.
//!
//! The period record is the unit of atomicity: `acquire` hands back the
//! current state together with a backend guard, and `commit` writes the
//! mutated record (plus the entity's cached session/stats fields) in one
//! transaction. Dropping the guard without committing abandons the
//! operation with no partial effect.

pub mod memory;
pub mod mysql;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::AttendanceError;
use crate::model::attendance::{AttendanceRecord, PeriodKey};
use crate::model::entity::{CurrentSession, EngagementStats, TrackedEntity};

/// Cached fields written back onto the entity alongside a record commit.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityPatch {
    pub tenant_id: String,
    pub entity_type: String,
    pub entity_id: String,
    pub session: CurrentSession,
    pub stats: EngagementStats,
}

#[async_trait]
pub trait AttendanceStore: Send + Sync {
    /// Backend handle pinning the period row for the duration of one
    /// operation.
    type Guard: Send;

    /// Lock-or-create the period record. A concurrent first-check-in race
    /// on the uniqueness key is resolved internally: lose the insert,
    /// fetch the winner's row, exactly one retry.
    async fn acquire(
        &self,
        key: &PeriodKey,
    ) -> Result<(AttendanceRecord, Self::Guard), AttendanceError>;

    /// Persist the mutated record and, when given, the entity's cached
    /// fields, atomically.
    async fn commit(
        &self,
        guard: Self::Guard,
        record: &AttendanceRecord,
        patch: Option<&EntityPatch>,
    ) -> Result<(), AttendanceError>;

    /// Read one period without locking it.
    async fn find_period(
        &self,
        key: &PeriodKey,
    ) -> Result<Option<AttendanceRecord>, AttendanceError>;

    /// All period records for one entity, oldest first. Input to the
    /// engagement fold.
    async fn load_history(
        &self,
        tenant_id: &str,
        entity_type: &str,
        entity_id: &str,
    ) -> Result<Vec<AttendanceRecord>, AttendanceError>;
}

#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn find(
        &self,
        tenant_id: &str,
        entity_id: &str,
    ) -> Result<Option<TrackedEntity>, AttendanceError>;

    /// Badge-token lookup for kiosk devices.
    async fn find_by_badge(
        &self,
        tenant_id: &str,
        badge_token: &str,
    ) -> Result<Option<TrackedEntity>, AttendanceError>;

    /// Entities whose cached session is active with an expected check-out
    /// before the cutoff. Sweep candidates.
    async fn expired_sessions(
        &self,
        tenant_id: Option<&str>,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<TrackedEntity>, AttendanceError>;
}

/// Entity stores keyed by entity-type tag, wired once at startup. The
/// core only ever resolves types through here; an unregistered tag is a
/// typed refusal, not a dynamic lookup.
pub struct EntityRegistry<E: EntityStore> {
    stores: HashMap<String, Arc<E>>,
}

impl<E: EntityStore> EntityRegistry<E> {
    pub fn new() -> Self {
        Self { stores: HashMap::new() }
    }

    pub fn with(mut self, entity_type: impl Into<String>, store: Arc<E>) -> Self {
        self.stores.insert(entity_type.into(), store);
        self
    }

    pub fn get(&self, entity_type: &str) -> Result<&Arc<E>, AttendanceError> {
        self.stores.get(entity_type).ok_or_else(|| AttendanceError::TargetModelNotAllowed {
            entity_type: entity_type.to_string(),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<E>)> {
        self.stores.iter().map(|(tag, store)| (tag.as_str(), store))
    }
}

impl<E: EntityStore> Default for EntityRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}
