//! MySQL backend for the persistence contracts.
//!
//! One row per period record; embedded collections (entries, correction
//! requests, histograms) live in JSON columns so the whole aggregate
//! updates as a single row inside a transaction. The composite uniqueness
//! key on (tenant, entity_type, entity_id, year, month) resolves the
//! concurrent first-check-in race: the losing INSERT sees error 23000 and
//! retries as a fetch of the winner's row, exactly once.

use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::mysql::MySql;
use sqlx::types::Json;
use sqlx::{FromRow, MySqlPool, Transaction};

use crate::error::AttendanceError;
use crate::model::attendance::{AttendanceRecord, CheckInEntry, PeriodKey};
use crate::model::correction::CorrectionRequest;
use crate::model::entity::{
    CurrentSession, EngagementStats, EntitySchedule, EntityStatus, TrackedEntity,
};
use crate::utils::entity_cache;

use super::{AttendanceStore, EntityPatch, EntityStore};

const PERIOD_COLUMNS: &str = "id, tenant_id, entity_type, entity_id, year, month, \
     check_ins, correction_requests, visited_days, time_slot_histogram, weekday_histogram, \
     monthly_total, unique_days_visited, full_days_count, half_days_count, \
     paid_leave_days_count, overtime_days_count, total_work_days";

const ENTITY_COLUMNS: &str = "id, tenant_id, entity_type, display_name, badge_token, status, \
     attendance_enabled, schedule, current_session, stats";

#[derive(FromRow)]
struct PeriodRow {
    id: u64,
    tenant_id: String,
    entity_type: String,
    entity_id: String,
    year: i32,
    month: u32,
    check_ins: Json<Vec<CheckInEntry>>,
    correction_requests: Json<Vec<CorrectionRequest>>,
    visited_days: Json<BTreeSet<String>>,
    time_slot_histogram: Json<BTreeMap<String, u32>>,
    weekday_histogram: Json<BTreeMap<String, u32>>,
    monthly_total: u32,
    unique_days_visited: u32,
    full_days_count: u32,
    half_days_count: u32,
    paid_leave_days_count: u32,
    overtime_days_count: u32,
    total_work_days: f64,
}

impl PeriodRow {
    fn into_record(self) -> AttendanceRecord {
        AttendanceRecord {
            tenant_id: self.tenant_id,
            entity_type: self.entity_type,
            entity_id: self.entity_id,
            year: self.year,
            month: self.month,
            check_ins: self.check_ins.0,
            correction_requests: self.correction_requests.0,
            monthly_total: self.monthly_total,
            unique_days_visited: self.unique_days_visited,
            visited_days: self.visited_days.0,
            full_days_count: self.full_days_count,
            half_days_count: self.half_days_count,
            paid_leave_days_count: self.paid_leave_days_count,
            overtime_days_count: self.overtime_days_count,
            total_work_days: self.total_work_days,
            time_slot_histogram: self.time_slot_histogram.0,
            weekday_histogram: self.weekday_histogram.0,
        }
    }
}

#[derive(FromRow)]
struct EntityRow {
    id: String,
    tenant_id: String,
    entity_type: String,
    display_name: String,
    badge_token: Option<String>,
    status: String,
    attendance_enabled: bool,
    schedule: Option<Json<EntitySchedule>>,
    current_session: Json<CurrentSession>,
    stats: Json<EngagementStats>,
}

impl EntityRow {
    fn into_entity(self) -> Result<TrackedEntity, AttendanceError> {
        let status = EntityStatus::from_str(&self.status).map_err(|_| {
            AttendanceError::operation(format!("unknown entity status '{}'", self.status))
        })?;
        Ok(TrackedEntity {
            id: self.id,
            tenant_id: self.tenant_id,
            entity_type: self.entity_type,
            display_name: self.display_name,
            badge_token: self.badge_token,
            status,
            attendance_enabled: self.attendance_enabled,
            schedule: self.schedule.map(|j| j.0),
            current_session: self.current_session.0,
            stats: self.stats.0,
        })
    }
}

fn is_duplicate_key(e: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = e {
        return db_err.code().as_deref() == Some("23000");
    }
    false
}

pub struct MySqlAttendanceStore {
    pool: MySqlPool,
}

impl MySqlAttendanceStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    async fn select_for_update(
        txn: &mut Transaction<'static, MySql>,
        key: &PeriodKey,
    ) -> Result<Option<PeriodRow>, AttendanceError> {
        let sql = format!(
            "SELECT {PERIOD_COLUMNS} FROM attendance_records \
             WHERE tenant_id = ? AND entity_type = ? AND entity_id = ? \
             AND year = ? AND month = ? FOR UPDATE"
        );
        let row = sqlx::query_as::<_, PeriodRow>(&sql)
            .bind(&key.tenant_id)
            .bind(&key.entity_type)
            .bind(&key.entity_id)
            .bind(key.year)
            .bind(key.month)
            .fetch_optional(&mut **txn)
            .await?;
        Ok(row)
    }

    async fn insert_fresh(
        txn: &mut Transaction<'static, MySql>,
        record: &AttendanceRecord,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO attendance_records
                (tenant_id, entity_type, entity_id, year, month,
                 check_ins, correction_requests, visited_days,
                 time_slot_histogram, weekday_histogram,
                 monthly_total, unique_days_visited, full_days_count,
                 half_days_count, paid_leave_days_count, overtime_days_count,
                 total_work_days)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.tenant_id)
        .bind(&record.entity_type)
        .bind(&record.entity_id)
        .bind(record.year)
        .bind(record.month)
        .bind(Json(&record.check_ins))
        .bind(Json(&record.correction_requests))
        .bind(Json(&record.visited_days))
        .bind(Json(&record.time_slot_histogram))
        .bind(Json(&record.weekday_histogram))
        .bind(record.monthly_total)
        .bind(record.unique_days_visited)
        .bind(record.full_days_count)
        .bind(record.half_days_count)
        .bind(record.paid_leave_days_count)
        .bind(record.overtime_days_count)
        .bind(record.total_work_days)
        .execute(&mut **txn)
        .await?;
        Ok(result.last_insert_id())
    }
}

pub struct MySqlPeriodGuard {
    txn: Transaction<'static, MySql>,
    row_id: u64,
}

#[async_trait]
impl AttendanceStore for MySqlAttendanceStore {
    type Guard = MySqlPeriodGuard;

    async fn acquire(
        &self,
        key: &PeriodKey,
    ) -> Result<(AttendanceRecord, Self::Guard), AttendanceError> {
        let mut txn = self.pool.begin().await?;

        if let Some(row) = Self::select_for_update(&mut txn, key).await? {
            let row_id = row.id;
            return Ok((row.into_record(), MySqlPeriodGuard { txn, row_id }));
        }

        let fresh = AttendanceRecord::new(key.clone());
        match Self::insert_fresh(&mut txn, &fresh).await {
            Ok(row_id) => Ok((fresh, MySqlPeriodGuard { txn, row_id })),
            Err(e) if is_duplicate_key(&e) => {
                // lost the creation race: someone else just made the row
                tracing::debug!(
                    period = %key.period_label(),
                    entity_id = %key.entity_id,
                    "period record created concurrently, fetching existing"
                );
                let row = Self::select_for_update(&mut txn, key).await?.ok_or_else(|| {
                    AttendanceError::operation(
                        "period record vanished after duplicate-key insert",
                    )
                })?;
                let row_id = row.id;
                Ok((row.into_record(), MySqlPeriodGuard { txn, row_id }))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn commit(
        &self,
        guard: Self::Guard,
        record: &AttendanceRecord,
        patch: Option<&EntityPatch>,
    ) -> Result<(), AttendanceError> {
        let MySqlPeriodGuard { mut txn, row_id } = guard;

        sqlx::query(
            r#"
            UPDATE attendance_records SET
                check_ins = ?, correction_requests = ?, visited_days = ?,
                time_slot_histogram = ?, weekday_histogram = ?,
                monthly_total = ?, unique_days_visited = ?, full_days_count = ?,
                half_days_count = ?, paid_leave_days_count = ?, overtime_days_count = ?,
                total_work_days = ?, updated_at = NOW()
            WHERE id = ?
            "#,
        )
        .bind(Json(&record.check_ins))
        .bind(Json(&record.correction_requests))
        .bind(Json(&record.visited_days))
        .bind(Json(&record.time_slot_histogram))
        .bind(Json(&record.weekday_histogram))
        .bind(record.monthly_total)
        .bind(record.unique_days_visited)
        .bind(record.full_days_count)
        .bind(record.half_days_count)
        .bind(record.paid_leave_days_count)
        .bind(record.overtime_days_count)
        .bind(record.total_work_days)
        .bind(row_id)
        .execute(&mut *txn)
        .await?;

        if let Some(patch) = patch {
            sqlx::query(
                r#"
                UPDATE entities SET current_session = ?, stats = ?, updated_at = NOW()
                WHERE tenant_id = ? AND entity_type = ? AND id = ?
                "#,
            )
            .bind(Json(&patch.session))
            .bind(Json(&patch.stats))
            .bind(&patch.tenant_id)
            .bind(&patch.entity_type)
            .bind(&patch.entity_id)
            .execute(&mut *txn)
            .await?;
        }

        txn.commit().await?;

        // cached snapshot is stale now
        if let Some(patch) = patch {
            entity_cache::invalidate(&patch.tenant_id, &patch.entity_type, &patch.entity_id)
                .await;
        }
        Ok(())
    }

    async fn find_period(
        &self,
        key: &PeriodKey,
    ) -> Result<Option<AttendanceRecord>, AttendanceError> {
        let sql = format!(
            "SELECT {PERIOD_COLUMNS} FROM attendance_records \
             WHERE tenant_id = ? AND entity_type = ? AND entity_id = ? \
             AND year = ? AND month = ?"
        );
        let row = sqlx::query_as::<_, PeriodRow>(&sql)
            .bind(&key.tenant_id)
            .bind(&key.entity_type)
            .bind(&key.entity_id)
            .bind(key.year)
            .bind(key.month)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(PeriodRow::into_record))
    }

    async fn load_history(
        &self,
        tenant_id: &str,
        entity_type: &str,
        entity_id: &str,
    ) -> Result<Vec<AttendanceRecord>, AttendanceError> {
        let sql = format!(
            "SELECT {PERIOD_COLUMNS} FROM attendance_records \
             WHERE tenant_id = ? AND entity_type = ? AND entity_id = ? \
             ORDER BY year, month"
        );
        let rows = sqlx::query_as::<_, PeriodRow>(&sql)
            .bind(tenant_id)
            .bind(entity_type)
            .bind(entity_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(PeriodRow::into_record).collect())
    }
}

pub struct MySqlEntityStore {
    pool: MySqlPool,
    entity_type: String,
}

impl MySqlEntityStore {
    pub fn new(pool: MySqlPool, entity_type: impl Into<String>) -> Self {
        Self { pool, entity_type: entity_type.into() }
    }
}

#[async_trait]
impl EntityStore for MySqlEntityStore {
    async fn find(
        &self,
        tenant_id: &str,
        entity_id: &str,
    ) -> Result<Option<TrackedEntity>, AttendanceError> {
        if let Some(hit) = entity_cache::get(tenant_id, &self.entity_type, entity_id).await {
            return Ok(Some(hit));
        }

        let sql = format!(
            "SELECT {ENTITY_COLUMNS} FROM entities \
             WHERE tenant_id = ? AND entity_type = ? AND id = ?"
        );
        let row = sqlx::query_as::<_, EntityRow>(&sql)
            .bind(tenant_id)
            .bind(&self.entity_type)
            .bind(entity_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let entity = row.into_entity()?;
                entity_cache::put(entity.clone()).await;
                Ok(Some(entity))
            }
            None => Ok(None),
        }
    }

    async fn find_by_badge(
        &self,
        tenant_id: &str,
        badge_token: &str,
    ) -> Result<Option<TrackedEntity>, AttendanceError> {
        let sql = format!(
            "SELECT {ENTITY_COLUMNS} FROM entities \
             WHERE tenant_id = ? AND entity_type = ? AND badge_token = ?"
        );
        let row = sqlx::query_as::<_, EntityRow>(&sql)
            .bind(tenant_id)
            .bind(&self.entity_type)
            .bind(badge_token)
            .fetch_optional(&self.pool)
            .await?;
        row.map(EntityRow::into_entity).transpose()
    }

    async fn expired_sessions(
        &self,
        tenant_id: Option<&str>,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<TrackedEntity>, AttendanceError> {
        // session projection lives in a JSON column; expected_check_out is
        // an RFC 3339 string, so a lexicographic compare against the same
        // format is chronologically correct
        let mut sql = format!(
            "SELECT {ENTITY_COLUMNS} FROM entities \
             WHERE entity_type = ? AND attendance_enabled = 1 \
             AND JSON_EXTRACT(current_session, '$.is_active') = TRUE \
             AND JSON_UNQUOTE(JSON_EXTRACT(current_session, '$.expected_check_out')) IS NOT NULL \
             AND JSON_UNQUOTE(JSON_EXTRACT(current_session, '$.expected_check_out')) < ?"
        );
        if tenant_id.is_some() {
            sql.push_str(" AND tenant_id = ?");
        }

        let mut query = sqlx::query_as::<_, EntityRow>(&sql)
            .bind(&self.entity_type)
            .bind(cutoff.to_rfc3339_opts(SecondsFormat::Secs, true));
        if let Some(tenant) = tenant_id {
            query = query.bind(tenant);
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.into_iter().map(EntityRow::into_entity).collect()
    }
}
