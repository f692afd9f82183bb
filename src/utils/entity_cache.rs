use anyhow::Result;
use futures_util::StreamExt;
use moka::future::Cache;
use once_cell::sync::Lazy;
use sqlx::MySqlPool;
use sqlx::types::Json;
use std::time::Duration;

use crate::model::entity::{
    CurrentSession, EngagementStats, EntitySchedule, EntityStatus, TrackedEntity,
};

/// Entity snapshots keyed by tenant/type/id. Short TTL: the snapshot
/// carries the cached session projection, and a stale one would defeat
/// the duplicate-check-in window, so commits invalidate eagerly and the
/// TTL only covers writers outside this process.
static ENTITY_CACHE: Lazy<Cache<String, TrackedEntity>> = Lazy::new(|| {
    Cache::builder()
        .max_capacity(200_000) // tune based on memory
        .time_to_live(Duration::from_secs(30))
        .build()
});

fn cache_key(tenant_id: &str, entity_type: &str, entity_id: &str) -> String {
    format!("{tenant_id}:{entity_type}:{entity_id}")
}

pub async fn get(tenant_id: &str, entity_type: &str, entity_id: &str) -> Option<TrackedEntity> {
    ENTITY_CACHE.get(&cache_key(tenant_id, entity_type, entity_id)).await
}

pub async fn put(entity: TrackedEntity) {
    let key = cache_key(&entity.tenant_id, &entity.entity_type, &entity.id);
    ENTITY_CACHE.insert(key, entity).await;
}

pub async fn invalidate(tenant_id: &str, entity_type: &str, entity_id: &str) {
    ENTITY_CACHE.invalidate(&cache_key(tenant_id, entity_type, entity_id)).await;
}

#[derive(sqlx::FromRow)]
struct WarmupRow {
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

/// Preload entities seen recently so the first kiosk taps of the day
/// skip the database.
pub async fn warmup_entity_cache(pool: &MySqlPool, days: u32, batch_size: usize) -> Result<()> {
    let mut stream = sqlx::query_as::<_, WarmupRow>(
        r#"
        SELECT id, tenant_id, entity_type, display_name, badge_token, status,
               attendance_enabled, schedule, current_session, stats
        FROM entities
        WHERE updated_at >= NOW() - INTERVAL ? DAY
        ORDER BY updated_at DESC
        "#,
    )
    .bind(days)
    .fetch(pool);

    let mut batch = Vec::with_capacity(batch_size);
    let mut total_count = 0usize;

    while let Some(row) = stream.next().await {
        let row = row?;
        let status = match row.status.parse::<EntityStatus>() {
            Ok(s) => s,
            Err(_) => {
                tracing::warn!(entity_id = %row.id, status = %row.status, "skipping entity with unknown status");
                continue;
            }
        };
        batch.push(TrackedEntity {
            id: row.id,
            tenant_id: row.tenant_id,
            entity_type: row.entity_type,
            display_name: row.display_name,
            badge_token: row.badge_token,
            status,
            attendance_enabled: row.attendance_enabled,
            schedule: row.schedule.map(|j| j.0),
            current_session: row.current_session.0,
            stats: row.stats.0,
        });
        total_count += 1;

        if batch.len() >= batch_size {
            for entity in batch.drain(..) {
                put(entity).await;
            }
        }
    }

    for entity in batch {
        put(entity).await;
    }

    log::info!(
        "Entity cache warmup complete: {} entities (last {} days)",
        total_count,
        days
    );

    Ok(())
}
