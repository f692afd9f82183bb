use anyhow::{Result, anyhow};
use autoscale_cuckoo_filter::CuckooFilter;
use futures::StreamExt;
use once_cell::sync::Lazy;
use sqlx::MySqlPool;
use std::sync::RwLock;

/// Expected capacity and false-positive rate.
/// Tune these based on real badge counts.
const FILTER_CAPACITY: usize = 200_000;
const FALSE_POSITIVE_RATE: f64 = 0.001;

/// Known badge tokens. Kiosk devices fire a lookup per tap, most junk
/// scans never match a real badge, and this gives those a fast negative
/// before any database round-trip.
static BADGE_FILTER: Lazy<RwLock<CuckooFilter<String>>> = Lazy::new(|| {
    RwLock::new(CuckooFilter::new(FILTER_CAPACITY, FALSE_POSITIVE_RATE))
});

#[inline]
fn normalize(token: &str) -> String {
    token.trim().to_string()
}

/// Check if a badge token might exist (false positives possible)
pub fn might_exist(token: &str) -> bool {
    let token = normalize(token);
    BADGE_FILTER.read().expect("badge filter poisoned").contains(&token)
}

/// Insert a single badge token into the filter
pub fn insert(token: &str) {
    let token = normalize(token);
    BADGE_FILTER.write().expect("badge filter poisoned").add(&token);
}

/// Remove a badge token from the filter
pub fn remove(token: &str) {
    let token = normalize(token);
    BADGE_FILTER.write().expect("badge filter poisoned").remove(&token);
}

/// Warm up the badge filter using streaming + batching
pub async fn warmup_badge_filter(pool: &MySqlPool, batch_size: usize) -> Result<()> {
    let mut stream = sqlx::query_as::<_, (String,)>(
        "SELECT badge_token FROM entities WHERE badge_token IS NOT NULL",
    )
    .fetch(pool);

    let mut batch = Vec::with_capacity(batch_size);
    let mut total = 0usize;

    while let Some(row) = stream.next().await {
        let (token,) = row.map_err(|e| anyhow!("DB row fetch failed: {}", e))?;

        batch.push(normalize(&token));
        total += 1;

        if batch.len() == batch_size {
            insert_batch(&batch);
            batch.clear();
        }
    }

    if !batch.is_empty() {
        insert_batch(&batch);
    }

    log::info!("Badge filter warmup complete: {} badges", total);
    Ok(())
}

/// Insert a batch of normalized badge tokens
fn insert_batch(tokens: &[String]) {
    let mut filter = BADGE_FILTER.write().expect("badge filter poisoned");

    for token in tokens {
        filter.add(token);
    }
}
