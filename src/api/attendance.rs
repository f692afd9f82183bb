use actix_web::{HttpResponse, Responder, web};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::api::actor::ActorContext;
use crate::api::{AppEntityRegistry, AppSessionService, AppSweeper};
use crate::model::attendance::AttendanceRecord;
use crate::model::entity::EngagementStats;
use crate::service::session::{CheckInOutcome, CheckInRequest, CheckOutOutcome};
use crate::service::sweeper::SweepOutcome;
use crate::store::EntityStore;
use crate::utils::entity_filter;

#[derive(Deserialize, ToSchema)]
pub struct CheckOutBody {
    #[schema(example = "b34c9a52-6f6e-4dbb-9f2b-0a4c8f6e2d11")]
    pub check_in_id: String,
}

#[derive(Deserialize, ToSchema)]
pub struct SweepBody {
    /// Sessions whose expected check-out is before this instant are
    /// force-closed. Defaults to now.
    pub cutoff: Option<DateTime<Utc>>,
}

/// Check-in endpoint
#[utoipa::path(
    post,
    path = "/api/v1/attendance/{entity_type}/{entity_id}/check-in",
    params(
        ("entity_type" = String, Path, description = "Registered entity type tag"),
        ("entity_id" = String, Path, description = "Entity identifier")
    ),
    request_body = CheckInRequest,
    responses(
        (status = 200, description = "Checked in successfully", body = CheckInOutcome),
        (status = 403, description = "Attendance not enabled or type not allowed"),
        (status = 404, description = "Unknown entity"),
        (status = 409, description = "Duplicate check-in inside the prevention window"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Attendance"
)]
pub async fn check_in(
    ctx: ActorContext,
    sessions: web::Data<AppSessionService>,
    path: web::Path<(String, String)>,
    payload: Option<web::Json<CheckInRequest>>,
) -> actix_web::Result<impl Responder> {
    let (entity_type, entity_id) = path.into_inner();
    let request = payload.map(|p| p.into_inner()).unwrap_or_default();

    let outcome = sessions
        .check_in(&entity_type, &ctx.tenant_id, &entity_id, &request, &ctx.actor)
        .await?;

    Ok(HttpResponse::Ok().json(outcome))
}

/// Check-out endpoint
#[utoipa::path(
    post,
    path = "/api/v1/attendance/{entity_type}/{entity_id}/check-out",
    params(
        ("entity_type" = String, Path, description = "Registered entity type tag"),
        ("entity_id" = String, Path, description = "Entity identifier")
    ),
    request_body = CheckOutBody,
    responses(
        (status = 200, description = "Checked out successfully", body = CheckOutOutcome),
        (status = 400, description = "No active session for that check-in id"),
        (status = 409, description = "Already checked out"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Attendance"
)]
pub async fn check_out(
    ctx: ActorContext,
    sessions: web::Data<AppSessionService>,
    path: web::Path<(String, String)>,
    payload: web::Json<CheckOutBody>,
) -> actix_web::Result<impl Responder> {
    let (entity_type, entity_id) = path.into_inner();

    let outcome = sessions
        .check_out(&entity_type, &ctx.tenant_id, &entity_id, &payload.check_in_id, &ctx.actor)
        .await?;

    Ok(HttpResponse::Ok().json(outcome))
}

/// Single-tap toggle for kiosk devices that do not know entity state
#[utoipa::path(
    post,
    path = "/api/v1/attendance/{entity_type}/{entity_id}/toggle",
    params(
        ("entity_type" = String, Path, description = "Registered entity type tag"),
        ("entity_id" = String, Path, description = "Entity identifier")
    ),
    request_body = CheckInRequest,
    responses(
        (status = 200, description = "Toggled", body = Object),
        (status = 404, description = "Unknown entity"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Attendance"
)]
pub async fn toggle(
    ctx: ActorContext,
    sessions: web::Data<AppSessionService>,
    path: web::Path<(String, String)>,
    payload: Option<web::Json<CheckInRequest>>,
) -> actix_web::Result<impl Responder> {
    let (entity_type, entity_id) = path.into_inner();
    let request = payload.map(|p| p.into_inner()).unwrap_or_default();

    let outcome = sessions
        .toggle(&entity_type, &ctx.tenant_id, &entity_id, &request, &ctx.actor)
        .await?;

    Ok(HttpResponse::Ok().json(outcome))
}

/// Toggle by badge token (RFID/QR readers)
#[utoipa::path(
    post,
    path = "/api/v1/attendance/badge/{badge_token}/toggle",
    params(
        ("badge_token" = String, Path, description = "Badge token bound to an entity")
    ),
    request_body = CheckInRequest,
    responses(
        (status = 200, description = "Toggled", body = Object),
        (status = 404, description = "Unknown badge"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Attendance"
)]
pub async fn badge_toggle(
    ctx: ActorContext,
    sessions: web::Data<AppSessionService>,
    registry: web::Data<AppEntityRegistry>,
    path: web::Path<String>,
    payload: Option<web::Json<CheckInRequest>>,
) -> actix_web::Result<impl Responder> {
    let badge_token = path.into_inner();

    // fast negative: junk scans never reach the database
    if !entity_filter::might_exist(&badge_token) {
        return Ok(HttpResponse::NotFound().json(serde_json::json!({
            "message": "Unknown badge"
        })));
    }

    let mut resolved = None;
    for (entity_type, store) in registry.iter() {
        if let Some(entity) = store.find_by_badge(&ctx.tenant_id, &badge_token).await? {
            resolved = Some((entity_type.to_string(), entity));
            break;
        }
    }

    let Some((entity_type, entity)) = resolved else {
        return Ok(HttpResponse::NotFound().json(serde_json::json!({
            "message": "Unknown badge"
        })));
    };

    let request = payload.map(|p| p.into_inner()).unwrap_or_default();
    let outcome = sessions
        .toggle(&entity_type, &ctx.tenant_id, &entity.id, &request, &ctx.actor)
        .await?;

    Ok(HttpResponse::Ok().json(outcome))
}

/// Fetch one monthly period record
#[utoipa::path(
    get,
    path = "/api/v1/attendance/{entity_type}/{entity_id}/{year}/{month}",
    params(
        ("entity_type" = String, Path, description = "Registered entity type tag"),
        ("entity_id" = String, Path, description = "Entity identifier"),
        ("year" = i32, Path, description = "Calendar year"),
        ("month" = u32, Path, description = "Calendar month 1-12")
    ),
    responses(
        (status = 200, description = "Period record", body = AttendanceRecord),
        (status = 404, description = "No record for that period"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Attendance"
)]
pub async fn get_record(
    ctx: ActorContext,
    sessions: web::Data<AppSessionService>,
    path: web::Path<(String, String, i32, u32)>,
) -> actix_web::Result<impl Responder> {
    let (entity_type, entity_id, year, month) = path.into_inner();

    let record = sessions
        .period(&entity_type, &ctx.tenant_id, &entity_id, year, month)
        .await?;

    match record {
        Some(record) => Ok(HttpResponse::Ok().json(record)),
        None => Ok(HttpResponse::NotFound().json(serde_json::json!({
            "message": "No attendance record for that period"
        }))),
    }
}

/// Freshly computed engagement stats
#[utoipa::path(
    get,
    path = "/api/v1/attendance/{entity_type}/{entity_id}/stats",
    params(
        ("entity_type" = String, Path, description = "Registered entity type tag"),
        ("entity_id" = String, Path, description = "Entity identifier")
    ),
    responses(
        (status = 200, description = "Engagement stats", body = EngagementStats),
        (status = 500, description = "Internal server error")
    ),
    tag = "Attendance"
)]
pub async fn get_stats(
    ctx: ActorContext,
    sessions: web::Data<AppSessionService>,
    path: web::Path<(String, String)>,
) -> actix_web::Result<impl Responder> {
    let (entity_type, entity_id) = path.into_inner();

    let stats = sessions.stats(&entity_type, &ctx.tenant_id, &entity_id).await?;

    Ok(HttpResponse::Ok().json(stats))
}

/// Force-close sessions past their expected check-out
#[utoipa::path(
    post,
    path = "/api/v1/attendance/sweep",
    request_body = SweepBody,
    responses(
        (status = 200, description = "Sweep summary", body = SweepOutcome),
        (status = 500, description = "Internal server error")
    ),
    tag = "Attendance"
)]
pub async fn run_sweep(
    ctx: ActorContext,
    sweeper: web::Data<AppSweeper>,
    payload: Option<web::Json<SweepBody>>,
) -> actix_web::Result<impl Responder> {
    let cutoff = payload
        .and_then(|p| p.into_inner().cutoff)
        .unwrap_or_else(Utc::now);

    let outcome = sweeper.sweep(Some(&ctx.tenant_id), cutoff, &ctx.actor).await;

    Ok(HttpResponse::Ok().json(outcome))
}
