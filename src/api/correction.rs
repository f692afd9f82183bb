use actix_web::{HttpResponse, Responder, web};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::api::actor::ActorContext;
use crate::api::AppCorrectionService;
use crate::model::correction::{CorrectionRequest, CorrectionStatus};
use crate::service::correction::SubmitCorrection;

#[derive(Deserialize, ToSchema)]
pub struct ReviewBody {
    #[schema(example = "confirmed against door logs")]
    pub notes: Option<String>,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct CorrectionFilter {
    #[schema(example = "pending")]
    /// Filter by request status
    pub status: Option<CorrectionStatus>,
    #[schema(example = 1)]
    /// Pagination page number (start with 1)
    pub page: Option<u64>, // 1-based
    #[schema(example = 10)]
    /// Pagination per page number
    pub per_page: Option<u64>, // items per page
}

#[derive(Serialize, ToSchema)]
pub struct CorrectionListResponse {
    pub data: Vec<CorrectionRequest>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 10)]
    pub per_page: u32,
    #[schema(example = 1)]
    pub total: u64,
}

/* =========================
Submit correction request
========================= */
#[utoipa::path(
    post,
    path = "/api/v1/corrections/{entity_type}/{entity_id}",
    params(
        ("entity_type" = String, Path, description = "Registered entity type tag"),
        ("entity_id" = String, Path, description = "Entity identifier")
    ),
    request_body(
        content = SubmitCorrection,
        description = "Correction request payload",
        content_type = "application/json"
    ),
    responses(
        (status = 200, description = "Correction request submitted", body = CorrectionRequest),
        (status = 400, description = "Bad request"),
        (status = 404, description = "Unknown entity")
    ),
    tag = "Corrections"
)]
pub async fn submit(
    ctx: ActorContext,
    corrections: web::Data<AppCorrectionService>,
    path: web::Path<(String, String)>,
    payload: web::Json<SubmitCorrection>,
) -> actix_web::Result<impl Responder> {
    let (entity_type, entity_id) = path.into_inner();

    let request = corrections
        .submit(&entity_type, &ctx.tenant_id, &entity_id, &payload, &ctx.actor)
        .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Correction request submitted",
        "request": request
    })))
}

/* =========================
Approve correction (reviewer)
========================= */
#[utoipa::path(
    put,
    path = "/api/v1/corrections/{entity_type}/{entity_id}/{year}/{month}/{request_id}/approve",
    params(
        ("entity_type" = String, Path, description = "Registered entity type tag"),
        ("entity_id" = String, Path, description = "Entity identifier"),
        ("year" = i32, Path, description = "Period year"),
        ("month" = u32, Path, description = "Period month"),
        ("request_id" = String, Path, description = "Correction request id")
    ),
    request_body = ReviewBody,
    responses(
        (status = 200, description = "Correction approved", body = CorrectionRequest),
        (status = 400, description = "Request not found or already processed")
    ),
    tag = "Corrections"
)]
pub async fn approve(
    ctx: ActorContext,
    corrections: web::Data<AppCorrectionService>,
    path: web::Path<(String, String, i32, u32, String)>,
    payload: Option<web::Json<ReviewBody>>,
) -> actix_web::Result<impl Responder> {
    review(ctx, corrections, path, payload, true).await
}

/* =========================
Reject correction (reviewer)
========================= */
#[utoipa::path(
    put,
    path = "/api/v1/corrections/{entity_type}/{entity_id}/{year}/{month}/{request_id}/reject",
    params(
        ("entity_type" = String, Path, description = "Registered entity type tag"),
        ("entity_id" = String, Path, description = "Entity identifier"),
        ("year" = i32, Path, description = "Period year"),
        ("month" = u32, Path, description = "Period month"),
        ("request_id" = String, Path, description = "Correction request id")
    ),
    request_body = ReviewBody,
    responses(
        (status = 200, description = "Correction rejected", body = CorrectionRequest),
        (status = 400, description = "Request not found or already processed")
    ),
    tag = "Corrections"
)]
pub async fn reject(
    ctx: ActorContext,
    corrections: web::Data<AppCorrectionService>,
    path: web::Path<(String, String, i32, u32, String)>,
    payload: Option<web::Json<ReviewBody>>,
) -> actix_web::Result<impl Responder> {
    review(ctx, corrections, path, payload, false).await
}

async fn review(
    ctx: ActorContext,
    corrections: web::Data<AppCorrectionService>,
    path: web::Path<(String, String, i32, u32, String)>,
    payload: Option<web::Json<ReviewBody>>,
    approve: bool,
) -> actix_web::Result<HttpResponse> {
    let (entity_type, entity_id, year, month, request_id) = path.into_inner();
    let notes = payload.and_then(|p| p.into_inner().notes);

    let request = corrections
        .review(
            &entity_type,
            &ctx.tenant_id,
            &entity_id,
            year,
            month,
            &request_id,
            approve,
            &ctx.actor,
            notes,
        )
        .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": if approve { "Correction approved" } else { "Correction rejected" },
        "request": request
    })))
}

/* =========================
Apply approved correction
========================= */
#[utoipa::path(
    put,
    path = "/api/v1/corrections/{entity_type}/{entity_id}/{year}/{month}/{request_id}/apply",
    params(
        ("entity_type" = String, Path, description = "Registered entity type tag"),
        ("entity_id" = String, Path, description = "Entity identifier"),
        ("year" = i32, Path, description = "Period year"),
        ("month" = u32, Path, description = "Period month"),
        ("request_id" = String, Path, description = "Correction request id")
    ),
    responses(
        (status = 200, description = "Correction applied", body = CorrectionRequest),
        (status = 400, description = "Request is not in approved status")
    ),
    tag = "Corrections"
)]
pub async fn apply(
    ctx: ActorContext,
    corrections: web::Data<AppCorrectionService>,
    path: web::Path<(String, String, i32, u32, String)>,
) -> actix_web::Result<impl Responder> {
    let (entity_type, entity_id, year, month, request_id) = path.into_inner();

    let request = corrections
        .apply(&entity_type, &ctx.tenant_id, &entity_id, year, month, &request_id, &ctx.actor)
        .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Correction applied",
        "request": request
    })))
}

/* =========================
List correction requests
========================= */
#[utoipa::path(
    get,
    path = "/api/v1/corrections/{entity_type}/{entity_id}/{year}/{month}",
    params(
        ("entity_type" = String, Path, description = "Registered entity type tag"),
        ("entity_id" = String, Path, description = "Entity identifier"),
        ("year" = i32, Path, description = "Period year"),
        ("month" = u32, Path, description = "Period month"),
        CorrectionFilter
    ),
    responses(
        (status = 200, description = "Paginated correction list", body = CorrectionListResponse)
    ),
    tag = "Corrections"
)]
pub async fn list(
    ctx: ActorContext,
    corrections: web::Data<AppCorrectionService>,
    path: web::Path<(String, String, i32, u32)>,
    query: web::Query<CorrectionFilter>,
) -> actix_web::Result<impl Responder> {
    let (entity_type, entity_id, year, month) = path.into_inner();

    // -------------------------
    // Pagination
    // -------------------------
    let per_page = query.per_page.unwrap_or(10).min(100);
    let page = query.page.unwrap_or(1).max(1);
    let offset = (page - 1) * per_page;

    let all = corrections
        .list(&entity_type, &ctx.tenant_id, &entity_id, year, month, query.status)
        .await?;

    let total = all.len() as u64;
    let data: Vec<CorrectionRequest> = all
        .into_iter()
        .skip(offset as usize)
        .take(per_page as usize)
        .collect();

    Ok(HttpResponse::Ok().json(CorrectionListResponse {
        data,
        page: page as u32,
        per_page: per_page as u32,
        total,
    }))
}
