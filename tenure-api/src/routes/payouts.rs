/// Payout endpoints
///
/// - `GET /v1/payouts/me` - The caller's payouts
/// - `GET /v1/admin/payouts` - All payouts, optional `status` filter (admin)
/// - `POST /v1/admin/payouts/run` - Schedule payouts for the current winners (admin)
/// - `PATCH /v1/admin/payouts/:id` - Record settlement progress (admin)
///
/// Payout rows are bookkeeping only. Money moves outside the service and an
/// operator reports the result through the PATCH endpoint.
/// Queue-position notifications from a run are stored by the engine.

use super::{membership_for_user, Page, Pagination};
use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use tenure_shared::{
    auth::middleware::AuthContext,
    engine::{self, PayoutRunOutcome},
    models::payout::{Payout, PayoutStatus},
};
use uuid::Uuid;
use validator::Validate;

/// Query string values arrive as strings, so `Pagination` is repeated
/// here instead of flattened.
#[derive(Debug, Deserialize)]
pub struct PayoutFilter {
    pub status: Option<PayoutStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdatePayoutRequest {
    pub status: PayoutStatus,

    #[validate(length(max = 500, message = "Reason must be at most 500 characters"))]
    pub failure_reason: Option<String>,
}

pub async fn mine(
    State(state): State<AppState>,
    auth: AuthContext,
) -> ApiResult<Json<Vec<Payout>>> {
    let membership = membership_for_user(&state.db, auth.user_id).await?;
    let payouts = Payout::list_by_membership(&state.db, membership.id).await?;
    Ok(Json(payouts))
}

pub async fn list(
    State(state): State<AppState>,
    Query(filter): Query<PayoutFilter>,
) -> ApiResult<Json<Page<Payout>>> {
    let page = Pagination {
        limit: filter.limit,
        offset: filter.offset,
    };
    let payouts = Payout::list(&state.db, filter.status, page.limit(), page.offset()).await?;
    Ok(Json(Page::new(payouts, page)))
}

/// Run payouts now
///
/// # Errors
///
/// - `409 Conflict`: blockers remain; `details.blockers` lists them
pub async fn run(
    State(state): State<AppState>,
    auth: AuthContext,
) -> ApiResult<Json<PayoutRunOutcome>> {
    let outcome =
        engine::run_payouts(&state.db, state.rules(), Utc::now(), Some(auth.user_id)).await?;

    tracing::info!(
        actor_id = %auth.user_id,
        payouts = outcome.payouts.len(),
        total_cents = outcome.total_cents(),
        "Payout run triggered by admin"
    );

    Ok(Json(outcome))
}

/// Move a payout along its lifecycle
///
/// # Errors
///
/// - `404 Not Found`: unknown payout
/// - `409 Conflict`: transition not allowed from the current status
/// - `422 Unprocessable Entity`: `failed` without a reason
///
/// A `failed` or `cancelled` payout puts its `won` member back to `active`.
pub async fn update(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(payout_id): Path<Uuid>,
    Json(req): Json<UpdatePayoutRequest>,
) -> ApiResult<Json<Payout>> {
    req.validate()?;

    let failure_reason = req
        .failure_reason
        .map(|reason| reason.trim().to_string())
        .filter(|reason| !reason.is_empty());

    if req.status == PayoutStatus::Failed && failure_reason.is_none() {
        return Err(ApiError::invalid(
            "failure_reason",
            "A reason is required when marking a payout failed",
        ));
    }

    let update = engine::update_payout_status(
        &state.db,
        payout_id,
        req.status,
        failure_reason,
        Some(auth.user_id),
    )
    .await?
    .ok_or_else(|| ApiError::NotFound("Payout not found".to_string()))?;

    tracing::info!(
        actor_id = %auth.user_id,
        payout_id = %update.payout.id,
        membership_restored = update.membership_restored,
        "Payout updated by admin"
    );

    Ok(Json(update.payout))
}
