/// Business-rule endpoints
///
/// - `GET /v1/business-rules/config` - Active rule parameters
/// - `GET /v1/business-rules/me` - Eligibility report for the caller
/// - `GET /v1/business-rules/members/:id` - Report for a membership (self or admin)
/// - `GET /v1/business-rules/payout-readiness` - Payout decision (admin)
///
/// Reports are computed on request from the stored payment and subscription
/// history; nothing here writes.

use super::membership_for_user;
use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use tenure_shared::{
    auth::{authorization::require_self_or_admin, middleware::AuthContext},
    engine,
    models::membership::Membership,
    rules::{EligibilityReport, PayoutDecision, RulesConfig},
};
use uuid::Uuid;

pub async fn config(State(state): State<AppState>) -> Json<RulesConfig> {
    Json(state.rules().clone())
}

pub async fn me(
    State(state): State<AppState>,
    auth: AuthContext,
) -> ApiResult<Json<EligibilityReport>> {
    let membership = membership_for_user(&state.db, auth.user_id).await?;
    report_for(&state, membership.id).await
}

pub async fn member(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(membership_id): Path<Uuid>,
) -> ApiResult<Json<EligibilityReport>> {
    let membership = Membership::find_by_id(&state.db, membership_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Membership not found".to_string()))?;

    require_self_or_admin(&auth, membership.user_id)?;

    report_for(&state, membership.id).await
}

pub async fn payout_readiness(State(state): State<AppState>) -> ApiResult<Json<PayoutDecision>> {
    let decision = engine::evaluate_payouts(&state.db, state.rules(), Utc::now()).await?;
    Ok(Json(decision))
}

async fn report_for(state: &AppState, membership_id: Uuid) -> ApiResult<Json<EligibilityReport>> {
    let report = engine::evaluate_member(&state.db, state.rules(), membership_id, Utc::now())
        .await?
        .ok_or_else(|| ApiError::NotFound("Membership not found".to_string()))?;

    Ok(Json(report))
}
