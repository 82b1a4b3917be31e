/// `GET /v1/subscriptions/me` - The caller's recurring-fee subscription

use super::membership_for_user;
use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{extract::State, Json};
use tenure_shared::{auth::middleware::AuthContext, models::subscription::Subscription};

pub async fn me(State(state): State<AppState>, auth: AuthContext) -> ApiResult<Json<Subscription>> {
    let membership = membership_for_user(&state.db, auth.user_id).await?;

    let subscription = Subscription::find_by_membership(&state.db, membership.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Subscription not found".to_string()))?;

    Ok(Json(subscription))
}
