/// `GET /v1/payments` - The caller's payments, newest first

use super::{membership_for_user, Page, Pagination};
use crate::{app::AppState, error::ApiResult};
use axum::{
    extract::{Query, State},
    Json,
};
use tenure_shared::{auth::middleware::AuthContext, models::payment::Payment};

pub async fn list_mine(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(page): Query<Pagination>,
) -> ApiResult<Json<Page<Payment>>> {
    let membership = membership_for_user(&state.db, auth.user_id).await?;

    let payments =
        Payment::list_by_membership(&state.db, membership.id, page.limit(), page.offset()).await?;

    Ok(Json(Page::new(payments, page)))
}
