/// Queue endpoints
///
/// - `GET /v1/queue` - Ranked queue, paginated, with total length
/// - `GET /v1/queue/me` - The caller's row
/// - `POST /v1/admin/queue/refresh` - Recompute and store the ranking (admin)

use super::{membership_for_user, Page, Pagination};
use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Query, State},
    Json,
};
use chrono::Utc;
use tenure_shared::{
    auth::middleware::AuthContext,
    engine::{self, QueueRefreshOutcome},
    models::{
        audit_log::{AuditLog, NewAuditLog},
        queue_entry::QueueEntryRow,
    },
};

pub async fn list(
    State(state): State<AppState>,
    Query(page): Query<Pagination>,
) -> ApiResult<Json<Page<QueueEntryRow>>> {
    let rows = QueueEntryRow::list(&state.db, page.limit(), page.offset()).await?;
    let total = QueueEntryRow::count(&state.db).await?;

    Ok(Json(Page::new(rows, page).with_total(total)))
}

/// 404 when the caller is not currently ranked
pub async fn me(
    State(state): State<AppState>,
    auth: AuthContext,
) -> ApiResult<Json<QueueEntryRow>> {
    let membership = membership_for_user(&state.db, auth.user_id).await?;

    let row = QueueEntryRow::find_by_membership(&state.db, membership.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Not currently in the queue".to_string()))?;

    Ok(Json(row))
}

/// Re-rank now; members whose position moved are notified
pub async fn refresh(
    State(state): State<AppState>,
    auth: AuthContext,
) -> ApiResult<Json<QueueRefreshOutcome>> {
    let outcome = engine::refresh_queue(&state.db, state.rules(), Utc::now()).await?;

    AuditLog::record(
        &state.db,
        NewAuditLog::new("queue.refreshed", "queue", None)
            .actor(Some(auth.user_id))
            .details(serde_json::json!({
                "queued": outcome.queued,
                "previously_queued": outcome.previously_queued,
                "changes": outcome.changes.len(),
                "notified": outcome.notified,
            })),
    )
    .await?;

    Ok(Json(outcome))
}
