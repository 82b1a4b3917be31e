/// In-app notifications
///
/// - `GET /v1/notifications?unread_only=true` - The caller's notifications, newest first
/// - `POST /v1/notifications/:id/read` - Mark one as read

use super::{Page, Pagination};
use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use tenure_shared::{auth::middleware::AuthContext, models::notification::Notification};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct NotificationFilter {
    #[serde(default)]
    pub unread_only: bool,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub async fn list(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(filter): Query<NotificationFilter>,
) -> ApiResult<Json<Page<Notification>>> {
    let page = Pagination {
        limit: filter.limit,
        offset: filter.offset,
    };

    let notifications = Notification::list_by_user(
        &state.db,
        auth.user_id,
        filter.unread_only,
        page.limit(),
        page.offset(),
    )
    .await?;

    Ok(Json(Page::new(notifications, page)))
}

/// 404 for unknown ids and for other users' notifications alike
pub async fn mark_read(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(notification_id): Path<Uuid>,
) -> ApiResult<Json<Notification>> {
    let notification = Notification::mark_read(&state.db, notification_id, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Notification not found".to_string()))?;

    Ok(Json(notification))
}
