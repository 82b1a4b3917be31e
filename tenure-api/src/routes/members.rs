/// Membership endpoints
///
/// - `POST /v1/members` - Join the rotation (one membership per user)
/// - `GET /v1/members/me` - The caller's membership with queue standing

use super::membership_for_user;
use crate::{app::AppState, error::ApiResult};
use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use tenure_shared::{
    auth::middleware::AuthContext,
    models::{
        audit_log::{AuditLog, NewAuditLog},
        membership::{CreateMembership, MemberStatus, Membership},
        queue_entry::QueueEntryRow,
        subscription::Subscription,
    },
};

#[derive(Debug, Serialize)]
pub struct MembershipView {
    #[serde(flatten)]
    pub membership: Membership,

    pub subscription: Option<Subscription>,

    /// Current row in the queue, if ranked
    pub queue: Option<QueueEntryRow>,
}

/// Join the rotation
///
/// The membership starts `pending` and becomes `active` once the billing
/// provider reports the joining fee.
///
/// # Errors
///
/// - `409 Conflict`: the caller already has a membership
pub async fn join(
    State(state): State<AppState>,
    auth: AuthContext,
) -> ApiResult<(StatusCode, Json<Membership>)> {
    let membership = Membership::create(
        &state.db,
        CreateMembership {
            user_id: auth.user_id,
            status: MemberStatus::Pending,
        },
    )
    .await?;

    AuditLog::record(
        &state.db,
        NewAuditLog::new("membership.created", "membership", Some(membership.id))
            .actor(Some(auth.user_id)),
    )
    .await?;

    tracing::info!(
        user_id = %auth.user_id,
        membership_id = %membership.id,
        "Membership created"
    );

    Ok((StatusCode::CREATED, Json(membership)))
}

pub async fn me(
    State(state): State<AppState>,
    auth: AuthContext,
) -> ApiResult<Json<MembershipView>> {
    let membership = membership_for_user(&state.db, auth.user_id).await?;

    let subscription = Subscription::find_by_membership(&state.db, membership.id).await?;
    let queue = QueueEntryRow::find_by_membership(&state.db, membership.id).await?;

    Ok(Json(MembershipView {
        membership,
        subscription,
        queue,
    }))
}
