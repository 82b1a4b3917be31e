/// Administrator endpoints
///
/// All routes here sit behind the JWT layer and the admin guard.
///
/// - `GET /v1/admin/members?status=&limit=&offset=`
/// - `PATCH /v1/admin/members/:id/status`
/// - `GET /v1/admin/members/:id/payments`
/// - `POST /v1/admin/payments` - Record a payment received outside the billing provider
/// - `GET /v1/admin/audit-logs?entity_type=&entity_id=&limit=&offset=`
///
/// Every write is recorded in the audit log with the admin as actor.

use super::{Page, Pagination};
use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tenure_shared::{
    auth::middleware::AuthContext,
    models::{
        audit_log::{AuditLog, NewAuditLog},
        membership::{MemberStatus, Membership},
        payment::{CreatePayment, Payment, PaymentKind, PaymentStatus},
    },
};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize)]
pub struct MemberFilter {
    pub status: Option<MemberStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateMemberStatusRequest {
    pub status: MemberStatus,

    #[validate(length(max = 500, message = "Reason must be at most 500 characters"))]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ManualPaymentRequest {
    pub membership_id: Uuid,
    pub kind: PaymentKind,

    #[serde(default = "default_manual_status")]
    pub status: PaymentStatus,

    #[validate(range(min = 1, message = "Amount must be positive"))]
    pub amount_cents: i64,

    #[validate(length(equal = 3, message = "Currency must be a 3-letter ISO code"))]
    #[serde(default = "default_currency")]
    pub currency: String,

    /// Defaults to now
    pub paid_at: Option<DateTime<Utc>>,

    #[validate(length(max = 500, message = "Note must be at most 500 characters"))]
    pub note: Option<String>,
}

fn default_manual_status() -> PaymentStatus {
    PaymentStatus::Succeeded
}

fn default_currency() -> String {
    "usd".to_string()
}

#[derive(Debug, Deserialize)]
pub struct AuditFilter {
    pub entity_type: Option<String>,
    pub entity_id: Option<Uuid>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

async fn find_membership(state: &AppState, id: Uuid) -> ApiResult<Membership> {
    Membership::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Membership not found".to_string()))
}

pub async fn list_members(
    State(state): State<AppState>,
    Query(filter): Query<MemberFilter>,
) -> ApiResult<Json<Page<Membership>>> {
    let page = Pagination {
        limit: filter.limit,
        offset: filter.offset,
    };

    let members = Membership::list(&state.db, filter.status, page.limit(), page.offset()).await?;
    Ok(Json(Page::new(members, page)))
}

/// Change a membership's status
///
/// Only the transitions allowed by [`MemberStatus::can_transition_to`] are
/// accepted; `won` is reserved to payout runs.
///
/// # Errors
///
/// - `404 Not Found`: unknown membership
/// - `409 Conflict`: transition not allowed
pub async fn update_member_status(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(membership_id): Path<Uuid>,
    Json(req): Json<UpdateMemberStatusRequest>,
) -> ApiResult<Json<Membership>> {
    req.validate()?;

    let current = find_membership(&state, membership_id).await?;

    if !current.status.can_transition_to(req.status) {
        return Err(ApiError::Conflict(format!(
            "Cannot move membership from {} to {}",
            current.status.as_str(),
            req.status.as_str()
        )));
    }

    let updated = Membership::update_status(&state.db, membership_id, req.status)
        .await?
        .ok_or_else(|| ApiError::NotFound("Membership not found".to_string()))?;

    AuditLog::record(
        &state.db,
        NewAuditLog::new("membership.status_changed", "membership", Some(updated.id))
            .actor(Some(auth.user_id))
            .details(serde_json::json!({
                "from": current.status,
                "to": updated.status,
                "reason": req.reason,
            })),
    )
    .await?;

    tracing::info!(
        membership_id = %updated.id,
        actor_id = %auth.user_id,
        from = current.status.as_str(),
        to = updated.status.as_str(),
        "Membership status changed"
    );

    Ok(Json(updated))
}

pub async fn member_payments(
    State(state): State<AppState>,
    Path(membership_id): Path<Uuid>,
    Query(page): Query<Pagination>,
) -> ApiResult<Json<Page<Payment>>> {
    let membership = find_membership(&state, membership_id).await?;

    let payments =
        Payment::list_by_membership(&state.db, membership.id, page.limit(), page.offset()).await?;

    Ok(Json(Page::new(payments, page)))
}

/// Record a payment made outside the billing provider (cash, bank transfer)
///
/// A succeeded joining payment activates a pending membership, the same as
/// the billing webhook does.
pub async fn record_payment(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<ManualPaymentRequest>,
) -> ApiResult<(StatusCode, Json<Payment>)> {
    req.validate()?;

    let membership = Membership::find_by_id(&state.db, req.membership_id)
        .await?
        .ok_or_else(|| ApiError::invalid("membership_id", "Unknown membership"))?;

    let payment = Payment::create(
        &state.db,
        CreatePayment {
            membership_id: membership.id,
            kind: req.kind,
            status: req.status,
            amount_cents: req.amount_cents,
            currency: req.currency.to_lowercase(),
            provider_payment_id: None,
            paid_at: req.paid_at.unwrap_or_else(Utc::now),
        },
    )
    .await?;

    AuditLog::record(
        &state.db,
        NewAuditLog::new("payment.recorded_manually", "payment", Some(payment.id))
            .actor(Some(auth.user_id))
            .details(serde_json::json!({
                "membership_id": membership.id,
                "amount_cents": payment.amount_cents,
                "kind": payment.kind,
                "note": req.note,
            })),
    )
    .await?;

    if payment.status == PaymentStatus::Succeeded
        && payment.kind == PaymentKind::Joining
        && membership.status == MemberStatus::Pending
    {
        Membership::update_status(&state.db, membership.id, MemberStatus::Active).await?;
        AuditLog::record(
            &state.db,
            NewAuditLog::new("membership.activated", "membership", Some(membership.id))
                .actor(Some(auth.user_id))
                .details(serde_json::json!({ "payment_id": payment.id })),
        )
        .await?;
    }

    tracing::info!(
        payment_id = %payment.id,
        membership_id = %membership.id,
        actor_id = %auth.user_id,
        amount_cents = payment.amount_cents,
        "Manual payment recorded"
    );

    Ok((StatusCode::CREATED, Json(payment)))
}

pub async fn audit_logs(
    State(state): State<AppState>,
    Query(filter): Query<AuditFilter>,
) -> ApiResult<Json<Page<AuditLog>>> {
    let page = Pagination {
        limit: filter.limit,
        offset: filter.offset,
    };

    let logs = AuditLog::list(
        &state.db,
        filter.entity_type.as_deref(),
        filter.entity_id,
        page.limit(),
        page.offset(),
    )
    .await?;

    Ok(Json(Page::new(logs, page)))
}
