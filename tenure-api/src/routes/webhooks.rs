/// Signed inbound webhooks
///
/// - `POST /v1/webhooks/billing` - Payment and subscription events
/// - `POST /v1/webhooks/kyc` - Identity verification decisions
///
/// Both endpoints take the raw body so the signature in the
/// `Tenure-Signature` header can be checked before anything is parsed.
/// Billing events are idempotent on their id; a redelivery answers 200 with
/// `{"outcome": "duplicate"}`.
///
/// # Errors
///
/// - `400 Bad Request`: body is not a valid event
/// - `401 Unauthorized`: missing, stale or wrong signature
/// - `404 Not Found`: KYC reference unknown
/// - `422 Unprocessable Entity`: event names an unknown membership, or a
///   KYC callback carries a non-final status

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{extract::State, http::HeaderMap, Json};
use bytes::Bytes;
use chrono::Utc;
use tenure_shared::{
    billing::{apply_event, verify_signature, ApplyOutcome, BillingEvent, SIGNATURE_HEADER},
    kyc::{apply_callback, KycCallback},
    models::kyc_verification::KycVerification,
};

fn verify(headers: &HeaderMap, body: &[u8], secret: &str, tolerance_secs: i64) -> ApiResult<()> {
    let header = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Missing webhook signature".to_string()))?;

    verify_signature(secret, header, body, tolerance_secs, Utc::now())?;
    Ok(())
}

pub async fn billing(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<ApplyOutcome>> {
    let webhooks = &state.config.webhooks;
    verify(&headers, &body, &webhooks.billing_secret, webhooks.tolerance_secs)?;

    let event: BillingEvent = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid billing event: {e}")))?;

    let outcome = apply_event(&state.db, &event).await?;

    tracing::info!(
        event_id = %event.id,
        event_type = %event.event_type,
        outcome = ?outcome,
        "Billing webhook processed"
    );

    Ok(Json(outcome))
}

pub async fn kyc(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<KycVerification>> {
    let webhooks = &state.config.webhooks;
    verify(&headers, &body, &webhooks.kyc_secret, webhooks.tolerance_secs)?;

    let callback: KycCallback = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid KYC callback: {e}")))?;

    let verification = apply_callback(&state.db, callback)
        .await?
        .ok_or_else(|| ApiError::NotFound("Unknown verification reference".to_string()))?;

    Ok(Json(verification))
}
