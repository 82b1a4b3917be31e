/// Identity verification endpoints
///
/// - `POST /v1/kyc/verifications` - Open a session with the provider
/// - `GET /v1/kyc/verifications/me` - Latest session of the caller
///
/// Decisions arrive asynchronously through `POST /v1/webhooks/kyc`.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use tenure_shared::{
    auth::middleware::AuthContext,
    kyc::KycRequest,
    models::{
        kyc_verification::{KycStatus, KycVerification},
        user::User,
    },
};

#[derive(Debug, Serialize)]
pub struct StartVerificationResponse {
    pub verification: KycVerification,

    /// Where the user completes the provider's flow
    pub redirect_url: Option<String>,
}

/// Open a verification session
///
/// # Errors
///
/// - `409 Conflict`: the caller is already verified
/// - `503 Service Unavailable`: provider unreachable
pub async fn start(
    State(state): State<AppState>,
    auth: AuthContext,
) -> ApiResult<(StatusCode, Json<StartVerificationResponse>)> {
    let user = User::find_by_id(&state.db, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    if let Some(latest) = KycVerification::find_latest_by_user(&state.db, user.id).await? {
        if latest.status == KycStatus::Verified {
            return Err(ApiError::Conflict("Identity already verified".to_string()));
        }
    }

    let session = state
        .kyc
        .start_verification(&KycRequest {
            external_id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
        })
        .await?;

    let verification = KycVerification::create(&state.db, user.id, &session.reference).await?;

    Ok((
        StatusCode::CREATED,
        Json(StartVerificationResponse {
            verification,
            redirect_url: session.redirect_url,
        }),
    ))
}

pub async fn me(
    State(state): State<AppState>,
    auth: AuthContext,
) -> ApiResult<Json<KycVerification>> {
    let verification = KycVerification::find_latest_by_user(&state.db, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("No verification found".to_string()))?;

    Ok(Json(verification))
}
