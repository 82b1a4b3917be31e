/// KYC verification proxy
///
/// Identity checks are performed by an external provider. We open a session
/// over HTTP, hand the member the provider's redirect URL, and later receive
/// the decision through a signed callback (same header scheme as billing
/// webhooks, see [`crate::billing::signature`]).
///
/// # Provider API
///
/// ```text
/// POST {base_url}/verifications
/// Authorization: Bearer {api_key}
///
/// { "external_id": "<user uuid>", "email": "...", "name": "..." }
///
/// 201 { "reference": "kyc_abc123", "redirect_url": "https://..." }
/// ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::kyc_verification::{KycStatus, KycVerification};
use crate::models::notification::{NewNotification, Notification, NotificationKind};

/// Error type for KYC operations
#[derive(Debug, thiserror::Error)]
pub enum KycError {
    /// Provider unreachable, timed out or failing (5xx)
    #[error("KYC provider unavailable: {0}")]
    Unavailable(String),

    /// Provider refused the request (4xx)
    #[error("KYC provider rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// Provider answered with something we can't parse
    #[error("Invalid KYC provider response: {0}")]
    InvalidResponse(String),

    /// Callback carried a status that isn't a decision
    #[error("Callback status must be verified, rejected or expired")]
    NotFinal,

    /// Database failure
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Who is being verified
#[derive(Debug, Clone, Serialize)]
pub struct KycRequest {
    pub external_id: Uuid,
    pub email: String,
    pub name: Option<String>,
}

/// A session opened with the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KycSession {
    pub reference: String,
    pub redirect_url: Option<String>,
}

#[async_trait]
pub trait KycProvider: Send + Sync {
    /// Opens a verification session for a user
    async fn start_verification(&self, request: &KycRequest) -> Result<KycSession, KycError>;
}

/// Shared provider handle held in application state
pub type SharedKycProvider = Arc<dyn KycProvider>;

/// Provider reached over HTTP
pub struct HttpKycProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpKycProvider {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, KycError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| KycError::Unavailable(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn verifications_url(&self) -> String {
        format!("{}/verifications", self.base_url)
    }
}

#[async_trait]
impl KycProvider for HttpKycProvider {
    async fn start_verification(&self, request: &KycRequest) -> Result<KycSession, KycError> {
        let response = self
            .client
            .post(self.verifications_url())
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| KycError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(KycError::Unavailable(format!("provider returned {status}")));
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(KycError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let session = response
            .json::<KycSession>()
            .await
            .map_err(|e| KycError::InvalidResponse(e.to_string()))?;

        tracing::info!(
            user_id = %request.external_id,
            reference = %session.reference,
            "KYC session opened"
        );

        Ok(session)
    }
}

/// Signed decision posted back by the provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KycCallback {
    pub reference: String,
    pub status: KycStatus,

    #[serde(default)]
    pub reason: Option<String>,
}

/// Applies a provider decision and notifies the user
///
/// Providers retry callbacks, so a decision for an already decided session
/// leaves it untouched and returns it without notifying again. Returns None
/// when the reference is unknown.
pub async fn apply_callback(
    pool: &PgPool,
    callback: KycCallback,
) -> Result<Option<KycVerification>, KycError> {
    if !callback.status.is_final() {
        return Err(KycError::NotFinal);
    }

    let Some(verification) = KycVerification::update_by_reference(
        pool,
        &callback.reference,
        callback.status,
        callback.reason.clone(),
    )
    .await?
    else {
        let existing = KycVerification::find_by_reference(pool, &callback.reference).await?;
        match &existing {
            Some(decided) => tracing::info!(
                reference = %callback.reference,
                status = decided.status.as_str(),
                received = callback.status.as_str(),
                "KYC callback for an already decided session ignored"
            ),
            None => tracing::warn!(
                reference = %callback.reference,
                "KYC callback for unknown reference"
            ),
        }
        return Ok(existing);
    };

    let body = match callback.status {
        KycStatus::Verified => "Your identity has been verified.".to_string(),
        KycStatus::Rejected => match &callback.reason {
            Some(reason) => format!("Your identity verification was rejected: {}.", reason),
            None => "Your identity verification was rejected.".to_string(),
        },
        _ => "Your identity verification session expired. Please start a new one.".to_string(),
    };

    Notification::create(
        pool,
        NewNotification {
            user_id: verification.user_id,
            kind: NotificationKind::KycUpdate,
            title: "Identity verification update".to_string(),
            body,
        },
    )
    .await?;

    tracing::info!(
        user_id = %verification.user_id,
        reference = %verification.provider_reference,
        status = verification.status.as_str(),
        "KYC decision applied"
    );

    Ok(Some(verification))
}
