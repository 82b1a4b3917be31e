/// Billing provider integration
///
/// The billing provider owns checkout, card storage and retries. This module
/// only verifies its signed webhooks and mirrors what they report into
/// `payments` and `subscriptions`.
///
/// # Example
///
/// ```
/// use chrono::Utc;
/// use tenure_shared::billing::{sign, verify_signature, DEFAULT_TOLERANCE_SECS};
///
/// let body = br#"{"id":"evt_1","type":"payment.succeeded","created":0,"data":{}}"#;
/// let header = sign("whsec_secret", Utc::now().timestamp(), body);
/// assert!(verify_signature("whsec_secret", &header, body, DEFAULT_TOLERANCE_SECS, Utc::now()).is_ok());
/// ```

pub mod apply;
pub mod events;
pub mod signature;

pub use apply::{apply_event, ApplyOutcome};
pub use events::{BillingEvent, BillingEventKind, PaymentEventData, SubscriptionEventData};
pub use signature::{
    sign, verify_signature, SignatureError, DEFAULT_TOLERANCE_SECS, SIGNATURE_HEADER,
};

use uuid::Uuid;

/// Error type for event ingestion
#[derive(Debug, thiserror::Error)]
pub enum BillingError {
    /// Event data doesn't match its declared type
    #[error("Invalid event payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    /// Event refers to a membership we don't know
    #[error("Unknown membership: {0}")]
    UnknownMembership(Uuid),

    /// Database failure
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}
