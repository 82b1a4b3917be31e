/// Billing webhook payloads
///
/// ```json
/// {
///   "id": "evt_1Q2w3E",
///   "type": "payment.succeeded",
///   "created": 1767225600,
///   "data": {
///     "payment_id": "pay_9Z8y7X",
///     "membership_id": "6c1f5a52-0a46-4b8f-9f0e-2d7c1c6f4a10",
///     "kind": "monthly",
///     "amount_cents": 2500,
///     "currency": "usd"
///   }
/// }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::models::payment::PaymentKind;
use crate::models::subscription::SubscriptionStatus;

/// Envelope of every billing event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingEvent {
    /// Provider event id, unique per event (not per delivery)
    pub id: String,

    #[serde(rename = "type")]
    pub event_type: String,

    /// Unix timestamp of the event
    pub created: i64,

    pub data: JsonValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BillingEventKind {
    PaymentSucceeded,
    PaymentFailed,
    PaymentRefunded,
    SubscriptionCreated,
    SubscriptionUpdated,
    SubscriptionDeleted,
    Unknown,
}

impl BillingEventKind {
    pub fn parse(event_type: &str) -> Self {
        match event_type {
            "payment.succeeded" => BillingEventKind::PaymentSucceeded,
            "payment.failed" => BillingEventKind::PaymentFailed,
            "payment.refunded" => BillingEventKind::PaymentRefunded,
            "subscription.created" => BillingEventKind::SubscriptionCreated,
            "subscription.updated" => BillingEventKind::SubscriptionUpdated,
            "subscription.deleted" => BillingEventKind::SubscriptionDeleted,
            _ => BillingEventKind::Unknown,
        }
    }
}

/// `data` of `payment.*` events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentEventData {
    pub payment_id: String,
    pub membership_id: Uuid,
    pub kind: PaymentKind,
    pub amount_cents: i64,

    #[serde(default = "default_currency")]
    pub currency: String,

    /// Defaults to the event's `created` time
    #[serde(default)]
    pub paid_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub failure_reason: Option<String>,
}

fn default_currency() -> String {
    "usd".to_string()
}

/// `data` of `subscription.*` events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionEventData {
    pub subscription_id: String,
    pub membership_id: Uuid,
    pub status: SubscriptionStatus,

    #[serde(default)]
    pub current_period_start: Option<DateTime<Utc>>,

    #[serde(default)]
    pub current_period_end: Option<DateTime<Utc>>,

    #[serde(default)]
    pub cancel_at_period_end: bool,
}

impl BillingEvent {
    pub fn kind(&self) -> BillingEventKind {
        BillingEventKind::parse(&self.event_type)
    }

    /// Event time, falling back to the epoch for out-of-range values
    pub fn created_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.created, 0).unwrap_or_default()
    }

    pub fn payment_data(&self) -> Result<PaymentEventData, serde_json::Error> {
        serde_json::from_value(self.data.clone())
    }

    pub fn subscription_data(&self) -> Result<SubscriptionEventData, serde_json::Error> {
        serde_json::from_value(self.data.clone())
    }
}
