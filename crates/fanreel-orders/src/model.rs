//! Domain model
//!
//! Persisted entity shapes for the order/payment lifecycle. Amounts are
//! integer minor units (cents). Entity ids are UUIDs except the
//! processor-assigned payment intent id, which keeps the processor's
//! string format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Free-form metadata attached to orders and intents
pub type Metadata = Map<String, Value>;

/// Currency used when the caller does not supply one
pub const DEFAULT_CURRENCY: &str = "USD";

/// Order status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Accepted,
    Rejected,
    InProgress,
    Completed,
    Disputed,
    Refunded,
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Accepted => write!(f, "accepted"),
            Self::Rejected => write!(f, "rejected"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Completed => write!(f, "completed"),
            Self::Disputed => write!(f, "disputed"),
            Self::Refunded => write!(f, "refunded"),
        }
    }
}

/// Role an actor plays on an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Creator,
    Fan,
}

/// The binding record created once a payment for a video request succeeds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    /// The paying fan (buyer)
    pub fan_id: Uuid,
    pub creator_id: Uuid,
    /// The video request this order fulfills
    pub request_id: Uuid,
    /// Processor-assigned intent id; unique across orders
    pub payment_intent_id: String,
    pub amount_cents: i64,
    pub currency: String,
    pub platform_fee_cents: i64,
    pub creator_earnings_cents: i64,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub metadata: Metadata,
}

/// Processor-side intent status, mirrored locally
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    RequiresPayment,
    Processing,
    Succeeded,
    Canceled,
    Failed,
}

impl std::fmt::Display for IntentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RequiresPayment => write!(f, "requires_payment"),
            Self::Processing => write!(f, "processing"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Canceled => write!(f, "canceled"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// The processor-side authorization/charge object preceding an Order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    /// Processor-assigned id (`pi_...`)
    pub id: String,
    pub fan_id: Uuid,
    pub creator_id: Uuid,
    pub request_id: Uuid,
    pub amount_cents: i64,
    pub currency: String,
    pub status: IntentStatus,
    /// Secret the fan-side client uses to confirm the charge
    pub client_secret: String,
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Settlement status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentRecordStatus {
    Settled,
    Refunded,
}

/// Immutable settlement record for a completed charge's fee split
///
/// One per completed order; never updated once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub order_id: Uuid,
    pub processor_payment_id: String,
    pub amount_cents: i64,
    pub platform_fee_cents: i64,
    pub creator_earnings_cents: i64,
    /// Fee the processor kept, when reported
    pub processor_fee_cents: Option<i64>,
    /// Platform fee minus processor fee
    pub net_platform_fee_cents: i64,
    pub status: PaymentRecordStatus,
    pub created_at: DateTime<Utc>,
}

/// Source request status (external collaborator entity)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Paid,
    Closed,
}

/// The video-request record an Order fulfills
///
/// Owned by the request service; this crate only reads it and marks it
/// paid when an order lands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoRequest {
    pub id: Uuid,
    pub fan_id: Uuid,
    pub creator_id: Uuid,
    pub price_cents: i64,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
}

/// Per-creator rolling counters
///
/// Created lazily (zeroed) on first read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatorStats {
    pub creator_id: Uuid,
    pub total_orders: u64,
    pub completed_orders: u64,
    pub rejected_orders: u64,
    pub total_earnings_cents: i64,
    pub last_order_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl CreatorStats {
    /// Zeroed row for a creator with no history yet
    pub fn zeroed(creator_id: Uuid) -> Self {
        Self {
            creator_id,
            total_orders: 0,
            completed_orders: 0,
            rejected_orders: 0,
            total_earnings_cents: 0,
            last_order_at: None,
            updated_at: Utc::now(),
        }
    }
}

/// Append-only revenue ledger entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformRevenue {
    pub id: Uuid,
    pub order_id: Uuid,
    pub amount_cents: i64,
    pub platform_fee_cents: i64,
    pub net_platform_fee_cents: i64,
    pub currency: String,
    pub recorded_at: DateTime<Utc>,
}

/// Per-day upsert aggregate derived from settlements
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyPlatformStats {
    pub date: chrono::NaiveDate,
    pub order_count: u64,
    pub gross_cents: i64,
    pub platform_fee_cents: i64,
    pub net_fee_cents: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_format() {
        assert_eq!(OrderStatus::InProgress.to_string(), "in_progress");
        assert_eq!(
            serde_json::to_string(&OrderStatus::InProgress).unwrap(),
            "\"in_progress\""
        );
        assert_eq!(IntentStatus::Succeeded.to_string(), "succeeded");
    }

    #[test]
    fn test_zeroed_stats() {
        let id = Uuid::new_v4();
        let stats = CreatorStats::zeroed(id);
        assert_eq!(stats.creator_id, id);
        assert_eq!(stats.total_orders, 0);
        assert_eq!(stats.total_earnings_cents, 0);
        assert!(stats.last_order_at.is_none());
    }
}
