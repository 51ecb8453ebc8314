//! Notification dispatch
//!
//! Fire-and-forget event broadcast to per-party channels. Delivery
//! failures are logged and reported as a soft outcome; they never fail
//! or roll back the business operation that triggered them.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;
use uuid::Uuid;

use fanreel_common::MarketResult;

use crate::model::{ActorRole, Order};

/// Broadcast addressing unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// A single creator's channel
    Creator(Uuid),
    /// A single fan's channel
    Fan(Uuid),
    /// Live operations monitoring
    AdminAlerts,
    /// Platform-wide creator announcements
    AllCreators,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Creator(id) => write!(f, "creator-{id}"),
            Self::Fan(id) => write!(f, "fan-{id}"),
            Self::AdminAlerts => write!(f, "admin-alerts"),
            Self::AllCreators => write!(f, "all-creators"),
        }
    }
}

/// Alert severity for system alerts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

/// A delivered event
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub channel: String,
    pub event: String,
    pub payload: Value,
    pub sent_at: DateTime<Utc>,
}

/// Outcome of a dispatch attempt
///
/// Never escalated to a method failure; callers that care can inspect it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    Failed(String),
}

impl DeliveryOutcome {
    pub fn delivered(&self) -> bool {
        matches!(self, Self::Delivered)
    }
}

/// Pub/sub transport boundary
#[async_trait]
pub trait NotificationTransport: Send + Sync {
    /// Publish one notification to its channel
    async fn publish(&self, notification: Notification) -> MarketResult<()>;
}

/// In-process transport over a tokio broadcast channel
pub struct BroadcastTransport {
    tx: broadcast::Sender<Notification>,
}

impl BroadcastTransport {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to everything published on this transport
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastTransport {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl NotificationTransport for BroadcastTransport {
    async fn publish(&self, notification: Notification) -> MarketResult<()> {
        // No subscribers is not a failure; fire-and-forget means nobody
        // has to be listening.
        let _ = self.tx.send(notification);
        Ok(())
    }
}

/// Dispatches lifecycle events to the affected parties
pub struct NotificationDispatcher {
    transport: Arc<dyn NotificationTransport>,
}

impl NotificationDispatcher {
    pub fn new(transport: Arc<dyn NotificationTransport>) -> Self {
        Self { transport }
    }

    /// Publish an event on a channel, swallowing transport failures
    pub async fn notify(&self, channel: Channel, event: &str, payload: Value) -> DeliveryOutcome {
        let notification = Notification {
            channel: channel.to_string(),
            event: event.to_string(),
            payload,
            sent_at: Utc::now(),
        };

        match self.transport.publish(notification).await {
            Ok(()) => DeliveryOutcome::Delivered,
            Err(e) => {
                tracing::warn!(channel = %channel, event, error = %e, "notification delivery failed");
                DeliveryOutcome::Failed(e.to_string())
            }
        }
    }

    /// Event on a creator's channel
    pub async fn send_creator_notification(
        &self,
        creator_id: Uuid,
        event: &str,
        payload: Value,
    ) -> DeliveryOutcome {
        self.notify(Channel::Creator(creator_id), event, payload).await
    }

    /// Event on a fan's channel
    pub async fn send_fan_notification(
        &self,
        fan_id: Uuid,
        event: &str,
        payload: Value,
    ) -> DeliveryOutcome {
        self.notify(Channel::Fan(fan_id), event, payload).await
    }

    /// Platform-wide creator announcement
    pub async fn broadcast_to_creators(&self, event: &str, payload: Value) -> DeliveryOutcome {
        self.notify(Channel::AllCreators, event, payload).await
    }

    /// Status-change event, routed to the counterparty of the actor
    ///
    /// A creator moving the order notifies the fan; a fan moving it
    /// notifies the creator.
    pub async fn send_order_status_update(
        &self,
        order: &Order,
        actor: ActorRole,
    ) -> DeliveryOutcome {
        let channel = match actor {
            ActorRole::Creator => Channel::Fan(order.fan_id),
            ActorRole::Fan => Channel::Creator(order.creator_id),
        };
        let event = format!("order_{}", order.status);
        let payload = serde_json::json!({
            "order_id": order.id,
            "status": order.status,
            "amount_cents": order.amount_cents,
        });
        self.notify(channel, &event, payload).await
    }

    /// Log a system alert; error/critical severities also reach the
    /// admin-alerts channel for live monitoring
    pub async fn send_system_alert(
        &self,
        alert_type: &str,
        severity: AlertSeverity,
        data: Value,
    ) -> DeliveryOutcome {
        match severity {
            AlertSeverity::Info => {
                tracing::info!(alert_type, data = %data, "system alert");
            }
            AlertSeverity::Warning => {
                tracing::warn!(alert_type, data = %data, "system alert");
            }
            AlertSeverity::Error | AlertSeverity::Critical => {
                tracing::error!(alert_type, ?severity, data = %data, "system alert");
            }
        }

        if matches!(severity, AlertSeverity::Error | AlertSeverity::Critical) {
            let payload = serde_json::json!({
                "type": alert_type,
                "severity": severity,
                "data": data,
            });
            return self.notify(Channel::AdminAlerts, "system_alert", payload).await;
        }
        DeliveryOutcome::Delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Metadata, OrderStatus, DEFAULT_CURRENCY};
    use fanreel_common::MarketError;

    struct FailingTransport;

    #[async_trait]
    impl NotificationTransport for FailingTransport {
        async fn publish(&self, _notification: Notification) -> MarketResult<()> {
            Err(MarketError::Network("transport down".into()))
        }
    }

    fn sample_order() -> Order {
        Order {
            id: Uuid::new_v4(),
            fan_id: Uuid::new_v4(),
            creator_id: Uuid::new_v4(),
            request_id: Uuid::new_v4(),
            payment_intent_id: "pi_test".into(),
            amount_cents: 10_000,
            currency: DEFAULT_CURRENCY.into(),
            platform_fee_cents: 3_000,
            creator_earnings_cents: 7_000,
            status: OrderStatus::Completed,
            created_at: Utc::now(),
            accepted_at: None,
            completed_at: Some(Utc::now()),
            metadata: Metadata::new(),
        }
    }

    #[tokio::test]
    async fn test_channel_keys() {
        let id = Uuid::nil();
        assert_eq!(
            Channel::Creator(id).to_string(),
            format!("creator-{id}")
        );
        assert_eq!(Channel::AdminAlerts.to_string(), "admin-alerts");
        assert_eq!(Channel::AllCreators.to_string(), "all-creators");
    }

    #[tokio::test]
    async fn test_subscriber_receives_event() {
        let transport = Arc::new(BroadcastTransport::default());
        let mut rx = transport.subscribe();
        let dispatcher = NotificationDispatcher::new(transport);

        let outcome = dispatcher
            .send_creator_notification(Uuid::new_v4(), "new_order", serde_json::json!({"n": 1}))
            .await;
        assert!(outcome.delivered());

        let received = rx.recv().await.unwrap();
        assert_eq!(received.event, "new_order");
        assert!(received.channel.starts_with("creator-"));
    }

    #[tokio::test]
    async fn test_transport_failure_is_soft() {
        let dispatcher = NotificationDispatcher::new(Arc::new(FailingTransport));
        let outcome = dispatcher
            .send_fan_notification(Uuid::new_v4(), "order_accepted", Value::Null)
            .await;
        assert_eq!(
            outcome,
            DeliveryOutcome::Failed("network error: transport down".into())
        );
    }

    #[tokio::test]
    async fn test_status_update_routes_to_counterparty() {
        let transport = Arc::new(BroadcastTransport::default());
        let mut rx = transport.subscribe();
        let dispatcher = NotificationDispatcher::new(transport);
        let order = sample_order();

        dispatcher
            .send_order_status_update(&order, ActorRole::Creator)
            .await;
        let received = rx.recv().await.unwrap();
        assert_eq!(received.channel, format!("fan-{}", order.fan_id));
        assert_eq!(received.event, "order_completed");

        dispatcher
            .send_order_status_update(&order, ActorRole::Fan)
            .await;
        let received = rx.recv().await.unwrap();
        assert_eq!(received.channel, format!("creator-{}", order.creator_id));
    }

    #[tokio::test]
    async fn test_only_severe_alerts_broadcast() {
        let transport = Arc::new(BroadcastTransport::default());
        let mut rx = transport.subscribe();
        let dispatcher = NotificationDispatcher::new(transport);

        dispatcher
            .send_system_alert("payment_failed", AlertSeverity::Info, Value::Null)
            .await;
        dispatcher
            .send_system_alert("payment_failed", AlertSeverity::Warning, Value::Null)
            .await;
        dispatcher
            .send_system_alert("payment_failed", AlertSeverity::Critical, Value::Null)
            .await;

        // Only the critical alert reaches the channel
        let received = rx.recv().await.unwrap();
        assert_eq!(received.channel, "admin-alerts");
        assert_eq!(received.event, "system_alert");
        assert!(rx.try_recv().is_err());
    }
}
