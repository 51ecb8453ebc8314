//! FanReel Order Platform (FROP)
//!
//! Order/payment lifecycle service for the creator video marketplace:
//! turns a succeeded payment into a binding order, role-gates every
//! status transition, computes the deterministic platform/creator
//! revenue split, persists settlement records, and notifies the
//! affected parties.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       ORDER PLATFORM (FROP)                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  ORDER LIFECYCLE MANAGER                         │   │
//! │  │   Webhook/User ─► Verify Split ─► Insert ─► Role-Gated FSM        │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐  ┌─────────────┐ │
//! │  │    Split     │  │   Payment    │  │ Notification │  │    Stats    │ │
//! │  │  Calculator  │  │   Gateway    │  │  Dispatcher  │  │ Aggregator  │ │
//! │  └──────────────┘  └──────────────┘  └──────────────┘  └─────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     STORAGE ABSTRACTION                          │   │
//! │  │   Orders | Requests | Intents | Settlements | Stat Ledgers       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![allow(dead_code)]

pub mod gateway;
pub mod model;
pub mod notify;
pub mod orders;
pub mod payments;
pub mod split;
pub mod stats;
pub mod store;

use std::sync::Arc;

pub use fanreel_common::{MarketError, MarketResult, RetryPolicy};

pub use gateway::{PaymentGateway, SimulatedGateway};
pub use model::{ActorRole, Order, OrderStatus, Payment, PaymentIntent};
pub use notify::{
    AlertSeverity, BroadcastTransport, Channel, NotificationDispatcher, NotificationTransport,
};
pub use orders::{CreateOrderParams, OrderLifecycleManager, WebhookOrderParams};
pub use payments::{PaymentIntentView, PaymentService};
pub use split::{split as calculate_payment_split, PaymentSplit};
pub use stats::{CreatorAnalytics, PlatformAnalytics, StatsAggregator};
pub use store::{
    InMemoryIntentStore, InMemoryOrderStore, InMemoryPaymentStore, InMemoryRequestStore,
    InMemoryStatsStore, OrderStore, PaymentIntentStore, PaymentStore, RequestStore, StatsStore,
};

/// Order Platform
///
/// Wires the lifecycle components over injected store, gateway, and
/// transport implementations. Route handlers hold one of these.
pub struct OrderPlatform {
    /// Order state machine and creation entry points
    pub lifecycle: Arc<OrderLifecycleManager>,
    /// Intent and settlement operations
    pub payments: Arc<PaymentService>,
    /// Creator and platform analytics
    pub stats: Arc<StatsAggregator>,
    /// Fire-and-forget event dispatch
    pub notifications: Arc<NotificationDispatcher>,
}

impl OrderPlatform {
    /// Wire a platform from injected collaborators
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        orders: Arc<dyn OrderStore>,
        requests: Arc<dyn RequestStore>,
        intents: Arc<dyn PaymentIntentStore>,
        settlements: Arc<dyn PaymentStore>,
        stat_store: Arc<dyn StatsStore>,
        gateway: Arc<dyn PaymentGateway>,
        transport: Arc<dyn NotificationTransport>,
        retry: RetryPolicy,
    ) -> Self {
        let notifications = Arc::new(NotificationDispatcher::new(transport));
        let stats = Arc::new(StatsAggregator::new(stat_store, orders.clone()));
        let payments = Arc::new(PaymentService::new(
            intents.clone(),
            requests.clone(),
            orders.clone(),
            settlements.clone(),
            gateway,
            retry,
        ));
        let lifecycle = Arc::new(OrderLifecycleManager::new(
            orders,
            requests,
            intents,
            settlements,
            notifications.clone(),
            stats.clone(),
        ));

        Self {
            lifecycle,
            payments,
            stats,
            notifications,
        }
    }

    /// Platform wired entirely with in-memory fakes (testing/development)
    pub fn in_memory() -> InMemoryPlatform {
        let orders = Arc::new(InMemoryOrderStore::new());
        let requests = Arc::new(InMemoryRequestStore::new());
        let intents = Arc::new(InMemoryIntentStore::new());
        let settlements = Arc::new(InMemoryPaymentStore::new());
        let stat_store = Arc::new(InMemoryStatsStore::new());
        let gateway = Arc::new(SimulatedGateway::new());
        let transport = Arc::new(BroadcastTransport::default());

        let platform = Self::new(
            orders.clone(),
            requests.clone(),
            intents.clone(),
            settlements.clone(),
            stat_store.clone(),
            gateway.clone(),
            transport.clone(),
            RetryPolicy::default(),
        );

        InMemoryPlatform {
            platform,
            requests,
            gateway,
            transport,
        }
    }

    /// Deterministic platform/creator split of a charge amount
    pub fn calculate_payment_split(&self, total_cents: i64) -> MarketResult<PaymentSplit> {
        split::split(total_cents)
    }
}

/// An `OrderPlatform` plus handles to the fakes backing it
pub struct InMemoryPlatform {
    /// The wired platform
    pub platform: OrderPlatform,
    /// Request store handle, for seeding source requests
    pub requests: Arc<InMemoryRequestStore>,
    /// Gateway handle, for driving intent status
    pub gateway: Arc<SimulatedGateway>,
    /// Transport handle, for subscribing to notifications
    pub transport: Arc<BroadcastTransport>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{IntentStatus, RequestStatus, VideoRequest};
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_full_order_lifecycle_through_the_platform() {
        let wired = OrderPlatform::in_memory();
        let platform = &wired.platform;
        let mut rx = wired.transport.subscribe();

        let fan_id = Uuid::new_v4();
        let creator_id = Uuid::new_v4();
        let request_id = Uuid::new_v4();
        wired.requests.seed(VideoRequest {
            id: request_id,
            fan_id,
            creator_id,
            price_cents: 10_000,
            status: RequestStatus::Pending,
            created_at: Utc::now(),
        });

        // Fan opens a payment intent and the processor settles it
        let view = platform
            .payments
            .create_payment_intent(fan_id, creator_id, request_id, 10_000, None, None)
            .await
            .unwrap();
        wired.gateway.set_status(&view.id, IntentStatus::Succeeded);
        let confirmed = platform.payments.confirm_payment_intent(&view.id).await.unwrap();
        assert_eq!(confirmed.status, IntentStatus::Succeeded);

        // The succeeded payment becomes a binding order
        let split = platform.calculate_payment_split(10_000).unwrap();
        let order = platform
            .lifecycle
            .create_order(CreateOrderParams {
                fan_id,
                request_id,
                payment_intent_id: view.id.clone(),
                amount_cents: 10_000,
                platform_fee_cents: split.platform_fee_cents,
                creator_earnings_cents: split.creator_earnings_cents,
                currency: None,
                metadata: None,
            })
            .await
            .unwrap();
        assert_eq!(rx.recv().await.unwrap().event, "new_order");

        // Creator fulfills
        platform
            .lifecycle
            .update_order_status(order.id, OrderStatus::Accepted, creator_id, None)
            .await
            .unwrap();
        let completed = platform
            .lifecycle
            .update_order_status(order.id, OrderStatus::Completed, creator_id, None)
            .await
            .unwrap();
        assert!(completed.completed_at.is_some());

        // Derived analytics see the settled order
        let creator_stats = platform.stats.get_creator_stats(creator_id).await.unwrap();
        assert_eq!(creator_stats.total_orders, 1);
        assert_eq!(creator_stats.completed_orders, 1);
        assert_eq!(creator_stats.total_earnings_cents, 7_000);

        let analytics = platform.stats.get_platform_analytics(30).await.unwrap();
        assert_eq!(analytics.order_count, 1);
        assert_eq!(analytics.net_revenue_cents, 3_000);
        assert_eq!(analytics.revenue_growth_pct, dec!(0));
    }
}
