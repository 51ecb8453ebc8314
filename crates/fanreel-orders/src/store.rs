//! Storage abstraction
//!
//! Repository traits for the relational store, plus in-memory
//! implementations used for testing and development. The store is the
//! single source of truth; services never cache rows across calls.
//!
//! Status transitions go through `update_status_if`, a conditional
//! update (`update ... where id = ? and status = ?`); a write that
//! matches zero rows is reported as a conflict so racing callers cannot
//! both land the same transition.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use fanreel_common::{StoreError, StoreResult};

use crate::model::{
    CreatorStats, DailyPlatformStats, Metadata, Order, OrderStatus, Payment, PaymentIntent,
    IntentStatus, PlatformRevenue, RequestStatus, VideoRequest,
};

/// Fields applied by a successful status transition
#[derive(Debug, Clone, Default)]
pub struct StatusUpdate {
    pub status: Option<OrderStatus>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Shallow-merged over the existing metadata
    pub metadata: Option<Metadata>,
}

/// Order persistence
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Insert a new order
    ///
    /// Conflicts when an order already exists for the same source request
    /// or the same payment intent (webhook idempotency rides on this).
    async fn insert(&self, order: &Order) -> StoreResult<()>;

    /// Get order by id
    async fn get(&self, id: Uuid) -> StoreResult<Order>;

    /// Look up the order created for a payment intent, if any
    async fn find_by_intent(&self, intent_id: &str) -> StoreResult<Option<Order>>;

    /// Conditionally apply a status transition
    ///
    /// The update lands only where the current status equals `expect`;
    /// otherwise the row is untouched and the call conflicts.
    async fn update_status_if(
        &self,
        id: Uuid,
        expect: OrderStatus,
        update: StatusUpdate,
    ) -> StoreResult<Order>;

    /// Orders placed by a fan, newest first
    async fn list_for_fan(&self, fan_id: Uuid) -> StoreResult<Vec<Order>>;

    /// Orders addressed to a creator, newest first
    async fn list_for_creator(&self, creator_id: Uuid) -> StoreResult<Vec<Order>>;

    /// Orders created inside a time window
    async fn list_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<Order>>;
}

/// Source-request access (external collaborator entity)
///
/// This service only reads requests and marks them paid.
#[async_trait]
pub trait RequestStore: Send + Sync {
    /// Get request by id
    async fn get(&self, id: Uuid) -> StoreResult<VideoRequest>;

    /// Mark a request paid once its order lands
    async fn mark_paid(&self, id: Uuid) -> StoreResult<VideoRequest>;
}

/// Payment intent mirror persistence
#[async_trait]
pub trait PaymentIntentStore: Send + Sync {
    /// Insert a freshly created intent mirror
    async fn insert(&self, intent: &PaymentIntent) -> StoreResult<()>;

    /// Get intent by processor id
    async fn get(&self, id: &str) -> StoreResult<PaymentIntent>;

    /// Mirror a processor-side status change
    async fn update_status(&self, id: &str, status: IntentStatus) -> StoreResult<PaymentIntent>;
}

/// Settlement record persistence
#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Insert a settlement record; conflicts when the order already has one
    async fn insert(&self, payment: &Payment) -> StoreResult<()>;

    /// Settlement for an order, if recorded
    async fn get_for_order(&self, order_id: Uuid) -> StoreResult<Option<Payment>>;

    /// Settlements recorded inside a time window
    async fn list_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<Payment>>;
}

/// Analytics persistence: stat rows, revenue ledger, daily aggregates
#[async_trait]
pub trait StatsStore: Send + Sync {
    /// Creator stat row, if present
    async fn get_creator(&self, creator_id: Uuid) -> StoreResult<Option<CreatorStats>>;

    /// Upsert a creator stat row
    async fn put_creator(&self, stats: &CreatorStats) -> StoreResult<()>;

    /// Append a revenue ledger entry
    async fn append_revenue(&self, entry: &PlatformRevenue) -> StoreResult<()>;

    /// Ledger entries recorded inside a time window
    async fn revenue_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<PlatformRevenue>>;

    /// Merge a delta into the aggregate row for a day
    async fn merge_daily(&self, delta: &DailyPlatformStats) -> StoreResult<DailyPlatformStats>;

    /// Aggregate row for a day, if present
    async fn get_daily(&self, date: NaiveDate) -> StoreResult<Option<DailyPlatformStats>>;
}

fn newest_first(orders: &mut [Order]) {
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

/// In-memory order store (for testing and development)
#[derive(Default)]
pub struct InMemoryOrderStore {
    orders: RwLock<HashMap<Uuid, Order>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn insert(&self, order: &Order) -> StoreResult<()> {
        let mut orders = self.orders.write();
        if orders.contains_key(&order.id) {
            return Err(StoreError::Conflict(format!("order {} exists", order.id)));
        }
        if orders.values().any(|o| o.request_id == order.request_id) {
            return Err(StoreError::Conflict(format!(
                "order exists for request {}",
                order.request_id
            )));
        }
        if orders
            .values()
            .any(|o| o.payment_intent_id == order.payment_intent_id)
        {
            return Err(StoreError::Conflict(format!(
                "order exists for intent {}",
                order.payment_intent_id
            )));
        }
        orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> StoreResult<Order> {
        self.orders
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("order {id}")))
    }

    async fn find_by_intent(&self, intent_id: &str) -> StoreResult<Option<Order>> {
        Ok(self
            .orders
            .read()
            .values()
            .find(|o| o.payment_intent_id == intent_id)
            .cloned())
    }

    async fn update_status_if(
        &self,
        id: Uuid,
        expect: OrderStatus,
        update: StatusUpdate,
    ) -> StoreResult<Order> {
        let mut orders = self.orders.write();
        let order = orders
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("order {id}")))?;

        // The compare and the write happen under one lock; a SQL adapter
        // expresses the same thing as `where id = ? and status = ?`.
        if order.status != expect {
            return Err(StoreError::Conflict(format!(
                "order {id} is {}, expected {expect}",
                order.status
            )));
        }

        if let Some(status) = update.status {
            order.status = status;
        }
        if let Some(at) = update.accepted_at {
            order.accepted_at = Some(at);
        }
        if let Some(at) = update.completed_at {
            order.completed_at = Some(at);
        }
        if let Some(patch) = update.metadata {
            for (k, v) in patch {
                order.metadata.insert(k, v);
            }
        }

        Ok(order.clone())
    }

    async fn list_for_fan(&self, fan_id: Uuid) -> StoreResult<Vec<Order>> {
        let mut orders: Vec<_> = self
            .orders
            .read()
            .values()
            .filter(|o| o.fan_id == fan_id)
            .cloned()
            .collect();
        newest_first(&mut orders);
        Ok(orders)
    }

    async fn list_for_creator(&self, creator_id: Uuid) -> StoreResult<Vec<Order>> {
        let mut orders: Vec<_> = self
            .orders
            .read()
            .values()
            .filter(|o| o.creator_id == creator_id)
            .cloned()
            .collect();
        newest_first(&mut orders);
        Ok(orders)
    }

    async fn list_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<Order>> {
        Ok(self
            .orders
            .read()
            .values()
            .filter(|o| o.created_at >= start && o.created_at < end)
            .cloned()
            .collect())
    }
}

/// In-memory source-request store
#[derive(Default)]
pub struct InMemoryRequestStore {
    requests: RwLock<HashMap<Uuid, VideoRequest>>,
}

impl InMemoryRequestStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a request row (the request service owns creation in production)
    pub fn seed(&self, request: VideoRequest) {
        self.requests.write().insert(request.id, request);
    }
}

#[async_trait]
impl RequestStore for InMemoryRequestStore {
    async fn get(&self, id: Uuid) -> StoreResult<VideoRequest> {
        self.requests
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("request {id}")))
    }

    async fn mark_paid(&self, id: Uuid) -> StoreResult<VideoRequest> {
        let mut requests = self.requests.write();
        let request = requests
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("request {id}")))?;
        request.status = RequestStatus::Paid;
        Ok(request.clone())
    }
}

/// In-memory payment intent store
#[derive(Default)]
pub struct InMemoryIntentStore {
    intents: RwLock<HashMap<String, PaymentIntent>>,
}

impl InMemoryIntentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentIntentStore for InMemoryIntentStore {
    async fn insert(&self, intent: &PaymentIntent) -> StoreResult<()> {
        let mut intents = self.intents.write();
        if intents.contains_key(&intent.id) {
            return Err(StoreError::Conflict(format!("intent {} exists", intent.id)));
        }
        intents.insert(intent.id.clone(), intent.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> StoreResult<PaymentIntent> {
        self.intents
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("intent {id}")))
    }

    async fn update_status(&self, id: &str, status: IntentStatus) -> StoreResult<PaymentIntent> {
        let mut intents = self.intents.write();
        let intent = intents
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(format!("intent {id}")))?;
        intent.status = status;
        intent.updated_at = Utc::now();
        Ok(intent.clone())
    }
}

/// In-memory settlement store
#[derive(Default)]
pub struct InMemoryPaymentStore {
    payments: RwLock<HashMap<Uuid, Payment>>,
}

impl InMemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn insert(&self, payment: &Payment) -> StoreResult<()> {
        let mut payments = self.payments.write();
        if payments.values().any(|p| p.order_id == payment.order_id) {
            return Err(StoreError::Conflict(format!(
                "settlement exists for order {}",
                payment.order_id
            )));
        }
        payments.insert(payment.id, payment.clone());
        Ok(())
    }

    async fn get_for_order(&self, order_id: Uuid) -> StoreResult<Option<Payment>> {
        Ok(self
            .payments
            .read()
            .values()
            .find(|p| p.order_id == order_id)
            .cloned())
    }

    async fn list_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<Payment>> {
        Ok(self
            .payments
            .read()
            .values()
            .filter(|p| p.created_at >= start && p.created_at < end)
            .cloned()
            .collect())
    }
}

/// In-memory analytics store
#[derive(Default)]
pub struct InMemoryStatsStore {
    creators: RwLock<HashMap<Uuid, CreatorStats>>,
    revenue: RwLock<Vec<PlatformRevenue>>,
    daily: RwLock<HashMap<NaiveDate, DailyPlatformStats>>,
}

impl InMemoryStatsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StatsStore for InMemoryStatsStore {
    async fn get_creator(&self, creator_id: Uuid) -> StoreResult<Option<CreatorStats>> {
        Ok(self.creators.read().get(&creator_id).cloned())
    }

    async fn put_creator(&self, stats: &CreatorStats) -> StoreResult<()> {
        self.creators.write().insert(stats.creator_id, stats.clone());
        Ok(())
    }

    async fn append_revenue(&self, entry: &PlatformRevenue) -> StoreResult<()> {
        self.revenue.write().push(entry.clone());
        Ok(())
    }

    async fn revenue_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<PlatformRevenue>> {
        Ok(self
            .revenue
            .read()
            .iter()
            .filter(|r| r.recorded_at >= start && r.recorded_at < end)
            .cloned()
            .collect())
    }

    async fn merge_daily(&self, delta: &DailyPlatformStats) -> StoreResult<DailyPlatformStats> {
        let mut daily = self.daily.write();
        let row = daily
            .entry(delta.date)
            .or_insert_with(|| DailyPlatformStats {
                date: delta.date,
                order_count: 0,
                gross_cents: 0,
                platform_fee_cents: 0,
                net_fee_cents: 0,
            });
        row.order_count += delta.order_count;
        row.gross_cents += delta.gross_cents;
        row.platform_fee_cents += delta.platform_fee_cents;
        row.net_fee_cents += delta.net_fee_cents;
        Ok(row.clone())
    }

    async fn get_daily(&self, date: NaiveDate) -> StoreResult<Option<DailyPlatformStats>> {
        Ok(self.daily.read().get(&date).cloned())
    }
}
