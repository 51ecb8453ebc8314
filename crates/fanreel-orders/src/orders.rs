//! Order lifecycle
//!
//! Turns a succeeded payment into a binding order and moves it through
//! its states. Transition rules live in a static table keyed by
//! `(current status, actor role)`; authorization is checked before the
//! table is consulted. All writes to the status field go through the
//! store's conditional update, so two racers starting from the same
//! state get exactly one success.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use fanreel_common::{
    require_non_empty, require_positive_amount, require_uuid, MarketError, MarketResult,
    StoreError,
};

use crate::model::{
    ActorRole, Metadata, Order, OrderStatus, Payment, PaymentRecordStatus, IntentStatus,
    RequestStatus, DEFAULT_CURRENCY,
};
use crate::notify::{AlertSeverity, NotificationDispatcher};
use crate::split;
use crate::stats::StatsAggregator;
use crate::store::{OrderStore, PaymentIntentStore, PaymentStore, RequestStore, StatusUpdate};

/// Targets an actor may move an order to from a given status
///
/// Creators drive fulfillment (accept, reject, progress, complete); fans
/// drive recourse (dispute, refund after rejection). `refunded` and
/// `disputed` are terminal. Adding a status means editing this table
/// only.
pub fn allowed_targets(from: OrderStatus, role: ActorRole) -> &'static [OrderStatus] {
    use ActorRole::{Creator, Fan};
    use OrderStatus::*;

    match (from, role) {
        (Pending, Creator) => &[Accepted, Rejected],
        (Accepted, Creator) => &[InProgress, Completed],
        (InProgress, Creator) => &[Completed],
        (Accepted, Fan) | (InProgress, Fan) | (Completed, Fan) => &[Disputed],
        (Rejected, Fan) => &[Refunded],
        _ => &[],
    }
}

/// User-initiated order creation parameters
///
/// `fan_id` is the authenticated caller; the split fields are
/// client-supplied and re-verified before being trusted.
#[derive(Debug, Clone)]
pub struct CreateOrderParams {
    pub fan_id: Uuid,
    pub request_id: Uuid,
    pub payment_intent_id: String,
    pub amount_cents: i64,
    pub platform_fee_cents: i64,
    pub creator_earnings_cents: i64,
    pub currency: Option<String>,
    pub metadata: Option<Metadata>,
}

/// Webhook-initiated order creation parameters
///
/// Ids arrive as strings from the processor event payload and are parsed
/// here; the caller is the already-authenticated processor, so there is
/// no acting fan to authorize.
#[derive(Debug, Clone)]
pub struct WebhookOrderParams {
    pub request_id: String,
    pub payment_intent_id: String,
    pub fan_id: String,
    pub creator_id: String,
    pub amount_cents: i64,
    pub platform_fee_cents: i64,
    pub creator_earnings_cents: i64,
    pub currency: Option<String>,
    pub metadata: Option<Metadata>,
}

/// The order state machine and its creation entry points
pub struct OrderLifecycleManager {
    orders: Arc<dyn OrderStore>,
    requests: Arc<dyn RequestStore>,
    intents: Arc<dyn PaymentIntentStore>,
    payments: Arc<dyn PaymentStore>,
    dispatcher: Arc<NotificationDispatcher>,
    stats: Arc<StatsAggregator>,
}

impl OrderLifecycleManager {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        requests: Arc<dyn RequestStore>,
        intents: Arc<dyn PaymentIntentStore>,
        payments: Arc<dyn PaymentStore>,
        dispatcher: Arc<NotificationDispatcher>,
        stats: Arc<StatsAggregator>,
    ) -> Self {
        Self {
            orders,
            requests,
            intents,
            payments,
            dispatcher,
            stats,
        }
    }

    /// Create an order for a fan whose payment intent has succeeded
    pub async fn create_order(&self, params: CreateOrderParams) -> MarketResult<Order> {
        require_non_empty(&params.payment_intent_id, "payment_intent_id")?;
        require_positive_amount(params.amount_cents, "amount")?;

        let request = self
            .requests
            .get(params.request_id)
            .await
            .map_err(MarketError::from_store)?;
        if request.fan_id != params.fan_id {
            return Err(MarketError::Authorization(
                "request belongs to a different fan".into(),
            ));
        }
        if request.status != RequestStatus::Pending {
            return Err(MarketError::validation(
                "request_id",
                "request is no longer open for ordering",
            ));
        }

        let intent = self
            .intents
            .get(&params.payment_intent_id)
            .await
            .map_err(MarketError::from_store)?;
        if intent.fan_id != params.fan_id || intent.creator_id != request.creator_id {
            return Err(MarketError::Authorization(
                "payment intent belongs to a different party".into(),
            ));
        }
        if intent.status != IntentStatus::Succeeded {
            return Err(MarketError::validation(
                "payment_intent_id",
                format!("intent status is {}, expected succeeded", intent.status),
            ));
        }

        if params.amount_cents != request.price_cents {
            return Err(MarketError::validation(
                "amount",
                format!(
                    "amount {} does not match request price {}",
                    params.amount_cents, request.price_cents
                ),
            ));
        }
        split::verify(
            params.amount_cents,
            params.platform_fee_cents,
            params.creator_earnings_cents,
        )?;

        let order = self.build_order(
            params.fan_id,
            request.creator_id,
            params.request_id,
            params.payment_intent_id,
            params.amount_cents,
            params.currency,
            params.metadata,
        );

        match self.orders.insert(&order).await {
            Ok(()) => {}
            Err(StoreError::Conflict(m)) => {
                return Err(MarketError::validation("request_id", m));
            }
            Err(e) => return Err(MarketError::from_store(e)),
        }

        self.finish_creation(&order).await;
        Ok(order)
    }

    /// Create an order from a processor webhook event
    ///
    /// Idempotent on the payment intent id: a retried delivery returns
    /// the order the first delivery created.
    pub async fn create_order_from_webhook(
        &self,
        params: WebhookOrderParams,
    ) -> MarketResult<Order> {
        let request_id = require_uuid(&params.request_id, "request_id")?;
        let fan_id = require_uuid(&params.fan_id, "fan_id")?;
        let creator_id = require_uuid(&params.creator_id, "creator_id")?;
        require_non_empty(&params.payment_intent_id, "payment_intent_id")?;
        require_positive_amount(params.amount_cents, "amount")?;

        // The processor is trusted on identity, never on arithmetic
        split::verify(
            params.amount_cents,
            params.platform_fee_cents,
            params.creator_earnings_cents,
        )?;

        let order = self.build_order(
            fan_id,
            creator_id,
            request_id,
            params.payment_intent_id.clone(),
            params.amount_cents,
            params.currency,
            params.metadata,
        );

        match self.orders.insert(&order).await {
            Ok(()) => {}
            Err(StoreError::Conflict(_)) => {
                // Duplicate delivery: hand back whatever the first one made
                if let Some(existing) = self
                    .orders
                    .find_by_intent(&params.payment_intent_id)
                    .await
                    .map_err(MarketError::from_store)?
                {
                    tracing::info!(
                        order_id = %existing.id,
                        intent = %params.payment_intent_id,
                        "webhook already processed, returning existing order"
                    );
                    return Ok(existing);
                }
                // Conflict without a matching intent means the request id
                // is already taken by a different payment
                return Err(MarketError::validation(
                    "request_id",
                    "an order already exists for this request",
                ));
            }
            Err(e) => return Err(MarketError::from_store(e)),
        }

        self.finish_creation(&order).await;
        Ok(order)
    }

    /// Move an order to a new status on behalf of an actor
    pub async fn update_order_status(
        &self,
        order_id: Uuid,
        target: OrderStatus,
        actor_id: Uuid,
        metadata: Option<Metadata>,
    ) -> MarketResult<Order> {
        let order = self.orders.get(order_id).await.map_err(MarketError::from_store)?;
        let role = self.authorize(&order, actor_id)?;

        if !allowed_targets(order.status, role).contains(&target) {
            return Err(MarketError::StateTransition {
                from: order.status.to_string(),
                to: target.to_string(),
            });
        }

        let now = Utc::now();
        let update = StatusUpdate {
            status: Some(target),
            accepted_at: (target == OrderStatus::Accepted).then_some(now),
            completed_at: (target == OrderStatus::Completed).then_some(now),
            metadata,
        };

        let updated = match self.orders.update_status_if(order_id, order.status, update).await {
            Ok(updated) => updated,
            // Zero rows matched: another transition landed first
            Err(StoreError::Conflict(_)) => {
                return Err(MarketError::StateTransition {
                    from: order.status.to_string(),
                    to: target.to_string(),
                })
            }
            Err(e) => return Err(MarketError::from_store(e)),
        };

        tracing::info!(
            order_id = %updated.id,
            from = %order.status,
            to = %target,
            actor = %actor_id,
            "order transitioned"
        );

        match target {
            OrderStatus::Completed => self.settle_completed(&updated).await,
            OrderStatus::Rejected => {
                if let Err(e) = self.stats.record_order_rejected(&updated).await {
                    tracing::warn!(order_id = %updated.id, error = %e, "rejection stat update failed");
                }
            }
            _ => {}
        }

        self.dispatcher.send_order_status_update(&updated, role).await;
        Ok(updated)
    }

    /// Fetch a single order for one of its parties
    ///
    /// Anyone else gets `NotFound`, indistinguishable from an absent
    /// order, so existence is not disclosed.
    pub async fn get_order(&self, order_id: Uuid, actor_id: Uuid) -> MarketResult<Order> {
        let order = self.orders.get(order_id).await.map_err(MarketError::from_store)?;
        if order.fan_id != actor_id && order.creator_id != actor_id {
            return Err(MarketError::NotFound(format!("order {order_id}")));
        }
        Ok(order)
    }

    /// Orders placed by a fan, newest first
    pub async fn get_user_orders(&self, fan_id: Uuid) -> MarketResult<Vec<Order>> {
        self.orders.list_for_fan(fan_id).await.map_err(MarketError::from_store)
    }

    /// Orders addressed to a creator, newest first
    pub async fn get_creator_orders(&self, creator_id: Uuid) -> MarketResult<Vec<Order>> {
        self.orders
            .list_for_creator(creator_id)
            .await
            .map_err(MarketError::from_store)
    }

    fn authorize(&self, order: &Order, actor_id: Uuid) -> MarketResult<ActorRole> {
        if actor_id == order.creator_id {
            Ok(ActorRole::Creator)
        } else if actor_id == order.fan_id {
            Ok(ActorRole::Fan)
        } else {
            Err(MarketError::Authorization(
                "actor is neither the fan nor the creator on this order".into(),
            ))
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn build_order(
        &self,
        fan_id: Uuid,
        creator_id: Uuid,
        request_id: Uuid,
        payment_intent_id: String,
        amount_cents: i64,
        currency: Option<String>,
        metadata: Option<Metadata>,
    ) -> Order {
        // Split recomputed here so the stored row satisfies the sum
        // invariant no matter what the caller supplied
        let computed = split::split(amount_cents).expect("amount validated positive");
        Order {
            id: Uuid::new_v4(),
            fan_id,
            creator_id,
            request_id,
            payment_intent_id,
            amount_cents,
            currency: currency.unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            platform_fee_cents: computed.platform_fee_cents,
            creator_earnings_cents: computed.creator_earnings_cents,
            status: OrderStatus::Pending,
            created_at: Utc::now(),
            accepted_at: None,
            completed_at: None,
            metadata: metadata.unwrap_or_default(),
        }
    }

    /// Post-insert side effects shared by both creation entry points:
    /// mark the source request paid, bump stats, tell the creator.
    async fn finish_creation(&self, order: &Order) {
        if let Err(e) = self.requests.mark_paid(order.request_id).await {
            tracing::warn!(
                order_id = %order.id,
                request_id = %order.request_id,
                error = %e,
                "failed to mark source request paid"
            );
            self.dispatcher
                .send_system_alert(
                    "request_mark_paid_failed",
                    AlertSeverity::Error,
                    json!({ "order_id": order.id, "request_id": order.request_id }),
                )
                .await;
        }

        if let Err(e) = self.stats.record_order_created(order).await {
            tracing::warn!(order_id = %order.id, error = %e, "creation stat update failed");
        }

        tracing::info!(
            order_id = %order.id,
            creator = %order.creator_id,
            amount_cents = order.amount_cents,
            "order created"
        );
        self.dispatcher
            .send_creator_notification(
                order.creator_id,
                "new_order",
                json!({
                    "order_id": order.id,
                    "request_id": order.request_id,
                    "amount_cents": order.amount_cents,
                    "creator_earnings_cents": order.creator_earnings_cents,
                }),
            )
            .await;
    }

    /// Completion trigger: write the settlement record and feed the
    /// ledgers. The transition has already landed, so failures here
    /// alert operations instead of failing the call.
    async fn settle_completed(&self, order: &Order) {
        let settlement = Payment {
            id: Uuid::new_v4(),
            order_id: order.id,
            processor_payment_id: order.payment_intent_id.clone(),
            amount_cents: order.amount_cents,
            platform_fee_cents: order.platform_fee_cents,
            creator_earnings_cents: order.creator_earnings_cents,
            processor_fee_cents: None,
            net_platform_fee_cents: order.platform_fee_cents,
            status: PaymentRecordStatus::Settled,
            created_at: Utc::now(),
        };

        match self.payments.insert(&settlement).await {
            Ok(()) => {
                if let Err(e) = self.stats.record_order_completed(order, &settlement).await {
                    tracing::warn!(order_id = %order.id, error = %e, "completion stat update failed");
                }
            }
            Err(StoreError::Conflict(_)) => {
                // Already settled through the administrative path
                tracing::info!(order_id = %order.id, "settlement already recorded");
            }
            Err(e) => {
                tracing::error!(order_id = %order.id, error = %e, "settlement write failed");
                self.dispatcher
                    .send_system_alert(
                        "settlement_write_failed",
                        AlertSeverity::Critical,
                        json!({ "order_id": order.id, "error": e.to_string() }),
                    )
                    .await;
            }
        }
    }
}
