//! Payment coordination
//!
//! Gateway-facing operations: creating and confirming payment intents,
//! mirroring processor status locally, and the administrative settlement
//! write. Intent creation is a financial write and is never retried;
//! status refreshes are read-only and go through the bounded retry
//! helper.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use fanreel_common::{
    require_non_empty, require_positive_amount, with_retry, MarketError, MarketResult,
    RetryPolicy, StoreError,
};

use crate::gateway::{CreateIntentParams, PaymentGateway};
use crate::model::{
    IntentStatus, Metadata, Payment, PaymentIntent, PaymentRecordStatus, DEFAULT_CURRENCY,
};
use crate::split;
use crate::store::{OrderStore, PaymentIntentStore, PaymentStore, RequestStore};

/// What a fan-side client needs to confirm a charge
#[derive(Debug, Clone, Serialize)]
pub struct PaymentIntentView {
    pub id: String,
    pub client_secret: String,
    pub amount_cents: i64,
    pub currency: String,
    pub status: IntentStatus,
}

impl From<&PaymentIntent> for PaymentIntentView {
    fn from(intent: &PaymentIntent) -> Self {
        Self {
            id: intent.id.clone(),
            client_secret: intent.client_secret.clone(),
            amount_cents: intent.amount_cents,
            currency: intent.currency.clone(),
            status: intent.status,
        }
    }
}

/// Gateway-facing payment operations
pub struct PaymentService {
    intents: Arc<dyn PaymentIntentStore>,
    requests: Arc<dyn RequestStore>,
    orders: Arc<dyn OrderStore>,
    payments: Arc<dyn PaymentStore>,
    gateway: Arc<dyn PaymentGateway>,
    retry: RetryPolicy,
}

impl PaymentService {
    pub fn new(
        intents: Arc<dyn PaymentIntentStore>,
        requests: Arc<dyn RequestStore>,
        orders: Arc<dyn OrderStore>,
        payments: Arc<dyn PaymentStore>,
        gateway: Arc<dyn PaymentGateway>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            intents,
            requests,
            orders,
            payments,
            gateway,
            retry,
        }
    }

    /// Create a processor intent for a video request and mirror it locally
    ///
    /// The platform's cut is computed here and attached as the
    /// application fee, so the processor collects it at charge time.
    pub async fn create_payment_intent(
        &self,
        fan_id: Uuid,
        creator_id: Uuid,
        request_id: Uuid,
        amount_cents: i64,
        currency: Option<String>,
        metadata: Option<Metadata>,
    ) -> MarketResult<PaymentIntentView> {
        require_positive_amount(amount_cents, "amount")?;

        let request = self.requests.get(request_id).await.map_err(MarketError::from_store)?;
        if request.fan_id != fan_id {
            return Err(MarketError::Authorization(
                "request belongs to a different fan".into(),
            ));
        }
        if request.creator_id != creator_id {
            return Err(MarketError::validation(
                "creator_id",
                "creator does not match the request",
            ));
        }
        if amount_cents != request.price_cents {
            return Err(MarketError::validation(
                "amount",
                format!(
                    "amount {} does not match request price {}",
                    amount_cents, request.price_cents
                ),
            ));
        }

        let computed = split::split(amount_cents)?;
        let currency = currency.unwrap_or_else(|| DEFAULT_CURRENCY.to_string());

        let mut gateway_metadata = metadata.clone().unwrap_or_default();
        gateway_metadata.insert("request_id".into(), json!(request_id));
        gateway_metadata.insert("fan_id".into(), json!(fan_id));
        gateway_metadata.insert("creator_id".into(), json!(creator_id));

        // Financial write: one attempt, errors surface immediately
        let created = self
            .gateway
            .create_intent(CreateIntentParams {
                amount_cents,
                currency: currency.clone(),
                // The gateway adapter owns the mapping from creator to
                // processor account
                payee_account: creator_id.to_string(),
                application_fee_cents: computed.platform_fee_cents,
                metadata: gateway_metadata,
            })
            .await?;

        let now = Utc::now();
        let intent = PaymentIntent {
            id: created.id,
            fan_id,
            creator_id,
            request_id,
            amount_cents,
            currency,
            status: created.status,
            client_secret: created.client_secret,
            metadata: metadata.unwrap_or_default(),
            created_at: now,
            updated_at: now,
        };
        self.intents.insert(&intent).await.map_err(MarketError::from_store)?;

        tracing::info!(
            intent = %intent.id,
            fan = %fan_id,
            creator = %creator_id,
            amount_cents,
            "payment intent created"
        );
        Ok(PaymentIntentView::from(&intent))
    }

    /// Refresh an intent's status from the processor and mirror it
    ///
    /// Read-only against the processor, so transient failures are
    /// retried under the configured policy.
    pub async fn confirm_payment_intent(&self, intent_id: &str) -> MarketResult<PaymentIntent> {
        require_non_empty(intent_id, "payment_intent_id")?;

        let status = with_retry(|| self.gateway.retrieve_status(intent_id), &self.retry).await?;
        self.update_payment_intent_status(intent_id, status).await
    }

    /// Mirror a processor-reported status (webhook receivers call this)
    pub async fn update_payment_intent_status(
        &self,
        intent_id: &str,
        status: IntentStatus,
    ) -> MarketResult<PaymentIntent> {
        require_non_empty(intent_id, "payment_intent_id")?;

        let intent = self
            .intents
            .update_status(intent_id, status)
            .await
            .map_err(MarketError::from_store)?;
        tracing::info!(intent = %intent.id, status = %status, "payment intent status mirrored");
        Ok(intent)
    }

    /// Write the immutable settlement record for an order
    #[allow(clippy::too_many_arguments)]
    pub async fn create_payment_record(
        &self,
        order_id: Uuid,
        processor_payment_id: &str,
        amount_cents: i64,
        platform_fee_cents: i64,
        creator_earnings_cents: i64,
        processor_fee_cents: Option<i64>,
        status: PaymentRecordStatus,
    ) -> MarketResult<Payment> {
        require_non_empty(processor_payment_id, "processor_payment_id")?;
        split::verify(amount_cents, platform_fee_cents, creator_earnings_cents)?;
        if let Some(fee) = processor_fee_cents {
            if fee < 0 || fee > platform_fee_cents {
                return Err(MarketError::validation(
                    "processor_fee",
                    "must be between zero and the platform fee",
                ));
            }
        }

        // The order must exist; settlements never dangle
        self.orders.get(order_id).await.map_err(MarketError::from_store)?;

        let payment = Payment {
            id: Uuid::new_v4(),
            order_id,
            processor_payment_id: processor_payment_id.to_string(),
            amount_cents,
            platform_fee_cents,
            creator_earnings_cents,
            processor_fee_cents,
            net_platform_fee_cents: platform_fee_cents - processor_fee_cents.unwrap_or(0),
            status,
            created_at: Utc::now(),
        };

        match self.payments.insert(&payment).await {
            Ok(()) => Ok(payment),
            Err(StoreError::Conflict(_)) => Err(MarketError::validation(
                "order_id",
                "settlement already recorded for this order",
            )),
            Err(e) => Err(MarketError::from_store(e)),
        }
    }
}
