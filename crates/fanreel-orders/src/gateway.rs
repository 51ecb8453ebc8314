//! Payment gateway boundary
//!
//! The interface the lifecycle service consumes to create and inspect
//! payment intents on the external processor. Nothing here retries
//! financial writes; a failed intent creation surfaces immediately so the
//! caller cannot double-charge. Read-only status checks are the only
//! calls the bounded retry helper may wrap.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use uuid::Uuid;

use fanreel_common::{MarketError, MarketResult};

use crate::model::{IntentStatus, Metadata};

/// Parameters for creating a processor intent
#[derive(Debug, Clone)]
pub struct CreateIntentParams {
    pub amount_cents: i64,
    pub currency: String,
    /// Processor account reference of the creator being paid
    pub payee_account: String,
    /// Platform's cut, collected by the processor as an application fee
    pub application_fee_cents: i64,
    pub metadata: Metadata,
}

/// Intent as reported by the processor
#[derive(Debug, Clone)]
pub struct GatewayIntent {
    pub id: String,
    pub client_secret: String,
    pub amount_cents: i64,
    pub currency: String,
    pub status: IntentStatus,
    pub metadata: Metadata,
}

/// External payment processor boundary
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create an intent for a charge (financial write, never auto-retried)
    async fn create_intent(&self, params: CreateIntentParams) -> MarketResult<GatewayIntent>;

    /// Current processor-side status of an intent (read-only)
    async fn retrieve_status(&self, intent_id: &str) -> MarketResult<IntentStatus>;
}

/// In-process gateway simulation (for testing and development)
///
/// Hands out processor-style identifiers and lets tests drive intent
/// status directly. `fail_retrievals` injects transient read failures to
/// exercise the retry path.
#[derive(Default)]
pub struct SimulatedGateway {
    intents: RwLock<HashMap<String, GatewayIntent>>,
    fail_retrievals: RwLock<u32>,
}

impl SimulatedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` status retrievals fail with a gateway error
    pub fn fail_next_retrievals(&self, n: u32) {
        *self.fail_retrievals.write() = n;
    }

    /// Drive an intent to a status, as the processor would after a charge
    pub fn set_status(&self, intent_id: &str, status: IntentStatus) {
        if let Some(intent) = self.intents.write().get_mut(intent_id) {
            intent.status = status;
        }
    }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn create_intent(&self, params: CreateIntentParams) -> MarketResult<GatewayIntent> {
        if params.application_fee_cents > params.amount_cents {
            return Err(MarketError::Gateway(
                "application fee exceeds charge amount".into(),
            ));
        }

        let intent = GatewayIntent {
            id: format!("pi_{}", Uuid::new_v4().to_string().replace("-", "")),
            client_secret: format!("cs_{}", Uuid::new_v4().to_string().replace("-", "")),
            amount_cents: params.amount_cents,
            currency: params.currency,
            status: IntentStatus::RequiresPayment,
            metadata: params.metadata,
        };
        self.intents
            .write()
            .insert(intent.id.clone(), intent.clone());
        Ok(intent)
    }

    async fn retrieve_status(&self, intent_id: &str) -> MarketResult<IntentStatus> {
        {
            let mut failures = self.fail_retrievals.write();
            if *failures > 0 {
                *failures -= 1;
                return Err(MarketError::Gateway("processor unavailable".into()));
            }
        }

        self.intents
            .read()
            .get(intent_id)
            .map(|i| i.status)
            .ok_or_else(|| MarketError::Gateway(format!("unknown intent {intent_id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(amount: i64, fee: i64) -> CreateIntentParams {
        CreateIntentParams {
            amount_cents: amount,
            currency: "USD".into(),
            payee_account: "acct_creator".into(),
            application_fee_cents: fee,
            metadata: Metadata::new(),
        }
    }

    #[tokio::test]
    async fn test_intent_lifecycle() {
        let gateway = SimulatedGateway::new();
        let intent = gateway.create_intent(params(10_000, 3_000)).await.unwrap();
        assert!(intent.id.starts_with("pi_"));
        assert!(intent.client_secret.starts_with("cs_"));
        assert_eq!(intent.status, IntentStatus::RequiresPayment);

        gateway.set_status(&intent.id, IntentStatus::Succeeded);
        let status = gateway.retrieve_status(&intent.id).await.unwrap();
        assert_eq!(status, IntentStatus::Succeeded);
    }

    #[tokio::test]
    async fn test_rejects_fee_above_amount() {
        let gateway = SimulatedGateway::new();
        assert!(matches!(
            gateway.create_intent(params(100, 200)).await,
            Err(MarketError::Gateway(_))
        ));
    }

    #[tokio::test]
    async fn test_injected_retrieval_failures() {
        let gateway = SimulatedGateway::new();
        let intent = gateway.create_intent(params(5_000, 1_500)).await.unwrap();

        gateway.fail_next_retrievals(1);
        assert!(gateway.retrieve_status(&intent.id).await.is_err());
        assert!(gateway.retrieve_status(&intent.id).await.is_ok());
    }
}
