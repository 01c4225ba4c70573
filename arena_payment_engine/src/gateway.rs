//! The payment gateway adapter.
//!
//! Wraps a [`PaymentProvider`] with the two behaviours every call site needs: bounded exponential
//! backoff for transient failures, and validation that the amounts and currency the provider
//! reports equal the order's. A mismatch is a validation failure and is never silently accepted.

use std::time::Duration;

use log::*;

use crate::{
    db_types::Order,
    traits::{CaptureOutcome, IntentRequest, IntentResult, PaymentProvider, ProviderError, SettlementError},
};

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on each subsequent retry.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 4, base_delay: Duration::from_millis(250) }
    }
}

#[derive(Clone)]
pub struct GatewayAdapter<P> {
    provider: P,
    retry: RetryPolicy,
}

impl<P> GatewayAdapter<P>
where P: PaymentProvider
{
    pub fn new(provider: P) -> Self {
        Self { provider, retry: RetryPolicy::default() }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Registers a payment intent for the order with the provider.
    pub async fn register_intent(&self, order: &Order) -> Result<IntentResult, SettlementError> {
        let request = IntentRequest {
            amount: order.total_price,
            currency: order.currency.clone(),
            reference: order.order_id.as_str().to_string(),
        };
        let order_id = &order.order_id;
        let result = self
            .with_backoff("register_intent", order_id.as_str(), || self.provider.register_intent(request.clone()))
            .await?;
        debug!("🏦️ Intent {} registered for order [{order_id}]", result.intent_id);
        Ok(result)
    }

    /// Captures the funds for the order's approved intent and validates the returned amount and
    /// currency against the order.
    pub async fn capture(&self, order: &Order, intent_id: &str) -> Result<CaptureOutcome, SettlementError> {
        let order_id = &order.order_id;
        let capture = self.with_backoff("capture", order_id.as_str(), || self.provider.capture(intent_id)).await?;
        if capture.amount != order.total_price || capture.currency != order.currency {
            warn!(
                "🏦️ Capture {} reported {} {} but order [{order_id}] is for {} {}. Refusing to settle.",
                capture.capture_id, capture.amount, capture.currency, order.total_price, order.currency
            );
            return Err(SettlementError::Validation(format!(
                "Captured amount {} {} does not match order amount {} {}",
                capture.amount, capture.currency, order.total_price, order.currency
            )));
        }
        debug!("🏦️ Capture {} confirmed for order [{order_id}]", capture.capture_id);
        Ok(capture)
    }

    /// Runs the closure with bounded exponential backoff. Only transient provider errors are
    /// retried; a declined payment or API error fails immediately. Once the retry budget is
    /// exhausted the call surfaces [`SettlementError::GatewayFailed`].
    async fn with_backoff<T, F, Fut>(&self, what: &str, oid: &str, mut call: F) -> Result<T, SettlementError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, ProviderError>>,
    {
        let mut delay = self.retry.base_delay;
        let mut last_error = String::new();
        for attempt in 1..=self.retry.max_attempts {
            match call().await {
                Ok(value) => return Ok(value),
                Err(ProviderError::Transient(e)) => {
                    warn!("🏦️ Transient error on {what} for [{oid}] (attempt {attempt}): {e}");
                    last_error = e;
                    if attempt < self.retry.max_attempts {
                        tokio::time::sleep(delay).await;
                        delay *= 2;
                    }
                },
                Err(ProviderError::Declined(e)) => {
                    info!("🏦️ Provider declined {what} for [{oid}]: {e}");
                    return Err(SettlementError::GatewayFailed(format!("Payment declined: {e}")));
                },
                Err(ProviderError::Api(e)) => {
                    error!("🏦️ Provider API error on {what} for [{oid}]: {e}");
                    return Err(SettlementError::GatewayFailed(e));
                },
            }
        }
        error!("🏦️ {what} for [{oid}] failed after {} attempts. Giving up.", self.retry.max_attempts);
        Err(SettlementError::GatewayFailed(format!(
            "{what} failed after {} attempts: {last_error}",
            self.retry.max_attempts
        )))
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }
}
