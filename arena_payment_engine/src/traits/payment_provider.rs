use ap_common::Credits;
use thiserror::Error;

/// The interface to the external payment provider.
///
/// Implementations wrap the provider's API. The engine's [`crate::gateway::GatewayAdapter`] adds
/// retry and amount/currency validation on top; implementations should report errors as
/// accurately as they can so the adapter can tell a retryable hiccup from a final refusal.
#[allow(async_fn_in_trait)]
pub trait PaymentProvider: Clone + Send + Sync {
    /// Registers a payment intent with the provider. The customer approves the charge at the
    /// returned approval url.
    async fn register_intent(&self, request: IntentRequest) -> Result<IntentResult, ProviderError>;

    /// Captures the funds for an approved intent. Idempotent on the provider's side: re-invoking
    /// capture on an already-captured intent returns the existing capture rather than erroring.
    async fn capture(&self, intent_id: &str) -> Result<CaptureOutcome, ProviderError>;

    /// Queries the capture status of an intent without attempting a capture.
    async fn capture_status(&self, intent_id: &str) -> Result<Option<CaptureOutcome>, ProviderError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentRequest {
    pub amount: Credits,
    pub currency: String,
    /// Merchant-side reference, the order id.
    pub reference: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentResult {
    pub intent_id: String,
    pub approval_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureOutcome {
    pub capture_id: String,
    pub amount: Credits,
    pub currency: String,
}

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// A network hiccup or provider-side 5xx. Worth retrying.
    #[error("Transient provider error: {0}")]
    Transient(String),
    /// The provider refused the payment. Final.
    #[error("The provider declined the payment: {0}")]
    Declined(String),
    /// Anything else the provider API reported. Final.
    #[error("Provider API error: {0}")]
    Api(String),
}
